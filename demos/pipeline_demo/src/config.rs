//! Declarative description of a pipeline stage's sizing, used by this
//! demonstration binary to describe a topology before constructing the
//! real `Stage` objects. Sugar over `Stage::new`'s constructor arguments,
//! not a new runtime concept.

#[derive(Debug, Clone)]
pub struct StageConfig {
    pub name: String,
    pub num_workers: usize,
    pub capacity: usize,
}

impl StageConfig {
    pub fn new(name: impl Into<String>, num_workers: usize, capacity: usize) -> Self {
        Self {
            name: name.into(),
            num_workers,
            capacity,
        }
    }
}
