//! `Stage`: a named pipeline node backed by a background `WorkerPool`.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use stagepipe_thread::WorkerPool;

use crate::error::PipelineFailure;
use crate::pipeline::Pipeline;
use crate::stage_node::StageNode;
use crate::task::{build_wrapper, wrap_user_func, TaskFn};

/// A pipeline stage whose worker pool runs on `num_workers` background
/// threads. Construct with [`Stage::new`], pre-declare the task count with
/// [`Stage::set_task_count`], submit indices with [`Stage::push`], and
/// block for completion with [`Stage::wait`].
pub struct Stage {
    name: Arc<str>,
    func: TaskFn,
    pool: WorkerPool,
    next: Mutex<Option<Arc<dyn StageNode>>>,
    pipeline: RwLock<Arc<Pipeline>>,
}

impl Stage {
    /// Spawns `num_workers` threads draining a bounded queue of `capacity`.
    /// `func` is applied to each pushed index; any `Err` it returns, or a
    /// panic it raises, is recorded into this stage's pipeline rather than
    /// propagated.
    pub fn new<F, E>(
        name: impl Into<String>,
        num_workers: usize,
        capacity: usize,
        func: F,
    ) -> anyhow::Result<Arc<Self>>
    where
        F: Fn(usize) -> Result<(), E> + Send + Sync + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        anyhow::ensure!(num_workers >= 1, "num_workers must be at least 1");
        anyhow::ensure!(capacity >= 1, "capacity must be at least 1");
        let name: Arc<str> = Arc::from(name.into());
        let pool = WorkerPool::new(name.as_ref(), num_workers, capacity)?;
        Ok(Arc::new(Self {
            name,
            func: wrap_user_func(func),
            pool,
            next: Mutex::new(None),
            pipeline: RwLock::new(Arc::new(Pipeline::new())),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pre-declares the number of indices that will reach this stage.
    /// Must be called before the first `push`.
    pub fn set_task_count(&self, n: usize) {
        self.pool.set_task_count(n);
    }

    /// Submits `index`; blocks if the stage's queue is at capacity.
    pub fn push(&self, index: usize) {
        let wrapper = build_wrapper(
            self.func.clone(),
            Arc::clone(&self.name),
            self.pipeline(),
            self.next.lock().clone(),
            index,
        );
        self.pool.push(wrapper);
    }

    /// Blocks until this stage drains, then raises the shared pipeline's
    /// aggregated failure, if any. Idempotent once drained.
    pub fn wait(&self) -> Result<(), PipelineFailure> {
        self.pool.wait();
        let pipeline = self.pipeline();
        match pipeline.drain_failure() {
            Some(failure) => {
                stagepipe_log::warn!(
                    "stage '{}' drained with {} failure(s)",
                    self.name,
                    pipeline.len()
                );
                Err(failure)
            }
            None => {
                stagepipe_log::debug!("stage '{}' drained cleanly", self.name);
                Ok(())
            }
        }
    }
}

impl StageNode for Stage {
    fn push_index(&self, index: usize) {
        self.push(index);
    }

    fn pipeline(&self) -> Arc<Pipeline> {
        self.pipeline.read().clone()
    }

    fn set_pipeline(&self, pipeline: Arc<Pipeline>) {
        *self.pipeline.write() = pipeline;
    }

    fn set_next(&self, next: Arc<dyn StageNode>) {
        *self.next.lock() = Some(next);
    }

    fn next_node(&self) -> Option<Arc<dyn StageNode>> {
        self.next.lock().clone()
    }
}
