//! `StageForeground`: a pipeline stage whose single worker runs on the
//! caller's thread via an explicit [`StageForeground::run`] call, for work
//! that must execute on a nominated thread (a GPU context, a UI toolkit).

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use stagepipe_thread::ForegroundRunner;

use crate::error::PipelineFailure;
use crate::pipeline::Pipeline;
use crate::stage_node::StageNode;
use crate::task::{build_wrapper, wrap_user_func, TaskFn};

pub struct StageForeground {
    name: Arc<str>,
    func: TaskFn,
    runner: ForegroundRunner,
    next: Mutex<Option<Arc<dyn StageNode>>>,
    pipeline: RwLock<Arc<Pipeline>>,
}

impl StageForeground {
    pub fn new<F, E>(name: impl Into<String>, capacity: usize, func: F) -> anyhow::Result<Arc<Self>>
    where
        F: Fn(usize) -> Result<(), E> + Send + Sync + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        anyhow::ensure!(capacity >= 1, "capacity must be at least 1");
        let name: Arc<str> = Arc::from(name.into());
        Ok(Arc::new(Self {
            runner: ForegroundRunner::new(name.as_ref(), capacity),
            name,
            func: wrap_user_func(func),
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
        self.runner.set_task_count(n);
    }

    /// Submits `index` from any thread; blocks if the queue is at capacity.
    pub fn push(&self, index: usize) {
        let wrapper = build_wrapper(
            self.func.clone(),
            Arc::clone(&self.name),
            self.pipeline(),
            self.next.lock().clone(),
            index,
        );
        self.runner.push(wrapper);
    }

    /// Runs this stage's worker loop synchronously on the calling thread
    /// until it drains, then raises the shared pipeline's aggregated
    /// failure, if any. Idempotent once drained.
    pub fn run(&self) -> Result<(), PipelineFailure> {
        self.runner.run();
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

impl StageNode for StageForeground {
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
