//! `ForegroundRunner`: the N=1 worker-pool equivalent whose worker loop
//! runs on the caller's thread via an explicit `run()` call, for stages
//! that must execute on a nominated thread (a GPU context, a UI toolkit).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::pool::{worker_loop, CompletionState, Instruction, Task};
use crate::queue::BoundedQueue;

pub struct ForegroundRunner {
    name: String,
    queue: Arc<BoundedQueue<Instruction>>,
    progress: Arc<CompletionState>,
    has_run: AtomicBool,
}

impl ForegroundRunner {
    /// Creates a runner backed by a fresh bounded queue of the given capacity.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let name = name.into();
        stagepipe_log::debug!("creating foreground runner '{name}'");
        Self {
            name,
            queue: Arc::new(BoundedQueue::new(capacity)),
            progress: Arc::new(CompletionState::new()),
            has_run: AtomicBool::new(false),
        }
    }

    /// Pre-declares the number of tasks that will be pushed to this runner.
    /// Must be called before the first `push`.
    pub fn set_task_count(&self, n: usize) {
        self.progress.set_task_count(n);
    }

    /// Submits a task from any thread; blocks if the queue is at capacity.
    pub fn push(&self, task: Task) {
        self.queue.push(Instruction::Execute(task));
    }

    /// Runs the worker loop synchronously on the calling thread until the
    /// outstanding task count reaches zero. Idempotent: once drained, a
    /// second call returns immediately without popping from the queue again.
    pub fn run(&self) {
        if self.has_run.swap(true, Ordering::AcqRel) {
            self.progress.wait();
            return;
        }
        worker_loop(&self.name, Arc::clone(&self.queue), Arc::clone(&self.progress), 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn run_executes_every_pushed_task_on_the_calling_thread() {
        let runner = ForegroundRunner::new("gpu", 8);
        let counter = Arc::new(AtomicUsize::new(0));
        runner.set_task_count(8);
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            runner.push(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        runner.run();
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn run_is_idempotent_after_drain() {
        let runner = ForegroundRunner::new("gpu", 4);
        runner.set_task_count(1);
        runner.push(Box::new(|| {}));
        runner.run();
        runner.run();
    }
}
