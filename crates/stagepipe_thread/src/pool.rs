//! `WorkerPool`: N background worker threads draining a shared bounded
//! queue, with pre-declared task counting and sentinel-based shutdown.
//!
//! Grounded in the reference engine's thread pool: a `catch_unwind` wraps
//! every task execution so a panicking task cannot strand the pool, and
//! shutdown is signalled by pushing one terminate instruction per worker
//! rather than relying on a shared flag workers might miss.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::error::PoolError;
use crate::queue::BoundedQueue;

/// A unit of work accepted by a pool: an opaque, already-wrapped closure.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// What a worker pops off the queue: either real work or the shutdown signal.
pub(crate) enum Instruction {
    Execute(Task),
    Stop,
}

/// Shared task-count bookkeeping and completion signalling for a pool.
///
/// `remaining` is a plain integer guarded by a mutex rather than an atomic,
/// so that the decrement-to-zero check and the condvar wait never race.
pub(crate) struct CompletionState {
    remaining: Mutex<usize>,
    condvar: Condvar,
    stopped: AtomicBool,
}

impl CompletionState {
    fn new() -> Self {
        Self {
            remaining: Mutex::new(0),
            condvar: Condvar::new(),
            stopped: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_task_count(&self, n: usize) {
        *self.remaining.lock() = n;
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Decrements the outstanding count for one finished task. If this was
    /// the last one, flips `stopped` and pushes exactly `num_workers`
    /// `Stop` instructions while still holding the completion lock.
    ///
    /// Pushing into `queue` here is the one place a lock is held across
    /// another lock's acquisition, deliberately: by the time `remaining`
    /// reaches zero every producer has already finished pushing, so the
    /// queue cannot stay full forever and this cannot deadlock.
    pub(crate) fn task_finished(&self, queue: &BoundedQueue<Instruction>, num_workers: usize) {
        let mut remaining = self.remaining.lock();
        *remaining -= 1;
        if *remaining == 0 {
            self.stopped.store(true, Ordering::Release);
            for _ in 0..num_workers {
                queue.push(Instruction::Stop);
            }
        }
        self.condvar.notify_all();
    }

    pub(crate) fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining != 0 {
            self.condvar.wait(&mut remaining);
        }
    }
}

/// Owns N worker threads pulling from a shared bounded queue.
///
/// Single-use: a pool is driven through configuring → running → drained
/// exactly once and is not restartable, matching the single-use lifecycle
/// of the task-counting pool this is modelled on.
pub struct WorkerPool {
    name: String,
    queue: Arc<BoundedQueue<Instruction>>,
    progress: Arc<CompletionState>,
    num_workers: usize,
    workers: Mutex<Option<Vec<JoinHandle<()>>>>,
}

impl WorkerPool {
    /// Spawns `num_workers` threads draining a fresh bounded queue of the
    /// given capacity.
    pub fn new(
        name: impl Into<String>,
        num_workers: usize,
        capacity: usize,
    ) -> Result<Self, PoolError> {
        assert!(num_workers >= 1, "worker pools need at least one worker");
        let name = name.into();
        let queue = Arc::new(BoundedQueue::new(capacity));
        let progress = Arc::new(CompletionState::new());

        stagepipe_log::debug!(
            "spawning worker pool '{name}' with {num_workers} worker(s)"
        );

        let mut workers = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let queue = Arc::clone(&queue);
            let progress = Arc::clone(&progress);
            let stage_name = name.clone();
            let handle = thread::Builder::new()
                .name(format!("stagepipe-{name}-{worker_id}"))
                .spawn(move || worker_loop(&stage_name, queue, progress, num_workers))
                .map_err(PoolError::ThreadSpawnFailed)?;
            workers.push(handle);
        }

        Ok(Self {
            name,
            queue,
            progress,
            num_workers,
            workers: Mutex::new(Some(workers)),
        })
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// True once the outstanding task count has reached zero and shutdown
    /// sentinels have been pushed. Never transitions back to `false`.
    pub fn is_drained(&self) -> bool {
        self.progress.is_stopped()
    }

    /// Pre-declares the number of tasks that will be pushed to this pool.
    /// Must be called before the first `push`.
    pub fn set_task_count(&self, n: usize) {
        self.progress.set_task_count(n);
    }

    /// Submits a task; blocks if the underlying queue is at capacity.
    pub fn push(&self, task: Task) {
        self.queue.push(Instruction::Execute(task));
    }

    /// Blocks until the outstanding task count reaches zero, then joins
    /// every worker thread. Idempotent: a second call observes the count
    /// already at zero and the workers already joined, and returns at once.
    pub fn wait(&self) {
        self.progress.wait();
        if let Some(handles) = self.workers.lock().take() {
            stagepipe_log::debug!("worker pool '{}' drained, joining workers", self.name);
            for worker in handles {
                let _ = worker.join();
            }
        }
    }
}

pub(crate) fn worker_loop(
    stage_name: &str,
    queue: Arc<BoundedQueue<Instruction>>,
    progress: Arc<CompletionState>,
    num_workers: usize,
) {
    loop {
        let instruction = match queue.pop() {
            Some(instruction) => instruction,
            None => break,
        };
        match instruction {
            Instruction::Stop => break,
            Instruction::Execute(task) => {
                if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                    stagepipe_log::warn!(
                        "a task in worker pool '{stage_name}' panicked; pool continues"
                    );
                }
                progress.task_finished(&queue, num_workers);
            }
        }
    }
    stagepipe_log::debug!("worker in pool '{stage_name}' exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn new_pool(name: &str, num_workers: usize, capacity: usize) -> WorkerPool {
        WorkerPool::new(name, num_workers, capacity).unwrap()
    }

    #[test]
    fn every_pushed_task_runs_exactly_once() {
        let pool = new_pool("count", 4, 8);
        let counter = Arc::new(AtomicUsize::new(0));
        let total = 50;
        pool.set_task_count(total);
        for _ in 0..total {
            let counter = Arc::clone(&counter);
            pool.push(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.wait();
        assert_eq!(counter.load(Ordering::SeqCst), total);
    }

    #[test]
    fn panicking_task_does_not_stall_the_pool() {
        let pool = new_pool("panic", 2, 4);
        let completed = Arc::new(AtomicUsize::new(0));
        pool.set_task_count(5);
        for i in 0..5 {
            let completed = Arc::clone(&completed);
            pool.push(Box::new(move || {
                if i == 2 {
                    panic!("intentional test panic");
                }
                completed.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.wait();
        assert_eq!(completed.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn all_tasks_failing_still_drains() {
        let pool = new_pool("all-fail", 2, 8);
        pool.set_task_count(20);
        for _ in 0..20 {
            pool.push(Box::new(|| panic!("always fails")));
        }
        let start = std::time::Instant::now();
        pool.wait();
        assert!(start.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn single_worker_executes_in_push_order() {
        let pool = new_pool("order", 1, 8);
        let order = Arc::new(Mutex::new(Vec::new()));
        pool.set_task_count(10);
        for i in 0..10 {
            let order = Arc::clone(&order);
            pool.push(Box::new(move || {
                order.lock().push(i);
            }));
        }
        pool.wait();
        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    }
}
