//! Threading primitives for the stagepipe engine: blocking bounded/unbounded
//! queues, a sentinel-shutdown worker pool, and a caller-thread foreground
//! runner. This crate knows nothing about stages or failure aggregation;
//! see the `stagepipe` crate for that layer.

pub mod error;
pub mod foreground;
pub mod pool;
pub mod queue;

pub use error::{PoolError, QueueError};
pub use foreground::ForegroundRunner;
pub use pool::{Task, WorkerPool};
pub use queue::{BoundedQueue, UnboundedQueue};
