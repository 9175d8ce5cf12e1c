//! A staged, bounded, fault-tolerant task pipeline.
//!
//! Producers push integer indices into the first [`Stage`]; each stage
//! applies a user-supplied function to the index and forwards the same
//! index to the next stage regardless of whether the function succeeded.
//! Stages run on bounded worker pools that backpressure producers at
//! capacity; one stage may instead be a [`StageForeground`] whose single
//! worker runs on the caller's thread. Failures across a [`chain`]ed
//! sequence of stages accumulate in a shared [`Pipeline`] and surface as a
//! single aggregated [`PipelineFailure`] when the terminal stage drains.

mod error;
mod pipeline;
mod stage;
mod stage_foreground;
mod stage_node;
mod task;

pub use error::{PipelineFailure, TaskFailure};
pub use pipeline::{FailureEntry, Pipeline};
pub use stage::Stage;
pub use stage_foreground::StageForeground;
pub use stage_node::{chain, StageNode};

pub use stagepipe_thread::{PoolError, QueueError};
