//! Per-task and aggregated pipeline failure types.
//!
//! `TaskFailure` is the per-index payload recorded into a `Pipeline`.
//! `PipelineFailure` is the single error raised by `Stage::wait`/`run` when
//! the shared pipeline has recorded any failures, per the error-handling
//! design's propagation policy: task errors are collected, never raised at
//! the call site, and surfaced once at drain with the first failure chained
//! as the cause.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// A single task's recorded failure: either a returned error or a caught
/// panic, type-erased so stages with unrelated error types can share one
/// pipeline.
#[derive(Debug)]
pub struct TaskFailure {
    type_name: &'static str,
    message: String,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl TaskFailure {
    pub(crate) fn from_error<E>(type_name: &'static str, error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let message = error.to_string();
        Self {
            type_name,
            message,
            source: Some(Box::new(error)),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked with a non-string payload".to_string()
        };
        Self {
            type_name: "panic",
            message,
            source: None,
        }
    }

    /// The error's type name (`"panic"` for a caught panic).
    pub fn kind(&self) -> &str {
        self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

impl StdError for TaskFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

/// Raised by `Stage::wait`/`StageForeground::run` when the shared pipeline
/// recorded at least one failure. `Display` renders the summary (count plus
/// up to the first five entries); `source()` is the first recorded failure.
#[derive(Debug)]
pub struct PipelineFailure {
    summary: String,
    cause: Arc<TaskFailure>,
}

impl PipelineFailure {
    pub(crate) fn new(summary: String, cause: Arc<TaskFailure>) -> Self {
        Self { summary, cause }
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)
    }
}

impl StdError for PipelineFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.cause.as_ref())
    }
}
