//! Shared, mutex-guarded failure aggregation across a chain of stages.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{PipelineFailure, TaskFailure};

const MAX_SUMMARIZED_ENTRIES: usize = 5;

/// One recorded failure: which stage, which index, and what went wrong.
#[derive(Debug, Clone)]
pub struct FailureEntry {
    pub stage_name: String,
    pub index: usize,
    pub error: Arc<TaskFailure>,
}

/// The append-only, mutex-guarded list of failures shared by every stage in
/// a linked chain. Stages reachable through `next` after `chain` has run
/// share the *same* `Pipeline` instance (identity, not equality).
#[derive(Debug, Default)]
pub struct Pipeline {
    entries: Mutex<Vec<FailureEntry>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn record(&self, stage_name: &str, index: usize, error: TaskFailure) {
        self.entries.lock().push(FailureEntry {
            stage_name: stage_name.to_string(),
            index,
            error: Arc::new(error),
        });
    }

    pub fn has_failures(&self) -> bool {
        !self.entries.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots the recorded failures for programmatic inspection.
    pub fn entries(&self) -> Vec<FailureEntry> {
        self.entries.lock().clone()
    }

    fn summary(&self, entries: &[FailureEntry]) -> String {
        if entries.is_empty() {
            return "No failures".to_string();
        }
        let mut summary = format!("{} task(s) failed in pipeline:\n", entries.len());
        for entry in entries.iter().take(MAX_SUMMARIZED_ENTRIES) {
            summary.push_str(&format!(
                "  - Stage '{}', task {}: {}\n",
                entry.stage_name, entry.index, entry.error
            ));
        }
        if entries.len() > MAX_SUMMARIZED_ENTRIES {
            summary.push_str(&format!(
                "  ... and {} more errors\n",
                entries.len() - MAX_SUMMARIZED_ENTRIES
            ));
        }
        summary
    }

    /// If any failures were recorded, builds the single aggregated
    /// `PipelineFailure` raised at drain time, with the first recorded
    /// failure as its cause.
    pub(crate) fn drain_failure(&self) -> Option<PipelineFailure> {
        let entries = self.entries.lock().clone();
        let first = entries.first()?.error.clone();
        Some(PipelineFailure::new(self.summary(&entries), first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(message: &str) -> TaskFailure {
        TaskFailure::from_error("TestError", std::io::Error::other(message.to_string()))
    }

    #[test]
    fn empty_pipeline_has_no_failures() {
        let pipeline = Pipeline::new();
        assert!(!pipeline.has_failures());
        assert!(pipeline.drain_failure().is_none());
    }

    #[test]
    fn summary_truncates_after_five_and_counts_the_rest() {
        let pipeline = Pipeline::new();
        for i in 0..8 {
            pipeline.record("Stage", i, failure("boom"));
        }
        let failure = pipeline.drain_failure().unwrap();
        assert_eq!(pipeline.len(), 8);
        assert!(failure.summary().contains("8 task(s) failed"));
        assert!(failure.summary().contains("... and 3 more errors"));
    }

    #[test]
    fn cause_is_the_first_recorded_failure() {
        let pipeline = Pipeline::new();
        pipeline.record("Stage", 0, failure("first"));
        pipeline.record("Stage", 1, failure("second"));
        let failure = pipeline.drain_failure().unwrap();
        assert!(failure.summary().contains("task 0"));
    }
}
