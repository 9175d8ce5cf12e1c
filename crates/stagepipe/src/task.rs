//! The wrapper-closure machinery shared by `Stage` and `StageForeground`:
//! converting a user function's typed error into a `TaskFailure`, catching
//! panics at the stage boundary, and unconditionally forwarding the index
//! downstream regardless of outcome.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::TaskFailure;
use crate::pipeline::Pipeline;
use crate::stage_node::StageNode;

/// The stage's user function, type-erased to a uniform signature so stages
/// with unrelated error types can be linked into one chain.
pub(crate) type TaskFn = Arc<dyn Fn(usize) -> Result<(), TaskFailure> + Send + Sync>;

/// Wraps a user function returning `Result<(), E>` into the uniform
/// `TaskFn` signature, capturing `E`'s type name once at construction time
/// (by the time the function runs, only the erased `TaskFailure` remains).
pub(crate) fn wrap_user_func<F, E>(func: F) -> TaskFn
where
    F: Fn(usize) -> Result<(), E> + Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let type_name = std::any::type_name::<E>();
    Arc::new(move |index| func(index).map_err(|error| TaskFailure::from_error(type_name, error)))
}

/// Calls `func(index)`, converting both a returned `Err` and a caught panic
/// into a `TaskFailure`. Nothing escapes this call as an unwind.
fn invoke_and_capture(
    func: &(dyn Fn(usize) -> Result<(), TaskFailure> + Send + Sync),
    index: usize,
) -> Result<(), TaskFailure> {
    match panic::catch_unwind(AssertUnwindSafe(|| func(index))) {
        Ok(result) => result,
        Err(payload) => Err(TaskFailure::from_panic(payload)),
    }
}

/// Builds the per-index closure pushed onto a stage's underlying queue:
/// run the user function, record any failure into the shared pipeline, and
/// unconditionally forward the index to `next` so downstream counters stay
/// correct on both success and failure.
pub(crate) fn build_wrapper(
    func: TaskFn,
    stage_name: Arc<str>,
    pipeline: Arc<Pipeline>,
    next: Option<Arc<dyn StageNode>>,
    index: usize,
) -> stagepipe_thread::Task {
    Box::new(move || {
        if let Err(failure) = invoke_and_capture(func.as_ref(), index) {
            stagepipe_log::warn!("stage '{stage_name}' task {index} failed: {failure}");
            pipeline.record(&stage_name, index, failure);
        }
        if let Some(next) = next {
            next.push_index(index);
        }
    })
}
