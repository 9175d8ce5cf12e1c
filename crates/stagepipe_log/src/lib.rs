//! Logging for the stagepipe engine.
//!
//! Thin wrapper around the `log` facade. Core crates depend on this crate
//! rather than on `log` directly so the timing/tracing macros are always
//! available alongside the plain level macros.

pub use log::{debug, error, info, trace, warn};

mod macros;
