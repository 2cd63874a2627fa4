//! Exit codes the harness uses for its own failures.
//!
//! On success the process exits with the aggregate task status instead.

/// Every task succeeded (or only advisory lint findings were reported).
pub const OK: i32 = 0;
/// The harness could not plan or launch its tasks (recursive invocation,
/// missing compiler, invalid config, spawn failure).
pub const FATAL: i32 = 1;
