//! Deterministic, pure logic for the task pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (argument vectors, file text, captured output, exit statuses) and
//! return deterministic outputs suitable for tests.

pub mod args;
pub mod classifier;
pub mod lint_filter;
pub mod listing;
pub mod planner;
pub mod reconcile;
pub mod status;
pub mod task_args;
pub mod types;
