//! Orchestration harness that runs a D compiler check, a unit-test run and a
//! style linter against the same compiler invocation.
//!
//! The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (classification, planning,
//!   argument construction, status aggregation, listing parsing). No I/O.
//! - **[`io`]**: Side-effecting operations (config, tool lookup, process
//!   spawning, listing files). Isolated behind traits where tests need fakes.
//!
//! [`pipeline`] coordinates core logic with I/O for one invocation.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
