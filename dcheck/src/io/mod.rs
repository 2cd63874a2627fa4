//! Side-effecting helpers: configuration, tool lookup, processes, listings.

pub mod config;
pub mod coverage;
pub mod launch;
pub mod process;
pub mod resolver;
pub mod sources;
