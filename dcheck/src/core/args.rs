//! Splitting of the pass-through compiler argument vector.

use crate::core::classifier::{SWITCH_PREFIX, is_eligible_source_argument};

/// Compile, link and execute.
pub const RUN_SWITCH: &str = "-run";
/// Generate a stub entry point.
pub const ENTRY_POINT_SWITCH: &str = "-main";
/// Coverage instrumentation (`-cov`, `-cov=ctfe`, `-cov=90`, ...).
pub const COVERAGE_SWITCH: &str = "-cov";
/// Sanitizer request (`-fsanitize=address`, ...).
pub const SANITIZER_PREFIX: &str = "-fsanitize=";
/// Import directory with attached path.
pub const IMPORT_DIR_PREFIX: &str = "-I";
/// Type-check only, write no object or binary.
pub const COMPILE_ONLY_SWITCH: &str = "-o-";
/// Silently allow deprecated features.
pub const ALLOW_DEPRECATED_SWITCH: &str = "-d";

/// The harness's argument vector, classified but kept in its original order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invocation {
    args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// All arguments in their original order.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Arguments starting with the switch prefix.
    pub fn switches(&self) -> impl Iterator<Item = &str> {
        self.args
            .iter()
            .map(String::as_str)
            .filter(|arg| arg.starts_with(SWITCH_PREFIX))
    }

    /// `-I<dir>` switches, kept verbatim.
    pub fn import_dirs(&self) -> impl Iterator<Item = &str> {
        self.switches()
            .filter(|arg| arg.starts_with(IMPORT_DIR_PREFIX) && arg.len() > IMPORT_DIR_PREFIX.len())
    }

    /// Source file arguments.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.args
            .iter()
            .map(String::as_str)
            .filter(|arg| is_eligible_source_argument(arg))
    }

    /// Number of times `switch` appears verbatim.
    pub fn count_switch(&self, switch: &str) -> usize {
        self.args.iter().filter(|arg| *arg == switch).count()
    }

    pub fn requests_run(&self) -> bool {
        self.count_switch(RUN_SWITCH) > 0
    }

    pub fn requests_coverage(&self) -> bool {
        self.switches().any(is_coverage_switch)
    }

    pub fn requests_sanitizer(&self) -> bool {
        self.switches().any(is_sanitizer_switch)
    }
}

pub fn is_coverage_switch(arg: &str) -> bool {
    arg == COVERAGE_SWITCH || arg.starts_with("-cov=")
}

pub fn is_sanitizer_switch(arg: &str) -> bool {
    arg.starts_with(SANITIZER_PREFIX)
}
