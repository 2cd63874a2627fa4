//! Shared deterministic types for the task pipeline.

use std::fmt;

/// The three tool invocations the harness can orchestrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskKind {
    /// Compiler pass for diagnostics only.
    Check,
    /// Compiler pass that builds and executes the unit tests.
    Run,
    /// Style linter, advisory only.
    Lint,
}

impl TaskKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Run => "run",
            Self::Lint => "lint",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether a task's output streams are captured or shared with the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectionMode {
    Inherit,
    Capture,
}

/// How a task's process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskExit {
    Code(i32),
    Signal(i32),
}

impl TaskExit {
    /// Shell-style status integer: the exit code, or `128 + signal`.
    pub fn status(self) -> i32 {
        match self {
            Self::Code(code) => code,
            Self::Signal(signal) => 128 + signal,
        }
    }
}

/// Output stream a captured message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
        }
    }
}

/// A compiler-style diagnostic synthesized by the harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: String,
    /// 1-based line number, if the diagnostic points at a line.
    pub line: Option<usize>,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "{}({}): {}: {}",
                self.path,
                line,
                self.severity.label(),
                self.message
            ),
            None => write!(
                f,
                "{}: {}: {}",
                self.path,
                self.severity.label(),
                self.message
            ),
        }
    }
}
