//! Exit-status aggregation across the three tasks.

/// Lint status when the linter crashed with SIGSEGV (`128 + 11`).
pub const LINT_SEGFAULT: i32 = 139;
/// Lint status when it only reported style warnings.
pub const LINT_WARNINGS: i32 = 1;
/// Run status when a unit test assertion failed.
pub const RUN_ASSERTION_FAILURE: i32 = 1;

/// Final exit status of a pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateStatus(i32);

impl AggregateStatus {
    pub fn code(self) -> i32 {
        self.0
    }
}

/// Combine task statuses; ineligible tasks contribute 0.
///
/// Check wins over run, run over lint. Lint crashes and lint warnings are
/// advisory and never fail the pipeline.
pub fn aggregate(check: i32, run: i32, lint: i32) -> AggregateStatus {
    if check != 0 {
        return AggregateStatus(check);
    }
    if run != 0 {
        return AggregateStatus(run);
    }
    match lint {
        LINT_SEGFAULT | LINT_WARNINGS => AggregateStatus(0),
        other => AggregateStatus(other),
    }
}
