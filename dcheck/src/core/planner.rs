//! Task eligibility and redirection planning.
//!
//! Planning is pure: it sees the parsed invocation, the classified sources and
//! a few facts about the environment, and decides which tasks run and how.

use anyhow::{Result, bail};

use crate::core::args::{ENTRY_POINT_SWITCH, Invocation, RUN_SWITCH};
use crate::core::classifier::ClassifiedSource;
use crate::core::types::{RedirectionMode, TaskKind};

/// Environment variable set on every child so a nested harness can refuse to run.
pub const NESTED_MARKER_ENV: &str = "DCHECK_ACTIVE";

/// Inputs to [`plan_tasks`].
#[derive(Debug, Clone)]
pub struct PlanInputs<'a> {
    pub invocation: &'a Invocation,
    pub sources: &'a [ClassifiedSource],
    /// A linter executable was found on the search path.
    pub linter_available: bool,
    /// The harness is itself running as a child of another harness.
    pub nested: bool,
}

/// Which tasks run, and how their output is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPlan {
    pub check: bool,
    pub run: bool,
    pub lint: bool,
    pub redirect: RedirectionMode,
    /// Coverage listings should be inspected after the run task.
    pub coverage: bool,
}

impl TaskPlan {
    pub fn is_eligible(&self, kind: TaskKind) -> bool {
        match kind {
            TaskKind::Check => self.check,
            TaskKind::Run => self.run,
            TaskKind::Lint => self.lint,
        }
    }

    pub fn eligible_count(&self) -> usize {
        [self.check, self.run, self.lint]
            .iter()
            .filter(|eligible| **eligible)
            .count()
    }
}

/// Decide task eligibility. Fails on a suspected recursive invocation.
pub fn plan_tasks(inputs: &PlanInputs<'_>) -> Result<TaskPlan> {
    if inputs.nested {
        bail!(
            "refusing to run: {NESTED_MARKER_ENV} is set, dcheck appears to be invoking itself"
        );
    }
    for switch in [RUN_SWITCH, ENTRY_POINT_SWITCH] {
        let count = inputs.invocation.count_switch(switch);
        if count > 1 {
            bail!(
                "refusing to run: `{switch}` given {count} times, possible recursive invocation"
            );
        }
    }

    let run = inputs.invocation.requests_run()
        && !inputs.sources.is_empty()
        && !inputs
            .sources
            .iter()
            .any(|source| source.facts.blocks_test_run());
    let check = true;
    let lint = inputs.linter_available && (check || run);

    let mut plan = TaskPlan {
        check,
        run,
        lint,
        redirect: RedirectionMode::Inherit,
        coverage: run && inputs.invocation.requests_coverage(),
    };
    if plan.eligible_count() >= 2 {
        plan.redirect = RedirectionMode::Capture;
    }
    Ok(plan)
}
