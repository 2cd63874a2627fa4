//! Per-kind argument construction.

use crate::core::args::{
    ALLOW_DEPRECATED_SWITCH, COMPILE_ONLY_SWITCH, Invocation, RUN_SWITCH, is_sanitizer_switch,
};
use crate::core::types::TaskKind;

/// Facts about the resolved toolchain that influence argument lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArgContext {
    /// The run task uses a toolchain that honors sanitizer switches.
    pub run_honors_sanitizer: bool,
}

/// Build the argument list (excluding the program) for a task of `kind`.
///
/// `lint_template` is only consulted for [`TaskKind::Lint`].
pub fn build_task_args(
    kind: TaskKind,
    invocation: &Invocation,
    lint_template: &[String],
    ctx: ArgContext,
) -> Vec<String> {
    match kind {
        TaskKind::Check => check_args(invocation),
        TaskKind::Run => run_args(invocation, ctx),
        TaskKind::Lint => lint_args(invocation, lint_template),
    }
}

fn check_args(invocation: &Invocation) -> Vec<String> {
    let mut args: Vec<String> = invocation
        .args()
        .iter()
        .filter(|arg| *arg != RUN_SWITCH && !is_sanitizer_switch(arg))
        .cloned()
        .collect();
    args.push(COMPILE_ONLY_SWITCH.to_string());
    args
}

// Added switches go first: everything after the source that follows `-run`
// belongs to the executed program.
fn run_args(invocation: &Invocation, ctx: ArgContext) -> Vec<String> {
    let mut args = vec![ALLOW_DEPRECATED_SWITCH.to_string()];
    args.extend(
        invocation
            .args()
            .iter()
            .filter(|arg| ctx.run_honors_sanitizer || !is_sanitizer_switch(arg))
            .cloned(),
    );
    args
}

fn lint_args(invocation: &Invocation, template: &[String]) -> Vec<String> {
    let mut args = template.to_vec();
    args.extend(invocation.import_dirs().map(str::to_string));
    args.extend(invocation.sources().map(str::to_string));
    args
}
