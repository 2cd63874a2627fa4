//! Orchestration for a single `dcheck` invocation.
//!
//! Plans the tasks, launches every eligible one before waiting on any, then
//! waits in the fixed order check, lint, run. Output is forwarded as each task
//! finishes; coverage listings are only touched after run has exited.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::args::Invocation;
use crate::core::classifier::ClassifiedSource;
use crate::core::lint_filter::LintFilter;
use crate::core::planner::{PlanInputs, TaskPlan, plan_tasks};
use crate::core::reconcile::strip_duplicate_prefix;
use crate::core::status::{AggregateStatus, RUN_ASSERTION_FAILURE, aggregate};
use crate::core::types::{RedirectionMode, Stream, TaskKind};
use crate::io::config::HarnessConfig;
use crate::io::coverage::{cleanup_listings, process_coverage};
use crate::io::launch::{TaskHandle, TaskLauncher, TaskSpec, Toolchain, build_spec};
use crate::io::process::TaskOutput;
use crate::io::resolver::ExecutableResolver;
use crate::io::sources::classify_sources;

/// Everything the pipeline needs to know about its own process.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    /// Working directory for every task; listings are looked up here.
    pub root: PathBuf,
    /// Pass-through compiler arguments.
    pub args: Vec<String>,
    /// Value of the search-path variable used to resolve tools.
    pub search_path: Option<OsString>,
    /// The nesting marker was present in the harness environment.
    pub nested: bool,
}

/// Result of a completed pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub plan: TaskPlan,
    pub status: AggregateStatus,
    /// Stale listings deleted by the coverage cleanup pass.
    pub removed_listings: Vec<PathBuf>,
}

/// Run the check/run/lint pipeline and forward output to `out`/`err`.
#[instrument(skip_all, fields(root = %request.root.display(), args = request.args.len()))]
pub fn run_pipeline<L, O, E>(
    request: &PipelineRequest,
    config: &HarnessConfig,
    launcher: &L,
    out: &mut O,
    err: &mut E,
) -> Result<PipelineOutcome>
where
    L: TaskLauncher,
    O: Write,
    E: Write,
{
    let invocation = Invocation::new(request.args.iter().cloned());
    let resolver = ExecutableResolver::new(request.search_path.clone());
    let toolchain = Toolchain::resolve(&resolver, &config.tools, &invocation);
    let sources = classify_sources(&request.root, invocation.sources());

    let plan = plan_tasks(&PlanInputs {
        invocation: &invocation,
        sources: &sources,
        linter_available: toolchain.linter.is_some(),
        nested: request.nested,
    })?;
    info!(
        check = plan.check,
        run = plan.run,
        lint = plan.lint,
        redirect = ?plan.redirect,
        coverage = plan.coverage,
        "planned tasks"
    );
    let lint_filter = LintFilter::new(&config.lint.suppress)?;

    // Resolve every spec first so a missing executable aborts before any spawn.
    let spec_for = |kind: TaskKind| -> Result<Option<TaskSpec>> {
        if !plan.is_eligible(kind) {
            return Ok(None);
        }
        build_spec(
            kind,
            &invocation,
            &toolchain,
            config,
            &request.root,
            plan.redirect,
        )
        .map(Some)
    };
    let check_spec = spec_for(TaskKind::Check)?;
    let run_spec = spec_for(TaskKind::Run)?;
    let lint_spec = spec_for(TaskKind::Lint)?;

    let check = launch(launcher, check_spec.as_ref())?;
    let run = launch(launcher, run_spec.as_ref())?;
    let lint = launch(launcher, lint_spec.as_ref())?;

    let check_out = wait(TaskKind::Check, check)?;
    if let Some(output) = &check_out {
        forward_task(out, err, TaskKind::Check, output, &[], &[])?;
    }

    let lint_out = wait(TaskKind::Lint, lint)?;
    if let Some(output) = &lint_out {
        forward_lint(out, err, &lint_filter, output)?;
    }

    let run_out = wait(TaskKind::Run, run)?;
    if let Some(output) = &run_out {
        let (seen_stdout, seen_stderr) = match (&check_out, plan.redirect) {
            (Some(check), RedirectionMode::Capture) => {
                (check.stdout.as_slice(), check.stderr.as_slice())
            }
            _ => (&[][..], &[][..]),
        };
        forward_task(out, err, TaskKind::Run, output, seen_stdout, seen_stderr)?;
    }

    let run_status = status_of(&run_out);
    let mut removed_listings = Vec::new();
    if plan.coverage && run_status != RUN_ASSERTION_FAILURE {
        removed_listings = report_coverage(&request.root, &sources, err)?;
    } else if plan.coverage {
        debug!("run failed an assertion, skipping coverage");
    }

    out.flush().context("flush stdout")?;
    err.flush().context("flush stderr")?;

    let status = aggregate(status_of(&check_out), run_status, status_of(&lint_out));
    info!(status = status.code(), "pipeline finished");
    Ok(PipelineOutcome {
        plan,
        status,
        removed_listings,
    })
}

fn launch<L: TaskLauncher>(launcher: &L, spec: Option<&TaskSpec>) -> Result<Option<L::Handle>> {
    spec.map(|spec| {
        launcher
            .launch(spec)
            .with_context(|| format!("launch {} task", spec.kind))
    })
    .transpose()
}

fn wait<H: TaskHandle>(kind: TaskKind, handle: Option<H>) -> Result<Option<TaskOutput>> {
    let output = handle
        .map(|handle| handle.wait())
        .transpose()
        .with_context(|| format!("wait for {kind} task"))?;
    if let Some(output) = &output {
        debug!(%kind, status = output.exit.status(), "task exited");
    }
    Ok(output)
}

fn status_of(output: &Option<TaskOutput>) -> i32 {
    output.as_ref().map_or(0, |output| output.exit.status())
}

/// Write a task's captured streams, minus any prefix already shown.
fn forward_task<O: Write, E: Write>(
    out: &mut O,
    err: &mut E,
    kind: TaskKind,
    output: &TaskOutput,
    seen_stdout: &[u8],
    seen_stderr: &[u8],
) -> Result<()> {
    out.write_all(strip_duplicate_prefix(seen_stdout, &output.stdout))
        .context("write stdout")?;
    out.write_all(output.stdout_truncated_notice(kind.label()).as_bytes())
        .context("write stdout")?;
    err.write_all(strip_duplicate_prefix(seen_stderr, &output.stderr))
        .context("write stderr")?;
    err.write_all(output.stderr_truncated_notice(kind.label()).as_bytes())
        .context("write stderr")?;
    Ok(())
}

fn forward_lint<O: Write, E: Write>(
    out: &mut O,
    err: &mut E,
    filter: &LintFilter,
    output: &TaskOutput,
) -> Result<()> {
    for message in filter.filter(&output.stdout, &output.stderr) {
        match message.stream {
            Stream::Stdout => out.write_all(message.text.as_bytes()).context("write stdout")?,
            Stream::Stderr => err.write_all(message.text.as_bytes()).context("write stderr")?,
        }
    }
    Ok(())
}

fn report_coverage<E: Write>(
    root: &Path,
    sources: &[ClassifiedSource],
    err: &mut E,
) -> Result<Vec<PathBuf>> {
    let report = process_coverage(root, sources);
    for diagnostic in &report.diagnostics {
        writeln!(err, "{diagnostic}").context("write coverage diagnostic")?;
    }
    match cleanup_listings(root, report.last_listing.as_deref()) {
        Ok(removed) => Ok(removed),
        Err(cleanup_err) => {
            warn!(err = %format!("{cleanup_err:#}"), "listing cleanup failed");
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedLauncher, ScriptedTask, TestWorkspace};

    fn run(
        ws: &TestWorkspace,
        args: &[&str],
        launcher: &ScriptedLauncher,
    ) -> (PipelineOutcome, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let outcome = run_pipeline(
            &ws.request(args),
            &ws.config(),
            launcher,
            &mut out,
            &mut err,
        )
        .expect("pipeline");
        (
            outcome,
            String::from_utf8(out).expect("utf8"),
            String::from_utf8(err).expect("utf8"),
        )
    }

    #[test]
    fn check_only_status_is_check_status() {
        let ws = TestWorkspace::new(&["dmd"]).expect("workspace");
        ws.write_source("app.d", "void main() {}\nunittest {}\n")
            .expect("source");
        let launcher = ScriptedLauncher::new().with(
            TaskKind::Check,
            ScriptedTask::exit(2).stderr("app.d(1): Error: x\n"),
        );

        let (outcome, _, err) = run(&ws, &["-unittest", "-run", "app.d"], &launcher);
        assert!(!outcome.plan.run);
        assert_eq!(outcome.plan.redirect, RedirectionMode::Inherit);
        assert_eq!(outcome.status.code(), 2);
        assert_eq!(launcher.launched_kinds(), vec![TaskKind::Check]);
        // Inherited output is not re-forwarded by the harness.
        assert!(err.is_empty());
    }

    #[test]
    fn run_output_is_deduplicated_against_check() {
        let ws = TestWorkspace::new(&["dmd"]).expect("workspace");
        ws.write_source("lib.d", "unittest { assert(true); }\n")
            .expect("source");
        let launcher = ScriptedLauncher::new()
            .with(TaskKind::Check, ScriptedTask::exit(0).stderr("A\nB\n"))
            .with(
                TaskKind::Run,
                ScriptedTask::exit(0)
                    .stderr("A\nB\nC\n")
                    .stdout("1 modules passed\n"),
            );

        let (outcome, out, err) = run(&ws, &["-unittest", "-main", "-run", "lib.d"], &launcher);
        assert!(outcome.plan.run);
        assert_eq!(outcome.plan.redirect, RedirectionMode::Capture);
        assert_eq!(err, "A\nB\nC\n");
        assert_eq!(out, "1 modules passed\n");
        assert_eq!(outcome.status.code(), 0);
    }

    #[test]
    fn lint_noise_is_filtered_and_warning_status_ignored() {
        let ws = TestWorkspace::new(&["dmd", "dscanner"]).expect("workspace");
        ws.write_source("lib.d", "int f() { return 1; }\n")
            .expect("source");
        let launcher = ScriptedLauncher::new()
            .with(TaskKind::Check, ScriptedTask::exit(0))
            .with(
                TaskKind::Lint,
                ScriptedTask::exit(1).stdout(
                    "lib.d(1:5)[warn]: Public declaration 'f' is undocumented.\nlib.d(1:1)[warn]: Variable x is never used.\n",
                ),
            );

        let (outcome, out, _) = run(&ws, &["lib.d"], &launcher);
        assert!(outcome.plan.lint);
        assert_eq!(out, "lib.d(1:1)[warn]: Variable x is never used.\n");
        assert_eq!(outcome.status.code(), 0);
    }

    #[test]
    fn lint_segfault_is_ignored_but_other_failures_surface() {
        let ws = TestWorkspace::new(&["dmd", "dscanner"]).expect("workspace");
        ws.write_source("lib.d", "int f();\n").expect("source");

        let crashed = ScriptedLauncher::new()
            .with(TaskKind::Check, ScriptedTask::exit(0))
            .with(TaskKind::Lint, ScriptedTask::signal(11));
        assert_eq!(run(&ws, &["lib.d"], &crashed).0.status.code(), 0);

        let broken = ScriptedLauncher::new()
            .with(TaskKind::Check, ScriptedTask::exit(0))
            .with(TaskKind::Lint, ScriptedTask::exit(9));
        assert_eq!(run(&ws, &["lib.d"], &broken).0.status.code(), 9);
    }

    #[test]
    fn coverage_reports_uncovered_lines_and_cleans_up() {
        let ws = TestWorkspace::new(&["dmd"]).expect("workspace");
        ws.write_source("src/lib.d", "int f() { return 1; }\nunittest { }\n")
            .expect("source");
        let launcher = ScriptedLauncher::new()
            .with(TaskKind::Check, ScriptedTask::exit(0))
            .with(
                TaskKind::Run,
                ScriptedTask::exit(0)
                    .writes(
                        "src-lib.lst",
                        "0000000|int f() { return 1; }\n      1|unittest { }\nsrc/lib.d is 50% covered\n",
                    )
                    .writes("__main.lst", ""),
            );

        let (outcome, _, err) = run(
            &ws,
            &["-unittest", "-cov", "-main", "-run", "src/lib.d"],
            &launcher,
        );
        assert!(outcome.plan.coverage);
        assert_eq!(err, "src/lib.d(1): Warning: line not covered by tests\n");
        assert_eq!(
            outcome.removed_listings,
            vec![ws.root().join("__main.lst"), ws.root().join("src-lib.lst")]
        );
    }

    #[test]
    fn assertion_failure_skips_coverage() {
        let ws = TestWorkspace::new(&["dmd"]).expect("workspace");
        ws.write_source("lib.d", "unittest { assert(false); }\n")
            .expect("source");
        let launcher = ScriptedLauncher::new()
            .with(TaskKind::Check, ScriptedTask::exit(0))
            .with(
                TaskKind::Run,
                ScriptedTask::exit(1).writes("lib.lst", "0000000|unittest\n"),
            );

        let (outcome, _, err) = run(&ws, &["-cov", "-run", "lib.d"], &launcher);
        assert_eq!(outcome.status.code(), 1);
        assert!(outcome.removed_listings.is_empty());
        assert!(err.is_empty());
        assert!(ws.root().join("lib.lst").exists());
    }

    #[test]
    fn nested_invocation_launches_nothing() {
        let ws = TestWorkspace::new(&["dmd"]).expect("workspace");
        let launcher = ScriptedLauncher::new().with(TaskKind::Check, ScriptedTask::exit(0));
        let mut request = ws.request(&["a.d"]);
        request.nested = true;

        let err = run_pipeline(
            &request,
            &ws.config(),
            &launcher,
            &mut Vec::new(),
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("refusing to run"));
        assert!(launcher.launched_kinds().is_empty());
    }

    #[test]
    fn missing_compiler_is_fatal_before_spawn() {
        let ws = TestWorkspace::new(&[]).expect("workspace");
        let launcher = ScriptedLauncher::new();
        let err = run_pipeline(
            &ws.request(&["a.d"]),
            &ws.config(),
            &launcher,
            &mut Vec::new(),
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no executable for check task"));
        assert!(launcher.launched_kinds().is_empty());
    }

    #[test]
    fn signal_exit_from_run_surfaces_as_shell_status() {
        let ws = TestWorkspace::new(&["dmd"]).expect("workspace");
        ws.write_source("lib.d", "unittest { }\n").expect("source");
        let launcher = ScriptedLauncher::new()
            .with(TaskKind::Check, ScriptedTask::exit(0))
            .with(TaskKind::Run, ScriptedTask::signal(6));

        let (outcome, _, _) = run(&ws, &["-run", "lib.d"], &launcher);
        assert_eq!(outcome.status.code(), 134);
    }
}
