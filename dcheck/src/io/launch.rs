//! Task launching: executable resolution, environment, and spawn.
//!
//! The [`TaskLauncher`] trait decouples the pipeline from real subprocesses.
//! Tests use a scripted launcher that returns predetermined outputs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument};

use crate::core::args::Invocation;
use crate::core::planner::NESTED_MARKER_ENV;
use crate::core::task_args::{ArgContext, build_task_args};
use crate::core::types::{RedirectionMode, TaskKind};
use crate::io::config::{HarnessConfig, ToolConfig};
use crate::io::process::{RunningChild, TaskOutput, spawn_child};
use crate::io::resolver::ExecutableResolver;

/// Library-preload variable used to inject the allocator.
pub const PRELOAD_ENV: &str = "LD_PRELOAD";

/// A fully resolved launch request for one eligible task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub kind: TaskKind,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    /// Variables added to the inherited environment for this child only.
    pub env: BTreeMap<String, String>,
    pub redirect: RedirectionMode,
}

/// Executables resolved for this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub check: Option<PathBuf>,
    pub run: Option<PathBuf>,
    /// `run` is the sanitizer toolchain and keeps `-fsanitize=` switches.
    pub run_honors_sanitizer: bool,
    pub linter: Option<PathBuf>,
}

impl Toolchain {
    pub fn resolve(
        resolver: &ExecutableResolver,
        tools: &ToolConfig,
        invocation: &Invocation,
    ) -> Self {
        let sanitized = invocation
            .requests_sanitizer()
            .then(|| resolver.resolve(&tools.sanitizer))
            .flatten();
        let run_honors_sanitizer = sanitized.is_some();
        let run = sanitized.or_else(|| resolver.resolve_first(tools.run.as_slice()));
        Self {
            check: resolver.resolve_first(tools.check.as_slice()),
            run,
            run_honors_sanitizer,
            linter: resolver.resolve(&tools.linter),
        }
    }

    fn program(&self, kind: TaskKind, tools: &ToolConfig) -> Result<PathBuf> {
        let (found, tried) = match kind {
            TaskKind::Check => (&self.check, tools.check.join(", ")),
            TaskKind::Run => (&self.run, tools.run.join(", ")),
            TaskKind::Lint => (&self.linter, tools.linter.clone()),
        };
        found.clone().ok_or_else(|| {
            anyhow!("no executable for {kind} task on the search path (tried {tried})")
        })
    }
}

/// Environment additions for a task of `kind`.
///
/// Every child is marked as running under the harness. Compiler tasks also get
/// the allocator preloaded when the library exists.
pub fn task_env(kind: TaskKind, allocator: &Path) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert(NESTED_MARKER_ENV.to_string(), "1".to_string());
    if kind != TaskKind::Lint && allocator.is_file() {
        env.insert(
            PRELOAD_ENV.to_string(),
            allocator.to_string_lossy().into_owned(),
        );
    }
    env
}

/// Build the launch request for one eligible task.
pub fn build_spec(
    kind: TaskKind,
    invocation: &Invocation,
    toolchain: &Toolchain,
    config: &HarnessConfig,
    workdir: &Path,
    redirect: RedirectionMode,
) -> Result<TaskSpec> {
    let program = toolchain.program(kind, &config.tools)?;
    let ctx = ArgContext {
        run_honors_sanitizer: toolchain.run_honors_sanitizer,
    };
    Ok(TaskSpec {
        kind,
        program,
        args: build_task_args(kind, invocation, &config.lint.args, ctx),
        workdir: workdir.to_path_buf(),
        env: task_env(kind, &config.allocator_preload),
        redirect,
    })
}

/// Abstraction over how tasks are started.
pub trait TaskLauncher {
    type Handle: TaskHandle;

    fn launch(&self, spec: &TaskSpec) -> Result<Self::Handle>;
}

/// A started task that can be waited on exactly once.
pub trait TaskHandle {
    fn wait(self) -> Result<TaskOutput>;
}

/// Launcher that spawns real subprocesses.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    pub output_limit_bytes: usize,
}

impl TaskLauncher for ProcessLauncher {
    type Handle = RunningChild;

    #[instrument(skip_all, fields(kind = %spec.kind, program = %spec.program.display()))]
    fn launch(&self, spec: &TaskSpec) -> Result<RunningChild> {
        info!(args = ?spec.args, "launching task");
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.workdir)
            .envs(&spec.env);
        debug!(env = ?spec.env, "task environment");
        spawn_child(cmd, spec.redirect, self.output_limit_bytes)
    }
}

impl TaskHandle for RunningChild {
    fn wait(self) -> Result<TaskOutput> {
        RunningChild::wait(self)
    }
}
