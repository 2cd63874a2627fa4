//! Test-only helpers: a scripted task launcher and a throwaway workspace.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::types::{RedirectionMode, TaskExit, TaskKind};
use crate::io::config::HarnessConfig;
use crate::io::launch::{TaskHandle, TaskLauncher, TaskSpec};
use crate::io::process::TaskOutput;
use crate::pipeline::PipelineRequest;

/// Predetermined behavior of one task.
#[derive(Debug, Clone)]
pub struct ScriptedTask {
    pub exit: TaskExit,
    pub stdout: String,
    pub stderr: String,
    /// Files written (relative to the task's workdir) when the task launches.
    pub files: Vec<(PathBuf, String)>,
}

impl ScriptedTask {
    pub fn exit(code: i32) -> Self {
        Self {
            exit: TaskExit::Code(code),
            stdout: String::new(),
            stderr: String::new(),
            files: Vec::new(),
        }
    }

    pub fn signal(signal: i32) -> Self {
        Self {
            exit: TaskExit::Signal(signal),
            ..Self::exit(0)
        }
    }

    pub fn stdout(mut self, text: &str) -> Self {
        self.stdout = text.to_string();
        self
    }

    pub fn stderr(mut self, text: &str) -> Self {
        self.stderr = text.to_string();
        self
    }

    pub fn writes(mut self, path: &str, contents: &str) -> Self {
        self.files.push((PathBuf::from(path), contents.to_string()));
        self
    }
}

/// Launcher that replays scripted tasks and records every spec it was given.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    tasks: BTreeMap<TaskKind, ScriptedTask>,
    launched: RefCell<Vec<TaskSpec>>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: TaskKind, task: ScriptedTask) -> Self {
        self.tasks.insert(kind, task);
        self
    }

    pub fn launched(&self) -> Vec<TaskSpec> {
        self.launched.borrow().clone()
    }

    pub fn launched_kinds(&self) -> Vec<TaskKind> {
        self.launched.borrow().iter().map(|spec| spec.kind).collect()
    }

    pub fn spec(&self, kind: TaskKind) -> Option<TaskSpec> {
        self.launched
            .borrow()
            .iter()
            .find(|spec| spec.kind == kind)
            .cloned()
    }
}

/// Handle for a scripted task; output is ready immediately.
#[derive(Debug)]
pub struct ScriptedHandle(TaskOutput);

impl TaskHandle for ScriptedHandle {
    fn wait(self) -> Result<TaskOutput> {
        Ok(self.0)
    }
}

impl TaskLauncher for ScriptedLauncher {
    type Handle = ScriptedHandle;

    fn launch(&self, spec: &TaskSpec) -> Result<ScriptedHandle> {
        self.launched.borrow_mut().push(spec.clone());
        let task = self
            .tasks
            .get(&spec.kind)
            .ok_or_else(|| anyhow!("no scripted task for {}", spec.kind))?;
        for (path, contents) in &task.files {
            let path = spec.workdir.join(path);
            fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        }
        // Inherited streams go straight to the terminal, never to the harness.
        let (stdout, stderr) = match spec.redirect {
            RedirectionMode::Capture => (
                task.stdout.clone().into_bytes(),
                task.stderr.clone().into_bytes(),
            ),
            RedirectionMode::Inherit => (Vec::new(), Vec::new()),
        };
        Ok(ScriptedHandle(TaskOutput {
            exit: task.exit,
            stdout,
            stderr,
            stdout_truncated: 0,
            stderr_truncated: 0,
        }))
    }
}

/// A temporary working directory plus a directory of placeholder tool binaries.
pub struct TestWorkspace {
    root: TempDir,
    tools: TempDir,
}

impl TestWorkspace {
    /// Create a workspace whose search path contains exactly `tools`.
    pub fn new(tools: &[&str]) -> Result<Self> {
        let root = tempfile::tempdir().context("create workspace dir")?;
        let tool_dir = tempfile::tempdir().context("create tool dir")?;
        for name in tools {
            let path = tool_dir.path().join(name);
            fs::write(&path, "").with_context(|| format!("write {}", path.display()))?;
        }
        Ok(Self {
            root,
            tools: tool_dir,
        })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn tool_dir(&self) -> &Path {
        self.tools.path()
    }

    /// Write a source file (parent dirs created) relative to the root.
    pub fn write_source(&self, rel: &str, text: &str) -> Result<PathBuf> {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, text).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    pub fn request(&self, args: &[&str]) -> PipelineRequest {
        PipelineRequest {
            root: self.root().to_path_buf(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            search_path: Some(self.tool_dir().as_os_str().to_owned()),
            nested: false,
        }
    }

    /// Default config with the allocator pointed at a path that never exists.
    pub fn config(&self) -> HarnessConfig {
        HarnessConfig {
            allocator_preload: self.root().join("no-such-allocator.so"),
            ..HarnessConfig::default()
        }
    }
}
