//! Harness configuration stored in `.dcheck.toml` (or `$DCHECK_CONFIG`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::lint_filter::LintFilter;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "DCHECK_CONFIG";
/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".dcheck.toml";

/// Harness configuration (TOML).
///
/// Missing fields default to the stock D toolchain layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Shared allocator injected via `LD_PRELOAD` into check and run when present.
    pub allocator_preload: PathBuf,

    /// Keep at most this many bytes of each captured stream.
    pub output_limit_bytes: usize,

    pub tools: ToolConfig,

    pub lint: LintConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolConfig {
    /// Compilers for the check task, most preferred first.
    pub check: Vec<String>,
    /// Compilers for the run task, most preferred first.
    pub run: Vec<String>,
    /// Compiler used for runs that request a sanitizer.
    pub sanitizer: String,
    pub linter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LintConfig {
    /// Linter arguments placed before import dirs and sources.
    pub args: Vec<String>,
    /// Regular expressions; matching `[warn]` lines are dropped.
    pub suppress: Vec<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            check: vec!["dmd".to_string(), "ldmd2".to_string()],
            run: vec!["dmd".to_string(), "ldmd2".to_string()],
            sanitizer: "ldmd2".to_string(),
            linter: "dscanner".to_string(),
        }
    }
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            args: vec!["--styleCheck".to_string()],
            suppress: vec![
                r"is undocumented".to_string(),
                r"Line is longer than \d+ characters".to_string(),
                r"does not match style guidelines".to_string(),
            ],
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            allocator_preload: PathBuf::from("/usr/lib/x86_64-linux-gnu/libmimalloc.so"),
            output_limit_bytes: 16 * 1024 * 1024,
            tools: ToolConfig::default(),
            lint: LintConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.tools.check.is_empty() || self.tools.check.iter().any(|t| t.trim().is_empty()) {
            return Err(anyhow!("tools.check must be a non-empty array of names"));
        }
        if self.tools.run.is_empty() || self.tools.run.iter().any(|t| t.trim().is_empty()) {
            return Err(anyhow!("tools.run must be a non-empty array of names"));
        }
        if self.tools.sanitizer.trim().is_empty() {
            return Err(anyhow!("tools.sanitizer must not be empty"));
        }
        if self.tools.linter.trim().is_empty() {
            return Err(anyhow!("tools.linter must not be empty"));
        }
        LintFilter::new(&self.lint.suppress).context("lint.suppress")?;
        Ok(())
    }
}

/// Config path: `$DCHECK_CONFIG` if set, else `.dcheck.toml` under `root`.
pub fn config_path(root: &Path, env_override: Option<PathBuf>) -> PathBuf {
    env_override.unwrap_or_else(|| root.join(DEFAULT_CONFIG_FILE))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, HarnessConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("dcheck.toml");
        fs::write(&path, "[tools]\nlinter = \"dscanner-nightly\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.tools.linter, "dscanner-nightly");
        assert_eq!(cfg.tools.check, ToolConfig::default().check);
        assert_eq!(cfg.lint, LintConfig::default());
    }

    #[test]
    fn rejects_empty_tool_list() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("dcheck.toml");
        fs::write(&path, "[tools]\ncheck = []\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("tools.check"));
    }

    #[test]
    fn rejects_bad_suppress_pattern() {
        let cfg = HarnessConfig {
            lint: LintConfig {
                args: Vec::new(),
                suppress: vec!["[".to_string()],
            },
            ..HarnessConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_override_wins() {
        let root = Path::new("/work");
        assert_eq!(config_path(root, None), PathBuf::from("/work/.dcheck.toml"));
        assert_eq!(
            config_path(root, Some(PathBuf::from("/etc/dcheck.toml"))),
            PathBuf::from("/etc/dcheck.toml")
        );
    }
}
