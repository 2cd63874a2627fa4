//! Executable lookup on a search path.

use std::ffi::OsString;
use std::path::PathBuf;

use tracing::debug;

/// Resolves tool names against a `PATH`-style search path.
///
/// The search path is captured once; the process environment is never read
/// after construction.
#[derive(Debug, Clone, Default)]
pub struct ExecutableResolver {
    dirs: Vec<PathBuf>,
}

impl ExecutableResolver {
    pub fn new(search_path: Option<OsString>) -> Self {
        let dirs: Vec<PathBuf> = search_path
            .map(|value| std::env::split_paths(&value).collect())
            .unwrap_or_default();
        Self { dirs }
    }

    /// First `dir/name` on the search path that exists as a file.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let found = self
            .dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file());
        debug!(name, found = ?found, "resolve executable");
        found
    }

    /// `preferred` if it resolves, else `fallback`.
    ///
    /// The two-name case of [`Self::resolve_first`].
    pub fn preferred(&self, preferred: &str, fallback: &str) -> Option<PathBuf> {
        self.resolve_first(&[preferred, fallback])
    }

    /// First of `names` that resolves, in preference order.
    ///
    /// General form of [`Self::preferred`]; tool lists from the config go
    /// through here so users can name more than two candidates.
    pub fn resolve_first<S: AsRef<str>>(&self, names: &[S]) -> Option<PathBuf> {
        names.iter().find_map(|name| self.resolve(name.as_ref()))
    }
}
