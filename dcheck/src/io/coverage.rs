//! Coverage listing processing and stale listing cleanup.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::classifier::ClassifiedSource;
use crate::core::listing::{
    coverage_percent, is_cleanup_candidate, listing_name_for, should_purge, skipped_diagnostic,
    uncovered_diagnostics,
};
use crate::core::types::Diagnostic;

/// Result of scanning the listings for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageReport {
    pub diagnostics: Vec<Diagnostic>,
    /// Listing name of the last source that was processed (not skipped).
    pub last_listing: Option<String>,
}

/// Emit diagnostics for every uncovered line of every source's listing.
///
/// Missing listings are not an error: coverage was simply not produced.
#[instrument(skip_all, fields(root = %root.display(), sources = sources.len()))]
pub fn process_coverage(root: &Path, sources: &[ClassifiedSource]) -> CoverageReport {
    let mut report = CoverageReport::default();
    for source in sources {
        if source.facts.blocks_test_run() {
            report.diagnostics.push(skipped_diagnostic(&source.path));
            continue;
        }
        let name = listing_name_for(&source.path);
        let listing_path = root.join(&name);
        match fs::read(&listing_path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let diagnostics = uncovered_diagnostics(&source.path, &text);
                info!(
                    source = %source.path,
                    uncovered = diagnostics.len(),
                    percent = ?coverage_percent(&text),
                    "processed coverage listing"
                );
                report.diagnostics.extend(diagnostics);
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(listing = %listing_path.display(), "no coverage listing");
            }
            Err(err) => {
                warn!(
                    listing = %listing_path.display(),
                    err = %err,
                    "cannot read coverage listing"
                );
            }
        }
        report.last_listing = Some(name);
    }
    report
}

/// Delete stale listings under `root`; returns the removed paths, sorted.
///
/// Candidates are `last_listing`, the `-main` stub listing, and any listing
/// whose name contains `-`. A candidate is removed when it is empty or still
/// records an unexecuted line. Running this twice removes nothing the second time.
///
/// Only an unreadable `root` is an error. A candidate that cannot be inspected
/// or removed is logged and left in place.
#[instrument(skip_all, fields(root = %root.display(), last_listing))]
pub fn cleanup_listings(root: &Path, last_listing: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("read {}", root.display()))? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(err = %err, "cannot read directory entry");
                continue;
            }
        };
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !is_cleanup_candidate(name, last_listing) {
            continue;
        }
        let path = entry.path();
        match purge_if_stale(&path) {
            Ok(true) => {
                debug!(listing = %path.display(), "removed stale listing");
                removed.push(path);
            }
            Ok(false) => {}
            Err(err) => warn!(err = %format!("{err:#}"), "skipping listing cleanup"),
        }
    }
    removed.sort();
    Ok(removed)
}

/// Remove `path` if it is a regular file whose contents call for a purge.
fn purge_if_stale(path: &Path) -> Result<bool> {
    let metadata = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if !metadata.is_file() {
        return Ok(false);
    }
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    if !should_purge(&String::from_utf8_lossy(&bytes)) {
        return Ok(false);
    }
    fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::SourceFacts;
    use crate::core::types::Severity;

    fn tested(path: &str) -> ClassifiedSource {
        ClassifiedSource {
            path: path.to_string(),
            facts: SourceFacts::from_text("unittest {}"),
        }
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn one_diagnostic_per_uncovered_line() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join("src-app.lst"),
            "      1|a\n0000000|b\n      3|c\n",
        )
        .expect("write");

        let report = process_coverage(temp.path(), &[tested("src/app.d")]);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].path, "src/app.d");
        assert_eq!(report.diagnostics[0].line, Some(2));
        assert_eq!(report.last_listing.as_deref(), Some("src-app.lst"));
    }

    #[test]
    fn missing_listing_is_silent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let report = process_coverage(temp.path(), &[tested("app.d")]);
        assert!(report.diagnostics.is_empty());
        assert_eq!(report.last_listing.as_deref(), Some("app.lst"));
    }

    #[test]
    fn skipped_sources_get_info_diagnostic() {
        let temp = tempfile::tempdir().expect("tempdir");
        let app = ClassifiedSource {
            path: "app.d".to_string(),
            facts: SourceFacts::from_text("void main() {}"),
        };
        let report = process_coverage(temp.path(), &[app, tested("lib.d")]);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].severity, Severity::Info);
        assert_eq!(report.last_listing.as_deref(), Some("lib.lst"));
    }

    #[test]
    fn cleanup_removes_empty_and_uncovered_candidates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path();
        fs::write(dir.join("app.lst"), "0000000|x\n").expect("write");
        fs::write(dir.join("__main.lst"), "").expect("write");
        fs::write(dir.join("src-old.lst"), "  0000000|y\n").expect("write");
        fs::write(dir.join("src-full.lst"), "      2|z\n").expect("write");
        fs::write(dir.join("other.lst"), "0000000|w\n").expect("write");
        fs::write(dir.join("notes-a.txt"), "").expect("write");

        let removed = cleanup_listings(dir, Some("app.lst")).expect("cleanup");
        assert_eq!(
            removed,
            vec![
                dir.join("__main.lst"),
                dir.join("app.lst"),
                dir.join("src-old.lst")
            ]
        );
        assert_eq!(
            names(dir),
            vec!["notes-a.txt", "other.lst", "src-full.lst"]
        );
    }

    #[test]
    fn cleanup_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path();
        fs::write(dir.join("a-b.lst"), "0000000|x\n").expect("write");
        fs::write(dir.join("a-c.lst"), "      1|x\n").expect("write");

        cleanup_listings(dir, None).expect("first cleanup");
        let after_once = names(dir);
        let removed = cleanup_listings(dir, None).expect("second cleanup");
        assert!(removed.is_empty());
        assert_eq!(names(dir), after_once);
    }

    #[cfg(unix)]
    #[test]
    fn cleanup_skips_candidates_it_cannot_inspect() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path();
        // Self-referential link: stat fails with ELOOP whoever runs the test.
        std::os::unix::fs::symlink("loop-a.lst", dir.join("loop-a.lst"))
            .expect("symlink");
        fs::write(dir.join("src-old.lst"), "0000000|y\n").expect("write");

        let removed = cleanup_listings(dir, None).expect("cleanup");
        assert_eq!(removed, vec![dir.join("src-old.lst")]);
        assert!(fs::symlink_metadata(dir.join("loop-a.lst")).is_ok());
    }

    #[test]
    fn cleanup_of_missing_root_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err =
            cleanup_listings(&temp.path().join("gone"), None).expect_err("missing root");
        assert!(format!("{err:#}").contains("gone"));
    }
}
