//! Parsing of coverage listing (`.lst`) files.
//!
//! A listing has one line per source line. The leading column holds the
//! execution count, right-aligned and terminated by `|`; a count of zero is
//! written as `0000000|`. Wider counters push the column right, so the sentinel
//! is accepted at byte offsets 0 through 2.

use crate::core::classifier::SOURCE_EXTENSION;
use crate::core::types::{Diagnostic, Severity};

/// Zero-execution counter.
pub const ZERO_EXECUTIONS: &str = "0000000|";
/// Byte offsets at which the counter may start.
const SENTINEL_OFFSETS: std::ops::RangeInclusive<usize> = 0..=2;
/// Listing extension.
pub const LISTING_EXTENSION: &str = ".lst";
/// Listing written for the stub module generated by `-main`.
pub const STUB_LISTING_NAME: &str = "__main.lst";

pub const UNCOVERED_MESSAGE: &str = "line not covered by tests";
pub const SKIPPED_MESSAGE: &str =
    "coverage analysis skipped, file has an entry point or no unittest blocks";

/// Derive the listing file name the compiler writes for `source`.
///
/// `./src/app.d` and `src/app.d` both map to `src-app.lst`.
pub fn listing_name_for(source: &str) -> String {
    let trimmed = source.strip_prefix("./").unwrap_or(source);
    let stem = trimmed.strip_suffix(SOURCE_EXTENSION).unwrap_or(trimmed);
    let mut name = stem.replace(['/', '\\'], "-");
    name.push_str(LISTING_EXTENSION);
    name
}

/// Returns true if the line records zero executions. Short lines never do.
pub fn is_uncovered_line(line: &str) -> bool {
    let bytes = line.as_bytes();
    SENTINEL_OFFSETS.into_iter().any(|offset| {
        bytes
            .get(offset..)
            .is_some_and(|rest| rest.starts_with(ZERO_EXECUTIONS.as_bytes()))
    })
}

/// 1-based numbers of the lines that were never executed.
pub fn uncovered_lines(listing: &str) -> Vec<usize> {
    listing
        .lines()
        .enumerate()
        .filter(|(_, line)| is_uncovered_line(line))
        .map(|(idx, _)| idx + 1)
        .collect()
}

/// Percentage from the trailing `<file> is N% covered` summary, if present.
pub fn coverage_percent(listing: &str) -> Option<u8> {
    let last = listing.lines().rev().find(|line| !line.trim().is_empty())?;
    let (_, tail) = last.rsplit_once(" is ")?;
    let percent = tail.strip_suffix("% covered")?;
    percent.trim().parse().ok()
}

/// Diagnostics for one processed listing.
pub fn uncovered_diagnostics(source: &str, listing: &str) -> Vec<Diagnostic> {
    uncovered_lines(listing)
        .into_iter()
        .map(|line| Diagnostic {
            path: source.to_string(),
            line: Some(line),
            severity: Severity::Warning,
            message: UNCOVERED_MESSAGE.to_string(),
        })
        .collect()
}

pub fn skipped_diagnostic(source: &str) -> Diagnostic {
    Diagnostic {
        path: source.to_string(),
        line: None,
        severity: Severity::Info,
        message: SKIPPED_MESSAGE.to_string(),
    }
}

/// Whether the cleanup pass should look at a listing file named `name`.
pub fn is_cleanup_candidate(name: &str, last_processed: Option<&str>) -> bool {
    if !name.ends_with(LISTING_EXTENSION) {
        return false;
    }
    last_processed == Some(name) || name == STUB_LISTING_NAME || name.contains('-')
}

/// Whether a candidate listing is stale: empty, or with at least one miss.
pub fn should_purge(listing: &str) -> bool {
    listing.is_empty() || listing.lines().any(is_uncovered_line)
}
