//! Suppression of known-noisy linter warnings.

use anyhow::{Context, Result};
use regex::Regex;

use crate::core::types::Stream;

/// Marker that identifies a warning-class linter message.
const WARNING_MARKER: &str = "[warn]";

/// One line of linter output and the stream it was written to.
///
/// `text` keeps the line terminator, if the line had one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintMessage {
    pub stream: Stream,
    pub text: String,
}

/// Drops warning lines matching any of a fixed set of patterns.
#[derive(Debug, Clone)]
pub struct LintFilter {
    suppress: Vec<Regex>,
}

impl LintFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let suppress = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).with_context(|| format!("compile lint pattern {pattern:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { suppress })
    }

    pub fn is_suppressed(&self, text: &str) -> bool {
        text.contains(WARNING_MARKER) && self.suppress.iter().any(|re| re.is_match(text))
    }

    /// Split captured linter output into lines and keep the ones worth showing.
    ///
    /// Kept lines, blank ones included, are returned byte for byte.
    pub fn filter(&self, stdout: &[u8], stderr: &[u8]) -> Vec<LintMessage> {
        let mut kept = Vec::new();
        for (stream, bytes) in [(Stream::Stdout, stdout), (Stream::Stderr, stderr)] {
            for line in String::from_utf8_lossy(bytes).split_inclusive('\n') {
                if self.is_suppressed(line.trim_end_matches(['\r', '\n'])) {
                    continue;
                }
                kept.push(LintMessage {
                    stream,
                    text: line.to_string(),
                });
            }
        }
        kept
    }
}
