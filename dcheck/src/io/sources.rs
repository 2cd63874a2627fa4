//! Reading and classifying source file arguments.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::core::classifier::{ClassifiedSource, SourceFacts};

/// Read each source (relative to `root`) and classify its text.
///
/// Unreadable sources are classified as test-free so the run task is skipped;
/// the check task then reports the real problem.
pub fn classify_sources<'a, I>(root: &Path, sources: I) -> Vec<ClassifiedSource>
where
    I: IntoIterator<Item = &'a str>,
{
    sources
        .into_iter()
        .map(|path| {
            let facts = match fs::read(root.join(path)) {
                Ok(bytes) => SourceFacts::from_text(&String::from_utf8_lossy(&bytes)),
                Err(err) => {
                    warn!(path, err = %err, "cannot read source, treating as test-free");
                    SourceFacts::unreadable()
                }
            };
            debug!(
                path,
                entry_point = facts.entry_point,
                has_tests = facts.has_tests,
                "classified source"
            );
            ClassifiedSource {
                path: path.to_string(),
                facts,
            }
        })
        .collect()
}
