//! Deduplication of check diagnostics repeated by the run task.

/// Return `run` without its leading copy of `check`.
///
/// Nothing is stripped unless `check` is non-empty and an exact prefix.
pub fn strip_duplicate_prefix<'a>(check: &[u8], run: &'a [u8]) -> &'a [u8] {
    if !check.is_empty() && run.starts_with(check) {
        &run[check.len()..]
    } else {
        run
    }
}
