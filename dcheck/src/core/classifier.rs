//! Textual classification of D source files.
//!
//! These are heuristics, not a parse: a `unittest` keyword inside a comment or
//! string literal still counts as a test block.

/// Canonical entry-point declarations.
const ENTRY_POINT_SIGNATURES: &[&str] = &["void main(", "int main("];

/// Keyword that opens an embedded test block.
const TEST_BLOCK_KEYWORD: &str = "unittest";

/// Leading character of every compiler switch.
pub const SWITCH_PREFIX: char = '-';

/// Extension of source files the harness recognizes.
pub const SOURCE_EXTENSION: &str = ".d";

/// Returns true if `text` declares a program entry point.
pub fn is_entry_point_file(text: &str) -> bool {
    ENTRY_POINT_SIGNATURES
        .iter()
        .any(|signature| text.contains(signature))
}

/// Returns true if `text` contains `unittest` as a whole token.
pub fn has_at_least_one_test_block(text: &str) -> bool {
    let bytes = text.as_bytes();
    text.match_indices(TEST_BLOCK_KEYWORD).any(|(start, _)| {
        let end = start + TEST_BLOCK_KEYWORD.len();
        let before_ok = start == 0 || !is_identifier_byte(bytes[start - 1]);
        let after_ok = end == bytes.len() || !is_identifier_byte(bytes[end]);
        before_ok && after_ok
    })
}

/// Returns true if `arg` names a source file rather than a switch.
pub fn is_eligible_source_argument(arg: &str) -> bool {
    !arg.starts_with(SWITCH_PREFIX) && arg.ends_with(SOURCE_EXTENSION)
}

fn is_identifier_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Classification facts for one source argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFacts {
    pub entry_point: bool,
    pub has_tests: bool,
}

impl SourceFacts {
    pub fn from_text(text: &str) -> Self {
        Self {
            entry_point: is_entry_point_file(text),
            has_tests: has_at_least_one_test_block(text),
        }
    }

    /// Facts for a source that could not be read: treated as test-free.
    pub fn unreadable() -> Self {
        Self {
            entry_point: false,
            has_tests: false,
        }
    }

    /// True when running the unit tests of this file is pointless or wrong.
    pub fn blocks_test_run(&self) -> bool {
        self.entry_point || !self.has_tests
    }
}

/// A source argument together with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedSource {
    pub path: String,
    pub facts: SourceFacts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_point_detected_for_void_and_int_main() {
        assert!(is_entry_point_file("void main() {}\n"));
        assert!(is_entry_point_file("import std;\nint main(string[] args) { return 0; }"));
    }

    #[test]
    fn entry_point_absent_without_signature() {
        assert!(!is_entry_point_file("void mainLoop() {}"));
        assert!(!is_entry_point_file(""));
    }

    #[test]
    fn test_block_requires_token_boundaries() {
        assert!(has_at_least_one_test_block("unittest {}"));
        assert!(has_at_least_one_test_block("int x;\n@safe unittest\n{}"));
        assert!(has_at_least_one_test_block("x = 1;unittest"));
        assert!(!has_at_least_one_test_block("void unittests() {}"));
        assert!(!has_at_least_one_test_block("my_unittest();"));
        assert!(!has_at_least_one_test_block("unittest2 {}"));
        assert!(!has_at_least_one_test_block(""));
    }

    #[test]
    fn test_block_found_after_rejected_occurrence() {
        assert!(has_at_least_one_test_block("run_unittest();\nunittest {}"));
    }

    #[test]
    fn test_block_in_comment_still_counts() {
        assert!(has_at_least_one_test_block("// see unittest below"));
    }

    #[test]
    fn source_argument_predicate() {
        assert!(is_eligible_source_argument("src/app.d"));
        assert!(is_eligible_source_argument("a.d"));
        assert!(!is_eligible_source_argument("-Isrc.d"));
        assert!(!is_eligible_source_argument("app.di"));
        assert!(!is_eligible_source_argument("-run"));
    }

    #[test]
    fn facts_block_test_run_for_entry_point_or_no_tests() {
        assert!(SourceFacts::from_text("void main() {}\nunittest {}").blocks_test_run());
        assert!(SourceFacts::from_text("int f() { return 1; }").blocks_test_run());
        assert!(!SourceFacts::from_text("unittest { assert(1); }").blocks_test_run());
        assert!(SourceFacts::unreadable().blocks_test_run());
    }
}
