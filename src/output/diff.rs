//! Line-level unified diffs of notebook text.

use similar::{ChangeTag, TextDiff};
use std::fmt::Write;

const CONTEXT_LINES: usize = 3;

/// Generate a unified diff between the original and formatted notebook text.
pub fn generate_diff(original: &str, modified: &str, file_path: &str) -> String {
    let mut diff = String::new();

    let _ = writeln!(diff, "--- {file_path}");
    let _ = writeln!(diff, "+++ {file_path} (formatted)");

    let text_diff = TextDiff::from_lines(original, modified);
    let mut has_hunks = false;

    for hunk in text_diff.unified_diff().context_radius(CONTEXT_LINES).iter_hunks() {
        has_hunks = true;
        let _ = writeln!(diff, "{}", hunk.header());
        for change in hunk.iter_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            let line = change.value();
            let _ = if line.ends_with('\n') {
                write!(diff, "{sign}{line}")
            } else {
                writeln!(diff, "{sign}{line}")
            };
        }
    }

    if !has_hunks {
        diff.push_str("No changes\n");
    }
    diff
}
