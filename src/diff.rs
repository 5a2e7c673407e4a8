//! Line-level diff statistics between two versions of a file.

use similar::{Algorithm, ChangeTag, TextDiff};

/// Whether `c` ends a line.
///
/// Besides `\n` and `\r` this takes the vertical tab, form feed, the file,
/// group and record separators, NEL (U+0085, which Latin-1 decoding produces
/// for byte 0x85) and the Unicode line and paragraph separators.
fn is_line_terminator(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{0b}' | '\u{0c}' | '\u{1c}' | '\u{1d}' | '\u{1e}' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split text into lines with the terminators stripped.
///
/// `\r\n` counts as a single terminator; every other line terminator ends a
/// line on its own. A trailing terminator does not open a new
/// empty line, so `"a\nb\n"` and `"a\nb"` both have two lines and the empty
/// string has none.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !is_line_terminator(c) {
            continue;
        }
        lines.push(&text[start..idx]);

        let mut end = idx + c.len_utf8();
        if c == '\r' {
            if let Some(&(next, '\n')) = chars.peek() {
                chars.next();
                end = next + 1;
            }
        }
        start = end;
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }

    lines
}

/// Number of lines in `text`, counted the way [`split_lines`] splits them
pub fn line_count(text: &str) -> usize {
    split_lines(text).len()
}

/// Count added and deleted lines between two texts.
///
/// The texts are compared line by line with Myers' algorithm, which yields a
/// minimal edit script, so the counts are symmetric:
/// `diff_line_counts(a, b) == swap(diff_line_counts(b, a))`.
///
/// # Arguments
///
/// * `old_text` - Content of the previous version
/// * `new_text` - Content of the current version
///
/// # Returns
///
/// * `(usize, usize)` - `(added, deleted)` line counts
pub fn diff_line_counts(old_text: &str, new_text: &str) -> (usize, usize) {
    if old_text == new_text {
        return (0, 0);
    }

    let old_lines = split_lines(old_text);
    let new_lines = split_lines(new_text);

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_slices(&old_lines[..], &new_lines[..]);

    diff.iter_all_changes()
        .fold((0, 0), |(added, deleted), change| match change.tag() {
            ChangeTag::Insert => (added + 1, deleted),
            ChangeTag::Delete => (added, deleted + 1),
            ChangeTag::Equal => (added, deleted),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines(""), Vec::<&str>::new());
        assert_eq!(split_lines("a"), vec!["a"]);
        assert_eq!(split_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\r\nb\rc"), vec!["a", "b", "c"]);
        assert_eq!(split_lines("\n\n"), vec!["", ""]);
        assert_eq!(line_count("one\ntwo\nthree\nfour\nfive\n"), 5);
    }

    #[test]
    fn test_split_lines_on_separator_characters() {
        assert_eq!(split_lines("a\x0cb\n"), vec!["a", "b"]);
        assert_eq!(line_count("a\x0cb\n"), 2);
        assert_eq!(split_lines("a\x0bb\x1cc\x1dd\x1ee"), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(split_lines("caf\u{e9}\u{85}na\u{ef}ve"), vec!["caf\u{e9}", "na\u{ef}ve"]);
        assert_eq!(split_lines("x\u{2028}y\u{2029}"), vec!["x", "y"]);
        // A tab or a DEL stays inside its line
        assert_eq!(line_count("a\tb\x7fc\n"), 1);
    }

    #[test]
    fn test_form_feed_in_diff() {
        assert_eq!(diff_line_counts("(defun a ())\n", "(defun a ())\n\x0c\n(defun b ())\n"), (3, 0));
    }

    #[test]
    fn test_deleted_line() {
        assert_eq!(diff_line_counts("line1\nline2\nline3", "line1\nline3"), (0, 1));
    }

    #[test]
    fn test_added_line() {
        assert_eq!(diff_line_counts("line1\nline3", "line1\nline2\nline3"), (1, 0));
    }

    #[test]
    fn test_replaced_line() {
        assert_eq!(diff_line_counts("line1\nline3", "line1\nline2"), (1, 1));
    }

    #[test]
    fn test_identical_inputs() {
        for text in ["", "a", "a\nb\nc", "x\r\ny\n"] {
            assert_eq!(diff_line_counts(text, text), (0, 0));
        }
        // Terminator style alone is not a change
        assert_eq!(diff_line_counts("a\nb", "a\r\nb\r\n"), (0, 0));
    }

    #[test]
    fn test_lines_starting_with_markers_count() {
        assert_eq!(diff_line_counts("x", "x\n++y\n--z"), (2, 0));
        assert_eq!(diff_line_counts("x\n--z", "x"), (0, 1));
    }

    #[test]
    fn test_symmetry() {
        let samples = [
            "",
            "a\nb\nc",
            "a\nc\nb\nd",
            "fn main() {\n    println!(\"hi\");\n}\n",
            "fn main() {\n}\n",
            "b\na\nb\na\nc",
            "a\nb\na\nb\nc\nc",
        ];

        for old in samples.iter() {
            for new in samples.iter() {
                let (added, deleted) = diff_line_counts(old, new);
                let (rev_added, rev_deleted) = diff_line_counts(new, old);
                assert_eq!(added, rev_deleted, "old={:?} new={:?}", old, new);
                assert_eq!(deleted, rev_added, "old={:?} new={:?}", old, new);
            }
        }
    }

    #[test]
    fn test_from_empty() {
        assert_eq!(diff_line_counts("", "a\nb\nc\n"), (3, 0));
        assert_eq!(diff_line_counts("a\nb\nc\n", ""), (0, 3));
    }
}
