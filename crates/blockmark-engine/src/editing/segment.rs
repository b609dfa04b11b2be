//! Block segmentation: raw Markdown text to an ordered list of block texts.
//!
//! Lines are scanned in order with these rules, highest priority first:
//!
//! 1. Line endings are normalized to `\n` before scanning.
//! 2. A heading line (`#`s followed by whitespace) is always a block of its own.
//! 3. A blank line closes the buffered block.
//! 4. Any other line is appended to the buffer.
//! 5. A trailing buffer is emitted at end of input.
//! 6. Blank blocks are never emitted.
//!
//! Buffers only lose surrounding line breaks. Spaces are part of the content
//! (hard breaks, indented list items), so splitting a line and merging it
//! back reproduces it exactly.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

/// Separator placed between blocks when a document is written out
pub const BLOCK_SEPARATOR: &str = "\n\n";

fn heading_regex() -> &'static Regex {
    static HEADING_REGEX: OnceLock<Regex> = OnceLock::new();
    HEADING_REGEX.get_or_init(|| Regex::new(r"^#+\s").expect("Invalid heading regex"))
}

/// Whether `line` is an ATX heading line
pub fn is_heading_line(line: &str) -> bool {
    heading_regex().is_match(line)
}

/// Replace `\r\n` and lone `\r` with `\n`
pub fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Split `text` into block texts in document order
pub fn segment(text: &str) -> Vec<String> {
    let text = normalize_line_endings(text);
    let mut blocks = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if is_heading_line(line) {
            flush(&mut buffer, &mut blocks);
            push_block(&mut blocks, line);
        } else if line.trim().is_empty() {
            flush(&mut buffer, &mut blocks);
        } else {
            buffer.push(line);
        }
    }
    flush(&mut buffer, &mut blocks);

    blocks
}

/// Inverse of [`segment`] for persisting: blocks separated by a blank line
pub fn join_blocks<S: AsRef<str>>(blocks: &[S]) -> String {
    blocks
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

fn flush(buffer: &mut Vec<&str>, blocks: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    let text = buffer.join("\n");
    buffer.clear();
    push_block(blocks, &text);
}

fn push_block(blocks: &mut Vec<String>, text: &str) {
    let text = text.trim_matches('\n');
    if !text.trim().is_empty() {
        blocks.push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_blank_lines_separate_blocks() {
        let blocks = segment("first para\nstill first\n\nsecond\n\n\n\nthird");
        assert_eq!(blocks, vec!["first para\nstill first", "second", "third"]);
    }

    #[test]
    fn test_heading_is_isolated_without_blank_lines() {
        let blocks = segment("intro\n# Title\nbody line\n## Sub\nmore");
        assert_eq!(blocks, vec!["intro", "# Title", "body line", "## Sub", "more"]);
    }

    #[test]
    fn test_hashtag_is_not_a_heading() {
        assert!(!is_heading_line("#tag"));
        assert!(!is_heading_line("#"));
        assert!(is_heading_line("# x"));
        assert!(is_heading_line("###\tx"));
        assert_eq!(segment("#tag\nline"), vec!["#tag\nline"]);
    }

    #[test]
    fn test_windows_and_old_mac_line_endings() {
        assert_eq!(segment("a\r\nb\r\n\r\nc"), vec!["a\nb", "c"]);
        assert_eq!(segment("a\r\rb"), vec!["a", "b"]);
    }

    #[test]
    fn test_whitespace_only_input_has_no_blocks() {
        assert!(segment("").is_empty());
        assert!(segment("   \n\t\n  ").is_empty());
    }

    #[test]
    fn test_spaces_inside_blocks_are_preserved() {
        let blocks = segment("  indented\nhard break  \n\n- item\n  - nested");
        assert_eq!(blocks, vec!["  indented\nhard break  ", "- item\n  - nested"]);
    }

    #[rstest]
    #[case("")]
    #[case("single")]
    #[case("# H1\ntext\n## H2\n\n\nmore text\n  spaced")]
    #[case("- a\n- b\n\n1. one\n2. two\n# after list")]
    #[case("  leading spaces\n\n\ttabbed\n\n// bookmark")]
    #[case("a\r\n# b\r\nc\r\n\r\n")]
    fn test_segmentation_is_idempotent(#[case] text: &str) {
        let once = segment(text);
        let twice = segment(&join_blocks(&once));
        assert_eq!(once, twice);
    }

    #[rstest]
    #[case("before\n# Heading\nafter", 1)]
    #[case("# Heading\nafter", 0)]
    #[case("before\n## Heading", 1)]
    #[case("a\nb\n### Heading\nc\nd", 1)]
    fn test_heading_always_singleton(#[case] text: &str, #[case] index: usize) {
        let blocks = segment(text);
        assert!(is_heading_line(&blocks[index]));
        assert!(!blocks[index].contains('\n'));
    }
}
