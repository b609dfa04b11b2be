//! List-aware line splitting for Enter inside list blocks.
//!
//! Pure text transformation over a block's lines: the block id never
//! changes, only its internal lines are rearranged.

use std::sync::OnceLock;

use regex::Regex;

use crate::editing::text::{byte_index, char_len};

/// Loose detection: does a line start like a list item at all
fn list_start_regex() -> &'static Regex {
    static LIST_START: OnceLock<Regex> = OnceLock::new();
    LIST_START.get_or_init(|| Regex::new(r"^\s*([-*+]|\d+\.) ").expect("Invalid list regex"))
}

/// Detailed parse into indent, marker and content
fn list_item_regex() -> &'static Regex {
    static LIST_ITEM: OnceLock<Regex> = OnceLock::new();
    LIST_ITEM.get_or_init(|| {
        Regex::new(r"^([ \t]*)(- \[[ xX]\]|[-*+]|\d+\.) (.*)$").expect("Invalid list item regex")
    })
}

/// A list item line split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListLine<'a> {
    pub indent: &'a str,
    /// `-`, `*`, `+`, `1.` or a task marker such as `- [ ]`
    pub marker: &'a str,
    pub content: &'a str,
}

impl ListLine<'_> {
    /// Indent, marker and the single separating space
    pub fn prefix(&self) -> String {
        format!("{}{} ", self.indent, self.marker)
    }

    fn with_content(&self, content: &str) -> String {
        format!("{}{content}", self.prefix())
    }
}

/// Outcome of [`split_list_line`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSplit {
    /// Reassembled block text
    pub text: String,
    /// Char offset of the start of the new second line's content
    pub caret: usize,
}

/// A block is a list block when any of its lines looks like a list item
pub fn is_list_block(text: &str) -> bool {
    text.split('\n').any(|line| list_start_regex().is_match(line))
}

pub fn parse_list_line(line: &str) -> Option<ListLine<'_>> {
    let captures = list_item_regex().captures(line)?;
    Some(ListLine {
        indent: captures.get(1)?.as_str(),
        marker: captures.get(2)?.as_str(),
        content: captures.get(3)?.as_str(),
    })
}

/// Handle Enter at `caret` (char offset into `text`).
///
/// With the caret at or past the end of the item's trimmed content the line
/// is kept and a new empty item with the same indent and marker follows it.
/// Otherwise the content is split at the caret into two sibling items.
///
/// Returns `None` when the line under the caret does not parse as a list
/// item; the caller then falls back to the structural split.
pub fn split_list_line(text: &str, caret: usize) -> Option<ListSplit> {
    let lines: Vec<&str> = text.split('\n').collect();
    let (line_index, column) = locate_line(&lines, caret)?;
    let line = lines[line_index];
    let item = parse_list_line(line)?;

    let prefix = item.prefix();
    let prefix_len = char_len(&prefix);
    let content_column = column.saturating_sub(prefix_len);

    let (first, second) = if content_column >= char_len(item.content.trim_end()) {
        (line.to_string(), prefix.clone())
    } else {
        let (head, tail) = item.content.split_at(byte_index(item.content, content_column));
        (item.with_content(head), item.with_content(tail))
    };

    let before_len: usize = lines[..line_index]
        .iter()
        .map(|line| char_len(line) + 1)
        .sum();
    let caret = before_len + char_len(&first) + 1 + prefix_len;

    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 1);
    out.extend(lines[..line_index].iter().map(|line| line.to_string()));
    out.push(first);
    out.push(second);
    out.extend(lines[line_index + 1..].iter().map(|line| line.to_string()));

    Some(ListSplit {
        text: out.join("\n"),
        caret,
    })
}

/// Line index and column of a char offset
fn locate_line(lines: &[&str], caret: usize) -> Option<(usize, usize)> {
    let mut line_start = 0;
    for (index, line) in lines.iter().enumerate() {
        let len = char_len(line);
        if caret <= line_start + len {
            return Some((index, caret.saturating_sub(line_start)));
        }
        line_start += len + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("- item", true)]
    #[case("* item", true)]
    #[case("+ item", true)]
    #[case("12. item", true)]
    #[case("  - nested", true)]
    #[case("- [ ] task", true)]
    #[case("para\n- item", true)]
    #[case("plain text", false)]
    #[case("-not a list", false)]
    #[case("1.not a list", false)]
    #[case("**bold**", false)]
    fn test_is_list_block(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(is_list_block(text), expected);
    }

    #[rstest]
    #[case("- a", "", "-", "a")]
    #[case("  * b c", "  ", "*", "b c")]
    #[case("3. third", "", "3.", "third")]
    #[case("- [ ] todo", "", "- [ ]", "todo")]
    #[case("\t- [x] done", "\t", "- [x]", "done")]
    #[case("- [X] DONE", "", "- [X]", "DONE")]
    #[case("- ", "", "-", "")]
    #[case("- [link](x)", "", "-", "[link](x)")]
    fn test_parse_list_line(
        #[case] line: &str,
        #[case] indent: &str,
        #[case] marker: &str,
        #[case] content: &str,
    ) {
        assert_eq!(
            parse_list_line(line),
            Some(ListLine {
                indent,
                marker,
                content
            })
        );
    }

    #[test]
    fn test_parse_rejects_non_items() {
        assert_eq!(parse_list_line("  continuation text"), None);
        assert_eq!(parse_list_line("-"), None);
    }

    #[test]
    fn test_enter_at_end_continues_list() {
        let split = split_list_line("- a\n- b", 7).unwrap();
        assert_eq!(
            split.text.split('\n').collect::<Vec<_>>(),
            vec!["- a", "- b", "- "]
        );
        assert_eq!(split.caret, 10);
    }

    #[test]
    fn test_enter_mid_item_splits_into_siblings() {
        let split = split_list_line("- abcdef", 5).unwrap();
        assert_eq!(split.text, "- abc\n- def");
        assert_eq!(split.caret, 8);
    }

    #[test]
    fn test_split_preserves_indent_and_marker_on_middle_line() {
        let text = "1. one\n  2. twothree\n3. end";
        let split = split_list_line(text, 7 + 8).unwrap();
        assert_eq!(split.text, "1. one\n  2. two\n  2. three\n3. end");
        assert_eq!(split.caret, 7 + 8 + 1 + 5);
    }

    #[test]
    fn test_task_marker_is_repeated() {
        let split = split_list_line("- [ ] buy milk", 14).unwrap();
        assert_eq!(split.text, "- [ ] buy milk\n- [ ] ");
        assert_eq!(split.caret, 21);
    }

    #[test]
    fn test_trailing_spaces_count_as_end_of_content() {
        let split = split_list_line("- a  ", 4).unwrap();
        assert_eq!(split.text, "- a  \n- ");
    }

    #[test]
    fn test_caret_inside_marker_splits_at_content_start() {
        let split = split_list_line("- abc", 1).unwrap();
        assert_eq!(split.text, "- \n- abc");
        assert_eq!(split.caret, 5);
    }

    #[test]
    fn test_non_item_line_falls_through() {
        assert_eq!(split_list_line("- a\n  wrapped text", 12), None);
    }

    #[test]
    fn test_multibyte_content() {
        let split = split_list_line("- héllo", 4).unwrap();
        assert_eq!(split.text, "- hé\n- llo");
    }
}
