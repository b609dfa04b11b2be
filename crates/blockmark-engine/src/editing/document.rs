use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::collab::IdGenerator;
use crate::editing::list::is_list_block;
use crate::editing::segment::{join_blocks, segment};
use crate::editing::text::{char_len, split_at_char};

/// Opaque, unique block identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DocumentError {
    #[error("Unknown block: {0}")]
    UnknownBlock(BlockId),
    #[error("Block {0} is the first block and has nothing to merge into")]
    NoPreviousBlock(BlockId),
    #[error("Block {0} is the only block in the document")]
    LastBlock(BlockId),
    #[error("Block {0} appears more than once in the ordering")]
    DuplicateId(BlockId),
    #[error("Block {0} is ordered but has no text entry")]
    DanglingOrder(BlockId),
    #[error("Block {0} has a text entry but is not ordered")]
    Orphan(BlockId),
}

/// Which end of a block the caret lands on after a removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaretEdge {
    Start,
    End,
}

/// Result of [`Document::split_block`]
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub document: Document,
    /// Ids of the blocks produced from the text before the caret
    pub before: Vec<BlockId>,
    /// Ids of the blocks produced from the text after the caret, never empty
    pub after: Vec<BlockId>,
}

impl Split {
    /// The block that receives focus: first of the "after" group
    pub fn focus(&self) -> &BlockId {
        &self.after[0]
    }
}

/// Result of [`Document::merge_backward`]
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub document: Document,
    /// The surviving (previous) block
    pub into: BlockId,
    /// Char offset of the join point inside `into`
    pub join_offset: usize,
}

/// Result of [`Document::remove_block`]
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    pub document: Document,
    pub focus: BlockId,
    pub edge: CaretEdge,
}

/// Block store: id -> Markdown source plus the ordering sequence.
///
/// The ordering is the single source of truth for block sequence; the map's
/// own iteration order carries no meaning. Every id in the ordering has
/// exactly one text entry and every text entry is ordered exactly once.
///
/// Operations never mutate in place. Each structural edit returns a new
/// `Document`, so a caller holding a snapshot keeps a consistent view.
///
/// ```rust
/// # use blockmark_engine::{Document, SequentialIds};
/// let mut ids = SequentialIds::new("b");
/// let doc = Document::from_text("foo\n\nbar", &mut ids);
/// let merge = doc.merge_backward(&doc.order()[1]).unwrap();
/// assert_eq!(merge.document.text(&merge.into), Some("foobar"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    texts: HashMap<BlockId, String>,
    order: Vec<BlockId>,
}

impl Document {
    /// Segment `text` into blocks with fresh ids.
    ///
    /// Text without any block still yields one empty block so the document
    /// always has somewhere to put the caret.
    pub fn from_text(text: &str, ids: &mut dyn IdGenerator) -> Self {
        let mut blocks = segment(text);
        if blocks.is_empty() {
            blocks.push(String::new());
        }

        let mut doc = Self::default();
        for block in blocks {
            let id = ids.next_id();
            doc.order.push(id.clone());
            doc.texts.insert(id, block);
        }
        doc
    }

    /// Build from explicit (id, text) pairs in document order
    pub fn from_blocks<I>(blocks: I) -> Result<Self, DocumentError>
    where
        I: IntoIterator<Item = (BlockId, String)>,
    {
        let mut doc = Self::default();
        for (id, text) in blocks {
            if doc.texts.insert(id.clone(), text).is_some() {
                return Err(DocumentError::DuplicateId(id));
            }
            doc.order.push(id);
        }
        Ok(doc)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Block ids in document order
    pub fn order(&self) -> &[BlockId] {
        &self.order
    }

    pub fn text(&self, id: &BlockId) -> Option<&str> {
        self.texts.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.texts.contains_key(id)
    }

    pub fn index_of(&self, id: &BlockId) -> Option<usize> {
        self.order.iter().position(|candidate| candidate == id)
    }

    /// (id, text) pairs in document order
    pub fn blocks(&self) -> impl Iterator<Item = (&BlockId, &str)> {
        self.order
            .iter()
            .filter_map(|id| self.texts.get(id).map(|text| (id, text.as_str())))
    }

    /// Block texts in document order
    pub fn texts(&self) -> Vec<&str> {
        self.blocks().map(|(_, text)| text).collect()
    }

    /// The whole document as Markdown, blocks separated by a blank line
    pub fn to_markdown(&self) -> String {
        join_blocks(&self.texts())
    }

    /// Replace one block's text
    pub fn with_text(&self, id: &BlockId, text: impl Into<String>) -> Result<Self, DocumentError> {
        if !self.contains(id) {
            return Err(DocumentError::UnknownBlock(id.clone()));
        }
        let mut doc = self.clone();
        doc.texts.insert(id.clone(), text.into());
        Ok(doc)
    }

    /// Structural split at a char offset.
    ///
    /// Both halves are re-segmented independently, so a half containing a
    /// heading expands into several blocks. A half that segments to nothing
    /// becomes a single empty block. Line breaks touching the cut are kept at
    /// the end of the last "before" block. The original id is kept by the first
    /// resulting block and the others get fresh ids; the original's slot in
    /// the ordering is replaced in place by the whole new run.
    pub fn split_block(
        &self,
        id: &BlockId,
        offset: usize,
        ids: &mut dyn IdGenerator,
    ) -> Result<Split, DocumentError> {
        let text = self
            .text(id)
            .ok_or_else(|| DocumentError::UnknownBlock(id.clone()))?;
        let index = self
            .index_of(id)
            .ok_or_else(|| DocumentError::DanglingOrder(id.clone()))?;

        let (head, tail) = split_at_char(text, offset);
        // Line breaks at the cut stay with the head so a merge restores them
        let tail = tail.trim_start_matches('\n');
        let head = &text[..text.len() - tail.len()];
        let before_texts = segment_head(head);
        let after_texts = segment_half(tail);

        let mut doc = self.clone();
        doc.texts.remove(id);

        let mut new_ids = Vec::with_capacity(before_texts.len() + after_texts.len());
        for (position, block) in before_texts.iter().chain(after_texts.iter()).enumerate() {
            let block_id = if position == 0 {
                id.clone()
            } else {
                ids.next_id()
            };
            doc.texts.insert(block_id.clone(), block.clone());
            new_ids.push(block_id);
        }

        let after = new_ids.split_off(before_texts.len());
        let before = new_ids;
        doc.order
            .splice(index..=index, before.iter().chain(after.iter()).cloned());

        log::info!(
            "split block {id} into {} + {} blocks",
            before.len(),
            after.len()
        );

        Ok(Split {
            document: doc,
            before,
            after,
        })
    }

    /// Merge a block into its predecessor.
    ///
    /// Texts are concatenated directly, or with a newline when both blocks
    /// are list blocks so the items stay separate.
    pub fn merge_backward(&self, id: &BlockId) -> Result<Merge, DocumentError> {
        let text = self
            .text(id)
            .ok_or_else(|| DocumentError::UnknownBlock(id.clone()))?;
        let index = self
            .index_of(id)
            .ok_or_else(|| DocumentError::DanglingOrder(id.clone()))?;
        if index == 0 {
            return Err(DocumentError::NoPreviousBlock(id.clone()));
        }

        let previous = self.order[index - 1].clone();
        let previous_text = self
            .text(&previous)
            .ok_or_else(|| DocumentError::DanglingOrder(previous.clone()))?;

        let separator = if is_list_block(previous_text)
            && is_list_block(text)
            && !previous_text.ends_with('\n')
        {
            "\n"
        } else {
            ""
        };
        let join_offset = char_len(previous_text);
        let merged = format!("{previous_text}{separator}{text}");

        let mut doc = self.clone();
        doc.texts.remove(id);
        doc.order.remove(index);
        doc.texts.insert(previous.clone(), merged);

        log::info!("merged block {id} into {previous}");

        Ok(Merge {
            document: doc,
            into: previous,
            join_offset,
        })
    }

    /// Remove a block entirely.
    ///
    /// Focus goes to the block that now occupies the same index (caret at its
    /// start), or to the preceding block (caret at its end) when the removed
    /// block was last. The only block of a document is never removed.
    pub fn remove_block(&self, id: &BlockId) -> Result<Removal, DocumentError> {
        if !self.contains(id) {
            return Err(DocumentError::UnknownBlock(id.clone()));
        }
        let index = self
            .index_of(id)
            .ok_or_else(|| DocumentError::DanglingOrder(id.clone()))?;
        if self.order.len() == 1 {
            return Err(DocumentError::LastBlock(id.clone()));
        }

        let mut doc = self.clone();
        doc.texts.remove(id);
        doc.order.remove(index);

        let (focus, edge) = match doc.order.get(index) {
            Some(next) => (next.clone(), CaretEdge::Start),
            None => (doc.order[index - 1].clone(), CaretEdge::End),
        };

        log::info!("removed block {id}");

        Ok(Removal {
            document: doc,
            focus,
            edge,
        })
    }

    /// Verify the map and the ordering describe the same set of blocks
    pub fn check_invariants(&self) -> Result<(), DocumentError> {
        let mut seen = HashSet::with_capacity(self.order.len());
        for id in &self.order {
            if !seen.insert(id) {
                return Err(DocumentError::DuplicateId(id.clone()));
            }
            if !self.texts.contains_key(id) {
                return Err(DocumentError::DanglingOrder(id.clone()));
            }
        }
        if let Some(orphan) = self.texts.keys().find(|id| !seen.contains(id)) {
            return Err(DocumentError::Orphan(orphan.clone()));
        }
        Ok(())
    }
}

/// Like [`segment_half`], but the trailing line breaks segmentation would
/// drop are put back on the last block
fn segment_head(text: &str) -> Vec<String> {
    let mut blocks = segment_half(text);
    let breaks = text.len() - text.trim_end_matches('\n').len();
    if let Some(last) = blocks.last_mut() {
        last.push_str(&"\n".repeat(breaks));
    }
    blocks
}

fn segment_half(text: &str) -> Vec<String> {
    let blocks = segment(text);
    if blocks.is_empty() {
        vec![String::new()]
    } else {
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::SequentialIds;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn doc(texts: &[&str]) -> Document {
        Document::from_blocks(
            texts
                .iter()
                .enumerate()
                .map(|(i, text)| (BlockId::new(format!("b{i}")), text.to_string())),
        )
        .unwrap()
    }

    fn id(s: &str) -> BlockId {
        BlockId::new(s)
    }

    #[test]
    fn test_from_text_assigns_ids_in_order() {
        let mut ids = SequentialIds::new("n");
        let doc = Document::from_text("# Title\nbody\n\nsecond", &mut ids);

        assert_eq!(doc.order(), &[id("n1"), id("n2"), id("n3")]);
        assert_eq!(doc.texts(), vec!["# Title", "body", "second"]);
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_from_text_empty_input_has_one_empty_block() {
        let mut ids = SequentialIds::new("n");
        let doc = Document::from_text("\n\n", &mut ids);
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.texts(), vec![""]);
    }

    #[test]
    fn test_from_blocks_rejects_duplicates() {
        let result = Document::from_blocks([
            (id("a"), "one".to_string()),
            (id("a"), "two".to_string()),
        ]);
        assert_eq!(result, Err(DocumentError::DuplicateId(id("a"))));
    }

    #[test]
    fn test_with_text_unknown_block() {
        let doc = doc(&["a"]);
        assert_eq!(
            doc.with_text(&id("zz"), "x"),
            Err(DocumentError::UnknownBlock(id("zz")))
        );
    }

    #[test]
    fn test_with_text_leaves_original_untouched() {
        let original = doc(&["a", "b"]);
        let updated = original.with_text(&id("b1"), "changed").unwrap();
        assert_eq!(original.texts(), vec!["a", "b"]);
        assert_eq!(updated.texts(), vec!["a", "changed"]);
    }

    #[test]
    fn test_split_reuses_id_and_inserts_in_place() {
        let mut ids = SequentialIds::new("new");
        let doc = doc(&["first", "foobar", "last"]);

        let split = doc.split_block(&id("b1"), 3, &mut ids).unwrap();

        assert_eq!(split.before, vec![id("b1")]);
        assert_eq!(split.after, vec![id("new1")]);
        assert_eq!(split.focus(), &id("new1"));
        assert_eq!(
            split.document.order(),
            &[id("b0"), id("b1"), id("new1"), id("b2")]
        );
        assert_eq!(
            split.document.texts(),
            vec!["first", "foo", "bar", "last"]
        );
        split.document.check_invariants().unwrap();
    }

    #[test]
    fn test_split_at_start_synthesizes_empty_before_block() {
        let mut ids = SequentialIds::new("new");
        let doc = doc(&["text"]);

        let split = doc.split_block(&id("b0"), 0, &mut ids).unwrap();

        assert_eq!(split.document.texts(), vec!["", "text"]);
        assert_eq!(split.focus(), &id("new1"));
    }

    #[test]
    fn test_split_at_end_synthesizes_empty_after_block() {
        let mut ids = SequentialIds::new("new");
        let doc = doc(&["text"]);

        let split = doc.split_block(&id("b0"), 4, &mut ids).unwrap();

        assert_eq!(split.document.texts(), vec!["text", ""]);
        assert_eq!(split.document.order(), &[id("b0"), id("new1")]);
    }

    #[test]
    fn test_split_half_with_embedded_heading_expands() {
        let mut ids = SequentialIds::new("new");
        let doc = doc(&["intro\n# Heading\nrest of it"]);

        let split = doc.split_block(&id("b0"), 20, &mut ids).unwrap();

        assert_eq!(
            split.document.texts(),
            vec!["intro", "# Heading", "rest", " of it"]
        );
        assert_eq!(split.before, vec![id("b0"), id("new1"), id("new2")]);
        assert_eq!(split.after, vec![id("new3")]);
        split.document.check_invariants().unwrap();
    }

    #[test]
    fn test_split_clamps_offset_past_end() {
        let mut ids = SequentialIds::new("new");
        let doc = doc(&["abc"]);
        let split = doc.split_block(&id("b0"), 99, &mut ids).unwrap();
        assert_eq!(split.document.texts(), vec!["abc", ""]);
    }

    #[test]
    fn test_merge_backward_joins_plain_text() {
        let doc = doc(&["foo", "bar"]);

        let merge = doc.merge_backward(&id("b1")).unwrap();

        assert_eq!(merge.into, id("b0"));
        assert_eq!(merge.join_offset, 3);
        assert_eq!(merge.document.texts(), vec!["foobar"]);
        assert_eq!(merge.document.order(), &[id("b0")]);
        merge.document.check_invariants().unwrap();
    }

    #[test]
    fn test_merge_backward_keeps_list_items_apart() {
        let doc = doc(&["- a\n- b", "- c"]);

        let merge = doc.merge_backward(&id("b1")).unwrap();

        assert_eq!(merge.document.texts(), vec!["- a\n- b\n- c"]);
        assert_eq!(merge.join_offset, 7);
    }

    #[test]
    fn test_merge_list_into_paragraph_is_direct() {
        let doc = doc(&["para", "- c"]);
        let merge = doc.merge_backward(&id("b1")).unwrap();
        assert_eq!(merge.document.texts(), vec!["para- c"]);
    }

    #[test]
    fn test_merge_first_block_fails() {
        let doc = doc(&["foo", "bar"]);
        assert_eq!(
            doc.merge_backward(&id("b0")),
            Err(DocumentError::NoPreviousBlock(id("b0")))
        );
    }

    #[test]
    fn test_remove_middle_block_focuses_next_at_start() {
        let doc = doc(&["a", "", "c"]);

        let removal = doc.remove_block(&id("b1")).unwrap();

        assert_eq!(removal.focus, id("b2"));
        assert_eq!(removal.edge, CaretEdge::Start);
        assert_eq!(removal.document.texts(), vec!["a", "c"]);
        removal.document.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_last_block_focuses_previous_at_end() {
        let doc = doc(&["a", "b", ""]);

        let removal = doc.remove_block(&id("b2")).unwrap();

        assert_eq!(removal.focus, id("b1"));
        assert_eq!(removal.edge, CaretEdge::End);
    }

    #[test]
    fn test_remove_only_block_refused() {
        let doc = doc(&[""]);
        assert_eq!(
            doc.remove_block(&id("b0")),
            Err(DocumentError::LastBlock(id("b0")))
        );
    }

    #[rstest]
    #[case("foobar")]
    #[case("foo bar baz")]
    #[case("héllo wörld")]
    #[case("**bold** and *em*")]
    fn test_split_then_merge_restores_text(#[case] text: &str) {
        let original = doc(&["before", text, "after"]);
        let target = id("b1");

        for offset in 0..=char_len(text) {
            let mut ids = SequentialIds::new("s");
            let split = original.split_block(&target, offset, &mut ids).unwrap();
            assert_eq!(split.after.len(), 1, "offset {offset}");

            let merge = split.document.merge_backward(split.focus()).unwrap();

            assert_eq!(merge.document.text(&target), Some(text), "offset {offset}");
            assert_eq!(merge.document.order(), original.order());
            assert_eq!(merge.join_offset, offset);
        }
    }

    #[rstest]
    #[case("a\nb")]
    #[case("line one\nline two\nthree")]
    #[case("\nleading break")]
    #[case("trailing break\n")]
    fn test_split_then_merge_restores_multi_line_text(#[case] text: &str) {
        let original = doc(&["x", text, "y"]);
        let target = id("b1");

        for offset in 0..=char_len(text) {
            let mut ids = SequentialIds::new("s");
            let split = original.split_block(&target, offset, &mut ids).unwrap();
            let merge = split.document.merge_backward(split.focus()).unwrap();

            assert_eq!(merge.document.texts(), vec!["x", text, "y"], "offset {offset}");
        }
    }

    #[test]
    fn test_split_before_line_break_keeps_break_on_head() {
        let mut ids = SequentialIds::new("new");
        let doc = doc(&["a\nb"]);

        let split = doc.split_block(&id("b0"), 1, &mut ids).unwrap();

        assert_eq!(split.document.texts(), vec!["a\n", "b"]);
        assert_eq!(split.focus(), &id("new1"));
    }

    #[test]
    fn test_merge_list_after_trailing_break_adds_no_second_break() {
        let doc = doc(&["- a\n", "- b"]);
        let merge = doc.merge_backward(&id("b1")).unwrap();
        assert_eq!(merge.document.texts(), vec!["- a\n- b"]);
    }

    #[test]
    fn test_invariants_hold_after_operation_chain() {
        let mut ids = SequentialIds::new("x");
        let mut current = Document::from_text("# A\none two\n\n- a\n- b\n\nend", &mut ids);

        let first = current.order()[1].clone();
        current = current.split_block(&first, 3, &mut ids).unwrap().document;
        current.check_invariants().unwrap();

        let third = current.order()[2].clone();
        current = current.merge_backward(&third).unwrap().document;
        current.check_invariants().unwrap();

        let last = current.order()[current.len() - 1].clone();
        current = current.remove_block(&last).unwrap().document;
        current.check_invariants().unwrap();

        let ordered: HashSet<_> = current.order().iter().collect();
        assert_eq!(ordered.len(), current.len());
    }

    #[test]
    fn test_to_markdown_round_trips_through_segment() {
        let mut ids = SequentialIds::new("n");
        let doc = Document::from_text("# T\npara\n\n- a\n- b", &mut ids);
        assert_eq!(doc.to_markdown(), "# T\n\npara\n\n- a\n- b");
        assert_eq!(segment(&doc.to_markdown()), doc.texts());
    }
}
