//! In-memory host surface.
//!
//! Lays blocks out as rows of text, one row per line, with a caret model and
//! the default editing behaviour a host applies to events the editor passes
//! through. Every materialization hands out fresh node handles, so handles
//! captured before a re-render stop resolving just like replaced DOM nodes.
//!
//! Point queries treat `y` as the row index and `x` as the column.

use crate::editing::cursor::{offset_for_point, point_for_offset};
use crate::editing::document::BlockId;
use crate::editing::projection::{BlockView, Projection};
use crate::editing::text::{byte_index, char_len};
use crate::host::{
    BlockPosition, HostSurface, LiveNode, NBSP, NodeHandle, PLACEHOLDER, SurfacePoint,
    SurfaceSelection,
};

/// How a block is currently presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Source,
    Rendered,
    Bookmark,
}

/// One visible row of the surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceRow {
    /// `None` for the gap rows between blocks
    pub block: Option<BlockId>,
    pub view: Option<ViewKind>,
    pub text: String,
}

#[derive(Debug, Clone)]
struct Line {
    handle: NodeHandle,
    text: String,
}

#[derive(Debug, Clone)]
struct SurfaceBlock {
    id: BlockId,
    view: ViewKind,
    root: NodeHandle,
    lines: Vec<Line>,
    /// Break after `lines[i]`, one fewer than lines
    breaks: Vec<NodeHandle>,
}

impl SurfaceBlock {
    fn owns(&self, node: NodeHandle) -> bool {
        self.root == node
            || self.lines.iter().any(|line| line.handle == node)
            || self.breaks.contains(&node)
    }

    fn live_node(&self) -> LiveNode {
        let mut children = Vec::with_capacity(self.lines.len() * 2);
        for (index, line) in self.lines.iter().enumerate() {
            if index > 0 {
                children.push(LiveNode::line_break(self.breaks[index - 1]));
            }
            children.push(LiveNode::text(line.handle, line.text.clone()));
        }
        LiveNode::element(self.root, "div", children)
    }
}

/// Caret in surface coordinates: block index, line index, column in chars
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Caret {
    block: usize,
    line: usize,
    column: usize,
}

#[derive(Debug)]
pub struct MemorySurface {
    blocks: Vec<SurfaceBlock>,
    selection: Option<SurfaceSelection>,
    next_handle: u64,
    position_query: bool,
    block_gap: bool,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySurface {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            selection: None,
            next_handle: 1,
            position_query: true,
            block_gap: false,
        }
    }

    /// Only answer the secondary point query
    pub fn without_position_query(mut self) -> Self {
        self.position_query = false;
        self
    }

    /// Put an empty row between consecutive blocks
    pub fn with_block_gap(mut self) -> Self {
        self.block_gap = true;
        self
    }

    /// Collapse the selection at a block offset. Returns false when the block
    /// is not on the surface.
    pub fn place_caret(&mut self, block: &BlockId, offset: usize) -> bool {
        match self.point_at_offset(block, offset) {
            Some(point) => {
                self.selection = Some(SurfaceSelection::collapsed(point));
                true
            }
            None => false,
        }
    }

    /// Select from `anchor` to `focus`, possibly across blocks
    pub fn select(&mut self, anchor: BlockPosition, focus: BlockPosition) -> bool {
        match (
            self.point_at_offset(&anchor.block, anchor.offset),
            self.point_at_offset(&focus.block, focus.offset),
        ) {
            (Some(anchor), Some(focus)) => {
                self.selection = Some(SurfaceSelection { anchor, focus });
                true
            }
            _ => false,
        }
    }

    /// Block position of the selection focus
    pub fn caret(&self) -> Option<BlockPosition> {
        self.position(self.selection?.focus)
    }

    pub fn selection_positions(&self) -> Option<(BlockPosition, BlockPosition)> {
        let selection = self.selection?;
        Some((self.position(selection.anchor)?, self.position(selection.focus)?))
    }

    /// Visible text of a block, lines joined with `\n`
    pub fn block_text(&self, block: &BlockId) -> Option<String> {
        self.live_node(block).map(|node| node.source_text())
    }

    pub fn view_of(&self, block: &BlockId) -> Option<ViewKind> {
        self.blocks
            .iter()
            .find(|candidate| &candidate.id == block)
            .map(|candidate| candidate.view)
    }

    pub fn rows(&self) -> Vec<SurfaceRow> {
        let mut rows = Vec::new();
        for (index, block) in self.blocks.iter().enumerate() {
            if self.block_gap && index > 0 {
                rows.push(SurfaceRow {
                    block: None,
                    view: None,
                    text: String::new(),
                });
            }
            rows.extend(block.lines.iter().map(|line| SurfaceRow {
                block: Some(block.id.clone()),
                view: Some(block.view),
                text: visible(&line.text),
            }));
        }
        rows
    }

    /// (column, row) of the caret for drawing a terminal cursor
    pub fn caret_screen_position(&self) -> Option<(usize, usize)> {
        let caret = self.locate(self.selection?.focus)?;
        let row = self
            .slots()
            .iter()
            .position(|slot| *slot == Some((caret.block, caret.line)))?;
        let text = &self.blocks[caret.block].lines[caret.line].text;
        let column = text
            .chars()
            .take(caret.column)
            .filter(|&ch| ch != PLACEHOLDER)
            .count();
        Some((column, row))
    }

    /// Default pointer behaviour: caret under (x, y)
    pub fn place_caret_at_point(&mut self, x: f64, y: f64) -> bool {
        match self.caret_range_from_point(x, y) {
            Some(point) => {
                self.selection = Some(SurfaceSelection::collapsed(point));
                true
            }
            None => false,
        }
    }

    /// Default typing behaviour. Line breaks in `text` are dropped; they are
    /// the editor's business.
    pub fn insert_text(&mut self, text: &str) -> bool {
        if !self.delete_selection() {
            return false;
        }
        let Some(caret) = self.caret_position() else {
            return false;
        };

        let inserted: String = text.chars().filter(|&ch| ch != '\n' && ch != '\r').collect();
        let line = &mut self.blocks[caret.block].lines[caret.line];
        let mut content = content_of(&line.text).to_string();
        let column = caret.column.min(char_len(&content));
        content.insert_str(byte_index(&content, column), &inserted);
        line.text = with_placeholder(content);

        self.set_caret(Caret {
            column: column + char_len(&inserted),
            ..caret
        });
        true
    }

    /// Default Backspace: delete the selection, the char before the caret, or
    /// join with the previous line. Returns false at the start of a block.
    pub fn delete_backward(&mut self) -> bool {
        if self.has_range() {
            return self.delete_selection();
        }
        let Some(caret) = self.caret_position() else {
            return false;
        };

        if caret.column > 0 {
            let line = &mut self.blocks[caret.block].lines[caret.line];
            let mut content = content_of(&line.text).to_string();
            let column = caret.column.min(char_len(&content));
            if column == 0 {
                return false;
            }
            content.remove(byte_index(&content, column - 1));
            line.text = with_placeholder(content);
            self.set_caret(Caret {
                column: column - 1,
                ..caret
            });
            return true;
        }

        if caret.line == 0 {
            return false;
        }
        let column = self.join_lines(caret.block, caret.line - 1);
        self.set_caret(Caret {
            line: caret.line - 1,
            column,
            ..caret
        });
        true
    }

    /// Default Delete: delete the selection, the char after the caret, or
    /// join the next line. Returns false at the end of a block.
    pub fn delete_forward(&mut self) -> bool {
        if self.has_range() {
            return self.delete_selection();
        }
        let Some(caret) = self.caret_position() else {
            return false;
        };

        let block = &mut self.blocks[caret.block];
        let line = &mut block.lines[caret.line];
        let mut content = content_of(&line.text).to_string();
        if caret.column < char_len(&content) {
            content.remove(byte_index(&content, caret.column));
            line.text = with_placeholder(content);
            self.set_caret(caret);
            return true;
        }

        if caret.line + 1 >= block.lines.len() {
            return false;
        }
        let column = self.join_lines(caret.block, caret.line);
        self.set_caret(Caret { column, ..caret });
        true
    }

    /// Move the caret `delta` chars in reading order. A line break and a block
    /// boundary each count as one step. With `extend` the anchor stays put.
    pub fn move_caret(&mut self, delta: isize, extend: bool) -> bool {
        let Some(selection) = self.selection else {
            return false;
        };
        let Some(mut caret) = self.locate(selection.focus) else {
            return false;
        };

        for _ in 0..delta.unsigned_abs() {
            caret = if delta > 0 {
                self.step_forward(caret)
            } else {
                self.step_backward(caret)
            };
        }
        self.move_focus(selection, caret, extend);
        true
    }

    /// Move the caret `delta` rows, keeping the column where the row allows
    pub fn move_caret_vertical(&mut self, delta: isize, extend: bool) -> bool {
        let Some(selection) = self.selection else {
            return false;
        };
        let Some(caret) = self.locate(selection.focus) else {
            return false;
        };

        let slots = self.slots();
        let Some(mut row) = slots
            .iter()
            .position(|slot| *slot == Some((caret.block, caret.line)))
        else {
            return false;
        };

        let mut remaining = delta.unsigned_abs();
        let mut scan = row;
        while remaining > 0 {
            scan = if delta > 0 {
                if scan + 1 >= slots.len() {
                    break;
                }
                scan + 1
            } else {
                match scan.checked_sub(1) {
                    Some(previous) => previous,
                    None => break,
                }
            };
            if slots[scan].is_some() {
                row = scan;
                remaining -= 1;
            }
        }

        let Some((block, line)) = slots[row] else {
            return false;
        };
        let column = caret.column.min(self.line_len(block, line));
        self.move_focus(selection, Caret { block, line, column }, extend);
        true
    }

    fn move_focus(&mut self, selection: SurfaceSelection, caret: Caret, extend: bool) {
        let focus = self.point(caret);
        self.selection = Some(if extend {
            SurfaceSelection {
                anchor: selection.anchor,
                focus,
            }
        } else {
            SurfaceSelection::collapsed(focus)
        });
    }

    fn step_forward(&self, caret: Caret) -> Caret {
        if caret.column < self.line_len(caret.block, caret.line) {
            Caret {
                column: caret.column + 1,
                ..caret
            }
        } else if caret.line + 1 < self.blocks[caret.block].lines.len() {
            Caret {
                line: caret.line + 1,
                column: 0,
                ..caret
            }
        } else if caret.block + 1 < self.blocks.len() {
            Caret {
                block: caret.block + 1,
                line: 0,
                column: 0,
            }
        } else {
            caret
        }
    }

    fn step_backward(&self, caret: Caret) -> Caret {
        if caret.column > 0 {
            Caret {
                column: caret
                    .column
                    .min(self.line_len(caret.block, caret.line))
                    .saturating_sub(1),
                ..caret
            }
        } else if caret.line > 0 {
            Caret {
                line: caret.line - 1,
                column: self.line_len(caret.block, caret.line - 1),
                ..caret
            }
        } else if caret.block > 0 {
            let block = caret.block - 1;
            let line = self.blocks[block].lines.len() - 1;
            Caret {
                block,
                line,
                column: self.line_len(block, line),
            }
        } else {
            caret
        }
    }

    /// Join `lines[line + 1]` onto `lines[line]`; returns the join column
    fn join_lines(&mut self, block: usize, line: usize) -> usize {
        let block = &mut self.blocks[block];
        let next = block.lines.remove(line + 1);
        block.breaks.remove(line);

        let mut content = content_of(&block.lines[line].text).to_string();
        let column = char_len(&content);
        content.push_str(content_of(&next.text));
        block.lines[line].text = with_placeholder(content);
        column
    }

    fn has_range(&self) -> bool {
        self.selection.is_some_and(|selection| !selection.is_collapsed())
    }

    /// Remove the selected text when it lies inside one block; a selection
    /// across blocks collapses to its start instead
    fn delete_selection(&mut self) -> bool {
        let Some(selection) = self.selection else {
            return false;
        };
        if selection.is_collapsed() {
            return true;
        }
        let (Some(anchor), Some(focus)) = (self.locate(selection.anchor), self.locate(selection.focus))
        else {
            return false;
        };
        let (start, end) = if anchor <= focus {
            (anchor, focus)
        } else {
            (focus, anchor)
        };

        if start.block != end.block {
            self.set_caret(start);
            return true;
        }

        let block = &mut self.blocks[start.block];
        let head = content_of(&block.lines[start.line].text);
        let head = head[..byte_index(head, start.column)].to_string();
        let tail = content_of(&block.lines[end.line].text);
        let tail = &tail[byte_index(tail, end.column)..];
        let joined = format!("{head}{tail}");

        block.lines.drain(start.line + 1..=end.line);
        block.breaks.drain(start.line..end.line);
        block.lines[start.line].text = with_placeholder(joined);

        self.set_caret(Caret {
            column: char_len(&head),
            ..start
        });
        true
    }

    fn caret_position(&self) -> Option<Caret> {
        self.locate(self.selection?.focus)
    }

    fn set_caret(&mut self, caret: Caret) {
        self.selection = Some(SurfaceSelection::collapsed(self.point(caret)));
    }

    /// Rows as (block, line) slots, `None` for gaps
    fn slots(&self) -> Vec<Option<(usize, usize)>> {
        let mut slots = Vec::new();
        for (index, block) in self.blocks.iter().enumerate() {
            if self.block_gap && index > 0 {
                slots.push(None);
            }
            slots.extend((0..block.lines.len()).map(|line| Some((index, line))));
        }
        slots
    }

    /// Navigable length of a line; a placeholder-only line has none
    fn line_len(&self, block: usize, line: usize) -> usize {
        char_len(content_of(&self.blocks[block].lines[line].text))
    }

    fn point(&self, caret: Caret) -> SurfacePoint {
        let line = &self.blocks[caret.block].lines[caret.line];
        SurfacePoint::new(line.handle, caret.column)
    }

    fn locate(&self, point: SurfacePoint) -> Option<Caret> {
        for (index, block) in self.blocks.iter().enumerate() {
            let end_of = |line: usize| Caret {
                block: index,
                line,
                column: char_len(content_of(&block.lines[line].text)),
            };

            if block.root == point.node {
                // Children alternate line, break, line, ...
                let children = block.lines.len() * 2 - 1;
                return Some(if point.offset >= children {
                    end_of(block.lines.len() - 1)
                } else if point.offset % 2 == 0 {
                    Caret {
                        block: index,
                        line: point.offset / 2,
                        column: 0,
                    }
                } else {
                    end_of(point.offset / 2)
                });
            }
            if let Some(line) = block.lines.iter().position(|line| line.handle == point.node) {
                let len = char_len(content_of(&block.lines[line].text));
                return Some(Caret {
                    block: index,
                    line,
                    column: point.offset.min(len),
                });
            }
            if let Some(line) = block.breaks.iter().position(|handle| *handle == point.node) {
                return Some(end_of(line));
            }
        }
        None
    }

    fn position(&self, point: SurfacePoint) -> Option<BlockPosition> {
        let block = self.block_at(point.node)?;
        let live = self.live_node(&block)?;
        let offset = offset_for_point(&live, point)?;
        Some(BlockPosition::new(block, offset))
    }

    fn point_at_offset(&self, block: &BlockId, offset: usize) -> Option<SurfacePoint> {
        let live = self.live_node(block)?;
        Some(point_for_offset(&live, offset))
    }

    fn point_at(&self, x: f64, y: f64) -> Option<SurfacePoint> {
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let (block, line) = (*self.slots().get(y as usize)?)?;
        let column = (x as usize).min(self.line_len(block, line));
        Some(self.point(Caret {
            block,
            line,
            column,
        }))
    }

    fn alloc(&mut self) -> NodeHandle {
        let handle = NodeHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl HostSurface for MemorySurface {
    fn selection(&self) -> Option<SurfaceSelection> {
        self.selection
    }

    fn set_selection(&mut self, selection: SurfaceSelection) {
        self.selection = Some(selection);
    }

    fn block_at(&self, node: NodeHandle) -> Option<BlockId> {
        self.blocks
            .iter()
            .find(|block| block.owns(node))
            .map(|block| block.id.clone())
    }

    fn live_node(&self, block: &BlockId) -> Option<LiveNode> {
        self.blocks
            .iter()
            .find(|candidate| &candidate.id == block)
            .map(SurfaceBlock::live_node)
    }

    fn selection_intersects(&self, selection: &SurfaceSelection, block: &BlockId) -> bool {
        let (Some(anchor), Some(focus)) = (self.locate(selection.anchor), self.locate(selection.focus))
        else {
            return false;
        };
        let (first, last) = (anchor.block.min(focus.block), anchor.block.max(focus.block));
        self.blocks
            .iter()
            .position(|candidate| &candidate.id == block)
            .is_some_and(|index| (first..=last).contains(&index))
    }

    fn caret_position_from_point(&self, x: f64, y: f64) -> Option<SurfacePoint> {
        if self.position_query {
            self.point_at(x, y)
        } else {
            None
        }
    }

    fn caret_range_from_point(&self, x: f64, y: f64) -> Option<SurfacePoint> {
        self.point_at(x, y)
    }

    fn materialize(&mut self, projection: &Projection) {
        let mut blocks = Vec::with_capacity(projection.blocks.len());
        for projected in &projection.blocks {
            let (view, texts) = match &projected.view {
                BlockView::Source(lines) => (ViewKind::Source, lines.clone()),
                BlockView::Rendered(_) => (
                    ViewKind::Rendered,
                    projected
                        .display_text()
                        .split('\n')
                        .map(str::to_string)
                        .collect(),
                ),
                BlockView::Bookmark(label) => (ViewKind::Bookmark, vec![label.clone()]),
            };

            let root = self.alloc();
            let mut lines = Vec::with_capacity(texts.len());
            let mut breaks = Vec::with_capacity(texts.len().saturating_sub(1));
            for (index, text) in texts.into_iter().enumerate() {
                if index > 0 {
                    breaks.push(self.alloc());
                }
                lines.push(Line {
                    handle: self.alloc(),
                    text: with_placeholder(text),
                });
            }
            if lines.is_empty() {
                lines.push(Line {
                    handle: self.alloc(),
                    text: PLACEHOLDER.to_string(),
                });
            }

            blocks.push(SurfaceBlock {
                id: projected.id.clone(),
                view,
                root,
                lines,
                breaks,
            });
        }

        log::debug!(
            "materialized projection v{} with {} blocks",
            projection.version,
            blocks.len()
        );
        self.blocks = blocks;
        self.selection = None;
    }
}

/// Line text without a lone placeholder
fn content_of(text: &str) -> &str {
    if text.chars().all(|ch| ch == PLACEHOLDER) {
        ""
    } else {
        text
    }
}

/// Empty lines hold a placeholder so they stay addressable
fn with_placeholder(text: String) -> String {
    if text.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        text
    }
}

fn visible(text: &str) -> String {
    text.chars()
        .filter(|&ch| ch != PLACEHOLDER)
        .map(|ch| if ch == NBSP { ' ' } else { ch })
        .collect()
}
