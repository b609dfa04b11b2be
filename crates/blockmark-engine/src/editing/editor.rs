//! Editing state machine.
//!
//! [`Editor`] owns the [`Document`] and the [`FocusSet`] and is their only
//! writer. Host input arrives as [`EditorEvent`]s; every transition runs to
//! completion and leaves cursor restoration in a queue of [`Deferred`]
//! actions that [`Editor::after_paint`] executes once [`Editor::render`] has
//! materialized the next projection.

use std::collections::VecDeque;

use crate::collab::{
    CmarkRenderer, IdGenerator, MarkdownRenderer, MarkdownSerializer, SourceSerializer, UuidIds,
};
use crate::editing::EditorSettings;
use crate::editing::cursor::{
    CursorReference, is_at_block_start, offset_for_point, point_for_offset, point_from_reference,
};
use crate::editing::document::{BlockId, CaretEdge, Document};
use crate::editing::focus::FocusSet;
use crate::editing::list::{is_list_block, split_list_line};
use crate::editing::projection::{Projection, project};
use crate::editing::text::{byte_index, char_len};
use crate::host::{BlockPosition, HostSurface, LiveNode, SurfacePoint, SurfaceSelection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Backspace,
    Delete,
    Char(char),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    /// Line-break modifier
    pub shift: bool,
}

impl KeyPress {
    pub fn new(key: Key) -> Self {
        Self { key, shift: false }
    }

    pub fn with_shift(key: Key) -> Self {
        Self { key, shift: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditorEvent {
    /// Pointer pressed at a surface coordinate
    PointerDown { x: f64, y: f64 },
    /// The host selection or caret moved
    SelectionChange,
    Key(KeyPress),
}

/// Whether the editor consumed an event. On `PassThrough` the host applies
/// its default behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Handled,
    PassThrough,
}

impl EventOutcome {
    pub fn is_handled(self) -> bool {
        self == Self::Handled
    }
}

/// Cursor restoration that runs after the next paint. Positions are held by
/// block id and offset; live nodes are resolved again at execution time.
#[derive(Debug, Clone, PartialEq)]
pub enum Deferred {
    Caret(BlockPosition),
    Selection {
        anchor: BlockPosition,
        focus: BlockPosition,
    },
    /// Re-query the host at the last pointer coordinate; restore `fallback`
    /// when the point no longer lands in `block`
    Reanchor {
        block: BlockId,
        reference: CursorReference,
        fallback: usize,
    },
}

/// Inline markers offered to the formatting commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineMarker {
    Strong,
    Emphasis,
}

impl InlineMarker {
    pub fn as_str(self) -> &'static str {
        match self {
            InlineMarker::Strong => "**",
            InlineMarker::Emphasis => "*",
        }
    }
}

/// External collaborators the editor delegates to
pub struct Collaborators {
    pub renderer: Box<dyn MarkdownRenderer>,
    pub serializer: Box<dyn MarkdownSerializer>,
    pub ids: Box<dyn IdGenerator>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            renderer: Box::new(CmarkRenderer::default()),
            serializer: Box::new(SourceSerializer),
            ids: Box::new(UuidIds),
        }
    }
}

impl Collaborators {
    pub fn with_renderer(mut self, renderer: impl MarkdownRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn with_serializer(mut self, serializer: impl MarkdownSerializer + 'static) -> Self {
        self.serializer = Box::new(serializer);
        self
    }

    pub fn with_ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }
}

/// Caret location resolved from the host selection
struct CaretContext {
    block: BlockId,
    live: LiveNode,
    anchor: SurfacePoint,
    offset: usize,
    collapsed: bool,
}

pub struct Editor<H: HostSurface> {
    document: Document,
    focus: FocusSet,
    /// Blocks the host currently shows in source view; empty while the host
    /// view is stale relative to the document
    shown: FocusSet,
    /// Document or focus changed since the last render
    stale: bool,
    host: H,
    collaborators: Collaborators,
    settings: EditorSettings,
    cursor_reference: Option<CursorReference>,
    deferred: VecDeque<Deferred>,
    version: u64,
}

impl<H: HostSurface> Editor<H> {
    /// Editor with the default collaborators and settings
    pub fn new(text: &str, host: H) -> Self {
        Self::with_collaborators(text, host, Collaborators::default(), EditorSettings::default())
    }

    pub fn with_collaborators(
        text: &str,
        host: H,
        mut collaborators: Collaborators,
        settings: EditorSettings,
    ) -> Self {
        let document = Document::from_text(text, collaborators.ids.as_mut());
        log::info!("loaded document with {} blocks", document.len());
        Self {
            document,
            focus: FocusSet::new(),
            shown: FocusSet::new(),
            stale: true,
            host,
            collaborators,
            settings,
            cursor_reference: None,
            deferred: VecDeque::new(),
            version: 0,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn focus(&self) -> &FocusSet {
        &self.focus
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Number of projections materialized so far
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn cursor_reference(&self) -> Option<CursorReference> {
        self.cursor_reference
    }

    /// Restorations waiting for the next paint
    pub fn deferred(&self) -> impl Iterator<Item = &Deferred> {
        self.deferred.iter()
    }

    /// Handle an event, then re-render and restore the cursor when the event
    /// changed anything
    pub fn dispatch(&mut self, event: EditorEvent) -> EventOutcome {
        let outcome = self.handle(event);
        if outcome.is_handled() {
            self.render();
            self.after_paint();
        }
        outcome
    }

    pub fn handle(&mut self, event: EditorEvent) -> EventOutcome {
        match event {
            EditorEvent::PointerDown { x, y } => self.pointer_down(CursorReference::new(x, y)),
            EditorEvent::SelectionChange => self.selection_changed(),
            EditorEvent::Key(press) => self.key(press),
        }
    }

    /// Project the current document and materialize it on the host
    pub fn render(&mut self) -> Projection {
        self.focus.prune(&self.document);
        self.version += 1;

        let mut projection = project(
            &self.document,
            &self.focus,
            self.collaborators.renderer.as_ref(),
            &self.settings,
        );
        projection.version = self.version;

        self.host.materialize(&projection);
        self.shown = self.focus.clone();
        self.stale = false;
        projection
    }

    /// Run the queued cursor restorations against the freshly materialized
    /// surface. The queue is kept while the host still shows an older
    /// snapshot.
    pub fn after_paint(&mut self) {
        if self.stale {
            log::debug!(
                "after_paint before render, keeping {} restorations",
                self.deferred.len()
            );
            return;
        }
        while let Some(deferred) = self.deferred.pop_front() {
            match deferred {
                Deferred::Caret(position) => {
                    if let Some(point) = self.resolve(&position) {
                        self.host.set_selection(SurfaceSelection::collapsed(point));
                    }
                }
                Deferred::Selection { anchor, focus } => {
                    if let (Some(anchor), Some(focus)) = (self.resolve(&anchor), self.resolve(&focus))
                    {
                        self.host.set_selection(SurfaceSelection { anchor, focus });
                    }
                }
                Deferred::Reanchor {
                    block,
                    reference,
                    fallback,
                } => {
                    let point = point_from_reference(&self.host, reference)
                        .filter(|point| self.host.block_at(point.node).as_ref() == Some(&block));
                    match point {
                        Some(point) => self.host.set_selection(SurfaceSelection::collapsed(point)),
                        None => {
                            if let Some(point) = self.resolve(&BlockPosition::new(block, fallback)) {
                                self.host.set_selection(SurfaceSelection::collapsed(point));
                            }
                        }
                    }
                }
            }
        }
    }

    /// Write the live content of every block shown in source view back into
    /// the document
    pub fn commit(&mut self) {
        let shown: Vec<BlockId> = self.shown.iter().cloned().collect();
        for id in shown {
            self.commit_block(&id);
        }
    }

    /// The whole document as Markdown, including uncommitted edits
    pub fn markdown(&mut self) -> String {
        self.commit();
        self.document.to_markdown()
    }

    /// Wrap the current single-block selection in `marker` pairs and restore
    /// the selection around the same text
    pub fn apply_inline_marker(&mut self, marker: &str) -> EventOutcome {
        let Some(selection) = self.host.selection() else {
            return EventOutcome::PassThrough;
        };
        if selection.is_collapsed() || marker.is_empty() {
            log::debug!("inline marker needs a non-collapsed selection");
            return EventOutcome::PassThrough;
        }

        let (Some(anchor), Some(focus)) = (
            self.position_of(selection.anchor),
            self.position_of(selection.focus),
        ) else {
            log::debug!("selection for inline marker is outside any block");
            return EventOutcome::PassThrough;
        };
        if anchor.block != focus.block || !self.shown.contains(&anchor.block) {
            log::debug!("inline marker needs a selection inside one source-view block");
            return EventOutcome::PassThrough;
        }

        self.commit();
        let block = anchor.block.clone();
        let Some(text) = self.document.text(&block) else {
            return EventOutcome::PassThrough;
        };

        let start = anchor.offset.min(focus.offset);
        let end = anchor.offset.max(focus.offset);
        let (start_byte, end_byte) = (byte_index(text, start), byte_index(text, end));
        let wrapped = format!(
            "{}{marker}{}{marker}{}",
            &text[..start_byte],
            &text[start_byte..end_byte],
            &text[end_byte..]
        );

        let shift = char_len(marker);
        let (anchor_offset, focus_offset) = if anchor.offset <= focus.offset {
            (start + shift, end + shift)
        } else {
            (end + shift, start + shift)
        };

        match self.document.with_text(&block, wrapped) {
            Ok(document) => {
                let focus_set = self.focus.clone();
                self.replace_document(
                    document,
                    focus_set,
                    Deferred::Selection {
                        anchor: BlockPosition::new(block.clone(), anchor_offset),
                        focus: BlockPosition::new(block, focus_offset),
                    },
                );
                EventOutcome::Handled
            }
            Err(e) => {
                log::debug!("inline marker not applied: {e}");
                EventOutcome::PassThrough
            }
        }
    }

    pub fn apply_inline(&mut self, marker: InlineMarker) -> EventOutcome {
        self.apply_inline_marker(marker.as_str())
    }

    fn pointer_down(&mut self, reference: CursorReference) -> EventOutcome {
        self.cursor_reference = Some(reference);

        let Some(point) = point_from_reference(&self.host, reference) else {
            log::debug!("no caret position under ({}, {})", reference.x, reference.y);
            return EventOutcome::PassThrough;
        };
        let Some(block) = self.host.block_at(point.node) else {
            log::debug!("pointer down outside any block");
            return EventOutcome::PassThrough;
        };
        if self.focus.only() == Some(&block) && self.shown.contains(&block) {
            return EventOutcome::PassThrough;
        }

        let fallback = self.position_of(point).map_or(0, |position| position.offset);
        self.focus_block(
            block.clone(),
            Deferred::Reanchor {
                block,
                reference,
                fallback,
            },
        )
    }

    fn selection_changed(&mut self) -> EventOutcome {
        let Some(selection) = self.host.selection() else {
            return EventOutcome::PassThrough;
        };

        if !selection.is_collapsed() {
            return self.expand_focus(selection);
        }

        let Some(position) = self.position_of(selection.anchor) else {
            log::debug!("caret outside any block");
            return EventOutcome::PassThrough;
        };
        if self.focus.only() == Some(&position.block) && self.shown.contains(&position.block) {
            return EventOutcome::PassThrough;
        }

        self.focus_block(position.block.clone(), Deferred::Caret(position))
    }

    /// Focus every block the selection touches
    fn expand_focus(&mut self, selection: SurfaceSelection) -> EventOutcome {
        let touched: FocusSet = self
            .document
            .order()
            .iter()
            .filter(|id| self.host.selection_intersects(&selection, id))
            .cloned()
            .collect();

        if touched.is_empty() {
            log::debug!("selection touches no block");
            return EventOutcome::PassThrough;
        }
        if touched == self.focus && touched == self.shown {
            return EventOutcome::PassThrough;
        }

        let restore = match (
            self.position_of(selection.anchor),
            self.position_of(selection.focus),
        ) {
            (Some(anchor), Some(focus)) => Some(Deferred::Selection { anchor, focus }),
            _ => None,
        };

        self.commit();
        log::debug!("focus expands to {} blocks", touched.len());
        self.focus = touched;
        self.shown = FocusSet::new();
        self.stale = true;
        self.deferred.extend(restore);
        EventOutcome::Handled
    }

    fn focus_block(&mut self, block: BlockId, restore: Deferred) -> EventOutcome {
        self.commit();
        log::debug!("focus moves to {block}");
        self.focus = FocusSet::single(block);
        self.shown = FocusSet::new();
        self.stale = true;
        self.deferred.push_back(restore);
        EventOutcome::Handled
    }

    fn key(&mut self, press: KeyPress) -> EventOutcome {
        if !matches!(press.key, Key::Enter | Key::Backspace | Key::Delete) {
            return EventOutcome::PassThrough;
        }

        let Some(context) = self.caret_context() else {
            log::debug!("{:?} outside any block", press.key);
            return EventOutcome::PassThrough;
        };
        if !context.collapsed || !self.shown.contains(&context.block) {
            log::debug!("{:?} left to the host", press.key);
            return EventOutcome::PassThrough;
        }

        match press.key {
            Key::Enter if press.shift => self.insert_line_break(&context.block),
            Key::Enter => self.split(&context),
            Key::Backspace | Key::Delete if context.live.is_blank() => {
                self.delete_empty_block(&context.block)
            }
            Key::Backspace if is_at_block_start(&context.live, context.anchor) => {
                self.merge_backward(&context.block)
            }
            _ => EventOutcome::PassThrough,
        }
    }

    fn insert_line_break(&mut self, block: &BlockId) -> EventOutcome {
        self.commit();
        let Some(text) = self.document.text(block) else {
            return EventOutcome::PassThrough;
        };
        let text = format!("{text}\n");
        let caret = char_len(&text);

        match self.document.with_text(block, text) {
            Ok(document) => {
                let focus = self.focus.clone();
                self.replace_document(
                    document,
                    focus,
                    Deferred::Caret(BlockPosition::new(block.clone(), caret)),
                );
                EventOutcome::Handled
            }
            Err(e) => {
                log::debug!("line break not inserted: {e}");
                EventOutcome::PassThrough
            }
        }
    }

    /// Enter: list-aware split when the block is a list, structural split
    /// otherwise
    fn split(&mut self, context: &CaretContext) -> EventOutcome {
        self.commit();
        let block = &context.block;
        let Some(text) = self.document.text(block) else {
            return EventOutcome::PassThrough;
        };

        if self.settings.continue_lists
            && is_list_block(text)
            && let Some(list_split) = split_list_line(text, context.offset)
        {
            return match self.document.with_text(block, list_split.text) {
                Ok(document) => {
                    log::info!("continued list in block {block}");
                    self.replace_document(
                        document,
                        FocusSet::single(block.clone()),
                        Deferred::Caret(BlockPosition::new(block.clone(), list_split.caret)),
                    );
                    EventOutcome::Handled
                }
                Err(e) => {
                    log::debug!("list split not applied: {e}");
                    EventOutcome::PassThrough
                }
            };
        }

        match self
            .document
            .split_block(block, context.offset, self.collaborators.ids.as_mut())
        {
            Ok(split) => {
                let focus = split.focus().clone();
                self.replace_document(
                    split.document,
                    FocusSet::single(focus.clone()),
                    Deferred::Caret(BlockPosition::new(focus, 0)),
                );
                EventOutcome::Handled
            }
            Err(e) => {
                log::debug!("split not applied: {e}");
                EventOutcome::PassThrough
            }
        }
    }

    fn merge_backward(&mut self, block: &BlockId) -> EventOutcome {
        self.commit();
        match self.document.merge_backward(block) {
            Ok(merge) => {
                self.replace_document(
                    merge.document,
                    FocusSet::single(merge.into.clone()),
                    Deferred::Caret(BlockPosition::new(merge.into, merge.join_offset)),
                );
                EventOutcome::Handled
            }
            Err(e) => {
                log::debug!("merge not applied: {e}");
                EventOutcome::PassThrough
            }
        }
    }

    fn delete_empty_block(&mut self, block: &BlockId) -> EventOutcome {
        self.commit();
        match self.document.remove_block(block) {
            Ok(removal) => {
                let offset = match removal.edge {
                    CaretEdge::Start => 0,
                    CaretEdge::End => removal.document.text(&removal.focus).map_or(0, char_len),
                };
                self.replace_document(
                    removal.document,
                    FocusSet::single(removal.focus.clone()),
                    Deferred::Caret(BlockPosition::new(removal.focus, offset)),
                );
                EventOutcome::Handled
            }
            Err(e) => {
                log::debug!("empty block kept: {e}");
                EventOutcome::PassThrough
            }
        }
    }

    /// Install a new document snapshot. The host view is stale until the
    /// next render.
    fn replace_document(&mut self, document: Document, focus: FocusSet, restore: Deferred) {
        self.document = document;
        self.focus = focus;
        self.focus.prune(&self.document);
        self.shown = FocusSet::new();
        self.stale = true;
        self.deferred.push_back(restore);
    }

    fn commit_block(&mut self, id: &BlockId) {
        if !self.document.contains(id) {
            return;
        }
        let Some(live) = self.host.live_node(id) else {
            log::debug!("block {id} has no live node to commit");
            return;
        };
        let text = match self.collaborators.serializer.serialize(&live) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Serializing block {id} failed, keeping raw text: {e}");
                live.source_text()
            }
        };
        if self.document.text(id) == Some(text.as_str()) {
            return;
        }
        match self.document.with_text(id, text) {
            Ok(document) => self.document = document,
            Err(e) => log::debug!("commit of block {id} skipped: {e}"),
        }
    }

    fn caret_context(&self) -> Option<CaretContext> {
        let selection = self.host.selection()?;
        let block = self.host.block_at(selection.anchor.node)?;
        let live = self.host.live_node(&block)?;
        let offset = offset_for_point(&live, selection.anchor)?;
        Some(CaretContext {
            block,
            live,
            anchor: selection.anchor,
            offset,
            collapsed: selection.is_collapsed(),
        })
    }

    /// Block position of a host point. Offsets read from a rendered view are
    /// clamped to the block's source length.
    fn position_of(&self, point: SurfacePoint) -> Option<BlockPosition> {
        let block = self.host.block_at(point.node)?;
        let live = self.host.live_node(&block)?;
        let mut offset = offset_for_point(&live, point)?;
        if !self.shown.contains(&block) {
            offset = offset.min(self.document.text(&block).map_or(0, char_len));
        }
        Some(BlockPosition::new(block, offset))
    }

    fn resolve(&self, position: &BlockPosition) -> Option<SurfacePoint> {
        match self.host.live_node(&position.block) {
            Some(live) => Some(point_for_offset(&live, position.offset)),
            None => {
                log::debug!("dropping restoration for missing block {}", position.block);
                None
            }
        }
    }
}
