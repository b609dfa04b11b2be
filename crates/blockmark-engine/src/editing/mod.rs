/*!
 * # Block Editing Core
 *
 * A document is held as an ordered collection of independently editable
 * blocks. Each block is Markdown source text, presented either as source
 * (line-exploded and editable) or as rendered markup.
 *
 * ## Architecture Overview
 *
 * ### 1. Block Store
 * - [`Document`](document::Document) maps block ids to source text and keeps a
 *   separate ordering sequence, which is the only source of block order
 * - Every structural operation returns a **new** `Document`; the map and the
 *   order never change independently
 *
 * ### 2. Segmentation
 * - [`segment`](segment::segment) turns raw text into block texts
 * - The same function is used at load time and for both halves of a split
 *
 * ### 3. Editing State Machine
 * - [`Editor`](editor::Editor) owns the document and the focus set and is the
 *   only writer of either
 * - Host input arrives as [`EditorEvent`](editor::EditorEvent)s
 * - Cursor restoration is queued and runs after the host has materialized
 *   the next projection
 *
 * ### 4. Read API
 * - [`project`](projection::project) chooses source view or rendered view
 *   per block, driven by the focus set
 * - [`cursor`] maps caret positions between text offsets and live nodes
 *
 * ## Usage Pattern
 *
 * ```rust
 * use blockmark_engine::{Editor, EditorEvent, Key, KeyPress, MemorySurface};
 *
 * let mut editor = Editor::new("# Hello\n\nfoobar", MemorySurface::new());
 * editor.render();
 *
 * let body = editor.document().order()[1].clone();
 * editor.host_mut().place_caret(&body, 3);
 * editor.dispatch(EditorEvent::SelectionChange);
 * editor.dispatch(EditorEvent::Key(KeyPress::new(Key::Enter)));
 *
 * assert_eq!(editor.document().len(), 3);
 * ```
 */

pub mod cursor;
pub mod document;
pub mod editor;
pub mod focus;
pub mod list;
pub mod projection;
pub mod segment;
pub(crate) mod text;

use serde::{Deserialize, Serialize};

/// Behaviour switches for the editing state machine and the projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Try the list-aware line splitter before the structural split on Enter
    pub continue_lists: bool,
    /// Blocks starting with this prefix render as bookmarks
    pub bookmark_prefix: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            continue_lists: true,
            bookmark_prefix: "// ".to_string(),
        }
    }
}
