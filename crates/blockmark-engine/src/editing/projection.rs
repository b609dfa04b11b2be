//! # Render Projection
//!
//! Chooses, per block, between source view and rendered view:
//!
//! - **Source view** for blocks in the focus set: one unit per source line,
//!   leading spaces kept as non-breaking spaces, empty lines holding a
//!   zero-width placeholder so they stay addressable
//! - **Bookmark** for unfocused blocks starting with the bookmark prefix
//! - **Rendered view** for everything else, markup from the renderer
//!
//! The projection is a pure function of the document snapshot and focus set;
//! the host materializes it.

use serde::Serialize;

use crate::collab::MarkdownRenderer;
use crate::editing::EditorSettings;
use crate::editing::document::{BlockId, Document};
use crate::editing::focus::FocusSet;
use crate::host::{NBSP, PLACEHOLDER};

/// Elements that cannot hold children and so cannot act as a block container
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BlockView {
    /// Source lines with source-view markers applied
    Source(Vec<String>),
    /// Markup from the renderer, post-processed
    Rendered(String),
    /// Bookmark label
    Bookmark(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedBlock {
    pub id: BlockId,
    pub view: BlockView,
}

impl ProjectedBlock {
    /// HTML for this block's view
    pub fn markup(&self) -> String {
        match &self.view {
            BlockView::Source(lines) => lines
                .iter()
                .map(|line| format!("<span class=\"line\">{}</span>", html_escape::encode_text(line)))
                .collect::<Vec<_>>()
                .join("<br>"),
            BlockView::Rendered(markup) => markup.clone(),
            BlockView::Bookmark(label) => format!(
                "<div class=\"bookmark\">{}</div>",
                html_escape::encode_text(label)
            ),
        }
    }

    /// Visible text of the view, lines separated by `\n`
    pub fn display_text(&self) -> String {
        match &self.view {
            BlockView::Source(lines) => lines.join("\n"),
            BlockView::Rendered(markup) => markup_text(markup),
            BlockView::Bookmark(label) => label.clone(),
        }
    }
}

/// What the host should show, in document order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Projection {
    /// Editor version this projection was produced for
    pub version: u64,
    pub blocks: Vec<ProjectedBlock>,
}

impl Projection {
    pub fn block(&self, id: &BlockId) -> Option<&ProjectedBlock> {
        self.blocks.iter().find(|block| &block.id == id)
    }
}

pub fn project(
    document: &Document,
    focus: &FocusSet,
    renderer: &dyn MarkdownRenderer,
    settings: &EditorSettings,
) -> Projection {
    let blocks = document
        .blocks()
        .map(|(id, text)| ProjectedBlock {
            id: id.clone(),
            view: project_block(id, text, focus, renderer, settings),
        })
        .collect();

    Projection { version: 0, blocks }
}

fn project_block(
    id: &BlockId,
    text: &str,
    focus: &FocusSet,
    renderer: &dyn MarkdownRenderer,
    settings: &EditorSettings,
) -> BlockView {
    if focus.contains(id) {
        return BlockView::Source(source_lines(text));
    }

    if !settings.bookmark_prefix.is_empty()
        && let Some(label) = text.strip_prefix(settings.bookmark_prefix.as_str())
    {
        return BlockView::Bookmark(label.trim().to_string());
    }

    let markup = match renderer.render(text) {
        Ok(markup) => markup,
        Err(e) => {
            log::warn!("Rendering block {id} failed, showing source: {e}");
            format!("<p>{}</p>", html_escape::encode_text(text))
        }
    };
    BlockView::Rendered(wrap_void_markup(markup))
}

/// Source-view lines for a block's text
pub fn source_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                return PLACEHOLDER.to_string();
            }
            let indent = line.len() - line.trim_start_matches(' ').len();
            let mut out: String = std::iter::repeat_n(NBSP, indent).collect();
            out.push_str(&line[indent..]);
            out
        })
        .collect()
}

/// Wrap markup whose first element is a void element so the block keeps a
/// single container node
fn wrap_void_markup(markup: String) -> String {
    match first_tag_name(&markup) {
        Some(tag) if VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str()) => {
            format!("<div>{markup}</div>")
        }
        _ => markup,
    }
}

fn first_tag_name(markup: &str) -> Option<&str> {
    let start = markup.find('<')? + 1;
    let rest = &markup[start..];
    let end = rest
        .find(|ch: char| !ch.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    if end == 0 { None } else { Some(&rest[..end]) }
}

/// Strip tags and decode entities
fn markup_text(markup: &str) -> String {
    let mut text = String::with_capacity(markup.len());
    let mut in_tag = false;
    for ch in markup.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    html_escape::decode_html_entities(text.trim_matches('\n')).into_owned()
}
