//! Host surface abstraction.
//!
//! The editable surface (a browser DOM, a terminal, a test double) is only
//! reachable through [`HostSurface`]. The editing state machine never holds
//! node handles across a re-render: handles are resolved again from block ids
//! and offsets once the new projection has been materialized.

pub mod memory;

use crate::editing::document::BlockId;
use crate::editing::projection::Projection;

/// Zero-width placeholder that keeps an empty editable line addressable
pub const PLACEHOLDER: char = '\u{200B}';

/// Non-collapsing space used for leading indentation in source view
pub const NBSP: char = '\u{00A0}';

/// Opaque handle to a node on the host surface. Only valid until the host
/// replaces the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

/// A caret position as the host reports it: node plus local offset.
///
/// For text nodes the offset counts chars of the node's text, for element
/// nodes it counts children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfacePoint {
    pub node: NodeHandle,
    pub offset: usize,
}

impl SurfacePoint {
    pub fn new(node: NodeHandle, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSelection {
    pub anchor: SurfacePoint,
    pub focus: SurfacePoint,
}

impl SurfaceSelection {
    pub fn collapsed(point: SurfacePoint) -> Self {
        Self {
            anchor: point,
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// Block-relative caret position, stable across re-renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPosition {
    pub block: BlockId,
    /// Char offset into the block's text
    pub offset: usize,
}

impl BlockPosition {
    pub fn new(block: BlockId, offset: usize) -> Self {
        Self { block, offset }
    }
}

/// Snapshot of a block's live node tree on the host surface
#[derive(Debug, Clone, PartialEq)]
pub struct LiveNode {
    pub handle: NodeHandle,
    pub kind: LiveKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiveKind {
    Element { tag: String, children: Vec<LiveNode> },
    Text(String),
    LineBreak,
}

impl LiveNode {
    pub fn element(handle: NodeHandle, tag: impl Into<String>, children: Vec<LiveNode>) -> Self {
        Self {
            handle,
            kind: LiveKind::Element {
                tag: tag.into(),
                children,
            },
        }
    }

    pub fn text(handle: NodeHandle, text: impl Into<String>) -> Self {
        Self {
            handle,
            kind: LiveKind::Text(text.into()),
        }
    }

    pub fn line_break(handle: NodeHandle) -> Self {
        Self {
            handle,
            kind: LiveKind::LineBreak,
        }
    }

    pub fn children(&self) -> &[LiveNode] {
        match &self.kind {
            LiveKind::Element { children, .. } => children,
            _ => &[],
        }
    }

    /// Find a node in this subtree by handle
    pub fn find(&self, handle: NodeHandle) -> Option<&LiveNode> {
        if self.handle == handle {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(handle))
    }

    /// Source text as typed: line breaks become `\n`, non-breaking spaces
    /// become spaces and placeholders vanish.
    pub fn source_text(&self) -> String {
        let mut out = String::new();
        self.collect_source(&mut out);
        out
    }

    fn collect_source(&self, out: &mut String) {
        match &self.kind {
            LiveKind::Text(text) => out.extend(text.chars().filter_map(|ch| match ch {
                PLACEHOLDER => None,
                NBSP => Some(' '),
                other => Some(other),
            })),
            LiveKind::LineBreak => out.push('\n'),
            LiveKind::Element { children, .. } => {
                for child in children {
                    child.collect_source(out);
                }
            }
        }
    }

    /// Nothing but placeholders (or nothing at all) in the rendered content
    pub fn is_blank(&self) -> bool {
        match &self.kind {
            LiveKind::Text(text) => text.chars().all(|ch| ch == PLACEHOLDER),
            LiveKind::LineBreak => false,
            LiveKind::Element { children, .. } => children.iter().all(LiveNode::is_blank),
        }
    }
}

/// Capabilities the editor needs from the editable surface.
///
/// All cursor and selection access goes through this trait, so the editing
/// logic runs against [`memory::MemorySurface`] in tests.
pub trait HostSurface {
    /// Current selection, if the surface has one
    fn selection(&self) -> Option<SurfaceSelection>;

    fn set_selection(&mut self, selection: SurfaceSelection);

    /// Block whose rendered region contains `node`
    fn block_at(&self, node: NodeHandle) -> Option<BlockId>;

    /// Current live node tree of a block; the root is the block container
    fn live_node(&self, block: &BlockId) -> Option<LiveNode>;

    /// Whether `selection` intersects the rendered region of `block`
    fn selection_intersects(&self, selection: &SurfaceSelection, block: &BlockId) -> bool;

    /// Primary point query: caret position under a surface coordinate
    fn caret_position_from_point(&self, _x: f64, _y: f64) -> Option<SurfacePoint> {
        None
    }

    /// Secondary point query, used when the primary one is unsupported
    fn caret_range_from_point(&self, _x: f64, _y: f64) -> Option<SurfacePoint> {
        None
    }

    /// Replace the surface content with a new projection. Previously handed
    /// out node handles may stop resolving.
    fn materialize(&mut self, projection: &Projection);
}
