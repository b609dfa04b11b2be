pub mod collab;
pub mod editing;
pub mod host;

// Re-export key types for easier usage
pub use collab::*;
pub use editing::{
    EditorSettings,
    cursor::CursorReference,
    document::{BlockId, Document, DocumentError},
    editor::{Collaborators, Deferred, Editor, EditorEvent, EventOutcome, InlineMarker, Key, KeyPress},
    focus::FocusSet,
    projection::{BlockView, ProjectedBlock, Projection},
};
pub use host::{
    BlockPosition, HostSurface, LiveKind, LiveNode, NBSP, NodeHandle, PLACEHOLDER, SurfacePoint,
    SurfaceSelection,
    memory::{MemorySurface, SurfaceRow, ViewKind},
};
