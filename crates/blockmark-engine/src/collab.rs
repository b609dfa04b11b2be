//! External collaborators: Markdown renderer, live-node serializer and block
//! id generator, with the default implementations the editor ships with.

use pulldown_cmark::{Options, Parser, html};
use uuid::Uuid;

use crate::editing::document::BlockId;
use crate::host::{LiveNode, PLACEHOLDER};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("Renderer failed: {0}")]
    Render(String),
    #[error("Serializer failed: {0}")]
    Serialize(String),
}

/// Markdown source -> renderable markup. Must be pure and must return
/// placeholder-bearing markup for blank input.
pub trait MarkdownRenderer {
    fn render(&self, source: &str) -> Result<String, CollaboratorError>;
}

/// Live node -> canonical Markdown source. Must be pure.
pub trait MarkdownSerializer {
    fn serialize(&self, node: &LiveNode) -> Result<String, CollaboratorError>;
}

/// Produces block ids that never repeat within a document's lifetime
pub trait IdGenerator {
    fn next_id(&mut self) -> BlockId;
}

/// CommonMark renderer backed by pulldown-cmark, with tables, task lists and
/// strikethrough enabled
#[derive(Debug, Clone)]
pub struct CmarkRenderer {
    options: Options,
}

impl Default for CmarkRenderer {
    fn default() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        Self { options }
    }
}

impl CmarkRenderer {
    pub fn with_options(options: Options) -> Self {
        Self { options }
    }
}

impl MarkdownRenderer for CmarkRenderer {
    fn render(&self, source: &str) -> Result<String, CollaboratorError> {
        if source.trim().is_empty() {
            return Ok(format!("<p>{PLACEHOLDER}</p>"));
        }
        let parser = Parser::new_ext(source, self.options);
        let mut out = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut out, parser);
        Ok(out)
    }
}

/// Serializer for blocks shown in source view: the live text already is
/// the Markdown, minus the source-view markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceSerializer;

impl MarkdownSerializer for SourceSerializer {
    fn serialize(&self, node: &LiveNode) -> Result<String, CollaboratorError> {
        Ok(node.source_text())
    }
}

/// Random v4 UUID block ids
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&mut self) -> BlockId {
        BlockId::new(Uuid::new_v4().to_string())
    }
}

/// Deterministic ids `<prefix>1`, `<prefix>2`, ...
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> BlockId {
        let id = BlockId::new(format!("{}{}", self.prefix, self.next));
        self.next += 1;
        id
    }
}
