use std::collections::BTreeSet;

use crate::editing::document::{BlockId, Document};

/// Blocks currently presented in source view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusSet {
    ids: BTreeSet<BlockId>,
}

impl FocusSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(id: BlockId) -> Self {
        Self {
            ids: BTreeSet::from([id]),
        }
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockId> {
        self.ids.iter()
    }

    /// The focused block when exactly one is focused
    pub fn only(&self) -> Option<&BlockId> {
        if self.ids.len() == 1 {
            self.ids.iter().next()
        } else {
            None
        }
    }

    /// Drop ids that no longer exist in `document`
    pub fn prune(&mut self, document: &Document) {
        self.ids.retain(|id| document.contains(id));
    }
}

impl FromIterator<BlockId> for FocusSet {
    fn from_iter<T: IntoIterator<Item = BlockId>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
