//! Undo/redo history
//!
//! Each entry is a full document snapshot. Snapshots share unchanged blocks
//! with the live document (see [`BuilderDocument`]), so recording one costs a
//! map copy rather than a deep clone.

use std::collections::VecDeque;

use super::BuilderDocument;

/// Undo and redo stacks of document snapshots
#[derive(Debug, Clone, Default)]
pub struct History {
    past: VecDeque<BuilderDocument>,
    future: Vec<BuilderDocument>,
    /// Maximum undo depth; 0 means unbounded
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            limit,
        }
    }

    /// Record the state before a mutation. Clears the redo stack and drops
    /// the oldest entry once the limit is exceeded.
    pub fn record(&mut self, before: BuilderDocument) {
        self.past.push_back(before);
        self.future.clear();
        if self.limit > 0 {
            while self.past.len() > self.limit {
                self.past.pop_front();
            }
        }
    }

    /// Swap `current` for the previous snapshot; `None` when there is nothing
    /// to undo.
    pub fn undo(&mut self, current: &BuilderDocument) -> Option<BuilderDocument> {
        let previous = self.past.pop_back()?;
        self.future.push(current.clone());
        Some(previous)
    }

    /// Reverse of [`undo`](Self::undo)
    pub fn redo(&mut self, current: &BuilderDocument) -> Option<BuilderDocument> {
        let next = self.future.pop()?;
        self.past.push_back(current.clone());
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}
