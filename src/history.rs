//! Undo/redo log of location-addressed transfers.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::trace;

use crate::location::Location;

/// Moves `block_count` blocks from one location to another.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "transfer", rename_all = "camelCase")]
pub struct Transfer {
    pub from: Location,
    pub to: Location,
    pub block_count: usize,
}

impl Transfer {
    pub fn new(from: Location, to: Location, block_count: usize) -> Self {
        Self {
            from,
            to,
            block_count,
        }
    }

    pub fn inverse(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            block_count: self.block_count,
        }
    }
}

/// One undoable step: a single transfer, or several that only make sense
/// together.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryEntry {
    Single(Transfer),
    Group(Vec<Transfer>),
}

impl HistoryEntry {
    /// Steps in the order they were first executed.
    pub fn steps(&self) -> &[Transfer] {
        match self {
            HistoryEntry::Single(t) => std::slice::from_ref(t),
            HistoryEntry::Group(ts) => ts,
        }
    }

    /// Steps that undo this entry, in the order they must run.
    pub fn undo_steps(&self) -> Vec<Transfer> {
        self.steps().iter().rev().map(Transfer::inverse).collect()
    }

    fn steps_mut(&mut self) -> &mut [Transfer] {
        match self {
            HistoryEntry::Single(t) => std::slice::from_mut(t),
            HistoryEntry::Group(ts) => ts,
        }
    }
}

#[derive(Clone, Debug)]
pub struct History {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(200)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Appends a freshly performed edit. Anything that was undone is gone.
    pub fn record(&mut self, entry: HistoryEntry) {
        trace!(steps = entry.steps().len(), "history entry recorded");
        self.redo.clear();
        self.push_undo(entry);
    }

    /// Puts a redone entry back without touching the redo stack.
    pub fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo.push_back(entry);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }

    pub fn push_redo(&mut self, entry: HistoryEntry) {
        self.redo.push(entry);
    }

    pub fn take_undo(&mut self) -> Option<HistoryEntry> {
        self.undo.pop_back()
    }

    pub fn take_redo(&mut self) -> Option<HistoryEntry> {
        self.redo.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Flips the horizontal coordinate of every recorded placement after
    /// the reading direction changed.
    pub fn mirror_placements(&mut self) {
        for entry in self.undo.iter_mut().chain(self.redo.iter_mut()) {
            for step in entry.steps_mut() {
                step.from.mirror();
                step.to.mirror();
            }
        }
    }
}
