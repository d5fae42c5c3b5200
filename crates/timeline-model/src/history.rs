//! Bounded linear undo/redo history.

use crate::command::Command;

/// One applied command with its recorded inverse.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub forward: Command,
    pub inverse: Command,
}

/// Linear history: applying a new command clears the redo stack, and
/// the undo stack is bounded so long sessions cannot grow unbounded.
#[derive(Debug)]
pub struct History {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    capacity: usize,
}

pub const DEFAULT_HISTORY_CAPACITY: usize = 256;

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a freshly applied command. Clears redo.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        if self.undo.len() == self.capacity {
            self.undo.remove(0);
        }
        self.undo.push(entry);
    }

    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.undo.pop()
    }

    pub fn push_undone(&mut self, entry: HistoryEntry) {
        self.redo.push(entry);
    }

    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo.pop()
    }

    pub fn push_redone(&mut self, entry: HistoryEntry) {
        self.undo.push(entry);
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }
}
