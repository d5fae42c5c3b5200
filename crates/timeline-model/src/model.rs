//! The mutable timeline model: command application, undo/redo, and
//! snapshotting.

use std::cell::Cell;
use std::sync::Arc;

use crate::command::Command;
use crate::document::TimelineDocument;
use crate::error::ValidationError;
use crate::history::{History, HistoryEntry};
use crate::media::MediaRegistry;

/// Owns the live document and its edit history.
///
/// Synchronous and single-threaded relative to the caller (the UI
/// thread); it never suspends. [`TimelineModel::snapshot`] hands out an
/// immutable `Arc` of the document, so the render-plan compiler can
/// work from a frozen copy while editing continues.
pub struct TimelineModel {
    doc: Arc<TimelineDocument>,
    registry: Arc<MediaRegistry>,
    history: History,
    cached_duration: Cell<Option<f64>>,
}

impl TimelineModel {
    /// Wrap a document, validating it first.
    pub fn new(
        doc: TimelineDocument,
        registry: Arc<MediaRegistry>,
    ) -> Result<Self, ValidationError> {
        doc.validate(&registry)?;
        Ok(Self {
            doc: Arc::new(doc),
            registry,
            history: History::default(),
            cached_duration: Cell::new(None),
        })
    }

    /// The live document (read-only).
    pub fn document(&self) -> &TimelineDocument {
        &self.doc
    }

    /// An immutable snapshot safe to hand across threads. O(1): the
    /// document is structurally shared until the next successful
    /// command replaces it.
    pub fn snapshot(&self) -> Arc<TimelineDocument> {
        Arc::clone(&self.doc)
    }

    /// Apply a command atomically.
    ///
    /// The command runs against a scratch copy; if application or
    /// whole-document validation fails, the live document is unchanged
    /// and the error is returned.
    pub fn apply_command(&mut self, command: Command) -> Result<(), ValidationError> {
        let mut scratch = (*self.doc).clone();
        let inverse = command.apply(&mut scratch)?;
        scratch.validate(&self.registry)?;

        self.commit(scratch);
        self.history.record(HistoryEntry {
            forward: command,
            inverse,
        });
        Ok(())
    }

    /// Undo the most recent command. Returns `false` when the stack is
    /// exhausted.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.pop_undo() else {
            return false;
        };

        let mut scratch = (*self.doc).clone();
        match entry.inverse.apply(&mut scratch) {
            Ok(_) => {
                self.commit(scratch);
                self.history.push_undone(entry);
                true
            }
            Err(error) => {
                // A recorded inverse failing to apply means the history
                // is out of sync with the document.
                tracing::error!(%error, "undo failed to apply recorded inverse");
                false
            }
        }
    }

    /// Redo the most recently undone command. Returns `false` when the
    /// stack is exhausted.
    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.pop_redo() else {
            return false;
        };

        let mut scratch = (*self.doc).clone();
        match entry.forward.apply(&mut scratch) {
            Ok(_) => {
                self.commit(scratch);
                self.history.push_redone(entry);
                true
            }
            Err(error) => {
                tracing::error!(%error, "redo failed to reapply command");
                false
            }
        }
    }

    /// Derived document duration, recomputed lazily and cached.
    /// Invalidated by every successful command, undo, and redo.
    pub fn duration_secs(&self) -> f64 {
        if let Some(cached) = self.cached_duration.get() {
            return cached;
        }
        let duration = self.doc.duration_secs();
        self.cached_duration.set(Some(duration));
        duration
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    fn commit(&mut self, doc: TimelineDocument) {
        self.doc = Arc::new(doc);
        self.cached_duration.set(None);
    }
}
