//! Export job identity, state machine, and the caller-owned registry.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use clipforge_timeline_model::ids::new_id;

use crate::progress::CancelToken;

/// Opaque export job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of an export job. Transitions are monotonic; terminal
/// states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Cancelling,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Queued, Running)
                | (Queued, Cancelling)
                | (Queued, Cancelled)
                | (Running, Cancelling)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Cancelling, Cancelled)
                | (Cancelling, Failed)
        )
    }
}

/// Failure classification attached to failed jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportErrorKind {
    SourceUnavailable,
    DecodeFailed,
    EncodeFailed,
    SinkFailed,
    Internal,
}

/// What went wrong, and where in the plan.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[error("export failed ({kind:?}) at instruction {instruction_index:?}: {message}")]
pub struct JobError {
    /// Index of the plan instruction being executed, when known.
    pub instruction_index: Option<usize>,
    pub kind: ExportErrorKind,
    pub message: String,
}

/// Final result of an export job, delivered exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded { output: PathBuf },
    Failed(JobError),
    Cancelled,
}

#[derive(Debug)]
struct JobRecord {
    state: JobState,
    error: Option<JobError>,
    cancel: CancelToken,
}

/// Caller-owned registry of export jobs.
///
/// The engine updates it as jobs move through their lifecycle; callers
/// use it to observe state, request cancellation, and consume finished
/// jobs with [`ExportJobRegistry::remove`].
#[derive(Debug, Default)]
pub struct ExportJobRegistry {
    jobs: Mutex<HashMap<JobId, JobRecord>>,
}

impl ExportJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, job_id: JobId, cancel: CancelToken) {
        let mut jobs = self.jobs.lock().expect("job registry poisoned");
        jobs.insert(
            job_id,
            JobRecord {
                state: JobState::Queued,
                error: None,
                cancel,
            },
        );
    }

    pub fn state(&self, job_id: &JobId) -> Option<JobState> {
        let jobs = self.jobs.lock().expect("job registry poisoned");
        jobs.get(job_id).map(|r| r.state)
    }

    pub fn error(&self, job_id: &JobId) -> Option<JobError> {
        let jobs = self.jobs.lock().expect("job registry poisoned");
        jobs.get(job_id).and_then(|r| r.error.clone())
    }

    /// Advance a job's state. Illegal transitions are ignored and
    /// logged so a late worker cannot resurrect a terminal job.
    pub(crate) fn set_state(&self, job_id: &JobId, next: JobState) -> bool {
        let mut jobs = self.jobs.lock().expect("job registry poisoned");
        let Some(record) = jobs.get_mut(job_id) else {
            return false;
        };
        if !record.state.can_transition_to(next) {
            tracing::warn!(
                job = %job_id,
                from = ?record.state,
                to = ?next,
                "Ignoring illegal job state transition"
            );
            return false;
        }
        record.state = next;
        true
    }

    pub(crate) fn set_error(&self, job_id: &JobId, error: JobError) {
        let mut jobs = self.jobs.lock().expect("job registry poisoned");
        if let Some(record) = jobs.get_mut(job_id) {
            record.error = Some(error);
        }
    }

    /// Request cancellation. Returns `false` for unknown or already
    /// terminal jobs. The job will end `Cancelled` (or `Failed` if an
    /// error lands first); it can never end `Succeeded` afterwards.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        let mut jobs = self.jobs.lock().expect("job registry poisoned");
        let Some(record) = jobs.get_mut(job_id) else {
            return false;
        };
        if record.state.is_terminal() {
            return false;
        }
        record.cancel.request();
        if record.state.can_transition_to(JobState::Cancelling) {
            record.state = JobState::Cancelling;
        }
        true
    }

    /// Consume a terminal job. Non-terminal jobs stay registered.
    pub fn remove(&self, job_id: &JobId) -> Option<(JobState, Option<JobError>)> {
        let mut jobs = self.jobs.lock().expect("job registry poisoned");
        match jobs.get(job_id) {
            Some(record) if record.state.is_terminal() => {
                let record = jobs.remove(job_id)?;
                Some((record.state, record.error))
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().expect("job registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
