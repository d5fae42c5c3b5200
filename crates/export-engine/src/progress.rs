//! Progress publication and cancellation signalling.
//!
//! One producer per job. Progress events go out on a broadcast
//! channel; the terminal outcome is delivered exactly once through a
//! watch channel, after which the event channel closes and nothing
//! else is published.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::job::{JobId, JobOutcome};

/// Buffered events per subscriber before lag kicks in.
const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Where the job currently is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
    Failed,
    Cancelled,
}

/// A single progress report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub stage: ExportStage,

    /// Completion in `[0.0, 100.0]`, non-decreasing within a job.
    pub percent: f64,

    pub frames_done: u64,
    pub total_frames: u64,

    /// Estimated seconds remaining; 0 until progress exists.
    pub eta_secs: f64,
}

/// Shared cancellation flag. Once requested it never resets.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Producer side of a job's progress channel.
///
/// Enforces the publication contract: percent never decreases, and
/// [`ProgressReporter::finish`] consumes the reporter so no event can
/// follow the terminal one.
pub struct ProgressReporter {
    job_id: JobId,
    events: broadcast::Sender<ProgressEvent>,
    outcome: watch::Sender<Option<JobOutcome>>,
    last_percent: f64,
    started: Instant,
}

impl ProgressReporter {
    /// Create a reporter plus the receivers handed to the caller. The
    /// event receiver is created before the worker starts so no event
    /// is lost.
    pub fn new(
        job_id: JobId,
    ) -> (
        Self,
        broadcast::Receiver<ProgressEvent>,
        watch::Receiver<Option<JobOutcome>>,
    ) {
        let (events, events_rx) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        let (outcome, outcome_rx) = watch::channel(None);
        (
            Self {
                job_id,
                events,
                outcome,
                last_percent: 0.0,
                started: Instant::now(),
            },
            events_rx,
            outcome_rx,
        )
    }

    /// Publish a progress report. Percent is derived from frame
    /// counts and clamped so it never goes backwards.
    pub fn report(&mut self, stage: ExportStage, frames_done: u64, total_frames: u64) {
        let raw = if total_frames == 0 {
            100.0
        } else {
            frames_done as f64 * 100.0 / total_frames as f64
        };
        let percent = raw.clamp(self.last_percent, 100.0);
        self.last_percent = percent;

        let elapsed = self.started.elapsed().as_secs_f64();
        let eta_secs = if percent > 0.0 && percent < 100.0 {
            ((elapsed * 100.0 / percent) - elapsed).max(0.0)
        } else {
            0.0
        };

        // Send errors just mean nobody is listening right now.
        let _ = self.events.send(ProgressEvent {
            job_id: self.job_id.clone(),
            stage,
            percent,
            frames_done,
            total_frames,
            eta_secs,
        });
    }

    /// Publish the terminal event and outcome, consuming the reporter.
    pub fn finish(mut self, outcome: JobOutcome) {
        let (stage, percent) = match &outcome {
            JobOutcome::Succeeded { .. } => (ExportStage::Complete, 100.0),
            JobOutcome::Failed(_) => (ExportStage::Failed, self.last_percent),
            JobOutcome::Cancelled => (ExportStage::Cancelled, self.last_percent),
        };
        self.last_percent = percent;

        let _ = self.events.send(ProgressEvent {
            job_id: self.job_id.clone(),
            stage,
            percent,
            frames_done: 0,
            total_frames: 0,
            eta_secs: 0.0,
        });
        let _ = self.outcome.send(Some(outcome));
        // Dropping `self.events` closes the channel: subscribers see
        // the terminal event, then `Closed`.
    }
}
