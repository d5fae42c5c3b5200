//! Job orchestration: queueing, the render loop, cancellation, and
//! progress.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, watch, Semaphore};

use clipforge_common::config::ExportSettings;
use clipforge_plan_compiler::RenderPlan;

use crate::backend::{ExportBackend, FrameBuffer, FrameEncoder, ResolvedSource};
use crate::compositor::composite_frame;
use crate::job::{ExportErrorKind, ExportJobRegistry, JobError, JobId, JobOutcome, JobState};
use crate::progress::{CancelToken, ExportStage, ProgressEvent, ProgressReporter};
use crate::retry::RetryPolicy;
use crate::sink::ArtifactSink;

/// Inside long instructions, cancellation and progress are checked
/// every this many frames.
pub const CANCEL_CHECK_INTERVAL_FRAMES: u64 = 120;

/// Everything one export job needs.
pub struct ExportRequest {
    pub plan: RenderPlan,
    pub settings: ExportSettings,
    pub backend: ExportBackend,
    pub sink: Box<dyn ArtifactSink>,
}

/// Handle returned by [`ExportEngine::start`].
///
/// `events` is created before the worker runs, so the subscriber sees
/// every progress event from the first one on.
pub struct ExportHandle {
    pub job_id: JobId,
    pub events: broadcast::Receiver<ProgressEvent>,
    outcome: watch::Receiver<Option<JobOutcome>>,
    cancel: CancelToken,
}

impl ExportHandle {
    /// Request cancellation of this job.
    pub fn cancel(&self) {
        self.cancel.request();
    }

    /// Terminal outcome if the job has already finished.
    pub fn try_outcome(&self) -> Option<JobOutcome> {
        self.outcome.borrow().clone()
    }

    /// Wait for the terminal outcome.
    pub async fn wait(&mut self) -> JobOutcome {
        loop {
            if let Some(outcome) = self.outcome.borrow_and_update().clone() {
                return outcome;
            }
            if self.outcome.changed().await.is_err() {
                // Worker dropped without publishing; report rather
                // than hang.
                return JobOutcome::Failed(JobError {
                    instruction_index: None,
                    kind: ExportErrorKind::Internal,
                    message: "export worker terminated without an outcome".to_string(),
                });
            }
        }
    }
}

/// Schedules export jobs against a backend.
///
/// One job renders at a time per engine; additional requests queue in
/// start order. The registry is caller-owned and shared, never a
/// global.
pub struct ExportEngine {
    registry: Arc<ExportJobRegistry>,
    admission: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl ExportEngine {
    pub fn new(registry: Arc<ExportJobRegistry>) -> Self {
        Self {
            registry,
            admission: Arc::new(Semaphore::new(1)),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &Arc<ExportJobRegistry> {
        &self.registry
    }

    /// Queue a job and return immediately. Must be called within a
    /// tokio runtime; the render loop itself runs on the blocking
    /// pool.
    pub fn start(&self, request: ExportRequest) -> ExportHandle {
        let job_id = JobId::new();
        let cancel = CancelToken::new();
        self.registry.insert(job_id.clone(), cancel.clone());

        let (reporter, events, outcome) = ProgressReporter::new(job_id.clone());
        tracing::info!(
            job = %job_id,
            frames = request.plan.output_duration_frames,
            instructions = request.plan.instructions.len(),
            "Export job queued"
        );

        tokio::spawn(run_job(
            Arc::clone(&self.registry),
            Arc::clone(&self.admission),
            self.retry,
            job_id.clone(),
            request,
            reporter,
            cancel.clone(),
        ));

        ExportHandle {
            job_id,
            events,
            outcome,
            cancel,
        }
    }

    /// Request cancellation via the registry.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        self.registry.cancel(job_id)
    }
}

async fn run_job(
    registry: Arc<ExportJobRegistry>,
    admission: Arc<Semaphore>,
    retry: RetryPolicy,
    job_id: JobId,
    request: ExportRequest,
    mut reporter: ProgressReporter,
    cancel: CancelToken,
) {
    let Ok(permit) = Arc::clone(&admission).acquire_owned().await else {
        return;
    };

    if cancel.is_requested() {
        registry.set_state(&job_id, JobState::Cancelled);
        request.sink.discard();
        reporter.finish(JobOutcome::Cancelled);
        return;
    }

    registry.set_state(&job_id, JobState::Running);
    reporter.report(ExportStage::Preparing, 0, request.plan.output_duration_frames);

    let worker_id = job_id.clone();
    let result = tokio::task::spawn_blocking(move || {
        render_blocking(&worker_id, request, reporter, &cancel, &retry)
    })
    .await;
    drop(permit);

    match result {
        Ok(JobOutcome::Succeeded { .. }) => {
            registry.set_state(&job_id, JobState::Succeeded);
        }
        Ok(JobOutcome::Cancelled) => {
            registry.set_state(&job_id, JobState::Cancelled);
        }
        Ok(JobOutcome::Failed(error)) => {
            registry.set_error(&job_id, error);
            registry.set_state(&job_id, JobState::Failed);
        }
        Err(join_error) => {
            tracing::error!(job = %job_id, %join_error, "Export worker panicked");
            registry.set_error(
                &job_id,
                JobError {
                    instruction_index: None,
                    kind: ExportErrorKind::Internal,
                    message: join_error.to_string(),
                },
            );
            registry.set_state(&job_id, JobState::Failed);
        }
    }
}

/// The blocking render loop: resolve, decode, composite, encode.
fn render_blocking(
    job_id: &JobId,
    request: ExportRequest,
    mut reporter: ProgressReporter,
    cancel: &CancelToken,
    retry: &RetryPolicy,
) -> JobOutcome {
    let ExportRequest {
        plan,
        settings,
        backend,
        mut sink,
    } = request;
    let total_frames = plan.output_duration_frames;
    let started = std::time::Instant::now();

    let staged = match sink.stage() {
        Ok(path) => path,
        Err(err) => {
            return fail(None, sink, reporter, job_id, JobError {
                instruction_index: None,
                kind: ExportErrorKind::SinkFailed,
                message: err.to_string(),
            });
        }
    };

    let mut encoder = match backend.encoders.open(&settings, &staged) {
        Ok(encoder) => encoder,
        Err(err) => {
            return fail(None, sink, reporter, job_id, JobError {
                instruction_index: None,
                kind: err.kind(),
                message: err.to_string(),
            });
        }
    };

    let fps = plan.fps.max(1);
    let mut frames_done = 0u64;

    for (index, instruction) in plan.instructions.iter().enumerate() {
        if cancel.is_requested() {
            return cancelled(Some(encoder), sink, reporter, job_id);
        }

        // Resolve each distinct source once per instruction.
        let mut sources: HashMap<String, ResolvedSource> = HashMap::new();
        for layer in &instruction.layers {
            if !layer.kind.is_visual() {
                continue;
            }
            let Some(media_id) = &layer.source else {
                continue;
            };
            if sources.contains_key(media_id.as_str()) {
                continue;
            }
            match retry.run("resolve source", || backend.resolver.resolve(media_id)) {
                Ok(source) => {
                    sources.insert(media_id.as_str().to_string(), source);
                }
                Err(err) => {
                    return fail(Some(encoder), sink, reporter, job_id, JobError {
                        instruction_index: Some(index),
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                }
            }
        }

        for offset in 0..instruction.frames.len() {
            if offset > 0 && offset % CANCEL_CHECK_INTERVAL_FRAMES == 0 {
                if cancel.is_requested() {
                    return cancelled(Some(encoder), sink, reporter, job_id);
                }
                reporter.report(ExportStage::Rendering, frames_done, total_frames);
            }

            let mut layers: Vec<(FrameBuffer, clipforge_plan_compiler::Transform)> =
                Vec::with_capacity(instruction.layers.len());
            for layer in &instruction.layers {
                if !layer.kind.is_visual() || layer.transform.is_invisible() {
                    continue;
                }
                let Some(media_id) = &layer.source else {
                    // Text layers are composited upstream of this
                    // backend; skipped here.
                    continue;
                };
                let source = &sources[media_id.as_str()];
                let t = layer.source_time.start_secs + offset as f64 / f64::from(fps);
                match retry.run("decode frame", || backend.decoder.decode_frame(source, t)) {
                    Ok(frame) => layers.push((frame, layer.transform)),
                    Err(err) => {
                        return fail(Some(encoder), sink, reporter, job_id, JobError {
                            instruction_index: Some(index),
                            kind: err.kind(),
                            message: err.to_string(),
                        });
                    }
                }
            }

            let canvas = composite_frame(plan.canvas_width, plan.canvas_height, &layers);
            if let Err(err) = encoder.write_frame(&canvas) {
                // Encode failures are not retried.
                return fail(Some(encoder), sink, reporter, job_id, JobError {
                    instruction_index: Some(index),
                    kind: err.kind(),
                    message: err.to_string(),
                });
            }
            frames_done += 1;
        }

        reporter.report(ExportStage::Rendering, frames_done, total_frames);
    }

    if cancel.is_requested() {
        return cancelled(Some(encoder), sink, reporter, job_id);
    }

    reporter.report(ExportStage::Finalizing, frames_done, total_frames);
    if let Err(err) = encoder.finish() {
        return fail(None, sink, reporter, job_id, JobError {
            instruction_index: None,
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    // A cancel accepted while the encoder was finalizing must still
    // win: once requested, the job may only end Cancelled or Failed,
    // so nothing is committed past this point.
    if cancel.is_requested() {
        return cancelled(None, sink, reporter, job_id);
    }

    match sink.commit() {
        Ok(output) => {
            tracing::info!(
                job = %job_id,
                frames = frames_done,
                elapsed_secs = started.elapsed().as_secs_f64(),
                output = %output.display(),
                "Export finished"
            );
            let outcome = JobOutcome::Succeeded { output };
            reporter.finish(outcome.clone());
            outcome
        }
        Err(err) => {
            let error = JobError {
                instruction_index: None,
                kind: ExportErrorKind::SinkFailed,
                message: err.to_string(),
            };
            tracing::error!(job = %job_id, %error, "Export commit failed");
            let outcome = JobOutcome::Failed(error);
            reporter.finish(outcome.clone());
            outcome
        }
    }
}

fn fail(
    encoder: Option<Box<dyn FrameEncoder>>,
    sink: Box<dyn ArtifactSink>,
    reporter: ProgressReporter,
    job_id: &JobId,
    error: JobError,
) -> JobOutcome {
    tracing::error!(job = %job_id, %error, "Export failed");
    if let Some(encoder) = encoder {
        encoder.abort();
    }
    sink.discard();
    let outcome = JobOutcome::Failed(error);
    reporter.finish(outcome.clone());
    outcome
}

fn cancelled(
    encoder: Option<Box<dyn FrameEncoder>>,
    sink: Box<dyn ArtifactSink>,
    reporter: ProgressReporter,
    job_id: &JobId,
) -> JobOutcome {
    tracing::info!(job = %job_id, "Export cancelled");
    if let Some(encoder) = encoder {
        encoder.abort();
    }
    sink.discard();
    reporter.finish(JobOutcome::Cancelled);
    JobOutcome::Cancelled
}
