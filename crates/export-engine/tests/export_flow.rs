//! End-to-end engine behavior against a mock backend: success,
//! retries, failure classification, cancellation, and queueing.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use clipforge_common::config::ExportSettings;
use clipforge_common::time::TimeRange;
use clipforge_export_engine::{
    BackendError, EncoderFactory, ExportBackend, ExportEngine, ExportErrorKind,
    ExportJobRegistry, ExportRequest, ExportStage, FileSink, FrameBuffer, FrameDecoder,
    FrameEncoder, JobOutcome, JobState, MediaResolver, ResolvedSource, RetryPolicy,
};
use clipforge_plan_compiler::{FrameRange, Instruction, Layer, RenderPlan, Transform};
use clipforge_timeline_model::{MediaId, MediaKind};

fn test_media_id() -> MediaId {
    MediaId::from_content(b"test-source")
}

fn layer(start_secs: f64, end_secs: f64) -> Layer {
    Layer {
        element_id: "el-1".to_string(),
        kind: MediaKind::Video,
        source: Some(test_media_id()),
        source_time: TimeRange::new(start_secs, end_secs),
        track_order: 0,
        transform: Transform::IDENTITY,
        text: None,
    }
}

/// A plan with two instructions: frames [0, 5) with one layer,
/// frames [5, 10) empty.
fn two_instruction_plan() -> RenderPlan {
    RenderPlan {
        output_duration_frames: 10,
        fps: 30,
        canvas_width: 4,
        canvas_height: 4,
        instructions: vec![
            Instruction {
                frames: FrameRange::new(0, 5),
                layers: vec![layer(0.0, 5.0 / 30.0)],
            },
            Instruction {
                frames: FrameRange::new(5, 10),
                layers: vec![],
            },
        ],
    }
}

struct MockResolver {
    known: bool,
}

impl MediaResolver for MockResolver {
    fn resolve(&self, id: &MediaId) -> Result<ResolvedSource, BackendError> {
        if !self.known {
            return Err(BackendError::SourceUnavailable("gone".to_string()));
        }
        Ok(ResolvedSource {
            media_id: id.clone(),
            kind: MediaKind::Video,
            path: "/dev/null".into(),
            duration_secs: 60.0,
            natural_width: 4,
            natural_height: 4,
        })
    }
}

#[derive(Default)]
struct MockDecoder {
    calls: AtomicUsize,
    failures_remaining: AtomicUsize,
    fail_from_call: AtomicUsize,
    started: Mutex<Option<mpsc::Sender<()>>>,
    gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl MockDecoder {
    fn failing(count: usize) -> Self {
        let decoder = Self::default();
        decoder.failures_remaining.store(count, Ordering::SeqCst);
        decoder
    }

    /// Succeeds for the first `count` calls, then fails every call.
    fn failing_after(count: usize) -> Self {
        let decoder = Self::default();
        decoder.fail_from_call.store(count, Ordering::SeqCst);
        decoder
    }

    /// Decoder that signals `started` on its first call and then
    /// blocks until the paired sender fires.
    fn gated() -> (Self, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let decoder = Self {
            started: Mutex::new(Some(started_tx)),
            gate: Mutex::new(Some(release_rx)),
            ..Self::default()
        };
        (decoder, started_rx, release_tx)
    }
}

impl FrameDecoder for MockDecoder {
    fn decode_frame(
        &self,
        _source: &ResolvedSource,
        _source_time_secs: f64,
    ) -> Result<FrameBuffer, BackendError> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(started) = self.started.lock().unwrap().take() {
            let _ = started.send(());
        }
        if let Some(gate) = self.gate.lock().unwrap().take() {
            let _ = gate.recv();
        }
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(BackendError::Decode("flaky decoder".to_string()));
        }
        let fail_from = self.fail_from_call.load(Ordering::SeqCst);
        if fail_from > 0 && call_index >= fail_from {
            return Err(BackendError::Decode("decoder lost the stream".to_string()));
        }
        Ok(FrameBuffer::solid(4, 4, [10, 20, 30, 255]))
    }
}

#[derive(Default)]
struct MockEncoders {
    opened: AtomicUsize,
    frames: Arc<AtomicUsize>,
    finish_started: Mutex<Option<mpsc::Sender<()>>>,
    finish_gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl MockEncoders {
    /// Encoder factory whose encoder signals `finishing` when
    /// `finish` is entered and then blocks until the paired sender
    /// fires.
    fn gated_finish() -> (Self, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (finishing_tx, finishing_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let encoders = Self {
            finish_started: Mutex::new(Some(finishing_tx)),
            finish_gate: Mutex::new(Some(release_rx)),
            ..Self::default()
        };
        (encoders, finishing_rx, release_tx)
    }
}

struct MockEncoder {
    frames: Arc<AtomicUsize>,
    finish_started: Option<mpsc::Sender<()>>,
    finish_gate: Option<mpsc::Receiver<()>>,
}

impl EncoderFactory for MockEncoders {
    fn open(
        &self,
        _settings: &ExportSettings,
        output: &Path,
    ) -> Result<Box<dyn FrameEncoder>, BackendError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        std::fs::write(output, b"")
            .map_err(|e| BackendError::Encode(e.to_string()))?;
        Ok(Box::new(MockEncoder {
            frames: Arc::clone(&self.frames),
            finish_started: self.finish_started.lock().unwrap().take(),
            finish_gate: self.finish_gate.lock().unwrap().take(),
        }))
    }
}

impl FrameEncoder for MockEncoder {
    fn write_frame(&mut self, _frame: &FrameBuffer) -> Result<(), BackendError> {
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), BackendError> {
        if let Some(finishing) = self.finish_started {
            let _ = finishing.send(());
        }
        if let Some(gate) = self.finish_gate {
            let _ = gate.recv();
        }
        Ok(())
    }

    fn abort(self: Box<Self>) {}
}

struct TestRig {
    registry: Arc<ExportJobRegistry>,
    engine: ExportEngine,
    encoders: Arc<MockEncoders>,
    decoder: Arc<MockDecoder>,
}

fn rig(decoder: MockDecoder) -> TestRig {
    rig_with(decoder, MockEncoders::default())
}

fn rig_with(decoder: MockDecoder, encoders: MockEncoders) -> TestRig {
    let registry = Arc::new(ExportJobRegistry::new());
    let engine = ExportEngine::new(Arc::clone(&registry)).with_retry_policy(RetryPolicy {
        max_attempts: 2,
        initial_backoff: std::time::Duration::from_millis(1),
    });
    let encoders = Arc::new(encoders);
    let decoder = Arc::new(decoder);
    TestRig {
        registry,
        engine,
        encoders,
        decoder,
    }
}

impl TestRig {
    fn backend(&self, resolver_known: bool) -> ExportBackend {
        ExportBackend {
            resolver: Arc::new(MockResolver {
                known: resolver_known,
            }),
            decoder: Arc::clone(&self.decoder) as Arc<dyn FrameDecoder>,
            encoders: Arc::clone(&self.encoders) as Arc<dyn EncoderFactory>,
        }
    }

    fn request(&self, resolver_known: bool, destination: &Path) -> ExportRequest {
        ExportRequest {
            plan: two_instruction_plan(),
            settings: ExportSettings::default(),
            backend: self.backend(resolver_known),
            sink: Box::new(FileSink::new(destination)),
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_export_succeeds_and_commits() {
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("out.mp4");
    let rig = rig(MockDecoder::default());

    let mut handle = rig.engine.start(rig.request(true, &destination));
    let outcome = handle.wait().await;

    assert_eq!(
        outcome,
        JobOutcome::Succeeded {
            output: destination.clone()
        }
    );
    assert!(destination.exists());
    assert!(!dir.path().join("out.mp4.part").exists());
    assert_eq!(rig.encoders.frames.load(Ordering::SeqCst), 10);
    assert_eq!(
        rig.registry.state(&handle.job_id),
        Some(JobState::Succeeded)
    );

    // Progress contract: starts Preparing, percent non-decreasing,
    // ends with a single Complete event and nothing after.
    let mut events = Vec::new();
    while let Ok(event) = handle.events.recv().await {
        events.push(event);
    }
    assert_eq!(events.first().unwrap().stage, ExportStage::Preparing);
    let mut last = 0.0;
    for event in &events {
        assert!(event.percent >= last, "percent went backwards");
        last = event.percent;
    }
    let terminal: Vec<_> = events
        .iter()
        .filter(|e| e.stage == ExportStage::Complete)
        .collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(events.last().unwrap().stage, ExportStage::Complete);
    assert!((events.last().unwrap().percent - 100.0).abs() < 1e-9);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_transient_decode_failure_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("out.mp4");
    let rig = rig(MockDecoder::failing(1));

    let mut handle = rig.engine.start(rig.request(true, &destination));
    let outcome = handle.wait().await;

    assert!(matches!(outcome, JobOutcome::Succeeded { .. }));
    // 10 composited frames but only 5 carry a layer; one extra call
    // for the retried failure.
    assert_eq!(rig.decoder.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_persistent_decode_failure_fails_job() {
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("out.mp4");
    let rig = rig(MockDecoder::failing(usize::MAX / 2));

    let mut handle = rig.engine.start(rig.request(true, &destination));
    let outcome = handle.wait().await;

    let JobOutcome::Failed(error) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(error.kind, ExportErrorKind::DecodeFailed);
    assert_eq!(error.instruction_index, Some(0));
    assert!(!destination.exists());
    assert!(!dir.path().join("out.mp4.part").exists());
    assert_eq!(rig.registry.state(&handle.job_id), Some(JobState::Failed));
    assert_eq!(
        rig.registry.error(&handle.job_id).unwrap().kind,
        ExportErrorKind::DecodeFailed
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unavailable_source_fails_job() {
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("out.mp4");
    let rig = rig(MockDecoder::default());

    let mut handle = rig.engine.start(rig.request(false, &destination));
    let outcome = handle.wait().await;

    let JobOutcome::Failed(error) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(error.kind, ExportErrorKind::SourceUnavailable);
    assert_eq!(error.instruction_index, Some(0));
    assert_eq!(rig.decoder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_discards_output() {
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("out.mp4");
    let (decoder, started, release) = MockDecoder::gated();
    let rig = rig(decoder);

    let mut handle = rig.engine.start(rig.request(true, &destination));

    // Wait for the worker to hit the first decode, cancel, then let
    // it continue; the cancel lands at the next boundary check.
    tokio::task::spawn_blocking(move || started.recv().unwrap())
        .await
        .unwrap();
    handle.cancel();
    release.send(()).unwrap();

    let outcome = handle.wait().await;
    assert_eq!(outcome, JobOutcome::Cancelled);
    assert!(!destination.exists());
    assert!(!dir.path().join("out.mp4.part").exists());
    assert_eq!(
        rig.registry.state(&handle.job_id),
        Some(JobState::Cancelled)
    );

    let mut events = Vec::new();
    while let Ok(event) = handle.events.recv().await {
        events.push(event);
    }
    assert_eq!(events.last().unwrap().stage, ExportStage::Cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_during_finalize_discards_output() {
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("out.mp4");
    let (encoders, finishing, release) = MockEncoders::gated_finish();
    let rig = rig_with(MockDecoder::default(), encoders);

    let mut handle = rig.engine.start(rig.request(true, &destination));

    // Cancel through the registry while the encoder is blocked inside
    // finish; the accepted cancel must win over the pending commit.
    tokio::task::spawn_blocking(move || finishing.recv().unwrap())
        .await
        .unwrap();
    assert!(rig.registry.cancel(&handle.job_id));
    assert_eq!(
        rig.registry.state(&handle.job_id),
        Some(JobState::Cancelling)
    );
    release.send(()).unwrap();

    let outcome = handle.wait().await;
    assert_eq!(outcome, JobOutcome::Cancelled);
    assert!(!destination.exists());
    assert!(!dir.path().join("out.mp4.part").exists());
    assert_eq!(
        rig.registry.state(&handle.job_id),
        Some(JobState::Cancelled)
    );

    let mut events = Vec::new();
    while let Ok(event) = handle.events.recv().await {
        events.push(event);
    }
    assert_eq!(events.last().unwrap().stage, ExportStage::Cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failure_reports_failing_instruction_index() {
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("out.mp4");
    // First instruction's 5 frames decode clean; every decode after
    // that fails, so the job dies in the second instruction.
    let rig = rig(MockDecoder::failing_after(5));

    let request = ExportRequest {
        plan: RenderPlan {
            output_duration_frames: 10,
            fps: 30,
            canvas_width: 4,
            canvas_height: 4,
            instructions: vec![
                Instruction {
                    frames: FrameRange::new(0, 5),
                    layers: vec![layer(0.0, 5.0 / 30.0)],
                },
                Instruction {
                    frames: FrameRange::new(5, 10),
                    layers: vec![layer(5.0 / 30.0, 10.0 / 30.0)],
                },
            ],
        },
        settings: ExportSettings::default(),
        backend: rig.backend(true),
        sink: Box::new(FileSink::new(&destination)),
    };

    let mut handle = rig.engine.start(request);
    let JobOutcome::Failed(error) = handle.wait().await else {
        panic!("expected failure");
    };
    assert_eq!(error.kind, ExportErrorKind::DecodeFailed);
    assert_eq!(error.instruction_index, Some(1));
    // 5 clean decodes, then the failing frame and its one retry.
    assert_eq!(rig.decoder.calls.load(Ordering::SeqCst), 7);
    assert_eq!(rig.encoders.frames.load(Ordering::SeqCst), 5);
    assert!(!destination.exists());
    assert!(!dir.path().join("out.mp4.part").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_job_queues_behind_running_job() {
    let dir = tempfile::tempdir().unwrap();
    let (decoder, started, release) = MockDecoder::gated();
    let rig = rig(decoder);

    let mut first = rig.engine.start(rig.request(true, &dir.path().join("a.mp4")));
    tokio::task::spawn_blocking(move || started.recv().unwrap())
        .await
        .unwrap();

    let mut second = rig
        .engine
        .start(rig.request(true, &dir.path().join("b.mp4")));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(rig.registry.state(&second.job_id), Some(JobState::Queued));

    release.send(()).unwrap();
    assert!(matches!(first.wait().await, JobOutcome::Succeeded { .. }));
    assert!(matches!(second.wait().await, JobOutcome::Succeeded { .. }));
    assert!(dir.path().join("a.mp4").exists());
    assert!(dir.path().join("b.mp4").exists());
    assert_eq!(rig.encoders.opened.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_while_queued_never_runs() {
    let dir = tempfile::tempdir().unwrap();
    let (decoder, started, release) = MockDecoder::gated();
    let rig = rig(decoder);

    let mut first = rig.engine.start(rig.request(true, &dir.path().join("a.mp4")));
    tokio::task::spawn_blocking(move || started.recv().unwrap())
        .await
        .unwrap();

    let mut second = rig
        .engine
        .start(rig.request(true, &dir.path().join("b.mp4")));
    assert!(rig.engine.cancel(&second.job_id));
    release.send(()).unwrap();

    assert!(matches!(first.wait().await, JobOutcome::Succeeded { .. }));
    assert_eq!(second.wait().await, JobOutcome::Cancelled);
    assert!(!dir.path().join("b.mp4").exists());
    // Only the first job ever opened an encoder.
    assert_eq!(rig.encoders.opened.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_plan_succeeds_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("out.mp4");
    let rig = rig(MockDecoder::default());

    let request = ExportRequest {
        plan: RenderPlan {
            output_duration_frames: 0,
            fps: 30,
            canvas_width: 4,
            canvas_height: 4,
            instructions: vec![],
        },
        settings: ExportSettings::default(),
        backend: rig.backend(true),
        sink: Box::new(FileSink::new(&destination)),
    };

    let mut handle = rig.engine.start(request);
    assert!(matches!(handle.wait().await, JobOutcome::Succeeded { .. }));
    assert!(destination.exists());
    assert_eq!(rig.encoders.frames.load(Ordering::SeqCst), 0);
}
