//! The narrow contract between the engine and a transcoder backend.
//!
//! The engine only ever asks a backend to resolve a media id to a
//! concrete source, decode one frame at a source-local timestamp, and
//! encode composited canvas frames. Everything else (job lifecycle,
//! retry, progress, compositing) stays on the engine side, so a
//! backend swap never touches scheduling code.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clipforge_common::config::ExportSettings;
use clipforge_timeline_model::{MediaId, MediaKind, MediaRegistry};

use crate::job::ExportErrorKind;

/// An owned RGBA8 frame. Release is an explicit move: the engine drops
/// buffers as soon as a frame is composited and encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,

    /// Row-major RGBA bytes, `width * height * 4` long.
    pub data: Vec<u8>,
}

impl FrameBuffer {
    pub fn black(width: u32, height: u32) -> Self {
        Self::solid(width, height, [0, 0, 0, 255])
    }

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// RGBA at `(x, y)`; panics out of bounds, test/composite use only.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }
}

/// A media id resolved to something the decoder can open.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSource {
    pub media_id: MediaId,
    pub kind: MediaKind,
    pub path: PathBuf,
    pub duration_secs: f64,
    pub natural_width: u32,
    pub natural_height: u32,
}

/// Backend-side failures, classified for retry and job error
/// reporting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("encode failed: {0}")]
    Encode(String),
}

impl BackendError {
    pub fn kind(&self) -> ExportErrorKind {
        match self {
            BackendError::SourceUnavailable(_) => ExportErrorKind::SourceUnavailable,
            BackendError::Decode(_) => ExportErrorKind::DecodeFailed,
            BackendError::Encode(_) => ExportErrorKind::EncodeFailed,
        }
    }
}

/// Resolves media ids to decodable sources.
pub trait MediaResolver: Send + Sync {
    fn resolve(&self, id: &MediaId) -> Result<ResolvedSource, BackendError>;
}

/// Decodes a single frame at a source-local timestamp, at the source's
/// natural resolution.
pub trait FrameDecoder: Send + Sync {
    fn decode_frame(
        &self,
        source: &ResolvedSource,
        source_time_secs: f64,
    ) -> Result<FrameBuffer, BackendError>;
}

/// An open encoding session writing canvas frames to one output file.
pub trait FrameEncoder: Send {
    fn write_frame(&mut self, frame: &FrameBuffer) -> Result<(), BackendError>;

    /// Flush and close the output. Consumes the session.
    fn finish(self: Box<Self>) -> Result<(), BackendError>;

    /// Tear down without producing a usable output.
    fn abort(self: Box<Self>);
}

/// Opens encoder sessions for a given output path and settings.
pub trait EncoderFactory: Send + Sync {
    fn open(
        &self,
        settings: &ExportSettings,
        output: &Path,
    ) -> Result<Box<dyn FrameEncoder>, BackendError>;
}

/// The full backend the engine runs against. Pieces are separately
/// swappable, which is what the tests rely on.
#[derive(Clone)]
pub struct ExportBackend {
    pub resolver: Arc<dyn MediaResolver>,
    pub decoder: Arc<dyn FrameDecoder>,
    pub encoders: Arc<dyn EncoderFactory>,
}

/// Resolver backed by the project's media registry: the registered
/// `source_handle` is a filesystem path.
pub struct RegistryResolver {
    registry: Arc<MediaRegistry>,
}

impl RegistryResolver {
    pub fn new(registry: Arc<MediaRegistry>) -> Self {
        Self { registry }
    }
}

impl MediaResolver for RegistryResolver {
    fn resolve(&self, id: &MediaId) -> Result<ResolvedSource, BackendError> {
        let reference = self.registry.get(id).ok_or_else(|| {
            BackendError::SourceUnavailable(format!("media {} is not registered", id.as_str()))
        })?;

        let path = PathBuf::from(&reference.source_handle);
        if !path.exists() {
            return Err(BackendError::SourceUnavailable(format!(
                "source file missing: {}",
                path.display()
            )));
        }

        Ok(ResolvedSource {
            media_id: reference.id.clone(),
            kind: reference.kind,
            path,
            duration_secs: reference.duration_secs,
            natural_width: reference.natural_width,
            natural_height: reference.natural_height,
        })
    }
}
