//! Production transcoder backend driving `ffmpeg`/`ffprobe`
//! subprocesses over rawvideo pipes.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};

use clipforge_common::config::{ExportFormat, ExportSettings};
use clipforge_common::error::{ClipForgeError, ClipForgeResult};
use clipforge_timeline_model::MediaKind;

use crate::backend::{
    BackendError, EncoderFactory, FrameBuffer, FrameDecoder, FrameEncoder, ResolvedSource,
};

/// Decoder and encoder factory backed by ffmpeg subprocesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegTranscoder;

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self
    }

    /// Whether `ffmpeg` is reachable on PATH.
    pub fn is_available(&self) -> bool {
        command_exists("ffmpeg")
    }

    pub fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

impl FrameDecoder for FfmpegTranscoder {
    fn decode_frame(
        &self,
        source: &ResolvedSource,
        source_time_secs: f64,
    ) -> Result<FrameBuffer, BackendError> {
        let (width, height) = if source.natural_width > 0 && source.natural_height > 0 {
            (source.natural_width, source.natural_height)
        } else {
            probe_media(&source.path)
                .ok()
                .map(|p| (p.width, p.height))
                .ok_or_else(|| {
                    BackendError::Decode(format!(
                        "unknown dimensions for {}",
                        source.path.display()
                    ))
                })?
        };

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostats"]);
        // Still images have no timeline to seek.
        if source.kind != MediaKind::Image {
            cmd.arg("-ss").arg(format!("{source_time_secs:.6}"));
        }
        cmd.arg("-i").arg(&source.path).args([
            "-frames:v",
            "1",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ]);

        let output = cmd
            .output()
            .map_err(|e| BackendError::Decode(format!("failed to start ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(BackendError::Decode(format!(
                "ffmpeg decode failed (status {}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let frame_len = width as usize * height as usize * 4;
        if output.stdout.len() < frame_len {
            return Err(BackendError::Decode(format!(
                "short frame from ffmpeg: got {} bytes, expected {}",
                output.stdout.len(),
                frame_len
            )));
        }

        let mut data = output.stdout;
        data.truncate(frame_len);
        Ok(FrameBuffer {
            width,
            height,
            data,
        })
    }
}

impl EncoderFactory for FfmpegTranscoder {
    fn open(
        &self,
        settings: &ExportSettings,
        output: &Path,
    ) -> Result<Box<dyn FrameEncoder>, BackendError> {
        FfmpegEncoder::open(settings, output).map(|e| Box::new(e) as Box<dyn FrameEncoder>)
    }
}

/// One running ffmpeg encode session fed rawvideo frames on stdin.
pub struct FfmpegEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: Option<std::thread::JoinHandle<String>>,
    frame_len: usize,
}

impl FfmpegEncoder {
    fn open(settings: &ExportSettings, output: &Path) -> Result<Self, BackendError> {
        let size = format!("{}x{}", settings.width, settings.height);
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-hide_banner", "-loglevel", "error", "-nostats"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgba", "-s", &size])
            .args(["-r", &settings.fps.to_string()])
            .args(["-i", "pipe:0"])
            .args(codec_args(settings))
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        tracing::debug!(output = %output.display(), format = ?settings.format, "Starting ffmpeg encoder");
        let mut child = cmd
            .spawn()
            .map_err(|e| BackendError::Encode(format!("failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BackendError::Encode("failed to open ffmpeg stdin".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BackendError::Encode("failed to capture ffmpeg stderr".to_string()))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full
        // pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = std::io::BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        Ok(Self {
            child,
            stdin: Some(stdin),
            stderr_task: Some(stderr_task),
            frame_len: settings.width as usize * settings.height as usize * 4,
        })
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr_task
            .take()
            .and_then(|task| task.join().ok())
            .unwrap_or_default()
    }
}

impl FrameEncoder for FfmpegEncoder {
    fn write_frame(&mut self, frame: &FrameBuffer) -> Result<(), BackendError> {
        if frame.data.len() != self.frame_len {
            return Err(BackendError::Encode(format!(
                "frame size mismatch: got {} bytes, encoder expects {}",
                frame.data.len(),
                self.frame_len
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| BackendError::Encode("encoder already closed".to_string()))?;
        stdin
            .write_all(&frame.data)
            .map_err(|e| BackendError::Encode(format!("failed writing frame to ffmpeg: {e}")))
    }

    fn finish(mut self: Box<Self>) -> Result<(), BackendError> {
        // Closing stdin signals end of stream.
        drop(self.stdin.take());
        let status = self
            .child
            .wait()
            .map_err(|e| BackendError::Encode(format!("failed to wait on ffmpeg: {e}")))?;
        let stderr = self.collect_stderr();
        if !status.success() {
            return Err(BackendError::Encode(format!(
                "ffmpeg encode failed (status {status}): {}",
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn abort(mut self: Box<Self>) {
        drop(self.stdin.take());
        if let Err(err) = self.child.kill() {
            tracing::debug!(%err, "ffmpeg already exited on abort");
        }
        let _ = self.child.wait();
        let _ = self.collect_stderr();
    }
}

/// Codec argument table per output format.
pub fn codec_args(settings: &ExportSettings) -> Vec<String> {
    let video_bitrate = format!("{}k", settings.video_bitrate_kbps.max(1000));

    let mut args: Vec<String> = match settings.format {
        ExportFormat::Mp4H264 => vec![
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-profile:v".to_string(),
            "high".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-b:v".to_string(),
            video_bitrate,
            "-movflags".to_string(),
            "+faststart".to_string(),
        ],
        ExportFormat::Mp4H265 => vec![
            "-c:v".to_string(),
            "libx265".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-b:v".to_string(),
            video_bitrate,
            "-movflags".to_string(),
            "+faststart".to_string(),
        ],
        ExportFormat::Webm => vec![
            "-c:v".to_string(),
            "libvpx-vp9".to_string(),
            "-b:v".to_string(),
            video_bitrate,
        ],
    };

    // The rawvideo pipe carries no audio stream.
    args.push("-an".to_string());
    args
}

fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Metadata extracted from a source file via ffprobe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaProbe {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

/// Probe a media file for dimensions and duration.
pub fn probe_media(path: &Path) -> ClipForgeResult<MediaProbe> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| ClipForgeError::source(format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(ClipForgeError::source(format!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let stream = value
        .get("streams")
        .and_then(|s| s.get(0))
        .cloned()
        .unwrap_or_default();
    let width = stream.get("width").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let height = stream.get("height").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let duration_secs = value
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|d| d.as_str())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(MediaProbe {
        duration_secs,
        width,
        height,
    })
}
