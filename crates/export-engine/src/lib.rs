//! ClipForge Export Engine
//!
//! Drives a compiled [`RenderPlan`](clipforge_plan_compiler::RenderPlan)
//! through a transcoder backend: resolve sources, decode frames,
//! composite layers, encode. The engine owns job lifecycle (queueing,
//! a single running job, cancellation, retry) and publishes progress
//! over a broadcast channel with a watch-based terminal outcome.
//!
//! The transcoder itself is behind narrow traits in [`backend`]; the
//! production implementation in [`ffmpeg`] shells out to `ffmpeg` and
//! `ffprobe`.

pub mod backend;
pub mod compositor;
pub mod engine;
pub mod ffmpeg;
pub mod job;
pub mod progress;
pub mod retry;
pub mod sink;

pub use backend::*;
pub use compositor::*;
pub use engine::*;
pub use ffmpeg::*;
pub use job::*;
pub use progress::*;
pub use retry::*;
pub use sink::*;
