#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the effects render.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeouts via tokio
//! - The effects filter graph (speed, zoom, saturation, intro, overlay, audio mix)
//! - Resolution of inline and remote job inputs

pub mod command;
pub mod effects;
pub mod error;
pub mod filters;
pub mod probe;
pub mod progress;
pub mod resolve;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use effects::{render_effects, EffectsInput, RenderReport};
pub use error::{MediaError, MediaResult};
pub use filters::{build_filter_graph, FilterGraph, RenderSettings, SourceMedia};
pub use probe::{probe_has_audio, probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use resolve::{decode_inline, InputResolver, DEFAULT_MAX_INPUT_BYTES};
