//! Effects render: probe, build the filter graph, encode.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use vexport_models::ProcessingParams;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{build_filter_graph, RenderSettings, SourceMedia};
use crate::probe::{probe_has_audio, probe_video};
use crate::progress::FfmpegProgress;

/// Local files for one render.
#[derive(Debug, Clone)]
pub struct EffectsInput {
    pub video: PathBuf,
    /// Uploaded audio; the video itself when the client sent none
    pub audio: PathBuf,
    pub output: PathBuf,
}

/// What a finished render produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    pub output: PathBuf,
    pub size_bytes: u64,
    /// Output length in seconds, 0 when the source duration was unknown
    pub duration: f64,
    pub elapsed_secs: f64,
}

/// Render `input` with `params`.
///
/// `on_progress` receives encoder progress and the expected output length in
/// milliseconds (0 when unknown).
pub async fn render_effects<F>(
    input: &EffectsInput,
    params: &ProcessingParams,
    settings: &RenderSettings,
    runner: &FfmpegRunner,
    mut on_progress: F,
) -> MediaResult<RenderReport>
where
    F: FnMut(&FfmpegProgress, i64) + Send + 'static,
{
    let start = Instant::now();

    let video_info = probe_video(&input.video).await?;
    let audio_has_audio = if same_file(&input.audio, &input.video) {
        video_info.has_audio
    } else {
        probe_has_audio(&input.audio).await?
    };

    let media = SourceMedia {
        duration: video_info.duration,
        video_has_audio: video_info.has_audio,
        audio_has_audio,
    };
    let graph = build_filter_graph(params, settings, &media);
    debug!(filter_complex = %graph.filter_complex, "Built effects graph");

    let cmd = FfmpegCommand::new(&input.video, &input.output)
        .add_input(&input.audio)
        .input_args(["-threads", "0"]);
    let cmd = settings.apply_encoding(graph.apply(cmd));

    if let Some(parent) = input.output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let total_ms = (graph.output_duration * 1000.0) as i64;
    runner
        .run_with_progress(&cmd, move |progress| on_progress(progress, total_ms))
        .await?;

    let size_bytes = tokio::fs::metadata(&input.output)
        .await
        .map_err(|_| MediaError::FileNotFound(input.output.clone()))?
        .len();
    if size_bytes == 0 {
        return Err(MediaError::ffmpeg_failed(
            "FFmpeg produced an empty file",
            None,
            None,
        ));
    }

    let elapsed_secs = start.elapsed().as_secs_f64();
    info!(
        output = %input.output.display(),
        size_bytes,
        duration = graph.output_duration,
        elapsed_secs,
        "Effects render complete"
    );

    Ok(RenderReport {
        output: input.output.clone(),
        size_bytes,
        duration: graph.output_duration,
        elapsed_secs,
    })
}

fn same_file(a: &Path, b: &Path) -> bool {
    a == b
        || match (a.canonicalize(), b.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
}
