//! Default processor: FFmpeg effects render.

use std::path::PathBuf;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, Instrument};

use vexport_media::{render_effects, EffectsInput, FfmpegRunner, InputResolver, RenderSettings};
use vexport_models::{JobResult, ResultRef};
use vexport_queue::ProgressReporter;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::processor::{JobProcessor, ProcessingRequest};

const OUTPUT_FILENAME: &str = "processed_video.mp4";

/// Encode progress is mapped onto this range of the job's percentage.
const ENCODE_START: u8 = 20;
const ENCODE_END: u8 = 95;

/// Resolves inputs into a per-job temp dir, renders, returns the file inline.
#[derive(Debug, Clone)]
pub struct EffectsProcessor {
    resolver: InputResolver,
    render: RenderSettings,
    runner: FfmpegRunner,
    work_dir: PathBuf,
}

impl EffectsProcessor {
    pub fn new(config: &WorkerConfig) -> WorkerResult<Self> {
        Ok(Self {
            resolver: InputResolver::new(config.download_timeout)?,
            render: config.render.settings(),
            runner: FfmpegRunner::new(),
            work_dir: config.work_dir.clone(),
        })
    }

    /// Replace the input resolver.
    pub fn with_resolver(mut self, resolver: InputResolver) -> Self {
        self.resolver = resolver;
        self
    }
}

#[async_trait]
impl JobProcessor for EffectsProcessor {
    async fn process(
        &self,
        request: ProcessingRequest,
        progress: ProgressReporter,
    ) -> WorkerResult<JobResult> {
        let span = tracing::info_span!("effects", job_id = %request.job_id);
        async move {
            progress.report_with_message(5, "Preparing inputs").await;

            tokio::fs::create_dir_all(&self.work_dir).await?;
            let dir = tempfile::Builder::new()
                .prefix(&format!("job-{}-", request.job_id))
                .tempdir_in(&self.work_dir)?;

            let video = self
                .resolver
                .resolve(&request.inputs.video, dir.path(), "video")
                .await?;
            progress.report(10).await;

            let audio = match &request.inputs.audio {
                Some(source) => self.resolver.resolve(source, dir.path(), "audio").await?,
                None => video.clone(),
            };
            progress.report_with_message(15, "Inputs ready").await;

            let input = EffectsInput {
                video,
                audio,
                output: dir.path().join(OUTPUT_FILENAME),
            };

            progress
                .report_with_message(ENCODE_START, "Applying effects")
                .await;
            let reporter = progress.clone();
            let mut last = ENCODE_START;
            let report = render_effects(
                &input,
                &request.params,
                &self.render,
                &self.runner,
                move |p, total_ms| {
                    let percent = p.scaled(total_ms, ENCODE_START, ENCODE_END);
                    if percent > last && reporter.try_report(percent) {
                        last = percent;
                        debug!(percent, eta = ?p.eta_seconds(total_ms), "Encode progress");
                    }
                },
            )
            .await?;

            progress
                .report_with_message(ENCODE_END, "Preparing download")
                .await;
            let bytes = tokio::fs::read(&report.output).await?;
            let result = JobResult {
                result_ref: ResultRef::Inline {
                    data: STANDARD.encode(&bytes),
                    filename: OUTPUT_FILENAME.to_string(),
                },
                size_bytes: report.size_bytes,
            };
            progress.report(100).await;

            Ok::<_, WorkerError>(result)
        }
        .instrument(span)
        .await
    }

    fn name(&self) -> &'static str {
        "effects"
    }
}
