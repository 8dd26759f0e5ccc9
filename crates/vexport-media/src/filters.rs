//! Effects filter graph.
//!
//! Builds one `-filter_complex` from [`ProcessingParams`]. Input 0 is the
//! video, input 1 the uploaded audio (which may be the video file again).

use vexport_models::{IntroAnimation, ProcessingParams};

use crate::command::FfmpegCommand;

/// Label of the final video stream.
pub const VIDEO_OUT: &str = "[v_out]";

/// Label of the final audio stream.
pub const AUDIO_OUT: &str = "[a_out]";

/// Box blur radius used by the blur-to-clear intro.
const INTRO_BLUR_RADIUS: u32 = 20;

/// Output frame and encoder settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// `slow`/CRF 18/AAC 320k instead of `medium`/CRF 23/AAC 128k
    pub high_quality: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 90,
            high_quality: true,
        }
    }
}

impl RenderSettings {
    /// Add codec and quality arguments to a command.
    pub fn apply_encoding(&self, cmd: FfmpegCommand) -> FfmpegCommand {
        let (preset, crf, audio_bitrate) = if self.high_quality {
            ("slow", 18, "320k")
        } else {
            ("medium", 23, "128k")
        };

        cmd.video_codec("libx264")
            .preset(preset)
            .crf(crf)
            .pixel_format("yuv420p")
            .audio_codec("aac")
            .audio_bitrate(audio_bitrate)
            .output_args(["-movflags", "+faststart"])
    }
}

/// What probing revealed about the inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceMedia {
    /// Video duration in seconds, 0 when unknown
    pub duration: f64,
    pub video_has_audio: bool,
    pub audio_has_audio: bool,
}

/// A complete filter graph plus how to map it.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    pub filter_complex: String,
    /// `None` when neither input carries audio
    pub audio_out: Option<&'static str>,
    /// Expected output length in seconds, 0 when unknown
    pub output_duration: f64,
    /// Whether `-shortest` is needed to bound looped audio
    pub shortest: bool,
}

impl FilterGraph {
    /// Add the graph and stream mapping to a command.
    pub fn apply(&self, cmd: FfmpegCommand) -> FfmpegCommand {
        let mut cmd = cmd.filter_complex(&self.filter_complex).map(VIDEO_OUT);
        if let Some(audio) = self.audio_out {
            cmd = cmd.map(audio);
        }
        if self.shortest {
            cmd = cmd.shortest();
        }
        cmd
    }
}

/// Build the full graph for one job.
pub fn build_filter_graph(
    params: &ProcessingParams,
    render: &RenderSettings,
    media: &SourceMedia,
) -> FilterGraph {
    let output_duration = if media.duration > 0.0 {
        media.duration / params.video_speed
    } else {
        0.0
    };

    let mut chains = vec![format!("[0:v]{}{}", video_filters(params, render).join(","), VIDEO_OUT)];

    let (audio_chains, audio_out) = audio_filters(params, media, output_duration);
    chains.extend(audio_chains);

    FilterGraph {
        filter_complex: chains.join(";"),
        audio_out,
        output_duration,
        shortest: output_duration <= 0.0 && audio_out.is_some(),
    }
}

/// Video filter chain for input 0, in application order.
pub fn video_filters(params: &ProcessingParams, render: &RenderSettings) -> Vec<String> {
    let (w, h) = (render.width, render.height);
    let mut filters = Vec::new();

    if params.video_speed != 1.0 {
        filters.push(format!("setpts=PTS/{}", params.video_speed));
    }

    filters.push(format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black"
    ));

    if params.zoom_factor != 1.0 {
        let zoom = params.zoom_factor;
        filters.push(format!(
            "scale=trunc(iw*{zoom}/2)*2:trunc(ih*{zoom}/2)*2"
        ));
        if zoom > 1.0 {
            filters.push(format!("crop={w}:{h}"));
        } else {
            filters.push(format!("pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black"));
        }
    }

    if params.saturation != 1.0 {
        filters.push(format!("hue=s={}", params.saturation));
    }

    let intro = params.intro_duration;
    if intro > 0.0 {
        match params.intro() {
            IntroAnimation::BlurToClear => {
                filters.push(format!("boxblur={INTRO_BLUR_RADIUS}:enable='lt(t,{intro})'"))
            }
            IntroAnimation::FadeIn => filters.push(format!("fade=t=in:st=0:d={intro}")),
            IntroAnimation::None => {}
        }
    }

    if let Some((r, g, b)) = params.overlay_rgb() {
        let opacity = params.color_overlay_opacity;
        if opacity > 0.0 {
            let keep = 1.0 - opacity;
            filters.push(format!(
                "geq=r='r(X,Y)*{keep}+{r}*{opacity}':g='g(X,Y)*{keep}+{g}*{opacity}':b='b(X,Y)*{keep}+{b}*{opacity}'"
            ));
        }
    }

    filters.push(format!("fps={},format=yuv420p", render.fps));
    filters
}

/// Audio chains and the label of the mixed result.
fn audio_filters(
    params: &ProcessingParams,
    media: &SourceMedia,
    output_duration: f64,
) -> (Vec<String>, Option<&'static str>) {
    let mut chains = Vec::new();
    let mut tracks = Vec::new();

    if media.video_has_audio {
        let mut filters = Vec::new();
        if params.video_speed != 1.0 {
            filters.push(format!("atempo={}", params.video_speed));
        }
        filters.push(volume_filter(params.original_audio_volume));
        chains.push(format!("[0:a]{}[orig_a]", filters.join(",")));
        tracks.push("[orig_a]");
    }

    if media.audio_has_audio {
        chains.push(format!(
            "[1:a]{}[upload_a]",
            volume_filter(params.uploaded_audio_volume)
        ));
        let mut label = "[upload_a]";

        if params.audio_noise > 0.0 && output_duration > 0.0 {
            chains.push(format!(
                "anoisesrc=d={output_duration}:c=pink:r=48000:a={}[noise]",
                params.audio_noise
            ));
            chains.push(format!(
                "{label}[noise]amix=inputs=2:duration=first[upload_noisy]"
            ));
            label = "[upload_noisy]";
        }

        // Loop the uploaded track to cover the whole video
        if output_duration > 0.0 {
            chains.push(format!(
                "{label}aloop=loop=-1:size=2e+09,atrim=end={output_duration}[upload_final]"
            ));
        } else {
            chains.push(format!("{label}aloop=loop=-1:size=2e+09[upload_final]"));
        }
        tracks.push("[upload_final]");
    }

    match tracks.as_slice() {
        [] => (chains, None),
        [single] => {
            chains.push(format!("{single}anull{AUDIO_OUT}"));
            (chains, Some(AUDIO_OUT))
        }
        _ => {
            chains.push(format!(
                "{}amix=inputs={}:duration=longest{AUDIO_OUT}",
                tracks.concat(),
                tracks.len()
            ));
            (chains, Some(AUDIO_OUT))
        }
    }
}

fn volume_filter(volume: f64) -> String {
    if volume == 1.0 {
        "anull".to_string()
    } else {
        format!("volume={}", volume)
    }
}
