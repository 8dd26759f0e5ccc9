//! Source media references and processing results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where a piece of source media comes from.
///
/// The core never looks inside; resolution happens in the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaSource {
    /// Base64-encoded file contents sent with the request
    Inline {
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    /// Fetchable location
    Url { url: String },
}

impl MediaSource {
    /// Create an inline source from already-encoded base64 data.
    pub fn inline(data: impl Into<String>, filename: Option<String>) -> Self {
        MediaSource::Inline {
            data: data.into(),
            filename,
        }
    }

    /// Create a URL source.
    pub fn url(url: impl Into<String>) -> Self {
        MediaSource::Url { url: url.into() }
    }

    /// Short description safe for logs (no payload, no query string).
    pub fn describe(&self) -> String {
        match self {
            MediaSource::Inline { data, filename } => format!(
                "inline:{} ({} b64 chars)",
                filename.as_deref().unwrap_or("unnamed"),
                data.len()
            ),
            MediaSource::Url { url } => match url::Url::parse(url) {
                Ok(parsed) => format!(
                    "url:{}{}",
                    parsed.host_str().unwrap_or("?"),
                    parsed.path()
                ),
                Err(_) => "url:<unparseable>".to_string(),
            },
        }
    }
}

/// Resolved inputs for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobInputs {
    /// Video to transform
    pub video: MediaSource,

    /// Audio to mix over the video; when absent the video's own track is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaSource>,
}

impl JobInputs {
    pub fn new(video: MediaSource, audio: Option<MediaSource>) -> Self {
        Self { video, audio }
    }

    pub fn video_only(video: MediaSource) -> Self {
        Self { video, audio: None }
    }

    /// Audio source, falling back to the video.
    pub fn audio_or_video(&self) -> &MediaSource {
        self.audio.as_ref().unwrap_or(&self.video)
    }
}

/// Reference to a finished output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultRef {
    /// Base64-encoded output file
    Inline { data: String, filename: String },
    /// Object-storage or other fetchable location
    Location { url: String },
}

/// Successful processing output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobResult {
    pub result_ref: ResultRef,
    /// Output size in bytes
    pub size_bytes: u64,
}

impl JobResult {
    /// Size in megabytes, for display.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}
