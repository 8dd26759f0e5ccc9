//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use vexport_media::RenderSettings;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Upper bound on a single job
    pub job_timeout: Duration,
    /// How long shutdown waits for the processing job
    pub shutdown_timeout: Duration,
    /// Progress updates buffered between processor and scheduler
    pub progress_buffer: usize,
    /// Work directory for temporary files
    pub work_dir: PathBuf,
    /// Timeout for fetching URL inputs
    pub download_timeout: Duration,
    /// Output encoding
    pub render: RenderConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_secs(3600), // 1 hour
            shutdown_timeout: Duration::from_secs(30),
            progress_buffer: 64,
            work_dir: std::env::temp_dir().join("vexport"),
            download_timeout: Duration::from_secs(300),
            render: RenderConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            job_timeout: Duration::from_secs(env_or("WORKER_JOB_TIMEOUT", 3600)),
            shutdown_timeout: Duration::from_secs(env_or("WORKER_SHUTDOWN_TIMEOUT", 30)),
            progress_buffer: env_or("WORKER_PROGRESS_BUFFER", defaults.progress_buffer),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            download_timeout: Duration::from_secs(env_or("DOWNLOAD_TIMEOUT", 300)),
            render: RenderConfig::from_env(),
        }
    }
}

/// Output encoding configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub high_quality: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let settings = RenderSettings::default();
        Self {
            width: settings.width,
            height: settings.height,
            fps: settings.fps,
            high_quality: settings.high_quality,
        }
    }
}

impl RenderConfig {
    /// Create config from `RENDER_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            width: env_or("RENDER_WIDTH", defaults.width).max(2),
            height: env_or("RENDER_HEIGHT", defaults.height).max(2),
            fps: env_or("RENDER_FPS", defaults.fps).max(1),
            high_quality: std::env::var("RENDER_HIGH_QUALITY")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.high_quality),
        }
    }

    /// Encoder settings for the media crate.
    pub fn settings(&self) -> RenderSettings {
        RenderSettings {
            width: self.width,
            height: self.height,
            fps: self.fps,
            high_quality: self.high_quality,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
