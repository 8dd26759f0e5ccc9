//! Turn [`MediaSource`] references into local files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use vexport_models::MediaSource;

use crate::error::{MediaError, MediaResult};

/// Default cap on a single input (500 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 500 * 1024 * 1024;

/// Fetches or decodes job inputs into a working directory.
#[derive(Debug, Clone)]
pub struct InputResolver {
    client: reqwest::Client,
    max_bytes: u64,
}

impl InputResolver {
    /// Create a resolver whose downloads time out after `timeout`.
    pub fn new(timeout: Duration) -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MediaError::internal(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self::with_client(client))
    }

    /// Create a resolver around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            max_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }

    /// Override the per-input size cap.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Materialize `source` as `<dir>/<stem>.<ext>` and return the path.
    pub async fn resolve(&self, source: &MediaSource, dir: &Path, stem: &str) -> MediaResult<PathBuf> {
        let path = dir.join(format!("{}.{}", stem, extension_for(source)));

        match source {
            MediaSource::Inline { data, .. } => {
                let bytes = decode_inline(data)?;
                if bytes.len() as u64 > self.max_bytes {
                    return Err(MediaError::invalid_input(format!(
                        "{} exceeds the {} byte limit",
                        stem, self.max_bytes
                    )));
                }
                tokio::fs::write(&path, &bytes).await?;
                debug!(path = %path.display(), bytes = bytes.len(), "Decoded inline input");
            }
            MediaSource::Url { url } => {
                let written = self.download(url, &path).await?;
                info!(
                    source = %source.describe(),
                    bytes = written,
                    "Downloaded input"
                );
            }
        }

        Ok(path)
    }

    /// Stream `url` into `path`, returning the number of bytes written.
    async fn download(&self, url: &str, path: &Path) -> MediaResult<u64> {
        let parsed = url::Url::parse(url)
            .map_err(|e| MediaError::invalid_input(format!("Invalid URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(MediaError::invalid_input(format!(
                "Unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| MediaError::download_failed(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::download_failed(format!(
                "HTTP {} from {}{}",
                status,
                parsed.host_str().unwrap_or("?"),
                parsed.path()
            )));
        }
        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(MediaError::download_failed(format!(
                    "Remote file is {} bytes, limit is {}",
                    length, self.max_bytes
                )));
            }
        }

        let mut file = File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| MediaError::download_failed(format!("Read failed: {}", e)))?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(MediaError::download_failed(format!(
                    "Download exceeded the {} byte limit",
                    self.max_bytes
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if written == 0 {
            return Err(MediaError::download_failed("Empty response body"));
        }
        Ok(written)
    }
}

/// Decode base64 payloads, accepting an optional `data:` URL prefix.
pub fn decode_inline(data: &str) -> MediaResult<Vec<u8>> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| MediaError::invalid_input(format!("Invalid base64 data: {}", e)))?;
    if bytes.is_empty() {
        return Err(MediaError::invalid_input("Inline data is empty"));
    }
    Ok(bytes)
}

/// File extension to use for a source, from its filename or URL path.
fn extension_for(source: &MediaSource) -> String {
    let candidate = match source {
        MediaSource::Inline { filename, .. } => filename
            .as_deref()
            .and_then(extension_of)
            .map(str::to_string),
        MediaSource::Url { url } => url::Url::parse(url)
            .ok()
            .and_then(|u| extension_of(u.path()).map(str::to_string)),
    };

    candidate
        .filter(|ext| ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "mp4".to_string())
}

fn extension_of(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|e| e.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_decode_inline() {
        assert_eq!(decode_inline("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_inline("data:video/mp4;base64,aGVs\nbG8=").unwrap(),
            b"hello"
        );
        assert!(matches!(
            decode_inline("not base64!"),
            Err(MediaError::InvalidInput(_))
        ));
        assert!(decode_inline("").is_err());
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(
            extension_for(&MediaSource::inline("", Some("Song.MP3".to_string()))),
            "mp3"
        );
        assert_eq!(extension_for(&MediaSource::inline("", None)), "mp4");
        assert_eq!(
            extension_for(&MediaSource::url("https://cdn.example.com/a/clip.mov?sig=1")),
            "mov"
        );
        assert_eq!(
            extension_for(&MediaSource::url("https://cdn.example.com/download")),
            "mp4"
        );
    }

    #[tokio::test]
    async fn test_resolve_inline_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = InputResolver::new(Duration::from_secs(5)).unwrap();
        let source = MediaSource::inline("aGVsbG8=", Some("a.wav".to_string()));

        let path = resolver.resolve(&source, dir.path(), "audio").await.unwrap();
        assert_eq!(path, dir.path().join("audio.wav"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_resolve_url_downloads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 1024]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let resolver = InputResolver::new(Duration::from_secs(5)).unwrap();
        let source = MediaSource::url(format!("{}/v.mp4", server.uri()));

        let path = resolver.resolve(&source, dir.path(), "video").await.unwrap();
        assert_eq!(tokio::fs::metadata(&path).await.unwrap().len(), 1024);
    }

    #[tokio::test]
    async fn test_resolve_url_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let resolver = InputResolver::new(Duration::from_secs(5)).unwrap();
        let source = MediaSource::url(format!("{}/missing.mp4", server.uri()));

        let err = resolver.resolve(&source, dir.path(), "video").await.unwrap_err();
        match err {
            MediaError::DownloadFailed { message } => assert!(message.contains("404")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_enforces_size_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let resolver = InputResolver::new(Duration::from_secs(5))
            .unwrap()
            .with_max_bytes(1000);
        let source = MediaSource::url(format!("{}/big.mp4", server.uri()));

        assert!(resolver.resolve(&source, dir.path(), "video").await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = InputResolver::new(Duration::from_secs(5)).unwrap();
        let source = MediaSource::url("file:///etc/passwd");

        assert!(matches!(
            resolver.resolve(&source, dir.path(), "video").await,
            Err(MediaError::InvalidInput(_))
        ));
    }
}
