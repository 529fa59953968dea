// Transcribe API configuration
//
// This module contains configuration structures and constants for the Transcribe API.
// Every structure reads its values from environment variables and falls back to the defaults below.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default values for configuration
pub mod defaults {
    // Server binding
    pub const HOST: &str = "127.0.0.1";
    pub const PORT: &str = "8080";
    pub const KEEPALIVE_SECONDS: u64 = 75;

    // 0 means one worker per logical CPU
    pub const HTTP_WORKER_NUMBER: usize = 0;

    // Upload cap, matches the inference service limit (25 MiB)
    pub const MAX_FILE_SIZE: usize = 26_214_400;

    // Bound on the whole pipeline of a single request (0 disables it)
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 300;

    // Name of the multipart field carrying the audio
    pub const UPLOAD_FIELD: &str = "file";

    // Audio normalization stage
    pub const TRANSCODE_ENABLED: bool = false;
    pub const FFMPEG_PATH: &str = "ffmpeg";
    pub const TRANSCODE_TIMEOUT_SECONDS: u64 = 120;

    // Remote inference service
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
    pub const TRANSCRIPTION_MODEL: &str = "whisper-1";
    pub const TRANSCRIPTION_TIMEOUT_SECONDS: u64 = 120;
    pub const RESPONSE_FORMAT: &str = "text";

    // Metrics backend ("prometheus" or "none")
    pub const METRICS_BACKEND: &str = "none";
}

/// Environment variable names
pub mod vars {
    pub const HOST: &str = "TRANSCRIBE_API_HOST";
    pub const PORT: &str = "TRANSCRIBE_API_PORT";
    pub const KEEPALIVE: &str = "TRANSCRIBE_API_KEEPALIVE";
    pub const HTTP_WORKER_NUMBER: &str = "HTTP_WORKER_NUMBER";
    pub const TMP_DIR: &str = "TRANSCRIBE_TMP_DIR";
    pub const MAX_FILE_SIZE: &str = "MAX_FILE_SIZE";
    pub const REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT_SECONDS";
    pub const TRANSCODE_ENABLED: &str = "TRANSCODE_ENABLED";
    pub const FFMPEG_PATH: &str = "FFMPEG_PATH";
    pub const TRANSCODE_TIMEOUT: &str = "TRANSCODE_TIMEOUT_SECONDS";
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
    pub const TRANSCRIPTION_MODEL: &str = "TRANSCRIPTION_MODEL";
    pub const TRANSCRIPTION_TIMEOUT: &str = "TRANSCRIPTION_TIMEOUT_SECONDS";
    pub const METRICS_BACKEND: &str = "METRICS_BACKEND";
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Turns a seconds value into an optional bound, 0 meaning "no bound"
fn bounded(seconds: u64) -> Option<Duration> {
    (seconds > 0).then(|| Duration::from_secs(seconds))
}

/// HTTP server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: String,
    pub keep_alive: u64,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: env::var(vars::HOST).unwrap_or_else(|_| String::from(defaults::HOST)),
            port: env::var(vars::PORT).unwrap_or_else(|_| String::from(defaults::PORT)),
            keep_alive: env_or(vars::KEEPALIVE, defaults::KEEPALIVE_SECONDS),
            workers: env_or(vars::HTTP_WORKER_NUMBER, defaults::HTTP_WORKER_NUMBER),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Number of HTTP workers, resolving 0 to the CPU count
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }
}

/// Configuration for the transcription request handler
#[derive(Clone, Debug)]
pub struct HandlerConfig {
    /// Directory holding the per-request scratch files
    pub temp_dir: PathBuf,
    /// Maximum accepted upload size in bytes
    pub max_file_size: usize,
    /// Bound on one request's pipeline, in seconds (0 = unbounded)
    pub request_timeout: u64,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            temp_dir: env::var(vars::TMP_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir()),
            max_file_size: env_or(vars::MAX_FILE_SIZE, defaults::MAX_FILE_SIZE),
            request_timeout: env_or(vars::REQUEST_TIMEOUT, defaults::REQUEST_TIMEOUT_SECONDS),
        }
    }
}

impl HandlerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        bounded(self.request_timeout)
    }
}

/// Configuration for the audio normalization stage
#[derive(Clone, Debug)]
pub struct TranscoderConfig {
    /// Whether uploads are normalized before transcription
    pub enabled: bool,
    /// Path or bare name of the ffmpeg executable
    pub ffmpeg_path: String,
    /// Bounded wait on the external process, in seconds (0 = unbounded)
    pub timeout: u64,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            enabled: env::var(vars::TRANSCODE_ENABLED)
                .ok()
                .map(|s| parse_flag(&s))
                .unwrap_or(defaults::TRANSCODE_ENABLED),
            ffmpeg_path: env::var(vars::FFMPEG_PATH)
                .unwrap_or_else(|_| String::from(defaults::FFMPEG_PATH)),
            timeout: env_or(vars::TRANSCODE_TIMEOUT, defaults::TRANSCODE_TIMEOUT_SECONDS),
        }
    }
}

impl TranscoderConfig {
    pub fn timeout(&self) -> Option<Duration> {
        bounded(self.timeout)
    }
}

/// Configuration for the remote speech-to-text client
#[derive(Clone)]
pub struct TranscriptionConfig {
    /// Service credential; required
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Speech-to-text model identifier
    pub model: String,
    /// HTTP call timeout in seconds (0 = unbounded)
    pub timeout: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: env::var(vars::OPENAI_API_KEY)
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            base_url: env::var(vars::OPENAI_BASE_URL)
                .unwrap_or_else(|_| String::from(defaults::OPENAI_BASE_URL)),
            model: env::var(vars::TRANSCRIPTION_MODEL)
                .unwrap_or_else(|_| String::from(defaults::TRANSCRIPTION_MODEL)),
            timeout: env_or(
                vars::TRANSCRIPTION_TIMEOUT,
                defaults::TRANSCRIPTION_TIMEOUT_SECONDS,
            ),
        }
    }
}

impl TranscriptionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        bounded(self.timeout)
    }

    /// Full URL of the transcription endpoint
    pub fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'))
    }
}

// The credential never shows up in logs
impl fmt::Debug for TranscriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptionConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Configuration for metrics collection and export
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Type of metrics exporter ("prometheus", "none")
    pub exporter_type: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            exporter_type: env::var(vars::METRICS_BACKEND)
                .unwrap_or_else(|_| String::from(defaults::METRICS_BACKEND)),
        }
    }
}

/// Parses the boolean spellings accepted in configuration
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" YES "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("off"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_zero_timeout_means_unbounded() {
        let config = TranscoderConfig {
            enabled: true,
            ffmpeg_path: "ffmpeg".to_string(),
            timeout: 0,
        };
        assert!(config.timeout().is_none());

        let config = TranscoderConfig { timeout: 5, ..config };
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let config = TranscriptionConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "http://localhost:9000/v1/".to_string(),
            model: "whisper-1".to_string(),
            timeout: 10,
        };
        assert_eq!(
            config.endpoint(),
            "http://localhost:9000/v1/audio/transcriptions"
        );
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = TranscriptionConfig {
            api_key: Some("sk-secret".to_string()),
            base_url: defaults::OPENAI_BASE_URL.to_string(),
            model: defaults::TRANSCRIPTION_MODEL.to_string(),
            timeout: 10,
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
