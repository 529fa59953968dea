// Transcribe API Library
//
// This crate provides an HTTP API that turns uploaded audio into text.
// Each request runs a short pipeline: the upload is written to scratch storage, optionally
// normalized by an external transcoder, sent to a remote speech-to-text service, and every
// scratch file is removed before the response leaves.

pub mod config;
pub mod config_loader;
pub mod config_validator;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod scratch;
pub mod transcoder;
pub mod transcription;

#[cfg(test)]
mod test_support;

// Re-export common types for easier access
pub use config::{HandlerConfig, MetricsConfig, ServerConfig, TranscoderConfig, TranscriptionConfig};
pub use error::{HandlerError, StartupError};
pub use metrics::Metrics;
pub use models::{ErrorResponse, HealthResponse, TranscriptionResponse};
pub use pipeline::{PipelineError, TranscriptionPipeline};
pub use transcoder::{FfmpegTranscoder, Transcoder};
pub use transcription::{OpenAiTranscriber, Transcriber};
