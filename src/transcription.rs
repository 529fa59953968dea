//! Speech-to-text client for Transcribe API
//!
//! Sends one audio file to an OpenAI-compatible `/audio/transcriptions` endpoint and
//! returns the plain-text transcript. The file is streamed from disk, the request is
//! attempted exactly once, and every failure is reported as a [`TranscriptionError`].

use async_trait::async_trait;
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use std::io;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tokio_util::io::ReaderStream;

use crate::config::{defaults, vars, TranscriptionConfig};
use crate::error::StartupError;
use crate::models::TranscriptResult;

/// Longest remote error body kept for the logs
const MAX_ERROR_BODY_LEN: usize = 512;

/// Transcription client error types
#[derive(Error, Debug)]
pub enum TranscriptionError {
    /// The audio file could not be opened
    #[error("Failed to open audio {path}: {source}")]
    Audio {
        path: String,
        #[source]
        source: io::Error,
    },
    /// Network or transport failure, including client-side timeouts
    #[error("Request to inference service failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-success HTTP status from the service
    #[error("Inference service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// Success status but no transcript text
    #[error("Inference service returned an empty transcript")]
    EmptyResponse,
}

/// Produces a transcript for an audio file
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<TranscriptResult, TranscriptionError>;
}

/// Client for the OpenAI transcription API
#[derive(Clone)]
pub struct OpenAiTranscriber {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl OpenAiTranscriber {
    /// Build the client from configuration
    ///
    /// Refuses to build without a credential, so the service never sends
    /// an unauthenticated request.
    pub fn new(config: &TranscriptionConfig) -> Result<Self, StartupError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(StartupError::MissingCredential(vars::OPENAI_API_KEY))?
            .to_string();

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_key,
            endpoint: config.endpoint(),
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn audio_part(audio: &Path) -> Result<Part, TranscriptionError> {
        let open_error = |source| TranscriptionError::Audio {
            path: audio.display().to_string(),
            source,
        };
        let file = tokio::fs::File::open(audio).await.map_err(open_error)?;
        let length = file.metadata().await.map_err(open_error)?.len();

        let file_name = audio
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("audio.wav")
            .to_string();
        let mime = match audio.extension().and_then(|ext| ext.to_str()) {
            Some("wav") => "audio/wav",
            _ => "application/octet-stream",
        };

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        Ok(Part::stream_with_length(body, length)
            .file_name(file_name)
            .mime_str(mime)?)
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<TranscriptResult, TranscriptionError> {
        let start_time = Instant::now();
        debug!(
            "Sending {} to {} with model {}",
            audio.display(),
            self.endpoint,
            self.model
        );

        let form = Form::new()
            .part("file", Self::audio_part(audio).await?)
            .text("model", self.model.clone())
            .text("response_format", defaults::RESPONSE_FORMAT);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TranscriptionError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY_LEN),
            });
        }

        let text = response.text().await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(TranscriptionError::EmptyResponse);
        }

        info!(
            "Received transcript of {} chars in {:.2}s",
            text.len(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(TranscriptResult {
            text: text.to_string(),
        })
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
