// Error handling for Transcribe API
//
// This module defines the client-facing handler errors and the fatal startup errors.
// Stage-level errors live next to their stage (transcoder, transcription, pipeline).

use std::io;
use thiserror::Error;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::models::ErrorResponse;
use crate::pipeline::PipelineError;

/// Body sent when the request carries no audio file
pub const NO_FILE_MESSAGE: &str = "No file provided";
/// Body sent when the upload exceeds the configured size cap
pub const FILE_TOO_LARGE_MESSAGE: &str = "File too large";
/// Body sent for every transcoding or transcription failure
pub const TRANSCRIPTION_FAILED_MESSAGE: &str = "Transcription failed";

/// Errors that can occur in the Transcribe API handlers
///
/// The `Display` output carries the internal detail and is meant for logs only;
/// `error_response` maps every variant to one of the fixed client bodies.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// No file-bearing `file` field in the multipart body
    #[error("No audio file provided in the request")]
    NoAudioFile,

    /// Upload exceeds the configured limit
    #[error("File too large: {0} bytes exceeds limit of {1} bytes")]
    FileTooLarge(usize, usize),

    /// Transcoding, transcription or scratch storage failed
    #[error("Transcription failed: {0}")]
    TranscriptionFailed(#[from] PipelineError),
}

impl ResponseError for HandlerError {
    fn status_code(&self) -> StatusCode {
        match self {
            HandlerError::NoAudioFile => StatusCode::BAD_REQUEST,
            HandlerError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            HandlerError::TranscriptionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            HandlerError::NoAudioFile => NO_FILE_MESSAGE,
            HandlerError::FileTooLarge(_, _) => FILE_TOO_LARGE_MESSAGE,
            HandlerError::TranscriptionFailed(_) => TRANSCRIPTION_FAILED_MESSAGE,
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse::new(message))
    }
}

/// Fatal configuration errors, raised before the server accepts traffic
#[derive(Error, Debug)]
pub enum StartupError {
    /// The inference service credential is absent or blank
    #[error("Missing credential: {0} must be set")]
    MissingCredential(&'static str),

    /// The transcoding executable cannot be located
    #[error("Transcoder executable not found: {0}")]
    TranscoderNotFound(String),

    /// A configuration value failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client for the inference service could not be built
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Filesystem error while preparing the scratch directory
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
