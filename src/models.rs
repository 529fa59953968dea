// Transcribe API data models
//
// This module contains the data models used for the Transcribe API.
// It includes the response bodies and the values passed between pipeline stages.

use serde::{Deserialize, Serialize};

/// Successful transcription response
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TranscriptionResponse {
    /// Transcript text returned by the inference service
    pub transcription: String,
}

/// Error response for API
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

impl ErrorResponse {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Audio received in the multipart upload, held in memory until it is written to scratch storage
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    /// Raw bytes of the file part
    pub data: Vec<u8>,
    /// Declared content type of the part, if any
    pub content_type: Option<String>,
    /// Client-side file name, if any
    pub file_name: Option<String>,
}

impl UploadedAudio {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// File extension used for the scratch copy of the upload
    ///
    /// Taken from the client file name when it looks sane, otherwise "audio".
    pub fn extension(&self) -> &str {
        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .filter(|ext| {
                !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .unwrap_or("audio")
    }
}

/// Text produced by the inference service for one audio input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptResult {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: Option<&str>) -> UploadedAudio {
        UploadedAudio {
            data: vec![0u8; 4],
            content_type: Some("audio/wav".to_string()),
            file_name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_extension_from_file_name() {
        assert_eq!(upload(Some("speech.wav")).extension(), "wav");
        assert_eq!(upload(Some("archive.tar.mp3")).extension(), "mp3");
    }

    #[test]
    fn test_extension_falls_back_for_odd_names() {
        assert_eq!(upload(None).extension(), "audio");
        assert_eq!(upload(Some("noext")).extension(), "audio");
        assert_eq!(upload(Some("evil./../x")).extension(), "audio");
        assert_eq!(upload(Some("trailing.")).extension(), "audio");
    }

    #[test]
    fn test_response_bodies_serialize_flat() {
        let ok = serde_json::to_value(TranscriptionResponse {
            transcription: "hello world".to_string(),
        })
        .unwrap();
        assert_eq!(ok, serde_json::json!({ "transcription": "hello world" }));

        let err = serde_json::to_value(ErrorResponse::new("No file provided")).unwrap();
        assert_eq!(err, serde_json::json!({ "error": "No file provided" }));
    }
}
