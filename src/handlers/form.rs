// Form data processing for Transcribe API
//
// This module extracts the uploaded audio from a multipart form. Nothing is written
// to disk here: the upload is buffered in memory up to the configured size cap and
// handed to the pipeline only once validation succeeded.

use actix_multipart::Multipart;
use futures::{StreamExt, TryStreamExt};
use log::{debug, warn};

use crate::config::defaults;
use crate::error::HandlerError;
use crate::models::UploadedAudio;

/// Extract the audio file from a transcription request
///
/// The audio must come in a field named `file` that carries a filename. Unknown fields
/// are drained and ignored. A body that cannot be parsed as multipart is treated the
/// same as a body without a file.
///
/// # Arguments
///
/// * `form` - The multipart form from the HTTP request
/// * `max_file_size` - Upload cap in bytes
///
/// # Returns
///
/// * `Result<UploadedAudio, HandlerError>` - The buffered upload, or a client error
pub async fn extract_upload(
    mut form: Multipart,
    max_file_size: usize,
) -> Result<UploadedAudio, HandlerError> {
    let mut upload: Option<UploadedAudio> = None;

    loop {
        let mut field = match form.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Rejecting malformed multipart body: {}", e);
                return Err(HandlerError::NoAudioFile);
            }
        };

        let content_disposition = field.content_disposition();
        let field_name = content_disposition
            .and_then(|cd| cd.get_name().map(|name| name.to_string()))
            .unwrap_or_default();
        let file_name = content_disposition
            .and_then(|cd| cd.get_filename().map(|name| name.to_string()));

        match (field_name.as_str(), file_name) {
            (defaults::UPLOAD_FIELD, Some(file_name)) if upload.is_none() => {
                let content_type = field.content_type().map(|mime| mime.to_string());

                let mut data = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk.map_err(|e| {
                        warn!("Error reading uploaded file: {}", e);
                        HandlerError::NoAudioFile
                    })?;

                    if data.len() + chunk.len() > max_file_size {
                        return Err(HandlerError::FileTooLarge(
                            data.len() + chunk.len(),
                            max_file_size,
                        ));
                    }
                    data.extend_from_slice(&chunk);
                }

                debug!(
                    "Received upload '{}' ({} bytes, {})",
                    file_name,
                    data.len(),
                    content_type.as_deref().unwrap_or("no content type")
                );
                upload = Some(UploadedAudio {
                    data,
                    content_type,
                    file_name: Some(file_name),
                });
            }
            (defaults::UPLOAD_FIELD, Some(_)) => {
                warn!("Ignoring additional file field in the same request");
                while let Some(_) = field.next().await {}
            }
            _ => {
                // Skip unknown fields, and `file` fields that carry no filename
                while let Some(_) = field.next().await {}
            }
        }
    }

    upload.ok_or(HandlerError::NoAudioFile)
}
