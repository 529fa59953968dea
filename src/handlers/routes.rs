// API route handlers for Transcribe API
//
// This module contains the route handlers for the Transcribe API.
// It implements the actual HTTP endpoints for the API.

use crate::config::HandlerConfig;
use crate::error::HandlerError;
use crate::handlers::form::extract_upload;
use crate::metrics::Metrics;
use crate::models::{HealthResponse, TranscriptionResponse};
use crate::pipeline::TranscriptionPipeline;
use actix_multipart::Multipart;
use actix_web::{get, post, web, HttpResponse, ResponseError};
use log::{info, warn};
use std::time::Instant;

/// Route of the transcription endpoint
pub const TRANSCRIBE_ROUTE: &str = "/api/transcribe";

/// Handler for transcription requests
///
/// Receives one audio file in the `file` field of a multipart form, runs it through the
/// pipeline and answers with the transcript. Any failure after validation is reported to
/// the client as a generic 500; the cause only reaches the logs.
#[post("/api/transcribe")]
pub async fn transcribe(
    form: Multipart,
    pipeline: web::Data<TranscriptionPipeline>,
    config: web::Data<HandlerConfig>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, HandlerError> {
    let start_time = Instant::now();
    let result = handle_transcription(form, &pipeline, &config, &metrics).await;

    // Record HTTP request metrics
    let status = match &result {
        Ok(response) => response.status(),
        Err(e) => e.status_code(),
    };
    metrics
        .record_http_request(
            TRANSCRIBE_ROUTE,
            "POST",
            status.as_str(),
            start_time.elapsed().as_secs_f64(),
        )
        .await;

    result
}

async fn handle_transcription(
    form: Multipart,
    pipeline: &TranscriptionPipeline,
    config: &HandlerConfig,
    metrics: &Metrics,
) -> Result<HttpResponse, HandlerError> {
    let upload = extract_upload(form, config.max_file_size)
        .await
        .map_err(|e| {
            warn!("Rejected transcription request: {}", e);
            e
        })?;
    metrics.record_upload_size(upload.len()).await;
    info!(
        "Accepted upload {} ({} bytes)",
        upload.file_name.as_deref().unwrap_or("<unnamed>"),
        upload.len()
    );

    let result = pipeline.run(&upload).await?;

    Ok(HttpResponse::Ok().json(TranscriptionResponse {
        transcription: result.text,
    }))
}

/// Liveness probe
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse { status: "ok" })
}

/// Metrics endpoint handler
#[get("/metrics")]
pub async fn metrics_handler(metrics: web::Data<Metrics>) -> HttpResponse {
    match metrics.export().await {
        Ok(data) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4; charset=utf-8")
            .body(data),
        Err(e) => HttpResponse::InternalServerError()
            .json(format!("Failed to export metrics: {}", e)),
    }
}

/// Register every route of the API
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(transcribe)
        .service(health)
        .service(metrics_handler);
}
