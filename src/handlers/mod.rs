// Transcribe API HTTP handlers
//
// This module contains the HTTP handlers for the Transcribe API.
// It provides the interface between HTTP requests and the transcription pipeline.

pub mod form;
pub mod routes;

// Re-export handlers for easier access
pub use self::routes::{configure, health, metrics_handler, transcribe};
