//! Transcription pipeline for Transcribe API
//!
//! One run of the pipeline takes a validated upload through the stages
//! `Persisting -> (Transcoding) -> Transcribing -> CleaningUp`:
//!
//! - the upload is written to a scratch file,
//! - when a transcoder is configured, the scratch file is normalized into a second one,
//! - the (possibly normalized) file is sent to the transcriber,
//! - every scratch file of the run is released, whatever the outcome.
//!
//! The stages run under an optional time bound. If the bound is hit, or the caller drops
//! the run (client disconnect), the in-flight external process is killed and the HTTP
//! call abandoned; cleanup still happens.

use log::{debug, error, info};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::models::{TranscriptResult, UploadedAudio};
use crate::scratch::{save_file_data, ScratchSet, ScratchStorage};
use crate::transcoder::{TranscodeError, TranscodeJob, Transcoder};
use crate::transcription::{Transcriber, TranscriptionError};

/// Failure of any pipeline stage
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The upload could not be written to scratch storage
    #[error("Failed to persist upload: {0}")]
    Scratch(#[source] io::Error),
    /// The transcoding stage failed
    #[error("Transcoding failed: {0}")]
    Transcode(#[from] TranscodeError),
    /// The remote transcription failed
    #[error("Transcription service failed: {0}")]
    Transcription(#[from] TranscriptionError),
    /// The run exceeded its time bound
    #[error("Pipeline did not finish within {0:?}")]
    Timeout(Duration),
}

/// Composes scratch storage, the optional transcoder and the transcriber
///
/// Built once at startup and shared by all requests; it holds no per-request state.
pub struct TranscriptionPipeline {
    scratch: ScratchStorage,
    transcoder: Option<Arc<dyn Transcoder>>,
    transcriber: Arc<dyn Transcriber>,
    timeout: Option<Duration>,
    metrics: Metrics,
}

impl TranscriptionPipeline {
    pub fn new(scratch: ScratchStorage, transcriber: Arc<dyn Transcriber>, metrics: Metrics) -> Self {
        Self {
            scratch,
            transcoder: None,
            transcriber,
            timeout: None,
            metrics,
        }
    }

    /// Enable the normalization stage
    pub fn with_transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    /// Bound each run; `None` leaves it unbounded
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn transcoding_enabled(&self) -> bool {
        self.transcoder.is_some()
    }

    pub fn scratch(&self) -> &ScratchStorage {
        &self.scratch
    }

    /// Run the pipeline for one upload
    ///
    /// Every scratch file allocated during the run is released before this returns.
    pub async fn run(&self, upload: &UploadedAudio) -> Result<TranscriptResult, PipelineError> {
        let run_id = Uuid::new_v4().simple().to_string();
        let start_time = Instant::now();
        let mut scratch = self.scratch.session();

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.process(&run_id, upload, &mut scratch))
                .await
                .unwrap_or_else(|_| Err(PipelineError::Timeout(limit))),
            None => self.process(&run_id, upload, &mut scratch).await,
        };

        debug!("[{}] Cleaning up {} scratch file(s)", run_id, scratch.paths().len());
        let failures = scratch.release_all().await;
        if failures > 0 {
            self.metrics.record_cleanup_failures(failures).await;
        }

        match &outcome {
            Ok(result) => info!(
                "[{}] Transcribed {} bytes into {} chars in {:.2}s",
                run_id,
                upload.len(),
                result.text.len(),
                start_time.elapsed().as_secs_f64()
            ),
            Err(e) => error!("[{}] Pipeline failed: {}", run_id, e),
        }
        outcome
    }

    async fn process(
        &self,
        run_id: &str,
        upload: &UploadedAudio,
        scratch: &mut ScratchSet,
    ) -> Result<TranscriptResult, PipelineError> {
        let input = scratch.allocate("upload", upload.extension());
        save_file_data(&upload.data, &input)
            .await
            .map_err(PipelineError::Scratch)?;
        debug!("[{}] Persisted upload to {}", run_id, input.display());

        let audio = match &self.transcoder {
            Some(transcoder) => {
                let job = TranscodeJob::new(input, scratch.allocate("converted", "wav"));
                debug!("[{}] Transcoding", run_id);
                let started = Instant::now();
                let result = transcoder.transcode(&job).await;
                self.metrics
                    .record_stage("transcode", outcome_label(&result), started.elapsed().as_secs_f64())
                    .await;
                result?;
                job.output
            }
            None => input,
        };

        debug!("[{}] Transcribing {}", run_id, audio.display());
        let started = Instant::now();
        let result = self.transcriber.transcribe(&audio).await;
        self.metrics
            .record_stage("transcribe", outcome_label(&result), started.elapsed().as_secs_f64())
            .await;
        Ok(result?)
    }
}

fn outcome_label<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "failure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dir_entries, wav_bytes, StubTranscoder, StubTranscriber};
    use std::path::Path;

    fn upload() -> UploadedAudio {
        UploadedAudio {
            data: wav_bytes(2, 44_100, 0.1),
            content_type: Some("audio/wav".to_string()),
            file_name: Some("speech.wav".to_string()),
        }
    }

    fn pipeline(dir: &Path, transcriber: Arc<StubTranscriber>) -> TranscriptionPipeline {
        TranscriptionPipeline::new(ScratchStorage::new(dir), transcriber, Metrics::disabled())
    }

    #[tokio::test]
    async fn test_without_transcoding_uses_upload_directly() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = Arc::new(StubTranscriber::replying("hello world"));
        let pipeline = pipeline(dir.path(), transcriber.clone());

        let result = pipeline.run(&upload()).await.unwrap();

        assert_eq!(result.text, "hello world");
        let seen = transcriber.seen();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].existed, "transcriber must receive a written file");
        assert!(seen[0].file_name.starts_with("upload_"));
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_with_transcoding_sends_converted_file() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = Arc::new(StubTranscriber::replying("hello world"));
        let transcoder = Arc::new(StubTranscoder::succeeding());
        let pipeline = pipeline(dir.path(), transcriber.clone()).with_transcoder(transcoder.clone());

        let result = pipeline.run(&upload()).await.unwrap();

        assert_eq!(result.text, "hello world");
        assert_eq!(transcoder.jobs().len(), 1);
        let seen = transcriber.seen();
        assert!(seen[0].file_name.starts_with("converted_"));
        assert_eq!(seen[0].channels, Some(1));
        assert_eq!(seen[0].sample_rate, Some(16_000));
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_transcode_failure_skips_transcription_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = Arc::new(StubTranscriber::replying("unused"));
        let pipeline = pipeline(dir.path(), transcriber.clone())
            .with_transcoder(Arc::new(StubTranscoder::failing()));

        let err = pipeline.run(&upload()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Transcode(_)));
        assert!(transcriber.seen().is_empty());
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_transcription_failure_cleans_up_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = Arc::new(StubTranscriber::failing());
        let pipeline = pipeline(dir.path(), transcriber.clone())
            .with_transcoder(Arc::new(StubTranscoder::succeeding()));

        let err = pipeline.run(&upload()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Transcription(_)));
        assert_eq!(transcriber.seen().len(), 1);
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_timeout_fails_run_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber =
            Arc::new(StubTranscriber::replying("late").with_delay(Duration::from_secs(30)));
        let pipeline = pipeline(dir.path(), transcriber)
            .with_timeout(Some(Duration::from_millis(100)));

        let err = pipeline.run(&upload()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Timeout(_)));
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run_still_removes_scratch_files() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber =
            Arc::new(StubTranscriber::replying("never").with_delay(Duration::from_secs(30)));
        let pipeline = Arc::new(pipeline(dir.path(), transcriber.clone()));

        let task = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.run(&upload()).await })
        };
        while transcriber.seen().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(dir_entries(dir.path()).len(), 1);

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_repeated_runs_use_distinct_scratch_files() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = Arc::new(StubTranscriber::replying("hello world"));
        let pipeline = pipeline(dir.path(), transcriber.clone());
        let audio = upload();

        let (first, second) = tokio::join!(pipeline.run(&audio), pipeline.run(&audio));

        assert_eq!(first.unwrap().text, "hello world");
        assert_eq!(second.unwrap().text, "hello world");
        let seen = transcriber.seen();
        assert_eq!(seen.len(), 2);
        assert_ne!(seen[0].file_name, seen[1].file_name);
        assert!(dir_entries(dir.path()).is_empty());
    }
}
