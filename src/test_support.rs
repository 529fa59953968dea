// Shared helpers for unit tests: WAV fixtures, fake transcoder executables,
// hand-built multipart bodies and in-process stage stubs.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::models::TranscriptResult;
use crate::transcoder::{TranscodeError, TranscodeJob, Transcoder};
use crate::transcription::{Transcriber, TranscriptionError};

/// Write a WAV file of silence with the given layout
pub fn write_wav(path: &Path, channels: u16, sample_rate: u32, seconds: f32) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (sample_rate as f32 * seconds) as usize;
    for _ in 0..frames * channels as usize {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// WAV bytes as a client would upload them
pub fn wav_bytes(channels: u16, sample_rate: u32, seconds: f32) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.wav");
    write_wav(&path, channels, sample_rate, seconds);
    std::fs::read(path).unwrap()
}

/// Write an executable shell script standing in for ffmpeg
#[cfg(unix)]
pub fn fake_executable(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(format!("fake-ffmpeg-{}", uuid::Uuid::new_v4().simple()));
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// One part of a multipart body
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: &'a [u8],
}

pub const BOUNDARY: &str = "----transcribe-api-test-boundary";

/// Content-Type header value matching [`multipart_body`]
pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// Build a multipart/form-data body from parts
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let disposition = match part.file_name {
            Some(file_name) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part.name, file_name
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name),
        };
        body.extend_from_slice(disposition.as_bytes());
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Names of the entries left in a directory
pub fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}

/// What a stub transcriber observed about the file it was handed
#[derive(Debug, Clone)]
pub struct SeenAudio {
    pub file_name: String,
    pub existed: bool,
    pub channels: Option<u16>,
    pub sample_rate: Option<u32>,
}

/// Transcriber that answers from memory
pub struct StubTranscriber {
    reply: Option<String>,
    delay: Option<Duration>,
    seen: Mutex<Vec<SeenAudio>>,
}

impl StubTranscriber {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            delay: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Answers every call with a 503 from the remote service
    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn seen(&self) -> Vec<SeenAudio> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<TranscriptResult, TranscriptionError> {
        let spec = hound::WavReader::open(audio).ok().map(|reader| reader.spec());
        self.seen.lock().unwrap().push(SeenAudio {
            file_name: audio
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            existed: audio.is_file(),
            channels: spec.map(|s| s.channels),
            sample_rate: spec.map(|s| s.sample_rate),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Some(text) => Ok(TranscriptResult { text: text.clone() }),
            None => Err(TranscriptionError::Status {
                status: 503,
                body: "service overloaded".to_string(),
            }),
        }
    }
}

/// Transcoder that writes a canonical WAV without spawning anything
pub struct StubTranscoder {
    fail: bool,
    jobs: Mutex<Vec<TranscodeJob>>,
}

impl StubTranscoder {
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Leaves a partial output behind, then fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn jobs(&self) -> Vec<TranscodeJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for StubTranscoder {
    async fn transcode(&self, job: &TranscodeJob) -> Result<(), TranscodeError> {
        self.jobs.lock().unwrap().push(job.clone());
        assert!(job.input.is_file(), "input must be written before transcoding");

        if self.fail {
            std::fs::write(&job.output, b"RIFF").unwrap();
            return Err(TranscodeError::Failed {
                status: "exit status: 1".to_string(),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }
        write_wav(
            &job.output,
            job.format.channels,
            job.format.sample_rate,
            0.1,
        );
        Ok(())
    }
}
