//! Audio transcoder for Transcribe API
//!
//! This module normalizes uploaded audio of any encoding into the canonical format
//! expected by the inference service (mono, 16 kHz, signed 16-bit little-endian PCM, WAV)
//! by running an external ffmpeg process. The process is awaited without blocking the
//! worker, bounded by a configurable timeout, and killed if the awaiting future is dropped.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::env;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;

use crate::config::TranscoderConfig;
use crate::error::StartupError;

/// Longest stderr excerpt kept in a transcoding error
const MAX_STDERR_LEN: usize = 2048;

/// Output format of every transcoding job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl TargetFormat {
    /// Mono, 16 kHz, PCM S16LE
    pub const CANONICAL: TargetFormat = TargetFormat {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
    };

    /// ffmpeg audio codec name
    pub fn codec(&self) -> &'static str {
        "pcm_s16le"
    }

    /// ffmpeg container name
    pub fn container(&self) -> &'static str {
        "wav"
    }

    /// Whether a WAV header describes this format
    pub fn matches(&self, spec: &hound::WavSpec) -> bool {
        spec.channels == self.channels
            && spec.sample_rate == self.sample_rate
            && spec.bits_per_sample == self.bits_per_sample
            && spec.sample_format == hound::SampleFormat::Int
    }
}

/// One invocation of the transcoder: an input scratch file, an output scratch file
/// and the fixed target format
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: TargetFormat,
}

impl TranscodeJob {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self {
            input,
            output,
            format: TargetFormat::CANONICAL,
        }
    }
}

/// Transcoding error types
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// The executable could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The process reported an error
    #[error("Transcoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    /// The process did not finish in time and was killed
    #[error("Transcoder did not finish within {0:?}")]
    Timeout(Duration),
    /// The output file is missing or not in the target format
    #[error("Transcoder produced unusable output: {0}")]
    InvalidOutput(String),
    /// I/O error while waiting on the process
    #[error("I/O error while waiting for transcoder: {0}")]
    Io(#[from] io::Error),
}

/// Converts an input audio file into the canonical format
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run one job, resolving once the output file is written and verified
    async fn transcode(&self, job: &TranscodeJob) -> Result<(), TranscodeError>;
}

/// Transcoder backed by the ffmpeg executable
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    executable: PathBuf,
    timeout: Option<Duration>,
}

impl FfmpegTranscoder {
    /// Resolve the executable and build the transcoder
    ///
    /// Fails when the executable cannot be found, so a misconfigured deployment
    /// stops at startup instead of failing every request.
    pub fn new(executable: &str, timeout: Option<Duration>) -> Result<Self, StartupError> {
        let executable = resolve_executable(executable)
            .ok_or_else(|| StartupError::TranscoderNotFound(executable.to_string()))?;
        Ok(Self {
            executable,
            timeout,
        })
    }

    pub fn from_config(config: &TranscoderConfig) -> Result<Self, StartupError> {
        Self::new(&config.ffmpeg_path, config.timeout())
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Command-line arguments for a job
    pub fn arguments(job: &TranscodeJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(job.input.clone().into_os_string());
        args.extend(
            [
                "-vn".to_string(),
                "-ac".to_string(),
                job.format.channels.to_string(),
                "-ar".to_string(),
                job.format.sample_rate.to_string(),
                "-acodec".to_string(),
                job.format.codec().to_string(),
                "-f".to_string(),
                job.format.container().to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(job.output.clone().into_os_string());
        args
    }

    fn command(&self, job: &TranscodeJob) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .args(Self::arguments(job))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, job: &TranscodeJob) -> Result<(), TranscodeError> {
        let start_time = Instant::now();
        debug!(
            "Transcoding {} -> {}",
            job.input.display(),
            job.output.display()
        );

        let child = self
            .command(job)
            .spawn()
            .map_err(|source| TranscodeError::Spawn {
                program: self.executable.display().to_string(),
                source,
            })?;

        // Dropping the wait future drops the child, and kill_on_drop terminates it
        let wait = child.wait_with_output();
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(
                        "Transcoder exceeded {:?} on {}, killing it",
                        limit,
                        job.input.display()
                    );
                    return Err(TranscodeError::Timeout(limit));
                }
            },
            None => wait.await?,
        };

        if !output.status.success() {
            return Err(TranscodeError::Failed {
                status: output.status.to_string(),
                stderr: excerpt(&output.stderr),
            });
        }

        verify_output(&job.output, job.format).await?;

        info!(
            "Transcoded {} in {:.2}s",
            job.input.display(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

/// Check that the output exists and carries the target format
pub async fn verify_output(path: &Path, format: TargetFormat) -> Result<(), TranscodeError> {
    let path = path.to_path_buf();
    let spec = tokio::task::spawn_blocking(move || {
        hound::WavReader::open(&path).map(|reader| reader.spec())
    })
    .await
    .map_err(|e| TranscodeError::InvalidOutput(format!("verification task failed: {}", e)))?
    .map_err(|e| TranscodeError::InvalidOutput(e.to_string()))?;

    if format.matches(&spec) {
        Ok(())
    } else {
        Err(TranscodeError::InvalidOutput(format!(
            "expected {} ch / {} Hz / {} bit PCM, got {} ch / {} Hz / {} bit {:?}",
            format.channels,
            format.sample_rate,
            format.bits_per_sample,
            spec.channels,
            spec.sample_rate,
            spec.bits_per_sample,
            spec.sample_format
        )))
    }
}

/// Locate an executable the way a shell would
///
/// A value containing a path separator must point at an existing executable file;
/// a bare name is searched in `PATH`.
pub fn resolve_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if program.is_empty() {
        return None;
    }
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| {
        let plain = dir.join(program);
        if is_executable(&plain) {
            return Some(plain);
        }
        let suffix = env::consts::EXE_SUFFIX;
        if suffix.is_empty() {
            return None;
        }
        let suffixed = dir.join(format!("{}{}", program, suffix));
        is_executable(&suffixed).then_some(suffixed)
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    match text.char_indices().nth(MAX_STDERR_LEN) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
