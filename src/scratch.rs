// Scratch storage for Transcribe API
//
// This module owns the short-lived files a request needs between pipeline stages.
// It hands out collision-resistant paths inside the shared temporary directory and
// guarantees every path registered for a request is removed exactly once.

use log::{debug, error, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Shared temporary directory in which scratch files are allocated
#[derive(Clone, Debug)]
pub struct ScratchStorage {
    dir: PathBuf,
}

impl ScratchStorage {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ensures the temporary directory exists
    pub fn ensure_dir(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    /// Generate a unique file path inside the temporary directory
    ///
    /// The name combines a millisecond timestamp with a random UUID so that
    /// concurrent requests never receive the same path. The file itself is not created.
    ///
    /// # Arguments
    ///
    /// * `label` - Prefix describing the file's role (e.g. "upload")
    /// * `extension` - File extension, without the dot
    pub fn allocate(&self, label: &str, extension: &str) -> PathBuf {
        let filename = format!(
            "{}_{}_{}.{}",
            label,
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            extension
        );
        self.dir.join(filename)
    }

    /// Starts an empty set of scratch files for one request
    pub fn session(&self) -> ScratchSet {
        ScratchSet {
            storage: self.clone(),
            files: Vec::new(),
        }
    }
}

/// The scratch files of a single request
///
/// Every path allocated through the set is removed by [`ScratchSet::release_all`].
/// If the set is dropped before that (the request future was cancelled or timed out),
/// the remaining files are removed synchronously in `Drop`.
#[derive(Debug)]
pub struct ScratchSet {
    storage: ScratchStorage,
    files: Vec<PathBuf>,
}

impl ScratchSet {
    /// Allocate a unique path and register it for cleanup
    pub fn allocate(&mut self, label: &str, extension: &str) -> PathBuf {
        let path = self.storage.allocate(label, extension);
        debug!("Allocated scratch file: {}", path.display());
        self.files.push(path.clone());
        path
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Remove every registered file, consuming the set
    ///
    /// Returns the number of files that could not be removed.
    pub async fn release_all(mut self) -> usize {
        let files = std::mem::take(&mut self.files);
        release_all(&files).await
    }
}

impl Drop for ScratchSet {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }
        warn!(
            "Scratch set dropped before release, removing {} file(s)",
            self.files.len()
        );
        for path in self.files.drain(..) {
            log_removal(&path, std::fs::remove_file(&path));
        }
    }
}

/// Write uploaded data to a scratch path
pub async fn save_file_data(data: &[u8], file_path: &Path) -> io::Result<()> {
    tokio::fs::write(file_path, data).await
}

/// Attempt to delete every given path
///
/// Failures are logged but never returned to the caller; a path that was never
/// written is not a failure. Returns the number of failed deletions.
pub async fn release_all(paths: &[PathBuf]) -> usize {
    let mut failures = 0;
    for path in paths {
        if !log_removal(path, tokio::fs::remove_file(path).await) {
            failures += 1;
        }
    }
    failures
}

fn log_removal(path: &Path, result: io::Result<()>) -> bool {
    match result {
        Ok(()) => {
            info!("Removed scratch file: {}", path.display());
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Scratch file was never written: {}", path.display());
            true
        }
        Err(e) => {
            error!("Failed to delete scratch file {}: {}", path.display(), e);
            false
        }
    }
}
