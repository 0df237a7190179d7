//! Durable staging of candidate configurations.
//!
//! Each attempt gets its own file created with an unpredictable name and
//! owner-only permissions. The file lives exactly as long as its
//! [`StagedArtifact`]; releasing it twice is harmless.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use axum::body::Bytes;
use tempfile::TempPath;
use thiserror::Error;

use crate::config::StagingConfig;

/// Error type for staging operations.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("failed to create staging file in {dir}: {source}")]
    Create {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write staging file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("short write to {path}: {written} of {expected} bytes")]
    ShortWrite {
        path: PathBuf,
        written: u64,
        expected: u64,
    },

    #[error("failed to remove staging file {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("staging task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Creates per-attempt staging files.
#[derive(Debug, Clone)]
pub struct StagingStore {
    dir: PathBuf,
    prefix: String,
}

impl StagingStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &StagingConfig) -> Self {
        Self::new(config.effective_dir(), config.prefix.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stage a submission off the async executor.
    pub async fn stage(&self, bytes: Bytes) -> Result<StagedArtifact, StageError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.stage_blocking(&bytes)).await?
    }

    /// Write `bytes` to a fresh file and verify the full length landed on disk.
    ///
    /// On any error the partially written file is removed before returning.
    pub fn stage_blocking(&self, bytes: &[u8]) -> Result<StagedArtifact, StageError> {
        let mut file = tempfile::Builder::new()
            .prefix(&self.prefix)
            .suffix(".conf")
            .tempfile_in(&self.dir)
            .map_err(|source| StageError::Create {
                dir: self.dir.clone(),
                source,
            })?;

        let path = file.path().to_path_buf();
        let write_err = |source| StageError::Write {
            path: path.clone(),
            source,
        };

        file.write_all(bytes).map_err(write_err)?;
        file.flush().map_err(write_err)?;
        file.as_file().sync_all().map_err(write_err)?;

        let written = file.as_file().metadata().map_err(write_err)?.len();
        let expected = bytes.len() as u64;
        if written != expected {
            return Err(StageError::ShortWrite {
                path,
                written,
                expected,
            });
        }

        tracing::debug!(path = %path.display(), bytes = written, "Configuration staged");

        Ok(StagedArtifact {
            path,
            temp: Some(file.into_temp_path()),
            len: written,
            created_at: SystemTime::now(),
        })
    }
}

/// A staged configuration file owned by one reload attempt.
#[derive(Debug)]
pub struct StagedArtifact {
    path: PathBuf,
    temp: Option<TempPath>,
    len: u64,
    created_at: SystemTime,
}

impl StagedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_released(&self) -> bool {
        self.temp.is_none()
    }

    /// Delete the staged file. Later calls are no-ops.
    pub fn release(&mut self) -> Result<(), StageError> {
        let Some(temp) = self.temp.take() else {
            return Ok(());
        };

        let held = self.created_at.elapsed().unwrap_or_default();
        tracing::debug!(
            path = %self.path.display(),
            held_ms = held.as_millis() as u64,
            "Releasing staged configuration"
        );

        match temp.close() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StageError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "Staged configuration left behind");
        }
    }
}
