// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request-scoped spool files for uploaded and preprocessed images

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

/// Errors from writing or removing spool files
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create spool directory {0}: {1}")]
    CreateDir(PathBuf, #[source] io::Error),

    #[error("Failed to write spool file {0}: {1}")]
    Write(PathBuf, #[source] io::Error),

    #[error("Failed to remove spool file {0}: {1}")]
    Remove(PathBuf, #[source] io::Error),
}

/// Processing stage a spool file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Raw,
    Preprocessed,
}

impl Stage {
    fn prefix(self) -> &'static str {
        match self {
            Stage::Raw => "raw",
            Stage::Preprocessed => "pre",
        }
    }
}

/// A filesystem artifact owned by a single request.
///
/// The file is created under an opaque unique name, so client filenames never
/// reach the filesystem and concurrent requests cannot collide. `release`
/// removes the backing file and is idempotent; `Drop` performs a best-effort
/// release so cleanup also runs on early returns and panics.
#[derive(Debug)]
pub struct TransientFile {
    path: PathBuf,
    stage: Stage,
    released: bool,
}

impl TransientFile {
    /// Write `bytes` to a new uniquely named file in `spool_dir`.
    ///
    /// The full content is written before the handle is returned, so a
    /// subsequent read always sees complete content.
    pub fn create(
        spool_dir: &Path,
        bytes: &[u8],
        stage: Stage,
        extension: &str,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(spool_dir)
            .map_err(|e| StorageError::CreateDir(spool_dir.to_path_buf(), e))?;

        let name = format!("{}-{}.{}", stage.prefix(), Uuid::new_v4(), extension);
        let path = spool_dir.join(name);

        fs::write(&path, bytes).map_err(|e| StorageError::Write(path.clone(), e))?;

        Ok(Self {
            path,
            stage,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Remove the backing file.
    ///
    /// Calling this twice, or after the file is already gone, is not an error.
    pub fn release(&mut self) -> Result<(), StorageError> {
        if self.released {
            return Ok(());
        }

        match fs::remove_file(&self.path) {
            Ok(()) => {
                self.released = true;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.released = true;
                Ok(())
            }
            Err(e) => Err(StorageError::Remove(self.path.clone(), e)),
        }
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("Failed to clean up spool file: {}", e);
        }
    }
}
