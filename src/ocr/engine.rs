// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text extraction via the external `tesseract` CLI
//!
//! The engine is a black box: it is handed an image path and a fixed mode
//! configuration, and returns whatever text it produced. Engine selection
//! (`--oem`) and page segmentation (`--psm`) are deployment tuning knobs,
//! not correctness concerns.

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Default OCR engine mode (`--oem 3`: whatever the engine considers best)
pub const DEFAULT_OEM: u8 = 3;

/// Default page segmentation mode (`--psm 6`: single uniform block of text)
pub const DEFAULT_PSM: u8 = 6;

/// Default wall-clock bound on a single extraction
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from invoking the OCR engine
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to spawn OCR engine '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error("OCR engine exited with {status}: {stderr}")]
    EngineFailed { status: ExitStatus, stderr: String },

    #[error("OCR engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to read OCR engine output: {0}")]
    Output(#[source] io::Error),
}

/// Configuration for the OCR engine invocation.
///
/// Held explicitly by the engine instance rather than in process-wide state,
/// so tests and deployments can run different engines side by side.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub binary_path: PathBuf,
    pub oem: u8,
    pub psm: u8,
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("tesseract"),
            oem: DEFAULT_OEM,
            psm: DEFAULT_PSM,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Handle to the external OCR engine
#[derive(Debug)]
pub struct TesseractEngine {
    config: EngineConfig,
}

impl TesseractEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Check engine availability by asking it for its version string.
    pub async fn probe(&self) -> Result<String, ExtractionError> {
        let output = Command::new(&self.config.binary_path)
            .arg("--version")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractionError::Spawn {
                binary: self.config.binary_path.display().to_string(),
                source: e,
            })?;

        // Older tesseract releases print the version banner to stderr
        let banner = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };

        Ok(banner.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Run the engine on `image_path` and return the extracted text verbatim,
    /// including whatever whitespace and newlines the engine produced.
    ///
    /// The engine writes its output next to a base path we provide; that base
    /// lives in a private temp directory which is removed when this call
    /// returns, on success and failure alike.
    pub async fn extract(&self, image_path: &Path) -> Result<String, ExtractionError> {
        let workdir = tempfile::TempDir::with_prefix("ocr-engine")
            .map_err(ExtractionError::Output)?;
        let output_base = workdir.path().join("output");

        debug!(
            binary = %self.config.binary_path.display(),
            oem = self.config.oem,
            psm = self.config.psm,
            image = %image_path.display(),
            "Invoking OCR engine"
        );

        let invocation = Command::new(&self.config.binary_path)
            .arg(image_path)
            .arg(&output_base)
            .arg("--oem")
            .arg(self.config.oem.to_string())
            .arg("--psm")
            .arg(self.config.psm.to_string())
            .kill_on_drop(true)
            .output();

        let output = match timeout(self.config.timeout, invocation).await {
            Ok(result) => result.map_err(|e| ExtractionError::Spawn {
                binary: self.config.binary_path.display().to_string(),
                source: e,
            })?,
            Err(_) => return Err(ExtractionError::Timeout(self.config.timeout)),
        };

        if !output.status.success() {
            return Err(ExtractionError::EngineFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let text_path = output_base.with_extension("txt");
        let text = std::fs::read_to_string(&text_path).map_err(ExtractionError::Output)?;

        Ok(text)
    }
}
