// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration, loaded from environment variables with compiled
//! defaults

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::ocr::{EngineConfig, FinishPolicy, PreprocessConfig};

/// Default upload size cap (16 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub max_upload_bytes: usize,
    pub spool_dir: PathBuf,
    pub engine: EngineConfig,
    pub preprocess: PreprocessConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().expect("valid default bind addr"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            spool_dir: env::temp_dir().join("ocr-node"),
            engine: EngineConfig::default(),
            preprocess: PreprocessConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Read configuration from environment variables, falling back to the
    /// defaults for anything unset or unparseable.
    ///
    /// Recognized variables: `BIND_ADDR`, `MAX_UPLOAD_BYTES`, `SPOOL_DIR`,
    /// `TESSERACT_PATH`, `TESSERACT_OEM`, `TESSERACT_PSM`,
    /// `OCR_TIMEOUT_SECS`, `PREPROCESS_POLICY` (`contrast` | `otsu`),
    /// `PREPROCESS_CONTRAST_FACTOR`, `PREPROCESS_BLUR_SIGMA`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = env::var("BIND_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.bind_addr);

        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_upload_bytes);

        let spool_dir = env::var("SPOOL_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.spool_dir);

        let engine = EngineConfig {
            binary_path: env::var("TESSERACT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.engine.binary_path),
            oem: env::var("TESSERACT_OEM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.engine.oem),
            psm: env::var("TESSERACT_PSM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.engine.psm),
            timeout: env::var("OCR_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.engine.timeout),
        };

        let contrast_factor = env::var("PREPROCESS_CONTRAST_FACTOR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::ocr::preprocess::DEFAULT_CONTRAST_FACTOR);

        let preprocess = PreprocessConfig {
            blur_sigma: env::var("PREPROCESS_BLUR_SIGMA")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.preprocess.blur_sigma),
            policy: parse_policy(
                env::var("PREPROCESS_POLICY").ok().as_deref(),
                contrast_factor,
            ),
        };

        Self {
            bind_addr,
            max_upload_bytes,
            spool_dir,
            engine,
            preprocess,
        }
    }
}

/// Resolve the finishing policy name. Unknown values fall back to the
/// contrast variant rather than failing startup.
fn parse_policy(name: Option<&str>, contrast_factor: f32) -> FinishPolicy {
    match name.map(str::to_ascii_lowercase).as_deref() {
        Some("otsu") => FinishPolicy::Otsu,
        _ => FinishPolicy::Contrast {
            factor: contrast_factor,
        },
    }
}
