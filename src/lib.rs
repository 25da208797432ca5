// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod ocr;
pub mod storage;
pub mod version;

// Re-export main types
pub use api::{build_router, start_server, ApiError, AppState, ALLOWED_EXTENSIONS};
pub use config::ServiceConfig;
pub use ocr::{
    DecodeError, EngineConfig, ExtractionError, FinishPolicy, PreprocessConfig, PreprocessError,
    TesseractEngine,
};
pub use storage::{Stage, StorageError, TransientFile};
