// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR pipeline: image loading, preprocessing, and engine invocation

pub mod engine;
pub mod image_utils;
pub mod preprocess;

pub use engine::{EngineConfig, ExtractionError, TesseractEngine};
pub use image_utils::{decode_image_bytes, detect_format, DecodeError, ImageInfo};
pub use preprocess::{
    preprocess_file, run_pipeline, FinishPolicy, PreprocessConfig, PreprocessError,
};
