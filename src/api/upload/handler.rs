// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload endpoint handler

use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError};
use axum::extract::State;
use axum::http::StatusCode;
use tracing::{debug, error, info, warn};

use super::validation::validate_upload;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::ocr::preprocess_file;
use crate::storage::{Stage, TransientFile};

/// POST /upload - Extract text from an uploaded image
///
/// Accepts a multipart form with an `image` file part and returns the text
/// the OCR engine produced, as `text/plain; charset=utf-8`.
///
/// The request walks validate -> store -> preprocess -> extract. If
/// preprocessing fails the raw upload is fed to the engine instead of
/// failing the request. Every spool file created along the way is released
/// before the response is returned, on success and on every failure path.
///
/// # Errors
/// - 400 Bad Request: missing `image` part, empty filename, bad multipart
/// - 413 Payload Too Large: upload exceeds the configured maximum
/// - 415 Unsupported Media Type: filename extension not in the allowlist
/// - 500 Internal Server Error: storage or extraction failed (generic
///   message; detail is logged server-side only)
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<String, ApiError> {
    let max_bytes = state.config.max_upload_bytes;

    // 1. Pull the image part out of the multipart stream
    let (filename, bytes) = read_image_field(&mut multipart, max_bytes).await?;

    debug!(
        filename = filename.as_deref().unwrap_or(""),
        size = bytes.len(),
        "Upload received"
    );

    // 2. Validate before anything touches the filesystem
    let extension = validate_upload(filename.as_deref(), bytes.len(), max_bytes)?;

    // 3. Spool the raw upload under an opaque unique name
    let mut raw = TransientFile::create(&state.config.spool_dir, &bytes, Stage::Raw, &extension)
        .map_err(|e| {
            error!("Failed to spool upload: {}", e);
            ApiError::Internal
        })?;

    // 4. Preprocess; a failure here degrades to the raw image
    let mut preprocessed =
        match preprocess_file(&raw, &state.config.preprocess, &state.config.spool_dir) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("Preprocessing failed, falling back to raw upload: {}", e);
                None
            }
        };

    // 5. Run the OCR engine on whichever artifact we ended up with
    let ocr_input = preprocessed
        .as_ref()
        .map(|f| f.path())
        .unwrap_or_else(|| raw.path());

    let result = state.engine.extract(ocr_input).await;

    // 6. Release spool files before responding; Drop covers anything missed
    if let Some(ref mut file) = preprocessed {
        if let Err(e) = file.release() {
            warn!("Failed to release preprocessed spool file: {}", e);
        }
    }
    if let Err(e) = raw.release() {
        warn!("Failed to release raw spool file: {}", e);
    }

    // 7. Map the outcome
    match result {
        Ok(text) => {
            info!(chars = text.len(), "OCR complete");
            Ok(text)
        }
        Err(e) => {
            error!("Text extraction failed: {}", e);
            Err(ApiError::Internal)
        }
    }
}

/// Find the `image` field in the multipart stream and read its content.
///
/// A body that blows the framework limit surfaces here as a 413, the same
/// status the explicit size check produces.
async fn read_image_field(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> Result<(Option<String>, Bytes), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| map_multipart_error(e, max_bytes))?
    {
        if field.name() == Some("image") {
            let filename = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| map_multipart_error(e, max_bytes))?;
            return Ok((filename, bytes));
        }
    }

    Err(ApiError::MissingImageField)
}

fn map_multipart_error(err: MultipartError, max_bytes: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit: max_bytes }
    } else {
        ApiError::BadMultipart(err.body_text())
    }
}
