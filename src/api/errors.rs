// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP-facing error taxonomy for the upload endpoint
//!
//! Client mistakes map to specific 4xx statuses with a short plain-text
//! message. Anything internal collapses to a generic 500; the detailed cause
//! is logged server-side and never leaks into the response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// No `image` part was present in the multipart form
    MissingImageField,
    /// The part was present but carried no filename
    EmptyFilename,
    /// The filename extension is not in the allowlist
    UnsupportedExtension { extension: String },
    /// The upload exceeds the configured maximum size
    PayloadTooLarge { limit: usize },
    /// The multipart stream itself could not be parsed
    BadMultipart(String),
    /// Processing failed server-side; detail is in the logs only
    Internal,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingImageField | ApiError::EmptyFilename | ApiError::BadMultipart(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::UnsupportedExtension { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::MissingImageField => write!(f, "No image part in the request."),
            ApiError::EmptyFilename => write!(f, "No file selected."),
            ApiError::UnsupportedExtension { extension } => {
                write!(f, "File type '{}' is not allowed.", extension)
            }
            ApiError::PayloadTooLarge { limit } => {
                write!(f, "File is too large (limit is {} bytes).", limit)
            }
            ApiError::BadMultipart(msg) => write!(f, "Malformed upload: {}", msg),
            ApiError::Internal => {
                write!(f, "Error processing image. Check server logs for details.")
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}
