// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Router construction and server startup

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::upload::upload_handler;
use crate::config::ServiceConfig;
use crate::ocr::TesseractEngine;
use crate::version;

// Slack on top of the upload limit for multipart boundaries and headers
const BODY_LIMIT_OVERHEAD: usize = 64 * 1024;

/// Minimal upload form served at `/`
const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>OCR Node</title></head>
<body>
  <h1>Extract text from an image</h1>
  <form action="/upload" method="post" enctype="multipart/form-data">
    <input type="file" name="image" accept="image/*">
    <button type="submit">Upload</button>
  </form>
</body>
</html>
"#;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: serde_json::Value,
    pub engine: EngineStatus,
}

#[derive(Debug, Serialize)]
pub struct EngineStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TesseractEngine>,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Self {
        let engine = TesseractEngine::new(config.engine.clone());
        Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
        }
    }
}

/// Build the application router.
///
/// Kept separate from [`start_server`] so tests can drive the router
/// directly without binding a socket.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + BODY_LIMIT_OVERHEAD;

    Router::new()
        // Upload form
        .route("/", get(index_handler))
        // OCR endpoint
        .route("/upload", post(upload_handler))
        // Health check
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let addr = state.config.bind_addr;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("OCR node listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = match state.engine.probe().await {
        Ok(banner) => EngineStatus {
            status: "available".to_string(),
            version: Some(banner),
            error: None,
        },
        Err(e) => EngineStatus {
            status: "unavailable".to_string(),
            version: None,
            error: Some(e.to_string()),
        },
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: version::get_version_info(),
        engine,
    })
}
