// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use ocr_node::{api::AppState, config::ServiceConfig};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting OCR Node...\n");
    println!("📦 BUILD VERSION: {}", ocr_node::version::VERSION);
    println!();

    let config = ServiceConfig::from_env();

    println!("⚙️  Configuration:");
    println!("   Bind address: {}", config.bind_addr);
    println!("   Max upload: {} bytes", config.max_upload_bytes);
    println!("   Spool dir: {}", config.spool_dir.display());
    println!(
        "   OCR engine: {} (--oem {} --psm {}, timeout {:?})",
        config.engine.binary_path.display(),
        config.engine.oem,
        config.engine.psm,
        config.engine.timeout
    );
    println!("   Preprocess: {:?}", config.preprocess.policy);
    println!();

    let state = AppState::new(config);

    // A missing engine is a per-request error, not a startup failure, but
    // say so loudly up front.
    match state.engine.probe().await {
        Ok(banner) => println!("✅ OCR engine available: {}", banner),
        Err(e) => tracing::warn!("OCR engine not available at startup: {}", e),
    }

    ocr_node::api::start_server(state)
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))?;

    Ok(())
}
