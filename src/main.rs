//! Mini-program API demo - Main Entry Point
//!
//! Loads configuration, serves the demo routes, and shuts down gracefully
//! on SIGINT/SIGTERM.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use microapp_demo::server::{self, Lifecycle};
use microapp_demo::{AppConfig, AppState, HmacSha256Signer, MicroappClient, build_router};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,microapp_demo=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Microapp demo starting...");

    // Load configuration
    let config = AppConfig::from_env()?;
    info!("📋 Configuration loaded");

    let client = MicroappClient::from_config(&config)?;
    info!("🔑 Platform client ready for app {}", client.app_id());

    let state = AppState::new(Arc::new(client), Arc::new(HmacSha256Signer));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {}", config.listen_addr, e))
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    let lifecycle = Lifecycle::new();
    server::run(
        listener,
        app,
        server::shutdown_signal(),
        config.shutdown_timeout(),
        &lifecycle,
    )
    .await
    .inspect_err(|e| error!("💥 Server stopped with error: {}", e))
    .context("Server shutdown failed")?;

    info!("✅ Microapp demo stopped");
    Ok(())
}
