//! Gift Courier control API server
//!
//! Web surface for starting, watching, and stopping transfer Runs.
//!
//! Usage:
//!   cargo run --bin courier_api
//!
//! Environment:
//!   COURIER_PORT - Server port (default: 8080; platform PORT wins)
//!   COURIER_HOST - Server host (default: 0.0.0.0)
//!   API_KEY      - Shared secret for mutating endpoints (unset: open)

use std::net::SocketAddr;
use std::sync::Arc;

use gift_courier::api::{create_router, start_cleanup_task, AppState};
use gift_courier::AppConfig;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .init();

    // Per-request bodies carry the credentials; an incomplete environment
    // only limits what the defaults prefill.
    let config = AppConfig::load_or_fallback();
    let auth_enabled = config.api_key.is_some();

    let state = Arc::new(AppState::new(config));

    // Expire stale rate-limit windows in the background
    start_cleanup_task();

    let app = create_router(state);

    // Platform deployments inject PORT; COURIER_PORT is for local runs
    let host = std::env::var("COURIER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("COURIER_PORT"))
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("🚀 Gift Courier API starting on http://{}", addr);
    info!("🔐 API key auth: {}", if auth_enabled { "enabled" } else { "disabled" });
    info!("");
    info!("Endpoints:");
    info!("  POST /api/run            - Start the transfer pipeline");
    info!("  POST /api/transfer       - Transfer one specific gift");
    info!("  POST /api/gifts          - List owned gifts (read-only)");
    info!("  POST /api/stop           - Stop the active run");
    info!("  GET  /api/status         - Run status and output");
    info!("  GET  /api/logs           - List log files");
    info!("  GET  /api/logs/current   - Download the active run's log");
    info!("  GET  /api/logs/{{file}}    - Download a log file");
    info!("  GET  /api/health         - Health check");
    info!("");
    info!("Press Ctrl+C for graceful shutdown");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("");
    info!("🛑 Shutdown signal received, cleaning up...");
    info!("👋 Gift Courier API shutdown complete");

    Ok(())
}
