//! # sealtalk-server
//!
//! Blind relay for Sealtalk participants.
//!
//! This binary provides:
//! - **Roster broadcast**: every login and disconnect pushes the full list of
//!   participants to every open connection
//! - **Envelope forwarding**: ciphertext is stamped with the sender's key and
//!   a server timestamp, then routed by recipient id without ever being
//!   decrypted
//! - **REST endpoints** (axum) for health checks and instance info

mod api;
mod config;
mod error;
mod relay;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sealtalk_server=debug")),
        )
        .init();

    info!("Starting Sealtalk relay v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    let http_addr = config.http_addr;
    let state = AppState::new(config);

    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
