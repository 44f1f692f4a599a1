//! # sealtalk
//!
//! Terminal participant for a Sealtalk relay. Messages are end-to-end
//! encrypted per peer; the relay only sees ciphertext.

use sealtalk_client::{app, init_tracing, ClientConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("Starting Sealtalk client v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(relay = %config.relay_url, "Loaded configuration");

    app::run(config).await
}
