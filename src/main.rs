//! Cribside Relay Server
//!
//! Run with: cargo run --bin cribside-server
//!
//! # Configuration
//!
//! Looks for a TOML config file (see `config::generate_default_config`),
//! then applies environment overrides:
//! - `CRIBSIDE_HOST`: Host to bind to (default: 0.0.0.0)
//! - `CRIBSIDE_PORT`: Port to listen on (default: 8000)
//! - `CRIBSIDE_SECRET` / `APP_SECRET`: Shared secret for devices and viewers
//! - `CRIBSIDE_CORS_ORIGINS`: Comma-separated allowed origins
//! - `RUST_LOG`: Log filter (overrides the config level)

use cribside::api::{serve, AppState};
use cribside::config::Config;
use cribside::hub::{Hub, HubConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load_default();
    init_tracing(&config);

    tracing::info!("Starting Cribside relay v{}", env!("CARGO_PKG_VERSION"));

    if config.auth.secret == "dev-secret-change-me" {
        tracing::warn!("Running with the development secret; set CRIBSIDE_SECRET in production");
    }

    let hub = Arc::new(Hub::new(HubConfig::from(&config.hub)));
    let state = AppState::new(hub, config);

    serve(state).await?;

    tracing::info!("Cribside relay stopped");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "cribside={},tower_http=info",
            config.logging.level
        ))
    });

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
