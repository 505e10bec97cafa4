//! # Cribside
//!
//! Real-time infant telemetry relay. Cot-side devices push sensor readings
//! (respiration, heart rate, temperatures, gas level, noise, presence,
//! discrete events) over HTTP or WebSocket; viewer apps subscribe per device
//! over WebSocket and receive each reading as it arrives.
//!
//! ## Modules
//!
//! - [`hub`]: The core per-device publish/subscribe hub
//! - [`telemetry`]: The open-map reading model
//! - [`ws`]: WebSocket adapters for viewers and devices
//! - [`api`]: REST layer and router, built with Axum
//! - [`auth`]: Shared-secret token check
//! - [`config`]: TOML + environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cribside::api::{serve, AppState};
//! use cribside::config::Config;
//! use cribside::hub::{Hub, HubConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let hub = Arc::new(Hub::new(HubConfig::from(&config.hub)));
//!     serve(AppState::new(hub, config)).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod hub;
pub mod telemetry;
pub mod ws;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiError, ApiResult, AppState};
pub use config::{Config, ConfigError};
pub use hub::{ConnectionError, ConnectionId, Hub, HubConfig, HubEvents, RelayConnection};
pub use telemetry::{FieldValue, Telemetry};
pub use ws::WsConnection;
