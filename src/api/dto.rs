//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::telemetry::FieldValue;

/// Telemetry ingest request
///
/// Everything beyond the routing key and timestamp is an open field map.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    /// Routing key
    pub device_id: String,
    /// Optional reading time; defaults to receipt time
    #[serde(default)]
    pub ts: Option<DateTime<Utc>>,
    /// Sensor fields
    #[serde(flatten)]
    pub fields: HashMap<String, FieldValue>,
}

/// Telemetry ingest response
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Always true; delivery failures are not the publisher's concern
    pub ok: bool,
    /// Timestamp the reading was relayed with
    pub ts: DateTime<Utc>,
    /// Number of subscribers the reading reached
    pub delivered: usize,
}

/// Full health status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy"
    pub status: String,
    /// Devices with a live subscriber registry
    pub devices: usize,
    /// Live viewer connections across all devices
    pub subscribers: usize,
    /// Seconds since startup
    pub uptime_seconds: u64,
    /// Crate version
    pub version: String,
}
