//! Ingest Route
//!
//! HTTP path for devices that POST readings instead of holding a WebSocket
//! open.
//!
//! - POST /api/v1/ingest

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use std::sync::Arc;

use crate::api::dto::{IngestRequest, IngestResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::auth::{request_authorized, TokenQuery};
use crate::telemetry::Telemetry;

/// POST /api/v1/ingest
///
/// Relay one reading to the device's current subscribers. The response is
/// positive even when some subscribers failed; those are pruned, not
/// reported.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    Json(req): Json<IngestRequest>,
) -> ApiResult<Json<IngestResponse>> {
    if !request_authorized(&headers, query.token.as_deref(), &state.config.auth.secret) {
        return Err(ApiError::Unauthorized);
    }

    if req.device_id.trim().is_empty() {
        return Err(ApiError::Validation(
            "device_id cannot be empty".to_string(),
        ));
    }

    let ts = req.ts.unwrap_or_else(Utc::now);
    let reading = Telemetry {
        device_id: req.device_id,
        ts,
        fields: req.fields,
    };

    let delivered = state.hub.publish(&reading).await;

    Ok(Json(IngestResponse {
        ok: true,
        ts,
        delivered,
    }))
}
