//! WebSocket Handlers
//!
//! Session lifecycle for viewer and device sockets. The viewer handler owns
//! the subscribe/unsubscribe pairing; the device handler turns inbound text
//! frames into hub publishes.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures_util::StreamExt;
use std::sync::Arc;

use crate::api::AppState;
use crate::auth::{token_matches, TokenQuery};
use crate::hub::{Hub, RelayConnection, CLOSE_UNAUTHORIZED};
use crate::telemetry::Telemetry;
use crate::ws::connection::WsConnection;

/// GET /ws/app/{device_id}
///
/// Viewer subscription endpoint. The app receives every reading published
/// for the device until it disconnects.
pub async fn viewer_handler(
    ws: WebSocketUpgrade,
    Path(device_id): Path<String>,
    Query(query): Query<TokenQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let authorized = query
        .token
        .as_deref()
        .map(|t| token_matches(t, &state.config.auth.secret))
        .unwrap_or(false);
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| viewer_session(socket, hub, device_id, authorized))
}

async fn viewer_session(socket: WebSocket, hub: Arc<Hub>, device_id: String, authorized: bool) {
    let (sink, mut stream) = socket.split();
    let connection = Arc::new(WsConnection::new(sink));

    if !authorized {
        tracing::debug!(device_id = %device_id, "Viewer rejected: bad token");
        connection.close(CLOSE_UNAUTHORIZED).await;
        return;
    }

    let connection_id = hub.subscribe(&device_id, connection).await;

    // The viewer never has to send anything; drain inbound frames (pings,
    // keepalives) until the peer goes away.
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    hub.unsubscribe(&device_id, &connection_id).await;
    tracing::debug!(device_id = %device_id, connection_id = %connection_id, "Viewer disconnected");
}

/// GET /ws/device/{device_id}
///
/// Device ingest endpoint. Each text frame is one reading; `device_id` and
/// `ts` are filled in when the device omits them. Malformed frames are
/// dropped without killing the session.
pub async fn device_handler(
    ws: WebSocketUpgrade,
    Path(device_id): Path<String>,
    Query(query): Query<TokenQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let authorized = query
        .token
        .as_deref()
        .map(|t| token_matches(t, &state.config.auth.secret))
        .unwrap_or(false);
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| device_session(socket, hub, device_id, authorized))
}

async fn device_session(mut socket: WebSocket, hub: Arc<Hub>, device_id: String, authorized: bool) {
    if !authorized {
        tracing::debug!(device_id = %device_id, "Device rejected: bad token");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_UNAUTHORIZED,
                reason: "invalid token".into(),
            })))
            .await;
        return;
    }

    tracing::info!(device_id = %device_id, "Device stream opened");

    while let Some(frame) = socket.recv().await {
        match frame {
            Ok(Message::Text(raw)) => match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(value) => {
                    if let Some(reading) = Telemetry::from_frame(value, Some(&device_id)) {
                        hub.publish(&reading).await;
                    } else {
                        tracing::debug!(device_id = %device_id, "Unroutable frame dropped");
                    }
                }
                Err(e) => {
                    tracing::debug!(device_id = %device_id, error = %e, "Malformed frame dropped");
                }
            },
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    tracing::info!(device_id = %device_id, "Device stream closed");
}
