//! WebSocket Connection Wrapper
//!
//! Adapts the write half of an axum WebSocket to the hub's connection seam.
//! The read half never leaves the handler task that owns the session.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::Mutex;

use crate::hub::{ConnectionError, RelayConnection};

/// The hub-facing half of one WebSocket session.
pub struct WsConnection {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsConnection {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl RelayConnection for WsConnection {
    async fn send(&self, text: &str) -> Result<(), ConnectionError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text.to_string()))
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    async fn close(&self, code: u16) {
        let mut sink = self.sink.lock().await;
        // Ignore failures: the peer may already be gone.
        let _ = sink
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: "".into(),
            })))
            .await;
    }
}
