//! Connection Seam
//!
//! The hub only ever pushes text frames at subscribers and drops them on the
//! first failure, so the seam is a narrow object trait. Accepting the
//! handshake and reading inbound frames stay with the adapter that owns the
//! socket.

use async_trait::async_trait;
use thiserror::Error;

/// Unique identifier assigned to a connection when it subscribes.
pub type ConnectionId = String;

/// Close code sent when a client presents a bad token.
pub const CLOSE_UNAUTHORIZED: u16 = 4401;

/// A live subscriber connection, as the hub sees it.
///
/// `send` must not block indefinitely; any failure is terminal for the
/// connection and the hub prunes it. `close` is best-effort and idempotent.
#[async_trait]
pub trait RelayConnection: Send + Sync {
    /// Deliver one text frame to the remote peer.
    async fn send(&self, text: &str) -> Result<(), ConnectionError>;

    /// Graceful shutdown with a close code.
    async fn close(&self, code: u16);
}

/// Failures a connection can signal.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The peer disconnected or the connection was already closed.
    #[error("connection closed")]
    Closed,

    /// The underlying transport rejected the frame.
    #[error("transport error: {0}")]
    Transport(String),

    /// The send did not complete within the configured bound.
    #[error("send timed out")]
    Timeout,
}
