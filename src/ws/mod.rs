//! WebSocket Adapters
//!
//! Transport layer between axum WebSockets and the relay hub.
//!
//! ## Endpoints
//!
//! - `GET /ws/app/{device_id}` - viewer apps subscribe to one device's
//!   stream and receive every reading as a JSON text frame
//! - `GET /ws/device/{device_id}` - devices push readings frame by frame
//!
//! Both require the shared-secret token as a `token` query parameter; a bad
//! token closes the socket with code 4401.
//!
//! ## Example
//!
//! ```javascript
//! // Viewer app
//! const ws = new WebSocket('ws://localhost:8000/ws/app/demo-1?token=...');
//! ws.onmessage = (event) => {
//!   const reading = JSON.parse(event.data);
//!   console.log(reading.respiration_rate);
//! };
//! ```

mod connection;
mod handler;

pub use connection::WsConnection;
pub use handler::{device_handler, viewer_handler};
