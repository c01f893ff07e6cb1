//! Persistent event-stream client for the Orbit push-event endpoint.
//!
//! [`EventStream`] maintains one subscription per device: it connects,
//! subscribes with the device's session token, keeps the connection alive
//! with periodic pings, and re-establishes the stream on a fixed cadence
//! (promptly after an error or a failed attempt). Inbound messages are
//! dispatched
//! to the device's [`DeviceHandler`](hydrolink_core::DeviceHandler) by
//! their `"event"` tag.

pub mod session;
pub mod transport;
pub mod ws;

use thiserror::Error;

pub use session::{EventStream, SessionPhase, StreamConfig};
pub use transport::{Connection, OutboundFrame, Transport, TransportEvent};
pub use ws::WsTransport;

/// Errors from the event-stream client.
#[derive(Debug, Error)]
pub enum StreamError {
    /// `send` was called while the stream is not connected.
    #[error("not connected to event service")]
    NotConnected,

    /// The transport could not establish a connection.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// A write to an established connection failed.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Result type for event-stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
