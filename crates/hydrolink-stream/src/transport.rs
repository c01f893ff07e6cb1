//! Transport abstraction for the event stream.
//!
//! A [`Transport`] opens one bidirectional text stream. The session owns
//! the resulting [`Connection`] exclusively; no other component writes to
//! or closes it. Keeping the transport behind a trait lets tests drive the
//! session with an in-process connection.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{Result, StreamError};

/// Inbound notifications from an established connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A text message from the peer.
    Message(String),
    /// The connection closed, peer- or locally-initiated.
    Closed { code: Option<u16>, reason: String },
    /// A transport-level error on an established connection.
    Error(String),
}

/// Frames the session writes to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    Close,
}

/// Opens persistent connections to the event endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish a connection. A successful return is the "open" signal;
    /// later failures arrive as [`TransportEvent`]s on the connection.
    async fn connect(&self) -> Result<Connection>;
}

/// An established stream: an outbound frame channel plus the inbound
/// event receiver (taken once by the session's reader task).
pub struct Connection {
    outbound: mpsc::Sender<OutboundFrame>,
    events: Option<mpsc::Receiver<TransportEvent>>,
}

impl Connection {
    /// Build a connection backed by in-process channels. Returns the
    /// session-facing connection plus the transport-side endpoints:
    /// the receiver of outbound frames and the sender of inbound events.
    pub fn pipe(
        capacity: usize,
    ) -> (
        Connection,
        mpsc::Receiver<OutboundFrame>,
        mpsc::Sender<TransportEvent>,
    ) {
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let connection = Connection {
            outbound: outbound_tx,
            events: Some(event_rx),
        };
        (connection, outbound_rx, event_tx)
    }

    /// Write one text message.
    pub async fn send(&self, text: String) -> Result<()> {
        self.outbound
            .send(OutboundFrame::Text(text))
            .await
            .map_err(|_| StreamError::SendFailed("connection closed".to_string()))
    }

    /// Request a close. Waits for channel space so a backlog of text
    /// frames cannot swallow the close handshake; best effort once the
    /// writer side is gone.
    pub async fn close(&self) {
        let _ = self.outbound.send(OutboundFrame::Close).await;
    }

    /// Take the inbound event receiver. Returns `None` after the first
    /// call; the reader task is the sole consumer.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<TransportEvent>> {
        self.events.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pipe_carries_text_frames() {
        let (connection, mut outbound_rx, _event_tx) = Connection::pipe(8);
        connection.send("hello".to_string()).await.unwrap();
        assert_eq!(
            outbound_rx.recv().await,
            Some(OutboundFrame::Text("hello".to_string()))
        );
    }

    #[tokio::test]
    async fn send_after_transport_gone_fails() {
        let (connection, outbound_rx, _event_tx) = Connection::pipe(8);
        drop(outbound_rx);
        assert!(matches!(
            connection.send("hello".to_string()).await,
            Err(StreamError::SendFailed(_))
        ));
    }

    #[tokio::test]
    async fn close_is_delivered_even_when_channel_is_full() {
        let (connection, mut outbound_rx, _event_tx) = Connection::pipe(1);
        connection.send("queued".to_string()).await.unwrap();
        let closer = tokio::spawn(async move {
            connection.close().await;
        });
        assert_eq!(
            outbound_rx.recv().await,
            Some(OutboundFrame::Text("queued".to_string()))
        );
        assert_eq!(outbound_rx.recv().await, Some(OutboundFrame::Close));
        closer.await.unwrap();
    }

    #[tokio::test]
    async fn events_receiver_is_taken_once() {
        let (mut connection, _outbound_rx, _event_tx) = Connection::pipe(8);
        assert!(connection.take_events().is_some());
        assert!(connection.take_events().is_none());
    }
}
