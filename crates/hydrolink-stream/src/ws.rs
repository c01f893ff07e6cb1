//! WebSocket transport over tokio-tungstenite.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

use crate::transport::{Connection, OutboundFrame, Transport, TransportEvent};
use crate::{Result, StreamError};

const CHANNEL_CAPACITY: usize = 32;

/// WebSocket transport for the event endpoint.
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> Result<Connection> {
        let (ws_stream, _) = connect_async(&self.url)
            .await
            .map_err(|e| StreamError::ConnectFailed(e.to_string()))?;
        debug!(url = %self.url, "websocket connected");

        let (mut write, mut read) = ws_stream.split();
        let (connection, mut outbound_rx, event_tx) = Connection::pipe(CHANNEL_CAPACITY);

        // Writer: drain outbound frames until the session drops the
        // connection or requests a close.
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                match frame {
                    OutboundFrame::Text(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            debug!(error = %e, "websocket write failed");
                            break;
                        }
                    }
                    OutboundFrame::Close => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        });

        // Reader: map frames to transport events. Ping/pong is handled by
        // tungstenite itself.
        tokio::spawn(async move {
            loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if event_tx.send(TransportEvent::Message(text)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(frame) => (Some(frame.code.into()), frame.reason.to_string()),
                            None => (None, String::new()),
                        };
                        let _ = event_tx.send(TransportEvent::Closed { code, reason }).await;
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = event_tx.send(TransportEvent::Error(e.to_string())).await;
                        return;
                    }
                    None => {
                        let _ = event_tx
                            .send(TransportEvent::Closed {
                                code: None,
                                reason: String::new(),
                            })
                            .await;
                        return;
                    }
                }
            }
        });

        Ok(connection)
    }
}
