//! Duplex transport: a single WebSocket carries events and writes

use super::{EventReceiver, EventSender, TransportAdapter, TransportEvent, TransportKind};
use crate::config;
use crate::error::{Result, TransportError};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use url::Url;

/// WebSocket-backed transport
///
/// The connection runs on a spawned task that reports `Open` once the
/// handshake completes. Dropping the transport closes the socket.
#[derive(Debug)]
pub struct DuplexTransport {
    events: EventReceiver,
    writes: mpsc::UnboundedSender<String>,
    cancel_tx: mpsc::UnboundedSender<()>,
    closed: bool,
}

impl DuplexTransport {
    /// Start connecting to `url` (`ws`, `wss`, or `http(s)` mapped to `ws(s)`)
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let url = config::websocket_url(url)?;

        let (event_tx, event_rx) = super::event_channel();
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_socket(url, timeout, event_tx, write_rx, cancel_rx));

        Ok(Self {
            events: event_rx,
            writes: write_tx,
            cancel_tx,
            closed: false,
        })
    }
}

#[async_trait]
impl TransportAdapter for DuplexTransport {
    fn send_write(&mut self, frame: String) {
        if self.closed || self.writes.send(frame).is_err() {
            tracing::debug!("WebSocket task has ended, dropping write");
        }
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    fn try_recv(&mut self) -> Option<TransportEvent> {
        super::try_next(&mut self.events)
    }

    fn close(&mut self) {
        self.closed = true;
        let _ = self.cancel_tx.send(());
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Duplex
    }
}

async fn run_socket(
    url: Url,
    timeout: Duration,
    events: EventSender,
    mut writes: mpsc::UnboundedReceiver<String>,
    mut cancel_rx: mpsc::UnboundedReceiver<()>,
) {
    tracing::debug!("Connecting to WebSocket: {}", url);

    let connect = tokio::time::timeout(timeout, connect_async(url.as_str()));
    let ws_stream = tokio::select! {
        _ = cancel_rx.recv() => {
            tracing::debug!("WebSocket connect cancelled");
            let _ = events.send(TransportEvent::Closed);
            return;
        }
        result = connect => match result {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(e)) => {
                tracing::error!("Failed to connect WebSocket: {}", e);
                let _ = events.send(TransportEvent::Error(e.into()));
                let _ = events.send(TransportEvent::Closed);
                return;
            }
            Err(_) => {
                tracing::error!("WebSocket connect timed out after {:?}", timeout);
                let _ = events.send(TransportEvent::Error(TransportError::WebSocket(
                    "connect timed out".to_string(),
                )));
                let _ = events.send(TransportEvent::Closed);
                return;
            }
        }
    };

    if events.send(TransportEvent::Open).is_err() {
        return;
    }

    let (mut sink, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            _ = cancel_rx.recv() => {
                tracing::debug!("WebSocket closed locally");
                let _ = sink.send(WsMessage::Close(None)).await;
                break;
            }
            Some(frame) = writes.recv() => {
                if let Err(e) = sink.send(WsMessage::Text(frame.into())).await {
                    tracing::warn!("Failed to send frame: {}", e);
                    let _ = events.send(TransportEvent::Error(e.into()));
                    break;
                }
            }
            msg = read.next() => {
                let delivered = match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        events.send(TransportEvent::Message(text.as_str().to_owned()))
                    }
                    Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => events.send(TransportEvent::Message(text)),
                        Err(e) => {
                            tracing::warn!("Discarding non UTF-8 binary frame: {}", e);
                            Ok(())
                        }
                    },
                    Some(Ok(WsMessage::Close(_))) => {
                        tracing::debug!("WebSocket closed by server");
                        break;
                    }
                    Some(Ok(_)) => Ok(()),
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        let _ = events.send(TransportEvent::Error(e.into()));
                        break;
                    }
                    None => {
                        tracing::debug!("WebSocket stream ended");
                        break;
                    }
                };
                if delivered.is_err() {
                    // Map dropped its transport
                    break;
                }
            }
        }
    }

    let _ = events.send(TransportEvent::Closed);
}
