//! Split transport: events over Server-Sent Events, writes as HTTP POSTs
//!
//! Writes have no delivery confirmation. A failed POST is reported as a
//! non-fatal [`TransportEvent::Error`]; nothing is retried and the map keeps
//! its optimistic local state until the server sends a fresh `init`.
//!
//! Each write is an independent request, so two quick writes to the same
//! key may reach the server in either order. The mirror follows whatever
//! the server echoes back over the event stream.

use super::sse::SseDecoder;
use super::{EventReceiver, EventSender, TransportAdapter, TransportEvent, TransportKind};
use crate::config;
use crate::error::{Result, TransportError};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use url::Url;

/// SSE-subscribe / POST-write transport
#[derive(Debug)]
pub struct SplitTransport {
    events: EventReceiver,
    // Weak so the queue ends once the subscription task finishes
    error_tx: mpsc::WeakUnboundedSender<TransportEvent>,
    http_client: Client,
    write_url: Url,
    timeout: Duration,
    cancel_tx: mpsc::UnboundedSender<()>,
    // Writes may be issued from threads outside the runtime
    runtime: Handle,
    closed: bool,
}

impl SplitTransport {
    /// Start the event subscription; writes go to `write_url`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(subscribe_url: &str, write_url: &str, timeout: Duration) -> Result<Self> {
        let subscribe_url = config::http_url(subscribe_url)?;
        let write_url = config::http_url(write_url)?;

        let http_client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(TransportError::from)?;

        let (event_tx, event_rx) = super::event_channel();
        let (cancel_tx, cancel_rx) = mpsc::unbounded_channel();
        let error_tx = event_tx.downgrade();

        let runtime = Handle::current();
        runtime.spawn(run_subscription(
            http_client.clone(),
            subscribe_url,
            event_tx,
            cancel_rx,
        ));

        Ok(Self {
            events: event_rx,
            error_tx,
            http_client,
            write_url,
            timeout,
            cancel_tx,
            runtime,
            closed: false,
        })
    }
}

#[async_trait]
impl TransportAdapter for SplitTransport {
    fn send_write(&mut self, frame: String) {
        if self.closed {
            tracing::debug!("Split transport closed, dropping write");
            return;
        }

        let request = self
            .http_client
            .post(self.write_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(frame);
        let error_tx = self.error_tx.clone();

        self.runtime.spawn(async move {
            let outcome = match request.send().await {
                Ok(response) => response.error_for_status().map(|_| ()),
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                tracing::warn!("Write request failed: {}", e);
                match error_tx.upgrade() {
                    Some(events) => {
                        let _ = events.send(TransportEvent::Error(e.into()));
                    }
                    None => tracing::debug!("Subscription already ended, error not reported"),
                }
            }
        });
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
        TransportKind::Split
    }
}

async fn run_subscription(
    http_client: Client,
    url: Url,
    events: EventSender,
    mut cancel_rx: mpsc::UnboundedReceiver<()>,
) {
    tracing::debug!("Subscribing to event source: {}", url);

    let request = http_client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send();

    let response = tokio::select! {
        _ = cancel_rx.recv() => {
            let _ = events.send(TransportEvent::Closed);
            return;
        }
        result = request => result.and_then(|response| response.error_for_status()),
    };

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Failed to subscribe: {}", e);
            let _ = events.send(TransportEvent::Error(TransportError::Stream(e.to_string())));
            let _ = events.send(TransportEvent::Closed);
            return;
        }
    };

    if events.send(TransportEvent::Open).is_err() {
        return;
    }

    let mut decoder = SseDecoder::new();
    let mut body = Box::pin(response.bytes_stream());

    'stream: loop {
        tokio::select! {
            _ = cancel_rx.recv() => {
                tracing::debug!("Event subscription cancelled");
                break;
            }
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => {
                    let decoded = match decoder.feed(&bytes) {
                        Ok(decoded) => decoded,
                        Err(e) => {
                            tracing::error!("Event stream error: {}", e);
                            let _ = events.send(TransportEvent::Error(e));
                            break;
                        }
                    };
                    for event in decoded {
                        if !event.is_update() {
                            tracing::debug!("Ignoring SSE event: {}", event.event);
                            continue;
                        }
                        if events.send(TransportEvent::Message(event.data)).is_err() {
                            break 'stream;
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::error!("Event stream error: {}", e);
                    let _ = events.send(TransportEvent::Error(TransportError::Stream(e.to_string())));
                    break;
                }
                None => {
                    tracing::debug!("Event stream ended");
                    break;
                }
            }
        }
    }

    let _ = events.send(TransportEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SharedMapError;

    #[tokio::test]
    async fn test_connect_validates_both_urls() {
        let err = SplitTransport::connect(
            "ws://localhost/collection",
            "http://localhost/collection",
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, SharedMapError::UnsupportedScheme(_)));

        let err = SplitTransport::connect(
            "http://localhost/collection",
            "not a url",
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, SharedMapError::InvalidUrl(_)));
    }
}
