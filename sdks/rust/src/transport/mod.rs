//! Transport adapters
//!
//! A transport moves JSON text frames between the map and its server and
//! reports lifecycle changes. I/O runs on spawned tasks; the map consumes
//! everything through [`TransportAdapter::recv`] in delivery order.

mod channel;
mod duplex;
mod split;
mod sse;

pub use channel::{ChannelRemote, ChannelTransport};
pub use duplex::DuplexTransport;
pub use split::SplitTransport;

use crate::error::TransportError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Something that happened on the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Channel is connected; writes can be relayed
    Open,
    /// Inbound text frame carrying one envelope
    Message(String),
    /// Failure reported out-of-band
    Error(TransportError),
    /// Channel is gone
    Closed,
}

/// Shape of the transport behind a map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Duplex,
    Split,
    Channel,
}

/// Capability set every transport shape provides
#[async_trait]
pub trait TransportAdapter: Send {
    /// Hand a serialized write intent to the transport. Never blocks and
    /// never waits for acknowledgement.
    fn send_write(&mut self, frame: String);

    /// Wait for the next transport event; `None` once the transport is done
    async fn recv(&mut self) -> Option<TransportEvent>;

    /// Next already-delivered event, without waiting
    fn try_recv(&mut self) -> Option<TransportEvent>;

    /// Tear the connection down
    fn close(&mut self);

    fn kind(&self) -> TransportKind;
}

#[async_trait]
impl TransportAdapter for Box<dyn TransportAdapter> {
    fn send_write(&mut self, frame: String) {
        (**self).send_write(frame)
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        (**self).recv().await
    }

    fn try_recv(&mut self) -> Option<TransportEvent> {
        (**self).try_recv()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn kind(&self) -> TransportKind {
        (**self).kind()
    }
}

/// Event queue shared by the transports' I/O tasks
pub(crate) type EventSender = mpsc::UnboundedSender<TransportEvent>;
pub(crate) type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

pub(crate) fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

pub(crate) fn try_next(events: &mut EventReceiver) -> Option<TransportEvent> {
    events.try_recv().ok()
}
