//! In-process transport
//!
//! [`ChannelTransport`] is the map-side half; [`ChannelRemote`] plays the
//! server: it opens and closes the link, delivers frames, injects errors and
//! collects whatever the map wrote.

use super::{EventReceiver, EventSender, TransportAdapter, TransportEvent, TransportKind};
use crate::codec::{self, Envelope};
use crate::error::{Result, TransportError};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

/// Map-side half of an in-process link
#[derive(Debug)]
pub struct ChannelTransport {
    events: EventReceiver,
    writes: mpsc::UnboundedSender<String>,
    closed: bool,
}

/// Remote half of an in-process link
#[derive(Debug)]
pub struct ChannelRemote {
    events: EventSender,
    writes: mpsc::UnboundedReceiver<String>,
}

impl ChannelTransport {
    /// Create a linked transport/remote pair; the link starts closed
    pub fn pair() -> (ChannelTransport, ChannelRemote) {
        let (event_tx, event_rx) = super::event_channel();
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        (
            ChannelTransport {
                events: event_rx,
                writes: write_tx,
                closed: false,
            },
            ChannelRemote {
                events: event_tx,
                writes: write_rx,
            },
        )
    }
}

#[async_trait]
impl TransportAdapter for ChannelTransport {
    fn send_write(&mut self, frame: String) {
        if self.closed {
            debug!("Channel transport closed, dropping write");
            return;
        }
        let _ = self.writes.send(frame);
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    fn try_recv(&mut self) -> Option<TransportEvent> {
        super::try_next(&mut self.events)
    }

    fn close(&mut self) {
        self.closed = true;
        self.events.close();
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Channel
    }
}

impl ChannelRemote {
    /// Report the link as connected
    pub fn open(&self) {
        self.emit(TransportEvent::Open);
    }

    /// Report the link as gone
    pub fn close(&self) {
        self.emit(TransportEvent::Closed);
    }

    /// Report an out-of-band failure
    pub fn fail(&self, error: TransportError) {
        self.emit(TransportEvent::Error(error));
    }

    /// Deliver a raw text frame
    pub fn deliver(&self, frame: impl Into<String>) {
        self.emit(TransportEvent::Message(frame.into()));
    }

    /// Encode and deliver an envelope
    pub fn deliver_envelope(&self, envelope: &Envelope) -> Result<()> {
        self.deliver(codec::encode(envelope)?);
        Ok(())
    }

    /// Drain every frame the map has written so far
    pub fn take_writes(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.writes.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Drain and decode every envelope the map has written so far
    pub fn take_envelopes(&mut self) -> Result<Vec<Envelope>> {
        self.take_writes()
            .iter()
            .map(|frame| codec::decode(frame))
            .collect()
    }

    fn emit(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            debug!("Channel transport dropped, event discarded");
        }
    }
}
