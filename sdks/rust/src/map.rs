//! Replicated map engine
//!
//! Keeps a local mirror of the server map. Local mutations are applied
//! immediately and relayed only while the transport is online; there is no
//! retry queue. Remote events are applied in delivery order whenever the
//! owner calls [`ReplicatedMap::next_event`] or [`ReplicatedMap::drain_events`].

use crate::codec::{self, Envelope, EventKind};
use crate::config::{Endpoint, MapConfig};
use crate::connectivity::ConnectivityTracker;
use crate::error::{Result, SharedMapError, TransportError};
use crate::notifier::{ChangeListener, ChangeNotifier};
use crate::transport::{
    DuplexTransport, SplitTransport, TransportAdapter, TransportEvent, TransportKind,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Outcome of processing one transport event
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// Transport connected; writes are relayed from now on
    Opened,
    /// Transport disconnected; writes stay local
    Closed,
    /// A remote envelope was applied to the mirror
    Applied(EventKind),
    /// Envelope with an unknown tag, discarded
    Ignored(String),
    /// Frame that failed to decode, discarded
    Rejected(String),
    /// Out-of-band transport failure
    TransportFailed(TransportError),
}

/// Client-side mirror of a server-held map
pub struct ReplicatedMap<T: TransportAdapter> {
    entries: HashMap<String, Value>,
    connectivity: ConnectivityTracker,
    transport: T,
    notifier: ChangeNotifier,
    closed: bool,
}

impl ReplicatedMap<Box<dyn TransportAdapter>> {
    /// Connect to the configured endpoint
    ///
    /// Returns immediately; the map is offline until the transport reports
    /// open. Must be called from within a Tokio runtime.
    ///
    /// # Example
    /// ```no_run
    /// use sharedmap_sdk::{MapConfig, ReplicatedMap};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = MapConfig::duplex("ws://localhost:15600/collection/ws");
    /// let mut map = ReplicatedMap::connect(config, Some(Box::new(|| println!("changed"))))?;
    ///
    /// while let Some(event) = map.next_event().await {
    ///     println!("{:?}: {} entries", event, map.size());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn connect(config: MapConfig, listener: Option<ChangeListener>) -> Result<Self> {
        let transport: Box<dyn TransportAdapter> = match &config.endpoint {
            Endpoint::Duplex { url } => Box::new(DuplexTransport::connect(url, config.timeout)?),
            Endpoint::Split {
                subscribe_url,
                write_url,
            } => Box::new(SplitTransport::connect(
                subscribe_url,
                write_url,
                config.timeout,
            )?),
        };
        Ok(Self::new(transport, listener))
    }
}

impl<T: TransportAdapter> ReplicatedMap<T> {
    /// Wrap an existing transport
    pub fn new(transport: T, listener: Option<ChangeListener>) -> Self {
        Self {
            entries: HashMap::new(),
            connectivity: ConnectivityTracker::new(),
            transport,
            notifier: ChangeNotifier::new(listener),
            closed: false,
        }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Value for `key`; `None` when absent
    pub fn get(&self, key: &str) -> Result<Option<&Value>> {
        validate_key(key)?;
        Ok(self.entries.get(key))
    }

    /// Value for `key` deserialized into `V`
    pub fn get_as<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>> {
        match self.get(key)? {
            Some(value) => Ok(Some(V::deserialize(value)?)),
            None => Ok(None),
        }
    }

    pub fn contains_key(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.entries.contains_key(key))
    }

    pub fn contains_value(&self, value: &Value) -> bool {
        self.entries.values().any(|v| v == value)
    }

    /// Store `value` under `key`, returning the previous value
    pub fn put<V: Serialize>(&mut self, key: &str, value: V) -> Result<Option<Value>> {
        validate_key(key)?;
        let value = serde_json::to_value(value)?;

        let previous = self.entries.insert(key.to_string(), value.clone());
        self.relay(Envelope::Put {
            key: key.to_string(),
            value,
        });
        self.notifier.notify();
        Ok(previous)
    }

    /// Store every pair; each one is relayed and notified on its own
    pub fn put_all<I, K, V>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Serialize,
    {
        for (key, value) in pairs {
            self.put(key.as_ref(), value)?;
        }
        Ok(())
    }

    /// Remove `key`, returning the previous value; absent keys are not an error
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;

        let previous = self.entries.remove(key);
        self.relay(Envelope::Remove {
            key: key.to_string(),
        });
        self.notifier.notify();
        Ok(previous)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.relay(Envelope::Clear);
        self.notifier.notify();
    }

    /// Snapshot of the current keys, in no particular order
    pub fn key_set(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.values().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Number of change notifications fired so far
    pub fn notifications(&self) -> u64 {
        self.notifier.notifications()
    }

    /// Close the transport; the map keeps its entries and stays offline for good
    pub fn close(&mut self) {
        self.closed = true;
        self.transport.close();
        self.connectivity.on_close();
    }

    /// Wait for the next transport event and apply it.
    ///
    /// Returns `None` once the transport has shut down for good.
    pub async fn next_event(&mut self) -> Option<MapEvent> {
        let event = self.transport.recv().await?;
        Some(self.handle(event))
    }

    /// Apply every event already delivered, without waiting
    pub fn drain_events(&mut self) -> Vec<MapEvent> {
        let mut applied = Vec::new();
        while let Some(event) = self.transport.try_recv() {
            applied.push(self.handle(event));
        }
        applied
    }

    fn handle(&mut self, event: TransportEvent) -> MapEvent {
        match event {
            TransportEvent::Open if self.closed => {
                debug!("Map closed, ignoring late open");
                MapEvent::Closed
            }
            TransportEvent::Open => {
                self.connectivity.on_open();
                MapEvent::Opened
            }
            TransportEvent::Closed => {
                self.connectivity.on_close();
                MapEvent::Closed
            }
            TransportEvent::Error(error) => {
                warn!("Transport error: {}", error);
                self.connectivity.on_error(&error);
                MapEvent::TransportFailed(error)
            }
            TransportEvent::Message(frame) => self.apply_frame(&frame),
        }
    }

    fn apply_frame(&mut self, frame: &str) -> MapEvent {
        let envelope = match codec::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Discarding frame: {}", e);
                return MapEvent::Rejected(e.to_string());
            }
        };

        let kind = match envelope {
            Envelope::Init { map } => {
                self.entries = map;
                EventKind::Init
            }
            Envelope::Put { key, value } => {
                self.entries.insert(key, value);
                EventKind::Put
            }
            Envelope::Remove { key } => {
                self.entries.remove(&key);
                EventKind::Remove
            }
            Envelope::Clear => {
                self.entries.clear();
                EventKind::Clear
            }
            Envelope::Unknown { event } => {
                debug!("Ignoring unknown event: {}", event);
                return MapEvent::Ignored(event);
            }
        };

        debug!("Applied remote {} ({} entries)", kind, self.entries.len());
        self.notifier.notify();
        MapEvent::Applied(kind)
    }

    fn relay(&mut self, envelope: Envelope) {
        if !self.connectivity.is_online() {
            debug!("Offline, not relaying {:?}", envelope.kind());
            return;
        }
        match codec::encode(&envelope) {
            Ok(frame) => self.transport.send_write(frame),
            Err(e) => warn!("Failed to encode write intent: {}", e),
        }
    }
}

impl<T: TransportAdapter> Drop for ReplicatedMap<T> {
    fn drop(&mut self) {
        self.transport.close();
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(SharedMapError::InvalidKey(
            "key must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}
