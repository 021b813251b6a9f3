use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::{Result, ServerError};

/// Unique identifier for a connected session
pub type SessionId = String;

/// Wire event exchanged with clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CollectionEvent {
    Init {
        map: HashMap<String, Value>,
    },
    Put {
        key: String,
        #[serde(default)]
        value: Value,
    },
    Remove {
        key: String,
    },
    Clear,
}

impl CollectionEvent {
    /// Parse a client frame; `init` and unknown events are rejected
    pub fn parse_client_frame(frame: &str) -> Result<Self> {
        let event: CollectionEvent = serde_json::from_str(frame)
            .map_err(|e| ServerError::InvalidRequest(format!("invalid event: {}", e)))?;
        match &event {
            Self::Init { .. } => Err(ServerError::InvalidRequest(
                "init is sent by the server only".to_string(),
            )),
            Self::Put { key, .. } | Self::Remove { key } if key.is_empty() => Err(
                ServerError::InvalidKey("key must be a non-empty string".to_string()),
            ),
            _ => Ok(event),
        }
    }
}

/// A change already applied to the collection, ready to fan out
#[derive(Debug, Clone)]
pub struct Update {
    /// Session that caused the change; `None` for REST writes
    pub origin: Option<SessionId>,
    /// Serialized event
    pub frame: String,
}

/// Collection statistics
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub entries: usize,
    pub subscribers: usize,
    pub updates_applied: u64,
}

/// Authoritative copy of the shared map
///
/// Every mutation is applied and broadcast under the same write lock, so
/// subscribers observe updates in the order they were applied.
#[derive(Clone)]
pub struct SharedCollection {
    map: Arc<RwLock<HashMap<String, Value>>>,
    updates: broadcast::Sender<Update>,
    updates_applied: Arc<AtomicU64>,
}

impl SharedCollection {
    /// Create an empty collection
    pub fn new(broadcast_capacity: usize) -> Self {
        Self::with_entries(HashMap::new(), broadcast_capacity)
    }

    /// Create a collection pre-filled with `entries`
    pub fn with_entries(entries: HashMap<String, Value>, broadcast_capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            map: Arc::new(RwLock::new(entries)),
            updates,
            updates_applied: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Allocate an id for a new session
    pub fn new_session_id() -> SessionId {
        Uuid::new_v4().to_string()
    }

    /// Current snapshot together with a receiver for every later update
    pub fn subscribe(&self) -> (HashMap<String, Value>, broadcast::Receiver<Update>) {
        let map = self.map.read();
        (map.clone(), self.updates.subscribe())
    }

    /// `init` frame describing the current snapshot
    pub fn init_frame(snapshot: HashMap<String, Value>) -> Result<String> {
        Ok(serde_json::to_string(&CollectionEvent::Init { map: snapshot })?)
    }

    /// Apply a client event and broadcast it to every subscriber
    pub fn apply(&self, event: CollectionEvent, origin: Option<SessionId>) -> Result<()> {
        let frame = serde_json::to_string(&event)?;

        let mut map = self.map.write();
        match event {
            CollectionEvent::Put { key, value } => {
                map.insert(key, value);
            }
            CollectionEvent::Remove { key } => {
                map.remove(&key);
            }
            CollectionEvent::Clear => map.clear(),
            CollectionEvent::Init { .. } => {
                return Err(ServerError::InvalidRequest(
                    "init cannot be applied".to_string(),
                ));
            }
        }

        self.updates_applied.fetch_add(1, Ordering::Relaxed);
        // No receivers is fine: nobody is connected
        let delivered = self.updates.send(Update { origin, frame }).unwrap_or(0);
        debug!("Update applied, fanned out to {} subscribers", delivered);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.map.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    pub fn stats(&self) -> CollectionStats {
        CollectionStats {
            entries: self.len(),
            subscribers: self.updates.receiver_count(),
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
        }
    }
}
