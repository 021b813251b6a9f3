//! # SharedMap Rust SDK
//!
//! Client for a server-held key/value map that every connected client
//! mirrors locally.
//!
//! ## Features
//!
//! - 🗺️ **Local mirror**: reads never touch the network
//! - ⚡ **Optimistic writes**: `put`/`remove`/`clear` apply immediately and are
//!   relayed while online
//! - 🔌 **Two transports**: one WebSocket (duplex) or SSE events plus HTTP
//!   POST writes (split)
//! - 🔔 **Change listener**: one callback after every local or remote change
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sharedmap_sdk::{MapConfig, MapEvent, ReplicatedMap};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MapConfig::duplex("ws://localhost:15600/collection/ws");
//!     let mut map = ReplicatedMap::connect(config, None)?;
//!
//!     // Wait for the server snapshot
//!     while let Some(event) = map.next_event().await {
//!         if matches!(event, MapEvent::Applied(_)) {
//!             break;
//!         }
//!     }
//!
//!     map.put("Red Five", "Luke Skywalker")?;
//!     println!("Red Leader: {:?}", map.get("Red Leader")?);
//!
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod map;
pub mod notifier;
pub mod transport;

#[cfg(test)]
mod tests;

pub use codec::{Envelope, EventKind};
pub use config::{Endpoint, MapConfig};
pub use connectivity::{Connectivity, ConnectivityTracker};
pub use error::{Result, SharedMapError, TransportError};
pub use map::{MapEvent, ReplicatedMap};
pub use notifier::{ChangeListener, ChangeNotifier};
pub use transport::{
    ChannelRemote, ChannelTransport, DuplexTransport, SplitTransport, TransportAdapter,
    TransportEvent, TransportKind,
};
