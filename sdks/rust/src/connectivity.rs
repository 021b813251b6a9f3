//! Online/offline tracking driven by transport lifecycle events

use crate::error::TransportError;
use tracing::debug;

/// Connection state as seen by the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    #[default]
    Offline,
    Online,
}

/// Two-state tracker; starts offline
#[derive(Debug, Default)]
pub struct ConnectivityTracker {
    state: Connectivity,
}

impl ConnectivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_online(&self) -> bool {
        self.state == Connectivity::Online
    }

    pub fn state(&self) -> Connectivity {
        self.state
    }

    /// Transport reported an open channel
    pub fn on_open(&mut self) {
        self.transition(Connectivity::Online);
    }

    /// Transport reported the channel closed
    pub fn on_close(&mut self) {
        self.transition(Connectivity::Offline);
    }

    /// Transport reported an error; only fatal errors take the map offline
    pub fn on_error(&mut self, error: &TransportError) {
        if error.is_fatal() {
            self.transition(Connectivity::Offline);
        }
    }

    fn transition(&mut self, next: Connectivity) {
        if self.state != next {
            debug!("Connectivity {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}
