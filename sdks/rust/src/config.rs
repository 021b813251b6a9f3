//! Endpoint configuration

use crate::error::{Result, SharedMapError};
use std::time::Duration;
use url::Url;

/// Where the map's server lives and which transport shape reaches it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// One WebSocket carries both events and writes
    Duplex { url: String },
    /// Events arrive over Server-Sent Events, writes are POSTed separately
    Split {
        subscribe_url: String,
        write_url: String,
    },
}

/// SharedMap client configuration
#[derive(Debug, Clone)]
pub struct MapConfig {
    /// Server endpoint(s)
    pub endpoint: Endpoint,
    /// Connect timeout, and per-request timeout for split writes
    pub timeout: Duration,
}

impl MapConfig {
    /// Configure a duplex (WebSocket) map
    pub fn duplex(url: impl Into<String>) -> Self {
        Self::new(Endpoint::Duplex { url: url.into() })
    }

    /// Configure a split (SSE subscribe + POST write) map
    pub fn split(subscribe_url: impl Into<String>, write_url: impl Into<String>) -> Self {
        Self::new(Endpoint::Split {
            subscribe_url: subscribe_url.into(),
            write_url: write_url.into(),
        })
    }

    fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the timeout for connecting and for write requests
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Parse a duplex URL, mapping `http(s)` onto `ws(s)`
pub(crate) fn websocket_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(SharedMapError::UnsupportedScheme(other.to_string())),
    };
    if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
        return Err(SharedMapError::UnsupportedScheme(url.scheme().to_string()));
    }
    Ok(url)
}

/// Parse a split-transport URL; only `http(s)` is accepted
pub(crate) fn http_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SharedMapError::UnsupportedScheme(other.to_string())),
    }
}
