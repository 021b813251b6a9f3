//! Basic Shared Map Example
//!
//! Connects to a running SharedMap server, writes a few entries and then
//! prints every change pushed by other clients.
//!
//! Usage:
//!   cargo run --example basic                      # duplex (WebSocket)
//!   cargo run --example basic -- split             # split (SSE + POST)

use serde_json::json;
use sharedmap_sdk::{EventKind, MapConfig, MapEvent, ReplicatedMap};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let base = std::env::var("SHAREDMAP_URL").unwrap_or_else(|_| "http://localhost:15600".to_string());
    let config = match std::env::args().nth(1).as_deref() {
        Some("split") => MapConfig::split(format!("{base}/collection"), format!("{base}/collection")),
        _ => MapConfig::duplex(format!("{base}/collection/ws")),
    };

    println!("🚀 SharedMap Rust SDK - Basic Example\n");

    let mut map = ReplicatedMap::connect(config, Some(Box::new(|| println!("   (map changed)"))))?;
    println!("Transport: {:?}", map.transport_kind());

    // Wait for the server snapshot; an init applied later would replace our writes
    loop {
        match map.next_event().await {
            Some(MapEvent::Applied(EventKind::Init)) => break,
            Some(MapEvent::TransportFailed(e)) => println!("Transport failed: {}", e),
            Some(_) => {}
            None => return Err("could not connect".into()),
        }
    }
    println!("Synced {} entries\n", map.size());

    println!("1. Writing entries");
    map.put("Red Leader", "Garven Dreis")?;
    map.put("Red Five", json!({"pilot": "Luke Skywalker", "ship": "X-wing"}))?;

    println!("2. Reading back");
    println!("   Red Five = {:?}", map.get("Red Five")?);
    println!("   {} entries: {:?}\n", map.size(), map.key_set());

    println!("3. Removing 'Red Leader'");
    let previous = map.remove("Red Leader")?;
    println!("   previous value: {:?}\n", previous);

    println!("4. Listening for remote changes (Ctrl-C to stop)");
    while let Some(event) = map.next_event().await {
        match event {
            MapEvent::Applied(kind) => println!("   {} -> {} entries", kind, map.size()),
            MapEvent::Closed => {
                println!("   connection closed");
                break;
            }
            other => println!("   {:?}", other),
        }
    }

    println!("\n✅ Example completed");
    Ok(())
}
