//! Common test utilities

use serde_json::Value;
use sharedmap_sdk::{MapEvent, ReplicatedMap, TransportAdapter};
use sharedmap_server::{AppState, SharedCollection, create_router};
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpListener;

/// Spawn an in-process SharedMap server and return its base URL
#[allow(dead_code)] // Used by other test modules
pub async fn spawn_server(seed: HashMap<String, Value>) -> (String, SharedCollection) {
    let collection = SharedCollection::with_entries(seed, 64);
    let app = create_router(AppState::new(collection.clone()), "/collection");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), collection)
}

/// Pump events into `map` until `done` holds, failing after a few seconds
#[allow(dead_code)] // Used by other test modules
pub async fn pump_until<T, F>(map: &mut ReplicatedMap<T>, mut done: F) -> Vec<MapEvent>
where
    T: TransportAdapter,
    F: FnMut(&ReplicatedMap<T>, &[MapEvent]) -> bool,
{
    let mut seen = Vec::new();
    while !done(&*map, &seen) {
        let event = tokio::time::timeout(Duration::from_secs(5), map.next_event())
            .await
            .unwrap_or_else(|_| panic!("timed out, events so far: {seen:?}"))
            .unwrap_or_else(|| panic!("transport ended, events so far: {seen:?}"));
        seen.push(event);
    }
    seen
}

/// Wait until the map is online and has applied its first `init`
#[allow(dead_code)] // Used by other test modules
pub async fn wait_synced<T: TransportAdapter>(map: &mut ReplicatedMap<T>) -> Vec<MapEvent> {
    pump_until(map, |map, seen| {
        map.is_online()
            && seen
                .iter()
                .any(|e| matches!(e, MapEvent::Applied(sharedmap_sdk::EventKind::Init)))
    })
    .await
}
