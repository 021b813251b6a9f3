use crate::core::{CollectionEvent, Result, SessionId, SharedCollection, Update};
use axum::{
    Json,
    extract::{
        State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{
        Response as AxumResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::stream::{self, SplitSink};
use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

/// SSE event name carrying collection envelopes
pub const UPDATE_EVENT: &str = "update";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub collection: SharedCollection,
}

impl AppState {
    pub fn new(collection: SharedCollection) -> Self {
        Self { collection }
    }
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.collection.stats();
    Json(json!({
        "status": "healthy",
        "service": "sharedmap",
        "version": env!("CARGO_PKG_VERSION"),
        "entries": stats.entries,
        "subscribers": stats.subscribers,
        "updates_applied": stats.updates_applied,
    }))
}

// ============================================================================
// Duplex: WebSocket
// ============================================================================

/// WebSocket endpoint
/// GET /collection/ws
pub async fn collection_websocket(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> AxumResponse {
    ws.on_upgrade(move |socket| handle_collection_socket(socket, state.collection))
}

/// Handle individual WebSocket session
async fn handle_collection_socket(socket: WebSocket, collection: SharedCollection) {
    let session_id = SharedCollection::new_session_id();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (snapshot, mut updates) = collection.subscribe();
    if send_snapshot(&mut ws_sender, snapshot).await.is_err() {
        warn!("Failed to send init to session: {}", session_id);
        return;
    }
    info!("Session {} connected", session_id);

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(Update { origin: Some(origin), .. }) if origin == session_id => {}
                Ok(update) => {
                    if ws_sender.send(WsMessage::Text(update.frame.into())).await.is_err() {
                        warn!("Failed to send update to session: {}", session_id);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Session {} lagged by {} updates, resynchronizing", session_id, skipped);
                    let (snapshot, fresh) = collection.subscribe();
                    updates = fresh;
                    if send_snapshot(&mut ws_sender, snapshot).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },

            msg = ws_receiver.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    handle_client_frame(&collection, &session_id, text.as_str());
                }
                Some(Ok(WsMessage::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => handle_client_frame(&collection, &session_id, text),
                    Err(e) => warn!("Session {} sent non UTF-8 frame: {}", session_id, e),
                },
                Some(Ok(WsMessage::Ping(data))) => {
                    if ws_sender.send(WsMessage::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(_))) => {
                    info!("Session {} closed connection", session_id);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error for session {}: {}", session_id, e);
                    break;
                }
                None => break,
            },
        }
    }

    info!("Session {} disconnected", session_id);
}

async fn send_snapshot(
    sender: &mut SplitSink<WebSocket, WsMessage>,
    snapshot: HashMap<String, serde_json::Value>,
) -> std::result::Result<(), ()> {
    let frame = SharedCollection::init_frame(snapshot).map_err(|e| {
        error!("Failed to encode snapshot: {}", e);
    })?;
    sender
        .send(WsMessage::Text(frame.into()))
        .await
        .map_err(|_| ())
}

/// Apply a frame received over the WebSocket; bad frames are logged and dropped
fn handle_client_frame(collection: &SharedCollection, session_id: &SessionId, frame: &str) {
    let result = CollectionEvent::parse_client_frame(frame)
        .and_then(|event| collection.apply(event, Some(session_id.clone())));
    if let Err(e) = result {
        warn!("Ignoring frame from session {}: {}", session_id, e);
    }
}

// ============================================================================
// Split: Server-Sent Events + POST
// ============================================================================

/// Event subscription endpoint
/// GET /collection
pub async fn collection_events(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let collection = state.collection;
    let (snapshot, updates) = collection.subscribe();
    let init = SharedCollection::init_frame(snapshot)?;
    debug!("SSE subscriber connected");

    let events = stream::unfold(
        (collection, updates, Some(init)),
        |(collection, mut updates, pending)| async move {
            if let Some(frame) = pending {
                return Some((update_event(frame), (collection, updates, None)));
            }
            loop {
                match updates.recv().await {
                    Ok(update) => {
                        return Some((update_event(update.frame), (collection, updates, None)));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("SSE subscriber lagged by {} updates, resynchronizing", skipped);
                        let (snapshot, fresh) = collection.subscribe();
                        match SharedCollection::init_frame(snapshot) {
                            Ok(frame) => {
                                return Some((update_event(frame), (collection, fresh, None)));
                            }
                            Err(e) => {
                                error!("Failed to encode snapshot: {}", e);
                                updates = fresh;
                            }
                        }
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        },
    );

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn update_event(frame: String) -> std::result::Result<Event, Infallible> {
    Ok(Event::default().event(UPDATE_EVENT).data(frame))
}

/// Write endpoint
/// POST /collection
pub async fn collection_write(State(state): State<AppState>, body: String) -> Result<StatusCode> {
    let event = CollectionEvent::parse_client_frame(&body)?;
    state.collection.apply(event, None)?;
    Ok(StatusCode::NO_CONTENT)
}
