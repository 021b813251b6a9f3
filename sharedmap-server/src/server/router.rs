use super::handlers::{self, AppState};
use axum::{Router, routing::get};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the Axum router with all endpoints
///
/// `collection_path` is the prefix for the collection routes, e.g.
/// `/collection` serves `GET/POST /collection` and `GET /collection/ws`.
pub fn create_router(state: AppState, collection_path: &str) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let base = collection_path.trim_end_matches('/');
    let (events_path, ws_path) = if base.is_empty() {
        ("/".to_string(), "/ws".to_string())
    } else {
        (base.to_string(), format!("{}/ws", base))
    };

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Split transport: SSE subscribe + POST write
        .route(
            &events_path,
            get(handlers::collection_events).post(handlers::collection_write),
        )
        // Duplex transport
        .route(&ws_path, get(handlers::collection_websocket))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
