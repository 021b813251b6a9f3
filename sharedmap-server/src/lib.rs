pub mod config;
pub mod core;
pub mod server;

// Re-export commonly used types
pub use config::ServerConfig;
pub use core::{CollectionEvent, ServerError, SharedCollection};
pub use server::{AppState, create_router};
