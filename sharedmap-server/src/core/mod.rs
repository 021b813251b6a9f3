pub mod collection;
pub mod error;

pub use collection::{CollectionEvent, CollectionStats, SessionId, SharedCollection, Update};
pub use error::{Result, ServerError};
