use parley_protocol::ValidationError;
use thiserror::Error;

/// Failures reported by a document store, for writes and live queries alike.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected by the store: {0}")]
    Rejected(String),

    #[error("Subscription closed by the store")]
    Closed,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Display name cannot be empty")]
    EmptyName,

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to persist identity")]
    Cache(#[from] CacheError),
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to store message")]
    Write(#[source] StoreError),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Identity cache I/O failed")]
    Io(#[from] std::io::Error),

    #[error("Identity cache is corrupt")]
    Json(#[from] serde_json::Error),
}
