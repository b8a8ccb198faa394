//! Error surface of the session store.

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("turn not found: {session_id}#{order_index}")]
    TurnNotFound { session_id: String, order_index: u32 },

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
