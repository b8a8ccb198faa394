//! Orchestrator error taxonomy.
//!
//! Every rejection carries enough to resynchronize: state conflicts
//! report the actual current status (which may differ from what the
//! caller last read), token errors carry a distinguishable reason, and
//! rate limits carry a suggested wait.

use crate::session::{SessionStatus, Speaker};
use crate::store::StoreError;
use crate::token::TokenError;

/// Error returned by orchestrator operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OrchestratorError {
    /// Malformed input; recoverable by correcting it, never retried
    /// automatically.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced session or turn does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested transition is invalid for the session's actual
    /// current status.
    #[error("cannot {attempted}: session is {actual}")]
    StateConflict {
        attempted: &'static str,
        actual: SessionStatus,
    },

    /// Submission from a debater whose turn it is not.
    #[error("not your turn: next speaker is {expected}")]
    WrongSpeaker { expected: Speaker },

    /// The acting user is not a participant in the session.
    #[error("user {user_id} is not a participant")]
    NotParticipant { user_id: String },

    /// Invitation or transport token rejected.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Judging gateway failure or timeout. The session has been moved to
    /// `Failed`; recovery is an explicit retry.
    #[error("judging gateway failed: {0}")]
    Upstream(String),

    /// Too many retries in the configured window.
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Store-layer failure; the attempted transition left no partial
    /// state behind.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl OrchestratorError {
    /// Stable machine-readable code, shared by the HTTP and realtime
    /// boundaries.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::StateConflict { .. } => "STATE_CONFLICT",
            Self::WrongSpeaker { .. } => "WRONG_SPEAKER",
            Self::NotParticipant { .. } => "NOT_PARTICIPANT",
            Self::Token(e) => e.code(),
            Self::Upstream(_) => "UPSTREAM",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Persistence(_) => "PERSISTENCE",
        }
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SessionNotFound(id) => Self::NotFound(format!("session {}", id)),
            StoreError::TurnNotFound {
                session_id,
                order_index,
            } => Self::NotFound(format!("turn {}#{}", session_id, order_index)),
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Result type for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
