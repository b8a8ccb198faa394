//! Session status machine — states, legal transitions, and the typed
//! transition error carrying the actual status a caller raced against.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a debate session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Session created, waiting for the second debater.
    Created,
    /// Both seats filled, turns are being exchanged.
    Running,
    /// Turn limit reached, waiting for a verdict.
    Judging,
    /// Verdict recorded — session is complete.
    Finished,
    /// Judging failed; recoverable via an explicit retry.
    Failed,
}

impl SessionStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Whether the session has reached a resolution or a recorded failure.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    /// Valid transitions out of this status.
    pub fn valid_transitions(self) -> &'static [SessionStatus] {
        match self {
            Self::Created => &[Self::Running],
            Self::Running => &[Self::Judging],
            Self::Judging => &[Self::Finished, Self::Failed],
            Self::Failed => &[Self::Judging],
            Self::Finished => &[],
        }
    }

    /// Whether `to` is a legal next status.
    pub fn allows(self, to: SessionStatus) -> bool {
        self.valid_transitions().contains(&to)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Judging => write!(f, "judging"),
            Self::Finished => write!(f, "finished"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Error for an attempted transition that is illegal from the caller's
/// expected status, or that lost to a concurrent writer.
///
/// `actual` is the status observed at rejection time — callers use it to
/// resynchronize instead of blindly retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub attempted: SessionStatus,
    pub actual: SessionStatus,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot transition to {}: session is {}",
            self.attempted, self.actual
        )
    }
}

impl std::error::Error for TransitionError {}
