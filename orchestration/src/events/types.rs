//! Events emitted by the orchestrator after each persisted state change.
//!
//! Every event carries the session id it belongs to so hub connections
//! can filter the shared broadcast stream down to their joined rooms.

use serde::{Deserialize, Serialize};

use crate::session::{JudgeRecord, SessionSnapshot, Speaker, Winner};

/// All session events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The persisted session state changed; carries the full snapshot so
    /// a client that misses one broadcast self-corrects on the next.
    StateChanged {
        session_id: String,
        snapshot: Box<SessionSnapshot>,
    },

    /// A new turn position opened up.
    TurnReady {
        session_id: String,
        speaker: Speaker,
        order_index: u32,
    },

    /// The session settled with a verdict.
    Adjudicated {
        session_id: String,
        winner: Winner,
        judge_result: JudgeRecord,
    },
}

impl SessionEvent {
    /// The session this event belongs to.
    pub fn session_id(&self) -> &str {
        match self {
            Self::StateChanged { session_id, .. } => session_id,
            Self::TurnReady { session_id, .. } => session_id,
            Self::Adjudicated { session_id, .. } => session_id,
        }
    }

    /// Short name for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::TurnReady { .. } => "turn_ready",
            Self::Adjudicated { .. } => "adjudicated",
        }
    }
}
