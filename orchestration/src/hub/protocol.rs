//! Realtime wire protocol — closed message sets per direction.
//!
//! Both enums are internally tagged, so adding a message type is a
//! compile-time-checked exercise at every dispatch site.

use serde::{Deserialize, Serialize};

use crate::session::{JudgeRecord, SessionSnapshot, Speaker, Winner};

/// Messages a client may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Join a session room (idempotent; a reconnect is indistinguishable
    /// from a first join).
    JoinSession { session_id: String },
    /// Explicit resynchronization request.
    RequestState { session_id: String },
    /// Submit an argument for the caller's side.
    SubmitArgument { session_id: String, argument: String },
    /// Supply a manual verdict for a session awaiting judgment.
    ManualJudge { session_id: String, winner: Winner },
    /// Liveness probe; answered with a heartbeat.
    Ping,
}

/// Messages the hub pushes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Full snapshot of persisted session state. Every broadcast carries
    /// the whole state, so a missed or reordered frame self-corrects on
    /// the next one.
    SessionState { data: SessionSnapshot },
    /// The turn at `order_index` is open for `speaker`.
    YourTurn { speaker: Speaker, order_index: u32 },
    /// Terminal announcement of the verdict.
    Winner {
        winner: Winner,
        judge_result: JudgeRecord,
    },
    /// Typed error; `code` is stable and machine-readable.
    Error { code: String, message: String },
    /// Periodic liveness signal.
    Heartbeat,
}
