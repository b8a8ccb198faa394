//! The `SessionStore` trait — the seam between the orchestrator and the
//! durable backend.
//!
//! The store holds no business logic. It offers CRUD plus the atomic
//! conditional updates the single-writer discipline rests on: every
//! status change, seat claim, turn append, and token redemption either
//! applies atomically or reports the race it lost.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::StoreResult;
use crate::session::{
    AudioArtifact, JudgeRecord, SessionRecord, SessionStatus, TurnRecord, Winner,
};

/// Outcome of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The expected state matched and the update was applied.
    Applied,
    /// Another writer got there first; `actual` is the status observed.
    RaceLost { actual: SessionStatus },
}

impl CasOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Outcome of claiming the debater-B seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    SeatTaken { occupant: String },
}

/// Outcome of atomically consuming an invitation token.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumeOutcome {
    /// Token was valid and is now permanently spent.
    Consumed(InvitationRecord),
    /// Token exists but was already redeemed.
    AlreadyUsed,
    /// Token exists but its expiry has passed. Not consumed.
    Expired,
    /// Token is bound to a different session. Not consumed.
    SessionMismatch { bound_to: String },
    /// No such token.
    Missing,
}

/// A single-use invitation bound to one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitationRecord {
    pub token: String,
    pub session_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

/// The fields written together with a status transition. `winner` and
/// `judge_result` replace the stored values wholesale, so entering
/// `Judging` clears a previous failure marker and the settled-state
/// invariant holds by construction.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub next: SessionStatus,
    pub winner: Option<Winner>,
    pub judge_result: Option<JudgeRecord>,
}

impl StatusUpdate {
    /// A bare transition with no verdict fields.
    pub fn to(next: SessionStatus) -> Self {
        Self {
            next,
            winner: None,
            judge_result: None,
        }
    }
}

/// Durable read/write access to sessions, turns, and invitations.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session record. Fails on duplicate id.
    async fn insert_session(&self, record: SessionRecord) -> StoreResult<()>;

    /// Fetch a session by id.
    async fn fetch_session(&self, session_id: &str) -> StoreResult<Option<SessionRecord>>;

    /// Fetch the ordered transcript for a session.
    async fn fetch_turns(&self, session_id: &str) -> StoreResult<Vec<TurnRecord>>;

    /// Apply `update` only if the session's status equals `expected` and,
    /// when `expected_attempt` is given, its judging attempt counter also
    /// matches. Entering `Judging` increments the attempt counter.
    async fn compare_and_set_status(
        &self,
        session_id: &str,
        expected: SessionStatus,
        expected_attempt: Option<u32>,
        update: StatusUpdate,
    ) -> StoreResult<CasOutcome>;

    /// Set `debater_b` only if the seat is still empty.
    async fn claim_debater_b(&self, session_id: &str, user_id: &str) -> StoreResult<ClaimOutcome>;

    /// Append `turn` only if the session is still `Running`, the
    /// transcript currently holds exactly `expected_index` turns, and the
    /// turn cap (`rounds * 2`) is not yet reached — all checked under one
    /// atomic update, so two concurrent submissions can never both land
    /// at the same position and no turn can slip in between the final
    /// append and the judging transition.
    async fn append_turn(
        &self,
        session_id: &str,
        expected_index: u32,
        turn: TurnRecord,
    ) -> StoreResult<CasOutcome>;

    /// Attach a synthesized audio artifact to an existing turn. The one
    /// permitted post-creation turn mutation; never touches `response`,
    /// `speaker`, or ordering.
    async fn attach_turn_audio(
        &self,
        session_id: &str,
        order_index: u32,
        artifact: AudioArtifact,
    ) -> StoreResult<()>;

    /// Store a freshly minted invitation.
    async fn insert_invitation(&self, invitation: InvitationRecord) -> StoreResult<()>;

    /// Atomically check-and-consume an invitation: the token is spent only
    /// if it exists, is unused, is unexpired at `now`, and is bound to
    /// `session_id`. Exactly one of two concurrent redeemers can observe
    /// `Consumed`.
    async fn consume_invitation(
        &self,
        token: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<ConsumeOutcome>;
}
