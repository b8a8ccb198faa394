//! In-process store backend.
//!
//! Every conditional update runs under a single lock acquisition, so the
//! compare-and-set guarantees hold under arbitrary task interleaving.
//! Durable backends implement the same trait against their own atomic
//! primitives; the orchestrator never relies on anything beyond it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::{StoreError, StoreResult};
use super::traits::{
    CasOutcome, ClaimOutcome, ConsumeOutcome, InvitationRecord, SessionStore, StatusUpdate,
};
use crate::session::{AudioArtifact, SessionRecord, SessionStatus, TurnRecord};

/// Shared reference to a store implementation.
pub type SharedStore = Arc<dyn SessionStore>;

#[derive(Default)]
struct Tables {
    sessions: HashMap<String, SessionRecord>,
    turns: HashMap<String, Vec<TurnRecord>>,
    invitations: HashMap<String, InvitationRecord>,
}

/// In-memory `SessionStore`.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared trait-object reference to this store.
    pub fn shared(self) -> SharedStore {
        Arc::new(self)
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, record: SessionRecord) -> StoreResult<()> {
        let mut tables = self.lock()?;
        if tables.sessions.contains_key(&record.id) {
            return Err(StoreError::DuplicateKey(record.id));
        }
        tables.turns.insert(record.id.clone(), Vec::new());
        tables.sessions.insert(record.id.clone(), record);
        Ok(())
    }

    async fn fetch_session(&self, session_id: &str) -> StoreResult<Option<SessionRecord>> {
        let tables = self.lock()?;
        Ok(tables.sessions.get(session_id).cloned())
    }

    async fn fetch_turns(&self, session_id: &str) -> StoreResult<Vec<TurnRecord>> {
        let tables = self.lock()?;
        Ok(tables.turns.get(session_id).cloned().unwrap_or_default())
    }

    async fn compare_and_set_status(
        &self,
        session_id: &str,
        expected: SessionStatus,
        expected_attempt: Option<u32>,
        update: StatusUpdate,
    ) -> StoreResult<CasOutcome> {
        let mut tables = self.lock()?;
        let session = tables
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;

        if session.status != expected {
            return Ok(CasOutcome::RaceLost {
                actual: session.status,
            });
        }
        if let Some(attempt) = expected_attempt {
            if session.judging_attempt != attempt {
                return Ok(CasOutcome::RaceLost {
                    actual: session.status,
                });
            }
        }

        session.status = update.next;
        session.winner = update.winner;
        session.judge_result = update.judge_result;
        if update.next == SessionStatus::Judging {
            session.judging_attempt += 1;
        }
        Ok(CasOutcome::Applied)
    }

    async fn claim_debater_b(&self, session_id: &str, user_id: &str) -> StoreResult<ClaimOutcome> {
        let mut tables = self.lock()?;
        let session = tables
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;

        match &session.debater_b {
            Some(occupant) => Ok(ClaimOutcome::SeatTaken {
                occupant: occupant.clone(),
            }),
            None => {
                session.debater_b = Some(user_id.to_string());
                Ok(ClaimOutcome::Claimed)
            }
        }
    }

    async fn append_turn(
        &self,
        session_id: &str,
        expected_index: u32,
        turn: TurnRecord,
    ) -> StoreResult<CasOutcome> {
        let mut tables = self.lock()?;
        let session = tables
            .sessions
            .get(session_id)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        let status = session.status;
        let turn_limit = session.turn_limit();
        let turns = tables
            .turns
            .get_mut(session_id)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;

        // A turn lands only while the session is running, at exactly the
        // next index, and below the turn cap — checked under one lock so
        // nothing can slip in between the final append and the judging
        // transition.
        if status != SessionStatus::Running
            || turns.len() as u32 != expected_index
            || expected_index >= turn_limit
        {
            return Ok(CasOutcome::RaceLost { actual: status });
        }
        turns.push(turn);
        Ok(CasOutcome::Applied)
    }

    async fn attach_turn_audio(
        &self,
        session_id: &str,
        order_index: u32,
        artifact: AudioArtifact,
    ) -> StoreResult<()> {
        let mut tables = self.lock()?;
        let turns = tables
            .turns
            .get_mut(session_id)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        let turn = turns
            .iter_mut()
            .find(|t| t.order_index == order_index)
            .ok_or_else(|| StoreError::TurnNotFound {
                session_id: session_id.to_string(),
                order_index,
            })?;
        turn.audio = Some(artifact);
        Ok(())
    }

    async fn insert_invitation(&self, invitation: InvitationRecord) -> StoreResult<()> {
        let mut tables = self.lock()?;
        if tables.invitations.contains_key(&invitation.token) {
            return Err(StoreError::DuplicateKey(invitation.token));
        }
        tables
            .invitations
            .insert(invitation.token.clone(), invitation);
        Ok(())
    }

    async fn consume_invitation(
        &self,
        token: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<ConsumeOutcome> {
        let mut tables = self.lock()?;
        let invitation = match tables.invitations.get_mut(token) {
            Some(inv) => inv,
            None => return Ok(ConsumeOutcome::Missing),
        };

        if invitation.used {
            return Ok(ConsumeOutcome::AlreadyUsed);
        }
        if now > invitation.expires_at {
            return Ok(ConsumeOutcome::Expired);
        }
        if invitation.session_id != session_id {
            return Ok(ConsumeOutcome::SessionMismatch {
                bound_to: invitation.session_id.clone(),
            });
        }

        invitation.used = true;
        Ok(ConsumeOutcome::Consumed(invitation.clone()))
    }
}
