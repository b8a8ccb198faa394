//! Session orchestrator — the single writer of session state.
//!
//! Combines the store, token service, and judging gateway behind the
//! lifecycle operations both boundaries (HTTP and realtime hub) call.
//! Every mutation is an atomic conditional write at the store; a lost
//! race on a status transition is a benign no-op because the desired
//! outcome — exactly one successful transition — was achieved by
//! someone. Events are published only after the change is persisted, so
//! broadcasts always reflect persisted truth.

pub mod rate_limit;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::events::{EventBus, SessionEvent};
use crate::judge::{JudgeGateway, Transcript, TranscriptTurn};
use crate::session::{
    next_speaker, validate_argument, validate_rounds, validate_topic, JudgeRecord, SessionRecord,
    SessionSnapshot, SessionStatus, Speaker, TurnRecord, Winner,
};
use crate::store::{CasOutcome, ClaimOutcome, ConsumeOutcome, SharedStore, StatusUpdate};
use crate::token::{TokenError, TokenService};

pub use rate_limit::{RetryDecision, RetryLimiter};

/// Tunables the orchestrator needs from configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Bound on a single judging gateway call.
    pub judge_timeout: Duration,
    /// Public base URL used to build invitation redemption links.
    pub redemption_base_url: String,
    /// Max judging retries per session within `retry_window`.
    pub retry_limit: u32,
    pub retry_window: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            judge_timeout: Duration::from_secs(30),
            redemption_base_url: "http://localhost:8080".to_string(),
            retry_limit: 3,
            retry_window: Duration::from_secs(60),
        }
    }
}

/// A freshly issued invitation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedInvitation {
    pub token: String,
    pub url: String,
    pub expires_at: chrono::DateTime<Utc>,
}

/// Shared reference to the orchestrator.
pub type SharedOrchestrator = Arc<Orchestrator>;

/// The orchestrator façade.
pub struct Orchestrator {
    store: SharedStore,
    gateway: Arc<dyn JudgeGateway>,
    tokens: TokenService,
    bus: EventBus,
    settings: OrchestratorSettings,
    retry_limiter: RetryLimiter,
    /// In-process short-circuit for duplicate concurrent judging runs.
    /// The store-level attempt fence is the real guarantee; this just
    /// avoids spawning obviously-redundant gateway calls.
    judging_inflight: Arc<Mutex<HashSet<String>>>,
}

impl Orchestrator {
    pub fn new(
        store: SharedStore,
        gateway: Arc<dyn JudgeGateway>,
        tokens: TokenService,
        settings: OrchestratorSettings,
    ) -> Self {
        let retry_limiter = RetryLimiter::new(settings.retry_limit, settings.retry_window);
        Self {
            store,
            gateway,
            tokens,
            bus: EventBus::new(),
            settings,
            retry_limiter,
            judging_inflight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Create a shared reference to this orchestrator.
    pub fn shared(self) -> SharedOrchestrator {
        Arc::new(self)
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    /// Create a session. If both seats are supplied the session starts
    /// immediately.
    pub async fn create_session(
        &self,
        topic: String,
        rounds: u32,
        debater_a: Option<String>,
        debater_b: Option<String>,
        auto_judge: bool,
    ) -> OrchestratorResult<SessionSnapshot> {
        validate_topic(&topic).map_err(OrchestratorError::Validation)?;
        validate_rounds(rounds).map_err(OrchestratorError::Validation)?;
        if let (Some(a), Some(b)) = (&debater_a, &debater_b) {
            if a == b {
                return Err(OrchestratorError::Validation(
                    "debaters must be two distinct users".to_string(),
                ));
            }
        }

        let record = SessionRecord::new(topic, rounds, debater_a, debater_b, auto_judge);
        let session_id = record.id.clone();
        let seats_filled = record.seats_filled();
        self.store.insert_session(record).await?;
        info!(session_id = %session_id, rounds, auto_judge, "Session created");

        let started = if seats_filled {
            self.try_start(&session_id).await?
        } else {
            false
        };

        let snapshot = self.load_session_state(&session_id).await?;
        self.publish_state(&snapshot, started);
        Ok(snapshot)
    }

    /// Pure read: full session plus ordered transcript.
    pub async fn load_session_state(&self, session_id: &str) -> OrchestratorResult<SessionSnapshot> {
        let session = self
            .store
            .fetch_session(session_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("session {}", session_id)))?;
        let turns = self.store.fetch_turns(session_id).await?;
        Ok(SessionSnapshot { session, turns })
    }

    /// Mint a fresh invitation for the session. Re-issuing never
    /// invalidates earlier unused tokens; only redemption is single-use.
    pub async fn issue_invitation(&self, session_id: &str) -> OrchestratorResult<IssuedInvitation> {
        let session = self
            .store
            .fetch_session(session_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("session {}", session_id)))?;

        let invitation = self.tokens.mint_invitation(&session.id);
        let issued = IssuedInvitation {
            url: format!(
                "{}/sessions/{}/join?token={}",
                self.settings.redemption_base_url, session.id, invitation.token
            ),
            token: invitation.token.clone(),
            expires_at: invitation.expires_at,
        };
        self.store.insert_invitation(invitation).await?;
        info!(session_id = %session.id, "Invitation issued");
        Ok(issued)
    }

    /// Atomically redeem an invitation, seating `user_id` as debater B
    /// and starting the session if both seats are now filled.
    pub async fn redeem_invitation(
        &self,
        session_id: &str,
        token: &str,
        user_id: &str,
    ) -> OrchestratorResult<SessionSnapshot> {
        let session = self
            .store
            .fetch_session(session_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("session {}", session_id)))?;

        if session.debater_a.as_deref() == Some(user_id) {
            return Err(TokenError::SelfInvitation.into());
        }

        match self
            .store
            .consume_invitation(token, session_id, Utc::now())
            .await?
        {
            ConsumeOutcome::Consumed(_) => {}
            ConsumeOutcome::Missing => return Err(TokenError::NotFound.into()),
            ConsumeOutcome::AlreadyUsed => return Err(TokenError::AlreadyUsed.into()),
            ConsumeOutcome::Expired => return Err(TokenError::Expired.into()),
            ConsumeOutcome::SessionMismatch { .. } => {
                return Err(TokenError::SessionMismatch.into())
            }
        }

        match self.store.claim_debater_b(session_id, user_id).await? {
            ClaimOutcome::Claimed => {
                info!(session_id = %session_id, user_id = %user_id, "Debater B seated");
            }
            ClaimOutcome::SeatTaken { occupant } => {
                return Err(TokenError::SeatTaken(occupant).into());
            }
        }

        // Anonymous flows may still be waiting on seat A.
        let started = if session.debater_a.is_some() {
            self.try_start(session_id).await?
        } else {
            false
        };
        let snapshot = self.load_session_state(session_id).await?;
        self.publish_state(&snapshot, started);
        Ok(snapshot)
    }

    /// Submit an argument for the debater whose turn it is. On reaching
    /// the turn limit the session moves to judging, and — when
    /// auto-judge is on — the gateway is invoked without blocking the
    /// caller.
    pub async fn submit_argument(
        &self,
        session_id: &str,
        user_id: &str,
        text: String,
    ) -> OrchestratorResult<SessionSnapshot> {
        validate_argument(&text).map_err(OrchestratorError::Validation)?;

        let session = self
            .store
            .fetch_session(session_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("session {}", session_id)))?;
        if session.status != SessionStatus::Running {
            return Err(OrchestratorError::StateConflict {
                attempted: "submit an argument",
                actual: session.status,
            });
        }

        let side = session
            .side_of(user_id)
            .ok_or_else(|| OrchestratorError::NotParticipant {
                user_id: user_id.to_string(),
            })?;

        let turns = self.store.fetch_turns(session_id).await?;
        let expected = next_speaker(turns.len());
        if side != expected {
            return Err(OrchestratorError::WrongSpeaker { expected });
        }

        let order_index = turns.len() as u32;
        let turn = TurnRecord {
            session_id: session_id.to_string(),
            order_index,
            speaker: side,
            response: text,
            created_at: Utc::now(),
            audio: None,
        };
        match self.store.append_turn(session_id, order_index, turn).await? {
            CasOutcome::Applied => {}
            CasOutcome::RaceLost { actual } if actual != SessionStatus::Running => {
                return Err(OrchestratorError::StateConflict {
                    attempted: "submit an argument",
                    actual,
                });
            }
            CasOutcome::RaceLost { .. } => {
                // Another submission landed first; report who actually
                // holds the turn now, or the true status if the race
                // carried the session past the turn limit.
                let fresh = self.store.fetch_turns(session_id).await?;
                if (fresh.len() as u32) < session.turn_limit() {
                    return Err(OrchestratorError::WrongSpeaker {
                        expected: next_speaker(fresh.len()),
                    });
                }
                let current = self
                    .store
                    .fetch_session(session_id)
                    .await?
                    .map(|s| s.status)
                    .unwrap_or(SessionStatus::Running);
                return Err(OrchestratorError::StateConflict {
                    attempted: "submit an argument",
                    actual: current,
                });
            }
        }
        debug!(session_id = %session_id, order_index, speaker = %side, "Turn persisted");

        let turn_count = order_index + 1;
        if turn_count == session.turn_limit() {
            match self
                .store
                .compare_and_set_status(
                    session_id,
                    SessionStatus::Running,
                    None,
                    StatusUpdate::to(SessionStatus::Judging),
                )
                .await?
            {
                CasOutcome::Applied => {
                    info!(session_id = %session_id, turn_count, "Turn limit reached; judging");
                    if session.auto_judge {
                        self.spawn_judging(session_id.to_string());
                    }
                }
                CasOutcome::RaceLost { actual } => {
                    debug!(session_id = %session_id, actual = %actual, "Judging transition lost race");
                }
            }
        }

        let snapshot = self.load_session_state(session_id).await?;
        self.publish_state(&snapshot, snapshot.session.status == SessionStatus::Running);
        Ok(snapshot)
    }

    /// Record a manual verdict for a session awaiting judgment.
    pub async fn user_judge(
        &self,
        session_id: &str,
        winner: Winner,
    ) -> OrchestratorResult<SessionSnapshot> {
        let session = self
            .store
            .fetch_session(session_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("session {}", session_id)))?;
        if session.status != SessionStatus::Judging {
            return Err(OrchestratorError::StateConflict {
                attempted: "record a manual judgment",
                actual: session.status,
            });
        }

        let update = StatusUpdate {
            next: SessionStatus::Finished,
            winner: Some(winner),
            judge_result: Some(JudgeRecord::Manual { winner }),
        };
        match self
            .store
            .compare_and_set_status(session_id, SessionStatus::Judging, None, update)
            .await?
        {
            CasOutcome::Applied => {
                info!(session_id = %session_id, winner = %winner, "Manual verdict recorded");
            }
            CasOutcome::RaceLost { actual } => {
                return Err(OrchestratorError::StateConflict {
                    attempted: "record a manual judgment",
                    actual,
                });
            }
        }

        let snapshot = self.load_session_state(session_id).await?;
        self.bus.publish(SessionEvent::Adjudicated {
            session_id: session_id.to_string(),
            winner,
            judge_result: JudgeRecord::Manual { winner },
        });
        self.publish_state(&snapshot, false);
        Ok(snapshot)
    }

    /// Retry judging for a failed session. One in-flight retry per
    /// session; a concurrent duplicate collapses into the winner's run.
    pub async fn retry_judging(&self, session_id: &str) -> OrchestratorResult<SessionSnapshot> {
        let session = self
            .store
            .fetch_session(session_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("session {}", session_id)))?;
        if session.status != SessionStatus::Failed {
            return Err(OrchestratorError::StateConflict {
                attempted: "retry judging",
                actual: session.status,
            });
        }

        if let RetryDecision::Limited { retry_after } = self.retry_limiter.check(session_id) {
            return Err(OrchestratorError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        match self
            .store
            .compare_and_set_status(
                session_id,
                SessionStatus::Failed,
                None,
                StatusUpdate::to(SessionStatus::Judging),
            )
            .await?
        {
            CasOutcome::Applied => {
                info!(session_id = %session_id, "Judging retry accepted");
                self.spawn_judging(session_id.to_string());
            }
            CasOutcome::RaceLost {
                actual: SessionStatus::Judging,
            } => {
                // A concurrent retry won the race; collapse into it.
                debug!(session_id = %session_id, "Retry collapsed into in-flight attempt");
            }
            CasOutcome::RaceLost { actual } => {
                return Err(OrchestratorError::StateConflict {
                    attempted: "retry judging",
                    actual,
                });
            }
        }

        let snapshot = self.load_session_state(session_id).await?;
        self.publish_state(&snapshot, false);
        Ok(snapshot)
    }

    /// Attach a late-arriving synthesized audio artifact to a turn.
    pub async fn attach_turn_audio(
        &self,
        session_id: &str,
        order_index: u32,
        artifact: crate::session::AudioArtifact,
    ) -> OrchestratorResult<()> {
        self.store
            .attach_turn_audio(session_id, order_index, artifact)
            .await?;
        debug!(session_id = %session_id, order_index, "Audio artifact attached");
        let snapshot = self.load_session_state(session_id).await?;
        self.publish_state(&snapshot, false);
        Ok(())
    }

    /// Attempt `Created → Running`; returns whether this caller won.
    async fn try_start(&self, session_id: &str) -> OrchestratorResult<bool> {
        match self
            .store
            .compare_and_set_status(
                session_id,
                SessionStatus::Created,
                None,
                StatusUpdate::to(SessionStatus::Running),
            )
            .await?
        {
            CasOutcome::Applied => {
                info!(session_id = %session_id, "Session started");
                Ok(true)
            }
            CasOutcome::RaceLost { actual } => {
                // Someone else started it; proceed as if we had.
                debug!(session_id = %session_id, actual = %actual, "Start transition lost race");
                Ok(false)
            }
        }
    }

    /// Publish the persisted snapshot, and a turn notice when the
    /// session is still collecting arguments.
    fn publish_state(&self, snapshot: &SessionSnapshot, announce_turn: bool) {
        self.bus.publish(SessionEvent::StateChanged {
            session_id: snapshot.session.id.clone(),
            snapshot: Box::new(snapshot.clone()),
        });
        if announce_turn && snapshot.session.status == SessionStatus::Running {
            self.bus.publish(SessionEvent::TurnReady {
                session_id: snapshot.session.id.clone(),
                speaker: next_speaker(snapshot.turns.len()),
                order_index: snapshot.turns.len() as u32,
            });
        }
    }

    /// Fire-and-forget judging run, guarded against in-process
    /// duplicates. The spawned task re-reads the session and fences its
    /// completion on the judging attempt it observed, so a result from a
    /// superseded attempt is discarded at the store.
    fn spawn_judging(&self, session_id: String) {
        {
            let mut inflight = self.judging_inflight.lock().expect("inflight lock");
            if !inflight.insert(session_id.clone()) {
                debug!(session_id = %session_id, "Judging already in flight; not spawning");
                return;
            }
        }

        let store = Arc::clone(&self.store);
        let gateway = Arc::clone(&self.gateway);
        let bus = self.bus.clone();
        let inflight = Arc::clone(&self.judging_inflight);
        let timeout = self.settings.judge_timeout;
        tokio::spawn(async move {
            run_judging(&store, gateway.as_ref(), &bus, timeout, &session_id).await;
            inflight.lock().expect("inflight lock").remove(&session_id);
        });
    }
}

/// Execute one judging attempt end to end: read the transcript, invoke
/// the gateway under a bounded timeout, and land the result through the
/// same conditional-write path manual judgment uses.
async fn run_judging(
    store: &SharedStore,
    gateway: &dyn JudgeGateway,
    bus: &EventBus,
    timeout: Duration,
    session_id: &str,
) {
    let session = match store.fetch_session(session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            warn!(session_id = %session_id, "Judging run found no session");
            return;
        }
        Err(e) => {
            warn!(session_id = %session_id, "Judging run failed to read session: {}", e);
            return;
        }
    };
    if session.status != SessionStatus::Judging {
        debug!(session_id = %session_id, status = %session.status, "Judging run skipped");
        return;
    }
    let attempt = session.judging_attempt;

    let turns = match store.fetch_turns(session_id).await {
        Ok(turns) => turns,
        Err(e) => {
            warn!(session_id = %session_id, "Judging run failed to read turns: {}", e);
            return;
        }
    };
    let transcript = Transcript {
        topic: session.topic.clone(),
        rounds: session.rounds,
        turns: turns
            .iter()
            .map(|t| TranscriptTurn {
                speaker: t.speaker,
                response: t.response.clone(),
            })
            .collect(),
    };

    let update = match tokio::time::timeout(timeout, gateway.judge(&transcript)).await {
        Ok(Ok(verdict)) => StatusUpdate {
            next: SessionStatus::Finished,
            winner: Some(verdict.winner),
            judge_result: Some(JudgeRecord::Gateway(verdict)),
        },
        Ok(Err(e)) => {
            warn!(session_id = %session_id, attempt, "Judging gateway failed: {}", e);
            StatusUpdate {
                next: SessionStatus::Failed,
                winner: None,
                judge_result: Some(JudgeRecord::Failure {
                    message: e.to_string(),
                }),
            }
        }
        Err(_) => {
            warn!(session_id = %session_id, attempt, "Judging gateway timed out");
            StatusUpdate {
                next: SessionStatus::Failed,
                winner: None,
                judge_result: Some(JudgeRecord::Failure {
                    message: format!("judging timed out after {:?}", timeout),
                }),
            }
        }
    };
    let settled = update.clone();

    match store
        .compare_and_set_status(session_id, SessionStatus::Judging, Some(attempt), update)
        .await
    {
        Ok(CasOutcome::Applied) => {
            info!(
                session_id = %session_id,
                attempt,
                outcome = %settled.next,
                "Judging attempt settled"
            );
            if let (Some(winner), Some(judge_result)) = (settled.winner, settled.judge_result) {
                bus.publish(SessionEvent::Adjudicated {
                    session_id: session_id.to_string(),
                    winner,
                    judge_result,
                });
            }
            match store.fetch_session(session_id).await {
                Ok(Some(session)) => {
                    let turns = store.fetch_turns(session_id).await.unwrap_or_default();
                    bus.publish(SessionEvent::StateChanged {
                        session_id: session_id.to_string(),
                        snapshot: Box::new(SessionSnapshot { session, turns }),
                    });
                }
                _ => warn!(session_id = %session_id, "Failed to rebroadcast settled state"),
            }
        }
        Ok(CasOutcome::RaceLost { actual }) => {
            debug!(
                session_id = %session_id,
                attempt,
                actual = %actual,
                "Stale judging result discarded"
            );
        }
        Err(e) => {
            warn!(session_id = %session_id, attempt, "Failed to persist judging outcome: {}", e);
        }
    }
}
