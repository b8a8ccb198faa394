//! Session, turn, and verdict records plus the input validation bounds.
//!
//! Speaker sequencing is derived, never cached: the next speaker is a
//! pure function of the persisted turn count and the invariant that
//! turn 0 always belongs to debater A.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::SessionStatus;

/// Topic length bounds, inclusive.
pub const TOPIC_LEN: std::ops::RangeInclusive<usize> = 10..=500;
/// Rounds bounds, inclusive. Total turns = rounds * 2.
pub const ROUNDS: std::ops::RangeInclusive<u32> = 1..=5;
/// Argument length bounds, inclusive.
pub const ARGUMENT_LEN: std::ops::RangeInclusive<usize> = 10..=2000;

/// Which side of the debate a turn belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    A,
    B,
}

impl Speaker {
    /// The opposing side.
    pub fn other(self) -> Speaker {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Outcome of a judged session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Winner {
    A,
    B,
    Tie,
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::Tie => write!(f, "TIE"),
        }
    }
}

/// The speaker whose turn it is, given how many turns are persisted.
///
/// Turn 0 is always A; speakers then alternate strictly.
pub fn next_speaker(turn_count: usize) -> Speaker {
    if turn_count % 2 == 0 {
        Speaker::A
    } else {
        Speaker::B
    }
}

/// Per-side score and reasoning from the judging gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideAssessment {
    pub score: f32,
    pub reasoning: String,
}

/// Structured verdict produced by the judging gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeVerdict {
    pub winner: Winner,
    pub debater_a: SideAssessment,
    pub debater_b: SideAssessment,
}

/// What settled the session — a gateway verdict, a manual ruling, or the
/// failure marker recorded when judging errored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JudgeRecord {
    Gateway(JudgeVerdict),
    Manual { winner: Winner },
    Failure { message: String },
}

impl JudgeRecord {
    /// The winner this record carries, if it settles the session.
    pub fn winner(&self) -> Option<Winner> {
        match self {
            Self::Gateway(v) => Some(v.winner),
            Self::Manual { winner } => Some(*winner),
            Self::Failure { .. } => None,
        }
    }
}

/// A late-attached synthesized audio artifact for one turn. Attaching it
/// is the only permitted mutation of a persisted turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioArtifact {
    pub url: String,
    pub duration_ms: Option<u64>,
}

/// One debater's contribution at a fixed position in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
    pub session_id: String,
    /// Position in the transcript, starting at 0, no gaps.
    pub order_index: u32,
    pub speaker: Speaker,
    pub response: String,
    pub created_at: DateTime<Utc>,
    pub audio: Option<AudioArtifact>,
}

/// The durable session record. Mutated only by the orchestrator, through
/// conditional writes at the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub topic: String,
    pub rounds: u32,
    pub debater_a: Option<String>,
    pub debater_b: Option<String>,
    pub status: SessionStatus,
    pub winner: Option<Winner>,
    pub judge_result: Option<JudgeRecord>,
    pub auto_judge: bool,
    /// Incremented every time the session enters `Judging`. Gateway
    /// completions are fenced on this so a stale result from a
    /// superseded attempt cannot overwrite a fresher one.
    pub judging_attempt: u32,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Build a fresh record in `Created` with a new v4 id.
    pub fn new(
        topic: String,
        rounds: u32,
        debater_a: Option<String>,
        debater_b: Option<String>,
        auto_judge: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic,
            rounds,
            debater_a,
            debater_b,
            status: SessionStatus::Created,
            winner: None,
            judge_result: None,
            auto_judge,
            judging_attempt: 0,
            created_at: Utc::now(),
        }
    }

    /// Total turns this session runs before judging.
    pub fn turn_limit(&self) -> u32 {
        self.rounds * 2
    }

    /// Whether both seats are filled.
    pub fn seats_filled(&self) -> bool {
        self.debater_a.is_some() && self.debater_b.is_some()
    }

    /// Which side the given user debates for, if any.
    pub fn side_of(&self, user_id: &str) -> Option<Speaker> {
        if self.debater_a.as_deref() == Some(user_id) {
            Some(Speaker::A)
        } else if self.debater_b.as_deref() == Some(user_id) {
            Some(Speaker::B)
        } else {
            None
        }
    }
}

/// Full session view: the record plus its ordered transcript. This is
/// what the hub pushes and the HTTP boundary returns; serializing and
/// rehydrating it must be lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub session: SessionRecord,
    pub turns: Vec<TurnRecord>,
}

impl SessionSnapshot {
    /// The speaker who may submit next, while the session is running.
    pub fn next_speaker(&self) -> Speaker {
        next_speaker(self.turns.len())
    }
}

/// Reject a topic outside the 10–500 char bounds.
pub fn validate_topic(topic: &str) -> Result<(), String> {
    let len = topic.chars().count();
    if TOPIC_LEN.contains(&len) {
        Ok(())
    } else {
        Err(format!(
            "topic must be {}-{} characters, got {}",
            TOPIC_LEN.start(),
            TOPIC_LEN.end(),
            len
        ))
    }
}

/// Reject a round count outside 1–5.
pub fn validate_rounds(rounds: u32) -> Result<(), String> {
    if ROUNDS.contains(&rounds) {
        Ok(())
    } else {
        Err(format!(
            "rounds must be {}-{}, got {}",
            ROUNDS.start(),
            ROUNDS.end(),
            rounds
        ))
    }
}

/// Reject an argument outside the 10–2000 char bounds.
pub fn validate_argument(text: &str) -> Result<(), String> {
    let len = text.chars().count();
    if ARGUMENT_LEN.contains(&len) {
        Ok(())
    } else {
        Err(format!(
            "argument must be {}-{} characters, got {}",
            ARGUMENT_LEN.start(),
            ARGUMENT_LEN.end(),
            len
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_speaker_alternates_from_a() {
        assert_eq!(next_speaker(0), Speaker::A);
        assert_eq!(next_speaker(1), Speaker::B);
        assert_eq!(next_speaker(2), Speaker::A);
        assert_eq!(next_speaker(7), Speaker::B);
    }

    #[test]
    fn test_speaker_other() {
        assert_eq!(Speaker::A.other(), Speaker::B);
        assert_eq!(Speaker::B.other(), Speaker::A);
    }

    #[test]
    fn test_new_session_defaults() {
        let s = SessionRecord::new(
            "Should AI be regulated?".to_string(),
            2,
            Some("user-a".to_string()),
            None,
            true,
        );
        assert_eq!(s.status, SessionStatus::Created);
        assert_eq!(s.turn_limit(), 4);
        assert_eq!(s.judging_attempt, 0);
        assert!(s.winner.is_none());
        assert!(!s.seats_filled());
    }

    #[test]
    fn test_side_of() {
        let mut s = SessionRecord::new(
            "Should AI be regulated?".to_string(),
            2,
            Some("user-a".to_string()),
            None,
            true,
        );
        s.debater_b = Some("user-b".to_string());
        assert_eq!(s.side_of("user-a"), Some(Speaker::A));
        assert_eq!(s.side_of("user-b"), Some(Speaker::B));
        assert_eq!(s.side_of("stranger"), None);
    }

    #[test]
    fn test_topic_bounds() {
        assert!(validate_topic("short").is_err());
        assert!(validate_topic("Should AI be regulated?").is_ok());
        assert!(validate_topic(&"x".repeat(501)).is_err());
        assert!(validate_topic(&"x".repeat(500)).is_ok());
    }

    #[test]
    fn test_rounds_bounds() {
        assert!(validate_rounds(0).is_err());
        assert!(validate_rounds(1).is_ok());
        assert!(validate_rounds(5).is_ok());
        assert!(validate_rounds(6).is_err());
    }

    #[test]
    fn test_argument_bounds() {
        assert!(validate_argument("too short").is_err());
        assert!(validate_argument("this argument is long enough").is_ok());
        assert!(validate_argument(&"x".repeat(2000)).is_ok());
        assert!(validate_argument(&"x".repeat(2001)).is_err());
    }

    #[test]
    fn test_judge_record_winner() {
        let gateway = JudgeRecord::Gateway(JudgeVerdict {
            winner: Winner::A,
            debater_a: SideAssessment {
                score: 0.8,
                reasoning: "stronger evidence".to_string(),
            },
            debater_b: SideAssessment {
                score: 0.5,
                reasoning: "weaker rebuttals".to_string(),
            },
        });
        assert_eq!(gateway.winner(), Some(Winner::A));

        let manual = JudgeRecord::Manual { winner: Winner::Tie };
        assert_eq!(manual.winner(), Some(Winner::Tie));

        let failure = JudgeRecord::Failure {
            message: "gateway timeout".to_string(),
        };
        assert_eq!(failure.winner(), None);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let session = SessionRecord::new(
            "Should AI be regulated?".to_string(),
            1,
            Some("user-a".to_string()),
            Some("user-b".to_string()),
            false,
        );
        let snapshot = SessionSnapshot {
            turns: vec![
                TurnRecord {
                    session_id: session.id.clone(),
                    order_index: 0,
                    speaker: Speaker::A,
                    response: "Opening statement for side A".to_string(),
                    created_at: Utc::now(),
                    audio: None,
                },
                TurnRecord {
                    session_id: session.id.clone(),
                    order_index: 1,
                    speaker: Speaker::B,
                    response: "Opening statement for side B".to_string(),
                    created_at: Utc::now(),
                    audio: Some(AudioArtifact {
                        url: "https://cdn.example/turn-1.mp3".to_string(),
                        duration_ms: Some(4200),
                    }),
                },
            ],
            session,
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: SessionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);
        assert_eq!(restored.next_speaker(), Speaker::A);
    }
}
