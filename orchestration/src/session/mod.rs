//! Debate session domain — status machine, records, and validation.
//!
//! # Session lifecycle
//!
//! ```text
//! Created → Running → Judging → Finished
//!                        │  ▲
//!                        ▼  │ (retry)
//!                       Failed
//! ```
//!
//! Every transition is applied as an atomic conditional write at the
//! store; a lost race is a benign no-op for the losing caller.

pub mod status;
pub mod types;

pub use status::{SessionStatus, TransitionError};
pub use types::{
    next_speaker, validate_argument, validate_rounds, validate_topic, AudioArtifact, JudgeRecord,
    JudgeVerdict, SessionRecord, SessionSnapshot, SideAssessment, Speaker, TurnRecord, Winner,
};
