//! Real-Time Debate Session Orchestrator
//!
//! This library owns the lifecycle of two-party, turn-based debates:
//! creation, invitation and seating, strictly alternating turn-taking,
//! judging (automatic via an external gateway, or manual), retries, and
//! completion — while keeping a durable store and live socket
//! connections consistent.
//!
//! # Architecture
//!
//! ```text
//! HTTP boundary ─┐                       ┌─ Judging Gateway (async)
//!                ├─► Orchestrator ◄──────┘
//! Realtime hub ──┘        │
//!      ▲                  ▼
//!      │            Session store (atomic conditional writes)
//!      └── event bus ◄────┘
//! ```
//!
//! The orchestrator is the single writer of session state; the hub is
//! the single broadcaster of state to clients. Cross-process safety
//! rests on compare-and-set writes at the store, never on in-process
//! locks alone; a lost race is a benign no-op.

#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod hub;
pub mod judge;
pub mod orchestrator;
pub mod session;
pub mod store;
pub mod token;

// Re-export key domain types
pub use session::{
    next_speaker, AudioArtifact, JudgeRecord, JudgeVerdict, SessionRecord, SessionSnapshot,
    SessionStatus, SideAssessment, Speaker, TurnRecord, Winner,
};

// Re-export the orchestrator surface
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{
    IssuedInvitation, Orchestrator, OrchestratorSettings, RetryLimiter, SharedOrchestrator,
};

// Re-export store seam types
pub use store::{
    CasOutcome, ClaimOutcome, ConsumeOutcome, InvitationRecord, MemoryStore, SessionStore,
    SharedStore, StatusUpdate, StoreError,
};

// Re-export collaborator interfaces
pub use events::{EventBus, SessionEvent};
pub use judge::{HttpJudgeGateway, JudgeError, JudgeGateway, ScriptedJudge, Transcript};
pub use token::{TokenError, TokenService};

// Re-export boundary types
pub use app::AppState;
pub use hub::protocol::{ClientMessage, ServerMessage};
pub use hub::room::RoomRegistry;
