//! Realtime client for the debate arena.
//!
//! Wraps a websocket connection to the orchestrator's realtime hub:
//! transport-token authentication, join/submit/judge commands, full
//! snapshot rehydration, and an explicit reconnect state machine with
//! capped exponential backoff and manual-disconnect suppression.

pub mod client;
pub mod reconnect;

pub use client::{ArenaClient, ClientConfig, ClientError, ClientEvent};
pub use reconnect::{ReconnectDecision, ReconnectPolicy, ReconnectState};
