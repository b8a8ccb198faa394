//! Shared application state handed to both boundaries.

use std::sync::Arc;
use std::time::Duration;

use crate::hub::room::RoomRegistry;
use crate::orchestrator::SharedOrchestrator;
use crate::token::TokenService;

/// Everything a request or connection handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SharedOrchestrator,
    pub tokens: TokenService,
    pub rooms: Arc<RoomRegistry>,
    /// Whether non-participants may join session rooms.
    pub allow_observers: bool,
    /// Cadence of per-connection heartbeats.
    pub heartbeat_interval: Duration,
}
