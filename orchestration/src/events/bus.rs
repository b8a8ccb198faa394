//! Event bus for session fan-out.
//!
//! A single Tokio broadcast channel; each hub connection subscribes and
//! filters events locally by joined session. Publishing with no
//! receivers is fine — state lives in the store, not the channel.

use tokio::sync::broadcast;
use tracing::debug;

use super::types::SessionEvent;

/// Channel capacity for broadcast. Slow receivers that fall behind skip
/// messages (RecvError::Lagged) and resynchronize from the next
/// full-snapshot event.
const CHANNEL_CAPACITY: usize = 256;

/// Event bus with a broadcast channel. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: SessionEvent) {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => debug!(event_type, receivers = count, "Event published"),
            Err(_) => debug!(event_type, "Event published (no receivers)"),
        }
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
