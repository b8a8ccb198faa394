//! Session event fan-out over Tokio broadcast channels.

pub mod bus;
pub mod types;

pub use bus::EventBus;
pub use types::SessionEvent;
