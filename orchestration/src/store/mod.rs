//! Session store adapter — durable read/write access with atomic
//! conditional updates. Serialization across orchestrator callers is
//! enforced here and only here.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, SharedStore};
pub use traits::{
    CasOutcome, ClaimOutcome, ConsumeOutcome, InvitationRecord, SessionStore, StatusUpdate,
};
