//! State management for provisioned resources.
//!
//! Records each applied declaration with its server-assigned ID, its hashes
//! and the last observed state, plus a bounded history of runs.

mod local;
mod lock;
mod store;
mod types;

pub use local::{LocalStateStore, STATE_DIR};
pub use lock::{generate_holder_id, LockInfo, LOCK_EXPIRY_SECS, LOCK_REFRESH_INTERVAL};
pub use store::{with_lock, StateStore};
pub use types::{HistoryEntry, ProvisioningState, ResourceRecord, StateOperation, STATE_VERSION};
