//! Asynchronous provisioning engine.
//!
//! This module provides:
//! - State classification tables
//! - The readiness polling loop
//! - Cooperative cancellation

mod cancel;
mod classifier;
mod poller;

pub use cancel::{CancelHandle, CancelSignal};
pub use classifier::{classify, Classified, StateBucket, StateTable};
pub use poller::{
    wait_for_ready, Observation, WaitConfig, WaitOutcome, DEFAULT_MIN_POLL_INTERVAL,
    DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT,
};
