//! State store trait definition.
//!
//! This module defines the common interface for state storage backends.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::lock::LockInfo;
use super::types::ProvisioningState;
use crate::error::Result;

/// Trait for state storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the provisioning state.
    ///
    /// Returns `None` if no state exists yet.
    async fn load(&self) -> Result<Option<ProvisioningState>>;

    /// Saves the provisioning state.
    async fn save(&self, state: &ProvisioningState) -> Result<()>;

    /// Checks if state exists.
    async fn exists(&self) -> Result<bool>;

    /// Acquires a lock on the state.
    ///
    /// Returns lock information if successful.
    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo>;

    /// Extends the expiry of a lock this process holds.
    ///
    /// Fails if the lock was released, removed or taken over.
    async fn refresh_lock(&self, lock_id: &str) -> Result<LockInfo>;

    /// Releases a lock on the state.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Removes the lock regardless of who holds it.
    async fn force_unlock(&self) -> Result<()>;

    /// Gets current lock information if locked.
    async fn get_lock_info(&self) -> Result<Option<LockInfo>>;

    /// Gets a human-readable location of the state.
    fn location(&self) -> String;
}

#[async_trait]
impl StateStore for Box<dyn StateStore> {
    async fn load(&self) -> Result<Option<ProvisioningState>> {
        (**self).load().await
    }

    async fn save(&self, state: &ProvisioningState) -> Result<()> {
        (**self).save(state).await
    }

    async fn exists(&self) -> Result<bool> {
        (**self).exists().await
    }

    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo> {
        (**self).acquire_lock(holder).await
    }

    async fn refresh_lock(&self, lock_id: &str) -> Result<LockInfo> {
        (**self).refresh_lock(lock_id).await
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        (**self).release_lock(lock_id).await
    }

    async fn force_unlock(&self) -> Result<()> {
        (**self).force_unlock().await
    }

    async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
        (**self).get_lock_info().await
    }

    fn location(&self) -> String {
        (**self).location()
    }
}

/// Runs `work` while holding the state lock.
///
/// The lock is refreshed every `refresh_every` until `work` finishes, then
/// released whatever the outcome.
///
/// # Errors
///
/// Returns an error if the lock cannot be acquired, or the error of `work`.
pub async fn with_lock<S, F, T>(store: &S, refresh_every: Duration, work: F) -> Result<T>
where
    S: StateStore + ?Sized,
    F: Future<Output = Result<T>>,
{
    let lock = store.acquire_lock("").await?;

    let mut ticker = tokio::time::interval(refresh_every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    tokio::pin!(work);
    let result = loop {
        tokio::select! {
            result = &mut work => break result,
            _ = ticker.tick() => match store.refresh_lock(&lock.lock_id).await {
                Ok(refreshed) => debug!("Refreshed state lock until {}", refreshed.expires_at),
                Err(e) => warn!("Failed to refresh state lock: {e}"),
            },
        }
    };

    if let Err(e) = store.release_lock(&lock.lock_id).await {
        warn!("Failed to release state lock: {e}");
    }

    result
}
