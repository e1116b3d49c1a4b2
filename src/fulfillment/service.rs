//! Service traits consumed by the reconcilers.
//!
//! The reconcilers only talk to the fulfillment API through these traits, so
//! they can be driven by the HTTP client or by in-memory fakes.

use async_trait::async_trait;

use crate::error::ApiError;

use super::types::{CatalogEntry, CatalogKind, Object, Resource};

/// Result of a single fulfillment API call.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Create/read/update/delete access to one resource collection.
#[async_trait]
pub trait ResourceService<K: Resource>: Send + Sync {
    /// Submits a new object and returns it with its assigned ID.
    async fn create(&self, object: &Object<K>) -> ApiResult<Object<K>>;

    /// Fetches the current version of an object.
    async fn get(&self, id: &str) -> ApiResult<Object<K>>;

    /// Replaces the spec of an existing object.
    async fn update(&self, object: &Object<K>) -> ApiResult<Object<K>>;

    /// Requests deletion of an object.
    async fn delete(&self, id: &str) -> ApiResult<()>;
}

/// Read-only access to the catalog collections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Fetches a catalog entry by ID.
    async fn get_entry(&self, kind: CatalogKind, id: &str) -> ApiResult<CatalogEntry>;
}
