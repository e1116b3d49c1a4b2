//! Fulfillment API integration.
//!
//! This module provides:
//! - Wire types shared by every resource kind
//! - The service traits the reconcilers depend on
//! - An HTTP client implementing them

mod client;
mod service;
mod types;

pub use client::{ClientConfig, FulfillmentClient};
#[cfg(test)]
pub use service::MockCatalogService;
pub use service::{ApiResult, CatalogService, ResourceService};
pub use types::{
    CatalogEntry, CatalogKind, ClusterSpec, ClusterStatus, ComputeInstanceSpec,
    ComputeInstanceStatus, HostPoolSpec, HostPoolStatus, HostSpec, HostStatus, Metadata, NodeSet,
    Object, ObservedStatus, PowerState, RemoteObject, Resource,
};
