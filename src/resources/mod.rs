//! Resource kinds and their reconciliation.
//!
//! Every kind (cluster, compute instance, host, host pool) is a marker type
//! implementing [`ResourceKind`]: how a declaration becomes a wire spec, how a
//! remote object becomes a view, and which state labels mean what. A single
//! generic [`ResourceReconciler`] drives all of them.

mod catalog;
mod cluster;
mod compute_instance;
mod host;
mod host_pool;
mod reconciler;
#[cfg(test)]
pub(crate) mod testing;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::SetDeclaration;
use crate::error::{ConfigError, Result};
use crate::fulfillment::{Metadata, NodeSet, Object, Resource};
use crate::provision::StateTable;

pub use catalog::CatalogReader;
pub use cluster::{Cluster, ClusterView, CLUSTER_STATES};
pub use compute_instance::{ComputeInstance, ComputeInstanceView, COMPUTE_INSTANCE_STATES};
pub use host::{Host, HostView, HOST_STATES};
pub use host_pool::{HostPool, HostPoolView, HOST_POOL_STATES};
pub use reconciler::{ResourceReconciler, Timeouts};

/// Whether the remote side converges after accepting a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioning {
    /// Accepted requests are followed by polling until ready.
    Asynchronous,
    /// The response to the request is final.
    Synchronous,
}

/// A resource kind the reconciler can drive.
pub trait ResourceKind: Resource {
    /// Kind tag used in state addresses.
    const TYPE: ResourceType;
    /// Classification of the kind's state labels.
    const STATES: StateTable;
    /// Whether creates and updates are followed by polling.
    const PROVISIONING: Provisioning;

    /// Declared configuration.
    type Declaration: fmt::Debug + Send + Sync;
    /// Declared plus computed fields handed back to the caller.
    type View: Serialize + fmt::Debug + Send;

    /// Builds the metadata and wire spec from a declaration.
    ///
    /// # Errors
    ///
    /// Returns an error if a declared value cannot be represented on the wire.
    fn build(declaration: &Self::Declaration) -> Result<(Option<Metadata>, Self::Spec)>;

    /// Maps a remote object to its view.
    ///
    /// # Errors
    ///
    /// Returns an error if a wire value cannot be decoded.
    fn view(object: &Object<Self>) -> Result<Self::View>;
}

/// Kind tag of a declared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// A cluster.
    Cluster,
    /// A compute instance.
    ComputeInstance,
    /// A bare-metal host.
    Host,
    /// A host pool.
    HostPool,
}

impl ResourceType {
    /// Every kind, in apply order.
    pub const ALL: [Self; 4] = [Self::Host, Self::HostPool, Self::ComputeInstance, Self::Cluster];

    /// Returns the tag used in addresses and configuration keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::ComputeInstance => "compute_instance",
            Self::Host => "host",
            Self::HostPool => "host_pool",
        }
    }

    /// Returns the state address of a resource of this kind.
    #[must_use]
    pub fn address(self, key: &str) -> String {
        format!("{}.{key}", self.as_str())
    }

    /// Splits an address into kind and key.
    #[must_use]
    pub fn parse_address(address: &str) -> Option<(Self, &str)> {
        let (kind, key) = address.split_once('.')?;
        Some((kind.parse().ok()?, key))
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cluster" => Ok(Self::Cluster),
            "compute_instance" => Ok(Self::ComputeInstance),
            "host" => Ok(Self::Host),
            "host_pool" => Ok(Self::HostPool),
            _ => Err(format!("Unknown resource type: {s}")),
        }
    }
}

/// A node or host set as exposed in views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetView {
    /// Host class of the members.
    pub host_class: String,
    /// Number of members.
    pub size: i32,
}

fn metadata(name: Option<&String>) -> Option<Metadata> {
    name.map(|name| Metadata { name: name.clone() })
}

fn sets_to_wire(
    field: &str,
    sets: Option<&BTreeMap<String, SetDeclaration>>,
) -> Result<BTreeMap<String, NodeSet>> {
    let Some(sets) = sets else {
        return Ok(BTreeMap::new());
    };

    sets.iter()
        .map(|(name, set)| {
            let size = i32::try_from(set.size).map_err(|_| {
                ConfigError::validation(
                    format!("Size {} is too large", set.size),
                    format!("{field}.{name}.size"),
                )
            })?;
            Ok((
                name.clone(),
                NodeSet {
                    host_class: set.host_class.clone(),
                    size,
                },
            ))
        })
        .collect()
}

fn sets_from_wire(sets: &BTreeMap<String, NodeSet>) -> BTreeMap<String, SetView> {
    sets.iter()
        .map(|(name, set)| {
            (
                name.clone(),
                SetView {
                    host_class: set.host_class.clone(),
                    size: set.size,
                },
            )
        })
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
