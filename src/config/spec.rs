//! Configuration specification types for the provisioning system.
//!
//! This module defines all the structs that map to the `osac.yaml` file.
//! Resources are declared in name-keyed maps, one per kind.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resources::{ResourceType, Timeouts};

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OsacConfig {
    /// Fulfillment API connection settings.
    pub provider: ProviderConfig,
    /// State storage configuration.
    #[serde(default)]
    pub state: StateConfig,
    /// Declared clusters.
    #[serde(default)]
    pub clusters: BTreeMap<String, ClusterDeclaration>,
    /// Declared compute instances.
    #[serde(default)]
    pub compute_instances: BTreeMap<String, ComputeInstanceDeclaration>,
    /// Declared hosts.
    #[serde(default)]
    pub hosts: BTreeMap<String, HostDeclaration>,
    /// Declared host pools.
    #[serde(default)]
    pub host_pools: BTreeMap<String, HostPoolDeclaration>,
}

/// Fulfillment API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Base URL of the API gateway.
    pub endpoint: String,
    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure: bool,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Provisioning timeouts.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

/// Provisioning timeouts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutsConfig {
    /// Time allowed for a create to become ready.
    #[serde(default = "default_provision_timeout")]
    pub create_secs: u64,
    /// Time allowed for an update to become ready.
    #[serde(default = "default_provision_timeout")]
    pub update_secs: u64,
    /// Delay between polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Delay before the second poll.
    #[serde(default = "default_min_poll_interval")]
    pub min_poll_interval_secs: u64,
}

/// State storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateConfig {
    /// Local state file path.
    #[serde(default)]
    pub path: Option<String>,
}

/// A named group of hosts of the same class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SetDeclaration {
    /// Host class of the members.
    pub host_class: String,
    /// Number of members.
    pub size: u32,
}

/// Declared cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClusterDeclaration {
    /// Remote object name.
    #[serde(default)]
    pub name: Option<String>,
    /// Cluster template ID.
    pub template: String,
    /// Template parameters.
    #[serde(default)]
    pub template_parameters: Option<BTreeMap<String, String>>,
    /// Node sets keyed by name.
    #[serde(default)]
    pub node_sets: Option<BTreeMap<String, SetDeclaration>>,
}

/// Declared compute instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ComputeInstanceDeclaration {
    /// Remote object name.
    #[serde(default)]
    pub name: Option<String>,
    /// Compute instance template ID.
    pub template: String,
    /// Template parameters.
    #[serde(default)]
    pub template_parameters: Option<BTreeMap<String, String>>,
}

/// Declared host.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HostDeclaration {
    /// Remote object name.
    #[serde(default)]
    pub name: Option<String>,
    /// Desired power state (`ON` or `OFF`).
    #[serde(default)]
    pub power_state: Option<String>,
}

/// Declared host pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HostPoolDeclaration {
    /// Remote object name.
    #[serde(default)]
    pub name: Option<String>,
    /// Host sets keyed by name.
    #[serde(default)]
    pub host_sets: Option<BTreeMap<String, SetDeclaration>>,
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_provision_timeout() -> u64 {
    30 * 60
}

const fn default_poll_interval() -> u64 {
    10
}

const fn default_min_poll_interval() -> u64 {
    5
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            create_secs: default_provision_timeout(),
            update_secs: default_provision_timeout(),
            poll_interval_secs: default_poll_interval(),
            min_poll_interval_secs: default_min_poll_interval(),
        }
    }
}

impl TimeoutsConfig {
    /// Converts to engine timeouts.
    #[must_use]
    pub const fn to_timeouts(&self) -> Timeouts {
        Timeouts {
            create: Duration::from_secs(self.create_secs),
            update: Duration::from_secs(self.update_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            min_poll_interval: Duration::from_secs(self.min_poll_interval_secs),
        }
    }
}

impl OsacConfig {
    /// Returns every declared resource as `(kind, key)` pairs, in apply order.
    #[must_use]
    pub fn declared(&self) -> Vec<(ResourceType, &str)> {
        let hosts = self.hosts.keys().map(|k| (ResourceType::Host, k.as_str()));
        let pools = self
            .host_pools
            .keys()
            .map(|k| (ResourceType::HostPool, k.as_str()));
        let instances = self
            .compute_instances
            .keys()
            .map(|k| (ResourceType::ComputeInstance, k.as_str()));
        let clusters = self
            .clusters
            .keys()
            .map(|k| (ResourceType::Cluster, k.as_str()));

        hosts.chain(pools).chain(instances).chain(clusters).collect()
    }

    /// Returns true if a resource with this kind and key is declared.
    #[must_use]
    pub fn is_declared(&self, kind: ResourceType, key: &str) -> bool {
        match kind {
            ResourceType::Cluster => self.clusters.contains_key(key),
            ResourceType::ComputeInstance => self.compute_instances.contains_key(key),
            ResourceType::Host => self.hosts.contains_key(key),
            ResourceType::HostPool => self.host_pools.contains_key(key),
        }
    }

    /// Returns the total number of declared resources.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.clusters.len()
            + self.compute_instances.len()
            + self.hosts.len()
            + self.host_pools.len()
    }
}
