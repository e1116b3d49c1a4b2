//! Fulfillment API types and data structures.
//!
//! This module defines the objects exchanged with the fulfillment API. Every
//! resource kind shares the same `{id, metadata, spec, status}` envelope; the
//! spec and status payloads vary per kind.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::params::Envelope;

/// A resource kind as seen by the fulfillment API.
pub trait Resource: Sized + Send + Sync + 'static {
    /// Human-readable kind name used in logs and errors.
    const NAME: &'static str;
    /// Collection segment of the REST path.
    const COLLECTION: &'static str;

    /// Desired configuration payload.
    type Spec: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static;
    /// Observed status payload.
    type Status: ObservedStatus
        + Serialize
        + DeserializeOwned
        + Clone
        + fmt::Debug
        + Send
        + Sync
        + 'static;
}

/// A status payload that reports a provisioning state label.
pub trait ObservedStatus {
    /// Returns the raw state label, or an empty string if none was reported.
    fn state(&self) -> &str;
}

/// Object metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Object name.
    #[serde(default)]
    pub name: String,
}

/// A remote object as returned by the fulfillment API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject<S, T> {
    /// Server-assigned identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Object metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Desired configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<S>,
    /// Observed status, absent until the remote side reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<T>,
}

/// The remote object type of a resource kind.
pub type Object<K> = RemoteObject<<K as Resource>::Spec, <K as Resource>::Status>;

impl<S, T: ObservedStatus> RemoteObject<S, T> {
    /// Creates an object to submit.
    #[must_use]
    pub fn new(id: impl Into<String>, metadata: Option<Metadata>, spec: S) -> Self {
        Self {
            id: id.into(),
            metadata,
            spec: Some(spec),
            status: None,
        }
    }

    /// Returns the reported state label, if any.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(ObservedStatus::state)
            .filter(|s| !s.is_empty())
    }

    /// Returns the object name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .map(|m| m.name.as_str())
            .filter(|n| !n.is_empty())
    }
}

/// A named group of hosts of the same class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSet {
    /// Host class of the members.
    #[serde(default)]
    pub host_class: String,
    /// Number of members.
    #[serde(default)]
    pub size: i32,
}

/// Cluster spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Cluster template ID.
    #[serde(default)]
    pub template: String,
    /// Template parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub template_parameters: BTreeMap<String, Envelope>,
    /// Node sets keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_sets: BTreeMap<String, NodeSet>,
}

/// Cluster status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Provisioning state.
    #[serde(default)]
    pub state: String,
    /// Kubernetes API URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_url: String,
    /// Web console URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub console_url: String,
}

/// Compute instance spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeInstanceSpec {
    /// Compute instance template ID.
    #[serde(default)]
    pub template: String,
    /// Template parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub template_parameters: BTreeMap<String, Envelope>,
}

/// Compute instance status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeInstanceStatus {
    /// Provisioning state.
    #[serde(default)]
    pub state: String,
    /// Assigned IP address.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_address: String,
}

/// Power state of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    /// Not specified.
    #[default]
    Unspecified,
    /// Powered on.
    On,
    /// Powered off.
    Off,
}

impl PowerState {
    /// Parses a declared power state.
    ///
    /// Accepts both the short (`ON`) and the wire (`HOST_POWER_STATE_ON`)
    /// forms; anything else is unspecified.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "ON" | "HOST_POWER_STATE_ON" => Self::On,
            "OFF" | "HOST_POWER_STATE_OFF" => Self::Off,
            _ => Self::Unspecified,
        }
    }

    /// Returns true if `value` names a known power state.
    #[must_use]
    pub fn is_known(value: &str) -> bool {
        Self::parse(value) != Self::Unspecified
    }

    /// Returns the wire label.
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Unspecified => "HOST_POWER_STATE_UNSPECIFIED",
            Self::On => "HOST_POWER_STATE_ON",
            Self::Off => "HOST_POWER_STATE_OFF",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

/// Host spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSpec {
    /// Desired power state (wire label).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub power_state: String,
}

/// Host status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostStatus {
    /// Provisioning state.
    #[serde(default)]
    pub state: String,
    /// Current power state (wire label).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub power_state: String,
}

/// Host pool spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostPoolSpec {
    /// Host sets keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub host_sets: BTreeMap<String, NodeSet>,
}

/// Host pool status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostPoolStatus {
    /// Provisioning state.
    #[serde(default)]
    pub state: String,
    /// IDs of the hosts assigned to the pool.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
}

macro_rules! impl_observed_status {
    ($($status:ty),+ $(,)?) => {
        $(
            impl ObservedStatus for $status {
                fn state(&self) -> &str {
                    &self.state
                }
            }
        )+
    };
}

impl_observed_status!(ClusterStatus, ComputeInstanceStatus, HostStatus, HostPoolStatus);

/// Read-only catalog collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    /// Cluster templates.
    ClusterTemplate,
    /// Compute instance templates.
    ComputeInstanceTemplate,
    /// Host classes.
    HostClass,
}

impl CatalogKind {
    /// Returns the kind name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ClusterTemplate => "cluster template",
            Self::ComputeInstanceTemplate => "compute instance template",
            Self::HostClass => "host class",
        }
    }

    /// Returns the collection segment of the REST path.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::ClusterTemplate => "cluster_templates",
            Self::ComputeInstanceTemplate => "compute_instance_templates",
            Self::HostClass => "host_classes",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Entry ID.
    #[serde(default)]
    pub id: String,
    /// Short title.
    #[serde(default)]
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_state_parse() {
        assert_eq!(PowerState::parse("ON"), PowerState::On);
        assert_eq!(PowerState::parse("HOST_POWER_STATE_OFF"), PowerState::Off);
        assert_eq!(PowerState::parse("on"), PowerState::Unspecified);
        assert_eq!(PowerState::parse(""), PowerState::Unspecified);
    }

    #[test]
    fn test_object_without_status() {
        let json = r#"{"id": "c-1", "metadata": {"name": "edge"}}"#;
        let object: RemoteObject<ClusterSpec, ClusterStatus> = serde_json::from_str(json).unwrap();
        assert_eq!(object.id, "c-1");
        assert_eq!(object.name(), Some("edge"));
        assert!(object.status.is_none());
        assert_eq!(object.state(), None);
    }

    #[test]
    fn test_camel_case_wire_fields() {
        let json = r#"{
            "id": "c-1",
            "spec": {"template": "ocp", "nodeSets": {"workers": {"hostClass": "gpu", "size": 3}}},
            "status": {"state": "CLUSTER_STATE_READY", "apiUrl": "https://api"}
        }"#;
        let object: RemoteObject<ClusterSpec, ClusterStatus> = serde_json::from_str(json).unwrap();
        let spec = object.spec.as_ref().unwrap();
        assert_eq!(spec.node_sets["workers"].host_class, "gpu");
        assert_eq!(spec.node_sets["workers"].size, 3);
        assert_eq!(object.state(), Some("CLUSTER_STATE_READY"));
        assert_eq!(object.status.unwrap().api_url, "https://api");
    }

    fn parse<K: Resource>(json: &str) -> Object<K> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_through_resource_kind() {
        use crate::resources::{Cluster, HostPool};

        let object = parse::<HostPool>(r#"{"id": "hp-1"}"#);
        assert_eq!(object.id, "hp-1");
        assert!(object.spec.is_none());
        assert!(object.status.is_none());

        let object = parse::<Cluster>(
            r#"{"id": "c-1", "spec": {"template": "ocp"}, "status": {"state": "CLUSTER_STATE_READY"}}"#,
        );
        assert_eq!(object.spec.as_ref().unwrap().template, "ocp");
        assert_eq!(object.state(), Some("CLUSTER_STATE_READY"));
    }

    #[test]
    fn test_new_object_omits_empty_fields() {
        let object: RemoteObject<HostSpec, HostStatus> =
            RemoteObject::new("", None, HostSpec::default());
        let json = serde_json::to_value(&object).unwrap();
        assert_eq!(json, serde_json::json!({"spec": {}}));
    }
}
