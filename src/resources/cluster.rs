//! Clusters.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ClusterDeclaration;
use crate::error::Result;
use crate::fulfillment::{ClusterSpec, ClusterStatus, Metadata, Object, Resource};
use crate::params;
use crate::provision::StateTable;

use super::{
    metadata, non_empty, sets_from_wire, sets_to_wire, Provisioning, ResourceKind, ResourceType,
    SetView,
};

/// State labels of clusters.
pub const CLUSTER_STATES: StateTable = StateTable {
    kind: "cluster",
    unobserved: "CLUSTER_STATE_UNSPECIFIED",
    pending: &["CLUSTER_STATE_UNSPECIFIED", "CLUSTER_STATE_PROGRESSING"],
    target: &["CLUSTER_STATE_READY"],
    failure: "CLUSTER_STATE_FAILED",
};

/// Cluster resource kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cluster;

/// Declared and computed cluster fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterView {
    /// Server-assigned ID.
    pub id: String,
    /// Object name.
    pub name: Option<String>,
    /// Cluster template ID.
    pub template: Option<String>,
    /// Template parameters.
    pub template_parameters: BTreeMap<String, String>,
    /// Node sets keyed by name.
    pub node_sets: BTreeMap<String, SetView>,
    /// Provisioning state.
    pub state: Option<String>,
    /// Kubernetes API URL.
    pub api_url: Option<String>,
    /// Web console URL.
    pub console_url: Option<String>,
}

impl Resource for Cluster {
    const NAME: &'static str = "cluster";
    const COLLECTION: &'static str = "clusters";

    type Spec = ClusterSpec;
    type Status = ClusterStatus;
}

impl ResourceKind for Cluster {
    const TYPE: ResourceType = ResourceType::Cluster;
    const STATES: StateTable = CLUSTER_STATES;
    const PROVISIONING: Provisioning = Provisioning::Asynchronous;

    type Declaration = ClusterDeclaration;
    type View = ClusterView;

    fn build(declaration: &ClusterDeclaration) -> Result<(Option<Metadata>, ClusterSpec)> {
        let spec = ClusterSpec {
            template: declaration.template.clone(),
            template_parameters: params::encode(declaration.template_parameters.as_ref())?,
            node_sets: sets_to_wire("node_sets", declaration.node_sets.as_ref())?,
        };
        Ok((metadata(declaration.name.as_ref()), spec))
    }

    fn view(object: &Object<Self>) -> Result<ClusterView> {
        let mut view = ClusterView {
            id: object.id.clone(),
            name: object.name().map(str::to_string),
            ..ClusterView::default()
        };

        if let Some(spec) = &object.spec {
            view.template = non_empty(&spec.template);
            view.template_parameters = params::decode(Some(&spec.template_parameters))?;
            view.node_sets = sets_from_wire(&spec.node_sets);
        }

        if let Some(status) = &object.status {
            view.state = non_empty(&status.state);
            view.api_url = non_empty(&status.api_url);
            view.console_url = non_empty(&status.console_url);
        }

        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SetDeclaration;
    use crate::fulfillment::RemoteObject;

    fn declaration() -> ClusterDeclaration {
        let mut node_sets = BTreeMap::new();
        node_sets.insert(
            "workers".to_string(),
            SetDeclaration {
                host_class: "gpu".to_string(),
                size: 3,
            },
        );
        let mut params = BTreeMap::new();
        params.insert("pull_secret".to_string(), "s3cr3t".to_string());

        ClusterDeclaration {
            name: Some("edge".to_string()),
            template: "ocp_4_17_small".to_string(),
            template_parameters: Some(params),
            node_sets: Some(node_sets),
        }
    }

    #[test]
    fn test_build_spec() {
        let (metadata, spec) = Cluster::build(&declaration()).unwrap();
        assert_eq!(metadata.unwrap().name, "edge");
        assert_eq!(spec.template, "ocp_4_17_small");
        assert_eq!(spec.node_sets["workers"].size, 3);
        assert_eq!(
            spec.template_parameters["pull_secret"].type_url,
            params::STRING_VALUE_TYPE_URL
        );
    }

    #[test]
    fn test_view_round_trips_declaration() {
        let (metadata, spec) = Cluster::build(&declaration()).unwrap();
        let object = RemoteObject {
            id: "c-1".to_string(),
            metadata,
            spec: Some(spec),
            status: Some(ClusterStatus {
                state: "CLUSTER_STATE_READY".to_string(),
                api_url: "https://api.edge".to_string(),
                console_url: String::new(),
            }),
        };

        let view = Cluster::view(&object).unwrap();
        assert_eq!(view.name.as_deref(), Some("edge"));
        assert_eq!(view.template_parameters["pull_secret"], "s3cr3t");
        assert_eq!(view.node_sets["workers"].host_class, "gpu");
        assert_eq!(view.api_url.as_deref(), Some("https://api.edge"));
        assert_eq!(view.console_url, None);
    }

    #[test]
    fn test_view_without_spec_or_status() {
        let object = RemoteObject {
            id: "c-2".to_string(),
            metadata: None,
            spec: None,
            status: None,
        };

        let view = Cluster::view(&object).unwrap();
        assert_eq!(view.id, "c-2");
        assert!(view.template.is_none());
        assert!(view.state.is_none());
    }
}
