//! Compute instances.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ComputeInstanceDeclaration;
use crate::error::Result;
use crate::fulfillment::{ComputeInstanceSpec, ComputeInstanceStatus, Metadata, Object, Resource};
use crate::params;
use crate::provision::StateTable;

use super::{metadata, non_empty, Provisioning, ResourceKind, ResourceType};

/// State labels of compute instances.
pub const COMPUTE_INSTANCE_STATES: StateTable = StateTable {
    kind: "compute instance",
    unobserved: "COMPUTE_INSTANCE_STATE_UNSPECIFIED",
    pending: &[
        "COMPUTE_INSTANCE_STATE_UNSPECIFIED",
        "COMPUTE_INSTANCE_STATE_PROGRESSING",
    ],
    target: &["COMPUTE_INSTANCE_STATE_READY"],
    failure: "COMPUTE_INSTANCE_STATE_FAILED",
};

/// Compute instance resource kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeInstance;

/// Declared and computed compute instance fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComputeInstanceView {
    /// Server-assigned ID.
    pub id: String,
    /// Object name.
    pub name: Option<String>,
    /// Compute instance template ID.
    pub template: Option<String>,
    /// Template parameters.
    pub template_parameters: BTreeMap<String, String>,
    /// Provisioning state.
    pub state: Option<String>,
    /// Assigned IP address.
    pub ip_address: Option<String>,
}

impl Resource for ComputeInstance {
    const NAME: &'static str = "compute instance";
    const COLLECTION: &'static str = "compute_instances";

    type Spec = ComputeInstanceSpec;
    type Status = ComputeInstanceStatus;
}

impl ResourceKind for ComputeInstance {
    const TYPE: ResourceType = ResourceType::ComputeInstance;
    const STATES: StateTable = COMPUTE_INSTANCE_STATES;
    const PROVISIONING: Provisioning = Provisioning::Asynchronous;

    type Declaration = ComputeInstanceDeclaration;
    type View = ComputeInstanceView;

    fn build(
        declaration: &ComputeInstanceDeclaration,
    ) -> Result<(Option<Metadata>, ComputeInstanceSpec)> {
        let spec = ComputeInstanceSpec {
            template: declaration.template.clone(),
            template_parameters: params::encode(declaration.template_parameters.as_ref())?,
        };
        Ok((metadata(declaration.name.as_ref()), spec))
    }

    fn view(object: &Object<Self>) -> Result<ComputeInstanceView> {
        let mut view = ComputeInstanceView {
            id: object.id.clone(),
            name: object.name().map(str::to_string),
            ..ComputeInstanceView::default()
        };

        if let Some(spec) = &object.spec {
            view.template = non_empty(&spec.template);
            view.template_parameters = params::decode(Some(&spec.template_parameters))?;
        }

        if let Some(status) = &object.status {
            view.state = non_empty(&status.state);
            view.ip_address = non_empty(&status.ip_address);
        }

        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fulfillment::RemoteObject;
    use crate::params::Envelope;

    #[test]
    fn test_build_without_parameters() {
        let declaration = ComputeInstanceDeclaration {
            name: None,
            template: "small".to_string(),
            template_parameters: None,
        };

        let (metadata, spec) = ComputeInstance::build(&declaration).unwrap();
        assert!(metadata.is_none());
        assert!(spec.template_parameters.is_empty());
    }

    #[test]
    fn test_view_rejects_unknown_parameter_tag() {
        let mut parameters = BTreeMap::new();
        parameters.insert(
            "cores".to_string(),
            Envelope {
                type_url: "type.googleapis.com/google.protobuf.Int64Value".to_string(),
                value: serde_json::json!("4"),
            },
        );
        let object = RemoteObject {
            id: "ci-1".to_string(),
            metadata: None,
            spec: Some(ComputeInstanceSpec {
                template: "small".to_string(),
                template_parameters: parameters,
            }),
            status: None,
        };

        assert!(ComputeInstance::view(&object).is_err());
    }

    #[test]
    fn test_view_exposes_ip_address() {
        let object = RemoteObject {
            id: "ci-1".to_string(),
            metadata: None,
            spec: None,
            status: Some(ComputeInstanceStatus {
                state: "COMPUTE_INSTANCE_STATE_READY".to_string(),
                ip_address: "10.0.0.7".to_string(),
            }),
        };

        let view = ComputeInstance::view(&object).unwrap();
        assert_eq!(view.ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(view.state.as_deref(), Some("COMPUTE_INSTANCE_STATE_READY"));
    }
}
