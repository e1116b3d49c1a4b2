//! Hosts.
//!
//! Hosts are provisioned synchronously: the fulfillment API applies power
//! changes before answering, so creates and updates are not followed by
//! polling.

use serde::Serialize;

use crate::config::HostDeclaration;
use crate::error::Result;
use crate::fulfillment::{HostSpec, HostStatus, Metadata, Object, PowerState, Resource};
use crate::provision::StateTable;

use super::{metadata, non_empty, Provisioning, ResourceKind, ResourceType};

/// State labels of hosts.
pub const HOST_STATES: StateTable = StateTable {
    kind: "host",
    unobserved: "HOST_STATE_UNSPECIFIED",
    pending: &["HOST_STATE_UNSPECIFIED", "HOST_STATE_PROGRESSING"],
    target: &["HOST_STATE_READY"],
    failure: "HOST_STATE_FAILED",
};

/// Host resource kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct Host;

/// Declared and computed host fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostView {
    /// Server-assigned ID.
    pub id: String,
    /// Object name.
    pub name: Option<String>,
    /// Desired power state.
    pub power_state: Option<String>,
    /// Provisioning state.
    pub state: Option<String>,
    /// Power state reported by the host.
    pub current_power_state: Option<String>,
}

impl Resource for Host {
    const NAME: &'static str = "host";
    const COLLECTION: &'static str = "hosts";

    type Spec = HostSpec;
    type Status = HostStatus;
}

impl ResourceKind for Host {
    const TYPE: ResourceType = ResourceType::Host;
    const STATES: StateTable = HOST_STATES;
    const PROVISIONING: Provisioning = Provisioning::Synchronous;

    type Declaration = HostDeclaration;
    type View = HostView;

    fn build(declaration: &HostDeclaration) -> Result<(Option<Metadata>, HostSpec)> {
        let power_state = declaration
            .power_state
            .as_deref()
            .map(PowerState::parse)
            .filter(|p| *p != PowerState::Unspecified)
            .map(|p| p.as_wire().to_string())
            .unwrap_or_default();

        Ok((metadata(declaration.name.as_ref()), HostSpec { power_state }))
    }

    fn view(object: &Object<Self>) -> Result<HostView> {
        let mut view = HostView {
            id: object.id.clone(),
            name: object.name().map(str::to_string),
            ..HostView::default()
        };

        if let Some(spec) = &object.spec {
            view.power_state = non_empty(&spec.power_state);
        }

        if let Some(status) = &object.status {
            view.state = non_empty(&status.state);
            view.current_power_state = non_empty(&status.power_state);
        }

        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(power_state: Option<&str>) -> HostDeclaration {
        HostDeclaration {
            name: Some("rack1-u4".to_string()),
            power_state: power_state.map(str::to_string),
        }
    }

    #[test]
    fn test_power_state_forms() {
        let (_, spec) = Host::build(&host(Some("ON"))).unwrap();
        assert_eq!(spec.power_state, "HOST_POWER_STATE_ON");

        let (_, spec) = Host::build(&host(Some("HOST_POWER_STATE_OFF"))).unwrap();
        assert_eq!(spec.power_state, "HOST_POWER_STATE_OFF");
    }

    #[test]
    fn test_unknown_power_state_is_unspecified() {
        let (_, spec) = Host::build(&host(Some("standby"))).unwrap();
        assert!(spec.power_state.is_empty());

        let (_, spec) = Host::build(&host(None)).unwrap();
        assert!(spec.power_state.is_empty());
    }

    #[test]
    fn test_host_is_synchronous() {
        assert_eq!(Host::PROVISIONING, Provisioning::Synchronous);
    }
}
