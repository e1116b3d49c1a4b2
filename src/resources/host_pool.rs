//! Host pools.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::HostPoolDeclaration;
use crate::error::Result;
use crate::fulfillment::{HostPoolSpec, HostPoolStatus, Metadata, Object, Resource};
use crate::provision::StateTable;

use super::{
    metadata, non_empty, sets_from_wire, sets_to_wire, Provisioning, ResourceKind, ResourceType,
    SetView,
};

/// State labels of host pools.
pub const HOST_POOL_STATES: StateTable = StateTable {
    kind: "host pool",
    unobserved: "HOST_POOL_STATE_UNSPECIFIED",
    pending: &["HOST_POOL_STATE_UNSPECIFIED", "HOST_POOL_STATE_PROGRESSING"],
    target: &["HOST_POOL_STATE_READY"],
    failure: "HOST_POOL_STATE_FAILED",
};

/// Host pool resource kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostPool;

/// Declared and computed host pool fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostPoolView {
    /// Server-assigned ID.
    pub id: String,
    /// Object name.
    pub name: Option<String>,
    /// Host sets keyed by name.
    pub host_sets: BTreeMap<String, SetView>,
    /// Provisioning state.
    pub state: Option<String>,
    /// IDs of the hosts assigned to the pool.
    pub hosts: Vec<String>,
}

impl Resource for HostPool {
    const NAME: &'static str = "host pool";
    const COLLECTION: &'static str = "host_pools";

    type Spec = HostPoolSpec;
    type Status = HostPoolStatus;
}

impl ResourceKind for HostPool {
    const TYPE: ResourceType = ResourceType::HostPool;
    const STATES: StateTable = HOST_POOL_STATES;
    const PROVISIONING: Provisioning = Provisioning::Asynchronous;

    type Declaration = HostPoolDeclaration;
    type View = HostPoolView;

    fn build(declaration: &HostPoolDeclaration) -> Result<(Option<Metadata>, HostPoolSpec)> {
        let spec = HostPoolSpec {
            host_sets: sets_to_wire("host_sets", declaration.host_sets.as_ref())?,
        };
        Ok((metadata(declaration.name.as_ref()), spec))
    }

    fn view(object: &Object<Self>) -> Result<HostPoolView> {
        let mut view = HostPoolView {
            id: object.id.clone(),
            name: object.name().map(str::to_string),
            ..HostPoolView::default()
        };

        if let Some(spec) = &object.spec {
            view.host_sets = sets_from_wire(&spec.host_sets);
        }

        if let Some(status) = &object.status {
            view.state = non_empty(&status.state);
            view.hosts.clone_from(&status.hosts);
        }

        Ok(view)
    }
}
