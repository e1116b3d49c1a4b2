//! Provisioning plan types and construction.
//!
//! Diffs become an ordered list of actions. Deletes run first, then
//! creates and updates in apply order. A replacement is a delete followed by
//! a create that depends on it.

use chrono::{DateTime, Utc};

use crate::config::DeclarationHash;
use crate::resources::ResourceType;
use crate::state::{ProvisioningState, StateOperation};

use super::diff::{DiffResult, DiffType};

/// A complete provisioning plan.
#[derive(Debug)]
pub struct ProvisioningPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Configuration hash this plan is based on.
    pub config_hash: String,
    /// Operation recorded in the state history.
    pub operation: StateOperation,
    /// Planned actions in execution order.
    pub actions: Vec<PlannedAction>,
}

/// A single planned action.
#[derive(Debug, Clone)]
pub struct PlannedAction {
    /// Action type.
    pub action_type: ActionType,
    /// Resource kind.
    pub resource_type: ResourceType,
    /// Declaration key.
    pub key: String,
    /// Remote ID (for updates and deletes).
    pub id: Option<String>,
    /// Reason for this action.
    pub reason: String,
    /// Hashes recorded after a create or update.
    pub hash: Option<DeclarationHash>,
    /// Dependencies (action indices that must complete first).
    pub dependencies: Vec<usize>,
}

/// Types of actions in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    /// Create a resource and wait for it.
    Create,
    /// Update a resource in place and wait for it.
    Update,
    /// Request deletion of a resource.
    Delete,
}

/// Position of a kind in delete order (the reverse of apply order).
fn delete_rank(kind: ResourceType) -> usize {
    ResourceType::ALL
        .iter()
        .rev()
        .position(|k| *k == kind)
        .unwrap_or(usize::MAX)
}

impl ProvisioningPlan {
    /// Creates a new plan from a diff result.
    #[must_use]
    pub fn from_diff(diff: &DiffResult, config_hash: &str) -> Self {
        let mut deletes: Vec<_> = diff
            .diffs
            .iter()
            .filter(|d| d.diff_type == DiffType::Delete)
            .collect();
        deletes.sort_by_key(|d| delete_rank(d.resource_type));

        let mut actions: Vec<PlannedAction> = deletes
            .into_iter()
            .map(|d| PlannedAction {
                action_type: ActionType::Delete,
                resource_type: d.resource_type,
                key: d.key.clone(),
                id: d.id.clone(),
                reason: d.reason.clone(),
                hash: None,
                dependencies: vec![],
            })
            .collect();

        for resource_diff in &diff.diffs {
            let base = PlannedAction {
                action_type: ActionType::Create,
                resource_type: resource_diff.resource_type,
                key: resource_diff.key.clone(),
                id: None,
                reason: resource_diff.reason.clone(),
                hash: resource_diff.hash.clone(),
                dependencies: vec![],
            };

            match resource_diff.diff_type {
                DiffType::Create => actions.push(base),
                DiffType::Update => actions.push(PlannedAction {
                    action_type: ActionType::Update,
                    id: resource_diff.id.clone(),
                    ..base
                }),
                DiffType::Replace => {
                    let delete_idx = actions.len();
                    actions.push(PlannedAction {
                        action_type: ActionType::Delete,
                        id: resource_diff.id.clone(),
                        hash: None,
                        ..base.clone()
                    });
                    actions.push(PlannedAction {
                        dependencies: vec![delete_idx],
                        ..base
                    });
                }
                DiffType::Delete | DiffType::NoChange => {}
            }
        }

        Self {
            created_at: Utc::now(),
            config_hash: config_hash.to_string(),
            operation: StateOperation::Apply,
            actions,
        }
    }

    /// Creates a plan deleting every recorded resource.
    #[must_use]
    pub fn destroy(state: &ProvisioningState) -> Self {
        let mut records: Vec<_> = state.resources.values().collect();
        records.sort_by_key(|r| delete_rank(r.resource_type));

        let actions = records
            .into_iter()
            .map(|r| PlannedAction {
                action_type: ActionType::Delete,
                resource_type: r.resource_type,
                key: r.key.clone(),
                id: Some(r.id.clone()),
                reason: String::from("Destroy requested"),
                hash: None,
                dependencies: vec![],
            })
            .collect();

        Self {
            created_at: Utc::now(),
            config_hash: state.config_hash.clone(),
            operation: StateOperation::Destroy,
            actions,
        }
    }

    /// Returns true if the plan is empty (no changes).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns the number of actions.
    #[must_use]
    pub const fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Returns the number of actions of one type.
    #[must_use]
    pub fn count(&self, action_type: ActionType) -> usize {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .count()
    }
}

impl PlannedAction {
    /// Returns the state address of the resource.
    #[must_use]
    pub fn address(&self) -> String {
        self.resource_type.address(&self.key)
    }

    /// Returns a human-readable description of the action.
    #[must_use]
    pub fn description(&self) -> String {
        let verb = match self.action_type {
            ActionType::Create => "Create",
            ActionType::Update => "Update",
            ActionType::Delete => "Delete",
        };
        match &self.id {
            Some(id) => format!("{verb} {} '{}' ({id})", self.resource_type, self.key),
            None => format!("{verb} {} '{}'", self.resource_type, self.key),
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.action_type, self.address())?;
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for ProvisioningPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.actions.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Plan ({} actions):", self.actions.len())?;
        for (i, action) in self.actions.iter().enumerate() {
            writeln!(f, "  {i}. {action}")?;
        }
        Ok(())
    }
}
