//! Planning and applying declared resources.
//!
//! The diff engine compares declarations to the recorded state, the plan
//! orders the resulting actions, and the executor runs them against the
//! fulfillment API.

mod diff;
mod executor;
mod plan;

pub use diff::{DiffEngine, DiffResult, DiffType, ResourceDiff};
pub use executor::{ActionResult, ExecutionResult, FulfillmentBackend, PlanExecutor};
pub use plan::{ActionType, PlannedAction, ProvisioningPlan};
