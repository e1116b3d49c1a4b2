//! Plan executor for applying provisioning plans.
//!
//! Actions run one at a time through a [`ResourceReconciler`] for the
//! action's kind. The state is updated after every action, so a failed or
//! cancelled run still records what was provisioned.

use std::collections::{BTreeMap, HashSet};

use tracing::{error, info, warn};

use crate::config::OsacConfig;
use crate::error::{OsacError, PlanError, ProvisionError, Result, StateError};
use crate::fulfillment::{Object, ResourceService};
use crate::provision::CancelSignal;
use crate::resources::{
    Cluster, ComputeInstance, Host, HostPool, ResourceKind, ResourceReconciler, ResourceType,
    Timeouts,
};
use crate::state::{HistoryEntry, ProvisioningState, ResourceRecord};

use super::plan::{ActionType, PlannedAction, ProvisioningPlan};

/// A fulfillment API serving every resource kind.
pub trait FulfillmentBackend:
    ResourceService<Cluster>
    + ResourceService<ComputeInstance>
    + ResourceService<Host>
    + ResourceService<HostPool>
{
}

impl<T> FulfillmentBackend for T where
    T: ResourceService<Cluster>
        + ResourceService<ComputeInstance>
        + ResourceService<Host>
        + ResourceService<HostPool>
        + ?Sized
{
}

/// Executor for provisioning plans.
#[derive(Debug)]
pub struct PlanExecutor<'a, S: ?Sized> {
    /// Fulfillment API.
    service: &'a S,
    /// Declarations referenced by create and update actions.
    config: &'a OsacConfig,
    /// Wait timings.
    timeouts: Timeouts,
    /// Cancellation signal.
    cancel: CancelSignal,
    /// Whether to continue on errors.
    continue_on_error: bool,
}

/// Result of executing a single action.
#[derive(Debug)]
pub struct ActionResult {
    /// Action index.
    pub index: usize,
    /// Action that was executed.
    pub action: PlannedAction,
    /// Whether the action succeeded.
    pub success: bool,
    /// Whether the action was skipped because a dependency failed.
    pub skipped: bool,
    /// Remote ID the action worked on.
    pub id: Option<String>,
    /// Error message (if failed).
    pub error: Option<String>,
}

/// Result of executing the entire plan.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Individual action results.
    pub results: Vec<ActionResult>,
    /// Total actions executed.
    pub total_executed: usize,
    /// Number of successful actions.
    pub successful: usize,
    /// Number of failed actions.
    pub failed: usize,
    /// Number of skipped actions (due to dependency failures).
    pub skipped: usize,
    /// Whether execution stopped on cancellation.
    pub cancelled: bool,
    /// Whether the entire plan succeeded.
    pub success: bool,
}

impl<'a, S> PlanExecutor<'a, S>
where
    S: FulfillmentBackend + ?Sized,
{
    /// Creates a new plan executor.
    #[must_use]
    pub fn new(service: &'a S, config: &'a OsacConfig) -> Self {
        Self {
            service,
            config,
            timeouts: config.provider.timeouts.to_timeouts(),
            cancel: CancelSignal::never(),
            continue_on_error: false,
        }
    }

    /// Sets the wait timings.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Sets the cancellation signal.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sets whether to continue on errors.
    #[must_use]
    pub const fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Executes a provisioning plan, recording progress in `state`.
    ///
    /// Action failures are reported in the result, not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if cancellation was requested before any action ran.
    pub async fn execute(
        &self,
        plan: &ProvisioningPlan,
        state: &mut ProvisioningState,
    ) -> Result<ExecutionResult> {
        info!("Executing plan with {} actions", plan.actions.len());

        if self.cancel.is_cancelled() {
            return Err(PlanError::Aborted {
                reason: String::from("Cancelled before any action ran"),
            }
            .into());
        }

        let mut results = Vec::new();
        let mut failed_indices: HashSet<usize> = HashSet::new();
        let mut cancelled = false;

        for (idx, action) in plan.actions.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("Cancelled, {} actions not started", plan.actions.len() - idx);
                cancelled = true;
                break;
            }

            if action.dependencies.iter().any(|dep| failed_indices.contains(dep)) {
                warn!("Skipping action {idx} due to failed dependencies");
                failed_indices.insert(idx);
                results.push(ActionResult {
                    index: idx,
                    action: action.clone(),
                    success: false,
                    skipped: true,
                    id: action.id.clone(),
                    error: Some(String::from("Skipped due to dependency failure")),
                });
                continue;
            }

            info!("Executing action {idx}: {}", action.description());

            let outcome = self.execute_action(action, state).await;
            let mut result = ActionResult {
                index: idx,
                action: action.clone(),
                success: outcome.is_ok(),
                skipped: false,
                id: action.id.clone(),
                error: None,
            };

            match outcome {
                Ok(id) => result.id = id,
                Err(e) => {
                    error!("Failed to {} {}: {e}", action.action_type, action.address());
                    failed_indices.insert(idx);
                    cancelled = e.is_cancelled();
                    if let Some(id) = e.provisioned_id() {
                        result.id = Some(id.to_string());
                    }
                    result.error = Some(e.to_string());
                }
            }

            let stop = !result.success && (cancelled || !self.continue_on_error);
            results.push(result);
            if stop {
                break;
            }
        }

        let successful = results.iter().filter(|r| r.success).count();
        let skipped = results.iter().filter(|r| r.skipped).count();
        let failed = results.len() - successful - skipped;

        let execution_result = ExecutionResult {
            total_executed: results.len(),
            successful,
            failed,
            skipped,
            cancelled,
            success: failed == 0 && skipped == 0 && !cancelled,
            results,
        };

        let addresses = plan.actions.iter().map(PlannedAction::address).collect();
        let history_entry = if execution_result.success {
            HistoryEntry::new(plan.operation, &plan.config_hash, addresses)
        } else {
            HistoryEntry::failed(
                plan.operation,
                &plan.config_hash,
                addresses,
                &execution_result.to_string(),
            )
        };
        state.add_history(history_entry);
        state.config_hash.clone_from(&plan.config_hash);

        Ok(execution_result)
    }

    async fn execute_action(
        &self,
        action: &PlannedAction,
        state: &mut ProvisioningState,
    ) -> Result<Option<String>> {
        match action.resource_type {
            ResourceType::Cluster => {
                self.execute_kind::<Cluster>(&self.config.clusters, action, state)
                    .await
            }
            ResourceType::ComputeInstance => {
                self.execute_kind::<ComputeInstance>(&self.config.compute_instances, action, state)
                    .await
            }
            ResourceType::Host => {
                self.execute_kind::<Host>(&self.config.hosts, action, state)
                    .await
            }
            ResourceType::HostPool => {
                self.execute_kind::<HostPool>(&self.config.host_pools, action, state)
                    .await
            }
        }
    }

    async fn execute_kind<K>(
        &self,
        declarations: &BTreeMap<String, K::Declaration>,
        action: &PlannedAction,
        state: &mut ProvisioningState,
    ) -> Result<Option<String>>
    where
        K: ResourceKind,
        S: ResourceService<K>,
    {
        let reconciler = ResourceReconciler::<K, S>::new(self.service)
            .with_timeouts(self.timeouts)
            .with_cancel(self.cancel.clone());
        let address = action.address();

        if action.action_type == ActionType::Delete {
            let Some(id) = action.id.as_deref() else {
                state.remove(&address);
                return Ok(None);
            };

            match reconciler.delete(id).await {
                Ok(()) => info!("Deleted {address} ({id})"),
                Err(e) if e.is_not_found() => info!("{address} ({id}) was already deleted"),
                Err(e) => return Err(e),
            }
            state.remove(&address);
            return Ok(Some(id.to_string()));
        }

        let declaration = declarations.get(&action.key).ok_or_else(|| {
            OsacError::internal(format!("No declaration found for {address}"))
        })?;

        let (record, outcome) = match (action.action_type, action.id.as_deref()) {
            (ActionType::Update, Some(id)) => {
                let record = state
                    .get(&address)
                    .cloned()
                    .unwrap_or_else(|| ResourceRecord::new(K::TYPE, &action.key, id));
                (Some(record), reconciler.update(id, declaration).await)
            }
            _ => (None, reconciler.create(declaration).await),
        };

        match outcome {
            Ok(object) => {
                let record =
                    record.unwrap_or_else(|| ResourceRecord::new(K::TYPE, &action.key, &object.id));
                let id = object.id.clone();
                record_ready::<K>(record, action, &object, state)?;
                Ok(Some(id))
            }
            Err(e) => {
                match (record, e.provisioned_id()) {
                    // An interrupted update leaves the previous record, so
                    // the next plan retries the update.
                    (Some(mut record), _) => {
                        if let Some(observed) = observed_state(&e) {
                            record.state = Some(observed);
                            state.set(record);
                        }
                    }
                    (None, Some(id)) => {
                        let record = ResourceRecord::new(K::TYPE, &action.key, id);
                        let mut record = with_action_hashes(record, action);
                        record.taint(observed_state(&e));
                        warn!("{address} ({id}) marked tainted");
                        state.set(record);
                    }
                    (None, None) => {}
                }
                Err(e)
            }
        }
    }
}

fn with_action_hashes(record: ResourceRecord, action: &PlannedAction) -> ResourceRecord {
    match &action.hash {
        Some(hash) => record.with_hashes(&hash.spec, &hash.replace),
        None => record,
    }
}

/// Records a ready object with its view as outputs.
fn record_ready<K: ResourceKind>(
    record: ResourceRecord,
    action: &PlannedAction,
    object: &Object<K>,
    state: &mut ProvisioningState,
) -> Result<()> {
    let mut record = with_action_hashes(record, action);
    let observed = object.state().map(str::to_string);

    let outputs = K::view(object).and_then(|view| {
        serde_json::to_value(view)
            .map_err(|e| StateError::serialization(format!("Failed to serialize view: {e}")).into())
    });

    match outputs {
        Ok(outputs) => {
            record.observe(observed, outputs);
            state.set(record);
            Ok(())
        }
        Err(e) => {
            record.observe(observed, serde_json::Value::Null);
            state.set(record);
            Err(e)
        }
    }
}

/// Returns the last state reported before a failed wait.
fn observed_state(error: &OsacError) -> Option<String> {
    match error {
        OsacError::Provision(
            ProvisionError::ResourceFailed { state, .. }
            | ProvisionError::UnexpectedState { state, .. },
        ) => Some(state.clone()),
        OsacError::Provision(ProvisionError::Timeout { last_state, .. }) => last_state.clone(),
        _ => None,
    }
}

impl ExecutionResult {
    /// Returns true if all actions succeeded.
    #[must_use]
    pub const fn all_successful(&self) -> bool {
        self.success
    }
}

impl std::fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Executed {} actions: {} successful, {} failed, {} skipped",
            self.total_executed, self.successful, self.failed, self.skipped
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
