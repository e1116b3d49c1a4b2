//! Generic resource reconciler.
//!
//! The reconciler turns declarations into fulfillment API calls and, for
//! kinds that converge asynchronously, waits until the remote side reports
//! the object ready.

use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{ApiError, Operation, ProvisionError, Result, UNASSIGNED_ID};
use crate::fulfillment::{ApiResult, Object, RemoteObject, ResourceService};
use crate::provision::{
    classify, wait_for_ready, CancelSignal, Classified, Observation, WaitConfig,
    DEFAULT_MIN_POLL_INTERVAL, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT,
};

use super::{Provisioning, ResourceKind};

/// Timings applied to creates and updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Time allowed for a create to become ready.
    pub create: Duration,
    /// Time allowed for an update to become ready.
    pub update: Duration,
    /// Delay between polls.
    pub poll_interval: Duration,
    /// Delay before the second poll.
    pub min_poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_TIMEOUT,
            update: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            min_poll_interval: DEFAULT_MIN_POLL_INTERVAL,
        }
    }
}

/// Drives one resource kind against a fulfillment service.
#[derive(Debug)]
pub struct ResourceReconciler<'a, K, S: ?Sized> {
    /// Fulfillment service.
    service: &'a S,
    /// Wait timings.
    timeouts: Timeouts,
    /// Cancellation signal raced against every call and sleep.
    cancel: CancelSignal,
    kind: PhantomData<fn() -> K>,
}

impl<'a, K, S> ResourceReconciler<'a, K, S>
where
    K: ResourceKind,
    S: ResourceService<K> + ?Sized,
{
    /// Creates a reconciler with default timings and no cancellation.
    #[must_use]
    pub fn new(service: &'a S) -> Self {
        Self {
            service,
            timeouts: Timeouts::default(),
            cancel: CancelSignal::never(),
            kind: PhantomData,
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

    /// Creates a resource and waits until it is ready.
    ///
    /// # Errors
    ///
    /// Returns an error if the declaration cannot be built, the create call
    /// fails, or the wait ends in failure, timeout or cancellation. Errors
    /// raised after the create was accepted carry the assigned ID.
    pub async fn create(&self, declaration: &K::Declaration) -> Result<Object<K>> {
        let (metadata, spec) = K::build(declaration)?;
        let object = RemoteObject::new(String::new(), metadata, spec);

        info!("Creating {}{}", K::NAME, describe(object.name()));

        let created = self
            .call(Operation::Create, UNASSIGNED_ID, self.service.create(&object))
            .await?;

        if created.id.is_empty() {
            return Err(ProvisionError::RemoteCallFailed {
                operation: Operation::Create,
                kind: K::NAME,
                id: UNASSIGNED_ID.to_string(),
                cause: ApiError::InvalidResponse {
                    message: String::from("No ID assigned to the created object"),
                },
            }
            .into());
        }

        info!("Created {} {}", K::NAME, created.id);
        self.settle(created, self.timeouts.create).await
    }

    /// Fetches a resource once, without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the get call fails or is cancelled.
    pub async fn read(&self, id: &str) -> Result<Object<K>> {
        self.call(Operation::Read, id, self.service.get(id)).await
    }

    /// Replaces the spec of a resource and waits until it is ready again.
    ///
    /// # Errors
    ///
    /// Returns an error if the declaration cannot be built, the update call
    /// fails, or the wait ends in failure, timeout or cancellation.
    pub async fn update(&self, id: &str, declaration: &K::Declaration) -> Result<Object<K>> {
        let (metadata, spec) = K::build(declaration)?;
        let object = RemoteObject::new(id, metadata, spec);

        info!("Updating {} {id}", K::NAME);

        let updated = self
            .call(Operation::Update, id, self.service.update(&object))
            .await?;

        self.settle(updated, self.timeouts.update).await
    }

    /// Requests deletion of a resource. Deletion is not awaited.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete call fails or is cancelled.
    pub async fn delete(&self, id: &str) -> Result<()> {
        info!("Deleting {} {id}", K::NAME);
        self.call(Operation::Delete, id, self.service.delete(id))
            .await
    }

    /// Fetches a resource and classifies its state.
    ///
    /// # Errors
    ///
    /// Returns an error if the get call fails or the resource reports its
    /// failure state.
    pub async fn refresh(&self, id: &str) -> Result<Observation<Object<K>>> {
        let object = self.read(id).await?;

        match classify(&K::STATES, object)? {
            Classified::Pending { object, label } => Ok(Observation::new(object, label)),
            Classified::Ready(object) => {
                let label = object.state().unwrap_or(K::STATES.unobserved).to_string();
                Ok(Observation::new(object, label))
            }
        }
    }

    /// Waits for an accepted object if the kind converges asynchronously.
    async fn settle(&self, object: Object<K>, timeout: Duration) -> Result<Object<K>> {
        match K::PROVISIONING {
            Provisioning::Synchronous => Ok(object),
            Provisioning::Asynchronous => self.await_ready(&object.id, timeout).await,
        }
    }

    async fn await_ready(&self, id: &str, timeout: Duration) -> Result<Object<K>> {
        let states = K::STATES;
        let pending = states.pending.iter().copied();
        let target = states.target.iter().copied();
        let config = WaitConfig::new(id, pending, target)
            .with_timeout(timeout)
            .with_poll_interval(self.timeouts.poll_interval)
            .with_min_poll_interval(self.timeouts.min_poll_interval);

        let outcome = wait_for_ready(config, &self.cancel, || self.refresh(id)).await?;

        info!(
            "{} {id} ready after {} polls ({:?})",
            K::NAME,
            outcome.attempts,
            outcome.elapsed
        );
        Ok(outcome.object)
    }

    /// Runs a remote call, racing it against cancellation.
    async fn call<T>(
        &self,
        operation: Operation,
        id: &str,
        request: impl Future<Output = ApiResult<T>>,
    ) -> Result<T> {
        debug!("{operation} {} {id}", K::NAME);

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                Err(ProvisionError::Cancelled { id: id.to_string() }.into())
            }
            result = request => result.map_err(|cause| {
                ProvisionError::RemoteCallFailed {
                    operation,
                    kind: K::NAME,
                    id: id.to_string(),
                    cause,
                }
                .into()
            }),
        }
    }
}

fn describe(name: Option<&str>) -> String {
    name.map(|n| format!(" '{n}'")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterDeclaration, ComputeInstanceDeclaration, HostDeclaration};
    use crate::error::OsacError;
    use crate::provision::CancelHandle;
    use crate::resources::testing::FakeFulfillment;
    use crate::resources::{Cluster, ComputeInstance, Host};

    fn fast() -> Timeouts {
        Timeouts {
            create: Duration::from_secs(60),
            update: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
            min_poll_interval: Duration::from_secs(1),
        }
    }

    fn cluster() -> ClusterDeclaration {
        ClusterDeclaration {
            name: Some("edge".to_string()),
            template: "ocp".to_string(),
            ..ClusterDeclaration::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_waits_until_ready() {
        let service = FakeFulfillment::new();
        service.script(
            "clusters",
            &["CLUSTER_STATE_PROGRESSING", "CLUSTER_STATE_PROGRESSING", "CLUSTER_STATE_READY"],
        );

        let reconciler = ResourceReconciler::<Cluster, _>::new(&service).with_timeouts(fast());
        let object = reconciler.create(&cluster()).await.unwrap();

        assert_eq!(object.id, "clusters-1");
        assert_eq!(object.state(), Some("CLUSTER_STATE_READY"));
        assert_eq!(object.name(), Some("edge"));
        assert_eq!(
            service.calls(),
            vec![
                "create clusters",
                "get clusters/clusters-1",
                "get clusters/clusters-1",
                "get clusters/clusters-1",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_reports_failure_with_id() {
        let service = FakeFulfillment::new();
        service.script("clusters", &["CLUSTER_STATE_FAILED"]);

        let reconciler = ResourceReconciler::<Cluster, _>::new(&service).with_timeouts(fast());
        let err = reconciler.create(&cluster()).await.unwrap_err();

        assert!(matches!(
            err,
            OsacError::Provision(ProvisionError::ResourceFailed { kind: "cluster", .. })
        ));
        assert_eq!(err.provisioned_id(), Some("clusters-1"));
        assert_eq!(service.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_status_keeps_waiting() {
        let service = FakeFulfillment::new();
        service.script("compute_instances", &["", "COMPUTE_INSTANCE_STATE_READY"]);

        let reconciler =
            ResourceReconciler::<ComputeInstance, _>::new(&service).with_timeouts(fast());
        let declaration = ComputeInstanceDeclaration {
            template: "small".to_string(),
            ..ComputeInstanceDeclaration::default()
        };

        let object = reconciler.create(&declaration).await.unwrap();
        assert_eq!(object.state(), Some("COMPUTE_INSTANCE_STATE_READY"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_without_status_reports_unobserved() {
        let service = FakeFulfillment::new();
        service.insert("clusters", "c-1", serde_json::json!({"id": "c-1"}));

        let reconciler = ResourceReconciler::<Cluster, _>::new(&service);
        let observation = reconciler.refresh("c-1").await.unwrap();

        assert_eq!(observation.label, "CLUSTER_STATE_UNSPECIFIED");
        assert_eq!(observation.object.id, "c-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_times_out() {
        let service = FakeFulfillment::new();
        service.script("clusters", &["CLUSTER_STATE_PROGRESSING"]);

        let timeouts = Timeouts {
            create: Duration::from_secs(5),
            ..fast()
        };
        let reconciler = ResourceReconciler::<Cluster, _>::new(&service).with_timeouts(timeouts);
        let err = reconciler.create(&cluster()).await.unwrap_err();

        match err {
            OsacError::Provision(ProvisionError::Timeout {
                ref id,
                ref last_state,
                elapsed,
            }) => {
                assert_eq!(id, "clusters-1");
                assert_eq!(last_state.as_deref(), Some("CLUSTER_STATE_PROGRESSING"));
                assert_eq!(elapsed, Duration::from_secs(5));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_call_failure_is_wrapped() {
        let service = FakeFulfillment::new();
        service.fail_next("clusters", "create", ApiError::request_failed(400, "bad template"));

        let reconciler = ResourceReconciler::<Cluster, _>::new(&service);
        let err = reconciler.create(&cluster()).await.unwrap_err();

        assert!(matches!(
            err,
            OsacError::Provision(ProvisionError::RemoteCallFailed {
                operation: Operation::Create,
                kind: "cluster",
                cause: ApiError::RequestFailed { status: 400, .. },
                ..
            })
        ));
        assert_eq!(err.provisioned_id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_create_does_not_poll() {
        let service = FakeFulfillment::new();
        let reconciler = ResourceReconciler::<Host, _>::new(&service);
        let declaration = HostDeclaration {
            name: None,
            power_state: Some("ON".to_string()),
        };

        let object = reconciler.create(&declaration).await.unwrap();

        assert_eq!(object.spec.unwrap().power_state, "HOST_POWER_STATE_ON");
        assert_eq!(service.calls(), vec!["create hosts"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_sends_full_spec_and_waits() {
        let service = FakeFulfillment::new();
        service.insert(
            "clusters",
            "c-1",
            serde_json::json!({"id": "c-1", "spec": {"template": "old"}}),
        );
        service.script("clusters", &["CLUSTER_STATE_PROGRESSING", "CLUSTER_STATE_READY"]);

        let reconciler = ResourceReconciler::<Cluster, _>::new(&service).with_timeouts(fast());
        let object = reconciler.update("c-1", &cluster()).await.unwrap();

        assert_eq!(object.spec.unwrap().template, "ocp");
        assert_eq!(
            service.stored("clusters", "c-1").unwrap()["spec"]["template"],
            "ocp"
        );
        assert_eq!(service.calls()[0], "update clusters/c-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_is_not_awaited() {
        let service = FakeFulfillment::new();
        service.insert("clusters", "c-1", serde_json::json!({"id": "c-1"}));

        let reconciler = ResourceReconciler::<Cluster, _>::new(&service);
        reconciler.delete("c-1").await.unwrap();

        assert_eq!(service.calls(), vec!["delete clusters/c-1"]);
        assert!(service.stored("clusters", "c-1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting() {
        let service = FakeFulfillment::new();
        service.script("clusters", &["CLUSTER_STATE_PROGRESSING"]);
        let handle = CancelHandle::new();

        let reconciler = ResourceReconciler::<Cluster, _>::new(&service)
            .with_timeouts(fast())
            .with_cancel(handle.signal());

        let declaration = cluster();
        let create = reconciler.create(&declaration);
        let canceller = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            handle.cancel();
        };
        let (result, ()) = tokio::join!(create, canceller);

        let err = result.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.provisioned_id(), Some("clusters-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_missing_object() {
        let service = FakeFulfillment::new();
        let reconciler = ResourceReconciler::<Cluster, _>::new(&service);

        let err = reconciler.read("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
