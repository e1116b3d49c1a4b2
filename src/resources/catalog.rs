//! Catalog lookups.
//!
//! Templates and host classes are read-only: they are only ever fetched by
//! ID to resolve what a declaration refers to.

use tracing::debug;

use crate::error::{Operation, ProvisionError, Result};
use crate::fulfillment::{CatalogEntry, CatalogKind, CatalogService};
use crate::provision::CancelSignal;

/// Fetches catalog entries.
pub struct CatalogReader<'a, C: ?Sized> {
    service: &'a C,
    cancel: CancelSignal,
}

impl<'a, C: CatalogService + ?Sized> CatalogReader<'a, C> {
    /// Creates a reader without cancellation.
    #[must_use]
    pub fn new(service: &'a C) -> Self {
        Self {
            service,
            cancel: CancelSignal::never(),
        }
    }

    /// Sets the cancellation signal.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fetches a catalog entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or is cancelled.
    pub async fn lookup(&self, kind: CatalogKind, id: &str) -> Result<CatalogEntry> {
        debug!("Looking up {kind} {id}");

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                Err(ProvisionError::Cancelled { id: id.to_string() }.into())
            }
            result = self.service.get_entry(kind, id) => result.map_err(|cause| {
                ProvisionError::RemoteCallFailed {
                    operation: Operation::Read,
                    kind: kind.name(),
                    id: id.to_string(),
                    cause,
                }
                .into()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, OsacError};
    use crate::fulfillment::MockCatalogService;
    use crate::provision::CancelHandle;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_lookup_template() {
        let mut service = MockCatalogService::new();
        service
            .expect_get_entry()
            .with(eq(CatalogKind::ClusterTemplate), eq("ocp_4_17_small"))
            .times(1)
            .returning(|_, id| {
                Ok(CatalogEntry {
                    id: id.to_string(),
                    title: "OpenShift 4.17 small".to_string(),
                    description: "Three node cluster".to_string(),
                })
            });

        let reader = CatalogReader::new(&service);
        let entry = reader
            .lookup(CatalogKind::ClusterTemplate, "ocp_4_17_small")
            .await
            .unwrap();

        assert_eq!(entry.id, "ocp_4_17_small");
        assert_eq!(entry.title, "OpenShift 4.17 small");
    }

    #[tokio::test]
    async fn test_lookup_missing_host_class() {
        let mut service = MockCatalogService::new();
        service.expect_get_entry().returning(|kind, id| {
            Err(ApiError::NotFound {
                collection: kind.collection().to_string(),
                id: id.to_string(),
            })
        });

        let reader = CatalogReader::new(&service);
        let err = reader.lookup(CatalogKind::HostClass, "tiny").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(matches!(
            err,
            OsacError::Provision(ProvisionError::RemoteCallFailed { kind: "host class", .. })
        ));
    }

    #[tokio::test]
    async fn test_lookup_cancelled() {
        let mut service = MockCatalogService::new();
        service.expect_get_entry().never();

        let handle = CancelHandle::new();
        handle.cancel();
        let reader = CatalogReader::new(&service).with_cancel(handle.signal());

        let err = reader
            .lookup(CatalogKind::ComputeInstanceTemplate, "small")
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
