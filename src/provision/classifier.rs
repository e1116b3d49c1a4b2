//! Provisioning state classification.
//!
//! Each resource kind reports a state label in its status. A [`StateTable`]
//! sorts the labels of one kind into pending, ready and failed buckets.

use tracing::warn;

use crate::error::ProvisionError;
use crate::fulfillment::{ObservedStatus, RemoteObject};

/// Bucket a state label falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBucket {
    /// Still converging.
    Pending,
    /// Reached the desired state.
    Ready,
    /// Terminal failure.
    Failed,
}

/// Static classification of the state labels of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTable {
    /// Kind name used in errors.
    pub kind: &'static str,
    /// Label used while no state has been reported.
    pub unobserved: &'static str,
    /// Labels that mean "keep waiting".
    pub pending: &'static [&'static str],
    /// Labels that mean "done".
    pub target: &'static [&'static str],
    /// Label that means "failed".
    pub failure: &'static str,
}

impl StateTable {
    /// Returns the bucket of a label. Unknown labels are pending.
    #[must_use]
    pub fn bucket(&self, label: &str) -> StateBucket {
        if label == self.failure {
            StateBucket::Failed
        } else if self.target.contains(&label) {
            StateBucket::Ready
        } else {
            StateBucket::Pending
        }
    }

    /// Returns true if the label is one of the enumerated states.
    #[must_use]
    pub fn is_known(&self, label: &str) -> bool {
        self.labels().any(|l| l == label)
    }

    /// Iterates over every enumerated label.
    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pending
            .iter()
            .chain(self.target.iter())
            .copied()
            .chain(std::iter::once(self.failure))
    }
}

/// Outcome of classifying a fetched object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified<O> {
    /// The object is still converging.
    Pending {
        /// The fetched object.
        object: O,
        /// Label to report to the poll engine.
        label: String,
    },
    /// The object is ready.
    Ready(O),
}

impl<O> Classified<O> {
    /// Returns true if the object is ready.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Classifies a fetched object.
///
/// A missing status or an empty state is reported as the table's unobserved
/// label. A state the table does not enumerate is also reported as
/// unobserved, so newer server states keep the wait going.
///
/// # Errors
///
/// Returns [`ProvisionError::ResourceFailed`] if the object reports the
/// failure state.
pub fn classify<S, T: ObservedStatus>(
    table: &StateTable,
    object: RemoteObject<S, T>,
) -> Result<Classified<RemoteObject<S, T>>, ProvisionError> {
    let Some(state) = object.state().map(str::to_string) else {
        return Ok(Classified::Pending {
            object,
            label: table.unobserved.to_string(),
        });
    };

    match table.bucket(&state) {
        StateBucket::Failed => Err(ProvisionError::ResourceFailed {
            kind: table.kind,
            id: object.id,
            state,
        }),
        StateBucket::Ready => Ok(Classified::Ready(object)),
        StateBucket::Pending if table.is_known(&state) => {
            Ok(Classified::Pending { object, label: state })
        }
        StateBucket::Pending => {
            warn!(
                "{} {} reported unrecognized state {state}, treating as pending",
                table.kind, object.id
            );
            Ok(Classified::Pending {
                object,
                label: table.unobserved.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fulfillment::{ClusterSpec, ClusterStatus};

    const TABLE: StateTable = StateTable {
        kind: "cluster",
        unobserved: "CLUSTER_STATE_UNSPECIFIED",
        pending: &["CLUSTER_STATE_UNSPECIFIED", "CLUSTER_STATE_PROGRESSING"],
        target: &["CLUSTER_STATE_READY"],
        failure: "CLUSTER_STATE_FAILED",
    };

    fn object(state: Option<&str>) -> RemoteObject<ClusterSpec, ClusterStatus> {
        RemoteObject {
            id: "c-1".to_string(),
            metadata: None,
            spec: None,
            status: state.map(|s| ClusterStatus {
                state: s.to_string(),
                ..ClusterStatus::default()
            }),
        }
    }

    #[test]
    fn test_bucket_is_total() {
        for label in TABLE.labels() {
            let bucket = TABLE.bucket(label);
            let expected = if TABLE.pending.contains(&label) {
                StateBucket::Pending
            } else if TABLE.target.contains(&label) {
                StateBucket::Ready
            } else {
                StateBucket::Failed
            };
            assert_eq!(bucket, expected, "{label}");
        }
    }

    #[test]
    fn test_missing_status_is_pending() {
        let classified = classify(&TABLE, object(None)).unwrap();
        assert!(matches!(
            classified,
            Classified::Pending { ref label, .. } if label == "CLUSTER_STATE_UNSPECIFIED"
        ));

        let classified = classify(&TABLE, object(Some(""))).unwrap();
        assert!(!classified.is_ready());
    }

    #[test]
    fn test_ready_and_pending() {
        assert!(classify(&TABLE, object(Some("CLUSTER_STATE_READY")))
            .unwrap()
            .is_ready());

        let classified = classify(&TABLE, object(Some("CLUSTER_STATE_PROGRESSING"))).unwrap();
        assert!(matches!(
            classified,
            Classified::Pending { ref label, .. } if label == "CLUSTER_STATE_PROGRESSING"
        ));
    }

    #[test]
    fn test_failure_state() {
        let err = classify(&TABLE, object(Some("CLUSTER_STATE_FAILED"))).unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::ResourceFailed { kind: "cluster", ref id, ref state }
                if id == "c-1" && state == "CLUSTER_STATE_FAILED"
        ));
    }

    #[test]
    fn test_unknown_state_is_pending() {
        let classified = classify(&TABLE, object(Some("CLUSTER_STATE_DEGRADED"))).unwrap();
        assert!(matches!(
            classified,
            Classified::Pending { ref label, .. } if label == "CLUSTER_STATE_UNSPECIFIED"
        ));
    }
}
