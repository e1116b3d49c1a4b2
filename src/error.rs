//! Error types for the provisioning system.
//!
//! This module provides the error hierarchy for every layer of a provisioning
//! run: configuration, local state, the fulfillment transport, parameter
//! envelopes, the reconciliation engine and plan execution.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for the provisioning system.
#[derive(Debug, Error)]
pub enum OsacError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// State management errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Fulfillment API transport errors.
    #[error("Fulfillment API error: {0}")]
    Api(#[from] ApiError),

    /// Template parameter envelope errors.
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    /// Provisioning engine errors.
    #[error("Provisioning error: {0}")]
    Provision(#[from] ProvisionError),

    /// Plan execution errors.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },
}

/// State management errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Filesystem error while reading or writing state.
    #[error("State storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// State version mismatch.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state version.
        expected: String,
        /// Found state version.
        found: String,
    },
}

/// Fulfillment API transport errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Request failed: {status} - {message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Object not found.
    #[error("{collection}/{id} not found")]
    NotFound {
        /// Collection that was queried.
        collection: String,
        /// ID of the missing object.
        id: String,
    },

    /// Network error.
    #[error("Network error: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// Request body could not be serialized.
    #[error("Failed to serialize request: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },
}

/// Template parameter envelope errors.
#[derive(Debug, Error)]
pub enum ParameterError {
    /// A parameter value could not be wrapped into an envelope.
    #[error("Could not encode parameter '{name}': {message}")]
    Encoding {
        /// Parameter name.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// An envelope could not be unwrapped into a known value.
    #[error("Could not decode parameter '{name}': {message}")]
    Decoding {
        /// Parameter name.
        name: String,
        /// Description of the failure.
        message: String,
    },
}

/// Remote operation a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Create a new object.
    Create,
    /// Fetch an object by ID.
    Read,
    /// Replace the spec of an existing object.
    Update,
    /// Delete an object.
    Delete,
}

/// Provisioning engine errors.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A create/read/update/delete call against the fulfillment API failed.
    #[error("Failed to {operation} {kind} {id}: {cause}")]
    RemoteCallFailed {
        /// Operation that failed.
        operation: Operation,
        /// Resource kind.
        kind: &'static str,
        /// Resource ID (or a placeholder before one is assigned).
        id: String,
        /// Underlying transport error.
        #[source]
        cause: ApiError,
    },

    /// The remote side reported a terminal failure state.
    #[error("{kind} {id} reached failure state {state}")]
    ResourceFailed {
        /// Resource kind.
        kind: &'static str,
        /// Resource ID.
        id: String,
        /// Reported state.
        state: String,
    },

    /// A state outside of the pending and target sets was observed.
    #[error("Resource {id} reported unexpected state {state}")]
    UnexpectedState {
        /// Resource ID.
        id: String,
        /// Reported state.
        state: String,
    },

    /// The deadline passed while the resource was still pending.
    #[error(
        "Timed out after {elapsed:?} waiting for {id} to become ready (last state: {})",
        .last_state.as_deref().unwrap_or("none observed")
    )]
    Timeout {
        /// Resource ID.
        id: String,
        /// Last state observed before the deadline.
        last_state: Option<String>,
        /// Time spent waiting.
        elapsed: Duration,
    },

    /// The caller cancelled the operation.
    #[error("Operation on {id} was cancelled")]
    Cancelled {
        /// Resource ID (or a placeholder before one is assigned).
        id: String,
    },
}

/// Plan execution errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Execution was aborted before any action ran.
    #[error("Plan aborted: {reason}")]
    Aborted {
        /// Reason for the abort.
        reason: String,
    },

    /// Some planned actions failed.
    #[error("{failed} of {total} actions failed")]
    ActionsFailed {
        /// Number of failed actions.
        failed: usize,
        /// Number of attempted actions.
        total: usize,
    },
}

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, OsacError>;

/// Placeholder used as the resource ID before the remote side assigns one.
pub const UNASSIGNED_ID: &str = "(unassigned)";

impl OsacError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the ID of a remote object that exists even though the
    /// operation failed.
    ///
    /// A wait that ends in failure, timeout, cancellation or a failed refresh
    /// happens after the object was accepted, so the caller may want to keep
    /// the ID around.
    #[must_use]
    pub fn provisioned_id(&self) -> Option<&str> {
        let id = match self {
            Self::Provision(
                ProvisionError::ResourceFailed { id, .. }
                | ProvisionError::UnexpectedState { id, .. }
                | ProvisionError::Timeout { id, .. }
                | ProvisionError::Cancelled { id }
                | ProvisionError::RemoteCallFailed {
                    operation: Operation::Read,
                    id,
                    ..
                },
            ) => id.as_str(),
            _ => return None,
        };

        (!id.is_empty() && id != UNASSIGNED_ID).then_some(id)
    }

    /// Returns true if this error was caused by cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Provision(ProvisionError::Cancelled { .. }))
    }

    /// Returns true if the remote object does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Api(ApiError::NotFound { .. })
                | Self::Provision(ProvisionError::RemoteCallFailed {
                    cause: ApiError::NotFound { .. },
                    ..
                })
        )
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl StateError {
    /// Creates a storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl ApiError {
    /// Creates a request error.
    #[must_use]
    pub fn request_failed(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Returns true if retrying the same idempotent request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::NetworkError { .. })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{op}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisioned_id_for_wait_failures() {
        let err = OsacError::from(ProvisionError::Timeout {
            id: String::from("ci-1"),
            last_state: Some(String::from("COMPUTE_INSTANCE_STATE_PROGRESSING")),
            elapsed: Duration::from_secs(5),
        });
        assert_eq!(err.provisioned_id(), Some("ci-1"));

        let err = OsacError::from(ProvisionError::Cancelled {
            id: String::from(UNASSIGNED_ID),
        });
        assert_eq!(err.provisioned_id(), None);
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_remote_call_failure_has_no_provisioned_id() {
        let err = OsacError::from(ProvisionError::RemoteCallFailed {
            operation: Operation::Create,
            kind: "cluster",
            id: String::from(UNASSIGNED_ID),
            cause: ApiError::network("connection reset"),
        });
        assert_eq!(err.provisioned_id(), None);
        assert!(err.to_string().contains("create cluster"));

        let err = OsacError::from(ProvisionError::RemoteCallFailed {
            operation: Operation::Read,
            kind: "cluster",
            id: String::from("c-1"),
            cause: ApiError::network("connection reset"),
        });
        assert_eq!(err.provisioned_id(), Some("c-1"));
    }

    #[test]
    fn test_not_found_detection() {
        let err = OsacError::from(ProvisionError::RemoteCallFailed {
            operation: Operation::Delete,
            kind: "host",
            id: String::from("h-1"),
            cause: ApiError::NotFound {
                collection: String::from("hosts"),
                id: String::from("h-1"),
            },
        });
        assert!(err.is_not_found());
    }

    #[test]
    fn test_timeout_message_without_observation() {
        let err = ProvisionError::Timeout {
            id: String::from("c-1"),
            last_state: None,
            elapsed: Duration::from_millis(50),
        };
        assert!(err.to_string().contains("none observed"));
    }
}
