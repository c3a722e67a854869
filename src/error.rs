//! Error types for the resource lifecycle orchestrator.
//!
//! This module provides the error hierarchy for every stage of a run:
//! configuration, planning, provider calls and node state transitions.
//! [`ErrorKind`] is the coarse classification the orchestrator reasons about.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the lifecycle orchestrator.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Provider adapter errors.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// An operation was attempted on a node in the wrong lifecycle state.
    #[error("Cannot {operation} '{node}' while it is {state}")]
    InvalidState {
        /// Node name.
        node: String,
        /// Current state of the node.
        state: String,
        /// The rejected operation.
        operation: String,
    },

    /// The run was cancelled between node operations.
    #[error("Run cancelled before '{next}'")]
    Cancelled {
        /// The node that would have been processed next.
        next: String,
    },

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

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// An update tried to change an option that is fixed at creation.
    #[error("Option '{option}' of '{resource}' cannot be changed after creation")]
    ImmutableOption {
        /// Resource name.
        resource: String,
        /// The immutable option.
        option: String,
    },
}

/// Errors returned by a provider adapter.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network failure talking to the management API.
    #[error("Network error: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// The provider throttled the request.
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The provider reported a server-side failure.
    #[error("Provider request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code (or simulated equivalent).
        status: u16,
        /// Error message from the provider.
        message: String,
    },

    /// The provider rejected the request as invalid.
    #[error("Provider rejected {kind} '{name}': {message}")]
    Rejected {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
        /// Reason given by the provider.
        message: String,
    },

    /// Credentials were missing or refused.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// The resource does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
    },

    /// The long-running operation did not complete in time.
    #[error("Timeout waiting for {kind} '{name}' to finish provisioning")]
    Timeout {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
    },

    /// The provider returned a response the adapter cannot interpret.
    #[error("Invalid response from provider: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// A create was accepted but never confirmed complete.
    #[error("{kind} '{name}' was accepted but not confirmed: {source}")]
    Unconfirmed {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
        /// The failure seen after the provider accepted the request.
        #[source]
        source: Box<ProviderError>,
    },
}

/// Planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A resource references a parent that is not part of the plan.
    #[error("Resource '{name}' references unknown parent '{parent}'")]
    UnknownParent {
        /// Resource name.
        name: String,
        /// Missing parent name.
        parent: String,
    },

    /// Two resources share the same name.
    #[error("Duplicate resource name: {name}")]
    DuplicateName {
        /// The duplicated name.
        name: String,
    },

    /// Circular dependency detected.
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency {
        /// Description of the cycle.
        cycle: String,
    },

    /// A node name was looked up but is not part of the plan.
    #[error("Resource '{name}' is not part of the plan")]
    UnknownNode {
        /// The missing name.
        name: String,
    },
}

/// Coarse error classification used by the orchestrator and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network or throttling failure; may be retried by the adapter layer.
    TransientProvider,
    /// Invalid or missing option; fatal, never retried.
    Configuration,
    /// Operation attempted on a node in the wrong state.
    InvalidState,
    /// The resource is already gone; success during cleanup.
    AlreadyDeleted,
    /// The run was cancelled.
    Cancelled,
    /// Anything else.
    Internal,
}

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

impl LifecycleError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates an invalid state error.
    #[must_use]
    pub fn invalid_state(
        node: impl Into<String>,
        state: impl std::fmt::Display,
        operation: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            node: node.into(),
            state: state.to_string(),
            operation: operation.into(),
        }
    }

    /// Classifies this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Plan(_) => ErrorKind::Configuration,
            Self::Provider(e) => e.kind(),
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Io(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl ProviderError {
    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(kind: impl std::fmt::Display, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            name: name.into(),
        }
    }

    /// Wraps a failure seen after the provider accepted a create.
    ///
    /// Timeouts already imply an accepted request and are returned as is.
    #[must_use]
    pub fn unconfirmed(
        kind: impl std::fmt::Display,
        name: impl Into<String>,
        source: Self,
    ) -> Self {
        match source {
            Self::Timeout { .. } | Self::Unconfirmed { .. } => source,
            other => Self::Unconfirmed {
                kind: kind.to_string(),
                name: name.into(),
                source: Box::new(other),
            },
        }
    }

    /// Classifies this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } | Self::RateLimited { .. } | Self::Timeout { .. } => {
                ErrorKind::TransientProvider
            }
            Self::ApiRequestFailed { status, .. } => {
                if *status >= 500 {
                    ErrorKind::TransientProvider
                } else {
                    ErrorKind::Configuration
                }
            }
            Self::Rejected { .. } | Self::AuthenticationFailed { .. } => ErrorKind::Configuration,
            Self::NotFound { .. } => ErrorKind::AlreadyDeleted,
            Self::InvalidResponse { .. } => ErrorKind::Internal,
            Self::Unconfirmed { source, .. } => source.kind(),
        }
    }

    /// Returns true if the adapter may retry the request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimited { .. } => true,
            Self::ApiRequestFailed { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            Self::Network { .. } | Self::ApiRequestFailed { .. } => Some(1),
            _ => None,
        }
    }

    /// Returns true if a failed create may still have left the resource behind.
    #[must_use]
    pub const fn may_have_created(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unconfirmed { .. })
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

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TransientProvider => "transient provider error",
            Self::Configuration => "configuration error",
            Self::InvalidState => "invalid state",
            Self::AlreadyDeleted => "already deleted",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal error",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_classification() {
        assert_eq!(
            ProviderError::network("reset").kind(),
            ErrorKind::TransientProvider
        );
        assert_eq!(
            ProviderError::api_error(503, "busy").kind(),
            ErrorKind::TransientProvider
        );
        assert_eq!(
            ProviderError::api_error(400, "bad sku").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            ProviderError::not_found("queue", "q1").kind(),
            ErrorKind::AlreadyDeleted
        );
    }

    #[test]
    fn test_retryable() {
        assert!(ProviderError::RateLimited { retry_after_secs: 3 }.is_retryable());
        assert!(!ProviderError::not_found("queue", "q1").is_retryable());
        assert_eq!(
            ProviderError::RateLimited { retry_after_secs: 3 }.retry_delay_secs(),
            Some(3)
        );
    }

    #[test]
    fn test_unconfirmed_keeps_inner_kind() {
        let err = ProviderError::unconfirmed("queue", "q1", ProviderError::api_error(500, ""));
        assert!(err.may_have_created());
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::TransientProvider);

        let timeout = ProviderError::Timeout {
            kind: String::from("queue"),
            name: String::from("q1"),
        };
        let err = ProviderError::unconfirmed("queue", "q1", timeout);
        assert!(matches!(err, ProviderError::Timeout { .. }));
    }

    #[test]
    fn test_lifecycle_error_kind() {
        let err = LifecycleError::invalid_state("q1", "pending", "update");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(err.to_string(), "Cannot update 'q1' while it is pending");

        let err = LifecycleError::from(ConfigError::validation_general("bad"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
