use std::time::Duration;

use thiserror::Error;

/// Delay applied before a create pass that hit a conflicting object is retried.
pub const CONFLICT_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperatorError {
    #[error("Invalid spec: {message}")]
    InvalidSpec { message: String },

    #[error("Field `{field}` is immutable and cannot be changed after creation")]
    ImmutableField { field: String },

    #[error("Secret {namespace}/{name} not found")]
    SecretNotFound { name: String, namespace: String },

    #[error("Key `{key}` not found in secret {namespace}/{name}")]
    SecretKeyNotFound {
        name: String,
        namespace: String,
        key: String,
    },

    #[error("{reason}, retrying in {}s", .delay.as_secs())]
    Retryable { reason: String, delay: Duration },

    #[error("SQL error: {message}")]
    SqlError { message: String },

    #[error("Kubernetes API error: {message}")]
    KubeApiError { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Internal server error: {message}")]
    InternalServerError { message: String },
}

impl OperatorError {
    pub fn retryable(reason: impl Into<String>) -> Self {
        OperatorError::Retryable {
            reason: reason.into(),
            delay: CONFLICT_RETRY_DELAY,
        }
    }

    /// Errors that only a change to the declared object can resolve.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperatorError::InvalidSpec { .. }
                | OperatorError::ImmutableField { .. }
                | OperatorError::SecretNotFound { .. }
                | OperatorError::SecretKeyNotFound { .. }
        )
    }

    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            OperatorError::Retryable { delay, .. } => Some(*delay),
            _ => None,
        }
    }
}
