//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur while validating client-supplied values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Username failed validation during the handshake
    #[error("Invalid username: {reason}")]
    InvalidUsername { reason: String },

    /// Channel name failed validation on `/join`
    #[error("{reason}")]
    InvalidChannelName { reason: String },
}

impl DomainError {
    pub(crate) fn username(reason: impl Into<String>) -> Self {
        Self::InvalidUsername {
            reason: reason.into(),
        }
    }

    pub(crate) fn channel(reason: impl Into<String>) -> Self {
        Self::InvalidChannelName {
            reason: reason.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
