//! Errors reported by lifecycle handlers.

use thiserror::Error;

use crate::lifecycle::LifecycleError;

/// Errors returned by [`LifecycleHandler`](super::LifecycleHandler)
/// implementations.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The request payload failed application validation.
    #[error("invalid configuration: {message}")]
    Validation {
        /// Validation failure description.
        message: String,
    },
    /// The underlying lifecycle executor failed.
    #[error(transparent)]
    Lifecycle(LifecycleError),
    /// Any other application failure.
    #[error("internal error: {message}")]
    Internal {
        /// Failure description.
        message: String,
    },
}

impl HandlerError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` when the failure was caused by the request payload.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

impl From<LifecycleError> for HandlerError {
    fn from(error: LifecycleError) -> Self {
        match error {
            LifecycleError::Validation { source } => Self::validation(source.message()),
            other => Self::Lifecycle(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::state::HookError;

    use super::*;

    #[test]
    fn lifecycle_validation_becomes_handler_validation() {
        let error = HandlerError::from(LifecycleError::validation(HookError::new(
            "BEAM_ID missing",
        )));
        assert!(error.is_validation());
        assert_eq!(error.to_string(), "invalid configuration: BEAM_ID missing");
    }
}
