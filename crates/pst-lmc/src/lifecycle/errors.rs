//! Errors surfaced by the lifecycle executor.

use std::io;

use thiserror::Error;

use crate::state::{HookError, State, StateError};

/// Errors returned by [`LifecycleExecutor`](super::LifecycleExecutor)
/// operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A configuration payload failed application validation.
    #[error("validation failed: {source}")]
    Validation {
        /// Validation failure reported by the application.
        #[source]
        source: HookError,
    },
    /// Command submission or state wait failed.
    #[error(transparent)]
    State(#[from] StateError),
    /// The control thread could not be spawned.
    #[error("failed to spawn {name} control thread: {source}")]
    Spawn {
        /// Application name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Best-effort shutdown stopped before reaching `Unknown`.
    #[error("shutdown stalled in state {state}")]
    ShutdownIncomplete {
        /// State the executor was left in.
        state: State,
    },
}

impl LifecycleError {
    /// Wraps a validation failure.
    pub fn validation(source: HookError) -> Self {
        Self::Validation { source }
    }

    /// Returns `true` for payload validation failures.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns the captured hook error when a lifecycle hook failed.
    #[must_use]
    pub fn hook_error(&self) -> Option<&HookError> {
        match self {
            Self::State(StateError::Runtime(error)) => Some(error),
            _ => None,
        }
    }
}
