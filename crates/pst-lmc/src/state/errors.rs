//! Errors raised by the state coordinator and lifecycle hooks.

use std::any::Any;
use std::error::Error as StdError;

use thiserror::Error;

use super::{Command, State};

type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// Failure captured from a lifecycle hook.
///
/// Hooks that return `Err` and hooks that panic both end up as a
/// `HookError`. The coordinator stores it while the application sits in
/// [`State::RuntimeError`] and hands it to exactly one waiter.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HookError {
    message: String,
    #[source]
    source: Option<BoxedSource>,
}

impl HookError {
    /// Creates an error with a message and no source.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Converts a panic payload caught with `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|text| (*text).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| String::from("non-string panic payload"));
        Self::new(format!("hook panicked: {detail}"))
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors surfaced by [`StateCoordinator`](super::StateCoordinator).
#[derive(Debug, Error)]
pub enum StateError {
    /// The command is not legal from the current state.
    #[error("command {command} is not permitted in state {state}")]
    TransitionRejected {
        /// Rejected command.
        command: Command,
        /// State at submission time.
        state: State,
    },
    /// A previous command has not been consumed yet.
    #[error("cannot submit {command} while {pending} is still pending")]
    CommandPending {
        /// Command waiting in the mailbox.
        pending: Command,
        /// Command that was refused.
        command: Command,
    },
    /// The command does not take a configuration record.
    #[error("command {command} does not carry a configuration")]
    UnexpectedConfiguration {
        /// Offending command.
        command: Command,
    },
    /// The control thread has terminated.
    #[error("coordinator stopped; cannot submit {command}")]
    Stopped {
        /// Refused command.
        command: Command,
    },
    /// The transition table has no entry for the state.
    #[error("transition table has no entry for state {state}")]
    MissingTransitions {
        /// State without an entry.
        state: State,
    },
    /// A lifecycle hook failed while the caller was waiting.
    #[error("lifecycle hook failed: {0}")]
    Runtime(#[from] HookError),
    /// The application is in `RuntimeError` and its error was already
    /// delivered to another waiter.
    #[error("application is in RuntimeError while waiting for {required}")]
    RuntimeErrorState {
        /// State the caller was waiting for.
        required: State,
    },
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::panic;

    use super::*;

    #[test]
    fn keeps_source_chain() {
        let error = HookError::with_source(
            "attach failed",
            io::Error::new(io::ErrorKind::NotFound, "ring buffer"),
        );
        assert_eq!(error.to_string(), "attach failed");
        let source = StdError::source(&error).expect("source retained");
        assert_eq!(source.to_string(), "ring buffer");
    }

    #[test]
    fn converts_panic_payloads() {
        let payload = panic::catch_unwind(|| panic!("disk full")).expect_err("should panic");
        let error = HookError::from_panic(payload);
        assert_eq!(error.message(), "hook panicked: disk full");
    }

    #[test]
    fn runtime_error_wraps_hook_message() {
        let error = StateError::from(HookError::new("boom"));
        assert_eq!(error.to_string(), "lifecycle hook failed: boom");
    }
}
