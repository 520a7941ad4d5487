//! Lifecycle state model and the cross-thread state/command coordinator.
//!
//! A [`StateCoordinator`] owns the current [`State`], a single-slot
//! [`Command`] mailbox, and the most recent captured [`HookError`]. Callers
//! submit commands that the [`TransitionTable`] permits from the current
//! state, then block in [`StateCoordinator::wait_for_state`] until the
//! control thread reports the resulting state. A hook failure on the control
//! thread moves the coordinator to [`State::RuntimeError`] and is delivered
//! to exactly one waiter.

mod coordinator;
#[cfg(test)]
mod coordinator_tests;
mod errors;
mod model;
mod transition;

pub use self::coordinator::StateCoordinator;
pub use self::errors::{HookError, StateError};
pub use self::model::{Command, State};
pub use self::transition::TransitionTable;

pub(crate) const STATE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::state");
