//! Table of commands permitted from each lifecycle state.

use std::collections::{BTreeMap, BTreeSet};

use super::{Command, State, StateError};

/// Immutable mapping from [`State`] to the commands legal in that state.
///
/// Build one table at startup and share it between coordinators with an
/// `Arc`. A state without an entry is a configuration error, reported as
/// [`StateError::MissingTransitions`] rather than treated as "no commands".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    entries: BTreeMap<State, BTreeSet<Command>>,
}

impl TransitionTable {
    /// The canonical application lifecycle.
    #[must_use]
    pub fn standard() -> Self {
        Self::empty()
            .with(State::Unknown, [Command::Initialise])
            .with(State::Idle, [Command::ConfigureBeam, Command::Terminate])
            .with(
                State::BeamConfigured,
                [Command::ConfigureScan, Command::DeconfigureBeam],
            )
            .with(
                State::ScanConfigured,
                [Command::StartScan, Command::DeconfigureScan],
            )
            .with(State::Scanning, [Command::StopScan])
            .with(State::RuntimeError, [Command::Reset])
    }

    /// A table with no entries.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Replaces the entry for `state`.
    #[must_use]
    pub fn with(mut self, state: State, commands: impl IntoIterator<Item = Command>) -> Self {
        self.entries.insert(state, commands.into_iter().collect());
        self
    }

    /// Commands legal from `state`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::MissingTransitions`] when the table has no entry
    /// for `state`.
    pub fn allowed(&self, state: State) -> Result<&BTreeSet<Command>, StateError> {
        self.entries
            .get(&state)
            .ok_or(StateError::MissingTransitions { state })
    }

    /// Returns whether `command` is legal from `state`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::MissingTransitions`] when the table has no entry
    /// for `state`.
    pub fn permits(&self, state: State, command: Command) -> Result<bool, StateError> {
        Ok(self.allowed(state)?.contains(&command))
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::standard()
    }
}
