//! Cross-thread state and command coordination.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use pst_lmc_types::ConfigRecord;
use tracing::{debug, info, warn};

use super::{Command, HookError, STATE_TARGET, State, StateError, TransitionTable};

/// Owns the lifecycle state, the single-slot command mailbox, and the last
/// captured hook error.
///
/// State and command are guarded by independent lock and condition pairs.
/// Methods that need both always take the command lock first.
#[derive(Debug)]
pub struct StateCoordinator {
    table: Arc<TransitionTable>,
    state: Mutex<StateSlot>,
    state_changed: Condvar,
    command: Mutex<CommandSlot>,
    command_ready: Condvar,
}

#[derive(Debug, Default)]
struct StateSlot {
    current: State,
    previous: State,
    last_error: Option<HookError>,
    last_error_message: Option<String>,
    errors_captured: u64,
    beam: Option<ConfigRecord>,
    scan: Option<ConfigRecord>,
    start_scan: Option<ConfigRecord>,
}

impl StateSlot {
    fn enter(&mut self, next: State) -> State {
        let previous = self.current;
        self.previous = previous;
        self.current = next;
        if next != State::RuntimeError {
            self.last_error = None;
            self.last_error_message = None;
        }
        self.drop_released_configuration();
        previous
    }

    // Configuration is retained only while the state implies it.
    fn drop_released_configuration(&mut self) {
        match self.current {
            State::Unknown | State::Idle => {
                self.beam = None;
                self.scan = None;
                self.start_scan = None;
            }
            State::BeamConfigured => {
                self.scan = None;
                self.start_scan = None;
            }
            State::ScanConfigured => self.start_scan = None,
            State::Scanning | State::RuntimeError => {}
        }
    }

    fn store_configuration(&mut self, command: Command, config: ConfigRecord) {
        match command {
            Command::ConfigureBeam => self.beam = Some(config),
            Command::ConfigureScan => self.scan = Some(config),
            Command::StartScan => self.start_scan = Some(config),
            _ => {}
        }
    }
}

#[derive(Debug, Default)]
struct CommandSlot {
    pending: Option<Command>,
    closed: bool,
}

impl StateCoordinator {
    /// Creates a coordinator in [`State::Unknown`].
    #[must_use]
    pub fn new(table: Arc<TransitionTable>) -> Self {
        Self {
            table,
            state: Mutex::new(StateSlot::default()),
            state_changed: Condvar::new(),
            command: Mutex::new(CommandSlot::default()),
            command_ready: Condvar::new(),
        }
    }

    /// Submits a command for the control thread.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::TransitionRejected`] when the table does not
    /// permit the command from the current state,
    /// [`StateError::CommandPending`] when an earlier command has not been
    /// consumed, [`StateError::Stopped`] after [`close`](Self::close), and
    /// [`StateError::MissingTransitions`] when the current state has no
    /// table entry. A failed submission changes neither state nor mailbox.
    pub fn submit_command(&self, command: Command) -> Result<(), StateError> {
        self.submit(command, None)
    }

    /// Submits a configuration-carrying command together with its payload.
    ///
    /// The record is stored in the coordinator and retained while the
    /// resulting state implies it, so hooks and queries read the same copy.
    ///
    /// # Errors
    ///
    /// As for [`submit_command`](Self::submit_command), plus
    /// [`StateError::UnexpectedConfiguration`] when `command` takes no
    /// payload.
    pub fn submit_command_with(
        &self,
        command: Command,
        config: ConfigRecord,
    ) -> Result<(), StateError> {
        if !command.carries_configuration() {
            return Err(StateError::UnexpectedConfiguration { command });
        }
        self.submit(command, Some(config))
    }

    fn submit(&self, command: Command, config: Option<ConfigRecord>) -> Result<(), StateError> {
        let mut mailbox = self.lock_command();
        if mailbox.closed {
            return Err(StateError::Stopped { command });
        }
        if let Some(pending) = mailbox.pending {
            return Err(StateError::CommandPending { pending, command });
        }
        {
            let mut slot = self.lock_state();
            let state = slot.current;
            if !self.table.permits(state, command)? {
                warn!(
                    target: STATE_TARGET,
                    command = %command,
                    state = %state,
                    "command rejected by transition table"
                );
                return Err(StateError::TransitionRejected { command, state });
            }
            if let Some(config) = config {
                slot.store_configuration(command, config);
            }
        }
        debug!(target: STATE_TARGET, command = %command, "command submitted");
        mailbox.pending = Some(command);
        self.command_ready.notify_one();
        Ok(())
    }

    /// Blocks until a command is available and removes it from the mailbox.
    ///
    /// Returns `None` once the coordinator is closed and the mailbox is empty.
    pub fn take_command(&self) -> Option<Command> {
        let mut mailbox = self.lock_command();
        loop {
            if let Some(command) = mailbox.pending.take() {
                return Some(command);
            }
            if mailbox.closed {
                return None;
            }
            mailbox = self
                .command_ready
                .wait(mailbox)
                .unwrap_or_else(|poison| poison.into_inner());
        }
    }

    /// Command waiting in the mailbox, if any.
    #[must_use]
    pub fn pending_command(&self) -> Option<Command> {
        self.lock_command().pending
    }

    /// Stops accepting commands and wakes the control thread.
    pub fn close(&self) {
        let mut mailbox = self.lock_command();
        mailbox.closed = true;
        self.command_ready.notify_all();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock_command().closed
    }

    /// Sets the state and wakes every waiter.
    ///
    /// Leaving [`State::RuntimeError`] discards any uncollected hook error.
    pub fn set_state(&self, next: State) {
        let mut slot = self.lock_state();
        let previous = slot.enter(next);
        drop(slot);
        info!(
            target: STATE_TARGET,
            from = %previous,
            to = %next,
            "state changed"
        );
        self.state_changed.notify_all();
    }

    /// Moves from `from` to `to` only if no other thread changed the state in
    /// the meantime.
    ///
    /// Returns `false` when the state no longer equals `from`, for example
    /// because the scan thread reported a runtime error first.
    pub fn complete(&self, from: State, to: State) -> bool {
        let mut slot = self.lock_state();
        if slot.current != from {
            debug!(
                target: STATE_TARGET,
                expected = %from,
                actual = %slot.current,
                skipped = %to,
                "state changed concurrently; transition skipped"
            );
            return false;
        }
        slot.enter(to);
        drop(slot);
        info!(target: STATE_TARGET, from = %from, to = %to, "state changed");
        self.state_changed.notify_all();
        true
    }

    /// Captures a hook failure and moves to [`State::RuntimeError`].
    ///
    /// Any uncollected earlier error is overwritten.
    pub fn set_runtime_error(&self, error: HookError) {
        let mut slot = self.lock_state();
        warn!(
            target: STATE_TARGET,
            state = %slot.current,
            error = %error,
            "lifecycle hook failed"
        );
        slot.last_error_message = Some(error.message().to_owned());
        slot.last_error = Some(error);
        slot.errors_captured += 1;
        slot.enter(State::RuntimeError);
        drop(slot);
        self.state_changed.notify_all();
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> State {
        self.lock_state().current
    }

    /// State before the most recent transition.
    #[must_use]
    pub fn previous_state(&self) -> State {
        self.lock_state().previous
    }

    /// Number of hook errors captured since construction.
    ///
    /// Read before submitting a recovery command and pass the value to
    /// [`wait_for_recovery`](Self::wait_for_recovery).
    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.lock_state().errors_captured
    }

    /// Message of the captured error while in [`State::RuntimeError`].
    ///
    /// Reading the message does not consume the error.
    #[must_use]
    pub fn last_error_message(&self) -> Option<String> {
        self.lock_state().last_error_message.clone()
    }

    /// Stored beam configuration.
    #[must_use]
    pub fn beam_configuration(&self) -> Option<ConfigRecord> {
        self.lock_state().beam.clone()
    }

    /// Stored scan configuration.
    #[must_use]
    pub fn scan_configuration(&self) -> Option<ConfigRecord> {
        self.lock_state().scan.clone()
    }

    /// Stored start-scan request.
    #[must_use]
    pub fn start_scan_configuration(&self) -> Option<ConfigRecord> {
        self.lock_state().start_scan.clone()
    }

    /// Blocks until the state equals `required` or becomes
    /// [`State::RuntimeError`].
    ///
    /// # Errors
    ///
    /// When woken by `RuntimeError` while waiting for another state, returns
    /// [`StateError::Runtime`] carrying the captured hook error the first
    /// time and [`StateError::RuntimeErrorState`] on later calls.
    pub fn wait_for_state(&self, required: State) -> Result<(), StateError> {
        let mut slot = self.lock_state();
        loop {
            if slot.current == required {
                return Ok(());
            }
            if slot.current == State::RuntimeError {
                return Err(match slot.last_error.take() {
                    Some(error) => StateError::Runtime(error),
                    None => StateError::RuntimeErrorState { required },
                });
            }
            slot = self.wait_state(slot);
        }
    }

    /// Blocks until the state equals `required`, ignoring the runtime error
    /// being recovered from.
    ///
    /// `seen` is the [`error_count`](Self::error_count) observed before the
    /// recovery command was submitted. Only an error captured after that
    /// point ends the wait early.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Runtime`] with the new error when recovery
    /// itself fails, or [`StateError::RuntimeErrorState`] when another
    /// waiter already collected it.
    pub fn wait_for_recovery(&self, required: State, seen: u64) -> Result<(), StateError> {
        let mut slot = self.lock_state();
        loop {
            if slot.current == required {
                return Ok(());
            }
            if slot.current == State::RuntimeError && slot.errors_captured > seen {
                return Err(match slot.last_error.take() {
                    Some(error) => StateError::Runtime(error),
                    None => StateError::RuntimeErrorState { required },
                });
            }
            slot = self.wait_state(slot);
        }
    }

    /// Waits up to `timeout` for the state to equal `required`.
    pub fn wait_for_state_timeout(&self, required: State, timeout: Duration) -> bool {
        self.wait_until(timeout, |state| state == required)
    }

    /// Waits up to `timeout` for the state to differ from `state`.
    pub fn wait_for_not_state_timeout(&self, state: State, timeout: Duration) -> bool {
        self.wait_until(timeout, |current| current != state)
    }

    fn wait_until(&self, timeout: Duration, done: impl Fn(State) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock_state();
        loop {
            if done(slot.current) {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            slot = self
                .state_changed
                .wait_timeout(slot, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poison| poison.into_inner().0);
        }
    }

    fn wait_state<'a>(&self, slot: MutexGuard<'a, StateSlot>) -> MutexGuard<'a, StateSlot> {
        self.state_changed
            .wait(slot)
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn lock_state(&self) -> MutexGuard<'_, StateSlot> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn lock_command(&self) -> MutexGuard<'_, CommandSlot> {
        self.command
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}
