//! Control thread, scan thread, and the blocking lifecycle API.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pst_lmc_types::{ConfigRecord, Environment, MonitorData};
use tracing::{debug, info, warn};

use crate::state::{Command, HookError, State, StateCoordinator, TransitionTable};

use super::shutdown::QUIT_SEQUENCE;
use super::{HookResult, LIFECYCLE_TARGET, LifecycleError, LifecycleHooks};

const SCAN_ID_KEY: &str = "SCAN_ID";

/// Drives an application through its lifecycle on a dedicated control
/// thread.
///
/// Dropping the executor runs [`quit`](Self::quit), so teardown is safe from
/// any state.
pub struct LifecycleExecutor {
    shared: Arc<Shared>,
    control: Mutex<Option<JoinHandle<()>>>,
    shutdown_timeout: Duration,
}

struct Shared {
    name: String,
    coordinator: StateCoordinator,
    hooks: Arc<dyn LifecycleHooks>,
    scan: Mutex<Option<JoinHandle<()>>>,
}

impl LifecycleExecutor {
    /// Spawns the control thread. The executor starts in [`State::Unknown`];
    /// call [`initialise`](Self::initialise) to reach `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Spawn`] when the control thread cannot be
    /// created.
    pub fn spawn(
        name: impl Into<String>,
        hooks: Arc<dyn LifecycleHooks>,
        table: Arc<TransitionTable>,
    ) -> Result<Self, LifecycleError> {
        let name = name.into();
        let shared = Arc::new(Shared {
            name: name.clone(),
            coordinator: StateCoordinator::new(table),
            hooks,
            scan: Mutex::new(None),
        });
        let worker = Arc::clone(&shared);
        let control = thread::Builder::new()
            .name(format!("{name}-control"))
            .spawn(move || worker.run_control_loop())
            .map_err(|source| LifecycleError::Spawn { name, source })?;
        Ok(Self {
            shared,
            control: Mutex::new(Some(control)),
            shutdown_timeout: pst_config::default_shutdown_timeout(),
        })
    }

    /// Sets the per-step bound used by [`quit`](Self::quit).
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Application name used for thread names and logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Coordinator shared with the control thread.
    #[must_use]
    pub fn coordinator(&self) -> &StateCoordinator {
        &self.shared.coordinator
    }

    /// Moves from `Unknown` to `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::State`] when the command is rejected or the
    /// hook fails.
    pub fn initialise(&self) -> Result<(), LifecycleError> {
        self.run(Command::Initialise, None)
    }

    /// Validates a beam configuration without submitting it.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Validation`] when the application rejects
    /// the payload.
    pub fn validate_configure_beam(&self, config: &ConfigRecord) -> Result<(), LifecycleError> {
        guarded(|| self.shared.hooks.validate_configure_beam(config))
            .map_err(LifecycleError::validation)
    }

    /// Validates a scan configuration without submitting it.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Validation`] when the application rejects
    /// the payload.
    pub fn validate_configure_scan(&self, config: &ConfigRecord) -> Result<(), LifecycleError> {
        guarded(|| self.shared.hooks.validate_configure_scan(config))
            .map_err(LifecycleError::validation)
    }

    /// Validates a start-scan request without submitting it.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Validation`] when the application rejects
    /// the payload.
    pub fn validate_start_scan(&self, request: &ConfigRecord) -> Result<(), LifecycleError> {
        guarded(|| self.shared.hooks.validate_start_scan(request))
            .map_err(LifecycleError::validation)
    }

    /// Validates and applies a beam configuration, blocking until
    /// `BeamConfigured`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Validation`] before submission, or
    /// [`LifecycleError::State`] when the command is rejected or the hook
    /// fails.
    pub fn configure_beam(&self, config: &ConfigRecord) -> Result<(), LifecycleError> {
        self.validate_configure_beam(config)?;
        self.run(Command::ConfigureBeam, Some(config.clone()))
    }

    /// Validates and applies a scan configuration, blocking until
    /// `ScanConfigured`.
    ///
    /// # Errors
    ///
    /// As for [`configure_beam`](Self::configure_beam).
    pub fn configure_scan(&self, config: &ConfigRecord) -> Result<(), LifecycleError> {
        self.validate_configure_scan(config)?;
        self.run(Command::ConfigureScan, Some(config.clone()))
    }

    /// Starts scanning, blocking until `Scanning`.
    ///
    /// # Errors
    ///
    /// As for [`configure_beam`](Self::configure_beam).
    pub fn start_scan(&self, request: &ConfigRecord) -> Result<(), LifecycleError> {
        self.validate_start_scan(request)?;
        self.run(Command::StartScan, Some(request.clone()))
    }

    /// Stops scanning and joins the scan thread, blocking until
    /// `ScanConfigured`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::State`] when the command is rejected or the
    /// hook fails.
    pub fn stop_scan(&self) -> Result<(), LifecycleError> {
        self.run(Command::StopScan, None)
    }

    /// Clears the scan configuration, blocking until `BeamConfigured`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::State`] when the command is rejected or the
    /// hook fails.
    pub fn deconfigure_scan(&self) -> Result<(), LifecycleError> {
        self.run(Command::DeconfigureScan, None)
    }

    /// Releases beam resources, blocking until `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::State`] when the command is rejected or the
    /// hook fails.
    pub fn deconfigure_beam(&self) -> Result<(), LifecycleError> {
        self.run(Command::DeconfigureBeam, None)
    }

    /// Recovers from `RuntimeError`, blocking until `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::State`] when the executor is not in
    /// `RuntimeError`, or when the reset hook fails and the executor stays
    /// in `RuntimeError`.
    pub fn reset(&self) -> Result<(), LifecycleError> {
        let coordinator = &self.shared.coordinator;
        let seen = coordinator.error_count();
        coordinator.submit_command(Command::Reset)?;
        coordinator.wait_for_recovery(State::Idle, seen)?;
        Ok(())
    }

    /// Records an externally detected failure and moves to `RuntimeError`.
    pub fn go_to_runtime_error(&self, error: HookError) {
        self.shared.coordinator.set_runtime_error(error);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> State {
        self.shared.coordinator.state()
    }

    /// State before the most recent transition.
    #[must_use]
    pub fn previous_state(&self) -> State {
        self.shared.coordinator.previous_state()
    }

    /// Returns `true` while beam resources are held.
    #[must_use]
    pub fn is_beam_configured(&self) -> bool {
        self.state().holds_beam()
    }

    /// Returns `true` while a scan configuration is held.
    #[must_use]
    pub fn is_scan_configured(&self) -> bool {
        self.state().holds_scan()
    }

    /// Returns `true` while scanning.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.state() == State::Scanning
    }

    /// Active beam configuration.
    #[must_use]
    pub fn beam_configuration(&self) -> Option<ConfigRecord> {
        self.shared.coordinator.beam_configuration()
    }

    /// Active scan configuration.
    #[must_use]
    pub fn scan_configuration(&self) -> Option<ConfigRecord> {
        self.shared.coordinator.scan_configuration()
    }

    /// Active start-scan request.
    #[must_use]
    pub fn start_scan_configuration(&self) -> Option<ConfigRecord> {
        self.shared.coordinator.start_scan_configuration()
    }

    /// `SCAN_ID` of the active start-scan request.
    #[must_use]
    pub fn scan_id(&self) -> Option<u64> {
        self.start_scan_configuration()
            .and_then(|request| request.get::<u64>(SCAN_ID_KEY).ok())
    }

    /// Message of the captured error while in `RuntimeError`.
    #[must_use]
    pub fn application_error(&self) -> Option<String> {
        self.shared.coordinator.last_error_message()
    }

    /// Latest monitoring sample from the application.
    #[must_use]
    pub fn monitor_data(&self) -> MonitorData {
        self.shared.hooks.monitor_data()
    }

    /// Application environment description.
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.shared.hooks.environment()
    }

    /// Walks back to `Unknown` and joins the control thread.
    ///
    /// Each step waits at most the configured shutdown timeout. When a step
    /// stalls the control thread is left detached rather than joined.
    /// Calling `quit` again after it has returned is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ShutdownIncomplete`] when a step stalls or
    /// the walk ends outside `Unknown`, and [`LifecycleError::State`] when a
    /// step cannot be submitted.
    pub fn quit(&self) -> Result<(), LifecycleError> {
        let Some(control) = self.lock_control().take() else {
            return Ok(());
        };
        let coordinator = &self.shared.coordinator;
        for (state, command) in QUIT_SEQUENCE {
            if coordinator.state() != state {
                continue;
            }
            debug!(
                target: LIFECYCLE_TARGET,
                application = %self.shared.name,
                state = %state,
                command = %command,
                "quit step"
            );
            if let Err(error) = coordinator.submit_command(command) {
                coordinator.close();
                return Err(error.into());
            }
            if !coordinator.wait_for_not_state_timeout(state, self.shutdown_timeout) {
                coordinator.close();
                warn!(
                    target: LIFECYCLE_TARGET,
                    application = %self.shared.name,
                    state = %state,
                    timeout_ms = self.shutdown_timeout.as_millis(),
                    "quit step timed out; control thread left detached"
                );
                return Err(LifecycleError::ShutdownIncomplete { state });
            }
        }

        coordinator.close();
        if control.join().is_err() {
            warn!(
                target: LIFECYCLE_TARGET,
                application = %self.shared.name,
                "control thread panicked"
            );
        }
        match coordinator.state() {
            State::Unknown => Ok(()),
            state => Err(LifecycleError::ShutdownIncomplete { state }),
        }
    }

    fn run(&self, command: Command, config: Option<ConfigRecord>) -> Result<(), LifecycleError> {
        let coordinator = &self.shared.coordinator;
        match config {
            Some(config) => coordinator.submit_command_with(command, config)?,
            None => coordinator.submit_command(command)?,
        }
        coordinator.wait_for_state(command.resulting_state())?;
        Ok(())
    }

    fn lock_control(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.control
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Drop for LifecycleExecutor {
    fn drop(&mut self) {
        if let Err(error) = self.quit() {
            warn!(
                target: LIFECYCLE_TARGET,
                application = %self.shared.name,
                %error,
                "executor shutdown incomplete"
            );
        }
    }
}

impl Shared {
    fn run_control_loop(self: Arc<Self>) {
        info!(
            target: LIFECYCLE_TARGET,
            application = %self.name,
            "control thread started"
        );
        while let Some(command) = self.coordinator.take_command() {
            let from = self.coordinator.state();
            debug!(
                target: LIFECYCLE_TARGET,
                application = %self.name,
                command = %command,
                state = %from,
                "executing command"
            );
            match self.execute(command) {
                Ok(()) => {
                    self.coordinator.complete(from, command.resulting_state());
                }
                Err(error) => self.coordinator.set_runtime_error(error),
            }
            if command == Command::Terminate && self.coordinator.state() == State::Unknown {
                self.coordinator.close();
            }
        }
        info!(
            target: LIFECYCLE_TARGET,
            application = %self.name,
            "control thread stopped"
        );
    }

    fn execute(self: &Arc<Self>, command: Command) -> HookResult {
        let hooks = &self.hooks;
        match command {
            Command::Initialise => guarded(|| hooks.perform_initialise()),
            Command::ConfigureBeam => {
                let config = stored(self.coordinator.beam_configuration(), "beam configuration")?;
                guarded(|| hooks.perform_configure_beam(&config))
            }
            Command::ConfigureScan => {
                let config = stored(self.coordinator.scan_configuration(), "scan configuration")?;
                guarded(|| hooks.perform_configure_scan(&config))
            }
            Command::StartScan => {
                let request = stored(
                    self.coordinator.start_scan_configuration(),
                    "start-scan request",
                )?;
                guarded(|| hooks.perform_start_scan(&request))?;
                self.spawn_scan_thread()
            }
            Command::StopScan => {
                guarded(|| hooks.perform_stop_scan())?;
                self.join_scan_thread();
                Ok(())
            }
            Command::DeconfigureScan => guarded(|| hooks.perform_deconfigure_scan()),
            Command::DeconfigureBeam => guarded(|| hooks.perform_deconfigure_beam()),
            Command::Reset => {
                self.halt_scan_thread();
                guarded(|| hooks.perform_reset())
            }
            Command::Terminate => {
                self.halt_scan_thread();
                guarded(|| hooks.perform_terminate())
            }
        }
    }

    fn spawn_scan_thread(self: &Arc<Self>) -> HookResult {
        let worker = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(format!("{}-scan", self.name))
            .spawn(move || {
                debug!(
                    target: LIFECYCLE_TARGET,
                    application = %worker.name,
                    "scan thread started"
                );
                if let Err(error) = guarded(|| worker.hooks.perform_scan()) {
                    worker.coordinator.set_runtime_error(error);
                }
                debug!(
                    target: LIFECYCLE_TARGET,
                    application = %worker.name,
                    "scan thread finished"
                );
            })
            .map_err(|source| HookError::with_source("failed to spawn scan thread", source))?;
        *self.lock_scan() = Some(handle);
        Ok(())
    }

    fn join_scan_thread(&self) {
        let handle = self.lock_scan().take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!(
                target: LIFECYCLE_TARGET,
                application = %self.name,
                "scan thread panicked"
            );
        }
    }

    // A scan thread still running here was never asked to stop, for example
    // after an externally injected runtime error.
    fn halt_scan_thread(&self) {
        let running = self
            .lock_scan()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        if running && let Err(error) = guarded(|| self.hooks.perform_stop_scan()) {
            warn!(
                target: LIFECYCLE_TARGET,
                application = %self.name,
                %error,
                "stopping scan thread failed"
            );
        }
        self.join_scan_thread();
    }

    fn lock_scan(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.scan
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

fn guarded(hook: impl FnOnce() -> HookResult) -> HookResult {
    panic::catch_unwind(AssertUnwindSafe(hook))
        .unwrap_or_else(|payload| Err(HookError::from_panic(payload)))
}

fn stored(config: Option<ConfigRecord>, what: &str) -> Result<ConfigRecord, HookError> {
    config.ok_or_else(|| HookError::new(format!("no {what} stored")))
}
