//! Remote procedure handlers and the observation state machine.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use pst_lmc_types::{
    ConfigRecord, ErrorCode, LogLevel, ObsState, RpcError, RpcRequest, RpcResponse,
};
use tracing::{debug, error, info, warn};

use crate::health::HealthReporter;
use crate::state::{HookError, State};

use super::{HandlerError, LifecycleHandler, MonitorOutcome, MonitorSink, SERVICE_TARGET};

type RpcResult = Result<RpcResponse, RpcError>;

/// Control service enforcing the observation state model.
///
/// Calls are not serialised by the service: precondition checks narrow but
/// do not remove races between concurrent conflicting calls, so callers
/// issue state-changing calls one at a time.
pub struct ControlService {
    handler: Arc<dyn LifecycleHandler>,
    reporter: Arc<dyn HealthReporter>,
    obs: Mutex<ObsSlot>,
    obs_changed: Condvar,
    log_level: Mutex<LogLevel>,
}

#[derive(Debug, Default)]
struct ObsSlot {
    state: ObsState,
    fault: Option<String>,
}

impl ControlService {
    /// Creates a service in [`ObsState::Empty`] bound to `handler` for its
    /// whole lifetime.
    pub fn new(handler: Arc<dyn LifecycleHandler>, reporter: Arc<dyn HealthReporter>) -> Self {
        Self {
            handler,
            reporter,
            obs: Mutex::new(ObsSlot::default()),
            obs_changed: Condvar::new(),
            log_level: Mutex::new(LogLevel::default()),
        }
    }

    /// Current observation state.
    #[must_use]
    pub fn obs_state(&self) -> ObsState {
        self.lock_obs().state
    }

    /// Message recorded by the most recent `go_to_fault` while in `FAULT`.
    #[must_use]
    pub fn fault_message(&self) -> Option<String> {
        self.lock_obs().fault.clone()
    }

    /// Executes a unary call.
    ///
    /// # Errors
    ///
    /// Returns a rejected error when a precondition fails, an
    /// invalid-argument error when the payload fails validation, and an
    /// internal error when the handler fails. A `monitor` request is
    /// rejected here; use [`monitor`](Self::monitor).
    pub fn handle(&self, request: RpcRequest) -> RpcResult {
        let name = request.name();
        debug!(target: SERVICE_TARGET, rpc = name, "handling request");
        let result = match request {
            RpcRequest::ConfigureBeam { config, dry_run } => self.configure_beam(&config, dry_run),
            RpcRequest::DeconfigureBeam => self.deconfigure_beam(),
            RpcRequest::GetBeamConfiguration => self.get_beam_configuration(),
            RpcRequest::ConfigureScan { config, dry_run } => self.configure_scan(&config, dry_run),
            RpcRequest::DeconfigureScan => self.deconfigure_scan(),
            RpcRequest::GetScanConfiguration => self.get_scan_configuration(),
            RpcRequest::StartScan { request } => self.start_scan(&request),
            RpcRequest::StopScan => self.stop_scan(),
            RpcRequest::Abort => self.abort(),
            RpcRequest::Reset => self.reset(),
            RpcRequest::Restart => self.restart(),
            RpcRequest::GoToFault { message } => self.go_to_fault(&message),
            RpcRequest::GetState => Ok(self.get_state()),
            RpcRequest::GetEnvironment => Ok(self.get_environment()),
            RpcRequest::SetLogLevel { level } => Ok(self.set_log_level(level)),
            RpcRequest::GetLogLevel => Ok(self.get_log_level()),
            RpcRequest::Monitor { .. } => Err(RpcError::rejected(
                ErrorCode::InvalidRequest,
                "monitor is a streaming call",
            )),
        };
        if let Err(rpc_error) = &result {
            log_failure(name, rpc_error);
        }
        result
    }

    /// Assigns beam resources: `EMPTY` → `RESOURCING` → `IDLE`.
    ///
    /// With `dry_run` the payload is only validated; no state changes.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle).
    pub fn configure_beam(&self, config: &ConfigRecord, dry_run: bool) -> RpcResult {
        if dry_run {
            return self.validate_only(self.handler.configure_beam(config, true));
        }
        if self.handler.is_beam_configured() {
            return Err(RpcError::rejected(
                ErrorCode::ConfiguredForBeamAlready,
                "beam resources are already assigned",
            ));
        }
        self.require(ObsState::Empty, "configure beam")?;
        self.set_obs_state(ObsState::Resourcing);
        match self.handler.configure_beam(config, false) {
            Ok(()) => {
                self.set_obs_state(ObsState::Idle);
                Ok(RpcResponse::Empty)
            }
            Err(error) if error.is_validation() => {
                self.set_obs_state(ObsState::Empty);
                Err(RpcError::invalid_argument(error.to_string()))
            }
            Err(error) => Err(self.fault("configure beam", &error)),
        }
    }

    /// Releases beam resources: `IDLE` → `EMPTY`.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle).
    pub fn deconfigure_beam(&self) -> RpcResult {
        if !self.handler.is_beam_configured() {
            return Err(RpcError::rejected(
                ErrorCode::NotConfiguredForBeam,
                "no beam resources are assigned",
            ));
        }
        self.require(ObsState::Idle, "deconfigure beam")?;
        self.handler
            .deconfigure_beam()
            .map_err(|error| self.fault("deconfigure beam", &error))?;
        self.set_obs_state(ObsState::Empty);
        Ok(RpcResponse::Empty)
    }

    /// Returns the active beam configuration.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle).
    pub fn get_beam_configuration(&self) -> RpcResult {
        if !self.handler.is_beam_configured() {
            return Err(RpcError::rejected(
                ErrorCode::NotConfiguredForBeam,
                "no beam resources are assigned",
            ));
        }
        self.handler
            .get_beam_configuration()
            .map(RpcResponse::BeamConfiguration)
            .map_err(|error| RpcError::internal(error.to_string()))
    }

    /// Configures the next scan: `IDLE` → `READY`.
    ///
    /// With `dry_run` the payload is only validated; no state changes.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle).
    pub fn configure_scan(&self, config: &ConfigRecord, dry_run: bool) -> RpcResult {
        if dry_run {
            return self.validate_only(self.handler.configure_scan(config, true));
        }
        if self.handler.is_scan_configured() {
            return Err(RpcError::rejected(
                ErrorCode::ConfiguredForScanAlready,
                "a scan is already configured",
            ));
        }
        self.require(ObsState::Idle, "configure scan")?;
        match self.handler.configure_scan(config, false) {
            Ok(()) => {
                self.set_obs_state(ObsState::Ready);
                Ok(RpcResponse::Empty)
            }
            Err(error) if error.is_validation() => {
                Err(RpcError::invalid_argument(error.to_string()))
            }
            Err(error) => Err(self.fault("configure scan", &error)),
        }
    }

    /// Clears the scan configuration: `READY` → `IDLE`.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle).
    pub fn deconfigure_scan(&self) -> RpcResult {
        if self.obs_state() == ObsState::Scanning {
            return Err(RpcError::rejected(
                ErrorCode::AlreadyScanning,
                "cannot deconfigure while scanning",
            ));
        }
        if !self.handler.is_scan_configured() {
            return Err(RpcError::rejected(
                ErrorCode::NotConfiguredForScan,
                "no scan is configured",
            ));
        }
        self.require(ObsState::Ready, "deconfigure scan")?;
        self.handler
            .deconfigure_scan()
            .map_err(|error| self.fault("deconfigure scan", &error))?;
        self.set_obs_state(ObsState::Idle);
        Ok(RpcResponse::Empty)
    }

    /// Returns the active scan configuration.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle).
    pub fn get_scan_configuration(&self) -> RpcResult {
        if !matches!(self.obs_state(), ObsState::Ready | ObsState::Scanning) {
            return Err(RpcError::rejected(
                ErrorCode::NotConfiguredForScan,
                "no scan is configured",
            ));
        }
        self.handler
            .get_scan_configuration()
            .map(RpcResponse::ScanConfiguration)
            .map_err(|error| RpcError::internal(error.to_string()))
    }

    /// Starts scanning: `READY` → `SCANNING`.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle).
    pub fn start_scan(&self, request: &ConfigRecord) -> RpcResult {
        match self.obs_state() {
            ObsState::Scanning => {
                return Err(RpcError::rejected(
                    ErrorCode::AlreadyScanning,
                    "a scan is already running",
                ));
            }
            ObsState::Ready => {}
            state if !self.handler.is_scan_configured() => {
                return Err(RpcError::rejected(
                    ErrorCode::NotConfiguredForScan,
                    format!("cannot start scan in {state}: no scan is configured"),
                ));
            }
            state => return Err(not_allowed("start scan", state)),
        }
        match self.handler.start_scan(request) {
            Ok(()) => {
                self.set_obs_state(ObsState::Scanning);
                Ok(RpcResponse::Empty)
            }
            Err(error) if error.is_validation() => {
                Err(RpcError::invalid_argument(error.to_string()))
            }
            Err(error) => Err(self.fault("start scan", &error)),
        }
    }

    /// Stops scanning: `SCANNING` → `READY`.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle).
    pub fn stop_scan(&self) -> RpcResult {
        if self.obs_state() != ObsState::Scanning {
            return Err(RpcError::rejected(
                ErrorCode::NotScanning,
                "no scan is running",
            ));
        }
        self.handler
            .stop_scan()
            .map_err(|error| self.fault("stop scan", &error))?;
        self.set_obs_state(ObsState::Ready);
        Ok(RpcResponse::Empty)
    }

    /// Aborts current activity, stopping a running scan first.
    ///
    /// Calling `abort` while already `ABORTED` does nothing.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle).
    pub fn abort(&self) -> RpcResult {
        match self.obs_state() {
            ObsState::Aborted => return Ok(RpcResponse::Empty),
            ObsState::Scanning => {
                self.handler
                    .stop_scan()
                    .map_err(|error| self.fault("abort", &error))?;
            }
            ObsState::Idle | ObsState::Ready => {}
            state => return Err(not_allowed("abort", state)),
        }
        self.set_obs_state(ObsState::Aborted);
        Ok(RpcResponse::Empty)
    }

    /// Recovers from `ABORTED` or `FAULT`, keeping beam resources.
    ///
    /// Ends in `IDLE` while the application holds beam resources. A fault
    /// raised before any beam was assigned recovers to `EMPTY`, since `IDLE`
    /// without a beam accepts neither beam nor scan configuration.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle).
    pub fn reset(&self) -> RpcResult {
        self.require_recoverable("reset")?;
        self.recover_application("reset")?;
        if self.handler.is_scan_configured() {
            self.handler
                .deconfigure_scan()
                .map_err(|error| self.fault("reset", &error))?;
        }
        let next = if self.handler.is_beam_configured() {
            ObsState::Idle
        } else {
            ObsState::Empty
        };
        self.set_obs_state(next);
        Ok(RpcResponse::Empty)
    }

    /// Recovers from `ABORTED` or `FAULT`, releasing every resource.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle).
    pub fn restart(&self) -> RpcResult {
        self.require_recoverable("restart")?;
        self.recover_application("restart")?;
        if self.handler.is_scan_configured() {
            self.handler
                .deconfigure_scan()
                .map_err(|error| self.fault("restart", &error))?;
        }
        if self.handler.is_beam_configured() {
            self.handler
                .deconfigure_beam()
                .map_err(|error| self.fault("restart", &error))?;
        }
        self.set_obs_state(ObsState::Empty);
        Ok(RpcResponse::Empty)
    }

    /// Forces `FAULT` from any state.
    ///
    /// A running scan is stopped and the application is moved to
    /// `RuntimeError` on a best-effort basis; failures of either step are
    /// logged and do not prevent the transition.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other calls.
    pub fn go_to_fault(&self, message: &str) -> RpcResult {
        if self.handler.is_scanning()
            && let Err(error) = self.handler.stop_scan()
        {
            warn!(
                target: SERVICE_TARGET,
                %error,
                "stopping scan before fault failed"
            );
        }
        let reason = if message.is_empty() {
            "fault requested by operator"
        } else {
            message
        };
        if let Err(error) = self.handler.go_to_runtime_error(HookError::new(reason)) {
            warn!(
                target: SERVICE_TARGET,
                %error,
                "moving application to runtime error failed"
            );
        }
        self.enter_fault(reason);
        Ok(RpcResponse::Empty)
    }

    /// Current observation state.
    #[must_use]
    pub fn get_state(&self) -> RpcResponse {
        RpcResponse::State(self.obs_state())
    }

    /// Application environment.
    #[must_use]
    pub fn get_environment(&self) -> RpcResponse {
        RpcResponse::Environment(self.handler.get_environment())
    }

    /// Forwards a log level to the application and records it.
    #[must_use]
    pub fn set_log_level(&self, level: LogLevel) -> RpcResponse {
        self.handler.set_log_level(level);
        *self.lock_log_level() = level;
        info!(target: SERVICE_TARGET, level = %level, "log level changed");
        RpcResponse::Empty
    }

    /// Log level reported by the application, or the last level set.
    #[must_use]
    pub fn get_log_level(&self) -> RpcResponse {
        let level = self
            .handler
            .get_log_level()
            .unwrap_or_else(|| *self.lock_log_level());
        RpcResponse::LogLevel(level)
    }

    /// Streams monitor samples to `sink` until scanning ends.
    ///
    /// Each iteration waits up to `polling_interval` for the observation
    /// state to leave `SCANNING`, then checks for cancellation, fetches one
    /// sample from the handler, and sends it.
    ///
    /// # Errors
    ///
    /// Returns a rejected error when not scanning at the start, and an
    /// internal error when the handler cannot produce a sample.
    pub fn monitor(
        &self,
        polling_interval: Duration,
        sink: &mut dyn MonitorSink,
    ) -> Result<MonitorOutcome, RpcError> {
        if self.obs_state() != ObsState::Scanning {
            let error = RpcError::rejected(ErrorCode::NotScanning, "monitor requires SCANNING");
            log_failure("monitor", &error);
            return Err(error);
        }
        info!(
            target: SERVICE_TARGET,
            polling_interval_ms = polling_interval.as_millis(),
            "monitor stream started"
        );
        let outcome = self.monitor_loop(polling_interval, sink);
        match &outcome {
            Ok(outcome) => info!(
                target: SERVICE_TARGET,
                outcome = outcome.as_str(),
                "monitor stream ended"
            ),
            Err(rpc_error) => log_failure("monitor", rpc_error),
        }
        outcome
    }

    fn monitor_loop(
        &self,
        polling_interval: Duration,
        sink: &mut dyn MonitorSink,
    ) -> Result<MonitorOutcome, RpcError> {
        loop {
            let scanning = {
                let guard = self.lock_obs();
                let (guard, _) = self
                    .obs_changed
                    .wait_timeout_while(guard, polling_interval, |slot| {
                        slot.state == ObsState::Scanning
                    })
                    .unwrap_or_else(|poison| poison.into_inner());
                guard.state == ObsState::Scanning
            };
            if !scanning {
                return Ok(MonitorOutcome::Completed);
            }
            if sink.is_cancelled() {
                return Ok(MonitorOutcome::Cancelled);
            }
            let data = self
                .handler
                .get_monitor_data()
                .map_err(|error| RpcError::internal(error.to_string()))?;
            if let Err(error) = sink.send(&data) {
                debug!(target: SERVICE_TARGET, %error, "monitor write failed");
                return Ok(MonitorOutcome::Disconnected);
            }
        }
    }

    fn validate_only(&self, result: Result<(), HandlerError>) -> RpcResult {
        match result {
            Ok(()) => Ok(RpcResponse::Empty),
            Err(error) if error.is_validation() => {
                Err(RpcError::invalid_argument(error.to_string()))
            }
            Err(error) => Err(RpcError::internal(error.to_string())),
        }
    }

    fn require(&self, expected: ObsState, action: &str) -> Result<(), RpcError> {
        match self.obs_state() {
            state if state == expected => Ok(()),
            state => Err(not_allowed(action, state)),
        }
    }

    fn require_recoverable(&self, action: &str) -> Result<(), RpcError> {
        match self.obs_state() {
            ObsState::Aborted | ObsState::Fault => Ok(()),
            state => Err(not_allowed(action, state)),
        }
    }

    fn recover_application(&self, action: &str) -> Result<(), RpcError> {
        if self.handler.get_application_state() == State::RuntimeError {
            let cleared = self.handler.get_application_exception();
            info!(
                target: SERVICE_TARGET,
                action,
                error = cleared.as_deref().unwrap_or("none recorded"),
                "recovering application from runtime error"
            );
            self.handler
                .reset()
                .map_err(|error| self.fault(action, &error))?;
        }
        Ok(())
    }

    fn fault(&self, action: &str, handler_error: &HandlerError) -> RpcError {
        let message = format!("{action} failed: {handler_error}");
        error!(
            target: SERVICE_TARGET,
            action,
            error = %handler_error,
            "handler failure; entering FAULT"
        );
        self.enter_fault(&message);
        RpcError::internal(message)
    }

    fn enter_fault(&self, message: &str) {
        let previous = {
            let mut slot = self.lock_obs();
            let previous = slot.state;
            slot.state = ObsState::Fault;
            slot.fault = Some(message.to_owned());
            previous
        };
        self.announce(previous, ObsState::Fault);
    }

    fn set_obs_state(&self, next: ObsState) {
        let previous = {
            let mut slot = self.lock_obs();
            let previous = slot.state;
            slot.state = next;
            if next != ObsState::Fault {
                slot.fault = None;
            }
            previous
        };
        self.announce(previous, next);
    }

    fn announce(&self, previous: ObsState, next: ObsState) {
        self.obs_changed.notify_all();
        if previous != next {
            self.reporter.obs_state_changed(previous, next);
        }
    }

    fn lock_obs(&self) -> MutexGuard<'_, ObsSlot> {
        self.obs.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    fn lock_log_level(&self) -> MutexGuard<'_, LogLevel> {
        self.log_level
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

fn not_allowed(action: &str, state: ObsState) -> RpcError {
    RpcError::rejected(
        ErrorCode::InvalidRequest,
        format!("cannot {action} in ObsState {state}"),
    )
}

fn log_failure(rpc: &str, rpc_error: &RpcError) {
    if rpc_error.is_rejected() {
        warn!(
            target: SERVICE_TARGET,
            rpc,
            code = %rpc_error.code,
            message = %rpc_error.message,
            "request rejected"
        );
    } else {
        error!(
            target: SERVICE_TARGET,
            rpc,
            status = %rpc_error.status,
            code = %rpc_error.code,
            message = %rpc_error.message,
            "request failed"
        );
    }
}
