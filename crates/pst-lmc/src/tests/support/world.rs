//! BDD world: one managed application behind a control service, optionally
//! served on a loopback socket.

use std::cell::RefCell;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pst_config::SocketEndpoint;
use pst_lmc_types::{ConfigRecord, MonitorData, ObsState, RpcError, RpcResponse};

use crate::client::{ClientError, ControlClient};
use crate::lifecycle::{LifecycleError, LifecycleExecutor};
use crate::server::ControlServer;
use crate::service::{ControlService, ManagedHandler};
use crate::state::State;

use super::hooks::ScriptedHooks;
use super::reporter::RecordingHealthReporter;
use super::{POLL_INTERVAL, WAIT_TIMEOUT, initialised_executor};

/// Outcome type for step functions.
pub type StepResult = Result<(), String>;

/// Scenario world shared across BDD steps.
pub struct ControlWorld {
    pub hooks: Arc<ScriptedHooks>,
    pub reporter: Arc<RecordingHealthReporter>,
    handler: Arc<ManagedHandler>,
    service: Arc<ControlService>,
    server: Option<ControlServer>,
    lifecycle_result: Option<Result<(), LifecycleError>>,
    rpc_result: Option<Result<RpcResponse, RpcError>>,
    monitor_samples: Vec<MonitorData>,
    monitor_error: Option<ClientError>,
}

impl ControlWorld {
    /// Builds a world whose application has been initialised.
    #[must_use]
    pub fn new() -> Self {
        let hooks = Arc::new(ScriptedHooks::new());
        let handler = Arc::new(ManagedHandler::new(initialised_executor(hooks.clone())));
        let reporter = Arc::new(RecordingHealthReporter::default());
        let service = Arc::new(ControlService::new(handler.clone(), reporter.clone()));
        Self {
            hooks,
            reporter,
            handler,
            service,
            server: None,
            lifecycle_result: None,
            rpc_result: None,
            monitor_samples: Vec::new(),
            monitor_error: None,
        }
    }

    #[must_use]
    pub fn executor(&self) -> &LifecycleExecutor {
        self.handler.executor()
    }

    #[must_use]
    pub fn service(&self) -> &Arc<ControlService> {
        &self.service
    }

    /// Records the outcome of a direct executor call.
    pub fn record_lifecycle(&mut self, result: Result<(), LifecycleError>) {
        self.lifecycle_result = Some(result);
    }

    #[must_use]
    pub fn lifecycle_result(&self) -> Option<&Result<(), LifecycleError>> {
        self.lifecycle_result.as_ref()
    }

    /// Records the outcome of a control service call.
    pub fn record_rpc(&mut self, result: Result<RpcResponse, RpcError>) {
        self.rpc_result = Some(result);
    }

    /// Error returned by the last control service call.
    pub fn rpc_error(&self) -> Result<&RpcError, String> {
        match &self.rpc_result {
            Some(Err(error)) => Ok(error),
            Some(Ok(response)) => Err(format!("call succeeded with {response:?}")),
            None => Err("no call recorded".to_owned()),
        }
    }

    /// Polls until the executor reaches `state`.
    pub fn wait_for_state(&self, state: State) -> StepResult {
        if self
            .executor()
            .coordinator()
            .wait_for_state_timeout(state, WAIT_TIMEOUT)
        {
            Ok(())
        } else {
            Err(format!(
                "application stayed in {} instead of reaching {state}",
                self.executor().state()
            ))
        }
    }

    pub fn expect_obs_state(&self, expected: ObsState) -> StepResult {
        let actual = self.service.obs_state();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("observation state is {actual}, expected {expected}"))
        }
    }

    /// Serves the control service on an ephemeral loopback port.
    pub fn start_server(&mut self) -> StepResult {
        let server = ControlServer::new(
            SocketEndpoint::tcp("127.0.0.1", 0),
            Arc::clone(&self.service),
            self.reporter.clone(),
        );
        server.start().map_err(|error| error.to_string())?;
        self.server = Some(server);
        Ok(())
    }

    /// Client connected to the running server.
    pub fn client(&self) -> Result<ControlClient, String> {
        self.server
            .as_ref()
            .map(|server| ControlClient::new(server.connect_endpoint()))
            .ok_or_else(|| "server not started".to_owned())
    }

    /// Opens a monitor stream and keeps up to `limit` samples, cancelling the
    /// stream once the limit is reached.
    pub fn collect_monitor(&mut self, interval: Duration, limit: usize) -> StepResult {
        self.monitor_samples.clear();
        self.monitor_error = None;
        let stream = match self.client()?.monitor(interval) {
            Ok(stream) => stream,
            Err(error) => {
                self.monitor_error = Some(error);
                return Ok(());
            }
        };
        for item in stream.take(limit) {
            match item {
                Ok(sample) => self.monitor_samples.push(sample),
                Err(error) => {
                    self.monitor_error = Some(error);
                    break;
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn monitor_samples(&self) -> &[MonitorData] {
        &self.monitor_samples
    }

    #[must_use]
    pub fn monitor_error(&self) -> Option<&ClientError> {
        self.monitor_error.as_ref()
    }

    /// Drives the service through beam and scan configuration into
    /// `SCANNING`.
    pub fn start_scanning(&self, scan_id: u64) -> StepResult {
        self.service
            .configure_beam(&ConfigRecord::new().with("BEAM_ID", 1), false)
            .map_err(|error| error.to_string())?;
        self.service
            .configure_scan(&ConfigRecord::new(), false)
            .map_err(|error| error.to_string())?;
        self.service
            .start_scan(&ConfigRecord::new().with("SCAN_ID", scan_id))
            .map_err(|error| error.to_string())?;
        Ok(())
    }

    /// Waits until the scan thread has produced at least one sample.
    pub fn wait_for_samples(&self) -> StepResult {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if self.executor().monitor_data().get("samples").is_some_and(|value| {
                matches!(value, pst_lmc_types::Scalar::Integer(count) if *count > 0)
            }) {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err("scan thread produced no samples".to_owned())
    }
}

impl Drop for ControlWorld {
    fn drop(&mut self) {
        self.server = None;
        let _ = self.handler.quit();
    }
}

/// Default world for behavioural scenarios.
#[must_use]
pub fn world() -> RefCell<ControlWorld> {
    RefCell::new(ControlWorld::new())
}
