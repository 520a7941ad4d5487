//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::{info, warn};

use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::lifecycle::LifecycleExecutor;
use crate::server::ControlServer;
use crate::service::{ControlService, ManagedHandler};
use crate::simulator::SimulatedApplication;
use crate::state::TransitionTable;
use crate::telemetry;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::loader::{ConfigLoader, SystemConfigLoader};
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Collaborators required to launch the daemon runtime.
pub struct LaunchPlan<L, S> {
    /// Source of the daemon configuration.
    pub loader: L,
    /// Blocks until the daemon should stop.
    pub shutdown: S,
    /// Receives server and observation-state events.
    pub reporter: Arc<dyn HealthReporter>,
}

/// Runs the daemon using the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when any launch step fails or shutdown is not
/// clean.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(LaunchPlan {
        loader: SystemConfigLoader,
        shutdown: SystemShutdownSignal::new(),
        reporter: Arc::new(StructuredHealthReporter::new()),
    })
}

/// Runs the daemon with injected collaborators.
///
/// The control server stops and the executor walks back to `Unknown` even
/// when waiting for the shutdown signal fails.
///
/// # Errors
///
/// Returns [`LaunchError`] for the first failing step.
pub fn run_daemon_with<L, S>(plan: LaunchPlan<L, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
{
    let LaunchPlan {
        loader,
        shutdown,
        reporter,
    } = plan;

    let config = loader.load()?;
    telemetry::initialise(&config)?;
    info!(
        target: PROCESS_TARGET,
        application = config.application_name(),
        endpoint = %config.control_socket(),
        "starting control daemon"
    );

    let application = Arc::new(SimulatedApplication::new(config.application_name()));
    let executor = LifecycleExecutor::spawn(
        config.application_name(),
        application,
        Arc::new(TransitionTable::standard()),
    )?
    .with_shutdown_timeout(config.shutdown_timeout());
    executor.initialise()?;

    let handler = Arc::new(ManagedHandler::new(executor));
    let service = Arc::new(ControlService::new(handler.clone(), reporter.clone()));
    let server = ControlServer::new(config.control_socket().clone(), service, reporter);
    if let Err(error) = server.start() {
        if error.is_endpoint_in_use() {
            warn!(
                target: PROCESS_TARGET,
                endpoint = %config.control_socket(),
                "another control daemon already serves this endpoint"
            );
        }
        quit_quietly(&handler);
        return Err(error.into());
    }

    let waited = shutdown.wait();
    info!(target: PROCESS_TARGET, "stopping control daemon");
    let stopped = server.stop();
    let quit = handler.quit();
    waited?;
    stopped?;
    quit?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}

fn quit_quietly(handler: &ManagedHandler) {
    if let Err(error) = handler.quit() {
        warn!(
            target: PROCESS_TARGET,
            %error,
            "application did not shut down cleanly after launch failure"
        );
    }
}
