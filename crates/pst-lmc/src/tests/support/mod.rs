//! Shared doubles and fixtures for unit and behavioural tests.

mod config_loader;
mod hooks;
mod reporter;
mod shutdown;
mod world;

use std::sync::Arc;
use std::time::Duration;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use hooks::{Fault, ScriptedHooks};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use shutdown::TestShutdownSignal;
pub use world::{ControlWorld, StepResult, world};

use crate::lifecycle::LifecycleExecutor;
use crate::service::{ControlService, ManagedHandler};
use crate::state::TransitionTable;

/// Bound applied to every executor shutdown step in tests.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(2);
/// Upper bound on polling loops in tests.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(2);
/// Interval between polls in tests.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Builds an initialised executor over `hooks`.
pub fn initialised_executor(hooks: Arc<ScriptedHooks>) -> LifecycleExecutor {
    let executor = LifecycleExecutor::spawn("scripted", hooks, Arc::new(TransitionTable::standard()))
        .expect("spawn executor")
        .with_shutdown_timeout(STEP_TIMEOUT);
    executor.initialise().expect("initialise");
    executor
}

/// Builds a control service over scripted hooks, reporting to `reporter`.
pub fn managed_service(reporter: Arc<RecordingHealthReporter>) -> Arc<ControlService> {
    let handler = Arc::new(ManagedHandler::new(initialised_executor(Arc::new(
        ScriptedHooks::new(),
    ))));
    Arc::new(ControlService::new(handler, reporter))
}
