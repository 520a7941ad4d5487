//! Local monitoring and control for a pulsar timing receive application.
//!
//! The crate layers three state machines. A [`StateCoordinator`] holds the
//! application lifecycle state and validates every command against a
//! [`TransitionTable`]. A [`LifecycleExecutor`] drives an application's
//! [`LifecycleHooks`] from a control thread, plus a scan thread while
//! scanning, and reports hook failures back to the coordinator. A
//! [`ControlService`] presents the externally visible observation state
//! (`EMPTY`, `RESOURCING`, `IDLE`, `READY`, `SCANNING`, `ABORTED`, `FAULT`)
//! over a [`LifecycleHandler`] and answers remote calls with typed responses
//! or structured errors.
//!
//! The `pst-lmcd` binary serves a [`ControlService`] over a JSONL socket
//! protocol; [`ControlClient`] speaks the same protocol. One request line is
//! written per connection and the server answers with one response or error
//! line, or with a stream of monitor samples.
//!
//! Every blocking wait in the lifecycle layer is released when a hook fails,
//! so no caller hangs on a state the application can no longer reach.

mod client;
mod dispatch;
mod health;
mod lifecycle;
mod process;
mod server;
mod service;
mod simulator;
mod state;
mod telemetry;
mod transport;

pub use client::{ClientError, ControlClient, MonitorStream};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use lifecycle::{HookResult, LifecycleError, LifecycleExecutor, LifecycleHooks};
pub use process::{
    ConfigLoader, LaunchError, LaunchPlan, ShutdownError, ShutdownSignal, StaticConfigLoader,
    SystemConfigLoader, SystemShutdownSignal, run_daemon, run_daemon_with,
};
pub use server::{ControlServer, ServerError};
pub use service::{
    ControlService, HandlerError, LifecycleHandler, ManagedHandler, MonitorOutcome, MonitorSink,
};
pub use simulator::{BEAM_ID_KEY, BYTES_PER_SECOND_KEY, SCAN_ID_KEY, SimulatedApplication};
pub use state::{Command, HookError, State, StateCoordinator, StateError, TransitionTable};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};
pub use transport::ListenerError;
#[cfg(unix)]
pub use transport::SocketPathConflict;

#[cfg(test)]
mod tests;
