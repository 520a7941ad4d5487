//! Daemon process supervision.
//!
//! [`run_daemon`] wires the configuration, telemetry, simulated application,
//! control service, and control server together and keeps them alive until a
//! termination signal arrives.

mod errors;
mod launch;
mod loader;
mod shutdown;

pub use errors::LaunchError;
pub use launch::{LaunchPlan, run_daemon, run_daemon_with};
pub use loader::{ConfigLoader, StaticConfigLoader, SystemConfigLoader};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
