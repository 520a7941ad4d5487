//! Observation-state control service.
//!
//! [`ControlService`] layers the externally visible [`ObsState`] model over a
//! [`LifecycleHandler`]. Each remote call checks its preconditions against
//! the observation state and the handler, invokes the handler, and either
//! moves the observation state or returns a structured [`RpcError`]. The
//! monitor call streams samples to a [`MonitorSink`] while scanning.
//!
//! [`ObsState`]: pst_lmc_types::ObsState
//! [`RpcError`]: pst_lmc_types::RpcError

mod control;
mod errors;
mod handler;
mod managed;
mod monitor;

pub use self::control::ControlService;
pub use self::errors::HandlerError;
pub use self::handler::LifecycleHandler;
pub use self::managed::ManagedHandler;
pub use self::monitor::{MonitorOutcome, MonitorSink};

pub(crate) const SERVICE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::service");
