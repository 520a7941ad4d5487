//! Threaded application lifecycle executor.
//!
//! A [`LifecycleExecutor`] owns a control thread that consumes commands from
//! its [`StateCoordinator`](crate::state::StateCoordinator) and runs the
//! matching [`LifecycleHooks`] method, plus a scan thread that exists between
//! `StartScan` and `StopScan`. Public methods submit a command and block until
//! the resulting state is reached or a hook failure is reported.

mod errors;
mod executor;
mod hooks;
mod shutdown;

pub use self::errors::LifecycleError;
pub use self::executor::LifecycleExecutor;
pub use self::hooks::{HookResult, LifecycleHooks};

pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");
