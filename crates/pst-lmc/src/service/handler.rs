//! Bridge between the control service and application code.

use pst_lmc_types::{ConfigRecord, Environment, LogLevel, MonitorData};

use crate::state::{HookError, State};

use super::HandlerError;

/// Application-specific behaviour behind a [`ControlService`].
///
/// Mutating methods may fail with a [`HandlerError`]. The `is_*` queries
/// never fail. Implementations are shared between concurrent RPC threads.
///
/// [`ControlService`]: super::ControlService
pub trait LifecycleHandler: Send + Sync {
    /// Assigns beam resources, or only validates when `dry_run` is set.
    fn configure_beam(&self, config: &ConfigRecord, dry_run: bool) -> Result<(), HandlerError>;

    /// Releases beam resources.
    fn deconfigure_beam(&self) -> Result<(), HandlerError>;

    /// Active beam configuration.
    fn get_beam_configuration(&self) -> Result<ConfigRecord, HandlerError>;

    /// Returns `true` while beam resources are held.
    fn is_beam_configured(&self) -> bool;

    /// Configures the next scan, or only validates when `dry_run` is set.
    fn configure_scan(&self, config: &ConfigRecord, dry_run: bool) -> Result<(), HandlerError>;

    /// Clears the scan configuration.
    fn deconfigure_scan(&self) -> Result<(), HandlerError>;

    /// Active scan configuration.
    fn get_scan_configuration(&self) -> Result<ConfigRecord, HandlerError>;

    /// Returns `true` while a scan configuration is held.
    fn is_scan_configured(&self) -> bool;

    /// Starts scanning.
    fn start_scan(&self, request: &ConfigRecord) -> Result<(), HandlerError>;

    /// Stops scanning.
    fn stop_scan(&self) -> Result<(), HandlerError>;

    /// Returns `true` while scanning.
    fn is_scanning(&self) -> bool;

    /// Latest monitoring sample.
    fn get_monitor_data(&self) -> Result<MonitorData, HandlerError>;

    /// Runtime environment description.
    fn get_environment(&self) -> Environment {
        Environment::new()
    }

    /// Applies a new log level.
    fn set_log_level(&self, _level: LogLevel) {}

    /// Log level reported by the application, if it tracks one.
    fn get_log_level(&self) -> Option<LogLevel> {
        None
    }

    /// Recovers the application from `RuntimeError`, keeping any beam
    /// resources it held.
    fn reset(&self) -> Result<(), HandlerError>;

    /// Forces the application into `RuntimeError`.
    fn go_to_runtime_error(&self, error: HookError) -> Result<(), HandlerError>;

    /// Internal lifecycle state of the application.
    fn get_application_state(&self) -> State;

    /// Message of the application's captured error, if any.
    fn get_application_exception(&self) -> Option<String>;
}
