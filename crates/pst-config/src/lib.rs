//! Shared configuration for the PST control daemon and its clients.
//!
//! Values are layered by [`ortho_config`]: built-in defaults, then a TOML
//! configuration file, then `PST_LMC_*` environment variables, then
//! command-line flags. The daemon and any tooling that talks to it load the
//! same [`Config`] so both sides agree on the control socket.

mod defaults;
mod logging;
mod socket;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_APPLICATION_NAME, DEFAULT_CONTROL_HOST, DEFAULT_CONTROL_PORT, DEFAULT_LOG_FILTER,
    DEFAULT_SHUTDOWN_TIMEOUT_MS, default_application_name, default_log_filter,
    default_log_filter_string, default_log_format, default_shutdown_timeout,
    default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved configuration for the control daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "PST_LMC")]
pub struct Config {
    /// Endpoint the control service listens on.
    #[ortho_config(default = defaults::default_socket_endpoint())]
    pub control_socket: SocketEndpoint,
    /// `tracing` filter expression applied to daemon logs.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format of daemon logs.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Name of the managed application, used for thread names and logs.
    #[ortho_config(default = defaults::default_application_name())]
    pub application_name: String,
    /// Bound, in milliseconds, on each step of the executor shutdown walk.
    #[ortho_config(default = defaults::DEFAULT_SHUTDOWN_TIMEOUT_MS)]
    pub shutdown_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_socket: default_socket_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            application_name: default_application_name(),
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Endpoint the control service listens on.
    #[must_use]
    pub fn control_socket(&self) -> &SocketEndpoint {
        &self.control_socket
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Name of the managed application.
    #[must_use]
    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Per-step bound used while walking the executor back to `Unknown`.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
