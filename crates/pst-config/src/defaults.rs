use std::time::Duration;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Default TCP port served by the control daemon.
pub const DEFAULT_CONTROL_PORT: u16 = 28080;

/// Default host the control daemon binds to.
pub const DEFAULT_CONTROL_HOST: &str = "127.0.0.1";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default name of the managed application.
pub const DEFAULT_APPLICATION_NAME: &str = "pst-sim";

/// Default bound, in milliseconds, on each step of the best-effort shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Owned default application name.
pub fn default_application_name() -> String {
    DEFAULT_APPLICATION_NAME.to_string()
}

/// Default per-step shutdown budget.
pub fn default_shutdown_timeout() -> Duration {
    Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS)
}

/// Computes the default control socket endpoint.
pub fn default_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp(DEFAULT_CONTROL_HOST, DEFAULT_CONTROL_PORT)
}
