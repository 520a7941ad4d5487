//! Requests accepted by the control service.

use serde::{Deserialize, Serialize};

use crate::{ConfigRecord, LogLevel};

/// Default monitor polling interval in milliseconds.
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 1_000;

/// One remote procedure call.
///
/// The request is internally tagged by `rpc`, for example
/// `{"rpc":"configure_scan","config":{"SCAN_ID":"1"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rpc", rename_all = "snake_case")]
pub enum RpcRequest {
    /// Assign beam resources.
    #[serde(alias = "assign_beam")]
    ConfigureBeam {
        /// Beam configuration payload.
        config: ConfigRecord,
        /// Validate the payload without applying it.
        #[serde(default)]
        dry_run: bool,
    },
    /// Release beam resources.
    #[serde(alias = "release_beam")]
    DeconfigureBeam,
    /// Return the active beam configuration.
    GetBeamConfiguration,
    /// Configure the next scan.
    ConfigureScan {
        /// Scan configuration payload.
        config: ConfigRecord,
        /// Validate the payload without applying it.
        #[serde(default)]
        dry_run: bool,
    },
    /// Clear the scan configuration.
    DeconfigureScan,
    /// Return the active scan configuration.
    GetScanConfiguration,
    /// Begin scanning.
    StartScan {
        /// Start-scan request payload.
        request: ConfigRecord,
    },
    /// End the current scan.
    StopScan,
    /// Abort current activity.
    Abort,
    /// Recover from `ABORTED` or `FAULT` to `IDLE`.
    Reset,
    /// Recover from `ABORTED` or `FAULT` to `EMPTY`.
    Restart,
    /// Force the service into `FAULT`.
    GoToFault {
        /// Reason recorded with the fault.
        #[serde(default)]
        message: String,
    },
    /// Return the current observation state.
    GetState,
    /// Return the application environment.
    GetEnvironment,
    /// Change the application log level.
    SetLogLevel {
        /// Requested level.
        level: LogLevel,
    },
    /// Return the application log level.
    GetLogLevel,
    /// Stream monitoring data while scanning.
    Monitor {
        /// Interval between samples in milliseconds.
        #[serde(default = "default_polling_interval_ms")]
        polling_interval_ms: u64,
    },
}

const fn default_polling_interval_ms() -> u64 {
    DEFAULT_POLLING_INTERVAL_MS
}

impl RpcRequest {
    /// Wire name of the call.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ConfigureBeam { .. } => "configure_beam",
            Self::DeconfigureBeam => "deconfigure_beam",
            Self::GetBeamConfiguration => "get_beam_configuration",
            Self::ConfigureScan { .. } => "configure_scan",
            Self::DeconfigureScan => "deconfigure_scan",
            Self::GetScanConfiguration => "get_scan_configuration",
            Self::StartScan { .. } => "start_scan",
            Self::StopScan => "stop_scan",
            Self::Abort => "abort",
            Self::Reset => "reset",
            Self::Restart => "restart",
            Self::GoToFault { .. } => "go_to_fault",
            Self::GetState => "get_state",
            Self::GetEnvironment => "get_environment",
            Self::SetLogLevel { .. } => "set_log_level",
            Self::GetLogLevel => "get_log_level",
            Self::Monitor { .. } => "monitor",
        }
    }

    /// Returns `true` for the server-streaming monitor call.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Monitor { .. })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(r#"{"rpc":"assign_beam","config":{"BEAM_ID":"1"}}"#, "configure_beam")]
    #[case(r#"{"rpc":"release_beam"}"#, "deconfigure_beam")]
    #[case(r#"{"rpc":"go_to_fault"}"#, "go_to_fault")]
    #[case(r#"{"rpc":"set_log_level","level":"debug"}"#, "set_log_level")]
    fn accepts_wire_names_and_aliases(#[case] line: &str, #[case] expected: &str) {
        let request: RpcRequest = serde_json::from_str(line).expect("deserialise");
        assert_eq!(request.name(), expected);
    }

    #[test]
    fn dry_run_defaults_to_false() {
        let request: RpcRequest =
            serde_json::from_str(r#"{"rpc":"configure_scan","config":{}}"#).expect("deserialise");
        assert!(matches!(
            request,
            RpcRequest::ConfigureScan { dry_run: false, .. }
        ));
    }

    #[test]
    fn monitor_uses_default_polling_interval() {
        let request: RpcRequest =
            serde_json::from_str(r#"{"rpc":"monitor"}"#).expect("deserialise");
        assert_eq!(
            request,
            RpcRequest::Monitor {
                polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS
            }
        );
        assert!(request.is_streaming());
    }

    #[test]
    fn rejects_unknown_call() {
        let result = serde_json::from_str::<RpcRequest>(r#"{"rpc":"self_destruct"}"#);
        assert!(result.is_err());
    }
}
