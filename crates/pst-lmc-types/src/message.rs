//! Messages written by the control service.

use serde::{Deserialize, Serialize};

use crate::{ConfigRecord, Environment, LogLevel, MonitorData, ObsState, RpcError};

/// Successful result of a unary call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RpcResponse {
    /// The call succeeded with no payload.
    Empty,
    /// Active beam configuration.
    BeamConfiguration(ConfigRecord),
    /// Active scan configuration.
    ScanConfiguration(ConfigRecord),
    /// Current observation state.
    State(ObsState),
    /// Application environment.
    Environment(Environment),
    /// Current log level.
    LogLevel(LogLevel),
}

/// One line written back to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Successful unary result.
    Response {
        /// Typed payload.
        result: RpcResponse,
    },
    /// Failed call.
    Error {
        /// Structured error.
        error: RpcError,
    },
    /// One monitor stream sample.
    Monitor {
        /// Sample contents.
        data: MonitorData,
    },
    /// The monitor stream finished normally.
    StreamEnd,
}

impl From<Result<RpcResponse, RpcError>> for ServerMessage {
    fn from(result: Result<RpcResponse, RpcError>) -> Self {
        match result {
            Ok(result) => Self::Response { result },
            Err(error) => Self::Error { error },
        }
    }
}

impl ServerMessage {
    /// Returns `true` when no further lines follow this message.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Monitor { .. })
    }
}
