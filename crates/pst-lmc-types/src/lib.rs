//! Wire types shared by the PST control service and its clients.
//!
//! Clients write one JSON line holding an [`RpcRequest`]; the service answers
//! with one or more [`ServerMessage`] lines. Unary calls receive exactly one
//! `response` or `error` message. A monitor stream receives zero or more
//! `monitor` messages followed by `stream_end`, or a single `error`.

mod error;
mod message;
mod monitor;
mod obs_state;
mod record;
mod request;

pub use error::{ErrorCode, RpcError, RpcStatus};
pub use message::{RpcResponse, ServerMessage};
pub use monitor::{Environment, LogLevel, LogLevelParseError, MonitorData, Scalar};
pub use obs_state::ObsState;
pub use record::{ConfigRecord, ConfigRecordError};
pub use request::{DEFAULT_POLLING_INTERVAL_MS, RpcRequest};
