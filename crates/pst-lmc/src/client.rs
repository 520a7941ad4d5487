//! Blocking client for the control socket.
//!
//! Each call opens a fresh connection, writes one request line, and reads the
//! answer. [`ControlClient::monitor`] keeps its connection open and yields
//! samples until the server ends the stream.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use pst_config::SocketEndpoint;
use pst_lmc_types::{
    ConfigRecord, Environment, LogLevel, MonitorData, ObsState, RpcError, RpcRequest, RpcResponse,
    ServerMessage,
};
use thiserror::Error;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::transport::ConnectionStream;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors reported by [`ControlClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint could not be reached.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint display form.
        endpoint: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Reading or writing the connection failed.
    #[error("control connection failed: {0}")]
    Io(#[from] io::Error),
    /// A request or response line could not be (de)serialised.
    #[error("invalid message: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The server answered out of protocol.
    #[error("protocol violation: {message}")]
    Protocol {
        /// What was unexpected.
        message: String,
    },
    /// The server returned a structured error.
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl ClientError {
    fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Structured server error, when the call itself failed.
    #[must_use]
    pub fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            Self::Rpc(error) => Some(error),
            _ => None,
        }
    }
}

/// Client bound to one control endpoint.
#[derive(Debug, Clone)]
pub struct ControlClient {
    endpoint: SocketEndpoint,
}

impl ControlClient {
    /// Creates a client for `endpoint`. No connection is made until a call.
    #[must_use]
    pub fn new(endpoint: SocketEndpoint) -> Self {
        Self { endpoint }
    }

    /// Target endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Issues one unary call.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rpc`] when the server rejects the call and other
    /// variants when the exchange itself fails.
    pub fn call(&self, request: &RpcRequest) -> Result<RpcResponse, ClientError> {
        let mut reader = self.send(request)?;
        match read_message(&mut reader)? {
            Some(ServerMessage::Response { result }) => Ok(result),
            Some(ServerMessage::Error { error }) => Err(ClientError::Rpc(error)),
            Some(other) => Err(ClientError::protocol(format!(
                "unexpected {other:?} for {}",
                request.name()
            ))),
            None => Err(ClientError::protocol("connection closed without a response")),
        }
    }

    /// Opens a monitor stream polling every `polling_interval`.
    ///
    /// # Errors
    ///
    /// Returns an error when the request cannot be sent. Rejections arrive as
    /// the first item of the stream.
    pub fn monitor(&self, polling_interval: Duration) -> Result<MonitorStream, ClientError> {
        let polling_interval_ms = u64::try_from(polling_interval.as_millis()).unwrap_or(u64::MAX);
        let reader = self.send(&RpcRequest::Monitor {
            polling_interval_ms,
        })?;
        Ok(MonitorStream {
            reader,
            finished: false,
        })
    }

    /// Assigns beam resources.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn configure_beam(&self, config: &ConfigRecord) -> Result<(), ClientError> {
        self.call_empty(RpcRequest::ConfigureBeam {
            config: config.clone(),
            dry_run: false,
        })
    }

    /// Validates a beam configuration without applying it.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn validate_beam(&self, config: &ConfigRecord) -> Result<(), ClientError> {
        self.call_empty(RpcRequest::ConfigureBeam {
            config: config.clone(),
            dry_run: true,
        })
    }

    /// Releases beam resources.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn deconfigure_beam(&self) -> Result<(), ClientError> {
        self.call_empty(RpcRequest::DeconfigureBeam)
    }

    /// Active beam configuration.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn get_beam_configuration(&self) -> Result<ConfigRecord, ClientError> {
        match self.call(&RpcRequest::GetBeamConfiguration)? {
            RpcResponse::BeamConfiguration(config) => Ok(config),
            other => Err(unexpected("get_beam_configuration", &other)),
        }
    }

    /// Configures the next scan.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn configure_scan(&self, config: &ConfigRecord) -> Result<(), ClientError> {
        self.call_empty(RpcRequest::ConfigureScan {
            config: config.clone(),
            dry_run: false,
        })
    }

    /// Validates a scan configuration without applying it.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn validate_scan(&self, config: &ConfigRecord) -> Result<(), ClientError> {
        self.call_empty(RpcRequest::ConfigureScan {
            config: config.clone(),
            dry_run: true,
        })
    }

    /// Clears the scan configuration.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn deconfigure_scan(&self) -> Result<(), ClientError> {
        self.call_empty(RpcRequest::DeconfigureScan)
    }

    /// Active scan configuration.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn get_scan_configuration(&self) -> Result<ConfigRecord, ClientError> {
        match self.call(&RpcRequest::GetScanConfiguration)? {
            RpcResponse::ScanConfiguration(config) => Ok(config),
            other => Err(unexpected("get_scan_configuration", &other)),
        }
    }

    /// Starts scanning.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn start_scan(&self, request: &ConfigRecord) -> Result<(), ClientError> {
        self.call_empty(RpcRequest::StartScan {
            request: request.clone(),
        })
    }

    /// Stops scanning.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn stop_scan(&self) -> Result<(), ClientError> {
        self.call_empty(RpcRequest::StopScan)
    }

    /// Aborts current activity.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn abort(&self) -> Result<(), ClientError> {
        self.call_empty(RpcRequest::Abort)
    }

    /// Recovers to `IDLE`.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn reset(&self) -> Result<(), ClientError> {
        self.call_empty(RpcRequest::Reset)
    }

    /// Recovers to `EMPTY`.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn restart(&self) -> Result<(), ClientError> {
        self.call_empty(RpcRequest::Restart)
    }

    /// Forces `FAULT`.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn go_to_fault(&self, message: &str) -> Result<(), ClientError> {
        self.call_empty(RpcRequest::GoToFault {
            message: message.to_owned(),
        })
    }

    /// Current observation state.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn get_state(&self) -> Result<ObsState, ClientError> {
        match self.call(&RpcRequest::GetState)? {
            RpcResponse::State(state) => Ok(state),
            other => Err(unexpected("get_state", &other)),
        }
    }

    /// Application environment.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn get_environment(&self) -> Result<Environment, ClientError> {
        match self.call(&RpcRequest::GetEnvironment)? {
            RpcResponse::Environment(environment) => Ok(environment),
            other => Err(unexpected("get_environment", &other)),
        }
    }

    /// Changes the application log level.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn set_log_level(&self, level: LogLevel) -> Result<(), ClientError> {
        self.call_empty(RpcRequest::SetLogLevel { level })
    }

    /// Application log level.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn get_log_level(&self) -> Result<LogLevel, ClientError> {
        match self.call(&RpcRequest::GetLogLevel)? {
            RpcResponse::LogLevel(level) => Ok(level),
            other => Err(unexpected("get_log_level", &other)),
        }
    }

    fn call_empty(&self, request: RpcRequest) -> Result<(), ClientError> {
        match self.call(&request)? {
            RpcResponse::Empty => Ok(()),
            other => Err(unexpected(request.name(), &other)),
        }
    }

    fn send(&self, request: &RpcRequest) -> Result<BufReader<ConnectionStream>, ClientError> {
        let mut connection = connect(&self.endpoint)?;
        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        connection.write_all(&line)?;
        connection.flush()?;
        Ok(BufReader::new(connection))
    }
}

/// Samples received from a monitor call.
///
/// Yields `Ok` samples until the server writes `stream_end`, or a single
/// `Err` when the call fails. Dropping the stream cancels the call.
pub struct MonitorStream {
    reader: BufReader<ConnectionStream>,
    finished: bool,
}

impl MonitorStream {
    /// Cancels the stream by closing the connection.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Iterator for MonitorStream {
    type Item = Result<MonitorData, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = match read_message(&mut self.reader) {
            Ok(Some(ServerMessage::Monitor { data })) => return Some(Ok(data)),
            Ok(Some(ServerMessage::StreamEnd)) => None,
            Ok(Some(ServerMessage::Error { error })) => Some(Err(ClientError::Rpc(error))),
            Ok(Some(ServerMessage::Response { .. })) => Some(Err(ClientError::protocol(
                "unary response on a monitor stream",
            ))),
            Ok(None) => Some(Err(ClientError::protocol(
                "monitor stream closed without stream_end",
            ))),
            Err(error) => Some(Err(error)),
        };
        self.finished = true;
        item
    }
}

fn read_message<R: BufRead>(reader: &mut R) -> Result<Option<ServerMessage>, ClientError> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line.trim_end())?))
}

fn unexpected(rpc: &str, response: &RpcResponse) -> ClientError {
    ClientError::protocol(format!("unexpected {response:?} for {rpc}"))
}

fn connect(endpoint: &SocketEndpoint) -> Result<ConnectionStream, ClientError> {
    let connect_error = |source| ClientError::Connect {
        endpoint: endpoint.to_string(),
        source,
    };
    match endpoint {
        SocketEndpoint::Tcp { host, port } => {
            let address = resolve_tcp_address(host, *port).map_err(connect_error)?;
            TcpStream::connect_timeout(&address, CONNECTION_TIMEOUT)
                .map(ConnectionStream::Tcp)
                .map_err(connect_error)
        }
        #[cfg(unix)]
        SocketEndpoint::Unix { path } => UnixStream::connect(path.as_std_path())
            .map(ConnectionStream::Unix)
            .map_err(connect_error),
        #[cfg(not(unix))]
        SocketEndpoint::Unix { .. } => Err(connect_error(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix sockets are unsupported on this platform",
        ))),
    }
}

fn resolve_tcp_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}
