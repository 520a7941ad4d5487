//! Error types for control socket binding.

use std::io;

use pst_config::SocketEndpoint;
use thiserror::Error;

/// Errors surfaced while binding or running the control socket listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("control endpoint {endpoint} does not resolve to an address: {source}")]
    Resolve {
        endpoint: SocketEndpoint,
        #[source]
        source: io::Error,
    },
    #[error("failed to bind control endpoint {endpoint}: {source}")]
    Bind {
        endpoint: SocketEndpoint,
        #[source]
        source: io::Error,
    },
    /// An existing file at the unix socket path could not be taken over.
    #[cfg(unix)]
    #[error("cannot take over unix control socket {path}: {conflict}")]
    SocketPath {
        path: String,
        #[source]
        conflict: SocketPathConflict,
    },
    #[cfg(not(unix))]
    #[error("unix sockets are unsupported for endpoint {endpoint}")]
    UnsupportedUnix { endpoint: SocketEndpoint },
    #[error("failed to make the control socket non-blocking: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[error("control listener thread could not be spawned: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
    #[error("control listener thread panicked")]
    ThreadPanic,
}

impl ListenerError {
    /// Returns `true` when another process already serves the endpoint.
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        match self {
            Self::Bind { source, .. } => source.kind() == io::ErrorKind::AddrInUse,
            #[cfg(unix)]
            Self::SocketPath {
                conflict: SocketPathConflict::Live,
                ..
            } => true,
            _ => false,
        }
    }
}

/// Reason a file already present at the unix socket path blocks binding.
#[cfg(unix)]
#[derive(Debug, Error)]
pub enum SocketPathConflict {
    #[error("another control service answers on it")]
    Live,
    #[error("it is not a socket")]
    NotSocket,
    #[error("its metadata could not be read: {0}")]
    Inspect(#[source] io::Error),
    #[error("connecting to it failed unexpectedly: {0}")]
    Connect(#[source] io::Error),
    #[error("the stale socket could not be removed: {0}")]
    Remove(#[source] io::Error),
}
