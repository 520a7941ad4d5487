//! Control server: binds the control socket and serves a [`ControlService`].

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use pst_config::{SocketEndpoint, SocketPreparationError};
use thiserror::Error;
use tracing::warn;

use crate::dispatch::DispatchConnectionHandler;
use crate::health::HealthReporter;
use crate::service::ControlService;
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Errors surfaced while starting or stopping the control server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The unix socket directory could not be prepared.
    #[error("failed to prepare control socket: {source}")]
    Prepare {
        /// Underlying filesystem error.
        #[source]
        source: SocketPreparationError,
    },
    /// Binding or running the listener failed.
    #[error("control listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
}

impl ServerError {
    /// Returns `true` when another process already serves the endpoint.
    #[must_use]
    pub fn is_endpoint_in_use(&self) -> bool {
        matches!(self, Self::Listener { source } if source.is_in_use())
    }
}

impl From<SocketPreparationError> for ServerError {
    fn from(source: SocketPreparationError) -> Self {
        Self::Prepare { source }
    }
}

impl From<ListenerError> for ServerError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

/// Serves one [`ControlService`] on one endpoint.
///
/// `start` and `stop` are idempotent. Dropping a running server stops it.
pub struct ControlServer {
    endpoint: SocketEndpoint,
    service: Arc<ControlService>,
    reporter: Arc<dyn HealthReporter>,
    running: Mutex<Option<Running>>,
}

struct Running {
    listener: ListenerHandle,
    local_addr: Option<SocketAddr>,
}

impl ControlServer {
    /// Creates a stopped server.
    pub fn new(
        endpoint: SocketEndpoint,
        service: Arc<ControlService>,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            endpoint,
            service,
            reporter,
            running: Mutex::new(None),
        }
    }

    /// Configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Service being served.
    #[must_use]
    pub fn service(&self) -> &Arc<ControlService> {
        &self.service
    }

    /// Binds the endpoint and starts accepting connections.
    ///
    /// Returns once the socket is bound, so clients may connect immediately
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the endpoint cannot be prepared or bound.
    pub fn start(&self) -> Result<(), ServerError> {
        let mut running = self.lock_running();
        if running.is_some() {
            return Ok(());
        }
        self.reporter.server_starting(&self.endpoint);
        match self.bind_and_serve() {
            Ok(started) => {
                self.reporter
                    .server_ready(&self.endpoint, started.local_addr);
                *running = Some(started);
                Ok(())
            }
            Err(error) => {
                self.reporter.server_failed(&self.endpoint, &error);
                Err(error)
            }
        }
    }

    /// Stops accepting connections and waits for the accept thread.
    ///
    /// Connections already being served finish on their own threads.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Listener`] when the accept thread panicked.
    pub fn stop(&self) -> Result<(), ServerError> {
        let Some(running) = self.lock_running().take() else {
            return Ok(());
        };
        running.listener.shutdown();
        let joined = running.listener.join();
        self.reporter.server_stopped(&self.endpoint);
        Ok(joined?)
    }

    /// Returns `true` between a successful `start` and the next `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    /// Address actually bound for TCP endpoints while running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_running()
            .as_ref()
            .and_then(|running| running.local_addr)
    }

    /// Endpoint clients should connect to: the bound TCP address when known,
    /// otherwise the configured endpoint.
    #[must_use]
    pub fn connect_endpoint(&self) -> SocketEndpoint {
        self.local_addr()
            .map_or_else(|| self.endpoint.clone(), SocketEndpoint::from)
    }

    fn bind_and_serve(&self) -> Result<Running, ServerError> {
        self.endpoint.prepare_filesystem()?;
        let listener = SocketListener::bind(&self.endpoint)?;
        let local_addr = listener.local_addr();
        let handler = Arc::new(DispatchConnectionHandler::new(Arc::clone(&self.service)));
        let listener = listener.start(handler)?;
        Ok(Running {
            listener,
            local_addr,
        })
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        if let Err(error) = self.stop() {
            warn!(target: SERVER_TARGET, %error, "control server did not stop cleanly");
        }
    }
}
