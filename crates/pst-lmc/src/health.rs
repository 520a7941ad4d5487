//! Structured health reporting for control service lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use pst_config::SocketEndpoint;
use pst_lmc_types::ObsState;

use crate::server::ServerError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before the control server binds its endpoint.
    fn server_starting(&self, endpoint: &SocketEndpoint);

    /// Invoked once the endpoint is bound and accepting connections.
    fn server_ready(&self, endpoint: &SocketEndpoint, local_addr: Option<SocketAddr>);

    /// Invoked when the control server fails to start.
    fn server_failed(&self, endpoint: &SocketEndpoint, error: &ServerError);

    /// Invoked after the accept loop has stopped.
    fn server_stopped(&self, endpoint: &SocketEndpoint);

    /// Invoked on every observation state transition.
    fn obs_state_changed(&self, from: ObsState, to: ObsState);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn server_starting(&self, endpoint: &SocketEndpoint) {
        (**self).server_starting(endpoint);
    }

    fn server_ready(&self, endpoint: &SocketEndpoint, local_addr: Option<SocketAddr>) {
        (**self).server_ready(endpoint, local_addr);
    }

    fn server_failed(&self, endpoint: &SocketEndpoint, error: &ServerError) {
        (**self).server_failed(endpoint, error);
    }

    fn server_stopped(&self, endpoint: &SocketEndpoint) {
        (**self).server_stopped(endpoint);
    }

    fn obs_state_changed(&self, from: ObsState, to: ObsState) {
        (**self).obs_state_changed(from, to);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn server_starting(&self, endpoint: &SocketEndpoint) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_starting",
            endpoint = %endpoint,
            "starting control server"
        );
    }

    fn server_ready(&self, endpoint: &SocketEndpoint, local_addr: Option<SocketAddr>) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_ready",
            endpoint = %endpoint,
            local_addr = ?local_addr,
            "control server ready"
        );
    }

    fn server_failed(&self, endpoint: &SocketEndpoint, error: &ServerError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "server_failed",
            endpoint = %endpoint,
            error = %error,
            "control server failed to start"
        );
    }

    fn server_stopped(&self, endpoint: &SocketEndpoint) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_stopped",
            endpoint = %endpoint,
            "control server stopped"
        );
    }

    fn obs_state_changed(&self, from: ObsState, to: ObsState) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "obs_state_changed",
            from = %from,
            to = %to,
            "observation state changed"
        );
    }
}
