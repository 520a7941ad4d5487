//! Test double for [`HealthReporter`] that records structured events for assertions.

use std::sync::Mutex;

use pst_config::SocketEndpoint;
use pst_lmc_types::ObsState;

use crate::health::HealthReporter;
use crate::server::ServerError;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Server start initiated.
    ServerStarting,
    /// Server bound its endpoint.
    ServerReady,
    /// Server failed to start with an error description.
    ServerFailed(String),
    /// Server accept loop ended.
    ServerStopped,
    /// Observation state moved.
    ObsStateChanged {
        /// State left.
        from: ObsState,
        /// State entered.
        to: ObsState,
    },
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Observation states entered so far, in order.
    #[must_use]
    pub fn obs_trail(&self) -> Vec<ObsState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                HealthEvent::ObsStateChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn server_starting(&self, _endpoint: &SocketEndpoint) {
        self.record(HealthEvent::ServerStarting);
    }

    fn server_ready(&self, _endpoint: &SocketEndpoint, _local_addr: Option<std::net::SocketAddr>) {
        self.record(HealthEvent::ServerReady);
    }

    fn server_failed(&self, _endpoint: &SocketEndpoint, error: &ServerError) {
        self.record(HealthEvent::ServerFailed(error.to_string()));
    }

    fn server_stopped(&self, _endpoint: &SocketEndpoint) {
        self.record(HealthEvent::ServerStopped);
    }

    fn obs_state_changed(&self, from: ObsState, to: ObsState) {
        self.record(HealthEvent::ObsStateChanged { from, to });
    }
}
