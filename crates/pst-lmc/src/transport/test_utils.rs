//! Test helpers for the transport module.

use std::sync::{Arc, Mutex};

use super::{ConnectionHandler, ConnectionStream};

/// Transport family of an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Family {
    Tcp,
    #[cfg(unix)]
    Unix,
}

/// Handler that records the family of every connection it receives.
#[derive(Default)]
pub(crate) struct RecordingHandler {
    accepted: Mutex<Vec<Family>>,
}

impl RecordingHandler {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn accepted(&self) -> Vec<Family> {
        self.accepted.lock().expect("handler mutex poisoned").clone()
    }
}

impl ConnectionHandler for RecordingHandler {
    fn handle(&self, stream: ConnectionStream) {
        let family = match stream {
            ConnectionStream::Tcp(_) => Family::Tcp,
            #[cfg(unix)]
            ConnectionStream::Unix(_) => Family::Unix,
        };
        self.accepted
            .lock()
            .expect("handler mutex poisoned")
            .push(family);
    }
}
