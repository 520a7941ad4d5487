//! Destination of a monitor stream.

use std::io;

use pst_lmc_types::MonitorData;

/// Receives monitor samples on behalf of a remote caller.
pub trait MonitorSink {
    /// Returns `true` once the caller has cancelled the stream.
    fn is_cancelled(&mut self) -> bool;

    /// Delivers one sample.
    ///
    /// # Errors
    ///
    /// Returns the write error when the caller can no longer be reached.
    fn send(&mut self, data: &MonitorData) -> io::Result<()>;
}

/// Why a monitor stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// The observation state left `SCANNING`.
    Completed,
    /// The caller cancelled the stream.
    Cancelled,
    /// Writing a sample failed.
    Disconnected,
}

impl MonitorOutcome {
    /// Short label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Disconnected => "disconnected",
        }
    }
}
