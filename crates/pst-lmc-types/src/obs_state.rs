//! Externally visible observation state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Observation state reported to remote operators.
///
/// The value is owned by the control service and is deliberately decoupled
/// from the internal lifecycle state of any single application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObsState {
    /// No beam resources assigned.
    #[default]
    Empty,
    /// Beam resources are being assigned.
    Resourcing,
    /// Beam resources assigned, no scan configured.
    Idle,
    /// Scan configured and ready to start.
    Ready,
    /// Scan in progress.
    Scanning,
    /// Activity aborted by an operator.
    Aborted,
    /// A fault was detected or injected.
    Fault,
}

impl ObsState {
    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Resourcing => "RESOURCING",
            Self::Idle => "IDLE",
            Self::Ready => "READY",
            Self::Scanning => "SCANNING",
            Self::Aborted => "ABORTED",
            Self::Fault => "FAULT",
        }
    }
}

impl fmt::Display for ObsState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_as_upper_case_name() {
        let json = serde_json::to_string(&ObsState::Scanning).expect("serialise");
        assert_eq!(json, "\"SCANNING\"");
        assert_eq!(ObsState::Scanning.to_string(), "SCANNING");
    }

    #[test]
    fn defaults_to_empty() {
        assert_eq!(ObsState::default(), ObsState::Empty);
    }
}
