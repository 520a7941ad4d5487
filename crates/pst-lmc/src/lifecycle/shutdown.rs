//! Ordered steps walking the executor back to `Unknown`.

use crate::state::{Command, State};

/// Each entry reads "when in this state, submit this command". The walk
/// checks entries in order, so one pass from any state reaches `Unknown`
/// even when a step fails into `RuntimeError`.
pub(super) const QUIT_SEQUENCE: [(State, Command); 5] = [
    (State::Scanning, Command::StopScan),
    (State::ScanConfigured, Command::DeconfigureScan),
    (State::BeamConfigured, Command::DeconfigureBeam),
    (State::RuntimeError, Command::Reset),
    (State::Idle, Command::Terminate),
];
