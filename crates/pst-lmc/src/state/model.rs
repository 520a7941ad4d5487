//! Lifecycle states and the commands that move between them.

use std::fmt;

/// Internal lifecycle state of a managed application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum State {
    /// Control thread running, application not yet initialised.
    #[default]
    Unknown,
    /// Initialised with no resources assigned.
    Idle,
    /// Beam resources assigned.
    BeamConfigured,
    /// Scan configured and ready to start.
    ScanConfigured,
    /// Scan thread running.
    Scanning,
    /// A lifecycle hook failed and the application awaits a reset.
    RuntimeError,
}

impl State {
    /// Every state, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Unknown,
        Self::Idle,
        Self::BeamConfigured,
        Self::ScanConfigured,
        Self::Scanning,
        Self::RuntimeError,
    ];

    /// Canonical name used in logs and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Idle => "Idle",
            Self::BeamConfigured => "BeamConfigured",
            Self::ScanConfigured => "ScanConfigured",
            Self::Scanning => "Scanning",
            Self::RuntimeError => "RuntimeError",
        }
    }

    /// Returns `true` while beam resources are held.
    #[must_use]
    pub const fn holds_beam(self) -> bool {
        matches!(
            self,
            Self::BeamConfigured | Self::ScanConfigured | Self::Scanning
        )
    }

    /// Returns `true` while a scan configuration is held.
    #[must_use]
    pub const fn holds_scan(self) -> bool {
        matches!(self, Self::ScanConfigured | Self::Scanning)
    }
}

impl fmt::Display for State {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

/// Lifecycle command consumed by the control thread.
///
/// The mailbox holding a pending command is an `Option<Command>`; an empty
/// mailbox means no command is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Command {
    /// Bring the application from `Unknown` to `Idle`.
    Initialise,
    /// Assign beam resources.
    ConfigureBeam,
    /// Configure the next scan.
    ConfigureScan,
    /// Arm scanning and spawn the scan thread.
    StartScan,
    /// Stop scanning and join the scan thread.
    StopScan,
    /// Clear the scan configuration.
    DeconfigureScan,
    /// Release beam resources.
    DeconfigureBeam,
    /// Stop the control thread.
    Terminate,
    /// Recover from `RuntimeError`.
    Reset,
}

impl Command {
    /// Every command.
    pub const ALL: [Self; 9] = [
        Self::Initialise,
        Self::ConfigureBeam,
        Self::ConfigureScan,
        Self::StartScan,
        Self::StopScan,
        Self::DeconfigureScan,
        Self::DeconfigureBeam,
        Self::Terminate,
        Self::Reset,
    ];

    /// Canonical name used in logs and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Initialise => "Initialise",
            Self::ConfigureBeam => "ConfigureBeam",
            Self::ConfigureScan => "ConfigureScan",
            Self::StartScan => "StartScan",
            Self::StopScan => "StopScan",
            Self::DeconfigureScan => "DeconfigureScan",
            Self::DeconfigureBeam => "DeconfigureBeam",
            Self::Terminate => "Terminate",
            Self::Reset => "Reset",
        }
    }

    /// State reached when the command's hook returns successfully.
    #[must_use]
    pub const fn resulting_state(self) -> State {
        match self {
            Self::Initialise | Self::DeconfigureBeam | Self::Reset => State::Idle,
            Self::ConfigureBeam | Self::DeconfigureScan => State::BeamConfigured,
            Self::ConfigureScan | Self::StopScan => State::ScanConfigured,
            Self::StartScan => State::Scanning,
            Self::Terminate => State::Unknown,
        }
    }

    /// Returns `true` for commands submitted together with a configuration
    /// record.
    #[must_use]
    pub const fn carries_configuration(self) -> bool {
        matches!(
            self,
            Self::ConfigureBeam | Self::ConfigureScan | Self::StartScan
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}
