//! Contract between the executor and application code.

use pst_lmc_types::{ConfigRecord, Environment, MonitorData};

use crate::state::HookError;

/// Result returned by lifecycle hooks.
pub type HookResult = Result<(), HookError>;

/// Application-specific work performed for each lifecycle transition.
///
/// The control thread calls the `perform_*` methods one at a time.
/// [`perform_scan`](Self::perform_scan) runs on its own thread, concurrently
/// with the control thread waiting for the next command, so implementations
/// use interior mutability. A hook that returns `Err` or panics moves the
/// executor to `RuntimeError`.
pub trait LifecycleHooks: Send + Sync + 'static {
    /// Checks a beam configuration before it is submitted.
    fn validate_configure_beam(&self, _config: &ConfigRecord) -> HookResult {
        Ok(())
    }

    /// Checks a scan configuration before it is submitted.
    fn validate_configure_scan(&self, _config: &ConfigRecord) -> HookResult {
        Ok(())
    }

    /// Checks a start-scan request before it is submitted.
    fn validate_start_scan(&self, _request: &ConfigRecord) -> HookResult {
        Ok(())
    }

    /// Runs once when leaving `Unknown`.
    fn perform_initialise(&self) -> HookResult {
        Ok(())
    }

    /// Attaches beam resources.
    fn perform_configure_beam(&self, config: &ConfigRecord) -> HookResult;

    /// Prepares the next scan.
    fn perform_configure_scan(&self, config: &ConfigRecord) -> HookResult;

    /// Arms scanning.
    ///
    /// Must return promptly; the long-running work belongs in
    /// [`perform_scan`](Self::perform_scan).
    fn perform_start_scan(&self, request: &ConfigRecord) -> HookResult;

    /// Long-running scan activity, executed on the scan thread.
    fn perform_scan(&self) -> HookResult;

    /// Makes an in-flight [`perform_scan`](Self::perform_scan) return.
    ///
    /// The scan thread is joined without a timeout after this hook returns,
    /// so an implementation that ignores the request deadlocks the executor.
    fn perform_stop_scan(&self) -> HookResult;

    /// Discards the scan configuration.
    fn perform_deconfigure_scan(&self) -> HookResult;

    /// Releases beam resources.
    fn perform_deconfigure_beam(&self) -> HookResult;

    /// Recovers from `RuntimeError` back to `Idle`.
    fn perform_reset(&self) -> HookResult {
        Ok(())
    }

    /// Final teardown before the control thread exits.
    fn perform_terminate(&self) -> HookResult {
        Ok(())
    }

    /// Latest monitoring sample.
    fn monitor_data(&self) -> MonitorData {
        MonitorData::new()
    }

    /// Description of the runtime environment.
    fn environment(&self) -> Environment {
        Environment::new()
    }
}
