//! Lifecycle handler backed by a [`LifecycleExecutor`].

use pst_lmc_types::{ConfigRecord, Environment, MonitorData};

use crate::lifecycle::{LifecycleError, LifecycleExecutor};
use crate::state::{HookError, State};

use super::{HandlerError, LifecycleHandler};

/// Standard handler that forwards every call to an executor.
pub struct ManagedHandler {
    executor: LifecycleExecutor,
}

impl ManagedHandler {
    /// Wraps an executor.
    #[must_use]
    pub fn new(executor: LifecycleExecutor) -> Self {
        Self { executor }
    }

    /// Underlying executor.
    #[must_use]
    pub fn executor(&self) -> &LifecycleExecutor {
        &self.executor
    }

    /// Walks the application back to `Unknown` and stops its control thread.
    ///
    /// # Errors
    ///
    /// Returns the executor's shutdown error.
    pub fn quit(&self) -> Result<(), LifecycleError> {
        self.executor.quit()
    }
}

impl LifecycleHandler for ManagedHandler {
    fn configure_beam(&self, config: &ConfigRecord, dry_run: bool) -> Result<(), HandlerError> {
        if dry_run {
            self.executor.validate_configure_beam(config)?;
        } else {
            self.executor.configure_beam(config)?;
        }
        Ok(())
    }

    fn deconfigure_beam(&self) -> Result<(), HandlerError> {
        Ok(self.executor.deconfigure_beam()?)
    }

    fn get_beam_configuration(&self) -> Result<ConfigRecord, HandlerError> {
        self.executor
            .beam_configuration()
            .ok_or_else(|| HandlerError::internal("no beam configuration held"))
    }

    fn is_beam_configured(&self) -> bool {
        self.executor.is_beam_configured()
    }

    fn configure_scan(&self, config: &ConfigRecord, dry_run: bool) -> Result<(), HandlerError> {
        if dry_run {
            self.executor.validate_configure_scan(config)?;
        } else {
            self.executor.configure_scan(config)?;
        }
        Ok(())
    }

    fn deconfigure_scan(&self) -> Result<(), HandlerError> {
        Ok(self.executor.deconfigure_scan()?)
    }

    fn get_scan_configuration(&self) -> Result<ConfigRecord, HandlerError> {
        self.executor
            .scan_configuration()
            .ok_or_else(|| HandlerError::internal("no scan configuration held"))
    }

    fn is_scan_configured(&self) -> bool {
        self.executor.is_scan_configured()
    }

    fn start_scan(&self, request: &ConfigRecord) -> Result<(), HandlerError> {
        Ok(self.executor.start_scan(request)?)
    }

    fn stop_scan(&self) -> Result<(), HandlerError> {
        Ok(self.executor.stop_scan()?)
    }

    fn is_scanning(&self) -> bool {
        self.executor.is_scanning()
    }

    fn get_monitor_data(&self) -> Result<MonitorData, HandlerError> {
        Ok(self.executor.monitor_data())
    }

    fn get_environment(&self) -> Environment {
        self.executor.environment()
    }

    // The executor resets to `Idle`, so a beam held before the failure is
    // configured again from the retained snapshot.
    fn reset(&self) -> Result<(), HandlerError> {
        let beam = self.executor.beam_configuration();
        self.executor.reset()?;
        if let Some(beam) = beam {
            self.executor.configure_beam(&beam)?;
        }
        Ok(())
    }

    fn go_to_runtime_error(&self, error: HookError) -> Result<(), HandlerError> {
        self.executor.go_to_runtime_error(error);
        Ok(())
    }

    fn get_application_state(&self) -> State {
        self.executor.state()
    }

    fn get_application_exception(&self) -> Option<String> {
        self.executor.application_error()
    }
}
