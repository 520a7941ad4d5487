//! Scriptable [`LifecycleHooks`] double that records every call.
//!
//! Scenarios choose which hooks fail or panic and can make the scan thread
//! fail on its own, mirroring an application losing its data stream.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use pst_lmc_types::{ConfigRecord, Environment, MonitorData};

use crate::lifecycle::{HookResult, LifecycleHooks};
use crate::state::HookError;

/// How a scripted hook misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Return an error.
    Fail,
    /// Panic.
    Panic,
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<&'static str>,
    faults: Vec<(&'static str, Fault)>,
    invalid: HashSet<&'static str>,
    scan_stop_requested: bool,
    scan_fails: bool,
    samples: i64,
}

/// Recording hooks with an injectable failure script.
#[derive(Debug, Default)]
pub struct ScriptedHooks {
    script: Mutex<Script>,
    scan_signal: Condvar,
}

impl ScriptedHooks {
    /// Builds hooks that succeed everywhere.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the named hook misbehave on its next calls.
    pub fn inject(&self, hook: &'static str, fault: Fault) {
        self.lock().faults.push((hook, fault));
    }

    /// Lets the named hook succeed again.
    pub fn heal(&self, hook: &str) {
        self.lock().faults.retain(|(name, _)| *name != hook);
    }

    /// Makes the named validation hook reject its payload.
    pub fn reject(&self, validator: &'static str) {
        self.lock().invalid.insert(validator);
    }

    /// Makes the running scan thread fail.
    pub fn fail_scan(&self) {
        self.lock().scan_fails = true;
        self.scan_signal.notify_all();
    }

    /// Hooks invoked so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    /// Number of times `hook` was invoked.
    #[must_use]
    pub fn count(&self, hook: &str) -> usize {
        self.lock().calls.iter().filter(|call| **call == hook).count()
    }

    fn record(&self, hook: &'static str) -> HookResult {
        let fault = {
            let mut script = self.lock();
            script.calls.push(hook);
            script
                .faults
                .iter()
                .find(|(name, _)| *name == hook)
                .map(|(_, fault)| *fault)
        };
        match fault {
            Some(Fault::Fail) => Err(HookError::new(format!("{hook} failed"))),
            Some(Fault::Panic) => panic!("{hook} panicked"),
            None => Ok(()),
        }
    }

    fn validate(&self, validator: &'static str) -> HookResult {
        if self.lock().invalid.contains(validator) {
            return Err(HookError::new(format!("{validator} rejected payload")));
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().expect("script mutex poisoned")
    }
}

impl LifecycleHooks for ScriptedHooks {
    fn validate_configure_beam(&self, _config: &ConfigRecord) -> HookResult {
        self.validate("validate_configure_beam")
    }

    fn validate_configure_scan(&self, _config: &ConfigRecord) -> HookResult {
        self.validate("validate_configure_scan")
    }

    fn validate_start_scan(&self, _request: &ConfigRecord) -> HookResult {
        self.validate("validate_start_scan")
    }

    fn perform_initialise(&self) -> HookResult {
        self.record("initialise")
    }

    fn perform_configure_beam(&self, _config: &ConfigRecord) -> HookResult {
        self.record("configure_beam")
    }

    fn perform_configure_scan(&self, _config: &ConfigRecord) -> HookResult {
        self.record("configure_scan")
    }

    fn perform_start_scan(&self, _request: &ConfigRecord) -> HookResult {
        self.lock().scan_stop_requested = false;
        self.record("start_scan")
    }

    fn perform_scan(&self) -> HookResult {
        self.record("scan")?;
        let mut script = self.lock();
        loop {
            if script.scan_fails {
                script.scan_fails = false;
                return Err(HookError::new("scan lost its data stream"));
            }
            if script.scan_stop_requested {
                return Ok(());
            }
            script.samples += 1;
            script = self
                .scan_signal
                .wait_timeout(script, Duration::from_millis(5))
                .expect("script mutex poisoned")
                .0;
        }
    }

    fn perform_stop_scan(&self) -> HookResult {
        self.lock().scan_stop_requested = true;
        self.scan_signal.notify_all();
        self.record("stop_scan")
    }

    fn perform_deconfigure_scan(&self) -> HookResult {
        self.record("deconfigure_scan")
    }

    fn perform_deconfigure_beam(&self) -> HookResult {
        self.record("deconfigure_beam")
    }

    fn perform_reset(&self) -> HookResult {
        self.record("reset")
    }

    fn perform_terminate(&self) -> HookResult {
        self.record("terminate")
    }

    fn monitor_data(&self) -> MonitorData {
        MonitorData::new().with("samples", self.lock().samples)
    }

    fn environment(&self) -> Environment {
        Environment::new().with("application", "scripted")
    }
}
