//! Simulated receive application.
//!
//! [`SimulatedApplication`] stands in for a real signal-processing pipeline.
//! It validates its payloads, pretends to record data at the configured rate
//! while scanning, and publishes the resulting counters as monitor data.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use pst_lmc_types::{ConfigRecord, Environment, MonitorData, Scalar};
use tracing::debug;

use crate::lifecycle::{HookResult, LifecycleHooks};
use crate::state::HookError;

const SIMULATOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::simulator");
const DEFAULT_TICK: Duration = Duration::from_millis(100);
const DEFAULT_BYTES_PER_SECOND: f64 = 1.0e6;

/// Key identifying the beam in a beam configuration.
pub const BEAM_ID_KEY: &str = "BEAM_ID";
/// Key identifying the scan in a start-scan request.
pub const SCAN_ID_KEY: &str = "SCAN_ID";
/// Optional scan configuration key giving the simulated data rate.
pub const BYTES_PER_SECOND_KEY: &str = "BYTES_PER_SECOND";

/// Hooks implementation that simulates data capture.
#[derive(Debug)]
pub struct SimulatedApplication {
    name: String,
    tick: Duration,
    status: Mutex<Status>,
    stop_requested: Condvar,
}

#[derive(Debug, Default)]
struct Status {
    beam_id: Option<u32>,
    bytes_per_second: f64,
    scan_id: Option<u64>,
    data_received: f64,
    samples: i64,
    stopping: bool,
}

impl SimulatedApplication {
    /// Creates an application ticking every 100 ms.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tick: DEFAULT_TICK,
            status: Mutex::new(Status::default()),
            stop_requested: Condvar::new(),
        }
    }

    /// Overrides the interval between simulated data blocks.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Status> {
        self.status
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

fn required<T>(record: &ConfigRecord, key: &str) -> Result<T, HookError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    record
        .get::<T>(key)
        .map_err(|error| HookError::with_source(format!("{key} is invalid or missing"), error))
}

fn data_rate(config: &ConfigRecord) -> Result<f64, HookError> {
    if !config.contains(BYTES_PER_SECOND_KEY) {
        return Ok(DEFAULT_BYTES_PER_SECOND);
    }
    let rate: f64 = required(config, BYTES_PER_SECOND_KEY)?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(HookError::new(format!(
            "{BYTES_PER_SECOND_KEY} must be a positive number"
        )))
    }
}

fn scan_id_scalar(scan_id: u64) -> Scalar {
    i64::try_from(scan_id).map_or_else(|_| Scalar::from(scan_id.to_string()), Scalar::from)
}

impl LifecycleHooks for SimulatedApplication {
    fn validate_configure_beam(&self, config: &ConfigRecord) -> HookResult {
        required::<u32>(config, BEAM_ID_KEY).map(drop)
    }

    fn validate_configure_scan(&self, config: &ConfigRecord) -> HookResult {
        data_rate(config).map(drop)
    }

    fn validate_start_scan(&self, request: &ConfigRecord) -> HookResult {
        required::<u64>(request, SCAN_ID_KEY).map(drop)
    }

    fn perform_configure_beam(&self, config: &ConfigRecord) -> HookResult {
        let beam_id = required::<u32>(config, BEAM_ID_KEY)?;
        self.lock().beam_id = Some(beam_id);
        debug!(target: SIMULATOR_TARGET, beam_id, "beam attached");
        Ok(())
    }

    fn perform_configure_scan(&self, config: &ConfigRecord) -> HookResult {
        self.lock().bytes_per_second = data_rate(config)?;
        Ok(())
    }

    fn perform_start_scan(&self, request: &ConfigRecord) -> HookResult {
        let scan_id = required::<u64>(request, SCAN_ID_KEY)?;
        let mut status = self.lock();
        status.scan_id = Some(scan_id);
        status.data_received = 0.0;
        status.samples = 0;
        status.stopping = false;
        Ok(())
    }

    fn perform_scan(&self) -> HookResult {
        let block = self.tick.as_secs_f64();
        let mut status = self.lock();
        while !status.stopping {
            status = self
                .stop_requested
                .wait_timeout(status, self.tick)
                .unwrap_or_else(|poison| poison.into_inner())
                .0;
            if status.stopping {
                break;
            }
            status.data_received += status.bytes_per_second * block;
            status.samples += 1;
        }
        debug!(
            target: SIMULATOR_TARGET,
            samples = status.samples,
            "scan loop finished"
        );
        Ok(())
    }

    fn perform_stop_scan(&self) -> HookResult {
        self.lock().stopping = true;
        self.stop_requested.notify_all();
        Ok(())
    }

    fn perform_deconfigure_scan(&self) -> HookResult {
        let mut status = self.lock();
        status.bytes_per_second = 0.0;
        status.scan_id = None;
        Ok(())
    }

    fn perform_deconfigure_beam(&self) -> HookResult {
        self.lock().beam_id = None;
        Ok(())
    }

    fn perform_reset(&self) -> HookResult {
        *self.lock() = Status::default();
        Ok(())
    }

    fn monitor_data(&self) -> MonitorData {
        let status = self.lock();
        let rate = if status.stopping || status.scan_id.is_none() {
            0.0
        } else {
            status.bytes_per_second
        };
        let mut data = MonitorData::new()
            .with("data_received", status.data_received)
            .with("data_record_rate", rate)
            .with("samples", status.samples);
        if let Some(scan_id) = status.scan_id {
            data.insert("scan_id", scan_id_scalar(scan_id));
        }
        data
    }

    fn environment(&self) -> Environment {
        let status = self.lock();
        let mut environment = Environment::new()
            .with("application", self.name.as_str())
            .with("tick_ms", u32::try_from(self.tick.as_millis()).unwrap_or(u32::MAX));
        if let Some(beam_id) = status.beam_id {
            environment.insert("beam_id", beam_id);
        }
        environment
    }
}
