//! The `Dut` trait -- the interface the runner drives a device through.
//!
//! A DUT exposes a runtime-discovered table of named signals, reads and
//! writes them, and reports state changes the device pushed (or that the
//! driver inferred) since the last poll. The lifecycle hooks are called by
//! the runner around the whole run and around every test unit; their default
//! implementations do the trace bookkeeping through the DUT's [`Monitor`].

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::monitor::Monitor;
use crate::signal::SignalInfo;
use crate::state::StateChangeReport;
use crate::time::TimeValue;

/// A device under test.
///
/// Every method that talks to the device takes the current logical time so
/// that observations can be timestamped without the DUT owning a clock.
#[async_trait]
pub trait Dut: Send {
    /// Name of this DUT, used in logs.
    fn name(&self) -> &str;

    /// Every known signal, in discovery order.
    fn signals(&self) -> Vec<SignalInfo>;

    /// Look a signal up by name or alias.
    fn signal_info(&self, name: &str) -> Option<SignalInfo> {
        self.signals().into_iter().find(|s| s.answers_to(name))
    }

    /// Observation and trace state.
    fn monitor(&self) -> &Monitor;

    /// Mutable observation and trace state.
    fn monitor_mut(&mut self) -> &mut Monitor;

    /// Whether the device is pushing asynchronous state changes.
    fn is_monitoring(&self) -> bool {
        self.monitor().is_monitoring()
    }

    /// Turn asynchronous state-change reporting on or off.
    async fn set_monitoring(&mut self, on: bool, now: TimeValue) -> Result<()>;

    /// Read the current value of a signal.
    async fn read(&mut self, name: &str, now: TimeValue) -> Result<u32>;

    /// Drive a signal.
    async fn write(&mut self, name: &str, value: u32, now: TimeValue) -> Result<()>;

    /// State changes observed since the last call, already filtered through
    /// the state cache and keyed by display name.
    async fn poll_state_changes(&mut self, now: TimeValue) -> Result<Vec<StateChangeReport>>;

    /// Reports describing every value the DUT already knows, queued at time
    /// zero of each traced test.
    fn initial_state_reports(&self) -> Vec<StateChangeReport> {
        Vec::new()
    }

    /// Bit width of every signal by display name.
    fn trace_widths(&self) -> HashMap<String, u32> {
        self.signals()
            .into_iter()
            .map(|s| (s.display_name().to_string(), s.width))
            .collect()
    }

    /// Called once before the first test.
    async fn testing_will_begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called before each test body runs.
    async fn testing_unit_start(&mut self, test: &str, _now: TimeValue) -> Result<()> {
        let initial = if self.monitor().traces_enabled() {
            self.initial_state_reports()
        } else {
            Vec::new()
        };
        self.monitor_mut().unit_start(test, initial);
        Ok(())
    }

    /// Called after each test body finished, whatever its outcome.
    async fn testing_unit_done(&mut self, test: &str, _now: TimeValue) -> Result<()> {
        let widths = self.trace_widths();
        self.monitor_mut()
            .unit_done(test, |n| widths.get(n).copied().unwrap_or(1));
        Ok(())
    }

    /// Called once after the last test.
    async fn testing_done(&mut self) -> Result<()> {
        Ok(())
    }
}
