//! State tracking shared by every monitorable DUT.
//!
//! A [`Monitor`] owns the pieces of a DUT that do not depend on how the
//! device is reached: the [`StateCache`], the queue of timestamped
//! [`StateChangeReport`]s for the running test, the monitoring flag and the
//! trace output settings. Drivers feed it observations through
//! [`record`](Monitor::record); the runner's lifecycle hooks turn the queue
//! into a per-test [`Trace`] and hand it to the installed [`TraceSink`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::state::{StateCache, StateChangeReport};
use crate::time::TimeValue;
use crate::trace::{Event, Trace, TraceSink, VarDecl, trace_file_name};

/// Scope name used for trace variables unless changed.
pub const DEFAULT_SCOPE: &str = "dut";

/// Observation and trace bookkeeping for one DUT.
pub struct Monitor {
    cache: StateCache,
    queued: Vec<(TimeValue, StateChangeReport)>,
    per_test: HashMap<String, Vec<(TimeValue, StateChangeReport)>>,
    monitoring: bool,
    write_trace: bool,
    trace_dir: Option<PathBuf>,
    sink: Option<Box<dyn TraceSink>>,
    scope: String,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("monitoring", &self.monitoring)
            .field("write_trace", &self.write_trace)
            .field("trace_dir", &self.trace_dir)
            .field("has_sink", &self.sink.is_some())
            .field("queued", &self.queued.len())
            .field("scope", &self.scope)
            .finish()
    }
}

impl Monitor {
    /// A monitor with monitoring off and trace writing disabled.
    pub fn new() -> Self {
        Self {
            cache: StateCache::new(),
            queued: Vec::new(),
            per_test: HashMap::new(),
            monitoring: false,
            write_trace: false,
            trace_dir: None,
            sink: None,
            scope: DEFAULT_SCOPE.to_string(),
        }
    }

    // ---------------------------------------------------------------
    // Flags and settings
    // ---------------------------------------------------------------

    /// Whether the device is pushing asynchronous state changes.
    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Record whether the device is pushing asynchronous state changes.
    pub fn set_monitoring(&mut self, on: bool) {
        self.monitoring = on;
    }

    /// The last-value cache.
    pub fn state_cache(&self) -> &StateCache {
        &self.cache
    }

    /// Mutable access to the last-value cache.
    pub fn state_cache_mut(&mut self) -> &mut StateCache {
        &mut self.cache
    }

    /// Whether traces are written at the end of each test.
    pub fn write_trace_enabled(&self) -> bool {
        self.write_trace
    }

    /// Enable or disable trace writing.
    pub fn set_write_trace(&mut self, on: bool) {
        self.write_trace = on;
    }

    /// Directory traces are written to.
    pub fn trace_dir(&self) -> Option<&Path> {
        self.trace_dir.as_deref()
    }

    /// Set (or clear, with `None`) the trace output directory.
    ///
    /// Fails with [`Error::Configuration`] when no supported sink is
    /// installed or when the directory does not exist.
    pub fn set_trace_dir(&mut self, dir: Option<PathBuf>) -> Result<()> {
        let Some(dir) = dir else {
            self.trace_dir = None;
            return Ok(());
        };
        if !self.sink_supported() {
            return Err(Error::Configuration(
                "no trace write support on this platform".into(),
            ));
        }
        if !dir.is_dir() {
            return Err(Error::Configuration(format!(
                "trace directory '{}' does not exist",
                dir.display()
            )));
        }
        self.trace_dir = Some(dir);
        Ok(())
    }

    /// Install the sink traces are handed to.
    pub fn set_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.sink = Some(sink);
    }

    /// Returns `true` if a sink is installed and supports writing.
    pub fn sink_supported(&self) -> bool {
        self.sink.as_ref().is_some_and(|s| s.supported())
    }

    /// Scope trace variables are declared in.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Change the scope trace variables are declared in.
    pub fn set_scope(&mut self, scope: impl Into<String>) {
        self.scope = scope.into();
    }

    /// Whether a finished test's trace will actually be written.
    pub fn traces_enabled(&self) -> bool {
        self.write_trace && self.trace_dir.is_some() && self.sink_supported()
    }

    /// The reset base the time system should use for this DUT.
    ///
    /// When traces are written and the device is monitoring, tests start one
    /// step after zero so initial-state reports queued at time zero come
    /// first.
    pub fn reset_time_hint(&self) -> Option<TimeValue> {
        if !self.write_trace {
            return None;
        }
        if !self.sink_supported() {
            warn!("trace writes enabled but no supported sink installed");
            return None;
        }
        if !self.monitoring {
            warn!(
                dir = ?self.trace_dir,
                "trace writes requested but monitoring is off"
            );
            return None;
        }
        Some(TimeValue::from_steps(1))
    }

    // ---------------------------------------------------------------
    // Observations
    // ---------------------------------------------------------------

    /// Filter `report` through the cache and queue the real changes at
    /// `now`. Returns the filtered report, which may be empty.
    pub fn record(&mut self, now: TimeValue, report: &StateChangeReport) -> StateChangeReport {
        let changes = self.cache.filter_changes(report);
        if !changes.is_empty() {
            self.queue_state_change(now, changes.clone());
        }
        changes
    }

    /// Queue a report as-is.
    pub fn queue_state_change(&mut self, at: TimeValue, report: StateChangeReport) {
        self.queued.push((at, report));
    }

    /// Reports queued for the running test.
    pub fn queued(&self) -> &[(TimeValue, StateChangeReport)] {
        &self.queued
    }

    /// Take every queued report, leaving the queue empty.
    pub fn take_queued(&mut self) -> Vec<(TimeValue, StateChangeReport)> {
        std::mem::take(&mut self.queued)
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Start of a test unit: forget cached values and queued reports, then
    /// queue `initial` at time zero when traces are being written.
    pub fn unit_start(&mut self, test: &str, initial: Vec<StateChangeReport>) {
        self.cache.clear();
        self.queued.clear();
        if !self.traces_enabled() {
            return;
        }
        info!(test, reports = initial.len(), "unit start, capturing initial state");
        for report in initial {
            self.cache.change_event(&report);
            self.queue_state_change(TimeValue::zero(), report);
        }
    }

    /// End of a test unit: keep the queued reports under `test` and, when
    /// enabled, write its trace. Sink failures are logged only.
    ///
    /// Returns the path the trace was written to.
    pub fn unit_done<F>(&mut self, test: &str, width_of: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> u32,
    {
        let reports = self.take_queued();
        debug!(test, reports = reports.len(), "unit done");
        self.per_test.insert(test.to_string(), reports);

        if !self.write_trace {
            return None;
        }
        let Some(dir) = self.trace_dir.clone() else {
            warn!(test, "trace writes enabled but no trace directory set");
            return None;
        };
        let trace = self.trace(test, width_of)?;
        let path = dir.join(trace_file_name(test));
        let sink = self.sink.as_mut()?;
        if !sink.supported() {
            warn!("trace sink does not support writing on this platform");
            return None;
        }
        info!(test, path = %path.display(), "writing trace");
        match sink.write(test, &path, &trace) {
            Ok(()) => Some(path),
            Err(e) => {
                error!(test, path = %path.display(), error = %e, "failed to write trace");
                None
            }
        }
    }

    // ---------------------------------------------------------------
    // Finished tests
    // ---------------------------------------------------------------

    /// Names of the tests whose observations were kept.
    pub fn recorded_tests(&self) -> impl Iterator<Item = &str> {
        self.per_test.keys().map(String::as_str)
    }

    /// Every event recorded during `test`, in order, before coalescing.
    pub fn events(&self, test: &str) -> Option<Vec<Event>> {
        let reports = self.per_test.get(test)?;
        let events = reports
            .iter()
            .flat_map(|(ts, report)| {
                report.all_changes().iter().map(move |(name, value)| Event {
                    timestamp: *ts,
                    name: name.clone(),
                    value: *value,
                })
            })
            .collect();
        Some(events)
    }

    /// The coalesced trace of `test`.
    pub fn trace<F>(&self, test: &str, width_of: F) -> Option<Trace>
    where
        F: Fn(&str) -> u32,
    {
        let reports = self.per_test.get(test)?;
        Some(Trace::from_reports(reports, &self.scope, width_of))
    }

    /// Declarations of the variables that changed during `test`.
    pub fn variables_with_events<F>(&self, test: &str, width_of: F) -> Vec<VarDecl>
    where
        F: Fn(&str) -> u32,
    {
        self.trace(test, width_of)
            .map(|t| t.variables)
            .unwrap_or_default()
    }
}
