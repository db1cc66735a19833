//! Per-test event traces and the sink they are handed to.
//!
//! The monitor turns the timestamped [`StateChangeReport`]s queued during a
//! test into an ordered list of [`Event`]s plus the [`VarDecl`]s a waveform
//! writer needs to declare. Serializing that to VCD (or anything else) is the
//! job of a [`TraceSink`] supplied by the embedding application.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::state::StateChangeReport;
use crate::time::TimeValue;

/// One value change of one variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Logical time of the change.
    pub timestamp: TimeValue,
    /// Variable (signal or alias) name.
    pub name: String,
    /// New value.
    pub value: u32,
}

/// Declaration of a variable that has at least one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    /// Variable name.
    pub name: String,
    /// Bit width.
    pub width: u32,
    /// Enclosing scope (module name in the waveform).
    pub scope: String,
}

/// Everything a sink needs to write one test's waveform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    /// Events in time order, consecutive duplicates removed.
    pub events: Vec<Event>,
    /// Variables with at least one event, in order of first appearance.
    pub variables: Vec<VarDecl>,
}

impl Trace {
    /// Build a trace from timestamped reports.
    ///
    /// A change that repeats the previous value of the same variable is
    /// dropped. `width_of` supplies each variable's bit width.
    pub fn from_reports<'a, I, F>(reports: I, scope: &str, width_of: F) -> Self
    where
        I: IntoIterator<Item = &'a (TimeValue, StateChangeReport)>,
        F: Fn(&str) -> u32,
    {
        let mut trace = Trace::default();
        let mut last: Vec<(String, u32)> = Vec::new();

        for (ts, report) in reports {
            for (name, value) in report.all_changes() {
                match last.iter_mut().find(|(n, _)| n == name) {
                    Some((_, prev)) if *prev == *value => continue,
                    Some((_, prev)) => *prev = *value,
                    None => {
                        last.push((name.clone(), *value));
                        trace.variables.push(VarDecl {
                            name: name.clone(),
                            width: width_of(name),
                            scope: scope.to_string(),
                        });
                    }
                }
                trace.events.push(Event {
                    timestamp: *ts,
                    name: name.clone(),
                    value: *value,
                });
            }
        }
        trace
    }

    /// Names of the variables with events.
    pub fn variables_with_events(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    /// Returns `true` when nothing happened.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// File name (without directory) a test's trace is written to: every run of
/// non-alphanumeric characters becomes `_`, then `.vcd` is appended.
pub fn trace_file_name(test_name: &str) -> String {
    let mut out = String::with_capacity(test_name.len() + 4);
    let mut in_run = false;
    for c in test_name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out.push_str(".vcd");
    out
}

/// Consumer of finished traces.
pub trait TraceSink: Send {
    /// Whether this sink can write on the current platform.
    fn supported(&self) -> bool {
        true
    }

    /// Write the trace of `test_name` to `path`.
    fn write(&mut self, test_name: &str, path: &Path, trace: &Trace) -> Result<()>;
}

/// A written trace captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedTrace {
    /// The test the trace belongs to.
    pub test_name: String,
    /// Where a file sink would have written it.
    pub path: PathBuf,
    /// The trace itself.
    pub trace: Trace,
}

/// A [`TraceSink`] that keeps traces in memory.
///
/// Clones share storage, so a clone kept by the caller sees everything
/// written through the clone handed to the monitor.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    captured: Arc<Mutex<Vec<CapturedTrace>>>,
}

impl MemorySink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn captured(&self) -> Vec<CapturedTrace> {
        self.captured
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl TraceSink for MemorySink {
    fn write(&mut self, test_name: &str, path: &Path, trace: &Trace) -> Result<()> {
        let mut guard = self
            .captured
            .lock()
            .map_err(|_| Error::Configuration("memory sink poisoned".into()))?;
        guard.push(CapturedTrace {
            test_name: test_name.to_string(),
            path: path.to_path_buf(),
            trace: trace.clone(),
        });
        Ok(())
    }
}
