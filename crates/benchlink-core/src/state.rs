//! Batched signal observations and the last-value cache.
//!
//! A [`StateChangeReport`] is one batch of `name -> value` observations,
//! produced by one decode pass over the device's event stream or by the
//! bookkeeping done around a write. A [`StateCache`] remembers the last value
//! seen for each signal so that only real changes reach the trace.

use std::collections::HashMap;
use std::fmt;

/// An insertion-ordered batch of signal observations.
///
/// If the same signal is reported more than once in a batch the last value
/// wins, but [`num_changes`](StateChangeReport::num_changes) still counts
/// every observed transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateChangeReport {
    changes: Vec<(String, u32)>,
    num_changes: usize,
}

impl StateChangeReport {
    /// An empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value for `name`.
    pub fn add_change(&mut self, name: &str, value: u32) -> &mut Self {
        match self.changes.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.changes.push((name.to_string(), value)),
        }
        self.num_changes += 1;
        self
    }

    /// Builder-style variant of [`add_change`](StateChangeReport::add_change).
    pub fn with_change(mut self, name: &str, value: u32) -> Self {
        self.add_change(name, value);
        self
    }

    /// Names of the signals in this report, in first-seen order.
    pub fn changed(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|(n, _)| n.as_str())
    }

    /// Every `(name, value)` entry, in first-seen order.
    pub fn all_changes(&self) -> &[(String, u32)] {
        &self.changes
    }

    /// The value reported for `name`, if present.
    pub fn get(&self, name: &str) -> Option<u32> {
        self.changes.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    /// Returns `true` if `name` is part of this report.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of distinct signals in the report.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns `true` if nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Total transitions observed, counting repeats of the same signal.
    pub fn num_changes(&self) -> usize {
        self.num_changes
    }
}

impl fmt::Display for StateChangeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.changes.is_empty() {
            return write!(f, "StateChangeReport: no changes");
        }
        write!(
            f,
            "StateChangeReport ({} signals in {} events):",
            self.changes.len(),
            self.num_changes
        )?;
        for (name, value) in &self.changes {
            write!(f, "\n{name} = {value:#x}")?;
        }
        Ok(())
    }
}

/// Last observed value per signal.
#[derive(Debug, Clone, Default)]
pub struct StateCache {
    last_vals: HashMap<String, u32>,
}

impl StateCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.last_vals.clear();
    }

    /// Returns `true` if a value for `name` is known.
    pub fn has(&self, name: &str) -> bool {
        self.last_vals.contains_key(name)
    }

    /// The last value seen for `name`.
    pub fn get(&self, name: &str) -> Option<u32> {
        self.last_vals.get(name).copied()
    }

    /// Remember `value` for `name`.
    pub fn set(&mut self, name: &str, value: u32) {
        self.last_vals.insert(name.to_string(), value);
    }

    /// Remember every value in `report`.
    pub fn change_event(&mut self, report: &StateChangeReport) {
        for (name, value) in report.all_changes() {
            self.set(name, *value);
        }
    }

    /// Returns `true` if `value` differs from what is cached for `name`
    /// (or nothing is cached yet).
    pub fn is_change(&self, name: &str, value: u32) -> bool {
        self.get(name) != Some(value)
    }

    /// Keep only the entries of `report` that are real changes, updating the
    /// cache with them.
    pub fn filter_changes(&mut self, report: &StateChangeReport) -> StateChangeReport {
        let mut out = StateChangeReport::new();
        for (name, value) in report.all_changes() {
            if self.is_change(name, *value) {
                self.set(name, *value);
                out.add_change(name, *value);
            }
        }
        out
    }
}
