//! Logical time: units, values and the per-run [`TimeSystem`].
//!
//! A [`TimeValue`] is stored as an integer number of steps (one step is one
//! picosecond) together with the unit it was expressed in, so comparisons
//! across units are exact while display keeps the author's unit. Logical
//! time only moves when triggers and background tasks advance it; it never
//! drifts with the wall clock on its own.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Add;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Steps (picoseconds) per nanosecond.
pub const STEPS_PER_NS: u64 = 1_000;
/// Steps (picoseconds) per microsecond.
pub const STEPS_PER_US: u64 = 1_000_000;
/// Steps (picoseconds) per millisecond.
pub const STEPS_PER_MS: u64 = 1_000_000_000;
/// Steps (picoseconds) per second.
pub const STEPS_PER_SEC: u64 = 1_000_000_000_000;

/// Unit a [`TimeValue`] is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeUnit {
    /// The base resolution: one picosecond.
    Step,
    /// Nanoseconds.
    Ns,
    /// Microseconds.
    Us,
    /// Milliseconds.
    Ms,
    /// Seconds.
    Sec,
}

impl TimeUnit {
    /// Number of steps in one of this unit.
    pub fn steps(self) -> u64 {
        match self {
            TimeUnit::Step => 1,
            TimeUnit::Ns => STEPS_PER_NS,
            TimeUnit::Us => STEPS_PER_US,
            TimeUnit::Ms => STEPS_PER_MS,
            TimeUnit::Sec => STEPS_PER_SEC,
        }
    }

    /// Short symbol used for display and parsing.
    pub fn symbol(self) -> &'static str {
        match self {
            TimeUnit::Step => "step",
            TimeUnit::Ns => "ns",
            TimeUnit::Us => "us",
            TimeUnit::Ms => "ms",
            TimeUnit::Sec => "sec",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "step" | "steps" => Ok(TimeUnit::Step),
            "ns" => Ok(TimeUnit::Ns),
            "us" => Ok(TimeUnit::Us),
            "ms" => Ok(TimeUnit::Ms),
            "sec" | "secs" | "s" => Ok(TimeUnit::Sec),
            other => Err(Error::Configuration(format!("unknown time unit '{other}'"))),
        }
    }
}

/// A non-negative amount of logical time.
///
/// Equality, ordering and hashing consider only the amount, never the
/// display unit: `1 ms == 1000 us`.
#[derive(Debug, Clone, Copy)]
pub struct TimeValue {
    steps: u64,
    unit: TimeUnit,
}

impl TimeValue {
    /// Time zero, displayed in steps.
    pub const fn zero() -> Self {
        Self {
            steps: 0,
            unit: TimeUnit::Step,
        }
    }

    /// Creates a time value from an integer magnitude.
    pub fn new(magnitude: u64, unit: TimeUnit) -> Self {
        Self {
            steps: magnitude.saturating_mul(unit.steps()),
            unit,
        }
    }

    /// Creates a time value from a fractional magnitude (e.g. `0.515 sec`).
    ///
    /// Negative and non-finite magnitudes are rejected. The amount is
    /// rounded to the nearest step.
    pub fn from_f64(magnitude: f64, unit: TimeUnit) -> Result<Self> {
        if !magnitude.is_finite() || magnitude < 0.0 {
            return Err(Error::Configuration(format!(
                "time magnitude must be a non-negative number, got {magnitude}"
            )));
        }
        let steps = (magnitude * unit.steps() as f64).round();
        Ok(Self {
            steps: steps as u64,
            unit,
        })
    }

    /// Creates a time value from a raw step count.
    pub const fn from_steps(steps: u64) -> Self {
        Self {
            steps,
            unit: TimeUnit::Step,
        }
    }

    /// Converts a wall-clock duration into logical time.
    pub fn from_duration(d: Duration) -> Self {
        let steps = (d.as_nanos().saturating_mul(STEPS_PER_NS as u128)).min(u64::MAX as u128);
        Self::from_steps(steps as u64).rebased()
    }

    /// Converts to a wall-clock duration (truncated to whole nanoseconds).
    pub fn to_duration(&self) -> Duration {
        Duration::from_nanos(self.steps / STEPS_PER_NS)
    }

    /// Raw amount in steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// The unit this value is displayed in.
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// The magnitude in this value's own unit.
    pub fn magnitude(&self) -> f64 {
        self.in_unit(self.unit)
    }

    /// The magnitude expressed in another unit.
    pub fn in_unit(&self, unit: TimeUnit) -> f64 {
        self.steps as f64 / unit.steps() as f64
    }

    /// The same amount expressed in a different unit.
    pub fn with_unit(&self, unit: TimeUnit) -> Self {
        Self {
            steps: self.steps,
            unit,
        }
    }

    /// The same amount in the largest unit whose magnitude is at least one.
    pub fn rebased(&self) -> Self {
        if self.steps == 0 {
            return *self;
        }
        let unit = [TimeUnit::Sec, TimeUnit::Ms, TimeUnit::Us, TimeUnit::Ns]
            .into_iter()
            .find(|u| self.steps >= u.steps())
            .unwrap_or(TimeUnit::Step);
        self.with_unit(unit)
    }

    /// Subtraction that stops at zero.
    pub fn saturating_sub(&self, other: TimeValue) -> Self {
        Self {
            steps: self.steps.saturating_sub(other.steps),
            unit: self.unit,
        }
    }

    /// Returns `true` for time zero.
    pub fn is_zero(&self) -> bool {
        self.steps == 0
    }
}

impl Default for TimeValue {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialEq for TimeValue {
    fn eq(&self, other: &Self) -> bool {
        self.steps == other.steps
    }
}

impl Eq for TimeValue {}

impl Hash for TimeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.steps.hash(state);
    }
}

impl Ord for TimeValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.steps.cmp(&other.steps)
    }
}

impl PartialOrd for TimeValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for TimeValue {
    type Output = TimeValue;

    fn add(self, rhs: TimeValue) -> TimeValue {
        // Keep the coarser of the two units for display.
        let unit = if self.is_zero() {
            rhs.unit
        } else {
            self.unit.max(rhs.unit)
        };
        TimeValue {
            steps: self.steps.saturating_add(rhs.steps),
            unit,
        }
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude(), self.unit)
    }
}

/// Logical time for one test run.
///
/// Reset at the start of every test case. An optional deadline makes
/// [`is_timed_out`](TimeSystem::is_timed_out) report once logical time has
/// reached it.
#[derive(Debug, Clone, Default)]
pub struct TimeSystem {
    now: TimeValue,
    reset_base: TimeValue,
    deadline: Option<TimeValue>,
}

impl TimeSystem {
    /// A time system at zero with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time.
    pub fn current(&self) -> TimeValue {
        self.now
    }

    /// Go back to the reset base (zero unless changed with
    /// [`set_reset_time`](TimeSystem::set_reset_time)).
    pub fn reset(&mut self) {
        self.now = self.reset_base;
    }

    /// Go back to an explicit time.
    pub fn reset_to(&mut self, to: TimeValue) {
        self.now = to;
    }

    /// Change the base used by [`reset`](TimeSystem::reset).
    pub fn set_reset_time(&mut self, base: TimeValue) {
        self.reset_base = base;
    }

    /// The base used by [`reset`](TimeSystem::reset).
    pub fn reset_time(&self) -> TimeValue {
        self.reset_base
    }

    /// Move time forward by `by`.
    pub fn advance(&mut self, by: TimeValue) {
        self.now = self.now + by;
    }

    /// Move time forward to `to`. Earlier times are ignored; time never
    /// goes backwards.
    pub fn advance_to(&mut self, to: TimeValue) {
        if to > self.now {
            self.now = TimeValue {
                steps: to.steps,
                unit: self.now.unit.max(to.unit),
            };
        }
    }

    /// Arm an absolute deadline.
    pub fn set_timeout(&mut self, deadline: TimeValue) {
        self.deadline = Some(deadline);
    }

    /// Disarm the deadline.
    pub fn clear_timeout(&mut self) {
        self.deadline = None;
    }

    /// The armed deadline, if any.
    pub fn timeout(&self) -> Option<TimeValue> {
        self.deadline
    }

    /// Returns `true` once logical time has reached the armed deadline.
    pub fn is_timed_out(&self) -> bool {
        self.deadline.is_some_and(|d| self.now >= d)
    }

    /// Time left before the deadline, `None` when no deadline is armed.
    pub fn remaining_until_timeout(&self) -> Option<TimeValue> {
        self.deadline.map(|d| d.saturating_sub(self.now))
    }

    /// The timeout error for the current instant, if the deadline passed.
    pub fn timeout_error(&self) -> Option<Error> {
        match self.deadline {
            Some(limit) if self.now >= limit => Some(Error::TestTimeout {
                at: self.now.rebased(),
                limit: limit.rebased(),
            }),
            _ => None,
        }
    }
}
