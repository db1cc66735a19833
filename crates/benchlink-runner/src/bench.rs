//! Bench -- one DUT, its logical time and the background tasks of a test.
//!
//! The bench is the single thread of control a test body runs on. Test code
//! reads and writes signals through it, and triggers suspend on it by calling
//! [`Bench::tick`] until their condition holds. A tick either steps the
//! background tasks that are due next (advancing logical time to their due
//! time) or, when none is due before the waiting trigger's horizon, performs
//! a short real wait while polling the DUT and advances logical time by the
//! real time it took.
//!
//! Every value written through the bench and every change the DUT reports is
//! appended to an observation log when it differs from the last value seen
//! for that signal. Edge triggers count transitions by walking that log.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, trace};

use benchlink_core::dut::Dut;
use benchlink_core::error::{Error, Result};
use benchlink_core::signal::{Readable, Writeable};
use benchlink_core::time::{TimeSystem, TimeValue};

use crate::clock::Clock;
use crate::trigger::{ClockCycles, Trigger};

/// Bench settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchConfig {
    /// Longest real sleep of one idle tick.
    pub poll_interval: Duration,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// A value change seen by the bench.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Logical time of the observation.
    pub at: TimeValue,
    /// Display name of the signal.
    pub name: String,
    /// The new value.
    pub value: u32,
}

/// Identifies a background task started on a bench.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

/// A task stepped by the bench between foreground suspension points.
#[async_trait]
pub trait Background: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Logical time of the next step, `None` once the task is finished.
    fn next_due(&self) -> Option<TimeValue>;

    /// Run one step. Logical time equals the due time when called.
    async fn step(&mut self, ctx: &mut TaskCtx<'_>) -> Result<()>;
}

/// What a background task may do while stepped.
pub struct TaskCtx<'a> {
    bench: &'a mut Bench,
}

impl TaskCtx<'_> {
    /// Current logical time.
    pub fn now(&self) -> TimeValue {
        self.bench.now()
    }

    /// Read a signal.
    pub async fn read(&mut self, name: &str) -> Result<u32> {
        self.bench.read(name).await
    }

    /// Write a signal.
    pub async fn write(&mut self, name: &str, value: u32) -> Result<()> {
        self.bench.write(name, value).await
    }
}

/// A signal looked up by name, usable through [`Readable`] and
/// [`Writeable`].
pub struct SignalHandle<'a> {
    bench: &'a mut Bench,
    name: String,
}

impl SignalHandle<'_> {
    /// The signal's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flip a single-bit signal. Returns the value written.
    pub async fn toggle(&mut self) -> Result<u32> {
        self.bench.toggle(&self.name).await
    }
}

#[async_trait]
impl<'a> Readable for SignalHandle<'a> {
    async fn read(&mut self) -> Result<u32> {
        self.bench.read(&self.name).await
    }
}

#[async_trait]
impl<'a> Writeable for SignalHandle<'a> {
    async fn write(&mut self, value: u32) -> Result<()> {
        self.bench.write(&self.name, value).await
    }
}

/// The DUT plus everything a running test needs around it.
pub struct Bench {
    dut: Box<dyn Dut>,
    time: TimeSystem,
    config: BenchConfig,
    tasks: Vec<(TaskHandle, Box<dyn Background>)>,
    next_task: u64,
    log: Vec<Observation>,
    last_seen: HashMap<String, u32>,
}

impl Bench {
    /// A bench with default settings.
    pub fn new(dut: Box<dyn Dut>) -> Self {
        Self::with_config(dut, BenchConfig::default())
    }

    /// A bench with explicit settings.
    pub fn with_config(dut: Box<dyn Dut>, config: BenchConfig) -> Self {
        Self {
            dut,
            time: TimeSystem::new(),
            config,
            tasks: Vec::new(),
            next_task: 0,
            log: Vec::new(),
            last_seen: HashMap::new(),
        }
    }

    /// Current logical time.
    pub fn now(&self) -> TimeValue {
        self.time.current()
    }

    /// The bench's clock and test deadline.
    pub fn time(&self) -> &TimeSystem {
        &self.time
    }

    /// Mutable time, for the runner to reset and set deadlines.
    pub fn time_mut(&mut self) -> &mut TimeSystem {
        &mut self.time
    }

    /// Settings the bench was built with.
    pub fn config(&self) -> BenchConfig {
        self.config
    }

    /// The device under test.
    pub fn dut(&self) -> &dyn Dut {
        self.dut.as_ref()
    }

    /// The device under test, mutably.
    pub fn dut_mut(&mut self) -> &mut dyn Dut {
        self.dut.as_mut()
    }

    /// Give the DUT back.
    pub fn into_dut(self) -> Box<dyn Dut> {
        self.dut
    }

    // ---------------------------------------------------------------
    // Observations
    // ---------------------------------------------------------------

    /// Everything observed since the log was last cleared.
    pub fn observations(&self) -> &[Observation] {
        &self.log
    }

    /// Last value seen for a signal, by display name.
    pub fn last_value(&self, name: &str) -> Option<u32> {
        self.last_seen.get(name).copied()
    }

    /// Forget all observations. The runner calls this at every test start.
    pub fn clear_observations(&mut self) {
        self.log.clear();
        self.last_seen.clear();
    }

    fn observe(&mut self, name: &str, value: u32) {
        if self.last_seen.get(name) == Some(&value) {
            return;
        }
        trace!(signal = name, value, at = %self.now(), "observed");
        self.last_seen.insert(name.to_string(), value);
        self.log.push(Observation {
            at: self.now(),
            name: name.to_string(),
            value,
        });
    }

    /// Resolve a name or alias to the name reports use.
    pub fn display_name(&self, name: &str) -> Result<String> {
        self.dut
            .signal_info(name)
            .map(|s| s.display_name().to_string())
            .ok_or_else(|| Error::UnknownSignal(name.to_string()))
    }

    // ---------------------------------------------------------------
    // Signal access
    // ---------------------------------------------------------------

    /// Look a signal up by name or alias.
    pub fn signal(&mut self, name: &str) -> Result<SignalHandle<'_>> {
        let name = self.display_name(name)?;
        Ok(SignalHandle { bench: self, name })
    }

    /// Read a signal from the DUT.
    pub async fn read(&mut self, name: &str) -> Result<u32> {
        let display = self.display_name(name)?;
        let now = self.now();
        let value = self.dut.read(name, now).await?;
        self.observe(&display, value);
        Ok(value)
    }

    /// Write a signal on the DUT. The value is visible to every trigger
    /// evaluated afterwards.
    pub async fn write(&mut self, name: &str, value: u32) -> Result<()> {
        let display = self.display_name(name)?;
        let now = self.now();
        self.dut.write(name, value, now).await?;
        self.observe(&display, value);
        Ok(())
    }

    /// Flip a single-bit signal. Returns the value written.
    pub async fn toggle(&mut self, name: &str) -> Result<u32> {
        let display = self.display_name(name)?;
        let current = match self.last_seen.get(&display).copied() {
            Some(v) => v,
            None => self.read(name).await?,
        };
        let next = if current != 0 { 0 } else { 1 };
        self.write(name, next).await?;
        Ok(next)
    }

    /// Fetch the DUT's pending state changes into the observation log.
    pub async fn poll(&mut self) -> Result<()> {
        let now = self.now();
        let reports = self.dut.poll_state_changes(now).await?;
        for report in &reports {
            for (name, value) in report.all_changes() {
                self.observe(name, *value);
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Background tasks
    // ---------------------------------------------------------------

    /// Start a background task. It is stepped from the next tick on.
    pub fn start_task(&mut self, task: Box<dyn Background>) -> TaskHandle {
        let handle = TaskHandle(self.next_task);
        self.next_task += 1;
        debug!(task = task.name(), at = %self.now(), "starting background task");
        self.tasks.push((handle, task));
        handle
    }

    /// Start a clock on `signal`: high at once, toggling every half period.
    pub fn start_clock(&mut self, signal: &str, period: TimeValue) -> Result<TaskHandle> {
        let name = self.display_name(signal)?;
        let clock = Clock::new(&name, period, self.now())?;
        Ok(self.start_task(Box::new(clock)))
    }

    /// Stop one task. Returns `false` if it was not running.
    pub fn stop_task(&mut self, handle: TaskHandle) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|(h, _)| *h != handle);
        before != self.tasks.len()
    }

    /// Drop every background task.
    pub fn clear_tasks(&mut self) {
        if !self.tasks.is_empty() {
            debug!(count = self.tasks.len(), "clearing background tasks");
        }
        self.tasks.clear();
    }

    /// Number of running background tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    // ---------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------

    /// Wait on a trigger.
    ///
    /// Edge triggers built with `new` arm on their first wait, so a
    /// `ClockCycles::new` passed here counts edges from this call on. Use
    /// [`Bench::clock_cycles`] to count from an earlier point instead.
    pub async fn wait<T: Trigger>(&mut self, mut trigger: T) -> Result<()> {
        trigger.wait(self).await
    }

    /// An edge counter armed now: only edges after this call count.
    pub async fn clock_cycles(&mut self, signal: &str, count: u32) -> Result<ClockCycles> {
        let mut trigger = ClockCycles::new(signal, count);
        trigger.arm(self).await?;
        Ok(trigger)
    }

    /// One scheduling step for a trigger that is still waiting.
    ///
    /// `horizon` is the latest logical time the trigger cares about; tasks
    /// due after it, or after the test deadline, are not stepped. `watch` names the signal an edge
    /// trigger is waiting on, which is read directly when the DUT is not
    /// monitoring.
    pub async fn tick(&mut self, horizon: Option<TimeValue>, watch: Option<&str>) -> Result<()> {
        // Nothing due after the deadline runs; the waiting trigger times out
        // first.
        let horizon = match (horizon, self.time.timeout()) {
            (Some(h), Some(d)) => Some(h.min(d)),
            (h, d) => h.or(d),
        };
        let due = self
            .tasks
            .iter()
            .filter_map(|(_, t)| t.next_due())
            .min()
            .filter(|d| horizon.is_none_or(|h| *d <= h));

        match due {
            Some(due) => {
                self.step_tasks(due).await?;
                self.sample(watch).await
            }
            None => self.idle_wait(horizon, watch).await,
        }
    }

    async fn step_tasks(&mut self, due: TimeValue) -> Result<()> {
        self.time.advance_to(due);
        let mut tasks = std::mem::take(&mut self.tasks);
        let mut result = Ok(());
        for (_, task) in tasks.iter_mut() {
            if !task.next_due().is_some_and(|d| d <= due) {
                continue;
            }
            trace!(task = task.name(), at = %self.now(), "stepping");
            let mut ctx = TaskCtx { bench: &mut *self };
            if let Err(e) = task.step(&mut ctx).await {
                result = Err(e);
                break;
            }
        }
        tasks.retain(|(_, t)| t.next_due().is_some());
        tasks.append(&mut self.tasks);
        self.tasks = tasks;
        result
    }

    async fn sample(&mut self, watch: Option<&str>) -> Result<()> {
        self.poll().await?;
        if let Some(name) = watch {
            if !self.dut.is_monitoring() {
                self.read(name).await?;
            }
        }
        Ok(())
    }

    /// Poll, sleep for at most the poll interval and move logical time by
    /// the real time spent, never past the horizon or the deadline.
    async fn idle_wait(&mut self, horizon: Option<TimeValue>, watch: Option<&str>) -> Result<()> {
        let started = Instant::now();
        let now = self.now();
        self.sample(watch).await?;

        let limit = match (horizon, self.time.timeout()) {
            (Some(h), Some(d)) => Some(h.min(d)),
            (h, d) => h.or(d),
        };
        if limit.is_some_and(|l| l <= now) {
            return Ok(());
        }

        let poll = self.config.poll_interval;
        let (wait, reaches_limit) = match limit {
            Some(l) => {
                let remaining = l.saturating_sub(now).to_duration();
                if remaining <= poll {
                    (remaining, true)
                } else {
                    (poll, false)
                }
            }
            None => (poll, false),
        };
        let spent = started.elapsed();
        if wait > spent {
            tokio::time::sleep(wait - spent).await;
        }

        let mut target = now + TimeValue::from_duration(started.elapsed());
        if let Some(l) = limit {
            if reaches_limit || target > l {
                target = l;
            }
        }
        self.time.advance_to(target);
        Ok(())
    }
}
