//! Triggers -- conditions a test body suspends on.
//!
//! Every trigger loops the same way: check its condition, then check the
//! test deadline, then let the bench [`tick`](Bench::tick). A deadline that
//! passes before the condition holds turns the wait into
//! [`Error::TestTimeout`](benchlink_core::Error::TestTimeout).

use async_trait::async_trait;
use tracing::debug;

use benchlink_core::error::Result;
use benchlink_core::time::{TimeUnit, TimeValue};

use crate::bench::Bench;

/// A condition the foreground task can wait on.
#[async_trait]
pub trait Trigger: Send {
    /// Suspend until the condition holds or the deadline passes.
    async fn wait(&mut self, bench: &mut Bench) -> Result<()>;
}

#[async_trait]
impl<T: Trigger + ?Sized> Trigger for &mut T {
    async fn wait(&mut self, bench: &mut Bench) -> Result<()> {
        (**self).wait(bench).await
    }
}

// ---------------------------------------------------------------
// Timer
// ---------------------------------------------------------------

/// Resumes once logical time has moved forward by a fixed amount.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    duration: TimeValue,
}

impl Timer {
    /// Wait `magnitude` units of logical time.
    pub fn new(magnitude: u64, unit: TimeUnit) -> Self {
        Self::from_value(TimeValue::new(magnitude, unit))
    }

    /// Wait for an already built duration.
    pub fn from_value(duration: TimeValue) -> Self {
        Self { duration }
    }

    /// How long each wait lasts.
    pub fn duration(&self) -> TimeValue {
        self.duration
    }
}

#[async_trait]
impl Trigger for Timer {
    async fn wait(&mut self, bench: &mut Bench) -> Result<()> {
        let target = bench.now() + self.duration;
        loop {
            if bench.now() >= target {
                return Ok(());
            }
            if let Some(e) = bench.time().timeout_error() {
                debug!(duration = %self.duration, "timer timed out");
                return Err(e);
            }
            bench.tick(Some(target), None).await?;
        }
    }
}

// ---------------------------------------------------------------
// Edges
// ---------------------------------------------------------------

/// Which transitions an edge trigger counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Polarity {
    /// Zero to non-zero.
    #[default]
    Rising,
    /// Non-zero to zero.
    Falling,
    /// Any change of value.
    Any,
}

impl Polarity {
    /// Returns `true` if going from `prev` to `next` is an edge of this
    /// polarity.
    pub fn matches(self, prev: u32, next: u32) -> bool {
        match self {
            Polarity::Rising => prev == 0 && next != 0,
            Polarity::Falling => prev != 0 && next == 0,
            Polarity::Any => prev != next,
        }
    }
}

/// Resumes after exactly `count` edges of a signal.
///
/// Only edges after arming count. A trigger made with
/// [`Bench::clock_cycles`] is armed at creation; one made with
/// [`ClockCycles::new`] arms when first waited on. Waiting again through
/// `&mut` counts the next `count` edges.
#[derive(Debug, Clone)]
pub struct ClockCycles {
    signal: String,
    count: u32,
    polarity: Polarity,
    armed: bool,
    cursor: usize,
    previous: Option<u32>,
}

impl ClockCycles {
    /// Count `count` rising edges of `signal`.
    pub fn new(signal: &str, count: u32) -> Self {
        Self {
            signal: signal.to_string(),
            count,
            polarity: Polarity::Rising,
            armed: false,
            cursor: 0,
            previous: None,
        }
    }

    /// Count edges of another polarity.
    pub fn polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// The watched signal; its display name once armed.
    pub fn signal(&self) -> &str {
        &self.signal
    }

    /// Edges to wait for per `wait`.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Whether the starting point for counting is fixed.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Start counting from now. The signal's current value is taken from
    /// the bench's observations, or read from the DUT if never seen.
    pub async fn arm(&mut self, bench: &mut Bench) -> Result<()> {
        let name = bench.display_name(&self.signal)?;
        let previous = match bench.last_value(&name) {
            Some(v) => v,
            None => bench.read(&name).await?,
        };
        self.signal = name;
        self.previous = Some(previous);
        self.cursor = bench.observations().len();
        self.armed = true;
        Ok(())
    }

    /// Walk new observations; `true` once `count` edges were seen.
    fn scan(&mut self, bench: &Bench, seen: &mut u32) -> bool {
        let log = bench.observations();
        while self.cursor < log.len() {
            let obs = &log[self.cursor];
            self.cursor += 1;
            if obs.name != self.signal {
                continue;
            }
            if let Some(prev) = self.previous {
                if self.polarity.matches(prev, obs.value) {
                    *seen += 1;
                }
            }
            self.previous = Some(obs.value);
            if *seen >= self.count {
                return true;
            }
        }
        false
    }
}

#[async_trait]
impl Trigger for ClockCycles {
    async fn wait(&mut self, bench: &mut Bench) -> Result<()> {
        if !self.armed {
            self.arm(bench).await?;
        }
        let mut seen = 0;
        loop {
            if seen >= self.count || self.scan(bench, &mut seen) {
                return Ok(());
            }
            if let Some(e) = bench.time().timeout_error() {
                debug!(signal = %self.signal, seen, wanted = self.count, "edge wait timed out");
                return Err(e);
            }
            bench.tick(None, Some(&self.signal)).await?;
        }
    }
}

/// Resumes at the next rising edge of a signal.
#[derive(Debug, Clone)]
pub struct RisingEdge(ClockCycles);

impl RisingEdge {
    /// Armed when first waited on.
    pub fn new(signal: &str) -> Self {
        Self(ClockCycles::new(signal, 1).polarity(Polarity::Rising))
    }
}

#[async_trait]
impl Trigger for RisingEdge {
    async fn wait(&mut self, bench: &mut Bench) -> Result<()> {
        self.0.wait(bench).await
    }
}

/// Resumes at the next falling edge of a signal.
#[derive(Debug, Clone)]
pub struct FallingEdge(ClockCycles);

impl FallingEdge {
    /// Armed when first waited on.
    pub fn new(signal: &str) -> Self {
        Self(ClockCycles::new(signal, 1).polarity(Polarity::Falling))
    }
}

#[async_trait]
impl Trigger for FallingEdge {
    async fn wait(&mut self, bench: &mut Bench) -> Result<()> {
        self.0.wait(bench).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{Background, TaskCtx};
    use benchlink_bridge::BridgeBuilder;
    use benchlink_core::Error;
    use benchlink_test_harness::MockBridge;

    fn us(n: u64) -> TimeValue {
        TimeValue::new(n, TimeUnit::Us)
    }

    fn ns(n: u64) -> TimeValue {
        TimeValue::new(n, TimeUnit::Ns)
    }

    async fn bench_on(device: &MockBridge, monitoring: bool) -> Bench {
        let dut = BridgeBuilder::new()
            .monitoring(monitoring)
            .build_with_transport(Box::new(device.clone()))
            .await
            .unwrap();
        Bench::new(Box::new(dut))
    }

    /// Flips a signal every `every`, unrelated to the clock.
    struct Noise {
        signal: &'static str,
        every: TimeValue,
        next: TimeValue,
        level: u32,
    }

    #[async_trait]
    impl Background for Noise {
        fn name(&self) -> &str {
            "noise"
        }

        fn next_due(&self) -> Option<TimeValue> {
            Some(self.next)
        }

        async fn step(&mut self, ctx: &mut TaskCtx<'_>) -> Result<()> {
            self.level ^= 1;
            ctx.write(self.signal, self.level).await?;
            self.next = ctx.now() + self.every;
            Ok(())
        }
    }

    #[test]
    fn polarity_rules() {
        assert!(Polarity::Rising.matches(0, 1));
        assert!(Polarity::Rising.matches(0, 7));
        assert!(!Polarity::Rising.matches(3, 7));
        assert!(Polarity::Falling.matches(4, 0));
        assert!(!Polarity::Falling.matches(0, 0));
        assert!(Polarity::Any.matches(3, 7));
        assert!(!Polarity::Any.matches(7, 7));
    }

    #[tokio::test(start_paused = true)]
    async fn clock_cycles_resume_on_exact_edge() {
        let device = MockBridge::tiny_tapeout();
        let mut bench = bench_on(&device, true).await;
        bench.start_clock("clk", us(10)).unwrap();
        bench.start_task(Box::new(Noise {
            signal: "ena",
            every: us(3),
            next: us(1),
            level: 0,
        }));

        // High at 0, then rising every 10us: the fifth edge is at 40us.
        let cycles = bench.clock_cycles("clk", 5).await.unwrap();
        bench.wait(cycles).await.unwrap();
        assert_eq!(bench.now(), us(40));

        bench.wait(RisingEdge::new("clk")).await.unwrap();
        assert_eq!(bench.now(), us(50));
        bench.wait(FallingEdge::new("clk")).await.unwrap();
        assert_eq!(bench.now(), us(55));
        bench
            .wait(ClockCycles::new("clk", 2).polarity(Polarity::Falling))
            .await
            .unwrap();
        assert_eq!(bench.now(), us(75));
    }

    #[tokio::test(start_paused = true)]
    async fn new_counter_arms_on_first_wait() {
        let device = MockBridge::tiny_tapeout();
        let mut bench = bench_on(&device, true).await;
        bench.start_clock("clk", us(10)).unwrap();

        // Rising edges at 0 and 10us happen before the wait.
        let early = bench.clock_cycles("clk", 2).await.unwrap();
        assert!(early.is_armed());
        bench.wait(Timer::new(12, TimeUnit::Us)).await.unwrap();
        bench.wait(early).await.unwrap();
        assert_eq!(bench.now(), us(12));

        let late = ClockCycles::new("clk", 2);
        assert!(!late.is_armed());
        bench.wait(late).await.unwrap();
        assert_eq!(bench.now(), us(30));
    }

    #[tokio::test(start_paused = true)]
    async fn reused_trigger_counts_next_edges() {
        let device = MockBridge::tiny_tapeout();
        let mut bench = bench_on(&device, true).await;
        bench.start_clock("clk", us(2)).unwrap();
        let mut cycles = bench.clock_cycles("clk", 3).await.unwrap();
        bench.wait(&mut cycles).await.unwrap();
        assert_eq!(bench.now(), us(4));
        bench.wait(&mut cycles).await.unwrap();
        assert_eq!(bench.now(), us(10));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_cycles_resume_at_once() {
        let device = MockBridge::tiny_tapeout();
        let mut bench = bench_on(&device, true).await;
        bench.wait(ClockCycles::new("clk", 0)).await.unwrap();
        assert!(bench.now().is_zero());
    }

    #[tokio::test(start_paused = true)]
    async fn edges_found_by_polling_without_monitoring() {
        let device = MockBridge::tiny_tapeout();
        device.link("ui_in", "uo_out", |v, _| v);
        let mut bench = bench_on(&device, false).await;
        bench.start_clock("ui_in", us(10)).unwrap();

        bench.wait(ClockCycles::new("uo_out", 3)).await.unwrap();
        assert_eq!(bench.now(), us(20));
    }

    #[tokio::test(start_paused = true)]
    async fn edges_follow_aliases() {
        let device = MockBridge::tiny_tapeout();
        let dut = BridgeBuilder::new()
            .monitoring(true)
            .alias("sysclk", "clk")
            .build_with_transport(Box::new(device.clone()))
            .await
            .unwrap();
        let mut bench = Bench::new(Box::new(dut));
        bench.start_clock("clk", us(10)).unwrap();
        bench.wait(ClockCycles::new("sysclk", 2)).await.unwrap();
        assert_eq!(bench.now(), us(10));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_resumes_at_duration() {
        let device = MockBridge::tiny_tapeout();
        let mut bench = bench_on(&device, true).await;
        bench.wait(Timer::new(2500, TimeUnit::Us)).await.unwrap();
        assert_eq!(bench.now(), us(2500));

        bench.start_clock("clk", us(1)).unwrap();
        bench.wait(Timer::new(7, TimeUnit::Us)).await.unwrap();
        assert_eq!(bench.now(), us(2507));
        bench.wait(Timer::new(250, TimeUnit::Ns)).await.unwrap();
        assert_eq!(bench.now(), us(2507) + ns(250));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timer_does_not_tick() {
        let device = MockBridge::tiny_tapeout();
        let mut bench = bench_on(&device, true).await;
        bench.start_clock("clk", us(1)).unwrap();
        bench.wait(Timer::new(0, TimeUnit::Ns)).await.unwrap();
        assert!(bench.observations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn edge_wait_times_out() {
        let device = MockBridge::tiny_tapeout();
        let mut bench = bench_on(&device, true).await;
        bench.time_mut().set_timeout(us(20));
        bench.start_clock("clk", us(10)).unwrap();
        let err = bench.wait(ClockCycles::new("clk", 100)).await.unwrap_err();
        assert!(err.is_test_timeout());
        assert!(bench.now() >= us(20));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_times_out_at_deadline() {
        let device = MockBridge::tiny_tapeout();
        let mut bench = bench_on(&device, true).await;
        bench.time_mut().set_timeout(us(5));
        let err = bench.wait(Timer::new(1, TimeUnit::Ms)).await.unwrap_err();
        assert!(matches!(err, Error::TestTimeout { .. }));
        assert_eq!(bench.now(), us(5));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_times_out_between_clock_steps() {
        let device = MockBridge::tiny_tapeout();
        let mut bench = bench_on(&device, true).await;
        bench.time_mut().set_timeout(us(5));
        // High at 0, next toggle at 10us, after the deadline.
        bench.start_clock("clk", us(20)).unwrap();
        let err = bench.wait(Timer::new(10, TimeUnit::Us)).await.unwrap_err();
        assert!(err.is_test_timeout());
        assert_eq!(bench.now(), us(5));
        assert_eq!(device.value("clk"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn edge_after_deadline_does_not_resume() {
        let device = MockBridge::tiny_tapeout();
        let mut bench = bench_on(&device, true).await;
        bench.time_mut().set_timeout(us(20));
        let clock = crate::clock::Clock::new("clk", us(100), bench.now())
            .unwrap()
            .start_high(false);
        bench.start_task(Box::new(clock));

        // The first rising edge would be at 50us.
        let err = bench.wait(RisingEdge::new("clk")).await.unwrap_err();
        assert!(err.is_test_timeout());
        assert_eq!(bench.now(), us(20));
        assert_eq!(device.value("clk"), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn task_due_at_deadline_still_steps() {
        let device = MockBridge::tiny_tapeout();
        let mut bench = bench_on(&device, true).await;
        bench.time_mut().set_timeout(us(10));
        bench.start_clock("clk", us(20)).unwrap();
        let err = bench.wait(ClockCycles::new("clk", 5)).await.unwrap_err();
        assert!(err.is_test_timeout());
        assert_eq!(bench.now(), us(10));
        // Toggled low exactly at the deadline.
        assert_eq!(device.value("clk"), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_signal_fails_arm() {
        let device = MockBridge::tiny_tapeout();
        let mut bench = bench_on(&device, true).await;
        let err = bench.wait(RisingEdge::new("nope")).await.unwrap_err();
        assert!(matches!(err, Error::UnknownSignal(_)));
    }
}
