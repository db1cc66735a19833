//! The clock background task.

use async_trait::async_trait;

use benchlink_core::error::{Error, Result};
use benchlink_core::time::TimeValue;

use crate::bench::{Background, TaskCtx};

/// Drives a signal with a square wave.
///
/// The first step writes the starting level (high unless changed with
/// [`start_high`](Clock::start_high)); every later step toggles it, one half
/// period after the previous step.
#[derive(Debug, Clone)]
pub struct Clock {
    signal: String,
    half_period: TimeValue,
    level: u32,
    next: TimeValue,
}

impl Clock {
    /// A clock on `signal` whose first edge is at `start`.
    ///
    /// A period shorter than two steps has no half period and is rejected.
    pub fn new(signal: &str, period: TimeValue, start: TimeValue) -> Result<Self> {
        let half = period.steps() / 2;
        if half == 0 {
            return Err(Error::Configuration(format!(
                "clock period {period} on {signal} is too short"
            )));
        }
        Ok(Self {
            signal: signal.to_string(),
            half_period: TimeValue::from_steps(half).with_unit(period.unit()),
            level: 1,
            next: start,
        })
    }

    /// Choose the level written by the first step.
    pub fn start_high(mut self, high: bool) -> Self {
        self.level = u32::from(high);
        self
    }

    pub fn signal(&self) -> &str {
        &self.signal
    }

    pub fn half_period(&self) -> TimeValue {
        self.half_period
    }
}

#[async_trait]
impl Background for Clock {
    fn name(&self) -> &str {
        &self.signal
    }

    fn next_due(&self) -> Option<TimeValue> {
        Some(self.next)
    }

    async fn step(&mut self, ctx: &mut TaskCtx<'_>) -> Result<()> {
        ctx.write(&self.signal, self.level).await?;
        self.level ^= 1;
        self.next = ctx.now() + self.half_period;
        Ok(())
    }
}
