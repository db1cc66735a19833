//! Test registry, scheduler, triggers and clocks for benchlink.
//!
//! This crate runs test bodies against a [`Dut`](benchlink_core::Dut) on a
//! single logical thread of control:
//!
//! - **Bench** ([`bench`]) -- owns the DUT and logical time, steps
//!   background tasks and keeps the observation log triggers read.
//! - **Triggers** ([`trigger`]) -- [`Timer`], [`ClockCycles`],
//!   [`RisingEdge`] and [`FallingEdge`], all bounded by the test deadline.
//! - **Clock** ([`clock`]) -- the square-wave background task.
//! - **Tests** ([`testcase`], [`params`], [`registry`]) -- test records,
//!   parametrization and the registry that holds them.
//! - **Runner** ([`runner`]) -- executes a registry and produces a
//!   [`Summary`].
//!
//! # Example
//!
//! ```no_run
//! use benchlink_core::{Dut, TimeUnit, TimeValue, check_eq};
//! use benchlink_runner::{Bench, Registry, Runner, TestCase};
//!
//! # async fn example(dut: Box<dyn Dut>) -> benchlink_core::Result<()> {
//! let mut registry = Registry::new();
//! registry.register(
//!     TestCase::new("counter_counts", |bench, _| {
//!         Box::pin(async move {
//!             bench.start_clock("clk", TimeValue::new(10, TimeUnit::Us))?;
//!             bench.write("rst_n", 0).await?;
//!             let reset = bench.clock_cycles("clk", 2).await?;
//!             bench.wait(reset).await?;
//!             bench.write("rst_n", 1).await?;
//!             let count = bench.clock_cycles("clk", 10).await?;
//!             bench.wait(count).await?;
//!             check_eq!(bench.read("uo_out").await?, 10);
//!             Ok(())
//!         })
//!     })
//!     .timeout(TimeValue::new(1, TimeUnit::Ms)),
//! )?;
//!
//! let mut bench = Bench::new(dut);
//! let summary = Runner::new(registry).run(&mut bench).await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod bench;
pub mod clock;
pub mod params;
pub mod registry;
pub mod runner;
pub mod testcase;
pub mod trigger;

pub use bench::{Background, Bench, BenchConfig, Observation, SignalHandle, TaskCtx, TaskHandle};
pub use clock::Clock;
pub use params::{ParamValue, Params, Parametrize};
pub use registry::Registry;
pub use runner::{Runner, Summary, SummaryEntry};
pub use testcase::{BoxFuture, Status, TestCase, TestFn};
pub use trigger::{ClockCycles, FallingEdge, Polarity, RisingEdge, Timer, Trigger};
