//! # benchlink -- Hardware-in-the-Loop Testbenches over a Serial Bridge
//!
//! `benchlink` runs cocotb-style testbenches against real silicon or an FPGA.
//! A small bridge firmware exposes the design's pins as addressed signals
//! over a serial link; test bodies read and write those signals, start
//! clocks, and wait on timers and edges, all against a logical time that
//! tracks the real time the hardware needed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use benchlink::bridge::BridgeBuilder;
//! use benchlink::{Bench, Registry, Runner, TestCase, TimeUnit, TimeValue, check_eq};
//!
//! #[tokio::main]
//! async fn main() -> benchlink::Result<()> {
//!     let dut = BridgeBuilder::new()
//!         .serial_port("/dev/ttyACM0")
//!         .monitoring(true)
//!         .build()
//!         .await?;
//!
//!     let mut registry = Registry::new();
//!     registry.register(
//!         TestCase::new("counter", |bench, _| {
//!             Box::pin(async move {
//!                 bench.start_clock("clk", TimeValue::new(10, TimeUnit::Us))?;
//!                 bench.write("rst_n", 1).await?;
//!                 let cycles = bench.clock_cycles("clk", 10).await?;
//!                 bench.wait(cycles).await?;
//!                 check_eq!(bench.read("uo_out").await?, 10);
//!                 Ok(())
//!             })
//!         })
//!         .timeout(TimeValue::new(5, TimeUnit::Ms)),
//!     )?;
//!
//!     let mut bench = Bench::new(Box::new(dut));
//!     let summary = Runner::new(registry).run(&mut bench).await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                    | Purpose                                          |
//! |--------------------------|--------------------------------------------------|
//! | `benchlink-core`         | [`Dut`] trait, time, state tracking, traces, errors |
//! | `benchlink-runner`       | Bench, triggers, clocks, registry and runner     |
//! | `benchlink-transport`    | Serial transport                                 |
//! | `benchlink-bridge`       | Bridge wire protocol and [`Dut`] driver          |
//! | **`benchlink`**          | This facade crate -- re-exports everything       |
//!
//! Test code only talks to the [`Bench`]; device backends implement [`Dut`],
//! so the same tests run against any backend.
//!
//! ## Feature Flags
//!
//! | Feature  | Enables                                  | Default |
//! |----------|------------------------------------------|---------|
//! | `bridge` | [`bridge`] and [`transport`] modules     | yes     |
//!
//! ## Traces
//!
//! Every DUT carries a [`Monitor`]. With monitoring on, trace writing
//! enabled and a [`TraceSink`] installed, each finished test hands its
//! coalesced [`Trace`] to the sink, which owns the file format.

pub use benchlink_core::*;
pub use benchlink_runner::*;

/// Serial bridge backend.
///
/// Provides [`BridgeDut`](bridge::BridgeDut) and
/// [`BridgeBuilder`](bridge::BridgeBuilder), plus the wire codec in
/// [`bridge::protocol`].
#[cfg(feature = "bridge")]
pub mod bridge {
    pub use benchlink_bridge::*;
}

/// Serial transport used by the bridge backend.
#[cfg(feature = "bridge")]
pub mod transport {
    pub use benchlink_transport::*;
}
