//! benchlink-core: Core traits, types, and error definitions for benchlink.
//!
//! This crate defines the device-agnostic pieces of the hardware-in-the-loop
//! test framework: logical time, batched state observations, event traces,
//! the [`Dut`] trait the runner drives devices through, and the byte-level
//! [`Transport`] that protocol backends sit on.
//!
//! # Key types
//!
//! - [`Dut`] -- the interface every device backend implements
//! - [`Monitor`] -- state cache, queued reports and trace output for a DUT
//! - [`TimeSystem`] / [`TimeValue`] -- logical time with units
//! - [`StateChangeReport`] / [`StateCache`] -- batched, deduplicated observations
//! - [`Transport`] -- byte-level communication channel
//! - [`Error`] / [`Result`] -- error handling

pub mod dut;
pub mod error;
pub mod monitor;
pub mod signal;
pub mod state;
pub mod time;
pub mod trace;
pub mod transport;

// Re-export key types at crate root for ergonomic `use benchlink_core::*`.
pub use dut::Dut;
pub use error::{Error, ErrorKind, Result};
pub use monitor::{DEFAULT_SCOPE, Monitor};
pub use signal::{MAX_ADDRESS, MULTI_BIT_FLAG, Readable, SignalInfo, Writeable};
pub use state::{StateCache, StateChangeReport};
pub use time::{TimeSystem, TimeUnit, TimeValue};
pub use trace::{CapturedTrace, Event, MemorySink, Trace, TraceSink, VarDecl, trace_file_name};
pub use transport::Transport;
