//! Serial bridge protocol backend for benchlink.
//!
//! This crate drives a DUT through bridge firmware that exposes the design's
//! pins as addressed signals over a serial link. It provides:
//!
//! - **Protocol codec** ([`protocol`]) -- command byte encoding, the signal
//!   listing format and the asynchronous state frame decoder with partial
//!   frame reassembly, for both protocol revisions.
//! - **Signal records** ([`signal`]) -- per-signal wire state and write
//!   bookkeeping.
//! - **DUT driver** ([`dut`]) -- full [`Dut`](benchlink_core::Dut) trait
//!   implementation with discovery, aliases, monitoring and initial state
//!   capture.
//! - **Builder** ([`builder`]) -- fluent builder API for constructing
//!   [`BridgeDut`] instances with smart defaults.
//!
//! # Command bytes
//!
//! Signal commands are a single byte laid out as `0bINAAAAVR`:
//! - `I` (bit 7) is always set for signal I/O
//! - `N` (bit 6) marks a multi-bit signal; its address then fills bits 1-6
//!   and a write is followed by one value byte
//! - single-bit signals carry a 4-bit address in bits 2-5 and the value in
//!   bit 1
//! - `R` (bit 0) selects a read; the device answers with one value byte
//!
//! # Example
//!
//! ```
//! use benchlink_bridge::protocol::{encode_read, encode_write};
//!
//! // Read the 8-bit output at address 35.
//! assert_eq!(encode_read(35).unwrap(), 0xC7);
//!
//! // Drive the single-bit clock at address 0 high.
//! assert_eq!(encode_write(0, 1).unwrap(), vec![0x82]);
//! ```

pub mod builder;
pub mod dut;
pub mod protocol;
pub mod signal;

// Re-export the primary types for ergonomic `use benchlink_bridge::*`.
pub use builder::BridgeBuilder;
pub use dut::{BridgeDut, BridgeTiming};
pub use protocol::{FrameDecoder, ProtocolRevision};
