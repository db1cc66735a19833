//! benchlink-test-harness: Test utilities and device emulation for benchlink.
//!
//! This crate provides [`MockTransport`] for byte-exact unit testing of
//! protocol engines against scripted exchanges, and [`MockBridge`], an
//! in-memory bridge device for behavioral tests of drivers and whole test
//! runs without real hardware.

pub mod mock_bridge;
pub mod mock_transport;

pub use mock_bridge::{MockBridge, MockSignal};
pub use mock_transport::MockTransport;
