//! Transport trait for the link to the device under test.
//!
//! The [`Transport`] trait abstracts over the physical byte stream between
//! the host and the bridge that exposes the DUT's signals. Implementations
//! exist for serial ports (`benchlink-transport`) and for deterministic
//! testing (`MockTransport` and `MockBridge` in `benchlink-test-harness`).
//!
//! Protocol engines such as the bridge codec in `benchlink-bridge` operate on
//! a `Transport` rather than on a serial port directly, so the same engine
//! drives real hardware and the in-memory device emulation.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a device.
///
/// Implementations handle buffering and error recovery at the physical
/// layer. Framing, addressing and event decoding are handled by the protocol
/// engines that consume this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the device.
    ///
    /// Implementations should not return until every byte has been handed
    /// to the underlying link.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the device into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Waits at most `timeout`
    /// for data; returns [`Error::Timeout`](crate::error::Error::Timeout) if
    /// nothing arrived before the deadline. Callers rely on this bound to
    /// keep every wait finite.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
