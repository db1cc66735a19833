//! Transport implementations for benchlink.
//!
//! This crate provides the concrete [`Transport`](benchlink_core::Transport)
//! the bridge protocol rides on when talking to real hardware:
//!
//! - [`SerialTransport`]: USB virtual COM ports exposed by bridge firmware
//! - [`list_ports`]: the ports a bridge might be attached to
//!
//! # Example
//!
//! ```no_run
//! use benchlink_transport::SerialTransport;
//! use benchlink_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> benchlink_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyACM0", 115_200).await?;
//!
//! // Turn on asynchronous state reporting.
//! transport.send(&[b'm', 1]).await?;
//!
//! let mut buf = [0u8; 64];
//! let n = transport.receive(&mut buf, Duration::from_millis(500)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{DEFAULT_BAUD_RATE, LinkStats, PortInfo, SerialConfig, SerialTransport, list_ports};
