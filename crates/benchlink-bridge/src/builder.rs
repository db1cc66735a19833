//! BridgeBuilder -- fluent builder for constructing [`BridgeDut`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial port parameters, protocol revision and timeout values before the
//! transport is opened. Building performs discovery, applies aliases and
//! optionally switches monitoring on.
//!
//! # Example
//!
//! ```no_run
//! use benchlink_bridge::builder::BridgeBuilder;
//! use benchlink_bridge::protocol::ProtocolRevision;
//! use std::time::Duration;
//!
//! # async fn example() -> benchlink_core::Result<()> {
//! let dut = BridgeBuilder::new()
//!     .serial_port("/dev/ttyACM0")
//!     .protocol_revision(ProtocolRevision::Current)
//!     .reply_timeout(Duration::from_millis(200))
//!     .monitoring(true)
//!     .alias("count", "uo_out")
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tracing::debug;

use benchlink_core::dut::Dut;
use benchlink_core::error::{Error, Result};
use benchlink_core::time::TimeValue;
use benchlink_core::transport::Transport;
use benchlink_transport::DEFAULT_BAUD_RATE;

use crate::dut::{BridgeDut, BridgeTiming};
use crate::protocol::ProtocolRevision;

/// Fluent builder for [`BridgeDut`].
///
/// Every option has a default, so the simplest usage is:
///
/// ```ignore
/// let dut = BridgeBuilder::new()
///     .serial_port("/dev/ttyACM0")
///     .build()
///     .await?;
/// ```
pub struct BridgeBuilder {
    name: String,
    serial_port: Option<String>,
    baud_rate: u32,
    revision: ProtocolRevision,
    timing: BridgeTiming,
    monitoring: bool,
    discover: bool,
    aliases: Vec<(String, String)>,
}

impl BridgeBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        BridgeBuilder {
            name: "bridge".to_string(),
            serial_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            revision: ProtocolRevision::default(),
            timing: BridgeTiming::default(),
            monitoring: false,
            discover: true,
            aliases: Vec::new(),
        }
    }

    /// Name used in logs and reports (default: `"bridge"`).
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set the serial port path (e.g. `/dev/ttyACM0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the default baud rate (115200).
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Select the wire protocol revision (default: current).
    pub fn protocol_revision(mut self, revision: ProtocolRevision) -> Self {
        self.revision = revision;
        self
    }

    /// Wait per read while draining the state stream (default: 1ms).
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.timing.poll_timeout = timeout;
        self
    }

    /// Wait for a read reply or monitoring acknowledgement (default: 500ms).
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.timing.reply_timeout = timeout;
        self
    }

    /// Wait for the listing reply to start (default: 1s).
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.timing.discovery_timeout = timeout;
        self
    }

    /// Quiet period ending a text reply (default: 50ms).
    pub fn settle_time(mut self, settle: Duration) -> Self {
        self.timing.settle_time = settle;
        self
    }

    /// Switch monitoring on once built (default: off).
    pub fn monitoring(mut self, on: bool) -> Self {
        self.monitoring = on;
        self
    }

    /// Run discovery while building (default: on). Without it the signal
    /// table stays empty until the runner's `testing_will_begin` hook.
    pub fn discover(mut self, on: bool) -> Self {
        self.discover = on;
        self
    }

    /// Register an alias applied right after discovery.
    pub fn alias(mut self, alias: &str, signal: &str) -> Self {
        self.aliases.push((alias.to_string(), signal.to_string()));
        self
    }

    /// Build a [`BridgeDut`] with a caller-provided transport.
    ///
    /// This is the primary entry point for testing (pass a `MockTransport`
    /// or `MockBridge` from `benchlink-test-harness`) and for callers that
    /// manage the transport themselves.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<BridgeDut> {
        if !self.discover && (self.monitoring || !self.aliases.is_empty()) {
            return Err(Error::Configuration(
                "monitoring and aliases require discovery".into(),
            ));
        }

        debug!(name = %self.name, revision = ?self.revision, timing = ?self.timing, "building bridge DUT");
        let mut dut = BridgeDut::new(self.name, transport, self.revision, self.timing);
        if self.discover {
            dut.discover().await?;
        }
        for (alias, signal) in &self.aliases {
            dut.add_alias(alias, signal)?;
        }
        if self.monitoring {
            dut.set_monitoring(true, TimeValue::zero()).await?;
        }
        Ok(dut)
    }

    /// Build a [`BridgeDut`] over a serial port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<BridgeDut> {
        let port = self
            .serial_port
            .as_ref()
            .ok_or_else(|| Error::Configuration("serial_port is required for build()".into()))?;

        let transport = benchlink_transport::SerialTransport::open(port, self.baud_rate).await?;
        self.build_with_transport(Box::new(transport)).await
    }
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
