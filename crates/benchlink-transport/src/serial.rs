//! Serial link to bridge firmware.
//!
//! Bridges enumerate as USB CDC-ACM devices (`/dev/ttyACM0` on Linux,
//! `COMn` on Windows). The line is always 8N1 without flow control; only
//! the baud rate varies between firmware builds. [`SerialTransport`]
//! implements [`Transport`] over such a port and counts the bytes moved in
//! each direction.
//!
//! # Example
//!
//! ```no_run
//! use benchlink_transport::{SerialConfig, SerialTransport};
//! use benchlink_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> benchlink_core::Result<()> {
//! let config = SerialConfig::new(115_200).assert_dtr(true);
//! let mut transport = SerialTransport::open_with_config("/dev/ttyACM0", config).await?;
//!
//! // Ask the bridge for its signal listing.
//! transport.send(b"l").await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialPortType, SerialStream};
use tracing::{debug, error, info, trace, warn};

use benchlink_core::error::{Error, Result};
use benchlink_core::transport::Transport;

/// Baud rate bridge firmware uses unless told otherwise.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// How a bridge port is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    /// Line speed.
    pub baud_rate: u32,
    /// Raise DTR after opening. CDC-ACM bridges stay silent until it is up.
    pub assert_dtr: bool,
    /// Drop whatever the OS buffered before the port was opened.
    pub discard_stale_input: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BAUD_RATE)
    }
}

impl SerialConfig {
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            assert_dtr: true,
            discard_stale_input: true,
        }
    }

    pub fn assert_dtr(mut self, on: bool) -> Self {
        self.assert_dtr = on;
        self
    }

    pub fn discard_stale_input(mut self, on: bool) -> Self {
        self.discard_stale_input = on;
        self
    }
}

/// A serial port the host can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Name to pass to [`SerialTransport::open`].
    pub name: String,
    /// USB vendor and product id, for USB ports.
    pub usb_id: Option<(u16, u16)>,
    /// USB product string, when the device reports one.
    pub product: Option<String>,
}

impl PortInfo {
    pub fn is_usb(&self) -> bool {
        self.usb_id.is_some()
    }
}

/// Every serial port on the host, USB ports first.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| Error::Transport(format!("could not enumerate serial ports: {e}")))?;
    let mut out: Vec<PortInfo> = ports
        .into_iter()
        .map(|p| match p.port_type {
            SerialPortType::UsbPort(usb) => PortInfo {
                name: p.port_name,
                usb_id: Some((usb.vid, usb.pid)),
                product: usb.product,
            },
            _ => PortInfo {
                name: p.port_name,
                usb_id: None,
                product: None,
            },
        })
        .collect();
    out.sort_by_key(|p| !p.is_usb());
    debug!(count = out.len(), "enumerated serial ports");
    Ok(out)
}

/// Bytes moved over a link since it was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Serial transport to a bridge device.
pub struct SerialTransport {
    port: Option<SerialStream>,
    port_name: String,
    stats: LinkStats,
}

impl SerialTransport {
    /// Open `port` at `baud_rate` with the default settings.
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        Self::open_with_config(port, SerialConfig::new(baud_rate)).await
    }

    /// Open `port` as 8N1 without flow control.
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        debug!(port, ?config, "opening bridge port");

        let mut stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                error!(port, error = %e, "failed to open bridge port");
                Error::Transport(format!("failed to open serial port {port}: {e}"))
            })?;

        if config.assert_dtr {
            if let Err(e) = stream.write_data_terminal_ready(true) {
                warn!(port, error = %e, "failed to raise DTR");
            }
        }
        if config.discard_stale_input {
            if let Err(e) = stream.clear(tokio_serial::ClearBuffer::Input) {
                warn!(port, error = %e, "failed to discard stale input");
            }
        }

        info!(port, baud_rate = config.baud_rate, "bridge port open");
        Ok(Self {
            port: Some(stream),
            port_name: port.to_string(),
            stats: LinkStats::default(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }
}

fn link_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::NotConnected => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        trace!(port = %self.port_name, data = ?data, "tx");
        port.write_all(data).await.map_err(link_error)?;
        port.flush().await.map_err(link_error)?;
        self.stats.bytes_sent += data.len() as u64;
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        let n = match tokio::time::timeout(timeout, port.read(buf)).await {
            Err(_) => return Err(Error::Timeout),
            Ok(result) => result.map_err(link_error)?,
        };
        if n == 0 {
            // A USB bridge that was unplugged reads as end of stream.
            warn!(port = %self.port_name, "bridge port reported end of stream");
            return Err(Error::ConnectionLost);
        }
        trace!(port = %self.port_name, data = ?&buf[..n], "rx");
        self.stats.bytes_received += n as u64;
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut port) = self.port.take() else {
            return Ok(());
        };
        if let Err(e) = port.flush().await {
            warn!(port = %self.port_name, error = %e, "flush before close failed");
        }
        info!(
            port = %self.port_name,
            sent = self.stats.bytes_sent,
            received = self.stats.bytes_received,
            "bridge port closed"
        );
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert!(config.assert_dtr);
        assert!(config.discard_stale_input);

        let quiet = SerialConfig::new(9600).assert_dtr(false).discard_stale_input(false);
        assert_eq!(quiet.baud_rate, 9600);
        assert!(!quiet.assert_dtr);
        assert!(!quiet.discard_stale_input);
    }

    #[test]
    fn usb_ports_are_flagged() {
        let usb = PortInfo {
            name: "/dev/ttyACM0".into(),
            usb_id: Some((0x2E8A, 0x000A)),
            product: Some("bridge".into()),
        };
        assert!(usb.is_usb());
        let plain = PortInfo {
            name: "/dev/ttyS0".into(),
            usb_id: None,
            product: None,
        };
        assert!(!plain.is_usb());
    }

    #[tokio::test]
    async fn open_missing_port_is_transport_error() {
        let err = SerialTransport::open("/dev/benchlink-does-not-exist", DEFAULT_BAUD_RATE)
            .await
            .err();
        assert!(matches!(err, Some(Error::Transport(_))));
    }
}
