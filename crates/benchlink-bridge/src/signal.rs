//! Per-signal state kept by the bridge driver.
//!
//! A [`BridgeSignal`] is created for every record of the discovery listing.
//! Besides the public [`SignalInfo`] it remembers the last value seen on the
//! wire and whether the host wrote the signal during the current test unit,
//! which lets repeated writes of the same value be skipped.

use benchlink_core::error::{Error, Result};
use benchlink_core::signal::SignalInfo;

use crate::protocol::{self, ListingEntry};

/// One discovered signal and its write bookkeeping.
#[derive(Debug, Clone)]
pub struct BridgeSignal {
    info: SignalInfo,
    current: Option<u32>,
    written: bool,
}

impl BridgeSignal {
    /// Create the record for a listing entry.
    pub fn from_listing(entry: &ListingEntry) -> Self {
        Self {
            info: SignalInfo {
                name: entry.name.clone(),
                alias: None,
                address: entry.address,
                width: entry.width,
                writeable: entry.writeable,
            },
            current: None,
            written: false,
        }
    }

    /// Public description.
    pub fn info(&self) -> &SignalInfo {
        &self.info
    }

    /// Name used in reports.
    pub fn display_name(&self) -> &str {
        self.info.display_name()
    }

    /// Wire address.
    pub fn address(&self) -> u8 {
        self.info.address
    }

    /// Set or clear the alias.
    pub fn set_alias(&mut self, alias: Option<String>) {
        self.info.alias = alias;
    }

    /// Last value seen on the wire, if any.
    pub fn current(&self) -> Option<u32> {
        self.current
    }

    /// Returns `true` if the host wrote this signal during the current unit.
    pub fn written(&self) -> bool {
        self.written
    }

    /// Remember a value observed on the wire.
    pub fn observe(&mut self, value: u32) {
        self.current = Some(value);
    }

    /// The read command byte.
    pub fn read_command(&self) -> Result<u8> {
        protocol::encode_read(self.info.address)
    }

    /// The bytes to send for a write of `value`, or `None` when the same
    /// value was already written during this unit.
    ///
    /// Writing a signal the host does not drive is a configuration error.
    pub fn write_command(&self, value: u32) -> Result<Option<Vec<u8>>> {
        if !self.info.writeable {
            return Err(Error::Configuration(format!(
                "signal {} is not writeable",
                self.info.name
            )));
        }
        let bytes = protocol::encode_write(self.info.address, value)?;
        if self.written && self.current == Some(value) {
            return Ok(None);
        }
        Ok(Some(bytes))
    }

    /// Record that `value` was sent.
    pub fn mark_written(&mut self, value: u32) {
        self.written = true;
        self.current = Some(value);
    }

    /// The value a toggle writes: 0 when currently high, 1 otherwise.
    pub fn toggled_value(&self) -> Result<u32> {
        if self.info.width > 1 || self.info.is_multi_bit() {
            return Err(Error::Configuration(format!(
                "cannot toggle multi-bit signal {}",
                self.info.name
            )));
        }
        Ok(if self.current.unwrap_or(0) != 0 { 0 } else { 1 })
    }

    /// Forget the written flag at the end of a unit.
    pub fn reset_unit(&mut self) {
        self.written = false;
    }
}
