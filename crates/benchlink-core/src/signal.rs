//! Signal descriptions and the read/write capabilities test code uses.
//!
//! The signal table of a DUT is learned at runtime. Test code never touches
//! a driver's signal records directly; it looks a signal up by name and gets
//! a handle implementing [`Readable`] and, for outputs of the host,
//! [`Writeable`].

use async_trait::async_trait;

use crate::error::Result;

/// Highest address a signal may have.
pub const MAX_ADDRESS: u8 = 63;

/// Address bit marking a multi-bit signal.
pub const MULTI_BIT_FLAG: u8 = 0x20;

/// Public description of one DUT signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalInfo {
    /// Name reported by the device.
    pub name: String,
    /// Alternative name used in reports and traces, if one was set.
    pub alias: Option<String>,
    /// Address on the wire (0..=63).
    pub address: u8,
    /// Bit width.
    pub width: u32,
    /// Whether the host may drive this signal.
    pub writeable: bool,
}

impl SignalInfo {
    /// Returns `true` if the address selects a multi-bit signal.
    pub fn is_multi_bit(&self) -> bool {
        self.address & MULTI_BIT_FLAG != 0
    }

    /// The name used in reports: the alias when set, else the device name.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Returns `true` if `name` is this signal's name or alias.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.alias.as_deref() == Some(name)
    }

    /// Largest value this signal can hold.
    pub fn max_value(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        }
    }
}

/// A signal whose current value can be read.
#[async_trait]
pub trait Readable: Send {
    /// Read the current value.
    async fn read(&mut self) -> Result<u32>;
}

/// A signal the host can drive.
#[async_trait]
pub trait Writeable: Send {
    /// Drive `value`.
    async fn write(&mut self, value: u32) -> Result<()>;
}
