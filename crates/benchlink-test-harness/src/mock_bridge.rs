//! In-memory emulation of a serial bridge device.
//!
//! [`MockBridge`] implements [`Transport`] by behaving like bridge firmware
//! instead of replaying a script: it answers the listing and dump commands,
//! applies writes, answers reads, acknowledges monitoring changes and, while
//! monitoring, pushes a state frame for every signal change. Outputs can be
//! driven from inputs with [`link`](MockBridge::link) or changed directly
//! with [`inject_change`](MockBridge::inject_change), which stands in for
//! activity inside the DUT.
//!
//! Clones share the same device, so a test keeps one handle for inspection
//! and hands another to the driver.
//!
//! # Example
//!
//! ```
//! use benchlink_test_harness::MockBridge;
//!
//! let device = MockBridge::tiny_tapeout();
//! // uo_out follows ui_in + 1.
//! device.link("ui_in", "uo_out", |ui_in, _| (ui_in + 1) & 0xFF);
//! assert_eq!(device.value("uo_out"), Some(0));
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use benchlink_core::error::{Error, Result};
use benchlink_core::transport::Transport;

type LinkFn = Box<dyn Fn(u32, u32) -> u32 + Send>;

/// One signal of the emulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSignal {
    /// Name announced in the listing.
    pub name: String,
    /// Wire address.
    pub address: u8,
    /// Bit width.
    pub width: u32,
    /// Whether the host drives it.
    pub input: bool,
    /// Current value.
    pub value: u32,
}

struct Link {
    from: u8,
    to: u8,
    f: LinkFn,
}

struct DeviceState {
    signals: Vec<MockSignal>,
    links: Vec<Link>,
    legacy: bool,
    monitoring: bool,
    ack_monitoring: bool,
    outbox: VecDeque<u8>,
    max_chunk: usize,
    connected: bool,
    pending_cmd: Option<u8>,
    received: Vec<u8>,
    wire_writes: usize,
    wire_reads: usize,
    listing_override: Option<Vec<u8>>,
}

impl DeviceState {
    fn index_by_name(&self, name: &str) -> Option<usize> {
        self.signals.iter().position(|s| s.name == name)
    }

    fn index_by_address(&self, address: u8) -> Option<usize> {
        self.signals.iter().position(|s| s.address == address)
    }

    fn emit_frame(&mut self, address: u8, value: u32) {
        self.outbox.push_back(0xFF);
        self.outbox.push_back(address);
        if self.legacy {
            self.outbox.push_back(b'=');
        }
        self.outbox.push_back(value as u8);
    }

    /// Set a signal, emit its frame when monitoring and propagate links.
    fn change(&mut self, idx: usize, value: u32) {
        let mut queue = VecDeque::from([(idx, value)]);
        let mut budget = 64;
        while let Some((idx, value)) = queue.pop_front() {
            budget -= 1;
            if budget == 0 {
                break;
            }
            if self.signals[idx].value == value {
                continue;
            }
            self.signals[idx].value = value;
            let address = self.signals[idx].address;
            trace!(signal = %self.signals[idx].name, value, "device signal changed");
            if self.monitoring {
                self.emit_frame(address, value);
            }
            for link in self.links.iter().filter(|l| l.from == address) {
                if let Some(to) = self.signals.iter().position(|s| s.address == link.to) {
                    let next = (link.f)(value, self.signals[to].value);
                    queue.push_back((to, next));
                }
            }
        }
    }

    fn listing(&self) -> Vec<u8> {
        if let Some(raw) = &self.listing_override {
            return raw.clone();
        }
        let (field_sep, record_sep) = if self.legacy {
            (b':', b'\n')
        } else {
            (b'~', b'|')
        };
        let mut out = Vec::new();
        for s in &self.signals {
            out.extend_from_slice(s.name.as_bytes());
            out.push(field_sep);
            out.push(s.address);
            let width = (s.width as u8) & 0x7F;
            out.push(if s.input { width | 0x80 } else { width });
            out.push(record_sep);
        }
        out
    }

    fn dump(&self) -> Vec<u8> {
        let mut out = String::new();
        for s in &self.signals {
            out.push_str(&format!("{}={:#x}\n", s.name, s.value));
        }
        out.into_bytes()
    }

    fn host_write(&mut self, address: u8, value: u32) {
        self.wire_writes += 1;
        match self.index_by_address(address) {
            Some(idx) if self.signals[idx].input => self.change(idx, value),
            Some(idx) => debug!(signal = %self.signals[idx].name, "write to device output ignored"),
            None => debug!(address, "write to unknown address ignored"),
        }
    }

    fn process(&mut self, byte: u8) {
        if let Some(cmd) = self.pending_cmd.take() {
            if cmd == b'm' {
                self.monitoring = byte != 0;
                debug!(monitoring = self.monitoring, "device monitoring changed");
                if self.ack_monitoring {
                    self.outbox.push_back(b'm');
                }
            } else {
                self.host_write((cmd >> 1) & 0x3F, u32::from(byte));
            }
            return;
        }
        match byte {
            b'l' => {
                let listing = self.listing();
                self.outbox.extend(listing);
            }
            b'd' => {
                let dump = self.dump();
                self.outbox.extend(dump);
            }
            b'm' => self.pending_cmd = Some(b'm'),
            b if b & 0x80 != 0 => {
                let multi = b & 0x40 != 0;
                let address = if multi { (b >> 1) & 0x3F } else { (b >> 2) & 0x0F };
                if b & 0x01 != 0 {
                    self.wire_reads += 1;
                    let value = self
                        .index_by_address(address)
                        .map(|i| self.signals[i].value)
                        .unwrap_or(0);
                    self.outbox.push_back(value as u8);
                } else if multi {
                    self.pending_cmd = Some(b);
                } else {
                    self.host_write(address, u32::from((b >> 1) & 0x01));
                }
            }
            other => debug!(byte = other, "device ignoring unknown command byte"),
        }
    }
}

/// Shared handle to an emulated bridge device.
#[derive(Clone)]
pub struct MockBridge {
    state: Arc<Mutex<DeviceState>>,
}

impl std::fmt::Debug for MockBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        f.debug_struct("MockBridge")
            .field("signals", &st.signals)
            .field("monitoring", &st.monitoring)
            .field("legacy", &st.legacy)
            .finish()
    }
}

impl Default for MockBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBridge {
    /// A device with no signals, speaking the current revision.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                signals: Vec::new(),
                links: Vec::new(),
                legacy: false,
                monitoring: false,
                ack_monitoring: true,
                outbox: VecDeque::new(),
                max_chunk: usize::MAX,
                connected: true,
                pending_cmd: None,
                received: Vec::new(),
                wire_writes: 0,
                wire_reads: 0,
                listing_override: None,
            })),
        }
    }

    /// The usual pin-out of a Tiny Tapeout style design: `clk`, `rst_n`,
    /// `ena` single-bit inputs, `ui_in`/`uio_in` 8-bit inputs and
    /// `uo_out`/`uio_out` 8-bit outputs.
    pub fn tiny_tapeout() -> Self {
        Self::new()
            .with_input("clk", 0, 1)
            .with_input("rst_n", 1, 1)
            .with_input("ena", 2, 1)
            .with_input("ui_in", 33, 8)
            .with_input("uio_in", 34, 8)
            .with_output("uo_out", 35, 8)
            .with_output("uio_out", 36, 8)
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn with_signal(self, name: &str, address: u8, width: u32, input: bool) -> Self {
        self.lock().signals.push(MockSignal {
            name: name.to_string(),
            address,
            width,
            input,
            value: 0,
        });
        self
    }

    /// Add a signal the host drives.
    pub fn with_input(self, name: &str, address: u8, width: u32) -> Self {
        self.with_signal(name, address, width, true)
    }

    /// Add a signal the DUT drives.
    pub fn with_output(self, name: &str, address: u8, width: u32) -> Self {
        self.with_signal(name, address, width, false)
    }

    /// Speak the legacy revision (3-byte frames, `:`/newline listing).
    pub fn legacy(self, legacy: bool) -> Self {
        self.lock().legacy = legacy;
        self
    }

    /// Recompute `to` whenever `from` changes: `f(from_value, to_value)`.
    pub fn link<F>(&self, from: &str, to: &str, f: F)
    where
        F: Fn(u32, u32) -> u32 + Send + 'static,
    {
        let mut st = self.lock();
        let addr = |name: &str| st.index_by_name(name).map(|i| st.signals[i].address);
        if let (Some(from), Some(to)) = (addr(from), addr(to)) {
            st.links.push(Link {
                from,
                to,
                f: Box::new(f),
            });
        }
    }

    /// Current value of a device signal.
    pub fn value(&self, name: &str) -> Option<u32> {
        let st = self.lock();
        st.index_by_name(name).map(|i| st.signals[i].value)
    }

    /// Set a signal without emitting anything.
    pub fn set_value(&self, name: &str, value: u32) {
        let mut st = self.lock();
        if let Some(i) = st.index_by_name(name) {
            st.signals[i].value = value;
        }
    }

    /// Change a signal from inside the DUT, emitting a frame when monitoring.
    pub fn inject_change(&self, name: &str, value: u32) {
        let mut st = self.lock();
        if let Some(i) = st.index_by_name(name) {
            st.change(i, value);
        }
    }

    /// Queue raw bytes on the device's output.
    pub fn push_raw(&self, bytes: &[u8]) {
        self.lock().outbox.extend(bytes);
    }

    /// Replace the listing reply with raw bytes.
    pub fn set_listing(&self, raw: &[u8]) {
        self.lock().listing_override = Some(raw.to_vec());
    }

    /// Whether the device is in monitoring mode.
    pub fn is_monitoring(&self) -> bool {
        self.lock().monitoring
    }

    /// Whether monitoring commands are acknowledged (default `true`).
    pub fn set_ack_monitoring(&self, ack: bool) {
        self.lock().ack_monitoring = ack;
    }

    /// Deliver at most `n` bytes per `receive()` call.
    pub fn set_max_chunk(&self, n: usize) {
        self.lock().max_chunk = n.max(1);
    }

    /// Every byte the host sent.
    pub fn received(&self) -> Vec<u8> {
        self.lock().received.clone()
    }

    /// Number of signal writes that reached the device.
    pub fn wire_writes(&self) -> usize {
        self.lock().wire_writes
    }

    /// Number of signal reads that reached the device.
    pub fn wire_reads(&self) -> usize {
        self.lock().wire_reads
    }

    /// Number of bytes waiting to be read by the host.
    pub fn pending_output(&self) -> usize {
        self.lock().outbox.len()
    }
}

#[async_trait]
impl Transport for MockBridge {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut st = self.lock();
        if !st.connected {
            return Err(Error::NotConnected);
        }
        st.received.extend_from_slice(data);
        for &b in data {
            st.process(b);
        }
        Ok(())
    }

    /// Waits the full timeout when the device has nothing to say.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let n = {
            let mut st = self.lock();
            if !st.connected {
                return Err(Error::NotConnected);
            }
            let n = st.outbox.len().min(buf.len()).min(st.max_chunk);
            for (slot, byte) in buf.iter_mut().zip(st.outbox.drain(..n)) {
                *slot = byte;
            }
            n
        };
        if n == 0 {
            tokio::time::sleep(timeout).await;
            return Err(Error::Timeout);
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        let mut st = self.lock();
        st.connected = false;
        st.outbox.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }
}
