//! BridgeDut -- the [`Dut`] implementation for serial bridge devices.
//!
//! This module ties the bridge codec ([`protocol`](crate::protocol)) to a
//! [`Transport`]. It learns the signal table from the device's listing,
//! encodes reads and writes, and decodes the asynchronous state stream that
//! the device pushes while monitoring. Decoded changes go through the DUT's
//! [`Monitor`] and are handed to the scheduler by
//! [`poll_state_changes`](Dut::poll_state_changes).
//!
//! The transport is owned exclusively by the driver and every wait on it is
//! bounded by one of the configured timeouts.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use benchlink_core::dut::Dut;
use benchlink_core::error::{Error, Result};
use benchlink_core::monitor::Monitor;
use benchlink_core::signal::SignalInfo;
use benchlink_core::state::StateChangeReport;
use benchlink_core::time::TimeValue;
use benchlink_core::transport::Transport;

use crate::protocol::{self, FrameDecoder, ProtocolRevision};
use crate::signal::BridgeSignal;

/// Receive buffer size for one transport read.
const READ_CHUNK: usize = 256;

/// Upper bound on reads per drain, so a chattering device cannot stall us.
const MAX_DRAIN_READS: usize = 64;

/// Upper bound on the size of a listing or dump reply.
const MAX_REPLY_BYTES: usize = 8192;

/// Timeouts used when talking to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeTiming {
    /// Wait for the reply byte of a read and for monitoring acknowledgements.
    pub reply_timeout: Duration,
    /// Wait for the first byte of the listing reply.
    pub discovery_timeout: Duration,
    /// Wait used when draining the asynchronous state stream.
    pub poll_timeout: Duration,
    /// Quiet period that ends a multi-chunk text reply.
    pub settle_time: Duration,
}

impl Default for BridgeTiming {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_millis(500),
            discovery_timeout: Duration::from_secs(1),
            poll_timeout: Duration::from_millis(1),
            settle_time: Duration::from_millis(50),
        }
    }
}

/// A DUT reached through a serial bridge.
///
/// Constructed via [`BridgeBuilder`](crate::builder::BridgeBuilder).
pub struct BridgeDut {
    name: String,
    transport: Box<dyn Transport>,
    revision: ProtocolRevision,
    timing: BridgeTiming,
    signals: Vec<BridgeSignal>,
    names_by_address: HashMap<u8, String>,
    decoder: FrameDecoder,
    monitor: Monitor,
    pending: Vec<StateChangeReport>,
    discovered: bool,
}

impl BridgeDut {
    pub(crate) fn new(
        name: String,
        transport: Box<dyn Transport>,
        revision: ProtocolRevision,
        timing: BridgeTiming,
    ) -> Self {
        Self {
            name,
            transport,
            revision,
            timing,
            signals: Vec::new(),
            names_by_address: HashMap::new(),
            decoder: FrameDecoder::new(revision),
            monitor: Monitor::new(),
            pending: Vec::new(),
            discovered: false,
        }
    }

    /// The protocol revision in use.
    pub fn revision(&self) -> ProtocolRevision {
        self.revision
    }

    /// The timeouts in use.
    pub fn timing(&self) -> BridgeTiming {
        self.timing
    }

    /// Whether discovery has completed.
    pub fn is_discovered(&self) -> bool {
        self.discovered
    }

    /// Display names of all signals, in listing order.
    pub fn signal_names(&self) -> Vec<String> {
        self.signals
            .iter()
            .map(|s| s.display_name().to_string())
            .collect()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.signals
            .iter()
            .position(|s| s.info().answers_to(name))
            .ok_or_else(|| Error::UnknownSignal(name.to_string()))
    }

    fn rebuild_names(&mut self) {
        self.names_by_address = self
            .signals
            .iter()
            .map(|s| (s.address(), s.display_name().to_string()))
            .collect();
    }

    // ---------------------------------------------------------------
    // Discovery and aliases
    // ---------------------------------------------------------------

    /// Ask the device for its signal listing and rebuild the signal table.
    ///
    /// Returns the number of signals found. Must be called with monitoring
    /// off, since state frames would corrupt the listing.
    pub async fn discover(&mut self) -> Result<usize> {
        if self.monitor.is_monitoring() {
            return Err(Error::Configuration(
                "discovery requires monitoring to be off".into(),
            ));
        }
        info!(dut = %self.name, revision = ?self.revision, "performing discovery");

        self.transport.send(&[protocol::CMD_LIST]).await?;
        let reply = self.collect_reply(self.timing.discovery_timeout).await?;
        if reply.is_empty() {
            return Err(Error::Protocol("no reply to signal listing request".into()));
        }
        let entries = protocol::parse_listing(&reply, self.revision)?;
        if entries.is_empty() {
            warn!(dut = %self.name, "device listed no signals");
        }

        self.signals = entries.iter().map(BridgeSignal::from_listing).collect();
        self.rebuild_names();
        self.decoder.clear();
        self.discovered = true;
        info!(dut = %self.name, count = self.signals.len(), "discovery complete");
        Ok(self.signals.len())
    }

    /// Make `alias` another name for `signal`. Reports and traces use the
    /// alias from then on; lookups accept both names.
    pub fn add_alias(&mut self, alias: &str, signal: &str) -> Result<()> {
        let idx = self.index_of(signal)?;
        if let Some(other) = self
            .signals
            .iter()
            .enumerate()
            .find(|(i, s)| *i != idx && s.info().answers_to(alias))
        {
            return Err(Error::Configuration(format!(
                "alias '{alias}' already names signal {}",
                other.1.info().name
            )));
        }
        debug!(alias, signal, "adding alias");
        self.signals[idx].set_alias(Some(alias.to_string()));
        self.rebuild_names();
        Ok(())
    }

    // ---------------------------------------------------------------
    // Extras
    // ---------------------------------------------------------------

    /// Ask the device for its textual state dump.
    pub async fn dump_state(&mut self, now: TimeValue) -> Result<String> {
        if self.monitor.is_monitoring() {
            self.drain_input(now).await?;
        }
        self.transport.send(&[protocol::CMD_DUMP]).await?;
        let reply = self.collect_reply(self.timing.reply_timeout).await?;
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }

    /// Flip a single-bit signal. Returns the value written.
    pub async fn toggle(&mut self, name: &str, now: TimeValue) -> Result<u32> {
        let idx = self.index_of(name)?;
        let value = self.signals[idx].toggled_value()?;
        self.write(name, value, now).await?;
        Ok(value)
    }

    /// Close the transport.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }

    // ---------------------------------------------------------------
    // Transport plumbing
    // ---------------------------------------------------------------

    /// One bounded read. `None` when nothing arrived in time.
    async fn receive_chunk(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let mut buf = [0u8; READ_CHUNK];
        match self.transport.receive(&mut buf, timeout).await {
            Ok(0) | Err(Error::Timeout) => Ok(None),
            Ok(n) => Ok(Some(buf[..n].to_vec())),
            Err(e) => Err(e),
        }
    }

    /// Read a text reply: wait up to `first_wait` for it to start, then
    /// keep reading until the line has been quiet for the settle time.
    async fn collect_reply(&mut self, first_wait: Duration) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut wait = first_wait;
        while out.len() < MAX_REPLY_BYTES {
            match self.receive_chunk(wait).await? {
                Some(bytes) => {
                    out.extend_from_slice(&bytes);
                    wait = self.timing.settle_time;
                }
                None => break,
            }
        }
        trace!(bytes = out.len(), "collected reply");
        Ok(out)
    }

    /// Decode state frames and queue the resulting changes.
    fn ingest(&mut self, bytes: &[u8], now: TimeValue) {
        let report = self.decoder.decode(bytes, &self.names_by_address);
        if report.is_empty() {
            return;
        }
        for (name, value) in report.all_changes() {
            if let Some(s) = self.signals.iter_mut().find(|s| s.display_name() == name) {
                s.observe(*value);
            }
        }
        let changes = self.monitor.record(now, &report);
        if !changes.is_empty() {
            self.pending.push(changes);
        }
    }

    /// Decode everything the device has already sent.
    async fn drain_input(&mut self, now: TimeValue) -> Result<()> {
        for _ in 0..MAX_DRAIN_READS {
            match self.receive_chunk(self.timing.poll_timeout).await? {
                Some(bytes) => self.ingest(&bytes, now),
                None => return Ok(()),
            }
        }
        debug!(dut = %self.name, "drain stopped at read limit");
        Ok(())
    }
}

#[async_trait]
impl Dut for BridgeDut {
    fn name(&self) -> &str {
        &self.name
    }

    fn signals(&self) -> Vec<SignalInfo> {
        self.signals.iter().map(|s| s.info().clone()).collect()
    }

    fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    fn monitor_mut(&mut self) -> &mut Monitor {
        &mut self.monitor
    }

    /// Sends `m 1`/`m 0` and waits for the device to echo `m`. Frames that
    /// arrive alongside the acknowledgement are decoded as usual.
    async fn set_monitoring(&mut self, on: bool, now: TimeValue) -> Result<()> {
        let was_on = self.monitor.is_monitoring();
        if was_on {
            self.drain_input(now).await?;
        }
        self.decoder.take_markers();
        self.transport.send(&protocol::encode_monitoring(on)).await?;

        let deadline = Instant::now() + self.timing.reply_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Protocol(format!(
                    "device did not acknowledge monitoring {}",
                    if on { "on" } else { "off" }
                )));
            }
            if let Some(bytes) = self.receive_chunk(remaining).await? {
                self.ingest(&bytes, now);
                if self.decoder.take_markers() > 0 {
                    break;
                }
            }
        }

        self.monitor.set_monitoring(on);
        info!(dut = %self.name, monitoring = on, "monitoring changed");
        if on && !was_on {
            for report in self.initial_state_reports() {
                self.monitor.record(now, &report);
            }
        }
        Ok(())
    }

    async fn read(&mut self, name: &str, now: TimeValue) -> Result<u32> {
        let idx = self.index_of(name)?;
        let cmd = self.signals[idx].read_command()?;
        if self.monitor.is_monitoring() {
            self.drain_input(now).await?;
        }
        self.transport.send(&[cmd]).await?;

        // A partially received frame is completed by the next bytes on the
        // wire; the reply comes right after it.
        let need = self.decoder.bytes_to_complete();
        let mut incoming: Vec<u8> = Vec::new();
        let deadline = Instant::now() + self.timing.reply_timeout;
        while incoming.len() <= need {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(signal = name, "no reply to read");
                return Err(Error::Timeout);
            }
            match self.receive_chunk(remaining).await? {
                Some(bytes) => incoming.extend_from_slice(&bytes),
                None => {
                    warn!(signal = name, "no reply to read");
                    return Err(Error::Timeout);
                }
            }
        }

        let (frame_tail, rest) = incoming.split_at(need);
        let reply = rest[0];
        let after = rest[1..].to_vec();
        if !frame_tail.is_empty() {
            self.ingest(frame_tail, now);
        }
        if !after.is_empty() {
            self.ingest(&after, now);
        }

        let value = u32::from(reply);
        self.signals[idx].observe(value);
        debug!(signal = name, address = self.signals[idx].address(), value, "read");
        Ok(value)
    }

    /// With monitoring on, the write is noted in the trace first and the
    /// state stream is drained before and after sending.
    async fn write(&mut self, name: &str, value: u32, now: TimeValue) -> Result<()> {
        let idx = self.index_of(name)?;
        let Some(bytes) = self.signals[idx].write_command(value)? else {
            trace!(signal = name, value, "value already written this unit, skipping");
            return Ok(());
        };

        let monitoring = self.monitor.is_monitoring();
        if monitoring {
            let report =
                StateChangeReport::new().with_change(self.signals[idx].display_name(), value);
            self.monitor.record(now, &report);
            self.drain_input(now).await?;
        }

        debug!(signal = name, address = self.signals[idx].address(), value, "write");
        self.transport.send(&bytes).await?;
        self.signals[idx].mark_written(value);

        if monitoring {
            self.drain_input(now).await?;
        }
        Ok(())
    }

    async fn poll_state_changes(&mut self, now: TimeValue) -> Result<Vec<StateChangeReport>> {
        if self.monitor.is_monitoring() {
            self.drain_input(now).await?;
        }
        Ok(std::mem::take(&mut self.pending))
    }

    /// One report holding every value seen on the wire so far.
    fn initial_state_reports(&self) -> Vec<StateChangeReport> {
        let mut report = StateChangeReport::new();
        for s in &self.signals {
            if let Some(v) = s.current() {
                report.add_change(s.display_name(), v);
            }
        }
        if report.is_empty() {
            Vec::new()
        } else {
            vec![report]
        }
    }

    async fn testing_will_begin(&mut self) -> Result<()> {
        if !self.discovered {
            self.discover().await?;
        }
        Ok(())
    }

    async fn testing_unit_start(&mut self, test: &str, now: TimeValue) -> Result<()> {
        if self.monitor.is_monitoring() {
            self.drain_input(now).await?;
        }
        self.pending.clear();
        let initial = if self.monitor.traces_enabled() {
            self.initial_state_reports()
        } else {
            Vec::new()
        };
        self.monitor.unit_start(test, initial);
        Ok(())
    }

    async fn testing_unit_done(&mut self, test: &str, now: TimeValue) -> Result<()> {
        if self.monitor.is_monitoring() {
            self.drain_input(now).await?;
        }
        let widths = self.trace_widths();
        self.monitor
            .unit_done(test, |n| widths.get(n).copied().unwrap_or(1));
        for s in &mut self.signals {
            s.reset_unit();
        }
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BridgeBuilder;
    use benchlink_core::time::TimeUnit;
    use benchlink_core::trace::MemorySink;
    use benchlink_test_harness::{MockBridge, MockTransport};

    const LISTING: &[u8] = b"clk~\x00\x81|rst_n~\x01\x81|ui_in~\x21\x88|uo_out~\x23\x08|";

    fn t(us: u64) -> TimeValue {
        TimeValue::new(us, TimeUnit::Us)
    }

    async fn scripted(mock: MockTransport) -> BridgeDut {
        BridgeBuilder::new()
            .build_with_transport(Box::new(mock))
            .await
            .unwrap()
    }

    fn listed_mock() -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect(b"l", LISTING);
        mock
    }

    async fn emulated(device: &MockBridge) -> BridgeDut {
        BridgeBuilder::new()
            .monitoring(true)
            .build_with_transport(Box::new(device.clone()))
            .await
            .unwrap()
    }

    // ---------------------------------------------------------------
    // Byte-exact exchanges
    // ---------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn discovery_builds_signal_table() {
        let dut = scripted(listed_mock()).await;
        assert!(dut.is_discovered());
        assert_eq!(dut.signal_names(), vec!["clk", "rst_n", "ui_in", "uo_out"]);
        let uo_out = dut.signal_info("uo_out").unwrap();
        assert_eq!(uo_out.address, 35);
        assert_eq!(uo_out.width, 8);
        assert!(!uo_out.writeable);
        assert!(uo_out.is_multi_bit());
        assert!(dut.signal_info("clk").unwrap().writeable);
    }

    #[tokio::test(start_paused = true)]
    async fn write_and_read_bytes() {
        let mut mock = listed_mock();
        mock.expect(&[0xC2, 0x2A], &[]);
        mock.expect(&[0x82], &[]);
        mock.expect(&[0xC7], &[0x2B]);
        let mut dut = scripted(mock).await;

        dut.write("ui_in", 0x2A, t(0)).await.unwrap();
        dut.write("clk", 1, t(1)).await.unwrap();
        assert_eq!(dut.read("uo_out", t(2)).await.unwrap(), 0x2B);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_write_is_not_sent() {
        let mut mock = listed_mock();
        mock.expect(&[0x86], &[]);
        let mut dut = scripted(mock).await;

        dut.write("rst_n", 1, t(0)).await.unwrap();
        // No second expectation: a second send would fail the mock.
        dut.write("rst_n", 1, t(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn write_bookkeeping_resets_per_unit() {
        let mut mock = listed_mock();
        mock.expect(&[0x86], &[]);
        mock.expect(&[0x86], &[]);
        let mut dut = scripted(mock).await;

        dut.testing_unit_start("a", t(0)).await.unwrap();
        dut.write("rst_n", 1, t(0)).await.unwrap();
        dut.testing_unit_done("a", t(1)).await.unwrap();
        dut.testing_unit_start("b", t(0)).await.unwrap();
        dut.write("rst_n", 1, t(0)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn read_only_and_unknown_signals_are_rejected() {
        let mut dut = scripted(listed_mock()).await;
        assert!(matches!(
            dut.write("uo_out", 1, t(0)).await,
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            dut.read("nope", t(0)).await,
            Err(Error::UnknownSignal(_))
        ));
        assert!(matches!(
            dut.write("clk", 2, t(0)).await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn read_without_reply_times_out() {
        let mut mock = listed_mock();
        mock.expect(&[0xC7], &[]);
        let mut dut = scripted(mock).await;
        assert!(matches!(dut.read("uo_out", t(0)).await, Err(Error::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn read_completes_partial_frame_before_reply() {
        let mut mock = listed_mock();
        mock.expect(&[b'm', 1], b"m");
        let mut dut = scripted(mock).await;
        dut.set_monitoring(true, t(0)).await.unwrap();
        let mut mock = MockTransport::new();
        // Start of an uo_out frame arrives, then the read command goes out
        // and the device finishes the frame before replying.
        mock.push_unsolicited(&[0xFF, 0x23]);
        mock.expect(&[0x81], &[0x2A, 0x01, 0xFF, 0x00, 0x01]);
        dut.transport = Box::new(mock);

        assert_eq!(dut.read("clk", t(1)).await.unwrap(), 1);
        let reports = dut.poll_state_changes(t(2)).await.unwrap();
        let merged: Vec<(String, u32)> = reports
            .iter()
            .flat_map(|r| r.all_changes().to_vec())
            .collect();
        assert!(merged.contains(&("uo_out".to_string(), 0x2A)));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_monitoring_ack_is_protocol_error() {
        let mut mock = listed_mock();
        mock.expect(&[b'm', 1], &[]);
        let mut dut = scripted(mock).await;
        let err = dut.set_monitoring(true, t(0)).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(!dut.is_monitoring());
    }

    #[tokio::test(start_paused = true)]
    async fn bad_listing_aborts_build() {
        let mut mock = MockTransport::new();
        mock.expect(b"l", b"clk~\x00\x81|clk~\x01\x81|");
        let result = BridgeBuilder::new()
            .build_with_transport(Box::new(mock))
            .await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn dump_state_returns_text() {
        let mut mock = listed_mock();
        mock.expect(b"d", b"clk=0x0\nuo_out=0x2a\n");
        let mut dut = scripted(mock).await;
        let text = dut.dump_state(t(0)).await.unwrap();
        assert!(text.contains("uo_out=0x2a"));
    }

    // ---------------------------------------------------------------
    // Against the emulated device
    // ---------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn multi_bit_round_trip_all_addresses_and_values() {
        let mut device = MockBridge::new();
        for slot in 0..32u8 {
            device = device.with_input(&format!("bus{slot}"), 32 + slot, 8);
        }
        let mut dut = BridgeBuilder::new()
            .build_with_transport(Box::new(device.clone()))
            .await
            .unwrap();
        for slot in 0..32u8 {
            let name = format!("bus{slot}");
            for value in 0..=255u32 {
                dut.write(&name, value, t(0)).await.unwrap();
                assert_eq!(dut.read(&name, t(0)).await.unwrap(), value);
            }
        }
        assert_eq!(device.wire_writes(), 32 * 256);
    }

    #[tokio::test(start_paused = true)]
    async fn echoed_frames_become_reports() {
        let device = MockBridge::tiny_tapeout();
        device.link("ui_in", "uo_out", |v, _| (v * 2) & 0xFF);
        let mut dut = emulated(&device).await;

        dut.write("ui_in", 0x15, t(1)).await.unwrap();
        let reports = dut.poll_state_changes(t(2)).await.unwrap();
        let all: Vec<(String, u32)> = reports
            .iter()
            .flat_map(|r| r.all_changes().to_vec())
            .collect();
        // The write itself is filtered by the cache; the output change is new.
        assert_eq!(all, vec![("uo_out".to_string(), 0x2A)]);
    }

    #[tokio::test(start_paused = true)]
    async fn split_frames_reassemble() {
        let device = MockBridge::tiny_tapeout();
        device.set_max_chunk(1);
        let mut dut = emulated(&device).await;

        device.inject_change("uo_out", 0x2A);
        device.inject_change("uio_out", 0x07);
        let reports = dut.poll_state_changes(t(1)).await.unwrap();
        let all: Vec<(String, u32)> = reports
            .iter()
            .flat_map(|r| r.all_changes().to_vec())
            .collect();
        assert_eq!(
            all,
            vec![("uo_out".to_string(), 0x2A), ("uio_out".to_string(), 0x07)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_write_yields_one_trace_entry() {
        let device = MockBridge::tiny_tapeout();
        let mut dut = emulated(&device).await;
        dut.testing_unit_start("dup", t(0)).await.unwrap();
        dut.write("ui_in", 9, t(1)).await.unwrap();
        dut.write("ui_in", 9, t(2)).await.unwrap();
        dut.testing_unit_done("dup", t(3)).await.unwrap();

        let events = dut.monitor().events("dup").unwrap();
        let ui_in: Vec<_> = events.iter().filter(|e| e.name == "ui_in").collect();
        assert_eq!(ui_in.len(), 1);
        assert_eq!(device.wire_writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn aliases_rename_reports() {
        let device = MockBridge::tiny_tapeout();
        let mut dut = emulated(&device).await;
        dut.add_alias("count", "uo_out").unwrap();
        assert!(dut.add_alias("count", "uio_out").is_err());
        assert!(matches!(
            dut.add_alias("x", "missing"),
            Err(Error::UnknownSignal(_))
        ));

        device.inject_change("uo_out", 3);
        let reports = dut.poll_state_changes(t(1)).await.unwrap();
        assert_eq!(reports[0].get("count"), Some(3));
        assert_eq!(dut.read("count", t(2)).await.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_revision_end_to_end() {
        let device = MockBridge::tiny_tapeout().legacy(true);
        let mut dut = BridgeBuilder::new()
            .protocol_revision(ProtocolRevision::Legacy)
            .monitoring(true)
            .build_with_transport(Box::new(device.clone()))
            .await
            .unwrap();
        assert_eq!(dut.signals().len(), 7);
        device.inject_change("uo_out", 0x2A);
        let reports = dut.poll_state_changes(t(1)).await.unwrap();
        assert_eq!(reports[0].get("uo_out"), Some(0x2A));
    }

    #[tokio::test(start_paused = true)]
    async fn traces_include_initial_state() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let device = MockBridge::tiny_tapeout();
        let mut dut = BridgeBuilder::new()
            .build_with_transport(Box::new(device.clone()))
            .await
            .unwrap();
        dut.write("rst_n", 1, t(0)).await.unwrap();
        dut.monitor_mut().set_sink(Box::new(sink.clone()));
        dut.monitor_mut().set_write_trace(true);
        dut.monitor_mut()
            .set_trace_dir(Some(dir.path().to_path_buf()))
            .unwrap();
        dut.set_monitoring(true, t(0)).await.unwrap();

        dut.testing_unit_start("traced", TimeValue::zero()).await.unwrap();
        device.inject_change("uo_out", 5);
        dut.poll_state_changes(t(3)).await.unwrap();
        dut.testing_unit_done("traced", t(4)).await.unwrap();

        let captured = sink.captured();
        assert_eq!(captured.len(), 1);
        let trace = &captured[0].trace;
        assert_eq!(trace.events[0].name, "rst_n");
        assert!(trace.events[0].timestamp.is_zero());
        let uo_out = trace.variables.iter().find(|v| v.name == "uo_out").unwrap();
        assert_eq!(uo_out.width, 8);
        assert_eq!(captured[0].path, dir.path().join("traced.vcd"));
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_flips_single_bit() {
        let device = MockBridge::tiny_tapeout();
        let mut dut = emulated(&device).await;
        assert_eq!(dut.toggle("clk", t(0)).await.unwrap(), 1);
        assert_eq!(device.value("clk"), Some(1));
        assert_eq!(dut.toggle("clk", t(1)).await.unwrap(), 0);
        assert_eq!(device.value("clk"), Some(0));
        assert!(dut.toggle("ui_in", t(2)).await.is_err());
    }
}
