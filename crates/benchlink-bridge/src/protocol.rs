//! Serial bridge wire format encoder/decoder.
//!
//! The bridge multiplexes up to 64 named DUT signals over one byte stream.
//! Host-to-device traffic is a single command byte per signal access, plus a
//! value byte for multi-bit writes, and a handful of ASCII control commands.
//!
//! # Signal command byte
//!
//! ```text
//!  bit  7   6   5   4   3   2   1   0
//!       1   0   a3  a2  a1  a0  V   R     single-bit, address 0..15
//!       1   1   a4  a3  a2  a1  a0  R     multi-bit, address 32..63
//! ```
//!
//! - bit 7 marks a signal access (as opposed to a control command).
//! - `R` is 1 for a read, 0 for a write.
//! - `V` carries the value of a single-bit write (ignored on reads).
//! - A multi-bit write is followed by one value byte. A read elicits exactly
//!   one reply byte; writes elicit no reply.
//!
//! Bit 5 of a signal address marks it multi-bit, so the multi-bit command
//! carries the whole address shifted left by one: address 35 (slot 3) writes
//! as `0xC6`, reads as `0xC7`.
//!
//! # Control commands
//!
//! - `l` -- list signals (discovery), see [`parse_listing`].
//! - `d` -- dump device state as text.
//! - `m` followed by `1`/`0` -- turn asynchronous monitoring on/off. The
//!   device acknowledges by echoing `m`.
//!
//! # Asynchronous state frames
//!
//! While monitoring, the device pushes `(address, value)` pairs whenever a
//! signal changes. Sentinel bytes (`0xFF`) and mode markers (`m`) may appear
//! wherever a frame could start and are skipped there. A frame split across
//! two reads is carried over by [`FrameDecoder`] and completed by the next
//! chunk.
//!
//! # Revisions
//!
//! [`ProtocolRevision::Current`] is authoritative: 2-byte frames and listing
//! records `name '~' addr desc '|'`. [`ProtocolRevision::Legacy`] speaks to
//! older bridge firmware: 3-byte `(addr '=' value)` frames and listing
//! records `name ':' addr desc '\n'`.

use std::collections::HashMap;

use bytes::{Buf, BufMut, BytesMut};
use tracing::{debug, trace, warn};

use benchlink_core::error::{Error, Result};
use benchlink_core::signal::{MAX_ADDRESS, MULTI_BIT_FLAG};
use benchlink_core::state::StateChangeReport;

/// Marks a signal access command.
pub const IO_FLAG: u8 = 0x80;

/// Marks a multi-bit signal access command.
pub const MULTI_BIT_CMD_FLAG: u8 = 0x40;

/// Value bit of a single-bit write command.
pub const VALUE_FLAG: u8 = 0x02;

/// Read/write bit: set for reads.
pub const READ_FLAG: u8 = 0x01;

/// Discovery (list signals) command.
pub const CMD_LIST: u8 = b'l';

/// State dump command.
pub const CMD_DUMP: u8 = b'd';

/// Monitoring command prefix, also the acknowledgement and mode marker.
pub const CMD_MONITOR: u8 = b'm';

/// Sentinel byte separating asynchronous frames.
pub const SENTINEL: u8 = 0xFF;

/// Separator inside a legacy 3-byte frame.
pub const LEGACY_SEPARATOR: u8 = b'=';

/// Descriptor bit set for signals the host drives (DUT inputs).
pub const DESC_INPUT_FLAG: u8 = 0x80;

/// Descriptor bits carrying the bit width.
pub const DESC_WIDTH_MASK: u8 = 0x7F;

/// Number of single-bit addresses.
pub const SINGLE_BIT_SLOTS: u8 = 16;

/// Which framing and listing convention the device speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProtocolRevision {
    /// 2-byte `(address, value)` frames, `~`/`|` listing.
    #[default]
    Current,
    /// 3-byte `(address, '=', value)` frames, `:`/newline listing.
    Legacy,
}

impl ProtocolRevision {
    /// Length of one asynchronous state frame.
    pub fn frame_len(self) -> usize {
        match self {
            ProtocolRevision::Current => 2,
            ProtocolRevision::Legacy => 3,
        }
    }

    /// Byte separating a listing record's name from its address/descriptor.
    pub fn field_separator(self) -> u8 {
        match self {
            ProtocolRevision::Current => b'~',
            ProtocolRevision::Legacy => b':',
        }
    }

    /// Byte terminating a listing record.
    pub fn record_separator(self) -> u8 {
        match self {
            ProtocolRevision::Current => b'|',
            ProtocolRevision::Legacy => b'\n',
        }
    }

    /// Encode one state frame the way a device of this revision sends it.
    pub fn encode_frame(self, address: u8, value: u8) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(1 + self.frame_len());
        buf.put_u8(SENTINEL);
        buf.put_u8(address);
        if self == ProtocolRevision::Legacy {
            buf.put_u8(LEGACY_SEPARATOR);
        }
        buf.put_u8(value);
        buf.to_vec()
    }
}

// ---------------------------------------------------------------------------
// Command encoding
// ---------------------------------------------------------------------------

/// Returns `true` if `address` selects a multi-bit signal.
pub fn is_multi_bit(address: u8) -> bool {
    address & MULTI_BIT_FLAG != 0
}

/// Check that `address` is usable on the wire.
pub fn validate_address(address: u8) -> Result<()> {
    if address > MAX_ADDRESS {
        return Err(Error::Configuration(format!(
            "signal address {address} out of range 0..={MAX_ADDRESS}"
        )));
    }
    if !is_multi_bit(address) && address >= SINGLE_BIT_SLOTS {
        return Err(Error::Configuration(format!(
            "single-bit signal address {address} out of range 0..{SINGLE_BIT_SLOTS}"
        )));
    }
    Ok(())
}

fn base_command(address: u8) -> u8 {
    if is_multi_bit(address) {
        IO_FLAG | (address << 1)
    } else {
        IO_FLAG | (address << 2)
    }
}

/// Encode a read command for the signal at `address`.
///
/// ```
/// use benchlink_bridge::protocol::encode_read;
///
/// assert_eq!(encode_read(35).unwrap(), 0xC7);
/// assert_eq!(encode_read(2).unwrap(), 0x89);
/// ```
pub fn encode_read(address: u8) -> Result<u8> {
    validate_address(address)?;
    Ok(base_command(address) | READ_FLAG)
}

/// Encode a write of `value` to the signal at `address`.
///
/// Single-bit signals accept 0 or 1, multi-bit signals 0..=255.
///
/// ```
/// use benchlink_bridge::protocol::encode_write;
///
/// assert_eq!(encode_write(35, 0x2A).unwrap(), vec![0xC6, 0x2A]);
/// assert_eq!(encode_write(2, 1).unwrap(), vec![0x8A]);
/// ```
pub fn encode_write(address: u8, value: u32) -> Result<Vec<u8>> {
    validate_address(address)?;
    let cmd = base_command(address);
    if is_multi_bit(address) {
        let value = u8::try_from(value).map_err(|_| {
            Error::Configuration(format!(
                "value {value} does not fit multi-bit signal at address {address}"
            ))
        })?;
        let mut buf = BytesMut::with_capacity(2);
        buf.put_u8(cmd);
        buf.put_u8(value);
        Ok(buf.to_vec())
    } else {
        match value {
            0 => Ok(vec![cmd]),
            1 => Ok(vec![cmd | VALUE_FLAG]),
            other => Err(Error::Configuration(format!(
                "value {other} invalid for single-bit signal at address {address}"
            ))),
        }
    }
}

/// Encode the monitoring on/off command.
pub fn encode_monitoring(on: bool) -> [u8; 2] {
    [CMD_MONITOR, u8::from(on)]
}

// ---------------------------------------------------------------------------
// Asynchronous frame decoding
// ---------------------------------------------------------------------------

/// Incremental decoder for the asynchronous state stream.
///
/// Bytes that do not yet form a complete frame are kept and prepended to
/// the next chunk, so decoding a stream split at any point gives the same
/// observations as decoding it whole.
#[derive(Debug)]
pub struct FrameDecoder {
    revision: ProtocolRevision,
    leftover: BytesMut,
    markers: usize,
}

impl FrameDecoder {
    /// A decoder for the given revision with nothing carried over.
    pub fn new(revision: ProtocolRevision) -> Self {
        Self {
            revision,
            leftover: BytesMut::new(),
            markers: 0,
        }
    }

    /// The revision this decoder parses.
    pub fn revision(&self) -> ProtocolRevision {
        self.revision
    }

    /// Bytes carried over from the previous chunk.
    pub fn leftover(&self) -> &[u8] {
        &self.leftover
    }

    /// Returns `true` if a frame has been started but not finished.
    pub fn has_partial(&self) -> bool {
        !self.leftover.is_empty()
    }

    /// Number of bytes still needed to finish the partial frame.
    pub fn bytes_to_complete(&self) -> usize {
        if self.leftover.is_empty() {
            0
        } else {
            self.revision.frame_len() - self.leftover.len()
        }
    }

    /// Take the count of mode markers (`m`) skipped since the last call.
    pub fn take_markers(&mut self) -> usize {
        std::mem::take(&mut self.markers)
    }

    /// Drop any carried-over bytes.
    pub fn clear(&mut self) {
        self.leftover.clear();
        self.markers = 0;
    }

    /// Decode `chunk`, resolving addresses through `names`.
    ///
    /// Unknown addresses and malformed legacy frames are logged and skipped;
    /// they never abort the rest of the chunk.
    pub fn decode(&mut self, chunk: &[u8], names: &HashMap<u8, String>) -> StateChangeReport {
        let mut report = StateChangeReport::new();
        let mut buf = std::mem::take(&mut self.leftover);
        buf.extend_from_slice(chunk);
        trace!(bytes = ?&buf[..], "decoding state stream");

        let frame_len = self.revision.frame_len();
        loop {
            // Frame separators are only recognized where a frame may start.
            while let Some(&b) = buf.first() {
                if b == SENTINEL {
                    buf.advance(1);
                } else if b == CMD_MONITOR {
                    self.markers += 1;
                    buf.advance(1);
                } else {
                    break;
                }
            }
            if buf.is_empty() {
                break;
            }
            if buf.len() < frame_len {
                debug!(
                    pending = buf.len(),
                    "partial state frame, carrying over"
                );
                self.leftover = buf;
                return report;
            }

            let address = buf[0];
            if self.revision == ProtocolRevision::Legacy && buf[1] != LEGACY_SEPARATOR {
                warn!(address, found = buf[1], "malformed legacy state frame, resyncing");
                buf.advance(1);
                continue;
            }
            let value = buf[frame_len - 1];
            match names.get(&address) {
                Some(name) => {
                    debug!(address, value, name = %name, "state change");
                    report.add_change(name, u32::from(value));
                }
                None => {
                    warn!(address, value, "state change for unknown address, skipping");
                }
            }
            buf.advance(frame_len);
        }
        report
    }
}

// ---------------------------------------------------------------------------
// Discovery listing
// ---------------------------------------------------------------------------

/// One signal announced by the device's listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Signal name.
    pub name: String,
    /// Wire address.
    pub address: u8,
    /// Bit width from the descriptor's low 7 bits.
    pub width: u32,
    /// Whether the host drives this signal (descriptor bit 7).
    pub writeable: bool,
}

impl ListingEntry {
    /// Decode an address/descriptor pair.
    pub fn from_raw(name: &str, address: u8, descriptor: u8) -> Self {
        Self {
            name: name.to_string(),
            address,
            width: u32::from(descriptor & DESC_WIDTH_MASK),
            writeable: descriptor & DESC_INPUT_FLAG != 0,
        }
    }

    /// The address/descriptor pair a device sends for this entry.
    pub fn descriptor(&self) -> u8 {
        let width = (self.width as u8) & DESC_WIDTH_MASK;
        if self.writeable {
            width | DESC_INPUT_FLAG
        } else {
            width
        }
    }
}

/// Encode a listing the way a device of `revision` sends it.
pub fn encode_listing(entries: &[ListingEntry], revision: ProtocolRevision) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for e in entries {
        buf.put_slice(e.name.as_bytes());
        buf.put_u8(revision.field_separator());
        buf.put_u8(e.address);
        buf.put_u8(e.descriptor());
        buf.put_u8(revision.record_separator());
    }
    buf.to_vec()
}

/// Parse a discovery reply.
///
/// Records are scanned sequentially rather than split on separators, since
/// an address or descriptor byte may equal a separator. A record with fewer
/// than two bytes after the name is logged and skipped. Addresses out of
/// range and duplicate names or addresses are configuration errors.
pub fn parse_listing(reply: &[u8], revision: ProtocolRevision) -> Result<Vec<ListingEntry>> {
    let field_sep = revision.field_separator();
    let record_sep = revision.record_separator();
    let mut entries: Vec<ListingEntry> = Vec::new();
    let mut i = 0;

    while i < reply.len() {
        let Some(rel) = reply[i..].iter().position(|&b| b == field_sep) else {
            if reply[i..].iter().any(|&b| b != record_sep) {
                debug!(trailing = ?&reply[i..], "ignoring listing bytes without a record");
            }
            break;
        };
        let raw_name = &reply[i..i + rel];
        // Tolerate separators and stray markers ahead of a name.
        let raw_name = trim_noise(raw_name, record_sep);
        let name = String::from_utf8_lossy(raw_name).into_owned();
        let fields_start = i + rel + 1;
        let fields_end = fields_start + record_len(&reply[fields_start..], field_sep, record_sep);
        let fields = &reply[fields_start..fields_end];
        i = fields_end + 1;

        if name.is_empty() {
            warn!(fields = ?fields, "listing record without a name, skipping");
            continue;
        }
        if fields.len() < 2 {
            warn!(name = %name, fields = ?fields, "listing record has insufficient values, skipping");
            continue;
        }
        if fields.len() > 2 {
            warn!(name = %name, fields = ?fields, "listing record has more bytes than expected");
        }

        let entry = ListingEntry::from_raw(&name, fields[0], fields[1]);
        validate_address(entry.address)?;
        if entries.iter().any(|e| e.name == entry.name) {
            return Err(Error::Configuration(format!(
                "duplicate signal name '{}' in listing",
                entry.name
            )));
        }
        if let Some(other) = entries.iter().find(|e| e.address == entry.address) {
            return Err(Error::Configuration(format!(
                "signals '{}' and '{}' share address {}",
                other.name, entry.name, entry.address
            )));
        }
        debug!(
            name = %entry.name,
            address = entry.address,
            width = entry.width,
            writeable = entry.writeable,
            "discovered signal"
        );
        entries.push(entry);
    }
    Ok(entries)
}

/// Length of the field bytes at the start of `rest`.
///
/// The first two bytes are taken as address and descriptor whatever their
/// value. A record separator among them still ends the record when another
/// `name` plus field separator follows it, so a short record never swallows
/// the next one.
fn record_len(rest: &[u8], field_sep: u8, record_sep: u8) -> usize {
    let full = rest
        .iter()
        .skip(2)
        .position(|&b| b == record_sep)
        .map(|p| p + 2)
        .unwrap_or(rest.len());
    if let Some(early) = rest[..full.min(2)].iter().position(|&b| b == record_sep) {
        let next = &rest[early + 1..full];
        if next.iter().skip(1).any(|&b| b == field_sep) {
            return early;
        }
    }
    full
}

fn trim_noise(raw: &[u8], record_sep: u8) -> &[u8] {
    let start = raw
        .iter()
        .position(|&b| b != record_sep && b != SENTINEL && !b.is_ascii_whitespace())
        .unwrap_or(raw.len());
    &raw[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> HashMap<u8, String> {
        let mut m = HashMap::new();
        m.insert(0, "clk".to_string());
        m.insert(1, "rst_n".to_string());
        m.insert(35, "uo_out".to_string());
        m.insert(33, "ui_in".to_string());
        m
    }

    // ---------------------------------------------------------------
    // Command encoding
    // ---------------------------------------------------------------

    #[test]
    fn encode_single_bit_commands() {
        assert_eq!(encode_read(0).unwrap(), 0x81);
        assert_eq!(encode_write(0, 0).unwrap(), vec![0x80]);
        assert_eq!(encode_write(0, 1).unwrap(), vec![0x82]);
        assert_eq!(encode_write(15, 1).unwrap(), vec![0xBE]);
        assert_eq!(encode_read(15).unwrap(), 0xBD);
    }

    #[test]
    fn encode_multi_bit_commands() {
        assert_eq!(encode_write(35, 0x2A).unwrap(), vec![0xC6, 0x2A]);
        assert_eq!(encode_read(35).unwrap(), 0xC7);
        assert_eq!(encode_write(32, 0).unwrap(), vec![0xC0, 0x00]);
        assert_eq!(encode_read(63).unwrap(), 0xFF);
    }

    #[test]
    fn command_layout_bits() {
        for address in 0..SINGLE_BIT_SLOTS {
            let cmd = encode_read(address).unwrap();
            assert_eq!(cmd & IO_FLAG, IO_FLAG);
            assert_eq!(cmd & MULTI_BIT_CMD_FLAG, 0);
            assert_eq!((cmd >> 2) & 0x0F, address);
            assert_eq!(cmd & READ_FLAG, READ_FLAG);
        }
        for address in 32..=MAX_ADDRESS {
            let cmd = encode_write(address, 0).unwrap()[0];
            assert_eq!(cmd & (IO_FLAG | MULTI_BIT_CMD_FLAG), IO_FLAG | MULTI_BIT_CMD_FLAG);
            assert_eq!((cmd >> 1) & 0x1F, address & 0x1F);
            assert_eq!(cmd & READ_FLAG, 0);
        }
    }

    #[test]
    fn encode_rejects_bad_values_and_addresses() {
        assert!(matches!(encode_write(3, 2), Err(Error::Configuration(_))));
        assert!(matches!(encode_write(35, 256), Err(Error::Configuration(_))));
        assert!(matches!(encode_read(64), Err(Error::Configuration(_))));
        assert!(matches!(encode_read(16), Err(Error::Configuration(_))));
    }

    #[test]
    fn encode_monitoring_command() {
        assert_eq!(encode_monitoring(true), [b'm', 1]);
        assert_eq!(encode_monitoring(false), [b'm', 0]);
    }

    // ---------------------------------------------------------------
    // Frame decoding
    // ---------------------------------------------------------------

    #[test]
    fn decode_uo_out_frame() {
        let mut d = FrameDecoder::new(ProtocolRevision::Current);
        let report = d.decode(&[0xFF, 0x23, 0x2A], &names());
        assert_eq!(report.all_changes(), &[("uo_out".to_string(), 0x2A)]);
        assert!(!d.has_partial());
    }

    #[test]
    fn single_bit_write_echo_round_trip() {
        let mut names = HashMap::new();
        for address in 0..SINGLE_BIT_SLOTS {
            names.insert(address, format!("s{address}"));
        }
        for address in 0..SINGLE_BIT_SLOTS {
            for value in 0..=1u32 {
                let cmd = encode_write(address, value).unwrap();
                let echoed_value = (cmd[0] & VALUE_FLAG) >> 1;
                let echoed_address = (cmd[0] >> 2) & 0x0F;
                let frame = ProtocolRevision::Current.encode_frame(echoed_address, echoed_value);
                let mut d = FrameDecoder::new(ProtocolRevision::Current);
                let report = d.decode(&frame, &names);
                assert_eq!(report.get(&format!("s{address}")), Some(value));
                assert_eq!(report.len(), 1);
            }
        }
    }

    #[test]
    fn skips_sentinels_and_markers_between_frames() {
        let mut d = FrameDecoder::new(ProtocolRevision::Current);
        let stream = [0xFF, b'm', 0x00, 0x01, 0xFF, 0xFF, 0x01, 0x00, b'm'];
        let report = d.decode(&stream, &names());
        assert_eq!(report.get("clk"), Some(1));
        assert_eq!(report.get("rst_n"), Some(0));
        assert_eq!(d.take_markers(), 2);
        assert_eq!(d.take_markers(), 0);
    }

    #[test]
    fn value_bytes_equal_to_separators_are_values() {
        let mut d = FrameDecoder::new(ProtocolRevision::Current);
        let report = d.decode(&[0x23, 0xFF, 0x21, b'm'], &names());
        assert_eq!(report.get("uo_out"), Some(0xFF));
        assert_eq!(report.get("ui_in"), Some(u32::from(b'm')));
    }

    #[test]
    fn last_value_wins_within_a_batch() {
        let mut d = FrameDecoder::new(ProtocolRevision::Current);
        let report = d.decode(&[0xFF, 0x00, 0x01, 0xFF, 0x00, 0x00], &names());
        assert_eq!(report.get("clk"), Some(0));
        assert_eq!(report.len(), 1);
        assert_eq!(report.num_changes(), 2);
    }

    #[test]
    fn unknown_address_is_skipped() {
        let mut d = FrameDecoder::new(ProtocolRevision::Current);
        let report = d.decode(&[0xFF, 0x07, 0x01, 0xFF, 0x23, 0x05], &names());
        assert_eq!(report.all_changes(), &[("uo_out".to_string(), 5)]);
    }

    #[test]
    fn split_frame_is_carried_over() {
        let mut d = FrameDecoder::new(ProtocolRevision::Current);
        let first = d.decode(&[0xFF, 0x23], &names());
        assert!(first.is_empty());
        assert!(d.has_partial());
        assert_eq!(d.bytes_to_complete(), 1);
        let second = d.decode(&[0x2A], &names());
        assert_eq!(second.get("uo_out"), Some(0x2A));
        assert!(!d.has_partial());
    }

    fn merged(d: &mut FrameDecoder, chunks: &[&[u8]]) -> StateChangeReport {
        let mut out = StateChangeReport::new();
        for chunk in chunks {
            let report = d.decode(chunk, &names());
            for (name, value) in report.all_changes() {
                out.add_change(name, *value);
            }
        }
        out
    }

    #[test]
    fn any_split_point_decodes_like_the_whole_stream() {
        let stream: Vec<u8> = vec![
            0xFF, 0x00, 0x01, b'm', 0x23, 0x2A, 0xFF, 0xFF, 0x21, 0xFF, 0x01, 0x01, 0x00, 0x00,
            0xFF, 0x23, 0x2B,
        ];
        for revision in [ProtocolRevision::Current] {
            let whole = FrameDecoder::new(revision).decode(&stream, &names());
            for split in 0..=stream.len() {
                let mut d = FrameDecoder::new(revision);
                let (a, b) = stream.split_at(split);
                let parts = merged(&mut d, &[a, b]);
                assert_eq!(parts.all_changes(), whole.all_changes(), "split at {split}");
                assert!(!d.has_partial());
            }
        }
    }

    #[test]
    fn legacy_triples_split_anywhere() {
        let stream: Vec<u8> = vec![
            0xFF, 0x00, b'=', 0x01, 0xFF, 0x23, b'=', 0x2A, b'm', 0x01, b'=', 0x00,
        ];
        let whole = FrameDecoder::new(ProtocolRevision::Legacy).decode(&stream, &names());
        assert_eq!(whole.get("clk"), Some(1));
        assert_eq!(whole.get("uo_out"), Some(0x2A));
        assert_eq!(whole.get("rst_n"), Some(0));
        for split in 0..=stream.len() {
            let mut d = FrameDecoder::new(ProtocolRevision::Legacy);
            let (a, b) = stream.split_at(split);
            let parts = merged(&mut d, &[a, b]);
            assert_eq!(parts.all_changes(), whole.all_changes(), "split at {split}");
        }
    }

    #[test]
    fn legacy_bad_separator_resyncs() {
        let mut d = FrameDecoder::new(ProtocolRevision::Legacy);
        let report = d.decode(&[0x23, 0x00, 0x23, b'=', 0x07], &names());
        assert_eq!(report.all_changes(), &[("uo_out".to_string(), 7)]);
    }

    #[test]
    fn clear_drops_partial() {
        let mut d = FrameDecoder::new(ProtocolRevision::Current);
        d.decode(&[0x23], &names());
        assert!(d.has_partial());
        d.clear();
        assert!(!d.has_partial());
        assert_eq!(d.bytes_to_complete(), 0);
    }

    // ---------------------------------------------------------------
    // Listing
    // ---------------------------------------------------------------

    #[test]
    fn parse_current_listing() {
        let reply = b"clk~\x00\x81|rst_n~\x01\x81|uo_out~\x23\x08|ui_in~\x21\x88|";
        let entries = parse_listing(reply, ProtocolRevision::Current).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(
            entries[2],
            ListingEntry {
                name: "uo_out".into(),
                address: 35,
                width: 8,
                writeable: false,
            }
        );
        assert!(entries[3].writeable);
        assert_eq!(entries[3].width, 8);
    }

    #[test]
    fn parse_legacy_listing_with_newline_address() {
        // Address 10 is '\n', the legacy record separator.
        let reply = b"clk:\x00\x81\nbit10:\x0a\x01\nuo_out:\x23\x08\n";
        let entries = parse_listing(reply, ProtocolRevision::Legacy).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["clk", "bit10", "uo_out"]);
        assert_eq!(entries[1].address, 10);
    }

    #[test]
    fn listing_round_trips_through_encoder() {
        let entries = vec![
            ListingEntry::from_raw("clk", 0, 0x81),
            ListingEntry::from_raw("uo_out", 35, 0x08),
        ];
        for revision in [ProtocolRevision::Current, ProtocolRevision::Legacy] {
            let reply = encode_listing(&entries, revision);
            assert_eq!(parse_listing(&reply, revision).unwrap(), entries);
        }
    }

    #[test]
    fn short_record_is_skipped() {
        let reply = b"clk~\x00\x81|bad~\x00";
        let entries = parse_listing(reply, ProtocolRevision::Current).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "clk");
    }

    #[test]
    fn short_record_mid_listing_keeps_next() {
        let reply = b"bad~\x00|clk~\x00\x81|uo_out~\x23\x08|";
        let entries = parse_listing(reply, ProtocolRevision::Current).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["clk", "uo_out"]);
        assert_eq!(entries[0].address, 0);
        assert_eq!(entries[1].address, 0x23);

        let empty = b"bad~|clk~\x00\x81|";
        let entries = parse_listing(empty, ProtocolRevision::Current).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "clk");
    }

    #[test]
    fn separator_valued_fields_stay_in_record() {
        // Descriptor byte equal to the record separator.
        let reply = b"clk~\x00||rst_n~\x01\x81|";
        let entries = parse_listing(reply, ProtocolRevision::Current).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "clk");
        assert_eq!(entries[1].name, "rst_n");
    }

    #[test]
    fn listing_rejects_duplicates_and_bad_addresses() {
        let dup_name = b"clk~\x00\x81|clk~\x01\x81|";
        assert!(matches!(
            parse_listing(dup_name, ProtocolRevision::Current),
            Err(Error::Configuration(_))
        ));
        let dup_addr = b"clk~\x00\x81|rst_n~\x00\x81|";
        assert!(matches!(
            parse_listing(dup_addr, ProtocolRevision::Current),
            Err(Error::Configuration(_))
        ));
        let single_high = b"x~\x10\x01|";
        assert!(parse_listing(single_high, ProtocolRevision::Current).is_err());
        let too_high = b"x~\x40\x08|";
        assert!(parse_listing(too_high, ProtocolRevision::Current).is_err());
    }
}
