//! Scripted mock transport for byte-exact protocol tests.
//!
//! [`MockTransport`] plays a script: each host command must match the next
//! expected request, whose reply then becomes readable. Bytes the device
//! sends on its own can be queued at any point of the script and surface
//! once every exchange scripted before them has happened.
//!
//! # Example
//!
//! ```
//! use benchlink_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // Reading uo_out (address 35) returns 0x2A.
//! mock.expect(&[0xC7], &[0x2A]);
//! // After that read the device reports uo_out = 0x2B by itself.
//! mock.push_unsolicited(&[0xFF, 0x23, 0x2B]);
//! // Writing clk high gets no reply.
//! mock.expect(&[0x82], &[]);
//! assert_eq!(mock.remaining_expectations(), 2);
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use benchlink_core::error::{Error, Result};
use benchlink_core::transport::Transport;

#[derive(Debug, Clone)]
enum Step {
    Exchange { request: Vec<u8>, reply: Vec<u8> },
    Unsolicited(Vec<u8>),
}

/// A scripted [`Transport`].
///
/// `receive()` never waits: with nothing readable it fails with
/// [`Error::Timeout`] at once.
#[derive(Debug)]
pub struct MockTransport {
    script: VecDeque<Step>,
    inbox: VecDeque<u8>,
    max_chunk: usize,
    connected: bool,
    sends: Vec<Vec<u8>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            inbox: VecDeque::new(),
            max_chunk: usize::MAX,
            connected: true,
            sends: Vec::new(),
        }
    }

    /// Script a command and the device's reply (empty for none).
    pub fn expect(&mut self, request: &[u8], reply: &[u8]) {
        self.script.push_back(Step::Exchange {
            request: request.to_vec(),
            reply: reply.to_vec(),
        });
    }

    /// Script bytes the device sends without being asked. They become
    /// readable after every exchange scripted so far.
    pub fn push_unsolicited(&mut self, bytes: &[u8]) {
        self.script.push_back(Step::Unsolicited(bytes.to_vec()));
        self.release();
    }

    /// Deliver at most `n` bytes per `receive()` call.
    pub fn set_max_chunk(&mut self, n: usize) {
        self.max_chunk = n.max(1);
    }

    /// Every `send()` so far.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sends
    }

    /// Every byte sent so far.
    pub fn sent_bytes(&self) -> Vec<u8> {
        self.sends.concat()
    }

    /// Exchanges not yet played.
    pub fn remaining_expectations(&self) -> usize {
        self.script
            .iter()
            .filter(|s| matches!(s, Step::Exchange { .. }))
            .count()
    }

    /// Bytes readable right now.
    pub fn unread(&self) -> usize {
        self.inbox.len()
    }

    /// Reconnect or disconnect without clearing the script.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Move leading unsolicited steps into the inbox.
    fn release(&mut self) {
        while let Some(Step::Unsolicited(_)) = self.script.front() {
            if let Some(Step::Unsolicited(bytes)) = self.script.pop_front() {
                self.inbox.extend(bytes);
            }
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.sends.push(data.to_vec());
        trace!(data = ?data, "mock tx");

        match self.script.pop_front() {
            Some(Step::Exchange { request, reply }) if request == data => {
                self.inbox.extend(reply);
                self.release();
                Ok(())
            }
            Some(Step::Exchange { request, .. }) => Err(Error::Protocol(format!(
                "mock expected {request:02X?}, host sent {data:02X?}"
            ))),
            Some(Step::Unsolicited(_)) | None => Err(Error::Protocol(format!(
                "mock script exhausted, host sent {data:02X?}"
            ))),
        }
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        let n = self.inbox.len().min(buf.len()).min(self.max_chunk);
        if n == 0 {
            return Err(Error::Timeout);
        }
        for (slot, byte) in buf.iter_mut().zip(self.inbox.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.inbox.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
