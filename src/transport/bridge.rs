//! Conductor bridge transport
//!
//! The bridge is a microcontroller sitting between the host and the bus. It
//! buffers bus traffic and answers simple requests over its own serial link:
//!
//! ```text
//! write:  0x00 [len_hi] [len_lo] [bytes..]   -> 0xE0 once transmitted
//! read:   0x01 [ms_hi] [ms_lo]               -> 0x00 [byte] | [non-zero] on timeout
//! ```

use std::io::{self, Read, Write};
use std::time::Duration;

use tracing::trace;

use super::{Transport, timed_out};

const REQ_WRITE: u8 = 0x00;
const REQ_READ: u8 = 0x01;
const WRITE_ACK: u8 = 0xE0;
const READ_OK: u8 = 0x00;

/// Bus access through a conductor bridge on any byte stream.
///
/// The underlying stream should carry its own read timeout so a dead bridge
/// surfaces as an error instead of blocking forever.
#[derive(Debug)]
pub struct BridgeTransport<S> {
    stream: S,
}

impl<S: Read + Write + Send> BridgeTransport<S> {
    /// Wrap a stream connected to the bridge.
    pub const fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn read_raw(&mut self, what: &'static str) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte) {
            Ok(1) => Ok(byte[0]),
            Ok(_) => Err(timed_out(what)),
            Err(err) => Err(err),
        }
    }
}

impl<S: Read + Write + Send> Transport for BridgeTransport<S> {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let len = u16::try_from(bytes.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame exceeds bridge limit"))?;
        let [hi, lo] = len.to_be_bytes();
        self.stream.write_all(&[REQ_WRITE, hi, lo])?;
        self.stream.write_all(bytes)?;
        self.stream.flush()?;

        if self.read_raw("bridge write acknowledgement")? != WRITE_ACK {
            return Err(timed_out("bridge rejected write"));
        }
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> io::Result<u8> {
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        let [hi, lo] = millis.to_be_bytes();
        self.stream.write_all(&[REQ_READ, hi, lo])?;
        self.stream.flush()?;

        let status = self.read_raw("bridge read status")?;
        if status != READ_OK {
            trace!(status, "bridge reported bus timeout");
            return Err(timed_out("bus read"));
        }
        self.read_raw("bridge read data")
    }

    fn discard_input(&mut self) -> io::Result<()> {
        // Bytes are pulled one request at a time, nothing is buffered host side.
        Ok(())
    }
}
