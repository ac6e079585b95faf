//! Byte transports the bus master can drive
//!
//! The engine needs three primitives from the wire: write a frame, read one
//! byte within a deadline, and drop whatever input is buffered.

mod bridge;
#[cfg(feature = "debug-tools")]
mod capture;
mod memory;
mod tcp;

use std::io;
use std::time::Duration;

pub use bridge::BridgeTransport;
#[cfg(feature = "debug-tools")]
pub use capture::{Direction, WireCapture};
pub use memory::MemoryTransport;
pub use tcp::TcpTransport;

/// Duplex byte stream with a per-read deadline.
///
/// A read that finds no byte within `timeout` must fail with
/// [`io::ErrorKind::TimedOut`] (or [`io::ErrorKind::WouldBlock`]).
pub trait Transport: Send {
    /// Write every byte of `bytes`.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read a single byte, waiting at most `timeout`.
    fn read_byte(&mut self, timeout: Duration) -> io::Result<u8>;

    /// Drop any input received but not yet read.
    fn discard_input(&mut self) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_all(bytes)
    }

    fn read_byte(&mut self, timeout: Duration) -> io::Result<u8> {
        (**self).read_byte(timeout)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        (**self).discard_input()
    }
}

pub(crate) fn timed_out(what: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, what)
}
