//! Scripted in-memory transport

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use super::{Transport, timed_out};

/// Transport that replays queued input and records every write.
///
/// Reads past the end of the queued input time out immediately.
#[derive(Debug, Default, Clone)]
pub struct MemoryTransport {
    input: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
}

impl MemoryTransport {
    /// Create a transport whose reads yield `input`.
    pub fn new(input: impl Into<VecDeque<u8>>) -> Self {
        Self {
            input: input.into(),
            writes: Vec::new(),
        }
    }

    /// Queue more input behind what is already buffered.
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    /// Bytes still waiting to be read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    /// Every `write_all` call, in order.
    #[must_use]
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }
}

impl Transport for MemoryTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writes.push(bytes.to_vec());
        Ok(())
    }

    fn read_byte(&mut self, _timeout: Duration) -> io::Result<u8> {
        self.input
            .pop_front()
            .ok_or_else(|| timed_out("no scripted input left"))
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.input.clear();
        Ok(())
    }
}
