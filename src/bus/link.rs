//! Exclusive access to the bus transport

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, trace};

use super::{BusConfig, BusError, Result};
use crate::protocol::metrics::Metrics;
use crate::protocol::{self, PacketIn};
#[cfg(feature = "debug-tools")]
use crate::transport::{Direction, WireCapture};
use crate::transport::Transport;

/// Shared, serialised access to the bus.
///
/// Every write, and every write together with the reads answering it, runs
/// while holding one lock, so concurrent callers never observe each other's
/// replies.
#[derive(Debug)]
pub struct Link<T> {
    state: Mutex<LinkState<T>>,
    config: BusConfig,
    #[cfg(feature = "debug-tools")]
    capture: Option<WireCapture>,
}

#[derive(Debug)]
struct LinkState<T> {
    transport: T,
    last_send: Option<Instant>,
}

/// Locked bus, handed out for multi-step sequences.
pub(crate) struct LinkGuard<'a, T> {
    link: &'a Link<T>,
    state: MutexGuard<'a, LinkState<T>>,
}

impl<T: Transport> Link<T> {
    /// Wrap a transport.
    pub fn new(transport: T, config: BusConfig) -> Result<Self> {
        #[cfg(feature = "debug-tools")]
        let capture = match &config.capture_path {
            Some(path) => Some(WireCapture::create(path).map_err(protocol::Error::from)?),
            None => None,
        };

        Ok(Self {
            state: Mutex::new(LinkState {
                transport,
                last_send: None,
            }),
            config,
            #[cfg(feature = "debug-tools")]
            capture,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Write a frame without waiting for a reply.
    #[instrument(level = "trace", skip(self, frame), fields(len = frame.len()))]
    pub fn write(&self, frame: &[u8]) -> Result<()> {
        self.lock().write(frame)
    }

    /// Write a frame and wait for its reply, resending on checksum faults.
    ///
    /// A reply whose checksum failed on either side triggers a verbatim
    /// resend of `frame`, up to [`BusConfig::resend_retries`] times. Any
    /// other non-OK status fails at once with [`BusError::StatusNack`].
    #[instrument(level = "trace", skip(self, frame), fields(len = frame.len()))]
    pub fn exchange(&self, frame: &[u8]) -> Result<PacketIn> {
        self.lock().exchange(frame, self.config.resend_retries)
    }

    /// Run `f` with the bus held.
    pub(crate) fn with_lock<R>(&self, f: impl FnOnce(&mut LinkGuard<'_, T>) -> R) -> R {
        f(&mut self.lock())
    }

    /// Drop any buffered input.
    pub fn discard_input(&self) -> Result<()> {
        let mut guard = self.lock();
        guard
            .state
            .transport
            .discard_input()
            .map_err(|err| BusError::Protocol(err.into()))
    }

    /// Run `f` against the transport with the bus held.
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock().state.transport)
    }

    fn lock(&self) -> LinkGuard<'_, T> {
        // A panic mid-exchange leaves the transport usable; the next reader resyncs on SYNC.
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        LinkGuard { link: self, state }
    }

    #[cfg(feature = "debug-tools")]
    fn record(&self, direction: Direction, frame: &[u8]) {
        if let Some(capture) = &self.capture {
            if let Err(err) = capture.record(direction, frame) {
                debug!(error = ?err, "failed to record bus frame");
            }
        }
    }
}

impl<T: Transport> LinkGuard<'_, T> {
    pub(crate) fn write(&mut self, frame: &[u8]) -> Result<()> {
        let spacing = self.link.config.min_send_spacing;
        if let Some(last) = self.state.last_send {
            let elapsed = last.elapsed();
            if elapsed < spacing {
                thread::sleep(spacing - elapsed);
            }
        }

        self.state
            .transport
            .write_all(frame)
            .map_err(|err| BusError::Protocol(err.into()))?;
        self.state.last_send = Some(Instant::now());
        Metrics::record_frame_sent(frame.len());
        #[cfg(feature = "debug-tools")]
        self.link.record(Direction::Outbound, frame);
        Ok(())
    }

    pub(crate) fn read_reply(&mut self, timeout: Duration) -> Result<PacketIn> {
        let reply = protocol::read_frame(&mut self.state.transport, timeout)?;
        #[cfg(feature = "debug-tools")]
        if let Ok(wire) = protocol::serialize_reply(reply.status_byte(), reply.data()) {
            self.link.record(Direction::Inbound, &wire);
        }
        Ok(reply)
    }

    pub(crate) fn exchange(&mut self, frame: &[u8], retries: u32) -> Result<PacketIn> {
        let started = Instant::now();
        let timeout = self.link.config.response_timeout;
        let mut resends = 0;

        self.write(frame)?;
        loop {
            let reply = self.read_reply(timeout)?;
            if reply.is_ok() {
                Metrics::record_exchange(started.elapsed());
                return Ok(reply);
            }

            if reply.is_checksum_fault() {
                if resends == retries {
                    return Err(BusError::ResendExhausted { resends });
                }
                resends += 1;
                Metrics::record_resend();
                debug!(resends, "checksum fault, resending frame");
                self.write(frame)?;
                continue;
            }

            Metrics::record_status_fault();
            trace!(status = reply.status_byte(), "status fault");
            return Err(BusError::StatusNack {
                status: reply.status_byte(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Command, Opcode, PacketOut, Status, serialize_reply};
    use crate::transport::MemoryTransport;

    fn ping_frame() -> Vec<u8> {
        PacketOut::single(1, Command::bare(Opcode::Ping)).to_bytes().unwrap()
    }

    fn reply(status: Status, data: &[u8]) -> Vec<u8> {
        serialize_reply(status.as_u8(), data).unwrap()
    }

    #[test]
    fn test_exchange_returns_ok_reply() {
        let link = Link::new(MemoryTransport::new(reply(Status::Ok, &[0x01])), BusConfig::immediate()).unwrap();

        let got = link.exchange(&ping_frame()).unwrap();
        assert_eq!(got.data().as_ref(), &[0x01]);
        link.with_transport(|t| assert_eq!(t.writes().len(), 1));
    }

    #[test]
    fn test_checksum_fault_resends_verbatim() {
        let mut input = reply(Status::ChecksumError, &[]);
        input.extend(reply(Status::Ok, &[0x01]));
        let link = Link::new(MemoryTransport::new(input), BusConfig::immediate()).unwrap();
        let frame = ping_frame();

        link.exchange(&frame).unwrap();
        link.with_transport(|t| assert_eq!(t.writes(), &[frame.clone(), frame.clone()]));
    }

    #[test]
    fn test_resend_budget_is_bounded() {
        let config = BusConfig {
            resend_retries: 2,
            ..BusConfig::immediate()
        };
        let mut input = Vec::new();
        for _ in 0..10 {
            input.extend(reply(Status::ChecksumError, &[]));
        }
        let link = Link::new(MemoryTransport::new(input), config).unwrap();

        let result = link.exchange(&ping_frame());
        assert!(matches!(result, Err(BusError::ResendExhausted { resends: 2 })));
        link.with_transport(|t| assert_eq!(t.writes().len(), 3));
    }

    #[test]
    fn test_status_fault_is_not_retried() {
        let mut input = reply(Status::UnknownCommand, &[]);
        input.extend(reply(Status::Ok, &[0x01]));
        let link = Link::new(MemoryTransport::new(input), BusConfig::immediate()).unwrap();

        let result = link.exchange(&ping_frame());
        assert!(matches!(result, Err(BusError::StatusNack { status: 0x02 })));
        link.with_transport(|t| assert_eq!(t.writes().len(), 1));
    }

    #[test]
    fn test_writes_respect_min_spacing() {
        let spacing = Duration::from_millis(20);
        let config = BusConfig {
            min_send_spacing: spacing,
            ..BusConfig::immediate()
        };
        let link = Link::new(MemoryTransport::default(), config).unwrap();
        let frame = ping_frame();

        let started = Instant::now();
        link.write(&frame).unwrap();
        link.write(&frame).unwrap();
        link.write(&frame).unwrap();

        assert!(started.elapsed() >= spacing * 2);
        link.with_transport(|t| assert_eq!(t.writes().len(), 3));
    }

    #[test]
    fn test_silence_is_timeout() {
        let link = Link::new(MemoryTransport::default(), BusConfig::immediate()).unwrap();

        let err = link.exchange(&ping_frame()).unwrap_err();
        assert!(err.is_timeout());
    }
}
