//! Handle to one enumerated instrument node

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, instrument, warn};

use super::{BusError, Link, Result};
use crate::protocol::features::{self, ChannelKind, TAG_END};
use crate::protocol::{Command, Feature, Opcode, PacketIn, PacketOut, Report, Version};
use crate::transport::Transport;

/// Identification and capabilities reported by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NodeInfo {
    /// `;`-separated identification string, name first
    pub ident: String,
    /// Command set version
    pub cmd_version: Version,
    /// G6 protocol version
    pub protocol_version: Version,
    /// Communication layer version
    pub comm_version: Version,
    /// Raw capability descriptor
    #[cfg_attr(feature = "serde", serde(skip))]
    pub descriptor: Bytes,
    /// Decoded capability descriptor
    pub features: Vec<Feature>,
}

impl Default for NodeInfo {
    fn default() -> Self {
        Self {
            ident: String::new(),
            cmd_version: Version::default(),
            protocol_version: Version::default(),
            comm_version: Version::default(),
            descriptor: Bytes::from_static(&[TAG_END]),
            features: Vec::new(),
        }
    }
}

impl NodeInfo {
    fn ident_field(&self, index: usize) -> Option<&str> {
        self.ident.split(';').nth(index)
    }
}

/// A node on the bus at a fixed address.
///
/// Handles are created by [`Master::enumerate_bus`](super::Master::enumerate_bus)
/// and share the master's [`Link`].
pub struct Node<T> {
    link: Arc<Link<T>>,
    address: u8,
    info: NodeInfo,
    latency: Duration,
    last_sent: Option<(Vec<u8>, bool)>,
}

impl<T> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("address", &self.address)
            .field("ident", &self.info.ident)
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Node<T> {
    pub(crate) fn new(link: Arc<Link<T>>, address: u8) -> Self {
        Self {
            link,
            address,
            info: NodeInfo::default(),
            latency: Duration::ZERO,
            last_sent: None,
        }
    }

    /// Bus address.
    #[must_use]
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Shared bus access.
    #[must_use]
    pub fn link(&self) -> &Arc<Link<T>> {
        &self.link
    }

    /// Info gathered by [`Node::request_info`].
    #[must_use]
    pub const fn info(&self) -> &NodeInfo {
        &self.info
    }

    /// Instrument name, the first identification field.
    #[must_use]
    pub fn name(&self) -> &str {
        self.info.ident_field(0).unwrap_or_default()
    }

    /// Firmware version, the second identification field.
    #[must_use]
    pub fn firmware_version(&self) -> Option<&str> {
        self.info.ident_field(1)
    }

    /// Decoded capabilities.
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.info.features
    }

    /// Note channels as `channel -> (min, max)`.
    pub fn channels(&self) -> Result<BTreeMap<u8, (u8, u8)>> {
        Ok(features::channels(&self.info.descriptor, ChannelKind::Note)?)
    }

    /// Light channels as `channel -> (min, max)`.
    pub fn light_channels(&self) -> Result<BTreeMap<u8, (u8, u8)>> {
        Ok(features::channels(&self.info.descriptor, ChannelKind::Light)?)
    }

    /// Control channels as `channel -> (min, max)`.
    pub fn control_channels(&self) -> Result<BTreeMap<u8, (u8, u8)>> {
        Ok(features::channels(&self.info.descriptor, ChannelKind::Control)?)
    }

    /// Offset the node asks for, zero when it has none.
    #[must_use]
    pub fn requested_offset_ms(&self) -> i16 {
        self.info
            .features
            .iter()
            .find_map(|feature| match feature {
                Feature::Offset { offset_ms } => Some(*offset_ms),
                _ => None,
            })
            .unwrap_or(0)
    }

    /// Estimated one-way latency from the last [`Node::measure_latency`].
    #[must_use]
    pub const fn latency(&self) -> Duration {
        self.latency
    }

    /// How far ahead of its timestamp a command should be sent, in
    /// microseconds. Requested offset plus measured latency; negative means
    /// behind.
    #[must_use]
    pub fn offset_us(&self) -> i64 {
        let latency = i64::try_from(self.latency.as_micros()).unwrap_or(i64::MAX);
        i64::from(self.requested_offset_ms()) * 1_000 + latency
    }

    /// Query identification, versions and capabilities.
    ///
    /// Nothing is stored unless every query succeeds.
    #[instrument(level = "debug", skip(self), fields(address = self.address))]
    pub fn request_info(&mut self) -> Result<&NodeInfo> {
        let ident = self.exchange_one(Command::bare(Opcode::ReadId))?;
        let ident: String = ident
            .iter()
            .map(|&b| char::from(b))
            .collect::<String>()
            .trim_end_matches('\0')
            .to_owned();

        let cmd_version = self.read_version(Opcode::GetCmdVersion)?;
        let protocol_version = self.read_version(Opcode::GetProtocolVersion)?;
        let comm_version = self.read_version(Opcode::GetCommVersion)?;

        let descriptor = self.exchange_one(Command::bare(Opcode::GetFeatures))?;
        let features = features::decode(&descriptor)?;

        self.info = NodeInfo {
            ident,
            cmd_version,
            protocol_version,
            comm_version,
            descriptor,
            features,
        };
        Ok(&self.info)
    }

    fn read_version(&mut self, opcode: Opcode) -> Result<Version> {
        let data = self.exchange_one(Command::bare(opcode))?;
        data.first()
            .copied()
            .map(Version::from_u8)
            .ok_or(BusError::EmptyResponse)
    }

    /// Send `commands` without waiting for a reply.
    pub fn send(&mut self, commands: Vec<Command>) -> Result<()> {
        let frame = PacketOut::new(self.address, commands).to_bytes()?;
        let sent = self.link.write(&frame);
        self.last_sent = Some((frame, false));
        sent
    }

    /// Send `commands` and wait for the reply.
    pub fn exchange(&mut self, commands: Vec<Command>) -> Result<PacketIn> {
        let frame = PacketOut::new(self.address, commands).to_bytes()?;
        let reply = self.link.exchange(&frame);
        self.last_sent = Some((frame, true));
        reply
    }

    /// Exchange a single command and return the data after its report byte.
    ///
    /// # Errors
    ///
    /// [`BusError::EmptyResponse`] when the reply has no report byte,
    /// [`BusError::ReportNack`] when the report is not OK.
    pub fn exchange_one(&mut self, command: Command) -> Result<Bytes> {
        let reply = self.exchange(vec![command])?;
        let data = reply.data();
        let Some(&report) = data.first() else {
            return Err(BusError::EmptyResponse);
        };
        if report != Report::Ok.as_u8() {
            return Err(BusError::ReportNack { report });
        }
        Ok(data.slice(1..))
    }

    /// Repeat the last frame sent to this node.
    ///
    /// Returns the reply if the frame was an exchange, `None` if it was a
    /// plain send or nothing has been sent yet.
    pub fn resend(&self) -> Result<Option<PacketIn>> {
        match &self.last_sent {
            Some((frame, true)) => self.link.exchange(frame).map(Some),
            Some((frame, false)) => self.link.write(frame).map(|()| None),
            None => Ok(None),
        }
    }

    /// Round trip an empty ping.
    pub fn ping(&mut self) -> Result<PacketIn> {
        self.exchange(vec![Command::bare(Opcode::Ping)])
    }

    /// Bump the node's diagnostic counter.
    pub fn increment_counter(&mut self) -> Result<()> {
        self.send(vec![Command::bare(Opcode::Increment)])
    }

    /// Have the node display its diagnostic counter.
    pub fn show_counter(&mut self) -> Result<()> {
        self.send(vec![Command::bare(Opcode::Counter)])
    }

    /// Trigger `note` at `time` milliseconds.
    pub fn note_down(&mut self, time: u32, channel: u8, note: u8, velocity: u8) -> Result<()> {
        self.send(vec![Command::note_down(time, channel, note, velocity)])
    }

    /// Release `note` at `time` milliseconds.
    pub fn note_up(&mut self, time: u32, channel: u8, note: u8, velocity: u8) -> Result<()> {
        self.send(vec![Command::note_up(time, channel, note, velocity)])
    }

    /// Set `light` to `value` at `time` milliseconds.
    pub fn light(&mut self, time: u32, channel: u8, light: u8, value: u8) -> Result<()> {
        self.send(vec![Command::light(time, channel, light, value)])
    }

    /// Set `control` to `value` at `time` milliseconds. Acknowledged.
    pub fn control(&mut self, time: u32, channel: u8, control: u8, value: u8) -> Result<()> {
        self.exchange_one(Command::control(time, channel, control, value))
            .map(drop)
    }

    /// Estimate one-way latency as half the mean ping round trip.
    #[instrument(level = "debug", skip(self), fields(address = self.address))]
    pub fn measure_latency(&mut self) -> Result<Duration> {
        let config = self.link.config();
        let count = config.ping_count.max(1);
        let delay = config.ping_delay;

        let mut total = Duration::ZERO;
        for _ in 0..count {
            let started = Instant::now();
            self.ping()?;
            total += started.elapsed();
            thread::sleep(delay);
        }

        self.latency = total / (count * 2);
        debug!(latency_us = self.latency.as_micros(), "latency measured");
        Ok(self.latency)
    }

    fn gather(&mut self) -> Result<()> {
        self.request_info()?;
        self.measure_latency()?;
        Ok(())
    }

    /// Gather info and latency, retrying transient failures.
    pub(crate) fn probe(&mut self, attempts: u32) -> Result<()> {
        for attempt in 1..=attempts {
            match self.gather() {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() => {
                    warn!(address = self.address, attempt, error = %err, "node info query failed");
                }
                Err(err) => return Err(err),
            }
        }
        Err(BusError::NodeUnresponsive {
            address: self.address,
            attempts,
        })
    }
}

impl<T: Transport> fmt::Display for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = &self.info;
        let offset_us = self.offset_us();
        let direction = match offset_us {
            0 => "",
            o if o > 0 => "ahead",
            _ => "behind",
        };

        writeln!(f, "G6 Node {}:", self.address)?;
        writeln!(f, "  Identification: {}", info.ident)?;
        writeln!(f, "  CMD Version:    {}", info.cmd_version)?;
        writeln!(f, "  G6 Version:     {}", info.protocol_version)?;
        writeln!(f, "  Comm Version:   {}", info.comm_version)?;
        writeln!(f, "  Latency:       ~{:.2}ms", self.latency.as_secs_f64() * 1_000.0)?;
        writeln!(
            f,
            "  Offset:         {:.2}ms {direction}",
            offset_us.unsigned_abs() as f64 / 1_000.0
        )?;
        writeln!(f, "  Features:")?;
        for feature in &info.features {
            writeln!(f, "   - {feature}")?;
        }
        Ok(())
    }
}
