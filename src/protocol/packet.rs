//! Outbound command frames and inbound reply frames

use bytes::Bytes;

use super::{Opcode, Report, Result, Status};

/// One opcode and its payload inside an outbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    opcode: u8,
    payload: Bytes,
}

impl Command {
    /// Create a command from a known opcode
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self::raw(opcode.as_u8(), payload)
    }

    /// Create a command from a raw opcode byte
    pub fn raw(opcode: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// Command with no payload
    #[must_use]
    pub fn bare(opcode: Opcode) -> Self {
        Self::new(opcode, Bytes::new())
    }

    /// Raw opcode byte
    #[must_use]
    pub const fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Payload bytes
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Bytes this command occupies in a frame body
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        1 + self.payload.len()
    }

    /// Timed note trigger
    #[must_use]
    pub fn note_down(time: u32, channel: u8, note: u8, velocity: u8) -> Self {
        Self::timed(Opcode::NoteDown, time, channel, note, velocity)
    }

    /// Timed note release
    #[must_use]
    pub fn note_up(time: u32, channel: u8, note: u8, velocity: u8) -> Self {
        Self::timed(Opcode::NoteUp, time, channel, note, velocity)
    }

    /// Timed light level
    #[must_use]
    pub fn light(time: u32, channel: u8, light: u8, value: u8) -> Self {
        Self::timed(Opcode::Light, time, channel, light, value)
    }

    /// Timed control channel value
    #[must_use]
    pub fn control(time: u32, channel: u8, control: u8, value: u8) -> Self {
        Self::timed(Opcode::Control, time, channel, control, value)
    }

    /// `[time (u32 LE), channel, parameter, value]`
    fn timed(opcode: Opcode, time: u32, channel: u8, parameter: u8, value: u8) -> Self {
        let mut payload = Vec::with_capacity(7);
        payload.extend_from_slice(&time.to_le_bytes());
        payload.extend_from_slice(&[channel, parameter, value]);
        Self::new(opcode, payload)
    }
}

/// Master-to-node frame before serialization
///
/// # Wire Format
///
/// ```text
/// [SYNC] escaped([dst] [len] [op] [payload..] ([op] [payload..])* [sum])
/// ```
///
/// `len` counts the body bytes before the checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    destination: u8,
    commands: Vec<Command>,
}

impl PacketOut {
    /// Create a frame for `destination` carrying `commands` in order
    #[must_use]
    pub fn new(destination: u8, commands: Vec<Command>) -> Self {
        Self {
            destination,
            commands,
        }
    }

    /// Frame carrying a single command
    #[must_use]
    pub fn single(destination: u8, command: Command) -> Self {
        Self::new(destination, vec![command])
    }

    /// Destination address
    #[must_use]
    pub const fn destination(&self) -> u8 {
        self.destination
    }

    /// Commands in send order
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Whether the addressed node will answer this frame
    #[must_use]
    pub fn expects_response(&self) -> bool {
        self.commands
            .iter()
            .any(|cmd| Opcode::from_u8(cmd.opcode()).is_none_or(Opcode::expects_response))
    }

    /// Serialize to stuffed wire bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        super::serialize(self.destination, &self.commands)
    }
}

/// Node-to-master reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    status: u8,
    data: Bytes,
    checksum_ok: bool,
}

impl PacketIn {
    /// Assemble a reply from its parts
    pub fn new(status: u8, data: impl Into<Bytes>, checksum_ok: bool) -> Self {
        Self {
            status,
            data: data.into(),
            checksum_ok,
        }
    }

    /// Raw status byte
    #[must_use]
    pub const fn status_byte(&self) -> u8 {
        self.status
    }

    /// Decoded status, if known
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        Status::from_u8(self.status)
    }

    /// Data bytes following the status
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Whether the trailing checksum matched what was read
    #[must_use]
    pub const fn checksum_ok(&self) -> bool {
        self.checksum_ok
    }

    /// Reply arrived intact with status OK
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.checksum_ok && self.status == Status::Ok.as_u8()
    }

    /// Either side of the link saw a corrupted frame
    #[must_use]
    pub fn is_checksum_fault(&self) -> bool {
        !self.checksum_ok || self.status == Status::ChecksumError.as_u8()
    }

    /// First data byte interpreted as a report code
    #[must_use]
    pub fn report(&self) -> Option<Report> {
        self.data.first().copied().and_then(Report::from_u8)
    }
}
