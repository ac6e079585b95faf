//! G6 opcodes, status codes and report codes

use std::fmt;

/// Commands understood by G6 nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Opcode {
    /// Read the `;`-separated identification string
    ReadId = 0x10,
    /// Query the command-set version
    GetCmdVersion = 0x11,
    /// Query the bus protocol version
    GetProtocolVersion = 0x12,
    /// Query the communication version
    GetCommVersion = 0x13,
    /// Read the capability descriptor
    GetFeatures = 0x14,

    /// Ask the node to retransmit its last reply
    RequestRetransmit = 0x2F,

    /// Round-trip probe
    Ping = 0x60,
    /// Read the sense line
    GetSense = 0x61,
    /// Bump the diagnostic counter
    Increment = 0x62,
    /// Show the diagnostic counter
    Counter = 0x63,

    /// Trigger a note
    NoteDown = 0x70,
    /// Release a note
    NoteUp = 0x71,
    /// Drive an indicator light
    Light = 0x72,
    /// Set a generic control channel
    Control = 0x73,

    /// Reset every node on the bus
    Reset = 0xF0,
    /// Assign an address to the first unaddressed node
    AssignAddress = 0xF1,
}

impl Opcode {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x10 => Some(Self::ReadId),
            0x11 => Some(Self::GetCmdVersion),
            0x12 => Some(Self::GetProtocolVersion),
            0x13 => Some(Self::GetCommVersion),
            0x14 => Some(Self::GetFeatures),
            0x2F => Some(Self::RequestRetransmit),
            0x60 => Some(Self::Ping),
            0x61 => Some(Self::GetSense),
            0x62 => Some(Self::Increment),
            0x63 => Some(Self::Counter),
            0x70 => Some(Self::NoteDown),
            0x71 => Some(Self::NoteUp),
            0x72 => Some(Self::Light),
            0x73 => Some(Self::Control),
            0xF0 => Some(Self::Reset),
            0xF1 => Some(Self::AssignAddress),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether a node answers this command with a frame
    #[must_use]
    pub const fn expects_response(self) -> bool {
        !matches!(
            self,
            Self::Reset | Self::NoteDown | Self::NoteUp | Self::Light | Self::Increment | Self::Counter
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadId => "ReadId",
            Self::GetCmdVersion => "GetCmdVersion",
            Self::GetProtocolVersion => "GetProtocolVersion",
            Self::GetCommVersion => "GetCommVersion",
            Self::GetFeatures => "GetFeatures",
            Self::RequestRetransmit => "RequestRetransmit",
            Self::Ping => "Ping",
            Self::GetSense => "GetSense",
            Self::Increment => "Increment",
            Self::Counter => "Counter",
            Self::NoteDown => "NoteDown",
            Self::NoteUp => "NoteUp",
            Self::Light => "Light",
            Self::Control => "Control",
            Self::Reset => "Reset",
            Self::AssignAddress => "AssignAddress",
        };
        write!(f, "{name}")
    }
}

/// Frame-level status carried by every node reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    /// Frame accepted
    Ok = 0x01,
    /// Opcode not implemented by the node
    UnknownCommand = 0x02,
    /// Node saw a checksum mismatch in the frame it received
    ChecksumError = 0x03,
    /// Frame did not fit the node's receive buffer
    Overflow = 0x04,
    /// Unspecified failure
    Unknown = 0xFF,
}

impl Status {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Ok),
            0x02 => Some(Self::UnknownCommand),
            0x03 => Some(Self::ChecksumError),
            0x04 => Some(Self::Overflow),
            0xFF => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Command-level report, first data byte of an accepted reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Report {
    /// Command executed
    Ok = 0x01,
    /// Command needed a parameter that was missing
    ParamNoData = 0x02,
    /// Command parameter out of range
    ParamInvalid = 0x03,
    /// Device cannot take the command right now
    Busy = 0x04,
}

impl Report {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Ok),
            0x02 => Some(Self::ParamNoData),
            0x03 => Some(Self::ParamInvalid),
            0x04 => Some(Self::Busy),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Nibble-packed version byte (`0x13` is 1.3)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version(u8);

impl Version {
    /// Wrap a raw version byte
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        Self(value)
    }

    /// Raw version byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Major component (high nibble)
    #[must_use]
    pub const fn major(self) -> u8 {
        self.0 >> 4
    }

    /// Minor component (low nibble)
    #[must_use]
    pub const fn minor(self) -> u8 {
        self.0 & 0x0F
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}
