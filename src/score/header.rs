//! Header chunk

use std::fmt;

use super::{Result, ScoreError};

/// Header chunk tag
pub const HEADER_MAGIC: [u8; 4] = *b"MThd";

/// Header fields every file carries
const HEADER_MIN_LEN: u32 = 6;

/// How the tracks of a file relate to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Format {
    /// One track carrying every channel
    SingleTrack,
    /// Tracks that play simultaneously
    Simultaneous,
    /// Tracks that play one after another
    Sequential,
}

impl Format {
    /// Decode the header's format field
    pub fn from_u16(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Self::SingleTrack),
            1 => Ok(Self::Simultaneous),
            2 => Ok(Self::Sequential),
            other => Err(ScoreError::UnknownFormat(other)),
        }
    }

    /// Format field value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::SingleTrack => 0,
            Self::Simultaneous => 1,
            Self::Sequential => 2,
        }
    }
}

/// Unit of the tick clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Division {
    /// Ticks per quarter note; wall time follows the tempo
    TicksPerQuarter(u16),
    /// SMPTE frames; wall time ignores the tempo
    Smpte {
        /// Frames per second
        fps: u8,
        /// Ticks per frame
        ticks_per_frame: u8,
    },
}

impl Division {
    /// Decode the header's division field.
    ///
    /// With the top bit set the high byte is the negated frame rate.
    pub fn from_u16(raw: u16) -> Result<Self> {
        let division = if raw & 0x8000 == 0 {
            Self::TicksPerQuarter(raw)
        } else {
            let [hi, lo] = raw.to_be_bytes();
            Self::Smpte {
                fps: (hi as i8).unsigned_abs(),
                ticks_per_frame: lo,
            }
        };

        let usable = match division {
            Self::TicksPerQuarter(tpqn) => tpqn > 0,
            Self::Smpte {
                fps,
                ticks_per_frame,
            } => fps > 0 && ticks_per_frame > 0,
        };
        if usable {
            Ok(division)
        } else {
            Err(ScoreError::InvalidDivision { raw })
        }
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TicksPerQuarter(tpqn) => write!(f, "{tpqn} ticks/quarter"),
            Self::Smpte {
                fps,
                ticks_per_frame,
            } => write!(f, "{fps} fps x {ticks_per_frame} ticks/frame"),
        }
    }
}

/// Decoded header chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    /// Track relationship
    pub format: Format,
    /// Declared number of track chunks
    pub track_count: u16,
    /// Tick unit
    pub division: Division,
}

impl Header {
    /// Decode the header chunk at the start of `source`.
    ///
    /// Returns the header and the number of bytes the chunk occupies. Header
    /// bytes beyond the six known fields are skipped.
    pub fn parse(source: &[u8]) -> Result<(Self, usize)> {
        let (len, body) = super::chunk(source, 0, HEADER_MAGIC)?;
        if len < HEADER_MIN_LEN {
            return Err(ScoreError::HeaderTooShort { len });
        }

        let field = |at: usize| u16::from_be_bytes([body[at], body[at + 1]]);
        let header = Self {
            format: Format::from_u16(field(0))?,
            track_count: field(2),
            division: Division::from_u16(field(4))?,
        };
        Ok((header, super::CHUNK_PREFIX_LEN + body.len()))
    }
}
