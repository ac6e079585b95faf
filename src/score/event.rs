//! Track event model

use bytes::Bytes;

use super::{Result, ScoreError};

/// Meta kind: sequence number
pub const META_SEQUENCE_NUMBER: u8 = 0x00;
/// Meta kind: free text
pub const META_TEXT: u8 = 0x01;
/// Meta kind: copyright notice
pub const META_COPYRIGHT: u8 = 0x02;
/// Meta kind: track name
pub const META_TRACK_NAME: u8 = 0x03;
/// Meta kind: instrument name
pub const META_INSTRUMENT_NAME: u8 = 0x04;
/// Meta kind: lyric
pub const META_LYRIC: u8 = 0x05;
/// Meta kind: marker
pub const META_MARKER: u8 = 0x06;
/// Meta kind: cue point
pub const META_CUE_POINT: u8 = 0x07;
/// Meta kind: channel prefix
pub const META_CHANNEL_PREFIX: u8 = 0x20;
/// Meta kind: end of track
pub const META_END_OF_TRACK: u8 = 0x2F;
/// Meta kind: tempo in microseconds per quarter note
pub const META_TEMPO: u8 = 0x51;
/// Meta kind: SMPTE start offset
pub const META_SMPTE_OFFSET: u8 = 0x54;
/// Meta kind: time signature
pub const META_TIME_SIGNATURE: u8 = 0x58;
/// Meta kind: key signature
pub const META_KEY_SIGNATURE: u8 = 0x59;
/// Meta kind: sequencer specific data
pub const META_SEQUENCER_SPECIFIC: u8 = 0x7F;

/// Channel voice message body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum ChannelMessage {
    NoteOff { key: u8, velocity: u8 },
    NoteOn { key: u8, velocity: u8 },
    KeyPressure { key: u8, pressure: u8 },
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    ChannelPressure { pressure: u8 },
    PitchBend { coarse: u8, fine: u8 },
}

impl ChannelMessage {
    /// Data bytes following a status with this high nibble, `None` for
    /// nibbles that are not channel messages.
    #[must_use]
    pub const fn data_len(status: u8) -> Option<usize> {
        match status >> 4 {
            0x8 | 0x9 | 0xA | 0xB | 0xE => Some(2),
            0xC | 0xD => Some(1),
            _ => None,
        }
    }

    /// Build a message from a channel status byte and its data bytes.
    ///
    /// `data` must hold [`ChannelMessage::data_len`] bytes.
    pub(crate) fn from_parts(status: u8, data: &[u8]) -> Option<Self> {
        let a = *data.first()?;
        let b = data.get(1).copied().unwrap_or(0);
        let message = match status >> 4 {
            0x8 => Self::NoteOff { key: a, velocity: b },
            0x9 => Self::NoteOn { key: a, velocity: b },
            0xA => Self::KeyPressure { key: a, pressure: b },
            0xB => Self::ControlChange {
                controller: a,
                value: b,
            },
            0xC => Self::ProgramChange { program: a },
            0xD => Self::ChannelPressure { pressure: a },
            0xE => Self::PitchBend { coarse: a, fine: b },
            _ => return None,
        };
        Some(message)
    }
}

/// Channel voice event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelEvent {
    /// Channel, 0..=15
    pub channel: u8,
    /// Message body
    pub message: ChannelMessage,
}

/// SMPTE start time of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub struct SmpteOffset {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub fractional_frames: u8,
}

/// Time signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeSignature {
    /// Beats per bar
    pub numerator: u8,
    /// Beat unit as a power of two
    pub denominator_log2: u8,
    /// MIDI clocks per metronome click
    pub clocks_per_click: u8,
    /// Notated 32nd notes per quarter note
    pub thirty_seconds_per_quarter: u8,
}

/// Key signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeySignature {
    /// Sharps when positive, flats when negative
    pub accidentals: i8,
    /// Minor key
    pub minor: bool,
}

/// Meta event
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum MetaEvent {
    SequenceNumber(u16),
    Text(String),
    Copyright(String),
    TrackName(String),
    InstrumentName(String),
    Lyric(String),
    Marker(String),
    CuePoint(String),
    ChannelPrefix(u8),
    EndOfTrack,
    /// Microseconds per quarter note
    Tempo(u32),
    SmpteOffset(SmpteOffset),
    TimeSignature(TimeSignature),
    KeySignature(KeySignature),
    SequencerSpecific(Bytes),
    /// Kind this crate does not interpret
    Unknown { kind: u8, data: Bytes },
}

impl MetaEvent {
    /// Interpret the data of a meta event of `kind`.
    ///
    /// Text is decoded as Latin-1.
    pub fn decode(kind: u8, data: Bytes) -> Result<Self> {
        let len = data.len();
        let need = |min: usize| {
            if len < min {
                Err(ScoreError::MalformedMeta { kind, len })
            } else {
                Ok(())
            }
        };

        let event = match kind {
            META_SEQUENCE_NUMBER => {
                need(2)?;
                Self::SequenceNumber(u16::from_be_bytes([data[0], data[1]]))
            }
            META_TEXT => Self::Text(latin1(&data)),
            META_COPYRIGHT => Self::Copyright(latin1(&data)),
            META_TRACK_NAME => Self::TrackName(latin1(&data)),
            META_INSTRUMENT_NAME => Self::InstrumentName(latin1(&data)),
            META_LYRIC => Self::Lyric(latin1(&data)),
            META_MARKER => Self::Marker(latin1(&data)),
            META_CUE_POINT => Self::CuePoint(latin1(&data)),
            META_CHANNEL_PREFIX => {
                need(1)?;
                Self::ChannelPrefix(data[0])
            }
            META_END_OF_TRACK => Self::EndOfTrack,
            META_TEMPO => {
                need(3)?;
                Self::Tempo(u32::from_be_bytes([0, data[0], data[1], data[2]]))
            }
            META_SMPTE_OFFSET => {
                need(5)?;
                Self::SmpteOffset(SmpteOffset {
                    hours: data[0],
                    minutes: data[1],
                    seconds: data[2],
                    frames: data[3],
                    fractional_frames: data[4],
                })
            }
            META_TIME_SIGNATURE => {
                need(4)?;
                Self::TimeSignature(TimeSignature {
                    numerator: data[0],
                    denominator_log2: data[1],
                    clocks_per_click: data[2],
                    thirty_seconds_per_quarter: data[3],
                })
            }
            META_KEY_SIGNATURE => {
                need(2)?;
                Self::KeySignature(KeySignature {
                    accidentals: data[0] as i8,
                    minor: data[1] != 0,
                })
            }
            META_SEQUENCER_SPECIFIC => Self::SequencerSpecific(data),
            kind => {
                tracing::debug!(kind, len, "unknown meta event");
                Self::Unknown { kind, data }
            }
        };
        Ok(event)
    }
}

fn latin1(data: &[u8]) -> String {
    data.iter().map(|&b| char::from(b)).collect()
}

/// System exclusive message
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SysEx {
    /// Introduced by `0xF0` rather than the `0xF7` escape form
    pub start: bool,
    /// Message bytes after the length
    pub data: Bytes,
}

/// One event of a track
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackEvent {
    /// Channel voice message
    Channel(ChannelEvent),
    /// Meta event
    Meta(MetaEvent),
    /// System exclusive message
    SysEx(SysEx),
}

impl TrackEvent {
    /// Whether this ends its track
    #[must_use]
    pub const fn is_end_of_track(&self) -> bool {
        matches!(self, Self::Meta(MetaEvent::EndOfTrack))
    }

    /// Tempo carried by a tempo meta event
    #[must_use]
    pub const fn tempo(&self) -> Option<u32> {
        match self {
            Self::Meta(MetaEvent::Tempo(tempo)) => Some(*tempo),
            _ => None,
        }
    }
}

/// Event with its absolute tick within its track
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimedEvent {
    /// Ticks since the start of the track
    pub tick: u64,
    /// The event
    pub event: TrackEvent,
}
