//! Capability descriptor decoding
//!
//! A node describes what it can drive as a stream of tagged entries ending in
//! [`TAG_END`]. Known tags carry three bytes after the tag. Tags this crate
//! does not know are assumed to carry three bytes as well, because the
//! descriptor has no length prefix to skip them by.

use std::collections::BTreeMap;
use std::fmt;

use super::{Error, Result};

/// Terminates the descriptor
pub const TAG_END: u8 = 0x00;
/// Note channel: `[channel, min, max]`
pub const TAG_NOTE_CHANNEL: u8 = 0x01;
/// Light channel: `[channel, min, max]`
pub const TAG_LIGHT_CHANNEL: u8 = 0x02;
/// Control channel: `[channel, min, max]`
pub const TAG_CONTROL_CHANNEL: u8 = 0x03;
/// Requested clock offset: `[offset_ms (i16 BE), pad]`
pub const TAG_OFFSET: u8 = 0x04;

const ENTRY_LEN: usize = 3;

/// One decoded capability entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Feature {
    /// Note actuator channel
    Note {
        /// Channel id
        channel: u8,
        /// Lowest accepted note
        min: u8,
        /// Highest accepted note
        max: u8,
    },
    /// Indicator light channel
    Light {
        /// Channel id
        channel: u8,
        /// Lowest light index
        min: u8,
        /// Highest light index
        max: u8,
    },
    /// Generic control channel
    Control {
        /// Channel id
        channel: u8,
        /// Lowest control index
        min: u8,
        /// Highest control index
        max: u8,
    },
    /// Milliseconds the node wants commands ahead of (positive) or behind
    /// (negative) their musical timestamp
    Offset {
        /// Requested offset in milliseconds
        offset_ms: i16,
    },
    /// Entry with a tag this crate does not know
    Unknown {
        /// Raw tag byte
        tag: u8,
        /// The three bytes assumed to follow it
        bytes: [u8; ENTRY_LEN],
    },
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Note { channel, min, max } => {
                write!(f, "Note    | Channel {channel}, min:{min}/max:{max}")
            }
            Self::Light { channel, min, max } => {
                write!(f, "Light   | Channel {channel}, min:{min}/max:{max}")
            }
            Self::Control { channel, min, max } => {
                write!(f, "Control | Channel {channel}, min:{min}/max:{max}")
            }
            Self::Offset { offset_ms } if offset_ms > 0 => {
                write!(f, "Requested offset: {offset_ms}ms ahead")
            }
            Self::Offset { offset_ms: 0 } => write!(f, "Requested offset: none"),
            Self::Offset { offset_ms } => {
                write!(f, "Requested offset: {}ms behind", offset_ms.unsigned_abs())
            }
            Self::Unknown { tag, bytes } => write!(
                f,
                "Unk feature {tag:02x} ({:02x} {:02x} {:02x})",
                bytes[0], bytes[1], bytes[2]
            ),
        }
    }
}

/// Iterator over the entries of a descriptor
///
/// Stops at the end tag even if bytes remain, and at the end of input if the
/// end tag is missing.
#[derive(Debug, Clone)]
pub struct FeatureIter<'a> {
    rest: &'a [u8],
}

impl<'a> FeatureIter<'a> {
    /// Iterate over `descriptor`
    #[must_use]
    pub const fn new(descriptor: &'a [u8]) -> Self {
        Self { rest: descriptor }
    }
}

impl Iterator for FeatureIter<'_> {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&tag, body) = self.rest.split_first()?;
        if tag == TAG_END {
            self.rest = &[];
            return None;
        }

        let Some((entry, rest)) = body.split_first_chunk::<ENTRY_LEN>() else {
            let available = body.len();
            self.rest = &[];
            return Some(Err(Error::TruncatedFeature {
                tag,
                needed: ENTRY_LEN,
                available,
            }));
        };
        self.rest = rest;

        let [a, b, c] = *entry;
        let feature = match tag {
            TAG_NOTE_CHANNEL => Feature::Note {
                channel: a,
                min: b,
                max: c,
            },
            TAG_LIGHT_CHANNEL => Feature::Light {
                channel: a,
                min: b,
                max: c,
            },
            TAG_CONTROL_CHANNEL => Feature::Control {
                channel: a,
                min: b,
                max: c,
            },
            TAG_OFFSET => Feature::Offset {
                offset_ms: i16::from_be_bytes([a, b]),
            },
            _ => Feature::Unknown { tag, bytes: *entry },
        };
        Some(Ok(feature))
    }
}

/// Decode every entry of `descriptor`
pub fn decode(descriptor: &[u8]) -> Result<Vec<Feature>> {
    FeatureIter::new(descriptor).collect()
}

/// Offset requested by the descriptor, zero if it has none
///
/// The first offset entry wins.
pub fn requested_offset_ms(descriptor: &[u8]) -> Result<i16> {
    for feature in FeatureIter::new(descriptor) {
        if let Feature::Offset { offset_ms } = feature? {
            return Ok(offset_ms);
        }
    }
    Ok(0)
}

/// Channel kind selector for [`channels`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Note channels
    Note,
    /// Light channels
    Light,
    /// Control channels
    Control,
}

/// Map of channel id to `(min, max)` for one channel kind
pub fn channels(descriptor: &[u8], kind: ChannelKind) -> Result<BTreeMap<u8, (u8, u8)>> {
    let mut map = BTreeMap::new();
    for feature in FeatureIter::new(descriptor) {
        match (feature?, kind) {
            (Feature::Note { channel, min, max }, ChannelKind::Note)
            | (Feature::Light { channel, min, max }, ChannelKind::Light)
            | (Feature::Control { channel, min, max }, ChannelKind::Control) => {
                map.insert(channel, (min, max));
            }
            _ => {}
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_tags() {
        let descriptor = [
            TAG_NOTE_CHANNEL, 0, 60, 84,
            TAG_LIGHT_CHANNEL, 0, 0, 24,
            TAG_CONTROL_CHANNEL, 1, 0, 127,
            TAG_OFFSET, 0xFF, 0x38, 0,
            TAG_END,
        ];

        let features = decode(&descriptor).unwrap();
        assert_eq!(
            features,
            vec![
                Feature::Note { channel: 0, min: 60, max: 84 },
                Feature::Light { channel: 0, min: 0, max: 24 },
                Feature::Control { channel: 1, min: 0, max: 127 },
                Feature::Offset { offset_ms: -200 },
            ]
        );
        assert_eq!(requested_offset_ms(&descriptor).unwrap(), -200);
    }

    #[test]
    fn test_stops_at_end_tag() {
        let descriptor = [TAG_NOTE_CHANNEL, 2, 1, 9, TAG_END, TAG_OFFSET, 0, 50, 0];

        assert_eq!(decode(&descriptor).unwrap().len(), 1);
        assert_eq!(requested_offset_ms(&descriptor).unwrap(), 0);
    }

    #[test]
    fn test_unknown_tag_consumes_three_bytes() {
        let descriptor = [0x42, 1, 2, 3, TAG_NOTE_CHANNEL, 0, 10, 20, TAG_END];

        let features = decode(&descriptor).unwrap();
        assert_eq!(features[0], Feature::Unknown { tag: 0x42, bytes: [1, 2, 3] });
        assert_eq!(features[1], Feature::Note { channel: 0, min: 10, max: 20 });
    }

    #[test]
    fn test_truncated_entry() {
        let result = decode(&[TAG_LIGHT_CHANNEL, 0, 1]);
        assert!(matches!(
            result,
            Err(Error::TruncatedFeature { tag: TAG_LIGHT_CHANNEL, needed: 3, available: 2 })
        ));
    }

    #[test]
    fn test_channel_maps() {
        let descriptor = [
            TAG_NOTE_CHANNEL, 0, 60, 84,
            TAG_NOTE_CHANNEL, 1, 36, 48,
            TAG_LIGHT_CHANNEL, 0, 0, 24,
            TAG_END,
        ];

        let notes = channels(&descriptor, ChannelKind::Note).unwrap();
        assert_eq!(notes.get(&1), Some(&(36, 48)));
        assert_eq!(notes.len(), 2);
        assert!(channels(&descriptor, ChannelKind::Control).unwrap().is_empty());
    }

    #[test]
    fn test_offset_display() {
        assert_eq!(Feature::Offset { offset_ms: 15 }.to_string(), "Requested offset: 15ms ahead");
        assert_eq!(Feature::Offset { offset_ms: -15 }.to_string(), "Requested offset: 15ms behind");
    }
}
