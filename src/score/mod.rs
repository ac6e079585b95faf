//! Score files
//!
//! A score is a header chunk followed by track chunks. [`Score::parse`]
//! checks the container and every track up front, so a score that parses is
//! safe to mix and perform.
//!
//! # Quick Start
//!
//! ```rust
//! use g6::score::{Score, TrackEvent};
//!
//! let source = [
//!     b'M', b'T', b'h', b'd', 0, 0, 0, 6, 0, 0, 0, 1, 0, 96,
//!     b'M', b'T', b'r', b'k', 0, 0, 0, 8,
//!     0x00, 0x90, 0x3C, 0x40,
//!     0x60, 0xFF, 0x2F, 0x00,
//! ];
//! let score = Score::parse(source.to_vec())?;
//!
//! let events: Vec<_> = score.mixer()?.collect();
//! assert_eq!(events[1].timestamp_ms, 500);
//! assert!(matches!(events[0].event, TrackEvent::Channel(_)));
//! # Ok::<(), g6::score::ScoreError>(())
//! ```

mod error;
pub mod event;
mod header;
mod mixer;
mod roster;
mod track;
pub mod vlq;

use bytes::Bytes;
use tracing::debug;

pub use error::{Result, ScoreError};
pub use event::{
    ChannelEvent, ChannelMessage, KeySignature, MetaEvent, SmpteOffset, SysEx, TimeSignature,
    TimedEvent, TrackEvent,
};
pub use header::{Division, Format, HEADER_MAGIC, Header};
pub use mixer::{DEFAULT_TEMPO_US, MixedEvent, Mixer};
pub use roster::{PROGRAM_NAMES, Roster, TrackSummary, program_name};
pub use track::{TRACK_MAGIC, Track, TrackEvents};

/// Tag plus big-endian length
pub(crate) const CHUNK_PREFIX_LEN: usize = 8;

/// Split the chunk at `offset` into its declared length and body.
pub(crate) fn chunk(source: &[u8], offset: usize, magic: [u8; 4]) -> Result<(u32, &[u8])> {
    let prefix = source
        .get(offset..offset + CHUNK_PREFIX_LEN)
        .ok_or(ScoreError::UnexpectedEof {
            offset: source.len(),
        })?;
    let (found, len) = prefix.split_at(4);
    let found: [u8; 4] = [found[0], found[1], found[2], found[3]];
    if found != magic {
        return Err(ScoreError::BadMagic {
            expected: magic,
            found,
        });
    }

    let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]);
    let start = offset + CHUNK_PREFIX_LEN;
    let body = source
        .get(start..start + len as usize)
        .ok_or(ScoreError::UnexpectedEof {
            offset: source.len(),
        })?;
    Ok((len, body))
}

/// A parsed score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    header: Header,
    tracks: Vec<Track>,
}

impl Score {
    /// Parse a complete score file.
    ///
    /// Track chunks share `source`; nothing is copied.
    ///
    /// # Errors
    ///
    /// Any structural fault in the header, the chunk layout or a track's
    /// events. Bytes after the declared tracks are
    /// [`ScoreError::TrailingData`].
    pub fn parse(source: impl Into<Bytes>) -> Result<Self> {
        let source = source.into();
        let (header, mut offset) = Header::parse(&source)?;

        let mut tracks = Vec::with_capacity(usize::from(header.track_count));
        for index in 0..usize::from(header.track_count) {
            let (_, body) = chunk(&source, offset, TRACK_MAGIC)?;
            let start = offset + CHUNK_PREFIX_LEN;
            let track = Track::new(index, source.slice(start..start + body.len()));
            offset = start + body.len();

            // Walk once so faults surface here rather than mid-performance
            for event in &track {
                event?;
            }
            tracks.push(track);
        }

        if offset != source.len() {
            return Err(ScoreError::TrailingData {
                remaining: source.len() - offset,
            });
        }

        debug!(
            format = header.format.as_u16(),
            tracks = tracks.len(),
            division = %header.division,
            "score parsed"
        );
        Ok(Self { header, tracks })
    }

    /// Header chunk
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Track chunks in file order
    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Merged, rebased event stream
    pub fn mixer(&self) -> Result<Mixer> {
        Mixer::new(self)
    }

    /// Per-track names, channels and programs
    pub fn roster(&self) -> Result<Roster> {
        Roster::from_score(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(format: u16, tracks: &[&[u8]]) -> Vec<u8> {
        let mut out = HEADER_MAGIC.to_vec();
        out.extend_from_slice(&6u32.to_be_bytes());
        out.extend_from_slice(&format.to_be_bytes());
        out.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
        out.extend_from_slice(&96u16.to_be_bytes());
        for track in tracks {
            out.extend_from_slice(&TRACK_MAGIC);
            out.extend_from_slice(&(track.len() as u32).to_be_bytes());
            out.extend_from_slice(track);
        }
        out
    }

    const EOT: &[u8] = &[0x00, 0xFF, 0x2F, 0x00];

    #[test]
    fn test_parse_tracks() {
        let score = Score::parse(file(1, &[EOT, EOT])).unwrap();

        assert_eq!(score.header().format, Format::Simultaneous);
        assert_eq!(score.tracks().len(), 2);
        assert_eq!(score.tracks()[1].index(), 1);
    }

    #[test]
    fn test_trailing_data() {
        let mut source = file(0, &[EOT]);
        source.extend_from_slice(&[0, 0]);

        assert_eq!(Score::parse(source), Err(ScoreError::TrailingData { remaining: 2 }));
    }

    #[test]
    fn test_missing_track_chunk() {
        let mut source = file(1, &[EOT]);
        source[11] = 2;

        assert!(matches!(Score::parse(source), Err(ScoreError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_bad_track_fails_parse() {
        let result = Score::parse(file(0, &[&[0x00, 0x90, 0x40, 0x40]]));
        assert_eq!(result, Err(ScoreError::MissingEndOfTrack { track: 0 }));
    }

    #[test]
    fn test_bad_track_magic() {
        let mut source = file(0, &[EOT]);
        source[14..18].copy_from_slice(b"XTrk");

        assert!(matches!(Score::parse(source), Err(ScoreError::BadMagic { .. })));
    }

    #[test]
    fn test_empty_format0() {
        let score = Score::parse(file(0, &[])).unwrap();
        assert_eq!(score.mixer().unwrap_err(), ScoreError::EmptyFormat0);
    }
}
