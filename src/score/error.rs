//! Score parsing errors

use thiserror::Error;

/// Structural faults in a score file. Parsing never recovers from these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoreError {
    /// Chunk did not start with the expected tag
    #[error("bad chunk magic: expected {expected:?}, found {found:?}")]
    BadMagic {
        /// Tag that was expected
        expected: [u8; 4],
        /// Tag that was read
        found: [u8; 4],
    },

    /// Header chunk declares fewer than six bytes
    #[error("header chunk too short: {len} bytes")]
    HeaderTooShort {
        /// Declared header length
        len: u32,
    },

    /// Format field outside 0..=2
    #[error("unknown score format {0}")]
    UnknownFormat(u16),

    /// Division that cannot be turned into a tempo
    #[error("invalid division {raw:#06x}")]
    InvalidDivision {
        /// Raw division field
        raw: u16,
    },

    /// Input ended inside a chunk or event
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof {
        /// Offset where more bytes were needed
        offset: usize,
    },

    /// Variable-length quantity longer than four bytes
    #[error("variable-length quantity too long at offset {offset}")]
    VlqTooLong {
        /// Offset of the quantity
        offset: usize,
    },

    /// Data byte where a status byte was needed and no running status is set
    #[error("running status used before any status at offset {offset}")]
    RunningStatusWithoutStatus {
        /// Offset of the data byte
        offset: usize,
    },

    /// System message not allowed in a track chunk
    #[error("unsupported status {status:#04x} at offset {offset}")]
    UnsupportedStatus {
        /// Status byte
        status: u8,
        /// Offset of the status byte
        offset: usize,
    },

    /// Channel data byte with its top bit set
    #[error("data byte {byte:#04x} at offset {offset} has its top bit set")]
    InvalidDataByte {
        /// Offending byte
        byte: u8,
        /// Offset of the byte
        offset: usize,
    },

    /// Track data ran out before an end-of-track event
    #[error("track {track} has no end-of-track event")]
    MissingEndOfTrack {
        /// Track index
        track: usize,
    },

    /// Bytes left after the declared tracks
    #[error("{remaining} bytes left after the last track")]
    TrailingData {
        /// Unconsumed byte count
        remaining: usize,
    },

    /// Meta event too short for its kind
    #[error("malformed meta event {kind:#04x} with {len} bytes")]
    MalformedMeta {
        /// Meta kind byte
        kind: u8,
        /// Data length
        len: usize,
    },

    /// Single-track format with no track
    #[error("format 0 score has no track")]
    EmptyFormat0,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ScoreError>;
