//! G6 protocol error types

use thiserror::Error;

/// Frame and codec errors
#[derive(Error, Debug)]
pub enum Error {
    /// Outbound body does not fit the single length byte
    #[error("frame too long: {len} bytes (max {max})")]
    FrameTooLong {
        /// Body length including checksum
        len: usize,
        /// Maximum allowed
        max: usize,
    },

    /// No byte arrived inside the transport's wait window
    #[error("timed out waiting for bus data")]
    Timeout,

    /// Capability descriptor ended in the middle of an entry
    #[error("capability entry {tag:#04x} truncated: need {needed} bytes, got {available}")]
    TruncatedFeature {
        /// Tag of the truncated entry
        tag: u8,
        /// Bytes the entry occupies after its tag
        needed: usize,
        /// Bytes left in the descriptor
        available: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => Self::Timeout,
            _ => Self::Io(err),
        }
    }
}

impl Error {
    /// Whether this error is a transport timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
