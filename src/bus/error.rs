//! Bus-level error types

use thiserror::Error;

use crate::protocol;

/// Errors surfaced by the bus master and node handles
#[derive(Error, Debug)]
pub enum BusError {
    /// Codec or transport failure, including timeouts
    #[error(transparent)]
    Protocol(#[from] protocol::Error),

    /// Node rejected the frame with a non-OK status
    #[error("node rejected frame with status {status:#04x}")]
    StatusNack {
        /// Raw status byte
        status: u8,
    },

    /// Device accepted the frame but refused the command
    #[error("device rejected command with report {report:#04x}")]
    ReportNack {
        /// Raw report byte
        report: u8,
    },

    /// Checksum faults outlasted the resend budget
    #[error("checksum faults persisted after {resends} resends")]
    ResendExhausted {
        /// Resends attempted before giving up
        resends: u32,
    },

    /// Reply failed its checksum where no resend is possible
    #[error("reply failed checksum")]
    ChecksumFault,

    /// Reply carried no data where some was required
    #[error("reply carried no data")]
    EmptyResponse,

    /// Bus faults outlasted the enumeration restart budget
    #[error("enumeration aborted after {restarts} restarts")]
    EnumerationAborted {
        /// Restarts attempted
        restarts: u32,
    },

    /// A discovered node never answered its info queries
    #[error("node {address} unresponsive after {attempts} attempts")]
    NodeUnresponsive {
        /// Node address
        address: u8,
        /// Attempts made
        attempts: u32,
    },

    /// No transport candidate matched a known device
    #[error("no known bus device found")]
    DeviceNotFound,
}

impl BusError {
    /// Whether this error is a transport timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Protocol(err) if err.is_timeout())
    }

    /// Whether repeating the operation may succeed.
    ///
    /// Timeouts and any node-signalled rejection are retryable. Local I/O
    /// failures and exhausted budgets are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Protocol(protocol::Error::Io(_)) => false,
            Self::Protocol(_)
            | Self::StatusNack { .. }
            | Self::ReportNack { .. }
            | Self::ResendExhausted { .. }
            | Self::ChecksumFault
            | Self::EmptyResponse => true,
            Self::EnumerationAborted { .. } | Self::NodeUnresponsive { .. } | Self::DeviceNotFound => {
                false
            }
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, BusError>;
