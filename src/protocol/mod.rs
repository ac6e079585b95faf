//! G6 wire protocol
//!
//! This module provides the reserved bus values, command frames, and the codec
//! that moves them over a byte transport.

mod codec;
mod error;
pub mod features;
pub mod metrics;
mod packet;
mod types;

pub use codec::{checksum, escape, read_frame, serialize, serialize_reply, unescape};
pub use error::{Error, Result};
pub use features::{Feature, FeatureIter};
pub use packet::{Command, PacketIn, PacketOut};
pub use types::{Opcode, Report, Status, Version};

/// Start-of-frame marker. Never appears unescaped inside a frame body.
pub const SYNC: u8 = 0xE0;

/// Escape marker: `[MARK, byte - 1]` stands for a body byte equal to `SYNC` or `MARK`.
pub const MARK: u8 = 0xD0;

/// Address reserved for the bus master.
pub const NODE_MASTER: u8 = 0x00;

/// Destination address every node listens to.
pub const NODE_BROADCAST: u8 = 0xFF;

/// First address handed out during enumeration.
pub const FIRST_NODE_ADDRESS: u8 = 0x01;

/// Last assignable node address.
pub const LAST_NODE_ADDRESS: u8 = 0xFE;

/// Payload the reset command must carry to be honoured.
pub const RESET_CHECK: u8 = 0xD9;

/// Largest body (destination, length, commands, checksum) a length byte can describe.
pub const MAX_BODY_LEN: usize = u8::MAX as usize;
