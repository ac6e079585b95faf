//! G6 frame codec
//!
//! Outbound frames are checksummed and byte-stuffed so that [`SYNC`] only ever
//! marks the start of a frame. Replies are read byte by byte, resynchronising
//! on [`SYNC`] after noise or a lost byte.

use std::time::Duration;

use tracing::{debug, trace, warn};

use super::metrics::Metrics;
use super::{Command, Error, MARK, MAX_BODY_LEN, NODE_MASTER, PacketIn, Result, SYNC};
use crate::transport::Transport;

/// Serialize a command frame for `destination`
///
/// # Format
///
/// ```text
/// [SYNC] escaped([dst] [len] [op] [payload..]* [sum])
/// ```
///
/// `len` counts the body bytes before the checksum. The sum covers those same
/// bytes, modulo 256, and is computed before escaping.
pub fn serialize(destination: u8, commands: &[Command]) -> Result<Vec<u8>> {
    let body_len = 2 + commands.iter().map(Command::encoded_len).sum::<usize>() + 1;
    if body_len > MAX_BODY_LEN {
        return Err(Error::FrameTooLong {
            len: body_len,
            max: MAX_BODY_LEN,
        });
    }

    let mut body = Vec::with_capacity(body_len);
    body.push(destination);
    body.push(0);
    for cmd in commands {
        body.push(cmd.opcode());
        body.extend_from_slice(cmd.payload());
    }
    // Bounded by MAX_BODY_LEN above
    body[1] = body.len() as u8;
    body.push(checksum(&body));

    let mut wire = Vec::with_capacity(body.len() * 2 + 1);
    wire.push(SYNC);
    escape(&body, &mut wire);
    Ok(wire)
}

/// Append `body` to `out`, replacing `SYNC` and `MARK` bytes with `[MARK, byte - 1]`
pub fn escape(body: &[u8], out: &mut Vec<u8>) {
    for &byte in body {
        if byte == SYNC || byte == MARK {
            out.push(MARK);
            out.push(byte - 1);
        } else {
            out.push(byte);
        }
    }
}

/// Reverse [`escape`] and drop a leading `SYNC`, yielding the frame body
#[must_use]
pub fn unescape(wire: &[u8]) -> Vec<u8> {
    let wire = wire.strip_prefix(&[SYNC]).unwrap_or(wire);
    let mut body = Vec::with_capacity(wire.len());
    let mut bytes = wire.iter().copied();
    while let Some(byte) = bytes.next() {
        if byte == MARK {
            if let Some(next) = bytes.next() {
                body.push(next.wrapping_add(1));
            }
        } else {
            body.push(byte);
        }
    }
    body
}

/// Encode a reply the way a node puts it on the wire
///
/// ```text
/// [SYNC] [master] [len] [status] [data..] [sum]
/// ```
///
/// `len` counts the status, data and checksum bytes.
pub fn serialize_reply(status: u8, data: &[u8]) -> Result<Vec<u8>> {
    let len = data.len() + 2;
    if len > MAX_BODY_LEN {
        return Err(Error::FrameTooLong {
            len,
            max: MAX_BODY_LEN,
        });
    }

    let mut wire = Vec::with_capacity(len + 3);
    wire.push(SYNC);
    wire.push(NODE_MASTER);
    wire.push(len as u8);
    wire.push(status);
    wire.extend_from_slice(data);
    wire.push(checksum(&wire[1..]));
    Ok(wire)
}

/// Sum of `bytes` modulo 256
#[must_use]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Read the next reply addressed to the master
///
/// Bytes before a `SYNC` are discarded. Frames for other addresses are skipped.
/// A frame whose checksum does not match is still returned, flagged through
/// [`PacketIn::checksum_ok`], so the caller's retry policy can decide.
///
/// # Errors
///
/// Returns [`Error::Timeout`] if any byte fails to arrive within `timeout`.
pub fn read_frame<T: Transport + ?Sized>(transport: &mut T, timeout: Duration) -> Result<PacketIn> {
    loop {
        while read_byte(transport, timeout)? != SYNC {}

        let dest = read_byte(transport, timeout)?;
        let len = read_byte(transport, timeout)?;
        let status = read_byte(transport, timeout)?;

        let data_len = usize::from(len).saturating_sub(2);
        let mut data = Vec::with_capacity(data_len);
        for _ in 0..data_len {
            data.push(read_byte(transport, timeout)?);
        }

        let expected = checksum(&[dest, len, status]).wrapping_add(checksum(&data));
        let seen = read_byte(transport, timeout)?;
        let checksum_ok = expected == seen;
        if !checksum_ok {
            Metrics::record_checksum_fault();
            warn!(
                dest,
                len,
                status,
                expected,
                seen,
                "reply checksum mismatch"
            );
        }

        if dest != NODE_MASTER {
            Metrics::record_peer_frame();
            debug!(dest, "skipping frame not addressed to master");
            continue;
        }

        trace!(status, len = data.len(), "reply received");
        Metrics::record_frame_received();
        return Ok(PacketIn::new(status, data, checksum_ok));
    }
}

fn read_byte<T: Transport + ?Sized>(transport: &mut T, timeout: Duration) -> Result<u8> {
    transport.read_byte(timeout).map_err(|err| {
        let err = Error::from(err);
        if err.is_timeout() {
            Metrics::record_timeout();
        }
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Opcode, Status};
    use crate::transport::MemoryTransport;

    fn frame(destination: u8, commands: &[Command]) -> Vec<u8> {
        serialize(destination, commands).unwrap()
    }

    #[test]
    fn test_serialize_layout() {
        let wire = frame(0x01, &[Command::bare(Opcode::Ping)]);

        // dst, len, op, sum
        assert_eq!(wire, vec![SYNC, 0x01, 0x03, 0x60, 0x64]);
    }

    #[test]
    fn test_serialize_escapes_reserved_bytes() {
        let wire = frame(0x01, &[Command::new(Opcode::Reset, vec![SYNC, MARK])]);

        assert_eq!(wire[0], SYNC);
        assert!(!wire[1..].contains(&SYNC));
        assert_eq!(&wire[1..4], &[0x01, 0x05, 0xF0]);
        assert_eq!(&wire[4..8], &[MARK, 0xDF, MARK, 0xCF]);
    }

    #[test]
    fn test_serialize_rejects_oversized_body() {
        let payload = vec![0u8; MAX_BODY_LEN];
        let result = serialize(0x01, &[Command::new(Opcode::Control, payload)]);

        assert!(matches!(result, Err(Error::FrameTooLong { .. })));
    }

    #[test]
    fn test_read_frame_resyncs_on_sync() {
        let mut input = vec![0x12, 0x34, 0x56];
        input.extend(serialize_reply(Status::Ok.as_u8(), &[0x01, 0x13]).unwrap());
        let mut transport = MemoryTransport::new(input);

        let reply = read_frame(&mut transport, Duration::from_millis(1)).unwrap();
        assert!(reply.is_ok());
        assert_eq!(reply.data().as_ref(), &[0x01, 0x13]);
    }

    #[test]
    fn test_read_frame_skips_peer_frames() {
        let mut input = vec![SYNC, 0x05, 0x02, 0x01, 0x08];
        input.extend(serialize_reply(Status::Ok.as_u8(), &[0x01]).unwrap());
        let mut transport = MemoryTransport::new(input);

        let reply = read_frame(&mut transport, Duration::from_millis(1)).unwrap();
        assert_eq!(reply.data().as_ref(), &[0x01]);
        assert_eq!(transport.remaining(), 0);
    }

    #[test]
    fn test_read_frame_returns_corrupt_frame_flagged() {
        let mut input = serialize_reply(Status::Ok.as_u8(), &[0x01, 0x02]).unwrap();
        let last = input.len() - 1;
        input[last] ^= 0xFF;
        let mut transport = MemoryTransport::new(input);

        let reply = read_frame(&mut transport, Duration::from_millis(1)).unwrap();
        assert!(!reply.checksum_ok());
        assert!(reply.is_checksum_fault());
    }

    #[test]
    fn test_read_frame_times_out_mid_frame() {
        let mut transport = MemoryTransport::new(vec![SYNC, NODE_MASTER, 0x04, 0x01]);

        let result = read_frame(&mut transport, Duration::from_millis(1));
        assert!(matches!(result, Err(Error::Timeout)));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn commands_strategy() -> impl Strategy<Value = Vec<Command>> {
            prop::collection::vec(
                (any::<u8>(), prop::collection::vec(any::<u8>(), 0..24))
                    .prop_map(|(op, payload)| Command::raw(op, payload)),
                1..8,
            )
        }

        proptest! {
            /// Property: the unstuffed body carries destination, commands and a valid sum
            #[test]
            fn prop_roundtrip_preserves_commands(
                destination in any::<u8>(),
                commands in commands_strategy(),
            ) {
                let wire = frame(destination, &commands);
                let body = unescape(&wire);

                let mut expected = Vec::new();
                for cmd in &commands {
                    expected.push(cmd.opcode());
                    expected.extend_from_slice(cmd.payload());
                }

                prop_assert_eq!(body[0], destination);
                prop_assert_eq!(usize::from(body[1]), body.len() - 1);
                prop_assert_eq!(&body[2..body.len() - 1], expected.as_slice());
            }

            /// Property: the trailing byte is the sum of the body before it
            #[test]
            fn prop_checksum_covers_body(
                destination in any::<u8>(),
                commands in commands_strategy(),
                corrupt_ratio in 0.0f64..1.0,
                corrupt_value in 1u8..=255,
            ) {
                let body = unescape(&frame(destination, &commands));
                let (sum, rest) = body.split_last().unwrap();
                prop_assert_eq!(*sum, checksum(rest));

                let mut corrupted = rest.to_vec();
                let offset = ((corrupted.len() as f64) * corrupt_ratio) as usize;
                corrupted[offset] = corrupted[offset].wrapping_add(corrupt_value);
                prop_assert_ne!(*sum, checksum(&corrupted));
            }

            /// Property: SYNC never appears after the leading marker
            #[test]
            fn prop_sync_never_unescaped(
                destination in any::<u8>(),
                commands in commands_strategy(),
            ) {
                let wire = frame(destination, &commands);
                prop_assert_eq!(wire[0], SYNC);
                prop_assert!(!wire[1..].contains(&SYNC));

                let mut iter = wire[1..].iter();
                while let Some(&byte) = iter.next() {
                    if byte == MARK {
                        let next = iter.next();
                        prop_assert!(matches!(next, Some(&b) if b == SYNC - 1 || b == MARK - 1));
                    }
                }
            }

            /// Property: any reply a node encodes is read back unchanged
            #[test]
            fn prop_reply_roundtrip(
                status in any::<u8>(),
                data in prop::collection::vec(any::<u8>(), 0..64),
            ) {
                let mut transport = MemoryTransport::new(serialize_reply(status, &data).unwrap());
                let reply = read_frame(&mut transport, Duration::from_millis(1)).unwrap();

                prop_assert!(reply.checksum_ok());
                prop_assert_eq!(reply.status_byte(), status);
                prop_assert_eq!(reply.data().as_ref(), data.as_slice());
            }
        }
    }
}
