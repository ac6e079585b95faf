//! Variable-length quantities
//!
//! Seven bits per byte, most significant group first. The top bit of every
//! byte but the last is set. At most four bytes, so values fit in 28 bits.

use super::{Result, ScoreError};

/// Longest encoding accepted
pub const MAX_LEN: usize = 4;

/// Largest encodable value
pub const MAX_VALUE: u32 = 0x0FFF_FFFF;

/// Decode the quantity at `offset`, returning the value and its encoded length.
///
/// # Errors
///
/// [`ScoreError::VlqTooLong`] if the fourth byte still has its top bit set,
/// [`ScoreError::UnexpectedEof`] if the input ends first.
pub fn read(source: &[u8], offset: usize) -> Result<(u32, usize)> {
    let mut value = 0u32;
    for len in 1..=MAX_LEN {
        let at = offset + len - 1;
        let byte = *source.get(at).ok_or(ScoreError::UnexpectedEof { offset: at })?;
        value = (value << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((value, len));
        }
    }
    Err(ScoreError::VlqTooLong { offset })
}

/// Append the encoding of `value` to `out`.
///
/// Values above [`MAX_VALUE`] are truncated to 28 bits.
pub fn write(value: u32, out: &mut Vec<u8>) {
    let value = value & MAX_VALUE;
    let mut groups = [0u8; MAX_LEN];
    let mut len = 0;
    let mut rest = value;
    loop {
        groups[len] = (rest & 0x7F) as u8;
        len += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let more = if i == 0 { 0 } else { 0x80 };
        out.push(groups[i] | more);
    }
}
