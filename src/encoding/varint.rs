use ::bytes::{Buf, BufMut};

use crate::error::DecodeErrorKind;
use crate::DecodeError;

/// Encodes an integer into LEB128 variable-length format and writes it to
/// the buffer. The buffer must have enough remaining space, at most 10
/// bytes.
#[inline]
pub fn encode_varint(mut value: u64, buf: &mut impl BufMut) {
    while value >= 0x80 {
        buf.put_u8(((value & 0x7f) | 0x80) as u8);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Returns the number of bytes `value` occupies in LEB128 form, between 1
/// and 10 inclusive.
#[inline]
pub fn encoded_len_varint(value: u64) -> usize {
    // ceil(bitlen / 7), with bitlen(0) treated as 1.
    (value | 1).ilog2() as usize / 7 + 1
}

/// Decodes a LEB128-encoded variable-length integer from the buffer,
/// advancing it past the consumed bytes.
///
/// Running out of input mid-varint is [`DecodeErrorKind::Truncated`]; a
/// varint continuing past ten bytes, or whose tenth byte pushes the value
/// over `u64::MAX`, is [`DecodeErrorKind::VarintOverflow`].
#[inline]
pub fn decode_varint(buf: &mut impl Buf) -> Result<u64, DecodeError> {
    let mut value = 0u64;
    for count in 0..10 {
        if !buf.has_remaining() {
            return Err(DecodeErrorKind::Truncated.into());
        }
        let byte = buf.get_u8();
        value |= u64::from(byte & 0x7f) << (count * 7);
        if byte < 0x80 {
            // The tenth byte contributes bit 63 only.
            if count == 9 && byte > 0x01 {
                return Err(DecodeErrorKind::VarintOverflow.into());
            }
            return Ok(value);
        }
    }
    Err(DecodeErrorKind::VarintOverflow.into())
}
