//! Length-delimiter framing helpers, for callers that stream messages over
//! a transport and need to read a message's length before its body.

use ::bytes::{Buf, BufMut};

use crate::encoding::varint::{decode_varint, encode_varint, encoded_len_varint};
use crate::error::DecodeErrorKind;
use crate::{DecodeError, EncodeError};

/// Encodes a length delimiter to the buffer.
///
/// An error will be returned if the buffer does not have sufficient capacity.
pub fn encode_length_delimiter(length: usize, buf: &mut impl BufMut) -> Result<(), EncodeError> {
    let length = length as u64;
    let required = encoded_len_varint(length);
    let remaining = buf.remaining_mut();
    if required > remaining {
        return Err(EncodeError::new(required, remaining));
    }
    encode_varint(length, buf);
    Ok(())
}

/// Returns the encoded length of a length delimiter.
///
/// Applications may use this method to ensure sufficient capacity before
/// calling `encode_length_delimiter`. The returned size will be between 1
/// and 10, inclusive.
pub fn length_delimiter_len(length: usize) -> usize {
    encoded_len_varint(length as u64)
}

/// Decodes a length delimiter from the buffer.
///
/// This method allows the delimiter to be read without reading the message
/// body. The delimiter is not checked against the buffer's remaining length.
pub fn decode_length_delimiter(mut buf: impl Buf) -> Result<usize, DecodeError> {
    let length = decode_varint(&mut buf)?;
    if length > usize::MAX as u64 {
        return Err(DecodeErrorKind::VarintOverflow.into());
    }
    Ok(length as usize)
}
