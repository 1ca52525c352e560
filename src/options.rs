//! Caller-facing configuration for top-level encode and decode calls.

use alloc::vec::Vec;

use ::bytes::{Buf, BufMut};

use crate::encoding::varint::{decode_varint, encode_varint, encoded_len_varint};
use crate::encoding::{decode_key, DecodeContext};
use crate::error::DecodeErrorKind;
use crate::{DecodeError, EncodeError, Message};

/// Framing of a top-level message.
///
/// Sub-messages always carry a varint length prefix; whether the outermost
/// message does is the caller's choice. The encoder and decoder must agree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SizePrefix {
    /// The message body occupies the whole buffer.
    #[default]
    None,
    /// The body is preceded by its length as a varint.
    Varint,
    /// The body is preceded by its length as a little-endian `u32`.
    Fixed32,
}

/// Options for encoding a top-level message.
///
/// ```
/// use wirebuf::{EncodeOptions, SizePrefix};
///
/// let options = EncodeOptions::new().size_prefix(SizePrefix::Varint);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct EncodeOptions {
    size_prefix: SizePrefix,
}

impl EncodeOptions {
    pub fn new() -> EncodeOptions {
        EncodeOptions::default()
    }

    /// Sets the framing of the encoded message.
    pub fn size_prefix(mut self, size_prefix: SizePrefix) -> EncodeOptions {
        self.size_prefix = size_prefix;
        self
    }

    /// Encodes `message` to the buffer, returning the number of bytes
    /// written.
    ///
    /// Whether the buffer can grow is the `BufMut` implementation's policy:
    /// `Vec<u8>` enlarges on demand, while `&mut [u8]` is fixed and yields
    /// an error when its capacity is insufficient.
    pub fn encode<M>(&self, message: &M, buf: &mut impl BufMut) -> Result<usize, EncodeError>
    where
        M: Message,
    {
        let len = message.encoded_len();
        let required = len + self.prefix_len(len);
        let remaining = buf.remaining_mut();
        if required > remaining {
            return Err(EncodeError::new(required, remaining));
        }

        match self.size_prefix {
            SizePrefix::None => {}
            SizePrefix::Varint => encode_varint(len as u64, buf),
            SizePrefix::Fixed32 => buf.put_u32_le(len as u32),
        }
        message.encode_raw(buf);
        Ok(required)
    }

    /// Encodes `message` to a newly allocated buffer.
    pub fn encode_to_vec<M>(&self, message: &M) -> Vec<u8>
    where
        M: Message,
    {
        let len = message.encoded_len();
        let mut buf = Vec::with_capacity(len + self.prefix_len(len));
        match self.size_prefix {
            SizePrefix::None => {}
            SizePrefix::Varint => encode_varint(len as u64, &mut buf),
            SizePrefix::Fixed32 => buf.put_u32_le(len as u32),
        }
        message.encode_raw(&mut buf);
        buf
    }

    fn prefix_len(&self, body_len: usize) -> usize {
        match self.size_prefix {
            SizePrefix::None => 0,
            SizePrefix::Varint => encoded_len_varint(body_len as u64),
            SizePrefix::Fixed32 => 4,
        }
    }
}

/// Options for decoding a top-level message.
///
/// ```
/// use wirebuf::{DecodeOptions, SizePrefix};
///
/// let options = DecodeOptions::new()
///     .size_prefix(SizePrefix::Varint)
///     .alloc_limit(1 << 20);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct DecodeOptions {
    size_prefix: SizePrefix,
    alloc_limit: Option<usize>,
    strict_wire_types: bool,
}

impl DecodeOptions {
    pub fn new() -> DecodeOptions {
        DecodeOptions::default()
    }

    /// Sets the framing the decoder expects. Must match the encoder's.
    pub fn size_prefix(mut self, size_prefix: SizePrefix) -> DecodeOptions {
        self.size_prefix = size_prefix;
        self
    }

    /// Caps the length prefix of any single string, bytes or packed field,
    /// so a hostile payload cannot force an unbounded allocation.
    pub fn alloc_limit(mut self, limit: usize) -> DecodeOptions {
        self.alloc_limit = Some(limit);
        self
    }

    /// Treats every wire-type mismatch on a known field as an error.
    ///
    /// By default only clashes between two numeric wire types fail; other
    /// mismatches are skipped like unknown fields.
    pub fn strict_wire_types(mut self, strict: bool) -> DecodeOptions {
        self.strict_wire_types = strict;
        self
    }

    /// Decodes an instance of the message from the buffer.
    pub fn decode<M>(&self, buf: impl Buf) -> Result<M, DecodeError>
    where
        M: Message + Default,
    {
        let mut message = M::default();
        self.decode_into(buf, &mut message)?;
        Ok(message)
    }

    /// Decodes into an existing message, resetting every field to its
    /// default first.
    pub fn decode_into<M>(&self, mut buf: impl Buf, message: &mut M) -> Result<(), DecodeError>
    where
        M: Message,
    {
        message.clear();
        let ctx = DecodeContext::new(self.alloc_limit, self.strict_wire_types);
        let len = match self.size_prefix {
            SizePrefix::None => return merge_fields(message, &mut buf, ctx),
            SizePrefix::Varint => decode_varint(&mut buf)?,
            SizePrefix::Fixed32 => {
                if buf.remaining() < 4 {
                    return Err(DecodeErrorKind::Truncated.into());
                }
                u64::from(buf.get_u32_le())
            }
        };
        if len > buf.remaining() as u64 {
            return Err(DecodeErrorKind::Truncated.into());
        }
        merge_fields(message, &mut buf.take(len as usize), ctx)
    }
}

fn merge_fields<M, B>(message: &mut M, buf: &mut B, ctx: DecodeContext) -> Result<(), DecodeError>
where
    M: Message,
    B: Buf,
{
    while buf.has_remaining() {
        let (tag, wire_type) = decode_key(buf)?;
        message.merge_field(tag, wire_type, buf, ctx.clone())?;
    }
    Ok(())
}
