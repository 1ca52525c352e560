//! Wire-format primitives and per-kind encoding functions.
//!
//! Meant to be used only from `Message` implementations.

#![allow(clippy::implicit_hasher, clippy::ptr_arg)]

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use ::bytes::{Buf, BufMut};

use crate::error::DecodeErrorKind;
use crate::DecodeError;
use crate::Message;

pub mod varint;
pub use varint::{decode_varint, encode_varint, encoded_len_varint};

pub mod length_delimiter;
pub use length_delimiter::{
    decode_length_delimiter, encode_length_delimiter, length_delimiter_len,
};

pub mod wire_type;
pub use wire_type::WireType;

/// Additional information passed to every decode/merge function.
///
/// The context should be passed by value and can be freely cloned. When
/// passing to a function which is decoding a nested object, use
/// `enter_recursion`.
#[derive(Clone, Debug)]
pub struct DecodeContext {
    /// How many times we can recurse in the current decode stack before we
    /// hit the recursion limit. The limit is fixed at
    /// `crate::RECURSION_LIMIT`.
    recurse_count: u32,
    /// Cap on any single container's length prefix, `usize::MAX` when
    /// unlimited.
    alloc_limit: usize,
    /// Whether a tolerable wire-type mismatch is an error rather than an
    /// unknown-field skip.
    strict_wire_types: bool,
}

impl Default for DecodeContext {
    #[inline]
    fn default() -> DecodeContext {
        DecodeContext {
            recurse_count: crate::RECURSION_LIMIT,
            alloc_limit: usize::MAX,
            strict_wire_types: false,
        }
    }
}

impl DecodeContext {
    pub(crate) fn new(alloc_limit: Option<usize>, strict_wire_types: bool) -> DecodeContext {
        DecodeContext {
            recurse_count: crate::RECURSION_LIMIT,
            alloc_limit: alloc_limit.unwrap_or(usize::MAX),
            strict_wire_types,
        }
    }

    /// Call this function before recursively decoding.
    ///
    /// There is no `exit` function since this function creates a new
    /// `DecodeContext` to be used at the next level of recursion. Continue
    /// to use the old context at the previous level of recursion.
    #[inline]
    pub(crate) fn enter_recursion(&self) -> DecodeContext {
        DecodeContext {
            recurse_count: self.recurse_count - 1,
            ..self.clone()
        }
    }

    /// Checks whether the recursion limit has been reached in the stack of
    /// decodes described by this context.
    #[inline]
    pub(crate) fn limit_reached(&self) -> Result<(), DecodeError> {
        if self.recurse_count == 0 {
            Err(DecodeErrorKind::RecursionLimitReached.into())
        } else {
            Ok(())
        }
    }

    /// Checks a container's length prefix against the allocation limit.
    #[inline]
    pub(crate) fn check_alloc(&self, len: u64) -> Result<(), DecodeError> {
        if len > self.alloc_limit as u64 {
            Err(DecodeErrorKind::AllocationLimitExceeded {
                requested: len,
                limit: self.alloc_limit as u64,
            }
            .into())
        } else {
            Ok(())
        }
    }
}

pub const MIN_TAG: u32 = 1;
pub const MAX_TAG: u32 = (1 << 29) - 1;

/// Encodes a field key, which consists of a wire type designator and the
/// field tag.
#[inline]
pub fn encode_key(tag: u32, wire_type: WireType, buf: &mut impl BufMut) {
    debug_assert!((MIN_TAG..=MAX_TAG).contains(&tag));
    let key = (tag << 3) | wire_type as u32;
    encode_varint(u64::from(key), buf);
}

/// Decodes a field key, which consists of a wire type designator and the
/// field tag.
#[inline(always)]
pub fn decode_key(buf: &mut impl Buf) -> Result<(u32, WireType), DecodeError> {
    let key = decode_varint(buf)?;
    if key > u64::from(u32::MAX) {
        return Err(DecodeErrorKind::VarintOverflow.into());
    }
    let wire_type = WireType::try_from(key & 0x07)?;
    let tag = key as u32 >> 3;

    if tag < MIN_TAG {
        return Err(DecodeErrorKind::InvalidTag.into());
    }

    Ok((tag, wire_type))
}

/// Returns the width of an encoded field key with the given tag.
/// The returned width will be between 1 and 5 bytes (inclusive).
#[inline]
pub fn key_len(tag: u32) -> usize {
    encoded_len_varint(u64::from(tag << 3))
}

/// Skips over one value of the given wire type, leaving the field it was
/// destined for untouched.
pub fn skip_field(wire_type: WireType, buf: &mut impl Buf) -> Result<(), DecodeError> {
    let len = match wire_type {
        WireType::Varint => decode_varint(buf).map(|_| 0)?,
        WireType::ThirtyTwoBit => 4,
        WireType::SixtyFourBit => 8,
        WireType::LengthDelimited => decode_varint(buf)?,
    };

    if len > buf.remaining() as u64 {
        return Err(DecodeErrorKind::Truncated.into());
    }

    buf.advance(len as usize);
    Ok(())
}

/// Reconciles a field's expected wire type with the wire type found on the
/// wire. Returns `Ok(true)` when the value should be decoded into the field.
///
/// A clash between two numeric wire types for a known field number is always
/// an error. Any other mismatch consumes the value and leaves the field
/// untouched, the same treatment an unknown field gets, so payloads written
/// against a newer declaration still decode. `strict_wire_types` upgrades
/// every mismatch to an error.
pub fn reconcile_wire_type(
    expected: WireType,
    actual: WireType,
    buf: &mut impl Buf,
    ctx: &DecodeContext,
) -> Result<bool, DecodeError> {
    if expected == actual {
        return Ok(true);
    }
    if ctx.strict_wire_types || (expected.is_numeric() && actual.is_numeric()) {
        return Err(DecodeErrorKind::WireTypeMismatch { expected, actual }.into());
    }
    skip_field(actual, buf)?;
    Ok(false)
}

/// Helper function which abstracts reading a length delimiter prefix
/// followed by decoding values until the length of bytes is exhausted.
pub fn merge_loop<T, M, B>(
    value: &mut T,
    buf: &mut B,
    ctx: DecodeContext,
    mut merge: M,
) -> Result<(), DecodeError>
where
    M: FnMut(&mut T, &mut B, DecodeContext) -> Result<(), DecodeError>,
    B: Buf,
{
    let len = decode_varint(buf)?;
    let remaining = buf.remaining();
    if len > remaining as u64 {
        return Err(DecodeErrorKind::Truncated.into());
    }

    let limit = remaining - len as usize;
    while buf.remaining() > limit {
        merge(value, buf, ctx.clone())?;
    }

    if buf.remaining() != limit {
        return Err(DecodeErrorKind::DelimitedLengthExceeded.into());
    }
    Ok(())
}

/// Helper macro which emits an `encode_repeated` function for the type.
macro_rules! encode_repeated {
    ($ty:ty) => {
        pub fn encode_repeated(tag: u32, values: &[$ty], buf: &mut impl BufMut) {
            for value in values {
                encode(tag, value, buf);
            }
        }
    };
}

/// Helper macro which emits a `merge_repeated` function for the numeric
/// type. A length-delimited value is treated as the packed form; anything
/// else appends a single element.
macro_rules! merge_repeated_numeric {
    ($ty:ty,
     $wire_type:expr,
     $merge:ident,
     $merge_repeated:ident) => {
        pub fn $merge_repeated(
            wire_type: WireType,
            values: &mut Vec<$ty>,
            buf: &mut impl Buf,
            ctx: DecodeContext,
        ) -> Result<(), DecodeError> {
            if wire_type == WireType::LengthDelimited {
                // Packed.
                let len = decode_varint(buf)?;
                ctx.check_alloc(len)?;
                let remaining = buf.remaining();
                if len > remaining as u64 {
                    return Err(DecodeErrorKind::Truncated.into());
                }

                let limit = remaining - len as usize;
                while buf.remaining() > limit {
                    let mut value = Default::default();
                    $merge($wire_type, &mut value, buf, ctx.clone())?;
                    values.push(value);
                }

                if buf.remaining() != limit {
                    return Err(DecodeErrorKind::DelimitedLengthExceeded.into());
                }
                Ok(())
            } else {
                // Unpacked.
                if !reconcile_wire_type($wire_type, wire_type, buf, &ctx)? {
                    return Ok(());
                }
                let mut value = Default::default();
                $merge($wire_type, &mut value, buf, ctx)?;
                values.push(value);
                Ok(())
            }
        }
    };
}

/// Macro which emits a module containing a set of encoding functions for a
/// variable-width numeric type.
macro_rules! varint {
    ($ty:ty,
     $proto_ty:ident) => (
        varint!($ty,
                $proto_ty,
                to_uint64(value) { *value as u64 },
                from_uint64(value) { value as $ty });
    );

    ($ty:ty,
     $proto_ty:ident,
     to_uint64($to_uint64_value:ident) $to_uint64:expr,
     from_uint64($from_uint64_value:ident) $from_uint64:expr) => (

         pub mod $proto_ty {
            use crate::encoding::*;

            pub fn encode(tag: u32, $to_uint64_value: &$ty, buf: &mut impl BufMut) {
                encode_key(tag, WireType::Varint, buf);
                encode_varint($to_uint64, buf);
            }

            pub fn merge(wire_type: WireType, value: &mut $ty, buf: &mut impl Buf, ctx: DecodeContext) -> Result<(), DecodeError> {
                if !reconcile_wire_type(WireType::Varint, wire_type, buf, &ctx)? {
                    return Ok(());
                }
                let $from_uint64_value = decode_varint(buf)?;
                *value = $from_uint64;
                Ok(())
            }

            encode_repeated!($ty);

            pub fn encode_packed(tag: u32, values: &[$ty], buf: &mut impl BufMut) {
                if values.is_empty() { return; }

                encode_key(tag, WireType::LengthDelimited, buf);
                let len: usize = values.iter().map(|$to_uint64_value| {
                    encoded_len_varint($to_uint64)
                }).sum();
                encode_varint(len as u64, buf);

                // Elements carry no tags of their own; a zero in the middle
                // of the container is still written.
                for $to_uint64_value in values {
                    encode_varint($to_uint64, buf);
                }
            }

            merge_repeated_numeric!($ty, WireType::Varint, merge, merge_repeated);

            #[inline]
            pub fn encoded_len(tag: u32, $to_uint64_value: &$ty) -> usize {
                key_len(tag) + encoded_len_varint($to_uint64)
            }

            #[inline]
            pub fn encoded_len_repeated(tag: u32, values: &[$ty]) -> usize {
                key_len(tag) * values.len() + values.iter().map(|$to_uint64_value| {
                    encoded_len_varint($to_uint64)
                }).sum::<usize>()
            }

            #[inline]
            pub fn encoded_len_packed(tag: u32, values: &[$ty]) -> usize {
                if values.is_empty() {
                    0
                } else {
                    let len = values.iter()
                                    .map(|$to_uint64_value| encoded_len_varint($to_uint64))
                                    .sum::<usize>();
                    key_len(tag) + encoded_len_varint(len as u64) + len
                }
            }

         }

    );
}
varint!(bool, bool,
        to_uint64(value) u64::from(*value),
        from_uint64(value) value != 0);
varint!(i32, int32);
varint!(i64, int64);
varint!(u32, uint32);
varint!(u64, uint64);
varint!(i32, sint32,
to_uint64(value) {
    ((value << 1) ^ (value >> 31)) as u32 as u64
},
from_uint64(value) {
    let value = value as u32;
    ((value >> 1) as i32) ^ (-((value & 1) as i32))
});
varint!(i64, sint64,
to_uint64(value) {
    ((value << 1) ^ (value >> 63)) as u64
},
from_uint64(value) {
    ((value >> 1) as i64) ^ (-((value & 1) as i64))
});

/// Macro which emits a module containing a set of encoding functions for a
/// fixed-width numeric type.
macro_rules! fixed_width {
    ($ty:ty,
     $width:expr,
     $wire_type:expr,
     $proto_ty:ident,
     $put:ident,
     $get:ident) => {
        pub mod $proto_ty {
            use crate::encoding::*;

            pub fn encode(tag: u32, value: &$ty, buf: &mut impl BufMut) {
                encode_key(tag, $wire_type, buf);
                buf.$put(*value);
            }

            pub fn merge(
                wire_type: WireType,
                value: &mut $ty,
                buf: &mut impl Buf,
                ctx: DecodeContext,
            ) -> Result<(), DecodeError> {
                if !reconcile_wire_type($wire_type, wire_type, buf, &ctx)? {
                    return Ok(());
                }
                if buf.remaining() < $width {
                    return Err(DecodeErrorKind::Truncated.into());
                }
                *value = buf.$get();
                Ok(())
            }

            encode_repeated!($ty);

            pub fn encode_packed(tag: u32, values: &[$ty], buf: &mut impl BufMut) {
                if values.is_empty() {
                    return;
                }

                encode_key(tag, WireType::LengthDelimited, buf);
                let len = values.len() as u64 * $width;
                encode_varint(len, buf);

                for value in values {
                    buf.$put(*value);
                }
            }

            merge_repeated_numeric!($ty, $wire_type, merge, merge_repeated);

            #[inline]
            pub fn encoded_len(tag: u32, _: &$ty) -> usize {
                key_len(tag) + $width
            }

            #[inline]
            pub fn encoded_len_repeated(tag: u32, values: &[$ty]) -> usize {
                (key_len(tag) + $width) * values.len()
            }

            #[inline]
            pub fn encoded_len_packed(tag: u32, values: &[$ty]) -> usize {
                if values.is_empty() {
                    0
                } else {
                    let len = $width * values.len();
                    key_len(tag) + encoded_len_varint(len as u64) + len
                }
            }

        }
    };
}
fixed_width!(
    f32,
    4,
    WireType::ThirtyTwoBit,
    float,
    put_f32_le,
    get_f32_le
);
fixed_width!(
    f64,
    8,
    WireType::SixtyFourBit,
    double,
    put_f64_le,
    get_f64_le
);
fixed_width!(
    u32,
    4,
    WireType::ThirtyTwoBit,
    fixed32,
    put_u32_le,
    get_u32_le
);
fixed_width!(
    u64,
    8,
    WireType::SixtyFourBit,
    fixed64,
    put_u64_le,
    get_u64_le
);
fixed_width!(
    i32,
    4,
    WireType::ThirtyTwoBit,
    sfixed32,
    put_i32_le,
    get_i32_le
);
fixed_width!(
    i64,
    8,
    WireType::SixtyFourBit,
    sfixed64,
    put_i64_le,
    get_i64_le
);

/// Macro which emits encoding functions for a length-delimited type.
macro_rules! length_delimited {
    ($ty:ty) => {
        encode_repeated!($ty);

        pub fn merge_repeated(
            wire_type: WireType,
            values: &mut Vec<$ty>,
            buf: &mut impl Buf,
            ctx: DecodeContext,
        ) -> Result<(), DecodeError> {
            if !reconcile_wire_type(WireType::LengthDelimited, wire_type, buf, &ctx)? {
                return Ok(());
            }
            let mut value = Default::default();
            merge(wire_type, &mut value, buf, ctx)?;
            values.push(value);
            Ok(())
        }

        #[inline]
        pub fn encoded_len(tag: u32, value: &$ty) -> usize {
            key_len(tag) + encoded_len_varint(value.len() as u64) + value.len()
        }

        #[inline]
        pub fn encoded_len_repeated(tag: u32, values: &[$ty]) -> usize {
            key_len(tag) * values.len()
                + values
                    .iter()
                    .map(|value| encoded_len_varint(value.len() as u64) + value.len())
                    .sum::<usize>()
        }
    };
}

pub mod string {
    use super::*;

    pub fn encode(tag: u32, value: &String, buf: &mut impl BufMut) {
        encode_key(tag, WireType::LengthDelimited, buf);
        encode_varint(value.len() as u64, buf);
        buf.put_slice(value.as_bytes());
    }

    pub fn merge(
        wire_type: WireType,
        value: &mut String,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        if !reconcile_wire_type(WireType::LengthDelimited, wire_type, buf, &ctx)? {
            return Ok(());
        }
        let len = decode_varint(buf)?;
        ctx.check_alloc(len)?;
        if len > buf.remaining() as u64 {
            return Err(DecodeErrorKind::Truncated.into());
        }

        let mut bytes = Vec::with_capacity(len as usize);
        bytes.put(buf.take(len as usize));
        match String::from_utf8(bytes) {
            // Parsers take the last value when a singular field repeats.
            Ok(decoded) => {
                *value = decoded;
                Ok(())
            }
            Err(_) => Err(DecodeErrorKind::InvalidUtf8.into()),
        }
    }

    length_delimited!(String);

    #[cfg(test)]
    mod test {
        use proptest::prelude::*;

        use super::super::test::{check_collection_type, check_type};
        use super::*;

        proptest! {
            #[test]
            fn check(value: String, tag in MIN_TAG..=MAX_TAG) {
                check_type(value, tag, WireType::LengthDelimited,
                           encode, merge, encoded_len)?;
            }
            #[test]
            fn check_repeated(value: Vec<String>, tag in MIN_TAG..=MAX_TAG) {
                check_collection_type(value, tag, WireType::LengthDelimited,
                                      encode_repeated, merge_repeated,
                                      encoded_len_repeated)?;
            }
        }
    }
}

pub mod bytes {
    use super::*;

    pub fn encode(tag: u32, value: &Vec<u8>, buf: &mut impl BufMut) {
        encode_key(tag, WireType::LengthDelimited, buf);
        encode_varint(value.len() as u64, buf);
        buf.put_slice(value);
    }

    pub fn merge(
        wire_type: WireType,
        value: &mut Vec<u8>,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        if !reconcile_wire_type(WireType::LengthDelimited, wire_type, buf, &ctx)? {
            return Ok(());
        }
        let len = decode_varint(buf)?;
        ctx.check_alloc(len)?;
        if len > buf.remaining() as u64 {
            return Err(DecodeErrorKind::Truncated.into());
        }

        // Parsers take the last value when a singular field repeats.
        value.clear();
        value.reserve(len as usize);
        value.put(buf.take(len as usize));
        Ok(())
    }

    length_delimited!(Vec<u8>);

    #[cfg(test)]
    mod test {
        use proptest::prelude::*;

        use super::super::test::{check_collection_type, check_type};
        use super::*;

        proptest! {
            #[test]
            fn check(value: Vec<u8>, tag in MIN_TAG..=MAX_TAG) {
                check_type(value, tag, WireType::LengthDelimited,
                           encode, merge, encoded_len)?;
            }
            #[test]
            fn check_repeated(value: Vec<Vec<u8>>, tag in MIN_TAG..=MAX_TAG) {
                check_collection_type(value, tag, WireType::LengthDelimited,
                                      encode_repeated, merge_repeated,
                                      encoded_len_repeated)?;
            }
        }
    }
}

pub mod message {
    use super::*;

    pub fn encode<M>(tag: u32, msg: &M, buf: &mut impl BufMut)
    where
        M: Message,
    {
        encode_key(tag, WireType::LengthDelimited, buf);
        encode_varint(msg.encoded_len() as u64, buf);
        msg.encode_raw(buf);
    }

    pub fn merge<M, B>(
        wire_type: WireType,
        msg: &mut M,
        buf: &mut B,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError>
    where
        M: Message,
        B: Buf,
    {
        if !reconcile_wire_type(WireType::LengthDelimited, wire_type, buf, &ctx)? {
            return Ok(());
        }
        ctx.limit_reached()?;
        // A nested message is replaced, not merged: the body parses into a
        // freshly cleared value, so a repeated singular field ends up
        // holding the last occurrence wholesale.
        msg.clear();
        merge_loop(
            msg,
            buf,
            ctx.enter_recursion(),
            |msg: &mut M, buf: &mut B, ctx| {
                let (tag, wire_type) = decode_key(buf)?;
                msg.merge_field(tag, wire_type, buf, ctx)
            },
        )
    }

    pub fn encode_repeated<M>(tag: u32, messages: &[M], buf: &mut impl BufMut)
    where
        M: Message,
    {
        for msg in messages {
            encode(tag, msg, buf);
        }
    }

    pub fn merge_repeated<M>(
        wire_type: WireType,
        messages: &mut Vec<M>,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError>
    where
        M: Message + Default,
    {
        if !reconcile_wire_type(WireType::LengthDelimited, wire_type, buf, &ctx)? {
            return Ok(());
        }
        let mut msg = M::default();
        merge(WireType::LengthDelimited, &mut msg, buf, ctx)?;
        messages.push(msg);
        Ok(())
    }

    #[inline]
    pub fn encoded_len<M>(tag: u32, msg: &M) -> usize
    where
        M: Message,
    {
        let len = msg.encoded_len();
        key_len(tag) + encoded_len_varint(len as u64) + len
    }

    #[inline]
    pub fn encoded_len_repeated<M>(tag: u32, messages: &[M]) -> usize
    where
        M: Message,
    {
        key_len(tag) * messages.len()
            + messages
                .iter()
                .map(Message::encoded_len)
                .map(|len| len + encoded_len_varint(len as u64))
                .sum::<usize>()
    }
}

/// Rust doesn't have a `Map` trait, so macros are currently the best way to
/// be generic over `HashMap` and `BTreeMap`.
macro_rules! map {
    ($map_ty:ident) => {
        use crate::encoding::*;
        use core::hash::Hash;

        /// Generic map encode function. Each entry is written as a nested
        /// message `{1: key, 2: value}` with default-valued halves omitted.
        pub fn encode<K, V, B, KE, KL, VE, VL>(
            key_encode: KE,
            key_encoded_len: KL,
            val_encode: VE,
            val_encoded_len: VL,
            tag: u32,
            values: &$map_ty<K, V>,
            buf: &mut B,
        ) where
            K: Default + Eq + Hash + Ord,
            V: Default + PartialEq,
            B: BufMut,
            KE: Fn(u32, &K, &mut B),
            KL: Fn(u32, &K) -> usize,
            VE: Fn(u32, &V, &mut B),
            VL: Fn(u32, &V) -> usize,
        {
            for (key, val) in values.iter() {
                let skip_key = key == &K::default();
                let skip_val = val == &V::default();

                let len = (if skip_key { 0 } else { key_encoded_len(1, key) })
                    + (if skip_val { 0 } else { val_encoded_len(2, val) });

                encode_key(tag, WireType::LengthDelimited, buf);
                encode_varint(len as u64, buf);
                if !skip_key {
                    key_encode(1, key, buf);
                }
                if !skip_val {
                    val_encode(2, val, buf);
                }
            }
        }

        /// Generic map merge function. The last entry wins on duplicate
        /// keys.
        pub fn merge<K, V, B, KM, VM>(
            key_merge: KM,
            val_merge: VM,
            wire_type: WireType,
            values: &mut $map_ty<K, V>,
            buf: &mut B,
            ctx: DecodeContext,
        ) -> Result<(), DecodeError>
        where
            K: Default + Eq + Hash + Ord,
            V: Default,
            B: Buf,
            KM: Fn(WireType, &mut K, &mut B, DecodeContext) -> Result<(), DecodeError>,
            VM: Fn(WireType, &mut V, &mut B, DecodeContext) -> Result<(), DecodeError>,
        {
            if !reconcile_wire_type(WireType::LengthDelimited, wire_type, buf, &ctx)? {
                return Ok(());
            }
            let mut key = K::default();
            let mut val = V::default();
            ctx.limit_reached()?;
            merge_loop(
                &mut (&mut key, &mut val),
                buf,
                ctx.enter_recursion(),
                |&mut (ref mut key, ref mut val), buf, ctx| {
                    let (tag, wire_type) = decode_key(buf)?;
                    match tag {
                        1 => key_merge(wire_type, key, buf, ctx),
                        2 => val_merge(wire_type, val, buf, ctx),
                        _ => skip_field(wire_type, buf),
                    }
                },
            )?;
            values.insert(key, val);

            Ok(())
        }

        /// Generic map encoded-length function.
        pub fn encoded_len<K, V, KL, VL>(
            key_encoded_len: KL,
            val_encoded_len: VL,
            tag: u32,
            values: &$map_ty<K, V>,
        ) -> usize
        where
            K: Default + Eq + Hash + Ord,
            V: Default + PartialEq,
            KL: Fn(u32, &K) -> usize,
            VL: Fn(u32, &V) -> usize,
        {
            key_len(tag) * values.len()
                + values
                    .iter()
                    .map(|(key, val)| {
                        let len = (if key == &K::default() {
                            0
                        } else {
                            key_encoded_len(1, key)
                        }) + (if val == &V::default() {
                            0
                        } else {
                            val_encoded_len(2, val)
                        });
                        encoded_len_varint(len as u64) + len
                    })
                    .sum::<usize>()
        }
    };
}

#[cfg(feature = "std")]
pub mod hash_map {
    use std::collections::HashMap;
    map!(HashMap);
}

pub mod btree_map {
    map!(BTreeMap);
}

#[cfg(test)]
mod test {
    use alloc::format;
    use alloc::string::ToString;
    use core::borrow::Borrow;
    use core::fmt::Debug;

    use ::bytes::{Bytes, BytesMut};
    use proptest::{prelude::*, test_runner::TestCaseResult};

    use super::*;

    pub fn check_type<T, B>(
        value: T,
        tag: u32,
        wire_type: WireType,
        encode: fn(u32, &B, &mut BytesMut),
        merge: fn(WireType, &mut T, &mut Bytes, DecodeContext) -> Result<(), DecodeError>,
        encoded_len: fn(u32, &B) -> usize,
    ) -> TestCaseResult
    where
        T: Debug + Default + PartialEq + Borrow<B>,
        B: ?Sized,
    {
        prop_assume!((MIN_TAG..=MAX_TAG).contains(&tag));

        let expected_len = encoded_len(tag, value.borrow());

        let mut buf = BytesMut::with_capacity(expected_len);
        encode(tag, value.borrow(), &mut buf);

        let mut buf = buf.freeze();

        prop_assert_eq!(
            buf.remaining(),
            expected_len,
            "encoded_len wrong; expected: {}, actual: {}",
            expected_len,
            buf.remaining()
        );

        if !buf.has_remaining() {
            // Short circuit for empty packed values.
            return Ok(());
        }

        let (decoded_tag, decoded_wire_type) =
            decode_key(&mut buf).map_err(|error| TestCaseError::fail(error.to_string()))?;
        prop_assert_eq!(
            tag,
            decoded_tag,
            "decoded tag does not match; expected: {}, actual: {}",
            tag,
            decoded_tag
        );

        prop_assert_eq!(
            wire_type,
            decoded_wire_type,
            "decoded wire type does not match; expected: {:?}, actual: {:?}",
            wire_type,
            decoded_wire_type,
        );

        match wire_type {
            WireType::SixtyFourBit if buf.remaining() != 8 => Err(TestCaseError::fail(format!(
                "64bit wire type illegal remaining: {}, tag: {}",
                buf.remaining(),
                tag
            ))),
            WireType::ThirtyTwoBit if buf.remaining() != 4 => Err(TestCaseError::fail(format!(
                "32bit wire type illegal remaining: {}, tag: {}",
                buf.remaining(),
                tag
            ))),
            _ => Ok(()),
        }?;

        let mut roundtrip_value = T::default();
        merge(
            wire_type,
            &mut roundtrip_value,
            &mut buf,
            DecodeContext::default(),
        )
        .map_err(|error| TestCaseError::fail(error.to_string()))?;

        prop_assert!(
            !buf.has_remaining(),
            "expected buffer to be empty, remaining: {}",
            buf.remaining()
        );

        prop_assert_eq!(value, roundtrip_value);

        Ok(())
    }

    pub fn check_collection_type<T, B, E, M, L>(
        value: T,
        tag: u32,
        wire_type: WireType,
        encode: E,
        mut merge: M,
        encoded_len: L,
    ) -> TestCaseResult
    where
        T: Debug + Default + PartialEq + Borrow<B>,
        B: ?Sized,
        E: FnOnce(u32, &B, &mut BytesMut),
        M: FnMut(WireType, &mut T, &mut Bytes, DecodeContext) -> Result<(), DecodeError>,
        L: FnOnce(u32, &B) -> usize,
    {
        prop_assume!((MIN_TAG..=MAX_TAG).contains(&tag));

        let expected_len = encoded_len(tag, value.borrow());

        let mut buf = BytesMut::with_capacity(expected_len);
        encode(tag, value.borrow(), &mut buf);

        let mut buf = buf.freeze();

        prop_assert_eq!(
            buf.remaining(),
            expected_len,
            "encoded_len wrong; expected: {}, actual: {}",
            expected_len,
            buf.remaining()
        );

        let mut roundtrip_value = T::default();
        while buf.has_remaining() {
            let (decoded_tag, decoded_wire_type) =
                decode_key(&mut buf).map_err(|error| TestCaseError::fail(error.to_string()))?;

            prop_assert_eq!(
                tag,
                decoded_tag,
                "decoded tag does not match; expected: {}, actual: {}",
                tag,
                decoded_tag
            );

            prop_assert_eq!(
                wire_type,
                decoded_wire_type,
                "decoded wire type does not match; expected: {:?}, actual: {:?}",
                wire_type,
                decoded_wire_type
            );

            merge(
                wire_type,
                &mut roundtrip_value,
                &mut buf,
                DecodeContext::default(),
            )
            .map_err(|error| TestCaseError::fail(error.to_string()))?;
        }

        prop_assert_eq!(value, roundtrip_value);

        Ok(())
    }

    #[test]
    fn string_merge_invalid_utf8() {
        let mut s = String::new();
        let mut buf: &[u8] = b"\x02\x80\x80";

        let r = string::merge(
            WireType::LengthDelimited,
            &mut s,
            &mut buf,
            DecodeContext::default(),
        );
        r.expect_err("must be an error");
        assert!(s.is_empty());
    }

    #[test]
    fn varint_scalar_skips_length_delimited_value() {
        // Tolerated mismatch: the value is consumed, the field untouched.
        let mut value = 42i32;
        let mut buf: &[u8] = b"\x03abc";
        int32::merge(
            WireType::LengthDelimited,
            &mut value,
            &mut buf,
            DecodeContext::default(),
        )
        .expect("tolerated mismatch must not fail");
        assert_eq!(value, 42);
        assert!(!buf.has_remaining());
    }

    #[test]
    fn numeric_wire_type_clash_is_an_error() {
        let mut value = 0i32;
        let mut buf: &[u8] = &[0, 0, 0, 0];
        let error = int32::merge(
            WireType::ThirtyTwoBit,
            &mut value,
            &mut buf,
            DecodeContext::default(),
        )
        .unwrap_err();
        assert_eq!(
            error.kind(),
            DecodeErrorKind::WireTypeMismatch {
                expected: WireType::Varint,
                actual: WireType::ThirtyTwoBit,
            }
        );
    }

    #[test]
    fn skip_field_consumes_exactly_one_value() {
        let mut buf: &[u8] = b"\x96\x01rest";
        skip_field(WireType::Varint, &mut buf).expect("skip failed");
        assert_eq!(buf, &b"rest"[..]);

        let mut buf: &[u8] = b"\x03abcrest";
        skip_field(WireType::LengthDelimited, &mut buf).expect("skip failed");
        assert_eq!(buf, &b"rest"[..]);

        let mut buf: &[u8] = &[0; 4];
        skip_field(WireType::ThirtyTwoBit, &mut buf).expect("skip failed");
        assert!(!buf.has_remaining());

        let mut buf: &[u8] = &[0; 7];
        let error = skip_field(WireType::SixtyFourBit, &mut buf).unwrap_err();
        assert_eq!(error.kind(), DecodeErrorKind::Truncated);
    }

    #[test]
    fn packed_respects_allocation_limit() {
        let mut values = Vec::<u64>::new();
        // Packed body of 16 varint bytes.
        let mut data = alloc::vec![16u8];
        data.extend_from_slice(&[1; 16]);
        let mut buf: &[u8] = &data;
        let error = uint64::merge_repeated(
            WireType::LengthDelimited,
            &mut values,
            &mut buf,
            DecodeContext::new(Some(8), false),
        )
        .unwrap_err();
        assert_eq!(
            error.kind(),
            DecodeErrorKind::AllocationLimitExceeded {
                requested: 16,
                limit: 8,
            }
        );
    }

    #[cfg(feature = "std")]
    mod map {
        use std::collections::{BTreeMap, HashMap};

        use proptest::prelude::*;

        use super::super::test::check_collection_type;
        use super::super::*;

        macro_rules! map_round_trip {
            ($test_name:ident, $map_ty:ident, $module:ident,
             $key_ty:ty, $key_proto:ident, $val_ty:ty, $val_proto:ident) => {
                proptest! {
                    #[test]
                    fn $test_name(values: $map_ty<$key_ty, $val_ty>, tag in MIN_TAG..=MAX_TAG) {
                        check_collection_type(
                            values,
                            tag,
                            WireType::LengthDelimited,
                            |tag, values, buf| {
                                $module::encode(
                                    $key_proto::encode,
                                    $key_proto::encoded_len,
                                    $val_proto::encode,
                                    $val_proto::encoded_len,
                                    tag,
                                    values,
                                    buf,
                                )
                            },
                            |wire_type, values, buf, ctx| {
                                $module::merge(
                                    $key_proto::merge,
                                    $val_proto::merge,
                                    wire_type,
                                    values,
                                    buf,
                                    ctx,
                                )
                            },
                            |tag, values| {
                                $module::encoded_len(
                                    $key_proto::encoded_len,
                                    $val_proto::encoded_len,
                                    tag,
                                    values,
                                )
                            },
                        )?;
                    }
                }
            };
        }

        map_round_trip!(hash_string_int32, HashMap, hash_map, String, string, i32, int32);
        map_round_trip!(hash_int64_string, HashMap, hash_map, i64, int64, String, string);
        map_round_trip!(hash_sint32_double, HashMap, hash_map, i32, sint32, f64, double);
        map_round_trip!(btree_string_uint64, BTreeMap, btree_map, String, string, u64, uint64);
        map_round_trip!(btree_fixed32_bool, BTreeMap, btree_map, u32, fixed32, bool, bool);
    }
}
