//! Wire-format encoding and decoding errors.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::error::Error;
use core::fmt;

use crate::encoding::wire_type::WireType;

/// A message decoding error.
///
/// `DecodeError` indicates that the input buffer does not contain a valid
/// message. The error carries the root cause as a [`DecodeErrorKind`] plus
/// the path of message fields that were being decoded when the failure
/// occurred.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodeError {
    inner: Box<Inner>,
}

#[derive(Clone, PartialEq, Eq)]
struct Inner {
    kind: DecodeErrorKind,
    /// Field path, innermost first, pushed while unwinding.
    stack: Vec<(&'static str, &'static str)>,
}

impl DecodeError {
    /// Returns the root cause of the error.
    pub fn kind(&self) -> DecodeErrorKind {
        self.inner.kind
    }

    /// Pushes a (message, field) name pair onto the error's location path.
    ///
    /// Meant to be used only by `Message` implementations.
    #[doc(hidden)]
    pub fn push(&mut self, message: &'static str, field: &'static str) {
        self.inner.stack.push((message, field));
    }
}

impl From<DecodeErrorKind> for DecodeError {
    #[cold]
    fn from(kind: DecodeErrorKind) -> DecodeError {
        DecodeError {
            inner: Box::new(Inner {
                kind,
                stack: Vec::new(),
            }),
        }
    }
}

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeError")
            .field("kind", &self.inner.kind)
            .field("stack", &self.inner.stack)
            .finish()
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode message: ")?;
        for &(message, field) in self.inner.stack.iter().rev() {
            write!(f, "{message}.{field}: ")?;
        }
        fmt::Display::fmt(&self.inner.kind, f)
    }
}

impl Error for DecodeError {}

#[cfg(feature = "std")]
impl From<DecodeError> for std::io::Error {
    fn from(error: DecodeError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidData, error)
    }
}

/// The root cause of a [`DecodeError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// The input ended inside a varint, a fixed-width value, or a
    /// length-delimited body.
    Truncated,
    /// A varint ran past ten bytes or past the range of its target type.
    VarintOverflow,
    /// A tag carried a wire type with no meaning in this encoding. The
    /// deprecated group wire types 3 and 4 land here.
    InvalidWireType {
        /// The offending 3-bit value.
        value: u64,
    },
    /// A tag carried field number zero.
    InvalidTag,
    /// A known field number arrived with a numeric wire type other than the
    /// declared one.
    WireTypeMismatch {
        /// The wire type the field declaration calls for.
        expected: WireType,
        /// The wire type found on the wire.
        actual: WireType,
    },
    /// A length prefix exceeded the configured allocation limit.
    AllocationLimitExceeded {
        /// The length the prefix asked for.
        requested: u64,
        /// The configured cap.
        limit: u64,
    },
    /// Messages were nested deeper than the recursion limit allows.
    RecursionLimitReached,
    /// A string field held bytes that are not valid UTF-8.
    InvalidUtf8,
    /// A length-delimited body ended in the middle of a value.
    DelimitedLengthExceeded,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DecodeErrorKind::Truncated => f.write_str("unexpected end of input"),
            DecodeErrorKind::VarintOverflow => f.write_str("varint overflow"),
            DecodeErrorKind::InvalidWireType { value } => {
                write!(f, "invalid wire type value: {value}")
            }
            DecodeErrorKind::InvalidTag => f.write_str("invalid tag value: 0"),
            DecodeErrorKind::WireTypeMismatch { expected, actual } => {
                write!(f, "invalid wire type: {actual:?} (expected {expected:?})")
            }
            DecodeErrorKind::AllocationLimitExceeded { requested, limit } => {
                write!(
                    f,
                    "length {requested} exceeds the allocation limit of {limit}"
                )
            }
            DecodeErrorKind::RecursionLimitReached => f.write_str("recursion limit reached"),
            DecodeErrorKind::InvalidUtf8 => {
                f.write_str("invalid string value: data is not UTF-8 encoded")
            }
            DecodeErrorKind::DelimitedLengthExceeded => f.write_str("delimited length exceeded"),
        }
    }
}

/// A message encoding error.
///
/// `EncodeError` always indicates that a message failed to encode because the
/// provided buffer had insufficient capacity and does not grow on demand.
/// Message encoding is otherwise infallible.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EncodeError {
    required: usize,
    remaining: usize,
}

impl EncodeError {
    pub(crate) fn new(required: usize, remaining: usize) -> EncodeError {
        EncodeError {
            required,
            remaining,
        }
    }

    /// Returns the required buffer capacity to encode the message.
    pub fn required_capacity(&self) -> usize {
        self.required
    }

    /// Returns the remaining length in the provided buffer at the time of
    /// encoding.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to encode message; insufficient buffer capacity (required: {}, remaining: {})",
            self.required, self.remaining
        )
    }
}

impl Error for EncodeError {}

#[cfg(feature = "std")]
impl From<EncodeError> for std::io::Error {
    fn from(error: EncodeError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, error)
    }
}

/// An error indicating that an unknown enumeration value was encountered.
///
/// Enumeration value sets are open: a message may carry an integer value the
/// present enum definition does not know. The raw value survives round trips
/// in its `i32` field; this error only surfaces through the `TryFrom<i32>`
/// conversion of a derived enumeration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UnknownEnumValue(pub i32);

impl fmt::Display for UnknownEnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown enumeration value {}", self.0)
    }
}

impl Error for UnknownEnumValue {}
