#![cfg_attr(not(feature = "std"), no_std)]
#![doc = include_str!("../README.md")]

extern crate alloc;

// Re-export the bytes crate for use within derived code.
pub use bytes;

mod error;
mod message;
mod options;

#[doc(hidden)]
pub mod encoding;

pub use crate::encoding::length_delimiter::{
    decode_length_delimiter, encode_length_delimiter, length_delimiter_len,
};
pub use crate::error::{DecodeError, DecodeErrorKind, EncodeError, UnknownEnumValue};
pub use crate::message::Message;
pub use crate::options::{DecodeOptions, EncodeOptions, SizePrefix};

// 100 is the default recursion limit in the C++ implementation.
const RECURSION_LIMIT: u32 = 100;

// Re-export #[derive(Message, Enumeration)].
#[cfg(feature = "derive")]
#[allow(unused_imports)]
#[macro_use]
extern crate wirebuf_derive;
#[cfg(feature = "derive")]
#[doc(hidden)]
pub use wirebuf_derive::*;
