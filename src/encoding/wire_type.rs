use crate::error::DecodeErrorKind;
use crate::DecodeError;

/// The 3-bit classifier of a value's on-wire shape.
///
/// The integer value is the encoded value. The deprecated group wire types
/// (3 and 4) are not represented; tags carrying them fail to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    SixtyFourBit = 1,
    LengthDelimited = 2,
    ThirtyTwoBit = 5,
}

impl WireType {
    /// Whether the wire type carries a bare number, varint or fixed width.
    pub(crate) fn is_numeric(self) -> bool {
        !matches!(self, WireType::LengthDelimited)
    }
}

impl TryFrom<u64> for WireType {
    type Error = DecodeError;

    #[inline]
    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::SixtyFourBit),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::ThirtyTwoBit),
            _ => Err(DecodeErrorKind::InvalidWireType { value }.into()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn group_wire_types_are_rejected() {
        for value in [3u64, 4, 6, 7] {
            let error = WireType::try_from(value).unwrap_err();
            assert_eq!(error.kind(), DecodeErrorKind::InvalidWireType { value });
        }
    }
}
