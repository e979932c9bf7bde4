//! Wire format for Google's Protocol Buffers, aka [protobuf](https://protobuf.dev).
//!
//! A tag is the varint `(field_number << 3) | wire_type`. Generated code
//! matches on raw tags, so the helpers here work on plain `u32` values rather
//! than a decoded key type.

use crate::error::DecodeError;

/// Number of bits used by the wire type in a tag.
pub const TAG_TYPE_BITS: u32 = 3;
/// Mask selecting the wire type from a tag.
pub const TAG_TYPE_MASK: u32 = (1 << TAG_TYPE_BITS) - 1;

/// Minimum value of a protobuf field number.
pub const MINIMUM_FIELD_NUMBER: u32 = 1;
/// Maximum value of a protobuf field number.
pub const MAXIMUM_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Encoded size of a `fixed32`, `sfixed32` or `float`.
pub const FIXED32_SIZE: usize = 4;
/// Encoded size of a `fixed64`, `sfixed64` or `double`.
pub const FIXED64_SIZE: usize = 8;
/// Maximum encoded size of a varint.
pub const MAX_VARINT_SIZE: usize = 10;

/// Combines a field number and a [`WireType`] into a raw tag.
#[inline(always)]
#[allow(clippy::as_conversions)]
pub const fn make_tag(field_number: u32, wire_type: WireType) -> u32 {
    (field_number << TAG_TYPE_BITS) | wire_type.into_val() as u32
}

/// Returns the field number stored in a raw tag.
#[inline(always)]
pub const fn tag_field_number(tag: u32) -> u32 {
    tag >> TAG_TYPE_BITS
}

/// Returns the [`WireType`] stored in a raw tag.
#[inline(always)]
pub fn tag_wire_type(tag: u32) -> Result<WireType, DecodeError> {
    #[allow(clippy::as_conversions)]
    WireType::try_from_val((tag & TAG_TYPE_MASK) as u8)
}

/// Denotes the type of a field in an encoded protobuf message.
///
/// Protobuf messages are a series of key-value pairs. When encoded each key-value pair
/// is turned into a record consisting of a field number, a [`WireType`], and a payload.
/// The [`WireType`] indicates how large the proceeding payload is.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum WireType {
    /// Variable length integer.
    ///
    /// Used for: `int32`, `int64`, `uint32`, `uint64`, `sint32`, `sint64`, `bool`, `enum`.
    Varint = 0,
    /// 64-bit integer.
    ///
    /// Used for: `fixed64`, `sfixed64`, `double`.
    I64 = 1,
    /// Variable length field.
    ///
    /// Used for: `string`, `bytes`, `message`, packed `repeated` fields.
    Len = 2,
    /// Group start.
    SGroup = 3,
    /// Group end.
    EGroup = 4,
    /// 32-bit integer.
    ///
    /// Used for: `fixed32`, `sfixed32`, `float`.
    I32 = 5,
}

// `Option<WireType>` stays one byte wide.
const _: () = assert!(std::mem::size_of::<WireType>() == std::mem::size_of::<Option<WireType>>());

#[allow(clippy::as_conversions)]
impl WireType {
    /// Try to decode a [`WireType`] from the provided raw value.
    #[inline(always)]
    const fn try_from_val(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::SGroup),
            4 => Ok(WireType::EGroup),
            5 => Ok(WireType::I32),
            value => Err(DecodeError::InvalidWireType { value }),
        }
    }

    /// Return the raw value for this [`WireType`].
    #[inline(always)]
    pub const fn into_val(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for WireType {
    type Error = DecodeError;

    #[inline(always)]
    fn try_from(value: u8) -> Result<Self, DecodeError> {
        WireType::try_from_val(value)
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use crate::wire::{make_tag, tag_field_number, tag_wire_type};
    use crate::wire::{WireType, MAXIMUM_FIELD_NUMBER, MINIMUM_FIELD_NUMBER};

    #[test]
    fn proptest_tag_roundtrips() {
        fn arb_field_number() -> impl Strategy<Value = u32> {
            MINIMUM_FIELD_NUMBER..=MAXIMUM_FIELD_NUMBER
        }

        fn arb_wiretype() -> impl Strategy<Value = WireType> {
            (0..=5u8).prop_map(|val| WireType::try_from(val).expect("known valid"))
        }

        fn test(field_number: u32, wire_type: WireType) {
            let tag = make_tag(field_number, wire_type);
            assert_eq!(tag_field_number(tag), field_number);
            assert_eq!(tag_wire_type(tag).unwrap(), wire_type);
        }

        let strat = (arb_field_number(), arb_wiretype());
        proptest!(|((field_number, wire_type) in strat)| test(field_number, wire_type))
    }

    #[test]
    fn test_all_valid_values() {
        // N.B. We do not use proptest here because the range of values is
        // small enough.
        for i in u8::MIN..u8::MAX {
            let wire_type = WireType::try_from(i);
            match (i, wire_type) {
                (0, Ok(WireType::Varint))
                | (1, Ok(WireType::I64))
                | (2, Ok(WireType::Len))
                | (3, Ok(WireType::SGroup))
                | (4, Ok(WireType::EGroup))
                | (5, Ok(WireType::I32)) => (),
                (_, Err(_)) if i > 5 => (),
                other => panic!("unexpected value {other:?}"),
            }
        }
    }

    #[test]
    fn test_known_tags() {
        assert_eq!(make_tag(1, WireType::Varint), 0x08);
        assert_eq!(make_tag(2, WireType::Len), 0x12);
        assert_eq!(make_tag(3, WireType::Len), 0x1A);
        assert_eq!(make_tag(5, WireType::EGroup), 0x2C);
    }
}
