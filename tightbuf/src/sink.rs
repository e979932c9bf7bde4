//! Encoding side of the wire format, mirroring [`crate::ProtoSource`].
//!
//! Writers append to any [`BufMut`]; the matching `compute_*_size` functions
//! return the exact number of bytes the writer will produce so lengths can be
//! written ahead of nested messages and packed runs.

// Signed values are reinterpreted as unsigned varints per the wire format.
#![allow(clippy::as_conversions)]

use bytes::BufMut;

use crate::leb128::{encode_zigzag32, encode_zigzag64, LebCodec};
use crate::message::ProtoMessage;
use crate::wire::{make_tag, WireType, FIXED32_SIZE, FIXED64_SIZE, MAX_VARINT_SIZE};

#[inline]
pub fn write_raw_varint32<B: BufMut>(buf: &mut B, value: u32) {
    value.encode_leb128(buf);
}

#[inline]
pub fn write_raw_varint64<B: BufMut>(buf: &mut B, value: u64) {
    value.encode_leb128(buf);
}

/// Write a raw tag produced by [`make_tag`].
#[inline]
pub fn write_tag<B: BufMut>(buf: &mut B, tag: u32) {
    write_raw_varint32(buf, tag);
}

/// Negative values are sign extended and always take ten bytes.
#[inline]
pub fn write_int32_no_tag<B: BufMut>(buf: &mut B, value: i32) {
    if value >= 0 {
        write_raw_varint32(buf, value as u32);
    } else {
        write_raw_varint64(buf, i64::from(value) as u64);
    }
}

#[inline]
pub fn write_int64_no_tag<B: BufMut>(buf: &mut B, value: i64) {
    write_raw_varint64(buf, value as u64);
}

#[inline]
pub fn write_uint32_no_tag<B: BufMut>(buf: &mut B, value: u32) {
    write_raw_varint32(buf, value);
}

#[inline]
pub fn write_uint64_no_tag<B: BufMut>(buf: &mut B, value: u64) {
    write_raw_varint64(buf, value);
}

#[inline]
pub fn write_sint32_no_tag<B: BufMut>(buf: &mut B, value: i32) {
    write_raw_varint32(buf, encode_zigzag32(value));
}

#[inline]
pub fn write_sint64_no_tag<B: BufMut>(buf: &mut B, value: i64) {
    write_raw_varint64(buf, encode_zigzag64(value));
}

#[inline]
pub fn write_bool_no_tag<B: BufMut>(buf: &mut B, value: bool) {
    buf.put_u8(u8::from(value));
}

#[inline]
pub fn write_enum_no_tag<B: BufMut>(buf: &mut B, value: i32) {
    write_int32_no_tag(buf, value);
}

#[inline]
pub fn write_fixed32_no_tag<B: BufMut>(buf: &mut B, value: u32) {
    buf.put_u32_le(value);
}

#[inline]
pub fn write_fixed64_no_tag<B: BufMut>(buf: &mut B, value: u64) {
    buf.put_u64_le(value);
}

#[inline]
pub fn write_sfixed32_no_tag<B: BufMut>(buf: &mut B, value: i32) {
    buf.put_i32_le(value);
}

#[inline]
pub fn write_sfixed64_no_tag<B: BufMut>(buf: &mut B, value: i64) {
    buf.put_i64_le(value);
}

#[inline]
pub fn write_float_no_tag<B: BufMut>(buf: &mut B, value: f32) {
    buf.put_f32_le(value);
}

#[inline]
pub fn write_double_no_tag<B: BufMut>(buf: &mut B, value: f64) {
    buf.put_f64_le(value);
}

pub fn write_bytes_no_tag<B: BufMut>(buf: &mut B, value: &[u8]) {
    write_raw_varint64(buf, value.len() as u64);
    buf.put_slice(value);
}

pub fn write_string_no_tag<B: BufMut>(buf: &mut B, value: &str) {
    write_bytes_no_tag(buf, value.as_bytes());
}

/// Write `msg` with a length prefix.
pub fn write_message_no_tag<B: BufMut, M: ProtoMessage>(buf: &mut B, msg: &M) {
    write_raw_varint64(buf, msg.encoded_len() as u64);
    msg.write_to(buf);
}

/// Write `msg` bracketed by start and end group tags for `field_number`.
pub fn write_group<B: BufMut, M: ProtoMessage>(buf: &mut B, field_number: u32, msg: &M) {
    write_tag(buf, make_tag(field_number, WireType::SGroup));
    msg.write_to(buf);
    write_tag(buf, make_tag(field_number, WireType::EGroup));
}

/// Write `values` as one packed field under `tag`. Nothing is written for an
/// empty slice.
pub fn write_packed<B, T>(
    buf: &mut B,
    tag: u32,
    values: &[T],
    size: impl Fn(T) -> usize,
    mut write: impl FnMut(&mut B, T),
) where
    B: BufMut,
    T: Copy,
{
    if values.is_empty() {
        return;
    }
    write_tag(buf, tag);
    write_raw_varint64(buf, compute_packed_size(values, size) as u64);
    for value in values {
        write(buf, *value);
    }
}

#[inline]
pub fn compute_raw_varint32_size(value: u32) -> usize {
    value.encoded_leb128_len()
}

#[inline]
pub fn compute_raw_varint64_size(value: u64) -> usize {
    value.encoded_leb128_len()
}

#[inline]
pub fn compute_tag_size(tag: u32) -> usize {
    compute_raw_varint32_size(tag)
}

#[inline]
pub fn compute_int32_size_no_tag(value: i32) -> usize {
    if value >= 0 {
        compute_raw_varint32_size(value as u32)
    } else {
        MAX_VARINT_SIZE
    }
}

#[inline]
pub fn compute_int64_size_no_tag(value: i64) -> usize {
    compute_raw_varint64_size(value as u64)
}

#[inline]
pub fn compute_uint32_size_no_tag(value: u32) -> usize {
    compute_raw_varint32_size(value)
}

#[inline]
pub fn compute_uint64_size_no_tag(value: u64) -> usize {
    compute_raw_varint64_size(value)
}

#[inline]
pub fn compute_sint32_size_no_tag(value: i32) -> usize {
    compute_raw_varint32_size(encode_zigzag32(value))
}

#[inline]
pub fn compute_sint64_size_no_tag(value: i64) -> usize {
    compute_raw_varint64_size(encode_zigzag64(value))
}

#[inline]
pub fn compute_bool_size_no_tag(_value: bool) -> usize {
    1
}

#[inline]
pub fn compute_enum_size_no_tag(value: i32) -> usize {
    compute_int32_size_no_tag(value)
}

#[inline]
pub fn compute_fixed32_size_no_tag<T>(_value: T) -> usize {
    FIXED32_SIZE
}

#[inline]
pub fn compute_fixed64_size_no_tag<T>(_value: T) -> usize {
    FIXED64_SIZE
}

/// Size of a length prefix plus `len` bytes of payload.
#[inline]
pub fn compute_length_delimited_size(len: usize) -> usize {
    compute_raw_varint64_size(len as u64) + len
}

#[inline]
pub fn compute_bytes_size_no_tag(value: &[u8]) -> usize {
    compute_length_delimited_size(value.len())
}

#[inline]
pub fn compute_string_size_no_tag(value: &str) -> usize {
    compute_length_delimited_size(value.len())
}

#[inline]
pub fn compute_message_size_no_tag<M: ProtoMessage>(msg: &M) -> usize {
    compute_length_delimited_size(msg.encoded_len())
}

/// Size of a group including both of its tags.
#[inline]
pub fn compute_group_size<M: ProtoMessage>(field_number: u32, msg: &M) -> usize {
    2 * compute_tag_size(make_tag(field_number, WireType::SGroup)) + msg.encoded_len()
}

/// Size of the body of a packed run, without its tag or length prefix.
pub fn compute_packed_size<T: Copy>(values: &[T], size: impl Fn(T) -> usize) -> usize {
    values.iter().map(|value| size(*value)).sum()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use proptest::property_test;

    use super::*;
    use crate::source::ProtoSource;

    #[test]
    fn test_negative_int32_is_sign_extended() {
        let mut buf = Vec::new();
        write_int32_no_tag(&mut buf, -1);
        assert_eq!(buf.len(), 10);
        assert_eq!(compute_int32_size_no_tag(-1), 10);
        assert_eq!(buf[9], 0x01);
    }

    #[test]
    fn test_packed_known_bytes() {
        let mut buf = Vec::new();
        write_packed(
            &mut buf,
            make_tag(2, WireType::Len),
            &[1i32, 2, 3],
            compute_int32_size_no_tag,
            write_int32_no_tag,
        );
        assert_eq!(buf, [0x12, 0x03, 0x01, 0x02, 0x03]);

        let mut empty = Vec::new();
        write_packed(
            &mut empty,
            make_tag(2, WireType::Len),
            &[] as &[i32],
            compute_int32_size_no_tag,
            write_int32_no_tag,
        );
        assert!(empty.is_empty());
    }

    #[test]
    fn test_string_known_bytes() {
        let mut buf = Vec::new();
        write_tag(&mut buf, make_tag(3, WireType::Len));
        write_string_no_tag(&mut buf, "x");
        assert_eq!(buf, [0x1A, 0x01, 0x78]);
        assert_eq!(compute_string_size_no_tag("x"), 2);
    }

    #[property_test]
    fn proptest_scalars_read_back(a: i32, b: i64, c: u32, d: f64, e: i32, f: f32) {
        let mut buf = Vec::new();
        write_int32_no_tag(&mut buf, a);
        write_sint64_no_tag(&mut buf, b);
        write_fixed32_no_tag(&mut buf, c);
        write_double_no_tag(&mut buf, d);
        write_sint32_no_tag(&mut buf, e);
        write_float_no_tag(&mut buf, f);

        let expected_len = compute_int32_size_no_tag(a)
            + compute_sint64_size_no_tag(b)
            + compute_fixed32_size_no_tag(c)
            + compute_fixed64_size_no_tag(d)
            + compute_sint32_size_no_tag(e)
            + compute_fixed32_size_no_tag(f);
        prop_assert_eq!(buf.len(), expected_len);

        let mut source = ProtoSource::new(&buf);
        prop_assert_eq!(source.read_int32().unwrap(), a);
        prop_assert_eq!(source.read_sint64().unwrap(), b);
        prop_assert_eq!(source.read_fixed32().unwrap(), c);
        prop_assert_eq!(source.read_double().unwrap().to_bits(), d.to_bits());
        prop_assert_eq!(source.read_sint32().unwrap(), e);
        prop_assert_eq!(source.read_float().unwrap().to_bits(), f.to_bits());
        prop_assert!(source.is_at_end());
    }
}
