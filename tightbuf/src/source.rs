//! Forward-only reader over an encoded protobuf buffer.

// Lengths are decoded as 32-bit varints and widened to `usize`; every cast
// here has been checked against the ranges the wire format allows.
#![allow(clippy::as_conversions)]

use crate::error::DecodeError;
use crate::leb128;
use crate::message::ProtoMessage;
use crate::repeated::ProtoBytes;
use crate::util::{likely, unlikely};
use crate::wire::{
    make_tag, tag_field_number, tag_wire_type, WireType, FIXED32_SIZE, FIXED64_SIZE,
    MAX_VARINT_SIZE,
};

/// Nesting depth allowed for messages and groups unless overridden with
/// [`ProtoSource::set_recursion_limit`].
pub const DEFAULT_RECURSION_LIMIT: u32 = 100;

/// Cursor over an immutable byte buffer.
///
/// `limit` is an absolute offset into `buf` marking the end of the message
/// currently being decoded. Nested messages narrow it with
/// [`ProtoSource::push_limit`] and restore it with [`ProtoSource::pop_limit`].
#[derive(Debug, Clone)]
pub struct ProtoSource<'a> {
    buf: &'a [u8],
    pos: usize,
    limit: usize,
    last_tag: u32,
    recursion_depth: u32,
    recursion_limit: u32,
}

impl<'a> ProtoSource<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ProtoSource {
            buf,
            pos: 0,
            limit: buf.len(),
            last_tag: 0,
            recursion_depth: 0,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    pub fn set_recursion_limit(&mut self, limit: u32) {
        self.recursion_limit = limit;
    }

    pub fn recursion_depth(&self) -> u32 {
        self.recursion_depth
    }

    /// Absolute offset of the cursor.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor back to a position previously returned by
    /// [`ProtoSource::position`].
    ///
    /// # Panics
    /// If `position` lies past the current limit.
    #[inline]
    pub fn rewind_to_position(&mut self, position: usize) {
        assert!(
            position <= self.limit,
            "position {position} is past the current limit {}",
            self.limit
        );
        self.pos = position;
    }

    #[inline]
    pub fn bytes_until_limit(&self) -> usize {
        self.limit - self.pos
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos == self.limit
    }

    #[inline]
    pub fn last_tag(&self) -> u32 {
        self.last_tag
    }

    /// Verify the most recent call to [`ProtoSource::read_tag`] returned `value`.
    ///
    /// Used after a nested merge to check it stopped where it should have:
    /// at the limit (`0`) for messages, or on the matching end-group tag.
    #[inline]
    pub fn check_last_tag_was(&self, value: u32) -> Result<(), DecodeError> {
        if self.last_tag != value {
            return Err(DecodeError::InvalidEndTag);
        }
        Ok(())
    }

    /// Read the next field tag, returning `0` once the current limit is reached.
    #[inline]
    pub fn read_tag(&mut self) -> Result<u32, DecodeError> {
        if self.is_at_end() {
            self.last_tag = 0;
            return Ok(0);
        }

        let tag = self.read_raw_varint32()?;
        if unlikely(tag_field_number(tag) == 0) {
            return Err(DecodeError::InvalidTag);
        }
        self.last_tag = tag;
        Ok(tag)
    }

    #[inline]
    fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..self.limit]
    }

    /// Read a varint holding at most 32 significant bits.
    ///
    /// Longer encodings (negative `int32` values) are accepted and truncated
    /// to their low 32 bits.
    #[inline]
    pub fn read_raw_varint32(&mut self) -> Result<u32, DecodeError> {
        let remaining = self.remaining();
        if let Some(&first) = remaining.first() {
            if likely(first < 0x80) {
                self.pos += 1;
                return Ok(u32::from(first));
            }
        }

        match remaining.first_chunk::<MAX_VARINT_SIZE>() {
            Some(window) => {
                let (value, len) =
                    leb128::decode_varint32(window).ok_or(DecodeError::MalformedVarint)?;
                self.pos += len;
                Ok(value)
            }
            None => {
                let (value, len) = leb128::decode_varint_slow(remaining)?;
                self.pos += len;
                Ok(value as u32)
            }
        }
    }

    #[inline]
    pub fn read_raw_varint64(&mut self) -> Result<u64, DecodeError> {
        let remaining = self.remaining();
        let (value, len) = match remaining.first_chunk::<MAX_VARINT_SIZE>() {
            Some(window) => leb128::decode_varint64(window).ok_or(DecodeError::MalformedVarint)?,
            None => leb128::decode_varint_slow(remaining)?,
        };
        self.pos += len;
        Ok(value)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let chunk = self
            .remaining()
            .first_chunk::<N>()
            .ok_or(DecodeError::Truncated)?;
        self.pos += N;
        Ok(*chunk)
    }

    /// Borrow the next `len` bytes of the buffer.
    #[inline]
    pub fn read_raw_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if len > self.bytes_until_limit() {
            return Err(DecodeError::Truncated);
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    #[inline]
    pub fn skip_raw_bytes(&mut self, len: usize) -> Result<(), DecodeError> {
        self.read_raw_bytes(len).map(|_| ())
    }

    #[inline]
    pub fn read_int32(&mut self) -> Result<i32, DecodeError> {
        self.read_raw_varint32().map(|v| v as i32)
    }

    #[inline]
    pub fn read_int64(&mut self) -> Result<i64, DecodeError> {
        self.read_raw_varint64().map(|v| v as i64)
    }

    #[inline]
    pub fn read_uint32(&mut self) -> Result<u32, DecodeError> {
        self.read_raw_varint32()
    }

    #[inline]
    pub fn read_uint64(&mut self) -> Result<u64, DecodeError> {
        self.read_raw_varint64()
    }

    #[inline]
    pub fn read_sint32(&mut self) -> Result<i32, DecodeError> {
        self.read_raw_varint32().map(leb128::decode_zigzag32)
    }

    #[inline]
    pub fn read_sint64(&mut self) -> Result<i64, DecodeError> {
        self.read_raw_varint64().map(leb128::decode_zigzag64)
    }

    #[inline]
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        self.read_raw_varint64().map(|v| v != 0)
    }

    /// Read the raw value of an enum field. Unrecognized values are returned
    /// as-is; callers decide whether to keep them.
    #[inline]
    pub fn read_enum(&mut self) -> Result<i32, DecodeError> {
        self.read_int32()
    }

    #[inline]
    pub fn read_fixed32(&mut self) -> Result<u32, DecodeError> {
        self.read_array::<FIXED32_SIZE>().map(u32::from_le_bytes)
    }

    #[inline]
    pub fn read_fixed64(&mut self) -> Result<u64, DecodeError> {
        self.read_array::<FIXED64_SIZE>().map(u64::from_le_bytes)
    }

    #[inline]
    pub fn read_sfixed32(&mut self) -> Result<i32, DecodeError> {
        self.read_array::<FIXED32_SIZE>().map(i32::from_le_bytes)
    }

    #[inline]
    pub fn read_sfixed64(&mut self) -> Result<i64, DecodeError> {
        self.read_array::<FIXED64_SIZE>().map(i64::from_le_bytes)
    }

    #[inline]
    pub fn read_float(&mut self) -> Result<f32, DecodeError> {
        self.read_fixed32().map(f32::from_bits)
    }

    #[inline]
    pub fn read_double(&mut self) -> Result<f64, DecodeError> {
        self.read_fixed64().map(f64::from_bits)
    }

    /// Read a length prefix.
    ///
    /// Lengths are encoded as 32-bit varints; a value with the sign bit set
    /// is rejected rather than treated as a huge size.
    #[inline]
    pub fn read_length(&mut self) -> Result<usize, DecodeError> {
        let size = self.read_raw_varint32()? as i32;
        if unlikely(size < 0) {
            return Err(DecodeError::NegativeSize);
        }
        Ok(size as usize)
    }

    /// Read a length-delimited UTF-8 string, borrowing from the buffer.
    pub fn read_string(&mut self) -> Result<&'a str, DecodeError> {
        let len = self.read_length()?;
        let bytes = self.read_raw_bytes(len)?;
        Ok(core::str::from_utf8(bytes)?)
    }

    /// Read a length-delimited UTF-8 string into `out`, reusing its allocation.
    pub fn read_string_into(&mut self, out: &mut String) -> Result<(), DecodeError> {
        let len = self.read_length()?;
        out.clear();
        if len == 0 {
            return Ok(());
        }
        let bytes = self.read_raw_bytes(len)?;
        out.push_str(core::str::from_utf8(bytes)?);
        Ok(())
    }

    /// Read a length-delimited byte string, borrowing from the buffer.
    pub fn read_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_length()?;
        self.read_raw_bytes(len)
    }

    /// Read a length-delimited byte string into `out`, reusing its allocation.
    pub fn read_bytes_into(&mut self, out: &mut ProtoBytes) -> Result<(), DecodeError> {
        let len = self.read_length()?;
        if len == 0 {
            out.clear();
            return Ok(());
        }
        let bytes = self.read_raw_bytes(len)?;
        out.copy_from(bytes);
        Ok(())
    }

    /// Narrow the limit to `byte_limit` bytes past the cursor, returning the
    /// previous limit for [`ProtoSource::pop_limit`].
    pub fn push_limit(&mut self, byte_limit: usize) -> Result<usize, DecodeError> {
        let new_limit = self
            .pos
            .checked_add(byte_limit)
            .ok_or(DecodeError::Truncated)?;
        if new_limit > self.limit {
            return Err(DecodeError::Truncated);
        }
        Ok(core::mem::replace(&mut self.limit, new_limit))
    }

    #[inline]
    pub fn pop_limit(&mut self, old_limit: usize) {
        debug_assert!(old_limit >= self.limit);
        self.limit = old_limit;
    }

    fn enter_nested(&mut self) -> Result<(), DecodeError> {
        if self.recursion_depth >= self.recursion_limit {
            return Err(DecodeError::RecursionLimitExceeded);
        }
        self.recursion_depth += 1;
        Ok(())
    }

    fn exit_nested(&mut self) {
        self.recursion_depth -= 1;
    }

    /// Read a length-delimited embedded message, merging it into `msg`.
    pub fn read_message<M: ProtoMessage + ?Sized>(
        &mut self,
        msg: &mut M,
    ) -> Result<(), DecodeError> {
        let length = self.read_length()?;
        self.enter_nested()?;
        let old_limit = self.push_limit(length)?;
        msg.merge_from(self)?;
        self.check_last_tag_was(0)?;
        self.pop_limit(old_limit);
        self.exit_nested();
        Ok(())
    }

    /// Read a group for `field_number`, merging it into `msg`. The start-group
    /// tag must already have been consumed.
    pub fn read_group<M: ProtoMessage + ?Sized>(
        &mut self,
        field_number: u32,
        msg: &mut M,
    ) -> Result<(), DecodeError> {
        self.enter_nested()?;
        msg.merge_from(self)?;
        self.check_last_tag_was(make_tag(field_number, WireType::EGroup))?;
        self.exit_nested();
        Ok(())
    }

    /// Skip the value of a field whose tag was just read.
    ///
    /// Returns `false` if `tag` is an end-group tag, meaning the enclosing
    /// group is finished and the caller should stop reading.
    pub fn skip_field(&mut self, tag: u32) -> Result<bool, DecodeError> {
        match tag_wire_type(tag)? {
            WireType::Varint => {
                self.read_raw_varint64()?;
            }
            WireType::I64 => self.skip_raw_bytes(FIXED64_SIZE)?,
            WireType::Len => {
                let len = self.read_length()?;
                self.skip_raw_bytes(len)?;
            }
            WireType::SGroup => {
                self.enter_nested()?;
                self.skip_message()?;
                self.check_last_tag_was(make_tag(tag_field_number(tag), WireType::EGroup))?;
                self.exit_nested();
            }
            WireType::EGroup => return Ok(false),
            WireType::I32 => self.skip_raw_bytes(FIXED32_SIZE)?,
        }
        Ok(true)
    }

    /// Skip fields until the limit or an end-group tag is reached.
    pub fn skip_message(&mut self) -> Result<(), DecodeError> {
        loop {
            let tag = self.read_tag()?;
            if tag == 0 || !self.skip_field(tag)? {
                return Ok(());
            }
        }
    }

    /// Count how many values of the repeated field `tag` remain in the
    /// current message, including the one at the cursor.
    ///
    /// Call this right after reading `tag`, before reading its value. The
    /// contiguous run is counted first; occurrences further on, separated by
    /// other fields, are counted too by scanning to the end of the enclosing
    /// message or group. The cursor and last tag are restored afterwards.
    pub fn repeated_field_array_length(&mut self, tag: u32) -> Result<usize, DecodeError> {
        let start = self.pos;
        let last_tag = self.last_tag;

        let mut count = 1;
        self.skip_field(tag)?;
        loop {
            let next = self.read_tag()?;
            if next == 0 {
                break;
            }
            if next == tag {
                count += 1;
                self.skip_field(tag)?;
            } else if !self.skip_field(next)? {
                break;
            }
        }

        self.pos = start;
        self.last_tag = last_tag;
        Ok(count)
    }

    /// Count the varints between the cursor and the current limit. Used to
    /// size a container before reading a packed run.
    pub fn count_packed_varints(&self) -> usize {
        self.remaining().iter().filter(|&&b| b < 0x80).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_tag_at_end_returns_zero() {
        let mut source = ProtoSource::new(&[]);
        assert_eq!(source.read_tag(), Ok(0));
        assert_eq!(source.last_tag(), 0);
    }

    #[test]
    fn test_read_tag_rejects_field_zero() {
        let mut source = ProtoSource::new(&[0x00, 0x01]);
        assert_eq!(source.read_tag(), Err(DecodeError::InvalidTag));
    }

    #[test]
    fn test_read_scalars() {
        let bytes = [
            0x96, 0x01, // 150
            0x03, // sint32 -2
            0x01, // true
            0x78, 0x56, 0x34, 0x12, // fixed32
            0x00, 0x00, 0x80, 0x3F, // float 1.0
        ];
        let mut source = ProtoSource::new(&bytes);
        assert_eq!(source.read_uint32(), Ok(150));
        assert_eq!(source.read_sint32(), Ok(-2));
        assert_eq!(source.read_bool(), Ok(true));
        assert_eq!(source.read_fixed32(), Ok(0x1234_5678));
        assert_eq!(source.read_float(), Ok(1.0));
        assert!(source.is_at_end());
        assert_eq!(source.read_fixed32(), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_negative_int32_ten_bytes() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let mut source = ProtoSource::new(&bytes);
        assert_eq!(source.read_int32(), Ok(-1));
        assert!(source.is_at_end());

        let mut source = ProtoSource::new(&bytes);
        assert_eq!(source.read_int64(), Ok(-1));
    }

    #[test]
    fn test_truncated_varint() {
        let mut source = ProtoSource::new(&[0x80, 0x80]);
        assert_eq!(source.read_uint64(), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_overlong_varint() {
        let bytes = [0xFF; 12];
        let mut source = ProtoSource::new(&bytes);
        assert_eq!(source.read_uint64(), Err(DecodeError::MalformedVarint));
    }

    #[test]
    fn test_negative_length() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0x0F];
        let mut source = ProtoSource::new(&bytes);
        assert_eq!(source.read_length(), Err(DecodeError::NegativeSize));
    }

    #[test]
    fn test_string_length_past_end() {
        let mut source = ProtoSource::new(&[0x05, b'a', b'b']);
        let mut out = String::new();
        assert_eq!(source.read_string_into(&mut out), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_zero_length_string_and_bytes() {
        let mut source = ProtoSource::new(&[0x00, 0x00]);
        let mut text = String::from("stale");
        source.read_string_into(&mut text).unwrap();
        assert!(text.is_empty());

        let mut bytes = ProtoBytes::new();
        bytes.add_all(&[1, 2, 3]);
        source.read_bytes_into(&mut bytes).unwrap();
        assert!(bytes.is_empty());
        assert!(source.is_at_end());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut source = ProtoSource::new(&[0x02, 0xC3, 0x28]);
        assert_eq!(source.read_string(), Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn test_push_limit_beyond_enclosing() {
        let bytes = [0u8; 8];
        let mut source = ProtoSource::new(&bytes);
        let outer = source.push_limit(4).unwrap();
        assert_eq!(source.bytes_until_limit(), 4);
        assert_eq!(source.push_limit(5), Err(DecodeError::Truncated));

        let inner = source.push_limit(2).unwrap();
        source.skip_raw_bytes(2).unwrap();
        assert!(source.is_at_end());
        source.pop_limit(inner);
        assert_eq!(source.bytes_until_limit(), 2);
        source.pop_limit(outer);
        assert_eq!(source.bytes_until_limit(), 6);
    }

    #[test]
    fn test_skip_field_every_wire_type() {
        let bytes = [
            0x08, 0x96, 0x01, // 1: varint
            0x11, 1, 2, 3, 4, 5, 6, 7, 8, // 2: fixed64
            0x1A, 0x02, b'h', b'i', // 3: len
            0x23, 0x08, 0x01, 0x24, // 4: group { 1: 1 }
            0x2D, 1, 2, 3, 4, // 5: fixed32
        ];
        let mut source = ProtoSource::new(&bytes);
        source.skip_message().unwrap();
        assert!(source.is_at_end());
        assert_eq!(source.recursion_depth(), 0);
    }

    #[test]
    fn test_skip_field_invalid_wire_type() {
        let mut source = ProtoSource::new(&[0x0E]);
        let tag = source.read_tag().unwrap();
        assert_eq!(
            source.skip_field(tag),
            Err(DecodeError::InvalidWireType { value: 6 })
        );
    }

    #[test]
    fn test_skip_group_mismatched_end() {
        // Start group 4, end group 5.
        let mut source = ProtoSource::new(&[0x23, 0x2C]);
        assert_eq!(source.skip_message(), Err(DecodeError::InvalidEndTag));
    }

    #[test]
    fn test_skip_nested_groups_hits_recursion_limit() {
        let mut bytes = vec![0x23; 5];
        bytes.extend(vec![0x24; 5]);

        let mut source = ProtoSource::new(&bytes);
        source.set_recursion_limit(5);
        assert_eq!(source.skip_message(), Ok(()));

        let mut source = ProtoSource::new(&bytes);
        source.set_recursion_limit(4);
        assert_eq!(
            source.skip_message(),
            Err(DecodeError::RecursionLimitExceeded)
        );
    }

    #[test]
    fn test_repeated_field_array_length_contiguous() {
        // 1: [5, 6, 7] followed by 2: 9
        let bytes = [0x08, 0x05, 0x08, 0x06, 0x08, 0x07, 0x10, 0x09];
        let mut source = ProtoSource::new(&bytes);
        let tag = source.read_tag().unwrap();
        let start = source.position();

        assert_eq!(source.repeated_field_array_length(tag), Ok(3));
        assert_eq!(source.position(), start);
        assert_eq!(source.last_tag(), tag);
        assert_eq!(source.read_uint32(), Ok(5));
    }

    #[test]
    fn test_repeated_field_array_length_interspersed() {
        // 1: 5, 2: "a", 1: 6, 3: 1, 1: 7
        let bytes = [
            0x08, 0x05, 0x12, 0x01, b'a', 0x08, 0x06, 0x18, 0x01, 0x08, 0x07,
        ];
        let mut source = ProtoSource::new(&bytes);
        let tag = source.read_tag().unwrap();
        let start = source.position();

        assert_eq!(source.repeated_field_array_length(tag), Ok(3));
        assert_eq!(source.position(), start);
    }

    #[test]
    fn test_repeated_field_array_length_stops_at_limit() {
        // Outer message holds 1: [5, 6] inside a 4-byte limit, then 1: 7 outside it.
        let bytes = [0x08, 0x05, 0x08, 0x06, 0x08, 0x07];
        let mut source = ProtoSource::new(&bytes);
        let old = source.push_limit(4).unwrap();
        let tag = source.read_tag().unwrap();
        assert_eq!(source.repeated_field_array_length(tag), Ok(2));
        source.pop_limit(old);
    }

    #[test]
    fn test_repeated_field_array_length_stops_at_end_group() {
        // Inside group 5: 1: [5, 6], end of group, then 1: 7 in the parent.
        let bytes = [0x08, 0x05, 0x08, 0x06, 0x2C, 0x08, 0x07];
        let mut source = ProtoSource::new(&bytes);
        let tag = source.read_tag().unwrap();
        let start = source.position();

        assert_eq!(source.repeated_field_array_length(tag), Ok(2));
        assert_eq!(source.position(), start);
        assert_eq!(source.last_tag(), tag);
    }

    #[test]
    fn test_count_packed_varints() {
        let bytes = [0x01, 0x96, 0x01, 0xFF, 0xFF, 0x03, 0x00];
        let source = ProtoSource::new(&bytes);
        assert_eq!(source.count_packed_varints(), 4);
    }

    #[test]
    fn test_rewind() {
        let bytes = [0x08, 0x01, 0x10, 0x02];
        let mut source = ProtoSource::new(&bytes);
        source.read_tag().unwrap();
        let mark = source.position();
        source.read_uint32().unwrap();
        source.read_tag().unwrap();
        source.rewind_to_position(mark);
        assert_eq!(source.read_uint32(), Ok(1));
    }
}
