//! LEB128 variable-length integer encoding/decoding, aka "varints".

// Casts here only truncate to a byte or widen.
#![allow(clippy::as_conversions)]

use crate::error::DecodeError;
use crate::wire::MAX_VARINT_SIZE;

/// Types that can be encoded as a LEB128 variable length integer.
pub trait LebCodec: Sized + Copy {
    /// Maximum number of bytes an encoded value of this type can occupy.
    const MAX_LEB_BYTES: usize;

    /// Append the varint form of `self` to `buf`; returns its length.
    fn encode_leb128<B: bytes::BufMut>(self, buf: &mut B) -> usize;

    fn encoded_leb128_len(self) -> usize;
}

impl LebCodec for u64 {
    const MAX_LEB_BYTES: usize = 10;

    #[inline]
    fn encode_leb128<B: bytes::BufMut>(self, buf: &mut B) -> usize {
        let mut value = self;
        let mut written = 1;
        while value >= 0x80 {
            buf.put_u8((value as u8) | 0x80);
            value >>= 7;
            written += 1;
        }
        buf.put_u8(value as u8);
        written
    }

    #[inline]
    fn encoded_leb128_len(self) -> usize {
        // Seven payload bits per byte: ceil(bits / 7) == (bits * 9 + 64) / 64
        // for 1..=64 bits. Zero still takes one byte.
        let bits = 64 - (self | 1).leading_zeros();
        ((bits * 9 + 64) / 64) as usize
    }
}

impl LebCodec for u32 {
    const MAX_LEB_BYTES: usize = 5;

    #[inline]
    fn encode_leb128<B: bytes::BufMut>(self, buf: &mut B) -> usize {
        u64::from(self).encode_leb128(buf)
    }

    #[inline]
    fn encoded_leb128_len(self) -> usize {
        u64::from(self).encoded_leb128_len()
    }
}

// Accumulated sign-extension bits left behind by each continuation byte. A
// single XOR with the right combination clears them once the final byte is
// known, instead of masking every byte as it is read.
const M7_32: i32 = !0 << 7;
const M14_32: i32 = !0 << 14;
const M21_32: i32 = !0 << 21;
const M28_32: i32 = !0 << 28;

const M7: i64 = !0 << 7;
const M14: i64 = !0 << 14;
const M21: i64 = !0 << 21;
const M28: i64 = !0 << 28;
const M35: i64 = !0 << 35;
const M42: i64 = !0 << 42;
const M49: i64 = !0 << 49;
const M56: i64 = !0 << 56;

/// Decode a varint holding a 32-bit value from a window of at least
/// [`MAX_VARINT_SIZE`] readable bytes.
///
/// Negative `int32` values are encoded as ten bytes, so after the fifth byte
/// up to five more continuation bytes are consumed and discarded.
///
/// Returns `None` if no terminating byte was found within ten bytes.
#[inline]
pub fn decode_varint32(data: &[u8; MAX_VARINT_SIZE]) -> Option<(u32, usize)> {
    let b = |i: usize| i32::from(data[i] as i8);

    let mut x = b(0);
    if x >= 0 {
        return Some((x as u32, 1));
    }
    x ^= b(1) << 7;
    if x < 0 {
        return Some(((x ^ M7_32) as u32, 2));
    }
    x ^= b(2) << 14;
    if x >= 0 {
        return Some(((x ^ M7_32 ^ M14_32) as u32, 3));
    }
    x ^= b(3) << 21;
    if x < 0 {
        return Some(((x ^ M7_32 ^ M14_32 ^ M21_32) as u32, 4));
    }
    let y = b(4);
    x ^= y << 28;
    x ^= M7_32 ^ M14_32 ^ M21_32 ^ M28_32;
    if y >= 0 {
        return Some((x as u32, 5));
    }

    for (i, &byte) in data.iter().enumerate().skip(5) {
        if byte < 0x80 {
            return Some((x as u32, i + 1));
        }
    }
    None
}

/// Decode a 64-bit varint from a window of at least [`MAX_VARINT_SIZE`]
/// readable bytes.
///
/// Each byte is sign extended into the accumulator, so the continuation bit
/// of the most recent byte shows up as the accumulator's sign. That lets every
/// step branch on a single comparison against zero.
///
/// Returns `None` if the varint is longer than ten bytes.
#[inline]
pub fn decode_varint64(data: &[u8; MAX_VARINT_SIZE]) -> Option<(u64, usize)> {
    let b = |i: usize| data[i] as i8;

    let mut y = i32::from(b(0));
    if y >= 0 {
        return Some((y as u64, 1));
    }
    y ^= i32::from(b(1)) << 7;
    if y < 0 {
        return Some(((y ^ M7_32) as u64, 2));
    }
    y ^= i32::from(b(2)) << 14;
    if y >= 0 {
        return Some(((y ^ M7_32 ^ M14_32) as u64, 3));
    }
    y ^= i32::from(b(3)) << 21;
    if y < 0 {
        return Some(((y ^ M7_32 ^ M14_32 ^ M21_32) as u64, 4));
    }

    let mut x = i64::from(y) ^ (i64::from(b(4)) << 28);
    if x >= 0 {
        return Some(((x ^ M7 ^ M14 ^ M21 ^ M28) as u64, 5));
    }
    x ^= i64::from(b(5)) << 35;
    if x < 0 {
        return Some(((x ^ M7 ^ M14 ^ M21 ^ M28 ^ M35) as u64, 6));
    }
    x ^= i64::from(b(6)) << 42;
    if x >= 0 {
        return Some(((x ^ M7 ^ M14 ^ M21 ^ M28 ^ M35 ^ M42) as u64, 7));
    }
    x ^= i64::from(b(7)) << 49;
    if x < 0 {
        return Some(((x ^ M7 ^ M14 ^ M21 ^ M28 ^ M35 ^ M42 ^ M49) as u64, 8));
    }
    x ^= i64::from(b(8)) << 56;
    x ^= M7 ^ M14 ^ M21 ^ M28 ^ M35 ^ M42 ^ M49 ^ M56;
    if x >= 0 {
        return Some((x as u64, 9));
    }

    // The sign bit now holds the ninth byte's continuation flag; the tenth
    // byte supplies the real bit 63.
    let last = b(9);
    if last < 0 {
        return None;
    }
    let value = (x as u64 & !(1 << 63)) | (u64::from(last as u8 & 1) << 63);
    Some((value, 10))
}

/// Byte-at-a-time varint decoding for windows shorter than
/// [`MAX_VARINT_SIZE`], or as a fallback near the end of a buffer.
///
/// Returns [`DecodeError::Truncated`] if the input ends before the varint
/// does and [`DecodeError::MalformedVarint`] if it runs past ten bytes.
pub fn decode_varint_slow(data: &[u8]) -> Result<(u64, usize), DecodeError> {
    let mut result = 0u64;
    for (i, &byte) in data.iter().take(MAX_VARINT_SIZE).enumerate() {
        result |= u64::from(byte & 0x7F) << (7 * i);
        if byte < 0x80 {
            return Ok((result, i + 1));
        }
    }

    if data.len() < MAX_VARINT_SIZE {
        Err(DecodeError::Truncated)
    } else {
        Err(DecodeError::MalformedVarint)
    }
}

/// Maps a signed 32-bit integer onto an unsigned one so small magnitudes stay short.
#[inline(always)]
pub const fn encode_zigzag32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Inverse of [`encode_zigzag32`].
#[inline(always)]
pub const fn decode_zigzag32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Maps a signed 64-bit integer onto an unsigned one so small magnitudes stay short.
#[inline(always)]
pub const fn encode_zigzag64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`encode_zigzag64`].
#[inline(always)]
pub const fn decode_zigzag64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
