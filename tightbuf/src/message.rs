//! Traits implemented by generated messages and enums.

use crate::error::DecodeError;
use crate::source::ProtoSource;

/// A protobuf message.
///
/// Decoding follows protobuf merge semantics: scalars overwrite, embedded
/// messages merge recursively, repeated fields append.
pub trait ProtoMessage: Default {
    /// Merge fields from `input` into `self` until the current limit or an
    /// end-group tag is reached.
    fn merge_from(&mut self, input: &mut ProtoSource<'_>) -> Result<(), DecodeError>;

    /// Write every present field to `buf`.
    fn write_to<B: bytes::BufMut>(&self, buf: &mut B);

    /// Number of bytes [`ProtoMessage::write_to`] will produce.
    fn encoded_len(&self) -> usize;

    /// Reset every field to its default, keeping allocated storage.
    fn clear(&mut self);

    /// Merge a complete serialized message from `buf` into `self`.
    fn merge_from_bytes(&mut self, buf: &[u8]) -> Result<(), DecodeError> {
        let mut input = ProtoSource::new(buf);
        self.merge_from(&mut input)?;
        input.check_last_tag_was(0)
    }

    /// Decode a new message from `buf`.
    fn parse_from(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut msg = Self::default();
        msg.merge_from_bytes(buf)?;
        Ok(msg)
    }

    /// Encode into a new `Vec`, sized up front.
    fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf
    }
}

/// A protobuf enum backed by an `i32`.
pub trait ProtoEnum: Copy + Sized {
    /// Returns `None` for values this schema does not declare.
    fn from_i32(value: i32) -> Option<Self>;

    fn value(self) -> i32;
}
