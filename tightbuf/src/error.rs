//! Errors produced while decoding the protobuf wire format.
//!
//! Every variant aborts the current parse call. There is no partial-message
//! recovery; the only tolerated irregularity is an unknown field, which is
//! skipped by the reader instead of producing an error.

/// Error returned by [`crate::ProtoSource`] and the generated `merge_from` routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A tag decoded to field number zero while bytes remained in the buffer.
    #[error("protocol message contained an invalid tag (zero)")]
    InvalidTag,
    /// A varint did not terminate within the maximum number of bytes.
    #[error("protocol message contained a malformed varint")]
    MalformedVarint,
    /// Fewer bytes remain than the field (or its length prefix) requires.
    #[error("protocol message was truncated, or a length-delimited field has an invalid size")]
    Truncated,
    /// A length prefix decoded to a negative value.
    #[error("protocol message contained a field with a negative size")]
    NegativeSize,
    /// Nested messages or groups exceeded the configured recursion limit.
    #[error("protocol message had too many levels of nesting")]
    RecursionLimitExceeded,
    /// A sub-message or group did not end with the expected tag.
    #[error("protocol message end-group tag did not match the expected tag")]
    InvalidEndTag,
    /// The low three bits of a tag did not name a known wire type.
    #[error("protocol message tag had invalid wire type {value}")]
    InvalidWireType { value: u8 },
    /// A `string` field contained bytes that are not valid UTF-8.
    #[error("protocol message contained a string field with invalid UTF-8")]
    InvalidUtf8,
}

impl From<core::str::Utf8Error> for DecodeError {
    fn from(_: core::str::Utf8Error) -> Self {
        DecodeError::InvalidUtf8
    }
}
