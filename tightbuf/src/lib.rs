//! Runtime for messages generated by `tightbuf-build`.
//!
//! Generated code decodes through [`ProtoSource`], encodes through the
//! functions in [`sink`], and stores repeated values in [`RepeatedField`] and
//! [`RepeatedEnum`] so decoding into an existing message reuses its storage.

#![deny(clippy::as_conversions)]

pub mod error;
pub mod leb128;
pub mod message;
pub mod repeated;
pub mod sink;
pub mod source;
pub mod wire;

mod util;

pub use bytes;
pub use error::DecodeError;
pub use message::{ProtoEnum, ProtoMessage};
pub use repeated::{ProtoBytes, RepeatedEnum, RepeatedField};
pub use source::{ProtoSource, DEFAULT_RECURSION_LIMIT};
pub use wire::WireType;
