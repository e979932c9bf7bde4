//! Error types for tightbuf-build.

use std::io;

/// Errors that can occur during protobuf code generation.
///
/// Any error aborts the whole generation request; no files are written for a
/// request that fails.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("protoc not found. Set PROTOC env var or install protoc.")]
    ProtocNotFound,
    #[error("protoc failed: {0}")]
    ProtocFailed(String),
    #[error("failed to decode descriptor: {0}")]
    Decode(#[from] tightbuf::DecodeError),
    #[error("OUT_DIR not set. Run from build.rs or set out_dir().")]
    MissingOutDir,
    #[error("file_descriptor_set_path required when skip_protoc is set")]
    MissingDescriptorPath,
    #[error("missing name in descriptor")]
    MissingName,
    #[error("missing field number for field `{0}`")]
    MissingFieldNumber(String),
    /// A field shape or name the generator cannot express.
    #[error("unhandled schema construct in `{message}.{field}`: {reason}")]
    UnhandledSchemaConstruct {
        message: String,
        field: String,
        reason: String,
    },
    #[error("type `{0}` is not defined in any input file")]
    UnresolvedType(String),
    #[error("invalid default value `{value}` for field `{field}`")]
    InvalidDefault { field: String, value: String },
    #[error("invalid generator parameter `{0}`")]
    InvalidParameter(String),
    #[error("failed to parse generated code: {0}")]
    SynParse(#[from] syn::Error),
}
