//! Running protoc and reading the descriptor sets it produces.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use tightbuf::ProtoMessage;

use crate::descriptor::FileDescriptorSet;
use crate::Error;

/// Locate protoc: `$PROTOC` when it names an existing file, else `PATH`.
pub fn find_protoc() -> Result<PathBuf, Error> {
    let from_env = std::env::var_os("PROTOC")
        .map(PathBuf::from)
        .filter(|path| path.is_file());
    match from_env {
        Some(path) => Ok(path),
        None => which::which("protoc").map_err(|_| Error::ProtocNotFound),
    }
}

/// Run protoc over `protos` and decode the descriptor set it writes.
///
/// Imports are always included so cross-file references resolve.
pub fn invoke_protoc(
    protoc: &Path,
    protos: &[impl AsRef<Path>],
    includes: &[impl AsRef<Path>],
    extra_args: &[String],
) -> Result<FileDescriptorSet, Error> {
    let scratch = tempfile::tempdir()?;
    let set_path = scratch.path().join("descriptor_set.pb");

    let mut cmd = Command::new(protoc);
    cmd.args(includes.iter().flat_map(|dir| [OsStr::new("-I"), dir.as_ref().as_os_str()]))
        .arg("--include_imports")
        .arg("--descriptor_set_out")
        .arg(&set_path)
        .args(extra_args)
        .args(protos.iter().map(|proto| proto.as_ref().as_os_str()));

    tracing::debug!(?cmd, "running protoc");
    let output = cmd.output()?;
    if !output.status.success() {
        let message = [&output.stdout, &output.stderr]
            .into_iter()
            .map(|stream| String::from_utf8_lossy(stream).trim().to_string())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        return Err(Error::ProtocFailed(message));
    }

    parse_file_descriptor_set(&std::fs::read(&set_path)?)
}

/// Parse a FileDescriptorSet from bytes.
pub fn parse_file_descriptor_set(bytes: &[u8]) -> Result<FileDescriptorSet, Error> {
    Ok(FileDescriptorSet::parse_from(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FileDescriptorProto;

    #[test]
    fn test_parse_roundtrip() {
        let fds = FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("x.proto".to_string()),
                syntax: Some("proto3".to_string()),
                ..Default::default()
            }],
        };
        let parsed = parse_file_descriptor_set(&fds.to_vec()).unwrap();
        assert_eq!(parsed, fds);
    }

    #[test]
    fn test_parse_truncated() {
        // Field 1, length 5, but only one byte follows.
        let err = parse_file_descriptor_set(&[0x0A, 0x05, 0x00]).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
