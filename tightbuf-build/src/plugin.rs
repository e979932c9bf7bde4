//! protoc plugin entry: a `CodeGeneratorRequest` in, a
//! `CodeGeneratorResponse` out.
//!
//! Generation failures are reported in the response's `error` field with no
//! files, which protoc prints as a diagnostic.

use tightbuf::ProtoMessage;

use crate::codegen::generate_files;
use crate::config::Config;
use crate::descriptor::{
    CodeGeneratorRequest, CodeGeneratorResponse, CodeGeneratorResponseFile, FileDescriptorSet,
    FEATURE_PROTO3_OPTIONAL,
};
use crate::Error;

/// Answer one generation request.
pub fn generate(request: &CodeGeneratorRequest) -> CodeGeneratorResponse {
    let mut response = CodeGeneratorResponse {
        supported_features: Some(FEATURE_PROTO3_OPTIONAL),
        ..Default::default()
    };

    match try_generate(request) {
        Ok(file) => response.file = file,
        Err(err) => {
            tracing::error!(%err, "generation failed");
            response.error = Some(err.to_string());
        }
    }
    response
}

fn try_generate(request: &CodeGeneratorRequest) -> Result<Vec<CodeGeneratorResponseFile>, Error> {
    let mut config = Config::new();
    if let Some(parameter) = request.parameter.as_deref() {
        config.apply_parameter(parameter)?;
    }

    let fds = FileDescriptorSet {
        file: request.proto_file.clone(),
    };
    tracing::debug!(
        files = request.file_to_generate.len(),
        known = fds.file.len(),
        "handling generation request"
    );

    let files = generate_files(&config, &fds, Some(&request.file_to_generate))?;
    Ok(files
        .into_iter()
        .map(|file| CodeGeneratorResponseFile {
            name: Some(file.name),
            insertion_point: None,
            content: Some(file.content),
        })
        .collect())
}

/// Decode a serialized request and encode the response.
pub fn run(request: &[u8]) -> Result<Vec<u8>, Error> {
    let request = CodeGeneratorRequest::parse_from(request)?;
    Ok(generate(&request).to_vec())
}
