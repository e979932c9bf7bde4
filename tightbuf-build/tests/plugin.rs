//! Runs the plugin binary the way protoc does.

use std::io::Write;
use std::process::{Command, Stdio};

use tightbuf::ProtoMessage;
use tightbuf_build::descriptor::{
    CodeGeneratorRequest, CodeGeneratorResponse, DescriptorProto, EnumDescriptorProto,
    EnumValueDescriptorProto, FileDescriptorProto,
};

fn run_plugin(request: &CodeGeneratorRequest) -> CodeGeneratorResponse {
    let mut child = Command::new(env!("CARGO_BIN_EXE_protoc-gen-tightbuf"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to start plugin");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(&request.to_vec())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    CodeGeneratorResponse::parse_from(&output.stdout).expect("malformed response")
}

fn file(name: &str, enum_values: Vec<EnumValueDescriptorProto>) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_string()),
        package: Some("plug".to_string()),
        message_type: vec![DescriptorProto {
            name: Some("Empty".to_string()),
            ..Default::default()
        }],
        enum_type: vec![EnumDescriptorProto {
            name: Some("Level".to_string()),
            value: enum_values,
        }],
        ..Default::default()
    }
}

#[test]
fn test_plugin_stdin_stdout() {
    let request = CodeGeneratorRequest {
        file_to_generate: vec!["plug.proto".to_string()],
        parameter: Some("indent=tab".to_string()),
        proto_file: vec![file(
            "plug.proto",
            vec![EnumValueDescriptorProto {
                name: Some("LOW".to_string()),
                number: Some(0),
            }],
        )],
    };

    let response = run_plugin(&request);
    assert_eq!(response.error, None);
    let plug = response
        .file
        .iter()
        .find(|f| f.name.as_deref() == Some("plug.rs"))
        .expect("plug.rs missing");
    let content = plug.content.as_deref().unwrap();
    assert!(content.contains("pub struct Empty"));
    assert!(content.contains("\n\tLow = 0,"));
}

#[test]
fn test_plugin_reports_errors_in_response() {
    let request = CodeGeneratorRequest {
        file_to_generate: vec!["plug.proto".to_string()],
        parameter: None,
        proto_file: vec![file("plug.proto", vec![])],
    };

    let response = run_plugin(&request);
    assert!(response.file.is_empty());
    assert!(response.error.unwrap().contains("enum declares no values"));
}
