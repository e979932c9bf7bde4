//! Generates the conformance schema once per generator configuration.
//!
//! The schema is built as a descriptor set directly so the tests do not
//! depend on a local protoc.

use std::path::PathBuf;

use tightbuf_build::descriptor::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FieldOptions, FileDescriptorProto, FileDescriptorSet, Label, OneofDescriptorProto, Type,
};
use tightbuf_build::{Config, InputOrder};

fn field(name: &str, number: i32, label: Label, proto_type: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(proto_type as i32),
        ..Default::default()
    }
}

fn typed(mut field: FieldDescriptorProto, type_name: &str) -> FieldDescriptorProto {
    field.type_name = Some(type_name.to_string());
    field
}

fn with_default(mut field: FieldDescriptorProto, value: &str) -> FieldDescriptorProto {
    field.default_value = Some(value.to_string());
    field
}

fn packed(mut field: FieldDescriptorProto) -> FieldDescriptorProto {
    field.options = Some(FieldOptions { packed: Some(true) });
    field
}

fn in_oneof(mut field: FieldDescriptorProto, index: i32) -> FieldDescriptorProto {
    field.oneof_index = Some(index);
    field
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

fn color() -> EnumDescriptorProto {
    let value = |name: &str, number| EnumValueDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
    };
    EnumDescriptorProto {
        name: Some("Color".to_string()),
        value: vec![
            value("COLOR_UNKNOWN", 0),
            value("RED", 1),
            value("GREEN", 2),
            value("BLUE", 3),
        ],
    }
}

fn conformance_file() -> FileDescriptorProto {
    use Label::{Optional, Repeated};

    let scalars = message(
        "Scalars",
        vec![
            field("int32", 1, Optional, Type::Int32),
            field("int64", 2, Optional, Type::Int64),
            field("uint32", 3, Optional, Type::Uint32),
            field("uint64", 4, Optional, Type::Uint64),
            field("sint32", 5, Optional, Type::Sint32),
            field("sint64", 6, Optional, Type::Sint64),
            field("fixed32", 7, Optional, Type::Fixed32),
            field("fixed64", 8, Optional, Type::Fixed64),
            field("sfixed32", 9, Optional, Type::Sfixed32),
            field("sfixed64", 10, Optional, Type::Sfixed64),
            field("float", 11, Optional, Type::Float),
            field("double", 12, Optional, Type::Double),
            field("flag", 13, Optional, Type::Bool),
            field("text", 14, Optional, Type::String),
            field("data", 15, Optional, Type::Bytes),
            typed(field("color", 16, Optional, Type::Enum), ".conf.Color"),
        ],
    );

    let sample = message(
        "Sample",
        vec![
            field("id", 1, Optional, Type::Int32),
            packed(field("values", 2, Repeated, Type::Int32)),
            field("name", 3, Optional, Type::String),
        ],
    );

    let defaults = message(
        "Defaults",
        vec![
            with_default(field("count", 1, Optional, Type::Int32), "42"),
            with_default(field("label", 2, Optional, Type::String), "hi"),
            with_default(field("blob", 3, Optional, Type::Bytes), "\\001\\002"),
            with_default(
                typed(field("color", 4, Optional, Type::Enum), ".conf.Color"),
                "BLUE",
            ),
            with_default(field("ratio", 5, Optional, Type::Double), "inf"),
            with_default(field("flag", 6, Optional, Type::Bool), "true"),
        ],
    );

    let mut choice = message(
        "Choice",
        vec![
            in_oneof(field("number", 1, Optional, Type::Int32), 0),
            in_oneof(field("text", 2, Optional, Type::String), 0),
            in_oneof(typed(field("sample", 3, Optional, Type::Message), ".conf.Sample"), 0),
            field("after", 4, Optional, Type::Int32),
        ],
    );
    choice.oneof_decl = vec![OneofDescriptorProto {
        name: Some("pick".to_string()),
    }];

    let tree = message(
        "Tree",
        vec![
            typed(field("child", 1, Optional, Type::Message), ".conf.Tree"),
            field("value", 2, Optional, Type::Int32),
            typed(field("children", 3, Repeated, Type::Message), ".conf.Tree"),
        ],
    );

    let mut with_group = message(
        "WithGroup",
        vec![
            typed(field("inner", 1, Optional, Type::Group), ".conf.WithGroup.Inner"),
            typed(field("items", 3, Repeated, Type::Group), ".conf.WithGroup.Item"),
        ],
    );
    with_group.nested_type = vec![
        message("Inner", vec![field("x", 2, Optional, Type::Int32)]),
        message("Item", vec![field("y", 4, Optional, Type::Int32)]),
    ];

    let unpacked = message(
        "Unpacked",
        vec![
            field("values", 1, Repeated, Type::Int32),
            typed(field("colors", 2, Repeated, Type::Enum), ".conf.Color"),
            field("ratios", 3, Repeated, Type::Double),
        ],
    );

    let packed_message = message(
        "Packed",
        vec![
            packed(field("values", 1, Repeated, Type::Int32)),
            packed(typed(field("colors", 2, Repeated, Type::Enum), ".conf.Color")),
            packed(field("ratios", 3, Repeated, Type::Double)),
        ],
    );

    let floats = message(
        "Floats",
        vec![
            field("value", 1, Optional, Type::Double),
            field("values", 2, Repeated, Type::Float),
        ],
    );

    // Declared out of number order on purpose.
    let ordered = message(
        "Ordered",
        vec![
            field("c", 3, Optional, Type::Int32),
            field("a", 1, Optional, Type::Int32),
            field("b", 2, Optional, Type::String),
            field("d", 4, Repeated, Type::Sint64),
        ],
    );

    let lists = message(
        "Lists",
        vec![
            field("names", 1, Repeated, Type::String),
            field("blobs", 2, Repeated, Type::Bytes),
            typed(field("samples", 3, Repeated, Type::Message), ".conf.Sample"),
        ],
    );

    FileDescriptorProto {
        name: Some("conf.proto".to_string()),
        package: Some("conf".to_string()),
        syntax: Some("proto2".to_string()),
        message_type: vec![
            scalars,
            sample,
            defaults,
            choice,
            tree,
            with_group,
            unpacked,
            packed_message,
            floats,
            ordered,
            lists,
        ],
        enum_type: vec![color()],
        ..Default::default()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    let fds = FileDescriptorSet {
        file: vec![conformance_file()],
    };

    let variants = [
        ("declaration", InputOrder::Declaration, false),
        ("ascending", InputOrder::AscendingNumber, false),
        ("unordered", InputOrder::None, false),
        ("strict", InputOrder::Declaration, true),
    ];
    for (dir, order, strict) in variants {
        Config::new()
            .out_dir(out_dir.join(dir))
            .input_order(order)
            .enforce_has_checks(strict)
            .optional_accessors(!strict)
            .compile_fds(fds.clone())?;
    }
    Ok(())
}
