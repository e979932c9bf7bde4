//! Descriptor types for protobuf FileDescriptorSet and the protoc plugin
//! protocol.
//!
//! These types mirror google/protobuf/descriptor.proto and
//! google/protobuf/compiler/plugin.proto, keeping only the fields the
//! generator reads. They are decoded and encoded with the `tightbuf` runtime
//! itself; fields not listed here are skipped.

use bytes::BufMut;
use tightbuf::sink;
use tightbuf::wire::{make_tag, tag_field_number, tag_wire_type, WireType};
use tightbuf::{DecodeError, ProtoMessage, ProtoSource};

/// Defines a descriptor struct and its `ProtoMessage` impl from a field list.
///
/// Field kinds: `string`, `int32`, `bool`, `uint64` (stored as `Option<_>`),
/// `repeated_string`, `message<T>` (stored as `Option<T>`) and
/// `repeated_message<T>` (stored as `Vec<T>`).
macro_rules! descriptor_message {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $field:ident : $kind:ident $(<$inner:ty>)? = $number:literal,
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            $(
                $(#[$fmeta])*
                pub $field: descriptor_message!(@ty $kind $(<$inner>)?),
            )*
        }

        impl ProtoMessage for $name {
            fn merge_from(&mut self, input: &mut ProtoSource<'_>) -> Result<(), DecodeError> {
                loop {
                    let tag = input.read_tag()?;
                    if tag == 0 {
                        return Ok(());
                    }
                    match (tag_field_number(tag), tag_wire_type(tag)?) {
                        $(
                            ($number, descriptor_message!(@wire $kind)) => {
                                descriptor_message!(@read self, input, $field, $kind $(<$inner>)?);
                            }
                        )*
                        _ => {
                            if !input.skip_field(tag)? {
                                return Ok(());
                            }
                        }
                    }
                }
            }

            fn write_to<B: BufMut>(&self, buf: &mut B) {
                $(
                    descriptor_message!(@write self, buf, $field, $number, $kind $(<$inner>)?);
                )*
            }

            fn encoded_len(&self) -> usize {
                0 $( + descriptor_message!(@len self, $field, $number, $kind $(<$inner>)?) )*
            }

            fn clear(&mut self) {
                *self = Self::default();
            }
        }
    };

    (@ty string) => { Option<String> };
    (@ty int32) => { Option<i32> };
    (@ty bool) => { Option<bool> };
    (@ty uint64) => { Option<u64> };
    (@ty repeated_string) => { Vec<String> };
    (@ty message<$t:ty>) => { Option<$t> };
    (@ty repeated_message<$t:ty>) => { Vec<$t> };

    (@wire int32) => { WireType::Varint };
    (@wire bool) => { WireType::Varint };
    (@wire uint64) => { WireType::Varint };
    (@wire $other:ident) => { WireType::Len };

    (@read $s:ident, $input:ident, $field:ident, string) => {
        $s.$field = Some($input.read_string()?.to_owned())
    };
    (@read $s:ident, $input:ident, $field:ident, int32) => {
        $s.$field = Some($input.read_int32()?)
    };
    (@read $s:ident, $input:ident, $field:ident, bool) => {
        $s.$field = Some($input.read_bool()?)
    };
    (@read $s:ident, $input:ident, $field:ident, uint64) => {
        $s.$field = Some($input.read_uint64()?)
    };
    (@read $s:ident, $input:ident, $field:ident, repeated_string) => {
        $s.$field.push($input.read_string()?.to_owned())
    };
    (@read $s:ident, $input:ident, $field:ident, message<$t:ty>) => {
        $input.read_message($s.$field.get_or_insert_with(Default::default))?
    };
    (@read $s:ident, $input:ident, $field:ident, repeated_message<$t:ty>) => {{
        let mut msg = <$t>::default();
        $input.read_message(&mut msg)?;
        $s.$field.push(msg);
    }};

    (@write $s:ident, $buf:ident, $field:ident, $number:literal, string) => {
        if let Some(value) = &$s.$field {
            sink::write_tag($buf, make_tag($number, WireType::Len));
            sink::write_string_no_tag($buf, value);
        }
    };
    (@write $s:ident, $buf:ident, $field:ident, $number:literal, int32) => {
        if let Some(value) = $s.$field {
            sink::write_tag($buf, make_tag($number, WireType::Varint));
            sink::write_int32_no_tag($buf, value);
        }
    };
    (@write $s:ident, $buf:ident, $field:ident, $number:literal, bool) => {
        if let Some(value) = $s.$field {
            sink::write_tag($buf, make_tag($number, WireType::Varint));
            sink::write_bool_no_tag($buf, value);
        }
    };
    (@write $s:ident, $buf:ident, $field:ident, $number:literal, uint64) => {
        if let Some(value) = $s.$field {
            sink::write_tag($buf, make_tag($number, WireType::Varint));
            sink::write_uint64_no_tag($buf, value);
        }
    };
    (@write $s:ident, $buf:ident, $field:ident, $number:literal, repeated_string) => {
        for value in &$s.$field {
            sink::write_tag($buf, make_tag($number, WireType::Len));
            sink::write_string_no_tag($buf, value);
        }
    };
    (@write $s:ident, $buf:ident, $field:ident, $number:literal, message<$t:ty>) => {
        if let Some(value) = &$s.$field {
            sink::write_tag($buf, make_tag($number, WireType::Len));
            sink::write_message_no_tag($buf, value);
        }
    };
    (@write $s:ident, $buf:ident, $field:ident, $number:literal, repeated_message<$t:ty>) => {
        for value in &$s.$field {
            sink::write_tag($buf, make_tag($number, WireType::Len));
            sink::write_message_no_tag($buf, value);
        }
    };

    (@len $s:ident, $field:ident, $number:literal, string) => {
        $s.$field.as_deref().map_or(0, |value| {
            sink::compute_tag_size(make_tag($number, WireType::Len))
                + sink::compute_string_size_no_tag(value)
        })
    };
    (@len $s:ident, $field:ident, $number:literal, int32) => {
        $s.$field.map_or(0, |value| {
            sink::compute_tag_size(make_tag($number, WireType::Varint))
                + sink::compute_int32_size_no_tag(value)
        })
    };
    (@len $s:ident, $field:ident, $number:literal, bool) => {
        $s.$field.map_or(0, |value| {
            sink::compute_tag_size(make_tag($number, WireType::Varint))
                + sink::compute_bool_size_no_tag(value)
        })
    };
    (@len $s:ident, $field:ident, $number:literal, uint64) => {
        $s.$field.map_or(0, |value| {
            sink::compute_tag_size(make_tag($number, WireType::Varint))
                + sink::compute_uint64_size_no_tag(value)
        })
    };
    (@len $s:ident, $field:ident, $number:literal, repeated_string) => {
        $s.$field
            .iter()
            .map(|value| {
                sink::compute_tag_size(make_tag($number, WireType::Len))
                    + sink::compute_string_size_no_tag(value)
            })
            .sum::<usize>()
    };
    (@len $s:ident, $field:ident, $number:literal, message<$t:ty>) => {
        $s.$field.as_ref().map_or(0, |value| {
            sink::compute_tag_size(make_tag($number, WireType::Len))
                + sink::compute_message_size_no_tag(value)
        })
    };
    (@len $s:ident, $field:ident, $number:literal, repeated_message<$t:ty>) => {
        $s.$field
            .iter()
            .map(|value| {
                sink::compute_tag_size(make_tag($number, WireType::Len))
                    + sink::compute_message_size_no_tag(value)
            })
            .sum::<usize>()
    };
}

descriptor_message! {
    /// What `protoc --descriptor_set_out` writes.
    pub struct FileDescriptorSet {
        file: repeated_message<FileDescriptorProto> = 1,
    }
}

descriptor_message! {
    /// One `.proto` file.
    pub struct FileDescriptorProto {
        /// Path relative to the include root it was found under.
        name: string = 1,
        package: string = 2,
        dependency: repeated_string = 3,
        message_type: repeated_message<DescriptorProto> = 4,
        enum_type: repeated_message<EnumDescriptorProto> = 5,
        /// "proto2", "proto3", or unset (proto2).
        syntax: string = 12,
    }
}

descriptor_message! {
    pub struct DescriptorProto {
        name: string = 1,
        field: repeated_message<FieldDescriptorProto> = 2,
        nested_type: repeated_message<DescriptorProto> = 3,
        enum_type: repeated_message<EnumDescriptorProto> = 4,
        options: message<MessageOptions> = 7,
        oneof_decl: repeated_message<OneofDescriptorProto> = 8,
    }
}

descriptor_message! {
    pub struct FieldDescriptorProto {
        name: string = 1,
        number: int32 = 3,
        label: int32 = 4,
        r#type: int32 = 5,
        /// Fully qualified, with a leading dot, for message/enum/group fields.
        type_name: string = 6,
        /// The default value as text; bytes values are C-escaped.
        default_value: string = 7,
        options: message<FieldOptions> = 8,
        /// Index into the parent's `oneof_decl`.
        oneof_index: int32 = 9,
        json_name: string = 10,
        /// If true, this is a proto3 optional field backed by a synthetic oneof.
        proto3_optional: bool = 17,
    }
}

descriptor_message! {
    pub struct OneofDescriptorProto {
        name: string = 1,
    }
}

descriptor_message! {
    pub struct EnumDescriptorProto {
        name: string = 1,
        value: repeated_message<EnumValueDescriptorProto> = 2,
    }
}

descriptor_message! {
    pub struct EnumValueDescriptorProto {
        name: string = 1,
        number: int32 = 2,
    }
}

descriptor_message! {
    pub struct MessageOptions {
        /// Set on the entry messages protoc synthesizes for `map<K, V>` fields.
        map_entry: bool = 7,
    }
}

descriptor_message! {
    pub struct FieldOptions {
        packed: bool = 2,
    }
}

descriptor_message! {
    /// Request sent by protoc to a plugin on stdin.
    /// Corresponds to google.protobuf.compiler.CodeGeneratorRequest.
    pub struct CodeGeneratorRequest {
        /// Files named on the protoc command line. Code is generated only for these.
        file_to_generate: repeated_string = 1,
        /// The plugin parameter passed with `--tightbuf_opt`.
        parameter: string = 2,
        /// Every file in `file_to_generate` and everything it imports, in
        /// topological order.
        proto_file: repeated_message<FileDescriptorProto> = 15,
    }
}

descriptor_message! {
    /// Response written by a plugin to stdout.
    /// Corresponds to google.protobuf.compiler.CodeGeneratorResponse.
    pub struct CodeGeneratorResponse {
        /// Set when generation failed; protoc reports it and writes nothing.
        error: string = 1,
        supported_features: uint64 = 2,
        file: repeated_message<CodeGeneratorResponseFile> = 15,
    }
}

descriptor_message! {
    /// Corresponds to google.protobuf.compiler.CodeGeneratorResponse.File.
    pub struct CodeGeneratorResponseFile {
        name: string = 1,
        insertion_point: string = 2,
        content: string = 15,
    }
}

/// `CodeGeneratorResponse.Feature.FEATURE_PROTO3_OPTIONAL`.
pub const FEATURE_PROTO3_OPTIONAL: u64 = 1;

impl FieldDescriptorProto {
    /// Missing or unrecognized labels read as `Optional`.
    pub fn label(&self) -> Label {
        self.label.and_then(Label::from_i32).unwrap_or(Label::Optional)
    }

    pub fn field_type(&self) -> Option<Type> {
        self.r#type.and_then(Type::from_i32)
    }

    /// The explicit `[packed = ...]` option, if any.
    pub fn packed_option(&self) -> Option<bool> {
        self.options.as_ref().and_then(|o| o.packed)
    }

    /// The oneof this field belongs to, ignoring the synthetic oneofs protoc
    /// creates for proto3 `optional` fields.
    pub fn real_oneof_index(&self) -> Option<usize> {
        if self.proto3_optional.unwrap_or(false) {
            return None;
        }
        self.oneof_index.and_then(|i| usize::try_from(i).ok())
    }
}

impl DescriptorProto {
    pub fn is_map_entry(&self) -> bool {
        self.options.as_ref().and_then(|o| o.map_entry).unwrap_or(false)
    }
}

impl FileDescriptorProto {
    pub fn is_proto3(&self) -> bool {
        self.syntax.as_deref() == Some("proto3")
    }
}

/// `FieldDescriptorProto.Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Type {
    Double = 1,
    Float = 2,
    Int64 = 3,
    Uint64 = 4,
    Int32 = 5,
    Fixed64 = 6,
    Fixed32 = 7,
    Bool = 8,
    String = 9,
    Group = 10,
    Message = 11,
    Bytes = 12,
    Uint32 = 13,
    Enum = 14,
    Sfixed32 = 15,
    Sfixed64 = 16,
    Sint32 = 17,
    Sint64 = 18,
}

impl Type {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Double),
            2 => Some(Self::Float),
            3 => Some(Self::Int64),
            4 => Some(Self::Uint64),
            5 => Some(Self::Int32),
            6 => Some(Self::Fixed64),
            7 => Some(Self::Fixed32),
            8 => Some(Self::Bool),
            9 => Some(Self::String),
            10 => Some(Self::Group),
            11 => Some(Self::Message),
            12 => Some(Self::Bytes),
            13 => Some(Self::Uint32),
            14 => Some(Self::Enum),
            15 => Some(Self::Sfixed32),
            16 => Some(Self::Sfixed64),
            17 => Some(Self::Sint32),
            18 => Some(Self::Sint64),
            _ => None,
        }
    }
}

/// `FieldDescriptorProto.Label`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Label {
    Optional = 1,
    Required = 2,
    Repeated = 3,
}

impl Label {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Optional),
            2 => Some(Self::Required),
            3 => Some(Self::Repeated),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_field_descriptor() {
        // name: "id", number: 1, label: OPTIONAL, type: INT32, json_name: "id"
        let bytes = [
            0x0A, 0x02, b'i', b'd', 0x18, 0x01, 0x20, 0x01, 0x28, 0x05, 0x52, 0x02, b'i', b'd',
        ];
        let field = FieldDescriptorProto::parse_from(&bytes).unwrap();
        assert_eq!(field.name.as_deref(), Some("id"));
        assert_eq!(field.number, Some(1));
        assert_eq!(field.label(), Label::Optional);
        assert_eq!(field.field_type(), Some(Type::Int32));
        assert_eq!(field.json_name.as_deref(), Some("id"));
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        // name: "E", options (field 3, ignored): { 0x08 0x01 }, value: { name: "A", number: 0 }
        let bytes = [
            0x0A, 0x01, b'E', 0x1A, 0x02, 0x08, 0x01, 0x12, 0x05, 0x0A, 0x01, b'A', 0x10, 0x00,
        ];
        let enumeration = EnumDescriptorProto::parse_from(&bytes).unwrap();
        assert_eq!(enumeration.name.as_deref(), Some("E"));
        assert_eq!(enumeration.value.len(), 1);
        assert_eq!(enumeration.value[0].number, Some(0));
    }

    #[test]
    fn test_wrong_wire_type_is_skipped() {
        // number (3) sent as a length-delimited field.
        let bytes = [0x1A, 0x01, 0x07, 0x18, 0x04];
        let field = FieldDescriptorProto::parse_from(&bytes).unwrap();
        assert_eq!(field.number, Some(4));
    }

    #[test]
    fn test_request_roundtrip() {
        let request = CodeGeneratorRequest {
            file_to_generate: vec!["a.proto".to_string()],
            parameter: Some("indent=2".to_string()),
            proto_file: vec![FileDescriptorProto {
                name: Some("a.proto".to_string()),
                package: Some("a".to_string()),
                message_type: vec![DescriptorProto {
                    name: Some("M".to_string()),
                    field: vec![FieldDescriptorProto {
                        name: Some("x".to_string()),
                        number: Some(1),
                        r#type: Some(Type::Sint64 as i32),
                        options: Some(FieldOptions { packed: Some(true) }),
                        proto3_optional: Some(true),
                        ..Default::default()
                    }],
                    options: Some(MessageOptions {
                        map_entry: Some(false),
                    }),
                    ..Default::default()
                }],
                syntax: Some("proto3".to_string()),
                ..Default::default()
            }],
        };

        let bytes = request.to_vec();
        assert_eq!(bytes.len(), request.encoded_len());
        assert_eq!(CodeGeneratorRequest::parse_from(&bytes).unwrap(), request);
    }

    #[test]
    fn test_truncated_descriptor_set() {
        // file: claims 4 bytes, only 1 follows.
        let bytes = [0x0A, 0x04, 0x0A];
        assert_eq!(
            FileDescriptorSet::parse_from(&bytes),
            Err(DecodeError::Truncated)
        );
    }

    #[test]
    fn test_real_oneof_index_ignores_synthetic() {
        let synthetic = FieldDescriptorProto {
            oneof_index: Some(0),
            proto3_optional: Some(true),
            ..Default::default()
        };
        assert_eq!(synthetic.real_oneof_index(), None);

        let member = FieldDescriptorProto {
            oneof_index: Some(1),
            ..Default::default()
        };
        assert_eq!(member.real_oneof_index(), Some(1));
    }
}
