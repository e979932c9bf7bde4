//! Type mapping from protobuf scalar types to Rust types and runtime calls.

use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};
use tightbuf::wire::{FIXED32_SIZE, FIXED64_SIZE};
use tightbuf::WireType;

use crate::descriptor::Type;

/// A numeric or boolean protobuf type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    Uint32,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
}

impl ScalarType {
    pub fn from_proto(proto_type: Type) -> Option<Self> {
        let scalar = match proto_type {
            Type::Double => ScalarType::Double,
            Type::Float => ScalarType::Float,
            Type::Int64 => ScalarType::Int64,
            Type::Uint64 => ScalarType::Uint64,
            Type::Int32 => ScalarType::Int32,
            Type::Fixed64 => ScalarType::Fixed64,
            Type::Fixed32 => ScalarType::Fixed32,
            Type::Bool => ScalarType::Bool,
            Type::Uint32 => ScalarType::Uint32,
            Type::Sfixed32 => ScalarType::Sfixed32,
            Type::Sfixed64 => ScalarType::Sfixed64,
            Type::Sint32 => ScalarType::Sint32,
            Type::Sint64 => ScalarType::Sint64,
            Type::String | Type::Bytes | Type::Message | Type::Group | Type::Enum => return None,
        };
        Some(scalar)
    }

    /// Lowercase proto name, which is also the suffix of the runtime's
    /// `read_*` / `write_*_no_tag` functions.
    pub fn proto_name(self) -> &'static str {
        match self {
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Int64 => "int64",
            ScalarType::Uint64 => "uint64",
            ScalarType::Int32 => "int32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Bool => "bool",
            ScalarType::Uint32 => "uint32",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
        }
    }

    pub fn rust_type(self) -> TokenStream {
        match self {
            ScalarType::Double => quote!(f64),
            ScalarType::Float => quote!(f32),
            ScalarType::Int64 | ScalarType::Sfixed64 | ScalarType::Sint64 => quote!(i64),
            ScalarType::Uint64 | ScalarType::Fixed64 => quote!(u64),
            ScalarType::Int32 | ScalarType::Sfixed32 | ScalarType::Sint32 => quote!(i32),
            ScalarType::Uint32 | ScalarType::Fixed32 => quote!(u32),
            ScalarType::Bool => quote!(bool),
        }
    }

    pub fn wire_type(self) -> WireType {
        match self.fixed_size() {
            Some(FIXED64_SIZE) => WireType::I64,
            Some(_) => WireType::I32,
            None => WireType::Varint,
        }
    }

    /// Encoded width of fixed-width types; `None` for varints.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            ScalarType::Double | ScalarType::Fixed64 | ScalarType::Sfixed64 => Some(FIXED64_SIZE),
            ScalarType::Float | ScalarType::Fixed32 | ScalarType::Sfixed32 => Some(FIXED32_SIZE),
            _ => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::Double | ScalarType::Float)
    }

    pub fn read_fn(self) -> Ident {
        format_ident!("read_{}", self.proto_name())
    }

    pub fn write_fn(self) -> Ident {
        format_ident!("write_{}_no_tag", self.proto_name())
    }

    /// The runtime's size function. Fixed-width types share the generic
    /// `compute_fixed{32,64}_size_no_tag`.
    pub fn size_fn(self) -> Ident {
        match self.fixed_size() {
            Some(FIXED64_SIZE) => format_ident!("compute_fixed64_size_no_tag"),
            Some(_) => format_ident!("compute_fixed32_size_no_tag"),
            None => format_ident!("compute_{}_size_no_tag", self.proto_name()),
        }
    }

    pub fn zero_value(self) -> TokenStream {
        match self {
            ScalarType::Double => quote!(0.0f64),
            ScalarType::Float => quote!(0.0f32),
            ScalarType::Bool => quote!(false),
            _ => quote!(0),
        }
    }
}
