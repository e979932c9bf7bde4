//! Declared default values (`[default = ...]`).

use proc_macro2::{Literal, TokenStream};
use quote::{quote, ToTokens};

use crate::context::GenerationContext;
use crate::descriptor::FieldDescriptorProto;
use crate::Error;

use super::classify::Category;
use super::types::ScalarType;

#[derive(Debug, Clone)]
pub enum DefaultValue {
    /// An expression of the field's storage type. Enum defaults are the raw
    /// `i32` of the named value.
    Scalar(TokenStream),
    Str(String),
    Bytes(Vec<u8>),
}

/// Parse the declared default of `field`, if any.
pub fn parse_default(
    ctx: &GenerationContext,
    field: &FieldDescriptorProto,
    category: Category,
) -> Result<Option<DefaultValue>, Error> {
    let Some(text) = field.default_value.as_deref() else {
        return Ok(None);
    };
    let invalid = || Error::InvalidDefault {
        field: field.name.clone().unwrap_or_default(),
        value: text.to_string(),
    };

    let value = match category {
        Category::Scalar(scalar) => {
            DefaultValue::Scalar(scalar_default(scalar, text).ok_or_else(invalid)?)
        }
        Category::Enum => {
            let type_name = field.type_name.as_deref().unwrap_or_default();
            let number = ctx
                .enum_values(type_name)
                .and_then(|values| values.iter().find(|(name, _)| name == text))
                .map(|(_, number)| *number)
                .ok_or_else(invalid)?;
            DefaultValue::Scalar(Literal::i32_suffixed(number).into_token_stream())
        }
        Category::String => DefaultValue::Str(text.to_string()),
        Category::Bytes => DefaultValue::Bytes(unescape_c_bytes(text).ok_or_else(invalid)?),
        Category::Message | Category::Group => return Err(invalid()),
    };
    Ok(Some(value))
}

fn scalar_default(scalar: ScalarType, text: &str) -> Option<TokenStream> {
    let tokens = match scalar {
        ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => {
            Literal::i32_suffixed(text.parse().ok()?).into_token_stream()
        }
        ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => {
            Literal::i64_suffixed(text.parse().ok()?).into_token_stream()
        }
        ScalarType::Uint32 | ScalarType::Fixed32 => {
            Literal::u32_suffixed(text.parse().ok()?).into_token_stream()
        }
        ScalarType::Uint64 | ScalarType::Fixed64 => {
            Literal::u64_suffixed(text.parse().ok()?).into_token_stream()
        }
        ScalarType::Bool => match text {
            "true" => quote!(true),
            "false" => quote!(false),
            _ => return None,
        },
        ScalarType::Float => match text {
            "inf" => quote!(f32::INFINITY),
            "-inf" => quote!(f32::NEG_INFINITY),
            "nan" => quote!(f32::NAN),
            _ => {
                let value: f32 = text.parse().ok().filter(|v: &f32| v.is_finite())?;
                Literal::f32_suffixed(value).into_token_stream()
            }
        },
        ScalarType::Double => match text {
            "inf" => quote!(f64::INFINITY),
            "-inf" => quote!(f64::NEG_INFINITY),
            "nan" => quote!(f64::NAN),
            _ => {
                let value: f64 = text.parse().ok().filter(|v: &f64| v.is_finite())?;
                Literal::f64_suffixed(value).into_token_stream()
            }
        },
    };
    Some(tokens)
}

/// Undo the C-style escaping protoc applies to `bytes` defaults.
pub fn unescape_c_bytes(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut bytes = text.bytes().peekable();

    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let escaped = match bytes.next()? {
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0C,
            b'v' => 0x0B,
            b'?' => b'?',
            b'\\' => b'\\',
            b'\'' => b'\'',
            b'"' => b'"',
            b'x' | b'X' => {
                let mut value: u32 = 0;
                let mut digits = 0;
                while let Some(d) = bytes.peek().and_then(|c| char::from(*c).to_digit(16)) {
                    if digits == 2 {
                        break;
                    }
                    value = value * 16 + d;
                    digits += 1;
                    bytes.next();
                }
                if digits == 0 {
                    return None;
                }
                u8::try_from(value).ok()?
            }
            first @ b'0'..=b'7' => {
                let mut value = u32::from(first - b'0');
                for _ in 0..2 {
                    match bytes.peek() {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(*d - b'0');
                            bytes.next();
                        }
                        _ => break,
                    }
                }
                u8::try_from(value).ok()?
            }
            _ => return None,
        };
        out.push(escaped);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::descriptor::{
        EnumDescriptorProto, EnumValueDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    };

    #[test]
    fn test_unescape_c_bytes() {
        assert_eq!(unescape_c_bytes("abc").unwrap(), b"abc");
        assert_eq!(unescape_c_bytes(r"\000\001\377").unwrap(), [0, 1, 255]);
        assert_eq!(unescape_c_bytes(r#"\n\t\"\\"#).unwrap(), b"\n\t\"\\");
        assert_eq!(unescape_c_bytes(r"\x41\x7").unwrap(), b"A\x07");
        assert_eq!(unescape_c_bytes(r"\12z").unwrap(), b"\nz");
        assert!(unescape_c_bytes(r"\q").is_none());
        assert!(unescape_c_bytes("trailing\\").is_none());
        assert!(unescape_c_bytes(r"\777").is_none());
    }

    #[test]
    fn test_scalar_defaults() {
        let render = |scalar, text| {
            scalar_default(scalar, text).map(|t| t.to_string().replace(' ', ""))
        };

        assert_eq!(render(ScalarType::Int32, "-42").as_deref(), Some("-42i32"));
        assert_eq!(
            render(ScalarType::Uint64, "18446744073709551615").as_deref(),
            Some("18446744073709551615u64")
        );
        assert_eq!(render(ScalarType::Bool, "true").as_deref(), Some("true"));
        assert_eq!(render(ScalarType::Double, "-inf").as_deref(), Some("f64::NEG_INFINITY"));
        assert_eq!(render(ScalarType::Float, "1.5").as_deref(), Some("1.5f32"));

        assert!(render(ScalarType::Int32, "99999999999").is_none());
        assert!(render(ScalarType::Uint32, "-1").is_none());
        assert!(render(ScalarType::Bool, "yes").is_none());
    }

    #[test]
    fn test_enum_default_resolves_by_name() {
        let fds = FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("e.proto".to_string()),
                package: Some("e".to_string()),
                enum_type: vec![EnumDescriptorProto {
                    name: Some("Color".to_string()),
                    value: vec![
                        EnumValueDescriptorProto {
                            name: Some("RED".to_string()),
                            number: Some(1),
                        },
                        EnumValueDescriptorProto {
                            name: Some("BLUE".to_string()),
                            number: Some(7),
                        },
                    ],
                }],
                ..Default::default()
            }],
        };
        let config = Config::new();
        let ctx = GenerationContext::new(&config, &fds);

        let mut field = FieldDescriptorProto {
            name: Some("color".to_string()),
            type_name: Some(".e.Color".to_string()),
            default_value: Some("BLUE".to_string()),
            ..Default::default()
        };
        let value = parse_default(&ctx, &field, Category::Enum).unwrap().unwrap();
        assert!(matches!(value, DefaultValue::Scalar(ref t) if t.to_string() == "7i32"));

        field.default_value = Some("GREEN".to_string());
        assert!(matches!(
            parse_default(&ctx, &field, Category::Enum),
            Err(Error::InvalidDefault { .. })
        ));
    }
}
