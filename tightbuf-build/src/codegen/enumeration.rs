//! Enum code generation.

use std::collections::HashMap;

use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};

use crate::context::{to_pascal_case, to_rust_type_name};
use crate::descriptor::EnumDescriptorProto;
use crate::Error;

/// Generate a Rust enum for a proto enum.
///
/// Values sharing a number with an earlier value become associated constants
/// aliasing the first one.
pub fn generate_enum(enum_type: &EnumDescriptorProto) -> Result<TokenStream, Error> {
    let name = enum_type.name.as_deref().ok_or(Error::MissingName)?;
    let enum_name = format_ident!("{}", to_rust_type_name(name));

    let mut variants = Vec::new();
    let mut aliases = Vec::new();
    let mut by_number = HashMap::new();

    for value in &enum_type.value {
        let value_name = value.name.as_deref().ok_or(Error::MissingName)?;
        let number = value
            .number
            .ok_or_else(|| Error::MissingFieldNumber(value_name.to_string()))?;
        let ident = format_ident!("{}", to_pascal_case(value_name));

        match by_number.get(&number) {
            Some(primary) => {
                let alias = format_ident!("{}", value_name);
                aliases.push(quote! {
                    pub const #alias: Self = Self::#primary;
                });
            }
            None => {
                by_number.insert(number, ident.clone());
                variants.push((ident, number));
            }
        }
    }

    // Default: the zero value, else the first declared.
    let default_variant = variants
        .iter()
        .find(|(_, number)| *number == 0)
        .or_else(|| variants.first())
        .map(|(ident, _)| ident)
        .ok_or_else(|| Error::UnhandledSchemaConstruct {
            message: name.to_string(),
            field: String::new(),
            reason: "enum declares no values".to_string(),
        })?;

    let declarations = variants.iter().map(|(ident, number)| {
        let number = Literal::i32_unsuffixed(*number);
        quote!(#ident = #number)
    });
    let from_arms = variants.iter().map(|(ident, number)| {
        let number = Literal::i32_unsuffixed(*number);
        quote!(#number => ::core::option::Option::Some(Self::#ident))
    });

    let alias_impl = if aliases.is_empty() {
        TokenStream::new()
    } else {
        quote! {
            #[allow(non_upper_case_globals)]
            impl #enum_name {
                #(#aliases)*
            }
        }
    };

    tracing::debug!(name, values = variants.len(), aliases = aliases.len(), "generated enum");

    Ok(quote! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum #enum_name {
            #(#declarations),*
        }

        #alias_impl

        impl ::tightbuf::ProtoEnum for #enum_name {
            fn from_i32(value: i32) -> ::core::option::Option<Self> {
                match value {
                    #(#from_arms,)*
                    _ => ::core::option::Option::None,
                }
            }

            #[inline]
            fn value(self) -> i32 {
                self as i32
            }
        }

        impl ::core::default::Default for #enum_name {
            fn default() -> Self {
                Self::#default_variant
            }
        }

        impl ::core::convert::From<#enum_name> for i32 {
            fn from(value: #enum_name) -> Self {
                value as i32
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::EnumValueDescriptorProto;

    fn value(name: &str, number: i32) -> EnumValueDescriptorProto {
        EnumValueDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
        }
    }

    fn render(enum_type: &EnumDescriptorProto) -> String {
        let tokens = generate_enum(enum_type).unwrap();
        prettyplease::unparse(&syn::parse2(tokens).unwrap())
    }

    #[test]
    fn test_default_prefers_zero() {
        let code = render(&EnumDescriptorProto {
            name: Some("Status".to_string()),
            value: vec![value("ACTIVE", 1), value("UNKNOWN", 0)],
        });
        assert!(code.contains("Active = 1"));
        assert!(code.contains("Unknown = 0"));
        assert!(code.contains("Self::Unknown\n"));
        assert!(code.contains("impl ::tightbuf::ProtoEnum for Status"));
    }

    #[test]
    fn test_aliases_become_constants() {
        let code = render(&EnumDescriptorProto {
            name: Some("Mode".to_string()),
            value: vec![value("FAST", 1), value("QUICK", 1), value("SLOW", 2)],
        });
        assert!(code.contains("pub const QUICK: Self = Self::Fast;"));
        assert!(!code.contains("Quick = 1"));
    }

    #[test]
    fn test_empty_enum_is_rejected() {
        let err = generate_enum(&EnumDescriptorProto {
            name: Some("Nothing".to_string()),
            value: vec![],
        })
        .unwrap_err();
        assert!(matches!(err, Error::UnhandledSchemaConstruct { .. }));
    }
}
