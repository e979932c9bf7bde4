//! Oneof groups: a case discriminant plus one shared presence bit.

use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};

use crate::context::to_rust_field_name;
use crate::descriptor::DescriptorProto;
use crate::Error;

use super::bits::{BitAllocation, PresenceBit};
use super::field::{bit_clear, bit_test, FieldGen, OneofRef};

/// A real (non-synthetic) oneof of a message.
#[derive(Debug, Clone)]
pub struct OneofGen {
    pub index: usize,
    /// Accessor base name, without any `r#`.
    base: String,
    pub bit: PresenceBit,
    pub reference: OneofRef,
}

impl OneofGen {
    /// Oneofs of `message` that have at least one member. Synthetic oneofs of
    /// proto3 `optional` fields never receive a bit and are skipped.
    pub fn collect(message: &DescriptorProto, bits: &BitAllocation) -> Result<Vec<Self>, Error> {
        let mut oneofs = Vec::new();
        for (index, decl) in message.oneof_decl.iter().enumerate() {
            let Some(bit) = bits.oneofs.get(index).copied().flatten() else {
                continue;
            };
            let name = decl.name.as_deref().ok_or(Error::MissingName)?;
            let base = to_rust_field_name(name).trim_start_matches("r#").to_string();
            oneofs.push(Self {
                index,
                reference: OneofRef {
                    case: format_ident!("{}_case", base),
                    clear: format_ident!("clear_{}", base),
                },
                base,
                bit,
            });
        }
        Ok(oneofs)
    }

    pub fn name(&self) -> &str {
        &self.base
    }

    /// Names of the discriminant field and the methods generated for it.
    pub fn member_names(&self) -> Vec<String> {
        let base = &self.base;
        vec![
            format!("{base}_case"),
            format!("has_{base}"),
            format!("clear_{base}"),
        ]
    }

    /// Storage for the case discriminant; 0 means no member is set.
    pub fn storage(&self) -> TokenStream {
        let case = &self.reference.case;
        quote!(#case: u32,)
    }

    pub fn default_init(&self) -> TokenStream {
        let case = &self.reference.case;
        quote!(#case: 0,)
    }

    /// Methods inspecting and clearing the oneof.
    pub fn methods(&self, members: &[&FieldGen<'_>]) -> TokenStream {
        let case = &self.reference.case;
        let clear = &self.reference.clear;
        let has = format_ident!("has_{}", self.base);
        let has_expr = bit_test(self.bit);
        let clear_bit = bit_clear(self.bit);

        let arms = members.iter().map(|member| {
            let number = Literal::u32_unsuffixed(member.number);
            let reset = member.reset();
            quote!(#number => { #reset })
        });

        quote! {
            /// Field number of the member that is set, or 0.
            #[inline]
            pub fn #case(&self) -> u32 {
                self.#case
            }

            #[inline]
            pub fn #has(&self) -> bool {
                #has_expr
            }

            /// Clear whichever member is set.
            pub fn #clear(&mut self) -> &mut Self {
                match self.#case {
                    #(#arms)*
                    _ => {}
                }
                self.#case = 0;
                #clear_bit
                self
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::bits::allocate;
    use crate::codegen::classify::{Cardinality, Category, Strategy};
    use crate::codegen::types::ScalarType;
    use crate::descriptor::OneofDescriptorProto;

    #[test]
    fn test_empty_oneofs_are_skipped() {
        let message = DescriptorProto {
            name: Some("M".to_string()),
            oneof_decl: vec![
                OneofDescriptorProto {
                    name: Some("_synthetic".to_string()),
                },
                OneofDescriptorProto {
                    name: Some("type".to_string()),
                },
            ],
            ..Default::default()
        };
        let strategies = [Strategy {
            cardinality: Cardinality::Oneof { index: 1 },
            category: Category::Scalar(ScalarType::Int32),
        }];
        let bits = allocate(&strategies, 2);

        let oneofs = OneofGen::collect(&message, &bits).unwrap();
        assert_eq!(oneofs.len(), 1);
        assert_eq!(oneofs[0].index, 1);
        assert_eq!(oneofs[0].reference.case.to_string(), "type_case");
        assert_eq!(oneofs[0].reference.clear.to_string(), "clear_type");
    }
}
