//! Message struct code generation.

use std::collections::HashMap;

use proc_macro2::{Literal, Span, TokenStream};
use quote::{format_ident, quote};

use crate::config::InputOrder;
use crate::context::{to_rust_module_name, to_rust_type_name, GenerationContext, Scope};
use crate::descriptor::DescriptorProto;
use crate::Error;

use super::bits::allocate;
use super::classify::{classify, Cardinality};
use super::enumeration::generate_enum;
use super::field::FieldGen;
use super::oneof::OneofGen;

/// Generate the struct for `message`, declared in `scope`, followed by a
/// module holding its nested types.
pub fn generate_message(
    ctx: &GenerationContext,
    scope: &Scope,
    message: &DescriptorProto,
    is_proto3: bool,
) -> Result<TokenStream, Error> {
    let name = message.name.as_deref().ok_or(Error::MissingName)?;
    let struct_name = format_ident!("{}", to_rust_type_name(name));
    let fqn = scope.qualify(name);

    let strategies = message
        .field
        .iter()
        .map(|field| classify(name, field, is_proto3))
        .collect::<Result<Vec<_>, _>>()?;
    let bits = allocate(&strategies, message.oneof_decl.len());
    let oneofs = OneofGen::collect(message, &bits)?;

    let mut fields = Vec::with_capacity(message.field.len());
    for ((descriptor, strategy), bit) in message.field.iter().zip(&strategies).zip(&bits.fields) {
        let oneof = match strategy.cardinality {
            Cardinality::Oneof { index } => oneofs
                .iter()
                .find(|o| o.index == index)
                .map(|o| o.reference.clone()),
            _ => None,
        };
        fields.push(FieldGen::new(ctx, scope, &fqn, descriptor, *strategy, *bit, oneof)?);
    }

    check_member_names(name, &fields, &oneofs)?;

    let mut ordered: Vec<&FieldGen<'_>> = fields.iter().collect();
    if ctx.config.input_order == InputOrder::AscendingNumber {
        ordered.sort_by_key(|field| field.number);
    }

    tracing::debug!(
        message = %fqn,
        fields = fields.len(),
        oneofs = oneofs.len(),
        has_words = bits.word_count,
        "generating message"
    );

    let word_count = Literal::usize_unsuffixed(bits.word_count);
    let (bits_storage, bits_init, bits_reset, bits_eq) = if bits.word_count > 0 {
        (
            quote!(has_bits: [u32; #word_count],),
            quote!(has_bits: [0; #word_count],),
            quote!(self.has_bits = [0; #word_count];),
            Some(quote!(self.has_bits == other.has_bits)),
        )
    } else {
        (TokenStream::new(), TokenStream::new(), TokenStream::new(), None)
    };

    let storage = fields.iter().map(|field| {
        let ident = &field.ident;
        let ty = field.storage_type();
        quote!(#ident: #ty,)
    });
    let inits = fields.iter().map(|field| {
        let ident = &field.ident;
        let init = field.default_init();
        quote!(#ident: #init,)
    });
    let oneof_storage = oneofs.iter().map(OneofGen::storage);
    let oneof_inits = oneofs.iter().map(OneofGen::default_init);

    let accessors = fields.iter().map(FieldGen::accessors);
    let oneof_methods = oneofs.iter().map(|oneof| {
        let members: Vec<_> = fields
            .iter()
            .filter(|f| f.strategy.cardinality == Cardinality::Oneof { index: oneof.index })
            .collect();
        oneof.methods(&members)
    });

    let eq_terms: Vec<TokenStream> = bits_eq
        .into_iter()
        .chain(oneofs.iter().map(|oneof| {
            let case = &oneof.reference.case;
            quote!(self.#case == other.#case)
        }))
        .chain(fields.iter().map(FieldGen::eq_expr))
        .collect();
    let mut eq_terms = eq_terms.into_iter();
    let eq_fn = match eq_terms.next() {
        Some(first) => quote! {
            fn eq(&self, other: &Self) -> bool {
                #first #(&& #eq_terms)*
            }
        },
        None => quote! {
            fn eq(&self, _other: &Self) -> bool {
                true
            }
        },
    };

    let merge_body = if ctx.config.input_order == InputOrder::None || ordered.is_empty() {
        dispatch_loop(&ordered)
    } else {
        fallthrough_loop(&ordered)
    };

    let (write_fn, len_fn) = if ordered.is_empty() {
        (
            quote! {
                fn write_to<B: ::tightbuf::bytes::BufMut>(&self, _buf: &mut B) {}
            },
            quote! {
                fn encoded_len(&self) -> usize {
                    0
                }
            },
        )
    } else {
        let writes = ordered.iter().map(|field| field.write());
        let sizes = ordered.iter().map(|field| field.size());
        (
            quote! {
                fn write_to<B: ::tightbuf::bytes::BufMut>(&self, buf: &mut B) {
                    #(#writes)*
                }
            },
            quote! {
                fn encoded_len(&self) -> usize {
                    let mut len = 0;
                    #(#sizes)*
                    len
                }
            },
        )
    };

    let resets = fields.iter().map(FieldGen::reset);
    let case_resets = oneofs.iter().map(|oneof| {
        let case = &oneof.reference.case;
        quote!(self.#case = 0;)
    });

    let nested_scope = scope.nested(name);
    let mut nested = TokenStream::new();
    for enum_type in &message.enum_type {
        nested.extend(generate_enum(enum_type)?);
    }
    for nested_msg in &message.nested_type {
        nested.extend(generate_message(ctx, &nested_scope, nested_msg, is_proto3)?);
    }
    let nested_mod = if nested.is_empty() {
        TokenStream::new()
    } else {
        let mod_name = format_ident!("{}", to_rust_module_name(name));
        quote! {
            pub mod #mod_name {
                #nested
            }
        }
    };

    Ok(quote! {
        #[derive(Debug, Clone)]
        pub struct #struct_name {
            #bits_storage
            #(#storage)*
            #(#oneof_storage)*
        }

        impl ::core::default::Default for #struct_name {
            fn default() -> Self {
                Self {
                    #bits_init
                    #(#inits)*
                    #(#oneof_inits)*
                }
            }
        }

        impl #struct_name {
            pub fn new() -> Self {
                ::core::default::Default::default()
            }

            /// A shared instance with every field unset.
            pub fn default_instance() -> &'static #struct_name {
                static DEFAULT: ::std::sync::OnceLock<#struct_name> = ::std::sync::OnceLock::new();
                DEFAULT.get_or_init(#struct_name::new)
            }

            #(#accessors)*

            #(#oneof_methods)*
        }

        impl ::core::cmp::PartialEq for #struct_name {
            #eq_fn
        }

        impl ::tightbuf::ProtoMessage for #struct_name {
            fn merge_from(
                &mut self,
                input: &mut ::tightbuf::ProtoSource<'_>,
            ) -> ::core::result::Result<(), ::tightbuf::DecodeError> {
                #merge_body
            }

            #write_fn

            #len_fn

            fn clear(&mut self) {
                #bits_reset
                #(#case_resets)*
                #(#resets)*
            }
        }

        #nested_mod
    })
}

/// Members every generated message defines, directly or through
/// `ProtoMessage`, `Clone` and `PartialEq`.
const RESERVED_MEMBERS: &[&str] = &[
    "new",
    "default_instance",
    "has_bits",
    "merge_from",
    "merge_from_bytes",
    "parse_from",
    "write_to",
    "encoded_len",
    "to_vec",
    "clear",
    "clone",
    "eq",
    "ne",
];

/// Reject a message whose fields or oneofs would generate the same member
/// twice, or one of [`RESERVED_MEMBERS`].
fn check_member_names(
    message: &str,
    fields: &[FieldGen<'_>],
    oneofs: &[OneofGen],
) -> Result<(), Error> {
    let owners = fields
        .iter()
        .map(|field| (field.proto_name, field.member_names()))
        .chain(oneofs.iter().map(|oneof| (oneof.name(), oneof.member_names())));

    let mut taken: HashMap<String, &str> = HashMap::new();
    for (owner, names) in owners {
        for member in names {
            let reason = if RESERVED_MEMBERS.contains(&member.as_str()) {
                format!("generated member `{member}` is already defined on every message")
            } else if let Some(other) = taken.get(&member) {
                format!("generated member `{member}` is also generated for `{other}`")
            } else {
                taken.insert(member, owner);
                continue;
            };
            return Err(Error::UnhandledSchemaConstruct {
                message: message.to_string(),
                field: owner.to_string(),
                reason,
            });
        }
    }
    Ok(())
}

/// The arms shared by every merge loop: alternate encodings of packable
/// repeated fields, end of input, and unknown fields.
fn fallback_arms(fields: &[&FieldGen<'_>], continue_merge: &TokenStream) -> TokenStream {
    let alternates = fields.iter().filter_map(|field| {
        let tag = Literal::u32_unsuffixed(field.alternate_tag()?);
        let body = field.decode_alternate()?;
        Some(quote! {
            #tag => {
                #body
                #continue_merge
            }
        })
    });
    quote! {
        #(#alternates)*
        0 => return ::core::result::Result::Ok(()),
        _ => {
            if !input.skip_field(tag)? {
                return ::core::result::Result::Ok(());
            }
            tag = input.read_tag()?;
            #continue_merge
        }
    }
}

/// A tag-dispatch loop that re-enters the `match` after every field.
fn dispatch_loop(fields: &[&FieldGen<'_>]) -> TokenStream {
    let arms = fields.iter().map(|field| {
        let tag = Literal::u32_unsuffixed(field.primary_tag());
        let body = field.decode_primary();
        quote! {
            #tag => {
                #body
            }
        }
    });
    let fallback = fallback_arms(fields, &TokenStream::new());
    quote! {
        let mut tag = input.read_tag()?;
        loop {
            match tag {
                #(#arms)*
                #fallback
            }
        }
    }
}

/// A dispatch loop whose field bodies fall through to the next field in the
/// expected order while the next tag matches it.
///
/// Each field gets a labeled block; the `match` breaks out of the block of the
/// field it found, which runs that field and every following one for as long
/// as the incoming tags keep matching.
fn fallthrough_loop(fields: &[&FieldGen<'_>]) -> TokenStream {
    let labels: Vec<syn::Lifetime> = fields
        .iter()
        .map(|field| syn::Lifetime::new(&format!("'field_{}", field.number), Span::call_site()))
        .collect();
    let continue_merge = quote!(continue 'merge;);

    let entry_arms = fields.iter().zip(&labels).map(|(field, label)| {
        let tag = Literal::u32_unsuffixed(field.primary_tag());
        quote!(#tag => break #label,)
    });
    let fallback = fallback_arms(fields, &continue_merge);

    let mut chain = quote! {
        match tag {
            #(#entry_arms)*
            #fallback
        }
    };
    for (i, (field, label)) in fields.iter().zip(&labels).enumerate() {
        let body = field.decode_primary();
        let next = fields.get(i + 1).map(|next| {
            let next_tag = Literal::u32_unsuffixed(next.primary_tag());
            quote! {
                if tag != #next_tag {
                    #continue_merge
                }
            }
        });
        chain = quote! {
            #label: {
                #chain
            }
            #body
            #next
        };
    }

    quote! {
        let mut tag = input.read_tag()?;
        'merge: loop {
            #chain
        }
    }
}
