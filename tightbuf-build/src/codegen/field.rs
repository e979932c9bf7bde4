//! Per-field code generation: storage, accessors, and the decode, encode,
//! size, equality and clear fragments the message generator stitches together.

use proc_macro2::{Ident, Literal, Span, TokenStream};
use quote::{format_ident, quote};
use tightbuf::sink::compute_tag_size;
use tightbuf::wire::make_tag;
use tightbuf::WireType;

use crate::config::Config;
use crate::context::{to_rust_field_name, GenerationContext, Scope};
use crate::descriptor::FieldDescriptorProto;
use crate::Error;

use super::bits::PresenceBit;
use super::classify::{Cardinality, Category, Strategy};
use super::defaults::{parse_default, DefaultValue};

/// The oneof a field belongs to, as seen from one of its members.
#[derive(Debug, Clone)]
pub struct OneofRef {
    /// Storage field and accessor holding the active member's number.
    pub case: Ident,
    pub clear: Ident,
}

/// Everything needed to emit code for one field.
pub struct FieldGen<'a> {
    pub proto_name: &'a str,
    pub number: u32,
    pub strategy: Strategy,
    /// Storage field and getter name; may be a raw identifier.
    pub ident: Ident,
    /// `ident` without any `r#`, used to build accessor names.
    base: String,
    /// Scalar type, enum, message or group type path. Unused for strings and bytes.
    element: TokenStream,
    pub bit: Option<PresenceBit>,
    pub oneof: Option<OneofRef>,
    boxed: bool,
    default: Option<DefaultValue>,
    enforce_has_checks: bool,
    optional_accessors: bool,
}

impl<'a> FieldGen<'a> {
    pub fn new(
        ctx: &GenerationContext,
        scope: &Scope,
        message_fqn: &str,
        descriptor: &'a FieldDescriptorProto,
        strategy: Strategy,
        bit: Option<PresenceBit>,
        oneof: Option<OneofRef>,
    ) -> Result<Self, Error> {
        let proto_name = descriptor.name.as_deref().ok_or(Error::MissingName)?;
        let number = descriptor
            .number
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| Error::MissingFieldNumber(proto_name.to_string()))?;

        let rust_name = to_rust_field_name(proto_name);
        let ident = format_ident!("{}", rust_name);
        let base = rust_name.trim_start_matches("r#").to_string();

        let element = match strategy.category {
            Category::Scalar(scalar) => scalar.rust_type(),
            Category::String | Category::Bytes => TokenStream::new(),
            Category::Enum | Category::Message | Category::Group => {
                let type_name = descriptor.type_name.as_deref().unwrap_or_default();
                ctx.resolve_type(scope, type_name)?
            }
        };

        let boxed = strategy.category.is_message_like()
            && !matches!(strategy.cardinality, Cardinality::Repeated { .. })
            && ctx.is_recursive_field(message_fqn, proto_name);

        let default = parse_default(ctx, descriptor, strategy.category)?;
        let config: &Config = ctx.config;

        Ok(Self {
            proto_name,
            number,
            strategy,
            ident,
            base,
            element,
            bit,
            oneof,
            boxed,
            default,
            enforce_has_checks: config.enforce_has_checks,
            optional_accessors: config.optional_accessors,
        })
    }

    fn accessor(&self, prefix: &str, suffix: &str) -> Ident {
        format_ident!("{}{}{}", prefix, self.base, suffix)
    }

    pub fn has_ident(&self) -> Ident {
        self.accessor("has_", "")
    }

    fn is_repeated(&self) -> bool {
        matches!(self.strategy.cardinality, Cardinality::Repeated { .. })
    }

    /// Names of the storage field and every method generated for this field.
    pub fn member_names(&self) -> Vec<String> {
        let base = &self.base;
        let mut names = vec![
            base.clone(),
            format!("has_{base}"),
            format!("clear_{base}"),
        ];
        let category = self.strategy.category;
        if self.is_repeated() {
            names.push(format!("add_{base}"));
            names.push(format!("{base}_mut"));
            if matches!(category, Category::Scalar(_) | Category::Enum) {
                names.push(format!("set_{base}"));
            }
            return names;
        }

        names.push(format!("set_{base}"));
        match category {
            Category::Scalar(_) => {}
            Category::Enum => {
                names.push(format!("{base}_value"));
                names.push(format!("set_{base}_value"));
            }
            Category::String | Category::Bytes | Category::Message | Category::Group => {
                names.push(format!("{base}_mut"));
            }
        }
        if self.optional_accessors {
            names.push(format!("try_{base}"));
        }
        names
    }

    fn is_packed(&self) -> bool {
        matches!(self.strategy.cardinality, Cardinality::Repeated { packed: true })
    }

    fn field_number(&self) -> Literal {
        Literal::u32_unsuffixed(self.number)
    }

    /// Wire type of a single value of this field.
    fn element_wire_type(&self) -> WireType {
        match self.strategy.category {
            Category::Scalar(scalar) => scalar.wire_type(),
            Category::Enum => WireType::Varint,
            Category::String | Category::Bytes | Category::Message => WireType::Len,
            Category::Group => WireType::SGroup,
        }
    }

    /// The tag this field is written with.
    pub fn primary_tag(&self) -> u32 {
        if self.is_packed() {
            make_tag(self.number, WireType::Len)
        } else {
            make_tag(self.number, self.element_wire_type())
        }
    }

    /// The other encoding of a packable repeated field, also accepted on decode.
    pub fn alternate_tag(&self) -> Option<u32> {
        if !self.is_repeated() || !self.strategy.category.is_packable() {
            return None;
        }
        Some(if self.is_packed() {
            make_tag(self.number, self.element_wire_type())
        } else {
            make_tag(self.number, WireType::Len)
        })
    }

    fn tag_size(&self, tag: u32) -> Literal {
        Literal::usize_unsuffixed(compute_tag_size(tag))
    }

    /// Type of the struct field.
    pub fn storage_type(&self) -> TokenStream {
        let element = &self.element;
        let single = match self.strategy.category {
            Category::Scalar(_) => element.clone(),
            Category::Enum => quote!(i32),
            Category::String => quote!(::std::string::String),
            Category::Bytes => quote!(::tightbuf::ProtoBytes),
            Category::Message | Category::Group if self.boxed => {
                quote!(::core::option::Option<::std::boxed::Box<#element>>)
            }
            Category::Message | Category::Group => element.clone(),
        };
        match (self.strategy.cardinality, self.strategy.category) {
            (Cardinality::Repeated { .. }, Category::Enum) => {
                quote!(::tightbuf::RepeatedEnum<#element>)
            }
            (Cardinality::Repeated { .. }, _) => quote!(::tightbuf::RepeatedField<#single>),
            _ => single,
        }
    }

    /// Initializer used by `Default`.
    pub fn default_init(&self) -> TokenStream {
        if self.is_repeated() {
            return quote!(::core::default::Default::default());
        }
        match &self.default {
            Some(DefaultValue::Scalar(value)) => value.clone(),
            Some(DefaultValue::Str(value)) => quote!(::std::string::String::from(#value)),
            Some(DefaultValue::Bytes(value)) => {
                let value = Literal::byte_string(value);
                quote!(::tightbuf::ProtoBytes::from(#value.to_vec()))
            }
            None => quote!(::core::default::Default::default()),
        }
    }

    /// Statements restoring the declared default while keeping allocations.
    pub fn reset(&self) -> TokenStream {
        let ident = &self.ident;
        if self.is_repeated() {
            return quote!(self.#ident.clear(););
        }
        match self.strategy.category {
            Category::Scalar(scalar) => {
                let value = match &self.default {
                    Some(DefaultValue::Scalar(value)) => value.clone(),
                    _ => scalar.zero_value(),
                };
                quote!(self.#ident = #value;)
            }
            Category::Enum => {
                let value = match &self.default {
                    Some(DefaultValue::Scalar(value)) => value.clone(),
                    _ => quote!(0),
                };
                quote!(self.#ident = #value;)
            }
            Category::String => match &self.default {
                Some(DefaultValue::Str(value)) => {
                    quote! {
                        self.#ident.clear();
                        self.#ident.push_str(#value);
                    }
                }
                _ => quote!(self.#ident.clear();),
            },
            Category::Bytes => match &self.default {
                Some(DefaultValue::Bytes(value)) => {
                    let value = Literal::byte_string(value);
                    quote!(self.#ident.copy_from(#value);)
                }
                _ => quote!(self.#ident.clear();),
            },
            Category::Message | Category::Group if self.boxed => quote! {
                if let ::core::option::Option::Some(value) = self.#ident.as_deref_mut() {
                    ::tightbuf::ProtoMessage::clear(value);
                }
            },
            Category::Message | Category::Group => {
                quote!(::tightbuf::ProtoMessage::clear(&mut self.#ident);)
            }
        }
    }

    /// Boolean expression: is this field present on `self`?
    pub fn has_expr(&self) -> TokenStream {
        let ident = &self.ident;
        match (&self.oneof, self.bit) {
            (Some(oneof), _) => {
                let case = &oneof.case;
                let number = self.field_number();
                quote!(self.#case == #number)
            }
            (None, Some(bit)) => bit_test(bit),
            (None, None) => quote!(!self.#ident.is_empty()),
        }
    }

    /// Statements run before storing a value: a oneof member clears whichever
    /// sibling is active.
    fn prepare(&self) -> TokenStream {
        match &self.oneof {
            Some(oneof) => {
                let case = &oneof.case;
                let clear = &oneof.clear;
                let number = self.field_number();
                quote! {
                    if self.#case != #number {
                        self.#clear();
                    }
                }
            }
            None => TokenStream::new(),
        }
    }

    /// Statements run after storing a value.
    fn mark_present(&self) -> TokenStream {
        let set_bit = self.bit.map(bit_set).unwrap_or_default();
        match &self.oneof {
            Some(oneof) => {
                let case = &oneof.case;
                let number = self.field_number();
                quote! {
                    self.#case = #number;
                    #set_bit
                }
            }
            None => set_bit,
        }
    }

    /// Statements for `clear_<field>`.
    fn clear_presence(&self) -> TokenStream {
        let reset = self.reset();
        match (&self.oneof, self.bit) {
            (Some(oneof), _) => {
                let case = &oneof.case;
                let clear = &oneof.clear;
                let number = self.field_number();
                quote! {
                    if self.#case == #number {
                        self.#clear();
                    }
                }
            }
            (None, Some(bit)) => {
                let clear_bit = bit_clear(bit);
                quote! {
                    #clear_bit
                    #reset
                }
            }
            (None, None) => reset,
        }
    }

    fn has_check(&self) -> TokenStream {
        if !self.enforce_has_checks {
            return TokenStream::new();
        }
        let has = self.has_ident();
        let message = format!("field `{}` is not set", self.proto_name);
        quote!(assert!(self.#has(), #message);)
    }

    /// Public accessors for this field.
    pub fn accessors(&self) -> TokenStream {
        if self.is_repeated() {
            return self.repeated_accessors();
        }

        let ident = &self.ident;
        let element = &self.element;
        let has = self.has_ident();
        let set = self.accessor("set_", "");
        let clear = self.accessor("clear_", "");
        let get_mut = self.accessor("", "_mut");
        let try_get = self.accessor("try_", "");
        let has_expr = self.has_expr();
        let has_check = self.has_check();
        let prepare = self.prepare();
        let mark = self.mark_present();
        let clear_presence = self.clear_presence();

        let (getter, setter, get_mut_fn, try_type) = match self.strategy.category {
            Category::Scalar(_) => (
                quote! {
                    pub fn #ident(&self) -> #element {
                        #has_check
                        self.#ident
                    }
                },
                quote! {
                    pub fn #set(&mut self, value: #element) -> &mut Self {
                        #prepare
                        self.#ident = value;
                        #mark
                        self
                    }
                },
                TokenStream::new(),
                quote!(#element),
            ),
            Category::Enum => {
                let value_getter = self.accessor("", "_value");
                let set_value = self.accessor("set_", "_value");
                let fallback = match &self.default {
                    Some(DefaultValue::Scalar(value)) => quote! {
                        .unwrap_or_else(|| {
                            <#element as ::tightbuf::ProtoEnum>::from_i32(#value).unwrap_or_default()
                        })
                    },
                    _ => quote!(.unwrap_or_default()),
                };
                (
                    quote! {
                        pub fn #ident(&self) -> #element {
                            #has_check
                            <#element as ::tightbuf::ProtoEnum>::from_i32(self.#ident) #fallback
                        }

                        /// The raw value, including values this schema does not declare.
                        pub fn #value_getter(&self) -> i32 {
                            self.#ident
                        }
                    },
                    quote! {
                        pub fn #set(&mut self, value: #element) -> &mut Self {
                            self.#set_value(::tightbuf::ProtoEnum::value(value))
                        }

                        pub fn #set_value(&mut self, value: i32) -> &mut Self {
                            #prepare
                            self.#ident = value;
                            #mark
                            self
                        }
                    },
                    TokenStream::new(),
                    quote!(#element),
                )
            }
            Category::String => (
                quote! {
                    pub fn #ident(&self) -> &str {
                        #has_check
                        &self.#ident
                    }
                },
                quote! {
                    pub fn #set(&mut self, value: &str) -> &mut Self {
                        #prepare
                        self.#ident.clear();
                        self.#ident.push_str(value);
                        #mark
                        self
                    }
                },
                quote! {
                    pub fn #get_mut(&mut self) -> &mut ::std::string::String {
                        #prepare
                        #mark
                        &mut self.#ident
                    }
                },
                quote!(&str),
            ),
            Category::Bytes => (
                quote! {
                    pub fn #ident(&self) -> &[u8] {
                        #has_check
                        &self.#ident
                    }
                },
                quote! {
                    pub fn #set(&mut self, value: &[u8]) -> &mut Self {
                        #prepare
                        self.#ident.copy_from(value);
                        #mark
                        self
                    }
                },
                quote! {
                    pub fn #get_mut(&mut self) -> &mut ::tightbuf::ProtoBytes {
                        #prepare
                        #mark
                        &mut self.#ident
                    }
                },
                quote!(&[u8]),
            ),
            Category::Message | Category::Group if self.boxed => (
                quote! {
                    pub fn #ident(&self) -> &#element {
                        #has_check
                        self.#ident.as_deref().unwrap_or_else(|| #element::default_instance())
                    }
                },
                quote! {
                    pub fn #set(&mut self, value: #element) -> &mut Self {
                        #prepare
                        **self.#ident.get_or_insert_with(::core::default::Default::default) = value;
                        #mark
                        self
                    }
                },
                quote! {
                    pub fn #get_mut(&mut self) -> &mut #element {
                        #prepare
                        #mark
                        self.#ident.get_or_insert_with(::core::default::Default::default)
                    }
                },
                quote!(&#element),
            ),
            Category::Message | Category::Group => (
                quote! {
                    pub fn #ident(&self) -> &#element {
                        #has_check
                        &self.#ident
                    }
                },
                quote! {
                    pub fn #set(&mut self, value: #element) -> &mut Self {
                        #prepare
                        self.#ident = value;
                        #mark
                        self
                    }
                },
                quote! {
                    pub fn #get_mut(&mut self) -> &mut #element {
                        #prepare
                        #mark
                        &mut self.#ident
                    }
                },
                quote!(&#element),
            ),
        };

        let try_fn = if self.optional_accessors {
            quote! {
                pub fn #try_get(&self) -> ::core::option::Option<#try_type> {
                    if self.#has() {
                        ::core::option::Option::Some(self.#ident())
                    } else {
                        ::core::option::Option::None
                    }
                }
            }
        } else {
            TokenStream::new()
        };

        quote! {
            #[inline]
            pub fn #has(&self) -> bool {
                #has_expr
            }

            #getter

            #try_fn

            #setter

            #get_mut_fn

            pub fn #clear(&mut self) -> &mut Self {
                #clear_presence
                self
            }
        }
    }

    fn repeated_accessors(&self) -> TokenStream {
        let ident = &self.ident;
        let element = &self.element;
        let storage = self.storage_type();
        let has = self.has_ident();
        let add = self.accessor("add_", "");
        let set = self.accessor("set_", "");
        let clear = self.accessor("clear_", "");
        let get_mut = self.accessor("", "_mut");

        let mutators = match self.strategy.category {
            Category::Scalar(_) => quote! {
                pub fn #add(&mut self, value: #element) -> &mut Self {
                    self.#ident.add(value);
                    self
                }

                /// Replace every value.
                pub fn #set(&mut self, values: &[#element]) -> &mut Self {
                    self.#ident.copy_from(values);
                    self
                }
            },
            Category::Enum => quote! {
                pub fn #add(&mut self, value: #element) -> &mut Self {
                    self.#ident.add(value);
                    self
                }

                /// Replace every value.
                pub fn #set(&mut self, values: &[#element]) -> &mut Self {
                    self.#ident.clear();
                    for value in values {
                        self.#ident.add(*value);
                    }
                    self
                }
            },
            Category::String => quote! {
                pub fn #add(&mut self, value: &str) -> &mut Self {
                    self.#ident
                        .push_recycled(::std::string::String::clear)
                        .push_str(value);
                    self
                }
            },
            Category::Bytes => quote! {
                pub fn #add(&mut self, value: &[u8]) -> &mut Self {
                    self.#ident
                        .push_recycled(::tightbuf::ProtoBytes::clear)
                        .copy_from(value);
                    self
                }
            },
            Category::Message | Category::Group => quote! {
                pub fn #add(&mut self, value: #element) -> &mut Self {
                    self.#ident.add(value);
                    self
                }
            },
        };

        quote! {
            #[inline]
            pub fn #has(&self) -> bool {
                !self.#ident.is_empty()
            }

            pub fn #ident(&self) -> &#storage {
                &self.#ident
            }

            pub fn #get_mut(&mut self) -> &mut #storage {
                &mut self.#ident
            }

            #mutators

            pub fn #clear(&mut self) -> &mut Self {
                self.#ident.clear();
                self
            }
        }
    }

    /// Statements appending one decoded value to a repeated field.
    fn read_into_repeated(&self) -> TokenStream {
        let ident = &self.ident;
        match self.strategy.category {
            Category::Scalar(scalar) => {
                let read = scalar.read_fn();
                quote!(self.#ident.add(input.#read()?);)
            }
            Category::Enum => quote!(self.#ident.add_value(input.read_enum()?);),
            Category::String => quote! {
                input.read_string_into(self.#ident.push_recycled(::std::string::String::clear))?;
            },
            Category::Bytes => quote! {
                input.read_bytes_into(self.#ident.push_recycled(::tightbuf::ProtoBytes::clear))?;
            },
            Category::Message => quote! {
                input.read_message(self.#ident.push_recycled(::tightbuf::ProtoMessage::clear))?;
            },
            Category::Group => {
                let number = self.field_number();
                quote! {
                    input.read_group(
                        #number,
                        self.#ident.push_recycled(::tightbuf::ProtoMessage::clear),
                    )?;
                }
            }
        }
    }

    /// Statements decoding a singular value into storage.
    fn read_into_singular(&self) -> TokenStream {
        let ident = &self.ident;
        let target = if self.boxed {
            quote!(&mut **self.#ident.get_or_insert_with(::core::default::Default::default))
        } else {
            quote!(&mut self.#ident)
        };
        match self.strategy.category {
            Category::Scalar(scalar) => {
                let read = scalar.read_fn();
                quote!(self.#ident = input.#read()?;)
            }
            Category::Enum => quote!(self.#ident = input.read_enum()?;),
            Category::String => quote!(input.read_string_into(&mut self.#ident)?;),
            Category::Bytes => quote!(input.read_bytes_into(&mut self.#ident)?;),
            Category::Message => quote!(input.read_message(#target)?;),
            Category::Group => {
                let number = self.field_number();
                quote!(input.read_group(#number, #target)?;)
            }
        }
    }

    /// Decode statements for a value carrying [`FieldGen::primary_tag`].
    ///
    /// On entry the tag has been consumed; on exit `tag` holds the next tag.
    pub fn decode_primary(&self) -> TokenStream {
        if self.is_packed() {
            self.decode_packed()
        } else if self.is_repeated() {
            self.decode_interleaved(self.primary_tag())
        } else {
            self.decode_singular()
        }
    }

    /// Decode statements for a value carrying [`FieldGen::alternate_tag`].
    pub fn decode_alternate(&self) -> Option<TokenStream> {
        let tag = self.alternate_tag()?;
        Some(if self.is_packed() {
            self.decode_interleaved(tag)
        } else {
            self.decode_packed()
        })
    }

    fn decode_singular(&self) -> TokenStream {
        let ident = &self.ident;
        let prepare = self.prepare();
        let mark = self.mark_present();

        if self.strategy.category == Category::Enum && self.default.is_none() {
            // Unknown values leave the field untouched.
            let element = &self.element;
            return quote! {
                let value = input.read_enum()?;
                if <#element as ::tightbuf::ProtoEnum>::from_i32(value).is_some() {
                    #prepare
                    self.#ident = value;
                    #mark
                }
                tag = input.read_tag()?;
            };
        }

        let read = self.read_into_singular();
        quote! {
            #prepare
            #read
            #mark
            tag = input.read_tag()?;
        }
    }

    fn decode_interleaved(&self, tag: u32) -> TokenStream {
        let ident = &self.ident;
        let tag = Literal::u32_unsuffixed(tag);
        let read = self.read_into_repeated();
        quote! {
            loop {
                if self.#ident.remaining_capacity() == 0 {
                    let count = input.repeated_field_array_length(#tag)?;
                    self.#ident.reserve(count);
                }
                #read
                tag = input.read_tag()?;
                if tag != #tag {
                    break;
                }
            }
        }
    }

    fn decode_packed(&self) -> TokenStream {
        let ident = &self.ident;
        let read = self.read_into_repeated();
        let reserve = match self.strategy.category {
            Category::Scalar(scalar) => match scalar.fixed_size() {
                Some(size) => {
                    let size = Literal::usize_unsuffixed(size);
                    quote!(self.#ident.reserve(length / #size);)
                }
                None => quote!(self.#ident.reserve(input.count_packed_varints());),
            },
            _ => quote!(self.#ident.reserve(input.count_packed_varints());),
        };
        quote! {
            let length = input.read_length()?;
            let limit = input.push_limit(length)?;
            #reserve
            while !input.is_at_end() {
                #read
            }
            input.pop_limit(limit);
            tag = input.read_tag()?;
        }
    }

    /// `(size fn, write fn)` of the runtime for scalar and enum values.
    fn scalar_fns(&self) -> Option<(Ident, Ident)> {
        match self.strategy.category {
            Category::Scalar(scalar) => Some((scalar.size_fn(), scalar.write_fn())),
            Category::Enum => Some((
                format_ident!("compute_enum_size_no_tag"),
                format_ident!("write_enum_no_tag"),
            )),
            _ => None,
        }
    }

    /// Slice of the values of a repeated scalar or enum field.
    fn values_slice(&self) -> TokenStream {
        let ident = &self.ident;
        if self.strategy.category == Category::Enum {
            quote!(self.#ident.values())
        } else {
            quote!(self.#ident.as_slice())
        }
    }

    /// Statements writing this field to `buf` if present.
    pub fn write(&self) -> TokenStream {
        let ident = &self.ident;
        let tag = Literal::u32_unsuffixed(self.primary_tag());
        let number = self.field_number();

        if self.is_repeated() {
            if let Some((size_fn, write_fn)) = self.scalar_fns() {
                let values = self.values_slice();
                return if self.is_packed() {
                    quote! {
                        ::tightbuf::sink::write_packed(
                            buf,
                            #tag,
                            #values,
                            ::tightbuf::sink::#size_fn,
                            ::tightbuf::sink::#write_fn,
                        );
                    }
                } else {
                    quote! {
                        for value in #values {
                            ::tightbuf::sink::write_tag(buf, #tag);
                            ::tightbuf::sink::#write_fn(buf, *value);
                        }
                    }
                };
            }

            let write_value = match self.strategy.category {
                Category::String => quote!(::tightbuf::sink::write_string_no_tag(buf, value);),
                Category::Bytes => quote!(::tightbuf::sink::write_bytes_no_tag(buf, value);),
                Category::Message => quote!(::tightbuf::sink::write_message_no_tag(buf, value);),
                _ => {
                    return quote! {
                        for value in self.#ident.iter() {
                            ::tightbuf::sink::write_group(buf, #number, value);
                        }
                    };
                }
            };
            return quote! {
                for value in self.#ident.iter() {
                    ::tightbuf::sink::write_tag(buf, #tag);
                    #write_value
                }
            };
        }

        let value = self.singular_ref();
        let body = match self.strategy.category {
            Category::Group => quote!(::tightbuf::sink::write_group(buf, #number, #value);),
            Category::String => quote! {
                ::tightbuf::sink::write_tag(buf, #tag);
                ::tightbuf::sink::write_string_no_tag(buf, #value);
            },
            Category::Bytes => quote! {
                ::tightbuf::sink::write_tag(buf, #tag);
                ::tightbuf::sink::write_bytes_no_tag(buf, #value);
            },
            Category::Message => quote! {
                ::tightbuf::sink::write_tag(buf, #tag);
                ::tightbuf::sink::write_message_no_tag(buf, #value);
            },
            Category::Scalar(scalar) => {
                let write_fn = scalar.write_fn();
                quote! {
                    ::tightbuf::sink::write_tag(buf, #tag);
                    ::tightbuf::sink::#write_fn(buf, self.#ident);
                }
            }
            Category::Enum => quote! {
                ::tightbuf::sink::write_tag(buf, #tag);
                ::tightbuf::sink::write_enum_no_tag(buf, self.#ident);
            },
        };
        let has = self.has_expr();
        quote! {
            if #has {
                #body
            }
        }
    }

    /// Reference to a present singular string, bytes, message or group value.
    fn singular_ref(&self) -> TokenStream {
        let ident = &self.ident;
        let element = &self.element;
        if self.boxed {
            quote!(self.#ident.as_deref().unwrap_or_else(|| #element::default_instance()))
        } else {
            quote!(&self.#ident)
        }
    }

    /// Statements adding this field's encoded size to `len`.
    pub fn size(&self) -> TokenStream {
        let ident = &self.ident;
        let number = self.field_number();
        let tag_size = self.tag_size(self.primary_tag());

        if self.is_repeated() {
            if let Some((size_fn, _)) = self.scalar_fns() {
                let values = self.values_slice();
                let payload = match self.strategy.category {
                    Category::Scalar(scalar) => match scalar.fixed_size() {
                        Some(size) => {
                            let size = Literal::usize_unsuffixed(size);
                            quote!(#size * #values.len())
                        }
                        None => quote!(::tightbuf::sink::compute_packed_size(#values, ::tightbuf::sink::#size_fn)),
                    },
                    _ => quote!(::tightbuf::sink::compute_packed_size(#values, ::tightbuf::sink::#size_fn)),
                };
                return if self.is_packed() {
                    quote! {
                        if !#values.is_empty() {
                            len += #tag_size + ::tightbuf::sink::compute_length_delimited_size(#payload);
                        }
                    }
                } else {
                    quote!(len += #tag_size * #values.len() + #payload;)
                };
            }

            let value_size = match self.strategy.category {
                Category::String => quote!(::tightbuf::sink::compute_string_size_no_tag(value)),
                Category::Bytes => quote!(::tightbuf::sink::compute_bytes_size_no_tag(value)),
                Category::Message => quote!(::tightbuf::sink::compute_message_size_no_tag(value)),
                _ => {
                    return quote! {
                        len += self.#ident
                            .iter()
                            .map(|value| ::tightbuf::sink::compute_group_size(#number, value))
                            .sum::<usize>();
                    };
                }
            };
            return quote! {
                len += #tag_size * self.#ident.len()
                    + self.#ident.iter().map(|value| #value_size).sum::<usize>();
            };
        }

        let has = self.has_expr();
        let value = self.singular_ref();
        let added = match self.strategy.category {
            Category::Scalar(scalar) => match scalar.fixed_size() {
                Some(size) => {
                    let size = Literal::usize_unsuffixed(size);
                    quote!(#tag_size + #size)
                }
                None => {
                    let size_fn = scalar.size_fn();
                    quote!(#tag_size + ::tightbuf::sink::#size_fn(self.#ident))
                }
            },
            Category::Enum => {
                quote!(#tag_size + ::tightbuf::sink::compute_enum_size_no_tag(self.#ident))
            }
            Category::String => {
                quote!(#tag_size + ::tightbuf::sink::compute_string_size_no_tag(#value))
            }
            Category::Bytes => {
                quote!(#tag_size + ::tightbuf::sink::compute_bytes_size_no_tag(#value))
            }
            Category::Message => {
                quote!(#tag_size + ::tightbuf::sink::compute_message_size_no_tag(#value))
            }
            Category::Group => quote!(::tightbuf::sink::compute_group_size(#number, #value)),
        };
        quote! {
            if #has {
                len += #added;
            }
        }
    }

    /// Equality of this field between `self` and `other`, assuming presence
    /// bits and oneof cases already compared equal. Floats compare by bit
    /// pattern so NaN equals itself.
    pub fn eq_expr(&self) -> TokenStream {
        let ident = &self.ident;
        let is_float = matches!(self.strategy.category, Category::Scalar(s) if s.is_float());

        if self.is_repeated() {
            return if is_float {
                quote! {
                    (self.#ident.len() == other.#ident.len()
                        && self.#ident
                            .iter()
                            .zip(other.#ident.iter())
                            .all(|(a, b)| a.to_bits() == b.to_bits()))
                }
            } else {
                quote!((self.#ident == other.#ident))
            };
        }

        let has = self.has_expr();
        let value_eq = if is_float {
            quote!(self.#ident.to_bits() == other.#ident.to_bits())
        } else {
            quote!(self.#ident == other.#ident)
        };
        quote!((!(#has) || #value_eq))
    }
}

pub(crate) fn word_and_mask(bit: PresenceBit) -> (Literal, syn::LitInt) {
    let word = Literal::usize_unsuffixed(bit.word());
    let mask = syn::LitInt::new(&format!("{:#010x}", bit.mask()), Span::call_site());
    (word, mask)
}

pub(crate) fn bit_test(bit: PresenceBit) -> TokenStream {
    let (word, mask) = word_and_mask(bit);
    quote!((self.has_bits[#word] & #mask) != 0)
}

pub(crate) fn bit_set(bit: PresenceBit) -> TokenStream {
    let (word, mask) = word_and_mask(bit);
    quote!(self.has_bits[#word] |= #mask;)
}

pub(crate) fn bit_clear(bit: PresenceBit) -> TokenStream {
    let (word, mask) = word_and_mask(bit);
    quote!(self.has_bits[#word] &= !#mask;)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::classify::classify;
    use crate::descriptor::{DescriptorProto, FileDescriptorProto, FileDescriptorSet, Label, Type};

    fn descriptor(name: &str, number: i32, label: Label, proto_type: Type) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(label as i32),
            r#type: Some(proto_type as i32),
            ..Default::default()
        }
    }

    fn node_set() -> FileDescriptorSet {
        let mut child = descriptor("child", 1, Label::Optional, Type::Message);
        child.type_name = Some(".t.Node".to_string());
        FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("t.proto".to_string()),
                package: Some("t".to_string()),
                message_type: vec![DescriptorProto {
                    name: Some("Node".to_string()),
                    field: vec![child],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    fn with_field<T>(field: &FieldDescriptorProto, is_proto3: bool, check: impl FnOnce(&FieldGen<'_>) -> T) -> T {
        let config = Config::new();
        let fds = node_set();
        let ctx = GenerationContext::new(&config, &fds);
        let scope = Scope::file("t", "t");
        let strategy = classify("Node", field, is_proto3).unwrap();
        let bit = Some(PresenceBit { index: 0 });
        let field = FieldGen::new(&ctx, &scope, ".t.Node", field, strategy, bit, None).unwrap();
        check(&field)
    }

    #[test]
    fn test_packed_tags() {
        let field = descriptor("values", 4, Label::Repeated, Type::Sint32);
        with_field(&field, true, |f| {
            assert_eq!(f.primary_tag(), 34);
            assert_eq!(f.alternate_tag(), Some(32));
        });
        with_field(&field, false, |f| {
            assert_eq!(f.primary_tag(), 32);
            assert_eq!(f.alternate_tag(), Some(34));
        });

        let strings = descriptor("names", 4, Label::Repeated, Type::String);
        with_field(&strings, true, |f| assert_eq!(f.alternate_tag(), None));
    }

    #[test]
    fn test_recursive_field_is_boxed() {
        let mut child = descriptor("child", 1, Label::Optional, Type::Message);
        child.type_name = Some(".t.Node".to_string());
        let storage = with_field(&child, false, |f| f.storage_type().to_string().replace(' ', ""));
        assert_eq!(storage, "::core::option::Option<::std::boxed::Box<Node>>");
    }

    #[test]
    fn test_keyword_field_names() {
        let field = descriptor("type", 1, Label::Optional, Type::Int32);
        with_field(&field, false, |f| {
            assert_eq!(f.ident.to_string(), "r#type");
            assert_eq!(f.has_ident().to_string(), "has_type");
        });
    }

    #[test]
    fn test_presence_mask_literal() {
        let (word, mask) = word_and_mask(PresenceBit { index: 37 });
        assert_eq!(word.to_string(), "1");
        assert_eq!(mask.to_string(), "0x00000020");
    }

    #[test]
    fn test_float_equality_uses_bits() {
        let field = descriptor("ratio", 2, Label::Optional, Type::Double);
        let eq = with_field(&field, false, |f| f.eq_expr().to_string());
        assert!(eq.contains("to_bits"));
    }
}
