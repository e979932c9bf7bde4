//! Field classification: maps a field's declared type and cardinality to the
//! storage and wire strategy every generated accessor and codec follows.

use crate::descriptor::{FieldDescriptorProto, Label, Type};
use crate::Error;

use super::types::ScalarType;

/// How a field's value is stored and read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Scalar(ScalarType),
    /// Stored as the raw `i32`.
    Enum,
    String,
    Bytes,
    Message,
    Group,
}

impl Category {
    /// Scalars and enums may use packed encoding when repeated.
    pub fn is_packable(self) -> bool {
        matches!(self, Category::Scalar(_) | Category::Enum)
    }

    pub fn is_message_like(self) -> bool {
        matches!(self, Category::Message | Category::Group)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Owns one presence bit.
    Singular,
    /// `packed` selects the encoding written; both are accepted on decode.
    Repeated { packed: bool },
    /// Member of the real oneof at `index` in the message's `oneof_decl`.
    Oneof { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    pub cardinality: Cardinality,
    pub category: Category,
}

/// Classify one field of `message_name`.
///
/// Any shape without a strategy is reported as
/// [`Error::UnhandledSchemaConstruct`] so no partial code is emitted for it.
pub fn classify(
    message_name: &str,
    field: &FieldDescriptorProto,
    is_proto3: bool,
) -> Result<Strategy, Error> {
    let field_name = field.name.as_deref().unwrap_or("<unnamed>");
    let unhandled = |reason: String| Error::UnhandledSchemaConstruct {
        message: message_name.to_string(),
        field: field_name.to_string(),
        reason,
    };

    let proto_type = match (field.r#type, field.field_type()) {
        (_, Some(proto_type)) => proto_type,
        (Some(raw), None) => return Err(unhandled(format!("unknown field type {raw}"))),
        (None, None) => return Err(unhandled("missing field type".to_string())),
    };

    let category = match proto_type {
        Type::String => Category::String,
        Type::Bytes => Category::Bytes,
        Type::Enum => Category::Enum,
        Type::Message => Category::Message,
        Type::Group => Category::Group,
        scalar => match ScalarType::from_proto(scalar) {
            Some(scalar) => Category::Scalar(scalar),
            None => return Err(unhandled(format!("no strategy for {scalar:?}"))),
        },
    };

    if matches!(category, Category::Enum | Category::Message | Category::Group)
        && field.type_name.as_deref().is_none_or(str::is_empty)
    {
        return Err(unhandled(format!("{proto_type:?} field has no type name")));
    }

    let packed_option = field.packed_option();
    if packed_option == Some(true) && !category.is_packable() {
        return Err(unhandled(format!("{proto_type:?} fields cannot be packed")));
    }

    let cardinality = match (field.label(), field.real_oneof_index()) {
        (Label::Repeated, Some(_)) => {
            return Err(unhandled("repeated field inside a oneof".to_string()));
        }
        (Label::Repeated, None) => Cardinality::Repeated {
            packed: category.is_packable() && packed_option.unwrap_or(is_proto3),
        },
        (Label::Optional | Label::Required, Some(index)) => Cardinality::Oneof { index },
        (Label::Optional | Label::Required, None) => Cardinality::Singular,
    };

    let strategy = Strategy {
        cardinality,
        category,
    };
    tracing::trace!(message = message_name, field = field_name, ?strategy, "classified field");
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldOptions;

    fn field(proto_type: Type, label: Label) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some("f".to_string()),
            number: Some(1),
            label: Some(label as i32),
            r#type: Some(proto_type as i32),
            ..Default::default()
        }
    }

    #[test]
    fn test_singular_shapes() {
        let strategy = classify("M", &field(Type::Sint64, Label::Optional), false).unwrap();
        assert_eq!(strategy.cardinality, Cardinality::Singular);
        assert_eq!(strategy.category, Category::Scalar(ScalarType::Sint64));

        let strategy = classify("M", &field(Type::Bytes, Label::Required), false).unwrap();
        assert_eq!(strategy.category, Category::Bytes);

        let mut message = field(Type::Message, Label::Optional);
        message.type_name = Some(".M".to_string());
        assert_eq!(classify("M", &message, true).unwrap().category, Category::Message);
    }

    #[test]
    fn test_packed_defaults_follow_syntax() {
        let repeated = field(Type::Int32, Label::Repeated);
        assert_eq!(
            classify("M", &repeated, true).unwrap().cardinality,
            Cardinality::Repeated { packed: true }
        );
        assert_eq!(
            classify("M", &repeated, false).unwrap().cardinality,
            Cardinality::Repeated { packed: false }
        );

        let mut explicit = repeated.clone();
        explicit.options = Some(FieldOptions { packed: Some(false) });
        assert_eq!(
            classify("M", &explicit, true).unwrap().cardinality,
            Cardinality::Repeated { packed: false }
        );

        // Strings are never packed, even in proto3.
        assert_eq!(
            classify("M", &field(Type::String, Label::Repeated), true)
                .unwrap()
                .cardinality,
            Cardinality::Repeated { packed: false }
        );
    }

    #[test]
    fn test_oneof_membership() {
        let mut member = field(Type::String, Label::Optional);
        member.oneof_index = Some(2);
        assert_eq!(
            classify("M", &member, false).unwrap().cardinality,
            Cardinality::Oneof { index: 2 }
        );

        member.proto3_optional = Some(true);
        assert_eq!(
            classify("M", &member, true).unwrap().cardinality,
            Cardinality::Singular
        );
    }

    #[test]
    fn test_unhandled_shapes() {
        let mut unknown = field(Type::Int32, Label::Optional);
        unknown.r#type = Some(42);

        let mut packed_string = field(Type::String, Label::Repeated);
        packed_string.options = Some(FieldOptions { packed: Some(true) });

        let mut repeated_member = field(Type::Int32, Label::Repeated);
        repeated_member.oneof_index = Some(0);

        let untyped_enum = field(Type::Enum, Label::Optional);

        for bad in [unknown, packed_string, repeated_member, untyped_enum] {
            let err = classify("M", &bad, false).unwrap_err();
            assert!(
                matches!(err, Error::UnhandledSchemaConstruct { ref message, .. } if message == "M"),
                "{err}"
            );
        }
    }
}
