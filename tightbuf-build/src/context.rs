//! Type registry and name resolution shared by every generated file.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use proc_macro2::TokenStream;
use quote::ToTokens;

use crate::codegen::{find_recursive_fields, RecursiveField};
use crate::config::Config;
use crate::descriptor::{DescriptorProto, EnumDescriptorProto, FileDescriptorProto, FileDescriptorSet};
use crate::Error;

/// What kind of type a registry entry describes.
#[derive(Debug, Clone)]
pub enum TypeKind {
    Message,
    /// Enum values in declaration order.
    Enum { values: Vec<(String, i32)> },
}

#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// The Rust module generated for the defining file's package.
    pub rust_module: String,
    /// Path below the package module, e.g. `["outer", "Inner"]` for `.pkg.Outer.Inner`.
    pub rust_path: Vec<String>,
    pub kind: TypeKind,
}

/// Where generated code is being emitted: the package module, and how many
/// nested message modules deep.
#[derive(Debug, Clone)]
pub struct Scope {
    pub module: String,
    pub depth: usize,
    /// Fully-qualified proto name of the enclosing message, or the package
    /// prefix (e.g. `.pkg`) at file level.
    pub proto_path: String,
}

impl Scope {
    pub fn file(module: &str, package: &str) -> Self {
        Self {
            module: module.to_string(),
            depth: 0,
            proto_path: if package.is_empty() {
                String::new()
            } else {
                format!(".{}", package)
            },
        }
    }

    /// Scope of the `pub mod` holding the nested types of `message_name`.
    pub fn nested(&self, message_name: &str) -> Self {
        Self {
            module: self.module.clone(),
            depth: self.depth + 1,
            proto_path: self.qualify(message_name),
        }
    }

    /// Fully-qualified proto name of a type declared in this scope.
    pub fn qualify(&self, name: &str) -> String {
        format!("{}.{}", self.proto_path, name)
    }
}

/// Everything generation needs to know beyond the message at hand.
pub struct GenerationContext<'a> {
    pub config: &'a Config,
    /// Keyed by fully-qualified proto name, e.g. `.pkg.Outer.Inner`.
    pub type_registry: HashMap<String, TypeInfo>,
    pub recursive_fields: HashSet<RecursiveField>,
}

impl<'a> GenerationContext<'a> {
    pub fn new(config: &'a Config, fds: &FileDescriptorSet) -> Self {
        let mut type_registry = HashMap::new();

        for file in &fds.file {
            let package = file.package.as_deref().unwrap_or("");
            let scope = Scope::file(&file_module_name(file), package);

            for message in &file.message_type {
                register_message(&mut type_registry, &scope, &[], message);
            }
            for enum_type in &file.enum_type {
                register_enum(&mut type_registry, &scope, &[], enum_type);
            }
        }

        let recursive_fields = find_recursive_fields(fds);
        tracing::debug!(
            types = type_registry.len(),
            boxed = recursive_fields.len(),
            "built type registry"
        );

        Self {
            config,
            type_registry,
            recursive_fields,
        }
    }

    /// Whether `field_name` of `message_fqn` is stored as `Option<Box<_>>`.
    pub fn is_recursive_field(&self, message_fqn: &str, field_name: &str) -> bool {
        self.recursive_fields.contains(&RecursiveField {
            message_fqn: message_fqn.to_string(),
            field_name: field_name.to_string(),
        })
    }

    pub fn lookup(&self, proto_type_name: &str) -> Result<&TypeInfo, Error> {
        self.type_registry
            .get(proto_type_name)
            .ok_or_else(|| Error::UnresolvedType(proto_type_name.to_string()))
    }

    /// Enum values of `proto_type_name`, or `None` if it is not a known enum.
    pub fn enum_values(&self, proto_type_name: &str) -> Option<&[(String, i32)]> {
        match &self.type_registry.get(proto_type_name)?.kind {
            TypeKind::Enum { values } => Some(values),
            TypeKind::Message => None,
        }
    }

    /// Resolve a proto type name to a Rust type path usable from `scope`.
    ///
    /// Package modules are emitted as siblings, so types from the same package
    /// are reached by climbing out of nested message modules with `super::`,
    /// and types from other packages with one more `super::` and the sibling
    /// module's name.
    pub fn resolve_type(&self, scope: &Scope, proto_type_name: &str) -> Result<TokenStream, Error> {
        let path = match self.config.extern_paths.get(proto_type_name) {
            Some(extern_path) => extern_path.clone(),
            None => {
                let info = self.lookup(proto_type_name)?;
                let mut segments = vec!["super"; scope.depth];
                if info.rust_module != scope.module {
                    segments.push("super");
                    segments.push(&info.rust_module);
                }
                segments.extend(info.rust_path.iter().map(String::as_str));
                segments.join("::")
            }
        };
        let path: syn::Path = syn::parse_str(&path)?;
        Ok(path.into_token_stream())
    }
}

/// Record `message`, then everything declared inside it.
fn register_message(
    registry: &mut HashMap<String, TypeInfo>,
    scope: &Scope,
    parents: &[String],
    message: &DescriptorProto,
) {
    let Some(name) = &message.name else {
        return;
    };

    let mut rust_path = parents.to_vec();
    rust_path.push(to_rust_type_name(name));
    registry.insert(
        scope.qualify(name),
        TypeInfo {
            rust_module: scope.module.clone(),
            rust_path,
            kind: TypeKind::Message,
        },
    );

    let nested_scope = scope.nested(name);
    let mut nested_parents = parents.to_vec();
    nested_parents.push(to_rust_module_name(name));

    for nested in &message.nested_type {
        register_message(registry, &nested_scope, &nested_parents, nested);
    }
    for enum_type in &message.enum_type {
        register_enum(registry, &nested_scope, &nested_parents, enum_type);
    }
}

fn register_enum(
    registry: &mut HashMap<String, TypeInfo>,
    scope: &Scope,
    parents: &[String],
    enum_type: &EnumDescriptorProto,
) {
    let Some(name) = &enum_type.name else {
        return;
    };

    let values = enum_type
        .value
        .iter()
        .filter_map(|v| Some((v.name.clone()?, v.number?)))
        .collect();

    let mut rust_path = parents.to_vec();
    rust_path.push(to_rust_type_name(name));
    registry.insert(
        scope.qualify(name),
        TypeInfo {
            rust_module: scope.module.clone(),
            rust_path,
            kind: TypeKind::Enum { values },
        },
    );
}

/// Name of the Rust module generated for a file: its package with dots
/// replaced by underscores, or the file stem for files without a package.
pub fn file_module_name(file: &FileDescriptorProto) -> String {
    if let Some(package) = file.package.as_ref().filter(|p| !p.is_empty()) {
        package.replace('.', "_")
    } else {
        let name = file.name.as_deref().unwrap_or("unknown");
        Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(to_snake_case)
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Rust identifier for a message or enum name; only keywords change.
pub fn to_rust_type_name(name: &str) -> String {
    if is_rust_keyword(name) {
        format!("r#{}", name)
    } else {
        name.to_string()
    }
}

/// Name of the module holding the nested types of message `name`.
pub fn to_rust_module_name(name: &str) -> String {
    to_rust_field_name(name)
}

/// Convert proto field name to Rust field name (snake_case).
///
/// Keywords that cannot be raw identifiers get a trailing underscore.
pub fn to_rust_field_name(name: &str) -> String {
    let snake = to_snake_case(name);
    match snake.as_str() {
        "self" | "super" | "crate" | "Self" => format!("{}_", snake),
        s if is_rust_keyword(s) => format!("r#{}", snake),
        _ => snake,
    }
}

/// `camelCase`, `PascalCase` or acronym-bearing names (`HTTPServer`) to
/// `snake_case`. Names already in snake case come back unchanged.
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut chars = s.chars().peekable();
    let mut prev: Option<char> = None;

    while let Some(c) = chars.next() {
        if c.is_uppercase() {
            let word_start = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                // Last capital of an acronym followed by a new word.
                Some(p) if p.is_uppercase() => chars.peek().is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if word_start {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

/// Convert SCREAMING_SNAKE_CASE or snake_case to PascalCase.
pub fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.map(|c| c.to_ascii_lowercase()))
                    .collect(),
            }
        })
        .collect()
}

/// Strict and reserved keywords of the 2021 edition, plus `gen`.
fn is_rust_keyword(s: &str) -> bool {
    matches!(
        s,
        "as" | "break"
            | "const"
            | "continue"
            | "crate"
            | "else"
            | "enum"
            | "extern"
            | "false"
            | "fn"
            | "for"
            | "if"
            | "impl"
            | "in"
            | "let"
            | "loop"
            | "match"
            | "mod"
            | "move"
            | "mut"
            | "pub"
            | "ref"
            | "return"
            | "self"
            | "Self"
            | "static"
            | "struct"
            | "super"
            | "trait"
            | "true"
            | "type"
            | "unsafe"
            | "use"
            | "where"
            | "while"
            | "async"
            | "await"
            | "dyn"
            | "abstract"
            | "become"
            | "box"
            | "do"
            | "final"
            | "macro"
            | "override"
            | "priv"
            | "typeof"
            | "unsized"
            | "virtual"
            | "yield"
            | "try"
            | "gen"
    )
}
