//! Detection of message fields that must be boxed.
//!
//! Singular sub-messages and groups are stored inline, so a chain of them
//! that leads back to the containing message (`message Node { optional Node
//! child = 1; }`, or `A -> B -> A` across messages) has no finite size. Every
//! field on such a cycle is stored as `Option<Box<T>>`. Repeated fields are
//! never on a cycle here since their elements are already heap allocated.

use std::collections::{HashMap, HashSet};

use crate::descriptor::{DescriptorProto, FileDescriptorSet, Label, Type};

/// A singular message or group field stored behind a `Box`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecursiveField {
    /// Fully-qualified name of the containing message, e.g. `.pkg.Node`.
    pub message_fqn: String,
    pub field_name: String,
}

/// Inline containment edges: message -> (field, contained message).
#[derive(Debug, Default)]
struct InlineGraph {
    edges: HashMap<String, Vec<(String, String)>>,
}

impl InlineGraph {
    fn build(fds: &FileDescriptorSet) -> Self {
        let mut graph = InlineGraph::default();
        for file in &fds.file {
            let scope = match file.package.as_deref() {
                Some(package) if !package.is_empty() => format!(".{package}"),
                _ => String::new(),
            };
            for message in &file.message_type {
                graph.add_message(&scope, message);
            }
        }
        graph
    }

    fn add_message(&mut self, scope: &str, message: &DescriptorProto) {
        let Some(name) = message.name.as_deref() else {
            return;
        };
        let fqn = format!("{scope}.{name}");

        let inline = message.field.iter().filter_map(|field| {
            let stored_inline = matches!(field.field_type(), Some(Type::Message | Type::Group))
                && field.label() != Label::Repeated;
            if !stored_inline {
                return None;
            }
            Some((field.name.clone()?, field.type_name.clone()?))
        });
        self.edges.insert(fqn.clone(), inline.collect());

        for nested in &message.nested_type {
            self.add_message(&fqn, nested);
        }
    }

    /// Whether `to` is reachable from `from` through inline fields.
    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut seen = HashSet::new();
        let mut pending = vec![from];
        while let Some(current) = pending.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(edges) = self.edges.get(current) {
                pending.extend(edges.iter().map(|(_, target)| target.as_str()));
            }
        }
        false
    }
}

/// Every inline field whose type leads back to its containing message.
pub fn find_recursive_fields(fds: &FileDescriptorSet) -> HashSet<RecursiveField> {
    let graph = InlineGraph::build(fds);

    let mut boxed = HashSet::new();
    for (message, edges) in &graph.edges {
        for (field_name, target) in edges {
            if graph.reaches(target, message) {
                boxed.insert(RecursiveField {
                    message_fqn: message.clone(),
                    field_name: field_name.clone(),
                });
            }
        }
    }
    boxed
}
