//! Configuration for protobuf code generation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::Error;

/// Order in which generated `merge_from` expects fields to arrive.
///
/// With a hint, decoding a field checks whether the next tag belongs to the
/// field that follows it in the hinted order and, if so, continues straight
/// into that field without re-dispatching. Out-of-order input still decodes
/// correctly, it just takes the general dispatch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputOrder {
    /// Fields arrive in the order they are declared in the schema.
    #[default]
    Declaration,
    /// Fields arrive sorted by field number.
    AscendingNumber,
    /// No assumption; every tag goes through the general dispatch.
    None,
}

impl InputOrder {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "declaration" => Some(InputOrder::Declaration),
            "number" | "ascending" => Some(InputOrder::AscendingNumber),
            "none" => Some(InputOrder::None),
            _ => None,
        }
    }
}

/// Configuration for protobuf code generation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Output directory for generated files.
    pub(crate) out_dir: Option<PathBuf>,

    /// Path to the protoc executable.
    pub(crate) protoc_path: Option<PathBuf>,

    /// Additional arguments for protoc.
    pub(crate) protoc_args: Vec<String>,

    /// Skip running protoc, use pre-existing FileDescriptorSet.
    pub(crate) skip_protoc: bool,

    /// Path to read the FileDescriptorSet from when protoc is skipped.
    pub(crate) file_descriptor_set_path: Option<PathBuf>,

    /// Extern paths for types defined elsewhere.
    /// Maps proto path -> Rust path (e.g., ".google.protobuf.Timestamp" -> "wkt::Timestamp")
    pub(crate) extern_paths: HashMap<String, String>,

    /// Disable formatting with prettyplease.
    pub(crate) skip_format: bool,

    /// Getters panic when their field is not present.
    pub(crate) enforce_has_checks: bool,

    /// Generate `try_<field>` accessors returning `Option`.
    pub(crate) optional_accessors: bool,

    /// Indentation unit of the generated source.
    pub(crate) indent: String,

    pub(crate) input_order: InputOrder,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            out_dir: None,
            protoc_path: None,
            protoc_args: Vec::new(),
            skip_protoc: false,
            file_descriptor_set_path: None,
            extern_paths: HashMap::new(),
            skip_format: false,
            enforce_has_checks: false,
            optional_accessors: true,
            indent: "    ".to_string(),
            input_order: InputOrder::default(),
        }
    }
}

impl Config {
    /// Create a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output directory for generated Rust files.
    pub fn out_dir(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.out_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set path to the protoc executable.
    pub fn protoc_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.protoc_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Add an argument to pass to protoc.
    pub fn protoc_arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.protoc_args.push(arg.into());
        self
    }

    /// Skip running protoc; use an existing FileDescriptorSet instead.
    pub fn skip_protoc_run(&mut self) -> &mut Self {
        self.skip_protoc = true;
        self
    }

    /// Path to read the FileDescriptorSet from when protoc is skipped.
    pub fn file_descriptor_set_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.file_descriptor_set_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Declare an externally provided protobuf type.
    ///
    /// When a field references a type matching `proto_path`, the generated code
    /// will use `rust_path` instead of generating the type.
    ///
    /// # Example
    /// ```ignore
    /// config.extern_path(".common.Timestamp", "crate::common::Timestamp");
    /// ```
    pub fn extern_path(
        &mut self,
        proto_path: impl Into<String>,
        rust_path: impl Into<String>,
    ) -> &mut Self {
        self.extern_paths.insert(proto_path.into(), rust_path.into());
        self
    }

    /// Skip formatting with prettyplease.
    pub fn skip_format(&mut self) -> &mut Self {
        self.skip_format = true;
        self
    }

    /// Make generated getters panic when the field has not been set.
    pub fn enforce_has_checks(&mut self, enabled: bool) -> &mut Self {
        self.enforce_has_checks = enabled;
        self
    }

    /// Generate `try_<field>` accessors that return `None` for absent fields.
    pub fn optional_accessors(&mut self, enabled: bool) -> &mut Self {
        self.optional_accessors = enabled;
        self
    }

    /// Indentation unit used in the generated source. Defaults to four spaces.
    pub fn indent(&mut self, indent: impl Into<String>) -> &mut Self {
        self.indent = indent.into();
        self
    }

    /// Expected order of incoming fields. See [`InputOrder`].
    pub fn input_order(&mut self, order: InputOrder) -> &mut Self {
        self.input_order = order;
        self
    }

    /// Apply a protoc plugin parameter string, e.g.
    /// `enforce_has_checks=true,indent=2,input_order=number`.
    pub fn apply_parameter(&mut self, parameter: &str) -> Result<&mut Self, Error> {
        for option in parameter.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            let (key, value) = option.split_once('=').unwrap_or((option, "true"));
            let invalid = || Error::InvalidParameter(option.to_string());

            match key.trim() {
                "enforce_has_checks" => {
                    self.enforce_has_checks = parse_bool(value).ok_or_else(invalid)?;
                }
                "optional_accessors" => {
                    self.optional_accessors = parse_bool(value).ok_or_else(invalid)?;
                }
                "indent" => {
                    self.indent = parse_indent(value).ok_or_else(invalid)?;
                }
                "input_order" => {
                    self.input_order = InputOrder::parse(value.trim()).ok_or_else(invalid)?;
                }
                "skip_format" => {
                    self.skip_format = parse_bool(value).ok_or_else(invalid)?;
                }
                other => tracing::warn!(key = other, "ignoring unknown generator parameter"),
            }
        }
        Ok(self)
    }

    /// Compile `.proto` files into Rust files.
    pub fn compile_protos(
        &self,
        protos: &[impl AsRef<Path>],
        includes: &[impl AsRef<Path>],
    ) -> Result<(), Error> {
        crate::codegen::compile(self, protos, includes)
    }

    /// Compile from an existing FileDescriptorSet.
    pub fn compile_fds(&self, fds: crate::descriptor::FileDescriptorSet) -> Result<(), Error> {
        crate::codegen::compile_fds(self, fds)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_indent(value: &str) -> Option<String> {
    match value.trim() {
        "tab" => Some("\t".to_string()),
        n => n
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=16).contains(n))
            .map(|n| " ".repeat(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_parameter() {
        let mut config = Config::new();
        config
            .apply_parameter("enforce_has_checks=true, optional_accessors=false,indent=2,input_order=number")
            .unwrap();

        assert!(config.enforce_has_checks);
        assert!(!config.optional_accessors);
        assert_eq!(config.indent, "  ");
        assert_eq!(config.input_order, InputOrder::AscendingNumber);
    }

    #[test]
    fn test_apply_parameter_tab_and_flag() {
        let mut config = Config::new();
        config.apply_parameter("indent=tab,enforce_has_checks").unwrap();
        assert_eq!(config.indent, "\t");
        assert!(config.enforce_has_checks);
    }

    #[test]
    fn test_apply_parameter_unknown_key_is_ignored() {
        let mut config = Config::new();
        config.apply_parameter("something_else=1").unwrap();
        assert_eq!(config.input_order, InputOrder::Declaration);
    }

    #[test]
    fn test_apply_parameter_rejects_bad_values() {
        for parameter in ["indent=0", "input_order=random", "optional_accessors=maybe"] {
            let err = Config::new().apply_parameter(parameter).unwrap_err();
            assert!(matches!(err, Error::InvalidParameter(_)), "{parameter}");
        }
    }
}
