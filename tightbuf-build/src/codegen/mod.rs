//! Code generation from protobuf descriptors.

pub mod bits;
pub mod classify;
pub mod defaults;
pub mod enumeration;
pub mod field;
pub mod message;
pub mod oneof;
pub mod recursion;
pub mod types;

pub use recursion::{find_recursive_fields, RecursiveField};

use std::collections::BTreeMap;
use std::path::Path;

use proc_macro2::TokenStream;

use crate::config::Config;
use crate::context::{file_module_name, GenerationContext, Scope};
use crate::descriptor::{FileDescriptorProto, FileDescriptorSet};
use crate::protoc;
use crate::Error;

const HEADER: &str = "// This file is @generated by tightbuf-build. Do not edit.\n\n";

/// One generated source file, named relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub name: String,
    pub content: String,
}

/// Main entry point for code generation.
pub fn compile(
    config: &Config,
    protos: &[impl AsRef<Path>],
    includes: &[impl AsRef<Path>],
) -> Result<(), Error> {
    let fds = if config.skip_protoc {
        let path = config
            .file_descriptor_set_path
            .as_ref()
            .ok_or(Error::MissingDescriptorPath)?;
        let bytes = std::fs::read(path)?;
        protoc::parse_file_descriptor_set(&bytes)?
    } else {
        let protoc_path = config
            .protoc_path
            .clone()
            .map(Ok)
            .unwrap_or_else(protoc::find_protoc)?;
        protoc::invoke_protoc(&protoc_path, protos, includes, &config.protoc_args)?
    };

    compile_fds(config, fds)
}

/// Compile from a FileDescriptorSet, writing every generated file to the
/// configured output directory (or `OUT_DIR`).
pub fn compile_fds(config: &Config, fds: FileDescriptorSet) -> Result<(), Error> {
    let out_dir = config
        .out_dir
        .clone()
        .or_else(|| std::env::var_os("OUT_DIR").map(Into::into))
        .ok_or(Error::MissingOutDir)?;

    // Generate everything before touching the filesystem so a failing request
    // writes nothing.
    let files = generate_files(config, &fds, None)?;

    std::fs::create_dir_all(&out_dir)?;
    for file in &files {
        std::fs::write(out_dir.join(&file.name), &file.content)?;
    }
    tracing::info!(out_dir = %out_dir.display(), files = files.len(), "wrote generated code");
    Ok(())
}

/// Generate source for the files of `fds`, or only those named in `only`.
///
/// Files sharing a package share one `<module>.rs`; a `mod.rs` declares every
/// module so cross-package references resolve between siblings.
pub fn generate_files(
    config: &Config,
    fds: &FileDescriptorSet,
    only: Option<&[String]>,
) -> Result<Vec<GeneratedFile>, Error> {
    let ctx = GenerationContext::new(config, fds);

    let mut modules: BTreeMap<String, TokenStream> = BTreeMap::new();
    for file in &fds.file {
        let selected = match (only, file.name.as_ref()) {
            (None, _) => true,
            (Some(names), Some(name)) => names.contains(name),
            (Some(_), None) => false,
        };
        if !selected {
            continue;
        }
        let code = generate_file(&ctx, file)?;
        modules.entry(file_module_name(file)).or_default().extend(code);
    }

    let mut files = Vec::with_capacity(modules.len() + 1);
    let mut declarations = String::from(HEADER);
    for (module, tokens) in modules {
        declarations.push_str(&format!("pub mod {module};\n"));
        files.push(GeneratedFile {
            name: format!("{module}.rs"),
            content: render(config, tokens)?,
        });
    }
    files.push(GeneratedFile {
        name: "mod.rs".to_string(),
        content: declarations,
    });
    Ok(files)
}

/// Generate code for a single .proto file.
fn generate_file(ctx: &GenerationContext, file: &FileDescriptorProto) -> Result<TokenStream, Error> {
    let module = file_module_name(file);
    let scope = Scope::file(&module, file.package.as_deref().unwrap_or_default());
    let is_proto3 = file.is_proto3();

    tracing::debug!(file = file.name.as_deref().unwrap_or_default(), module = %module, "generating file");

    let mut tokens = TokenStream::new();
    for enum_type in &file.enum_type {
        tokens.extend(enumeration::generate_enum(enum_type)?);
    }
    for msg in &file.message_type {
        tokens.extend(message::generate_message(ctx, &scope, msg, is_proto3)?);
    }
    Ok(tokens)
}

/// Turn tokens into source text with the configured indentation.
fn render(config: &Config, tokens: TokenStream) -> Result<String, Error> {
    let body = if config.skip_format {
        tokens.to_string()
    } else {
        let file: syn::File = syn::parse2(tokens)?;
        reindent(&prettyplease::unparse(&file), &config.indent)
    };
    Ok(format!("{HEADER}{body}"))
}

/// Replace each leading group of four spaces with `indent`.
fn reindent(source: &str, indent: &str) -> String {
    if indent == "    " {
        return source.to_string();
    }
    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        let content = line.trim_start_matches(' ');
        let leading = line.len() - content.len();
        for _ in 0..leading / 4 {
            out.push_str(indent);
        }
        out.push_str(&" ".repeat(leading % 4));
        out.push_str(content);
        out.push('\n');
    }
    out
}
