//! `tightbuf-build` compiles `.proto` files into Rust code for use with the
//! tightbuf runtime.
//!
//! # Example
//!
//! ```rust,no_run
//! // In build.rs
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     tightbuf_build::compile_protos(&["src/messages.proto"], &["src/"])?;
//!     Ok(())
//! }
//! ```
//!
//! Every package becomes one `<package>.rs` file in `OUT_DIR`, alongside a
//! `mod.rs` declaring them all. Include them as sibling modules:
//!
//! ```rust,ignore
//! pub mod my_package {
//!     include!(concat!(env!("OUT_DIR"), "/my_package.rs"));
//! }
//! ```
//!
//! # Generated Code
//!
//! Each message becomes a struct with private fields and generated
//! accessors. Presence of singular fields is tracked in a `has_bits` array
//! rather than with `Option`:
//!
//! ```protobuf
//! message Point {
//!   optional int32 x = 1;
//!   repeated string tags = 2;
//!   oneof shape {
//!     double radius = 3;
//!     string label = 4;
//!   }
//! }
//! ```
//!
//! generates `x()`, `has_x()`, `set_x()`, `clear_x()` and `try_x()`; `tags()`,
//! `tags_mut()` and `add_tags()`; and for the oneof `shape_case()`,
//! `has_shape()` and `clear_shape()`. Setting `radius` clears `label`.
//!
//! Recursive fields (`optional Node child = 1;` inside `Node`) are stored as
//! `Option<Box<Node>>` while keeping the same accessors.
//!
//! # Advanced Usage
//!
//! ```rust,no_run
//! use tightbuf_build::InputOrder;
//!
//! fn main() -> Result<(), tightbuf_build::Error> {
//!     tightbuf_build::Config::new()
//!         .out_dir("src/proto")
//!         .input_order(InputOrder::AscendingNumber)
//!         .enforce_has_checks(true)
//!         .compile_protos(&["proto/messages.proto"], &["proto/"])?;
//!     Ok(())
//! }
//! ```
//!
//! The same options are accepted by the `protoc-gen-tightbuf` plugin as a
//! comma-separated parameter: `--tightbuf_opt=input_order=number,indent=2`.

mod codegen;
mod config;
mod context;
pub mod descriptor;
mod error;
pub mod plugin;
mod protoc;

pub use codegen::{generate_files, GeneratedFile};
pub use config::{Config, InputOrder};
pub use error::Error;

use std::path::Path;

/// Compile `.proto` files into Rust with default settings.
///
/// # Arguments
/// * `protos` - Paths to `.proto` files to compile
/// * `includes` - Include paths for resolving imports
pub fn compile_protos(
    protos: &[impl AsRef<Path>],
    includes: &[impl AsRef<Path>],
) -> Result<(), Error> {
    Config::new().compile_protos(protos, includes)
}
