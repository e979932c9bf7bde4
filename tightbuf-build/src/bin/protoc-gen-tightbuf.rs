//! protoc plugin generating tightbuf code.
//!
//! Run by protoc (`protoc --tightbuf_out=...`), it reads a serialized
//! `CodeGeneratorRequest` from stdin and writes the response to stdout. Given
//! `--descriptor-set`, it instead compiles a `FileDescriptorSet` file
//! straight into `--out-dir`.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tightbuf_build::{plugin, Config, Error};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "protoc-gen-tightbuf")]
#[command(about = "Generate tightbuf message code from protobuf descriptors", long_about = None)]
struct Args {
    /// Serialized FileDescriptorSet to compile instead of reading a plugin
    /// request from stdin
    #[arg(long, requires = "out_dir")]
    descriptor_set: Option<PathBuf>,

    /// Directory receiving generated files
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Generator options, e.g. `enforce_has_checks,indent=2,input_order=number`
    #[arg(long)]
    parameter: Option<String>,
}

fn main() -> ExitCode {
    // stdout carries the plugin response, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let result = match &args.descriptor_set {
        Some(path) => compile_descriptor_set(&args, path),
        None => run_plugin(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "protoc-gen-tightbuf failed");
            eprintln!("protoc-gen-tightbuf: {err}");
            ExitCode::FAILURE
        }
    }
}

fn compile_descriptor_set(args: &Args, path: &Path) -> Result<(), Error> {
    let mut config = Config::new();
    config
        .skip_protoc_run()
        .file_descriptor_set_path(path);
    if let Some(out_dir) = &args.out_dir {
        config.out_dir(out_dir);
    }
    if let Some(parameter) = &args.parameter {
        config.apply_parameter(parameter)?;
    }
    config.compile_protos(&[] as &[PathBuf], &[] as &[PathBuf])
}

fn run_plugin() -> Result<(), Error> {
    let mut request = Vec::new();
    std::io::stdin().read_to_end(&mut request)?;
    let response = plugin::run(&request)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&response)?;
    stdout.flush()?;
    Ok(())
}
