//! # Convert Subcommand
//!
//! Transcodes an instance document between wire styles. The instance is
//! decoded and validated in the source style, then encoded in the target
//! style and written as pretty-printed JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use jadn_schema::{decode, encode, Style};

use crate::{load_registry, parse_style, read_document, require_type};

/// Arguments for the `jadn convert` subcommand.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Schema document (JSON, or YAML by extension).
    #[arg(value_name = "SCHEMA")]
    pub schema: PathBuf,

    /// Type of the instance.
    #[arg(value_name = "TYPE")]
    pub type_name: String,

    /// Instance document.
    #[arg(value_name = "INSTANCE")]
    pub instance: PathBuf,

    /// Wire style of the input.
    #[arg(long, default_value = "verbose", value_parser = parse_style)]
    pub from: Style,

    /// Wire style of the output.
    #[arg(long, default_value = "concise", value_parser = parse_style)]
    pub to: Style,

    /// Write the result here instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Schema supplying a namespace the main schema refers to. Repeatable.
    #[arg(long = "import", value_name = "SCHEMA")]
    pub imports: Vec<PathBuf>,
}

/// Execute the convert subcommand.
///
/// Returns exit code 0 on success and 1 when the instance cannot be decoded
/// or encoded.
pub fn run_convert(args: &ConvertArgs) -> Result<u8> {
    let registry = load_registry(&args.schema, &args.imports)?;
    require_type(&registry, &args.type_name)?;
    let wire = read_document(&args.instance)?;

    let value = match decode(&registry, &args.type_name, &wire, args.from) {
        Ok(value) => value,
        Err(err) => {
            println!("FAIL: {} ({}): {err}", args.instance.display(), args.from);
            return Ok(1);
        }
    };
    let out = match encode(&registry, &args.type_name, &value, args.to) {
        Ok(out) => out,
        Err(err) => {
            println!("FAIL: cannot write {} as {}: {err}", args.type_name, args.to);
            return Ok(1);
        }
    };
    tracing::debug!(from = %args.from, to = %args.to, "instance transcoded");

    let text = serde_json::to_string_pretty(&out).context("failed to serialize output")?;
    match &args.output {
        Some(path) => std::fs::write(path, format!("{text}\n"))
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{text}"),
    }
    Ok(0)
}
