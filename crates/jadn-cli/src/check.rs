//! # Check Subcommand
//!
//! Loads and resolves a schema and prints a summary of the registry.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use jadn_schema::TypeRegistry;

use crate::load_registry;

/// Arguments for the `jadn check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Schema document (JSON, or YAML by extension).
    #[arg(value_name = "SCHEMA")]
    pub schema: PathBuf,

    /// Schema supplying a namespace the main schema refers to. Repeatable.
    #[arg(long = "import", value_name = "SCHEMA")]
    pub imports: Vec<PathBuf>,

    /// List every type with its base kind.
    #[arg(long)]
    pub list: bool,
}

/// Execute the check subcommand.
///
/// Returns exit code 0 when the schema resolves.
pub fn run_check(args: &CheckArgs) -> Result<u8> {
    let registry = load_registry(&args.schema, &args.imports)?;
    print!("{}", summary(&registry, &args.schema, args.list));
    Ok(0)
}

/// Render the registry summary printed by `jadn check`.
fn summary(registry: &TypeRegistry, schema: &Path, list: bool) -> String {
    let mut out = String::new();
    match registry.info() {
        Some(info) => {
            let version = info.version.as_deref().map(|v| format!(" ({v})")).unwrap_or_default();
            let _ = writeln!(out, "Package: {}{version}", info.package);
            if let Some(title) = &info.title {
                let _ = writeln!(out, "Title: {title}");
            }
        }
        None => {
            let _ = writeln!(out, "Package: {} (no info)", schema.display());
        }
    }
    let _ = writeln!(out, "Types: {}", registry.len());
    for (kind, count) in registry.kind_counts() {
        let _ = writeln!(out, "  {kind}: {count}");
    }
    let namespaces: Vec<String> = registry
        .namespaces()
        .map(|(prefix, uri)| format!("{prefix}={uri}"))
        .collect();
    if !namespaces.is_empty() {
        let _ = writeln!(out, "Namespaces: {}", namespaces.join(", "));
    }
    let _ = writeln!(out, "Exports: {}", registry.exports().join(", "));
    let unreferenced = registry.unreferenced();
    if !unreferenced.is_empty() {
        let _ = writeln!(out, "Unreferenced: {}", unreferenced.join(", "));
    }

    if list {
        for def in registry.types() {
            let _ = writeln!(out, "  {} {}", def.name, def.kind);
        }
    }
    out
}
