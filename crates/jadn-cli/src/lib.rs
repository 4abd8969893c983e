//! # jadn-cli — Command-Line Interface for JADN Schemas
//!
//! Provides the `jadn` binary over `jadn-schema`.
//!
//! ## Subcommands
//!
//! - `jadn check` — load and resolve a schema, print a summary.
//! - `jadn validate` — decode an instance and report every violation.
//! - `jadn convert` — transcode an instance between verbose and concise JSON.
//!
//! ```bash
//! jadn check music.jadn --import base.jadn
//! jadn validate music.jadn Library library.json --style concise
//! jadn convert music.jadn Library library.json --from verbose --to concise
//! ```
//!
//! ## Crate Policy
//!
//! - Argument parsing is separated from the handlers.
//! - Handlers delegate to `jadn-schema`; no schema logic lives here.
//! - Handlers return an exit code: 0 on success, 1 when the input is
//!   rejected. Operational failures (unreadable files) are errors.

pub mod check;
pub mod convert;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use jadn_schema::{Resolver, Style, TypeRegistry};
use serde_json::Value as Json;

/// Read a JSON or YAML document, chosen by file extension.
///
/// `.yaml` and `.yml` files are parsed as YAML; anything else as JSON.
pub fn read_document(path: &Path) -> Result<Json> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    if is_yaml {
        let yaml: serde_yaml::Value = serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse YAML in {}", path.display()))?;
        jadn_schema::yaml_to_json_value(&yaml)
            .map_err(|e| anyhow!("failed to convert YAML in {}: {e}", path.display()))
    } else {
        serde_json::from_str(&text).with_context(|| format!("failed to parse JSON in {}", path.display()))
    }
}

/// Load and resolve a schema together with its imports.
///
/// Schema errors are returned as errors naming the offending file.
pub fn load_registry(schema: &Path, imports: &[PathBuf]) -> Result<TypeRegistry> {
    let package = jadn_schema::load(&read_document(schema)?)
        .with_context(|| format!("failed to load schema {}", schema.display()))?;
    let mut resolver = Resolver::new(package);
    for path in imports {
        let import = jadn_schema::load(&read_document(path)?)
            .with_context(|| format!("failed to load imported schema {}", path.display()))?;
        resolver = resolver.import(import);
    }
    let registry = resolver
        .resolve()
        .with_context(|| format!("failed to resolve schema {}", schema.display()))?;
    tracing::info!(types = registry.len(), schema = %schema.display(), "schema resolved");
    Ok(registry)
}

/// Argument parser for `--style`, `--from` and `--to`.
pub fn parse_style(s: &str) -> Result<Style, String> {
    s.parse()
}

/// Fail unless `type_name` is defined in `registry`.
pub fn require_type(registry: &TypeRegistry, type_name: &str) -> Result<()> {
    if !registry.contains(type_name) {
        bail!("type \"{type_name}\" is not defined in the schema");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_yaml_and_json_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("doc.json");
        std::fs::write(&json_path, r#"{"a": [1, 2]}"#).unwrap();
        let yaml_path = dir.path().join("doc.yml");
        let mut f = std::fs::File::create(&yaml_path).unwrap();
        writeln!(f, "a: [1, 2]").unwrap();
        assert_eq!(read_document(&json_path).unwrap(), read_document(&yaml_path).unwrap());
    }

    #[test]
    fn unreadable_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_document(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn style_parser() {
        assert_eq!(parse_style("concise").unwrap(), Style::Concise);
        assert!(parse_style("cbor").is_err());
    }
}
