//! # Validate Subcommand
//!
//! Decodes an instance document in a given wire style and checks it against
//! a schema type, printing every violation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use jadn_schema::{decode, DecodeError, Style};

use crate::{load_registry, parse_style, read_document, require_type};

/// Arguments for the `jadn validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Schema document (JSON, or YAML by extension).
    #[arg(value_name = "SCHEMA")]
    pub schema: PathBuf,

    /// Type the instance must conform to.
    #[arg(value_name = "TYPE")]
    pub type_name: String,

    /// Instance document.
    #[arg(value_name = "INSTANCE")]
    pub instance: PathBuf,

    /// Wire style of the instance.
    #[arg(long, default_value = "verbose", value_parser = parse_style)]
    pub style: Style,

    /// Schema supplying a namespace the main schema refers to. Repeatable.
    #[arg(long = "import", value_name = "SCHEMA")]
    pub imports: Vec<PathBuf>,
}

/// Execute the validate subcommand.
///
/// Returns exit code 0 when the instance is valid and 1 when it is not.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let registry = load_registry(&args.schema, &args.imports)?;
    require_type(&registry, &args.type_name)?;
    let wire = read_document(&args.instance)?;

    match decode(&registry, &args.type_name, &wire, args.style) {
        Ok(_) => {
            println!("OK: {} is a valid {} ({})", args.instance.display(), args.type_name, args.style);
            Ok(0)
        }
        Err(DecodeError::Invalid(err)) => {
            let violations = err.violations();
            println!(
                "FAIL: {} has {} violation(s) against {}:",
                args.instance.display(),
                violations.len(),
                args.type_name
            );
            for v in violations {
                println!("{v}");
            }
            Ok(1)
        }
        Err(err) => {
            println!("FAIL: {}: {err}", args.instance.display());
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const SCHEMA: &str = r#"{"types": [
        ["Person", "Record", [], "", [
            [1, "name", "String"],
            [2, "id", "Integer"],
            [3, "email", "String", ["[0", "/email"]]
        ]]
    ]}"#;

    fn args(dir: &Path, instance: &str, style: Style) -> ValidateArgs {
        let schema = dir.join("person.jadn");
        std::fs::write(&schema, SCHEMA).unwrap();
        let path = dir.join("instance.json");
        std::fs::write(&path, instance).unwrap();
        ValidateArgs {
            schema,
            type_name: "Person".into(),
            instance: path,
            style,
            imports: vec![],
        }
    }

    #[test]
    fn valid_instances_exit_zero() {
        let dir = tempfile::tempdir().unwrap();
        let a = args(dir.path(), r#"{"name": "Bob", "id": 3}"#, Style::Verbose);
        assert_eq!(run_validate(&a).unwrap(), 0);
        let a = args(dir.path(), r#"["Bob", 3, "b@x.com"]"#, Style::Concise);
        assert_eq!(run_validate(&a).unwrap(), 0);
    }

    #[test]
    fn invalid_instance_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let a = args(dir.path(), r#"{"name": "Bob", "email": "nope"}"#, Style::Verbose);
        assert_eq!(run_validate(&a).unwrap(), 1);
        let a = args(dir.path(), r#"{"name": "Bob", "id": 3}"#, Style::Concise);
        assert_eq!(run_validate(&a).unwrap(), 1);
    }

    #[test]
    fn unknown_type_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path(), "{}", Style::Verbose);
        a.type_name = "Nobody".into();
        assert!(run_validate(&a).is_err());
    }
}
