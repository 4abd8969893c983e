//! # Schema Configuration
//!
//! Typed view of `info.config`. Values not given in the schema fall back to
//! the defaults below. Config keys are a closed set; an unknown `$` key is a
//! structure error rather than being silently ignored.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Location, SchemaError};

/// Default maximum octets for Binary values.
pub const DEFAULT_MAX_BINARY: u64 = 255;
/// Default maximum characters for String values.
pub const DEFAULT_MAX_STRING: u64 = 255;
/// Default maximum elements for container values.
pub const DEFAULT_MAX_ELEMENTS: u64 = 100;
/// Default system separator character.
pub const DEFAULT_SYS: char = '/';
/// Default length cap for type and field names.
pub const DEFAULT_NAME_LENGTH: usize = 64;
/// Default namespace prefix pattern.
pub const DEFAULT_NSID: &str = "^([A-Za-z][A-Za-z0-9]{0,7})?$";

/// Rule applied to type or field names.
///
/// An integer config value caps the name length and keeps the built-in
/// character rules; a string value replaces them with a regular expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NameRule {
    /// Built-in syntax with a maximum length.
    MaxLength(usize),
    /// Regular expression the whole name must match.
    Pattern(String),
}

/// Config overrides consumed from `info.config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// `$MaxBinary`
    pub max_binary: u64,
    /// `$MaxString`
    pub max_string: u64,
    /// `$MaxElements`
    pub max_elements: u64,
    /// `$Sys`: reserved separator for generated names and pointer paths.
    pub sys: char,
    /// `$TypeName`
    pub type_name: NameRule,
    /// `$FieldName`
    pub field_name: NameRule,
    /// `$NSID`: namespace prefix pattern.
    pub nsid: String,
    /// `$MaxDesc`: maximum description length, unbounded when absent.
    pub max_desc: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_binary: DEFAULT_MAX_BINARY,
            max_string: DEFAULT_MAX_STRING,
            max_elements: DEFAULT_MAX_ELEMENTS,
            sys: DEFAULT_SYS,
            type_name: NameRule::MaxLength(DEFAULT_NAME_LENGTH),
            field_name: NameRule::MaxLength(DEFAULT_NAME_LENGTH),
            nsid: DEFAULT_NSID.to_string(),
            max_desc: None,
        }
    }
}

impl Config {
    /// Build a config from the `info.config` object, starting from defaults.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Structure` for unknown keys and for values of the
    /// wrong JSON type or out of range.
    pub fn from_json(config: &Map<String, Value>) -> Result<Self, SchemaError> {
        let mut out = Self::default();
        for (key, value) in config {
            let loc = || Location::Document(format!("info.config.{key}"));
            match key.as_str() {
                "$MaxBinary" => out.max_binary = positive(value).ok_or_else(|| bad(loc()))?,
                "$MaxString" => out.max_string = positive(value).ok_or_else(|| bad(loc()))?,
                "$MaxElements" => out.max_elements = positive(value).ok_or_else(|| bad(loc()))?,
                "$Sys" => {
                    let s = value.as_str().unwrap_or_default();
                    let mut chars = s.chars();
                    out.sys = match (chars.next(), chars.next()) {
                        (Some(c), None) if !c.is_alphanumeric() => c,
                        _ => {
                            return Err(SchemaError::structure(
                                loc(),
                                "must be a single non-alphanumeric character",
                            ))
                        }
                    };
                }
                "$TypeName" => out.type_name = name_rule(value).ok_or_else(|| bad(loc()))?,
                "$FieldName" => out.field_name = name_rule(value).ok_or_else(|| bad(loc()))?,
                "$NSID" => {
                    out.nsid = value
                        .as_str()
                        .map(str::to_string)
                        .ok_or_else(|| SchemaError::structure(loc(), "must be a pattern string"))?;
                }
                "$MaxDesc" => {
                    out.max_desc = Some(positive(value).ok_or_else(|| bad(loc()))? as usize);
                }
                _ => return Err(SchemaError::structure(loc(), "unknown config key")),
            }
        }
        Ok(out)
    }

    /// Look up a numeric config value by key, as used in `}$MaxString` options.
    pub fn size_value(&self, key: &str) -> Option<u64> {
        match key {
            "$MaxBinary" => Some(self.max_binary),
            "$MaxString" => Some(self.max_string),
            "$MaxElements" => Some(self.max_elements),
            _ => None,
        }
    }
}

fn positive(value: &Value) -> Option<u64> {
    value.as_u64().filter(|n| *n > 0)
}

fn name_rule(value: &Value) -> Option<NameRule> {
    match value {
        Value::String(p) => Some(NameRule::Pattern(p.clone())),
        other => positive(other).map(|n| NameRule::MaxLength(n as usize)),
    }
}

fn bad(location: Location) -> SchemaError {
    SchemaError::structure(location, "must be a positive integer")
}
