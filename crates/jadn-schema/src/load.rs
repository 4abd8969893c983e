//! # Schema Loader — Structural Validation
//!
//! Turns a raw schema document into a normalized, *unresolved* [`Package`].
//!
//! ## Design
//!
//! Loading is a pure function of the document. It checks shape only: tuple
//! arity, base-kind names, name syntax, id uniqueness, and option decoding.
//! References between types are left as written; the resolver closes them.
//! The first violation aborts the load.
//!
//! The `info` block is checked against an embedded JSON Schema
//! (`schemas/info.schema.json`, Draft 2020-12). The `types` list is checked
//! by hand so that errors can name the offending type and field id.
//!
//! Documents may be JSON or YAML text; YAML is converted to the same JSON
//! value tree before any checks run.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use jadn_core::{
    BaseKind, Config, FieldDefinition, FieldOptions, ItemDefinition, Location, NameRule,
    SchemaError, TypeBody, TypeDefinition, TypeOptions, TypeRef,
};
use jsonschema::Validator;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;

use crate::format::FormatRegistry;

const INFO_SCHEMA: &str = include_str!("../schemas/info.schema.json");

const TYPE_NAME_SYNTAX: &str = "^[A-Z][-_A-Za-z0-9]*$";
const FIELD_NAME_SYNTAX: &str = "^[a-z][_A-Za-z0-9]*$";

/// The `info` block of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    /// Package URI; the identity used when another schema imports this one.
    pub package: String,
    /// Package version.
    pub version: Option<String>,
    /// Title.
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Comment.
    pub comment: Option<String>,
    /// Copyright notice.
    pub copyright: Option<String>,
    /// License identifier.
    pub license: Option<String>,
    /// Namespace prefix to package URI.
    pub namespaces: BTreeMap<String, String>,
    /// Types intended for use by other packages.
    pub exports: Vec<String>,
    /// Types that may appear as top-level instances.
    pub roots: Vec<String>,
    /// Config overrides.
    pub config: Config,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInfo {
    package: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    copyright: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    namespaces: BTreeMap<String, String>,
    #[serde(default)]
    exports: Vec<String>,
    #[serde(default)]
    roots: Vec<String>,
    #[serde(default)]
    config: serde_json::Map<String, Json>,
}

/// A loaded, unresolved schema.
#[derive(Debug, Clone)]
pub struct Package {
    /// The `info` block, when present.
    pub info: Option<Info>,
    /// Effective config (defaults when `info` or `info.config` is absent).
    pub config: Config,
    /// Type definitions in declared order.
    pub types: Vec<TypeDefinition>,
    /// Format table the schema was checked against.
    pub formats: FormatRegistry,
}

impl Package {
    /// The package URI, when the schema has an `info` block.
    pub fn package_uri(&self) -> Option<&str> {
        self.info.as_ref().map(|i| i.package.as_str())
    }

    /// The URI bound to a namespace prefix.
    pub fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        self.info
            .as_ref()
            .and_then(|i| i.namespaces.get(prefix))
            .map(String::as_str)
    }

    /// Look up a type definition by name.
    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|t| t.name == name)
    }
}

/// Schema loader with a configurable format table.
#[derive(Debug, Clone)]
pub struct Loader {
    formats: FormatRegistry,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(FormatRegistry::standard())
    }
}

impl Loader {
    /// Create a loader that accepts the formats registered in `formats`.
    pub fn new(formats: FormatRegistry) -> Self {
        Self { formats }
    }

    /// The format table used to check `/fmt` options.
    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Load a schema from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Structure` if the text is not JSON, otherwise
    /// whatever [`Loader::load`] returns.
    pub fn load_str(&self, text: &str) -> Result<Package, SchemaError> {
        let doc: Json = serde_json::from_str(text)
            .map_err(|e| SchemaError::structure(section("document"), format!("invalid JSON: {e}")))?;
        self.load(&doc)
    }

    /// Load a schema from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Structure` if the text is not YAML or uses YAML
    /// features with no JSON equivalent, otherwise whatever [`Loader::load`]
    /// returns.
    pub fn load_yaml_str(&self, text: &str) -> Result<Package, SchemaError> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(text)
            .map_err(|e| SchemaError::structure(section("document"), format!("invalid YAML: {e}")))?;
        let doc = yaml_to_json_value(&yaml).map_err(|e| {
            SchemaError::structure(section("document"), format!("YAML-to-JSON conversion failed: {e}"))
        })?;
        self.load(&doc)
    }

    /// Load a schema from a parsed document.
    ///
    /// # Errors
    ///
    /// Returns the first `SchemaError` found. No partial package is returned.
    pub fn load(&self, doc: &Json) -> Result<Package, SchemaError> {
        let root = doc
            .as_object()
            .ok_or_else(|| SchemaError::structure(section("document"), "schema must be an object"))?;
        if let Some(key) = root.keys().find(|k| *k != "info" && *k != "types") {
            return Err(SchemaError::structure(section(key), "unknown top-level key"));
        }

        let info = root.get("info").map(check_info).transpose()?;
        let config = info.as_ref().map(|i| i.config.clone()).unwrap_or_default();
        let raw_types = root
            .get("types")
            .ok_or_else(|| SchemaError::structure(section("types"), "missing type list"))?
            .as_array()
            .ok_or_else(|| SchemaError::structure(section("types"), "type list must be an array"))?;

        let empty = BTreeMap::new();
        let checker = Checker {
            config: &config,
            formats: &self.formats,
            namespaces: info.as_ref().map_or(&empty, |i| &i.namespaces),
            type_names: NameCheck::new(&config.type_name, TYPE_NAME_SYNTAX, "$TypeName")?,
            field_names: NameCheck::new(&config.field_name, FIELD_NAME_SYNTAX, "$FieldName")?,
        };
        let types = checker.type_list(raw_types)?;
        drop(checker);

        debug!(
            package = info.as_ref().map_or("", |i| i.package.as_str()),
            types = types.len(),
            "loaded schema package"
        );
        Ok(Package {
            info,
            config,
            types,
            formats: self.formats.clone(),
        })
    }
}

/// Load a schema document with the standard format table.
///
/// # Errors
///
/// See [`Loader::load`].
pub fn load(doc: &Json) -> Result<Package, SchemaError> {
    Loader::default().load(doc)
}

/// Load JSON schema text with the standard format table.
///
/// # Errors
///
/// See [`Loader::load_str`].
pub fn load_str(text: &str) -> Result<Package, SchemaError> {
    Loader::default().load_str(text)
}

/// Load YAML schema text with the standard format table.
///
/// # Errors
///
/// See [`Loader::load_yaml_str`].
pub fn load_yaml_str(text: &str) -> Result<Package, SchemaError> {
    Loader::default().load_yaml_str(text)
}

fn section(name: &str) -> Location {
    Location::Document(name.to_string())
}

fn info_validator() -> Result<&'static Validator, SchemaError> {
    static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();
    VALIDATOR
        .get_or_init(|| {
            let schema: Json = serde_json::from_str(INFO_SCHEMA).map_err(|e| e.to_string())?;
            let mut opts = jsonschema::options();
            opts.with_draft(jsonschema::Draft::Draft202012);
            opts.build(&schema).map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|reason| {
            SchemaError::structure(section("info"), format!("info meta-schema unusable: {reason}"))
        })
}

fn check_info(value: &Json) -> Result<Info, SchemaError> {
    let validator = info_validator()?;
    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{path}: {e}")
            }
        })
        .collect();
    if !errors.is_empty() {
        return Err(SchemaError::structure(section("info"), errors.join("; ")));
    }

    let raw: RawInfo = serde_json::from_value(value.clone())
        .map_err(|e| SchemaError::structure(section("info"), e.to_string()))?;
    let config = Config::from_json(&raw.config)?;

    let nsid = Regex::new(&config.nsid).map_err(|e| {
        SchemaError::structure(section("info.config.$NSID"), format!("invalid pattern: {e}"))
    })?;
    if let Some(prefix) = raw.namespaces.keys().find(|p| !nsid.is_match(p)) {
        return Err(SchemaError::structure(
            section(&format!("info.namespaces.{prefix}")),
            "namespace prefix does not match $NSID",
        ));
    }

    Ok(Info {
        package: raw.package,
        version: raw.version,
        title: raw.title,
        description: raw.description,
        comment: raw.comment,
        copyright: raw.copyright,
        license: raw.license,
        namespaces: raw.namespaces,
        exports: raw.exports,
        roots: raw.roots,
        config,
    })
}

/// Compiled name rule.
enum NameCheck {
    Syntax { re: Regex, max_len: usize },
    Pattern(Regex),
}

impl NameCheck {
    fn new(rule: &NameRule, syntax: &str, key: &str) -> Result<Self, SchemaError> {
        let compile = |p: &str| {
            Regex::new(p).map_err(|e| {
                SchemaError::structure(
                    section(&format!("info.config.{key}")),
                    format!("invalid pattern: {e}"),
                )
            })
        };
        Ok(match rule {
            NameRule::MaxLength(max_len) => Self::Syntax {
                re: compile(syntax)?,
                max_len: *max_len,
            },
            NameRule::Pattern(p) => Self::Pattern(compile(p)?),
        })
    }

    fn accepts(&self, name: &str) -> bool {
        match self {
            Self::Syntax { re, max_len } => name.chars().count() <= *max_len && re.is_match(name),
            Self::Pattern(re) => re.is_match(name),
        }
    }
}

struct Checker<'a> {
    config: &'a Config,
    formats: &'a FormatRegistry,
    namespaces: &'a BTreeMap<String, String>,
    type_names: NameCheck,
    field_names: NameCheck,
}

impl Checker<'_> {
    fn type_list(&self, raw_types: &[Json]) -> Result<Vec<TypeDefinition>, SchemaError> {
        let mut seen = HashSet::new();
        let mut types = Vec::with_capacity(raw_types.len());
        for (i, raw) in raw_types.iter().enumerate() {
            let def = self.type_definition(i, raw)?;
            if !seen.insert(def.name.clone()) {
                return Err(SchemaError::structure(
                    Location::of_type(&def.name),
                    "duplicate type name",
                ));
            }
            types.push(def);
        }
        Ok(types)
    }

    fn type_definition(&self, index: usize, raw: &Json) -> Result<TypeDefinition, SchemaError> {
        let at = section(&format!("types[{index}]"));
        let tuple = raw
            .as_array()
            .ok_or_else(|| SchemaError::structure(at.clone(), "type definition must be an array"))?;
        if !(2..=5).contains(&tuple.len()) {
            return Err(SchemaError::structure(
                at,
                format!("type definition must have 2 to 5 elements, found {}", tuple.len()),
            ));
        }
        let name = tuple[0]
            .as_str()
            .ok_or_else(|| SchemaError::structure(at, "type name must be a string"))?;
        let loc = Location::of_type(name);
        self.check_type_name(&loc, name)?;

        let kind: BaseKind = tuple[1]
            .as_str()
            .ok_or_else(|| SchemaError::structure(loc.clone(), "base kind must be a string"))?
            .parse()
            .map_err(|e: jadn_core::UnknownBaseKind| SchemaError::structure(loc.clone(), e.to_string()))?;

        let raw_opts = string_list(tuple.get(2), &loc, "type options")?;
        let options = TypeOptions::parse(&raw_opts, kind, self.config)
            .map_err(|e| SchemaError::malformed(loc.clone(), e))?;
        self.check_type_options(&loc, kind, &options, &raw_opts)?;

        let description = self.description(tuple.get(3), &loc)?;
        let body = match tuple.get(4) {
            None => None,
            Some(b) => Some(b.as_array().ok_or_else(|| {
                SchemaError::structure(loc.clone(), "field list must be an array")
            })?),
        };
        let body = self.body(name, kind, &options, body.map(Vec::as_slice))?;

        Ok(TypeDefinition {
            name: name.to_string(),
            kind,
            options,
            description,
            body,
        })
    }

    fn check_type_name(&self, loc: &Location, name: &str) -> Result<(), SchemaError> {
        if name.parse::<BaseKind>().is_ok() {
            return Err(SchemaError::structure(loc.clone(), "type name is a reserved base kind name"));
        }
        if name.contains(self.config.sys) {
            return Err(SchemaError::structure(
                loc.clone(),
                format!("type name contains the reserved character '{}'", self.config.sys),
            ));
        }
        if !self.type_names.accepts(name) {
            return Err(SchemaError::structure(loc.clone(), "invalid type name"));
        }
        Ok(())
    }

    fn check_type_options(
        &self,
        loc: &Location,
        kind: BaseKind,
        options: &TypeOptions,
        raw: &[String],
    ) -> Result<(), SchemaError> {
        let raw_option = |code: char| {
            raw.iter()
                .find(|s| s.starts_with(code))
                .cloned()
                .unwrap_or_default()
        };
        if let Some(fmt) = &options.format {
            if !self.formats.is_registered(kind, fmt) {
                return Err(SchemaError::MalformedOption {
                    location: loc.clone(),
                    option: raw_option('/'),
                    reason: format!("format \"{fmt}\" is not registered for {kind}"),
                });
            }
        }
        if let Some(pattern) = &options.pattern {
            if let Err(e) = Regex::new(pattern) {
                return Err(SchemaError::MalformedOption {
                    location: loc.clone(),
                    option: raw_option('%'),
                    reason: format!("pattern does not compile: {e}"),
                });
            }
        }
        match kind {
            BaseKind::ArrayOf if options.value_type.is_none() => {
                return Err(SchemaError::structure(loc.clone(), "ArrayOf requires an item type option (*)"));
            }
            BaseKind::MapOf if options.key_type.is_none() || options.value_type.is_none() => {
                return Err(SchemaError::structure(
                    loc.clone(),
                    "MapOf requires key type (+) and item type (*) options",
                ));
            }
            _ => {}
        }
        for r in [&options.value_type, &options.key_type].into_iter().flatten() {
            if let TypeRef::Builtin(k) = r {
                if !k.is_primitive() {
                    return Err(SchemaError::structure(
                        loc.clone(),
                        format!("built-in {k} cannot be used as an item or key type"),
                    ));
                }
            }
            self.check_namespace(loc, r)?;
        }
        if let Some(d) = &options.derived {
            self.check_namespace(loc, d.source())?;
        }
        Ok(())
    }

    fn check_namespace(&self, loc: &Location, r: &TypeRef) -> Result<(), SchemaError> {
        match r.namespace() {
            Some(ns) if !self.namespaces.contains_key(ns) => {
                Err(SchemaError::unresolved(loc.clone(), r.as_str()))
            }
            _ => Ok(()),
        }
    }

    fn description(&self, raw: Option<&Json>, loc: &Location) -> Result<String, SchemaError> {
        let desc = match raw {
            None => return Ok(String::new()),
            Some(v) => v
                .as_str()
                .ok_or_else(|| SchemaError::structure(loc.clone(), "description must be a string"))?,
        };
        if let Some(max) = self.config.max_desc {
            if desc.chars().count() > max {
                return Err(SchemaError::structure(
                    loc.clone(),
                    format!("description exceeds $MaxDesc ({max})"),
                ));
            }
        }
        Ok(desc.to_string())
    }

    fn body(
        &self,
        name: &str,
        kind: BaseKind,
        options: &TypeOptions,
        body: Option<&[Json]>,
    ) -> Result<TypeBody, SchemaError> {
        let loc = Location::of_type(name);
        let has_entries = body.is_some_and(|b| !b.is_empty());
        match kind {
            BaseKind::Enumerated if options.derived.is_some() => {
                if has_entries {
                    return Err(SchemaError::structure(loc, "derived enumeration must not list items"));
                }
                Ok(TypeBody::Empty)
            }
            BaseKind::Enumerated => {
                let items = body.ok_or_else(|| SchemaError::structure(loc, "Enumerated requires an item list"))?;
                Ok(TypeBody::Items(self.items(name, items)?))
            }
            k if k.has_fields() => {
                let fields = body.ok_or_else(|| SchemaError::structure(loc, format!("{k} requires a field list")))?;
                Ok(TypeBody::Fields(self.fields(name, kind, fields)?))
            }
            k => {
                if has_entries {
                    return Err(SchemaError::structure(loc, format!("{k} must not have a field list")));
                }
                Ok(TypeBody::Empty)
            }
        }
    }

    fn items(&self, type_name: &str, raw: &[Json]) -> Result<Vec<ItemDefinition>, SchemaError> {
        let loc = Location::of_type(type_name);
        let mut ids = HashSet::new();
        let mut labels = HashSet::new();
        let mut items = Vec::with_capacity(raw.len());
        for (j, entry) in raw.iter().enumerate() {
            let shape = || SchemaError::structure(loc.clone(), format!("item {j} must be [id, label, description?]"));
            let tuple = entry.as_array().filter(|t| (2..=3).contains(&t.len())).ok_or_else(shape)?;
            let id = tuple[0].as_i64().ok_or_else(shape)?;
            let value = tuple[1].as_str().ok_or_else(shape)?;
            let item_loc = Location::of_field(type_name, id, value);
            let description = self.description(tuple.get(2), &item_loc)?;
            if !ids.insert(id) {
                return Err(SchemaError::structure(item_loc, "duplicate item id"));
            }
            if !labels.insert(value.to_string()) {
                return Err(SchemaError::structure(item_loc, "duplicate item label"));
            }
            items.push(ItemDefinition {
                id,
                value: value.to_string(),
                description,
            });
        }
        Ok(items)
    }

    fn fields(
        &self,
        type_name: &str,
        kind: BaseKind,
        raw: &[Json],
    ) -> Result<Vec<FieldDefinition>, SchemaError> {
        let loc = Location::of_type(type_name);
        let positional = matches!(kind, BaseKind::Array | BaseKind::Record);
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        let mut fields = Vec::with_capacity(raw.len());
        for (j, entry) in raw.iter().enumerate() {
            let shape = |what: &str| {
                SchemaError::structure(loc.clone(), format!("field {j}: {what}"))
            };
            let tuple = entry
                .as_array()
                .filter(|t| (3..=5).contains(&t.len()))
                .ok_or_else(|| shape("must be [id, name, type, options?, description?]"))?;
            let id = tuple[0]
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .ok_or_else(|| shape("id must be a positive integer"))?;
            let name = tuple[1].as_str().ok_or_else(|| shape("name must be a string"))?;
            let field_loc = Location::of_field(type_name, i64::from(id), name);
            if !self.field_names.accepts(name) {
                return Err(SchemaError::structure(field_loc, "invalid field name"));
            }
            if positional && id as usize != j + 1 {
                return Err(SchemaError::structure(
                    field_loc,
                    format!("{kind} field id must equal its position {}", j + 1),
                ));
            }
            let type_ref = tuple[2]
                .as_str()
                .ok_or_else(|| SchemaError::structure(field_loc.clone(), "field type must be a string"))
                .and_then(|s| {
                    TypeRef::parse(s).map_err(|reason| SchemaError::structure(field_loc.clone(), reason))
                })?;
            if let TypeRef::Builtin(k) = &type_ref {
                if !k.is_primitive() {
                    return Err(SchemaError::structure(
                        field_loc,
                        format!("built-in {k} cannot be used directly as a field type"),
                    ));
                }
            }
            self.check_namespace(&field_loc, &type_ref)?;
            let raw_opts = string_list(tuple.get(3), &field_loc, "field options")?;
            let options = FieldOptions::parse(&raw_opts, self.config)
                .map_err(|e| SchemaError::malformed(field_loc.clone(), e))?;
            let description = self.description(tuple.get(4), &field_loc)?;
            if !ids.insert(id) {
                return Err(SchemaError::structure(field_loc, "duplicate field id"));
            }
            if !names.insert(name.to_string()) {
                return Err(SchemaError::structure(field_loc, "duplicate field name"));
            }
            fields.push(FieldDefinition {
                id,
                name: name.to_string(),
                type_ref,
                options,
                description,
            });
        }
        Ok(fields)
    }
}

fn string_list(raw: Option<&Json>, loc: &Location, what: &str) -> Result<Vec<String>, SchemaError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let bad = || SchemaError::structure(loc.clone(), format!("{what} must be an array of strings"));
    raw.as_array()
        .ok_or_else(bad)?
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(bad))
        .collect()
}

/// Convert a `serde_yaml::Value` to a `serde_json::Value`.
///
/// Schemas and instances use only the JSON-compatible subset of YAML. Tags
/// are dropped and scalar map keys are stringified.
///
/// # Errors
///
/// Returns a reason for non-finite floats and non-scalar map keys.
pub fn yaml_to_json_value(yaml: &serde_yaml::Value) -> Result<Json, String> {
    match yaml {
        serde_yaml::Value::Null => Ok(Json::Null),
        serde_yaml::Value::Bool(b) => Ok(Json::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Json::Number(serde_json::Number::from(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(Json::Number(serde_json::Number::from(u)))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Json::Number)
                    .ok_or_else(|| format!("cannot represent float {f} in JSON"))
            } else {
                Err(format!("unsupported YAML number: {n:?}"))
            }
        }
        serde_yaml::Value::String(s) => Ok(Json::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => seq
            .iter()
            .map(yaml_to_json_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Json::Array),
        serde_yaml::Value::Mapping(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported YAML map key type: {other:?}")),
                };
                out.insert(key, yaml_to_json_value(v)?);
            }
            Ok(Json::Object(out))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json_value(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jadn_core::ItemSemantics;
    use serde_json::json;

    fn person() -> Json {
        json!({
            "info": {"package": "http://example.com/person"},
            "types": [
                ["Person", "Record", [], "A person", [
                    [1, "name", "String", [], ""],
                    [2, "id", "Integer", [], ""],
                    [3, "email", "String", ["[0"], ""]
                ]]
            ]
        })
    }

    fn structure_reason(err: SchemaError) -> String {
        match err {
            SchemaError::Structure { reason, .. } => reason,
            other => panic!("Expected Structure, got: {other}"),
        }
    }

    #[test]
    fn loads_person_record() {
        let pkg = load(&person()).unwrap();
        assert_eq!(pkg.package_uri(), Some("http://example.com/person"));
        let def = pkg.get("Person").unwrap();
        assert_eq!(def.kind, BaseKind::Record);
        assert_eq!(def.description, "A person");
        let email = def.field_by_name("email").unwrap();
        assert!(email.options.is_optional());
        assert_eq!(email.type_ref, TypeRef::Builtin(BaseKind::String));
    }

    #[test]
    fn info_is_optional_but_package_is_required() {
        let pkg = load(&json!({"types": [["Id", "Integer"]]})).unwrap();
        assert!(pkg.info.is_none());
        assert_eq!(pkg.config, Config::default());

        let err = load(&json!({"info": {"title": "x"}, "types": []})).unwrap_err();
        match err {
            SchemaError::Structure { location, reason } => {
                assert_eq!(location, Location::Document("info".into()));
                assert!(reason.contains("package"), "{reason}");
            }
            other => panic!("Expected Structure, got: {other}"),
        }
    }

    #[test]
    fn unknown_info_key_rejected() {
        let err = load(&json!({"info": {"package": "p", "author": "me"}, "types": []})).unwrap_err();
        assert!(matches!(err, SchemaError::Structure { .. }));
    }

    #[test]
    fn tuple_arity_enforced() {
        let reason = structure_reason(load(&json!({"types": [["T"]]})).unwrap_err());
        assert!(reason.contains("2 to 5"));
        let err = load(&json!({"types": [["T", "Record", [], "", [[1, "a"]]]]})).unwrap_err();
        assert!(matches!(err, SchemaError::Structure { .. }));
        let err = load(&json!({"types": [["E", "Enumerated", [], "", [[1]]]]})).unwrap_err();
        assert!(matches!(err, SchemaError::Structure { .. }));
    }

    #[test]
    fn unknown_base_kind_rejected() {
        let reason = structure_reason(load(&json!({"types": [["T", "Struct"]]})).unwrap_err());
        assert!(reason.contains("Struct"));
    }

    #[test]
    fn type_name_rules() {
        for bad in ["String", "lower", "Has Space", "A/B"] {
            let err = load(&json!({"types": [[bad, "Integer"]]})).unwrap_err();
            assert!(matches!(err, SchemaError::Structure { .. }), "{bad}");
        }
        let long = "T".repeat(65);
        assert!(load(&json!({"types": [[long, "Integer"]]})).is_err());
        assert!(load(&json!({"types": [["Ok-Name_2", "Integer"]]})).is_ok());
    }

    #[test]
    fn configured_sys_and_name_length() {
        let doc = json!({
            "info": {"package": "p", "config": {"$Sys": "$", "$TypeName": 8}},
            "types": [["A/B", "Integer"]]
        });
        assert!(load(&doc).is_err(), "'/' is not a legal type-name character");
        let doc = json!({
            "info": {"package": "p", "config": {"$TypeName": 4}},
            "types": [["Short", "Integer"]]
        });
        assert!(load(&doc).is_err());
    }

    #[test]
    fn field_rules() {
        let cases = [
            json!([[1, "Name", "String"]]),
            json!([[1, "a", "String"], [1, "b", "String"]]),
            json!([[1, "a", "String"], [2, "a", "String"]]),
            json!([[2, "a", "String"]]),
            json!([[1, "a", "Record"]]),
            json!([[0, "a", "String"]]),
            json!([[1, "a", 5]]),
        ];
        for fields in cases {
            let doc = json!({"types": [["T", "Record", [], "", fields]]});
            assert!(load(&doc).is_err(), "{doc}");
        }
    }

    #[test]
    fn map_and_choice_ids_need_not_be_positional() {
        let doc = json!({"types": [
            ["M", "Map", [], "", [[5, "a", "String"], [9, "b", "String"]]],
            ["C", "Choice", [], "", [[3, "x", "String"]]]
        ]});
        assert!(load(&doc).is_ok());
    }

    #[test]
    fn malformed_option_names_tuple() {
        let doc = json!({"types": [["T", "Record", [], "", [[1, "a", "String", ["?1"]]]]]});
        match load(&doc).unwrap_err() {
            SchemaError::MalformedOption { location, option, .. } => {
                assert_eq!(location, Location::of_field("T", 1, "a"));
                assert_eq!(option, "?1");
            }
            other => panic!("Expected MalformedOption, got: {other}"),
        }
    }

    #[test]
    fn option_for_wrong_kind_is_structural() {
        let err = load(&json!({"types": [["T", "String", ["q"]]]})).unwrap_err();
        match err {
            SchemaError::Structure { location, reason } => {
                assert_eq!(location, Location::of_type("T"));
                assert!(reason.contains("String"), "{reason}");
            }
            other => panic!("Expected Structure, got: {other}"),
        }
    }

    #[test]
    fn format_must_be_registered_for_kind() {
        let err = load(&json!({"types": [["T", "String", ["/i16"]]]})).unwrap_err();
        assert!(matches!(err, SchemaError::MalformedOption { ref option, .. } if option == "/i16"));
        assert!(load(&json!({"types": [["T", "Integer", ["/i16"]]]})).is_ok());
        assert!(load(&json!({"types": [["T", "Integer", ["/u12"]]]})).is_ok());
    }

    #[test]
    fn custom_format_accepted_by_custom_loader() {
        let mut formats = FormatRegistry::standard();
        formats.register("sku", BaseKind::String, |_| Ok(()));
        let loader = Loader::new(formats);
        assert!(loader.load(&json!({"types": [["T", "String", ["/sku"]]]})).is_ok());
        assert!(load(&json!({"types": [["T", "String", ["/sku"]]]})).is_err());
    }

    #[test]
    fn pattern_must_compile() {
        let err = load(&json!({"types": [["T", "String", ["%(open"]]]})).unwrap_err();
        assert!(matches!(err, SchemaError::MalformedOption { .. }));
    }

    #[test]
    fn required_options_and_bodies() {
        assert!(load(&json!({"types": [["L", "ArrayOf", []]]})).is_err());
        assert!(load(&json!({"types": [["M", "MapOf", ["*String"]]]})).is_err());
        assert!(load(&json!({"types": [["R", "Record", []]]})).is_err());
        assert!(load(&json!({"types": [["I", "Integer", [], "", [[1, "a", "String"]]]]})).is_err());
        assert!(load(&json!({"types": [["E", "Enumerated", ["#R"], "", [[1, "a"]]]]})).is_err());
        assert!(load(&json!({"types": [["E", "Enumerated", ["#R"], ""]]})).is_ok());
        assert!(load(&json!({"types": [["L", "ArrayOf", ["*Record"]]]})).is_err());
    }

    #[test]
    fn config_substitution_in_size_option() {
        let doc = json!({
            "info": {"package": "p", "config": {"$MaxString": 40}},
            "types": [["T", "String", ["}$MaxString"]]]
        });
        let pkg = load(&doc).unwrap();
        assert_eq!(pkg.get("T").unwrap().options.max_size, Some(40));
    }

    #[test]
    fn unknown_namespace_prefix_is_unresolved() {
        let doc = json!({
            "info": {"package": "p", "namespaces": {"ls": "http://example.com/ls"}},
            "types": [["T", "Record", [], "", [
                [1, "a", "ls:Location"],
                [2, "b", "xx:Other"]
            ]]]
        });
        match load(&doc).unwrap_err() {
            SchemaError::UnresolvedReference { reference, location } => {
                assert_eq!(reference, "xx:Other");
                assert_eq!(location, Location::of_field("T", 2, "b"));
            }
            other => panic!("Expected UnresolvedReference, got: {other}"),
        }
    }

    #[test]
    fn namespace_prefix_must_match_nsid() {
        let doc = json!({
            "info": {"package": "p", "namespaces": {"toolongprefix": "http://x"}},
            "types": []
        });
        assert!(load(&doc).is_err());
    }

    #[test]
    fn description_length_cap() {
        let doc = json!({
            "info": {"package": "p", "config": {"$MaxDesc": 5}},
            "types": [["T", "Integer", [], "far too long"]]
        });
        let reason = structure_reason(load(&doc).unwrap_err());
        assert!(reason.contains("$MaxDesc"));
    }

    #[test]
    fn duplicate_type_and_item_rejected() {
        assert!(load(&json!({"types": [["T", "Integer"], ["T", "String"]]})).is_err());
        let doc = json!({"types": [["E", "Enumerated", [], "", [[1, "a"], [1, "b"]]]]});
        assert!(load(&doc).is_err());
        let doc = json!({"types": [["E", "Enumerated", [], "", [[1, "a"], [2, "a"]]]]});
        assert!(load(&doc).is_err());
    }

    #[test]
    fn array_of_semantics_loaded() {
        let pkg = load(&json!({"types": [["S", "ArrayOf", ["*String", "s"]]]})).unwrap();
        assert_eq!(pkg.get("S").unwrap().options.semantics, Some(ItemSemantics::Set));
    }

    #[test]
    fn yaml_and_json_text_load_identically() {
        let yaml = r#"
info:
  package: http://example.com/person
types:
  - [Person, Record, [], A person, [[1, name, String, [], ""], [2, id, Integer, [], ""], [3, email, String, ["[0"], ""]]]
"#;
        let from_yaml = load_yaml_str(yaml).unwrap();
        let from_json = load_str(&person().to_string()).unwrap();
        assert_eq!(from_yaml.types, from_json.types);
        assert_eq!(from_yaml.info, from_json.info);
    }

    #[test]
    fn invalid_text_is_structure_error() {
        assert!(matches!(load_str("{not json"), Err(SchemaError::Structure { .. })));
        assert!(matches!(load(&json!([1, 2])), Err(SchemaError::Structure { .. })));
        assert!(load(&json!({"types": [], "extra": 1})).is_err());
    }

    #[test]
    fn yaml_to_json_value_converts_keys() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("1: a\ntrue: [x, 2.5]").unwrap();
        let json = yaml_to_json_value(&yaml).unwrap();
        assert_eq!(json, json!({"1": "a", "true": ["x", 2.5]}));
    }
}
