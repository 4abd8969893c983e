//! # Instance Validation
//!
//! Checks an in-memory [`Value`] against a type of a resolved
//! [`TypeRegistry`].
//!
//! ## Design
//!
//! Validation does not stop at the first problem. Every violation is
//! collected with the path (field names and sequence indices) to the
//! offending node, so a caller can report everything in one pass.
//!
//! Key uniqueness across a collection of instances is not a property of any
//! single instance; callers holding the collection use
//! [`check_unique_keys`].

use std::collections::BTreeMap;
use std::fmt;

use jadn_core::{BaseKind, FieldDefinition, TypeDefinition, TypeOptions, TypeRef, Value};
use thiserror::Error;

use crate::registry::TypeRegistry;

/// One step of a path into an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Field, member or map key name.
    Field(String),
    /// Sequence index.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "/{name}"),
            Self::Index(i) => write!(f, "/{i}"),
        }
    }
}

/// A single validation violation with structured context.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Path from the root value to the violating node.
    pub path: Vec<PathSegment>,
    /// Type the node was checked against.
    pub type_name: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl Violation {
    /// The path rendered as `/a/0/b`; empty for the root.
    pub fn path_string(&self) -> String {
        self.path.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "  (root) [{}]: {}", self.type_name, self.message)
        } else {
            write!(f, "  {} [{}]: {}", self.path_string(), self.type_name, self.message)
        }
    }
}

/// Collection of validation violations.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationViolations {
    violations: Vec<Violation>,
}

impl ValidationViolations {
    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns true if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns a slice of all violations.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Consumes self and returns the inner Vec.
    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for ValidationViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// Error during instance validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The requested root type is not in the registry.
    #[error("unknown type \"{type_name}\"")]
    UnknownType {
        /// Requested type name.
        type_name: String,
    },

    /// The value did not conform to the type.
    #[error("validation failed against type '{type_name}':\n{violations}")]
    Failed {
        /// Root type name.
        type_name: String,
        /// Every violation found.
        violations: ValidationViolations,
    },
}

impl ValidationError {
    /// Violations, when validation ran and failed.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Failed { violations, .. } => violations.violations(),
            Self::UnknownType { .. } => &[],
        }
    }
}

/// Validates values against the types of one registry.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> Validator<'r> {
    /// Create a validator over `registry`.
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    /// Validate `value` against `type_name`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnknownType` if the type is not defined and
    /// `ValidationError::Failed` with every violation otherwise.
    pub fn validate(&self, type_name: &str, value: &Value) -> Result<(), ValidationError> {
        let violations = self.violations(type_name, value)?;
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Failed {
                type_name: type_name.to_string(),
                violations: ValidationViolations { violations },
            })
        }
    }

    /// All violations of `value` against `type_name`; empty when valid.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnknownType` if the type is not defined.
    pub fn violations(&self, type_name: &str, value: &Value) -> Result<Vec<Violation>, ValidationError> {
        let def = self
            .registry
            .get(type_name)
            .ok_or_else(|| ValidationError::UnknownType {
                type_name: type_name.to_string(),
            })?;
        let mut walk = Walk {
            reg: self.registry,
            path: Vec::new(),
            out: Vec::new(),
        };
        walk.check_type(def, value);
        Ok(walk.out)
    }
}

/// Validate `value` against `type_name` in `registry`.
///
/// # Errors
///
/// See [`Validator::validate`].
pub fn validate(registry: &TypeRegistry, type_name: &str, value: &Value) -> Result<(), ValidationError> {
    Validator::new(registry).validate(type_name, value)
}

/// Check that the combined `K` field values of a collection are unique.
///
/// Each instance after the first with a given key is reported at its index.
/// Instances that lack a key field are reported as well. Types with no key
/// fields always pass.
///
/// # Errors
///
/// Returns `ValidationError::UnknownType` if the type is not defined and
/// `ValidationError::Failed` listing every duplicate.
pub fn check_unique_keys(
    registry: &TypeRegistry,
    type_name: &str,
    instances: &[Value],
) -> Result<(), ValidationError> {
    let def = registry.get(type_name).ok_or_else(|| ValidationError::UnknownType {
        type_name: type_name.to_string(),
    })?;
    let keys: Vec<&FieldDefinition> = def.key_fields().collect();
    if keys.is_empty() {
        return Ok(());
    }

    let mut seen: Vec<(usize, Vec<&Value>)> = Vec::with_capacity(instances.len());
    let mut violations = Vec::new();
    for (i, instance) in instances.iter().enumerate() {
        let Some(key) = key_of(def, &keys, instance) else {
            violations.push(Violation {
                path: vec![PathSegment::Index(i)],
                type_name: type_name.to_string(),
                message: "instance has no value for its key field".to_string(),
            });
            continue;
        };
        match seen.iter().find(|(_, k)| *k == key) {
            Some((first, _)) => violations.push(Violation {
                path: vec![PathSegment::Index(i)],
                type_name: type_name.to_string(),
                message: format!("duplicate key, same as instance {first}"),
            }),
            None => seen.push((i, key)),
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Failed {
            type_name: type_name.to_string(),
            violations: ValidationViolations { violations },
        })
    }
}

fn key_of<'v>(def: &TypeDefinition, keys: &[&FieldDefinition], instance: &'v Value) -> Option<Vec<&'v Value>> {
    keys.iter()
        .map(|k| field_value(def, k, instance).filter(|v| !v.is_null()))
        .collect()
}

/// The value of a field in a container instance, by name or position.
pub(crate) fn field_value<'v>(def: &TypeDefinition, field: &FieldDefinition, instance: &'v Value) -> Option<&'v Value> {
    match (def.kind, instance) {
        (BaseKind::Array, Value::Array(items)) => items.get(field.id as usize - 1),
        (_, Value::Map(m)) => m.get(&field.name),
        _ => None,
    }
}

/// Select the Choice member an explicitly tagged field holds.
///
/// `tag` is the sibling field's value: an item label, or an item id when the
/// sibling's Enumerated has `=`.
pub(crate) fn tag_member<'r>(
    reg: &'r TypeRegistry,
    container: &TypeDefinition,
    field: &FieldDefinition,
    tag: Option<&Value>,
) -> Result<(&'r TypeDefinition, &'r FieldDefinition), String> {
    let sibling = field
        .options
        .tag_id
        .and_then(|id| container.field_by_id(id))
        .ok_or_else(|| format!("field {} has no tag field", field.name))?;
    let domain = reg
        .get(sibling.type_ref.as_str())
        .ok_or_else(|| format!("tag type {} is not defined", sibling.type_ref))?;
    let choice = reg
        .get(field.type_ref.as_str())
        .ok_or_else(|| format!("tagged type {} is not defined", field.type_ref))?;
    let label = match tag {
        None | Some(Value::Null) => return Err(format!("tag field {} is absent", sibling.name)),
        Some(Value::String(s)) => s.as_str(),
        Some(Value::Integer(id)) => domain
            .item_by_id(*id)
            .map(|item| item.value.as_str())
            .ok_or_else(|| format!("tag value {id} is not an item of {}", domain.name))?,
        Some(other) => return Err(format!("tag field {} holds a {}", sibling.name, other.kind_name())),
    };
    let member = choice
        .field_by_name(label)
        .ok_or_else(|| format!("tag value \"{label}\" does not select a member of {}", choice.name))?;
    Ok((choice, member))
}

fn size_bounds(opts: &TypeOptions, default_max: u64) -> (u64, Option<u64>) {
    let min = opts.min_size.map_or(0, |n| n.max(0) as u64);
    let max = match opts.max_size {
        Some(0) => None,
        Some(n) => Some(n.max(0) as u64),
        None => Some(default_max),
    };
    (min, max)
}

fn size_of(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => Some(s.chars().count() as u64),
        Value::Binary(b) => Some(b.len() as u64),
        Value::Array(a) => Some(a.len() as u64),
        Value::Map(m) => Some(m.len() as u64),
        _ => None,
    }
}

struct Walk<'r> {
    reg: &'r TypeRegistry,
    path: Vec<PathSegment>,
    out: Vec<Violation>,
}

impl<'r> Walk<'r> {
    fn report(&mut self, type_name: &str, message: impl Into<String>) {
        self.out.push(Violation {
            path: self.path.clone(),
            type_name: type_name.to_string(),
            message: message.into(),
        });
    }

    fn at(&mut self, segment: PathSegment, f: impl FnOnce(&mut Self)) {
        self.path.push(segment);
        f(self);
        self.path.pop();
    }

    fn mismatch(&mut self, type_name: &str, kind: BaseKind, value: &Value) {
        self.report(type_name, format!("expected {kind}, found {}", value.kind_name()));
    }

    fn check_ref(&mut self, r: &TypeRef, value: &Value) {
        let reg = self.reg;
        match r {
            TypeRef::Builtin(kind) if !kind.is_primitive() => {}
            TypeRef::Builtin(kind) => {
                let opts = TypeOptions::default();
                self.check_primitive(kind.as_str(), *kind, &opts, value);
            }
            TypeRef::Named(name) => match reg.get(name) {
                Some(def) => self.check_type(def, value),
                None => self.report(name, "type is not defined"),
            },
        }
    }

    fn check_type(&mut self, def: &'r TypeDefinition, value: &Value) {
        match def.kind {
            BaseKind::Binary
            | BaseKind::Boolean
            | BaseKind::Integer
            | BaseKind::Number
            | BaseKind::String => self.check_primitive(&def.name, def.kind, &def.options, value),
            BaseKind::Enumerated => self.check_enumerated(def, value),
            BaseKind::Choice => self.check_choice(def, value),
            BaseKind::Array => self.check_array(def, value),
            BaseKind::ArrayOf => self.check_array_of(def, value),
            BaseKind::Map | BaseKind::Record => self.check_map(def, value),
            BaseKind::MapOf => self.check_map_of(def, value),
        }
    }

    fn check_format(&mut self, type_name: &str, kind: BaseKind, opts: &TypeOptions, value: &Value) {
        if let Some(fmt) = &opts.format {
            if let Err(reason) = self.reg.formats().check(kind, fmt, value) {
                self.report(type_name, format!("format {fmt}: {reason}"));
            }
        }
    }

    fn check_size(&mut self, type_name: &str, what: &str, n: u64, bounds: (u64, Option<u64>)) {
        let (min, max) = bounds;
        if n < min {
            self.report(type_name, format!("{what} {n} is less than minimum {min}"));
        }
        if let Some(max) = max {
            if n > max {
                self.report(type_name, format!("{what} {n} exceeds maximum {max}"));
            }
        }
    }

    fn check_primitive(&mut self, type_name: &str, kind: BaseKind, opts: &TypeOptions, value: &Value) {
        let reg = self.reg;
        let config = reg.config();
        match (kind, value) {
            (BaseKind::Binary, Value::Binary(b)) => {
                self.check_size(type_name, "length", b.len() as u64, size_bounds(opts, config.max_binary));
            }
            (BaseKind::Boolean, Value::Bool(_)) => {}
            (BaseKind::Integer, Value::Integer(n)) => {
                if let Some(min) = opts.min_size.filter(|min| n < min) {
                    self.report(type_name, format!("{n} is less than minimum {min}"));
                }
                if let Some(max) = opts.max_size.filter(|max| n > max) {
                    self.report(type_name, format!("{n} exceeds maximum {max}"));
                }
            }
            (BaseKind::Number, Value::Number(x)) => {
                if !x.is_finite() {
                    self.report(type_name, "number is not finite");
                }
                if let Some(min) = opts.min_value.filter(|min| x < min) {
                    self.report(type_name, format!("{x} is less than minimum {min}"));
                }
                if let Some(max) = opts.max_value.filter(|max| x > max) {
                    self.report(type_name, format!("{x} exceeds maximum {max}"));
                }
            }
            (BaseKind::String, Value::String(s)) => {
                let len = s.chars().count() as u64;
                self.check_size(type_name, "length", len, size_bounds(opts, config.max_string));
                if let Some(re) = reg.pattern(type_name) {
                    if !re.is_match(s) {
                        self.report(type_name, format!("\"{s}\" does not match pattern {}", re.as_str()));
                    }
                }
            }
            _ => return self.mismatch(type_name, kind, value),
        }
        self.check_format(type_name, kind, opts, value);
    }

    fn check_enumerated(&mut self, def: &TypeDefinition, value: &Value) {
        let known = match value {
            Value::Integer(id) if def.options.id => def.item_by_id(*id).is_some(),
            Value::String(label) if !def.options.id => def.item_by_value(label).is_some(),
            Value::Integer(id) if def.item_by_id(*id).is_some() => {
                return self.report(&def.name, format!("item {id} must be given by its label"));
            }
            Value::Integer(_) | Value::String(_) if def.options.extensible => false,
            other => {
                let expected = if def.options.id { "an item id" } else { "an item label" };
                return self.report(&def.name, format!("expected {expected}, found {}", other.kind_name()));
            }
        };
        if !known && !def.options.extensible {
            let shown = match value {
                Value::String(s) => format!("\"{s}\""),
                Value::Integer(n) => n.to_string(),
                other => other.kind_name().to_string(),
            };
            self.report(&def.name, format!("{shown} is not an item of {}", def.name));
        }
    }

    fn check_choice(&mut self, def: &'r TypeDefinition, value: &Value) {
        let Value::Map(m) = value else {
            return self.mismatch(&def.name, def.kind, value);
        };
        if m.len() != 1 {
            return self.report(&def.name, format!("Choice must have exactly one member, found {}", m.len()));
        }
        self.check_null_members(&def.name, m);
        for (name, v) in m.iter().filter(|(_, v)| !v.is_null()) {
            match def.field_by_name(name) {
                Some(field) => self.at(PathSegment::Field(name.clone()), |w| w.check_field_value(field, v)),
                None if def.options.extensible => {}
                None => self.report(&def.name, format!("\"{name}\" is not a member of {}", def.name)),
            }
        }
    }

    fn check_array(&mut self, def: &'r TypeDefinition, value: &Value) {
        let Value::Array(items) = value else {
            return self.mismatch(&def.name, def.kind, value);
        };
        let fields = def.body.fields();
        if items.len() > fields.len() && !def.options.extensible {
            self.report(&def.name, format!("{} elements exceed the {} declared fields", items.len(), fields.len()));
        }
        let present = items.iter().filter(|v| !v.is_null()).count() as u64;
        self.check_size(&def.name, "element count", present, size_bounds(&def.options, self.reg.config().max_elements));
        self.check_fields(def, value);
        self.check_format(&def.name, def.kind, &def.options, value);
    }

    fn check_map(&mut self, def: &'r TypeDefinition, value: &Value) {
        let Value::Map(m) = value else {
            return self.mismatch(&def.name, def.kind, value);
        };
        if !def.options.extensible {
            for key in m.keys().filter(|k| def.field_by_name(k).is_none()) {
                let key = key.clone();
                self.at(PathSegment::Field(key), |w| w.report(&def.name, "field is not defined"));
            }
        }
        self.check_null_members(&def.name, m);
        let present = m.values().filter(|v| !v.is_null()).count() as u64;
        self.check_size(&def.name, "field count", present, size_bounds(&def.options, self.reg.config().max_elements));
        self.check_fields(def, value);
    }

    /// Absent members are omitted from the map; only Array slots hold `Null`.
    fn check_null_members(&mut self, type_name: &str, members: &BTreeMap<String, Value>) {
        for name in members.iter().filter(|(_, v)| v.is_null()).map(|(k, _)| k) {
            self.at(PathSegment::Field(name.clone()), |w| {
                w.report(type_name, "null member; omit an absent field instead")
            });
        }
    }

    fn check_fields(&mut self, def: &'r TypeDefinition, value: &Value) {
        for (i, field) in def.body.fields().iter().enumerate() {
            let segment = match def.kind {
                BaseKind::Array => PathSegment::Index(i),
                _ => PathSegment::Field(field.name.clone()),
            };
            let slot = field_value(def, field, value).filter(|v| !v.is_null());
            self.at(segment, |w| match slot {
                None if field.options.is_optional() => {}
                None => w.report(&def.name, format!("missing required field {}", field.name)),
                Some(v) if field.options.tag_id.is_some() => {
                    let tag = field
                        .options
                        .tag_id
                        .and_then(|id| def.field_by_id(id))
                        .and_then(|sibling| field_value(def, sibling, value));
                    match tag_member(w.reg, def, field, tag) {
                        Ok((_, member)) => {
                            w.at(PathSegment::Field(member.name.clone()), |w| w.check_field_value(member, v))
                        }
                        Err(reason) => w.report(&def.name, reason),
                    }
                }
                Some(v) => w.check_field_value(field, v),
            });
        }
    }

    /// Check a present field value: multiplicity, link form, field-level size.
    fn check_field_value(&mut self, field: &FieldDefinition, value: &Value) {
        if !field.options.is_multiple() {
            return self.check_single(field, value);
        }
        let Value::Array(items) = value else {
            return self.report(
                field.type_ref.as_str(),
                format!("multi-valued field {} must be a sequence, found {}", field.name, value.kind_name()),
            );
        };
        let min = field.options.min_count.max(1);
        let max = match field.options.max_count {
            0 => self.reg.config().max_elements,
            n => n,
        };
        let n = items.len() as u64;
        if n < min || n > max {
            self.report(
                field.type_ref.as_str(),
                format!("field {} has {n} values, expected {min}..={max}", field.name),
            );
        }
        for (i, item) in items.iter().enumerate() {
            self.at(PathSegment::Index(i), |w| w.check_single(field, item));
        }
    }

    fn check_single(&mut self, field: &FieldDefinition, value: &Value) {
        if let Some(n) = size_of(value) {
            let bounds = (
                field.options.min_size.unwrap_or(0),
                field.options.max_size.filter(|m| *m != 0),
            );
            if field.options.min_size.is_some() || bounds.1.is_some() {
                self.check_size(field.type_ref.as_str(), "size", n, bounds);
            }
        }
        if field.options.link {
            self.check_link(field, value);
        } else {
            self.check_ref(&field.type_ref, value);
        }
    }

    /// A link holds the target's key: the key value itself for a single key
    /// field, a sequence of key values for a composite key.
    fn check_link(&mut self, field: &FieldDefinition, value: &Value) {
        let target = field.type_ref.as_str();
        let reg = self.reg;
        let keys = reg.key_fields(target);
        match keys.as_slice() {
            [] => self.report(target, "link target has no key field"),
            [key] => self.check_ref(&key.type_ref, value),
            composite => match value {
                Value::Array(parts) if parts.len() == composite.len() => {
                    for (i, (key, part)) in composite.iter().zip(parts).enumerate() {
                        self.at(PathSegment::Index(i), |w| w.check_ref(&key.type_ref, part));
                    }
                }
                other => self.report(
                    target,
                    format!("link must hold {} key values, found {}", composite.len(), other.kind_name()),
                ),
            },
        }
    }

    fn check_array_of(&mut self, def: &'r TypeDefinition, value: &Value) {
        let Value::Array(items) = value else {
            return self.mismatch(&def.name, def.kind, value);
        };
        self.check_size(&def.name, "element count", items.len() as u64, size_bounds(&def.options, self.reg.config().max_elements));
        if let Some(vtype) = &def.options.value_type {
            for (i, item) in items.iter().enumerate() {
                self.at(PathSegment::Index(i), |w| w.check_ref(vtype, item));
            }
        }
        if def.options.item_semantics().requires_unique() {
            for (j, item) in items.iter().enumerate() {
                if let Some(i) = items[..j].iter().position(|earlier| earlier == item) {
                    self.at(PathSegment::Index(j), |w| {
                        w.report(&def.name, format!("duplicate of element {i}"))
                    });
                }
            }
        }
    }

    fn check_map_of(&mut self, def: &'r TypeDefinition, value: &Value) {
        let (Some(ktype), Some(vtype)) = (&def.options.key_type, &def.options.value_type) else {
            return self.report(&def.name, "MapOf has no key or value type");
        };
        let bounds = size_bounds(&def.options, self.reg.config().max_elements);
        if self.reg.is_string_keyed(def) {
            let Value::Map(m) = value else {
                return self.mismatch(&def.name, def.kind, value);
            };
            self.check_size(&def.name, "entry count", m.len() as u64, bounds);
            for (k, v) in m {
                self.at(PathSegment::Field(k.clone()), |w| {
                    w.check_ref(ktype, &Value::String(k.clone()));
                    w.check_ref(vtype, v);
                });
            }
            return;
        }
        let Value::Array(pairs) = value else {
            return self.report(&def.name, format!("expected a sequence of [key, value] pairs, found {}", value.kind_name()));
        };
        self.check_size(&def.name, "entry count", pairs.len() as u64, bounds);
        for (i, pair) in pairs.iter().enumerate() {
            self.at(PathSegment::Index(i), |w| match pair.as_array() {
                Some([k, v]) => {
                    w.at(PathSegment::Index(0), |w| w.check_ref(ktype, k));
                    w.at(PathSegment::Index(1), |w| w.check_ref(vtype, v));
                    let duplicate = pairs[..i]
                        .iter()
                        .any(|p| p.as_array().and_then(|p| p.first()) == Some(k));
                    if duplicate {
                        w.report(&def.name, "duplicate key");
                    }
                }
                _ => w.report(&def.name, "entry must be a [key, value] pair"),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::load;
    use crate::resolve::resolve;
    use serde_json::{json, Value as Json};

    fn registry(doc: Json) -> TypeRegistry {
        resolve(load(&doc).unwrap()).unwrap()
    }

    fn v(json: Json) -> Value {
        Value::from(json)
    }

    fn paths(reg: &TypeRegistry, type_name: &str, value: &Value) -> Vec<String> {
        Validator::new(reg)
            .violations(type_name, value)
            .unwrap()
            .iter()
            .map(Violation::path_string)
            .collect()
    }

    fn person() -> TypeRegistry {
        registry(json!({"types": [
            ["Person", "Record", [], "", [
                [1, "name", "String", ["{1"]],
                [2, "id", "Integer"],
                [3, "email", "String", ["[0"]],
                [4, "tags", "String", ["[0", "]3"]]
            ]],
            ["Email", "String", ["/email"]]
        ]}))
    }

    #[test]
    fn valid_person() {
        let reg = person();
        assert!(validate(&reg, "Person", &v(json!({"name": "Bob", "id": 3}))).is_ok());
        let full = v(json!({"name": "Bob", "id": 3, "email": "b@x.com", "tags": ["a", "b"]}));
        assert!(validate(&reg, "Person", &full).is_ok());
    }

    #[test]
    fn null_members_are_rejected() {
        let reg = person();
        let found = paths(&reg, "Person", &v(json!({"name": "Bob", "id": 3, "email": null})));
        assert_eq!(found, vec!["/email".to_string()]);
        let found = paths(&reg, "Person", &v(json!({"name": "Bob", "id": null})));
        assert!(found.contains(&"/id".to_string()), "{found:?}");

        let shapes = registry(json!({"types": [
            ["Shape", "Choice", [], "", [[1, "circle", "Number"], [2, "label", "String"]]]
        ]}));
        assert_eq!(paths(&shapes, "Shape", &v(json!({"label": null}))), vec!["/label".to_string()]);
    }

    #[test]
    fn all_violations_are_collected() {
        let reg = person();
        let bad = v(json!({"name": "", "email": 5, "tags": ["a", "b", "c", "d"], "extra": true}));
        let found = paths(&reg, "Person", &bad);
        assert!(found.contains(&"/extra".to_string()), "{found:?}");
        assert!(found.contains(&"/name".to_string()), "{found:?}");
        assert!(found.contains(&"/id".to_string()), "{found:?}");
        assert!(found.contains(&"/email".to_string()), "{found:?}");
        assert!(found.contains(&"/tags".to_string()), "{found:?}");
        assert!(found.len() >= 5);
    }

    #[test]
    fn unknown_type() {
        let err = validate(&person(), "Nobody", &Value::Null).unwrap_err();
        assert_eq!(err, ValidationError::UnknownType { type_name: "Nobody".into() });
    }

    #[test]
    fn format_and_wrong_kind() {
        let reg = person();
        assert!(validate(&reg, "Email", &v(json!("b@x.com"))).is_ok());
        let err = validate(&reg, "Email", &v(json!("nope"))).unwrap_err();
        assert!(err.violations()[0].message.contains("email"));
        let err = validate(&reg, "Email", &v(json!(3))).unwrap_err();
        assert!(err.violations()[0].message.contains("expected String"));
    }

    #[test]
    fn integer_and_number_ranges() {
        let reg = registry(json!({"types": [
            ["Small", "Integer", ["{-5", "}5"]],
            ["Short", "Integer", ["/i16"]],
            ["Ratio", "Number", ["y0", "z1"]]
        ]}));
        assert!(validate(&reg, "Small", &Value::Integer(-5)).is_ok());
        assert!(validate(&reg, "Small", &Value::Integer(6)).is_err());
        assert!(validate(&reg, "Short", &Value::Integer(40000)).is_err());
        assert!(validate(&reg, "Ratio", &Value::Number(0.5)).is_ok());
        assert!(validate(&reg, "Ratio", &Value::Number(1.5)).is_err());
        assert!(validate(&reg, "Ratio", &Value::Integer(1)).is_err());
    }

    #[test]
    fn string_pattern_and_default_cap() {
        let reg = registry(json!({
            "info": {"package": "p", "config": {"$MaxString": 4}},
            "types": [
                ["Code", "String", ["%^[A-Z]+$"]],
                ["Long", "String", ["}0"]]
            ]
        }));
        assert!(validate(&reg, "Code", &v(json!("ABC"))).is_ok());
        assert!(validate(&reg, "Code", &v(json!("abc"))).is_err());
        assert!(validate(&reg, "Code", &v(json!("ABCDE"))).is_err(), "$MaxString applies");
        assert!(validate(&reg, "Long", &v(json!("abcdefgh"))).is_ok(), "}}0 is unbounded");
    }

    #[test]
    fn enumerated_labels_and_ids() {
        let reg = registry(json!({"types": [
            ["Color", "Enumerated", [], "", [[1, "red"], [2, "green"]]],
            ["Code", "Enumerated", ["="], "", [[1, "one"], [7, "seven"]]],
            ["Open", "Enumerated", ["<"], "", [[1, "a"]]]
        ]}));
        assert!(validate(&reg, "Color", &v(json!("red"))).is_ok());
        assert!(validate(&reg, "Color", &v(json!("blue"))).is_err());
        assert!(validate(&reg, "Color", &v(json!(1))).is_err());
        assert!(validate(&reg, "Code", &v(json!(7))).is_ok());
        assert!(validate(&reg, "Code", &v(json!(2))).is_err());
        assert!(validate(&reg, "Code", &v(json!("one"))).is_err());
        assert!(validate(&reg, "Open", &v(json!("zzz"))).is_ok());
    }

    #[test]
    fn choice_exactly_one_member() {
        let reg = registry(json!({"types": [
            ["Shape", "Choice", [], "", [[1, "circle", "Number"], [2, "label", "String"]]]
        ]}));
        assert!(validate(&reg, "Shape", &Value::map([("circle", Value::Number(1.0))])).is_ok());
        assert!(validate(&reg, "Shape", &v(json!({}))).is_err());
        assert!(validate(&reg, "Shape", &v(json!({"circle": 1.0, "label": "x"}))).is_err());
        assert!(validate(&reg, "Shape", &v(json!({"square": 1}))).is_err());
        assert_eq!(paths(&reg, "Shape", &v(json!({"label": 3}))), vec!["/label"]);
    }

    #[test]
    fn array_positions() {
        let reg = registry(json!({"types": [
            ["Point", "Array", [], "", [
                [1, "x", "Integer"],
                [2, "y", "Integer"],
                [3, "label", "String", ["[0"]]
            ]]
        ]}));
        assert!(validate(&reg, "Point", &v(json!([1, 2]))).is_ok());
        assert!(validate(&reg, "Point", &v(json!([1, 2, null]))).is_ok());
        assert!(validate(&reg, "Point", &v(json!([1, 2, "p", 4]))).is_err());
        assert_eq!(paths(&reg, "Point", &v(json!([1, "two"]))), vec!["/1"]);
        assert_eq!(paths(&reg, "Point", &v(json!([1]))), vec!["/1"]);
    }

    #[test]
    fn array_of_set_semantics() {
        let reg = registry(json!({"types": [
            ["Set", "ArrayOf", ["*String", "s"]],
            ["Uniq", "ArrayOf", ["*Integer", "q"]],
            ["Bag", "ArrayOf", ["*String", "{1", "}3"]]
        ]}));
        assert!(validate(&reg, "Set", &v(json!(["a", "b"]))).is_ok());
        assert_eq!(paths(&reg, "Set", &v(json!(["a", "b", "a"]))), vec!["/2"]);
        assert!(validate(&reg, "Uniq", &v(json!([1, 1]))).is_err());
        assert!(validate(&reg, "Bag", &v(json!(["a", "a"]))).is_ok());
        assert!(validate(&reg, "Bag", &v(json!([]))).is_err());
        assert!(validate(&reg, "Bag", &v(json!(["a", "b", "c", "d"]))).is_err());
    }

    #[test]
    fn map_of_string_and_pair_keys() {
        let reg = registry(json!({"types": [
            ["Scores", "MapOf", ["+String", "*Integer"]],
            ["ById", "MapOf", ["+Integer", "*String"]]
        ]}));
        assert!(validate(&reg, "Scores", &v(json!({"ann": 3, "bob": 4}))).is_ok());
        assert_eq!(paths(&reg, "Scores", &v(json!({"ann": "x"}))), vec!["/ann"]);
        assert!(validate(&reg, "ById", &v(json!([[1, "a"], [2, "b"]]))).is_ok());
        assert_eq!(paths(&reg, "ById", &v(json!([[1, "a"], [1, "b"]]))), vec!["/1"]);
        assert_eq!(paths(&reg, "ById", &v(json!([["x", "a"]]))), vec!["/0/0"]);
    }

    fn products() -> TypeRegistry {
        registry(json!({"types": [
            ["Product", "Choice", [], "", [
                [1, "furniture", "Furniture"],
                [2, "appliance", "String"],
                [3, "software", "Software"]
            ]],
            ["Furniture", "Record", [], "", [[1, "legs", "Integer"]]],
            ["Software", "Record", [], "", [[1, "version", "String"]]],
            ["Kind", "Enumerated", ["#Product"], ""],
            ["Item", "Record", [], "", [
                [1, "kind", "Kind"],
                [2, "value", "Product", ["&1"]]
            ]]
        ]}))
    }

    #[test]
    fn explicit_tag_selects_member() {
        let reg = products();
        let ok = v(json!({"kind": "furniture", "value": {"legs": 4}}));
        assert!(validate(&reg, "Item", &ok).is_ok());
        let bad = v(json!({"kind": "furniture", "value": {"version": "1.0"}}));
        let found = paths(&reg, "Item", &bad);
        assert!(found.iter().all(|p| p.starts_with("/value/furniture")), "{found:?}");
        assert!(!found.is_empty());
    }

    #[test]
    fn link_holds_target_key() {
        let reg = registry(json!({"types": [
            ["Person", "Record", [], "", [
                [1, "id", "Integer", ["K"]],
                [2, "name", "String"],
                [3, "friends", "Person", ["L", "[0", "]0"]]
            ]]
        ]}));
        let ok = v(json!({"id": 1, "name": "a", "friends": [2, 3]}));
        assert!(validate(&reg, "Person", &ok).is_ok());
        let bad = v(json!({"id": 1, "name": "a", "friends": [{"id": 2}]}));
        assert_eq!(paths(&reg, "Person", &bad), vec!["/friends/0"]);
    }

    #[test]
    fn unique_keys_across_collection() {
        let reg = registry(json!({"types": [
            ["Person", "Record", [], "", [
                [1, "id", "Integer", ["K"]],
                [2, "name", "String"]
            ]]
        ]}));
        let people = vec![
            v(json!({"id": 1, "name": "a"})),
            v(json!({"id": 2, "name": "b"})),
            v(json!({"id": 1, "name": "c"})),
        ];
        let err = check_unique_keys(&reg, "Person", &people).unwrap_err();
        let violations = err.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, vec![PathSegment::Index(2)]);
        assert!(check_unique_keys(&reg, "Person", &people[..2]).is_ok());
    }

    #[test]
    fn violation_display() {
        let viol = Violation {
            path: vec![PathSegment::Field("a".into()), PathSegment::Index(0)],
            type_name: "T".into(),
            message: "bad".into(),
        };
        assert_eq!(viol.to_string(), "  /a/0 [T]: bad");
    }
}
