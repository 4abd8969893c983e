//! # Verbose / Concise JSON Codec
//!
//! Converts between the in-memory [`Value`] and the two JSON-shaped wire
//! styles.
//!
//! | Kind | Verbose | Concise |
//! |------|---------|---------|
//! | Enumerated | item label | item id |
//! | Choice | `{"member": v}` | `[id, v]` |
//! | Map, Record | object keyed by field name | positional array, trailing absent fields dropped |
//! | Array | positional array | positional array |
//! | MapOf | object, or `[[k, v], ...]` for non-string keys | same |
//!
//! Enumerated types with `=` use item ids in both styles. Binary values are
//! base64url text unless a format selects another text form.
//!
//! ## Design
//!
//! `encode` validates its input before writing anything; a value the
//! validator accepts always encodes. `decode` first reshapes the wire tree,
//! failing with [`DecodeError::Shape`] when it cannot be read as the type,
//! and then validates the value it produced. Unknown members of extensible
//! types pass through as schema-agnostic values and re-encode to the same
//! place.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jadn_core::{BaseKind, FieldDefinition, TypeDefinition, TypeOptions, TypeRef, Value};
use serde_json::{Map, Number, Value as Json};
use thiserror::Error;

use crate::registry::TypeRegistry;
use crate::validate::{field_value, tag_member, PathSegment, ValidationError, Validator};

/// Wire style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Style {
    /// Name-keyed members and item labels.
    #[default]
    Verbose,
    /// Positional members and item ids.
    Concise,
}

impl Style {
    /// Lowercase style name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verbose => "verbose",
            Self::Concise => "concise",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "verbose" => Ok(Self::Verbose),
            "concise" | "compact" => Ok(Self::Concise),
            other => Err(format!("unknown style \"{other}\" (expected verbose or concise)")),
        }
    }
}

/// Error while encoding a value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// The requested type is not in the registry.
    #[error("unknown type \"{type_name}\"")]
    UnknownType {
        /// Requested type name.
        type_name: String,
    },

    /// The value does not validate against the type.
    #[error(transparent)]
    Invalid(ValidationError),

    /// A value has no representation in the requested style.
    #[error("cannot encode {path}: {message}")]
    Shape {
        /// Path to the offending node.
        path: String,
        /// What went wrong.
        message: String,
    },
}

/// Error while decoding a wire value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The requested type is not in the registry.
    #[error("unknown type \"{type_name}\"")]
    UnknownType {
        /// Requested type name.
        type_name: String,
    },

    /// The wire value does not have the shape the type requires.
    #[error("cannot decode {path}: {message}")]
    Shape {
        /// Path to the offending node.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// The decoded value does not validate against the type.
    #[error(transparent)]
    Invalid(ValidationError),
}

impl From<ValidationError> for EncodeError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::UnknownType { type_name } => Self::UnknownType { type_name },
            other => Self::Invalid(other),
        }
    }
}

impl From<ValidationError> for DecodeError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::UnknownType { type_name } => Self::UnknownType { type_name },
            other => Self::Invalid(other),
        }
    }
}

/// A wire codec over a resolved registry.
pub trait Codec {
    /// Wire representation produced and consumed.
    type Wire;

    /// Encode a value of `type_name`.
    fn encode(&self, registry: &TypeRegistry, type_name: &str, value: &Value) -> Result<Self::Wire, EncodeError>;

    /// Decode a wire value as `type_name`.
    fn decode(&self, registry: &TypeRegistry, type_name: &str, wire: &Self::Wire) -> Result<Value, DecodeError>;
}

/// JSON codec for one wire style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec {
    style: Style,
}

impl JsonCodec {
    /// Codec for `style`.
    pub fn new(style: Style) -> Self {
        Self { style }
    }

    /// Verbose JSON codec.
    pub fn verbose() -> Self {
        Self::new(Style::Verbose)
    }

    /// Concise JSON codec.
    pub fn concise() -> Self {
        Self::new(Style::Concise)
    }

    /// The style this codec writes and reads.
    pub fn style(&self) -> Style {
        self.style
    }
}

impl Codec for JsonCodec {
    type Wire = Json;

    fn encode(&self, registry: &TypeRegistry, type_name: &str, value: &Value) -> Result<Json, EncodeError> {
        encode(registry, type_name, value, self.style)
    }

    fn decode(&self, registry: &TypeRegistry, type_name: &str, wire: &Json) -> Result<Value, DecodeError> {
        decode(registry, type_name, wire, self.style)
    }
}

/// Encode `value` as `type_name` in `style`.
///
/// # Errors
///
/// Returns `EncodeError::Invalid` when the value does not validate and
/// `EncodeError::Shape` when it has no representation in `style`.
pub fn encode(registry: &TypeRegistry, type_name: &str, value: &Value, style: Style) -> Result<Json, EncodeError> {
    Validator::new(registry).validate(type_name, value)?;
    let def = registry.get(type_name).ok_or_else(|| EncodeError::UnknownType {
        type_name: type_name.to_string(),
    })?;
    let mut enc = Encoder {
        reg: registry,
        style,
        path: Vec::new(),
    };
    enc.type_value(def, value)
}

/// Decode `wire` as `type_name` in `style`.
///
/// # Errors
///
/// Returns `DecodeError::Shape` when the wire value cannot be read as the
/// type and `DecodeError::Invalid` when the decoded value does not validate.
pub fn decode(registry: &TypeRegistry, type_name: &str, wire: &Json, style: Style) -> Result<Value, DecodeError> {
    let def = registry.get(type_name).ok_or_else(|| DecodeError::UnknownType {
        type_name: type_name.to_string(),
    })?;
    let mut dec = Decoder {
        reg: registry,
        style,
        path: Vec::new(),
    };
    let value = dec.type_value(def, wire)?;
    Validator::new(registry).validate(type_name, &value)?;
    Ok(value)
}

fn render(path: &[PathSegment]) -> String {
    if path.is_empty() {
        "(root)".to_string()
    } else {
        path.iter().map(ToString::to_string).collect()
    }
}

/// Schema-agnostic JSON form of a value, used for unknown extension data.
fn untyped_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Integer(n) => Json::from(*n),
        Value::Number(x) => Number::from_f64(*x).map_or(Json::Null, Json::Number),
        Value::String(s) => Json::String(s.clone()),
        Value::Binary(b) => Json::String(URL_SAFE_NO_PAD.encode(b)),
        Value::Array(items) => Json::Array(items.iter().map(untyped_json).collect()),
        Value::Map(m) => Json::Object(m.iter().map(|(k, v)| (k.clone(), untyped_json(v))).collect()),
    }
}

fn to_hex(bytes: &[u8], upper: bool) -> String {
    if upper {
        bytes.iter().map(|b| format!("{b:02X}")).collect()
    } else {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

fn binary_text(format: Option<&str>, bytes: &[u8]) -> Option<String> {
    match format {
        Some("x") => Some(to_hex(bytes, false)),
        Some("X") => Some(to_hex(bytes, true)),
        Some("ipv4-addr") => <[u8; 4]>::try_from(bytes).ok().map(|a| Ipv4Addr::from(a).to_string()),
        Some("ipv6-addr") => <[u8; 16]>::try_from(bytes).ok().map(|a| Ipv6Addr::from(a).to_string()),
        Some("eui") => Some(
            bytes
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(":"),
        ),
        _ => Some(URL_SAFE_NO_PAD.encode(bytes)),
    }
}

fn binary_bytes(format: Option<&str>, text: &str) -> Result<Vec<u8>, String> {
    match format {
        Some("x") | Some("X") => from_hex(text).ok_or_else(|| "invalid hex text".to_string()),
        Some("ipv4-addr") => text
            .parse::<Ipv4Addr>()
            .map(|a| a.octets().to_vec())
            .map_err(|e| e.to_string()),
        Some("ipv6-addr") => text
            .parse::<Ipv6Addr>()
            .map(|a| a.octets().to_vec())
            .map_err(|e| e.to_string()),
        Some("eui") => text
            .split([':', '-'])
            .map(|part| {
                if part.len() == 2 {
                    u8::from_str_radix(part, 16).map_err(|e| e.to_string())
                } else {
                    Err(format!("invalid EUI octet \"{part}\""))
                }
            })
            .collect(),
        _ => URL_SAFE_NO_PAD
            .decode(text.trim_end_matches('='))
            .map_err(|e| e.to_string()),
    }
}

fn ip_net_format(opts: &TypeOptions) -> Option<usize> {
    match opts.format.as_deref() {
        Some("ipv4-net") => Some(4),
        Some("ipv6-net") => Some(16),
        _ => None,
    }
}

struct Encoder<'r> {
    reg: &'r TypeRegistry,
    style: Style,
    path: Vec<PathSegment>,
}

impl<'r> Encoder<'r> {
    fn fail<T>(&self, message: impl Into<String>) -> Result<T, EncodeError> {
        Err(EncodeError::Shape {
            path: render(&self.path),
            message: message.into(),
        })
    }

    fn at<T>(&mut self, segment: PathSegment, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push(segment);
        let out = f(self);
        self.path.pop();
        out
    }

    fn type_ref(&mut self, r: &TypeRef, value: &Value) -> Result<Json, EncodeError> {
        let reg = self.reg;
        match r {
            TypeRef::Builtin(kind) => self.primitive(*kind, &TypeOptions::default(), value),
            TypeRef::Named(name) => match reg.get(name) {
                Some(def) => self.type_value(def, value),
                None => self.fail(format!("type {name} is not defined")),
            },
        }
    }

    fn type_value(&mut self, def: &'r TypeDefinition, value: &Value) -> Result<Json, EncodeError> {
        match def.kind {
            BaseKind::Binary
            | BaseKind::Boolean
            | BaseKind::Integer
            | BaseKind::Number
            | BaseKind::String => self.primitive(def.kind, &def.options, value),
            BaseKind::Enumerated => self.enumerated(def, value),
            BaseKind::Choice => self.choice(def, value),
            BaseKind::Array => self.array(def, value),
            BaseKind::ArrayOf => {
                let items = value.as_array().unwrap_or_default();
                let Some(vtype) = &def.options.value_type else {
                    return self.fail("ArrayOf has no value type");
                };
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.at(PathSegment::Index(i), |e| e.type_ref(vtype, item))?);
                }
                Ok(Json::Array(out))
            }
            BaseKind::Map | BaseKind::Record => self.record(def, value),
            BaseKind::MapOf => self.map_of(def, value),
        }
    }

    fn primitive(&mut self, kind: BaseKind, opts: &TypeOptions, value: &Value) -> Result<Json, EncodeError> {
        let format = opts.format.as_deref();
        match (kind, value) {
            (BaseKind::Binary, Value::Binary(b)) => match binary_text(format, b) {
                Some(text) => Ok(Json::String(text)),
                None => self.fail(format!("{} bytes do not form a {}", b.len(), format.unwrap_or("binary"))),
            },
            (BaseKind::Boolean, Value::Bool(b)) => Ok(Json::Bool(*b)),
            (BaseKind::Integer, Value::Integer(ms)) if format == Some("datetime-ms") => {
                match chrono::DateTime::<chrono::Utc>::from_timestamp_millis(*ms) {
                    Some(t) => Ok(Json::String(t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))),
                    None => self.fail(format!("{ms} is out of range for datetime-ms")),
                }
            }
            (BaseKind::Integer, Value::Integer(n)) => Ok(Json::from(*n)),
            (BaseKind::Number, Value::Number(x)) => match Number::from_f64(*x) {
                Some(n) => Ok(Json::Number(n)),
                None => self.fail("number is not finite"),
            },
            (BaseKind::String, Value::String(s)) => Ok(Json::String(s.clone())),
            (_, other) if !kind.is_primitive() => Ok(untyped_json(other)),
            (_, other) => self.fail(format!("expected {kind}, found {}", other.kind_name())),
        }
    }

    fn enumerated(&mut self, def: &TypeDefinition, value: &Value) -> Result<Json, EncodeError> {
        match value {
            Value::String(label) if self.style == Style::Concise && !def.options.id => {
                Ok(def.item_by_value(label).map_or_else(|| Json::String(label.clone()), |item| Json::from(item.id)))
            }
            Value::String(label) => Ok(Json::String(label.clone())),
            Value::Integer(id) => Ok(Json::from(*id)),
            other => self.fail(format!("expected an item of {}, found {}", def.name, other.kind_name())),
        }
    }

    fn choice(&mut self, def: &'r TypeDefinition, value: &Value) -> Result<Json, EncodeError> {
        let Some((name, member_value)) = value.as_map().and_then(|m| m.iter().next()) else {
            return self.fail("Choice value has no member");
        };
        let field = def.field_by_name(name);
        let encoded = self.at(PathSegment::Field(name.clone()), |e| match field {
            Some(field) => e.field(field, member_value),
            None => Ok(untyped_json(member_value)),
        })?;
        match self.style {
            Style::Verbose => {
                let mut out = Map::new();
                out.insert(name.clone(), encoded);
                Ok(Json::Object(out))
            }
            Style::Concise => {
                let id = match field {
                    Some(field) => i64::from(field.id),
                    None => match name.parse::<i64>() {
                        Ok(id) => id,
                        Err(_) => return self.fail(format!("unknown member \"{name}\" has no concise tag")),
                    },
                };
                Ok(Json::Array(vec![Json::from(id), encoded]))
            }
        }
    }

    fn array(&mut self, def: &'r TypeDefinition, value: &Value) -> Result<Json, EncodeError> {
        let items = value.as_array().unwrap_or_default();
        if let Some(addr_len) = ip_net_format(&def.options) {
            return match items {
                [Value::Binary(addr), Value::Integer(prefix)] if addr.len() == addr_len => {
                    let text = binary_text(Some(if addr_len == 4 { "ipv4-addr" } else { "ipv6-addr" }), addr)
                        .unwrap_or_default();
                    Ok(Json::String(format!("{text}/{prefix}")))
                }
                _ => self.fail("expected [address, prefix length]"),
            };
        }
        let fields = def.body.fields();
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let encoded = self.at(PathSegment::Index(i), |e| match (fields.get(i), item) {
                (_, Value::Null) => Ok(Json::Null),
                (Some(field), v) if field.options.tag_id.is_some() => e.tagged(def, field, value, v),
                (Some(field), v) => e.field(field, v),
                (None, v) => Ok(untyped_json(v)),
            })?;
            out.push(encoded);
        }
        Ok(Json::Array(out))
    }

    fn record(&mut self, def: &'r TypeDefinition, value: &Value) -> Result<Json, EncodeError> {
        let Some(members) = value.as_map() else {
            return self.fail(format!("expected {}, found {}", def.kind, value.kind_name()));
        };
        let fields = def.body.fields();
        let mut slots: Vec<(String, Json)> = Vec::with_capacity(members.len());
        for field in fields {
            let slot = match members.get(&field.name).filter(|v| !v.is_null()) {
                None => Json::Null,
                Some(v) => self.at(PathSegment::Field(field.name.clone()), |e| {
                    if field.options.tag_id.is_some() {
                        e.tagged(def, field, value, v)
                    } else {
                        e.field(field, v)
                    }
                })?,
            };
            slots.push((field.name.clone(), slot));
        }
        let unknown: Vec<(&String, &Value)> = members
            .iter()
            .filter(|(k, _)| def.field_by_name(k).is_none())
            .collect();

        match self.style {
            Style::Verbose => {
                let mut out = Map::new();
                for (name, slot) in slots.into_iter().filter(|(_, s)| !s.is_null()) {
                    out.insert(name, slot);
                }
                for (k, v) in unknown {
                    out.insert(k.clone(), untyped_json(v));
                }
                Ok(Json::Object(out))
            }
            Style::Concise => {
                let mut out: Vec<Json> = slots.into_iter().map(|(_, s)| s).collect();
                for (k, v) in unknown {
                    let position = match k.parse::<usize>() {
                        Ok(p) if p > fields.len() => p,
                        _ => return self.fail(format!("unknown field \"{k}\" has no concise position")),
                    };
                    if out.len() < position {
                        out.resize(position, Json::Null);
                    }
                    out[position - 1] = untyped_json(v);
                }
                while out.last().is_some_and(Json::is_null) {
                    out.pop();
                }
                Ok(Json::Array(out))
            }
        }
    }

    fn map_of(&mut self, def: &'r TypeDefinition, value: &Value) -> Result<Json, EncodeError> {
        let (Some(ktype), Some(vtype)) = (&def.options.key_type, &def.options.value_type) else {
            return self.fail("MapOf has no key or value type");
        };
        match value {
            Value::Map(m) => {
                let reg = self.reg;
                let labels = match self.style {
                    Style::Concise => reg.enumerated_key_type(def),
                    Style::Verbose => None,
                };
                let mut out = Map::new();
                for (k, v) in m {
                    let encoded = self.at(PathSegment::Field(k.clone()), |e| e.type_ref(vtype, v))?;
                    let key = labels
                        .and_then(|t| t.item_by_value(k))
                        .map_or_else(|| k.clone(), |item| item.id.to_string());
                    out.insert(key, encoded);
                }
                Ok(Json::Object(out))
            }
            Value::Array(pairs) => {
                let mut out = Vec::with_capacity(pairs.len());
                for (i, pair) in pairs.iter().enumerate() {
                    let encoded = self.at(PathSegment::Index(i), |e| match pair.as_array() {
                        Some([k, v]) => Ok(Json::Array(vec![e.type_ref(ktype, k)?, e.type_ref(vtype, v)?])),
                        _ => e.fail("entry must be a [key, value] pair"),
                    })?;
                    out.push(encoded);
                }
                Ok(Json::Array(out))
            }
            other => self.fail(format!("expected MapOf, found {}", other.kind_name())),
        }
    }

    /// A present field value: single or multi-valued, embedded or linked.
    fn field(&mut self, field: &FieldDefinition, value: &Value) -> Result<Json, EncodeError> {
        if !field.options.is_multiple() {
            return self.single(field, value);
        }
        let items = value.as_array().unwrap_or_default();
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            out.push(self.at(PathSegment::Index(i), |e| e.single(field, item))?);
        }
        Ok(Json::Array(out))
    }

    fn single(&mut self, field: &FieldDefinition, value: &Value) -> Result<Json, EncodeError> {
        if !field.options.link {
            return self.type_ref(&field.type_ref, value);
        }
        let reg = self.reg;
        match reg.key_fields(field.type_ref.as_str()).as_slice() {
            [key] => self.type_ref(&key.type_ref, value),
            keys => {
                let parts = value.as_array().unwrap_or_default();
                let mut out = Vec::with_capacity(parts.len());
                for (i, (key, part)) in keys.iter().zip(parts).enumerate() {
                    out.push(self.at(PathSegment::Index(i), |e| e.type_ref(&key.type_ref, part))?);
                }
                Ok(Json::Array(out))
            }
        }
    }

    fn tagged(
        &mut self,
        container: &TypeDefinition,
        field: &FieldDefinition,
        instance: &Value,
        value: &Value,
    ) -> Result<Json, EncodeError> {
        let tag = field
            .options
            .tag_id
            .and_then(|id| container.field_by_id(id))
            .and_then(|sibling| field_value(container, sibling, instance));
        match tag_member(self.reg, container, field, tag) {
            Ok((_, member)) => self.field(member, value),
            Err(reason) => self.fail(reason),
        }
    }
}

struct Decoder<'r> {
    reg: &'r TypeRegistry,
    style: Style,
    path: Vec<PathSegment>,
}

impl<'r> Decoder<'r> {
    fn fail<T>(&self, message: impl Into<String>) -> Result<T, DecodeError> {
        Err(DecodeError::Shape {
            path: render(&self.path),
            message: message.into(),
        })
    }

    fn mismatch<T>(&self, expected: impl fmt::Display, wire: &Json) -> Result<T, DecodeError> {
        let found = match wire {
            Json::Null => "null",
            Json::Bool(_) => "boolean",
            Json::Number(_) => "number",
            Json::String(_) => "string",
            Json::Array(_) => "array",
            Json::Object(_) => "object",
        };
        self.fail(format!("expected {expected}, found {found}"))
    }

    fn at<T>(&mut self, segment: PathSegment, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push(segment);
        let out = f(self);
        self.path.pop();
        out
    }

    fn type_ref(&mut self, r: &TypeRef, wire: &Json) -> Result<Value, DecodeError> {
        let reg = self.reg;
        match r {
            TypeRef::Builtin(kind) => self.primitive(*kind, &TypeOptions::default(), wire),
            TypeRef::Named(name) => match reg.get(name) {
                Some(def) => self.type_value(def, wire),
                None => self.fail(format!("type {name} is not defined")),
            },
        }
    }

    fn type_value(&mut self, def: &'r TypeDefinition, wire: &Json) -> Result<Value, DecodeError> {
        match def.kind {
            BaseKind::Binary
            | BaseKind::Boolean
            | BaseKind::Integer
            | BaseKind::Number
            | BaseKind::String => self.primitive(def.kind, &def.options, wire),
            BaseKind::Enumerated => self.enumerated(def, wire),
            BaseKind::Choice => self.choice(def, wire),
            BaseKind::Array => self.array(def, wire),
            BaseKind::ArrayOf => {
                let Json::Array(items) = wire else {
                    return self.mismatch("array", wire);
                };
                let Some(vtype) = &def.options.value_type else {
                    return self.fail("ArrayOf has no value type");
                };
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.at(PathSegment::Index(i), |d| d.type_ref(vtype, item))?);
                }
                Ok(Value::Array(out))
            }
            BaseKind::Map | BaseKind::Record => self.record(def, wire),
            BaseKind::MapOf => self.map_of(def, wire),
        }
    }

    fn primitive(&mut self, kind: BaseKind, opts: &TypeOptions, wire: &Json) -> Result<Value, DecodeError> {
        let format = opts.format.as_deref();
        match (kind, wire) {
            (BaseKind::Binary, Json::String(text)) => match binary_bytes(format, text) {
                Ok(bytes) => Ok(Value::Binary(bytes)),
                Err(reason) => self.fail(reason),
            },
            (BaseKind::Boolean, Json::Bool(b)) => Ok(Value::Bool(*b)),
            (BaseKind::Integer, Json::String(text)) if format == Some("datetime-ms") => {
                match chrono::DateTime::parse_from_rfc3339(text) {
                    Ok(t) => Ok(Value::Integer(t.timestamp_millis())),
                    Err(e) => self.fail(format!("invalid date-time \"{text}\": {e}")),
                }
            }
            (BaseKind::Integer, Json::Number(n)) => match n.as_i64() {
                Some(i) => Ok(Value::Integer(i)),
                None => self.fail(format!("{n} is not an integer")),
            },
            (BaseKind::Number, Json::Number(n)) => match n.as_f64() {
                Some(x) => Ok(Value::Number(x)),
                None => self.fail(format!("{n} is not representable")),
            },
            (BaseKind::String, Json::String(s)) => Ok(Value::String(s.clone())),
            (_, other) if !kind.is_primitive() => Ok(Value::from(other.clone())),
            (_, other) => self.mismatch(kind, other),
        }
    }

    fn enumerated(&mut self, def: &TypeDefinition, wire: &Json) -> Result<Value, DecodeError> {
        match wire {
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Number(n) => {
                let Some(id) = n.as_i64() else {
                    return self.fail(format!("{n} is not an item id"));
                };
                if def.options.id || self.style == Style::Verbose {
                    return Ok(Value::Integer(id));
                }
                Ok(def
                    .item_by_id(id)
                    .map_or(Value::Integer(id), |item| Value::String(item.value.clone())))
            }
            other => self.mismatch(format!("an item of {}", def.name), other),
        }
    }

    fn choice(&mut self, def: &'r TypeDefinition, wire: &Json) -> Result<Value, DecodeError> {
        let mut out = std::collections::BTreeMap::new();
        match (self.style, wire) {
            (Style::Verbose, Json::Object(members)) => {
                for (name, member) in members {
                    let decoded = self.at(PathSegment::Field(name.clone()), |d| match def.field_by_name(name) {
                        Some(field) => d.field(field, member),
                        None => Ok(Value::from(member.clone())),
                    })?;
                    out.insert(name.clone(), decoded);
                }
            }
            (Style::Concise, Json::Array(pair)) => {
                let [tag, member] = pair.as_slice() else {
                    return self.fail(format!("Choice must be [tag, value], found {} elements", pair.len()));
                };
                let Some(id) = tag.as_i64() else {
                    return self.mismatch("an integer member tag", tag);
                };
                let field = u32::try_from(id).ok().and_then(|id| def.field_by_id(id));
                let name = field.map_or_else(|| id.to_string(), |f| f.name.clone());
                let decoded = self.at(PathSegment::Field(name.clone()), |d| match field {
                    Some(field) => d.field(field, member),
                    None => Ok(Value::from(member.clone())),
                })?;
                out.insert(name, decoded);
            }
            (Style::Verbose, other) => return self.mismatch("object", other),
            (Style::Concise, other) => return self.mismatch("[tag, value]", other),
        }
        Ok(Value::Map(out))
    }

    fn array(&mut self, def: &'r TypeDefinition, wire: &Json) -> Result<Value, DecodeError> {
        if let Some(addr_len) = ip_net_format(&def.options) {
            let Json::String(text) = wire else {
                return self.mismatch("CIDR text", wire);
            };
            let Some((addr, prefix)) = text.split_once('/') else {
                return self.fail(format!("\"{text}\" is not in address/prefix form"));
            };
            let addr_format = if addr_len == 4 { "ipv4-addr" } else { "ipv6-addr" };
            let bytes = match binary_bytes(Some(addr_format), addr) {
                Ok(bytes) => bytes,
                Err(reason) => return self.fail(reason),
            };
            let Ok(prefix) = prefix.parse::<i64>() else {
                return self.fail(format!("invalid prefix length \"{prefix}\""));
            };
            return Ok(Value::Array(vec![Value::Binary(bytes), Value::Integer(prefix)]));
        }
        let Json::Array(items) = wire else {
            return self.mismatch("array", wire);
        };
        let fields = def.body.fields();
        let mut out = vec![Value::Null; items.len()];
        let mut tagged = Vec::new();
        for (i, item) in items.iter().enumerate() {
            match fields.get(i) {
                _ if item.is_null() => {}
                Some(field) if field.options.tag_id.is_some() => tagged.push((i, field)),
                Some(field) => out[i] = self.at(PathSegment::Index(i), |d| d.field(field, item))?,
                None => out[i] = Value::from(item.clone()),
            }
        }
        let mut value = Value::Array(out);
        for (i, field) in tagged {
            let decoded = self.at(PathSegment::Index(i), |d| d.tagged(def, field, &value, &items[i]))?;
            if let Value::Array(slots) = &mut value {
                slots[i] = decoded;
            }
        }
        Ok(value)
    }

    fn record(&mut self, def: &'r TypeDefinition, wire: &Json) -> Result<Value, DecodeError> {
        let fields = def.body.fields();
        let mut present: Vec<(&'r FieldDefinition, &Json)> = Vec::new();
        let mut out = std::collections::BTreeMap::new();
        match (self.style, wire) {
            (Style::Verbose, Json::Object(members)) => {
                for (name, member) in members.iter().filter(|(_, m)| !m.is_null()) {
                    match def.field_by_name(name) {
                        Some(field) => present.push((field, member)),
                        None => {
                            out.insert(name.clone(), Value::from(member.clone()));
                        }
                    }
                }
            }
            (Style::Concise, Json::Array(slots)) => {
                for (i, slot) in slots.iter().enumerate().filter(|(_, s)| !s.is_null()) {
                    match fields.get(i) {
                        Some(field) => present.push((field, slot)),
                        None => {
                            out.insert((i + 1).to_string(), Value::from(slot.clone()));
                        }
                    }
                }
            }
            (Style::Verbose, other) => return self.mismatch("object", other),
            (Style::Concise, other) => return self.mismatch("array", other),
        }

        let (tagged, plain): (Vec<_>, Vec<_>) = present
            .into_iter()
            .partition(|(field, _)| field.options.tag_id.is_some());
        for (field, member) in plain {
            let decoded = self.at(PathSegment::Field(field.name.clone()), |d| d.field(field, member))?;
            out.insert(field.name.clone(), decoded);
        }
        let mut value = Value::Map(out);
        for (field, member) in tagged {
            let decoded = self.at(PathSegment::Field(field.name.clone()), |d| d.tagged(def, field, &value, member))?;
            if let Value::Map(m) = &mut value {
                m.insert(field.name.clone(), decoded);
            }
        }
        Ok(value)
    }

    fn map_of(&mut self, def: &'r TypeDefinition, wire: &Json) -> Result<Value, DecodeError> {
        let (Some(ktype), Some(vtype)) = (&def.options.key_type, &def.options.value_type) else {
            return self.fail("MapOf has no key or value type");
        };
        if self.reg.is_string_keyed(def) {
            let Json::Object(members) = wire else {
                return self.mismatch("object", wire);
            };
            let reg = self.reg;
            let labels = match self.style {
                Style::Concise => reg.enumerated_key_type(def),
                Style::Verbose => None,
            };
            let mut out = std::collections::BTreeMap::new();
            for (k, v) in members {
                let key = labels
                    .and_then(|t| k.parse::<i64>().ok().and_then(|id| t.item_by_id(id)))
                    .map_or_else(|| k.clone(), |item| item.value.clone());
                let decoded = self.at(PathSegment::Field(key.clone()), |d| d.type_ref(vtype, v))?;
                out.insert(key, decoded);
            }
            return Ok(Value::Map(out));
        }
        let Json::Array(pairs) = wire else {
            return self.mismatch("array of [key, value] pairs", wire);
        };
        let mut out = Vec::with_capacity(pairs.len());
        for (i, pair) in pairs.iter().enumerate() {
            let decoded = self.at(PathSegment::Index(i), |d| match pair.as_array().map(Vec::as_slice) {
                Some([k, v]) => Ok(Value::Array(vec![d.type_ref(ktype, k)?, d.type_ref(vtype, v)?])),
                _ => d.mismatch("[key, value]", pair),
            })?;
            out.push(decoded);
        }
        Ok(Value::Array(out))
    }

    fn field(&mut self, field: &FieldDefinition, wire: &Json) -> Result<Value, DecodeError> {
        if !field.options.is_multiple() {
            return self.single(field, wire);
        }
        let Json::Array(items) = wire else {
            return self.mismatch(format!("a sequence of {}", field.type_ref), wire);
        };
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            out.push(self.at(PathSegment::Index(i), |d| d.single(field, item))?);
        }
        Ok(Value::Array(out))
    }

    fn single(&mut self, field: &FieldDefinition, wire: &Json) -> Result<Value, DecodeError> {
        if !field.options.link {
            return self.type_ref(&field.type_ref, wire);
        }
        let reg = self.reg;
        match reg.key_fields(field.type_ref.as_str()).as_slice() {
            [key] => self.type_ref(&key.type_ref, wire),
            keys => {
                let Json::Array(parts) = wire else {
                    return self.mismatch("an array of key values", wire);
                };
                let mut out = Vec::with_capacity(parts.len());
                for (i, (key, part)) in keys.iter().zip(parts).enumerate() {
                    out.push(self.at(PathSegment::Index(i), |d| d.type_ref(&key.type_ref, part))?);
                }
                Ok(Value::Array(out))
            }
        }
    }

    fn tagged(
        &mut self,
        container: &TypeDefinition,
        field: &FieldDefinition,
        instance: &Value,
        wire: &Json,
    ) -> Result<Value, DecodeError> {
        let tag = field
            .options
            .tag_id
            .and_then(|id| container.field_by_id(id))
            .and_then(|sibling| field_value(container, sibling, instance));
        match tag_member(self.reg, container, field, tag) {
            Ok((_, member)) => self.at(PathSegment::Field(member.name.clone()), |d| d.field(member, wire)),
            Err(reason) => self.fail(reason),
        }
    }
}
