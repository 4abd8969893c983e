//! # Type Definitions
//!
//! The decoded form of a schema's `types` list. A definition as loaded is
//! not yet resolved: references are kept as written and derived
//! enumerations have no items until the resolver computes them.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::kind::BaseKind;
use crate::option::{FieldOptions, TypeOptions};

/// A reference to a type from a field or an option.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeRef {
    /// One of the twelve core types, used directly.
    Builtin(BaseKind),
    /// A defined type, either local (`Name`) or imported (`prefix:Name`).
    Named(String),
}

impl TypeRef {
    /// Parse a type reference as written in a schema.
    ///
    /// # Errors
    ///
    /// Returns a reason string for an empty reference or an empty prefix or
    /// name around the `:` separator.
    pub fn parse(s: &str) -> Result<Self, String> {
        if s.is_empty() {
            return Err("type reference is empty".to_string());
        }
        if let Some((ns, name)) = s.split_once(':') {
            if ns.is_empty() || name.is_empty() || name.contains(':') {
                return Err(format!("malformed qualified type reference \"{s}\""));
            }
            return Ok(Self::Named(s.to_string()));
        }
        Ok(s.parse::<BaseKind>()
            .map(Self::Builtin)
            .unwrap_or_else(|_| Self::Named(s.to_string())))
    }

    /// Namespace prefix of a qualified reference.
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::Named(n) => n.split_once(':').map(|(ns, _)| ns),
            Self::Builtin(_) => None,
        }
    }

    /// The referenced name without any namespace prefix.
    pub fn local_name(&self) -> &str {
        match self {
            Self::Named(n) => n.split_once(':').map_or(n.as_str(), |(_, name)| name),
            Self::Builtin(k) => k.as_str(),
        }
    }

    /// The reference as written, which is also its registry key.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Named(n) => n,
            Self::Builtin(k) => k.as_str(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TypeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One value of an Enumerated type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDefinition {
    /// Integer identifier, unique within the type.
    pub id: i64,
    /// Label, unique within the type.
    pub value: String,
    /// Optional description.
    pub description: String,
}

/// One field of a Choice, Array, Map or Record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDefinition {
    /// Field id; equals the 1-based position for Array and Record.
    pub id: u32,
    /// Field name, unique within the type.
    pub name: String,
    /// Type of the field value.
    pub type_ref: TypeRef,
    /// Decoded field options.
    pub options: FieldOptions,
    /// Optional description.
    pub description: String,
}

/// The body of a type definition, shaped by its base kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypeBody {
    /// Primitive kinds, ArrayOf, MapOf, and derived enumerations before resolution.
    Empty,
    /// Enumerated items.
    Items(Vec<ItemDefinition>),
    /// Choice, Array, Map and Record fields.
    Fields(Vec<FieldDefinition>),
}

impl TypeBody {
    /// Fields, or an empty slice for non-field bodies.
    pub fn fields(&self) -> &[FieldDefinition] {
        match self {
            Self::Fields(f) => f,
            _ => &[],
        }
    }

    /// Items, or an empty slice for non-item bodies.
    pub fn items(&self) -> &[ItemDefinition] {
        match self {
            Self::Items(i) => i,
            _ => &[],
        }
    }
}

/// One entry of the `types` list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDefinition {
    /// Type name, unique within the package.
    pub name: String,
    /// Base kind.
    pub kind: BaseKind,
    /// Decoded type options.
    pub options: TypeOptions,
    /// Optional description.
    pub description: String,
    /// Items or fields.
    pub body: TypeBody,
}

impl TypeDefinition {
    /// Look up a field by id.
    pub fn field_by_id(&self, id: u32) -> Option<&FieldDefinition> {
        self.body.fields().iter().find(|f| f.id == id)
    }

    /// Look up a field by name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDefinition> {
        self.body.fields().iter().find(|f| f.name == name)
    }

    /// Look up an Enumerated item by id.
    pub fn item_by_id(&self, id: i64) -> Option<&ItemDefinition> {
        self.body.items().iter().find(|i| i.id == id)
    }

    /// Look up an Enumerated item by label.
    pub fn item_by_value(&self, value: &str) -> Option<&ItemDefinition> {
        self.body.items().iter().find(|i| i.value == value)
    }

    /// Fields marked `K`, in declared order.
    pub fn key_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.body.fields().iter().filter(|f| f.options.key)
    }
}
