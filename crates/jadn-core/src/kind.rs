//! # Base Kinds — Closed Type Taxonomy
//!
//! Defines the `BaseKind` enum with the twelve JADN core types. Every
//! validator and codec dispatch is an exhaustive `match` over this enum, so
//! adding a kind forces every consumer to handle it at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownBaseKind;

/// The twelve JADN core types.
///
/// | Group | Kinds |
/// |-------|-------|
/// | Primitive | Binary, Boolean, Integer, Number, String |
/// | Selector | Enumerated, Choice |
/// | Structured | Array, ArrayOf, Map, MapOf, Record |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BaseKind {
    /// Sequence of octets.
    Binary,
    /// True or false.
    Boolean,
    /// Whole number.
    Integer,
    /// Real number.
    Number,
    /// Sequence of characters.
    String,
    /// One value selected from a set of named integers.
    Enumerated,
    /// One field selected from a set of fields.
    Choice,
    /// Ordered list of labeled fields with positionally-defined semantics.
    Array,
    /// Ordered list of fields with the same semantics.
    ArrayOf,
    /// Unordered map from a set of specified keys to values.
    Map,
    /// Unordered map from a key type to a value type.
    MapOf,
    /// Ordered map from a list of keys with positions to values.
    Record,
}

/// Total number of base kinds.
pub const BASE_KIND_COUNT: usize = 12;

impl BaseKind {
    /// Returns all base kinds in canonical order.
    pub fn all() -> &'static [BaseKind] {
        &[
            Self::Binary,
            Self::Boolean,
            Self::Integer,
            Self::Number,
            Self::String,
            Self::Enumerated,
            Self::Choice,
            Self::Array,
            Self::ArrayOf,
            Self::Map,
            Self::MapOf,
            Self::Record,
        ]
    }

    /// The name used for this kind in schema documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binary => "Binary",
            Self::Boolean => "Boolean",
            Self::Integer => "Integer",
            Self::Number => "Number",
            Self::String => "String",
            Self::Enumerated => "Enumerated",
            Self::Choice => "Choice",
            Self::Array => "Array",
            Self::ArrayOf => "ArrayOf",
            Self::Map => "Map",
            Self::MapOf => "MapOf",
            Self::Record => "Record",
        }
    }

    /// Primitive kinds carry no body and may be referenced directly by fields.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Binary | Self::Boolean | Self::Integer | Self::Number | Self::String
        )
    }

    /// Kinds whose definition lists fields (as opposed to items or nothing).
    pub fn has_fields(&self) -> bool {
        matches!(self, Self::Choice | Self::Array | Self::Map | Self::Record)
    }

    /// Kinds whose instance size is bounded by `$MaxElements` by default.
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Self::Array | Self::ArrayOf | Self::Map | Self::MapOf | Self::Record
        )
    }
}

impl fmt::Display for BaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaseKind {
    type Err = UnknownBaseKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownBaseKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_kinds_count() {
        assert_eq!(BaseKind::all().len(), BASE_KIND_COUNT);
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for kind in BaseKind::all() {
            let parsed: BaseKind = kind.as_str().parse().unwrap();
            assert_eq!(*kind, parsed);
        }
    }

    #[test]
    fn unknown_kind_rejected() {
        let err = "Struct".parse::<BaseKind>().unwrap_err();
        assert!(err.to_string().contains("Struct"));
        assert!("record".parse::<BaseKind>().is_err());
    }

    #[test]
    fn kind_groups_are_disjoint() {
        for kind in BaseKind::all() {
            assert!(!(kind.is_primitive() && kind.has_fields()), "{kind}");
        }
        assert!(BaseKind::Record.has_fields());
        assert!(!BaseKind::ArrayOf.has_fields());
        assert!(!BaseKind::Enumerated.has_fields());
        assert!(BaseKind::MapOf.is_collection());
    }
}
