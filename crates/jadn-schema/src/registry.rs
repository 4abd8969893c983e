//! # Type Registry
//!
//! The resolved, immutable schema model. Built once by the resolver and then
//! only read: by the validator, by the codecs, and by any collaborator that
//! needs name lookup, field iteration or option inspection.
//!
//! ## Thread Safety
//!
//! `TypeRegistry` is `Send + Sync`. Share it behind an `Arc` across any
//! number of concurrent validate / encode / decode calls.

use std::collections::{BTreeMap, HashMap, HashSet};

use jadn_core::{BaseKind, Config, FieldDefinition, TypeDefinition, TypeRef};
use regex::Regex;

use crate::format::FormatRegistry;
use crate::load::Info;

/// A fully resolved schema.
///
/// Every named reference in `types` is a key of the registry. Derived
/// enumerations carry their computed items. Imported types appear under
/// their qualified `prefix:Name` key after the local types.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    info: Option<Info>,
    config: Config,
    types: Vec<TypeDefinition>,
    index: HashMap<String, usize>,
    patterns: HashMap<String, Regex>,
    formats: FormatRegistry,
}

impl PartialEq for TypeRegistry {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info
            && self.config == other.config
            && self.types == other.types
            && BaseKind::all()
                .iter()
                .all(|k| self.formats.names(*k) == other.formats.names(*k))
    }
}

impl TypeRegistry {
    pub(crate) fn new(
        info: Option<Info>,
        config: Config,
        types: Vec<TypeDefinition>,
        patterns: HashMap<String, Regex>,
        formats: FormatRegistry,
    ) -> Self {
        let index = types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        Self {
            info,
            config,
            types,
            index,
            patterns,
            formats,
        }
    }

    /// Look up a type by name (`Name` or `prefix:Name`).
    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.index.get(name).map(|&i| &self.types[i])
    }

    /// Whether a type is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All types, local ones first in declared order, then imports.
    pub fn types(&self) -> &[TypeDefinition] {
        &self.types
    }

    /// Type names in registry order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.name.as_str())
    }

    /// Number of types, including imported ones.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry has no types.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The schema's `info` block, when present.
    pub fn info(&self) -> Option<&Info> {
        self.info.as_ref()
    }

    /// Effective config overrides.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Namespace prefix to package URI.
    pub fn namespaces(&self) -> impl Iterator<Item = (&str, &str)> {
        self.info
            .iter()
            .flat_map(|i| i.namespaces.iter())
            .map(|(p, u)| (p.as_str(), u.as_str()))
    }

    /// Format table used for `/fmt` checks.
    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Compiled `%` pattern of a String type.
    pub fn pattern(&self, type_name: &str) -> Option<&Regex> {
        self.patterns.get(type_name)
    }

    /// Base kind a reference resolves to.
    pub fn kind_of(&self, r: &TypeRef) -> Option<BaseKind> {
        match r {
            TypeRef::Builtin(k) => Some(*k),
            TypeRef::Named(n) => self.get(n).map(|t| t.kind),
        }
    }

    /// Whether a MapOf type's instances are string-keyed mappings.
    ///
    /// True when the key type is a String or a label-valued Enumerated;
    /// otherwise instances are sequences of `[key, value]` pairs.
    pub fn is_string_keyed(&self, def: &TypeDefinition) -> bool {
        match def.options.key_type.as_ref() {
            Some(TypeRef::Builtin(k)) => *k == BaseKind::String,
            Some(TypeRef::Named(n)) => self.get(n).is_some_and(|t| {
                t.kind == BaseKind::String || (t.kind == BaseKind::Enumerated && !t.options.id)
            }),
            None => false,
        }
    }

    /// The key type of a MapOf when it is a label-valued Enumerated.
    /// Concise style writes those keys as the decimal item id.
    pub fn enumerated_key_type(&self, def: &TypeDefinition) -> Option<&TypeDefinition> {
        match def.options.key_type.as_ref()? {
            TypeRef::Named(n) => self
                .get(n)
                .filter(|t| t.kind == BaseKind::Enumerated && !t.options.id),
            TypeRef::Builtin(_) => None,
        }
    }

    /// Key (`K`) fields of a type, in declared order.
    pub fn key_fields(&self, type_name: &str) -> Vec<&FieldDefinition> {
        self.get(type_name)
            .map(|t| t.key_fields().collect())
            .unwrap_or_default()
    }

    /// Types listed in `info.exports`, or every local type when none are listed.
    pub fn exports(&self) -> Vec<&str> {
        match self.info.as_ref().filter(|i| !i.exports.is_empty()) {
            Some(info) => info.exports.iter().map(String::as_str).collect(),
            None => self
                .types
                .iter()
                .filter(|t| !t.name.contains(':'))
                .map(|t| t.name.as_str())
                .collect(),
        }
    }

    /// Local types that no type definition refers to and that are not
    /// listed in `info.exports`, in declared order. These are typically the
    /// schema's roots, or dead definitions.
    pub fn unreferenced(&self) -> Vec<&str> {
        let mut referenced: HashSet<&str> = self
            .info
            .iter()
            .flat_map(|i| i.exports.iter().map(String::as_str))
            .collect();
        for t in &self.types {
            let options = [&t.options.value_type, &t.options.key_type].into_iter().flatten();
            let derived = t.options.derived.as_ref().map(|d| d.source());
            let fields = t.body.fields().iter().map(|f| &f.type_ref);
            for r in options.chain(derived).chain(fields) {
                if let TypeRef::Named(n) = r {
                    referenced.insert(n.as_str());
                }
            }
        }
        self.types
            .iter()
            .map(|t| t.name.as_str())
            .filter(|n| !n.contains(':') && !referenced.contains(n))
            .collect()
    }

    /// Number of types of each base kind, for summaries.
    pub fn kind_counts(&self) -> BTreeMap<BaseKind, usize> {
        let mut counts = BTreeMap::new();
        for t in &self.types {
            *counts.entry(t.kind).or_insert(0) += 1;
        }
        counts
    }
}
