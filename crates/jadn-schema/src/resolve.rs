//! # Reference Resolver
//!
//! Closes every reference of a loaded [`Package`] and produces an immutable
//! [`TypeRegistry`].
//!
//! ## Design
//!
//! Resolution runs in fixed phases, each over the types in registry order so
//! that the first error reported is always the same for the same input:
//!
//! 1. Merge imported packages under their namespace prefixes.
//! 2. Every named reference must be a registry key.
//! 3. Containment cycles are rejected. Link (`L`) fields are not containment
//!    and do not form edges; neither do derivation sources.
//! 4. Derived enumerations (`#`, `>`) get their items from the source fields.
//! 5. Explicit tags, links and ArrayOf item semantics are checked against
//!    the now complete model.
//!
//! Any error aborts the build; no partially resolved registry escapes.

use std::collections::{BTreeMap, HashMap};

use jadn_core::{
    BaseKind, Derivation, ItemDefinition, Location, SchemaError, TypeBody, TypeDefinition,
    TypeRef,
};
use regex::Regex;
use tracing::debug;

use crate::load::Package;
use crate::registry::TypeRegistry;

/// How a reference participates in the type graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    /// Field type or item/key type: the referenced value is embedded.
    Contain,
    /// `L` field: the referenced instance is identified by key only.
    Link,
    /// `#` / `>` source: items are computed from the source's fields.
    Derive,
}

/// Resolves a package, optionally against imported packages.
#[derive(Debug)]
pub struct Resolver {
    package: Package,
    imports: Vec<Package>,
}

impl Resolver {
    /// Start resolving `package`.
    pub fn new(package: Package) -> Self {
        Self {
            package,
            imports: Vec::new(),
        }
    }

    /// Supply another package for `prefix:Name` references.
    ///
    /// The package is visible under every local namespace prefix bound to its
    /// `info.package` URI. Packages no prefix refers to are ignored.
    pub fn import(mut self, package: Package) -> Self {
        self.imports.push(package);
        self
    }

    /// Build the resolved registry.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference`, `CyclicDefinition` or
    /// `InvalidDerivation` for the first problem found in registry order.
    pub fn resolve(self) -> Result<TypeRegistry, SchemaError> {
        let Package {
            info,
            config,
            types: local,
            formats,
        } = self.package;
        let local_count = local.len();
        let mut types = local;
        if let Some(info) = &info {
            for (prefix, uri) in &info.namespaces {
                if let Some(import) = self.imports.iter().find(|p| p.package_uri() == Some(uri.as_str())) {
                    types.extend(qualify_import(prefix, import, &info.package, &info.namespaces));
                }
            }
        }
        debug!(
            types = local_count,
            imported = types.len() - local_count,
            "resolving schema package"
        );

        let index: HashMap<String, usize> = types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();

        check_references(&types, &index)?;
        if let Some(info) = &info {
            for (section, names) in [("info.exports", &info.exports), ("info.roots", &info.roots)] {
                if let Some(missing) = names.iter().find(|n| !index.contains_key(n.as_str())) {
                    return Err(SchemaError::unresolved(Location::Document(section.into()), missing.as_str()));
                }
            }
        }
        check_cycles(&types, &index)?;

        let derived = derive_items(&types, &index, config.sys)?;
        for (i, items) in derived {
            debug!(type_name = %types[i].name, items = items.len(), "derived enumeration");
            types[i].body = TypeBody::Items(items);
        }

        for def in &types {
            check_tags(def, &types, &index)?;
            check_links(def, &types, &index)?;
            check_item_semantics(def, &types, &index)?;
        }

        let mut patterns = HashMap::new();
        for def in &types {
            if let Some(p) = &def.options.pattern {
                let re = Regex::new(p).map_err(|e| SchemaError::MalformedOption {
                    location: Location::of_type(&def.name),
                    option: format!("%{p}"),
                    reason: e.to_string(),
                })?;
                patterns.insert(def.name.clone(), re);
            }
        }

        debug!(types = types.len(), "schema resolved");
        Ok(TypeRegistry::new(info, config, types, patterns, formats))
    }
}

/// Resolve a package that has no imports.
///
/// # Errors
///
/// See [`Resolver::resolve`].
pub fn resolve(package: Package) -> Result<TypeRegistry, SchemaError> {
    Resolver::new(package).resolve()
}

/// Copy an imported package's types under `prefix`, re-qualifying their
/// references into the importer's namespace map.
fn qualify_import(
    prefix: &str,
    import: &Package,
    importer_uri: &str,
    importer_namespaces: &BTreeMap<String, String>,
) -> Vec<TypeDefinition> {
    let requalify = |r: &TypeRef| -> TypeRef {
        let TypeRef::Named(name) = r else {
            return r.clone();
        };
        let Some((ns, local)) = name.split_once(':') else {
            return TypeRef::Named(format!("{prefix}:{name}"));
        };
        match import.namespace_uri(ns) {
            Some(uri) if uri == importer_uri => TypeRef::Named(local.to_string()),
            Some(uri) => importer_namespaces
                .iter()
                .find(|(_, u)| u.as_str() == uri)
                .map(|(p, _)| TypeRef::Named(format!("{p}:{local}")))
                .unwrap_or_else(|| r.clone()),
            None => r.clone(),
        }
    };

    import
        .types
        .iter()
        .map(|def| {
            let mut def = def.clone();
            def.name = format!("{prefix}:{}", def.name);
            def.options.value_type = def.options.value_type.as_ref().map(requalify);
            def.options.key_type = def.options.key_type.as_ref().map(requalify);
            def.options.derived = def.options.derived.as_ref().map(|d| match d {
                Derivation::Fields(s) => Derivation::Fields(requalify(s)),
                Derivation::Paths(s) => Derivation::Paths(requalify(s)),
            });
            if let TypeBody::Fields(fields) = &mut def.body {
                for f in fields {
                    f.type_ref = requalify(&f.type_ref);
                }
            }
            def
        })
        .collect()
}

/// Every reference a definition makes, with its location and graph role.
fn references(def: &TypeDefinition) -> Vec<(Location, &TypeRef, Edge)> {
    let mut refs = Vec::new();
    let here = || Location::of_type(&def.name);
    for r in [&def.options.value_type, &def.options.key_type].into_iter().flatten() {
        refs.push((here(), r, Edge::Contain));
    }
    if let Some(d) = &def.options.derived {
        refs.push((here(), d.source(), Edge::Derive));
    }
    for f in def.body.fields() {
        let edge = if f.options.link { Edge::Link } else { Edge::Contain };
        refs.push((
            Location::of_field(&def.name, i64::from(f.id), &f.name),
            &f.type_ref,
            edge,
        ));
    }
    refs
}

fn check_references(types: &[TypeDefinition], index: &HashMap<String, usize>) -> Result<(), SchemaError> {
    for def in types {
        for (location, r, _) in references(def) {
            if let TypeRef::Named(name) = r {
                if !index.contains_key(name) {
                    return Err(SchemaError::unresolved(location, name.as_str()));
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Active,
    Done,
}

fn check_cycles(types: &[TypeDefinition], index: &HashMap<String, usize>) -> Result<(), SchemaError> {
    let mut marks = vec![Mark::New; types.len()];
    let mut stack = Vec::new();
    for start in 0..types.len() {
        visit(start, types, index, &mut marks, &mut stack)?;
    }
    Ok(())
}

fn visit(
    i: usize,
    types: &[TypeDefinition],
    index: &HashMap<String, usize>,
    marks: &mut [Mark],
    stack: &mut Vec<usize>,
) -> Result<(), SchemaError> {
    match marks[i] {
        Mark::Done => return Ok(()),
        Mark::Active => {
            let from = stack.iter().position(|&j| j == i).unwrap_or(0);
            let mut cycle: Vec<String> = stack[from..].iter().map(|&j| types[j].name.clone()).collect();
            cycle.push(types[i].name.clone());
            return Err(SchemaError::CyclicDefinition { cycle });
        }
        Mark::New => {}
    }
    marks[i] = Mark::Active;
    stack.push(i);
    for (_, r, edge) in references(&types[i]) {
        if edge != Edge::Contain {
            continue;
        }
        if let Some(&j) = index.get(r.as_str()) {
            visit(j, types, index, marks, stack)?;
        }
    }
    stack.pop();
    marks[i] = Mark::Done;
    Ok(())
}

/// Compute the items of every derived enumeration.
fn derive_items(
    types: &[TypeDefinition],
    index: &HashMap<String, usize>,
    sys: char,
) -> Result<Vec<(usize, Vec<ItemDefinition>)>, SchemaError> {
    let mut out = Vec::new();
    for (i, def) in types.iter().enumerate() {
        let Some(derivation) = &def.options.derived else {
            continue;
        };
        let loc = Location::of_type(&def.name);
        let source = container(derivation.source(), types, index).ok_or_else(|| {
            SchemaError::derivation(
                loc,
                format!("source {} is not a Choice, Array, Map or Record type", derivation.source()),
            )
        })?;
        let items = match derivation {
            Derivation::Fields(_) => source
                .body
                .fields()
                .iter()
                .map(|f| ItemDefinition {
                    id: i64::from(f.id),
                    value: f.name.clone(),
                    description: f.description.clone(),
                })
                .collect(),
            Derivation::Paths(_) => {
                let mut leaves = Vec::new();
                leaf_paths(source, "", types, index, sys, &mut leaves);
                leaves
                    .into_iter()
                    .zip(1..)
                    .map(|((value, description), id)| ItemDefinition { id, value, description })
                    .collect()
            }
        };
        out.push((i, items));
    }
    Ok(out)
}

/// The definition a reference names, if it is a field-bearing container.
fn container<'a>(
    r: &TypeRef,
    types: &'a [TypeDefinition],
    index: &HashMap<String, usize>,
) -> Option<&'a TypeDefinition> {
    index
        .get(r.as_str())
        .map(|&i| &types[i])
        .filter(|t| t.kind.has_fields() && !matches!(r, TypeRef::Builtin(_)))
}

fn leaf_paths(
    def: &TypeDefinition,
    prefix: &str,
    types: &[TypeDefinition],
    index: &HashMap<String, usize>,
    sys: char,
    out: &mut Vec<(String, String)>,
) {
    for f in def.body.fields() {
        let path = format!("{prefix}{}", f.name);
        let nested = if f.options.link {
            None
        } else {
            container(&f.type_ref, types, index)
        };
        match nested {
            Some(inner) => leaf_paths(inner, &format!("{path}{sys}"), types, index, sys, out),
            None => out.push((path, f.description.clone())),
        }
    }
}

fn check_tags(
    def: &TypeDefinition,
    types: &[TypeDefinition],
    index: &HashMap<String, usize>,
) -> Result<(), SchemaError> {
    let lookup = |r: &TypeRef| index.get(r.as_str()).map(|&i| &types[i]);
    for f in def.body.fields() {
        let Some(tag_id) = f.options.tag_id else {
            continue;
        };
        let loc = Location::of_field(&def.name, i64::from(f.id), &f.name);
        let sibling = def
            .field_by_id(tag_id)
            .ok_or_else(|| SchemaError::derivation(loc.clone(), format!("tag field {tag_id} does not exist")))?;
        if sibling.id == f.id {
            return Err(SchemaError::derivation(loc, "a field cannot be its own tag"));
        }
        let domain = lookup(&sibling.type_ref)
            .filter(|t| t.kind == BaseKind::Enumerated && !sibling.options.is_multiple())
            .ok_or_else(|| {
                SchemaError::derivation(
                    loc.clone(),
                    format!("tag field {tag_id} ({}) is not a single Enumerated value", sibling.name),
                )
            })?;
        let choice = lookup(&f.type_ref)
            .filter(|t| t.kind == BaseKind::Choice)
            .ok_or_else(|| SchemaError::derivation(loc.clone(), "explicitly tagged field must be a Choice"))?;
        if let Some(item) = domain
            .body
            .items()
            .iter()
            .find(|item| choice.field_by_name(&item.value).is_none())
        {
            return Err(SchemaError::derivation(
                loc,
                format!("tag value \"{}\" is not a member of {}", item.value, choice.name),
            ));
        }
    }
    Ok(())
}

fn check_links(
    def: &TypeDefinition,
    types: &[TypeDefinition],
    index: &HashMap<String, usize>,
) -> Result<(), SchemaError> {
    for f in def.body.fields().iter().filter(|f| f.options.link) {
        let has_key = container(&f.type_ref, types, index).is_some_and(|t| t.key_fields().next().is_some());
        if !has_key {
            return Err(SchemaError::derivation(
                Location::of_field(&def.name, i64::from(f.id), &f.name),
                format!("link target {} has no key field", f.type_ref),
            ));
        }
    }
    Ok(())
}

fn check_item_semantics(
    def: &TypeDefinition,
    types: &[TypeDefinition],
    index: &HashMap<String, usize>,
) -> Result<(), SchemaError> {
    if def.kind != BaseKind::ArrayOf || def.options.semantics.is_none() {
        return Ok(());
    }
    let derived_item = def
        .options
        .value_type
        .as_ref()
        .and_then(|r| index.get(r.as_str()))
        .map(|&i| &types[i])
        .is_some_and(|t| t.kind == BaseKind::Enumerated && t.options.derived.is_some());
    if derived_item {
        return Err(SchemaError::derivation(
            Location::of_type(&def.name),
            "item semantics are not defined for ArrayOf of a derived enumeration",
        ));
    }
    Ok(())
}
