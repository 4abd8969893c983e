//! # jadn-core — Foundational Types for the JADN Toolchain
//!
//! This crate defines the vocabulary every other JADN crate speaks: the
//! closed set of base kinds, the option grammar, definition records, the
//! canonical in-memory instance value, and the schema error taxonomy.
//! It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Closed base-kind enum.** `BaseKind` has exactly twelve variants and
//!    every dispatch over it is an exhaustive `match`.
//!
//! 2. **Typed options.** Option strings such as `"[0"` or `"*Integer"` are
//!    decoded once, at load, into `TypeOptions` / `FieldOptions`. Unknown
//!    codes are rejected, never ignored.
//!
//! 3. **References by name.** `TypeRef` holds a name, not a pointer. Cyclic
//!    schemas are therefore representable without ownership cycles; traversal
//!    looks names up in the registry.
//!
//! 4. **Fatal schema errors carry a location.** Every `SchemaError` names the
//!    type, and where applicable the field id, it was detected in.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `jadn-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod config;
pub mod definition;
pub mod error;
pub mod kind;
pub mod option;
pub mod value;

// Re-export primary types for ergonomic imports.
pub use config::{Config, NameRule};
pub use definition::{FieldDefinition, ItemDefinition, TypeBody, TypeDefinition, TypeRef};
pub use error::{Location, OptionError, SchemaError, UnknownBaseKind};
pub use kind::{BaseKind, BASE_KIND_COUNT};
pub use option::{Derivation, FieldOptions, ItemSemantics, TypeOption, TypeOptions};
pub use value::Value;
