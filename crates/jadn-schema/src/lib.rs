//! # jadn-schema — Schema Interpreter & Codec
//!
//! Turns a JADN schema document into a resolved type model and uses that
//! model to validate and transcode application data.
//!
//! ## Pipeline
//!
//! - [`load`] checks document shape and decodes options, producing an
//!   unresolved [`Package`]. The `info` block is checked against the
//!   bundled `info.schema.json`.
//! - [`resolve`] closes every type reference (including namespace imports),
//!   rejects containment cycles, computes derived enumerations and checks
//!   explicit tags and links, producing an immutable [`TypeRegistry`].
//! - [`validate`] checks a [`Value`](jadn_core::Value) against a type and
//!   reports every violation with its path.
//! - [`codec`] converts values to and from verbose and concise JSON.
//!
//! ## Crate Policy
//!
//! - Depends only on `jadn-core` internally.
//! - Load and resolve errors abort the whole build; a partially resolved
//!   registry is never returned.
//! - The registry is read-only after resolution and is `Send + Sync`.

pub mod codec;
pub mod format;
pub mod load;
pub mod registry;
pub mod resolve;
pub mod validate;

pub use codec::{decode, encode, Codec, DecodeError, EncodeError, JsonCodec, Style};
pub use format::{FormatCheck, FormatRegistry};
pub use load::{load, load_str, load_yaml_str, yaml_to_json_value, Info, Loader, Package};
pub use registry::TypeRegistry;
pub use resolve::{resolve, Resolver};
pub use validate::{
    check_unique_keys, validate, PathSegment, ValidationError, ValidationViolations, Validator,
    Violation,
};
