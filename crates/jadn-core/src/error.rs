//! # Error Types — Schema Build Failures
//!
//! Every failure that can abort a schema build. All errors use `thiserror`
//! for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Load and resolve errors are fatal: the whole build aborts and no
//!   partially resolved registry is ever exposed.
//! - Every error names where in the schema it was detected (`Location`),
//!   down to the field id when the fault is in a field tuple.
//! - Instance-level errors (validation, encode, decode) live next to the
//!   code that produces them in `jadn-schema`.

use std::fmt;

use thiserror::Error;

/// A base-kind name that is not one of the twelve core types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown base kind \"{0}\"")]
pub struct UnknownBaseKind(pub String);

/// An option string that could not be decoded.
///
/// Raised by the option parser, which does not know where the option came
/// from; the loader attaches a [`Location`] when converting it into
/// [`SchemaError::MalformedOption`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed option \"{option}\": {reason}")]
pub struct OptionError {
    /// The raw option string.
    pub option: String,
    /// Why it was rejected.
    pub reason: String,
    /// The option decoded but does not apply to the base kind it was given to.
    pub misplaced: bool,
}

impl OptionError {
    pub(crate) fn new(option: &str, reason: impl Into<String>) -> Self {
        Self {
            option: option.to_string(),
            reason: reason.into(),
            misplaced: false,
        }
    }

    pub(crate) fn misplaced(option: &str, reason: impl Into<String>) -> Self {
        Self {
            misplaced: true,
            ..Self::new(option, reason)
        }
    }
}

/// Where in a schema document an error was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A document section outside the type list (`info`, `types`, a config key).
    Document(String),
    /// A type definition tuple.
    Type(String),
    /// A field or item tuple within a type definition.
    Field {
        /// Containing type name.
        type_name: String,
        /// Field or item id.
        id: i64,
        /// Field name or item label.
        name: String,
    },
}

impl Location {
    /// Location of a type definition.
    pub fn of_type(type_name: &str) -> Self {
        Self::Type(type_name.to_string())
    }

    /// Location of a field within a type definition.
    pub fn of_field(type_name: &str, id: i64, name: &str) -> Self {
        Self::Field {
            type_name: type_name.to_string(),
            id,
            name: name.to_string(),
        }
    }

    /// The type name this location belongs to, if any.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Self::Document(_) => None,
            Self::Type(t) | Self::Field { type_name: t, .. } => Some(t),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document(section) => write!(f, "{section}"),
            Self::Type(name) => write!(f, "type {name}"),
            Self::Field {
                type_name,
                id,
                name,
            } => write!(f, "type {type_name} field {id} ({name})"),
        }
    }
}

/// Fatal schema build error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The document does not have the shape of a JADN schema.
    #[error("schema structure error at {location}: {reason}")]
    Structure {
        /// Offending tuple or section.
        location: Location,
        /// The violated shape rule.
        reason: String,
    },

    /// An option string could not be decoded or is not allowed where it appears.
    #[error("malformed option \"{option}\" at {location}: {reason}")]
    MalformedOption {
        /// Offending tuple.
        location: Location,
        /// The raw option string.
        option: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A type name or namespace prefix does not resolve.
    #[error("unresolved reference \"{reference}\" at {location}")]
    UnresolvedReference {
        /// The reference as written in the schema.
        reference: String,
        /// The referencing tuple.
        location: Location,
    },

    /// A structural cycle that is not broken by a link field.
    #[error("cyclic definition: {}", cycle.join(" -> "))]
    CyclicDefinition {
        /// Type names along the cycle; the first name is repeated at the end.
        cycle: Vec<String>,
    },

    /// A derived enumeration, explicit tag, or link has an unusable source.
    #[error("invalid derivation at {location}: {reason}")]
    InvalidDerivation {
        /// The deriving type or field.
        location: Location,
        /// Why the source is unusable.
        reason: String,
    },
}

impl SchemaError {
    /// Shorthand for a [`SchemaError::Structure`].
    pub fn structure(location: Location, reason: impl Into<String>) -> Self {
        Self::Structure {
            location,
            reason: reason.into(),
        }
    }

    /// Attach a location to an [`OptionError`]. A misplaced option is a
    /// [`SchemaError::Structure`]; anything else is a
    /// [`SchemaError::MalformedOption`].
    pub fn malformed(location: Location, err: OptionError) -> Self {
        if err.misplaced {
            return Self::Structure {
                location,
                reason: format!("option \"{}\": {}", err.option, err.reason),
            };
        }
        Self::MalformedOption {
            location,
            option: err.option,
            reason: err.reason,
        }
    }

    /// Shorthand for a [`SchemaError::UnresolvedReference`].
    pub fn unresolved(location: Location, reference: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            reference: reference.into(),
            location,
        }
    }

    /// Shorthand for a [`SchemaError::InvalidDerivation`].
    pub fn derivation(location: Location, reason: impl Into<String>) -> Self {
        Self::InvalidDerivation {
            location,
            reason: reason.into(),
        }
    }
}
