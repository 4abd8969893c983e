//! # Option Grammar
//!
//! Decodes the short option strings attached to type and field definitions
//! (`"[0"`, `"{16"`, `"/i16"`, `"*Integer"`, `"&1"`) into typed values.
//!
//! The first character of an option string selects its meaning; the rest is
//! the payload. Parsing is closed: an unrecognized leading character, a
//! payload of the wrong shape, a repeated code, or a code that is not
//! meaningful for the target's base kind is rejected, never ignored.
//!
//! | Code | Target | Payload |
//! |------|--------|---------|
//! | `=` | Enumerated | none |
//! | `*` | ArrayOf, MapOf | item type |
//! | `+` | MapOf | key type |
//! | `#` | Enumerated | source type (fields) |
//! | `>` | Enumerated | source type (paths) |
//! | `/` | Binary, Integer, Number, String, Array | format name |
//! | `%` | String | regular expression |
//! | `y` `z` | Number | float bound |
//! | `{` `}` | sizes, Integer value range | integer or `$Config` key |
//! | `q` `s` `b` | ArrayOf | none |
//! | `<` | Enumerated, Choice, Array, Map, Record | none |
//! | `[` `]` | field | cardinality |
//! | `&` | field | sibling field id |
//! | `K` `L` | field | none |

use serde::Serialize;

use crate::config::Config;
use crate::definition::TypeRef;
use crate::error::OptionError;
use crate::kind::BaseKind;

/// Item semantics of an ArrayOf instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ItemSemantics {
    /// `q`: unique, unordered.
    Unique,
    /// `s`: unique, ordered (set).
    Set,
    /// `b`: duplicates permitted, unordered.
    Bag,
}

impl ItemSemantics {
    /// Whether instances must not contain equal elements.
    pub fn requires_unique(&self) -> bool {
        matches!(self, Self::Unique | Self::Set)
    }
}

/// Source of a derived enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Derivation {
    /// `#Type`: one item per field of the source, with the field's id and name.
    Fields(TypeRef),
    /// `>Type`: one item per leaf field path of the source.
    Paths(TypeRef),
}

impl Derivation {
    /// The source type reference.
    pub fn source(&self) -> &TypeRef {
        match self {
            Self::Fields(t) | Self::Paths(t) => t,
        }
    }
}

/// A single decoded type option.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypeOption {
    /// `=`
    Id,
    /// `*Type`
    ValueType(TypeRef),
    /// `+Type`
    KeyType(TypeRef),
    /// `#Type` or `>Type`
    Derived(Derivation),
    /// `/fmt`
    Format(String),
    /// `%regex`
    Pattern(String),
    /// `yN`
    MinValue(f64),
    /// `zN`
    MaxValue(f64),
    /// `{N`
    MinSize(i64),
    /// `}N`
    MaxSize(i64),
    /// `q`, `s`, `b`
    Semantics(ItemSemantics),
    /// `<`
    Extensible,
}

impl TypeOption {
    /// Decode one type option string.
    ///
    /// `$Name` size payloads are looked up in `config`.
    ///
    /// # Errors
    ///
    /// Returns `OptionError` for an empty string, an unknown code, or a
    /// payload that does not fit the code.
    pub fn parse(raw: &str, config: &Config) -> Result<Self, OptionError> {
        let (code, payload) = split(raw)?;
        let opt = match code {
            '=' => flag(raw, payload, Self::Id)?,
            'q' => flag(raw, payload, Self::Semantics(ItemSemantics::Unique))?,
            's' => flag(raw, payload, Self::Semantics(ItemSemantics::Set))?,
            'b' => flag(raw, payload, Self::Semantics(ItemSemantics::Bag))?,
            '<' => flag(raw, payload, Self::Extensible)?,
            '*' => Self::ValueType(type_ref(raw, payload)?),
            '+' => Self::KeyType(type_ref(raw, payload)?),
            '#' => Self::Derived(Derivation::Fields(type_ref(raw, payload)?)),
            '>' => Self::Derived(Derivation::Paths(type_ref(raw, payload)?)),
            '/' => Self::Format(text(raw, payload)?),
            '%' => Self::Pattern(text(raw, payload)?),
            'y' => Self::MinValue(float(raw, payload)?),
            'z' => Self::MaxValue(float(raw, payload)?),
            '{' => Self::MinSize(size(raw, payload, config)?),
            '}' => Self::MaxSize(size(raw, payload, config)?),
            _ => {
                return Err(OptionError::new(
                    raw,
                    format!("unknown type option code '{code}'"),
                ))
            }
        };
        Ok(opt)
    }

    /// The leading character of this option.
    pub fn code(&self) -> char {
        match self {
            Self::Id => '=',
            Self::ValueType(_) => '*',
            Self::KeyType(_) => '+',
            Self::Derived(Derivation::Fields(_)) => '#',
            Self::Derived(Derivation::Paths(_)) => '>',
            Self::Format(_) => '/',
            Self::Pattern(_) => '%',
            Self::MinValue(_) => 'y',
            Self::MaxValue(_) => 'z',
            Self::MinSize(_) => '{',
            Self::MaxSize(_) => '}',
            Self::Semantics(ItemSemantics::Unique) => 'q',
            Self::Semantics(ItemSemantics::Set) => 's',
            Self::Semantics(ItemSemantics::Bag) => 'b',
            Self::Extensible => '<',
        }
    }

    /// Whether this option is meaningful for a type of the given base kind.
    pub fn allowed_for(&self, kind: BaseKind) -> bool {
        use BaseKind::*;
        match self {
            Self::Id | Self::Derived(_) => kind == Enumerated,
            Self::ValueType(_) => matches!(kind, ArrayOf | MapOf),
            Self::KeyType(_) => kind == MapOf,
            Self::Format(_) => matches!(kind, Binary | Integer | Number | String | Array),
            Self::Pattern(_) => kind == String,
            Self::MinValue(_) | Self::MaxValue(_) => kind == Number,
            Self::MinSize(_) | Self::MaxSize(_) => matches!(
                kind,
                Binary | Integer | String | Array | ArrayOf | Map | MapOf | Record
            ),
            Self::Semantics(_) => kind == ArrayOf,
            Self::Extensible => matches!(kind, Enumerated | Choice | Array | Map | Record),
        }
    }
}

/// The decoded option set of a type definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeOptions {
    /// `=`: Enumerated values are item ids rather than labels.
    pub id: bool,
    /// `*`: ArrayOf / MapOf item type.
    pub value_type: Option<TypeRef>,
    /// `+`: MapOf key type.
    pub key_type: Option<TypeRef>,
    /// `#` / `>`: Enumerated items computed from another type.
    pub derived: Option<Derivation>,
    /// `/`: semantic format hint.
    pub format: Option<String>,
    /// `%`: String pattern.
    pub pattern: Option<String>,
    /// `y`: Number lower bound.
    pub min_value: Option<f64>,
    /// `z`: Number upper bound.
    pub max_value: Option<f64>,
    /// `{`: minimum size, or Integer lower bound.
    pub min_size: Option<i64>,
    /// `}`: maximum size (0 = unbounded), or Integer upper bound.
    pub max_size: Option<i64>,
    /// `q` / `s` / `b`: ArrayOf item semantics.
    pub semantics: Option<ItemSemantics>,
    /// `<`: unknown additional fields or values are permitted.
    pub extensible: bool,
}

impl TypeOptions {
    /// Decode and check the option list of a type of the given kind.
    ///
    /// # Errors
    ///
    /// Returns `OptionError` naming the first offending option string.
    pub fn parse(raw: &[String], kind: BaseKind, config: &Config) -> Result<Self, OptionError> {
        let mut out = Self::default();
        let mut seen: Vec<char> = Vec::with_capacity(raw.len());
        for s in raw {
            let opt = TypeOption::parse(s, config)?;
            if !opt.allowed_for(kind) {
                return Err(OptionError::misplaced(
                    s,
                    format!("option '{}' is not meaningful for {kind}", opt.code()),
                ));
            }
            let group = match opt.code() {
                '#' | '>' => '#',
                'q' | 's' | 'b' => 'q',
                c => c,
            };
            if seen.contains(&group) {
                return Err(OptionError::new(s, "option conflicts with an earlier option"));
            }
            seen.push(group);
            match opt {
                TypeOption::Id => out.id = true,
                TypeOption::ValueType(t) => out.value_type = Some(t),
                TypeOption::KeyType(t) => out.key_type = Some(t),
                TypeOption::Derived(d) => out.derived = Some(d),
                TypeOption::Format(f) => out.format = Some(f),
                TypeOption::Pattern(p) => out.pattern = Some(p),
                TypeOption::MinValue(v) => out.min_value = Some(v),
                TypeOption::MaxValue(v) => out.max_value = Some(v),
                TypeOption::MinSize(n) => {
                    if n < 0 && kind != BaseKind::Integer {
                        return Err(OptionError::new(s, "size cannot be negative"));
                    }
                    out.min_size = Some(n);
                }
                TypeOption::MaxSize(n) => {
                    if n < 0 && kind != BaseKind::Integer {
                        return Err(OptionError::new(s, "size cannot be negative"));
                    }
                    out.max_size = Some(n);
                }
                TypeOption::Semantics(sem) => out.semantics = Some(sem),
                TypeOption::Extensible => out.extensible = true,
            }
        }
        out.check_ranges(raw, kind)?;
        Ok(out)
    }

    fn check_ranges(&self, raw: &[String], kind: BaseKind) -> Result<(), OptionError> {
        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            // Integer bounds are a value range; 0 is an ordinary bound there.
            let unbounded = kind != BaseKind::Integer && max == 0;
            if !unbounded && min > max {
                return Err(OptionError::new(
                    find(raw, '}'),
                    format!("maximum {max} is less than minimum {min}"),
                ));
            }
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(OptionError::new(
                    find(raw, 'z'),
                    format!("maximum {max} is less than minimum {min}"),
                ));
            }
        }
        Ok(())
    }

    /// Item semantics, defaulting to bag.
    pub fn item_semantics(&self) -> ItemSemantics {
        self.semantics.unwrap_or(ItemSemantics::Bag)
    }
}

/// The decoded option set of a field definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldOptions {
    /// `[`: minimum occurrences; 0 makes the field optional.
    pub min_count: u64,
    /// `]`: maximum occurrences; 0 = unbounded.
    pub max_count: u64,
    /// `&`: id of the sibling field whose value selects this field's Choice member.
    pub tag_id: Option<u32>,
    /// `K`: field is (part of) the identifying key of its container.
    pub key: bool,
    /// `L`: field holds the key of another instance rather than an embedded value.
    pub link: bool,
    /// `{`: minimum size of the field value.
    pub min_size: Option<u64>,
    /// `}`: maximum size of the field value (0 = unbounded).
    pub max_size: Option<u64>,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            min_count: 1,
            max_count: 1,
            tag_id: None,
            key: false,
            link: false,
            min_size: None,
            max_size: None,
        }
    }
}

impl FieldOptions {
    /// Decode and check the option list of a field.
    ///
    /// # Errors
    ///
    /// Returns `OptionError` naming the first offending option string.
    pub fn parse(raw: &[String], config: &Config) -> Result<Self, OptionError> {
        let mut out = Self::default();
        let mut max_count = None;
        let mut seen: Vec<char> = Vec::with_capacity(raw.len());
        for s in raw {
            let (code, payload) = split(s)?;
            if seen.contains(&code) {
                return Err(OptionError::new(s, "option conflicts with an earlier option"));
            }
            seen.push(code);
            match code {
                '[' => out.min_count = count(s, payload)?,
                ']' => max_count = Some(count(s, payload)?),
                '&' => {
                    let id = count(s, payload)?;
                    out.tag_id = match u32::try_from(id) {
                        Ok(id) if id > 0 => Some(id),
                        _ => return Err(OptionError::new(s, "tag field id must be a positive integer")),
                    };
                }
                'K' => out.key = flag(s, payload, true)?,
                'L' => out.link = flag(s, payload, true)?,
                '{' => out.min_size = Some(unsigned_size(s, payload, config)?),
                '}' => out.max_size = Some(unsigned_size(s, payload, config)?),
                c if TypeOption::parse(s, config).is_ok() => {
                    return Err(OptionError::new(
                        s,
                        format!("type option '{c}' is not allowed on a field"),
                    ))
                }
                c => {
                    return Err(OptionError::new(
                        s,
                        format!("unknown field option code '{c}'"),
                    ))
                }
            }
        }
        out.max_count = max_count.unwrap_or_else(|| out.min_count.max(1));
        if out.max_count != 0 && out.max_count < out.min_count {
            return Err(OptionError::new(
                find(raw, ']'),
                format!(
                    "maximum cardinality {} is less than minimum {}",
                    out.max_count, out.min_count
                ),
            ));
        }
        if let (Some(min), Some(max)) = (out.min_size, out.max_size) {
            if max != 0 && min > max {
                return Err(OptionError::new(
                    find(raw, '}'),
                    format!("maximum {max} is less than minimum {min}"),
                ));
            }
        }
        if out.tag_id.is_some() && out.is_multiple() {
            return Err(OptionError::new(
                find(raw, '&'),
                "an explicitly tagged field cannot be multi-valued",
            ));
        }
        Ok(out)
    }

    /// The field may be absent.
    pub fn is_optional(&self) -> bool {
        self.min_count == 0
    }

    /// The field holds a sequence of values rather than one value.
    pub fn is_multiple(&self) -> bool {
        self.max_count != 1
    }
}

fn split(raw: &str) -> Result<(char, &str), OptionError> {
    let mut chars = raw.chars();
    match chars.next() {
        Some(c) => Ok((c, chars.as_str())),
        None => Err(OptionError::new(raw, "empty option string")),
    }
}

fn flag<T>(raw: &str, payload: &str, value: T) -> Result<T, OptionError> {
    if payload.is_empty() {
        Ok(value)
    } else {
        Err(OptionError::new(raw, "option takes no value"))
    }
}

fn text(raw: &str, payload: &str) -> Result<String, OptionError> {
    if payload.is_empty() {
        Err(OptionError::new(raw, "option requires a value"))
    } else {
        Ok(payload.to_string())
    }
}

fn type_ref(raw: &str, payload: &str) -> Result<TypeRef, OptionError> {
    TypeRef::parse(payload).map_err(|reason| OptionError::new(raw, reason))
}

fn float(raw: &str, payload: &str) -> Result<f64, OptionError> {
    payload
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .ok_or_else(|| OptionError::new(raw, "value is not a finite number"))
}

fn size(raw: &str, payload: &str, config: &Config) -> Result<i64, OptionError> {
    if payload.starts_with('$') {
        return config
            .size_value(payload)
            .and_then(|n| i64::try_from(n).ok())
            .ok_or_else(|| OptionError::new(raw, format!("unknown config value {payload}")));
    }
    payload
        .parse::<i64>()
        .map_err(|_| OptionError::new(raw, "value is not an integer"))
}

fn unsigned_size(raw: &str, payload: &str, config: &Config) -> Result<u64, OptionError> {
    let n = size(raw, payload, config)?;
    u64::try_from(n).map_err(|_| OptionError::new(raw, "size cannot be negative"))
}

fn count(raw: &str, payload: &str) -> Result<u64, OptionError> {
    payload
        .parse::<u64>()
        .map_err(|_| OptionError::new(raw, "value is not a non-negative integer"))
}

fn find(raw: &[String], code: char) -> &str {
    raw.iter()
        .find(|s| s.starts_with(code))
        .map(String::as_str)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn type_opts(v: &[&str], kind: BaseKind) -> Result<TypeOptions, OptionError> {
        TypeOptions::parse(&strings(v), kind, &Config::default())
    }

    fn field_opts(v: &[&str]) -> Result<FieldOptions, OptionError> {
        FieldOptions::parse(&strings(v), &Config::default())
    }

    #[test]
    fn decodes_type_option_codes() {
        let cfg = Config::default();
        assert_eq!(TypeOption::parse("=", &cfg).unwrap(), TypeOption::Id);
        assert_eq!(
            TypeOption::parse("*Integer", &cfg).unwrap(),
            TypeOption::ValueType(TypeRef::Builtin(BaseKind::Integer))
        );
        assert_eq!(
            TypeOption::parse("#Menu", &cfg).unwrap(),
            TypeOption::Derived(Derivation::Fields(TypeRef::Named("Menu".into())))
        );
        assert_eq!(
            TypeOption::parse("/i16", &cfg).unwrap(),
            TypeOption::Format("i16".into())
        );
        assert_eq!(TypeOption::parse("{16", &cfg).unwrap(), TypeOption::MinSize(16));
        assert_eq!(TypeOption::parse("y-1.5", &cfg).unwrap(), TypeOption::MinValue(-1.5));
        assert_eq!(
            TypeOption::parse("}$MaxString", &cfg).unwrap(),
            TypeOption::MaxSize(255)
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_codes() {
        let cfg = Config::default();
        for bad in ["", "?", "X", "q1", "{abc", "}$Nope", "*", "/", "ynan", "*ns:"] {
            let err = TypeOption::parse(bad, &cfg).unwrap_err();
            assert_eq!(err.option, bad);
        }
    }

    #[test]
    fn code_round_trips_through_parse() {
        let cfg = Config::default();
        for raw in ["=", "*T", "+K", "#S", ">S", "/x", "%^a$", "y1", "z2", "{1", "}2", "q", "s", "b", "<"] {
            let opt = TypeOption::parse(raw, &cfg).unwrap();
            assert!(raw.starts_with(opt.code()), "{raw}");
        }
    }

    #[test]
    fn option_not_meaningful_for_kind_is_rejected() {
        let err = type_opts(&["%^a$"], BaseKind::Integer).unwrap_err();
        assert!(err.reason.contains("Integer"));
        assert!(err.misplaced);
        assert!(!TypeOption::parse("?x", &Config::default()).unwrap_err().misplaced);
        assert!(type_opts(&["*String"], BaseKind::Record).is_err());
        assert!(type_opts(&["q"], BaseKind::Array).is_err());
        assert!(type_opts(&["="], BaseKind::Choice).is_err());
    }

    #[test]
    fn duplicate_and_exclusive_codes_rejected() {
        assert!(type_opts(&["{1", "{2"], BaseKind::String).is_err());
        assert!(type_opts(&["#A", ">A"], BaseKind::Enumerated).is_err());
        assert!(type_opts(&["*Integer", "q", "s"], BaseKind::ArrayOf).is_err());
    }

    #[test]
    fn size_range_rules() {
        assert!(type_opts(&["{5", "}2"], BaseKind::String).is_err());
        // 0 means unbounded for sizes
        let opts = type_opts(&["{5", "}0"], BaseKind::String).unwrap();
        assert_eq!(opts.max_size, Some(0));
        // Integer bounds are values: negative allowed, 0 is a real bound
        let opts = type_opts(&["{-10", "}0"], BaseKind::Integer).unwrap();
        assert_eq!((opts.min_size, opts.max_size), (Some(-10), Some(0)));
        assert!(type_opts(&["{5", "}0"], BaseKind::Integer).is_err());
        assert!(type_opts(&["{-1"], BaseKind::String).is_err());
        assert!(type_opts(&["y3", "z1"], BaseKind::Number).is_err());
    }

    #[test]
    fn array_of_semantics_default_to_bag() {
        let opts = type_opts(&["*Integer"], BaseKind::ArrayOf).unwrap();
        assert_eq!(opts.item_semantics(), ItemSemantics::Bag);
        let opts = type_opts(&["*Integer", "s"], BaseKind::ArrayOf).unwrap();
        assert!(opts.item_semantics().requires_unique());
    }

    #[test]
    fn field_cardinality_defaults() {
        let opts = field_opts(&[]).unwrap();
        assert_eq!((opts.min_count, opts.max_count), (1, 1));
        let opts = field_opts(&["[0"]).unwrap();
        assert!(opts.is_optional());
        assert!(!opts.is_multiple());
        let opts = field_opts(&["[2"]).unwrap();
        assert_eq!(opts.max_count, 2);
        assert!(opts.is_multiple());
        let opts = field_opts(&["[0", "]0"]).unwrap();
        assert!(opts.is_multiple());
    }

    #[test]
    fn field_options_decoded() {
        let opts = field_opts(&["&1", "K", "{2", "}8"]).unwrap();
        assert_eq!(opts.tag_id, Some(1));
        assert!(opts.key);
        assert!(!opts.link);
        assert_eq!((opts.min_size, opts.max_size), (Some(2), Some(8)));
    }

    #[test]
    fn field_option_errors() {
        assert!(field_opts(&["[3", "]2"]).is_err());
        assert!(field_opts(&["&0"]).is_err());
        assert!(field_opts(&["&x"]).is_err());
        assert!(field_opts(&["K1"]).is_err());
        assert!(field_opts(&["[-1"]).is_err());
        assert!(field_opts(&["&2", "]0"]).is_err());
        let err = field_opts(&["/email"]).unwrap_err();
        assert!(err.reason.contains("not allowed on a field"));
        let err = field_opts(&["!x"]).unwrap_err();
        assert!(err.reason.contains("unknown field option"));
    }
}
