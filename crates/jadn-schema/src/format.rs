//! # Format Hints
//!
//! Table of `/fmt` format checks, keyed by base kind and format name.
//!
//! A format either constrains values (`i16`, `email`, `ipv4-addr`) or only
//! selects a wire serialization (`x`, `X`, `f32`). Both kinds must be
//! registered: the loader rejects a `/fmt` option whose name is not in the
//! table for the type's base kind.
//!
//! Applications add their own formats with [`FormatRegistry::register`]; the
//! option grammar does not change.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, OnceLock};

use jadn_core::{BaseKind, Value};
use regex::Regex;

/// A format check. Returns a reason when the value does not conform.
pub type FormatCheck = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Registered format checks.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    checks: BTreeMap<(BaseKind, String), FormatCheck>,
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.checks.keys()).finish()
    }
}

impl FormatRegistry {
    /// An empty table.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard JADN format table.
    pub fn standard() -> Self {
        let mut reg = Self::empty();

        reg.register("email", BaseKind::String, |v| with_str(v, email));
        reg.register("idn-email", BaseKind::String, |v| with_str(v, idn_email));
        reg.register("hostname", BaseKind::String, |v| with_str(v, hostname));
        reg.register("idn-hostname", BaseKind::String, |v| with_str(v, idn_hostname));
        reg.register("date-time", BaseKind::String, |v| {
            with_str(v, |s| ok_if(chrono::DateTime::parse_from_rfc3339(s).is_ok()))
        });
        reg.register("date", BaseKind::String, |v| {
            with_str(v, |s| {
                ok_if(s.len() == 10 && chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
            })
        });
        reg.register("time", BaseKind::String, |v| {
            with_str(v, |s| {
                ok_if(chrono::DateTime::parse_from_rfc3339(&format!("1970-01-01T{s}")).is_ok())
            })
        });
        reg.register("duration", BaseKind::String, |v| with_str(v, duration));
        reg.register("ipv4", BaseKind::String, |v| {
            with_str(v, |s| ok_if(s.parse::<Ipv4Addr>().is_ok()))
        });
        reg.register("ipv6", BaseKind::String, |v| {
            with_str(v, |s| ok_if(s.parse::<Ipv6Addr>().is_ok()))
        });
        reg.register("uri", BaseKind::String, |v| with_str(v, |s| ok_if(absolute_uri(s, true))));
        reg.register("iri", BaseKind::String, |v| with_str(v, |s| ok_if(absolute_uri(s, false))));
        reg.register("uri-reference", BaseKind::String, |v| {
            with_str(v, |s| ok_if(s.is_ascii() && uri_reference(s)))
        });
        reg.register("iri-reference", BaseKind::String, |v| {
            with_str(v, |s| ok_if(uri_reference(s)))
        });
        reg.register("uuid", BaseKind::String, |v| {
            with_str(v, |s| ok_if(s.len() == 36 && uuid::Uuid::parse_str(s).is_ok()))
        });
        reg.register("uri-template", BaseKind::String, |v| with_str(v, uri_template));
        reg.register("json-pointer", BaseKind::String, |v| {
            with_str(v, |s| ok_if(s.is_empty() || (s.starts_with('/') && pointer_escapes(s))))
        });
        reg.register("relative-json-pointer", BaseKind::String, |v| {
            with_str(v, relative_json_pointer)
        });
        reg.register("regex", BaseKind::String, |v| {
            with_str(v, |s| Regex::new(s).map(|_| ()).map_err(|e| e.to_string()))
        });

        reg.register("eui", BaseKind::Binary, |v| {
            with_bytes(v, |b| ok_if(b.len() == 6 || b.len() == 8))
        });
        reg.register("ipv4-addr", BaseKind::Binary, |v| with_bytes(v, |b| ok_if(b.len() == 4)));
        reg.register("ipv6-addr", BaseKind::Binary, |v| with_bytes(v, |b| ok_if(b.len() == 16)));
        for name in ["b", "x", "X"] {
            reg.register(name, BaseKind::Binary, |_| Ok(()));
        }

        reg.register("ipv4-net", BaseKind::Array, |v| ip_net(v, 4, 32));
        reg.register("ipv6-net", BaseKind::Array, |v| ip_net(v, 16, 128));

        reg.register("i8", BaseKind::Integer, |v| signed(v, 8));
        reg.register("i16", BaseKind::Integer, |v| signed(v, 16));
        reg.register("i32", BaseKind::Integer, |v| signed(v, 32));
        reg.register("i64", BaseKind::Integer, |v| signed(v, 64));
        reg.register("datetime-ms", BaseKind::Integer, |v| match v {
            Value::Integer(ms) => ok_if(chrono::DateTime::<chrono::Utc>::from_timestamp_millis(*ms).is_some()),
            other => Err(format!("expected integer, found {}", other.kind_name())),
        });

        for name in ["f16", "f32", "f64"] {
            reg.register(name, BaseKind::Number, |_| Ok(()));
        }
        reg
    }

    /// Register (or replace) a format check for a base kind.
    pub fn register<F>(&mut self, name: &str, kind: BaseKind, check: F)
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.checks.insert((kind, name.to_string()), Arc::new(check));
    }

    /// Whether a format name is usable on a type of the given kind.
    ///
    /// Integer `uN` formats (unsigned N-bit, 1 ≤ N ≤ 64) are always available.
    pub fn is_registered(&self, kind: BaseKind, name: &str) -> bool {
        self.checks.contains_key(&(kind, name.to_string()))
            || (kind == BaseKind::Integer && unsigned_bits(name).is_some())
    }

    /// Run the check for a format.
    ///
    /// # Errors
    ///
    /// Returns the reason the value does not conform, or that the format is
    /// not registered for `kind`.
    pub fn check(&self, kind: BaseKind, name: &str, value: &Value) -> Result<(), String> {
        if let Some(check) = self.checks.get(&(kind, name.to_string())) {
            return check(value);
        }
        match (kind, unsigned_bits(name)) {
            (BaseKind::Integer, Some(bits)) => unsigned(value, bits),
            _ => Err(format!("format \"{name}\" is not registered for {kind}")),
        }
    }

    /// Registered format names for a kind, sorted.
    pub fn names(&self, kind: BaseKind) -> Vec<&str> {
        self.checks
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, n)| n.as_str())
            .collect()
    }
}

fn ok_if(cond: bool) -> Result<(), String> {
    if cond {
        Ok(())
    } else {
        Err("value does not match format".to_string())
    }
}

fn with_str(v: &Value, f: impl Fn(&str) -> Result<(), String>) -> Result<(), String> {
    match v {
        Value::String(s) => f(s),
        other => Err(format!("expected string, found {}", other.kind_name())),
    }
}

fn with_bytes(v: &Value, f: impl Fn(&[u8]) -> Result<(), String>) -> Result<(), String> {
    match v {
        Value::Binary(b) => f(b),
        other => Err(format!("expected binary, found {}", other.kind_name())),
    }
}

fn signed(v: &Value, bits: u32) -> Result<(), String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("expected integer, found {}", v.kind_name()))?;
    if bits >= 64 {
        return Ok(());
    }
    let bound = 1i64 << (bits - 1);
    if (-bound..bound).contains(&n) {
        Ok(())
    } else {
        Err(format!("{n} is out of range for i{bits}"))
    }
}

fn unsigned(v: &Value, bits: u32) -> Result<(), String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("expected integer, found {}", v.kind_name()))?;
    let in_range = n >= 0 && (bits >= 63 || n < (1i64 << bits));
    if in_range {
        Ok(())
    } else {
        Err(format!("{n} is out of range for u{bits}"))
    }
}

fn unsigned_bits(name: &str) -> Option<u32> {
    let digits = name.strip_prefix('u')?;
    if digits.starts_with('0') {
        return None;
    }
    digits.parse::<u32>().ok().filter(|n| (1..=64).contains(n))
}

fn ip_net(v: &Value, addr_len: usize, max_prefix: i64) -> Result<(), String> {
    match v.as_array() {
        Some([Value::Binary(addr), Value::Integer(prefix)]) => {
            if addr.len() != addr_len {
                Err(format!("address must be {addr_len} bytes"))
            } else if !(0..=max_prefix).contains(prefix) {
                Err(format!("prefix length must be 0..={max_prefix}"))
            } else {
                Ok(())
            }
        }
        _ => Err("expected [address, prefix length]".to_string()),
    }
}

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn email(s: &str) -> Result<(), String> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = cached(
        &RE,
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?\.)+[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?$",
    );
    ok_if(re.is_some_and(|re| re.is_match(s)))
}

fn idn_email(s: &str) -> Result<(), String> {
    match s.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() && idn_hostname(domain).is_ok() => Ok(()),
        _ => ok_if(false),
    }
}

fn hostname(s: &str) -> Result<(), String> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let label = cached(&RE, r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$");
    let host = s.strip_suffix('.').unwrap_or(s);
    ok_if(
        !host.is_empty()
            && s.len() <= 253
            && label.is_some_and(|re| host.split('.').all(|l| re.is_match(l))),
    )
}

fn idn_hostname(s: &str) -> Result<(), String> {
    let host = s.strip_suffix('.').unwrap_or(s);
    let label_ok = |l: &str| {
        let n = l.chars().count();
        (1..=63).contains(&n)
            && !l.starts_with('-')
            && !l.ends_with('-')
            && l.chars().all(|c| c.is_alphanumeric() || c == '-')
    };
    ok_if(!host.is_empty() && host.split('.').all(label_ok))
}

fn duration(s: &str) -> Result<(), String> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = cached(
        &RE,
        r"^P(?:\d+W|(?:\d+Y)?(?:\d+M)?(?:\d+D)?(?:T(?:\d+H)?(?:\d+M)?(?:\d+(?:\.\d+)?S)?)?)$",
    );
    ok_if(s != "P" && !s.ends_with('T') && re.is_some_and(|re| re.is_match(s)))
}

fn absolute_uri(s: &str, ascii_only: bool) -> bool {
    (!ascii_only || s.is_ascii()) && !s.contains(char::is_whitespace) && url::Url::parse(s).is_ok()
}

fn uri_reference(s: &str) -> bool {
    if s.contains(char::is_whitespace) {
        return false;
    }
    url::Url::parse("http://reference.invalid/")
        .and_then(|base| base.join(s))
        .is_ok()
}

fn uri_template(s: &str) -> Result<(), String> {
    let mut open = false;
    for c in s.chars() {
        match c {
            '{' if open => return ok_if(false),
            '{' => open = true,
            '}' if !open => return ok_if(false),
            '}' => open = false,
            _ => {}
        }
    }
    ok_if(!open)
}

fn pointer_escapes(s: &str) -> bool {
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '~' && !matches!(chars.next(), Some('0' | '1')) {
            return false;
        }
    }
    true
}

fn relative_json_pointer(s: &str) -> Result<(), String> {
    let digits = s.chars().take_while(char::is_ascii_digit).count();
    let (prefix, rest) = s.split_at(digits);
    let prefix_ok = !prefix.is_empty() && (prefix == "0" || !prefix.starts_with('0'));
    let rest_ok = rest == "#" || rest.is_empty() || (rest.starts_with('/') && pointer_escapes(rest));
    ok_if(prefix_ok && rest_ok)
}
