//! Immutable value type produced by validation.

use std::fmt;
use std::sync::Arc;

use super::{AnyValue, Map, MapKey, Opaque, Slice};

/// Read-only, recursively wrapped value.
///
/// Containers are wrapped eagerly: by the time construction returns, every
/// nested value reachable from the root is itself a `Value`. Cloning is cheap
/// (containers are `Arc`-shared) and never observable, since nothing mutates.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(Arc<str>),
    Map(Map<String>),
    KeyedMap(Map<MapKey>),
    Slice(Slice),
    Opaque(Opaque),
}

// ============================================================================
// Construction
// ============================================================================

impl Value {
    /// Take ownership of `raw` and wrap it.
    pub fn wrap(raw: AnyValue) -> Self {
        match raw {
            AnyValue::Null => Value::Nil,
            AnyValue::Bool(b) => Value::Bool(b),
            AnyValue::Int(i) => Value::Int(i),
            AnyValue::Uint(u) => Value::Uint(u),
            AnyValue::Float(f) => Value::Float(f),
            AnyValue::String(s) => Value::String(s.into()),
            AnyValue::Map(m) => Value::Map(Map::wrap(m)),
            AnyValue::KeyedMap(m) => Value::KeyedMap(Map::wrap(m)),
            AnyValue::List(l) => Value::Slice(Slice::wrap(l)),
            AnyValue::Opaque(o) => Value::Opaque(o),
        }
    }

    /// Deep-copy `raw` and wrap the copy. Opaque leaves are shared, not copied.
    pub fn wrap_clone(raw: &AnyValue) -> Self {
        match raw {
            AnyValue::Null => Value::Nil,
            AnyValue::Bool(b) => Value::Bool(*b),
            AnyValue::Int(i) => Value::Int(*i),
            AnyValue::Uint(u) => Value::Uint(*u),
            AnyValue::Float(f) => Value::Float(*f),
            AnyValue::String(s) => Value::String(s.as_str().into()),
            AnyValue::Map(m) => Value::Map(Map::wrap_clone(m.as_ref())),
            AnyValue::KeyedMap(m) => Value::KeyedMap(Map::wrap_clone(m.as_ref())),
            AnyValue::List(l) => Value::Slice(Slice::wrap_clone(l.as_deref())),
            AnyValue::Opaque(o) => Value::Opaque(o.clone()),
        }
    }

    /// Deep copy back to the mutable raw form.
    pub fn to_any(&self) -> AnyValue {
        match self {
            Value::Nil => AnyValue::Null,
            Value::Bool(b) => AnyValue::Bool(*b),
            Value::Int(i) => AnyValue::Int(*i),
            Value::Uint(u) => AnyValue::Uint(*u),
            Value::Float(f) => AnyValue::Float(*f),
            Value::String(s) => AnyValue::String(s.to_string()),
            Value::Map(m) => AnyValue::Map(m.to_raw()),
            Value::KeyedMap(m) => AnyValue::KeyedMap(m.to_raw()),
            Value::Slice(s) => AnyValue::List(s.to_raw()),
            Value::Opaque(o) => AnyValue::Opaque(o.clone()),
        }
    }
}

// ============================================================================
// Accessors
// ============================================================================

/// Smallest and largest f64 values that convert to i64 without overflow.
const I64_MIN_F: f64 = -9_223_372_036_854_775_808.0;
const I64_MAX_F: f64 = 9_223_372_036_854_775_808.0;

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Uint(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Map(_) | Value::KeyedMap(_) => "object",
            Value::Slice(_) => "array",
            Value::Opaque(_) => "opaque",
        }
    }

    /// True for `Nil` and for nil-backed maps and slices.
    pub fn is_nil(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Map(m) => m.is_nil(),
            Value::KeyedMap(m) => m.is_nil(),
            Value::Slice(s) => s.is_nil(),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Signed integer view. Accepts unsigned values that fit and whole-valued
    /// floats inside the i64 range.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Uint(u) => i64::try_from(*u).ok(),
            Value::Float(f) if f.fract() == 0.0 && *f >= I64_MIN_F && *f < I64_MAX_F => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// String-keyed map view. A nil map matches (and reads as empty);
    /// `Nil` does not.
    pub fn as_map(&self) -> Option<&Map<String>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_keyed_map(&self) -> Option<&Map<MapKey>> {
        match self {
            Value::KeyedMap(m) => Some(m),
            _ => None,
        }
    }

    /// Sequence view. A nil slice matches; `Nil` does not.
    pub fn as_slice(&self) -> Option<&Slice> {
        match self {
            Value::Slice(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&Opaque> {
        match self {
            Value::Opaque(o) => Some(o),
            _ => None,
        }
    }

    /// Number of entries for containers and strings (in bytes), 0 otherwise.
    pub fn len(&self) -> usize {
        match self {
            Value::String(s) => s.len(),
            Value::Map(m) => m.len(),
            Value::KeyedMap(m) => m.len(),
            Value::Slice(s) => s.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Bool(v) } }
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Int(v.into()) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Int(v) } }
impl From<u64> for Value { fn from(v: u64) -> Self { Value::Uint(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Float(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::String(v.into()) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::String(v.into()) } }
impl From<AnyValue> for Value { fn from(v: AnyValue) -> Self { Value::wrap(v) } }

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Uint(u) => write!(f, "{u}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Map(m) => {
                let mut keys: Vec<&String> = m.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, k) in keys.into_iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    if let Some(v) = m.get(k) {
                        write!(f, "{k:?}: {v}")?;
                    }
                }
                write!(f, "}}")
            }
            Value::KeyedMap(m) => {
                let mut keys: Vec<&MapKey> = m.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, k) in keys.into_iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    if let Some(v) = m.get(k) {
                        write!(f, "{k}: {v}")?;
                    }
                }
                write!(f, "}}")
            }
            Value::Slice(s) => {
                write!(f, "[")?;
                for (i, v) in s.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Opaque(o) => write!(f, "<{}>", o.type_name()),
        }
    }
}
