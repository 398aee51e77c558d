//! `AnyValue`: the closed input union.
//!
//! Foreign data (JSON documents, hand-built maps, host structs) enters the
//! crate through this type. The validator never inspects anything else.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Untyped, mutable input value.
///
/// `Map(None)` and `List(None)` are typed-but-nil containers: they are distinct
/// from `Null` (untyped nothing) and from `Map(Some(empty))` (present but empty).
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AnyValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    /// String-keyed map. `None` is a nil map.
    Map(Option<HashMap<String, AnyValue>>),
    /// Map with non-string keys. `None` is a nil map.
    KeyedMap(Option<HashMap<MapKey, AnyValue>>),
    /// Ordered sequence. `None` is a nil sequence.
    List(Option<Vec<AnyValue>>),
    /// Host value carried through untouched (never deep-copied).
    Opaque(Opaque),
}

/// Key of a non-string-keyed map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKey {
    String(String),
    Int(i64),
    Uint(u64),
    Bool(bool),
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::String(s) => write!(f, "{s}"),
            MapKey::Int(i) => write!(f, "{i}"),
            MapKey::Uint(u) => write!(f, "{u}"),
            MapKey::Bool(b) => write!(f, "{b}"),
        }
    }
}

// ============================================================================
// Opaque host values
// ============================================================================

/// A host value the crate stores but never looks inside.
///
/// `to_json` returns `None` for values with no canonical JSON form
/// (callbacks, channels, handles); such values cannot be key components.
pub trait OpaqueValue: fmt::Debug + Send + Sync + 'static {
    fn type_name(&self) -> &str;
    fn to_json(&self) -> Option<serde_json::Value>;
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to an [`OpaqueValue`]. Cloning shares the same value.
#[derive(Debug, Clone)]
pub struct Opaque(Arc<dyn OpaqueValue>);

impl Opaque {
    pub fn new(value: impl OpaqueValue) -> Self {
        Self(Arc::new(value))
    }

    pub fn type_name(&self) -> &str {
        self.0.type_name()
    }

    pub fn to_json(&self) -> Option<serde_json::Value> {
        self.0.to_json()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// True when both handles point at the same host value.
    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

// ============================================================================
// Type checking
// ============================================================================

impl AnyValue {
    /// Kind name used in diagnostics ("expected integer, got string").
    pub fn kind_name(&self) -> &'static str {
        match self {
            AnyValue::Null => "null",
            AnyValue::Bool(_) => "boolean",
            AnyValue::Int(_) | AnyValue::Uint(_) => "integer",
            AnyValue::Float(_) => "float",
            AnyValue::String(_) => "string",
            AnyValue::Map(_) | AnyValue::KeyedMap(_) => "object",
            AnyValue::List(_) => "array",
            AnyValue::Opaque(_) => "opaque",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AnyValue::Null)
    }

    pub fn as_map(&self) -> Option<&HashMap<String, AnyValue>> {
        match self {
            AnyValue::Map(Some(m)) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AnyValue]> {
        match self {
            AnyValue::List(Some(l)) => Some(l),
            _ => None,
        }
    }

    /// Build a string-keyed map from pairs.
    pub fn map<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<AnyValue>,
    {
        AnyValue::Map(Some(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()))
    }

    /// Build a list from items.
    pub fn list<V: Into<AnyValue>>(items: impl IntoIterator<Item = V>) -> Self {
        AnyValue::List(Some(items.into_iter().map(Into::into).collect()))
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for AnyValue { fn from(v: bool) -> Self { AnyValue::Bool(v) } }
impl From<i8> for AnyValue { fn from(v: i8) -> Self { AnyValue::Int(v.into()) } }
impl From<i16> for AnyValue { fn from(v: i16) -> Self { AnyValue::Int(v.into()) } }
impl From<i32> for AnyValue { fn from(v: i32) -> Self { AnyValue::Int(v.into()) } }
impl From<i64> for AnyValue { fn from(v: i64) -> Self { AnyValue::Int(v) } }
impl From<u8> for AnyValue { fn from(v: u8) -> Self { AnyValue::Uint(v.into()) } }
impl From<u16> for AnyValue { fn from(v: u16) -> Self { AnyValue::Uint(v.into()) } }
impl From<u32> for AnyValue { fn from(v: u32) -> Self { AnyValue::Uint(v.into()) } }
impl From<u64> for AnyValue { fn from(v: u64) -> Self { AnyValue::Uint(v) } }
impl From<f32> for AnyValue { fn from(v: f32) -> Self { AnyValue::Float(v.into()) } }
impl From<f64> for AnyValue { fn from(v: f64) -> Self { AnyValue::Float(v) } }
impl From<String> for AnyValue { fn from(v: String) -> Self { AnyValue::String(v) } }
impl From<&str> for AnyValue { fn from(v: &str) -> Self { AnyValue::String(v.to_owned()) } }
impl From<Opaque> for AnyValue { fn from(v: Opaque) -> Self { AnyValue::Opaque(v) } }
impl<T: Into<AnyValue>> From<Vec<T>> for AnyValue {
    fn from(v: Vec<T>) -> Self { AnyValue::List(Some(v.into_iter().map(Into::into).collect())) }
}
impl<T: Into<AnyValue>> From<Option<T>> for AnyValue {
    fn from(v: Option<T>) -> Self { v.map(Into::into).unwrap_or(AnyValue::Null) }
}
impl From<HashMap<String, AnyValue>> for AnyValue {
    fn from(v: HashMap<String, AnyValue>) -> Self { AnyValue::Map(Some(v)) }
}

impl From<serde_json::Value> for AnyValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match v {
            Json::Null => AnyValue::Null,
            Json::Bool(b) => AnyValue::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    AnyValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    AnyValue::Uint(u)
                } else {
                    AnyValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => AnyValue::String(s),
            Json::Array(items) => AnyValue::List(Some(items.into_iter().map(Into::into).collect())),
            Json::Object(obj) => AnyValue::Map(Some(obj.into_iter().map(|(k, v)| (k, v.into())).collect())),
        }
    }
}
