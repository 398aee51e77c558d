//! Primary / foreign key tuples with a canonical string form.
//!
//! The canonical form is the compact JSON array of the components
//! (`["us",12345]`, `[]` for the empty key). Other systems derive the same
//! string independently, so the encoding must stay byte-stable.
//!
//! Whole-valued floats that fit a 64-bit integer encode without a fraction
//! (`[1]`, not `[1.0]`), so a float key and the equal integer key share one
//! string. Other floats use the shortest round-trip form; very large or very
//! small magnitudes come out in exponent notation (`1e300`, `1e-7`).

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde_json::Value as Json;
use smallvec::SmallVec;

use super::{AnyValue, MapKey, Value};

const I64_MIN_F: f64 = -9_223_372_036_854_775_808.0;
const I64_MAX_F: f64 = 9_223_372_036_854_775_808.0;
const U64_MAX_F: f64 = 18_446_744_073_709_551_616.0;

/// Why a component list has no canonical encoding.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KeyError {
    #[error("key component {index}: non-finite float {value}")]
    NonFiniteFloat { index: usize, value: f64 },

    #[error("key component {index}: map key {key} is neither a string nor an integer")]
    UnsupportedMapKey { index: usize, key: String },

    #[error("key component {index}: opaque value of type {type_name} has no JSON form")]
    Unencodable { index: usize, type_name: String },

    #[error("key component {index}: map keys collide on {key:?} once encoded")]
    DuplicateMapKey { index: usize, key: String },
}

/// Ordered, fixed-length key tuple.
#[derive(Debug, Clone)]
pub struct Key {
    components: SmallVec<[Value; 2]>,
    canonical: String,
}

impl Key {
    /// Build a key from already-immutable components.
    pub fn new(components: impl IntoIterator<Item = Value>) -> Result<Self, KeyError> {
        let components: SmallVec<[Value; 2]> = components.into_iter().collect();
        let json = components
            .iter()
            .enumerate()
            .map(|(index, v)| value_to_json(v, index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { canonical: Json::Array(json).to_string(), components })
    }

    /// Take ownership of raw components. `None` yields the empty key.
    pub fn wrap(raw: Option<Vec<AnyValue>>) -> Result<Self, KeyError> {
        Self::new(raw.unwrap_or_default().into_iter().map(Value::wrap))
    }

    /// Deep-copy raw components; the caller keeps `raw`.
    pub fn wrap_clone(raw: Option<&[AnyValue]>) -> Result<Self, KeyError> {
        Self::new(raw.unwrap_or_default().iter().map(Value::wrap_clone))
    }

    /// The empty key, `[]`.
    pub fn empty() -> Self {
        Self { components: SmallVec::new(), canonical: "[]".to_string() }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn get(&self, index: usize) -> &Value {
        &self.components[index]
    }

    pub fn get_ok(&self, index: usize) -> Option<&Value> {
        self.components.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.components.iter()
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Deep copy of the components in raw form.
    pub fn to_raw(&self) -> Vec<AnyValue> {
        self.components.iter().map(Value::to_any).collect()
    }
}

impl Default for Key {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

// ============================================================================
// Canonical JSON encoding
// ============================================================================

/// Encode raw components exactly as [`Key`] encodes wrapped ones.
pub fn encode_components(raw: &[AnyValue]) -> Result<String, KeyError> {
    let json = raw
        .iter()
        .enumerate()
        .map(|(index, v)| any_to_json(v, index))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json::Array(json).to_string())
}

/// Whole-valued floats inside the 64-bit integer range encode as integers
/// (`1.0` -> `1`), matching encoders that do not distinguish the two.
fn float_to_json(f: f64, index: usize) -> Result<Json, KeyError> {
    if f.fract() == 0.0 {
        if (I64_MIN_F..I64_MAX_F).contains(&f) {
            return Ok(Json::from(f as i64));
        }
        if (0.0..U64_MAX_F).contains(&f) {
            return Ok(Json::from(f as u64));
        }
    }
    serde_json::Number::from_f64(f)
        .map(Json::Number)
        .ok_or(KeyError::NonFiniteFloat { index, value: f })
}

fn map_key_to_string(key: &MapKey, index: usize) -> Result<String, KeyError> {
    match key {
        MapKey::String(s) => Ok(s.clone()),
        MapKey::Int(i) => Ok(i.to_string()),
        MapKey::Uint(u) => Ok(u.to_string()),
        MapKey::Bool(b) => Err(KeyError::UnsupportedMapKey { index, key: b.to_string() }),
    }
}

/// Object from a non-string-keyed map. `1` and `"1"` both encode as the
/// member name `"1"`, so such a pair has no single canonical form.
fn keyed_object<'a, V: 'a>(
    entries: impl Iterator<Item = (&'a MapKey, &'a V)>,
    index: usize,
    encode: fn(&V, usize) -> Result<Json, KeyError>,
) -> Result<Json, KeyError> {
    let mut object = serde_json::Map::new();
    for (k, v) in entries {
        let key = map_key_to_string(k, index)?;
        if object.contains_key(&key) {
            return Err(KeyError::DuplicateMapKey { index, key });
        }
        object.insert(key, encode(v, index)?);
    }
    Ok(Json::Object(object))
}

fn value_to_json(value: &Value, index: usize) -> Result<Json, KeyError> {
    Ok(match value {
        Value::Nil => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Uint(u) => Json::from(*u),
        Value::Float(f) => float_to_json(*f, index)?,
        Value::String(s) => Json::String(s.to_string()),
        Value::Map(m) if m.is_nil() => Json::Null,
        Value::Map(m) => Json::Object(
            m.iter()
                .map(|(k, v)| Ok((k.clone(), value_to_json(v, index)?)))
                .collect::<Result<_, KeyError>>()?,
        ),
        Value::KeyedMap(m) if m.is_nil() => Json::Null,
        Value::KeyedMap(m) => keyed_object(m.iter(), index, value_to_json)?,
        Value::Slice(s) if s.is_nil() => Json::Null,
        Value::Slice(s) => Json::Array(
            s.iter().map(|v| value_to_json(v, index)).collect::<Result<_, _>>()?,
        ),
        Value::Opaque(o) => o.to_json().ok_or_else(|| KeyError::Unencodable {
            index,
            type_name: o.type_name().to_string(),
        })?,
    })
}

fn any_to_json(value: &AnyValue, index: usize) -> Result<Json, KeyError> {
    Ok(match value {
        AnyValue::Null | AnyValue::Map(None) | AnyValue::KeyedMap(None) | AnyValue::List(None) => Json::Null,
        AnyValue::Bool(b) => Json::Bool(*b),
        AnyValue::Int(i) => Json::from(*i),
        AnyValue::Uint(u) => Json::from(*u),
        AnyValue::Float(f) => float_to_json(*f, index)?,
        AnyValue::String(s) => Json::String(s.clone()),
        AnyValue::Map(Some(m)) => Json::Object(
            m.iter()
                .map(|(k, v)| Ok((k.clone(), any_to_json(v, index)?)))
                .collect::<Result<_, KeyError>>()?,
        ),
        AnyValue::KeyedMap(Some(m)) => keyed_object(m.iter(), index, any_to_json)?,
        AnyValue::List(Some(items)) => Json::Array(
            items.iter().map(|v| any_to_json(v, index)).collect::<Result<_, _>>()?,
        ),
        AnyValue::Opaque(o) => o.to_json().ok_or_else(|| KeyError::Unencodable {
            index,
            type_name: o.type_name().to_string(),
        })?,
    })
}
