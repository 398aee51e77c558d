//! Properties: case-sensitive property map with a case-folded index.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{AnyValue, Value};

/// Immutable map of property name to [`Value`].
///
/// Lookups are case-sensitive; [`Properties::get_fold`] additionally resolves
/// names under ASCII case folding. When two names fold to the same string the
/// alphabetically-first original name wins, so the result never depends on
/// hash iteration order.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    inner: Arc<PropertiesInner>,
}

#[derive(Debug, Default)]
struct PropertiesInner {
    values: hashbrown::HashMap<String, Value>,
    /// folded name → original name
    folded: hashbrown::HashMap<String, String>,
    sorted: Vec<String>,
}

/// ASCII-only case folding: `A-Z` become `a-z`, everything else is untouched.
pub fn fold_name(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl Properties {
    /// Take ownership of `raw` and wrap it.
    pub fn wrap(raw: HashMap<String, AnyValue>) -> Self {
        Self::from_values(raw.into_iter().map(|(k, v)| (k, Value::wrap(v))))
    }

    /// Deep-copy `raw` and wrap the copy; the caller keeps `raw`.
    pub fn wrap_clone(raw: &HashMap<String, AnyValue>) -> Self {
        Self::from_values(raw.iter().map(|(k, v)| (k.clone(), Value::wrap_clone(v))))
    }

    /// Wrap already-immutable values.
    pub fn from_values(values: impl IntoIterator<Item = (String, Value)>) -> Self {
        let values: hashbrown::HashMap<String, Value> = values.into_iter().collect();
        let mut sorted: Vec<String> = values.keys().cloned().collect();
        sorted.sort();

        // Walking in sorted order and keeping the first entry per folded name
        // gives the alphabetically-first original on collision.
        let mut folded = hashbrown::HashMap::with_capacity(sorted.len());
        for name in &sorted {
            folded.entry(fold_name(name)).or_insert_with(|| name.clone());
        }

        Self { inner: Arc::new(PropertiesInner { values, folded, sorted }) }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner.values.get(name)
    }

    /// Case-insensitive (ASCII) lookup.
    pub fn get_fold(&self, name: &str) -> Option<&Value> {
        let original = self.inner.folded.get(&fold_name(name))?;
        self.inner.values.get(original)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.values.is_empty()
    }

    /// Property names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.inner.sorted.iter().map(String::as_str)
    }

    /// `(name, value)` pairs in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.inner
            .sorted
            .iter()
            .filter_map(|k| self.inner.values.get(k).map(|v| (k.as_str(), v)))
    }

    /// Deep copy back to a mutable raw map.
    pub fn to_raw(&self) -> HashMap<String, AnyValue> {
        self.inner.values.iter().map(|(k, v)| (k.clone(), v.to_any())).collect()
    }

    /// View the properties as a single map value.
    pub fn to_value(&self) -> Value {
        Value::Map(super::Map::from_values(
            self.inner.values.iter().map(|(k, v)| (k.clone(), v.clone())),
        ))
    }
}

impl PartialEq for Properties {
    fn eq(&self, other: &Self) -> bool {
        self.inner.values == other.inner.values
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 { write!(f, ", ")?; }
            write!(f, "{k}: {v}")?;
        }
        write!(f, "}}")
    }
}
