//! Immutable map view.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use super::{AnyValue, Value};

/// Read-only map of `K` to [`Value`].
///
/// Built once at construction; every nested value is already wrapped.
/// A nil-backed map (`is_nil() == true`) behaves as empty for reads but
/// round-trips back to `None` through [`Map::to_raw`].
#[derive(Debug, Clone)]
pub struct Map<K = String> {
    entries: Option<Arc<hashbrown::HashMap<K, Value>>>,
}

impl<K> Default for Map<K> {
    /// The nil map.
    fn default() -> Self {
        Self { entries: None }
    }
}

impl<K: Eq + Hash + Clone> Map<K> {
    /// Take ownership of `raw` and wrap it. `None` yields a nil map.
    pub fn wrap(raw: Option<HashMap<K, AnyValue>>) -> Self {
        Self {
            entries: raw.map(|m| Arc::new(m.into_iter().map(|(k, v)| (k, Value::wrap(v))).collect())),
        }
    }

    /// Deep-copy `raw` and wrap the copy; the caller keeps `raw`.
    pub fn wrap_clone(raw: Option<&HashMap<K, AnyValue>>) -> Self {
        Self {
            entries: raw.map(|m| {
                Arc::new(m.iter().map(|(k, v)| (k.clone(), Value::wrap_clone(v))).collect())
            }),
        }
    }

    /// Wrap already-immutable values.
    pub fn from_values(values: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self { entries: Some(Arc::new(values.into_iter().collect())) }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&Value>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.as_ref()?.get(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Deep copy back to a mutable raw map. Nil stays `None`, empty stays empty.
    pub fn to_raw(&self) -> Option<HashMap<K, AnyValue>> {
        self.entries
            .as_ref()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.to_any())).collect())
    }
}

impl<K> Map<K> {
    pub fn is_nil(&self) -> bool {
        self.entries.is_none()
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.entries.iter().flat_map(|m| m.keys())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.entries.iter().flat_map(|m| m.values())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Value)> + '_ {
        self.entries.iter().flat_map(|m| m.iter())
    }
}

impl<K: Eq + Hash> PartialEq for Map<K> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.entries, &other.entries) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}
