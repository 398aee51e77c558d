//! Immutable sequence view.

use std::sync::Arc;

use super::{AnyValue, Value};

/// Read-only ordered sequence of [`Value`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slice {
    items: Option<Arc<[Value]>>,
}

impl Slice {
    /// Take ownership of `raw` and wrap it. `None` yields a nil slice.
    pub fn wrap(raw: Option<Vec<AnyValue>>) -> Self {
        Self { items: raw.map(|v| v.into_iter().map(Value::wrap).collect()) }
    }

    /// Deep-copy `raw` and wrap the copy; the caller keeps `raw`.
    pub fn wrap_clone(raw: Option<&[AnyValue]>) -> Self {
        Self { items: raw.map(|v| v.iter().map(Value::wrap_clone).collect()) }
    }

    /// Wrap already-immutable values.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        Self { items: Some(values.into_iter().collect()) }
    }

    pub fn is_nil(&self) -> bool {
        self.items.is_none()
    }

    pub fn len(&self) -> usize {
        self.items.as_ref().map_or(0, |v| v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`, exactly like slice indexing.
    pub fn get(&self, index: usize) -> &Value {
        &self.as_slice()[index]
    }

    /// Bounds-checked element access.
    pub fn get_ok(&self, index: usize) -> Option<&Value> {
        self.as_slice().get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.as_slice().iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        self.items.as_deref().unwrap_or(&[])
    }

    /// Deep copy back to a mutable raw sequence. Nil stays `None`.
    pub fn to_raw(&self) -> Option<Vec<AnyValue>> {
        self.items.as_ref().map(|v| v.iter().map(Value::to_any).collect())
    }
}

impl<'a> IntoIterator for &'a Slice {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
