//! Value constraints attached to properties.

use serde::{Deserialize, Serialize};

/// What a property value must look like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Any non-null value, stored as given.
    Any,
    Bool,
    Integer {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    Float {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    String {
        #[serde(default)]
        min_len: Option<usize>,
        #[serde(default)]
        max_len: Option<usize>,
    },
    /// One of a fixed set of strings.
    Enum { values: Vec<String> },
    List {
        element: Box<Constraint>,
        #[serde(default)]
        min_items: Option<usize>,
        #[serde(default)]
        max_items: Option<usize>,
    },
    /// Array of numbers, coerced to an array of floats.
    Vector {
        #[serde(default)]
        dims: Option<usize>,
    },
    /// String-keyed object, stored as given.
    Map,
    /// Scalar type recognised by a [`crate::constraint::ValueRegistry`].
    Custom { name: String },
}

impl Constraint {
    pub fn integer() -> Self { Constraint::Integer { min: None, max: None } }
    pub fn float() -> Self { Constraint::Float { min: None, max: None } }
    pub fn string() -> Self { Constraint::String { min_len: None, max_len: None } }

    pub fn enumeration(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Constraint::Enum { values: values.into_iter().map(Into::into).collect() }
    }

    pub fn list(element: Constraint) -> Self {
        Constraint::List { element: Box::new(element), min_items: None, max_items: None }
    }

    /// Name of the expected kind, as used in "expected X, got Y" messages.
    pub fn kind_name(&self) -> &str {
        match self {
            Constraint::Any => "any",
            Constraint::Bool => "boolean",
            Constraint::Integer { .. } => "integer",
            Constraint::Float { .. } => "float",
            Constraint::String { .. } | Constraint::Enum { .. } => "string",
            Constraint::List { .. } | Constraint::Vector { .. } => "array",
            Constraint::Map => "object",
            Constraint::Custom { name } => name,
        }
    }
}
