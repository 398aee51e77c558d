//! Type, property, relation and invariant descriptors.

use serde::{Deserialize, Serialize};

use super::Constraint;

/// Stable identifier of a type: owning schema plus type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId {
    pub schema: String,
    pub name: String,
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// A declared property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    pub constraint: Constraint,
    #[serde(default)]
    pub required: bool,
}

impl PropertyDef {
    pub fn required(name: impl Into<String>, constraint: Constraint) -> Self {
        Self { name: name.into(), constraint, required: true }
    }

    pub fn optional(name: impl Into<String>, constraint: Constraint) -> Self {
        Self { name: name.into(), constraint, required: false }
    }
}

/// Association (reference by key) or composition (owned, embedded children).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Association,
    Composition,
}

/// A declared relation from one type to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name; also the input field carrying it.
    pub name: String,
    pub kind: RelationKind,
    /// Target type name, resolved in the schema that declares the relation.
    pub target: String,
    /// Many-valued relations take an array of targets.
    #[serde(default)]
    pub many: bool,
    #[serde(default)]
    pub required: bool,
    /// Properties carried on the edge itself (associations only).
    #[serde(default)]
    pub edge_properties: Vec<PropertyDef>,
}

impl RelationDef {
    pub fn association(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::Association,
            target: target.into(),
            many: false,
            required: false,
            edge_properties: Vec::new(),
        }
    }

    /// Compositions are always many-valued.
    pub fn composition(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::Composition,
            target: target.into(),
            many: true,
            required: false,
            edge_properties: Vec::new(),
        }
    }

    pub fn many(mut self) -> Self {
        self.many = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_edge_property(mut self, prop: PropertyDef) -> Self {
        self.edge_properties.push(prop);
        self
    }

    pub fn is_composition(&self) -> bool {
        self.kind == RelationKind::Composition
    }
}

/// Type-level boolean expression that must hold for every instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvariantDef {
    #[serde(default)]
    pub name: Option<String>,
    pub expression: String,
}

/// A declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Part types exist only inside a composition.
    #[serde(default, rename = "part")]
    pub is_part: bool,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    /// Property names forming the primary key, in key order.
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub relations: Vec<RelationDef>,
    #[serde(default)]
    pub invariants: Vec<InvariantDef>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_abstract: false,
            is_part: false,
            properties: Vec::new(),
            primary_key: Vec::new(),
            relations: Vec::new(),
            invariants: Vec::new(),
        }
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn part(mut self) -> Self {
        self.is_part = true;
        self
    }

    pub fn with_property(mut self, prop: PropertyDef) -> Self {
        self.properties.push(prop);
        self
    }

    pub fn with_primary_key(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.primary_key = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_relation(mut self, rel: RelationDef) -> Self {
        self.relations.push(rel);
        self
    }

    pub fn with_invariant(mut self, name: Option<&str>, expression: impl Into<String>) -> Self {
        self.invariants.push(InvariantDef {
            name: name.map(str::to_string),
            expression: expression.into(),
        });
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    pub fn associations(&self) -> impl Iterator<Item = &RelationDef> + '_ {
        self.relations.iter().filter(|r| !r.is_composition())
    }

    pub fn compositions(&self) -> impl Iterator<Item = &RelationDef> + '_ {
        self.relations.iter().filter(|r| r.is_composition())
    }
}
