//! # Schema Descriptors
//!
//! Read-only description of the types instances are validated against.
//! The validator only ever borrows these; nothing here changes after load.
//!
//! Type names resolve in the schema that mentions them. A qualified name
//! `alias.Name` resolves `Name` inside the schema imported under `alias`.

mod constraint;
mod types;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use constraint::Constraint;
pub use types::{InvariantDef, PropertyDef, RelationDef, RelationKind, TypeDef, TypeId};

/// A named collection of types plus aliased imports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    #[serde(default)]
    pub types: Vec<TypeDef>,
    #[serde(default)]
    pub imports: BTreeMap<String, Schema>,
}

/// A type together with the schema that declares it.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedType<'s> {
    pub def: &'s TypeDef,
    pub schema: &'s Schema,
}

impl<'s> ResolvedType<'s> {
    pub fn id(&self) -> TypeId {
        TypeId { schema: self.schema.name.clone(), name: self.def.name.clone() }
    }

    /// Resolve a type referenced from this type (relation targets).
    pub fn resolve(&self, name: &str) -> Option<ResolvedType<'s>> {
        self.schema.resolve_type(name)
    }
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), types: Vec::new(), imports: BTreeMap::new() }
    }

    pub fn with_type(mut self, def: TypeDef) -> Self {
        self.types.push(def);
        self
    }

    pub fn with_import(mut self, alias: impl Into<String>, schema: Schema) -> Self {
        self.imports.insert(alias.into(), schema);
        self
    }

    /// Look up `Name` locally or `alias.Name` through an import.
    pub fn resolve_type(&self, name: &str) -> Option<ResolvedType<'_>> {
        match name.split_once('.') {
            Some((alias, rest)) => self.imports.get(alias)?.resolve_type(rest),
            None => self
                .types
                .iter()
                .find(|t| t.name == name)
                .map(|def| ResolvedType { def, schema: self }),
        }
    }
}
