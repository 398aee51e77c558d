//! Pipeline input and output types.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::diag::DiagnosticResult;
use crate::model::{AnyValue, Key, Map, Properties, Slice, Value};
use crate::provenance::Provenance;
use crate::schema::TypeId;
use crate::Error;

/// Untrusted input for one instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInstance {
    pub properties: HashMap<String, AnyValue>,
    pub provenance: Option<Provenance>,
}

impl RawInstance {
    pub fn new(properties: HashMap<String, AnyValue>) -> Self {
        Self { properties, provenance: None }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<AnyValue>,
    {
        Self::new(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Top-level JSON objects become instances; anything else is `None`.
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        match AnyValue::from(json) {
            AnyValue::Map(Some(properties)) => Some(Self::new(properties)),
            _ => None,
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }
}

/// One association target: its foreign key and edge properties.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeTarget {
    pub key: Key,
    pub properties: Properties,
}

/// All targets of one association. Single-valued relations hold one.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeData {
    pub relation: String,
    pub target_type: String,
    pub targets: Vec<EdgeTarget>,
}

impl EdgeData {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> + '_ {
        self.targets.iter().map(|t| &t.key)
    }
}

/// Validated, immutable instance. Shares nothing with the input it came from.
#[derive(Debug, Clone)]
pub struct ValidInstance {
    pub(crate) type_name: String,
    pub(crate) type_id: TypeId,
    pub(crate) primary_key: Key,
    pub(crate) properties: Properties,
    pub(crate) edges: BTreeMap<String, EdgeData>,
    pub(crate) composed: BTreeMap<String, Value>,
    pub(crate) children: BTreeMap<String, Arc<[ValidInstance]>>,
    pub(crate) provenance: Option<Provenance>,
}

impl ValidInstance {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn type_id(&self) -> &TypeId {
        &self.type_id
    }

    /// Empty for types without a primary key.
    pub fn primary_key(&self) -> &Key {
        &self.primary_key
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn edge(&self, relation: &str) -> Option<&EdgeData> {
        self.edges.get(relation)
    }

    /// Edges in relation-name order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &EdgeData)> + '_ {
        self.edges.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// A composition as one value: a sequence of child maps.
    pub fn composed(&self, relation: &str) -> Option<&Value> {
        self.composed.get(relation)
    }

    pub fn compositions(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.composed.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Composed children as instances.
    pub fn children(&self, relation: &str) -> Option<&[ValidInstance]> {
        self.children.get(relation).map(|c| &c[..])
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    /// Properties plus nested compositions as a single map value.
    pub fn to_value(&self) -> Value {
        let props = self.properties.iter().map(|(k, v)| (k.to_string(), v.clone()));
        let composed = self.composed.iter().map(|(k, v)| (k.clone(), v.clone()));
        Value::Map(Map::from_values(props.chain(composed)))
    }

    pub(crate) fn children_value(children: &[ValidInstance]) -> Value {
        Value::Slice(Slice::from_values(children.iter().map(ValidInstance::to_value)))
    }
}

impl fmt::Display for ValidInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} {}", self.type_name, self.primary_key, self.properties)
    }
}

/// Everything wrong with one instance.
#[derive(Debug, Clone)]
pub struct ValidationFailure {
    pub raw: RawInstance,
    pub result: DiagnosticResult,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.result)
    }
}

/// Result of validating one instance. System errors travel separately.
#[derive(Debug, Clone)]
pub enum Outcome {
    Valid(ValidInstance),
    Invalid(ValidationFailure),
}

impl Outcome {
    pub fn valid(self) -> Option<ValidInstance> {
        match self {
            Outcome::Valid(v) => Some(v),
            Outcome::Invalid(_) => None,
        }
    }

    pub fn failure(self) -> Option<ValidationFailure> {
        match self {
            Outcome::Valid(_) => None,
            Outcome::Invalid(f) => Some(f),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Outcome::Valid(_))
    }
}

/// Result of a batch call.
///
/// `None` input gives all-`None`; empty input gives `valid == Some([])`.
/// `failures` stays `None` until the first failure. On a system error the
/// batch stops and `valid`/`failures` hold what was accumulated so far.
#[derive(Debug, Default)]
pub struct Batch {
    pub valid: Option<Vec<ValidInstance>>,
    pub failures: Option<Vec<ValidationFailure>>,
    pub error: Option<Error>,
}

impl Batch {
    pub(crate) fn started() -> Self {
        Self { valid: Some(Vec::new()), failures: None, error: None }
    }

    pub(crate) fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Valid(v) => self.valid.get_or_insert_with(Vec::new).push(v),
            Outcome::Invalid(f) => self.failures.get_or_insert_with(Vec::new).push(f),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.failures.is_none()
    }
}
