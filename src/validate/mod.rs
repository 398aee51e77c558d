//! # Validation Pipeline
//!
//! One pass per instance, in stage order:
//!
//! | Stage | Short-circuits | Codes |
//! |-------|----------------|-------|
//! | resolve type | yes | `TypeNotFound` |
//! | eligibility | yes | `AbstractType`, `PartTypeDirect` |
//! | name resolution | no | `CaseFoldCollision`, `UnknownField` |
//! | properties | no | `MissingRequired`, `TypeMismatch`, `ConstraintFail` |
//! | invariants (only if clean so far) | no | `InvariantFail`, `EvalError` |
//! | primary key | no | `MissingPrimaryKey` |
//! | associations | no | `EdgeShapeMismatch`, `MissingFKTarget`, `PartialCompositeFK`, ... |
//! | compositions (recursive) | no | `UnresolvedRequiredComposition`, `DuplicateComposedPK`, ... |
//!
//! Cancellation is polled between stages and inside every per-element loop.
//! The validator holds no mutable state; concurrent calls share nothing.

mod compose;
mod config;
mod edges;
mod fault;
mod fields;
mod instance;
mod names;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::constraint::{ConstraintChecker, StandardChecker};
use crate::diag::{Code, Collector, Issue};
use crate::expr::InvariantEvaluator;
use crate::model::Properties;
use crate::provenance::{Path, Span};
use crate::schema::{ResolvedType, Schema};
use crate::{Error, Result};

pub use config::Config;
pub use instance::{Batch, EdgeData, EdgeTarget, Outcome, RawInstance, ValidInstance, ValidationFailure};

use names::match_names;

/// Result of one pipeline pass before it is tied back to its input.
pub(crate) enum Checked {
    Valid(ValidInstance),
    Invalid(Collector),
}

/// Validates raw instances against a schema.
///
/// Immutable after construction and safe to share across threads.
pub struct Validator {
    schema: Arc<Schema>,
    config: Config,
    checker: Arc<dyn ConstraintChecker>,
    evaluator: Option<Arc<dyn InvariantEvaluator>>,
}

impl Validator {
    /// A validator using [`StandardChecker`] and no invariant evaluator.
    pub fn new(schema: Arc<Schema>, config: Config) -> Self {
        Self { schema, config, checker: Arc::new(StandardChecker), evaluator: None }
    }

    pub fn with_checker(mut self, checker: Arc<dyn ConstraintChecker>) -> Self {
        self.checker = checker;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn InvariantEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Validate a batch of instances of one type.
    pub fn validate(&self, cancel: &CancellationToken, type_name: &str, raws: Option<&[RawInstance]>) -> Batch {
        let Some(raws) = raws else {
            return Batch::default();
        };
        let mut batch = Batch::started();
        for raw in raws {
            match self.validate_one(cancel, type_name, raw) {
                Ok(outcome) => batch.record(outcome),
                Err(e) => {
                    batch.error = Some(e);
                    break;
                }
            }
        }
        batch
    }

    /// Validate one instance.
    pub fn validate_one(&self, cancel: &CancellationToken, type_name: &str, raw: &RawInstance) -> Result<Outcome> {
        checkpoint(cancel)?;
        match self.schema.resolve_type(type_name) {
            Some(ty) => self.run(cancel, ty, raw, false).map(|c| self.outcome(raw, c)),
            None => {
                let (path, span) = location(raw);
                let mut diags = self.collector();
                diags.push(
                    issue(Code::TypeNotFound, format!("type {type_name:?} not found"), &path, span)
                        .detail("type", type_name),
                );
                Ok(self.outcome(raw, Checked::Invalid(diags)))
            }
        }
    }

    /// Validate children of `parent_type.relation` outside a parent instance.
    /// Part types are accepted here.
    pub fn validate_for_composition(
        &self,
        cancel: &CancellationToken,
        parent_type: &str,
        relation: &str,
        raws: Option<&[RawInstance]>,
    ) -> Batch {
        let Some(raws) = raws else {
            return Batch::default();
        };
        let target = self.composition_target(parent_type, relation);
        let mut batch = Batch::started();
        for raw in raws {
            let outcome = match &target {
                Ok(child) => checkpoint(cancel)
                    .and_then(|()| self.run(cancel, *child, raw, true))
                    .map(|c| self.outcome(raw, c)),
                Err(unresolved) => checkpoint(cancel).map(|()| {
                    let mut diags = self.collector();
                    diags.push(unresolved.clone());
                    self.outcome(raw, Checked::Invalid(diags))
                }),
            };
            match outcome {
                Ok(outcome) => batch.record(outcome),
                Err(e) => {
                    batch.error = Some(e);
                    break;
                }
            }
        }
        batch
    }

    fn composition_target(&self, parent_type: &str, relation: &str) -> std::result::Result<ResolvedType<'_>, Issue> {
        let parent = self.schema.resolve_type(parent_type).ok_or_else(|| {
            Issue::error(Code::TypeNotFound, format!("type {parent_type:?} not found")).detail("type", parent_type)
        })?;
        parent
            .def
            .relation(relation)
            .filter(|r| r.is_composition())
            .and_then(|r| parent.resolve(&r.target))
            .ok_or_else(|| {
                Issue::error(
                    Code::CompositionNotFound,
                    format!("type {parent_type:?} has no resolvable composition {relation:?}"),
                )
                .detail("relation", relation)
            })
    }

    fn outcome(&self, raw: &RawInstance, checked: Checked) -> Outcome {
        match checked {
            Checked::Valid(v) => Outcome::Valid(v),
            Checked::Invalid(diags) => Outcome::Invalid(ValidationFailure { raw: raw.clone(), result: diags.finish() }),
        }
    }

    // ========================================================================
    // The pass
    // ========================================================================

    /// Run every stage after type resolution. `in_composition` relaxes the
    /// part-type rule for this instance only.
    pub(crate) fn run(
        &self,
        cancel: &CancellationToken,
        ty: ResolvedType<'_>,
        raw: &RawInstance,
        in_composition: bool,
    ) -> Result<Checked> {
        let def = ty.def;
        let (base, span) = location(raw);
        let mut diags = self.collector();
        trace!(type_name = %def.name, path = %base, "validating instance");

        // Eligibility
        if def.is_abstract {
            diags.push(
                issue(Code::AbstractType, format!("type {:?} is abstract and cannot be instantiated", def.name), &base, span)
                    .detail("type", &def.name),
            );
            return Ok(Checked::Invalid(diags));
        }
        if def.is_part && !in_composition {
            diags.push(
                issue(
                    Code::PartTypeDirect,
                    format!("part type {:?} can only be instantiated through a composition", def.name),
                    &base,
                    span,
                )
                .detail("type", &def.name),
            );
            return Ok(Checked::Invalid(diags));
        }
        checkpoint(cancel)?;

        // Name resolution over properties and relations together
        let declared: Vec<&str> = def
            .properties
            .iter()
            .map(|p| p.name.as_str())
            .chain(def.relations.iter().map(|r| r.name.as_str()))
            .collect();
        let names = match_names(&declared, raw.properties.keys().map(String::as_str), self.config.strict_property_names);
        self.log_normalized(&def.name, &names.normalized);
        self.report_names(&mut diags, &base, span, &names, Code::UnknownField);
        checkpoint(cancel)?;

        // Properties
        let validated = self.validate_fields(&mut diags, &base, span, &def.properties, &raw.properties, &names)?;
        let properties = Properties::wrap(validated);
        checkpoint(cancel)?;

        // Invariants
        if !diags.has_errors() {
            self.evaluate_invariants(def, &properties, &mut diags, &base, span)?;
        }
        checkpoint(cancel)?;

        // Primary key
        let primary_key = self.extract_key(def, &properties, &mut diags, &base, span)?;
        checkpoint(cancel)?;

        // Associations and compositions
        let edges = self.validate_edges(cancel, ty, raw, &names, &mut diags, &base, span)?;
        checkpoint(cancel)?;
        let (composed, children) = self.validate_compositions(cancel, ty, raw, &names, &mut diags, &base, span)?;
        checkpoint(cancel)?;

        match primary_key {
            Some(primary_key) if !diags.has_errors() => Ok(Checked::Valid(ValidInstance {
                type_name: def.name.clone(),
                type_id: ty.id(),
                primary_key,
                properties,
                edges,
                composed,
                children,
                provenance: raw.provenance.clone(),
            })),
            _ => Ok(Checked::Invalid(diags)),
        }
    }

    fn collector(&self) -> Collector {
        Collector::new(self.config.max_issues())
    }

    fn log_normalized(&self, owner: &str, normalized: &[(&str, &str)]) {
        if normalized.is_empty() {
            return;
        }
        let emit = || {
            for (input, declared) in normalized {
                debug!(owner, input = *input, declared = *declared, "name normalized");
            }
        };
        match &self.config.logger {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, emit),
            None => emit(),
        }
    }
}

// ============================================================================
// Helpers shared by the stages
// ============================================================================

pub(crate) fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

fn location(raw: &RawInstance) -> (Path, Option<Span>) {
    match &raw.provenance {
        Some(p) => (p.path.clone(), p.span),
        None => (Path::root(), None),
    }
}

fn issue(code: Code, message: impl Into<String>, path: &Path, span: Option<Span>) -> Issue {
    Issue::error(code, message).at(path).with_span(span)
}

/// Add the owning relation to an issue raised below it. Innermost relation
/// wins when compositions nest.
fn annotate(mut issue: Issue, relation: &str, json_field: &str) -> Issue {
    if issue.detail_value("relation").is_none() {
        issue = issue.detail("relation", relation);
    }
    if issue.detail_value("relation_field").is_none() {
        issue = issue.detail("relation_field", json_field);
    }
    issue
}

fn quoted(names: &[&str]) -> String {
    names.iter().map(|n| format!("{n:?}")).collect::<Vec<_>>().join(", ")
}
