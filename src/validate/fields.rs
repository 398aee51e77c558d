//! Property, invariant and primary-key stages.
//!
//! `validate_fields` and `report_names` serve both instance properties and
//! edge properties; only the unknown-field code differs.

use std::collections::HashMap;

use crate::constraint::{CheckFailure, FailureKind};
use crate::diag::{Code, Collector, Issue};
use crate::expr::Scope;
use crate::model::{AnyValue, Key, Properties};
use crate::provenance::{Path, Span};
use crate::schema::{Constraint, PropertyDef, TypeDef};
use crate::{InternalError, InternalKind, Result};

use super::fault::guard;
use super::names::NameMatch;
use super::{issue, quoted, Validator};

impl Validator {
    /// Collisions always; unknown keys unless the config allows them.
    pub(super) fn report_names(
        &self,
        diags: &mut Collector,
        base: &Path,
        span: Option<Span>,
        names: &NameMatch<'_>,
        unknown: Code,
    ) {
        for c in &names.collisions {
            diags.push(
                issue(
                    Code::CaseFoldCollision,
                    format!("fields {} all match {:?} case-insensitively", quoted(&c.keys), c.declared),
                    &base.field(c.declared),
                    span,
                )
                .detail("declared", c.declared)
                .detail("fields", c.keys.join(", ")),
            );
        }
        if self.config.allow_unknown_fields {
            return;
        }
        let what = if unknown == Code::UnknownEdgeField { "unknown edge field" } else { "unknown field" };
        for key in &names.unclaimed {
            diags.push(
                issue(unknown, format!("{what} {key:?}"), &base.field(key), span).detail("json_field", *key),
            );
        }
    }

    /// Check and coerce every declared property present in `input`.
    /// Returns the coerced values keyed by declared name.
    pub(super) fn validate_fields(
        &self,
        diags: &mut Collector,
        base: &Path,
        span: Option<Span>,
        defs: &[PropertyDef],
        input: &HashMap<String, AnyValue>,
        names: &NameMatch<'_>,
    ) -> Result<HashMap<String, AnyValue>> {
        let mut out = HashMap::with_capacity(defs.len());
        for def in defs {
            let path = base.field(&def.name);
            let Some(value) = names.get(&def.name).and_then(|k| input.get(k).map(|v| (k, v))) else {
                if def.required {
                    diags.push(
                        issue(Code::MissingRequired, format!("missing required property {:?}", def.name), &path, span)
                            .detail("property", &def.name),
                    );
                }
                continue;
            };
            let (json_field, value) = value;
            match self.check_value(value, &def.constraint)? {
                Ok(coerced) => {
                    out.insert(def.name.clone(), coerced);
                }
                Err(failure) => diags.push(
                    failure_issue(&failure, &format!("property {:?}", def.name), &path, span)
                        .detail("property", &def.name)
                        .detail("json_field", json_field),
                ),
            }
        }
        Ok(out)
    }

    /// Check then coerce one value. The outer error is a system error; the
    /// inner one is a rejected value.
    pub(super) fn check_value(
        &self,
        value: &AnyValue,
        constraint: &Constraint,
    ) -> Result<std::result::Result<AnyValue, CheckFailure>> {
        let checker = &*self.checker;
        let registry = self.config.value_registry.as_deref();
        let verdict = guard(InternalKind::ConstraintPanic, || -> std::result::Result<_, CheckFailure> {
            checker.check(value, constraint, registry)?;
            Ok(checker.coerce(value, constraint))
        })?;
        match verdict {
            Err(failure) => Ok(Err(failure)),
            Ok(Ok(coerced)) => Ok(Ok(coerced)),
            Ok(Err(reason)) => Err(InternalError::new(
                InternalKind::CoercionMismatch,
                format!(
                    "{} value accepted as {} but not coercible: {reason}",
                    value.kind_name(),
                    constraint.kind_name()
                ),
            )
            .into()),
        }
    }

    /// Every invariant is evaluated; each false or failing one is reported.
    pub(super) fn evaluate_invariants(
        &self,
        def: &TypeDef,
        properties: &Properties,
        diags: &mut Collector,
        base: &Path,
        span: Option<Span>,
    ) -> Result<()> {
        if def.invariants.is_empty() {
            return Ok(());
        }
        let scope = Scope::new(properties.clone());
        for inv in &def.invariants {
            let label = inv.name.as_deref().unwrap_or("invariant failed");
            let Some(evaluator) = &self.evaluator else {
                diags.push(
                    issue(Code::EvalError, format!("{label}: no invariant evaluator configured"), base, span)
                        .detail("expression", &inv.expression),
                );
                continue;
            };
            match guard(InternalKind::InvariantPanic, || evaluator.evaluate(&inv.expression, &scope))? {
                Ok(true) => {}
                Ok(false) => {
                    let mut failed = issue(Code::InvariantFail, label, base, span).detail("expression", &inv.expression);
                    if let Some(name) = &inv.name {
                        failed = failed.detail("invariant", name);
                    }
                    diags.push(failed);
                }
                Err(e) => diags.push(
                    issue(Code::EvalError, format!("{label}: {e}"), base, span).detail("expression", &inv.expression),
                ),
            }
        }
        Ok(())
    }

    /// `None` when a key property is missing from the validated values.
    /// Types without a primary key get the empty key.
    pub(super) fn extract_key(
        &self,
        def: &TypeDef,
        properties: &Properties,
        diags: &mut Collector,
        base: &Path,
        span: Option<Span>,
    ) -> Result<Option<Key>> {
        let mut components = Vec::with_capacity(def.primary_key.len());
        for name in &def.primary_key {
            if def.property(name).is_none() {
                return Err(corrupted(format!(
                    "primary key of {:?} names undeclared property {name:?}",
                    def.name
                )));
            }
            match properties.get(name) {
                Some(v) => components.push(v.clone()),
                None => diags.push(
                    issue(Code::MissingPrimaryKey, format!("missing primary key property {name:?}"), &base.field(name), span)
                        .detail("property", name),
                ),
            }
        }
        if components.len() < def.primary_key.len() {
            return Ok(None);
        }
        Key::new(components).map(Some).map_err(key_encoding)
    }
}

pub(super) fn failure_issue(failure: &CheckFailure, subject: &str, path: &Path, span: Option<Span>) -> Issue {
    let code = match failure.kind {
        FailureKind::Type => Code::TypeMismatch,
        FailureKind::Constraint => Code::ConstraintFail,
    };
    issue(code, format!("{subject}: {}", failure.message), path, span)
        .detail("expected", &failure.expected)
        .detail("got", &failure.got)
}

pub(super) fn corrupted(cause: String) -> crate::Error {
    InternalError::new(InternalKind::CorruptedSchema, cause).into()
}

pub(super) fn key_encoding(e: crate::model::KeyError) -> crate::Error {
    InternalError::new(InternalKind::KeyEncoding, e.to_string()).into()
}
