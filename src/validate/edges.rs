//! Association stage.
//!
//! A target object carries `_target_<pk>` foreign-key fields, matched
//! case-sensitively whatever the name-matching mode, plus optional edge
//! properties matched like instance properties. Every target is checked in
//! its own diagnostic scope, so one bad target never hides problems in a
//! sibling.

use std::collections::{BTreeMap, HashMap};

use tokio_util::sync::CancellationToken;

use crate::diag::{Code, Collector};
use crate::model::{AnyValue, Key, Properties, Value};
use crate::provenance::{Path, Span};
use crate::schema::{RelationDef, ResolvedType};
use crate::Result;

use super::fields::{corrupted, failure_issue, key_encoding};
use super::instance::{EdgeData, EdgeTarget, RawInstance};
use super::names::{match_names, NameMatch};
use super::{annotate, checkpoint, issue, quoted, Validator};

/// Prefix of foreign-key fields on a target object.
pub const FK_PREFIX: &str = "_target_";

impl Validator {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn validate_edges(
        &self,
        cancel: &CancellationToken,
        ty: ResolvedType<'_>,
        raw: &RawInstance,
        names: &NameMatch<'_>,
        diags: &mut Collector,
        base: &Path,
        span: Option<Span>,
    ) -> Result<BTreeMap<String, EdgeData>> {
        let mut edges = BTreeMap::new();
        for rel in ty.def.associations() {
            checkpoint(cancel)?;
            // Absent associations are left to graph-level consistency checks.
            let Some((json_field, value)) = names.get(&rel.name).and_then(|k| raw.properties.get(k).map(|v| (k, v)))
            else {
                continue;
            };
            let target = ty.resolve(&rel.target).ok_or_else(|| {
                corrupted(format!("relation {:?} of {:?} targets unknown type {:?}", rel.name, ty.def.name, rel.target))
            })?;
            if !target.def.has_primary_key() {
                return Err(corrupted(format!(
                    "relation {:?} of {:?} targets {:?}, which has no primary key",
                    rel.name, ty.def.name, target.def.name
                )));
            }

            let path = base.field(&rel.name);
            let expected = if rel.many { "array" } else { "object" };
            let shape = |at: &Path, expected: &str, got: &str| {
                issue(
                    Code::EdgeShapeMismatch,
                    format!("relation {:?}: expected {expected}, got {got}", rel.name),
                    at,
                    span,
                )
                .detail("relation", &rel.name)
                .detail("json_field", json_field)
                .detail("expected", expected)
                .detail("got", got)
            };

            let mut targets = Vec::new();
            let mut failed = false;
            match (rel.many, value) {
                (_, AnyValue::Null) => {
                    diags.push(shape(&path, expected, "null"));
                    continue;
                }
                (false, AnyValue::Map(obj)) => {
                    match self.validate_target(rel, json_field, target, obj.as_ref(), diags, &path, span)? {
                        Some(t) => targets.push(t),
                        None => failed = true,
                    }
                }
                (true, AnyValue::List(items)) => {
                    for (i, item) in items.as_deref().unwrap_or_default().iter().enumerate() {
                        checkpoint(cancel)?;
                        let item_path = path.index(i);
                        let AnyValue::Map(obj) = item else {
                            diags.push(shape(&item_path, "object", item.kind_name()));
                            failed = true;
                            continue;
                        };
                        match self.validate_target(rel, json_field, target, obj.as_ref(), diags, &item_path, span)? {
                            Some(t) => targets.push(t),
                            None => failed = true,
                        }
                    }
                }
                (_, other) => {
                    diags.push(shape(&path, expected, other.kind_name()));
                    continue;
                }
            }
            if !failed {
                edges.insert(
                    rel.name.clone(),
                    EdgeData { relation: rel.name.clone(), target_type: target.def.name.clone(), targets },
                );
            }
        }
        Ok(edges)
    }

    /// Validate one target object. `None` when it produced errors.
    #[allow(clippy::too_many_arguments)]
    fn validate_target(
        &self,
        rel: &RelationDef,
        json_field: &str,
        target: ResolvedType<'_>,
        obj: Option<&HashMap<String, AnyValue>>,
        diags: &mut Collector,
        path: &Path,
        span: Option<Span>,
    ) -> Result<Option<EdgeTarget>> {
        let empty = HashMap::new();
        let obj = obj.unwrap_or(&empty);
        let mut local = diags.scope();

        let pk = &target.def.primary_key;
        let fk_fields: Vec<String> = pk.iter().map(|p| format!("{FK_PREFIX}{p}")).collect();
        let expected: Vec<&str> = fk_fields.iter().map(String::as_str).collect();
        let present: Vec<&str> = expected.iter().copied().filter(|f| obj.contains_key(*f)).collect();

        let mut components: Vec<Value> = Vec::with_capacity(pk.len());
        if present.is_empty() {
            local.push(
                issue(
                    Code::MissingFkTarget,
                    format!("relation {:?}: missing foreign key field(s) {}", rel.name, quoted(&expected)),
                    path,
                    span,
                )
                .detail("expected", expected.join(", ")),
            );
        } else if present.len() < expected.len() {
            local.push(
                issue(
                    Code::PartialCompositeFk,
                    format!(
                        "relation {:?}: partial composite foreign key, expected [{}], got [{}]",
                        rel.name,
                        quoted(&expected),
                        quoted(&present)
                    ),
                    path,
                    span,
                )
                .detail("expected", expected.join(", "))
                .detail("got", present.join(", ")),
            );
            for field in present.iter().filter(|f| obj[**f].is_null()) {
                let kind = fk_kind(target, pk, &fk_fields, field)?;
                local.push(null_fk(rel, field, kind, &path.field(field), span));
            }
        } else {
            for (pk_name, field) in pk.iter().zip(&expected) {
                let prop = target.def.property(pk_name).ok_or_else(|| {
                    corrupted(format!("primary key of {:?} names undeclared property {pk_name:?}", target.def.name))
                })?;
                let value = &obj[*field];
                let field_path = path.field(field);
                if value.is_null() {
                    local.push(null_fk(rel, field, prop.constraint.kind_name(), &field_path, span));
                    continue;
                }
                match self.check_value(value, &prop.constraint)? {
                    Ok(coerced) => components.push(Value::wrap(coerced)),
                    Err(failure) => local.push(
                        failure_issue(&failure, &format!("relation {:?}: field {field:?}", rel.name), &field_path, span)
                            .detail("field", *field),
                    ),
                }
            }
        }

        // Everything that is not a foreign key is an edge property.
        let declared: Vec<&str> = rel.edge_properties.iter().map(|p| p.name.as_str()).collect();
        let edge_keys = obj.keys().map(String::as_str).filter(|k| !expected.contains(k));
        let names = match_names(&declared, edge_keys, self.config.strict_property_names);
        self.log_normalized(&rel.name, &names.normalized);
        self.report_names(&mut local, path, span, &names, Code::UnknownEdgeField);
        let properties = self.validate_fields(&mut local, path, span, &rel.edge_properties, obj, &names)?;

        let failed = local.has_errors();
        diags.merge(local, |i| annotate(i, &rel.name, json_field));
        if failed || components.len() != pk.len() {
            return Ok(None);
        }
        let key = Key::new(components).map_err(key_encoding)?;
        Ok(Some(EdgeTarget { key, properties: Properties::wrap(properties) }))
    }
}

/// Declared kind of the key property behind a foreign-key field.
fn fk_kind<'s>(target: ResolvedType<'s>, pk: &[String], fk_fields: &[String], field: &str) -> Result<&'s str> {
    pk.iter()
        .zip(fk_fields)
        .find(|(_, f)| f.as_str() == field)
        .and_then(|(name, _)| target.def.property(name))
        .map(|p| p.constraint.kind_name())
        .ok_or_else(|| corrupted(format!("primary key of {:?} names undeclared property", target.def.name)))
}

fn null_fk(rel: &RelationDef, field: &str, kind: &str, path: &Path, span: Option<Span>) -> crate::diag::Issue {
    issue(
        Code::TypeMismatch,
        format!("relation {:?}: field {field:?}: expected {kind}, got null", rel.name),
        path,
        span,
    )
    .detail("field", field)
    .detail("expected", kind)
    .detail("got", "null")
}
