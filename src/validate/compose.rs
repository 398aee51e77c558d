//! Composition stage: owned children validated recursively.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::diag::{Code, Collector, Issue};
use crate::model::{AnyValue, Slice, Value};
use crate::provenance::{Path, Provenance, Span};
use crate::schema::{RelationDef, ResolvedType};
use crate::Result;

use super::instance::{RawInstance, ValidInstance};
use super::names::NameMatch;
use super::{annotate, checkpoint, issue, Checked, Validator};

type Composed = (BTreeMap<String, Value>, BTreeMap<String, Arc<[ValidInstance]>>);

impl Validator {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn validate_compositions(
        &self,
        cancel: &CancellationToken,
        ty: ResolvedType<'_>,
        raw: &RawInstance,
        names: &NameMatch<'_>,
        diags: &mut Collector,
        base: &Path,
        span: Option<Span>,
    ) -> Result<Composed> {
        let mut composed = BTreeMap::new();
        let mut children = BTreeMap::new();

        for rel in ty.def.compositions() {
            checkpoint(cancel)?;
            let path = base.field(&rel.name);
            let Some((json_field, value)) = names.get(&rel.name).and_then(|k| raw.properties.get(k).map(|v| (k, v)))
            else {
                if rel.required {
                    diags.push(unresolved(rel, "absent", &path, span));
                }
                continue;
            };

            let Some(child_ty) = ty.resolve(&rel.target) else {
                diags.push(
                    issue(
                        Code::CompositionNotFound,
                        format!("composition {:?}: target type {:?} not found", rel.name, rel.target),
                        &path,
                        span,
                    )
                    .detail("relation", &rel.name)
                    .detail("json_field", json_field)
                    .detail("type", &rel.target),
                );
                continue;
            };

            let items = match value {
                AnyValue::List(items) => items.as_deref().unwrap_or_default(),
                other => {
                    diags.push(
                        issue(
                            Code::EdgeShapeMismatch,
                            format!("composition {:?}: expected array, got {}", rel.name, other.kind_name()),
                            &path,
                            span,
                        )
                        .detail("relation", &rel.name)
                        .detail("json_field", json_field)
                        .detail("expected", "array")
                        .detail("got", other.kind_name()),
                    );
                    continue;
                }
            };
            if items.is_empty() {
                if rel.required {
                    diags.push(unresolved(rel, "empty", &path, span).detail("json_field", json_field));
                } else {
                    composed.insert(rel.name.clone(), Value::Slice(Slice::from_values(Vec::new())));
                    children.insert(rel.name.clone(), Arc::from(Vec::new()));
                }
                continue;
            }

            let source = raw.provenance.as_ref().and_then(|p| p.source.clone());
            let mut valid: Vec<(usize, ValidInstance)> = Vec::with_capacity(items.len());
            let mut failed = false;
            for (i, item) in items.iter().enumerate() {
                checkpoint(cancel)?;
                let item_path = path.index(i);
                let AnyValue::Map(obj) = item else {
                    diags.push(
                        issue(
                            Code::EdgeShapeMismatch,
                            format!("composition {:?}[{i}]: expected object, got {}", rel.name, item.kind_name()),
                            &item_path,
                            span,
                        )
                        .detail("relation", &rel.name)
                        .detail("json_field", json_field)
                        .detail("expected", "object")
                        .detail("got", item.kind_name()),
                    );
                    failed = true;
                    continue;
                };
                let child = RawInstance {
                    properties: obj.clone().unwrap_or_default(),
                    provenance: Some(Provenance { source: source.clone(), path: item_path, span }),
                };
                match self.run(cancel, child_ty, &child, true)? {
                    Checked::Valid(instance) => valid.push((i, instance)),
                    Checked::Invalid(child_diags) => {
                        failed = true;
                        diags.merge(child_diags, |i| annotate(i, &rel.name, json_field));
                    }
                }
            }

            if child_ty.def.has_primary_key() {
                if let Some(dup) = first_duplicate(&valid) {
                    diags.push(duplicate_issue(rel, json_field, child_ty, &valid, dup, &path, span));
                    failed = true;
                }
            }
            if failed {
                continue;
            }
            let valid: Vec<ValidInstance> = valid.into_iter().map(|(_, c)| c).collect();
            composed.insert(rel.name.clone(), ValidInstance::children_value(&valid));
            children.insert(rel.name.clone(), Arc::from(valid));
        }
        Ok((composed, children))
    }
}

/// Positions `(first, duplicate)` in `valid` of the first repeated key.
fn first_duplicate(valid: &[(usize, ValidInstance)]) -> Option<(usize, usize)> {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(valid.len());
    for (pos, (_, child)) in valid.iter().enumerate() {
        if let Some(&first) = seen.get(child.primary_key().as_str()) {
            return Some((first, pos));
        }
        seen.insert(child.primary_key().as_str(), pos);
    }
    None
}

fn duplicate_issue(
    rel: &RelationDef,
    json_field: &str,
    child_ty: ResolvedType<'_>,
    valid: &[(usize, ValidInstance)],
    (first, dup): (usize, usize),
    path: &Path,
    span: Option<Span>,
) -> Issue {
    let (first_index, _) = &valid[first];
    let (dup_index, child) = &valid[dup];
    let key = child.primary_key();
    let at = path.key(child_ty.def.primary_key.iter().map(String::as_str).zip(key.iter()));
    issue(
        Code::DuplicateComposedPk,
        format!(
            "composition {:?}: duplicate primary key {key} at index {dup_index} (first at index {first_index})",
            rel.name
        ),
        &at,
        span,
    )
    .detail("relation", &rel.name)
    .detail("json_field", json_field)
    .detail("key", key.as_str())
    .detail("index", dup_index.to_string())
    .detail("first_index", first_index.to_string())
}

fn unresolved(rel: &RelationDef, reason: &str, path: &Path, span: Option<Span>) -> Issue {
    issue(
        Code::UnresolvedRequiredComposition,
        format!("required composition {:?} is {reason}", rel.name),
        path,
        span,
    )
    .detail("relation", &rel.name)
    .detail("reason", reason)
}
