//! Default checker for the built-in constraint kinds.

use crate::model::AnyValue;
use crate::schema::Constraint;

use super::{CheckFailure, ConstraintChecker, ValueRegistry};

/// Smallest and largest f64 values that convert to i64 without overflow.
const I64_MIN_F: f64 = -9_223_372_036_854_775_808.0;
const I64_MAX_F: f64 = 9_223_372_036_854_775_808.0;

/// Checker for every [`Constraint`] variant.
///
/// Coercion rules: any integer width (and whole-valued floats) become `i64`,
/// numbers under a float constraint become `f64`, vectors become float arrays,
/// lists coerce element-wise. Everything else is returned as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardChecker;

/// Integer view of a raw number. `Err` carries the reason it is not one.
fn to_i64(value: &AnyValue) -> Option<Result<i64, &'static str>> {
    match value {
        AnyValue::Int(i) => Some(Ok(*i)),
        AnyValue::Uint(u) => Some(i64::try_from(*u).map_err(|_| "out of range for a 64-bit signed integer")),
        AnyValue::Float(f) if f.fract() == 0.0 => {
            if *f >= I64_MIN_F && *f < I64_MAX_F {
                Some(Ok(*f as i64))
            } else {
                Some(Err("out of range for a 64-bit signed integer"))
            }
        }
        _ => None,
    }
}

fn to_f64(value: &AnyValue) -> Option<f64> {
    match value {
        AnyValue::Int(i) => Some(*i as f64),
        AnyValue::Uint(u) => Some(*u as f64),
        AnyValue::Float(f) => Some(*f),
        _ => None,
    }
}

fn check_len(what: &str, len: usize, min: Option<usize>, max: Option<usize>) -> Result<(), CheckFailure> {
    if let Some(min) = min.filter(|m| len < *m) {
        return Err(CheckFailure::constraint(
            format!("{what} length {len} is below minimum {min}"),
            format!("length >= {min}"),
            len.to_string(),
        ));
    }
    if let Some(max) = max.filter(|m| len > *m) {
        return Err(CheckFailure::constraint(
            format!("{what} length {len} exceeds maximum {max}"),
            format!("length <= {max}"),
            len.to_string(),
        ));
    }
    Ok(())
}

impl ConstraintChecker for StandardChecker {
    fn check(
        &self,
        value: &AnyValue,
        constraint: &Constraint,
        registry: Option<&dyn ValueRegistry>,
    ) -> Result<(), CheckFailure> {
        if value.is_null() {
            return Err(CheckFailure::type_mismatch(constraint.kind_name(), "null"));
        }
        let mismatch = || CheckFailure::type_mismatch(constraint.kind_name(), value.kind_name());

        match constraint {
            Constraint::Any => Ok(()),
            Constraint::Bool => match value {
                AnyValue::Bool(_) => Ok(()),
                _ => Err(mismatch()),
            },
            Constraint::Integer { min, max } => {
                let i = match to_i64(value) {
                    Some(Ok(i)) => i,
                    Some(Err(reason)) => {
                        return Err(CheckFailure::constraint(
                            format!("value {reason}"),
                            "integer",
                            format!("{value:?}"),
                        ));
                    }
                    None => return Err(mismatch()),
                };
                if let Some(min) = min.filter(|m| i < *m) {
                    return Err(CheckFailure::constraint(
                        format!("value {i} is below minimum {min}"),
                        format!(">= {min}"),
                        i.to_string(),
                    ));
                }
                if let Some(max) = max.filter(|m| i > *m) {
                    return Err(CheckFailure::constraint(
                        format!("value {i} exceeds maximum {max}"),
                        format!("<= {max}"),
                        i.to_string(),
                    ));
                }
                Ok(())
            }
            Constraint::Float { min, max } => {
                let f = to_f64(value).ok_or_else(mismatch)?;
                if !f.is_finite() {
                    return Err(CheckFailure::constraint("value must be finite", "finite float", f.to_string()));
                }
                if let Some(min) = min.filter(|m| f < *m) {
                    return Err(CheckFailure::constraint(
                        format!("value {f} is below minimum {min}"),
                        format!(">= {min}"),
                        f.to_string(),
                    ));
                }
                if let Some(max) = max.filter(|m| f > *m) {
                    return Err(CheckFailure::constraint(
                        format!("value {f} exceeds maximum {max}"),
                        format!("<= {max}"),
                        f.to_string(),
                    ));
                }
                Ok(())
            }
            Constraint::String { min_len, max_len } => match value {
                AnyValue::String(s) => check_len("string", s.chars().count(), *min_len, *max_len),
                _ => Err(mismatch()),
            },
            Constraint::Enum { values } => match value {
                AnyValue::String(s) if values.iter().any(|v| v == s) => Ok(()),
                AnyValue::String(s) => Err(CheckFailure::constraint(
                    format!("value {s:?} is not one of [{}]", values.join(", ")),
                    values.join("|"),
                    s.clone(),
                )),
                _ => Err(mismatch()),
            },
            Constraint::List { element, min_items, max_items } => {
                let items = match value {
                    AnyValue::List(items) => items.as_deref().unwrap_or_default(),
                    _ => return Err(mismatch()),
                };
                check_len("array", items.len(), *min_items, *max_items)?;
                for (i, item) in items.iter().enumerate() {
                    self.check(item, element, registry).map_err(|mut f| {
                        f.message = format!("element {i}: {}", f.message);
                        f
                    })?;
                }
                Ok(())
            }
            Constraint::Vector { dims } => {
                let items = match value {
                    AnyValue::List(items) => items.as_deref().unwrap_or_default(),
                    _ => return Err(mismatch()),
                };
                if let Some((i, item)) = items.iter().enumerate().find(|(_, v)| to_f64(v).is_none()) {
                    let mut f = CheckFailure::type_mismatch("number", item.kind_name());
                    f.message = format!("element {i}: {}", f.message);
                    return Err(f);
                }
                if let Some(dims) = dims.filter(|d| *d != items.len()) {
                    return Err(CheckFailure::constraint(
                        format!("vector has {} dimensions, expected {dims}", items.len()),
                        dims.to_string(),
                        items.len().to_string(),
                    ));
                }
                Ok(())
            }
            Constraint::Map => match value {
                AnyValue::Map(_) => Ok(()),
                _ => Err(mismatch()),
            },
            Constraint::Custom { name } => match registry.and_then(|r| r.check(name, value)) {
                Some(Ok(())) => Ok(()),
                Some(Err(message)) => Err(CheckFailure::constraint(message, name.clone(), value.kind_name())),
                None => Err(CheckFailure::type_mismatch(
                    format!("registered type {name}"),
                    value.kind_name(),
                )),
            },
        }
    }

    fn coerce(&self, value: &AnyValue, constraint: &Constraint) -> Result<AnyValue, String> {
        match constraint {
            Constraint::Integer { .. } => match to_i64(value) {
                Some(Ok(i)) => Ok(AnyValue::Int(i)),
                _ => Err(format!("cannot coerce {} to integer", value.kind_name())),
            },
            Constraint::Float { .. } => to_f64(value)
                .map(AnyValue::Float)
                .ok_or_else(|| format!("cannot coerce {} to float", value.kind_name())),
            Constraint::List { element, .. } => match value {
                AnyValue::List(Some(items)) => items
                    .iter()
                    .map(|v| self.coerce(v, element))
                    .collect::<Result<Vec<_>, _>>()
                    .map(|v| AnyValue::List(Some(v))),
                AnyValue::List(None) => Ok(AnyValue::List(None)),
                _ => Err(format!("cannot coerce {} to array", value.kind_name())),
            },
            Constraint::Vector { .. } => match value {
                AnyValue::List(items) => items
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(|v| to_f64(v).map(AnyValue::Float))
                    .collect::<Option<Vec<_>>>()
                    .map(|v| AnyValue::List(Some(v)))
                    .ok_or_else(|| "vector contains a non-numeric element".to_string()),
                _ => Err(format!("cannot coerce {} to vector", value.kind_name())),
            },
            _ => Ok(value.clone()),
        }
    }
}
