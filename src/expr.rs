//! Invariant evaluation contract.
//!
//! The expression language itself lives outside this crate; the validator
//! only hands an [`InvariantEvaluator`] the expression text and a [`Scope`].

use crate::model::{Properties, Value};

/// Name under which the whole instance is bound in a scope.
pub const SELF_BINDING: &str = "self";

/// Variables visible to an invariant: every validated property by name,
/// plus `self` bound to all properties as one map.
#[derive(Debug, Clone)]
pub struct Scope {
    properties: Properties,
    this: Value,
}

impl Scope {
    pub fn new(properties: Properties) -> Self {
        let this = properties.to_value();
        Self { properties, this }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        if name == SELF_BINDING {
            Some(&self.this)
        } else {
            self.properties.get(name)
        }
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}

/// Evaluates a boolean invariant expression.
///
/// `Err` means the expression could not be evaluated (unknown variable,
/// type error, ...); `Ok(false)` means it evaluated and does not hold.
pub trait InvariantEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, scope: &Scope) -> Result<bool, String>;
}

impl<F> InvariantEvaluator for F
where
    F: Fn(&str, &Scope) -> Result<bool, String> + Send + Sync,
{
    fn evaluate(&self, expression: &str, scope: &Scope) -> Result<bool, String> {
        self(expression, scope)
    }
}
