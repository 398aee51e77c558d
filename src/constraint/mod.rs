//! # Constraint Checking and Coercion
//!
//! The validator asks a [`ConstraintChecker`] two questions per value:
//! does it satisfy the constraint (`check`), and what is its canonical form
//! (`coerce`). A checker must never refuse to coerce a value it accepted;
//! the validator reports that disagreement as an internal error.

mod standard;

use crate::model::AnyValue;
use crate::schema::Constraint;

pub use standard::StandardChecker;

/// Whether a value has the wrong shape or the right shape but a bad value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Wrong kind of value ("expected integer, got string").
    Type,
    /// Right kind, out of bounds or not allowed.
    Constraint,
}

/// A rejected value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct CheckFailure {
    pub kind: FailureKind,
    pub message: String,
    pub expected: String,
    pub got: String,
}

impl CheckFailure {
    pub fn type_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        let expected = expected.into();
        let got = got.into();
        Self {
            kind: FailureKind::Type,
            message: format!("expected {expected}, got {got}"),
            expected,
            got,
        }
    }

    pub fn constraint(message: impl Into<String>, expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Constraint,
            message: message.into(),
            expected: expected.into(),
            got: got.into(),
        }
    }
}

/// Extension point for custom scalar types (`Constraint::Custom`).
pub trait ValueRegistry: Send + Sync {
    /// `None` when `type_name` is not registered; otherwise the verdict.
    fn check(&self, type_name: &str, value: &AnyValue) -> Option<Result<(), String>>;
}

/// Checks raw values against constraints and produces canonical forms.
pub trait ConstraintChecker: Send + Sync {
    fn check(
        &self,
        value: &AnyValue,
        constraint: &Constraint,
        registry: Option<&dyn ValueRegistry>,
    ) -> Result<(), CheckFailure>;

    /// Canonical form of a value `check` accepted.
    fn coerce(&self, value: &AnyValue, constraint: &Constraint) -> Result<AnyValue, String>;
}
