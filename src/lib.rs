//! # schemagate: Schema-Driven Instance Validation
//!
//! The boundary between arbitrary JSON-like input and trusted, typed graph
//! data. Raw property maps go in; immutable, canonically-keyed instances (or
//! a complete list of everything wrong with them) come out.
//!
//! ## Design Principles
//!
//! 1. **Closed input union**: foreign data enters as `AnyValue`; nothing else
//!    is ever inspected
//! 2. **Immutable output**: `ValidInstance` is deep-copied from validated data
//!    and shares nothing with the caller's input
//! 3. **Two error classes**: bad data is a `ValidationFailure` full of
//!    diagnostics; a broken validator is an `Error`
//! 4. **Collaborators behind traits**: constraint checking and invariant
//!    evaluation are pluggable
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use schemagate::{
//!     AnyValue, CancellationToken, Config, Constraint, Outcome, PropertyDef,
//!     RawInstance, Schema, TypeDef, Validator,
//! };
//!
//! let schema = Schema::new("app").with_type(
//!     TypeDef::new("Person")
//!         .with_property(PropertyDef::required("id", Constraint::integer()))
//!         .with_property(PropertyDef::required("name", Constraint::string()))
//!         .with_primary_key(["id"]),
//! );
//! let validator = Validator::new(Arc::new(schema), Config::default());
//!
//! let raw = RawInstance::from_pairs([("id", AnyValue::from(1)), ("name", AnyValue::from("Ada"))]);
//! match validator.validate_one(&CancellationToken::new(), "Person", &raw)? {
//!     Outcome::Valid(person) => assert_eq!(person.primary_key().to_string(), "[1]"),
//!     Outcome::Invalid(failure) => panic!("{}", failure.result),
//! }
//! # Ok::<(), schemagate::Error>(())
//! ```

use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod schema;
pub mod constraint;
pub mod expr;
pub mod provenance;
pub mod diag;
pub mod validate;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{AnyValue, Key, KeyError, Map, MapKey, Opaque, OpaqueValue, Properties, Slice, Value};

// ============================================================================
// Re-exports: Schema and collaborators
// ============================================================================

pub use schema::{
    Constraint, InvariantDef, PropertyDef, RelationDef, RelationKind, Schema, TypeDef, TypeId,
};
pub use constraint::{CheckFailure, ConstraintChecker, FailureKind, StandardChecker, ValueRegistry};
pub use expr::{InvariantEvaluator, Scope};
pub use provenance::{Path, Provenance, Span};

// ============================================================================
// Re-exports: Diagnostics and validation
// ============================================================================

pub use diag::{Code, Collector, DiagnosticResult, Issue, Severity};
pub use validate::{
    Batch, Config, EdgeData, EdgeTarget, Outcome, RawInstance, ValidInstance, ValidationFailure,
    Validator,
};
pub use tokio_util::sync::CancellationToken;

// ============================================================================
// Error Types
// ============================================================================

/// What broke inside the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalKind {
    /// The schema contradicts itself (dangling PK property, unresolvable
    /// association target, target without a primary key).
    CorruptedSchema,
    /// The invariant evaluator panicked.
    InvariantPanic,
    /// The constraint checker panicked.
    ConstraintPanic,
    /// The checker accepted a value its coercion then refused.
    CoercionMismatch,
    /// Validated key components have no canonical encoding.
    KeyEncoding,
}

impl fmt::Display for InternalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InternalKind::CorruptedSchema => "corrupted schema",
            InternalKind::InvariantPanic => "invariant panic",
            InternalKind::ConstraintPanic => "constraint panic",
            InternalKind::CoercionMismatch => "coercion mismatch",
            InternalKind::KeyEncoding => "key encoding",
        };
        f.write_str(s)
    }
}

/// The validator itself failed. Never carries diagnostics about the data.
#[derive(Debug, Clone)]
pub struct InternalError {
    pub kind: InternalKind,
    pub cause: Option<String>,
    /// Captured for panic-derived kinds only.
    pub trace: Option<Arc<Backtrace>>,
}

impl InternalError {
    pub fn new(kind: InternalKind, cause: impl Into<String>) -> Self {
        Self { kind, cause: Some(cause.into()), trace: None }
    }

    pub(crate) fn from_panic(kind: InternalKind, cause: String) -> Self {
        Self { kind, cause: Some(cause), trace: Some(Arc::new(Backtrace::force_capture())) }
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "internal validator failure ({})", self.kind)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for InternalError {}

/// System errors. Invalid data is never reported through this type.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("validation cancelled")]
    Cancelled,

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl Error {
    /// True for every internal failure, whatever its kind.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    pub fn internal_kind(&self) -> Option<InternalKind> {
        match self {
            Error::Internal(e) => Some(e.kind),
            Error::Cancelled => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
