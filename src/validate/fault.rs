//! Fault boundary around pluggable collaborators.
//!
//! Checker and evaluator calls go through [`guard`] exactly once each; a
//! panic inside them becomes an [`InternalError`] with a captured trace.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use crate::{InternalError, InternalKind};

pub(crate) fn guard<T>(kind: InternalKind, f: impl FnOnce() -> T) -> Result<T, InternalError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let cause = panic_message(payload.as_ref());
        warn!(%kind, %cause, "recovered panic in validator collaborator");
        InternalError::from_panic(kind, cause)
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
