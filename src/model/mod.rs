//! # Immutable Value Model
//!
//! Read-only views over validated data. Nothing here does I/O or uses
//! interior mutability, so every type is `Send + Sync` and safe to read from
//! any number of threads without locking.
//!
//! Each container offers two constructors:
//!
//! - `wrap(raw)` consumes `raw`; the compiler enforces that the caller cannot
//!   touch it afterwards.
//! - `wrap_clone(&raw)` deep-copies first; the caller keeps `raw` and may
//!   mutate it freely. Opaque host values are shared, never copied.

pub mod any;
pub mod value;
pub mod map;
pub mod slice;
pub mod key;
pub mod properties;

pub use any::{AnyValue, MapKey, Opaque, OpaqueValue};
pub use value::Value;
pub use map::Map;
pub use slice::Slice;
pub use key::{Key, KeyError, encode_components};
pub use properties::{Properties, fold_name};
