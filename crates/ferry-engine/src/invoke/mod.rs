//! Overload resolution and invocation
//!
//! The coordinator takes a candidate list, lets [`crate::marshal`] decide
//! which candidates accept the raw arguments, asks the [`Binder`] to rank
//! and pick one, and calls it behind a panic boundary.

mod binder;
mod boundary;
mod coordinator;

pub use binder::{Binder, DefaultBinder};
pub use boundary::call_guarded;
pub use coordinator::{
    candidates_for, resolve_and_invoke, InvokeOptions, InvokeOutcome, InvokeRequest,
};
