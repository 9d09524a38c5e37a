//! Type and member introspection
//!
//! Host types live in a [`TypeRegistry`]; [`gather`] turns a type plus a
//! member-kind filter and a binding filter into the flat candidate list
//! consumed by marshaling and invocation.

mod candidates;
mod registry;

pub use candidates::{gather, AccessorRole, MemberCandidate};
pub use registry::{array_type, LookupOptions, TypeRegistry};
