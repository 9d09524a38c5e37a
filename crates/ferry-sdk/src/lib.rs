//! Ferry SDK - types for describing host values to the interop engine
//!
//! This crate provides the minimal types and traits an embedder needs to
//! expose host types to `ferry-engine` without depending on the engine
//! itself: the [`Value`] model, the [`HostObject`] capability interface, type
//! and member descriptors, and the [`TypeBuilder`].
//!
//! # Example
//!
//! ```ignore
//! use ferry_sdk::{param, TypeBuilder, Value, FromValue, IntoValue};
//!
//! let math = TypeBuilder::class("Demo.Math")
//!     .static_method("Abs", vec![param("x", "System.Int32")], "System.Int32", |_, args| {
//!         Ok(i32::from_value(&args[0])?.abs().into_value())
//!     })
//!     .build();
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod convert;
pub mod error;
pub mod types;
pub mod value;

pub use builder::{accessor, param, TypeBuilder};
pub use convert::{FromValue, IntoValue};
pub use error::{HostError, HostErrorKind, HostResult};
pub use types::{
    EnumInfo, Invoker, MemberDescriptor, MemberKind, ParameterDescriptor, Primitive,
    TypeDescriptor, TypeKind, CONSTRUCTOR_NAME, OBJECT_TYPE, STRING_TYPE, VOID_TYPE,
};
pub use value::{downcast, HostObject, Number, ObjectRef, Value};
