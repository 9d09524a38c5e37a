//! Native modules and call bindings
//!
//! This module provides:
//! - Dynamic library loading (`Library`)
//! - Reference-counted module lifetimes (`NativeModule`)
//! - Declared native signatures (`Signature`) and call bindings (`CallBinding`)
//! - The libffi call path used when a binding is invoked

mod binding;
mod ffi;
pub mod loader;
mod module;
mod signature;

pub use binding::CallBinding;
pub use loader::{Library, LoadError};
pub use module::NativeModule;
pub use signature::{
    CallingConvention, CharSet, MarshalPolicy, NativeParameter, NativeType, Signature,
};
