//! Ferry interop engine
//!
//! Ferry lets a string-oriented command interpreter drive a host object
//! model and native libraries. The engine is organized into layers:
//!
//! - **reflect**: type registry, type lookup and member candidate gathering
//! - **marshal**: coercion of raw text arguments and materialization of results
//! - **invoke**: overload resolution, the pluggable [`Binder`] and the panic boundary
//! - **handles**: the reference-counted handle registry and bulk cleanup
//! - **native**: module loading, declared signatures and libffi call bindings
//! - **ops**: the operation surface used by a command front end
//!
//! # Example
//!
//! ```ignore
//! use ferry_engine::{ops, EngineSettings, Interpreter};
//!
//! let interp = Interpreter::new(EngineSettings::default());
//! let libc = ops::library::load(&interp, "libc.so.6", &Default::default())?;
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod flags;
pub mod format;
pub mod handles;
pub mod interp;
pub mod invoke;
pub mod marshal;
pub mod native;
pub mod ops;
pub mod reflect;
pub mod settings;

pub use error::{CoercionError, EngineError, EngineResult};
pub use flags::{
    BindingFlags, ByRefArgumentFlags, MarshalFlags, MemberTypes, ModuleFlags, ObjectFlags,
    ReorderFlags,
};
pub use handles::{
    CleanupReport, CleanupRequest, HandleInfo, HandleKind, HandleRegistry, HandleValue, LookupMode,
};
pub use interp::{ErrorState, Interpreter, MemoryVariables, VariableStore};
pub use invoke::{Binder, DefaultBinder, InvokeOptions, InvokeOutcome};
pub use marshal::Materialized;
pub use reflect::{LookupOptions, MemberCandidate, TypeRegistry};
pub use settings::{EngineSettings, SettingsError};
