//! Reference-counted handle registry
//!
//! Scripts never hold foreign values directly; they hold generated names
//! that key into a [`HandleRegistry`]. Each entry carries the value (a host
//! object, a native module or a call binding), a reference count, flags and
//! an optional alias.

mod cleanup;
mod registry;

use std::fmt;
use std::sync::Arc;

use ferry_sdk::ObjectRef;

use crate::flags::ObjectFlags;
use crate::native::{CallBinding, NativeModule};

pub use cleanup::{CleanupReport, CleanupRequest};
pub use registry::HandleRegistry;

/// Kind of value a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Host object
    Object,
    /// Loaded native module
    Module,
    /// Native call binding
    CallBinding,
}

impl HandleKind {
    /// Lowercase name used in messages and listings
    pub const fn as_str(&self) -> &'static str {
        match self {
            HandleKind::Object => "object",
            HandleKind::Module => "module",
            HandleKind::CallBinding => "call binding",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value stored behind a handle
#[derive(Clone)]
pub enum HandleValue {
    /// Host object
    Object(ObjectRef),
    /// Loaded native module
    Module(Arc<NativeModule>),
    /// Native call binding
    Binding(Arc<CallBinding>),
}

impl HandleValue {
    /// Kind of the value
    pub fn kind(&self) -> HandleKind {
        match self {
            HandleValue::Object(_) => HandleKind::Object,
            HandleValue::Module(_) => HandleKind::Module,
            HandleValue::Binding(_) => HandleKind::CallBinding,
        }
    }

    /// Type name reported by `info`
    pub fn type_name(&self) -> String {
        match self {
            HandleValue::Object(obj) => obj.type_name().to_string(),
            HandleValue::Module(_) => "Ferry.NativeModule".to_string(),
            HandleValue::Binding(_) => "Ferry.CallBinding".to_string(),
        }
    }
}

impl fmt::Debug for HandleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleValue::Object(obj) => write!(f, "Object({})", obj.type_name()),
            HandleValue::Module(module) => write!(f, "Module({})", module.path()),
            HandleValue::Binding(binding) => {
                write!(f, "Binding({})", binding.signature().describe())
            }
        }
    }
}

/// Whether a missing handle is an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// Missing handles fail with `HandleNotFound`
    Demand,
    /// Missing handles are ignored
    Optional,
}

/// Snapshot of one registry entry
#[derive(Debug, Clone)]
pub struct HandleInfo {
    /// Handle name
    pub name: String,
    /// Value kind
    pub kind: HandleKind,
    /// Type name of the value
    pub type_name: String,
    /// Outstanding references
    pub ref_count: usize,
    /// Handle flags
    pub flags: ObjectFlags,
    /// Alias, if any
    pub alias: Option<String>,
    /// Creation sequence number
    pub id: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct HandleEntry {
    pub name: String,
    pub value: HandleValue,
    pub ref_count: usize,
    pub flags: ObjectFlags,
    pub alias: Option<String>,
    pub id: u64,
}

impl HandleEntry {
    fn info(&self) -> HandleInfo {
        HandleInfo {
            name: self.name.clone(),
            kind: self.value.kind(),
            type_name: self.value.type_name(),
            ref_count: self.ref_count,
            flags: self.flags,
            alias: self.alias.clone(),
            id: self.id,
        }
    }

    fn is_locked(&self) -> bool {
        self.flags.contains(ObjectFlags::LOCKED)
    }
}
