//! Typed options for the operation surface
//!
//! A command front end fills these in from its own option syntax. Every
//! struct can be seeded from [`EngineSettings`] so unspecified options
//! follow the interpreter's configuration.

use crate::error::EngineResult;
use crate::flags::ModuleFlags;
use crate::handles::CleanupRequest;
use crate::invoke::InvokeOptions;
use crate::native::{
    CallingConvention, CharSet, MarshalPolicy, NativeParameter, NativeType, Signature,
};
use crate::reflect::LookupOptions;
use crate::settings::{CleanupSettings, EngineSettings, LibrarySettings};

/// Options of object operations
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectOptions {
    /// Resolution, marshaling and result policy
    pub invoke: InvokeOptions,
    /// Type names must match exactly
    pub strict_type: bool,
    /// Restrict resolved types to these names
    pub allowed_types: Option<Vec<String>>,
    /// Namespaces tried for unqualified type names
    pub namespaces: Vec<String>,
}

impl Default for ObjectOptions {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

impl ObjectOptions {
    /// Options seeded from settings
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            invoke: InvokeOptions::from_settings(&settings.object),
            strict_type: settings.object.strict_type,
            allowed_types: None,
            namespaces: settings.object.namespaces.clone(),
        }
    }

    pub(crate) fn lookup_options(&self) -> LookupOptions {
        LookupOptions {
            strict: self.strict_type,
            no_case: self.invoke.no_case,
            allowed: self.allowed_types.clone(),
            namespaces: self.namespaces.clone(),
        }
    }
}

/// Cleanup request seeded from the `[cleanup]` settings section
pub fn cleanup_request(settings: &CleanupSettings) -> CleanupRequest {
    CleanupRequest {
        stop_on_error: settings.stop_on_error,
        synchronous: settings.synchronous,
        ..CleanupRequest::default()
    }
}

/// Options of `load` and `checkload`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Module flags
    pub flags: ModuleFlags,
    /// Shorthand for adding [`ModuleFlags::NO_UNLOAD`]
    pub locked: bool,
    /// Handle name instead of a generated one
    pub module_name: Option<String>,
}

impl LoadOptions {
    pub(crate) fn effective_flags(&self) -> ModuleFlags {
        if self.locked {
            self.flags | ModuleFlags::NO_UNLOAD
        } else {
            self.flags
        }
    }
}

/// Options of `declare`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclareOptions {
    /// Return type
    pub return_type: NativeType,
    /// Parameters in order
    pub parameters: Vec<NativeParameter>,
    /// Calling convention (settings default when unset)
    pub calling_convention: Option<CallingConvention>,
    /// Character set (settings default when unset)
    pub char_set: Option<CharSet>,
    /// Best-fit mapping (settings default when unset)
    pub best_fit_mapping: Option<bool>,
    /// Capture the OS error after each call
    pub set_last_error: bool,
    /// Fail on characters that cannot be narrowed
    pub throw_on_unmappable_char: bool,
    /// Module handle to resolve against right away
    pub module: Option<String>,
    /// Exported symbol to resolve
    pub symbol: Option<String>,
    /// Explicit entry address inside `module` instead of a symbol
    pub address: Option<usize>,
    /// Handle name instead of a generated one
    pub name: Option<String>,
}

impl DeclareOptions {
    /// Declaration of the given shape with every policy option unset
    pub fn new(return_type: NativeType, parameters: Vec<NativeParameter>) -> Self {
        Self {
            return_type,
            parameters,
            calling_convention: None,
            char_set: None,
            best_fit_mapping: None,
            set_last_error: false,
            throw_on_unmappable_char: false,
            module: None,
            symbol: None,
            address: None,
            name: None,
        }
    }

    /// Build the signature, filling unset options from `library`
    pub fn signature(&self, library: &LibrarySettings) -> EngineResult<Signature> {
        let policy = MarshalPolicy {
            best_fit_mapping: self.best_fit_mapping.unwrap_or(library.best_fit_mapping),
            char_set: self.char_set.unwrap_or(library.char_set),
            set_last_error: self.set_last_error,
            throw_on_unmappable_char: self.throw_on_unmappable_char,
        };
        Signature::new(
            self.return_type,
            self.parameters.clone(),
            self.calling_convention.unwrap_or(library.calling_convention),
            policy,
        )
    }
}

/// Options of `resolve`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Module handle (defaults to the currently bound module)
    pub module: Option<String>,
    /// Exported symbol (defaults to the currently bound symbol)
    pub symbol: Option<String>,
}
