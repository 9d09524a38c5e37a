//! Interpreter state
//!
//! An [`Interpreter`] owns everything one script context needs: its type
//! registry, handle registry, variable store, binder, settings, and the
//! error state that failed invocations report into.

mod variables;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{EngineError, EngineResult};
use crate::handles::HandleRegistry;
use crate::invoke::{Binder, DefaultBinder};
use crate::marshal::MarshalContext;
use crate::reflect::TypeRegistry;
use crate::settings::EngineSettings;

pub use variables::{MemoryVariables, VariableStore};

/// Last failure reported by an invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorState {
    /// Diagnostic code (0 when clear)
    pub code: i32,
    /// Message of the last failure
    pub message: String,
    /// OS error captured after the last native call that asked for it
    pub last_os_error: Option<i32>,
}

/// One script context
pub struct Interpreter {
    types: TypeRegistry,
    handles: HandleRegistry,
    variables: Arc<dyn VariableStore>,
    binder: Arc<dyn Binder>,
    settings: EngineSettings,
    read_only: AtomicBool,
    error_state: Mutex<ErrorState>,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("types", &self.types)
            .field("handles", &self.handles.len())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl Interpreter {
    /// Create an interpreter with an in-memory variable store
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_variables(settings, Arc::new(MemoryVariables::new()))
    }

    /// Create an interpreter backed by an embedder variable store
    pub fn with_variables(settings: EngineSettings, variables: Arc<dyn VariableStore>) -> Self {
        log::debug!(
            target: "ferry::invoke",
            "interpreter created (read_only: {})",
            settings.interpreter.read_only
        );
        Self {
            types: TypeRegistry::new(),
            handles: HandleRegistry::new(&settings.handles),
            variables,
            binder: Arc::new(DefaultBinder),
            read_only: AtomicBool::new(settings.interpreter.read_only),
            settings,
            error_state: Mutex::new(ErrorState::default()),
        }
    }

    /// Replace the overload selection strategy
    pub fn set_binder(&mut self, binder: Arc<dyn Binder>) {
        self.binder = binder;
    }

    /// Host types
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Handles
    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    /// Script variables
    pub fn variables(&self) -> &dyn VariableStore {
        self.variables.as_ref()
    }

    /// Overload selection strategy
    pub fn binder(&self) -> &dyn Binder {
        self.binder.as_ref()
    }

    /// Settings the interpreter was created with
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Whether state-changing native operations are refused
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    /// Enter or leave read-only mode
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Release);
    }

    /// Fail with `ReadOnlyViolation` in read-only mode
    pub fn check_writable(&self, operation: &str) -> EngineResult<()> {
        if self.is_read_only() {
            return Err(EngineError::ReadOnlyViolation {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// Snapshot of the error state
    pub fn error_state(&self) -> ErrorState {
        self.error_state.lock().clone()
    }

    /// Record a failure
    pub fn set_error(&self, code: i32, message: impl Into<String>) {
        let mut state = self.error_state.lock();
        state.code = code;
        state.message = message.into();
    }

    /// Record the OS error of a native call
    pub fn set_last_os_error(&self, error: Option<i32>) {
        self.error_state.lock().last_os_error = error;
    }

    /// Reset the error state
    pub fn clear_error(&self) {
        *self.error_state.lock() = ErrorState::default();
    }

    /// Marshal context using the interpreter's registries and default policy
    pub fn marshal_context(&self) -> MarshalContext<'_> {
        let object = &self.settings.object;
        let mut ctx = MarshalContext::new(&self.types, &self.handles, self.variables.as_ref());
        ctx.flags = object.marshal_flags;
        ctx.by_ref_flags = object.by_ref_flags;
        ctx.no_case = object.no_case;
        ctx.strict_args = object.strict_args;
        ctx
    }
}
