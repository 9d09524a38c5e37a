//! Call bindings
//!
//! A [`CallBinding`] pairs a native signature with an entry address inside
//! a [`NativeModule`]. Bindings can be declared unresolved and resolved
//! later, unresolved again, and re-resolved against another module. While
//! resolved, a binding holds one reference on its module.

use std::sync::Arc;

use ferry_sdk::{
    HostError, HostResult, Invoker, MemberDescriptor, MemberKind, ObjectRef, ParameterDescriptor,
    Value,
};
use parking_lot::{Mutex, RwLock};

use super::ffi;
use super::module::NativeModule;
use super::signature::Signature;
use crate::error::{EngineError, EngineResult};
use crate::reflect::MemberCandidate;

/// Owner name reported for binding candidates
const BINDING_OWNER: &str = "Ferry.CallBinding";

#[derive(Default)]
struct BindingState {
    module: Option<(String, Arc<NativeModule>)>,
    symbol: Option<String>,
    address: Option<usize>,
}

/// A declared native call
pub struct CallBinding {
    signature: Signature,
    state: RwLock<BindingState>,
    last_error: Mutex<Option<i32>>,
}

impl std::fmt::Debug for CallBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("CallBinding")
            .field("signature", &self.signature.describe())
            .field("module", &state.module.as_ref().map(|(name, _)| name))
            .field("symbol", &state.symbol)
            .field("address", &state.address)
            .finish()
    }
}

impl CallBinding {
    /// Create an unresolved binding
    pub fn new(signature: Signature) -> Self {
        Self {
            signature,
            state: RwLock::new(BindingState::default()),
            last_error: Mutex::new(None),
        }
    }

    /// Declared signature
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Resolve `symbol` in `module`, replacing any previous entry.
    ///
    /// `module_name` is the module's handle name and is only used for
    /// reporting.
    pub fn bind(
        &self,
        module_name: &str,
        module: Arc<NativeModule>,
        symbol: &str,
    ) -> EngineResult<usize> {
        let address = module.symbol_address(symbol).map_err(|_| EngineError::SymbolNotFound {
            symbol: symbol.to_string(),
            module: module_name.to_string(),
        })?;
        self.attach(module_name, module, Some(symbol.to_string()), address)?;
        Ok(address)
    }

    /// Bind to an explicit entry address inside `module`
    pub fn bind_address(
        &self,
        module_name: &str,
        module: Arc<NativeModule>,
        address: usize,
    ) -> EngineResult<()> {
        if address == 0 {
            return Err(EngineError::invalid("entry address cannot be zero"));
        }
        self.attach(module_name, module, None, address)
    }

    fn attach(
        &self,
        module_name: &str,
        module: Arc<NativeModule>,
        symbol: Option<String>,
        address: usize,
    ) -> EngineResult<()> {
        module.add_ref()?;
        let previous = {
            let mut state = self.state.write();
            let previous = state.module.replace((module_name.to_string(), module));
            state.symbol = symbol;
            state.address = Some(address);
            previous
        };
        if let Some((_, old)) = previous {
            old.release();
        }
        log::debug!(
            target: "ferry::native",
            "bound {} to {:#x} in {}",
            self.signature.describe(),
            address,
            module_name
        );
        Ok(())
    }

    /// Drop the entry address and the module reference.
    ///
    /// Returns `false` if the binding was not resolved.
    pub fn unresolve(&self) -> bool {
        let previous = {
            let mut state = self.state.write();
            state.address = None;
            state.symbol = None;
            state.module.take()
        };
        match previous {
            Some((_, module)) => {
                module.release();
                true
            }
            None => false,
        }
    }

    /// Whether an entry address is set
    pub fn is_resolved(&self) -> bool {
        self.state.read().address.is_some()
    }

    /// Module and entry address, when resolved
    pub fn entry(&self) -> Option<(Arc<NativeModule>, usize)> {
        let state = self.state.read();
        match (&state.module, state.address) {
            (Some((_, module)), Some(address)) => Some((module.clone(), address)),
            _ => None,
        }
    }

    /// Handle name of the module, when resolved
    pub fn module_name(&self) -> Option<String> {
        self.state.read().module.as_ref().map(|(name, _)| name.clone())
    }

    /// Whether the binding currently points into `module`
    pub fn is_bound_to(&self, module: &Arc<NativeModule>) -> bool {
        self.state
            .read()
            .module
            .as_ref()
            .is_some_and(|(_, m)| Arc::ptr_eq(m, module))
    }

    /// Resolved symbol name, if resolved by name
    pub fn symbol(&self) -> Option<String> {
        self.state.read().symbol.clone()
    }

    /// OS error recorded by the last call, if the policy captures it
    pub fn last_error(&self) -> Option<i32> {
        *self.last_error.lock()
    }

    /// Take and clear the recorded OS error
    pub fn take_last_error(&self) -> Option<i32> {
        self.last_error.lock().take()
    }

    /// Perform the call with coerced arguments
    fn invoke(&self, args: &mut [Value]) -> HostResult<Value> {
        let (module, address) = self
            .entry()
            .ok_or_else(|| HostError::failure("call binding is not resolved"))?;
        // The module must stay mapped for the duration of the call.
        module
            .add_ref()
            .map_err(|e| HostError::failure(e.to_string()))?;
        let outcome = ffi::call(&self.signature, address, args);
        module.release();
        let outcome = outcome?;
        if self.signature.policy.set_last_error {
            *self.last_error.lock() = outcome.last_error;
        }
        Ok(outcome.value)
    }

    /// Candidate the invocation coordinator can marshal arguments for
    pub fn candidate(self: &Arc<Self>, name: &str) -> MemberCandidate {
        let parameters = self
            .signature
            .parameters
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let param = ParameterDescriptor::new(format!("arg{}", i), p.ty.host_type_name());
                if p.by_ref {
                    param.by_ref()
                } else {
                    param
                }
            })
            .collect();
        let binding = Arc::clone(self);
        let invoker: Invoker =
            Arc::new(move |_: Option<&ObjectRef>, args: &mut [Value]| binding.invoke(args));
        MemberCandidate::standalone(
            BINDING_OWNER,
            MemberDescriptor {
                name: name.to_string(),
                kind: MemberKind::Method,
                is_static: true,
                is_public: true,
                parameters,
                value_type: self.signature.return_type.host_type_name().to_string(),
                invoker: Some(invoker),
                getter: None,
                setter: None,
            },
        )
    }

    /// Descriptive key/value pairs
    pub fn info(&self) -> Vec<(&'static str, String)> {
        let state = self.state.read();
        let policy = &self.signature.policy;
        vec![
            ("signature", self.signature.describe()),
            ("callingConvention", self.signature.calling_convention.to_string()),
            ("charSet", policy.char_set.to_string()),
            ("bestFitMapping", policy.best_fit_mapping.to_string()),
            ("setLastError", policy.set_last_error.to_string()),
            ("throwOnUnmappableChar", policy.throw_on_unmappable_char.to_string()),
            (
                "module",
                state.module.as_ref().map(|(n, _)| n.clone()).unwrap_or_default(),
            ),
            ("symbol", state.symbol.clone().unwrap_or_default()),
            (
                "address",
                state.address.map(|a| format!("{:#x}", a)).unwrap_or_default(),
            ),
            (
                "lastError",
                self.last_error().map(|e| e.to_string()).unwrap_or_default(),
            ),
        ]
    }
}

impl Drop for CallBinding {
    fn drop(&mut self) {
        self.unresolve();
    }
}
