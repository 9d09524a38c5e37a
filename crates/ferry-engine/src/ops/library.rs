//! Native module and call binding operations

use std::sync::Arc;

use super::options::{DeclareOptions, LoadOptions, ResolveOptions};
use crate::error::{EngineError, EngineResult};
use crate::flags::{ModuleFlags, ObjectFlags};
use crate::handles::{HandleKind, HandleValue};
use crate::interp::Interpreter;
use crate::invoke::{resolve_and_invoke, InvokeOptions, InvokeOutcome, InvokeRequest};
use crate::native::{CallBinding, LoadError, NativeModule};

// ============================================================================
// Modules
// ============================================================================

fn map_module(interp: &Interpreter, path: &str, flags: ModuleFlags) -> EngineResult<NativeModule> {
    Ok(NativeModule::load(path, flags, &interp.settings().library.search_paths)?)
}

/// Load a module and return its new handle
pub fn load(interp: &Interpreter, path: &str, options: &LoadOptions) -> EngineResult<String> {
    let module = Arc::new(map_module(interp, path, options.effective_flags())?);
    let name = interp.handles().create(
        HandleValue::Module(Arc::clone(&module)),
        ObjectFlags::NONE,
        options.module_name.as_deref(),
    );
    match name {
        Ok(name) => {
            log::debug!(target: "ferry::native", "loaded {} as {}", module.path(), name);
            Ok(name)
        }
        Err(e) => {
            module.release();
            Err(e)
        }
    }
}

/// Handle of an already loaded module for `path`, loading it if absent.
///
/// Concurrent callers for the same path all end up with one handle.
pub fn checkload(interp: &Interpreter, path: &str, options: &LoadOptions) -> EngineResult<String> {
    if let Some(existing) = interp.handles().find_module_by_path(path) {
        log::debug!(target: "ferry::native", "{} already loaded as {}", path, existing);
        return Ok(existing);
    }
    let module = Arc::new(map_module(interp, path, options.effective_flags())?);
    let (name, created) = interp.handles().create_module_if_absent(
        Arc::clone(&module),
        ObjectFlags::NONE,
        options.module_name.as_deref(),
    )?;
    if created {
        log::debug!(target: "ferry::native", "loaded {} as {}", module.path(), name);
    } else {
        log::debug!(target: "ferry::native", "{} already loaded as {}", path, name);
    }
    Ok(name)
}

/// Remove a module handle and drop its reference.
///
/// Fails with `ModuleLocked` for modules loaded with `NoUnload` and for
/// handles flagged `Locked`. The library stays mapped while resolved call
/// bindings still reference it.
pub fn unload(interp: &Interpreter, name: &str) -> EngineResult<()> {
    let module = interp.handles().module(name)?;
    let locked = interp.handles().flags(name)?.contains(ObjectFlags::LOCKED);
    if locked || module.flags().contains(ModuleFlags::NO_UNLOAD) {
        return Err(EngineError::ModuleLocked {
            name: name.to_string(),
        });
    }
    interp.handles().dispose(name, None)?;
    log::debug!(
        target: "ferry::native",
        "unloaded {} ({} references left)",
        name,
        module.ref_count()
    );
    Ok(())
}

/// Raw OS handle of a loaded module, found by file name or path
pub fn handle(interp: &Interpreter, file_name: &str) -> EngineResult<usize> {
    for name in interp.handles().list(None, Some(HandleKind::Module))? {
        let module = interp.handles().module(&name)?;
        let matches = module.file_name() == file_name
            || module.path() == file_name
            || module.requested_path() == file_name;
        if matches && module.is_loaded() {
            return Ok(module.raw_handle());
        }
    }
    Err(LoadError::NotLoaded {
        path: file_name.to_string(),
    }
    .into())
}

/// Check that a module can be loaded, without keeping it
pub fn test(interp: &Interpreter, path: &str, options: &LoadOptions) -> EngineResult<()> {
    let module = map_module(interp, path, options.flags.difference(ModuleFlags::NO_UNLOAD))?;
    module.release();
    Ok(())
}

// ============================================================================
// Call bindings
// ============================================================================

/// Declare a call binding and return its handle.
///
/// With a module the binding is resolved right away, by symbol or by
/// explicit address; if that fails the declaration is removed again.
pub fn declare(interp: &Interpreter, options: &DeclareOptions) -> EngineResult<String> {
    let signature = options.signature(&interp.settings().library)?;
    if options.module.is_none() && (options.symbol.is_some() || options.address.is_some()) {
        return Err(EngineError::invalid("a symbol or address requires a module"));
    }

    let binding = Arc::new(CallBinding::new(signature));
    let name = interp.handles().create(
        HandleValue::Binding(Arc::clone(&binding)),
        ObjectFlags::NONE,
        options.name.as_deref(),
    )?;

    let Some(module_name) = &options.module else {
        return Ok(name);
    };
    let bound = match options.address {
        Some(address) => interp.check_writable("resolve call binding").and_then(|_| {
            let module = interp.handles().module(module_name)?;
            let canonical = interp
                .handles()
                .resolve_name(module_name)
                .unwrap_or_else(|| module_name.clone());
            binding.bind_address(&canonical, module, address)
        }),
        None => resolve(
            interp,
            &name,
            &ResolveOptions {
                module: Some(module_name.clone()),
                symbol: options.symbol.clone(),
            },
        )
        .map(|_| ()),
    };
    if let Err(e) = bound {
        if let Err(dispose) = interp.handles().dispose(&name, None) {
            log::warn!(target: "ferry::native", "rollback of {} failed: {}", name, dispose);
        }
        return Err(e);
    }
    Ok(name)
}

/// Bind a call binding to an exported symbol; returns the entry address.
///
/// Module and symbol default to the ones the binding is currently bound to.
pub fn resolve(interp: &Interpreter, name: &str, options: &ResolveOptions) -> EngineResult<usize> {
    interp.check_writable("resolve call binding")?;
    let binding = interp.handles().binding(name)?;
    let module_name = options
        .module
        .clone()
        .or_else(|| binding.module_name())
        .ok_or_else(|| {
            EngineError::invalid(format!("no module specified for call binding \"{}\"", name))
        })?;
    let symbol = options
        .symbol
        .clone()
        .or_else(|| binding.symbol())
        .ok_or_else(|| {
            EngineError::invalid(format!("no symbol specified for call binding \"{}\"", name))
        })?;
    let canonical = interp
        .handles()
        .resolve_name(&module_name)
        .unwrap_or_else(|| module_name.clone());
    let module = interp.handles().module(&module_name)?;
    binding.bind(&canonical, module, &symbol)
}

/// Drop a binding's entry address; `false` if it was not resolved
pub fn unresolve(interp: &Interpreter, name: &str) -> EngineResult<bool> {
    interp.check_writable("unresolve call binding")?;
    Ok(interp.handles().binding(name)?.unresolve())
}

/// Call a resolved binding with raw arguments
pub fn call(
    interp: &Interpreter,
    name: &str,
    args: &[String],
    options: &InvokeOptions,
) -> EngineResult<InvokeOutcome> {
    let binding = interp.handles().binding(name)?;
    if !binding.is_resolved() {
        return Err(EngineError::UnboundCallBinding {
            name: name.to_string(),
        });
    }
    let mut options = options.clone();
    options.index = None;
    options.reorder = false;

    let request = InvokeRequest {
        type_name: name,
        member: name,
        target: None,
        candidates: vec![binding.candidate(name)],
        args,
    };
    let outcome = resolve_and_invoke(interp, request, &options);
    if binding.signature().policy.set_last_error {
        interp.set_last_os_error(binding.take_last_error());
    }
    outcome
}

/// Remove a call binding handle
pub fn undeclare(interp: &Interpreter, name: &str) -> EngineResult<()> {
    interp.handles().binding(name)?;
    interp.handles().dispose(name, None)?;
    Ok(())
}

/// Descriptive key/value pairs of a call binding
pub fn info_binding(interp: &Interpreter, name: &str) -> EngineResult<Vec<(&'static str, String)>> {
    let binding = interp.handles().binding(name)?;
    let canonical = interp.handles().resolve_name(name).unwrap_or_else(|| name.to_string());
    let mut info = vec![("kind", HandleKind::CallBinding.to_string()), ("name", canonical)];
    info.extend(binding.info());
    if let Some((module, _)) = binding.entry() {
        info.push(("moduleFlags", module.flags().to_string()));
        info.push(("moduleFileName", module.path().to_string()));
        info.push(("moduleReferenceCount", module.ref_count().to_string()));
    }
    Ok(info)
}

/// Descriptive key/value pairs of a module
pub fn info_module(interp: &Interpreter, name: &str) -> EngineResult<Vec<(&'static str, String)>> {
    let module = interp.handles().module(name)?;
    let canonical = interp.handles().resolve_name(name).unwrap_or_else(|| name.to_string());
    let bindings = interp.handles().bindings_of(&module);
    Ok(vec![
        ("kind", HandleKind::Module.to_string()),
        ("name", canonical),
        ("flags", module.flags().to_string()),
        ("fileName", module.path().to_string()),
        ("module", format!("{:#x}", module.raw_handle())),
        ("referenceCount", module.ref_count().to_string()),
        ("bindings", crate::format::format_list(&bindings)),
    ])
}
