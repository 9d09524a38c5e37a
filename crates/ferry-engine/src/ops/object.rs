//! Object operations: creation, invocation and handle lifecycle

use std::sync::Arc;

use ferry_sdk::{ObjectRef, TypeDescriptor, TypeKind, Value, CONSTRUCTOR_NAME};

use super::options::ObjectOptions;
use crate::error::{CoercionError, EngineError, EngineResult};
use crate::flags::{BindingFlags, MemberTypes, ObjectFlags};
use crate::handles::{CleanupReport, CleanupRequest, HandleInfo, HandleKind, LookupMode};
use crate::interp::Interpreter;
use crate::invoke::{
    call_guarded, candidates_for, resolve_and_invoke, InvokeOptions, InvokeOutcome, InvokeRequest,
};
use crate::marshal::{coerce_text, materialize, BoxedValue, MaterializeOptions};

/// Resolve a type name under the lookup policy in `options`
pub fn resolve_type(
    interp: &Interpreter,
    type_name: &str,
    options: &ObjectOptions,
) -> EngineResult<Arc<TypeDescriptor>> {
    interp.types().lookup(type_name, &options.lookup_options())
}

// ============================================================================
// Creation
// ============================================================================

/// Construct an instance of `type_name` and return its handle.
///
/// Value types without constructors are instantiated directly: from their
/// default factory when no arguments are given, or by coercing the single
/// argument for primitives, strings and enums. The new handle starts with no
/// references unless `temporary` is set, in which case it holds one until
/// [`remove_temporary_references`]. If the requested alias cannot be created the new object is
/// disposed again.
pub fn create(
    interp: &Interpreter,
    type_name: &str,
    args: &[String],
    options: &ObjectOptions,
) -> EngineResult<InvokeOutcome> {
    let ty = resolve_type(interp, type_name, options)?;
    let mut invoke = options.invoke.clone();
    let alias = invoke.alias.take();
    invoke.to_string = false;

    let outcome = if ty.kind.is_value_like() && !ty.has_constructors() && invoke.index.is_none() {
        instantiate_directly(interp, &ty, args, &invoke)?
    } else {
        invoke.member_types = MemberTypes::CONSTRUCTOR;
        let request = InvokeRequest {
            type_name: &ty.name,
            member: CONSTRUCTOR_NAME,
            target: None,
            candidates: candidates_for(interp, &ty, CONSTRUCTOR_NAME, false, &invoke),
            args,
        };
        resolve_and_invoke(interp, request, &invoke)?
    };

    let InvokeOutcome::Value(mut made) = outcome else {
        return Ok(outcome);
    };
    let Some(name) = made.handle.clone() else {
        return Err(EngineError::invalid(format!(
            "constructor of \"{}\" did not return an object",
            ty.name
        )));
    };
    if let Some(alias) = alias {
        match interp.handles().alias(&name, &alias) {
            Ok(alias) => made.alias = Some(alias),
            Err(e) => {
                if let Err(dispose) = interp.handles().dispose(&name, None) {
                    log::warn!(
                        target: "ferry::handles",
                        "rollback of {} failed: {}",
                        name,
                        dispose
                    );
                }
                return Err(e);
            }
        }
    }
    log::debug!(target: "ferry::invoke", "created {} as {}", ty.name, name);
    Ok(InvokeOutcome::Value(made))
}

fn instantiate_directly(
    interp: &Interpreter,
    ty: &Arc<TypeDescriptor>,
    args: &[String],
    options: &InvokeOptions,
) -> EngineResult<InvokeOutcome> {
    let value = match (args, &ty.default_factory) {
        ([], Some(factory)) => call_guarded(|| factory(None, &mut [])).map_err(|source| {
            let code = source.effective_code();
            interp.set_error(code, source.message.clone());
            EngineError::InvocationFailed {
                member: format!("{} default factory", ty.name),
                code,
                source,
            }
        })?,
        ([raw], _) if !matches!(ty.kind, TypeKind::Struct) => {
            let mut ctx = interp.marshal_context();
            ctx.flags = options.marshal_flags;
            ctx.no_case = options.no_case;
            let (value, _) = coerce_text(&ctx, raw, &ty.name).map_err(|reason| {
                EngineError::CoercionFailed(CoercionError::new(&ty.name, 0, "value", reason))
            })?;
            value
        }
        _ => {
            return Err(EngineError::MemberNotFound {
                type_name: ty.name.clone(),
                member: CONSTRUCTOR_NAME.to_string(),
                errors: Vec::new(),
            })
        }
    };

    let object: ObjectRef = match value {
        Value::Object(obj) => obj,
        other => Arc::new(BoxedValue::new(ty.name.clone(), other)),
    };
    let made = materialize(
        interp.types(),
        interp.handles(),
        Value::Object(object),
        &ty.name,
        options.marshal_flags,
        &MaterializeOptions {
            to_string: false,
            object_flags: options.object_flags,
            object_name: options.object_name.clone(),
            alias: None,
            temporary: options.temporary,
        },
    )?;
    Ok(InvokeOutcome::Value(made))
}

// ============================================================================
// Invocation
// ============================================================================

/// Target of an invocation: an object handle or, failing that, a type name
fn target_of(
    interp: &Interpreter,
    target: &str,
    options: &ObjectOptions,
) -> EngineResult<(Arc<TypeDescriptor>, Option<ObjectRef>, ObjectFlags)> {
    if interp.handles().exists(target) {
        let object = interp.handles().object(target)?;
        let flags = interp.handles().flags(target)?;
        let ty = interp.types().type_of(object.as_ref())?;
        return Ok((ty, Some(object), flags));
    }
    Ok((resolve_type(interp, target, options)?, None, ObjectFlags::NONE))
}

fn invoke_with(
    interp: &Interpreter,
    target: &str,
    member: &str,
    args: &[String],
    options: &ObjectOptions,
    invoke: &mut InvokeOptions,
) -> EngineResult<InvokeOutcome> {
    let (ty, object, flags) = target_of(interp, target, options)?;
    if flags.contains(ObjectFlags::NO_CASE) {
        invoke.no_case = true;
    }
    let request = InvokeRequest {
        type_name: &ty.name,
        member,
        candidates: candidates_for(interp, &ty, member, object.is_some(), invoke),
        target: object,
        args,
    };
    resolve_and_invoke(interp, request, invoke)
}

/// Invoke `member` on an object handle, or a static member on a type
pub fn invoke(
    interp: &Interpreter,
    target: &str,
    member: &str,
    args: &[String],
    options: &ObjectOptions,
) -> EngineResult<InvokeOutcome> {
    let mut invoke = options.invoke.clone();
    invoke_with(interp, target, member, args, options, &mut invoke)
}

/// Outcome of [`invoke_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvokeAllReport {
    /// Result text of each successful call, in order
    pub results: Vec<String>,
    /// Messages of failed calls
    pub errors: Vec<String>,
}

/// Invoke a sequence of members on one target.
///
/// Each call is a member name followed by its arguments. With
/// `ignore_errors` failures are tallied and the sequence continues;
/// otherwise the first failure is returned.
pub fn invoke_all(
    interp: &Interpreter,
    target: &str,
    calls: &[Vec<String>],
    options: &ObjectOptions,
    ignore_errors: bool,
) -> EngineResult<InvokeAllReport> {
    let mut report = InvokeAllReport::default();
    for call in calls {
        let Some((member, args)) = call.split_first() else {
            return Err(EngineError::invalid("empty member invocation"));
        };
        match invoke(interp, target, member, args, options) {
            Ok(outcome) => report.results.push(outcome.text()),
            Err(e) if ignore_errors => {
                log::debug!(target: "ferry::invoke", "invoke_all: {} failed: {}", member, e);
                report.errors.push(e.to_string());
            }
            Err(e) => return Err(e),
        }
    }
    Ok(report)
}

/// Invoke with raw binding flags choosing the member kind.
///
/// `flags` must carry at least one invocation intent (`InvokeMethod`,
/// `CreateInstance`, `GetField`, `SetField`, `GetProperty`, `SetProperty`).
/// Without visibility bits the default visibility applies.
pub fn invoke_raw(
    interp: &Interpreter,
    target: &str,
    member: &str,
    flags: BindingFlags,
    args: &[String],
    options: &ObjectOptions,
) -> EngineResult<InvokeOutcome> {
    let intents = BindingFlags::from_bits(flags.bits() & BindingFlags::INVOKE_MASK.bits());
    if intents.is_empty() {
        return Err(EngineError::invalid(format!(
            "binding flags \"{}\" carry no invocation intent",
            flags
        )));
    }

    let mut member_types = MemberTypes::NONE;
    for (intent, kind) in [
        (BindingFlags::INVOKE_METHOD, MemberTypes::METHOD),
        (BindingFlags::CREATE_INSTANCE, MemberTypes::CONSTRUCTOR),
        (BindingFlags::GET_FIELD, MemberTypes::FIELD),
        (BindingFlags::SET_FIELD, MemberTypes::FIELD),
        (BindingFlags::GET_PROPERTY, MemberTypes::PROPERTY),
        (BindingFlags::SET_PROPERTY, MemberTypes::PROPERTY),
    ] {
        if intents.contains(intent) {
            member_types = member_types | kind;
        }
    }

    let visibility = flags.difference(BindingFlags::INVOKE_MASK);
    let mut invoke = options.invoke.clone();
    invoke.member_types = member_types;
    invoke.binding_flags = if visibility.is_empty() {
        BindingFlags::DEFAULT | intents
    } else {
        flags
    };

    if intents == BindingFlags::CREATE_INSTANCE {
        let mut create_options = options.clone();
        create_options.invoke = invoke;
        return create(interp, target, args, &create_options);
    }
    invoke_with(interp, target, member, args, options, &mut invoke)
}

// ============================================================================
// Handle lifecycle
// ============================================================================

/// Snapshot of an object handle
pub fn get(interp: &Interpreter, name: &str) -> EngineResult<HandleInfo> {
    let info = interp.handles().info(name)?;
    if info.kind != HandleKind::Object {
        return Err(EngineError::WrongHandleKind {
            name: name.to_string(),
            expected: HandleKind::Object,
            actual: info.kind,
        });
    }
    Ok(info)
}

/// Host object behind a handle, for embedders
pub fn object_ref(interp: &Interpreter, name: &str) -> EngineResult<ObjectRef> {
    interp.handles().object(name)
}

/// Add a reference to an object handle; returns the new count
pub fn add_ref(interp: &Interpreter, name: &str) -> EngineResult<usize> {
    get(interp, name)?;
    interp
        .handles()
        .add_ref(name, LookupMode::Demand)?
        .ok_or_else(|| EngineError::HandleNotFound { name: name.to_string() })
}

/// Drop a reference from an object handle; returns the new count
pub fn remove_ref(interp: &Interpreter, name: &str) -> EngineResult<usize> {
    get(interp, name)?;
    interp
        .handles()
        .remove_ref(name, LookupMode::Demand)?
        .ok_or_else(|| EngineError::HandleNotFound { name: name.to_string() })
}

/// Remove an object handle; returns whether the object was disposed.
///
/// Module and call binding handles go through their own operations.
pub fn dispose(
    interp: &Interpreter,
    name: &str,
    force_dispose: Option<bool>,
) -> EngineResult<bool> {
    get(interp, name)?;
    interp.handles().dispose(name, force_dispose)
}

/// Release the reference held by every temporary result handle; returns
/// how many were released
pub fn remove_temporary_references(interp: &Interpreter) -> usize {
    interp.handles().remove_temporary_references()
}

/// Dispose handles queued by auto-dispose
pub fn flush_pending(interp: &Interpreter) -> CleanupReport {
    interp.handles().flush_pending()
}

/// Remove handles in bulk
pub fn cleanup(interp: &Interpreter, request: &CleanupRequest) -> EngineResult<CleanupReport> {
    interp.handles().cleanup(request)
}

/// Whether a handle or alias exists
pub fn exists(interp: &Interpreter, name: &str) -> bool {
    interp.handles().exists(name)
}

/// Object handles matching a glob pattern, in creation order
pub fn list(interp: &Interpreter, pattern: Option<&str>) -> EngineResult<Vec<String>> {
    interp.handles().list(pattern, Some(HandleKind::Object))
}

/// Give an object handle an alias
pub fn alias(interp: &Interpreter, name: &str, alias: &str) -> EngineResult<String> {
    get(interp, name)?;
    interp.handles().alias(name, alias)
}
