//! Integration tests for native modules and call bindings
//!
//! These load the C runtime, so they only run on Linux.

#![cfg(target_os = "linux")]

mod common;

use common::{args, interpreter};
use ferry_engine::format::format_pairs;
use ferry_engine::invoke::InvokeOptions;
use ferry_engine::native::{CallingConvention, NativeParameter, NativeType};
use ferry_engine::ops::{library, object, DeclareOptions, LoadOptions, ResolveOptions};
use ferry_engine::{EngineError, HandleKind, Interpreter, VariableStore};

const LIBC: &str = "libc.so.6";

fn params(types: &[&str]) -> Vec<NativeParameter> {
    types.iter().map(|t| NativeParameter::parse(t).unwrap()).collect()
}

fn declare_atoi(interp: &Interpreter, module: Option<&str>) -> String {
    let mut options = DeclareOptions::new(NativeType::I32, params(&["string"]));
    options.calling_convention = Some(CallingConvention::Winapi);
    if let Some(module) = module {
        options.module = Some(module.to_string());
        options.symbol = Some("atoi".to_string());
    }
    library::declare(interp, &options).unwrap()
}

fn call(interp: &Interpreter, binding: &str, values: &[&str]) -> Result<String, EngineError> {
    library::call(interp, binding, &args(values), &InvokeOptions::default()).map(|o| o.text())
}

#[test]
fn test_atoi_end_to_end() {
    let interp = interpreter();
    let module = library::load(&interp, LIBC, &LoadOptions::default()).unwrap();
    let atoi = declare_atoi(&interp, Some(&module));
    let outcome = library::call(&interp, &atoi, &args(&["42"]), &InvokeOptions::default()).unwrap();
    assert_eq!(outcome.text(), "42");
    assert!(interp.variables().get("42").is_none());
}

#[test]
fn test_declare_with_module_matches_explicit_resolve() {
    let interp = interpreter();
    let module = library::load(&interp, LIBC, &LoadOptions::default()).unwrap();

    let immediate = declare_atoi(&interp, Some(&module));
    let deferred = declare_atoi(&interp, None);
    assert!(matches!(
        call(&interp, &deferred, &["7"]),
        Err(EngineError::UnboundCallBinding { .. })
    ));
    let address = library::resolve(
        &interp,
        &deferred,
        &ResolveOptions {
            module: Some(module.clone()),
            symbol: Some("atoi".to_string()),
        },
    )
    .unwrap();
    assert_ne!(address, 0);

    for input in ["7", "-19", "123abc"] {
        let expected = call(&interp, &immediate, &[input]).unwrap();
        assert_eq!(call(&interp, &deferred, &[input]).unwrap(), expected);
    }
}

#[test]
fn test_declare_rolls_back_on_missing_symbol() {
    let interp = interpreter();
    let module = library::load(&interp, LIBC, &LoadOptions::default()).unwrap();
    let mut options = DeclareOptions::new(NativeType::I32, vec![]);
    options.module = Some(module);
    options.symbol = Some("ferry_no_such_symbol".to_string());
    assert!(matches!(
        library::declare(&interp, &options),
        Err(EngineError::SymbolNotFound { .. })
    ));
    assert!(interp.handles().list(None, Some(HandleKind::CallBinding)).unwrap().is_empty());
}

#[test]
fn test_unresolve_then_call_fails() {
    let interp = interpreter();
    let module = library::load(&interp, LIBC, &LoadOptions::default()).unwrap();
    let atoi = declare_atoi(&interp, Some(&module));

    assert!(library::unresolve(&interp, &atoi).unwrap());
    assert!(!library::unresolve(&interp, &atoi).unwrap());
    assert!(matches!(
        call(&interp, &atoi, &["1"]),
        Err(EngineError::UnboundCallBinding { .. })
    ));

    // Module and symbol are forgotten on unresolve, so they must be given again
    assert!(library::resolve(&interp, &atoi, &ResolveOptions::default()).is_err());
    library::resolve(
        &interp,
        &atoi,
        &ResolveOptions {
            module: Some(module),
            symbol: Some("atoi".to_string()),
        },
    )
    .unwrap();
    assert_eq!(call(&interp, &atoi, &["1"]).unwrap(), "1");
}

#[test]
fn test_checkload_reuses_and_load_duplicates() {
    let interp = interpreter();
    let options = LoadOptions::default();
    let first = library::checkload(&interp, LIBC, &options).unwrap();
    let second = library::checkload(&interp, LIBC, &options).unwrap();
    assert_eq!(first, second);

    let third = library::load(&interp, LIBC, &options).unwrap();
    let fourth = library::load(&interp, LIBC, &options).unwrap();
    assert_ne!(third, fourth);
    assert!(third.starts_with("module#"));
}

#[test]
fn test_locked_module_cannot_unload() {
    let interp = interpreter();
    let locked = library::load(
        &interp,
        LIBC,
        &LoadOptions {
            locked: true,
            ..LoadOptions::default()
        },
    )
    .unwrap();
    assert!(matches!(
        library::unload(&interp, &locked),
        Err(EngineError::ModuleLocked { .. })
    ));
    assert!(interp.handles().exists(&locked));

    let unlocked = library::load(&interp, LIBC, &LoadOptions::default()).unwrap();
    library::unload(&interp, &unlocked).unwrap();
    assert!(!interp.handles().exists(&unlocked));
}

#[test]
fn test_object_ops_reject_module_handles() {
    let interp = interpreter();
    let locked = library::load(
        &interp,
        LIBC,
        &LoadOptions {
            locked: true,
            ..LoadOptions::default()
        },
    )
    .unwrap();
    for result in [
        object::dispose(&interp, &locked, Some(true)).map(|_| ()),
        object::add_ref(&interp, &locked).map(|_| ()),
        object::remove_ref(&interp, &locked).map(|_| ()),
    ] {
        assert!(matches!(
            result,
            Err(EngineError::WrongHandleKind {
                expected: HandleKind::Object,
                actual: HandleKind::Module,
                ..
            })
        ));
    }
    assert!(interp.handles().exists(&locked));
    assert!(library::handle(&interp, LIBC).is_ok());
}

#[test]
fn test_concurrent_checkload_shares_one_handle() {
    let interp = interpreter();
    let checkload = || library::checkload(&interp, LIBC, &LoadOptions::default()).unwrap();
    let names: Vec<String> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8).map(|_| scope.spawn(checkload)).collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });
    assert!(names.iter().all(|n| n == &names[0]));
    let modules = interp.handles().list(None, Some(HandleKind::Module)).unwrap();
    assert_eq!(modules, vec![names[0].clone()]);
}

#[test]
fn test_binding_keeps_module_mapped() {
    let interp = interpreter();
    let module = library::load(&interp, LIBC, &LoadOptions::default()).unwrap();
    let atoi = declare_atoi(&interp, Some(&module));

    library::unload(&interp, &module).unwrap();
    assert_eq!(call(&interp, &atoi, &["5"]).unwrap(), "5");
    library::undeclare(&interp, &atoi).unwrap();
    assert!(!interp.handles().exists(&atoi));
}

#[test]
fn test_by_ref_write_back() {
    let interp = interpreter();
    let module = library::load(&interp, LIBC, &LoadOptions::default()).unwrap();
    let mut options = DeclareOptions::new(NativeType::F64, params(&["double", "int&"]));
    options.module = Some(module);
    options.symbol = Some("frexp".to_string());
    let frexp = library::declare(&interp, &options).unwrap();

    interp.variables().set("exponent", "0").unwrap();
    assert_eq!(call(&interp, &frexp, &["8", "exponent"]).unwrap(), "0.5");
    assert_eq!(interp.variables().get("exponent").as_deref(), Some("4"));

    assert!(matches!(
        call(&interp, &frexp, &["8", "missing"]),
        Err(EngineError::MemberNotFound { .. })
    ));
}

#[test]
fn test_strlen_and_abs() {
    let interp = interpreter();
    let module = library::checkload(&interp, LIBC, &LoadOptions::default()).unwrap();

    let mut options = DeclareOptions::new(NativeType::USize, params(&["string"]));
    options.module = Some(module.clone());
    options.symbol = Some("strlen".to_string());
    let strlen = library::declare(&interp, &options).unwrap();
    assert_eq!(call(&interp, &strlen, &["ferry"]).unwrap(), "5");

    let mut options = DeclareOptions::new(NativeType::I32, params(&["int"]));
    options.module = Some(module);
    options.symbol = Some("abs".to_string());
    let abs = library::declare(&interp, &options).unwrap();
    assert_eq!(call(&interp, &abs, &["-12"]).unwrap(), "12");
    assert!(matches!(
        call(&interp, &abs, &["twelve"]),
        Err(EngineError::MemberNotFound { .. })
    ));
}

#[test]
fn test_read_only_blocks_resolve() {
    let interp = interpreter();
    let module = library::load(&interp, LIBC, &LoadOptions::default()).unwrap();
    let atoi = declare_atoi(&interp, None);

    interp.set_read_only(true);
    let options = ResolveOptions {
        module: Some(module.clone()),
        symbol: Some("atoi".to_string()),
    };
    assert!(matches!(
        library::resolve(&interp, &atoi, &options),
        Err(EngineError::ReadOnlyViolation { .. })
    ));

    interp.set_read_only(false);
    library::resolve(&interp, &atoi, &options).unwrap();
    assert_eq!(call(&interp, &atoi, &["9"]).unwrap(), "9");
}

#[test]
fn test_module_handle_and_info() {
    let interp = interpreter();
    let module = library::load(&interp, LIBC, &LoadOptions::default()).unwrap();
    let atoi = declare_atoi(&interp, Some(&module));

    let raw = library::handle(&interp, LIBC).unwrap();
    assert_ne!(raw, 0);
    assert!(library::handle(&interp, "libferry_missing.so").is_err());

    let info = library::info_module(&interp, &module).unwrap();
    let text = format_pairs(&info);
    assert!(text.contains(&atoi));
    assert!(info.contains(&("referenceCount", "2".to_string())));

    let info = library::info_binding(&interp, &atoi).unwrap();
    assert!(info.contains(&("symbol", "atoi".to_string())));
    assert!(info.contains(&("kind", "call binding".to_string())));
}

#[test]
fn test_check_loadability() {
    let interp = interpreter();
    assert!(library::test(&interp, LIBC, &LoadOptions::default()).is_ok());
    assert!(matches!(
        library::test(&interp, "/nonexistent/libferry.so", &LoadOptions::default()),
        Err(EngineError::ModuleLoadFailed(_))
    ));
    assert!(interp.handles().is_empty());
}
