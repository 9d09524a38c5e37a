//! Shared fixtures for the engine integration tests

#![allow(dead_code)]

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use ferry_engine::{EngineSettings, Interpreter};
use ferry_sdk::{
    accessor, downcast, param, FromValue, HostError, HostObject, IntoValue, Number, ObjectRef,
    ParameterDescriptor, TypeBuilder, Value,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Counter with an explicit teardown
pub struct Counter {
    pub count: AtomicI32,
    pub disposed: AtomicBool,
}

impl Counter {
    pub fn new(start: i32) -> Self {
        Self {
            count: AtomicI32::new(start),
            disposed: AtomicBool::new(false),
        }
    }
}

impl HostObject for Counter {
    fn type_name(&self) -> &str {
        "Demo.Counter"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dispose(&self) -> Result<bool, HostError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Err(HostError::disposed("Demo.Counter"));
        }
        Ok(true)
    }

    fn describe(&self) -> String {
        self.count.load(Ordering::SeqCst).to_string()
    }
}

fn counter(target: Option<&ObjectRef>) -> Result<&Counter, HostError> {
    target
        .and_then(downcast::<Counter>)
        .ok_or_else(|| HostError::invalid_argument("target is not a Demo.Counter"))
}

/// Interpreter with the demo types registered
pub fn interpreter() -> Interpreter {
    interpreter_with(EngineSettings::default())
}

pub fn interpreter_with(settings: EngineSettings) -> Interpreter {
    init_logging();
    let interp = Interpreter::new(settings);
    let types = interp.types();

    types
        .register(
            TypeBuilder::class("Demo.Counter")
                .constructor(vec![], |_, _| {
                    let obj: ObjectRef = Arc::new(Counter::new(0));
                    Ok(Value::Object(obj))
                })
                .constructor(vec![param("start", "System.Int32")], |_, args| {
                    let obj: ObjectRef = Arc::new(Counter::new(i32::from_value(&args[0])?));
                    Ok(Value::Object(obj))
                })
                .method("Add", vec![param("n", "System.Int32")], "System.Int32", |target, args| {
                    let n = i32::from_value(&args[0])?;
                    Ok((counter(target)?.count.fetch_add(n, Ordering::SeqCst) + n).into_value())
                })
                .method(
                    "Split",
                    vec![ParameterDescriptor::new("half", "System.Int32").out()],
                    "System.Int32",
                    |target, args| {
                        let count = counter(target)?.count.load(Ordering::SeqCst);
                        args[0] = Value::Number(Number::I32(count / 2));
                        Ok((count - count / 2).into_value())
                    },
                )
                .property(
                    "Count",
                    "System.Int32",
                    Some(accessor(|target, _| {
                        Ok(counter(target)?.count.load(Ordering::SeqCst).into_value())
                    })),
                    Some(accessor(|target, args| {
                        let value = i32::from_value(&args[0])?;
                        counter(target)?.count.store(value, Ordering::SeqCst);
                        Ok(Value::Null)
                    })),
                )
                .action("Dispose", vec![], |target, _| {
                    counter(target)?.dispose()?;
                    Ok(Value::Null)
                })
                .build(),
        )
        .unwrap();

    types
        .register(
            TypeBuilder::class("Demo.Overloads")
                .static_method("F", vec![param("x", "System.Int32")], "System.String", |_, _| {
                    Ok("int".into_value())
                })
                .static_method("F", vec![param("x", "System.String")], "System.String", |_, _| {
                    Ok("string".into_value())
                })
                .static_method("Fail", vec![], "System.Void", |_, _| {
                    Err(HostError::failure("refused").with_code(7))
                })
                .build(),
        )
        .unwrap();

    types
        .register(
            TypeBuilder::class("Demo.Broken")
                .constructor(vec![], |_, _| Err(HostError::failure("constructor failed")))
                .build(),
        )
        .unwrap();

    types
        .register(
            TypeBuilder::enumeration("Demo.Color", false, &[("Red", 1), ("Green", 2), ("Blue", 4)])
                .build(),
        )
        .unwrap();

    interp
}

pub fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}
