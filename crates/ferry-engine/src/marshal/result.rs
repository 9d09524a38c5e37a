//! Result materialization
//!
//! Results and by-reference values leave the engine either as text or, for
//! objects and arrays, as handles in the registry.

use std::any::Any;
use std::sync::Arc;

use ferry_sdk::{HostObject, ObjectRef, Value, OBJECT_TYPE};
use parking_lot::RwLock;

use crate::error::EngineResult;
use crate::flags::{MarshalFlags, ObjectFlags};
use crate::format::format_list;
use crate::handles::{HandleRegistry, HandleValue, LookupMode};
use crate::reflect::TypeRegistry;

// ============================================================================
// Engine-owned host objects
// ============================================================================

/// A primitive, string or enum value held behind a handle
#[derive(Debug)]
pub struct BoxedValue {
    type_name: String,
    value: Value,
}

impl BoxedValue {
    /// Box `value` as an instance of `type_name`
    pub fn new(type_name: impl Into<String>, value: Value) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }

    /// The boxed value
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl HostObject for BoxedValue {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        plain_text(&self.value)
    }
}

/// An array result kept as a handle
pub struct ArrayObject {
    type_name: String,
    element_type: String,
    items: RwLock<Vec<Value>>,
}

impl ArrayObject {
    /// Wrap `items` as an array of `element_type`
    pub fn new(element_type: impl Into<String>, items: Vec<Value>) -> Self {
        let element_type = element_type.into();
        Self {
            type_name: format!("{}[]", element_type),
            element_type,
            items: RwLock::new(items),
        }
    }

    /// Element type name
    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    /// Snapshot of the elements
    pub fn items(&self) -> Vec<Value> {
        self.items.read().clone()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the array is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ArrayObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayObject")
            .field("type_name", &self.type_name)
            .field("len", &self.len())
            .finish()
    }
}

impl HostObject for ArrayObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        format_list(self.items.read().iter().map(plain_text))
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn plain_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Char(c) => c.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Enum { bits, .. } => bits.to_string(),
        Value::Array(items) => format_list(items.iter().map(plain_text)),
        Value::Object(obj) => obj.describe(),
    }
}

/// Script-visible text of a value; enum bits render as their declared names
pub fn render_value(types: &TypeRegistry, value: &Value) -> String {
    match value {
        Value::Enum { type_name, bits } => types
            .get(type_name)
            .and_then(|ty| ty.enum_info().map(|info| info.render(*bits)))
            .unwrap_or_else(|| bits.to_string()),
        Value::Array(items) => format_list(items.iter().map(|v| render_value(types, v))),
        other => plain_text(other),
    }
}

// ============================================================================
// Materialization
// ============================================================================

/// How a result becomes text or a handle
#[derive(Debug, Clone, Default)]
pub struct MaterializeOptions {
    /// Render objects as text instead of creating handles
    pub to_string: bool,
    /// Flags of newly created handles
    pub object_flags: ObjectFlags,
    /// Explicit name for a newly created handle
    pub object_name: Option<String>,
    /// Alias to register for the handle
    pub alias: Option<String>,
    /// Mark new handles as temporary return references and add a reference
    pub temporary: bool,
}

/// A materialized result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Materialized {
    /// Script-visible text (the handle name for handles)
    pub text: String,
    /// Handle the result lives in
    pub handle: Option<String>,
    /// Alias registered for the handle
    pub alias: Option<String>,
}

impl Materialized {
    fn text(text: String) -> Self {
        Self {
            text,
            handle: None,
            alias: None,
        }
    }
}

/// Turn a value of declared type `type_name` into text or a handle.
///
/// Objects reuse an existing handle for the same instance unless an explicit
/// name is requested. Arrays become [`ArrayObject`] handles unless
/// `ArrayAsValue` is set.
pub fn materialize(
    types: &TypeRegistry,
    handles: &HandleRegistry,
    value: Value,
    type_name: &str,
    flags: MarshalFlags,
    options: &MaterializeOptions,
) -> EngineResult<Materialized> {
    let as_text = options.to_string
        || flags.contains(MarshalFlags::TO_STRING)
        || flags.contains(MarshalFlags::NO_HANDLE);

    let object: ObjectRef = match value {
        Value::Object(obj) if !as_text => obj,
        Value::Array(items) if !as_text && !flags.contains(MarshalFlags::ARRAY_AS_VALUE) => {
            let element = type_name.strip_suffix("[]").unwrap_or(OBJECT_TYPE);
            Arc::new(ArrayObject::new(element, items))
        }
        other => return Ok(Materialized::text(render_value(types, &other))),
    };

    let existing = match options.object_name {
        None => handles.find_object(&object),
        Some(_) => None,
    };
    let (name, created) = match existing {
        Some(name) => (name, false),
        None => {
            let mut object_flags = options.object_flags;
            if options.temporary {
                object_flags = object_flags | ObjectFlags::TEMPORARY_RETURN_REFERENCE;
            }
            let name = handles.create(
                HandleValue::Object(object),
                object_flags,
                options.object_name.as_deref(),
            )?;
            if options.temporary {
                handles.add_ref(&name, LookupMode::Demand)?;
            }
            (name, true)
        }
    };

    let alias = match &options.alias {
        Some(alias) => match handles.alias(&name, alias) {
            Ok(alias) => Some(alias),
            Err(e) => {
                if created {
                    if let Err(forget) = handles.forget(&name) {
                        log::warn!(
                            target: "ferry::handles",
                            "rollback of {} failed: {}",
                            name,
                            forget
                        );
                    }
                }
                return Err(e);
            }
        },
        None => None,
    };

    log::debug!(target: "ferry::marshal", "materialized {} as {}", type_name, name);
    Ok(Materialized {
        text: name.clone(),
        handle: Some(name),
        alias,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_sdk::{Number, TypeBuilder};

    struct Widget;

    impl HostObject for Widget {
        fn type_name(&self) -> &str {
            "Demo.Widget"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn describe(&self) -> String {
            "widget".to_string()
        }
    }

    #[test]
    fn test_render_scalars_and_enums() {
        let types = TypeRegistry::new();
        types
            .register(
                TypeBuilder::enumeration("Demo.Access", true, &[("Read", 1), ("Write", 2)]).build(),
            )
            .unwrap();
        assert_eq!(render_value(&types, &Value::Null), "");
        assert_eq!(render_value(&types, &Value::Bool(true)), "true");
        assert_eq!(render_value(&types, &Value::Number(Number::I32(-7))), "-7");
        let access = Value::Enum {
            type_name: "Demo.Access".into(),
            bits: 3,
        };
        assert_eq!(render_value(&types, &access), "Read Write");
        let list = Value::Array(vec![Value::String("a b".into()), Value::String("c".into())]);
        assert_eq!(render_value(&types, &list), "{a b} c");
    }

    #[test]
    fn test_objects_become_handles_once() {
        let types = TypeRegistry::new();
        let handles = HandleRegistry::default();
        let obj: ObjectRef = Arc::new(Widget);
        let options = MaterializeOptions::default();
        let widget = |obj: ObjectRef, flags| {
            materialize(&types, &handles, Value::Object(obj), "Demo.Widget", flags, &options)
        };

        let first = widget(obj.clone(), MarshalFlags::NONE).unwrap();
        let second = widget(obj.clone(), MarshalFlags::NONE).unwrap();
        assert_eq!(first.handle, second.handle);
        assert_eq!(handles.len(), 1);

        let text = widget(obj, MarshalFlags::TO_STRING).unwrap();
        assert_eq!(text.text, "widget");
        assert!(text.handle.is_none());
    }

    #[test]
    fn test_arrays_follow_policy() {
        let types = TypeRegistry::new();
        let handles = HandleRegistry::default();
        let items = vec![Value::Number(Number::I32(1)), Value::Number(Number::I32(2))];
        let options = MaterializeOptions::default();

        let as_value = materialize(
            &types,
            &handles,
            Value::Array(items.clone()),
            "System.Int32[]",
            MarshalFlags::ARRAY_AS_VALUE,
            &options,
        )
        .unwrap();
        assert_eq!(as_value.text, "1 2");

        let as_handle = materialize(
            &types,
            &handles,
            Value::Array(items),
            "System.Int32[]",
            MarshalFlags::NONE,
            &options,
        )
        .unwrap();
        let name = as_handle.handle.unwrap();
        assert!(name.starts_with("System#Int32[]#"));
        let obj = handles.object(&name).unwrap();
        assert_eq!(ferry_sdk::downcast::<ArrayObject>(&obj).unwrap().len(), 2);
    }

    #[test]
    fn test_temporary_and_alias_rollback() {
        let types = TypeRegistry::new();
        let handles = HandleRegistry::default();
        let options = MaterializeOptions {
            temporary: true,
            alias: Some("w".into()),
            ..MaterializeOptions::default()
        };
        let widget = || {
            let obj: ObjectRef = Arc::new(Widget);
            let flags = MarshalFlags::NONE;
            materialize(&types, &handles, Value::Object(obj), "Demo.Widget", flags, &options)
        };
        let made = widget().unwrap();
        let info = handles.info(&made.text).unwrap();
        assert!(info.flags.contains(ObjectFlags::TEMPORARY_RETURN_REFERENCE));
        assert_eq!(made.alias.as_deref(), Some("w"));

        // alias "w" is taken, so the second handle is rolled back
        assert!(widget().is_err());
        assert_eq!(handles.len(), 1);
    }
}
