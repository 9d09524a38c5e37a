//! Fluent construction of host type descriptors
//!
//! ```ignore
//! let counter = TypeBuilder::class("Demo.Counter")
//!     .constructor(vec![], |_, _| Ok(Value::Object(Arc::new(Counter::default()))))
//!     .method("Add", vec![param("n", "System.Int32")], "System.Int32", add)
//!     .property("Count", "System.Int32", Some(count), None)
//!     .build();
//! ```

use std::sync::Arc;

use crate::error::HostResult;
use crate::types::{
    EnumInfo, Invoker, MemberDescriptor, MemberKind, ParameterDescriptor, TypeDescriptor,
    TypeKind, CONSTRUCTOR_NAME, OBJECT_TYPE, VOID_TYPE,
};
use crate::value::{ObjectRef, Value};

/// Shorthand for a by-value parameter
pub fn param(name: &str, type_name: &str) -> ParameterDescriptor {
    ParameterDescriptor::new(name, type_name)
}

fn invoker<F>(f: F) -> Invoker
where
    F: Fn(Option<&ObjectRef>, &mut [Value]) -> HostResult<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Builder for [`TypeDescriptor`]
pub struct TypeBuilder {
    descriptor: TypeDescriptor,
    visibility_public: bool,
}

impl TypeBuilder {
    /// Start a reference type deriving from `System.Object`
    pub fn class(name: &str) -> Self {
        let mut descriptor = TypeDescriptor::new(name, TypeKind::Class);
        descriptor.base = Some(OBJECT_TYPE.to_string());
        Self {
            descriptor,
            visibility_public: true,
        }
    }

    /// Start a value type
    pub fn value_type(name: &str) -> Self {
        Self {
            descriptor: TypeDescriptor::new(name, TypeKind::Struct),
            visibility_public: true,
        }
    }

    /// Start an enum type with the given named values
    pub fn enumeration(name: &str, flags: bool, values: &[(&str, i64)]) -> Self {
        let info = EnumInfo {
            flags,
            values: values
                .iter()
                .map(|(n, v)| (n.to_string(), *v))
                .collect(),
        };
        Self {
            descriptor: TypeDescriptor::new(name, TypeKind::Enum(info)),
            visibility_public: true,
        }
    }

    /// Set the base type
    pub fn base(mut self, base: &str) -> Self {
        self.descriptor.base = Some(base.to_string());
        self
    }

    /// Add an implemented interface
    pub fn interface(mut self, name: &str) -> Self {
        self.descriptor.interfaces.push(name.to_string());
        self
    }

    /// Members added after this call are non-public
    pub fn non_public(mut self) -> Self {
        self.visibility_public = false;
        self
    }

    /// Members added after this call are public (the default)
    pub fn public(mut self) -> Self {
        self.visibility_public = true;
        self
    }

    /// Factory used when a value type is instantiated without a constructor
    pub fn default_factory<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&ObjectRef>, &mut [Value]) -> HostResult<Value> + Send + Sync + 'static,
    {
        self.descriptor.default_factory = Some(invoker(f));
        self
    }

    fn push(
        &mut self,
        name: &str,
        kind: MemberKind,
        is_static: bool,
        parameters: Vec<ParameterDescriptor>,
        value_type: &str,
    ) -> &mut MemberDescriptor {
        self.descriptor.members.push(MemberDescriptor {
            name: name.to_string(),
            kind,
            is_static,
            is_public: self.visibility_public,
            parameters,
            value_type: value_type.to_string(),
            invoker: None,
            getter: None,
            setter: None,
        });
        let last = self.descriptor.members.len() - 1;
        &mut self.descriptor.members[last]
    }

    /// Add a constructor; `f` must return the new object
    pub fn constructor<F>(mut self, parameters: Vec<ParameterDescriptor>, f: F) -> Self
    where
        F: Fn(Option<&ObjectRef>, &mut [Value]) -> HostResult<Value> + Send + Sync + 'static,
    {
        let type_name = self.descriptor.name.clone();
        let member = self.push(
            CONSTRUCTOR_NAME,
            MemberKind::Constructor,
            false,
            parameters,
            &type_name,
        );
        member.invoker = Some(invoker(f));
        self
    }

    /// Add an instance method
    pub fn method<F>(
        mut self,
        name: &str,
        parameters: Vec<ParameterDescriptor>,
        return_type: &str,
        f: F,
    ) -> Self
    where
        F: Fn(Option<&ObjectRef>, &mut [Value]) -> HostResult<Value> + Send + Sync + 'static,
    {
        let member = self.push(name, MemberKind::Method, false, parameters, return_type);
        member.invoker = Some(invoker(f));
        self
    }

    /// Add a static method
    pub fn static_method<F>(
        mut self,
        name: &str,
        parameters: Vec<ParameterDescriptor>,
        return_type: &str,
        f: F,
    ) -> Self
    where
        F: Fn(Option<&ObjectRef>, &mut [Value]) -> HostResult<Value> + Send + Sync + 'static,
    {
        let member = self.push(name, MemberKind::Method, true, parameters, return_type);
        member.invoker = Some(invoker(f));
        self
    }

    /// Add a void instance method
    pub fn action<F>(self, name: &str, parameters: Vec<ParameterDescriptor>, f: F) -> Self
    where
        F: Fn(Option<&ObjectRef>, &mut [Value]) -> HostResult<Value> + Send + Sync + 'static,
    {
        self.method(name, parameters, VOID_TYPE, f)
    }

    /// Add an instance property with optional accessors
    pub fn property(
        mut self,
        name: &str,
        value_type: &str,
        getter: Option<Invoker>,
        setter: Option<Invoker>,
    ) -> Self {
        let member = self.push(name, MemberKind::Property, false, Vec::new(), value_type);
        member.getter = getter;
        member.setter = setter;
        self
    }

    /// Add an indexed instance property
    pub fn indexer(
        mut self,
        name: &str,
        index: Vec<ParameterDescriptor>,
        value_type: &str,
        getter: Option<Invoker>,
        setter: Option<Invoker>,
    ) -> Self {
        let member = self.push(name, MemberKind::Property, false, index, value_type);
        member.getter = getter;
        member.setter = setter;
        self
    }

    /// Add a static property
    pub fn static_property(
        mut self,
        name: &str,
        value_type: &str,
        getter: Option<Invoker>,
        setter: Option<Invoker>,
    ) -> Self {
        let member = self.push(name, MemberKind::Property, true, Vec::new(), value_type);
        member.getter = getter;
        member.setter = setter;
        self
    }

    /// Add an instance field
    pub fn field(
        mut self,
        name: &str,
        value_type: &str,
        getter: Invoker,
        setter: Option<Invoker>,
    ) -> Self {
        let member = self.push(name, MemberKind::Field, false, Vec::new(), value_type);
        member.getter = Some(getter);
        member.setter = setter;
        self
    }

    /// Finish building
    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}

/// Wrap a closure as an accessor
pub fn accessor<F>(f: F) -> Invoker
where
    F: Fn(Option<&ObjectRef>, &mut [Value]) -> HostResult<Value> + Send + Sync + 'static,
{
    invoker(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Primitive;
    use crate::value::Number;

    #[test]
    fn test_build_class() {
        let ty = TypeBuilder::class("Demo.Calc")
            .constructor(vec![], |_, _| Ok(Value::Null))
            .static_method(
                "Twice",
                vec![param("x", Primitive::I32.type_name())],
                Primitive::I32.type_name(),
                |_, args| match &args[0] {
                    Value::Number(Number::I32(v)) => Ok(Value::Number(Number::I32(v * 2))),
                    _ => Err("expected int".into()),
                },
            )
            .non_public()
            .action("Reset", vec![], |_, _| Ok(Value::Null))
            .build();

        assert_eq!(ty.base.as_deref(), Some(OBJECT_TYPE));
        assert_eq!(ty.members.len(), 3);
        assert!(ty.has_constructors());
        assert!(ty.members[1].is_static);
        assert!(!ty.members[2].is_public);
        assert_eq!(
            ty.members[1].signature(),
            "System.Int32 Twice(System.Int32 x)"
        );

        let twice = ty.members[1].invoker.as_ref().unwrap();
        let mut args = vec![Value::Number(Number::I32(21))];
        assert_eq!(
            twice(None, &mut args).unwrap(),
            Value::Number(Number::I32(42))
        );
    }

    #[test]
    fn test_build_enum() {
        let ty = TypeBuilder::enumeration("Demo.Mode", true, &[("A", 1), ("B", 2)]).build();
        let info = ty.enum_info().unwrap();
        assert!(info.flags);
        assert_eq!(info.value_of("B", false), Some(2));
    }
}
