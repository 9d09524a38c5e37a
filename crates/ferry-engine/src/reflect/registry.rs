//! Registered host types and name resolution

use std::sync::Arc;

use ferry_sdk::{
    accessor, param, HostObject, Primitive, TypeBuilder, TypeDescriptor, TypeKind, Value,
    OBJECT_TYPE, STRING_TYPE, VOID_TYPE,
};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{EngineError, EngineResult};

/// Inheritance walks stop after this many steps (guards against cycles)
const MAX_HIERARCHY_DEPTH: usize = 64;

/// Descriptors available in every registry
static BUILTIN_TYPES: Lazy<Vec<Arc<TypeDescriptor>>> = Lazy::new(|| {
    let mut types = Vec::with_capacity(Primitive::ALL.len() + 3);

    let mut object = TypeBuilder::class(OBJECT_TYPE)
        .method("ToString", vec![], STRING_TYPE, |target, _| {
            Ok(match target {
                Some(obj) => Value::String(obj.describe()),
                None => Value::Null,
            })
        })
        .method(
            "Equals",
            vec![param("other", OBJECT_TYPE)],
            Primitive::Bool.type_name(),
            |target, args| {
                let same = match (target, &args[0]) {
                    (Some(a), Value::Object(b)) => Arc::ptr_eq(a, b),
                    _ => false,
                };
                Ok(Value::Bool(same))
            },
        )
        .property(
            "TypeName",
            STRING_TYPE,
            Some(accessor(|target, _| {
                Ok(match target {
                    Some(obj) => Value::String(obj.type_name().to_string()),
                    None => Value::Null,
                })
            })),
            None,
        )
        .build();
    object.kind = TypeKind::Object;
    object.base = None;
    types.push(Arc::new(object));

    types.push(Arc::new(TypeDescriptor::new(STRING_TYPE, TypeKind::String)));
    types.push(Arc::new(TypeDescriptor::new(VOID_TYPE, TypeKind::Void)));
    for primitive in Primitive::ALL {
        types.push(Arc::new(TypeDescriptor::new(
            primitive.type_name(),
            TypeKind::Primitive(primitive),
        )));
    }
    types
});

/// Keyword aliases for the built-in types
fn builtin_alias(name: &str) -> Option<&'static str> {
    match name {
        "object" => Some(OBJECT_TYPE),
        "string" => Some(STRING_TYPE),
        "void" => Some(VOID_TYPE),
        _ => Primitive::ALL
            .iter()
            .find(|p| p.keyword() == name)
            .map(|p| p.type_name()),
    }
}

/// How a type name is resolved
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    /// Only exact names and keyword aliases are accepted
    pub strict: bool,
    /// Names compare case-insensitively during fuzzy resolution
    pub no_case: bool,
    /// When set, the resolved type must be one of these names
    pub allowed: Option<Vec<String>>,
    /// Namespaces prefixed to unqualified names
    pub namespaces: Vec<String>,
}

impl LookupOptions {
    /// Exact matching only
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }
}

/// Registry of host types known to an interpreter
pub struct TypeRegistry {
    types: RwLock<FxHashMap<String, Arc<TypeDescriptor>>>,
    aliases: RwLock<FxHashMap<String, String>>,
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.types.read().len())
            .finish()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a registry holding the built-in types
    pub fn new() -> Self {
        let mut types = FxHashMap::default();
        for ty in BUILTIN_TYPES.iter() {
            types.insert(ty.name.clone(), ty.clone());
        }
        Self {
            types: RwLock::new(types),
            aliases: RwLock::new(FxHashMap::default()),
        }
    }

    /// Register a host type. Fails if the name is taken.
    pub fn register(&self, descriptor: TypeDescriptor) -> EngineResult<Arc<TypeDescriptor>> {
        if descriptor.name.is_empty() {
            return Err(EngineError::invalid("type name cannot be empty"));
        }
        let mut types = self.types.write();
        if types.contains_key(&descriptor.name) {
            return Err(EngineError::invalid(format!(
                "type \"{}\" is already registered",
                descriptor.name
            )));
        }
        let name = descriptor.name.clone();
        let ty = Arc::new(descriptor);
        types.insert(name.clone(), ty.clone());
        log::debug!(target: "ferry::reflect", "registered type {}", name);
        Ok(ty)
    }

    /// Register a host type, replacing any existing one with the same name
    pub fn register_or_replace(&self, descriptor: TypeDescriptor) -> Arc<TypeDescriptor> {
        let ty = Arc::new(descriptor);
        self.types.write().insert(ty.name.clone(), ty.clone());
        ty
    }

    /// Map a short alias to a full type name
    pub fn add_alias(&self, alias: &str, full_name: &str) {
        self.aliases
            .write()
            .insert(alias.to_string(), full_name.to_string());
    }

    /// Exact lookup
    pub fn get(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.types.read().get(name).cloned()
    }

    /// Whether a type with exactly this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.types.read().contains_key(name)
    }

    /// Names of all registered types, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve a type name.
    ///
    /// Resolution order: exact name, alias, then (unless strict) case-insensitive
    /// name, namespace-qualified name and unique short name. Array names
    /// (`T[]`) resolve to an array descriptor of the resolved element type.
    pub fn lookup(&self, name: &str, options: &LookupOptions) -> EngineResult<Arc<TypeDescriptor>> {
        let mut errors = Vec::new();
        let found = self.lookup_inner(name, options, &mut errors);
        match found {
            Some(ty) => {
                if let Some(allowed) = &options.allowed {
                    if !allowed.iter().any(|a| a == &ty.name) {
                        errors.push(format!(
                            "type \"{}\" is not in the allowed type list",
                            ty.name
                        ));
                        return Err(EngineError::TypeNotFound {
                            name: name.to_string(),
                            errors,
                        });
                    }
                }
                Ok(ty)
            }
            None => Err(EngineError::TypeNotFound {
                name: name.to_string(),
                errors,
            }),
        }
    }

    fn lookup_inner(
        &self,
        name: &str,
        options: &LookupOptions,
        errors: &mut Vec<String>,
    ) -> Option<Arc<TypeDescriptor>> {
        let name = name.trim();
        if name.is_empty() {
            errors.push("empty type name".to_string());
            return None;
        }

        if let Some(element) = name.strip_suffix("[]") {
            let element = self.lookup_inner(element, options, errors)?;
            return Some(Arc::new(array_type(&element.name)));
        }

        if let Some(ty) = self.get(name) {
            return Some(ty);
        }
        errors.push(format!("no type named \"{}\"", name));

        let alias = self
            .aliases
            .read()
            .get(name)
            .cloned()
            .or_else(|| builtin_alias(name).map(str::to_string));
        if let Some(full) = alias {
            if let Some(ty) = self.get(&full) {
                return Some(ty);
            }
            errors.push(format!("alias \"{}\" refers to missing type \"{}\"", name, full));
        }

        if options.strict {
            errors.push("strict type matching is enabled".to_string());
            return None;
        }

        let types = self.types.read();

        if options.no_case {
            if let Some(ty) = types.values().find(|t| t.name.eq_ignore_ascii_case(name)) {
                return Some(ty.clone());
            }
            errors.push(format!("no type named \"{}\" ignoring case", name));
        }

        for namespace in &options.namespaces {
            let qualified = format!("{}.{}", namespace, name);
            let hit = if options.no_case {
                types
                    .values()
                    .find(|t| t.name.eq_ignore_ascii_case(&qualified))
                    .cloned()
            } else {
                types.get(&qualified).cloned()
            };
            if let Some(ty) = hit {
                return Some(ty);
            }
            errors.push(format!("no type named \"{}\"", qualified));
        }

        let mut short: Vec<&Arc<TypeDescriptor>> = types
            .values()
            .filter(|t| {
                if options.no_case {
                    t.short_name().eq_ignore_ascii_case(name)
                } else {
                    t.short_name() == name
                }
            })
            .collect();
        match short.len() {
            0 => {
                errors.push(format!("no type with short name \"{}\"", name));
                None
            }
            1 => short.pop().cloned(),
            _ => {
                let mut names: Vec<&str> = short.iter().map(|t| t.name.as_str()).collect();
                names.sort_unstable();
                errors.push(format!(
                    "short name \"{}\" is ambiguous: {}",
                    name,
                    names.join(", ")
                ));
                None
            }
        }
    }

    /// Whether a value of type `from` may be passed where `to` is expected
    pub fn is_assignable(&self, from: &str, to: &str) -> bool {
        if from == to || to == OBJECT_TYPE {
            return true;
        }
        let mut pending = vec![from.to_string()];
        let mut steps = 0;
        while let Some(current) = pending.pop() {
            steps += 1;
            if steps > MAX_HIERARCHY_DEPTH {
                break;
            }
            let Some(ty) = self.get(&current) else {
                continue;
            };
            if let Some(base) = &ty.base {
                if base == to {
                    return true;
                }
                pending.push(base.clone());
            }
            for interface in &ty.interfaces {
                if interface == to {
                    return true;
                }
                pending.push(interface.clone());
            }
        }
        false
    }

    /// The type followed by its base types, up to the root
    pub fn hierarchy(&self, ty: &Arc<TypeDescriptor>) -> Vec<Arc<TypeDescriptor>> {
        let mut chain = vec![ty.clone()];
        let mut current = ty.base.clone();
        while let Some(name) = current {
            if chain.len() >= MAX_HIERARCHY_DEPTH {
                break;
            }
            match self.get(&name) {
                Some(base) => {
                    current = base.base.clone();
                    chain.push(base);
                }
                None => break,
            }
        }
        chain
    }

    /// Type of a host object, resolved strictly
    pub fn type_of(&self, object: &dyn HostObject) -> EngineResult<Arc<TypeDescriptor>> {
        let name = object.type_name();
        if let Some(element) = name.strip_suffix("[]") {
            return Ok(Arc::new(array_type(element)));
        }
        self.lookup(name, &LookupOptions::strict())
    }
}

/// Descriptor of an array of the named element type
pub fn array_type(element: &str) -> TypeDescriptor {
    let mut ty =
        TypeDescriptor::new(format!("{}[]", element), TypeKind::Array(element.to_string()));
    ty.base = Some(OBJECT_TYPE.to_string());
    ty
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry
            .register(TypeBuilder::class("Demo.Shapes.Shape").build())
            .unwrap();
        registry
            .register(
                TypeBuilder::class("Demo.Shapes.Circle")
                    .base("Demo.Shapes.Shape")
                    .interface("Demo.IDrawable")
                    .build(),
            )
            .unwrap();
        registry
            .register(TypeBuilder::class("Other.Circle").build())
            .unwrap();
        registry
    }

    #[test]
    fn test_builtins_present() {
        let registry = TypeRegistry::new();
        assert!(registry.contains("System.Int32"));
        assert!(registry.contains(OBJECT_TYPE));
        let ty = registry.lookup("int", &LookupOptions::strict()).unwrap();
        assert_eq!(ty.name, "System.Int32");
    }

    #[test]
    fn test_register_duplicate() {
        let registry = registry();
        let err = registry
            .register(TypeBuilder::class("Demo.Shapes.Shape").build())
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn test_strict_lookup() {
        let registry = registry();
        assert!(registry
            .lookup("Demo.Shapes.Shape", &LookupOptions::strict())
            .is_ok());
        let err = registry.lookup("Shape", &LookupOptions::strict()).unwrap_err();
        match err {
            EngineError::TypeNotFound { errors, .. } => {
                assert!(errors.iter().any(|e| e.contains("strict")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fuzzy_lookup() {
        let registry = registry();
        let options = LookupOptions::default();
        assert_eq!(registry.lookup("Shape", &options).unwrap().name, "Demo.Shapes.Shape");
        assert_eq!(registry.lookup("Int32", &LookupOptions {
            namespaces: vec!["System".into()],
            ..LookupOptions::default()
        }).unwrap().name, "System.Int32");

        let no_case = LookupOptions {
            no_case: true,
            ..LookupOptions::default()
        };
        assert_eq!(
            registry.lookup("demo.shapes.shape", &no_case).unwrap().name,
            "Demo.Shapes.Shape"
        );
        assert!(registry.lookup("demo.shapes.shape", &options).is_err());
    }

    #[test]
    fn test_ambiguous_short_name() {
        let registry = registry();
        let err = registry.lookup("Circle", &LookupOptions::default()).unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_allow_list() {
        let registry = registry();
        let options = LookupOptions {
            allowed: Some(vec!["Demo.Shapes.Circle".into()]),
            ..LookupOptions::default()
        };
        assert!(registry.lookup("Demo.Shapes.Circle", &options).is_ok());
        let err = registry.lookup("Demo.Shapes.Shape", &options).unwrap_err();
        assert!(err.to_string().contains("allowed type list"));
    }

    #[test]
    fn test_array_lookup() {
        let registry = registry();
        let ty = registry.lookup("int[]", &LookupOptions::default()).unwrap();
        assert_eq!(ty.name, "System.Int32[]");
        assert_eq!(ty.kind, TypeKind::Array("System.Int32".into()));
    }

    #[test]
    fn test_assignability() {
        let registry = registry();
        assert!(registry.is_assignable("Demo.Shapes.Circle", "Demo.Shapes.Shape"));
        assert!(registry.is_assignable("Demo.Shapes.Circle", "Demo.IDrawable"));
        assert!(registry.is_assignable("Demo.Shapes.Circle", OBJECT_TYPE));
        assert!(!registry.is_assignable("Demo.Shapes.Shape", "Demo.Shapes.Circle"));
        assert!(!registry.is_assignable("Other.Circle", "Demo.Shapes.Shape"));
    }

    #[test]
    fn test_hierarchy() {
        let registry = registry();
        let circle = registry.get("Demo.Shapes.Circle").unwrap();
        let names: Vec<String> = registry
            .hierarchy(&circle)
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["Demo.Shapes.Circle", "Demo.Shapes.Shape", OBJECT_TYPE]);
    }
}
