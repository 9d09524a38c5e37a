//! Host type and member descriptors
//!
//! Embedders describe the host types they expose with these descriptors
//! (usually through [`crate::TypeBuilder`]). Type references inside members
//! are full type names; the engine resolves them against its type registry
//! when marshaling, so descriptors may refer to types registered later.

use std::fmt;
use std::sync::Arc;

use crate::error::HostResult;
use crate::value::{ObjectRef, Value};

/// Full name of the root object type
pub const OBJECT_TYPE: &str = "System.Object";
/// Full name of the string type
pub const STRING_TYPE: &str = "System.String";
/// Full name of the void type
pub const VOID_TYPE: &str = "System.Void";
/// Member name used for constructors
pub const CONSTRUCTOR_NAME: &str = ".ctor";

// ============================================================================
// Primitives
// ============================================================================

/// Primitive host types with an inline value representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// System.Boolean
    Bool,
    /// System.Char
    Char,
    /// System.SByte
    I8,
    /// System.Byte
    U8,
    /// System.Int16
    I16,
    /// System.UInt16
    U16,
    /// System.Int32
    I32,
    /// System.UInt32
    U32,
    /// System.Int64
    I64,
    /// System.UInt64
    U64,
    /// System.IntPtr
    ISize,
    /// System.UIntPtr
    USize,
    /// System.Single
    F32,
    /// System.Double
    F64,
}

impl Primitive {
    /// Every primitive, in declaration order
    pub const ALL: [Primitive; 14] = [
        Primitive::Bool,
        Primitive::Char,
        Primitive::I8,
        Primitive::U8,
        Primitive::I16,
        Primitive::U16,
        Primitive::I32,
        Primitive::U32,
        Primitive::I64,
        Primitive::U64,
        Primitive::ISize,
        Primitive::USize,
        Primitive::F32,
        Primitive::F64,
    ];

    /// Full host type name
    pub const fn type_name(&self) -> &'static str {
        match self {
            Primitive::Bool => "System.Boolean",
            Primitive::Char => "System.Char",
            Primitive::I8 => "System.SByte",
            Primitive::U8 => "System.Byte",
            Primitive::I16 => "System.Int16",
            Primitive::U16 => "System.UInt16",
            Primitive::I32 => "System.Int32",
            Primitive::U32 => "System.UInt32",
            Primitive::I64 => "System.Int64",
            Primitive::U64 => "System.UInt64",
            Primitive::ISize => "System.IntPtr",
            Primitive::USize => "System.UIntPtr",
            Primitive::F32 => "System.Single",
            Primitive::F64 => "System.Double",
        }
    }

    /// Short keyword alias (`int`, `double`, ...)
    pub const fn keyword(&self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::I8 => "sbyte",
            Primitive::U8 => "byte",
            Primitive::I16 => "short",
            Primitive::U16 => "ushort",
            Primitive::I32 => "int",
            Primitive::U32 => "uint",
            Primitive::I64 => "long",
            Primitive::U64 => "ulong",
            Primitive::ISize => "intptr",
            Primitive::USize => "uintptr",
            Primitive::F32 => "float",
            Primitive::F64 => "double",
        }
    }

    /// Whether this is an integer type
    pub const fn is_integer(&self) -> bool {
        !matches!(
            self,
            Primitive::Bool | Primitive::Char | Primitive::F32 | Primitive::F64
        )
    }

    /// Whether this is a floating point type
    pub const fn is_float(&self) -> bool {
        matches!(self, Primitive::F32 | Primitive::F64)
    }

    /// Whether this is a numeric type
    pub const fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Width in bits
    pub const fn bits(&self) -> u32 {
        match self {
            Primitive::Bool | Primitive::I8 | Primitive::U8 => 8,
            Primitive::Char | Primitive::I16 | Primitive::U16 => 16,
            Primitive::I32 | Primitive::U32 | Primitive::F32 => 32,
            Primitive::I64 | Primitive::U64 | Primitive::F64 => 64,
            Primitive::ISize | Primitive::USize => usize::BITS,
        }
    }

    /// Inclusive integer range (`None` for non-integers)
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        let range = match self {
            Primitive::I8 => (i8::MIN as i128, i8::MAX as i128),
            Primitive::U8 => (0, u8::MAX as i128),
            Primitive::I16 => (i16::MIN as i128, i16::MAX as i128),
            Primitive::U16 => (0, u16::MAX as i128),
            Primitive::I32 => (i32::MIN as i128, i32::MAX as i128),
            Primitive::U32 => (0, u32::MAX as i128),
            Primitive::I64 => (i64::MIN as i128, i64::MAX as i128),
            Primitive::U64 => (0, u64::MAX as i128),
            Primitive::ISize => (isize::MIN as i128, isize::MAX as i128),
            Primitive::USize => (0, usize::MAX as i128),
            _ => return None,
        };
        Some(range)
    }

    /// Find a primitive by full type name
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.type_name() == name)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

// ============================================================================
// Types
// ============================================================================

/// Named values of an enum type
#[derive(Debug, Clone, PartialEq)]
pub struct EnumInfo {
    /// Whether values combine as bit flags
    pub flags: bool,
    /// Declared names and their values, in declaration order
    pub values: Vec<(String, i64)>,
}

impl EnumInfo {
    /// Look up a declared name
    pub fn value_of(&self, name: &str, ignore_case: bool) -> Option<i64> {
        self.values
            .iter()
            .find(|(n, _)| {
                if ignore_case {
                    n.eq_ignore_ascii_case(name)
                } else {
                    n == name
                }
            })
            .map(|(_, v)| *v)
    }

    /// Render bits as names (space separated for flag combinations)
    pub fn render(&self, bits: i64) -> String {
        if let Some((name, _)) = self.values.iter().find(|(_, v)| *v == bits) {
            return name.clone();
        }
        if self.flags {
            let mut remaining = bits;
            let mut names = Vec::new();
            for (name, value) in &self.values {
                if *value != 0 && remaining & value == *value {
                    names.push(name.as_str());
                    remaining &= !value;
                }
            }
            if remaining == 0 && !names.is_empty() {
                return names.join(" ");
            }
        }
        bits.to_string()
    }
}

/// Shape of a host type
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// No value (method return only)
    Void,
    /// Inline primitive
    Primitive(Primitive),
    /// String
    String,
    /// Root object type; accepts any value
    Object,
    /// Enumeration
    Enum(EnumInfo),
    /// Reference type
    Class,
    /// Value type (never null)
    Struct,
    /// Array of the named element type
    Array(String),
}

impl TypeKind {
    /// Whether null is an acceptable value of this kind
    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            TypeKind::String | TypeKind::Object | TypeKind::Class | TypeKind::Array(_)
        )
    }

    /// Whether values of this kind are represented inline rather than as objects
    pub fn is_value_like(&self) -> bool {
        matches!(
            self,
            TypeKind::Primitive(_) | TypeKind::String | TypeKind::Enum(_) | TypeKind::Struct
        )
    }
}

/// Description of a registered host type
#[derive(Clone)]
pub struct TypeDescriptor {
    /// Full dotted name
    pub name: String,
    /// Shape of the type
    pub kind: TypeKind,
    /// Base type name
    pub base: Option<String>,
    /// Implemented interface names
    pub interfaces: Vec<String>,
    /// Declared members, in declaration order
    pub members: Vec<MemberDescriptor>,
    /// Factory for constructor-less instantiation of value types
    pub default_factory: Option<Invoker>,
}

impl TypeDescriptor {
    /// Create an empty descriptor
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            base: None,
            interfaces: Vec::new(),
            members: Vec::new(),
            default_factory: None,
        }
    }

    /// Last dotted component of the name
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Namespace part of the name (empty when there is none)
    pub fn namespace(&self) -> &str {
        match self.name.rfind('.') {
            Some(idx) => &self.name[..idx],
            None => "",
        }
    }

    /// Whether the type declares any constructor
    pub fn has_constructors(&self) -> bool {
        self.members
            .iter()
            .any(|m| m.kind == MemberKind::Constructor)
    }

    /// Enum information, if this is an enum
    pub fn enum_info(&self) -> Option<&EnumInfo> {
        match &self.kind {
            TypeKind::Enum(info) => Some(info),
            _ => None,
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base", &self.base)
            .field("members", &self.members.len())
            .finish()
    }
}

// ============================================================================
// Members
// ============================================================================

/// Callable implementation of a member.
///
/// Receives the target object (`None` for static members and constructors)
/// and the marshaled argument array. By-reference parameters are written
/// back by mutating their slot in the array.
pub type Invoker = Arc<dyn Fn(Option<&ObjectRef>, &mut [Value]) -> HostResult<Value> + Send + Sync>;

/// Kind of a declared member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Instance constructor
    Constructor,
    /// Method
    Method,
    /// Property (optionally indexed)
    Property,
    /// Field
    Field,
}

impl MemberKind {
    /// Lowercase name used in messages
    pub const fn as_str(&self) -> &'static str {
        match self {
            MemberKind::Constructor => "constructor",
            MemberKind::Method => "method",
            MemberKind::Property => "property",
            MemberKind::Field => "field",
        }
    }
}

/// One formal parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    /// Parameter name
    pub name: String,
    /// Full type name
    pub type_name: String,
    /// Passed by reference; written back after the call
    pub by_ref: bool,
    /// Output only; the incoming value is ignored
    pub is_out: bool,
    /// Value used when the argument is omitted
    pub default: Option<Value>,
}

impl ParameterDescriptor {
    /// By-value parameter
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            by_ref: false,
            is_out: false,
            default: None,
        }
    }

    /// Mark as passed by reference
    pub fn by_ref(mut self) -> Self {
        self.by_ref = true;
        self
    }

    /// Mark as output-only (implies by reference)
    pub fn out(mut self) -> Self {
        self.by_ref = true;
        self.is_out = true;
        self
    }

    /// Give the parameter a default value
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// A declared member of a host type
#[derive(Clone)]
pub struct MemberDescriptor {
    /// Member name (`.ctor` for constructors)
    pub name: String,
    /// Member kind
    pub kind: MemberKind,
    /// Static rather than instance
    pub is_static: bool,
    /// Public rather than non-public
    pub is_public: bool,
    /// Parameters (index parameters for properties)
    pub parameters: Vec<ParameterDescriptor>,
    /// Return type for methods, value type for properties and fields
    pub value_type: String,
    /// Implementation for constructors and methods
    pub invoker: Option<Invoker>,
    /// Read accessor for properties and fields
    pub getter: Option<Invoker>,
    /// Write accessor for properties and fields; the value is the last argument
    pub setter: Option<Invoker>,
}

impl MemberDescriptor {
    /// Human readable signature, e.g. `System.Int32 Add(System.Int32 x)`
    pub fn signature(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| {
                let marker = if p.is_out {
                    "out "
                } else if p.by_ref {
                    "ref "
                } else {
                    ""
                };
                format!("{}{} {}", marker, p.type_name, p.name)
            })
            .collect::<Vec<_>>()
            .join(", ");
        match self.kind {
            MemberKind::Constructor => format!("{}({})", self.name, params),
            MemberKind::Method => format!("{} {}({})", self.value_type, self.name, params),
            MemberKind::Property if !self.parameters.is_empty() => {
                format!("{} {}[{}]", self.value_type, self.name, params)
            }
            MemberKind::Property | MemberKind::Field => {
                format!("{} {}", self.value_type, self.name)
            }
        }
    }
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("is_static", &self.is_static)
            .field("is_public", &self.is_public)
            .field("parameters", &self.parameters)
            .field("value_type", &self.value_type)
            .finish()
    }
}
