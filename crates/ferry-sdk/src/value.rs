//! Host values exchanged with the engine
//!
//! `Value` is the typed, host-level representation of an argument or result.
//! Anything the engine cannot represent inline travels as an [`ObjectRef`],
//! a shared reference to an embedder object implementing [`HostObject`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::HostError;
use crate::types::Primitive;

// ============================================================================
// Host Objects
// ============================================================================

/// Capability interface for opaque host objects.
///
/// The engine only ever sees objects through this trait: it asks for the
/// registered type name (to find members), downcasts through `as_any` when an
/// embedder member needs the concrete type, and calls `dispose` when the last
/// handle to the object is removed.
pub trait HostObject: Send + Sync + 'static {
    /// Full name of the registered host type of this object
    fn type_name(&self) -> &str;

    /// Access to the concrete type for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Tear down the object.
    ///
    /// Returns `Ok(true)` when a teardown actually ran and `Ok(false)` when the
    /// object has nothing to release.
    fn dispose(&self) -> Result<bool, HostError> {
        Ok(false)
    }

    /// Script-visible string form of the object
    fn describe(&self) -> String {
        self.type_name().to_string()
    }
}

/// Shared reference to a host object
pub type ObjectRef = Arc<dyn HostObject>;

/// Downcast a shared host object to its concrete type
pub fn downcast<T: 'static>(object: &ObjectRef) -> Option<&T> {
    object.as_any().downcast_ref::<T>()
}

// ============================================================================
// Numbers
// ============================================================================

/// Numeric value carrying its exact host width
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Signed 8-bit
    I8(i8),
    /// Unsigned 8-bit
    U8(u8),
    /// Signed 16-bit
    I16(i16),
    /// Unsigned 16-bit
    U16(u16),
    /// Signed 32-bit
    I32(i32),
    /// Unsigned 32-bit
    U32(u32),
    /// Signed 64-bit
    I64(i64),
    /// Unsigned 64-bit
    U64(u64),
    /// Pointer-sized signed integer
    ISize(isize),
    /// Pointer-sized unsigned integer
    USize(usize),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
}

impl Number {
    /// The primitive type of this number
    pub fn primitive(&self) -> Primitive {
        match self {
            Number::I8(_) => Primitive::I8,
            Number::U8(_) => Primitive::U8,
            Number::I16(_) => Primitive::I16,
            Number::U16(_) => Primitive::U16,
            Number::I32(_) => Primitive::I32,
            Number::U32(_) => Primitive::U32,
            Number::I64(_) => Primitive::I64,
            Number::U64(_) => Primitive::U64,
            Number::ISize(_) => Primitive::ISize,
            Number::USize(_) => Primitive::USize,
            Number::F32(_) => Primitive::F32,
            Number::F64(_) => Primitive::F64,
        }
    }

    /// Integer view of the number (`None` for floats)
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Number::I8(v) => Some(v as i128),
            Number::U8(v) => Some(v as i128),
            Number::I16(v) => Some(v as i128),
            Number::U16(v) => Some(v as i128),
            Number::I32(v) => Some(v as i128),
            Number::U32(v) => Some(v as i128),
            Number::I64(v) => Some(v as i128),
            Number::U64(v) => Some(v as i128),
            Number::ISize(v) => Some(v as i128),
            Number::USize(v) => Some(v as i128),
            Number::F32(_) | Number::F64(_) => None,
        }
    }

    /// Floating point view of the number
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::F32(v) => v as f64,
            Number::F64(v) => v,
            _ => self.as_i128().unwrap_or_default() as f64,
        }
    }

    /// Whether this is a floating point number
    pub fn is_float(&self) -> bool {
        matches!(self, Number::F32(_) | Number::F64(_))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::I8(v) => write!(f, "{}", v),
            Number::U8(v) => write!(f, "{}", v),
            Number::I16(v) => write!(f, "{}", v),
            Number::U16(v) => write!(f, "{}", v),
            Number::I32(v) => write!(f, "{}", v),
            Number::U32(v) => write!(f, "{}", v),
            Number::I64(v) => write!(f, "{}", v),
            Number::U64(v) => write!(f, "{}", v),
            Number::ISize(v) => write!(f, "{}", v),
            Number::USize(v) => write!(f, "{}", v),
            Number::F32(v) => write!(f, "{}", v),
            Number::F64(v) => write!(f, "{}", v),
        }
    }
}

// ============================================================================
// Value
// ============================================================================

/// Host-level value passed to and returned from members
#[derive(Clone, Default)]
pub enum Value {
    /// Null reference / no value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Single character
    Char(char),
    /// Number with exact width
    Number(Number),
    /// String
    String(String),
    /// Enum value: owning type name plus raw bits
    Enum {
        /// Full name of the enum type
        type_name: String,
        /// Raw underlying value
        bits: i64,
    },
    /// Homogeneous array (element type is implied by the parameter or member)
    Array(Vec<Value>),
    /// Opaque host object
    Object(ObjectRef),
}

impl Value {
    /// Whether this is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the host object, if any
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Borrow the string, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short description of the value's variant, used in diagnostics
    pub fn variant_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Enum { .. } => "enum",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Char(c) => write!(f, "Char({:?})", c),
            Value::Number(n) => write!(f, "Number({:?})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Enum { type_name, bits } => write!(f, "Enum({}, {})", type_name, bits),
            Value::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Value::Object(obj) => write!(f, "Object({})", obj.type_name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (
                Value::Enum {
                    type_name: ta,
                    bits: a,
                },
                Value::Enum {
                    type_name: tb,
                    bits: b,
                },
            ) => ta == tb && a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}
