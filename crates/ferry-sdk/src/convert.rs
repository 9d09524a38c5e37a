//! Conversions between Rust types and [`Value`]
//!
//! Host member implementations receive already-marshaled values; these
//! traits keep the unpacking in embedder code short.
//!
//! ```ignore
//! let n = i32::from_value(&args[0])?;
//! Ok((n * 2).into_value())
//! ```

use crate::error::{HostError, HostResult};
use crate::value::{Number, ObjectRef, Value};

/// Extract a Rust value from a host value
pub trait FromValue: Sized {
    /// Convert, failing with an invalid-argument error on mismatch
    fn from_value(value: &Value) -> HostResult<Self>;
}

/// Wrap a Rust value as a host value
pub trait IntoValue {
    /// Convert into a `Value`
    fn into_value(self) -> Value;
}

fn mismatch(expected: &str, got: &Value) -> HostError {
    HostError::invalid_argument(format!(
        "type mismatch: expected {}, got {}",
        expected,
        got.variant_name()
    ))
}

macro_rules! number_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> HostResult<Self> {
                    match value {
                        Value::Number(Number::$variant(v)) => Ok(*v),
                        other => Err(mismatch(stringify!($ty), other)),
                    }
                }
            }

            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Number(Number::$variant(self))
                }
            }
        )*
    };
}

number_conversions! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    isize => ISize,
    usize => USize,
    f32 => F32,
    f64 => F64,
}

impl FromValue for bool {
    fn from_value(value: &Value) -> HostResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FromValue for char {
    fn from_value(value: &Value) -> HostResult<Self> {
        match value {
            Value::Char(c) => Ok(*c),
            other => Err(mismatch("char", other)),
        }
    }
}

impl IntoValue for char {
    fn into_value(self) -> Value {
        Value::Char(self)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> HostResult<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl FromValue for ObjectRef {
    fn from_value(value: &Value) -> HostResult<Self> {
        match value {
            Value::Object(obj) => Ok(obj.clone()),
            other => Err(mismatch("object", other)),
        }
    }
}

impl IntoValue for ObjectRef {
    fn into_value(self) -> Value {
        Value::Object(self)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> HostResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> HostResult<Self> {
        match value {
            Value::Array(items) => items.iter().map(T::from_value).collect(),
            other => Err(mismatch("array", other)),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::Array(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Null
    }
}
