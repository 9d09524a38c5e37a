//! Text-to-value coercion for a single parameter

use std::sync::Arc;

use ferry_sdk::{
    downcast, EnumInfo, HostObject, Number, ObjectRef, Primitive, TypeDescriptor, TypeKind, Value,
    OBJECT_TYPE,
};

use super::result::{ArrayObject, BoxedValue};
use super::{MarshalContext, MatchQuality};
use crate::flags::MarshalFlags;
use crate::format::parse_list;
use crate::reflect::{LookupOptions, TypeRegistry};

/// Literal accepted as a null reference for nullable parameters
pub(crate) const NULL_TOKEN: &str = "null";

type Coerced = Result<(Value, MatchQuality), String>;

/// Coerce one raw argument toward `type_name`
pub fn coerce_text(ctx: &MarshalContext<'_>, text: &str, type_name: &str) -> Coerced {
    coerce_with_base(ctx, text, type_name, None)
}

/// Like [`coerce_text`]; relative enum tokens (`+Flag`, `-Flag`) adjust `base`
pub(crate) fn coerce_with_base(
    ctx: &MarshalContext<'_>,
    text: &str,
    type_name: &str,
    base: Option<&Value>,
) -> Coerced {
    let ty = resolve(ctx.types, type_name, ctx.no_case)?;

    let accepts_null = ty.kind.is_nullable() && !ctx.flags.contains(MarshalFlags::NO_NULL);
    if accepts_null && text == NULL_TOKEN {
        return Ok((Value::Null, MatchQuality::Exact));
    }

    let handle = if ctx.flags.contains(MarshalFlags::NO_HANDLE) {
        None
    } else {
        ctx.handles.object(text).ok()
    };
    if let Some(boxed) = handle.as_ref().and_then(downcast::<BoxedValue>) {
        if boxed.type_name() == ty.name {
            return Ok((boxed.value().clone(), MatchQuality::Exact));
        }
    }

    match &ty.kind {
        TypeKind::Void => Err(format!("cannot pass a value as {}", ty.name)),
        TypeKind::String => Ok((Value::String(text.to_string()), MatchQuality::Exact)),
        TypeKind::Primitive(p) => coerce_primitive(*p, text),
        TypeKind::Enum(info) => {
            let start = match base {
                Some(Value::Enum { bits, .. }) => *bits,
                _ => 0,
            };
            coerce_enum(&ty.name, info, text, ctx.no_case, start)
        }
        TypeKind::Object => match handle {
            Some(obj) => {
                let quality = if obj.type_name() == OBJECT_TYPE {
                    MatchQuality::Exact
                } else {
                    MatchQuality::Dereferenced
                };
                Ok((Value::Object(obj), quality))
            }
            None => Ok((Value::String(text.to_string()), MatchQuality::Widened)),
        },
        TypeKind::Class | TypeKind::Struct => match handle {
            Some(obj) => dereference(ctx.types, obj, &ty),
            None => Err(format!("expected a handle to {} but got \"{}\"", ty.name, text)),
        },
        TypeKind::Array(element) => {
            if let Some(obj) = handle {
                if let Some(array) = downcast::<ArrayObject>(&obj) {
                    let element_type = array.element_type();
                    if element_type == element.as_str()
                        || ctx.types.is_assignable(element_type, element)
                    {
                        return Ok((Value::Array(array.items()), MatchQuality::Dereferenced));
                    }
                }
                return Err(format!("handle \"{}\" is not an array of {}", text, element));
            }
            coerce_list(ctx, text, element)
        }
    }
}

fn resolve(
    types: &TypeRegistry,
    type_name: &str,
    no_case: bool,
) -> Result<Arc<TypeDescriptor>, String> {
    let options = LookupOptions {
        strict: true,
        no_case,
        ..LookupOptions::default()
    };
    types
        .lookup(type_name, &options)
        .map_err(|_| format!("unknown parameter type \"{}\"", type_name))
}

fn dereference(types: &TypeRegistry, obj: ObjectRef, ty: &TypeDescriptor) -> Coerced {
    let actual = obj.type_name().to_string();
    if actual == ty.name {
        Ok((Value::Object(obj), MatchQuality::Exact))
    } else if types.is_assignable(&actual, &ty.name) {
        Ok((Value::Object(obj), MatchQuality::Dereferenced))
    } else {
        Err(format!("object of type {} is not assignable to {}", actual, ty.name))
    }
}

fn coerce_list(ctx: &MarshalContext<'_>, text: &str, element: &str) -> Coerced {
    let items = parse_list(text)?;
    let mut values = Vec::with_capacity(items.len());
    let mut worst = MatchQuality::Parsed;
    for (i, item) in items.iter().enumerate() {
        let (value, quality) =
            coerce_text(ctx, item, element).map_err(|e| format!("element {}: {}", i, e))?;
        worst = worst.max(quality);
        values.push(value);
    }
    Ok((Value::Array(values), worst))
}

// ============================================================================
// Primitives
// ============================================================================

/// Parse decimal or `0x` hexadecimal integer text
pub(crate) fn parse_integer(text: &str) -> Option<i128> {
    let text = text.trim();
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (digits, radix) = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (digits, 10),
    };
    // from_str_radix takes a sign of its own, which may not follow the prefix
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = i128::from_str_radix(digits, radix).ok()?;
    if negative {
        magnitude.checked_neg()
    } else {
        Some(magnitude)
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

pub(crate) fn integer_number(p: Primitive, v: i128) -> Option<Number> {
    let (min, max) = p.integer_range()?;
    if v < min || v > max {
        return None;
    }
    let n = match p {
        Primitive::I8 => Number::I8(v as i8),
        Primitive::U8 => Number::U8(v as u8),
        Primitive::I16 => Number::I16(v as i16),
        Primitive::U16 => Number::U16(v as u16),
        Primitive::I32 => Number::I32(v as i32),
        Primitive::U32 => Number::U32(v as u32),
        Primitive::I64 => Number::I64(v as i64),
        Primitive::U64 => Number::U64(v as u64),
        Primitive::ISize => Number::ISize(v as isize),
        Primitive::USize => Number::USize(v as usize),
        _ => return None,
    };
    Some(n)
}

fn coerce_primitive(p: Primitive, text: &str) -> Coerced {
    match p {
        Primitive::Bool => parse_bool(text)
            .map(|b| (Value::Bool(b), MatchQuality::Parsed))
            .ok_or_else(|| format!("expected boolean but got \"{}\"", text)),
        Primitive::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok((Value::Char(c), MatchQuality::Parsed)),
                _ => Err(format!("expected a single character but got \"{}\"", text)),
            }
        }
        Primitive::F32 | Primitive::F64 => {
            let integral = parse_integer(text);
            let v = match integral {
                Some(i) => i as f64,
                None => text
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| format!("expected floating-point number but got \"{}\"", text))?,
            };
            let mut quality = if integral.is_some() {
                MatchQuality::Widened
            } else {
                MatchQuality::Exact
            };
            let number = if p == Primitive::F32 {
                let narrow = v as f32;
                if v.is_finite() && !narrow.is_finite() {
                    return Err(format!("floating-point value too large to represent as {}", p));
                }
                if narrow as f64 != v && v.is_finite() {
                    quality = MatchQuality::Narrowed;
                }
                Number::F32(narrow)
            } else {
                Number::F64(v)
            };
            Ok((Value::Number(number), quality))
        }
        _ => {
            let v = parse_integer(text)
                .ok_or_else(|| format!("expected integer but got \"{}\"", text))?;
            integer_number(p, v)
                .map(|n| (Value::Number(n), MatchQuality::Exact))
                .ok_or_else(|| format!("integer value {} out of range for {}", v, p))
        }
    }
}

// ============================================================================
// Enums
// ============================================================================

fn coerce_enum(type_name: &str, info: &EnumInfo, text: &str, no_case: bool, start: i64) -> Coerced {
    let tokens: Vec<&str> = text
        .split(|c: char| c == ',' || c == '|' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return Err(format!("expected a value of {} but got \"{}\"", type_name, text));
    }
    if !info.flags && tokens.len() > 1 {
        return Err(format!("{} is not a flags enum, got \"{}\"", type_name, text));
    }

    let lookup = |name: &str| -> Result<i64, String> {
        info.value_of(name, no_case)
            .or_else(|| parse_integer(name).and_then(|v| i64::try_from(v).ok()))
            .ok_or_else(|| {
                let names: Vec<&str> = info.values.iter().map(|(n, _)| n.as_str()).collect();
                format!(
                    "bad {} value \"{}\", must be one of: {}",
                    type_name,
                    name,
                    names.join(", ")
                )
            })
    };

    let mut bits = start;
    let mut reset = false;
    for token in tokens {
        match token.as_bytes()[0] {
            b'+' if info.flags => bits |= lookup(&token[1..])?,
            b'-' if info.flags
                && token.len() > 1
                && !token[1..].starts_with(|c: char| c.is_ascii_digit()) =>
            {
                bits &= !lookup(&token[1..])?
            }
            _ => {
                if !reset {
                    reset = true;
                    bits = 0;
                }
                bits |= lookup(token)?;
            }
        }
    }
    Ok((
        Value::Enum {
            type_name: type_name.to_string(),
            bits,
        },
        MatchQuality::Parsed,
    ))
}

/// Zero value of a type, used for output parameters
pub fn default_value(types: &TypeRegistry, type_name: &str) -> Value {
    let Some(ty) = types.get(type_name) else {
        return Value::Null;
    };
    match &ty.kind {
        TypeKind::Primitive(Primitive::Bool) => Value::Bool(false),
        TypeKind::Primitive(Primitive::Char) => Value::Char('\0'),
        TypeKind::Primitive(Primitive::F32) => Value::Number(Number::F32(0.0)),
        TypeKind::Primitive(Primitive::F64) => Value::Number(Number::F64(0.0)),
        TypeKind::Primitive(p) => integer_number(*p, 0).map(Value::Number).unwrap_or_default(),
        TypeKind::Enum(_) => Value::Enum {
            type_name: ty.name.clone(),
            bits: 0,
        },
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::ObjectFlags;
    use crate::handles::{HandleRegistry, HandleValue};
    use crate::interp::MemoryVariables;
    use ferry_sdk::{HostObject, TypeBuilder};
    use std::any::Any;

    struct Shape(&'static str);

    impl HostObject for Shape {
        fn type_name(&self) -> &str {
            self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Fixture {
        types: TypeRegistry,
        handles: HandleRegistry,
        vars: MemoryVariables,
    }

    fn fixture() -> Fixture {
        let types = TypeRegistry::new();
        types.register(TypeBuilder::class("Demo.Shape").build()).unwrap();
        types
            .register(TypeBuilder::class("Demo.Circle").base("Demo.Shape").build())
            .unwrap();
        types.register(TypeBuilder::class("Demo.Other").build()).unwrap();
        types
            .register(
                TypeBuilder::enumeration(
                    "Demo.Access",
                    true,
                    &[("None", 0), ("Read", 1), ("Write", 2)],
                )
                .build(),
            )
            .unwrap();
        types
            .register(
                TypeBuilder::enumeration("Demo.Color", false, &[("Red", 0), ("Green", 1)]).build(),
            )
            .unwrap();
        Fixture {
            types,
            handles: HandleRegistry::default(),
            vars: MemoryVariables::new(),
        }
    }

    impl Fixture {
        fn ctx(&self) -> MarshalContext<'_> {
            MarshalContext::new(&self.types, &self.handles, &self.vars)
        }
    }

    #[test]
    fn test_integers() {
        let f = fixture();
        let ctx = f.ctx();
        assert_eq!(
            coerce_text(&ctx, "42", "System.Int32").unwrap(),
            (Value::Number(Number::I32(42)), MatchQuality::Exact)
        );
        assert_eq!(
            coerce_text(&ctx, "0xff", "System.Byte").unwrap().0,
            Value::Number(Number::U8(255))
        );
        assert!(coerce_text(&ctx, "256", "System.Byte").unwrap_err().contains("out of range"));
        assert!(coerce_text(&ctx, "4.5", "System.Int32").unwrap_err().contains("expected integer"));
        assert!(coerce_text(&ctx, "-1", "System.UInt32").is_err());
        let signed_hex = coerce_text(&ctx, "0x-5", "System.Int32").unwrap_err();
        assert!(signed_hex.contains("expected integer"));
    }

    #[test]
    fn test_parse_integer_signs() {
        assert_eq!(parse_integer("-0x10"), Some(-16));
        assert_eq!(parse_integer(" +12 "), Some(12));
        assert_eq!(parse_integer("0x-5"), None);
        assert_eq!(parse_integer("0x+ff"), None);
        assert_eq!(parse_integer("--5"), None);
        assert_eq!(parse_integer("0x"), None);
        assert_eq!(parse_integer("-170141183460469231731687303715884105727"), Some(-i128::MAX));
        // |i128::MIN| does not fit the magnitude
        assert_eq!(parse_integer("-0x80000000000000000000000000000000"), None);
        assert_eq!(parse_integer("-0x-80000000000000000000000000000000"), None);
    }

    #[test]
    fn test_floats_and_widening() {
        let f = fixture();
        let ctx = f.ctx();
        assert_eq!(coerce_text(&ctx, "42", "System.Double").unwrap().1, MatchQuality::Widened);
        assert_eq!(coerce_text(&ctx, "1.5", "System.Double").unwrap().1, MatchQuality::Exact);
        assert_eq!(coerce_text(&ctx, "0.1", "System.Single").unwrap().1, MatchQuality::Narrowed);
        assert!(coerce_text(&ctx, "abc", "System.Double").is_err());
    }

    #[test]
    fn test_bool_char_string() {
        let f = fixture();
        let ctx = f.ctx();
        assert_eq!(coerce_text(&ctx, "Yes", "System.Boolean").unwrap().0, Value::Bool(true));
        assert!(coerce_text(&ctx, "maybe", "System.Boolean").is_err());
        assert_eq!(coerce_text(&ctx, "x", "System.Char").unwrap().0, Value::Char('x'));
        assert!(coerce_text(&ctx, "xy", "System.Char").is_err());
        assert_eq!(
            coerce_text(&ctx, "42", "System.String").unwrap(),
            (Value::String("42".into()), MatchQuality::Exact)
        );
    }

    #[test]
    fn test_enums() {
        let f = fixture();
        let ctx = f.ctx();
        let (value, quality) = coerce_text(&ctx, "Read Write", "Demo.Access").unwrap();
        assert_eq!(quality, MatchQuality::Parsed);
        assert_eq!(value, Value::Enum { type_name: "Demo.Access".into(), bits: 3 });

        let base = Value::Enum { type_name: "Demo.Access".into(), bits: 3 };
        let (value, _) = coerce_with_base(&ctx, "-Write", "Demo.Access", Some(&base)).unwrap();
        assert_eq!(value, Value::Enum { type_name: "Demo.Access".into(), bits: 1 });

        assert!(coerce_text(&ctx, "Red Green", "Demo.Color").is_err());
        assert!(coerce_text(&ctx, "read", "Demo.Access").is_err());
        let mut ctx = f.ctx();
        ctx.no_case = true;
        assert!(coerce_text(&ctx, "read", "Demo.Access").is_ok());
    }

    #[test]
    fn test_handles_and_null() {
        let f = fixture();
        let circle: ObjectRef = Arc::new(Shape("Demo.Circle"));
        let name = f
            .handles
            .create(HandleValue::Object(circle.clone()), ObjectFlags::NONE, None)
            .unwrap();
        let ctx = f.ctx();
        assert_eq!(coerce_text(&ctx, &name, "Demo.Circle").unwrap().1, MatchQuality::Exact);
        assert_eq!(coerce_text(&ctx, &name, "Demo.Shape").unwrap().1, MatchQuality::Dereferenced);
        assert!(coerce_text(&ctx, &name, "Demo.Other").is_err());
        assert_eq!(coerce_text(&ctx, &name, OBJECT_TYPE).unwrap().1, MatchQuality::Dereferenced);
        assert_eq!(coerce_text(&ctx, "plain", OBJECT_TYPE).unwrap().1, MatchQuality::Widened);
        assert_eq!(coerce_text(&ctx, "null", "Demo.Shape").unwrap().0, Value::Null);

        let mut ctx = f.ctx();
        ctx.flags = MarshalFlags::NO_NULL;
        assert!(coerce_text(&ctx, "null", "Demo.Shape").is_err());
        ctx.flags = MarshalFlags::NO_HANDLE;
        assert!(coerce_text(&ctx, &name, "Demo.Circle").is_err());
    }

    #[test]
    fn test_arrays() {
        let f = fixture();
        let ctx = f.ctx();
        let (value, _) = coerce_text(&ctx, "1 2 3", "System.Int32[]").unwrap();
        assert_eq!(
            value,
            Value::Array(vec![
                Value::Number(Number::I32(1)),
                Value::Number(Number::I32(2)),
                Value::Number(Number::I32(3)),
            ])
        );
        let err = coerce_text(&ctx, "1 x", "System.Int32[]").unwrap_err();
        assert!(err.starts_with("element 1"));
    }

    #[test]
    fn test_default_values() {
        let f = fixture();
        assert_eq!(default_value(&f.types, "System.Int16"), Value::Number(Number::I16(0)));
        assert_eq!(default_value(&f.types, "System.Boolean"), Value::Bool(false));
        assert_eq!(default_value(&f.types, "Demo.Shape"), Value::Null);
    }
}
