//! Calls through libffi
//!
//! Arguments arrive already coerced to the host types advertised by the
//! binding's candidate (see [`NativeType::host_type_name`]). Each one is
//! lowered into a [`Slot`] that owns whatever storage the native side
//! points into, the call is made, and by-reference slots are read back into
//! the argument array.

use std::ffi::{c_void, CStr, CString};

use ferry_sdk::{HostError, HostResult, Number, Value};
use libffi::middle::{Arg, Cif, CodePtr, Type};

use super::signature::{CharSet, MarshalPolicy, NativeType, Signature};

/// Result of a native call
pub(crate) struct CallOutcome {
    /// Converted return value
    pub value: Value,
    /// OS error captured right after the call, when requested
    pub last_error: Option<i32>,
}

enum Scalar {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    ISize(isize),
    USize(usize),
    F32(f32),
    F64(f64),
    Ptr(*const c_void),
}

impl Scalar {
    fn arg(&self) -> Arg {
        match self {
            Scalar::I8(v) => Arg::new(v),
            Scalar::U8(v) => Arg::new(v),
            Scalar::I16(v) => Arg::new(v),
            Scalar::U16(v) => Arg::new(v),
            Scalar::I32(v) => Arg::new(v),
            Scalar::U32(v) => Arg::new(v),
            Scalar::I64(v) => Arg::new(v),
            Scalar::U64(v) => Arg::new(v),
            Scalar::ISize(v) => Arg::new(v),
            Scalar::USize(v) => Arg::new(v),
            Scalar::F32(v) => Arg::new(v),
            Scalar::F64(v) => Arg::new(v),
            Scalar::Ptr(v) => Arg::new(v),
        }
    }

    /// Write the value into an 8-byte cell
    fn store(&self, cell: &mut u64) {
        let dst = cell as *mut u64;
        // SAFETY: every scalar is at most 8 bytes with alignment <= 8.
        unsafe {
            match *self {
                Scalar::I8(v) => (dst as *mut i8).write(v),
                Scalar::U8(v) => (dst as *mut u8).write(v),
                Scalar::I16(v) => (dst as *mut i16).write(v),
                Scalar::U16(v) => (dst as *mut u16).write(v),
                Scalar::I32(v) => (dst as *mut i32).write(v),
                Scalar::U32(v) => (dst as *mut u32).write(v),
                Scalar::I64(v) => (dst as *mut i64).write(v),
                Scalar::U64(v) => dst.write(v),
                Scalar::ISize(v) => (dst as *mut isize).write(v),
                Scalar::USize(v) => (dst as *mut usize).write(v),
                Scalar::F32(v) => (dst as *mut f32).write(v),
                Scalar::F64(v) => (dst as *mut f64).write(v),
                Scalar::Ptr(v) => (dst as *mut *const c_void).write(v),
            }
        }
    }
}

enum Text {
    Narrow(CString),
    Wide(Vec<u16>),
}

enum Slot {
    Scalar(Scalar),
    Text {
        _storage: Option<Text>,
        ptr: *const c_void,
    },
    ByRef {
        ty: NativeType,
        cell: Box<u64>,
        ptr: *mut c_void,
    },
}

impl Slot {
    fn arg(&self) -> Arg {
        match self {
            Slot::Scalar(scalar) => scalar.arg(),
            Slot::Text { ptr, .. } => Arg::new(ptr),
            Slot::ByRef { ptr, .. } => Arg::new(ptr),
        }
    }
}

// ============================================================================
// Argument lowering
// ============================================================================

fn integer_of(value: &Value, index: usize) -> HostResult<i128> {
    match value {
        Value::Number(n) => Ok(n.as_i128().unwrap_or_else(|| n.as_f64() as i128)),
        Value::Bool(b) => Ok(*b as i128),
        Value::Char(c) => Ok(*c as u32 as i128),
        Value::Enum { bits, .. } => Ok(*bits as i128),
        Value::Null => Ok(0),
        other => Err(HostError::invalid_argument(format!(
            "argument {}: expected a number, got {}",
            index,
            other.variant_name()
        ))),
    }
}

fn float_of(value: &Value, index: usize) -> HostResult<f64> {
    match value {
        Value::Number(n) => Ok(n.as_f64()),
        other => integer_of(other, index).map(|v| v as f64),
    }
}

fn narrow_char(c: char, policy: &MarshalPolicy) -> HostResult<u8> {
    if c.is_ascii() || (policy.best_fit_mapping && (c as u32) <= 0xFF) {
        return Ok(c as u32 as u8);
    }
    if policy.throw_on_unmappable_char {
        return Err(HostError::invalid_argument(format!(
            "character {:?} cannot be mapped to a narrow character",
            c
        )));
    }
    Ok(b'?')
}

fn narrow_string(text: &str, policy: &MarshalPolicy) -> HostResult<CString> {
    let bytes = if text.is_ascii() || policy.best_fit_mapping {
        text.as_bytes().to_vec()
    } else {
        text.chars()
            .map(|c| narrow_char(c, policy))
            .collect::<HostResult<Vec<u8>>>()?
    };
    CString::new(bytes)
        .map_err(|_| HostError::invalid_argument("string argument contains an embedded NUL"))
}

fn wide_string(text: &str) -> HostResult<Vec<u16>> {
    if text.contains('\0') {
        return Err(HostError::invalid_argument(
            "string argument contains an embedded NUL",
        ));
    }
    Ok(text.encode_utf16().chain(std::iter::once(0)).collect())
}

fn scalar_of(
    ty: NativeType,
    value: &Value,
    index: usize,
    policy: &MarshalPolicy,
) -> HostResult<Scalar> {
    let scalar = match ty {
        NativeType::Bool => Scalar::I32(match value {
            Value::Bool(b) => *b as i32,
            other => (integer_of(other, index)? != 0) as i32,
        }),
        NativeType::I8 => Scalar::I8(integer_of(value, index)? as i8),
        NativeType::U8 => Scalar::U8(integer_of(value, index)? as u8),
        NativeType::I16 => Scalar::I16(integer_of(value, index)? as i16),
        NativeType::U16 => Scalar::U16(integer_of(value, index)? as u16),
        NativeType::I32 => Scalar::I32(integer_of(value, index)? as i32),
        NativeType::U32 => Scalar::U32(integer_of(value, index)? as u32),
        NativeType::I64 => Scalar::I64(integer_of(value, index)? as i64),
        NativeType::U64 => Scalar::U64(integer_of(value, index)? as u64),
        NativeType::ISize => Scalar::ISize(integer_of(value, index)? as isize),
        NativeType::USize => Scalar::USize(integer_of(value, index)? as usize),
        NativeType::F32 => Scalar::F32(float_of(value, index)? as f32),
        NativeType::F64 => Scalar::F64(float_of(value, index)?),
        NativeType::Pointer => Scalar::Ptr(integer_of(value, index)? as usize as *const c_void),
        NativeType::Char => {
            let c = match value {
                Value::Char(c) => *c,
                Value::String(s) if s.chars().count() == 1 => s.chars().next().unwrap_or('\0'),
                other => char::from_u32(integer_of(other, index)? as u32).unwrap_or('\0'),
            };
            if policy.char_set.is_wide() {
                let mut units = [0u16; 2];
                let encoded = c.encode_utf16(&mut units);
                if encoded.len() != 1 {
                    return Err(HostError::invalid_argument(format!(
                        "argument {}: character {:?} does not fit a wide character",
                        index, c
                    )));
                }
                Scalar::U16(units[0])
            } else {
                Scalar::U8(narrow_char(c, policy)?)
            }
        }
        NativeType::Void | NativeType::String => {
            return Err(HostError::invalid_argument(format!(
                "argument {}: {} is not a scalar type",
                index, ty
            )))
        }
    };
    Ok(scalar)
}

fn lower(
    ty: NativeType,
    by_ref: bool,
    value: &Value,
    index: usize,
    policy: &MarshalPolicy,
) -> HostResult<Slot> {
    if ty == NativeType::String {
        let storage = match value {
            Value::Null => None,
            Value::String(s) if policy.char_set.is_wide() => Some(Text::Wide(wide_string(s)?)),
            Value::String(s) => Some(Text::Narrow(narrow_string(s, policy)?)),
            other => {
                return Err(HostError::invalid_argument(format!(
                    "argument {}: expected a string, got {}",
                    index,
                    other.variant_name()
                )))
            }
        };
        let ptr = match &storage {
            None => std::ptr::null(),
            Some(Text::Narrow(s)) => s.as_ptr() as *const c_void,
            Some(Text::Wide(w)) => w.as_ptr() as *const c_void,
        };
        return Ok(Slot::Text {
            _storage: storage,
            ptr,
        });
    }

    let scalar = scalar_of(ty, value, index, policy)?;
    if !by_ref {
        return Ok(Slot::Scalar(scalar));
    }
    let mut cell = Box::new(0u64);
    scalar.store(&mut cell);
    let ptr = &mut *cell as *mut u64 as *mut c_void;
    Ok(Slot::ByRef { ty, cell, ptr })
}

// ============================================================================
// Result raising
// ============================================================================

fn raise_integer(ty: NativeType, raw: u64, char_set: CharSet) -> Value {
    match ty {
        NativeType::Bool => Value::Bool(raw as u32 != 0),
        NativeType::I8 => Value::Number(Number::I8(raw as i8)),
        NativeType::U8 => Value::Number(Number::U8(raw as u8)),
        NativeType::I16 => Value::Number(Number::I16(raw as i16)),
        NativeType::U16 => Value::Number(Number::U16(raw as u16)),
        NativeType::I32 => Value::Number(Number::I32(raw as i32)),
        NativeType::U32 => Value::Number(Number::U32(raw as u32)),
        NativeType::I64 => Value::Number(Number::I64(raw as i64)),
        NativeType::U64 => Value::Number(Number::U64(raw)),
        NativeType::ISize | NativeType::Pointer => Value::Number(Number::ISize(raw as isize)),
        NativeType::USize => Value::Number(Number::USize(raw as usize)),
        NativeType::Char => {
            let code = if char_set.is_wide() {
                raw as u16 as u32
            } else {
                raw as u8 as u32
            };
            Value::Char(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
        }
        NativeType::F32 => Value::Number(Number::F32(f32::from_bits(raw as u32))),
        NativeType::F64 => Value::Number(Number::F64(f64::from_bits(raw))),
        NativeType::Void | NativeType::String => Value::Null,
    }
}

fn raise_string(ptr: *const c_void, char_set: CharSet) -> Value {
    if ptr.is_null() {
        return Value::Null;
    }
    if char_set.is_wide() {
        let base = ptr as *const u16;
        let mut len = 0usize;
        // SAFETY: the callee returned a NUL-terminated UTF-16 string.
        unsafe {
            while *base.add(len) != 0 {
                len += 1;
            }
            Value::String(String::from_utf16_lossy(std::slice::from_raw_parts(base, len)))
        }
    } else {
        // SAFETY: the callee returned a NUL-terminated narrow string.
        let text = unsafe { CStr::from_ptr(ptr as *const std::ffi::c_char) };
        Value::String(text.to_string_lossy().into_owned())
    }
}

/// Read a by-reference cell back as a host value
fn raise_cell(ty: NativeType, cell: &u64, char_set: CharSet) -> Value {
    // Typed stores land at the start of the cell, which is the high end of
    // the u64 on big-endian targets.
    let raw = *cell;
    if cfg!(target_endian = "big") {
        let width = match ty {
            NativeType::I8 | NativeType::U8 => 8,
            NativeType::I16 | NativeType::U16 => 16,
            NativeType::Char if !char_set.is_wide() => 8,
            NativeType::Char => 16,
            NativeType::Bool | NativeType::I32 | NativeType::U32 | NativeType::F32 => 32,
            NativeType::ISize | NativeType::USize | NativeType::Pointer => usize::BITS,
            _ => 64,
        };
        return raise_integer(ty, raw >> (64 - width), char_set);
    }
    raise_integer(ty, raw, char_set)
}

// ============================================================================
// Call
// ============================================================================

/// Call the function at `address` with `args`, writing by-reference results
/// back into their slots.
pub(crate) fn call(
    signature: &Signature,
    address: usize,
    args: &mut [Value],
) -> HostResult<CallOutcome> {
    if address == 0 {
        return Err(HostError::failure("native entry address is null"));
    }
    if args.len() != signature.parameters.len() {
        return Err(HostError::invalid_argument(format!(
            "expected {} arguments, got {}",
            signature.parameters.len(),
            args.len()
        )));
    }
    let policy = &signature.policy;
    let char_set = policy.char_set;

    let slots = signature
        .parameters
        .iter()
        .zip(args.iter())
        .enumerate()
        .map(|(i, (param, value))| lower(param.ty, param.by_ref, value, i, policy))
        .collect::<HostResult<Vec<Slot>>>()?;

    let arg_types: Vec<Type> = signature
        .parameters
        .iter()
        .map(|p| {
            if p.by_ref {
                Type::pointer()
            } else {
                p.ty.ffi_type(char_set)
            }
        })
        .collect();
    let ffi_args: Vec<Arg> = slots.iter().map(Slot::arg).collect();
    let cif = Cif::new(arg_types.into_iter(), signature.return_type.ffi_type(char_set));
    let code = CodePtr::from_ptr(address as *const c_void);

    log::trace!(
        target: "ferry::native",
        "calling {:#x} as {}",
        address,
        signature.describe()
    );

    // SAFETY: the signature was declared by the caller for this entry point;
    // every slot outlives the call. Integer returns narrower than a register
    // are widened by libffi, so they are read through a u64.
    let value = unsafe {
        match signature.return_type {
            NativeType::Void => {
                cif.call::<()>(code, &ffi_args);
                Value::Null
            }
            NativeType::F32 => Value::Number(Number::F32(cif.call::<f32>(code, &ffi_args))),
            NativeType::F64 => Value::Number(Number::F64(cif.call::<f64>(code, &ffi_args))),
            NativeType::String => {
                let ptr = cif.call::<usize>(code, &ffi_args) as *const c_void;
                raise_string(ptr, char_set)
            }
            ty => raise_integer(ty, cif.call::<u64>(code, &ffi_args), char_set),
        }
    };

    let last_error = if policy.set_last_error {
        std::io::Error::last_os_error().raw_os_error()
    } else {
        None
    };

    for (i, slot) in slots.iter().enumerate() {
        if let Slot::ByRef { ty, cell, .. } = slot {
            args[i] = raise_cell(*ty, cell, char_set);
        }
    }

    Ok(CallOutcome { value, last_error })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::signature::{CallingConvention, NativeParameter};

    fn policy() -> MarshalPolicy {
        MarshalPolicy::default()
    }

    #[test]
    fn test_narrow_string_rules() {
        let mut p = policy();
        assert_eq!(narrow_string("héllo", &p).unwrap().as_bytes(), "héllo".as_bytes());
        p.best_fit_mapping = false;
        assert_eq!(narrow_string("a€b", &p).unwrap().as_bytes(), b"a?b");
        p.throw_on_unmappable_char = true;
        assert!(narrow_string("a€b", &p).is_err());
        assert!(narrow_string("a\0b", &policy()).is_err());
    }

    #[test]
    fn test_by_ref_cell_round_trip() {
        let value = Value::Number(Number::F64(2.5));
        let slot = lower(NativeType::F64, true, &value, 0, &policy()).unwrap();
        match slot {
            Slot::ByRef { ty, cell, .. } => {
                assert_eq!(raise_cell(ty, &cell, CharSet::None), Value::Number(Number::F64(2.5)));
            }
            _ => panic!("expected a by-ref slot"),
        }
    }

    #[test]
    fn test_null_string_is_null_pointer() {
        match lower(NativeType::String, false, &Value::Null, 0, &policy()).unwrap() {
            Slot::Text { ptr, .. } => assert!(ptr.is_null()),
            _ => panic!("expected a text slot"),
        }
    }

    #[test]
    fn test_raise_integer_truncates() {
        assert_eq!(
            raise_integer(NativeType::I32, 0xFFFF_FFFF_FFFF_FFFE, CharSet::None),
            Value::Number(Number::I32(-2))
        );
        assert_eq!(raise_integer(NativeType::Bool, 1, CharSet::None), Value::Bool(true));
        assert_eq!(raise_integer(NativeType::Char, 0x41, CharSet::Ansi), Value::Char('A'));
    }

    #[test]
    fn test_argument_count_checked() {
        let sig = Signature::new(
            NativeType::I32,
            vec![NativeParameter::parse("int32").unwrap()],
            CallingConvention::Cdecl,
            policy(),
        )
        .unwrap();
        let err = call(&sig, 1, &mut []).err().unwrap();
        assert!(err.message.contains("expected 1 arguments"));
        let err = call(&sig, 0, &mut [Value::Null]).err().unwrap();
        assert!(err.message.contains("null"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_call_strlen() {
        let lib = crate::native::loader::Library::open("libc.so.6").unwrap();
        let address = lib.symbol_address("strlen").unwrap();
        let sig = Signature::new(
            NativeType::USize,
            vec![NativeParameter::parse("string").unwrap()],
            CallingConvention::Cdecl,
            policy(),
        )
        .unwrap();
        let mut args = [Value::String("ferry".into())];
        let outcome = call(&sig, address, &mut args).unwrap();
        assert_eq!(outcome.value, Value::Number(Number::USize(5)));
        assert_eq!(outcome.last_error, None);
    }
}
