//! Native call signatures

use std::fmt;
use std::str::FromStr;

use ferry_sdk::{Primitive, STRING_TYPE, VOID_TYPE};
use libffi::middle::Type;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Calling convention of a native entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CallingConvention {
    /// Platform default convention
    #[default]
    Winapi,
    /// C convention
    Cdecl,
    /// Callee-cleanup convention
    StdCall,
    /// Member function convention
    ThisCall,
    /// Register convention (not supported)
    FastCall,
}

impl CallingConvention {
    /// Name as accepted by `from_str`
    pub const fn as_str(&self) -> &'static str {
        match self {
            CallingConvention::Winapi => "Winapi",
            CallingConvention::Cdecl => "Cdecl",
            CallingConvention::StdCall => "StdCall",
            CallingConvention::ThisCall => "ThisCall",
            CallingConvention::FastCall => "FastCall",
        }
    }

    /// Whether calls through this convention can be performed
    pub const fn is_supported(&self) -> bool {
        !matches!(self, CallingConvention::FastCall)
    }
}

impl FromStr for CallingConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        [
            CallingConvention::Winapi,
            CallingConvention::Cdecl,
            CallingConvention::StdCall,
            CallingConvention::ThisCall,
            CallingConvention::FastCall,
        ]
        .into_iter()
        .find(|c| c.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| {
            format!(
                "bad calling convention \"{}\", must be one of: {}",
                s, "Winapi, Cdecl, StdCall, ThisCall, FastCall"
            )
        })
    }
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Character set used for string and char parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CharSet {
    /// Unspecified; treated as narrow
    #[default]
    None,
    /// Narrow 8-bit strings
    Ansi,
    /// UTF-16 strings
    Unicode,
    /// Platform preference (UTF-16 on Windows, narrow elsewhere)
    Auto,
}

impl CharSet {
    /// Name as accepted by `from_str`
    pub const fn as_str(&self) -> &'static str {
        match self {
            CharSet::None => "None",
            CharSet::Ansi => "Ansi",
            CharSet::Unicode => "Unicode",
            CharSet::Auto => "Auto",
        }
    }

    /// Whether strings are passed as UTF-16
    pub const fn is_wide(&self) -> bool {
        match self {
            CharSet::Unicode => true,
            CharSet::Auto => cfg!(windows),
            CharSet::None | CharSet::Ansi => false,
        }
    }
}

impl FromStr for CharSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        [CharSet::None, CharSet::Ansi, CharSet::Unicode, CharSet::Auto]
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "bad character set \"{}\", must be one of: None, Ansi, Unicode, Auto",
                    s
                )
            })
    }
}

impl fmt::Display for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String and error marshaling policy of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarshalPolicy {
    /// Non-ASCII characters in narrow strings are passed as UTF-8
    pub best_fit_mapping: bool,
    /// Character set for strings and chars
    pub char_set: CharSet,
    /// Capture the OS error code after each call
    pub set_last_error: bool,
    /// Fail on characters that cannot be narrowed
    pub throw_on_unmappable_char: bool,
}

impl Default for MarshalPolicy {
    fn default() -> Self {
        Self {
            best_fit_mapping: true,
            char_set: CharSet::None,
            set_last_error: false,
            throw_on_unmappable_char: false,
        }
    }
}

/// Native value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    /// No value
    Void,
    /// 32-bit boolean
    Bool,
    /// Signed 8-bit
    I8,
    /// Unsigned 8-bit
    U8,
    /// Signed 16-bit
    I16,
    /// Unsigned 16-bit
    U16,
    /// Signed 32-bit
    I32,
    /// Unsigned 32-bit
    U32,
    /// Signed 64-bit
    I64,
    /// Unsigned 64-bit
    U64,
    /// Pointer-sized signed
    ISize,
    /// Pointer-sized unsigned
    USize,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Character (8 or 16 bits depending on the character set)
    Char,
    /// Untyped pointer
    Pointer,
    /// Null-terminated string (narrow or wide depending on the character set)
    String,
}

impl NativeType {
    /// Name used in descriptions
    pub const fn as_str(&self) -> &'static str {
        match self {
            NativeType::Void => "void",
            NativeType::Bool => "bool",
            NativeType::I8 => "int8",
            NativeType::U8 => "uint8",
            NativeType::I16 => "int16",
            NativeType::U16 => "uint16",
            NativeType::I32 => "int32",
            NativeType::U32 => "uint32",
            NativeType::I64 => "int64",
            NativeType::U64 => "uint64",
            NativeType::ISize => "intptr",
            NativeType::USize => "uintptr",
            NativeType::F32 => "float",
            NativeType::F64 => "double",
            NativeType::Char => "char",
            NativeType::Pointer => "pointer",
            NativeType::String => "string",
        }
    }

    /// Host type the marshaling engine coerces script arguments toward
    pub const fn host_type_name(&self) -> &'static str {
        match self {
            NativeType::Void => VOID_TYPE,
            NativeType::Bool => Primitive::Bool.type_name(),
            NativeType::I8 => Primitive::I8.type_name(),
            NativeType::U8 => Primitive::U8.type_name(),
            NativeType::I16 => Primitive::I16.type_name(),
            NativeType::U16 => Primitive::U16.type_name(),
            NativeType::I32 => Primitive::I32.type_name(),
            NativeType::U32 => Primitive::U32.type_name(),
            NativeType::I64 => Primitive::I64.type_name(),
            NativeType::U64 => Primitive::U64.type_name(),
            NativeType::ISize | NativeType::Pointer => Primitive::ISize.type_name(),
            NativeType::USize => Primitive::USize.type_name(),
            NativeType::F32 => Primitive::F32.type_name(),
            NativeType::F64 => Primitive::F64.type_name(),
            NativeType::Char => Primitive::Char.type_name(),
            NativeType::String => STRING_TYPE,
        }
    }

    /// libffi type descriptor
    pub fn ffi_type(&self, char_set: CharSet) -> Type {
        match self {
            NativeType::Void => Type::void(),
            NativeType::Bool | NativeType::I32 => Type::i32(),
            NativeType::I8 => Type::i8(),
            NativeType::U8 => Type::u8(),
            NativeType::I16 => Type::i16(),
            NativeType::U16 => Type::u16(),
            NativeType::U32 => Type::u32(),
            NativeType::I64 => Type::i64(),
            NativeType::U64 => Type::u64(),
            NativeType::ISize => Type::isize(),
            NativeType::USize => Type::usize(),
            NativeType::F32 => Type::f32(),
            NativeType::F64 => Type::f64(),
            NativeType::Char if char_set.is_wide() => Type::u16(),
            NativeType::Char => Type::u8(),
            NativeType::Pointer | NativeType::String => Type::pointer(),
        }
    }

    /// Whether the type may be passed by reference
    pub const fn supports_by_ref(&self) -> bool {
        !matches!(self, NativeType::Void | NativeType::String)
    }
}

impl FromStr for NativeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        let ty = match s.to_ascii_lowercase().as_str() {
            "void" | "system.void" => NativeType::Void,
            "bool" | "boolean" | "system.boolean" => NativeType::Bool,
            "sbyte" | "i8" | "int8" | "system.sbyte" => NativeType::I8,
            "byte" | "u8" | "uint8" | "system.byte" => NativeType::U8,
            "short" | "i16" | "int16" | "system.int16" => NativeType::I16,
            "ushort" | "u16" | "uint16" | "system.uint16" => NativeType::U16,
            "int" | "i32" | "int32" | "system.int32" => NativeType::I32,
            "uint" | "u32" | "uint32" | "system.uint32" => NativeType::U32,
            "long" | "i64" | "int64" | "system.int64" => NativeType::I64,
            "ulong" | "u64" | "uint64" | "system.uint64" => NativeType::U64,
            "intptr" | "isize" | "system.intptr" => NativeType::ISize,
            "uintptr" | "usize" | "system.uintptr" => NativeType::USize,
            "float" | "single" | "f32" | "system.single" => NativeType::F32,
            "double" | "f64" | "system.double" => NativeType::F64,
            "char" | "system.char" => NativeType::Char,
            "pointer" | "ptr" => NativeType::Pointer,
            "string" | "system.string" => NativeType::String,
            _ => return Err(format!("unknown native type \"{}\"", s)),
        };
        Ok(ty)
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeParameter {
    /// Value type
    pub ty: NativeType,
    /// Passed as a pointer and written back after the call
    pub by_ref: bool,
}

impl NativeParameter {
    /// Parse `type`, `type&`, `ref type` or `out type`
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        let (name, by_ref) = if let Some(inner) = text.strip_suffix('&') {
            (inner.trim(), true)
        } else if let Some(inner) =
            text.strip_prefix("ref ").or_else(|| text.strip_prefix("out "))
        {
            (inner.trim(), true)
        } else {
            (text, false)
        };
        Ok(Self {
            ty: name.parse()?,
            by_ref,
        })
    }
}

impl fmt::Display for NativeParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.by_ref {
            write!(f, "{}&", self.ty)
        } else {
            write!(f, "{}", self.ty)
        }
    }
}

/// Full signature of a call binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Return type
    pub return_type: NativeType,
    /// Parameters in order
    pub parameters: Vec<NativeParameter>,
    /// Calling convention
    pub calling_convention: CallingConvention,
    /// String and error policy
    pub policy: MarshalPolicy,
}

impl Signature {
    /// Build and validate a signature
    pub fn new(
        return_type: NativeType,
        parameters: Vec<NativeParameter>,
        calling_convention: CallingConvention,
        policy: MarshalPolicy,
    ) -> EngineResult<Self> {
        let signature = Self {
            return_type,
            parameters,
            calling_convention,
            policy,
        };
        signature.validate()?;
        Ok(signature)
    }

    fn validate(&self) -> EngineResult<()> {
        if !self.calling_convention.is_supported() {
            return Err(EngineError::InvalidSignature(format!(
                "calling convention {} is not supported",
                self.calling_convention
            )));
        }
        for (i, param) in self.parameters.iter().enumerate() {
            if param.ty == NativeType::Void {
                return Err(EngineError::InvalidSignature(format!(
                    "parameter {} cannot be void",
                    i
                )));
            }
            if param.by_ref && !param.ty.supports_by_ref() {
                return Err(EngineError::InvalidSignature(format!(
                    "parameter {} of type {} cannot be passed by reference",
                    i, param.ty
                )));
            }
        }
        Ok(())
    }

    /// Human readable form, e.g. `int32 (string, double&)`
    pub fn describe(&self) -> String {
        let params: Vec<String> = self.parameters.iter().map(|p| p.to_string()).collect();
        format!("{} ({})", self.return_type, params.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_types() {
        assert_eq!("System.Int32".parse::<NativeType>().unwrap(), NativeType::I32);
        assert_eq!("DOUBLE".parse::<NativeType>().unwrap(), NativeType::F64);
        assert!("widget".parse::<NativeType>().is_err());
    }

    #[test]
    fn test_parse_by_ref() {
        let p = NativeParameter::parse("int32&").unwrap();
        assert!(p.by_ref);
        assert_eq!(p.ty, NativeType::I32);
        assert!(NativeParameter::parse("out double").unwrap().by_ref);
        assert!(!NativeParameter::parse("string").unwrap().by_ref);
    }

    #[test]
    fn test_conventions() {
        assert_eq!("cdecl".parse::<CallingConvention>().unwrap(), CallingConvention::Cdecl);
        assert!(!CallingConvention::FastCall.is_supported());
        assert!("pascal".parse::<CallingConvention>().is_err());
    }

    #[test]
    fn test_signature_validation() {
        let ok = Signature::new(
            NativeType::I32,
            vec![NativeParameter::parse("string").unwrap()],
            CallingConvention::Winapi,
            MarshalPolicy::default(),
        )
        .unwrap();
        assert_eq!(ok.describe(), "int32 (string)");

        let fast = Signature::new(
            NativeType::Void,
            vec![],
            CallingConvention::FastCall,
            MarshalPolicy::default(),
        );
        assert!(matches!(fast, Err(EngineError::InvalidSignature(_))));

        let bad_ref = Signature::new(
            NativeType::Void,
            vec![NativeParameter::parse("string&").unwrap()],
            CallingConvention::Cdecl,
            MarshalPolicy::default(),
        );
        assert!(bad_ref.is_err());
    }

    #[test]
    fn test_char_set() {
        assert!(CharSet::Unicode.is_wide());
        assert!(!CharSet::Ansi.is_wide());
        assert_eq!("unicode".parse::<CharSet>().unwrap(), CharSet::Unicode);
    }
}
