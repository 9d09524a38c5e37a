//! Option bit sets
//!
//! Every flag set is a plain `Copy` newtype over an integer with named
//! constants, set algebra, and a parser for the textual form accepted from
//! the command front end and from settings files:
//!
//! ```text
//! "Public, Instance"      -> replace with the listed flags
//! "+NonPublic -Static"    -> add / remove relative to a starting value
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($repr:ty) {
            $(
                $(#[$fmeta:meta])*
                const $flag:ident = $value:expr, $text:literal;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name($repr);

        impl $name {
            /// No flags set
            pub const NONE: Self = Self(0);
            $(
                $(#[$fmeta])*
                pub const $flag: Self = Self($value);
            )*

            const NAMED: &'static [(&'static str, $name)] = &[$(($text, $name::$flag)),*];

            /// Create from raw bits
            pub const fn from_bits(bits: $repr) -> Self {
                Self(bits)
            }

            /// Get raw bits
            pub const fn bits(&self) -> $repr {
                self.0
            }

            /// Check if all flags of `other` are set
            pub const fn contains(&self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }

            /// Check if any flag of `other` is set
            pub const fn intersects(&self, other: Self) -> bool {
                (self.0 & other.0) != 0
            }

            /// Union of flags
            pub const fn union(&self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            /// Difference (remove flags)
            pub const fn difference(&self, other: Self) -> Self {
                Self(self.0 & !other.0)
            }

            /// Whether no flag is set
            pub const fn is_empty(&self) -> bool {
                self.0 == 0
            }

            /// Look up a single flag name (case-insensitive)
            pub fn from_name(name: &str) -> Option<Self> {
                if name.eq_ignore_ascii_case("None") {
                    return Some(Self::NONE);
                }
                Self::NAMED
                    .iter()
                    .find(|(n, _)| n.eq_ignore_ascii_case(name))
                    .map(|(_, f)| *f)
            }

            /// Parse a flag list relative to `start`.
            ///
            /// Tokens are separated by commas or whitespace. A token prefixed
            /// with `+` or `-` adds or removes a flag from the running value;
            /// the first unprefixed token resets the running value to empty.
            pub fn parse_with(text: &str, start: Self) -> Result<Self, String> {
                let mut result = start;
                let mut reset = false;
                for token in text
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|t| !t.is_empty())
                {
                    let (op, name) = match token.as_bytes()[0] {
                        b'+' => (Some(true), &token[1..]),
                        b'-' => (Some(false), &token[1..]),
                        _ => (None, token),
                    };
                    let flag = Self::from_name(name).ok_or_else(|| {
                        format!(
                            "bad {} value \"{}\", must be one of: {}",
                            stringify!($name),
                            name,
                            Self::NAMED
                                .iter()
                                .map(|(n, _)| *n)
                                .collect::<Vec<_>>()
                                .join(", ")
                        )
                    })?;
                    result = match op {
                        Some(true) => result.union(flag),
                        Some(false) => result.difference(flag),
                        None => {
                            if !reset {
                                reset = true;
                                result = Self::NONE;
                            }
                            result.union(flag)
                        }
                    };
                }
                Ok(result)
            }

            /// Parse a flag list starting from no flags
            pub fn parse(text: &str) -> Result<Self, String> {
                Self::parse_with(text, Self::NONE)
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(text: String) -> Result<Self, String> {
                Self::parse(&text)
            }
        }

        impl From<$name> for String {
            fn from(flags: $name) -> String {
                flags.to_string()
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                *self = self.union(rhs);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let names: Vec<&str> = Self::NAMED
                    .iter()
                    .filter(|(_, flag)| !flag.is_empty() && self.contains(*flag))
                    .map(|(n, _)| *n)
                    .collect();
                if names.is_empty() {
                    f.write_str("None")
                } else {
                    f.write_str(&names.join(", "))
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }
    };
}

flag_set! {
    /// Member visibility and lookup filter, plus raw invocation intents
    pub struct BindingFlags(u32) {
        /// Match member names without regard to case
        const IGNORE_CASE = 0x0001, "IgnoreCase";
        /// Only members declared on the type itself
        const DECLARED_ONLY = 0x0002, "DeclaredOnly";
        /// Instance members
        const INSTANCE = 0x0004, "Instance";
        /// Static members
        const STATIC = 0x0008, "Static";
        /// Public members
        const PUBLIC = 0x0010, "Public";
        /// Non-public members
        const NON_PUBLIC = 0x0020, "NonPublic";
        /// Include inherited static members
        const FLATTEN_HIERARCHY = 0x0040, "FlattenHierarchy";
        /// Invoke a method
        const INVOKE_METHOD = 0x0100, "InvokeMethod";
        /// Invoke a constructor
        const CREATE_INSTANCE = 0x0200, "CreateInstance";
        /// Read a field
        const GET_FIELD = 0x0400, "GetField";
        /// Write a field
        const SET_FIELD = 0x0800, "SetField";
        /// Read a property
        const GET_PROPERTY = 0x1000, "GetProperty";
        /// Write a property
        const SET_PROPERTY = 0x2000, "SetProperty";
    }
}

impl BindingFlags {
    /// Public static and instance members
    pub const DEFAULT: Self = Self(0x0010 | 0x0004 | 0x0008);
    /// All invocation intents
    pub const INVOKE_MASK: Self = Self(0x0100 | 0x0200 | 0x0400 | 0x0800 | 0x1000 | 0x2000);
}

flag_set! {
    /// Member kinds considered during candidate gathering
    pub struct MemberTypes(u8) {
        /// Constructors
        const CONSTRUCTOR = 0x01, "Constructor";
        /// Methods
        const METHOD = 0x02, "Method";
        /// Properties
        const PROPERTY = 0x04, "Property";
        /// Fields
        const FIELD = 0x08, "Field";
    }
}

impl MemberTypes {
    /// Everything invocable by name on a type or object
    pub const INVOCABLE: Self = Self(0x02 | 0x04 | 0x08);
    /// All member kinds
    pub const ALL: Self = Self(0x0F);
}

flag_set! {
    /// Argument marshaling policy
    pub struct MarshalFlags(u16) {
        /// Omitted trailing arguments take the parameter default
        const DEFAULT_VALUE = 0x0001, "DefaultValue";
        /// Array results are returned as list values
        const ARRAY_AS_VALUE = 0x0002, "ArrayAsValue";
        /// Array arguments name a variable holding the list and are written back
        const ARRAY_AS_LINK = 0x0004, "ArrayAsLink";
        /// Never dereference handle names while coercing
        const NO_HANDLE = 0x0008, "NoHandle";
        /// The literal "null" is not treated as a null reference
        const NO_NULL = 0x0010, "NoNull";
        /// Complex results are stringified instead of becoming handles
        const TO_STRING = 0x0020, "ToString";
    }
}

flag_set! {
    /// Flags stored on handle registry entries
    pub struct ObjectFlags(u16) {
        /// Never tear down the underlying value
        const NO_DISPOSE = 0x0001, "NoDispose";
        /// The alias survives disposal of the handle
        const STICKY_ALIAS = 0x0002, "StickyAlias";
        /// The value describes a loaded component
        const ASSEMBLY = 0x0004, "Assembly";
        /// Member lookups on this object ignore case
        const NO_CASE = 0x0008, "NoCase";
        /// Reference count is frozen
        const LOCKED = 0x0010, "Locked";
        /// Created to carry a return value; released in bulk
        const TEMPORARY_RETURN_REFERENCE = 0x0020, "TemporaryReturnReference";
        /// Disposed automatically when the reference count returns to zero
        const AUTO_DISPOSE = 0x0040, "AutoDispose";
        /// Created by the engine rather than by the caller
        const INTERNAL = 0x0080, "Internal";
    }
}

flag_set! {
    /// Native module flags
    pub struct ModuleFlags(u8) {
        /// The module may never be physically unloaded
        const NO_UNLOAD = 0x01, "NoUnload";
        /// The module was found through a configured search path
        const SEARCHED = 0x02, "Searched";
    }
}

flag_set! {
    /// Candidate ranking policy
    pub struct ReorderFlags(u8) {
        /// Break specificity ties by preferring fewer parameters
        const FEWEST_PARAMETERS = 0x01, "FewestParameters";
        /// Break specificity ties by preferring more parameters
        const MOST_PARAMETERS = 0x02, "MostParameters";
        /// Log rankings even without the trace option
        const TRACE_RESULTS = 0x04, "TraceResults";
    }
}

flag_set! {
    /// By-reference write-back policy
    pub struct ByRefArgumentFlags(u8) {
        /// Stringify complex values instead of creating handles
        const TO_STRING = 0x01, "ToString";
        /// Log write-back failures instead of failing the call
        const NO_COMPLAIN = 0x02, "NoComplain";
        /// Skip variables that did not exist before the call
        const EXISTING_ONLY = 0x04, "ExistingOnly";
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_default() {
        assert!(BindingFlags::DEFAULT.contains(BindingFlags::PUBLIC));
        assert!(BindingFlags::DEFAULT.contains(BindingFlags::STATIC | BindingFlags::INSTANCE));
        assert!(!BindingFlags::DEFAULT.contains(BindingFlags::NON_PUBLIC));
    }

    #[test]
    fn test_parse_replace() {
        let flags = BindingFlags::parse_with("Public, Static", BindingFlags::DEFAULT).unwrap();
        assert_eq!(flags, BindingFlags::PUBLIC | BindingFlags::STATIC);
    }

    #[test]
    fn test_parse_relative() {
        let flags = BindingFlags::parse_with("+NonPublic -Static", BindingFlags::DEFAULT).unwrap();
        assert!(flags.contains(BindingFlags::NON_PUBLIC));
        assert!(!flags.contains(BindingFlags::STATIC));
        assert!(flags.contains(BindingFlags::PUBLIC));
    }

    #[test]
    fn test_parse_case_insensitive_and_none() {
        assert_eq!(ModuleFlags::parse("noUNLOAD").unwrap(), ModuleFlags::NO_UNLOAD);
        assert_eq!(ModuleFlags::parse("None").unwrap(), ModuleFlags::NONE);
        assert_eq!(ModuleFlags::parse("").unwrap(), ModuleFlags::NONE);
    }

    #[test]
    fn test_parse_unknown() {
        let err = ObjectFlags::parse("Bogus").unwrap_err();
        assert!(err.contains("bad ObjectFlags value \"Bogus\""));
        assert!(err.contains("NoDispose"));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            (ObjectFlags::NO_DISPOSE | ObjectFlags::LOCKED).to_string(),
            "NoDispose, Locked"
        );
        assert_eq!(MarshalFlags::NONE.to_string(), "None");
    }
}
