//! Engine error taxonomy

use ferry_sdk::HostError;
use thiserror::Error;

use crate::handles::HandleKind;
use crate::native::LoadError;
use crate::settings::SettingsError;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Failure to coerce one argument toward one candidate's parameter.
///
/// Coercion errors never abort a request on their own; they are collected
/// per candidate and surfaced only when no candidate survives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{member}: argument {position} ({parameter}): {reason}")]
pub struct CoercionError {
    /// Signature of the candidate that was eliminated
    pub member: String,
    /// Zero-based argument position (arity errors use the argument count)
    pub position: usize,
    /// Parameter name, or `*` for arity errors
    pub parameter: String,
    /// Why the value was rejected
    pub reason: String,
}

impl CoercionError {
    /// Create an error for one parameter
    pub fn new(
        member: impl Into<String>,
        position: usize,
        parameter: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            member: member.into(),
            position,
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}

fn render_list<T: std::fmt::Display>(errors: &[T]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let mut out = String::from(":");
    for error in errors {
        out.push_str("\n    ");
        out.push_str(&error.to_string());
    }
    out
}

/// Errors produced by engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// No type could be resolved from a name
    #[error("type \"{name}\" not found{}", render_list(.errors))]
    TypeNotFound {
        /// Requested type name
        name: String,
        /// Resolution attempts that failed along the way
        errors: Vec<String>,
    },

    /// The member does not exist, or no overload accepted the arguments
    #[error(
        "{}{}",
        member_not_found(.type_name, .member, .errors.is_empty()),
        render_list(.errors)
    )]
    MemberNotFound {
        /// Type that was searched
        type_name: String,
        /// Requested member name
        member: String,
        /// Per-candidate coercion failures
        errors: Vec<CoercionError>,
    },

    /// More than one overload matched under strict member mode
    #[error(
        "matched {count} method overloads on type \"{type_name}\" for \"{member}\", need exactly 1"
    )]
    AmbiguousMember {
        /// Type that was searched
        type_name: String,
        /// Requested member name
        member: String,
        /// Number of viable candidates
        count: usize,
    },

    /// Explicit candidate index out of range
    #[error("{}", invalid_index(.index, .count))]
    InvalidIndex {
        /// Requested index
        index: usize,
        /// Number of viable candidates
        count: usize,
    },

    /// A single argument could not be coerced
    #[error("{0}")]
    CoercionFailed(CoercionError),

    /// The foreign call raised a failure
    #[error("invocation of \"{member}\" failed: {source}")]
    InvocationFailed {
        /// Signature of the invoked member
        member: String,
        /// Diagnostic code recorded in the interpreter error state
        code: i32,
        /// Underlying host failure
        source: HostError,
    },

    /// The interpreter is read-only
    #[error("permission denied: interpreter is read-only, cannot {operation}")]
    ReadOnlyViolation {
        /// Operation that was refused
        operation: String,
    },

    /// The module may not be unloaded
    #[error("module \"{name}\" is locked and cannot be unloaded")]
    ModuleLocked {
        /// Module handle name
        name: String,
    },

    /// The exported symbol does not exist
    #[error("symbol \"{symbol}\" not found in module \"{module}\"")]
    SymbolNotFound {
        /// Requested symbol
        symbol: String,
        /// Module handle name
        module: String,
    },

    /// A call was attempted on a binding without an entry address
    #[error("call binding \"{name}\" is not resolved")]
    UnboundCallBinding {
        /// Binding handle name
        name: String,
    },

    /// An alias with that name already exists
    #[error("alias \"{alias}\" already exists")]
    AliasExists {
        /// Alias name
        alias: String,
    },

    /// The alias could not be created
    #[error("cannot create alias for \"{name}\": {reason}")]
    AliasCreationFailed {
        /// Handle name
        name: String,
        /// Reason
        reason: String,
    },

    /// No handle with that name
    #[error("handle \"{name}\" not found")]
    HandleNotFound {
        /// Handle or alias name
        name: String,
    },

    /// A handle with outstanding references cannot be disposed
    #[error("handle \"{name}\" is in use ({ref_count} references)")]
    HandleInUse {
        /// Handle name
        name: String,
        /// Outstanding references
        ref_count: usize,
    },

    /// A handle name already exists
    #[error("handle \"{name}\" already exists")]
    HandleExists {
        /// Handle name
        name: String,
    },

    /// The handle refers to a different kind of value
    #[error("handle \"{name}\" is {actual}, expected {expected}")]
    WrongHandleKind {
        /// Handle name
        name: String,
        /// Required kind
        expected: HandleKind,
        /// Actual kind
        actual: HandleKind,
    },

    /// Teardown of a foreign value failed
    #[error("failed to dispose \"{name}\": {source}")]
    DisposeFailed {
        /// Handle name
        name: String,
        /// Underlying host failure
        source: HostError,
    },

    /// Loading a native module failed
    #[error(transparent)]
    ModuleLoadFailed(#[from] LoadError),

    /// A native signature could not be built
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// A by-reference result could not be stored
    #[error("could not write back argument to \"{variable}\": {reason}")]
    ByRefWriteBackFailed {
        /// Target variable
        variable: String,
        /// Reason
        reason: String,
    },

    /// An option or argument value was rejected
    #[error("{0}")]
    InvalidArgument(String),

    /// Settings could not be loaded
    #[error(transparent)]
    Config(#[from] SettingsError),
}

fn member_not_found(type_name: &str, member: &str, no_candidates: bool) -> String {
    if no_candidates {
        format!("member \"{}\" not found on type \"{}\"", member, type_name)
    } else {
        format!(
            "no overload of \"{}\" on type \"{}\" matched the supplied arguments",
            member, type_name
        )
    }
}

fn invalid_index(index: &usize, count: &usize) -> String {
    if *count == 0 {
        format!("invalid method index {}, there are no candidates", index)
    } else {
        format!("invalid method index {}, must be 0..{}", index, count - 1)
    }
}

impl EngineError {
    /// Shorthand for [`EngineError::InvalidArgument`]
    pub fn invalid(message: impl Into<String>) -> Self {
        EngineError::InvalidArgument(message.into())
    }

    /// Whether this is a "not found" style error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::TypeNotFound { .. }
                | EngineError::MemberNotFound { .. }
                | EngineError::HandleNotFound { .. }
                | EngineError::SymbolNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_not_found_messages() {
        let missing = EngineError::MemberNotFound {
            type_name: "Demo.T".into(),
            member: "Go".into(),
            errors: vec![],
        };
        assert_eq!(missing.to_string(), "member \"Go\" not found on type \"Demo.T\"");

        let mismatch = EngineError::MemberNotFound {
            type_name: "Demo.T".into(),
            member: "Go".into(),
            errors: vec![CoercionError::new(
                "Void Go(System.Int32 n)",
                0,
                "n",
                "expected integer but got \"x\"",
            )],
        };
        let text = mismatch.to_string();
        assert!(text.starts_with("no overload of \"Go\""));
        assert!(text.contains("argument 0 (n): expected integer"));
    }

    #[test]
    fn test_invalid_index_message() {
        let err = EngineError::InvalidIndex { index: 4, count: 2 };
        assert_eq!(err.to_string(), "invalid method index 4, must be 0..1");
        let err = EngineError::InvalidIndex { index: 0, count: 0 };
        assert!(err.to_string().contains("no candidates"));
    }

    #[test]
    fn test_type_not_found_lists_attempts() {
        let err = EngineError::TypeNotFound {
            name: "Foo".into(),
            errors: vec!["no exact match".into()],
        };
        assert_eq!(err.to_string(), "type \"Foo\" not found:\n    no exact match");
        assert!(err.is_not_found());
    }
}
