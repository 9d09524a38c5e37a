//! Error types raised by host members

/// Result type for host member calls
pub type HostResult<T> = Result<T, HostError>;

/// Broad classification of a host failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostErrorKind {
    /// The member raised an ordinary failure
    Failure,
    /// An argument was rejected by the member itself
    InvalidArgument,
    /// The object was already torn down
    Disposed,
    /// The operation is not supported by this object
    NotSupported,
    /// The member panicked
    Panic,
}

impl HostErrorKind {
    /// Default diagnostic code attached to the interpreter error state
    pub const fn default_code(&self) -> i32 {
        match self {
            HostErrorKind::Failure => 1,
            HostErrorKind::InvalidArgument => 2,
            HostErrorKind::Disposed => 3,
            HostErrorKind::NotSupported => 4,
            HostErrorKind::Panic => 5,
        }
    }

    /// Short lowercase name used in messages
    pub const fn as_str(&self) -> &'static str {
        match self {
            HostErrorKind::Failure => "failure",
            HostErrorKind::InvalidArgument => "invalid argument",
            HostErrorKind::Disposed => "disposed",
            HostErrorKind::NotSupported => "not supported",
            HostErrorKind::Panic => "panic",
        }
    }
}

/// Failure raised by a host member, constructor, accessor or teardown.
///
/// This is the only error shape that crosses from embedder code into the
/// engine. The engine never unwinds through it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HostError {
    /// Failure classification
    pub kind: HostErrorKind,
    /// Human readable message
    pub message: String,
    /// Optional embedder-specific error code
    pub code: Option<i32>,
}

impl HostError {
    /// Create an error of the given kind
    pub fn new(kind: HostErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    /// Ordinary failure
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::Failure, message)
    }

    /// Argument rejected by the member
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::InvalidArgument, message)
    }

    /// Object already disposed
    pub fn disposed(type_name: &str) -> Self {
        Self::new(
            HostErrorKind::Disposed,
            format!("object of type \"{}\" has been disposed", type_name),
        )
    }

    /// Operation not supported
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::NotSupported, message)
    }

    /// Panic captured at the invocation boundary
    pub fn panic(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::Panic, message)
    }

    /// Attach an explicit error code
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// The explicit code, or the default for this kind
    pub fn effective_code(&self) -> i32 {
        self.code.unwrap_or_else(|| self.kind.default_code())
    }
}

impl From<String> for HostError {
    fn from(s: String) -> Self {
        HostError::failure(s)
    }
}

impl From<&str> for HostError {
    fn from(s: &str) -> Self {
        HostError::failure(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_code() {
        assert_eq!(HostError::failure("x").effective_code(), 1);
        assert_eq!(HostError::panic("x").effective_code(), 5);
        assert_eq!(HostError::failure("x").with_code(-7).effective_code(), -7);
    }

    #[test]
    fn test_from_str() {
        let err: HostError = "boom".into();
        assert_eq!(err.kind, HostErrorKind::Failure);
        assert_eq!(err.to_string(), "boom");
    }
}
