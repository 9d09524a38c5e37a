//! Engine settings (`ferry.toml`)
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! [object]
//! binding_flags = "Public, Instance, Static"
//! strict_member = true
//! namespaces = ["System", "Demo"]
//!
//! [cleanup]
//! synchronous = false
//!
//! [library]
//! search_paths = ["/opt/native/lib"]
//! calling_convention = "Cdecl"
//!
//! [interpreter]
//! read_only = false
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flags::{BindingFlags, ByRefArgumentFlags, MarshalFlags, ObjectFlags, ReorderFlags};
use crate::native::{CallingConvention, CharSet};

/// Errors that can occur while loading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// IO error reading the settings file
    #[error("failed to read settings file {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// Semantic validation error
    #[error("invalid setting {key}: {message}")]
    Invalid {
        /// Offending key
        key: String,
        /// What is wrong with it
        message: String,
    },
}

/// Root settings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Member resolution and invocation defaults
    pub object: ObjectSettings,
    /// Bulk cleanup defaults
    pub cleanup: CleanupSettings,
    /// Native module and call binding defaults
    pub library: LibrarySettings,
    /// Handle naming
    pub handles: HandleSettings,
    /// Interpreter state
    pub interpreter: InterpreterSettings,
}

/// `[object]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectSettings {
    /// Member visibility filter
    pub binding_flags: BindingFlags,
    /// Argument marshaling policy
    pub marshal_flags: MarshalFlags,
    /// Flags applied to newly created handles
    pub object_flags: ObjectFlags,
    /// Candidate ranking policy
    pub reorder_flags: ReorderFlags,
    /// By-reference write-back policy
    pub by_ref_flags: ByRefArgumentFlags,
    /// Type names must match exactly
    pub strict_type: bool,
    /// More than one viable overload is an error
    pub strict_member: bool,
    /// Argument count must equal parameter count
    pub strict_args: bool,
    /// Re-rank viable overloads by specificity
    pub reorder: bool,
    /// Member and type names ignore case
    pub no_case: bool,
    /// Namespaces tried when a type name is not fully qualified
    pub namespaces: Vec<String>,
}

impl Default for ObjectSettings {
    fn default() -> Self {
        Self {
            binding_flags: BindingFlags::DEFAULT,
            marshal_flags: MarshalFlags::NONE,
            object_flags: ObjectFlags::NONE,
            reorder_flags: ReorderFlags::NONE,
            by_ref_flags: ByRefArgumentFlags::NONE,
            strict_type: false,
            strict_member: false,
            strict_args: false,
            reorder: false,
            no_case: false,
            namespaces: vec!["System".to_string()],
        }
    }
}

/// `[cleanup]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupSettings {
    /// Tear down values immediately rather than queueing them
    pub synchronous: bool,
    /// Abort bulk cleanup at the first failure
    pub stop_on_error: bool,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            synchronous: true,
            stop_on_error: false,
        }
    }
}

/// `[library]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// Directories searched for bare module file names
    pub search_paths: Vec<PathBuf>,
    /// Default calling convention for declarations
    pub calling_convention: CallingConvention,
    /// Default character set for string parameters
    pub char_set: CharSet,
    /// Default best-fit mapping for narrow strings
    pub best_fit_mapping: bool,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            calling_convention: CallingConvention::Winapi,
            char_set: CharSet::None,
            best_fit_mapping: true,
        }
    }
}

/// `[handles]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleSettings {
    /// Prefix of generated module handle names
    pub module_prefix: String,
    /// Prefix of generated call binding handle names
    pub binding_prefix: String,
}

impl Default for HandleSettings {
    fn default() -> Self {
        Self {
            module_prefix: "module".to_string(),
            binding_prefix: "binding".to_string(),
        }
    }
}

/// `[interpreter]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterSettings {
    /// Start in read-only mode
    pub read_only: bool,
}

impl EngineSettings {
    /// Parse settings from a TOML string
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        let settings: EngineSettings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), SettingsError> {
        let marshal = self.object.marshal_flags;
        if marshal.contains(MarshalFlags::ARRAY_AS_VALUE | MarshalFlags::ARRAY_AS_LINK) {
            return Err(SettingsError::Invalid {
                key: "object.marshal_flags".to_string(),
                message: "ArrayAsValue and ArrayAsLink are mutually exclusive".to_string(),
            });
        }
        let reorder = self.object.reorder_flags;
        if reorder.contains(ReorderFlags::FEWEST_PARAMETERS | ReorderFlags::MOST_PARAMETERS) {
            return Err(SettingsError::Invalid {
                key: "object.reorder_flags".to_string(),
                message: "FewestParameters and MostParameters are mutually exclusive".to_string(),
            });
        }
        if self.library.calling_convention == CallingConvention::FastCall {
            return Err(SettingsError::Invalid {
                key: "library.calling_convention".to_string(),
                message: "FastCall is not supported".to_string(),
            });
        }
        for (key, prefix) in [
            ("handles.module_prefix", &self.handles.module_prefix),
            ("handles.binding_prefix", &self.handles.binding_prefix),
        ] {
            if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
                return Err(SettingsError::Invalid {
                    key: key.to_string(),
                    message: format!("\"{}\" is not a valid handle name prefix", prefix),
                });
            }
        }
        Ok(())
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        toml::to_string_pretty(self).map_err(|e| SettingsError::Invalid {
            key: "<root>".to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_is_default() {
        let settings = EngineSettings::from_toml_str("").unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.object.binding_flags, BindingFlags::DEFAULT);
        assert!(settings.cleanup.synchronous);
    }

    #[test]
    fn test_parse_sections() {
        let settings = EngineSettings::from_toml_str(
            r#"
[object]
binding_flags = "Public, Static"
marshal_flags = "DefaultValue"
strict_member = true
namespaces = ["System", "Demo"]

[library]
calling_convention = "Cdecl"
char_set = "Unicode"

[interpreter]
read_only = true
"#,
        )
        .unwrap();
        assert_eq!(
            settings.object.binding_flags,
            BindingFlags::PUBLIC | BindingFlags::STATIC
        );
        assert!(settings.object.marshal_flags.contains(MarshalFlags::DEFAULT_VALUE));
        assert!(settings.object.strict_member);
        assert_eq!(settings.object.namespaces, vec!["System", "Demo"]);
        assert_eq!(settings.library.calling_convention, CallingConvention::Cdecl);
        assert_eq!(settings.library.char_set, CharSet::Unicode);
        assert!(settings.interpreter.read_only);
    }

    #[test]
    fn test_bad_flag_name() {
        let err = EngineSettings::from_toml_str("[object]\nbinding_flags = \"Bogus\"").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn test_validation() {
        let err = EngineSettings::from_toml_str(
            "[object]\nmarshal_flags = \"ArrayAsValue, ArrayAsLink\"",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid { ref key, .. } if key == "object.marshal_flags"
        ));

        let err = EngineSettings::from_toml_str("[library]\ncalling_convention = \"FastCall\"")
            .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { .. }));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cleanup]\nsynchronous = false").unwrap();
        let settings = EngineSettings::from_file(file.path()).unwrap();
        assert!(!settings.cleanup.synchronous);

        let missing = EngineSettings::from_file("/nonexistent/ferry.toml");
        assert!(matches!(missing, Err(SettingsError::Io { .. })));
    }

    #[test]
    fn test_roundtrip_toml() {
        let mut settings = EngineSettings::default();
        settings.object.reorder = true;
        let text = settings.to_toml_string().unwrap();
        assert_eq!(EngineSettings::from_toml_str(&text).unwrap(), settings);
    }
}
