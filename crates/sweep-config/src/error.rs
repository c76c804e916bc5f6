use std::fmt;

/// Configuration failures. All of them are fatal and surface before the
/// pipeline performs any I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A YAML layer could not be read from disk.
    Read { path: String, message: String },
    /// A YAML layer is not valid YAML (or not representable as JSON).
    Yaml(String),
    /// A leaf string looks like a literal credential.
    SecretDetected { pointer: String },
    /// The merged document does not match the typed schema
    /// (unknown key, wrong type, missing required section).
    Schema(String),
    /// A required setting is absent.
    Missing { field: &'static str },
    /// A setting is present but outside its allowed range.
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, message } => {
                write!(f, "CONFIG_READ path={path}: {message}")
            }
            ConfigError::Yaml(msg) => write!(f, "CONFIG_YAML: {msg}"),
            ConfigError::SecretDetected { pointer } => {
                write!(f, "CONFIG_SECRET_DETECTED leaf={pointer} value=REDACTED")
            }
            ConfigError::Schema(msg) => write!(f, "CONFIG_SCHEMA: {msg}"),
            ConfigError::Missing { field } => write!(f, "CONFIG_MISSING field={field}"),
            ConfigError::Invalid { field, reason } => {
                write!(f, "CONFIG_INVALID field={field}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
