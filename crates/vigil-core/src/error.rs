//! Error types shared by every Vigil crate.

use thiserror::Error;

/// Errors from the shared data model and configuration.
#[derive(Error, Debug)]
pub enum VigilError {
    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persona id is empty, padded with whitespace or longer than 64 characters
    #[error("invalid persona id '{0}': use 1-64 characters without surrounding whitespace")]
    InvalidPersonaId(String),

    /// Severity name outside critical/high/medium/low
    #[error("unknown severity '{0}'")]
    UnknownSeverity(String),
}

/// Errors loading, validating or saving [`AppConfig`](crate::AppConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No platform config or data directory could be determined
    #[error("could not determine the Vigil config directory")]
    NoConfigDir,

    /// Config file is not valid TOML for the schema
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Config could not be written back as TOML
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Reading or writing the config file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value is out of range
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field path, e.g. `pool.size`
        field: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Result type using [`VigilError`].
pub type Result<T> = std::result::Result<T, VigilError>;

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
