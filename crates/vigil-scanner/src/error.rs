//! Error types for scan orchestration.

use std::time::Duration;
use thiserror::Error;
use vigil_browser::{BrowserError, PoolError};
use vigil_db::DatabaseError;
use vigil_rules::RuleError;

/// Errors surfaced by an inspection or by the components it drives.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Navigation failed or exceeded the scan timeout
    #[error("target unreachable: {url}: {cause}")]
    UnreachableTarget {
        /// Requested URL
        url: String,
        /// What went wrong
        cause: String,
    },

    /// Persona id not present in the registry
    #[error("unknown persona: {persona_id}")]
    InvalidPersona {
        /// Requested persona id
        persona_id: String,
    },

    /// URL does not parse or is not `http`/`https`
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// Offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Dark-pattern classifier could not produce probabilities
    #[error("classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    /// A referenced script could not be fetched
    #[error("failed to fetch script {url}: {cause}")]
    ScriptFetchFailed {
        /// Script URL
        url: String,
        /// What went wrong
        cause: String,
    },

    /// No browsing context became available in time
    #[error("no browsing context available after {waited:?}")]
    PoolExhaustionTimeout {
        /// How long the scan waited
        waited: Duration,
    },

    /// Context pool refused the request
    #[error("context pool error: {0}")]
    Pool(PoolError),

    /// Browser error outside navigation
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    /// History store error
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Rule loading or evaluation error
    #[error("rule error: {0}")]
    Rules(#[from] RuleError),

    /// Configuration could not be resolved
    #[error("configuration error: {0}")]
    Config(#[from] vigil_core::ConfigError),

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Discriminant of a [`ScanError`], for callers that branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanErrorKind {
    /// [`ScanError::UnreachableTarget`]
    UnreachableTarget,
    /// [`ScanError::InvalidPersona`]
    InvalidPersona,
    /// [`ScanError::InvalidUrl`]
    InvalidUrl,
    /// [`ScanError::ClassifierUnavailable`]
    ClassifierUnavailable,
    /// [`ScanError::ScriptFetchFailed`]
    ScriptFetchFailed,
    /// [`ScanError::PoolExhaustionTimeout`]
    PoolExhaustionTimeout,
    /// [`ScanError::Pool`]
    Pool,
    /// [`ScanError::Browser`]
    Browser,
    /// [`ScanError::Database`]
    Database,
    /// [`ScanError::Rules`]
    Rules,
    /// [`ScanError::Config`]
    Config,
    /// [`ScanError::Http`]
    Http,
    /// [`ScanError::Io`]
    Io,
}

impl ScanError {
    /// Kind of this error.
    #[must_use]
    pub fn kind(&self) -> ScanErrorKind {
        match self {
            Self::UnreachableTarget { .. } => ScanErrorKind::UnreachableTarget,
            Self::InvalidPersona { .. } => ScanErrorKind::InvalidPersona,
            Self::InvalidUrl { .. } => ScanErrorKind::InvalidUrl,
            Self::ClassifierUnavailable(_) => ScanErrorKind::ClassifierUnavailable,
            Self::ScriptFetchFailed { .. } => ScanErrorKind::ScriptFetchFailed,
            Self::PoolExhaustionTimeout { .. } => ScanErrorKind::PoolExhaustionTimeout,
            Self::Pool(_) => ScanErrorKind::Pool,
            Self::Browser(_) => ScanErrorKind::Browser,
            Self::Database(_) => ScanErrorKind::Database,
            Self::Rules(_) => ScanErrorKind::Rules,
            Self::Config(_) => ScanErrorKind::Config,
            Self::Http(_) => ScanErrorKind::Http,
            Self::Io(_) => ScanErrorKind::Io,
        }
    }

    /// Whether running the same scan again might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ScanErrorKind::UnreachableTarget
    }
}

impl From<PoolError> for ScanError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Exhausted { waited } => Self::PoolExhaustionTimeout { waited },
            PoolError::Browser(e) => Self::Browser(e),
            other => Self::Pool(other),
        }
    }
}

/// Result type for scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;
