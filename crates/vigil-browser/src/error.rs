use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("page query failed: {0}")]
    QueryError(String),

    #[error("browser not found: {0}")]
    BrowserNotFound(String),
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no browser context became available within {waited:?}")]
    Exhausted { waited: Duration },

    #[error("context pool is shut down")]
    Closed,

    #[error("cannot shut down pool: {0} context(s) still checked out")]
    ContextsCheckedOut(usize),

    #[error("pool size must be at least 1")]
    InvalidSize,

    #[error("failed to create browser context: {0}")]
    Browser(#[from] BrowserError),
}

#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("persona not found: {0}")]
    NotFound(String),

    #[error("failed to read persona registry {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse persona registry {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
