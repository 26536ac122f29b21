//! Errors from the script history store.

use thiserror::Error;

/// Errors opening, migrating or querying the history database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Database file or connection string could not be opened
    #[error("failed to open history database: {0}")]
    Open(String),

    /// Embedded schema migrations failed
    #[error("history schema migration failed: {0}")]
    Migration(String),

    /// Query or insert failed
    #[error("history query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Parent directory of the database file could not be created
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for history database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_error_message() {
        let err = DatabaseError::Migration("checksum mismatch for version 1".to_string());
        assert_eq!(
            err.to_string(),
            "history schema migration failed: checksum mismatch for version 1"
        );
    }

    #[tokio::test]
    async fn test_unwritable_parent_is_io_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").expect("write blocker");

        let err = crate::connection::open_pool(blocker.join("history.db"))
            .await
            .expect_err("parent is a file");
        assert!(matches!(err, DatabaseError::Io(_)));
    }
}
