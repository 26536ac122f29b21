//! Vigil Database Layer
//!
//! `SQLite` storage for the script history that drives anomaly detection.
//! Uses `SQLx` with embedded migrations and a WAL journal so concurrent
//! scans can append safely.
//!
//! # Example
//!
//! ```ignore
//! use vigil_db::{Database, ScriptRecord};
//!
//! let db = Database::open("history.db").await?;
//! db.run_migrations().await?;
//! db.record_script(&record).await?;
//! let counts = db.hash_frequencies("shop.example").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod migrations;
pub mod script_history;

// Re-export commonly used types
pub use error::{DatabaseError, Result};
pub use script_history::{ScriptRecord, StoredScript};

use std::collections::HashMap;
use std::path::Path;

/// Long-lived handle to the history database, shared across scans.
#[derive(Debug, Clone)]
pub struct Database {
    pool: sqlx::Pool<sqlx::Sqlite>,
}

impl Database {
    /// Open (creating if needed) the database at `path`.
    ///
    /// Use `:memory:` for a throwaway in-memory database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::open_pool(path).await?;
        Ok(Self { pool })
    }

    /// Open the database and bring its schema up to date.
    pub async fn open_and_migrate(path: impl AsRef<Path>) -> Result<Self> {
        let db = Self::open(path).await?;
        db.run_migrations().await?;
        let schema_version = db.get_schema_version().await?;
        tracing::info!(schema_version, "scan history database ready");
        Ok(db)
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: sqlx::Pool<sqlx::Sqlite>) -> Self {
        Self { pool }
    }

    /// Run all pending database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Highest applied migration version.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Underlying `SQLx` pool for custom queries.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        &self.pool
    }

    /// Append one script observation.
    pub async fn record_script(&self, record: &ScriptRecord) -> Result<()> {
        script_history::record_script(&self.pool, record).await
    }

    /// Per-hash observation counts for a domain.
    pub async fn hash_frequencies(&self, domain: &str) -> Result<HashMap<String, u64>> {
        script_history::hash_frequencies(&self.pool, domain).await
    }

    /// Scripts recorded by one scan.
    pub async fn scripts_for_scan(&self, scan_id: &str) -> Result<Vec<StoredScript>> {
        script_history::scripts_for_scan(&self.pool, scan_id).await
    }

    /// Close every connection.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_creation() {
        let db = Database::open(":memory:").await.expect("create database");
        assert_eq!(db.get_schema_version().await.expect("get version"), 0);
    }

    #[tokio::test]
    async fn test_open_and_migrate() {
        let db = Database::open_and_migrate(":memory:")
            .await
            .expect("create database");
        assert_eq!(db.get_schema_version().await.expect("get version"), 1);

        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('scan_scripts') ORDER BY cid")
                .fetch_all(db.pool())
                .await
                .expect("query columns");
        assert_eq!(
            columns,
            vec![
                "id",
                "scan_id",
                "domain",
                "script_url",
                "hash",
                "response_size",
                "recorded_at"
            ]
        );
    }

    #[tokio::test]
    async fn test_history_survives_reopen() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("history.db");

        let db = Database::open_and_migrate(&path).await.expect("open");
        db.record_script(&ScriptRecord {
            scan_id: "scan-1".to_string(),
            domain: "shop.example".to_string(),
            script_url: "https://shop.example/app.js".to_string(),
            hash: "abc".to_string(),
            response_size: Some(42),
        })
        .await
        .expect("record");
        db.close().await;

        let db = Database::open_and_migrate(&path).await.expect("reopen");
        let freq = db.hash_frequencies("shop.example").await.expect("frequencies");
        assert_eq!(freq.get("abc"), Some(&1));
    }

    #[tokio::test]
    async fn test_database_close() {
        let db = Database::open(":memory:").await.expect("create database");
        db.close().await;
    }
}
