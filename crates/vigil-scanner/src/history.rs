//! Script history stores.
//!
//! The recorder appends to a store and the anomaly detector reads from the
//! same one; both receive it explicitly at construction.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use vigil_db::{Database, ScriptRecord};

/// Append-only log of script observations, queryable per domain.
#[async_trait]
pub trait ScriptHistory: Send + Sync {
    /// Append one observation.
    async fn append(&self, record: &ScriptRecord) -> Result<()>;

    /// Number of times each hash has been recorded for a domain.
    async fn hash_frequencies(&self, domain: &str) -> Result<HashMap<String, u64>>;
}

/// History backed by the `scan_scripts` table.
#[derive(Debug, Clone)]
pub struct SqliteScriptHistory {
    db: Database,
}

impl SqliteScriptHistory {
    /// Wrap an open, migrated database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl ScriptHistory for SqliteScriptHistory {
    async fn append(&self, record: &ScriptRecord) -> Result<()> {
        self.db.record_script(record).await?;
        Ok(())
    }

    async fn hash_frequencies(&self, domain: &str) -> Result<HashMap<String, u64>> {
        Ok(self.db.hash_frequencies(domain).await?)
    }
}

/// Process-local history.
#[derive(Debug, Default)]
pub struct InMemoryScriptHistory {
    records: Mutex<Vec<ScriptRecord>>,
}

impl InMemoryScriptHistory {
    /// Empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, in append order.
    pub fn records(&self) -> Vec<ScriptRecord> {
        self.records.lock().expect("history lock poisoned").clone()
    }
}

#[async_trait]
impl ScriptHistory for InMemoryScriptHistory {
    async fn append(&self, record: &ScriptRecord) -> Result<()> {
        self.records
            .lock()
            .expect("history lock poisoned")
            .push(record.clone());
        Ok(())
    }

    async fn hash_frequencies(&self, domain: &str) -> Result<HashMap<String, u64>> {
        let records = self.records.lock().expect("history lock poisoned");
        let mut counts = HashMap::new();
        for record in records.iter().filter(|r| r.domain == domain) {
            *counts.entry(record.hash.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
