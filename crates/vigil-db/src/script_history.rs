//! Append-only history of scripts observed during scans.
//!
//! Each row records one script seen by one scan. A failed fetch is stored
//! with `response_size = -1`.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashMap;

const FETCH_FAILED_SIZE: i64 = -1;

/// A script observation as written to `scan_scripts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRecord {
    /// Scan that observed the script
    pub scan_id: String,
    /// Network location of the scanned page
    pub domain: String,
    /// Absolute script URL
    pub script_url: String,
    /// Identity hash of the script URL
    pub hash: String,
    /// Body size in bytes, `None` if the fetch failed
    pub response_size: Option<u64>,
}

/// A stored row, with the time it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredScript {
    /// The record as appended
    pub record: ScriptRecord,
    /// When it was written
    pub recorded_at: DateTime<Utc>,
}

/// Append one script observation.
///
/// # Errors
/// Returns `DatabaseError::Sqlx` if the insert fails.
pub async fn record_script(pool: &Pool<Sqlite>, record: &ScriptRecord) -> Result<()> {
    let size = record
        .response_size
        .and_then(|s| i64::try_from(s).ok())
        .unwrap_or(FETCH_FAILED_SIZE);

    sqlx::query(
        "INSERT INTO scan_scripts (scan_id, domain, script_url, hash, response_size, recorded_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.scan_id)
    .bind(&record.domain)
    .bind(&record.script_url)
    .bind(&record.hash)
    .bind(size)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Number of observations per hash for a domain, across all scans.
///
/// # Errors
/// Returns `DatabaseError::Sqlx` if the query fails.
pub async fn hash_frequencies(pool: &Pool<Sqlite>, domain: &str) -> Result<HashMap<String, u64>> {
    let rows = sqlx::query(
        "SELECT hash, COUNT(*) AS occurrences
         FROM scan_scripts
         WHERE domain = ?
         GROUP BY hash",
    )
    .bind(domain)
    .fetch_all(pool)
    .await?;

    let mut frequencies = HashMap::with_capacity(rows.len());
    for row in rows {
        let hash: String = row.try_get("hash")?;
        let occurrences: i64 = row.try_get("occurrences")?;
        frequencies.insert(hash, u64::try_from(occurrences).unwrap_or(0));
    }
    Ok(frequencies)
}

/// Every script recorded for a scan, in insertion order.
///
/// # Errors
/// Returns `DatabaseError::Sqlx` if the query fails.
pub async fn scripts_for_scan(pool: &Pool<Sqlite>, scan_id: &str) -> Result<Vec<StoredScript>> {
    let rows = sqlx::query(
        "SELECT scan_id, domain, script_url, hash, response_size, recorded_at
         FROM scan_scripts
         WHERE scan_id = ?
         ORDER BY id",
    )
    .bind(scan_id)
    .fetch_all(pool)
    .await?;

    let mut scripts = Vec::with_capacity(rows.len());
    for row in rows {
        let size: i64 = row.try_get("response_size")?;
        let recorded_at: String = row.try_get("recorded_at")?;
        let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

        scripts.push(StoredScript {
            record: ScriptRecord {
                scan_id: row.try_get("scan_id")?,
                domain: row.try_get("domain")?,
                script_url: row.try_get("script_url")?,
                hash: row.try_get("hash")?,
                response_size: u64::try_from(size).ok(),
            },
            recorded_at,
        });
    }
    Ok(scripts)
}
