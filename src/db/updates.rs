//! Run snapshot records
//!
//! One immutable record per import run, keyed by a gapless monotonic
//! `update_number` allocated as max(existing) + 1. The `snapshot` column
//! holds a JSON copy of the registry captured before the run's first write,
//! or NULL when the registry was empty pre-run.

use crate::db::Store;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// Audit record for one import run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub update_number: i64,
    /// Zero-padded document identifier, e.g. "Update0004"
    pub doc_id: String,
    pub update_date: DateTime<Utc>,
    /// Registry size after the run
    pub total_devices: i64,
    pub new_devices: i64,
    pub changed_devices: i64,
    /// Pre-run registry copy as JSON; None when the registry was empty
    pub snapshot: Option<String>,
}

/// Derive the document identifier from an update number
///
/// Padded to four digits; numbers past 9999 simply exceed the padding.
pub fn doc_id(update_number: i64) -> String {
    format!("Update{:04}", update_number)
}

/// Highest existing update number, or 0 if no run has been recorded
pub async fn latest_update_number(store: &Store) -> Result<i64> {
    let latest: Option<i64> = sqlx::query_scalar(&format!(
        r#"
        SELECT update_number
        FROM "{}"
        ORDER BY update_number DESC
        LIMIT 1
        "#,
        store.collections().updates
    ))
    .fetch_optional(store.pool())
    .await?;

    Ok(latest.unwrap_or(0))
}

/// Persist a run snapshot (write-once; snapshots are never updated)
pub async fn insert_snapshot(store: &Store, snapshot: &RunSnapshot) -> Result<()> {
    sqlx::query(&format!(
        r#"
        INSERT INTO "{}" (
            update_number, doc_id, update_date, total_devices,
            new_devices, changed_devices, snapshot
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        store.collections().updates
    ))
    .bind(snapshot.update_number)
    .bind(&snapshot.doc_id)
    .bind(snapshot.update_date.to_rfc3339())
    .bind(snapshot.total_devices)
    .bind(snapshot.new_devices)
    .bind(snapshot.changed_devices)
    .bind(&snapshot.snapshot)
    .execute(store.pool())
    .await?;

    Ok(())
}

/// Load a run snapshot by update number
pub async fn get_snapshot(store: &Store, update_number: i64) -> Result<Option<RunSnapshot>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT update_number, doc_id, update_date, total_devices,
               new_devices, changed_devices, snapshot
        FROM "{}"
        WHERE update_number = ?
        "#,
        store.collections().updates
    ))
    .bind(update_number)
    .fetch_optional(store.pool())
    .await?;

    match row {
        Some(row) => {
            let date_str: String = row.get("update_date");
            let update_date = DateTime::parse_from_rfc3339(&date_str)
                .map_err(|e| {
                    Error::InvalidRecord(format!("Bad snapshot timestamp {:?}: {}", date_str, e))
                })?
                .with_timezone(&Utc);

            Ok(Some(RunSnapshot {
                update_number: row.get("update_number"),
                doc_id: row.get("doc_id"),
                update_date,
                total_devices: row.get("total_devices"),
                new_devices: row.get("new_devices"),
                changed_devices: row.get("changed_devices"),
                snapshot: row.get("snapshot"),
            }))
        }
        None => Ok(None),
    }
}
