//! Checkout interaction ledger
//!
//! Append-only records of checkout episodes. An interaction is open while
//! `date_of_return` is NULL; closing sets the return date and nothing else.
//! Records are never deleted.

use crate::db::Store;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

/// One checkout episode for a (device, user) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: Uuid,
    #[serde(rename = "deviceID")]
    pub device_id: String,
    pub device_name: String,
    pub device_inv_nr: Option<String>,
    pub username: String,
    pub date_of_checkout: DateTime<Utc>,
    pub date_of_return: Option<DateTime<Utc>>,
}

impl Interaction {
    /// Create a new open interaction with checkout time = now
    pub fn new(
        device_id: String,
        device_name: String,
        device_inv_nr: Option<String>,
        username: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id,
            device_name,
            device_inv_nr,
            username,
            date_of_checkout: Utc::now(),
            date_of_return: None,
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::InvalidRecord(format!("Bad interaction timestamp {:?}: {}", raw, e)))
}

fn interaction_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Interaction> {
    let id_str: String = row.get("id");
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| Error::InvalidRecord(format!("Bad interaction id {:?}: {}", id_str, e)))?;

    let checkout_str: String = row.get("date_of_checkout");
    let return_str: Option<String> = row.get("date_of_return");

    Ok(Interaction {
        id,
        device_id: row.get("device_id"),
        device_name: row.get("device_name"),
        device_inv_nr: row.get("device_inv_nr"),
        username: row.get("username"),
        date_of_checkout: parse_timestamp(&checkout_str)?,
        date_of_return: return_str.as_deref().map(parse_timestamp).transpose()?,
    })
}

/// Append an interaction to the ledger
pub async fn insert_interaction(store: &Store, interaction: &Interaction) -> Result<()> {
    sqlx::query(&format!(
        r#"
        INSERT INTO "{}" (
            id, device_id, device_name, device_inv_nr, username,
            date_of_checkout, date_of_return
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        store.collections().interactions
    ))
    .bind(interaction.id.to_string())
    .bind(&interaction.device_id)
    .bind(&interaction.device_name)
    .bind(&interaction.device_inv_nr)
    .bind(&interaction.username)
    .bind(interaction.date_of_checkout.to_rfc3339())
    .bind(interaction.date_of_return.map(|t| t.to_rfc3339()))
    .execute(store.pool())
    .await?;

    Ok(())
}

/// Close every open interaction for (device, user), returning how many closed
///
/// More than one open match can exist if prior runs left inconsistent state;
/// all of them get the same return date.
pub async fn close_open(
    store: &Store,
    device_id: &str,
    username: &str,
    returned_at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(&format!(
        r#"
        UPDATE "{}"
        SET date_of_return = ?
        WHERE device_id = ? AND username = ? AND date_of_return IS NULL
        "#,
        store.collections().interactions
    ))
    .bind(returned_at.to_rfc3339())
    .bind(device_id)
    .bind(username)
    .execute(store.pool())
    .await?;

    Ok(result.rows_affected())
}

/// Query open interactions for a (device, user) pair
pub async fn find_open(store: &Store, device_id: &str, username: &str) -> Result<Vec<Interaction>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT id, device_id, device_name, device_inv_nr, username,
               date_of_checkout, date_of_return
        FROM "{}"
        WHERE device_id = ? AND username = ? AND date_of_return IS NULL
        "#,
        store.collections().interactions
    ))
    .bind(device_id)
    .bind(username)
    .fetch_all(store.pool())
    .await?;

    rows.iter().map(interaction_from_row).collect()
}

/// Load all interactions for a device (diagnostics and tests)
pub async fn list_for_device(store: &Store, device_id: &str) -> Result<Vec<Interaction>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT id, device_id, device_name, device_inv_nr, username,
               date_of_checkout, date_of_return
        FROM "{}"
        WHERE device_id = ?
        ORDER BY date_of_checkout
        "#,
        store.collections().interactions
    ))
    .bind(device_id)
    .fetch_all(store.pool())
    .await?;

    rows.iter().map(interaction_from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Collections;

    fn open_interaction(device_id: &str, username: &str) -> Interaction {
        Interaction::new(
            device_id.to_string(),
            "MacBook Air".to_string(),
            Some("INV-007".to_string()),
            username.to_string(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_find_open() {
        let store = Store::open_in_memory(Collections::default())
            .await
            .unwrap();

        let interaction = open_interaction("DEV-001", "alice");
        insert_interaction(&store, &interaction).await.unwrap();

        let open = find_open(&store, "DEV-001", "alice").await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, interaction.id);
        assert!(open[0].date_of_return.is_none());

        // Different user sees nothing open
        assert!(find_open(&store, "DEV-001", "bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_open_sets_return_date() {
        let store = Store::open_in_memory(Collections::default())
            .await
            .unwrap();

        insert_interaction(&store, &open_interaction("DEV-002", "bob"))
            .await
            .unwrap();

        let returned_at = Utc::now();
        let closed = close_open(&store, "DEV-002", "bob", returned_at).await.unwrap();
        assert_eq!(closed, 1);

        assert!(find_open(&store, "DEV-002", "bob").await.unwrap().is_empty());
        let all = list_for_device(&store, "DEV-002").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].date_of_return.unwrap().to_rfc3339(), returned_at.to_rfc3339());
    }

    #[tokio::test]
    async fn test_close_open_handles_multiple_stale_records() {
        let store = Store::open_in_memory(Collections::default())
            .await
            .unwrap();

        // Inconsistent prior state: two open interactions for the same pair
        insert_interaction(&store, &open_interaction("DEV-003", "carol"))
            .await
            .unwrap();
        insert_interaction(&store, &open_interaction("DEV-003", "carol"))
            .await
            .unwrap();

        let closed = close_open(&store, "DEV-003", "carol", Utc::now()).await.unwrap();
        assert_eq!(closed, 2);
        assert!(find_open(&store, "DEV-003", "carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_with_nothing_open_is_a_noop() {
        let store = Store::open_in_memory(Collections::default())
            .await
            .unwrap();

        let closed = close_open(&store, "DEV-404", "dave", Utc::now()).await.unwrap();
        assert_eq!(closed, 0);
    }
}
