//! Device registry operations
//!
//! Devices are keyed by their externally assigned `deviceID` and are never
//! deleted. `deviceName` and `deviceType` are immutable after creation;
//! `currentUser` changes only through the checkout/return flow, so no update
//! here ever writes it alongside attribute changes.

use crate::db::Store;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// The device attribute group as exported by the inventory source
///
/// `device_name` and `device_type` are immutable; the remaining fields are
/// the mutable group overwritten by whitelisted CSV updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAttributes {
    pub device_name: String,
    pub device_type: String,
    pub inv_nr: Option<String>,
    pub publisher: Option<String>,
    pub os: Option<String>,
    pub os_version: Option<String>,
    pub sticker_number: Option<String>,
}

impl DeviceAttributes {
    /// Structural equality over the mutable field group only
    pub fn mutable_fields_eq(&self, other: &DeviceAttributes) -> bool {
        self.inv_nr == other.inv_nr
            && self.publisher == other.publisher
            && self.os == other.os
            && self.os_version == other.os_version
            && self.sticker_number == other.sticker_number
    }
}

/// Persisted device record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    pub is_retired: bool,
    pub current_user: Option<String>,
    pub is_available: bool,
    #[serde(rename = "attributeList")]
    pub attributes: DeviceAttributes,
}

fn device_from_row(row: &sqlx::sqlite::SqliteRow) -> Device {
    Device {
        device_id: row.get("device_id"),
        is_retired: row.get::<i64, _>("is_retired") != 0,
        current_user: row.get("current_user"),
        is_available: row.get::<i64, _>("is_available") != 0,
        attributes: DeviceAttributes {
            device_name: row.get("device_name"),
            device_type: row.get("device_type"),
            inv_nr: row.get("inv_nr"),
            publisher: row.get("publisher"),
            os: row.get("os"),
            os_version: row.get("os_version"),
            sticker_number: row.get("sticker_number"),
        },
    }
}

/// Load a device by its registry key
pub async fn get_device(store: &Store, device_id: &str) -> Result<Option<Device>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT device_id, device_name, device_type, inv_nr, publisher, os,
               os_version, sticker_number, is_retired, current_user, is_available
        FROM "{}"
        WHERE device_id = ?
        "#,
        store.collections().devices
    ))
    .bind(device_id)
    .fetch_optional(store.pool())
    .await?;

    Ok(row.as_ref().map(device_from_row))
}

/// Insert a newly sighted device verbatim
pub async fn insert_device(store: &Store, device: &Device) -> Result<()> {
    sqlx::query(&format!(
        r#"
        INSERT INTO "{}" (
            device_id, device_name, device_type, inv_nr, publisher, os,
            os_version, sticker_number, is_retired, current_user, is_available
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        store.collections().devices
    ))
    .bind(&device.device_id)
    .bind(&device.attributes.device_name)
    .bind(&device.attributes.device_type)
    .bind(&device.attributes.inv_nr)
    .bind(&device.attributes.publisher)
    .bind(&device.attributes.os)
    .bind(&device.attributes.os_version)
    .bind(&device.attributes.sticker_number)
    .bind(device.is_retired as i64)
    .bind(&device.current_user)
    .bind(device.is_available as i64)
    .execute(store.pool())
    .await?;

    Ok(())
}

/// Persist the merged mutable attribute group plus the retirement flag
///
/// One combined write per changed row. Immutable fields and `current_user`
/// are never touched by this statement.
pub async fn update_attributes(
    store: &Store,
    device_id: &str,
    attributes: &DeviceAttributes,
    is_retired: bool,
) -> Result<()> {
    sqlx::query(&format!(
        r#"
        UPDATE "{}"
        SET inv_nr = ?,
            publisher = ?,
            os = ?,
            os_version = ?,
            sticker_number = ?,
            is_retired = ?
        WHERE device_id = ?
        "#,
        store.collections().devices
    ))
    .bind(&attributes.inv_nr)
    .bind(&attributes.publisher)
    .bind(&attributes.os)
    .bind(&attributes.os_version)
    .bind(&attributes.sticker_number)
    .bind(is_retired as i64)
    .bind(device_id)
    .execute(store.pool())
    .await?;

    Ok(())
}

/// Release a device from its current user (return flow)
pub async fn clear_current_user(store: &Store, device_id: &str) -> Result<()> {
    sqlx::query(&format!(
        r#"
        UPDATE "{}"
        SET current_user = NULL,
            is_available = 1
        WHERE device_id = ?
        "#,
        store.collections().devices
    ))
    .bind(device_id)
    .execute(store.pool())
    .await?;

    Ok(())
}

/// Load the full registry, ordered by device id (snapshot capture)
pub async fn load_all(store: &Store) -> Result<Vec<Device>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT device_id, device_name, device_type, inv_nr, publisher, os,
               os_version, sticker_number, is_retired, current_user, is_available
        FROM "{}"
        ORDER BY device_id
        "#,
        store.collections().devices
    ))
    .fetch_all(store.pool())
    .await?;

    Ok(rows.iter().map(device_from_row).collect())
}

/// Count devices in the registry
pub async fn count_devices(store: &Store) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!(
        r#"SELECT COUNT(*) FROM "{}""#,
        store.collections().devices
    ))
    .fetch_one(store.pool())
    .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Collections;

    fn sample_device(id: &str) -> Device {
        Device {
            device_id: id.to_string(),
            is_retired: false,
            current_user: Some("alice".to_string()),
            is_available: false,
            attributes: DeviceAttributes {
                device_name: "iPad Pro".to_string(),
                device_type: "Tablet".to_string(),
                inv_nr: Some("INV-042".to_string()),
                publisher: Some("Apple".to_string()),
                os: Some("iPadOS".to_string()),
                os_version: Some("17.4".to_string()),
                sticker_number: None,
            },
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_device() {
        let store = Store::open_in_memory(Collections::default())
            .await
            .expect("Failed to open in-memory store");

        let device = sample_device("DEV-001");
        insert_device(&store, &device).await.expect("insert failed");

        let loaded = get_device(&store, "DEV-001")
            .await
            .expect("get failed")
            .expect("device not found");
        assert_eq!(loaded, device);

        assert!(get_device(&store, "DEV-404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_attributes_leaves_identity_and_user_alone() {
        let store = Store::open_in_memory(Collections::default())
            .await
            .unwrap();

        let device = sample_device("DEV-002");
        insert_device(&store, &device).await.unwrap();

        let mut attrs = device.attributes.clone();
        attrs.os_version = Some("17.5".to_string());
        attrs.inv_nr = Some("INV-043".to_string());
        update_attributes(&store, "DEV-002", &attrs, true)
            .await
            .unwrap();

        let loaded = get_device(&store, "DEV-002").await.unwrap().unwrap();
        assert_eq!(loaded.attributes.os_version.as_deref(), Some("17.5"));
        assert_eq!(loaded.attributes.inv_nr.as_deref(), Some("INV-043"));
        assert!(loaded.is_retired);
        // Identity and checkout state untouched
        assert_eq!(loaded.attributes.device_name, "iPad Pro");
        assert_eq!(loaded.current_user.as_deref(), Some("alice"));
        assert!(!loaded.is_available);
    }

    #[tokio::test]
    async fn test_clear_current_user() {
        let store = Store::open_in_memory(Collections::default())
            .await
            .unwrap();

        insert_device(&store, &sample_device("DEV-003")).await.unwrap();
        clear_current_user(&store, "DEV-003").await.unwrap();

        let loaded = get_device(&store, "DEV-003").await.unwrap().unwrap();
        assert!(loaded.current_user.is_none());
        assert!(loaded.is_available);
    }

    #[tokio::test]
    async fn test_load_all_ordered_and_count() {
        let store = Store::open_in_memory(Collections::default())
            .await
            .unwrap();

        insert_device(&store, &sample_device("DEV-B")).await.unwrap();
        insert_device(&store, &sample_device("DEV-A")).await.unwrap();

        let all = load_all(&store).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].device_id, "DEV-A");
        assert_eq!(all[1].device_id, "DEV-B");
        assert_eq!(count_devices(&store).await.unwrap(), 2);
    }

    #[test]
    fn test_snapshot_serialization_uses_export_field_names() {
        let device = sample_device("DEV-XYZ");
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["deviceID"], "DEV-XYZ");
        assert_eq!(json["attributeList"]["deviceName"], "iPad Pro");
        assert_eq!(json["attributeList"]["invNr"], "INV-042");
        assert_eq!(json["currentUser"], "alice");
        assert_eq!(json["isAvailable"], false);
    }
}
