//! Checkout/return lifecycle bookkeeping
//!
//! Ties device state transitions to the interaction ledger and the per-user
//! counters. Writes are independent calls, not a transaction: a crash mid-row
//! can leave partial state, which the defensive close-all in the ledger and
//! the floored user counters tolerate on later runs.

use crate::db::{devices, interactions, users, Store};
use crate::db::devices::Device;
use crate::db::interactions::Interaction;
use crate::error::Result;
use chrono::Utc;
use tracing::{debug, info};

/// Record a checkout episode for a freshly created device
///
/// Creates one open interaction carrying the device's name/id/inventory
/// number, then bumps both user counters (creating the user at 1/1).
pub async fn create_checkout(store: &Store, device: &Device, username: &str) -> Result<()> {
    let interaction = Interaction::new(
        device.device_id.clone(),
        device.attributes.device_name.clone(),
        device.attributes.inv_nr.clone(),
        username.to_string(),
    );
    interactions::insert_interaction(store, &interaction).await?;
    users::record_checkout(store, username).await?;

    info!(
        device_id = %device.device_id,
        username = %username,
        interaction_id = %interaction.id,
        "Checkout recorded for new device"
    );

    Ok(())
}

/// Process a return for (device, user)
///
/// Decrements the user's running counter (floored at zero, missing user
/// tolerated) and closes every open interaction for the pair with the current
/// time. Creates nothing when no interaction is open.
pub async fn process_return(store: &Store, device_id: &str, username: &str) -> Result<u64> {
    users::record_return(store, username).await?;

    let closed = interactions::close_open(store, device_id, username, Utc::now()).await?;
    if closed == 0 {
        debug!(
            device_id = %device_id,
            username = %username,
            "Return with no open interaction"
        );
    } else if closed > 1 {
        // Inconsistent prior state; all stale episodes closed together
        debug!(
            device_id = %device_id,
            username = %username,
            closed = closed,
            "Closed multiple open interactions"
        );
    }

    Ok(closed)
}

/// Handle a device transitioning to retired while checked out
///
/// Clears the device's current user (a write distinct from, and after, any
/// attribute update for the same row), then runs return processing for the
/// persisted username captured before this run's writes.
pub async fn handle_retirement(store: &Store, device_id: &str, username: &str) -> Result<()> {
    devices::clear_current_user(store, device_id).await?;
    process_return(store, device_id, username).await?;

    info!(
        device_id = %device_id,
        username = %username,
        "Retired device checked in from user"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Collections;
    use crate::db::devices::DeviceAttributes;

    fn checked_out_device(id: &str, username: &str) -> Device {
        Device {
            device_id: id.to_string(),
            is_retired: false,
            current_user: Some(username.to_string()),
            is_available: false,
            attributes: DeviceAttributes {
                device_name: "Surface Go".to_string(),
                device_type: "Tablet".to_string(),
                inv_nr: Some("INV-314".to_string()),
                publisher: Some("Microsoft".to_string()),
                os: Some("Windows".to_string()),
                os_version: Some("11".to_string()),
                sticker_number: None,
            },
        }
    }

    #[tokio::test]
    async fn test_checkout_creates_interaction_and_user() {
        let store = Store::open_in_memory(Collections::default())
            .await
            .unwrap();

        let device = checked_out_device("DEV-010", "alice");
        devices::insert_device(&store, &device).await.unwrap();
        create_checkout(&store, &device, "alice").await.unwrap();

        let open = interactions::find_open(&store, "DEV-010", "alice")
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].device_name, "Surface Go");
        assert_eq!(open[0].device_inv_nr.as_deref(), Some("INV-314"));

        let user = users::get_user(&store, "alice").await.unwrap().unwrap();
        assert_eq!(user.current_interactions, 1);
        assert_eq!(user.total_interactions, 1);
    }

    #[tokio::test]
    async fn test_retirement_clears_user_and_closes_episode() {
        let store = Store::open_in_memory(Collections::default())
            .await
            .unwrap();

        let device = checked_out_device("DEV-011", "bob");
        devices::insert_device(&store, &device).await.unwrap();
        create_checkout(&store, &device, "bob").await.unwrap();

        handle_retirement(&store, "DEV-011", "bob").await.unwrap();

        let reloaded = devices::get_device(&store, "DEV-011")
            .await
            .unwrap()
            .unwrap();
        assert!(reloaded.current_user.is_none());
        assert!(reloaded.is_available);

        assert!(interactions::find_open(&store, "DEV-011", "bob")
            .await
            .unwrap()
            .is_empty());

        let user = users::get_user(&store, "bob").await.unwrap().unwrap();
        assert_eq!(user.current_interactions, 0);
        assert_eq!(user.total_interactions, 1);
    }

    #[tokio::test]
    async fn test_return_without_open_interaction_or_user() {
        let store = Store::open_in_memory(Collections::default())
            .await
            .unwrap();

        // Neither a user record nor an open interaction exists
        let closed = process_return(&store, "DEV-012", "ghost").await.unwrap();
        assert_eq!(closed, 0);
        assert!(users::get_user(&store, "ghost").await.unwrap().is_none());
    }
}
