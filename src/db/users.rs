//! User interaction counters
//!
//! One row per username: `current_interactions` counts open checkouts
//! (floored at zero), `total_interactions` is a monotonic lifetime count.

use crate::db::Store;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// Per-user running/total interaction counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub current_interactions: i64,
    pub total_interactions: i64,
}

/// Load a user by username
pub async fn get_user(store: &Store, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT username, current_interactions, total_interactions
        FROM "{}"
        WHERE username = ?
        "#,
        store.collections().users
    ))
    .bind(username)
    .fetch_optional(store.pool())
    .await?;

    Ok(row.map(|row| User {
        username: row.get("username"),
        current_interactions: row.get("current_interactions"),
        total_interactions: row.get("total_interactions"),
    }))
}

/// Record a checkout: +1 to both counters, creating the user at 1/1 if absent
pub async fn record_checkout(store: &Store, username: &str) -> Result<()> {
    sqlx::query(&format!(
        r#"
        INSERT INTO "{}" (username, current_interactions, total_interactions)
        VALUES (?, 1, 1)
        ON CONFLICT(username) DO UPDATE SET
            current_interactions = current_interactions + 1,
            total_interactions = total_interactions + 1
        "#,
        store.collections().users
    ))
    .bind(username)
    .execute(store.pool())
    .await?;

    Ok(())
}

/// Record a return: -1 to the running counter, floored at zero
///
/// A missing user row is tolerated as a no-op, not an error.
pub async fn record_return(store: &Store, username: &str) -> Result<()> {
    sqlx::query(&format!(
        r#"
        UPDATE "{}"
        SET current_interactions = MAX(current_interactions - 1, 0)
        WHERE username = ?
        "#,
        store.collections().users
    ))
    .bind(username)
    .execute(store.pool())
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Collections;

    #[tokio::test]
    async fn test_checkout_creates_and_increments() {
        let store = Store::open_in_memory(Collections::default())
            .await
            .unwrap();

        record_checkout(&store, "alice").await.unwrap();
        let user = get_user(&store, "alice").await.unwrap().unwrap();
        assert_eq!(user.current_interactions, 1);
        assert_eq!(user.total_interactions, 1);

        record_checkout(&store, "alice").await.unwrap();
        let user = get_user(&store, "alice").await.unwrap().unwrap();
        assert_eq!(user.current_interactions, 2);
        assert_eq!(user.total_interactions, 2);
    }

    #[tokio::test]
    async fn test_return_decrements_and_floors_at_zero() {
        let store = Store::open_in_memory(Collections::default())
            .await
            .unwrap();

        record_checkout(&store, "bob").await.unwrap();
        record_return(&store, "bob").await.unwrap();

        let user = get_user(&store, "bob").await.unwrap().unwrap();
        assert_eq!(user.current_interactions, 0);
        // Total is monotonic, never decremented
        assert_eq!(user.total_interactions, 1);

        // Extra return stays floored at zero
        record_return(&store, "bob").await.unwrap();
        let user = get_user(&store, "bob").await.unwrap().unwrap();
        assert_eq!(user.current_interactions, 0);
    }

    #[tokio::test]
    async fn test_return_for_unknown_user_is_tolerated() {
        let store = Store::open_in_memory(Collections::default())
            .await
            .unwrap();

        record_return(&store, "nobody").await.unwrap();
        assert!(get_user(&store, "nobody").await.unwrap().is_none());
    }
}
