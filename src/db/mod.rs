//! Document store access for invsync
//!
//! The four collections (devices, users, interactions, run snapshots) live as
//! SQLite tables whose names come from configuration, so test imports can run
//! against isolated collections. Repository functions live one module per
//! collection and take the shared [`Store`] handle.

pub mod devices;
pub mod interactions;
pub mod updates;
pub mod users;

use crate::config::Collections;
use crate::error::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Persistence backend handle
///
/// Constructed once at process start and injected into every repository call;
/// closed after the run summary is emitted.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    collections: Collections,
}

impl Store {
    /// Open (or create) the store at the given database path
    pub async fn open(db_path: &Path, collections: Collections) -> Result<Self> {
        collections.validate()?;

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // SQLite URI with mode=rwc (read, write, create)
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        tracing::debug!("Connecting to database: {}", db_url);

        let pool = SqlitePool::connect(&db_url).await?;
        let store = Self { pool, collections };
        store.init_collections().await?;

        Ok(store)
    }

    /// Open an in-memory store (tests and dry runs)
    ///
    /// Pinned to a single connection: every new `sqlite::memory:` connection
    /// would otherwise see a fresh, empty database.
    pub async fn open_in_memory(collections: Collections) -> Result<Self> {
        collections.validate()?;

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool, collections };
        store.init_collections().await?;

        Ok(store)
    }

    /// Create the collection tables if they don't exist
    async fn init_collections(&self) -> Result<()> {
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{}" (
                device_id TEXT PRIMARY KEY,
                device_name TEXT NOT NULL,
                device_type TEXT NOT NULL,
                inv_nr TEXT,
                publisher TEXT,
                os TEXT,
                os_version TEXT,
                sticker_number TEXT,
                is_retired INTEGER NOT NULL DEFAULT 0,
                current_user TEXT,
                is_available INTEGER NOT NULL DEFAULT 1
            )
            "#,
            self.collections.devices
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{}" (
                username TEXT PRIMARY KEY,
                current_interactions INTEGER NOT NULL DEFAULT 0,
                total_interactions INTEGER NOT NULL DEFAULT 0
            )
            "#,
            self.collections.users
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{}" (
                id TEXT PRIMARY KEY,
                device_id TEXT NOT NULL,
                device_name TEXT NOT NULL,
                device_inv_nr TEXT,
                username TEXT NOT NULL,
                date_of_checkout TEXT NOT NULL,
                date_of_return TEXT
            )
            "#,
            self.collections.interactions
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{}" (
                update_number INTEGER PRIMARY KEY,
                doc_id TEXT NOT NULL,
                update_date TEXT NOT NULL,
                total_devices INTEGER NOT NULL,
                new_devices INTEGER NOT NULL,
                changed_devices INTEGER NOT NULL,
                snapshot TEXT
            )
            "#,
            self.collections.updates
        ))
        .execute(&self.pool)
        .await?;

        tracing::info!(
            devices = %self.collections.devices,
            users = %self.collections.users,
            interactions = %self.collections.interactions,
            updates = %self.collections.updates,
            "Store collections initialized"
        );

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    /// Close the pool, flushing outstanding writes
    pub async fn close(self) {
        self.pool.close().await;
    }
}
