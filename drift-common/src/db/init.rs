//! Database initialization

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::info;

/// Open (or create) the daemon database.
///
/// A single connection backs the pool: the store actor is the only writer
/// and the connection itself then serializes anything that slips past it.
pub async fn open_pool(path: &Path) -> Result<Pool<Sqlite>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Initialize all required database structures
pub async fn initialize_database(pool: &Pool<Sqlite>) -> Result<()> {
    info!("Initializing database structures");

    create_settings_table(pool).await?;

    info!("Database initialization complete");
    Ok(())
}

/// Create the settings key/value table if it does not exist yet
async fn create_settings_table(pool: &Pool<Sqlite>) -> Result<()> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='settings'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        sqlx::query(
            r#"
            CREATE TABLE settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        info!("Created settings table");
    }

    Ok(())
}
