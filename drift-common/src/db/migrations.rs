//! One-time migration from the legacy flat-index history schema
//!
//! Earlier releases persisted playback history as a bare array of played
//! tracks (`playedFiles`) plus a flat position (`currentIndex`). The
//! history-indexed schema replaces those with an append-only history and a
//! cursor. The migration runs once at startup, guarded by a persisted flag,
//! and never blocks the daemon: failures are logged and swallowed, at the
//! accepted cost of losing the legacy history.

use crate::db::keys;
use crate::error::Result;
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, warn};

/// Migrate legacy flat-index history into the history-indexed schema.
///
/// Idempotent: once the flag is set this is a no-op, so re-running can
/// never clobber history appended after the first migration.
pub async fn migrate_legacy_history(pool: &Pool<Sqlite>) {
    let flag = match read_setting(pool, keys::MIGRATION_DONE).await {
        Ok(flag) => flag,
        Err(e) => {
            // Without the flag we cannot tell whether a copy already ran;
            // skip rather than risk overwriting newer history.
            warn!("Could not read migration flag, skipping legacy migration: {}", e);
            return;
        }
    };

    if flag.is_some() {
        debug!("Legacy history already migrated");
        return;
    }

    if let Err(e) = copy_legacy_history(pool).await {
        warn!("Legacy history migration failed, continuing without it: {}", e);
    }

    if let Err(e) = write_setting(pool, keys::MIGRATION_DONE, "true").await {
        warn!("Could not persist migration flag: {}", e);
    }
}

/// Copy `playedFiles` + `currentIndex` into `play_history` + `history_cursor`
async fn copy_legacy_history(pool: &Pool<Sqlite>) -> Result<()> {
    let Some(raw_files) = read_setting(pool, keys::LEGACY_PLAYED_FILES).await? else {
        info!("No legacy play history found");
        return Ok(());
    };

    let files: Vec<String> = serde_json::from_str(&raw_files).map_err(|e| {
        crate::Error::Internal(format!("legacy played files is not a JSON array: {}", e))
    })?;

    // A missing or unparsable legacy index lands on the newest entry, so
    // the user resumes at the leading edge instead of replaying from zero.
    let fallback = files.len() as i64 - 1;
    let cursor = match read_setting(pool, keys::LEGACY_CURRENT_INDEX).await? {
        Some(raw) => raw.trim().parse::<i64>().unwrap_or_else(|_| {
            warn!("Legacy current index {:?} is not a number, using last entry", raw);
            fallback
        }),
        None => fallback,
    };
    let cursor = cursor.clamp(-1, fallback.max(-1));

    let history_json = serde_json::to_string(&files)
        .map_err(|e| crate::Error::Internal(format!("could not encode history: {}", e)))?;
    write_setting(pool, keys::PLAY_HISTORY, &history_json).await?;
    write_setting(pool, keys::HISTORY_CURSOR, &cursor.to_string()).await?;

    info!(
        "Migrated {} legacy history entries (cursor {})",
        files.len(),
        cursor
    );
    Ok(())
}

async fn read_setting(pool: &Pool<Sqlite>, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

async fn write_setting(pool: &Pool<Sqlite>, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}
