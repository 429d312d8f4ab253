//! Durable play history with a movable cursor
//!
//! The history is an append-only JSON array of track URLs; the cursor is
//! the index of the entry currently being played, -1 when nothing has ever
//! played. All access goes through the store worker, so reads and writes
//! from concurrent operations never interleave mid-value.

use crate::store::StoreHandle;
use drift_common::db::keys;
use drift_common::{Error, Result};

#[derive(Clone)]
pub struct HistoryStore {
    store: StoreHandle,
}

impl HistoryStore {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Read the full history and the cursor.
    ///
    /// Missing keys read as `([], -1)`; a persisted cursor outside
    /// `[-1, len-1]` is clamped back into bounds.
    pub async fn read(&self) -> Result<(Vec<String>, i64)> {
        let history: Vec<String> = match self.store.get(keys::PLAY_HISTORY).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                Error::Internal(format!("persisted play history is corrupt: {}", e))
            })?,
            None => Vec::new(),
        };

        let cursor = match self.store.get(keys::HISTORY_CURSOR).await? {
            Some(raw) => raw.trim().parse::<i64>().map_err(|e| {
                Error::Internal(format!("persisted history cursor is corrupt: {}", e))
            })?,
            None => -1,
        };

        let last = history.len() as i64 - 1;
        Ok((history, cursor.clamp(-1, last.max(-1))))
    }

    /// Append a track and move the cursor to it.
    ///
    /// History and cursor are written as one batch so a crash between the
    /// two cannot leave the cursor pointing past the end.
    pub async fn append(&self, track_url: &str) -> Result<i64> {
        let (mut history, _) = self.read().await?;
        history.push(track_url.to_string());
        let cursor = history.len() as i64 - 1;

        let history_json = serde_json::to_string(&history)
            .map_err(|e| Error::Internal(format!("could not encode history: {}", e)))?;
        self.store
            .set_many(vec![
                (keys::PLAY_HISTORY.to_string(), history_json),
                (keys::HISTORY_CURSOR.to_string(), cursor.to_string()),
            ])
            .await?;

        Ok(cursor)
    }

    pub async fn set_cursor(&self, cursor: i64) -> Result<()> {
        self.store
            .set(keys::HISTORY_CURSOR, &cursor.to_string())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_common::db::init::initialize_database;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_history() -> (HistoryStore, StoreHandle) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_database(&pool).await.unwrap();
        let store = StoreHandle::spawn(pool);
        (HistoryStore::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_empty_history_reads_as_no_history() {
        let (history, _) = setup_history().await;
        assert_eq!(history.read().await.unwrap(), (Vec::new(), -1));
    }

    #[tokio::test]
    async fn test_append_advances_cursor_to_last_index() {
        let (history, _) = setup_history().await;

        assert_eq!(history.append("a.mp3").await.unwrap(), 0);
        assert_eq!(history.append("b.mp3").await.unwrap(), 1);

        let (entries, cursor) = history.read().await.unwrap();
        assert_eq!(entries, vec!["a.mp3".to_string(), "b.mp3".to_string()]);
        assert_eq!(cursor, 1);
    }

    #[tokio::test]
    async fn test_set_cursor_round_trips() {
        let (history, _) = setup_history().await;
        history.append("a.mp3").await.unwrap();
        history.append("b.mp3").await.unwrap();

        history.set_cursor(0).await.unwrap();

        let (_, cursor) = history.read().await.unwrap();
        assert_eq!(cursor, 0);
    }

    #[tokio::test]
    async fn test_out_of_range_persisted_cursor_is_clamped() {
        let (history, store) = setup_history().await;
        history.append("a.mp3").await.unwrap();

        store
            .set(drift_common::db::keys::HISTORY_CURSOR, "42")
            .await
            .unwrap();
        let (_, cursor) = history.read().await.unwrap();
        assert_eq!(cursor, 0);

        store
            .set(drift_common::db::keys::HISTORY_CURSOR, "-7")
            .await
            .unwrap();
        let (_, cursor) = history.read().await.unwrap();
        assert_eq!(cursor, -1);
    }
}
