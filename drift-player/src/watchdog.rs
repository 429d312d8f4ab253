//! Background watchdog
//!
//! Periodically verifies that the intended playback state and the loaded
//! track agree, and performs a recovery selection when they do not. The
//! watchdog is an ordinary trigger source: its recovery path goes through
//! the same engine entry points (and the same operation lock) as every
//! other trigger.

use crate::engine::SelectionEngine;
use crate::state::{CurrentTrack, SharedState};
use drift_common::events::{PlaybackState, PlayerEvent};
use drift_common::{time, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn the watchdog task
pub fn start_watchdog(engine: Arc<SelectionEngine>, state: Arc<SharedState>) {
    tokio::spawn(watchdog_task(engine, state, DEFAULT_WATCHDOG_INTERVAL));
}

async fn watchdog_task(
    engine: Arc<SelectionEngine>,
    state: Arc<SharedState>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; give clients one interval to load
    ticker.tick().await;

    info!("Watchdog started ({:?} interval)", interval);

    loop {
        ticker.tick().await;
        if let Err(e) = check_once(&engine, &state).await {
            warn!("Watchdog check failed: {}", e);
        }
    }
}

/// One watchdog pass: recover when playback is intended but nothing is loaded
pub(crate) async fn check_once(engine: &SelectionEngine, state: &SharedState) -> Result<()> {
    if state.get_playback_state().await != PlaybackState::Playing {
        return Ok(());
    }
    if state.get_current_track().await.is_some() {
        return Ok(());
    }

    warn!("Playback intended but no track loaded, selecting one");
    state.increment_watchdog_interventions();

    let track = engine.next().await?;
    state
        .set_current_track(Some(CurrentTrack {
            url: track.clone(),
            position_ms: 0,
        }))
        .await;

    let (_, cursor) = engine.history_snapshot().await?;
    state.broadcast_event(PlayerEvent::WatchdogIntervention {
        reason: "no track loaded".to_string(),
        timestamp: time::now(),
    });
    state.broadcast_event(PlayerEvent::TrackStarted {
        track_url: track,
        history_index: cursor,
        timestamp: time::now(),
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogProvider;
    use crate::history::HistoryStore;
    use crate::store::StoreHandle;
    use drift_common::db::init::initialize_database;
    use drift_common::db::keys;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> (Arc<SelectionEngine>, Arc<SharedState>) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_database(&pool).await.unwrap();
        let store = StoreHandle::spawn(pool);

        let cache = serde_json::json!({
            "files": ["a.mp3", "b.mp3", "c.mp3"],
            "expires_at_ms": drift_common::time::now_millis() + 3_600_000,
        });
        store
            .set(keys::CATALOG_CACHE, &cache.to_string())
            .await
            .unwrap();

        let state = Arc::new(SharedState::new());
        let provider = CatalogProvider::new(
            store.clone(),
            "http://127.0.0.1:1/unused".to_string(),
            state.event_tx.clone(),
        );
        let engine = Arc::new(SelectionEngine::new(HistoryStore::new(store), provider));
        (engine, state)
    }

    #[tokio::test]
    async fn test_recovers_when_playing_with_no_track() {
        let (engine, state) = setup().await;

        check_once(&engine, &state).await.unwrap();

        assert!(state.get_current_track().await.is_some());
        assert_eq!(state.get_watchdog_interventions(), 1);

        let (history, _) = engine.history_snapshot().await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_leaves_paused_player_alone() {
        let (engine, state) = setup().await;
        state.set_playback_state(PlaybackState::Paused).await;

        check_once(&engine, &state).await.unwrap();

        assert!(state.get_current_track().await.is_none());
        assert_eq!(state.get_watchdog_interventions(), 0);
    }

    #[tokio::test]
    async fn test_leaves_loaded_track_alone() {
        let (engine, state) = setup().await;
        state
            .set_current_track(Some(CurrentTrack {
                url: "a.mp3".to_string(),
                position_ms: 100,
            }))
            .await;

        check_once(&engine, &state).await.unwrap();

        assert_eq!(state.get_watchdog_interventions(), 0);
        let (history, _) = engine.history_snapshot().await.unwrap();
        assert!(history.is_empty());
    }
}
