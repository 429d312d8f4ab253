//! Shared daemon state
//!
//! Thread-safe state shared between the API handlers, the watchdog, and
//! the SSE broadcaster.

use drift_common::events::{PlaybackState, PlayerEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, RwLock};

/// Track currently handed to the playback client
#[derive(Debug, Clone)]
pub struct CurrentTrack {
    pub url: String,
    /// Latest position report, milliseconds
    pub position_ms: u64,
}

pub struct SharedState {
    /// Intended playback state (clients report play/pause here)
    pub playback_state: RwLock<PlaybackState>,

    /// Track most recently selected (None until a first selection)
    pub current_track: RwLock<Option<CurrentTrack>>,

    /// Event broadcaster for SSE events
    pub event_tx: broadcast::Sender<PlayerEvent>,

    /// Times the watchdog had to perform a recovery selection
    pub watchdog_interventions_total: AtomicU64,
}

impl SharedState {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            // Clients are expected to start playing as soon as they get a track
            playback_state: RwLock::new(PlaybackState::Playing),
            current_track: RwLock::new(None),
            event_tx,
            watchdog_interventions_total: AtomicU64::new(0),
        }
    }

    /// Broadcast an event to all SSE listeners (no receivers is fine)
    pub fn broadcast_event(&self, event: PlayerEvent) {
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.event_tx.subscribe()
    }

    pub async fn get_playback_state(&self) -> PlaybackState {
        *self.playback_state.read().await
    }

    pub async fn set_playback_state(&self, state: PlaybackState) {
        *self.playback_state.write().await = state;
    }

    pub async fn get_current_track(&self) -> Option<CurrentTrack> {
        self.current_track.read().await.clone()
    }

    pub async fn set_current_track(&self, track: Option<CurrentTrack>) {
        *self.current_track.write().await = track;
    }

    pub fn increment_watchdog_interventions(&self) {
        self.watchdog_interventions_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_watchdog_interventions(&self) -> u64 {
        self.watchdog_interventions_total.load(Ordering::Relaxed)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
