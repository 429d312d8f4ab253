//! Event types for the drift event system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Intended playback state of the external player client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
}

/// Events broadcast to SSE listeners
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Playback state changed (play/pause intent from a client)
    PlaybackStateChanged {
        state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// A track was selected and handed to the playback client
    TrackStarted {
        track_url: String,
        history_index: i64,
        timestamp: DateTime<Utc>,
    },

    /// Position report from the playback client
    PlaybackProgress {
        track_url: String,
        position_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Catalog was re-fetched from the remote list
    CatalogRefreshed {
        track_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The watchdog had to perform a recovery selection
    WatchdogIntervention {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl PlayerEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            PlayerEvent::TrackStarted { .. } => "TrackStarted",
            PlayerEvent::PlaybackProgress { .. } => "PlaybackProgress",
            PlayerEvent::CatalogRefreshed { .. } => "CatalogRefreshed",
            PlayerEvent::WatchdogIntervention { .. } => "WatchdogIntervention",
        }
    }
}
