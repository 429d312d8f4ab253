//! Database access layer
//!
//! Schema initialization and the one-time legacy history migration.
//! Runtime key/value access goes through the store actor in the player
//! crate; this module owns the schema and the persisted key space.

pub mod init;
pub mod migrations;

/// Persisted key space of the settings table.
///
/// The legacy keys are read-only remnants of the flat-index schema and are
/// only touched by the migration.
pub mod keys {
    /// JSON array of played track URLs, append-only
    pub const PLAY_HISTORY: &str = "play_history";
    /// Index of the active history entry; -1 means no history yet
    pub const HISTORY_CURSOR: &str = "history_cursor";
    /// Set once after the legacy migration has run
    pub const MIGRATION_DONE: &str = "history_migration_done";
    /// Cached catalog: JSON `{files, expires_at_ms}`
    pub const CATALOG_CACHE: &str = "catalog_cache";
    /// Resume state written from position/state reports
    pub const LAST_TRACK_URL: &str = "last_track_url";
    pub const LAST_POSITION_MS: &str = "last_position_ms";
    pub const WAS_PLAYING: &str = "was_playing";

    /// Legacy flat-index schema: JSON array of played tracks
    pub const LEGACY_PLAYED_FILES: &str = "playedFiles";
    /// Legacy flat-index schema: position within the array
    pub const LEGACY_CURRENT_INDEX: &str = "currentIndex";
}
