//! # Drift Player (drift-player)
//!
//! Headless shuffle-radio daemon.
//!
//! **Purpose:** Keep a durable, append-only play history with a movable
//! cursor, navigate it in both directions, and draw anti-repeat random
//! selections from a remote catalog once the leading edge of history is
//! reached. An external playback client drives the daemon over HTTP/SSE.
//!
//! **Architecture:** Single-writer store actor over SQLite + a selection
//! engine whose entry points are serialized by an advisory operation lock.

pub mod api;
pub mod catalog;
pub mod engine;
pub mod history;
pub mod lock;
pub mod state;
pub mod store;
pub mod watchdog;

pub use drift_common::{Error, Result};
pub use state::SharedState;
