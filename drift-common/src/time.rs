//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC time in milliseconds since the epoch.
/// Catalog expiry bookkeeping is done in this unit.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
