//! Track selection engine
//!
//! Decides what plays next or previous. Below the leading edge of history,
//! navigation is pure replay of what was already recorded; at the leading
//! edge (or with no history at all), a fresh track is drawn at random from
//! the catalog, excluding a bounded window of recently played entries.
//! Every entry point runs its whole read-decide-write sequence under the
//! operation lock so overlapping triggers cannot race on the cursor.

use crate::catalog::CatalogProvider;
use crate::history::HistoryStore;
use crate::lock::OperationLock;
use drift_common::Result;
use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, warn};

// Tunable anti-repeat policy: the exclusion window is the smaller of a
// fixed cap and a fraction of the catalog.
const RECENT_WINDOW_MAX: usize = 50;
const RECENT_WINDOW_CATALOG_DIVISOR: usize = 10;

pub struct SelectionEngine {
    history: HistoryStore,
    catalog: CatalogProvider,
    lock: OperationLock,
}

impl SelectionEngine {
    pub fn new(history: HistoryStore, catalog: CatalogProvider) -> Self {
        Self {
            history,
            catalog,
            lock: OperationLock::new(),
        }
    }

    /// First track for a client with no history at all.
    /// Behaves exactly like `next()` at the leading edge.
    pub async fn initial(&self) -> Result<String> {
        let _guard = self.lock.acquire().await;
        let (history, _) = self.history.read().await?;
        self.select_new_random(&history).await
    }

    /// Advance: replay forward through history, or draw a fresh track once
    /// the cursor sits on the newest entry.
    pub async fn next(&self) -> Result<String> {
        let _guard = self.lock.acquire().await;
        let (history, cursor) = self.history.read().await?;
        let len = history.len() as i64;

        if cursor >= 0 && cursor < len - 1 {
            // Replaying recorded history; no new randomness
            let new_cursor = cursor + 1;
            if let Err(e) = self.history.set_cursor(new_cursor).await {
                warn!("Could not persist history cursor {}: {}", new_cursor, e);
            }
            debug!("Replaying history entry {} of {}", new_cursor, len);
            return Ok(history[new_cursor as usize].clone());
        }

        self.select_new_random(&history).await
    }

    /// Step back through history. `None` at the beginning (or with no
    /// history) is a normal result, and nothing is mutated for it.
    pub async fn previous(&self) -> Result<Option<String>> {
        let _guard = self.lock.acquire().await;
        let (history, cursor) = self.history.read().await?;

        if cursor <= 0 {
            return Ok(None);
        }

        let new_cursor = cursor - 1;
        if let Err(e) = self.history.set_cursor(new_cursor).await {
            warn!("Could not persist history cursor {}: {}", new_cursor, e);
        }
        debug!("Replaying history entry {} of {}", new_cursor, history.len());
        Ok(Some(history[new_cursor as usize].clone()))
    }

    /// Read-only view of `(history, cursor)` for the history endpoint
    pub async fn history_snapshot(&self) -> Result<(Vec<String>, i64)> {
        self.history.read().await
    }

    /// Draw a track the recent window has not seen and append it.
    ///
    /// A failed append is logged and the track is still returned: playback
    /// continuity beats cursor consistency, and the next successful write
    /// realigns the persisted state.
    async fn select_new_random(&self, history: &[String]) -> Result<String> {
        let catalog = self.catalog.get_catalog().await?;

        let window = RECENT_WINDOW_MAX.min(catalog.len() / RECENT_WINDOW_CATALOG_DIVISOR);
        let pool = candidate_pool(&catalog, history, window);

        let chosen = {
            let mut rng = rand::thread_rng();
            pool[rng.gen_range(0..pool.len())].clone()
        };

        match self.history.append(&chosen).await {
            Ok(cursor) => debug!("Appended history entry {}: {}", cursor, chosen),
            Err(e) => warn!("Could not persist history append, continuing playback: {}", e),
        }

        Ok(chosen)
    }
}

/// Catalog entries outside the last `window` history entries; the whole
/// catalog when that exclusion would empty the pool.
fn candidate_pool<'a>(
    catalog: &'a [String],
    history: &[String],
    window: usize,
) -> Vec<&'a String> {
    let recent: HashSet<&str> = history
        .iter()
        .rev()
        .take(window)
        .map(String::as_str)
        .collect();

    let pool: Vec<&String> = catalog
        .iter()
        .filter(|track| !recent.contains(track.as_str()))
        .collect();

    if pool.is_empty() {
        catalog.iter().collect()
    } else {
        pool
    }
}
