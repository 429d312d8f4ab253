//! Track catalog retrieval and caching
//!
//! The catalog is a remote plain-text resource, one track URL per line;
//! blank lines and `#` comments are ignored. Fetched lists are cached
//! durably so restarts do not re-download. Short lists usually mean the
//! remote was mid-update, so they are stored already-expired and re-fetched
//! on the next call.

use crate::store::StoreHandle;
use drift_common::db::keys;
use drift_common::events::PlayerEvent;
use drift_common::{time, Error, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Lists below this size are cached already-expired
const SMALL_CATALOG_THRESHOLD: usize = 500;
/// How long a full catalog stays fresh
const CATALOG_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogCache {
    files: Vec<String>,
    expires_at_ms: i64,
}

#[derive(Clone)]
pub struct CatalogProvider {
    store: StoreHandle,
    client: reqwest::Client,
    url: String,
    event_tx: broadcast::Sender<PlayerEvent>,
}

impl CatalogProvider {
    pub fn new(store: StoreHandle, url: String, event_tx: broadcast::Sender<PlayerEvent>) -> Self {
        Self {
            store,
            client: reqwest::Client::new(),
            url,
            event_tx,
        }
    }

    /// The cached list if still fresh, otherwise a fresh fetch.
    pub async fn get_catalog(&self) -> Result<Vec<String>> {
        if let Some(files) = self.load_cached().await? {
            return Ok(files);
        }
        self.refresh().await
    }

    async fn load_cached(&self) -> Result<Option<Vec<String>>> {
        let Some(raw) = self.store.get(keys::CATALOG_CACHE).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<CatalogCache>(&raw) {
            Ok(cache) if time::now_millis() < cache.expires_at_ms => Ok(Some(cache.files)),
            Ok(_) => {
                debug!("Cached catalog expired");
                Ok(None)
            }
            Err(e) => {
                warn!("Discarding corrupt catalog cache: {}", e);
                Ok(None)
            }
        }
    }

    /// Fetch the remote list unconditionally and cache the result.
    ///
    /// An unreachable host, a non-success status, or a list with no usable
    /// lines all surface as `Error::Fetch`; there is no fallback.
    pub async fn refresh(&self) -> Result<Vec<String>> {
        info!("Fetching catalog from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Fetch(format!("catalog request failed: {}", e)))?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::Fetch(format!("catalog body unreadable: {}", e)))?;

        let files = parse_catalog(&body);
        if files.is_empty() {
            return Err(Error::Fetch("catalog is empty".to_string()));
        }

        let expires_at_ms = if files.len() < SMALL_CATALOG_THRESHOLD {
            // Suspect list: usable now, refetched on the next call
            time::now_millis() - 1
        } else {
            time::now_millis() + CATALOG_TTL_MS
        };

        let count = files.len();
        let cache = CatalogCache {
            files,
            expires_at_ms,
        };
        match serde_json::to_string(&cache) {
            Ok(raw) => {
                // The fetched list is still served if caching fails
                if let Err(e) = self.store.set(keys::CATALOG_CACHE, &raw).await {
                    warn!("Could not cache catalog: {}", e);
                }
            }
            Err(e) => warn!("Could not encode catalog cache: {}", e),
        }

        let _ = self.event_tx.send(PlayerEvent::CatalogRefreshed {
            track_count: count,
            timestamp: time::now(),
        });
        info!("Catalog refreshed: {} tracks", count);
        Ok(cache.files)
    }

    /// Cached size and expiry, if a cache exists (for the status endpoint)
    pub async fn cache_info(&self) -> Result<Option<(usize, i64)>> {
        let Some(raw) = self.store.get(keys::CATALOG_CACHE).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<CatalogCache>(&raw) {
            Ok(cache) => Ok(Some((cache.files.len(), cache.expires_at_ms))),
            Err(_) => Ok(None),
        }
    }
}

/// Split a catalog body into track URLs, dropping blanks and `#` comments
fn parse_catalog(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use drift_common::db::init::initialize_database;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn setup_store() -> StoreHandle {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_database(&pool).await.unwrap();
        StoreHandle::spawn(pool)
    }

    fn provider(store: StoreHandle, url: String) -> CatalogProvider {
        let (event_tx, _) = broadcast::channel(16);
        CatalogProvider::new(store, url, event_tx)
    }

    /// Serve `body` on an ephemeral local port, counting hits
    async fn spawn_catalog_server(body: String) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let body = Arc::new(body);
        let app = Router::new().route(
            "/all_files.txt",
            get({
                let hits = Arc::clone(&hits);
                let body = Arc::clone(&body);
                move || {
                    let hits = Arc::clone(&hits);
                    let body = Arc::clone(&body);
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        (*body).clone()
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/all_files.txt", addr), hits)
    }

    #[test]
    fn test_parse_drops_blanks_and_comments() {
        let body = "# catalog\nhttp://x/a.mp3\n\n   \n# note\n  http://x/b.mp3  \n";
        assert_eq!(
            parse_catalog(body),
            vec!["http://x/a.mp3".to_string(), "http://x/b.mp3".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fresh_cache_is_served_without_fetching() {
        let store = setup_store().await;
        let cache = CatalogCache {
            files: vec!["http://x/a.mp3".to_string()],
            expires_at_ms: time::now_millis() + 3_600_000,
        };
        store
            .set(keys::CATALOG_CACHE, &serde_json::to_string(&cache).unwrap())
            .await
            .unwrap();

        // Unroutable URL: any fetch attempt would error
        let provider = provider(store, "http://127.0.0.1:1/nope".to_string());
        let files = provider.get_catalog().await.unwrap();
        assert_eq!(files, vec!["http://x/a.mp3".to_string()]);
    }

    #[tokio::test]
    async fn test_small_catalog_is_refetched_every_call() {
        let (url, hits) = spawn_catalog_server("http://x/a.mp3\nhttp://x/b.mp3\n".to_string()).await;
        let provider = provider(setup_store().await, url);

        provider.get_catalog().await.unwrap();
        provider.get_catalog().await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_large_catalog_is_cached() {
        let body: String = (0..600)
            .map(|i| format!("http://x/{}.mp3\n", i))
            .collect();
        let (url, hits) = spawn_catalog_server(body).await;
        let provider = provider(setup_store().await, url);

        let files = provider.get_catalog().await.unwrap();
        assert_eq!(files.len(), 600);

        provider.get_catalog().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_body_is_a_fetch_error() {
        let (url, _) = spawn_catalog_server(String::new()).await;
        let provider = provider(setup_store().await, url);

        match provider.get_catalog().await {
            Err(Error::Fetch(_)) => {}
            other => panic!("expected fetch error, got {:?}", other.map(|v| v.len())),
        }
    }

    #[tokio::test]
    async fn test_comment_only_body_is_a_fetch_error() {
        let (url, _) = spawn_catalog_server("# nothing here\n\n".to_string()).await;
        let provider = provider(setup_store().await, url);

        assert!(matches!(provider.get_catalog().await, Err(Error::Fetch(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_fetch_error() {
        let provider = provider(setup_store().await, "http://127.0.0.1:1/nope".to_string());
        assert!(matches!(provider.get_catalog().await, Err(Error::Fetch(_))));
    }

    #[tokio::test]
    async fn test_corrupt_cache_falls_back_to_fetch() {
        let store = setup_store().await;
        store.set(keys::CATALOG_CACHE, "not json").await.unwrap();

        let (url, hits) = spawn_catalog_server("http://x/a.mp3\n".to_string()).await;
        let provider = provider(store, url);

        let files = provider.get_catalog().await.unwrap();
        assert_eq!(files, vec!["http://x/a.mp3".to_string()]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
