//! HTTP request handlers

use crate::api::AppState;
use crate::state::CurrentTrack;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use drift_common::db::keys;
use drift_common::events::{PlaybackState, PlayerEvent};
use drift_common::{time, Error};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    port: u16,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackResponse {
    /// Selected track, or null when there is nothing to play (previous at
    /// the beginning of history)
    pub track: Option<String>,
    /// False when a debounced trigger was coalesced away
    pub advanced: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentResponse {
    pub track: Option<String>,
    pub position_ms: u64,
    pub state: PlaybackState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<String>,
    pub cursor: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub track_count: Option<usize>,
    pub expires_at_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StateRequest {
    state: PlaybackState,
}

#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    position_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct ErrorReport {
    message: String,
}

type HandlerError = (StatusCode, Json<StatusResponse>);

/// Map engine errors onto HTTP statuses: an unreachable catalog is an
/// upstream failure, everything else is internal.
fn error_response(e: Error) -> HandlerError {
    let status = match &e {
        Error::Fetch(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error!("Request failed: {}", e);
    (
        status,
        Json(StatusResponse {
            status: e.to_string(),
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(app): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "drift-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: app.port,
    })
}

// ============================================================================
// Selection Triggers
// ============================================================================

/// POST /playback/initial - first track for a client with no restore state
pub async fn initial(State(app): State<AppState>) -> Result<Json<TrackResponse>, HandlerError> {
    let track = app.engine.initial().await.map_err(error_response)?;
    after_selection(&app, &track).await;
    Ok(Json(TrackResponse {
        track: Some(track),
        advanced: true,
    }))
}

/// POST /playback/next - advance (user or remote-control trigger, debounced)
pub async fn next_track(State(app): State<AppState>) -> Result<Json<TrackResponse>, HandlerError> {
    if !app.debounce.allow().await {
        return Ok(coalesced(&app).await);
    }

    let track = app.engine.next().await.map_err(error_response)?;
    after_selection(&app, &track).await;
    Ok(Json(TrackResponse {
        track: Some(track),
        advanced: true,
    }))
}

/// POST /playback/previous - step back (debounced); null at the beginning
pub async fn previous_track(
    State(app): State<AppState>,
) -> Result<Json<TrackResponse>, HandlerError> {
    if !app.debounce.allow().await {
        return Ok(coalesced(&app).await);
    }

    let track = app.engine.previous().await.map_err(error_response)?;
    if let Some(track) = &track {
        after_selection(&app, track).await;
    }
    Ok(Json(TrackResponse {
        track,
        advanced: true,
    }))
}

// ============================================================================
// Signals from the Playback Client
// ============================================================================

/// POST /playback/ended - the queue ran out; auto-advance (not debounced)
pub async fn track_ended(State(app): State<AppState>) -> Result<Json<TrackResponse>, HandlerError> {
    let track = app.engine.next().await.map_err(error_response)?;
    after_selection(&app, &track).await;
    Ok(Json(TrackResponse {
        track: Some(track),
        advanced: true,
    }))
}

/// POST /playback/error - the client could not play the track; advance past it
pub async fn track_error(
    State(app): State<AppState>,
    Json(report): Json<ErrorReport>,
) -> Result<Json<TrackResponse>, HandlerError> {
    warn!("Playback client reported an error: {}", report.message);

    let track = app.engine.next().await.map_err(error_response)?;
    after_selection(&app, &track).await;
    Ok(Json(TrackResponse {
        track: Some(track),
        advanced: true,
    }))
}

/// POST /playback/state - play/pause intent
pub async fn set_state(
    State(app): State<AppState>,
    Json(request): Json<StateRequest>,
) -> StatusCode {
    info!("Playback state set to {:?}", request.state);
    app.state.set_playback_state(request.state).await;

    let was_playing = request.state == PlaybackState::Playing;
    if let Err(e) = app
        .store
        .set(keys::WAS_PLAYING, &was_playing.to_string())
        .await
    {
        warn!("Could not persist playback state: {}", e);
    }

    app.state.broadcast_event(PlayerEvent::PlaybackStateChanged {
        state: request.state,
        timestamp: time::now(),
    });
    StatusCode::OK
}

/// POST /playback/position - position report; keeps the resume point fresh
pub async fn report_position(
    State(app): State<AppState>,
    Json(request): Json<PositionRequest>,
) -> StatusCode {
    let Some(mut track) = app.state.get_current_track().await else {
        // Nothing loaded; there is no track to attribute the position to
        return StatusCode::OK;
    };

    track.position_ms = request.position_ms;
    let url = track.url.clone();
    app.state.set_current_track(Some(track)).await;

    if let Err(e) = app
        .store
        .set_many(vec![
            (keys::LAST_TRACK_URL.to_string(), url.clone()),
            (
                keys::LAST_POSITION_MS.to_string(),
                request.position_ms.to_string(),
            ),
        ])
        .await
    {
        warn!("Could not persist resume point: {}", e);
    }

    app.state.broadcast_event(PlayerEvent::PlaybackProgress {
        track_url: url,
        position_ms: request.position_ms,
        timestamp: time::now(),
    });
    StatusCode::OK
}

// ============================================================================
// Read-only Views
// ============================================================================

/// GET /playback/current - current track, falling back to the persisted
/// resume point after a restart
pub async fn current(State(app): State<AppState>) -> Result<Json<CurrentResponse>, HandlerError> {
    let state = app.state.get_playback_state().await;

    if let Some(track) = app.state.get_current_track().await {
        return Ok(Json(CurrentResponse {
            track: Some(track.url),
            position_ms: track.position_ms,
            state,
        }));
    }

    let track = app
        .store
        .get(keys::LAST_TRACK_URL)
        .await
        .map_err(error_response)?;
    let position_ms = app
        .store
        .get(keys::LAST_POSITION_MS)
        .await
        .map_err(error_response)?
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0);

    Ok(Json(CurrentResponse {
        track,
        position_ms,
        state,
    }))
}

/// GET /playback/history - full history and cursor
pub async fn history(State(app): State<AppState>) -> Result<Json<HistoryResponse>, HandlerError> {
    let (history, cursor) = app
        .engine
        .history_snapshot()
        .await
        .map_err(error_response)?;
    Ok(Json(HistoryResponse { history, cursor }))
}

/// GET /catalog - cached catalog size and expiry
pub async fn catalog_info(
    State(app): State<AppState>,
) -> Result<Json<CatalogResponse>, HandlerError> {
    let info = app.catalog.cache_info().await.map_err(error_response)?;
    let (track_count, expires_at_ms) = match info {
        Some((count, expires)) => (Some(count), Some(expires)),
        None => (None, None),
    };
    Ok(Json(CatalogResponse {
        track_count,
        expires_at_ms,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Bookkeeping after the engine handed out a track: update shared state,
/// persist the resume point, tell SSE listeners. Storage failures here are
/// logged only; the selection has already been made.
async fn after_selection(app: &AppState, track_url: &str) {
    app.state
        .set_current_track(Some(CurrentTrack {
            url: track_url.to_string(),
            position_ms: 0,
        }))
        .await;

    if let Err(e) = app
        .store
        .set_many(vec![
            (keys::LAST_TRACK_URL.to_string(), track_url.to_string()),
            (keys::LAST_POSITION_MS.to_string(), "0".to_string()),
        ])
        .await
    {
        warn!("Could not persist resume point: {}", e);
    }

    let history_index = match app.engine.history_snapshot().await {
        Ok((_, cursor)) => cursor,
        Err(_) => -1,
    };
    app.state.broadcast_event(PlayerEvent::TrackStarted {
        track_url: track_url.to_string(),
        history_index,
        timestamp: time::now(),
    });
}

/// Response for a trigger that fell inside the debounce window
async fn coalesced(app: &AppState) -> Json<TrackResponse> {
    let track = app.state.get_current_track().await.map(|t| t.url);
    Json(TrackResponse {
        track,
        advanced: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::debounce::Debounce;
    use crate::api::create_router;
    use crate::catalog::CatalogProvider;
    use crate::engine::SelectionEngine;
    use crate::history::HistoryStore;
    use crate::state::SharedState;
    use crate::store::StoreHandle;
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use drift_common::db::init::initialize_database;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const CATALOG: [&str; 5] = ["a.mp3", "b.mp3", "c.mp3", "d.mp3", "e.mp3"];

    async fn build_app(debounce_window: Duration, seed_catalog: bool) -> (Router, AppState) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_database(&pool).await.unwrap();
        let store = StoreHandle::spawn(pool);

        if seed_catalog {
            let cache = serde_json::json!({
                "files": CATALOG,
                "expires_at_ms": time::now_millis() + 3_600_000,
            });
            store
                .set(keys::CATALOG_CACHE, &cache.to_string())
                .await
                .unwrap();
        }

        let state = Arc::new(SharedState::new());
        let catalog = CatalogProvider::new(
            store.clone(),
            "http://127.0.0.1:1/unused".to_string(),
            state.event_tx.clone(),
        );
        let engine = Arc::new(SelectionEngine::new(
            HistoryStore::new(store.clone()),
            catalog.clone(),
        ));

        let app_state = AppState {
            engine,
            state,
            store,
            catalog,
            debounce: Arc::new(Debounce::new(debounce_window)),
            port: 0,
        };
        (create_router(app_state.clone()), app_state)
    }

    async fn post(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_module() {
        let (router, _) = build_app(Duration::ZERO, true).await;
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["module"], "drift-player");
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_next_advances_and_appends() {
        let (router, app) = build_app(Duration::ZERO, true).await;

        let (status, body) = post(&router, "/api/v1/playback/next").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["advanced"], true);
        assert!(CATALOG.contains(&body["track"].as_str().unwrap()));

        let (history, cursor) = app.engine.history_snapshot().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(cursor, 0);
    }

    #[tokio::test]
    async fn test_rapid_next_is_coalesced() {
        let (router, app) = build_app(Duration::from_secs(1), true).await;

        let (_, first) = post(&router, "/api/v1/playback/next").await;
        assert_eq!(first["advanced"], true);

        let (status, second) = post(&router, "/api/v1/playback/next").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["advanced"], false);
        assert_eq!(second["track"], first["track"]);

        let (history, _) = app.engine.history_snapshot().await.unwrap();
        assert_eq!(history.len(), 1, "coalesced trigger must not reach the engine");
    }

    #[tokio::test]
    async fn test_ended_is_not_debounced() {
        let (router, app) = build_app(Duration::from_secs(1), true).await;

        post(&router, "/api/v1/playback/next").await;
        let (status, body) = post(&router, "/api/v1/playback/ended").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["advanced"], true);

        let (history, _) = app.engine.history_snapshot().await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_previous_at_beginning_returns_null() {
        let (router, _) = build_app(Duration::ZERO, true).await;

        post(&router, "/api/v1/playback/next").await;
        let (status, body) = post(&router, "/api/v1/playback/previous").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["track"], serde_json::Value::Null);
        assert_eq!(body["advanced"], true);
    }

    #[tokio::test]
    async fn test_next_without_catalog_is_bad_gateway() {
        let (router, _) = build_app(Duration::ZERO, false).await;

        let (status, _) = post(&router, "/api/v1/playback/next").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_current_falls_back_to_persisted_resume_point() {
        let (router, app) = build_app(Duration::ZERO, true).await;

        // Simulate a previous run's resume state with nothing loaded yet
        app.store
            .set(keys::LAST_TRACK_URL, "http://x/resume.mp3")
            .await
            .unwrap();
        app.store.set(keys::LAST_POSITION_MS, "42000").await.unwrap();

        let (status, body) = get(&router, "/api/v1/playback/current").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["track"], "http://x/resume.mp3");
        assert_eq!(body["position_ms"], 42000);
    }

    #[tokio::test]
    async fn test_history_endpoint_reflects_navigation() {
        let (router, _) = build_app(Duration::ZERO, true).await;

        post(&router, "/api/v1/playback/next").await;
        post(&router, "/api/v1/playback/next").await;
        post(&router, "/api/v1/playback/previous").await;

        let (status, body) = get(&router, "/api/v1/playback/history").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["history"].as_array().unwrap().len(), 2);
        assert_eq!(body["cursor"], 0);
    }

    #[tokio::test]
    async fn test_position_report_updates_resume_point() {
        let (router, app) = build_app(Duration::ZERO, true).await;

        post(&router, "/api/v1/playback/next").await;

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/playback/position")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"position_ms": 9000}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let persisted = app.store.get(keys::LAST_POSITION_MS).await.unwrap();
        assert_eq!(persisted, Some("9000".to_string()));

        let track = app.state.get_current_track().await.unwrap();
        assert_eq!(track.position_ms, 9000);
    }

    #[tokio::test]
    async fn test_set_state_persists_intent() {
        let (router, app) = build_app(Duration::ZERO, true).await;

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/playback/state")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"state": "paused"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(
            app.state.get_playback_state().await,
            PlaybackState::Paused
        );
        assert_eq!(
            app.store.get(keys::WAS_PLAYING).await.unwrap(),
            Some("false".to_string())
        );
    }

    #[tokio::test]
    async fn test_catalog_info_reports_cache() {
        let (router, _) = build_app(Duration::ZERO, true).await;

        let (status, body) = get(&router, "/api/v1/catalog").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["track_count"], 5);
    }
}
