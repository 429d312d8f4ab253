//! HTTP control interface
//!
//! The playback client (and any remote-control surface) drives the daemon
//! through these endpoints: trigger endpoints for next/previous/initial,
//! signal endpoints for ended/error/state/position reports, and read-only
//! views of the current track, the history, and the catalog. Trigger
//! debouncing lives here at the command boundary, not in the engine.

pub mod debounce;
pub mod handlers;
pub mod sse;

use crate::catalog::CatalogProvider;
use crate::engine::SelectionEngine;
use crate::state::SharedState;
use crate::store::StoreHandle;
use axum::routing::{get, post};
use axum::Router;
use self::debounce::Debounce;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SelectionEngine>,
    pub state: Arc<SharedState>,
    pub store: StoreHandle,
    pub catalog: CatalogProvider,
    pub debounce: Arc<Debounce>,
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest(
            "/api/v1",
            Router::new()
                // Selection triggers
                .route("/playback/initial", post(handlers::initial))
                .route("/playback/next", post(handlers::next_track))
                .route("/playback/previous", post(handlers::previous_track))
                // Signals from the playback client
                .route("/playback/ended", post(handlers::track_ended))
                .route("/playback/error", post(handlers::track_error))
                .route("/playback/state", post(handlers::set_state))
                .route("/playback/position", post(handlers::report_position))
                // Read-only views
                .route("/playback/current", get(handlers::current))
                .route("/playback/history", get(handlers::history))
                .route("/catalog", get(handlers::catalog_info))
                // SSE events
                .route("/events", get(sse::event_stream)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
