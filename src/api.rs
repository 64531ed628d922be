use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Path as UrlPath, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::cache::{Cache, Payload};
use crate::connection::ConnectionManager;
use crate::hub::{FeedEvent, SseHub};
use crate::source::SourceDescriptor;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<Cache>,
    pub hub: Arc<SseHub>,
    pub connections: ConnectionManager,
    pub sources: Arc<Vec<SourceDescriptor>>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/events", get(events))
        .route("/sources", get(list_sources))
        .route("/sources/{name}", get(source_snapshot))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Serve a UI bundle for anything the API doesn't match.
pub fn with_static_dir(router: Router, dir: &Path) -> Router {
    router.fallback_service(ServeDir::new(dir))
}

/// One SSE connection is one subscriber: register, replay the cache to it,
/// then stream live broadcasts until the client goes away.
async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let sub = state.hub.subscribe();
    let replayed = state.connections.on_connect(sub.id());
    tracing::debug!(target: "feed", subscriber = %sub.id(), replayed, "catch-up queued");

    let stream = sub.into_stream().map(|ev| Ok(to_sse_event(&ev)));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse_event(ev: &FeedEvent) -> Event {
    Event::default().event(&ev.name).data(ev.payload.to_string())
}

#[derive(serde::Serialize)]
struct SourceStatus {
    name: String,
    target: String,
    refresh_interval_secs: u64,
    last_updated: Option<DateTime<Utc>>,
}

async fn list_sources(State(state): State<AppState>) -> Json<Vec<SourceStatus>> {
    let out = state
        .sources
        .iter()
        .map(|s| SourceStatus {
            name: s.name.clone(),
            target: s.target.clone(),
            refresh_interval_secs: s.refresh_interval_secs,
            last_updated: state.cache.get(&s.name).map(|e| e.last_updated),
        })
        .collect::<Vec<_>>();
    Json(out)
}

#[derive(serde::Serialize)]
struct SourceSnapshot {
    source: String,
    payload: Payload,
    last_updated: DateTime<Utc>,
}

async fn source_snapshot(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
) -> Result<Json<SourceSnapshot>, (StatusCode, String)> {
    match state.cache.get(&name) {
        Some(e) => Ok(Json(SourceSnapshot {
            source: e.source,
            payload: (*e.payload).clone(),
            last_updated: e.last_updated,
        })),
        None if state.sources.iter().any(|s| s.name == name) => Err((
            StatusCode::NOT_FOUND,
            format!("source '{name}' has no data yet"),
        )),
        None => Err((StatusCode::NOT_FOUND, format!("unknown source '{name}'"))),
    }
}

