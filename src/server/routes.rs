//! Axum HTTP routes for the usage API.

use crate::config::ServeConfig;
use crate::scan::{run_session, ScanEngine, UsageEvent};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tracing::info;

/// Events buffered between a session and its SSE writer
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Shared application state
pub struct AppState {
    pub engine: Arc<ScanEngine>,
    pub initial_dir: Option<PathBuf>,
}

// ─── Route builder ───────────────────────────────────────────────

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/usage", get(usage))
        .route("/refresh", post(refresh));

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Handlers ────────────────────────────────────────────────────

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "duscan",
        "cached_paths": state.engine.cache().len(),
    }))
}

#[derive(Deserialize)]
struct PathQuery {
    path: Option<String>,
}

/// Open a usage event stream for `path`, the configured initial directory,
/// or the working directory, in that order of preference.
async fn usage(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let root = match query.path {
        Some(path) => PathBuf::from(path),
        None => match &state.initial_dir {
            Some(dir) => dir.clone(),
            // Resolution failures surface in-stream as server_error.
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        },
    };

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(run_session(Arc::clone(&state.engine), root, event_tx));

    let stream = ReceiverStream::new(event_rx)
        .map(|event: UsageEvent| Ok(Event::default().event(event.name()).data(event.payload())));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Drop `path` and its subtree from the cache so the next request rescans.
async fn refresh(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> impl IntoResponse {
    let Some(path) = query.path else {
        return (StatusCode::BAD_REQUEST, "path required").into_response();
    };

    let abs = std::path::absolute(PathBuf::from(&path)).unwrap_or_else(|_| PathBuf::from(&path));
    info!(path = %abs.display(), "cache invalidated");
    state.engine.invalidate(&abs);

    StatusCode::OK.into_response()
}

// ─── Server startup ──────────────────────────────────────────────

/// Start the usage server; runs until ctrl-c.
pub async fn serve(engine: Arc<ScanEngine>, config: ServeConfig) -> crate::error::Result<()> {
    let state = Arc::new(AppState {
        engine: Arc::clone(&engine),
        initial_dir: config.initial_dir.clone(),
    });

    let router = build_router(state);

    info!(addr = %config.listen_addr, "usage server listening");
    if let Some(ref dir) = config.initial_dir {
        info!(dir = %dir.display(), "initial directory configured");
    }

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.shutdown();
    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C handler");
    info!("shutting down gracefully");
}
