//! JSON HTTP API.
//!
//! Serves the session, watchlist, and retrieval endpoints the chat
//! frontend talks to.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/session/select` | Switch the active watch session |
//! | `POST` | `/api/watchlist/add` | Attach a folder to a session |
//! | `DELETE` | `/api/watchlist/remove` | Detach a folder from a session |
//! | `POST` | `/api/search/semantic` | Cosine top-K chunk retrieval |
//! | `POST` | `/api/search/symbols` | Keyword symbol lookup with snippets |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Lifecycle failures return an error body:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "folder_path must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `watcher_error` (500), `internal` (500).
//!
//! Retrieval endpoints are different: a failed search degrades to
//! `{ "success": false, "answer": [] }` with status 200, so a broken or
//! empty index never blocks the chat flow that consumes these answers.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the frontend is an
//! app shell served from a different origin.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::search;
use crate::session;
use crate::watcher::WatchManager;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    /// Lifecycle transitions are serialized through this lock, which is
    /// what makes session switches atomic from the API's point of view.
    watch: Arc<Mutex<WatchManager>>,
}

/// Starts the HTTP server.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config, pool: SqlitePool) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let watch = WatchManager::new(pool.clone(), config.clone())?;
    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        watch: Arc::new(Mutex::new(watch)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/session/select", post(handle_session_select))
        .route("/api/watchlist/add", post(handle_watchlist_add))
        .route("/api/watchlist/remove", delete(handle_watchlist_remove))
        .route("/api/search/semantic", post(handle_semantic_search))
        .route("/api/search/symbols", post(handle_symbol_search))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!("listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// A watcher that could not be torn down or started is fatal to the
/// lifecycle operation; the caller must not assume a clean switch.
fn watcher_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "watcher_error".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/session/select ============

#[derive(Deserialize)]
struct SessionSelectRequest {
    session_id: String,
}

#[derive(Serialize)]
struct SessionSelectResponse {
    success: bool,
    file_count: i64,
    paths: Vec<String>,
}

/// Handler for `POST /api/session/select`.
///
/// Tears down the active watcher (whatever session it served) and starts
/// one for the requested session's attached folders. With no attached
/// folders the watcher stays idle and `file_count` is -1.
async fn handle_session_select(
    State(state): State<AppState>,
    Json(req): Json<SessionSelectRequest>,
) -> Result<Json<SessionSelectResponse>, AppError> {
    if req.session_id.trim().is_empty() {
        return Err(bad_request("session_id must not be empty"));
    }

    let mut watch = state.watch.lock().await;
    let paths = watch
        .activate(&req.session_id)
        .await
        .map_err(|e| watcher_error(e.to_string()))?;

    Ok(Json(SessionSelectResponse {
        success: true,
        file_count: watch.file_count().await,
        paths: paths
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect(),
    }))
}

// ============ POST /api/watchlist/add ============

#[derive(Deserialize)]
struct WatchlistRequest {
    folder_path: String,
    session_id: String,
}

#[derive(Serialize)]
struct WatchlistAddResponse {
    success: bool,
    file_count: i64,
    state: String,
}

/// Handler for `POST /api/watchlist/add`.
///
/// Records the attachment and, when the manager is idle or already
/// serving this session, adds the folder to the live watch set. An
/// attachment for a non-active session is recorded only; it takes
/// effect on the next select.
async fn handle_watchlist_add(
    State(state): State<AppState>,
    Json(req): Json<WatchlistRequest>,
) -> Result<Json<WatchlistAddResponse>, AppError> {
    if req.folder_path.trim().is_empty() {
        return Err(bad_request("folder_path must not be empty"));
    }
    if req.session_id.trim().is_empty() {
        return Err(bad_request("session_id must not be empty"));
    }
    let folder = PathBuf::from(&req.folder_path);
    if !folder.is_dir() {
        return Err(bad_request(format!(
            "not a directory: {}",
            folder.display()
        )));
    }

    session::attach_folder(&state.pool, &req.folder_path, &req.session_id)
        .await
        .map_err(|e| internal(e.to_string()))?;

    let mut watch = state.watch.lock().await;
    let live = match watch.active_session() {
        None => true,
        Some(active) => active == req.session_id,
    };
    if live {
        watch
            .add_path(&req.session_id, &folder)
            .await
            .map_err(|e| watcher_error(e.to_string()))?;
    }

    Ok(Json(WatchlistAddResponse {
        success: true,
        file_count: watch.file_count().await,
        state: if live { "watching" } else { "recorded" }.to_string(),
    }))
}

// ============ DELETE /api/watchlist/remove ============

#[derive(Serialize)]
struct WatchlistRemoveResponse {
    success: bool,
    file_count: i64,
}

/// Handler for `DELETE /api/watchlist/remove`.
///
/// Drops the attachment record and, when the folder is part of the live
/// watch set, stops watching it. Indexed rows for its files are kept; a
/// re-attach picks them up at their current fingerprints.
async fn handle_watchlist_remove(
    State(state): State<AppState>,
    Json(req): Json<WatchlistRequest>,
) -> Result<Json<WatchlistRemoveResponse>, AppError> {
    if req.folder_path.trim().is_empty() {
        return Err(bad_request("folder_path must not be empty"));
    }

    session::detach_folder(&state.pool, &req.folder_path, &req.session_id)
        .await
        .map_err(|e| internal(e.to_string()))?;

    let mut watch = state.watch.lock().await;
    if watch.active_session() == Some(req.session_id.as_str()) {
        watch
            .remove_path(&PathBuf::from(&req.folder_path))
            .await
            .map_err(|e| watcher_error(e.to_string()))?;
    }

    Ok(Json(WatchlistRemoveResponse {
        success: true,
        file_count: watch.file_count().await,
    }))
}

// ============ Retrieval ============

#[derive(Deserialize)]
struct SemanticSearchRequest {
    prompt: String,
    session_id: String,
    k: Option<usize>,
}

#[derive(Deserialize)]
struct SymbolSearchRequest {
    keywords: Vec<String>,
}

#[derive(Serialize)]
struct SearchResponse {
    success: bool,
    answer: Vec<String>,
}

/// Handler for `POST /api/search/semantic`.
async fn handle_semantic_search(
    State(state): State<AppState>,
    Json(req): Json<SemanticSearchRequest>,
) -> Json<SearchResponse> {
    let k = req.k.unwrap_or(state.config.retrieval.semantic_limit);
    match search::semantic_search(&state.pool, &state.config, &req.prompt, &req.session_id, k).await
    {
        Ok(hits) => Json(SearchResponse {
            success: true,
            answer: search::render_semantic(&hits),
        }),
        Err(e) => {
            warn!(error = %e, "semantic search failed");
            Json(SearchResponse {
                success: false,
                answer: Vec::new(),
            })
        }
    }
}

/// Handler for `POST /api/search/symbols`.
async fn handle_symbol_search(
    State(state): State<AppState>,
    Json(req): Json<SymbolSearchRequest>,
) -> Json<SearchResponse> {
    let limit = state.config.retrieval.symbol_limit;
    match search::symbol_search(&state.pool, &req.keywords, limit).await {
        Ok(hits) => Json(SearchResponse {
            success: true,
            answer: search::render_symbols(&hits),
        }),
        Err(e) => {
            warn!(error = %e, "symbol search failed");
            Json(SearchResponse {
                success: false,
                answer: Vec::new(),
            })
        }
    }
}
