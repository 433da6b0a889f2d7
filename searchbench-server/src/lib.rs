use axum::{
    extract::{DefaultBodyLimit, Path, Query as QueryParams, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use searchbench_common::{
    Autocompleter, BenchError, BulkRequest, BulkResponse, ErrorResponse, Query, SearchIndex,
    Suggestion,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::timeout;

pub mod config;
pub mod engine;

use config::{DEFAULT_SUGGEST_LIMIT, LOCK_TIMEOUT, MAX_BODY_BYTES};
use engine::MemoryIndex;

pub type Registry = Arc<RwLock<HashMap<String, Arc<MemoryIndex>>>>;

#[derive(Clone, Default)]
pub struct AppState {
    pub indexes: Registry,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an index by name without creating it.
    pub async fn get(&self, name: &str) -> Result<Option<Arc<MemoryIndex>>, BenchError> {
        let guard = timeout(LOCK_TIMEOUT, self.indexes.read())
            .await
            .map_err(|_| BenchError::LockTimeout)?;
        Ok(guard.get(name).cloned())
    }

    /// Look up an index by name, registering an empty one if absent.
    pub async fn get_or_insert(&self, name: &str) -> Result<Arc<MemoryIndex>, BenchError> {
        if let Some(index) = self.get(name).await? {
            return Ok(index);
        }
        let mut guard = timeout(LOCK_TIMEOUT, self.indexes.write())
            .await
            .map_err(|_| BenchError::LockTimeout)?;
        Ok(guard
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryIndex::new(name)))
            .clone())
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
}

/// SearchBench reference server
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Get the server's configured address
    pub fn address(&self) -> SocketAddr {
        self.config.address
    }

    /// Create the application router with the given state
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/indexes/:name", put(handle_create).delete(handle_drop))
            .route("/indexes/:name/documents", post(handle_bulk))
            .route("/indexes/:name/search", post(handle_search))
            .route(
                "/indexes/:name/suggestions",
                post(handle_add_suggestions).delete(handle_delete_suggestions),
            )
            .route("/indexes/:name/suggest", get(handle_suggest))
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .with_state(state)
    }

    /// Run the server, signalling `ready_tx` with the bound address once accepting connections
    pub async fn run(self, ready_tx: tokio::sync::oneshot::Sender<SocketAddr>) -> Result<(), Box<dyn std::error::Error>> {
        let app = Self::create_router(AppState::new());
        let listener = tokio::net::TcpListener::bind(self.config.address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "searchbench server bound");
        ready_tx.send(local_addr).ok();
        axum::serve(listener, app).await?;
        Ok(())
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

/// Map a backend error onto the status code clients translate back into the same variant.
pub fn bench_error_response(err: &BenchError) -> Response {
    let status = match err {
        BenchError::IndexNotFound(_) => StatusCode::NOT_FOUND,
        BenchError::IndexExists(_) | BenchError::DuplicateDocument(_) => StatusCode::CONFLICT,
        BenchError::InvalidQuery(_) | BenchError::Config(_) => StatusCode::BAD_REQUEST,
        BenchError::LockTimeout => StatusCode::SERVICE_UNAVAILABLE,
        BenchError::NetworkError(_) | BenchError::HttpError(..) | BenchError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        tracing::warn!(error = %err, "request failed");
    }
    error_response(status, err.to_string())
}

fn not_found(name: &str) -> Response {
    bench_error_response(&BenchError::IndexNotFound(name.to_string()))
}

/// Handler for PUT /indexes/:name: creates an empty index; 409 if it already exists.
pub async fn handle_create(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let index = match state.get_or_insert(&name).await {
        Ok(index) => index,
        Err(e) => return bench_error_response(&e),
    };
    match index.create().await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => bench_error_response(&e),
    }
}

/// Handler for DELETE /indexes/:name: drops the index's documents (no-op if absent).
pub async fn handle_drop(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let index = match state.get(&name).await {
        Ok(Some(index)) => index,
        Ok(None) => return StatusCode::NO_CONTENT.into_response(),
        Err(e) => return bench_error_response(&e),
    };
    match index.drop_index().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => bench_error_response(&e),
    }
}

/// Handler for POST /indexes/:name/documents: bulk-indexes a batch of documents.
pub async fn handle_bulk(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<BulkRequest>,
) -> Response {
    let index = match state.get(&name).await {
        Ok(Some(index)) => index,
        Ok(None) => return not_found(&name),
        Err(e) => return bench_error_response(&e),
    };
    match index.index(&request.documents, &request.options).await {
        Ok(()) => Json(BulkResponse { indexed: request.documents.len() }).into_response(),
        Err(e) => bench_error_response(&e),
    }
}

/// Handler for POST /indexes/:name/search: runs one query and returns a page of results.
pub async fn handle_search(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(query): Json<Query>,
) -> Response {
    let index = match state.get(&name).await {
        Ok(Some(index)) => index,
        Ok(None) => return not_found(&name),
        Err(e) => return bench_error_response(&e),
    };
    match index.search(&query).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => bench_error_response(&e),
    }
}

/// Handler for POST /indexes/:name/suggestions: adds (or rescores) autocomplete terms.
pub async fn handle_add_suggestions(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(terms): Json<Vec<Suggestion>>,
) -> Response {
    let index = match state.get_or_insert(&name).await {
        Ok(index) => index,
        Err(e) => return bench_error_response(&e),
    };
    match index.add_terms(&terms).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => bench_error_response(&e),
    }
}

/// Handler for DELETE /indexes/:name/suggestions: empties the dictionary (no-op if absent).
pub async fn handle_delete_suggestions(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    let index = match state.get(&name).await {
        Ok(Some(index)) => index,
        Ok(None) => return StatusCode::NO_CONTENT.into_response(),
        Err(e) => return bench_error_response(&e),
    };
    match index.delete().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => bench_error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct SuggestParams {
    pub prefix: String,
    #[serde(default = "default_suggest_limit")]
    pub limit: usize,
    #[serde(default)]
    pub fuzzy: bool,
}

fn default_suggest_limit() -> usize {
    DEFAULT_SUGGEST_LIMIT
}

/// Handler for GET /indexes/:name/suggest: autocomplete lookup for a prefix.
pub async fn handle_suggest(
    State(state): State<AppState>,
    Path(name): Path<String>,
    QueryParams(params): QueryParams<SuggestParams>,
) -> Response {
    let index = match state.get(&name).await {
        Ok(Some(index)) => index,
        Ok(None) => return not_found(&name),
        Err(e) => return bench_error_response(&e),
    };
    match index.suggest(&params.prefix, params.limit, params.fuzzy).await {
        Ok(found) => Json(found).into_response(),
        Err(e) => bench_error_response(&e),
    }
}
