//! HTTP API server.
//!
//! Item CRUD over an injected [`ItemStore`] plus the query-to-report
//! endpoint, which runs the [`pipeline`](crate::pipeline) and streams back a
//! `.docx` file.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/` | Welcome message |
//! | `GET`    | `/health` | Health check (returns version) |
//! | `GET`    | `/items/` | List up to `server.page_size` items |
//! | `POST`   | `/items/?custom_id=` | Create an item |
//! | `GET`    | `/items/{id}` | Fetch an item |
//! | `PUT`    | `/items/{id}` | Replace an item |
//! | `DELETE` | `/items/{id}` | Delete an item, returning it |
//! | `GET`    | `/generate_docx_from_query/?word=` | Answer a query into a `.docx` |
//!
//! `/items` without the trailing slash is routed identically.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "Item not found" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `not_found` | 404 |
//! | `validation` | 422 |
//! | `conflict` | 409 |
//! | `upstream_unavailable` | 502 |
//! | `internal` | 500 |
//!
//! Internal errors carry the underlying cause in `message`.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use item_rag_core::models::{is_valid_id, Item, ItemInDb};
use item_rag_core::store::{ItemStore, StoreError};

use crate::config::Config;
use crate::db;
use crate::generation::{ChatCompletionsGenerator, Generator};
use crate::migrate;
use crate::pipeline::{self, PipelineError};
use crate::report::MIME_DOCX;
use crate::sqlite_store::SqliteItemStore;

const WELCOME: &str =
    "Welcome! Call /generate_docx_from_query/?word=<word> to create a document from a query";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
///
/// Every collaborator is injected, so tests can swap in the in-memory store
/// and a stub generator.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ItemStore>,
    pub generator: Arc<dyn Generator>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn ItemStore>, generator: Arc<dyn Generator>, config: Config) -> Self {
        Self {
            store,
            generator,
            config: Arc::new(config),
        }
    }
}

/// Starts the HTTP server.
///
/// Connects to the configured database, ensures the schema exists, builds
/// the generation client, and serves until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;

    let store = Arc::new(SqliteItemStore::new(pool));
    let generator = Arc::new(ChatCompletionsGenerator::new(&config.generation)?);
    let state = AppState::new(store, generator, config.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        model = %config.generation.model,
        "item-rag server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Builds the router with all routes and middleware.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/items", get(handle_list_items).post(handle_create_item))
        .route("/items/", get(handle_list_items).post(handle_create_item))
        .route(
            "/items/{id}",
            get(handle_get_item)
                .put(handle_update_item)
                .delete(handle_delete_item),
        )
        .route("/generate_docx_from_query/", get(handle_generate_docx))
        .route("/generate_docx_from_query", get(handle_generate_docx))
        .fallback(handle_fallback)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// Request-level error, mapped explicitly to a status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    UpstreamUnavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::Validation(_) => "validation",
            ApiError::Conflict(_) => "conflict",
            ApiError::UpstreamUnavailable(_) => "upstream_unavailable",
            ApiError::Internal(_) => "internal",
        }
    }

    /// Maps a store failure; `context` prefixes internal errors.
    fn from_store(context: &str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound("Item not found".to_string()),
            StoreError::Duplicate(id) => {
                ApiError::Conflict(format!("Item with id '{}' already exists", id))
            }
            StoreError::Unavailable(msg) => ApiError::Internal(format!("{}: {}", context, msg)),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::EmptyQuery => ApiError::Validation(message),
            PipelineError::NoMatches => ApiError::NotFound(message),
            PipelineError::Store(e) => ApiError::from_store("Internal Server Error", e),
            PipelineError::Generation(e) => ApiError::UpstreamUnavailable(e.to_string()),
            PipelineError::Report(e) => {
                ApiError::Internal(format!("Internal Server Error: {}", e))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

fn check_id(id: &str) -> Result<(), ApiError> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "invalid item id '{}': expected 1-64 characters of [A-Za-z0-9_-]",
            id
        )))
    }
}

/// Extracts and validates the `{id}` path segment.
fn path_id(path: Result<Path<String>, PathRejection>) -> Result<String, ApiError> {
    let Path(id) = path.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
    check_id(&id)?;
    Ok(id)
}

fn json_body(payload: Result<Json<Item>, JsonRejection>) -> Result<Item, ApiError> {
    payload
        .map(|Json(item)| item)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

// ============ GET / and /health ============

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": WELCOME }))
}

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn handle_fallback(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}

// ============ /items ============

async fn handle_list_items(State(state): State<AppState>) -> Result<Json<Vec<ItemInDb>>, ApiError> {
    let items = state
        .store
        .find_all(state.config.server.page_size)
        .await
        .map_err(|e| ApiError::from_store("Error retrieving items", e))?;
    Ok(Json(items))
}

async fn handle_get_item(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<ItemInDb>, ApiError> {
    let id = path_id(path)?;
    let item = state
        .store
        .find_by_id(&id)
        .await
        .map_err(|e| ApiError::from_store("Error retrieving item", e))?;
    Ok(Json(item))
}

/// Query parameters for `POST /items/`.
#[derive(Debug, Deserialize)]
struct CreateParams {
    custom_id: Option<String>,
}

async fn handle_create_item(
    State(state): State<AppState>,
    Query(params): Query<CreateParams>,
    payload: Result<Json<Item>, JsonRejection>,
) -> Result<Json<ItemInDb>, ApiError> {
    let item = json_body(payload)?;
    // An empty custom_id means "generate one".
    let custom_id = params.custom_id.filter(|id| !id.is_empty());
    if let Some(id) = &custom_id {
        check_id(id)?;
    }

    let created = state
        .store
        .insert(&item, custom_id.as_deref())
        .await
        .map_err(|e| ApiError::from_store("Error creating item", e))?;
    tracing::info!(id = %created.id, "item created");
    Ok(Json(created))
}

async fn handle_update_item(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<Item>, JsonRejection>,
) -> Result<Json<ItemInDb>, ApiError> {
    let id = path_id(path)?;
    let item = json_body(payload)?;
    let updated = state
        .store
        .replace(&id, &item)
        .await
        .map_err(|e| ApiError::from_store("Error updating item", e))?;
    Ok(Json(updated))
}

async fn handle_delete_item(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<ItemInDb>, ApiError> {
    let id = path_id(path)?;
    let deleted = state
        .store
        .delete_by_id(&id)
        .await
        .map_err(|e| ApiError::from_store("Error deleting item", e))?;
    tracing::info!(id = %deleted.id, "item deleted");
    Ok(Json(deleted))
}

// ============ GET /generate_docx_from_query/ ============

/// Query parameters for `GET /generate_docx_from_query/`.
#[derive(Debug, Deserialize)]
struct GenerateParams {
    /// Word to search for in item descriptions.
    word: String,
}

async fn handle_generate_docx(
    State(state): State<AppState>,
    params: Result<Query<GenerateParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params.map_err(|r| ApiError::Validation(r.body_text()))?;

    let report = pipeline::answer_query(
        state.store.as_ref(),
        state.generator.as_ref(),
        &state.config,
        &params.word,
    )
    .await?;

    let headers = [
        (header::CONTENT_TYPE, MIME_DOCX.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", report.filename),
        ),
    ];
    Ok((StatusCode::OK, headers, report.bytes).into_response())
}
