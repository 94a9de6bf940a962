//! HTTP server.
//!
//! Exposes upload, link extraction, robustification and stored mappings as
//! a small JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/pdfs` | Multipart upload (field `file`); `303` to `/links/{id}` |
//! | `GET`  | `/pdfs/{id}` | Stored PDF bytes |
//! | `GET`  | `/links/{id}` | Merged URI List of a stored PDF |
//! | `GET`  | `/mappings/{id}` | Last persisted robust mapping |
//! | `POST` | `/robustify` | Stream NDJSON outcomes for `{pdf_hash, uris}` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "unknown document ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `unreadable_document` (422), `internal` (500).
//!
//! # Streaming
//!
//! `POST /robustify` answers with `content-type: application/octet-stream`
//! and one JSON object per line, written as each archive call completes.
//! A client that disconnects early cancels the remaining calls; whatever
//! finished is still persisted.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::archive::RobustLinksClient;
use crate::canonical::Canonicalizer;
use crate::config::Config;
use crate::extract::{looks_like_pdf, ExtractError, Extractor, MIME_PDF};
use crate::models::{DocumentId, RobustMapping, StoredDocument};
use crate::robustify::RobustifyPipeline;
use crate::store::{SqliteStore, Store};

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub extractor: Extractor,
    pub pipeline: RobustifyPipeline,
}

impl AppState {
    /// Wire the production store, blacklist and archive client from config.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let blacklist = Arc::new(config.load_blacklist()?);
        let extractor = Extractor::new(Arc::new(Canonicalizer::new(blacklist)));
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open(config).await?);
        let archiver = Arc::new(RobustLinksClient::new(&config.archive)?);
        let pipeline =
            RobustifyPipeline::new(archiver, Arc::clone(&store), config.archive.concurrency);
        Ok(Self {
            store,
            extractor,
            pipeline,
        })
    }
}

/// All routes, without binding. Tests drive this with `oneshot`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/pdfs", post(handle_upload))
        .route("/pdfs/{id}", get(handle_pdf))
        .route("/links/{id}", get(handle_links))
        .route("/mappings/{id}", get(handle_mapping))
        .route("/robustify", post(handle_robustify))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config).await?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "listening");
    eprintln!("pdf-links listening on http://{}", config.server.bind);
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
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn unreadable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        code: "unreadable_document",
        message: message.into(),
    }
}

fn internal(err: impl std::fmt::Display) -> AppError {
    tracing::error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: err.to_string(),
    }
}

fn parse_id(raw: &str) -> Result<DocumentId, AppError> {
    raw.parse().map_err(|e| bad_request(format!("{}", e)))
}

async fn require_document(state: &AppState, id: &DocumentId) -> Result<StoredDocument, AppError> {
    state
        .store
        .document(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("unknown document {}", id)))
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

// ============ POST /pdfs ============

/// Accepts the `file` field of a multipart form. The part must be declared
/// `application/pdf` or start with a PDF header.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(|s| s.to_string());
        let declared_pdf = field
            .content_type()
            .is_some_and(|ct| ct.eq_ignore_ascii_case(MIME_PDF));
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;

        if bytes.is_empty() {
            return Err(bad_request("uploaded file is empty"));
        }
        if !declared_pdf && !looks_like_pdf(&bytes) {
            return Err(bad_request("uploaded file is not a PDF"));
        }

        let doc = state
            .store
            .put_document(&bytes, filename.as_deref())
            .await
            .map_err(internal)?;
        return Ok(Redirect::to(&format!("/links/{}", doc.id)));
    }
    Err(bad_request("missing multipart field 'file'"))
}

// ============ GET /pdfs/{id} ============

async fn handle_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let bytes = state
        .store
        .document_bytes(&id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("unknown document {}", id)))?;
    Ok(([(header::CONTENT_TYPE, MIME_PDF)], bytes).into_response())
}

// ============ GET /links/{id} ============

#[derive(Serialize)]
struct LinksResponse {
    pdf_hash: DocumentId,
    original_name: Option<String>,
    links: Vec<String>,
}

async fn handle_links(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LinksResponse>, AppError> {
    let id = parse_id(&id)?;
    let doc = require_document(&state, &id).await?;
    let bytes = state
        .store
        .document_bytes(&id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("PDF bytes missing for {}", id)))?;

    let extractor = state.extractor.clone();
    let links = tokio::task::spawn_blocking(move || extractor.extract_all(&bytes))
        .await
        .map_err(internal)?
        .map_err(|e| match e {
            ExtractError::DocumentUnreadable(_) => unreadable(e.to_string()),
        })?;

    Ok(Json(LinksResponse {
        pdf_hash: doc.id,
        original_name: doc.original_name,
        links,
    }))
}

// ============ GET /mappings/{id} ============

async fn handle_mapping(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RobustMapping>, AppError> {
    let id = parse_id(&id)?;
    require_document(&state, &id).await?;
    let mapping = state
        .store
        .load_mapping(&id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("no robust mapping for {}", id)))?;
    Ok(Json(mapping))
}

// ============ POST /robustify ============

#[derive(Deserialize)]
struct RobustifyRequest {
    pdf_hash: String,
    uris: Vec<String>,
}

async fn handle_robustify(
    State(state): State<AppState>,
    Json(req): Json<RobustifyRequest>,
) -> Result<Response, AppError> {
    let id = parse_id(&req.pdf_hash)?;
    require_document(&state, &id).await?;

    let lines = state
        .pipeline
        .start(id, req.uris)
        .into_lines()
        .map(Ok::<_, Infallible>);

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(lines),
    )
        .into_response())
}
