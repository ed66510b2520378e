//! HTTP server.
//!
//! Exposes the engine operations as a small JSON API for web clients and
//! chat bots.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Builds the index if needed, returns the document count |
//! | `POST` | `/refresh` | Rebuilds the index |
//! | `GET`  | `/search?q&k&team&quarter` | Retrieved passages |
//! | `GET`  | `/ask?q&k&team&quarter` | Extractive answer with citations |
//! | `GET`  | `/download?q&k&team&quarter&format` | `okrs.zip` or `okrs.csv` attachment |
//! | `GET`  | `/teams?quarter` | Known teams |
//! | `GET`  | `/quarters?team` | Known quarters |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "q must be at least 2 characters" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unsupported_format` (400),
//! `corpus_read` (500), `embedding_error` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use okr_harness_core::error::OkrError;
use okr_harness_core::models::BuildResult;

use crate::config::{Config, RetrievalConfig};
use crate::engine::OkrEngine;

/// Shortest accepted query, in characters.
pub const MIN_QUERY_CHARS: usize = 2;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    engine: Arc<OkrEngine>,
    retrieval: RetrievalConfig,
}

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated. Returns an error if binding fails.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = Arc::new(OkrEngine::from_config(config)?);
    let app = build_router(engine, config.retrieval.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "HTTP server listening");
    println!("OKR server listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Assemble the router. Separate from [`run_server`] so tests and
/// embedding applications can serve it on their own listener.
pub fn build_router(engine: Arc<OkrEngine>, retrieval: RetrievalConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/refresh", post(handle_refresh))
        .route("/search", get(handle_search))
        .route("/ask", get(handle_ask))
        .route("/download", get(handle_download))
        .route("/teams", get(handle_teams))
        .route("/quarters", get(handle_quarters))
        .layer(cors)
        .with_state(AppState { engine, retrieval })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
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

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<OkrError> for AppError {
    fn from(err: OkrError) -> Self {
        let (status, code) = match &err {
            OkrError::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "unsupported_format"),
            OkrError::CorpusRead { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "corpus_read"),
            OkrError::Embedding { .. } => (StatusCode::BAD_GATEWAY, "embedding_error"),
        };
        if status.is_server_error() {
            tracing::warn!(error = %err, "request failed");
        }
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

// ============ Handlers ============

#[derive(Debug, Deserialize)]
struct QueryParams {
    q: Option<String>,
    k: Option<usize>,
    team: Option<String>,
    quarter: Option<String>,
    format: Option<String>,
}

impl QueryParams {
    fn query(&self) -> Result<&str, AppError> {
        let q = self.q.as_deref().unwrap_or("");
        if q.chars().count() < MIN_QUERY_CHARS {
            return Err(bad_request(format!(
                "q must be at least {} characters",
                MIN_QUERY_CHARS
            )));
        }
        Ok(q)
    }
}

async fn handle_health(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.engine.health().await?))
}

#[derive(Serialize)]
struct RefreshResponse {
    status: &'static str,
    #[serde(flatten)]
    result: BuildResult,
}

async fn handle_refresh(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let result = state.engine.refresh().await?;
    Ok(Json(RefreshResponse {
        status: "refreshed",
        result,
    }))
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<impl IntoResponse, AppError> {
    let q = params.query()?;
    let k = params.k.unwrap_or(state.retrieval.search_k);
    let hits = state
        .engine
        .search(q, k, params.team.as_deref(), params.quarter.as_deref())
        .await?;
    Ok(Json(hits))
}

async fn handle_ask(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<impl IntoResponse, AppError> {
    let q = params.query()?;
    let k = params.k.unwrap_or(state.retrieval.ask_k);
    let answer = state
        .engine
        .ask(q, k, params.team.as_deref(), params.quarter.as_deref())
        .await?;
    Ok(Json(answer))
}

async fn handle_download(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Response, AppError> {
    let q = params.query()?;
    let k = params.k.unwrap_or(state.retrieval.download_k);
    let format = params.format.as_deref().unwrap_or("zip");
    let payload = state
        .engine
        .download(
            q,
            k,
            format,
            params.team.as_deref(),
            params.quarter.as_deref(),
        )
        .await?;

    let disposition = format!("attachment; filename=\"{}\"", payload.filename);
    Ok((
        [
            (header::CONTENT_TYPE, payload.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        payload.bytes,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct TeamsParams {
    quarter: Option<String>,
}

#[derive(Serialize)]
struct TeamsResponse {
    teams: Vec<String>,
}

async fn handle_teams(
    State(state): State<AppState>,
    Query(params): Query<TeamsParams>,
) -> Result<impl IntoResponse, AppError> {
    let teams = state.engine.teams(params.quarter.as_deref()).await?;
    Ok(Json(TeamsResponse { teams }))
}

#[derive(Debug, Deserialize)]
struct QuartersParams {
    team: Option<String>,
}

#[derive(Serialize)]
struct QuartersResponse {
    quarters: Vec<String>,
}

async fn handle_quarters(
    State(state): State<AppState>,
    Query(params): Query<QuartersParams>,
) -> Result<impl IntoResponse, AppError> {
    let quarters = state.engine.quarters(params.team.as_deref()).await?;
    Ok(Json(QuartersResponse { quarters }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(q: Option<&str>) -> QueryParams {
        QueryParams {
            q: q.map(String::from),
            k: None,
            team: None,
            quarter: None,
            format: None,
        }
    }

    #[test]
    fn test_query_length_validation() {
        assert!(params(None).query().is_err());
        assert!(params(Some("a")).query().is_err());
        assert_eq!(params(Some("ok")).query().unwrap(), "ok");
        assert_eq!(params(Some("éé")).query().unwrap(), "éé");
    }

    #[test]
    fn test_error_mapping() {
        let e = AppError::from(OkrError::UnsupportedFormat("pdf".into()));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, "unsupported_format");

        let e = AppError::from(OkrError::corpus_read("/data/okrs", "missing"));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.code, "corpus_read");

        let e = AppError::from(OkrError::embedding("openai", "timeout"));
        assert_eq!(e.status, StatusCode::BAD_GATEWAY);
        assert_eq!(e.code, "embedding_error");
    }
}
