//! HTTP handlers for the job control surface.

use crate::catalog::{known_categories, KnownCategory};
use crate::config::JobConfig;
use crate::error::ExtractError;
use crate::job::{JobManager, Phase, StatusSnapshot};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<JobManager>,
}

/// Error body `{ "error": "..." }` with a status code.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        let status = match &err {
            ExtractError::Config(_) | ExtractError::AlreadyRunning => StatusCode::BAD_REQUEST,
            ExtractError::Resolution { .. } | ExtractError::Fetch(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Serialize)]
pub struct PhaseResponse {
    phase: Phase,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildrenResponse {
    parent: String,
    children: Vec<String>,
}

#[derive(Deserialize)]
pub struct ChildrenQuery {
    url: String,
}

#[derive(Deserialize)]
pub struct DownloadQuery {
    file: String,
}

pub async fn categories_handler() -> Json<Vec<KnownCategory>> {
    Json(known_categories())
}

/// Resolve a parent sitemap into its child sitemap URLs.
pub async fn children_handler(
    State(state): State<AppState>,
    Query(query): Query<ChildrenQuery>,
) -> Result<Json<ChildrenResponse>, ApiError> {
    let resolver = crate::acquisition::SitemapResolver::new(state.manager.source());
    let children = resolver.child_urls(&query.url).await?;
    Ok(Json(ChildrenResponse {
        parent: query.url,
        children,
    }))
}

pub async fn start_handler(
    State(state): State<AppState>,
    body: Result<Json<JobConfig>, axum::extract::rejection::JsonRejection>,
) -> Result<Json<StatusSnapshot>, ApiError> {
    let Json(config) = body.map_err(|e| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("invalid job configuration: {}", e.body_text()),
        )
    })?;
    let snapshot = state.manager.start(config).await?;
    Ok(Json(snapshot))
}

pub async fn pause_handler(State(state): State<AppState>) -> Result<Json<PhaseResponse>, ApiError> {
    phase_response(state.manager.pause().await)
}

pub async fn resume_handler(State(state): State<AppState>) -> Result<Json<PhaseResponse>, ApiError> {
    phase_response(state.manager.resume().await)
}

pub async fn stop_handler(State(state): State<AppState>) -> Result<Json<PhaseResponse>, ApiError> {
    phase_response(state.manager.stop().await)
}

fn phase_response(phase: Option<Phase>) -> Result<Json<PhaseResponse>, ApiError> {
    phase
        .map(|phase| Json(PhaseResponse { phase }))
        .ok_or_else(no_job)
}

pub async fn status_handler(
    State(state): State<AppState>,
) -> Result<Json<StatusSnapshot>, ApiError> {
    state.manager.status().await.map(Json).ok_or_else(no_job)
}

/// Serve a file produced by the current or last job as an attachment.
pub async fn download_handler(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let path = state
        .manager
        .output_file(&query.file)
        .await
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "no such output file"))?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        ApiError::new(StatusCode::NOT_FOUND, format!("cannot read {}: {e}", query.file))
    })?;

    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => "text/csv; charset=utf-8",
        Some("json") => "application/json",
        _ => "text/plain; charset=utf-8",
    };
    let disposition = format!("attachment; filename=\"{}\"", query.file);

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(bytes),
    )
        .into_response())
}

fn no_job() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "no extraction job has been started")
}
