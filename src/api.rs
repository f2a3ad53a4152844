//! HTTP façade over the catalog.
//!
//! Read routes serve the memoized views; write routes go through the
//! reconciler so they share its single-writer guard.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::core::catalog::{AllVersions, LatestVersions, TagLatest, TagVersions, VariantRestriction};
use crate::core::error::CatalogError;
use crate::core::state::AppState;
use crate::core::sync::{authorize_upload, PassReport, UploadSubmission, VariantCommit};

/// Mod archives are far larger than axum's default body limit.
const UPLOAD_LIMIT: usize = 256 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("a reconciliation pass is already running")]
    SyncInProgress,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, format!("unknown tag {m}")),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::SyncInProgress => (StatusCode::CONFLICT, self.to_string()),
            ApiError::Catalog(e) => match e {
                CatalogError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
                CatalogError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorised".into()),
                CatalogError::UnknownTag(tag) => {
                    (StatusCode::NOT_FOUND, format!("unknown tag {tag}"))
                }
                other => {
                    error!(error = %other, "request failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_owned(),
                    )
                }
            },
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/mods", get(latest_versions))
        .route("/mods/versions", get(all_versions))
        .route("/mods/{tag}", get(tag_latest))
        .route("/mods/{tag}/versions", get(tag_versions))
        .route(
            "/mods/{tag}/upload",
            post(upload).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
        .route("/latest-game-version", get(latest_game_version))
        .route("/sync", post(trigger_sync));

    Router::new()
        .nest("/api", api)
        .nest_service("/mods", ServeDir::new(state.mods_dir()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

async fn latest_versions(State(state): State<Arc<AppState>>) -> ApiResult<LatestVersions> {
    let views = state.reconciler.store().latest_versions().await?;
    Ok(Json(views.as_ref().clone()))
}

async fn all_versions(State(state): State<Arc<AppState>>) -> ApiResult<AllVersions> {
    let views = state.reconciler.store().all_versions().await?;
    Ok(Json(views.as_ref().clone()))
}

async fn tag_latest(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> ApiResult<TagLatest> {
    let view = state.reconciler.store().latest_versions_for(&tag).await?;
    view.map(Json).ok_or(ApiError::NotFound(tag))
}

async fn tag_versions(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> ApiResult<TagVersions> {
    let view = state.reconciler.store().all_versions_for(&tag).await?;
    view.map(Json).ok_or(ApiError::NotFound(tag))
}

async fn latest_game_version(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "lesta": state.settings.game_version_lesta,
        "wargaming": state.settings.game_version_wargaming,
    }))
}

async fn upload(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Vec<VariantCommit>> {
    let entry = state
        .reconciler
        .config()
        .get(&tag)
        .ok_or_else(|| CatalogError::UnknownTag(tag.clone()))?;
    authorize_upload(entry, bearer(&headers), state.settings.admin_token.as_deref())?;

    let mut submission = UploadSubmission {
        tag,
        file_name: String::new(),
        bytes: Bytes::new(),
        declared_canary_percent: None,
        variant_restriction: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read multipart field: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                submission.file_name = field.file_name().unwrap_or_default().to_string();
                submission.bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read file: {e}")))?;
            }
            "canary" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                if !raw.trim().is_empty() {
                    let percent = raw.trim().parse::<f64>().map_err(|_| {
                        ApiError::BadRequest(format!("canary must be a number, got {raw:?}"))
                    })?;
                    submission.declared_canary_percent = Some(percent);
                }
            }
            "variantRestriction" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                if !raw.trim().is_empty() {
                    submission.variant_restriction = Some(VariantRestriction::from_str(raw.trim())?);
                }
            }
            _ => {}
        }
    }

    let commits = state.reconciler.submit_upload(submission).await?;
    Ok(Json(commits))
}

async fn trigger_sync(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<PassReport> {
    let authorized = match (state.settings.admin_token.as_deref(), bearer(&headers)) {
        (Some(expected), Some(presented)) => expected == presented,
        _ => false,
    };
    if !authorized {
        return Err(CatalogError::Unauthorized("sync".into()).into());
    }

    info!("Manual reconciliation requested");
    let reconciler = Arc::clone(&state.reconciler);
    // A pass outlives a dropped request; run it detached.
    let report = tokio::spawn(async move { reconciler.try_run_pass().await })
        .await
        .map_err(|e| CatalogError::Other(format!("sync task failed: {e}")))?;

    report.map(Json).ok_or(ApiError::SyncInProgress)
}
