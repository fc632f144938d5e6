use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::vault_error;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::object_store::Bucket;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Bucket admin (only routed when admin mode is on)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateBucketRequest {
    pub name: String,
    #[serde(default)]
    pub public: bool,
}

pub async fn create_bucket(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CreateBucketRequest>,
) -> Result<Json<JSend<()>>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("bucket name must not be empty"));
    }
    state
        .vault
        .create_bucket(&req.name, req.public)
        .await
        .map_err(vault_error)?;

    tracing::info!(bucket = %req.name, public = req.public, "Created bucket");
    Ok(JSend::success(()))
}

pub async fn delete_bucket(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    state.vault.delete_bucket(&name).await.map_err(vault_error)?;
    tracing::info!(bucket = %name, "Deleted bucket");
    Ok(JSend::success(()))
}

pub async fn empty_bucket(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    state.vault.empty_bucket(&name).await.map_err(vault_error)?;
    tracing::warn!(bucket = %name, "Emptied bucket");
    Ok(JSend::success(()))
}

pub async fn list_buckets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Vec<Bucket>>>, ApiError> {
    let buckets = state.vault.list_buckets().await.map_err(vault_error)?;
    Ok(JSend::success(buckets))
}
