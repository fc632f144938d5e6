use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::vault_error;
use crate::api::response::{ApiError, AppJson, JSend, OwnerId};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FolderRequest {
    pub from_prefix: String,
    pub to_prefix: String,
}

#[derive(Debug, Serialize)]
pub struct FolderResponse {
    pub count: u64,
    pub paths: Vec<String>,
}

/// Move every object under one prefix to another. Either the whole folder
/// moves or (after an abort) the whole folder stays put.
pub async fn move_folder(
    State(state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
    AppJson(req): AppJson<FolderRequest>,
) -> Result<Json<JSend<FolderResponse>>, ApiError> {
    check_prefixes(&req)?;
    let objects = state
        .vault
        .move_folder(&owner, &req.from_prefix, &req.to_prefix)
        .await
        .map_err(vault_error)?;

    tracing::debug!(owner = %owner, from = %req.from_prefix, to = %req.to_prefix, count = objects.len(), "Moved folder");
    Ok(JSend::success(FolderResponse {
        count: objects.len() as u64,
        paths: objects.into_iter().map(|o| o.path).collect(),
    }))
}

/// Copy a folder. The source is untouched either way.
pub async fn copy_folder(
    State(state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
    AppJson(req): AppJson<FolderRequest>,
) -> Result<Json<JSend<FolderResponse>>, ApiError> {
    check_prefixes(&req)?;
    let objects = state
        .vault
        .copy_folder(&owner, &req.from_prefix, &req.to_prefix)
        .await
        .map_err(vault_error)?;

    tracing::debug!(owner = %owner, from = %req.from_prefix, to = %req.to_prefix, count = objects.len(), "Copied folder");
    Ok(JSend::success(FolderResponse {
        count: objects.len() as u64,
        paths: objects.into_iter().map(|o| o.path).collect(),
    }))
}

fn check_prefixes(req: &FolderRequest) -> Result<(), ApiError> {
    if req.from_prefix.trim_matches('/').is_empty() || req.to_prefix.trim_matches('/').is_empty() {
        return Err(ApiError::bad_request(
            "from_prefix and to_prefix must not be empty",
        ));
    }
    if req.from_prefix.trim_end_matches('/') == req.to_prefix.trim_end_matches('/') {
        return Err(ApiError::bad_request(
            "from_prefix and to_prefix must differ",
        ));
    }
    Ok(())
}
