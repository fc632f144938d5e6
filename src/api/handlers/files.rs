use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::vault_error;
use crate::api::response::{ApiError, AppJson, AppQuery, JSend, OwnerId};
use crate::object_store::{ListOptions, StoredObject};
use crate::vault::{DeleteReport, Vault, VaultError};
use crate::txn::UploadItem;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub name: String,
    pub path: String,
    pub bucket: String,
    pub byte_size: u64,
    pub content_type: String,
    pub created_at: String,
    pub updated_at: String,
    pub public_url: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFileParams {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFilesRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListFilesParams {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
pub struct SignedLinkParams {
    pub path: String,
    #[serde(default = "default_ttl")]
    pub ttl: u64,
}

fn default_ttl() -> u64 {
    3600
}

#[derive(Debug, Serialize)]
pub struct SignedLinkResponse {
    pub url: String,
    pub expires_in: u64,
}

/// One file part pulled out of a multipart body.
struct FilePart {
    name: String,
    content_type: String,
    data: Bytes,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
    multipart: Multipart,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let (parts, _) = read_multipart(&state, multipart).await?;
    let part = single_part(parts)?;

    let object = state
        .vault
        .upload(&owner, &part.name, &part.content_type, part.data)
        .await
        .map_err(vault_error)?;

    tracing::debug!(owner = %owner, path = %object.path, "Uploaded file");
    Ok(JSend::success(file_to_response(&state.vault, &object)))
}

pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
    multipart: Multipart,
) -> Result<Json<JSend<Vec<FileResponse>>>, ApiError> {
    let (parts, _) = read_multipart(&state, multipart).await?;
    if parts.is_empty() {
        return Err(ApiError::bad_request("at least one file field is required"));
    }

    let mut items = Vec::with_capacity(parts.len());
    for part in parts {
        let category = Vault::validate(&part.content_type, part.data.len() as u64)
            .map_err(|e| ApiError::unprocessable(format!("'{}': {e}", part.name)))?;
        let path = Vault::allocate_path(&owner, category, &part.name);
        items.push(UploadItem {
            path,
            content: part.data,
            options: crate::object_store::PutOptions {
                content_type: Some(part.content_type),
                ..Default::default()
            },
        });
    }

    let objects = state
        .vault
        .upload_batch(&owner, items)
        .await
        .map_err(vault_error)?;

    tracing::debug!(owner = %owner, count = objects.len(), "Uploaded file batch");
    Ok(JSend::success(
        objects
            .iter()
            .map(|o| file_to_response(&state.vault, o))
            .collect(),
    ))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
    AppQuery(params): AppQuery<DeleteFileParams>,
) -> Result<Json<JSend<()>>, ApiError> {
    state
        .vault
        .delete(&owner, &params.path)
        .await
        .map_err(vault_error)?;

    tracing::debug!(owner = %owner, path = %params.path, "Deleted file");
    Ok(JSend::success(()))
}

/// Batch delete. A partial result is not an error: the response reports
/// exactly which paths were removed and which still exist.
pub async fn delete_files(
    State(state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
    AppJson(req): AppJson<DeleteFilesRequest>,
) -> Result<Json<JSend<DeleteReport>>, ApiError> {
    if req.paths.is_empty() {
        return Err(ApiError::bad_request("paths must not be empty"));
    }

    match state.vault.delete_batch(&owner, req.paths).await {
        Ok(report) => Ok(JSend::success(report)),
        Err(VaultError::PartialFailure { succeeded, failed }) => {
            Ok(JSend::success(DeleteReport { succeeded, failed }))
        }
        Err(e) => Err(vault_error(e)),
    }
}

pub async fn replace_file(
    State(state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
    multipart: Multipart,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let (parts, path) = read_multipart(&state, multipart).await?;
    let path = path.ok_or_else(|| ApiError::bad_request("path field is required"))?;
    let part = single_part(parts)?;

    let object = state
        .vault
        .replace(&owner, &path, &part.content_type, part.data)
        .await
        .map_err(vault_error)?;

    tracing::debug!(owner = %owner, path = %path, "Replaced file");
    Ok(JSend::success(file_to_response(&state.vault, &object)))
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
    AppQuery(params): AppQuery<ListFilesParams>,
) -> Result<Json<JSend<Vec<FileResponse>>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let prefix = params.prefix.unwrap_or_else(|| owner.clone());
    let objects = state
        .vault
        .list(
            &owner,
            &prefix,
            ListOptions {
                limit: Some(params.limit),
                offset: Some(params.offset),
            },
        )
        .await
        .map_err(vault_error)?;

    Ok(JSend::success(
        objects
            .iter()
            .map(|o| file_to_response(&state.vault, o))
            .collect(),
    ))
}

pub async fn get_signed_link(
    State(state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
    AppQuery(params): AppQuery<SignedLinkParams>,
) -> Result<Json<JSend<SignedLinkResponse>>, ApiError> {
    let url = state
        .vault
        .signed_url(&owner, &params.path, params.ttl)
        .await
        .map_err(vault_error)?;

    Ok(JSend::success(SignedLinkResponse {
        url,
        expires_in: params.ttl,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Drain a multipart body into file parts plus an optional `path` text
/// field. Unknown fields are ignored.
async fn read_multipart(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<(Vec<FilePart>, Option<String>), ApiError> {
    let mut parts = Vec::new();
    let mut path = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "file".to_string());
                let declared = field.content_type().map(|s| s.to_string());

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;

                if data.len() as u64 > state.config.max_upload_size {
                    return Err(ApiError::payload_too_large(format!(
                        "File exceeds maximum upload size of {} bytes",
                        state.config.max_upload_size
                    )));
                }

                // Prefer the declared type, falling back to a guess from
                // the filename.
                let content_type = declared
                    .filter(|ct| ct != "application/octet-stream")
                    .or_else(|| {
                        mime_guess::from_path(&file_name)
                            .first()
                            .map(|m| m.to_string())
                    })
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                parts.push(FilePart {
                    name: file_name,
                    content_type,
                    data,
                });
            }
            "path" => {
                path = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Invalid path: {e}")))?,
                );
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    Ok((parts, path))
}

fn single_part(mut parts: Vec<FilePart>) -> Result<FilePart, ApiError> {
    match parts.len() {
        0 => Err(ApiError::bad_request("file field is required")),
        1 => Ok(parts.remove(0)),
        n => Err(ApiError::bad_request(format!(
            "expected exactly one file field, got {n}"
        ))),
    }
}

fn file_to_response(vault: &Vault, object: &StoredObject) -> FileResponse {
    FileResponse {
        id: object.id.clone(),
        name: object.name.clone(),
        path: object.path.clone(),
        bucket: object.bucket.clone(),
        byte_size: object.byte_size,
        content_type: object.content_type.clone(),
        created_at: object.created_at.to_rfc3339(),
        updated_at: object.updated_at.to_rfc3339(),
        public_url: vault
            .public_url(owner_of(&object.path), &object.path)
            .unwrap_or_default(),
    }
}

fn owner_of(path: &str) -> &str {
    path.split('/').next().unwrap_or("")
}
