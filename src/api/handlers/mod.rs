mod admin;
mod files;
mod folders;

pub use admin::{create_bucket, delete_bucket, empty_bucket, health, list_buckets};
pub use files::{
    delete_file, delete_files, get_signed_link, list_files, replace_file, upload_file,
    upload_files,
};
pub use folders::{copy_folder, move_folder};

use crate::api::response::ApiError;
use crate::object_store::StoreError;
use crate::vault::VaultError;

/// Map a VaultError to its user-facing status.
fn vault_error(e: VaultError) -> ApiError {
    match e {
        VaultError::Validation { .. } => ApiError::unprocessable(e.to_string()),
        VaultError::Forbidden(_) => ApiError::forbidden(e.to_string()),
        VaultError::Store(StoreError::NotFound(path)) => {
            ApiError::not_found(format!("Object not found: {path}"))
        }
        VaultError::Store(StoreError::AlreadyExists(path)) => {
            ApiError::conflict(format!("Object already exists: {path}"))
        }
        VaultError::Store(ref inner) => ApiError::bad_gateway(format!("Storage call failed: {inner}")),
        VaultError::Aborted { .. } => ApiError::conflict(e.to_string()),
        VaultError::PartialFailure { .. } => ApiError::conflict(e.to_string()),
    }
}
