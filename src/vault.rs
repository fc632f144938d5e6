//! The façade consumed by request handlers. Hides whether an operation is
//! single-object or transactional, and enforces the owner-prefix
//! authorization check on every path before anything reaches the
//! coordinator.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::object_store::{
    Bucket, ListOptions, ObjectStore, PutOptions, StoreError, StoredObject,
};
use crate::path;
use crate::txn::{Coordinator, TxnError, TxnOutcome, UploadItem};
use crate::validate::{self, MediaCategory, ValidationError};

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("validation failed for '{path}': {source}")]
    Validation {
        path: String,
        #[source]
        source: ValidationError,
    },
    #[error("path '{0}' is outside the caller's owner prefix")]
    Forbidden(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("transaction aborted: {cause}")]
    Aborted {
        cause: StoreError,
        compensation_complete: bool,
    },
    #[error("batch delete incomplete: {} path(s) not removed", .failed.len())]
    PartialFailure {
        succeeded: Vec<String>,
        failed: Vec<String>,
    },
}

impl From<TxnError> for VaultError {
    fn from(e: TxnError) -> Self {
        match e {
            TxnError::Validation { path, source } => VaultError::Validation { path, source },
            TxnError::Store(e) => VaultError::Store(e),
        }
    }
}

/// Result of a batch delete: the two sets partition the request.
#[derive(Debug, Serialize)]
pub struct DeleteReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

pub struct Vault {
    coordinator: Coordinator,
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl Vault {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, deadline: Duration) -> Self {
        Self {
            coordinator: Coordinator::new(Arc::clone(&store), deadline),
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Pure pre-flight check, re-exported for handlers that want to reject
    /// before buffering a body.
    pub fn validate(content_type: &str, byte_size: u64) -> Result<MediaCategory, ValidationError> {
        validate::validate(content_type, byte_size)
    }

    /// Derive a fresh owner-scoped key for an upload.
    pub fn allocate_path(owner_id: &str, category: MediaCategory, name: &str) -> String {
        path::allocate(owner_id, category, name)
    }

    fn check_path(&self, owner_id: &str, object_path: &str) -> Result<(), VaultError> {
        if path::is_owned_by(object_path, owner_id) {
            Ok(())
        } else {
            Err(VaultError::Forbidden(object_path.to_string()))
        }
    }

    fn check_prefix(&self, owner_id: &str, prefix: &str) -> Result<(), VaultError> {
        if path::prefix_owned_by(prefix, owner_id) {
            Ok(())
        } else {
            Err(VaultError::Forbidden(prefix.to_string()))
        }
    }

    /// Upload a single object to a freshly allocated path.
    pub async fn upload(
        &self,
        owner_id: &str,
        original_name: &str,
        content_type: &str,
        content: Bytes,
    ) -> Result<StoredObject, VaultError> {
        let category = validate::validate(content_type, content.len() as u64).map_err(|source| {
            VaultError::Validation {
                path: original_name.to_string(),
                source,
            }
        })?;
        let object_path = path::allocate(owner_id, category, original_name);

        let item = UploadItem {
            path: object_path,
            content,
            options: PutOptions {
                content_type: Some(content_type.to_string()),
                ..Default::default()
            },
        };
        let outcome = self.coordinator.upload_batch(&self.bucket, vec![item]).await?;
        expect_commit(outcome)?.into_iter().next().ok_or_else(|| {
            VaultError::Store(StoreError::Backend(
                "store returned no object for a committed upload".to_string(),
            ))
        })
    }

    /// All-or-nothing upload of a caller-assembled batch. Every path must
    /// already fall under the caller's prefix.
    pub async fn upload_batch(
        &self,
        owner_id: &str,
        items: Vec<UploadItem>,
    ) -> Result<Vec<StoredObject>, VaultError> {
        for item in &items {
            self.check_path(owner_id, &item.path)?;
        }
        let outcome = self.coordinator.upload_batch(&self.bucket, items).await?;
        expect_commit(outcome)
    }

    /// Delete a single object. A path the store did not remove is reported
    /// as not found.
    pub async fn delete(&self, owner_id: &str, object_path: &str) -> Result<(), VaultError> {
        self.check_path(owner_id, object_path)?;
        let outcome = self
            .coordinator
            .delete_batch(&self.bucket, vec![object_path.to_string()])
            .await?;
        match outcome {
            TxnOutcome::Committed(_) => Ok(()),
            TxnOutcome::PartiallyFailed { .. } => {
                Err(VaultError::Store(StoreError::NotFound(object_path.to_string())))
            }
            TxnOutcome::Aborted {
                cause,
                compensation_complete,
            } => Err(VaultError::Aborted {
                cause,
                compensation_complete,
            }),
        }
    }

    /// Batch delete with partial-failure reporting. Never aborts: callers
    /// get the exact split of removed vs still-existing paths.
    pub async fn delete_batch(
        &self,
        owner_id: &str,
        paths: Vec<String>,
    ) -> Result<DeleteReport, VaultError> {
        for p in &paths {
            self.check_path(owner_id, p)?;
        }
        let outcome = self.coordinator.delete_batch(&self.bucket, paths.clone()).await?;
        match outcome {
            TxnOutcome::Committed(_) => Ok(DeleteReport {
                succeeded: paths,
                failed: Vec::new(),
            }),
            TxnOutcome::PartiallyFailed { succeeded, failed } => {
                Err(VaultError::PartialFailure { succeeded, failed })
            }
            TxnOutcome::Aborted {
                cause,
                compensation_complete,
            } => Err(VaultError::Aborted {
                cause,
                compensation_complete,
            }),
        }
    }

    /// Move a whole folder; all objects end up at the destination or all
    /// stay at the source.
    pub async fn move_folder(
        &self,
        owner_id: &str,
        from_prefix: &str,
        to_prefix: &str,
    ) -> Result<Vec<StoredObject>, VaultError> {
        self.check_prefix(owner_id, from_prefix)?;
        self.check_prefix(owner_id, to_prefix)?;
        let outcome = self
            .coordinator
            .move_folder(&self.bucket, from_prefix, to_prefix)
            .await?;
        expect_commit(outcome)
    }

    /// Copy a whole folder; on failure the destination copies are removed.
    pub async fn copy_folder(
        &self,
        owner_id: &str,
        from_prefix: &str,
        to_prefix: &str,
    ) -> Result<Vec<StoredObject>, VaultError> {
        self.check_prefix(owner_id, from_prefix)?;
        self.check_prefix(owner_id, to_prefix)?;
        let outcome = self
            .coordinator
            .copy_folder(&self.bucket, from_prefix, to_prefix)
            .await?;
        expect_commit(outcome)
    }

    /// Replace the content at an existing path, restoring the previous
    /// content if the overwrite fails.
    pub async fn replace(
        &self,
        owner_id: &str,
        object_path: &str,
        content_type: &str,
        content: Bytes,
    ) -> Result<StoredObject, VaultError> {
        self.check_path(owner_id, object_path)?;
        validate::validate(content_type, content.len() as u64).map_err(|source| {
            VaultError::Validation {
                path: object_path.to_string(),
                source,
            }
        })?;

        let options = PutOptions {
            content_type: Some(content_type.to_string()),
            ..Default::default()
        };
        let outcome = self
            .coordinator
            .replace(&self.bucket, object_path, content, options)
            .await?;
        expect_commit(outcome)?.into_iter().next().ok_or_else(|| {
            VaultError::Store(StoreError::Backend(
                "store returned no object for a committed replace".to_string(),
            ))
        })
    }

    // Read-side passthroughs. Same owner check, no transaction.

    pub async fn list(
        &self,
        owner_id: &str,
        prefix: &str,
        opts: ListOptions,
    ) -> Result<Vec<StoredObject>, VaultError> {
        self.check_prefix(owner_id, prefix)?;
        // Listings match on segment boundaries, so a bare owner id never
        // picks up another owner that shares it as a prefix.
        let prefix = path::normalize_prefix(prefix);
        Ok(self.store.list(&self.bucket, &prefix, opts).await?)
    }

    pub async fn download(&self, owner_id: &str, object_path: &str) -> Result<Bytes, VaultError> {
        self.check_path(owner_id, object_path)?;
        Ok(self.store.get(&self.bucket, object_path).await?)
    }

    pub fn public_url(&self, owner_id: &str, object_path: &str) -> Result<String, VaultError> {
        self.check_path(owner_id, object_path)?;
        Ok(self.store.public_url(&self.bucket, object_path))
    }

    pub async fn signed_url(
        &self,
        owner_id: &str,
        object_path: &str,
        ttl_secs: u64,
    ) -> Result<String, VaultError> {
        self.check_path(owner_id, object_path)?;
        Ok(self.store.signed_url(&self.bucket, object_path, ttl_secs).await?)
    }

    // Bucket admin passthroughs, exposed only on the admin routes.

    pub async fn create_bucket(&self, name: &str, public: bool) -> Result<(), VaultError> {
        Ok(self.store.create_bucket(name, public).await?)
    }

    pub async fn delete_bucket(&self, name: &str) -> Result<(), VaultError> {
        Ok(self.store.delete_bucket(name).await?)
    }

    pub async fn empty_bucket(&self, name: &str) -> Result<(), VaultError> {
        Ok(self.store.empty_bucket(name).await?)
    }

    pub async fn list_buckets(&self) -> Result<Vec<Bucket>, VaultError> {
        Ok(self.store.list_buckets().await?)
    }
}

fn expect_commit(outcome: TxnOutcome) -> Result<Vec<StoredObject>, VaultError> {
    match outcome {
        TxnOutcome::Committed(objects) => Ok(objects),
        TxnOutcome::PartiallyFailed { succeeded, failed } => {
            Err(VaultError::PartialFailure { succeeded, failed })
        }
        TxnOutcome::Aborted {
            cause,
            compensation_complete,
        } => Err(VaultError::Aborted {
            cause,
            compensation_complete,
        }),
    }
}
