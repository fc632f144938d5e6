//! Transaction coordinator: composes per-object store calls into compound
//! operations with explicit commit/compensate semantics. The store itself
//! only guarantees per-object consistency; everything all-or-nothing lives
//! here.
//!
//! Every operation resolves to exactly one [`TxnOutcome`] per invocation:
//! `Committed`, `PartiallyFailed` (batch delete only), or `Aborted` after
//! rolling back. An `Err` return means nothing was mutated. Compensation is
//! best-effort: a failed rollback is logged and reported through
//! `compensation_complete`, never swallowed, but there is no persisted undo
//! log and no retry.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use crate::object_store::{ListOptions, ObjectStore, PutOptions, StoreError, StoredObject};
use crate::path::normalize_prefix;
use crate::validate::{self, ValidationError};

/// One item of a batch upload.
pub struct UploadItem {
    pub path: String,
    pub content: Bytes,
    pub options: PutOptions,
}

/// Terminal state of a compound operation.
#[derive(Debug)]
pub enum TxnOutcome {
    /// Every sub-call succeeded; carries the resulting objects (empty for
    /// deletes and trivially-empty folder operations).
    Committed(Vec<StoredObject>),
    /// Batch delete removed some paths but not others. The two sets
    /// partition the request exactly.
    PartiallyFailed {
        succeeded: Vec<String>,
        failed: Vec<String>,
    },
    /// A sub-call failed and the already-applied sub-calls were rolled
    /// back. `compensation_complete` is false when the rollback itself did
    /// not fully succeed.
    Aborted {
        cause: StoreError,
        compensation_complete: bool,
    },
}

#[derive(Debug, Error)]
pub enum TxnError {
    #[error("validation failed for '{path}': {source}")]
    Validation {
        path: String,
        #[source]
        source: ValidationError,
    },
    /// A pre-flight call failed before any mutation was issued.
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Coordinator {
    store: Arc<dyn ObjectStore>,
    /// Per-sub-call deadline; expiry is an ordinary sub-call failure and
    /// feeds the same compensation path as any other error.
    deadline: Duration,
}

impl Coordinator {
    pub fn new(store: Arc<dyn ObjectStore>, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    async fn with_deadline<T, F>(&self, label: &str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(label.to_string())),
        }
    }

    /// Atomic batch upload. Validates every item before any network call;
    /// then issues all puts concurrently. On any failure, deletes the puts
    /// that did succeed so callers never observe a partial set.
    pub async fn upload_batch(
        &self,
        bucket: &str,
        items: Vec<UploadItem>,
    ) -> Result<TxnOutcome, TxnError> {
        // Fail fast: any invalid item rejects the whole batch with zero
        // store calls.
        for item in &items {
            let content_type = effective_content_type(&item.path, &item.options);
            validate::validate(&content_type, item.content.len() as u64).map_err(|source| {
                TxnError::Validation {
                    path: item.path.clone(),
                    source,
                }
            })?;
        }

        let puts = items.iter().map(|item| {
            self.with_deadline(
                &item.path,
                self.store
                    .put(bucket, &item.path, item.content.clone(), item.options.clone()),
            )
        });
        let results = join_all(puts).await;

        let mut objects = Vec::with_capacity(items.len());
        let mut succeeded = Vec::new();
        let mut cause = None;
        for (item, result) in items.iter().zip(results) {
            match result {
                Ok(object) => {
                    succeeded.push(item.path.clone());
                    objects.push(object);
                }
                Err(e) => {
                    if cause.is_none() {
                        cause = Some(e);
                    }
                }
            }
        }

        match cause {
            None => {
                debug!(bucket, count = objects.len(), "batch upload committed");
                Ok(TxnOutcome::Committed(objects))
            }
            Some(cause) => {
                let compensation_complete = self.undo_puts(bucket, &succeeded).await;
                Ok(TxnOutcome::Aborted {
                    cause,
                    compensation_complete,
                })
            }
        }
    }

    /// Batch delete. Nothing to roll back to, so failures are reported
    /// rather than compensated: the result partitions the request into the
    /// paths the store removed and the paths that still exist.
    pub async fn delete_batch(
        &self,
        bucket: &str,
        paths: Vec<String>,
    ) -> Result<TxnOutcome, TxnError> {
        if paths.is_empty() {
            return Ok(TxnOutcome::Committed(Vec::new()));
        }

        let removed = self
            .with_deadline("bulk delete", self.store.delete_many(bucket, &paths))
            .await?;
        let removed_set: HashSet<&str> = removed.iter().map(String::as_str).collect();

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for path in paths {
            if removed_set.contains(path.as_str()) {
                succeeded.push(path);
            } else {
                failed.push(path);
            }
        }

        if failed.is_empty() {
            debug!(bucket, count = succeeded.len(), "batch delete committed");
            Ok(TxnOutcome::Committed(Vec::new()))
        } else {
            Ok(TxnOutcome::PartiallyFailed { succeeded, failed })
        }
    }

    /// Move every object under `from_prefix` to `to_prefix`. On any failed
    /// move, the already-moved objects are moved back so the folder is
    /// never left split across the two prefixes.
    pub async fn move_folder(
        &self,
        bucket: &str,
        from_prefix: &str,
        to_prefix: &str,
    ) -> Result<TxnOutcome, TxnError> {
        let from = normalize_prefix(from_prefix);
        let to = normalize_prefix(to_prefix);

        let objects = self
            .with_deadline(&from, self.store.list(bucket, &from, ListOptions::default()))
            .await?;
        if objects.is_empty() {
            return Ok(TxnOutcome::Committed(Vec::new()));
        }

        let pairs: Vec<(String, String)> = objects
            .iter()
            .map(|o| {
                let dest = format!("{to}{}", &o.path[from.len()..]);
                (o.path.clone(), dest)
            })
            .collect();

        let moves = pairs
            .iter()
            .map(|(src, dst)| self.with_deadline(src, self.store.rename(bucket, src, dst)));
        let results = join_all(moves).await;

        let mut moved = Vec::new();
        let mut cause = None;
        for (pair, result) in pairs.iter().zip(results) {
            match result {
                Ok(()) => moved.push(pair),
                Err(e) => {
                    if cause.is_none() {
                        cause = Some(e);
                    }
                }
            }
        }

        match cause {
            None => {
                debug!(bucket, %from, %to, count = pairs.len(), "folder move committed");
                let committed = objects
                    .into_iter()
                    .zip(&pairs)
                    .map(|(mut o, (_, dst))| {
                        o.path = dst.clone();
                        o
                    })
                    .collect();
                Ok(TxnOutcome::Committed(committed))
            }
            Some(cause) => {
                let compensation_complete = self.undo_moves(bucket, &moved).await;
                Ok(TxnOutcome::Aborted {
                    cause,
                    compensation_complete,
                })
            }
        }
    }

    /// Copy every object under `from_prefix` to `to_prefix`. The source is
    /// never touched, so compensation on failure is deletion of the copies
    /// already made at the destination.
    pub async fn copy_folder(
        &self,
        bucket: &str,
        from_prefix: &str,
        to_prefix: &str,
    ) -> Result<TxnOutcome, TxnError> {
        let from = normalize_prefix(from_prefix);
        let to = normalize_prefix(to_prefix);

        let objects = self
            .with_deadline(&from, self.store.list(bucket, &from, ListOptions::default()))
            .await?;
        if objects.is_empty() {
            return Ok(TxnOutcome::Committed(Vec::new()));
        }

        let pairs: Vec<(String, String)> = objects
            .iter()
            .map(|o| {
                let dest = format!("{to}{}", &o.path[from.len()..]);
                (o.path.clone(), dest)
            })
            .collect();

        let copies = pairs
            .iter()
            .map(|(src, dst)| self.with_deadline(src, self.store.copy(bucket, src, dst)));
        let results = join_all(copies).await;

        let mut copied = Vec::new();
        let mut cause = None;
        for (pair, result) in pairs.iter().zip(results) {
            match result {
                Ok(()) => copied.push(pair.1.clone()),
                Err(e) => {
                    if cause.is_none() {
                        cause = Some(e);
                    }
                }
            }
        }

        match cause {
            None => {
                debug!(bucket, %from, %to, count = pairs.len(), "folder copy committed");
                let committed = objects
                    .into_iter()
                    .zip(&pairs)
                    .map(|(mut o, (_, dst))| {
                        o.path = dst.clone();
                        o
                    })
                    .collect();
                Ok(TxnOutcome::Committed(committed))
            }
            Some(cause) => {
                let compensation_complete = self.undo_puts(bucket, &copied).await;
                Ok(TxnOutcome::Aborted {
                    cause,
                    compensation_complete,
                })
            }
        }
    }

    /// Replace the object at `path`, restoring the previous content if the
    /// overwrite fails. If the path had no object, there is nothing to
    /// restore and a failed put aborts with nothing to compensate.
    pub async fn replace(
        &self,
        bucket: &str,
        path: &str,
        content: Bytes,
        options: PutOptions,
    ) -> Result<TxnOutcome, TxnError> {
        let backup = match self.with_deadline(path, self.store.get(bucket, path)).await {
            Ok(data) => Some(data),
            Err(StoreError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let mut options = options;
        options.overwrite = true;

        match self
            .with_deadline(path, self.store.put(bucket, path, content, options))
            .await
        {
            Ok(object) => {
                debug!(bucket, path, "replace committed");
                Ok(TxnOutcome::Committed(vec![object]))
            }
            Err(cause) => {
                let compensation_complete = match backup {
                    None => true,
                    Some(previous) => {
                        // The restore must not carry the replacement's
                        // metadata; the backend re-derives the content type
                        // from the unchanged path.
                        let restore = self
                            .with_deadline(
                                path,
                                self.store
                                    .put(bucket, path, previous, PutOptions::overwriting()),
                            )
                            .await;
                        match restore {
                            Ok(_) => true,
                            Err(e) => {
                                warn!(bucket, path, error = %e, "failed to restore backup after aborted replace");
                                false
                            }
                        }
                    }
                };
                Ok(TxnOutcome::Aborted {
                    cause,
                    compensation_complete,
                })
            }
        }
    }

    /// Compensate successful puts (or copies) with a bulk delete. Returns
    /// whether every path was confirmed removed.
    async fn undo_puts(&self, bucket: &str, paths: &[String]) -> bool {
        if paths.is_empty() {
            return true;
        }
        match self
            .with_deadline("compensating delete", self.store.delete_many(bucket, paths))
            .await
        {
            Ok(removed) if removed.len() == paths.len() => true,
            Ok(removed) => {
                warn!(
                    bucket,
                    expected = paths.len(),
                    removed = removed.len(),
                    "compensating delete removed fewer objects than expected"
                );
                false
            }
            Err(e) => {
                warn!(bucket, error = %e, "compensating delete failed");
                false
            }
        }
    }

    /// Compensate successful renames by moving each object back. Reverts
    /// run concurrently, strictly after the failure was detected.
    async fn undo_moves(&self, bucket: &str, moved: &[&(String, String)]) -> bool {
        if moved.is_empty() {
            return true;
        }
        let reverts = moved
            .iter()
            .map(|(src, dst)| self.with_deadline(dst, self.store.rename(bucket, dst, src)));
        let results = join_all(reverts).await;

        let mut complete = true;
        for ((src, dst), result) in moved.iter().zip(results) {
            if let Err(e) = result {
                warn!(bucket, from = %dst, to = %src, error = %e, "failed to move object back after aborted folder move");
                complete = false;
            }
        }
        complete
    }
}

/// Content type for validation: explicit option first, then a guess from
/// the path's extension.
fn effective_content_type(path: &str, options: &PutOptions) -> String {
    options
        .content_type
        .clone()
        .or_else(|| mime_guess::from_path(path).first().map(|m| m.to_string()))
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
