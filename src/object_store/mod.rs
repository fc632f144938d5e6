mod local;
mod remote;

pub use local::LocalStore;
pub use remote::RemoteStore;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Object already exists: {0}")]
    AlreadyExists(String),
    #[error("Call timed out: {0}")]
    Timeout(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A single object as the store reports it. Identity is (bucket, path);
/// a path never changes except through an explicit rename or replace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    pub id: String,
    pub name: String,
    pub path: String,
    pub bucket: String,
    pub byte_size: u64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Bucket metadata. Buckets are created out-of-band (or via the admin
/// routes); the transactional layer assumes they pre-exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub public: bool,
    #[serde(default)]
    pub file_size_limit: Option<u64>,
    #[serde(default)]
    pub allowed_content_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub overwrite: bool,
    pub cache_control: Option<String>,
    pub content_type: Option<String>,
}

impl PutOptions {
    pub fn overwriting() -> Self {
        Self {
            overwrite: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Abstraction over blob storage backends. Every call is scoped to a
/// bucket + path and carries per-object guarantees only; anything
/// cross-object is the coordinator's job.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        opts: PutOptions,
    ) -> Result<StoredObject, StoreError>;

    async fn get(&self, bucket: &str, path: &str) -> Result<Bytes, StoreError>;

    /// Delete a set of paths. Returns the subset that was actually removed;
    /// paths that did not exist are simply absent from the result.
    async fn delete_many(&self, bucket: &str, paths: &[String]) -> Result<Vec<String>, StoreError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl_secs: u64,
    ) -> Result<String, StoreError>;

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        opts: ListOptions,
    ) -> Result<Vec<StoredObject>, StoreError>;

    async fn rename(&self, bucket: &str, from: &str, to: &str) -> Result<(), StoreError>;

    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<(), StoreError>;

    // Bucket admin -- exposed for operator tooling, never called by the
    // transaction coordinator.
    async fn create_bucket(&self, name: &str, public: bool) -> Result<(), StoreError>;

    async fn delete_bucket(&self, name: &str) -> Result<(), StoreError>;

    async fn empty_bucket(&self, name: &str) -> Result<(), StoreError>;

    async fn list_buckets(&self) -> Result<Vec<Bucket>, StoreError>;
}
