use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use ring::hmac;
use std::path::{Path, PathBuf};

use super::{Bucket, ListOptions, ObjectStore, PutOptions, StoreError, StoredObject};

/// Local filesystem object store for development and testing. A bucket is
/// a subdirectory under the base path; an object is a regular file.
pub struct LocalStore {
    base_path: PathBuf,
    signing_key: hmac::Key,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P, signing_secret: &str) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        let signing_key = hmac::Key::new(hmac::HMAC_SHA256, signing_secret.as_bytes());
        Ok(Self {
            base_path,
            signing_key,
        })
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.base_path.join(bucket).join(key)
    }

    fn stat_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError> {
        let fs_path = self.object_path(bucket, key);
        let meta = std::fs::metadata(&fs_path)
            .map_err(|_| StoreError::NotFound(key.to_string()))?;
        let modified: DateTime<Utc> = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let name = key.rsplit('/').next().unwrap_or(key).to_string();
        let content_type = mime_guess::from_path(key)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Ok(StoredObject {
            id: key.to_string(),
            name,
            path: key.to_string(),
            bucket: bucket.to_string(),
            byte_size: meta.len(),
            content_type,
            created_at: modified,
            updated_at: modified,
        })
    }

    /// Recursively collect object keys under a bucket directory.
    fn collect_keys(dir: &Path, root: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                Self::collect_keys(&path, root, out)?;
            } else if let Ok(rel) = path.strip_prefix(root) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        opts: PutOptions,
    ) -> Result<StoredObject, StoreError> {
        let fs_path = self.object_path(bucket, path);
        if !opts.overwrite && fs_path.exists() {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        if let Some(parent) = fs_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&fs_path, &data).await?;

        let mut object = self.stat_object(bucket, path)?;
        if let Some(ct) = opts.content_type {
            object.content_type = ct;
        }
        Ok(object)
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Bytes, StoreError> {
        let fs_path = self.object_path(bucket, path);
        if !fs_path.exists() {
            return Err(StoreError::NotFound(path.to_string()));
        }
        let data = tokio::fs::read(&fs_path).await?;
        Ok(Bytes::from(data))
    }

    async fn delete_many(&self, bucket: &str, paths: &[String]) -> Result<Vec<String>, StoreError> {
        let mut removed = Vec::new();
        for path in paths {
            let fs_path = self.object_path(bucket, path);
            if fs_path.exists() {
                tokio::fs::remove_file(&fs_path).await?;
                removed.push(path.clone());
            }
        }
        Ok(removed)
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("/storage/public/{bucket}/{path}")
    }

    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl_secs: u64,
    ) -> Result<String, StoreError> {
        let fs_path = self.object_path(bucket, path);
        if !fs_path.exists() {
            return Err(StoreError::NotFound(path.to_string()));
        }

        let expires_at = Utc::now().timestamp() + ttl_secs as i64;
        let payload = format!("{bucket}/{path}:{expires_at}");
        let tag = hmac::sign(&self.signing_key, payload.as_bytes());
        let sig = base64_url_encode(tag.as_ref());

        Ok(format!(
            "/storage/sign/{bucket}/{path}?expires={expires_at}&token={sig}"
        ))
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        opts: ListOptions,
    ) -> Result<Vec<StoredObject>, StoreError> {
        let root = self.base_path.join(bucket);
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        Self::collect_keys(&root, &root, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();

        let offset = opts.offset.unwrap_or(0) as usize;
        let limit = opts.limit.map(|l| l as usize).unwrap_or(usize::MAX);

        keys.into_iter()
            .skip(offset)
            .take(limit)
            .map(|k| self.stat_object(bucket, &k))
            .collect()
    }

    async fn rename(&self, bucket: &str, from: &str, to: &str) -> Result<(), StoreError> {
        let src = self.object_path(bucket, from);
        if !src.exists() {
            return Err(StoreError::NotFound(from.to_string()));
        }
        let dst = self.object_path(bucket, to);
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&src, &dst).await?;
        Ok(())
    }

    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<(), StoreError> {
        let src = self.object_path(bucket, from);
        if !src.exists() {
            return Err(StoreError::NotFound(from.to_string()));
        }
        let dst = self.object_path(bucket, to);
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&src, &dst).await?;
        Ok(())
    }

    async fn create_bucket(&self, name: &str, _public: bool) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(self.base_path.join(name)).await?;
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> Result<(), StoreError> {
        let dir = self.base_path.join(name);
        if !dir.exists() {
            return Ok(());
        }
        let mut keys = Vec::new();
        Self::collect_keys(&dir, &dir, &mut keys)?;
        if !keys.is_empty() {
            return Err(StoreError::Backend(format!(
                "bucket '{name}' is not empty ({} objects)",
                keys.len()
            )));
        }
        tokio::fs::remove_dir_all(&dir).await?;
        Ok(())
    }

    async fn empty_bucket(&self, name: &str) -> Result<(), StoreError> {
        let dir = self.base_path.join(name);
        if dir.exists() {
            tokio::fs::remove_dir_all(&dir).await?;
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<Bucket>, StoreError> {
        let mut buckets = Vec::new();
        for entry in std::fs::read_dir(&self.base_path)? {
            let entry = entry?;
            if entry.path().is_dir() {
                buckets.push(Bucket {
                    name: entry.file_name().to_string_lossy().to_string(),
                    public: false,
                    file_size_limit: None,
                    allowed_content_types: None,
                });
            }
        }
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}
