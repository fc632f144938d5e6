use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{Bucket, ListOptions, ObjectStore, PutOptions, StoreError, StoredObject};

/// Hosted storage-platform backend. Talks to the platform's REST API with a
/// service-role key; all calls are per-object, consistency across objects is
/// the coordinator's problem.
pub struct RemoteStore {
    base_url: String,
    service_key: String,
    client: Client,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default, rename = "Id")]
    id: Option<String>,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

#[derive(Deserialize)]
struct RemoteObject {
    name: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: Option<RemoteObjectMeta>,
}

#[derive(Deserialize, Default)]
struct RemoteObjectMeta {
    #[serde(default)]
    size: u64,
    #[serde(default)]
    mimetype: Option<String>,
}

#[derive(Deserialize)]
struct RemoteBucket {
    name: String,
    public: bool,
    #[serde(default)]
    file_size_limit: Option<u64>,
    #[serde(default)]
    allowed_mime_types: Option<Vec<String>>,
}

impl RemoteStore {
    pub fn new(base_url: &str, service_key: &str) -> Result<Self, anyhow::Error> {
        let client = Client::builder().build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            client,
        })
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/{bucket}/{path}", self.base_url)
    }

    fn sign_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/sign/{bucket}/{path}", self.base_url)
    }

    fn list_url(&self, bucket: &str) -> String {
        format!("{}/object/list/{bucket}", self.base_url)
    }

    fn bucket_url(&self) -> String {
        format!("{}/bucket", self.base_url)
    }

    async fn check(
        op: &str,
        key: &str,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, StoreError> {
        match resp.status() {
            s if s.is_success() => Ok(resp),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(key.to_string())),
            StatusCode::CONFLICT => Err(StoreError::AlreadyExists(key.to_string())),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(StoreError::Backend(format!("{op} failed ({status}): {body}")))
            }
        }
    }

    fn send_err(e: reqwest::Error) -> StoreError {
        StoreError::Backend(e.to_string())
    }

    async fn list_page(
        &self,
        bucket: &str,
        folder: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<RemoteObject>, StoreError> {
        let body = serde_json::json!({
            "prefix": folder,
            "limit": limit,
            "offset": offset,
            "sortBy": { "column": "name", "order": "asc" },
        });
        let resp = self
            .client
            .post(self.list_url(bucket))
            .bearer_auth(&self.service_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::send_err)?;
        let resp = Self::check("list", folder, resp).await?;
        resp.json().await.map_err(Self::send_err)
    }

    fn object_from_entry(&self, bucket: &str, prefix: &str, entry: RemoteObject) -> StoredObject {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{}/{}", prefix.trim_end_matches('/'), entry.name)
        };
        let meta = entry.metadata.unwrap_or_default();
        StoredObject {
            id: entry.id.unwrap_or_else(|| path.clone()),
            name: entry.name,
            path,
            bucket: bucket.to_string(),
            byte_size: meta.size,
            content_type: meta
                .mimetype
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            created_at: entry.created_at.unwrap_or_else(Utc::now),
            updated_at: entry.updated_at.unwrap_or_else(Utc::now),
        }
    }
}

#[async_trait]
impl ObjectStore for RemoteStore {
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        opts: PutOptions,
    ) -> Result<StoredObject, StoreError> {
        let byte_size = data.len() as u64;
        let content_type = opts
            .content_type
            .clone()
            .or_else(|| {
                mime_guess::from_path(path)
                    .first()
                    .map(|m| m.to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut req = self
            .client
            .post(self.object_url(bucket, path))
            .bearer_auth(&self.service_key)
            .header("Content-Type", &content_type)
            .header("x-upsert", if opts.overwrite { "true" } else { "false" });
        if let Some(ref cache) = opts.cache_control {
            req = req.header("Cache-Control", cache.clone());
        }

        let resp = req.body(data).send().await.map_err(Self::send_err)?;
        let resp = Self::check("upload", path, resp).await?;
        let parsed: UploadResponse = resp.json().await.map_err(Self::send_err)?;

        let now = Utc::now();
        Ok(StoredObject {
            id: parsed.id.unwrap_or_else(|| path.to_string()),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            bucket: bucket.to_string(),
            byte_size,
            content_type,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Bytes, StoreError> {
        let resp = self
            .client
            .get(self.object_url(bucket, path))
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(Self::send_err)?;
        let resp = Self::check("download", path, resp).await?;
        resp.bytes().await.map_err(Self::send_err)
    }

    async fn delete_many(&self, bucket: &str, paths: &[String]) -> Result<Vec<String>, StoreError> {
        let resp = self
            .client
            .delete(format!("{}/object/{bucket}", self.base_url))
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({ "prefixes": paths }))
            .send()
            .await
            .map_err(Self::send_err)?;
        let resp = Self::check("bulk delete", bucket, resp).await?;

        // The API echoes back the objects it actually removed.
        let removed: Vec<RemoteObject> = resp.json().await.map_err(Self::send_err)?;
        Ok(removed.into_iter().map(|o| o.name).collect())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/public/{bucket}/{path}", self.base_url)
    }

    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl_secs: u64,
    ) -> Result<String, StoreError> {
        let resp = self
            .client
            .post(self.sign_url(bucket, path))
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({ "expiresIn": ttl_secs }))
            .send()
            .await
            .map_err(Self::send_err)?;
        let resp = Self::check("sign", path, resp).await?;
        let parsed: SignResponse = resp.json().await.map_err(Self::send_err)?;
        Ok(format!("{}{}", self.base_url, parsed.signed_url))
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        opts: ListOptions,
    ) -> Result<Vec<StoredObject>, StoreError> {
        // The API lists one folder level at a time, capped per request.
        // Walk every folder to exhaustion so callers see the same recursive
        // view the local backend gives them.
        const PAGE_SIZE: u32 = 1000;

        let mut objects = Vec::new();
        let mut folders = vec![prefix.trim_end_matches('/').to_string()];
        while let Some(folder) = folders.pop() {
            let mut page_offset = 0;
            loop {
                let entries = self
                    .list_page(bucket, &folder, PAGE_SIZE, page_offset)
                    .await?;
                let page_len = entries.len();
                for entry in entries {
                    if entry.id.is_some() {
                        objects.push(self.object_from_entry(bucket, &folder, entry));
                    } else {
                        // Folders come back without ids.
                        folders.push(if folder.is_empty() {
                            entry.name
                        } else {
                            format!("{folder}/{}", entry.name)
                        });
                    }
                }
                if page_len < PAGE_SIZE as usize {
                    break;
                }
                page_offset += PAGE_SIZE;
            }
        }

        objects.sort_by(|a, b| a.path.cmp(&b.path));
        let skip = opts.offset.unwrap_or(0) as usize;
        let take = opts.limit.map_or(usize::MAX, |l| l as usize);
        Ok(objects.into_iter().skip(skip).take(take).collect())
    }

    async fn rename(&self, bucket: &str, from: &str, to: &str) -> Result<(), StoreError> {
        let resp = self
            .client
            .post(format!("{}/object/move", self.base_url))
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({
                "bucketId": bucket,
                "sourceKey": from,
                "destinationKey": to,
            }))
            .send()
            .await
            .map_err(Self::send_err)?;
        Self::check("move", from, resp).await?;
        Ok(())
    }

    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<(), StoreError> {
        let resp = self
            .client
            .post(format!("{}/object/copy", self.base_url))
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({
                "bucketId": bucket,
                "sourceKey": from,
                "destinationKey": to,
            }))
            .send()
            .await
            .map_err(Self::send_err)?;
        Self::check("copy", from, resp).await?;
        Ok(())
    }

    async fn create_bucket(&self, name: &str, public: bool) -> Result<(), StoreError> {
        let resp = self
            .client
            .post(self.bucket_url())
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({ "name": name, "public": public }))
            .send()
            .await
            .map_err(Self::send_err)?;
        Self::check("create bucket", name, resp).await?;
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> Result<(), StoreError> {
        let resp = self
            .client
            .delete(format!("{}/bucket/{name}", self.base_url))
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(Self::send_err)?;
        Self::check("delete bucket", name, resp).await?;
        Ok(())
    }

    async fn empty_bucket(&self, name: &str) -> Result<(), StoreError> {
        let resp = self
            .client
            .post(format!("{}/bucket/{name}/empty", self.base_url))
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(Self::send_err)?;
        Self::check("empty bucket", name, resp).await?;
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<Bucket>, StoreError> {
        let resp = self
            .client
            .get(self.bucket_url())
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(Self::send_err)?;
        let resp = Self::check("list buckets", "", resp).await?;
        let buckets: Vec<RemoteBucket> = resp.json().await.map_err(Self::send_err)?;
        Ok(buckets
            .into_iter()
            .map(|b| Bucket {
                name: b.name,
                public: b.public,
                file_size_limit: b.file_size_limit,
                allowed_content_types: b.allowed_mime_types,
            })
            .collect())
    }
}
