use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Remote,
    Local,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Bucket every media operation targets. Must pre-exist on the remote
    /// backend.
    pub bucket: String,
    /// Base URL of the remote storage API (required when backend is remote)
    pub remote_base_url: Option<String>,
    /// Service-role key for the remote storage API
    pub remote_service_key: Option<String>,
    /// Directory for the local storage backend
    pub local_storage_path: String,
    /// Secret for local signed-link tokens
    pub signing_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub storage: StorageConfig,
    /// Deadline applied to every store sub-call, in milliseconds
    pub subcall_timeout_ms: u64,
    /// Enables the bucket admin routes. Must never be true in production.
    pub admin_mode: bool,
    /// Hard cap on a single request body, in bytes
    pub max_upload_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            bucket: "media".to_string(),
            remote_base_url: None,
            remote_service_key: None,
            local_storage_path: "./media".to_string(),
            signing_secret: "dev-signing-secret".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "remote" => StorageBackend::Remote,
            _ => StorageBackend::Local,
        };

        let bucket = std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| "media".to_string());
        let remote_base_url = std::env::var("STORAGE_API_URL").ok();
        let remote_service_key = std::env::var("STORAGE_SERVICE_KEY").ok();
        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./media".to_string());
        let signing_secret = std::env::var("SIGNING_SECRET")
            .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());

        let subcall_timeout_ms = std::env::var("SUBCALL_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30_000);

        let admin_mode = std::env::var("ADMIN_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(110 * 1024 * 1024); // headroom above the video ceiling

        let config = Config {
            bind_address,
            storage: StorageConfig {
                backend,
                bucket,
                remote_base_url,
                remote_service_key,
                local_storage_path,
                signing_secret,
            },
            subcall_timeout_ms,
            admin_mode,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.bucket.is_empty() {
            return Err(ConfigError::ValidationError(
                "STORAGE_BUCKET cannot be empty".to_string(),
            ));
        }

        if matches!(self.storage.backend, StorageBackend::Remote) {
            if self.storage.remote_base_url.is_none() {
                return Err(ConfigError::ValidationError(
                    "STORAGE_API_URL is required when STORAGE_BACKEND=remote".to_string(),
                ));
            }
            if self.storage.remote_service_key.is_none() {
                return Err(ConfigError::ValidationError(
                    "STORAGE_SERVICE_KEY is required when STORAGE_BACKEND=remote".to_string(),
                ));
            }
        }

        if self.subcall_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "SUBCALL_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
