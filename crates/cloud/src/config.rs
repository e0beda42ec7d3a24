//! Object storage configuration loaded from environment variables.

/// Longest lifetime S3 accepts for a presigned URL (7 days).
pub const MAX_PRESIGN_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, R2). Enables path-style addressing.
    pub endpoint: Option<String>,
    /// When set, artifact URLs are `<base>/<key>` instead of presigned.
    pub public_base_url: Option<String>,
    pub presign_secs: u64,
    /// Static credentials; when absent the default AWS provider chain is used.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl StorageConfig {
    /// Load storage configuration from environment variables.
    ///
    /// | Env var                | Default         |
    /// |------------------------|-----------------|
    /// | `S3_BUCKET`            | `reverie-media` |
    /// | `S3_REGION`            | `us-east-1`     |
    /// | `S3_ENDPOINT`          | (none)          |
    /// | `S3_PUBLIC_BASE_URL`   | (none)          |
    /// | `S3_PRESIGN_SECS`      | `604800`        |
    /// | `S3_ACCESS_KEY_ID`     | (none)          |
    /// | `S3_SECRET_ACCESS_KEY` | (none)          |
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            bucket: non_empty("S3_BUCKET").unwrap_or_else(|| "reverie-media".into()),
            region: non_empty("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
            endpoint: non_empty("S3_ENDPOINT"),
            public_base_url: non_empty("S3_PUBLIC_BASE_URL"),
            presign_secs: non_empty("S3_PRESIGN_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_PRESIGN_SECS)
                .min(MAX_PRESIGN_SECS),
            access_key_id: non_empty("S3_ACCESS_KEY_ID"),
            secret_access_key: non_empty("S3_SECRET_ACCESS_KEY"),
        }
    }
}
