use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StorageConfig {
    Local {
        path: PathBuf,
    },
    /// Process-local store, lost on restart
    Memory,
    S3 {
        bucket: String,
        region: Option<String>,
        endpoint: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        allow_http: bool,
    },
}

impl StorageConfig {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local { path: path.into() }
    }

    pub fn s3(
        bucket: impl Into<String>,
        region: Option<String>,
        endpoint: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        allow_http: bool,
    ) -> Self {
        Self::S3 {
            bucket: bucket.into(),
            region,
            endpoint,
            access_key_id,
            secret_access_key,
            allow_http,
        }
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let backend = lookup("STORAGE_BACKEND").unwrap_or_else(|| "local".to_string());

        match backend.as_str() {
            "local" => {
                let path = lookup("STORAGE_PATH").unwrap_or_else(|| "./data".to_string());
                Ok(Self::local(path))
            }
            "memory" => Ok(Self::Memory),
            "s3" => {
                let bucket = lookup("AWS_BUCKET")
                    .ok_or_else(|| anyhow::anyhow!("AWS_BUCKET is required for S3 backend"))?;
                let allow_http = match lookup("AWS_ALLOW_HTTP") {
                    Some(raw) => raw.parse::<bool>().map_err(|_| {
                        anyhow::anyhow!("AWS_ALLOW_HTTP must be 'true' or 'false', got '{raw}'")
                    })?,
                    None => false,
                };

                Ok(Self::s3(
                    bucket,
                    lookup("AWS_REGION"),
                    lookup("AWS_ENDPOINT"),
                    lookup("AWS_ACCESS_KEY_ID"),
                    lookup("AWS_SECRET_ACCESS_KEY"),
                    allow_http,
                ))
            }
            _ => anyhow::bail!(
                "Unknown storage backend: {}. Must be 'local', 'memory' or 's3'",
                backend
            ),
        }
    }
}
