use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::aws::{AmazonS3Builder, S3ConditionalPut};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::{Path, PathPart};
use object_store::{ObjectMeta, ObjectStore, PutMode, PutOptions, PutPayload};
use serde::{de::DeserializeOwned, Serialize};
use shared_types::{ConfigurationRecord, HistoryEntry};
use std::sync::Arc;
use tracing::debug;

use super::config::StorageConfig;
use super::error::StorageError;
use super::traits::DocumentStore;

const COLLECTION: &str = "configurations";
const DOCUMENT_FILE: &str = "document.json";
const HISTORY_DIR: &str = "history";

/// Same ceiling hosted document databases put on document ids
const MAX_NAME_BYTES: usize = 1500;

/// `NAME_MAX` of common filesystems; a name is one directory on disk
const LOCAL_MAX_NAME_BYTES: usize = 255;

pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    /// Measured on the encoded path segment
    max_name_bytes: usize,
}

impl ObjectStoreBackend {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            max_name_bytes: MAX_NAME_BYTES,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    pub fn from_config(config: StorageConfig) -> Result<Self> {
        let mut max_name_bytes = MAX_NAME_BYTES;
        let store: Arc<dyn ObjectStore> = match config {
            StorageConfig::Local { path } => {
                max_name_bytes = LOCAL_MAX_NAME_BYTES;
                Arc::new(LocalFileSystem::new_with_prefix(path)?)
            }
            StorageConfig::Memory => Arc::new(InMemory::new()),
            StorageConfig::S3 {
                bucket,
                region,
                endpoint,
                access_key_id,
                secret_access_key,
                allow_http,
            } => {
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(bucket)
                    .with_allow_http(allow_http)
                    .with_conditional_put(S3ConditionalPut::ETagMatch);
                if let Some(region) = region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                if let Some(access_key_id) = access_key_id {
                    builder = builder.with_access_key_id(access_key_id);
                }
                if let Some(secret_access_key) = secret_access_key {
                    builder = builder.with_secret_access_key(secret_access_key);
                }
                Arc::new(builder.build()?)
            }
        };

        Ok(Self {
            store,
            max_name_bytes,
        })
    }

    fn validate_name(&self, name: &str) -> Result<(), StorageError> {
        let reason = if name.is_empty() {
            "name must not be empty"
        } else if PathPart::from(name).as_ref().len() > self.max_name_bytes {
            "name is too long for this store"
        } else if name.contains('/') {
            "name must not contain '/'"
        } else if name == "." || name == ".." {
            "name must not be '.' or '..'"
        } else {
            return Ok(());
        };

        Err(StorageError::InvalidName {
            name: name.to_string(),
            reason,
        })
    }

    fn document_path(&self, name: &str) -> Result<Path> {
        self.validate_name(name)?;
        Ok(Path::from_iter([COLLECTION, name, DOCUMENT_FILE]))
    }

    fn history_dir(&self, name: &str) -> Result<Path> {
        self.validate_name(name)?;
        Ok(Path::from_iter([COLLECTION, name, HISTORY_DIR]))
    }

    /// The first entry archived for a version lives at `v{n}.json`; later
    /// entries for the same version (a recreated name, or racing writers)
    /// land at `v{n}-{attempt}.json`.
    fn history_path(&self, name: &str, version: u64, attempt: u32) -> Result<Path> {
        self.validate_name(name)?;
        let file = if attempt <= 1 {
            format!("v{version}.json")
        } else {
            format!("v{version}-{attempt}.json")
        };
        Ok(Path::from_iter([COLLECTION, name, HISTORY_DIR, file.as_str()]))
    }

    fn is_document(meta: &ObjectMeta) -> bool {
        let parts: Vec<_> = meta.location.parts().collect();
        parts.len() == 3 && parts[2].as_ref() == DOCUMENT_FILE
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match self.store.get(path).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                let value = serde_json::from_slice(&bytes)
                    .with_context(|| format!("Failed to decode document at {path}"))?;
                Ok(Some(value))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_vec_pretty(value)?;
        self.store.put(path, PutPayload::from(json)).await?;
        Ok(())
    }

    /// Writes only if nothing is stored at `path`; `false` when something is
    async fn create_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<bool> {
        let payload = PutPayload::from(serde_json::to_vec_pretty(value)?);
        let opts = PutOptions {
            mode: PutMode::Create,
            ..PutOptions::default()
        };

        match self.store.put_opts(path, payload.clone(), opts).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::AlreadyExists { .. }) => Ok(false),
            // Stores without conditional writes fall back to check-then-put
            Err(object_store::Error::NotImplemented) => match self.store.head(path).await {
                Ok(_) => Ok(false),
                Err(object_store::Error::NotFound { .. }) => {
                    self.store.put(path, payload).await?;
                    Ok(true)
                }
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn list_objects(&self, prefix: &Path) -> Result<Vec<ObjectMeta>> {
        let objects: Vec<ObjectMeta> = self.store.list(Some(prefix)).try_collect().await?;
        Ok(objects)
    }
}

#[async_trait]
impl DocumentStore for ObjectStoreBackend {
    async fn get(&self, name: &str) -> Result<Option<ConfigurationRecord>> {
        let path = self.document_path(name)?;
        let record: Option<ConfigurationRecord> = self.read_json(&path).await?;

        // The document key is authoritative for the id
        Ok(record.map(|mut record| {
            record.id = name.to_string();
            record
        }))
    }

    async fn get_all(&self) -> Result<Vec<ConfigurationRecord>> {
        let objects = self.list_objects(&Path::from(COLLECTION)).await?;

        let mut records = Vec::new();
        for meta in objects.iter().filter(|meta| Self::is_document(meta)) {
            // A concurrent delete can remove a listed document before it is read
            if let Some(record) = self.read_json(&meta.location).await? {
                records.push(record);
            }
        }

        Ok(records)
    }

    async fn set(&self, record: &ConfigurationRecord) -> Result<()> {
        let path = self.document_path(&record.id)?;
        self.write_json(&path, record).await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.document_path(name)?;
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let path = self.document_path(name)?;
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn append_history(&self, name: &str, entry: &HistoryEntry) -> Result<()> {
        let mut attempt = 1;
        loop {
            let path = self.history_path(name, entry.version, attempt)?;
            if self.create_json(&path, entry).await? {
                return Ok(());
            }
            debug!(%path, "History slot taken, trying the next one");
            attempt += 1;
        }
    }

    async fn list_history(&self, name: &str) -> Result<Vec<HistoryEntry>> {
        let objects = self.list_objects(&self.history_dir(name)?).await?;

        let mut entries = Vec::with_capacity(objects.len());
        for meta in &objects {
            if let Some(entry) = self.read_json::<HistoryEntry>(&meta.location).await? {
                entries.push(entry);
            }
        }
        entries.sort_by_key(|entry| (entry.version, entry.archived_at));

        Ok(entries)
    }

    async fn get_history(&self, name: &str, version: u64) -> Result<Option<HistoryEntry>> {
        let path = self.history_path(name, version, 1)?;
        self.read_json(&path).await
    }
}
