use anyhow::Result;
use serde_json::{Map, Value};
use shared_types::{
    ConfigurationPatch, ConfigurationRecord, HistoryEntry, OverrideChange, RESERVED_FIELDS,
};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::clock::Clock;
use crate::storage::{DocumentStore, StorageError};

/// Versioning and history policy on top of a [`DocumentStore`].
///
/// This is the only place that assigns versions or writes history. Two
/// concurrent writes to the same name are not serialized: both may archive
/// into the same history slot and the store keeps whichever lands last.
pub struct ConfigRepository {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl ConfigRepository {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<ConfigurationRecord>> {
        self.store.get(name).await
    }

    pub async fn get_all(&self) -> Result<Vec<ConfigurationRecord>> {
        self.store.get_all().await
    }

    /// Creates or updates `name`, archiving the previous document first.
    ///
    /// Returns the record as read back from the store after the write.
    #[instrument(skip(self, patch))]
    pub async fn set(
        &self,
        name: &str,
        patch: ConfigurationPatch,
        writer_id: &str,
    ) -> Result<ConfigurationRecord> {
        let existing = self.store.get(name).await?;
        let now = self.clock.now();

        let mut record = match existing {
            Some(current) => {
                let entry = HistoryEntry {
                    version: current.version.max(1),
                    archived_at: now,
                    snapshot: current.clone(),
                };
                self.store.append_history(name, &entry).await?;

                let mut next = current;
                next.version += 1;
                next
            }
            None => {
                let mut created = ConfigurationRecord::new(name);
                created.version = 1;
                created.created_by = Some(writer_id.to_string());
                created.created_at = Some(now);
                created
            }
        };

        merge_patch(&mut record, patch);
        record.id = name.to_string();
        record.updated_by = Some(writer_id.to_string());
        record.updated_at = Some(now);

        self.store.set(&record).await?;
        info!(version = record.version, "Configuration saved");

        self.store
            .get(name)
            .await?
            .ok_or_else(|| StorageError::MissingAfterWrite(name.to_string()).into())
    }

    /// Returns `false` when there was nothing to delete. History is kept.
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<bool> {
        if !self.store.exists(name).await? {
            return Ok(false);
        }

        self.store.delete(name).await?;
        info!("Configuration deleted");
        Ok(true)
    }

    /// The record as seen from one country, without anyone else's overrides
    pub async fn get_for_country(
        &self,
        name: &str,
        country: &str,
    ) -> Result<Option<Map<String, Value>>> {
        match self.store.get(name).await? {
            Some(record) => Ok(Some(country_view(&record, country)?)),
            None => Ok(None),
        }
    }

    pub async fn history(&self, name: &str) -> Result<Vec<HistoryEntry>> {
        self.store.list_history(name).await
    }

    pub async fn history_entry(&self, name: &str, version: u64) -> Result<Option<HistoryEntry>> {
        self.store.get_history(name, version).await
    }
}

fn merge_patch(record: &mut ConfigurationRecord, patch: ConfigurationPatch) {
    let ConfigurationPatch {
        content,
        description,
        country_overrides,
        extra,
    } = patch;

    if let Some(content) = content {
        record.content = content;
    }
    if let Some(description) = description {
        record.description = description;
    }

    match country_overrides {
        Some(changes) if changes.is_empty() => record.country_overrides.clear(),
        Some(changes) => {
            for (country, change) in changes {
                match change {
                    OverrideChange::Set(value) => {
                        record.country_overrides.insert(country, value);
                    }
                    OverrideChange::Remove => {
                        record.country_overrides.remove(&country);
                    }
                }
            }
        }
        None => {}
    }

    for (field, value) in extra {
        if !RESERVED_FIELDS.contains(&field.as_str()) {
            record.extra.insert(field, value);
        }
    }
}

/// Object overrides are merged field by field over the record; any other
/// override value stands in for `content`.
fn country_view(record: &ConfigurationRecord, country: &str) -> Result<Map<String, Value>> {
    let mut view = match serde_json::to_value(record)? {
        Value::Object(fields) => fields,
        other => anyhow::bail!("Configuration {} serialized to {other}", record.id),
    };

    match record.country_overrides.get(country) {
        Some(Value::Object(fields)) => view.extend(fields.clone()),
        Some(value) => {
            view.insert("content".to_string(), value.clone());
        }
        None => {}
    }
    view.remove("countryOverrides");

    Ok(view)
}
