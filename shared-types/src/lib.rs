use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Fields owned by the server. Writers cannot set them through a patch.
pub const RESERVED_FIELDS: [&str; 6] = [
    "id",
    "version",
    "createdAt",
    "createdBy",
    "updatedAt",
    "updatedBy",
];

/// A named, versioned configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationRecord {
    pub id: String,

    /// Raw payload, usually a string that may itself hold encoded JSON
    #[serde(default)]
    pub content: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Alternate payloads keyed by country code
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub country_overrides: BTreeMap<String, Value>,

    /// 0 only for documents written before versioning existed
    #[serde(default)]
    pub version: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,

    /// Any other top-level fields a writer attached
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigurationRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: Value::Null,
            description: None,
            country_overrides: BTreeMap::new(),
            version: 0,
            created_at: None,
            created_by: None,
            updated_at: None,
            updated_by: None,
            extra: Map::new(),
        }
    }
}

/// Snapshot of a record taken right before it was overwritten
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// The version this snapshot superseded
    pub version: u64,
    pub archived_at: DateTime<Utc>,
    pub snapshot: ConfigurationRecord,
}

/// A change to a single country override.
///
/// JSON `null` means [`OverrideChange::Remove`], anything else is a new value.
/// Countries missing from the patch are left alone.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideChange {
    Set(Value),
    Remove,
}

impl Serialize for OverrideChange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OverrideChange::Set(value) => value.serialize(serializer),
            OverrideChange::Remove => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for OverrideChange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(if value.is_null() {
            OverrideChange::Remove
        } else {
            OverrideChange::Set(value)
        })
    }
}

/// Request body for saving a configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationPatch {
    /// `null` is treated like an absent field; content cannot be cleared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,

    /// `Some(None)` (JSON `null`) clears the description
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,

    /// An empty map clears every override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_overrides: Option<BTreeMap<String, OverrideChange>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigurationPatch {
    pub fn content(content: impl Into<Value>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Some(description.into()));
        self
    }

    #[must_use]
    pub fn clear_description(mut self) -> Self {
        self.description = Some(None);
        self
    }

    #[must_use]
    pub fn with_override(mut self, country: impl Into<String>, change: OverrideChange) -> Self {
        self.country_overrides
            .get_or_insert_with(BTreeMap::new)
            .insert(country.into(), change);
        self
    }
}

/// Keeps a present `null` apart from a missing field, which `default` covers
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// JSON envelope used by every enveloped endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn data_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}
