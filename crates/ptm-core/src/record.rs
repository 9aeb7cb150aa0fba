//! Record shapes flowing through the pipeline.
//!
//! - [`RawRecord`]: one hub-native row as returned by a source adapter.
//! - [`MappedRow`]: the ordered canonical fields produced by a field mapping.
//! - [`ModelRecord`]: the typed, normalized input of the relational loader.

use crate::config::ModelHub;
use crate::normalize::dedupe_values;
use crate::{PtmError, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A hub-native row: arbitrary keys to arbitrary JSON values.
pub type RawRecord = serde_json::Map<String, Value>;

static NULL: Value = Value::Null;

/// Look up a raw field, yielding `Null` when the key is missing.
pub fn field<'a>(raw: &'a RawRecord, key: &str) -> &'a Value {
    raw.get(key).unwrap_or(&NULL)
}

/// Look up a raw field as a string slice.
pub fn str_field<'a>(raw: &'a RawRecord, key: &str) -> Option<&'a str> {
    raw.get(key).and_then(Value::as_str)
}

/// Render a scalar JSON value as text. `Null` has no text form.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Interpret a value as a list of strings.
///
/// A bare string is a one-element list, `Null` is the empty list and nulls
/// inside an array are dropped.
pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().filter_map(value_to_text).collect(),
        other => value_to_text(other).into_iter().collect(),
    }
}

/// Canonical fields in mapping-declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedRow {
    fields: Vec<(String, Value)>,
}

impl MappedRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Append a field. Mappings guarantee names are unique.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.fields.push((name.into(), value));
    }

    /// Value of a canonical field, `Null` when absent.
    pub fn get(&self, name: &str) -> &Value {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .unwrap_or(&NULL)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The row's `context_id` rendered as text, if present.
    pub fn context_id(&self) -> Option<String> {
        value_to_text(self.get("context_id"))
    }
}

impl Serialize for MappedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A row skipped by a batch driver, with the reason it was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub context_id: String,
    pub error: String,
}

impl RowFailure {
    pub fn new(context_id: impl Into<String>, error: &PtmError) -> Self {
        Self {
            context_id: context_id.into(),
            error: error.to_string(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One event in a HuggingFace discussion thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionEvent {
    #[serde(rename = "id")]
    pub event_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub edited: Option<bool>,
    #[serde(default)]
    pub hidden: Option<bool>,
    #[serde(default)]
    pub new_status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub old_title: Option<String>,
    #[serde(default)]
    pub new_title: Option<String>,
}

/// A HuggingFace discussion or pull request attached to one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discussion {
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
    pub num: i64,
    #[serde(default)]
    pub repo_id: Option<String>,
    #[serde(default)]
    pub repo_type: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub is_pull_request: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub events: Vec<DiscussionEvent>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conflicting_files: Vec<String>,
    #[serde(default)]
    pub target_branch: Option<String>,
    #[serde(default)]
    pub merge_commit_oid: Option<String>,
    #[serde(default)]
    pub diff: Option<String>,
}

/// Canonical model record consumed by the relational loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub context_id: String,
    pub model_hub: String,
    pub sha: Option<String>,
    pub repo_url: Option<String>,
    pub downloads: Option<i64>,
    pub likes: Option<i64>,
    /// Raw hub payload retained for audit.
    pub original_data: Option<Value>,
    pub architectures: Vec<String>,
    pub authors: Vec<String>,
    pub frameworks: Vec<String>,
    pub languages: Vec<String>,
    pub libraries: Vec<String>,
    pub licenses: Vec<String>,
    pub papers: Vec<String>,
    pub tags: Vec<String>,
    pub discussions: Vec<Discussion>,
}

impl ModelRecord {
    /// Build a typed record from a mapped row.
    ///
    /// Repeated-valued fields accept a bare string, a list or absence, and
    /// are deduplicated keeping the first spelling. `model_hub` falls back to
    /// `default_hub` when the mapping did not set it.
    pub fn from_mapped(row: &MappedRow, default_hub: ModelHub) -> Result<Self> {
        let context_id = row.context_id().ok_or_else(|| PtmError::Malformed {
            context_id: "<missing>".to_string(),
            message: "record has no context_id".to_string(),
        })?;

        let discussions = parse_discussions(row.get("discussions")).map_err(|e| {
            PtmError::Malformed {
                context_id: context_id.clone(),
                message: format!("invalid discussions: {}", e),
            }
        })?;

        let list = |name: &str| dedupe_values(string_list(row.get(name)));

        Ok(Self {
            model_hub: value_to_text(row.get("model_hub"))
                .unwrap_or_else(|| default_hub.as_str().to_string()),
            sha: value_to_text(row.get("sha")),
            repo_url: value_to_text(row.get("repo_url")),
            downloads: as_count(row.get("downloads")),
            likes: as_count(row.get("likes")),
            original_data: match row.get("original_data") {
                Value::Null => None,
                other => Some(other.clone()),
            },
            architectures: list("architectures"),
            authors: list("author"),
            frameworks: list("framework"),
            languages: list("language"),
            libraries: list("library"),
            licenses: list("license"),
            papers: list("paper"),
            tags: list("tags"),
            discussions,
            context_id,
        })
    }
}

fn as_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_discussions(value: &Value) -> serde_json::Result<Vec<Discussion>> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| serde_json::from_value(item.clone()))
            .collect(),
        // A side-table miss is recorded as absence: no discussions.
        _ => Ok(Vec::new()),
    }
}
