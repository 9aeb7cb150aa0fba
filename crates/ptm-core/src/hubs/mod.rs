//! Source adapters for the supported model hubs.
//!
//! Every hub implements [`HubSource`]: it extracts raw rows in the hub's own
//! field names, declares the checks its rows should pass, fetches its
//! controlled vocabulary and per-id side tables, and supplies the ordered
//! field mapping that turns a raw row into a canonical one.
//!
//! - [`huggingface`] - HuggingFace Hub REST API (models and datasets)
//! - [`pytorch`] - PyTorch Hub markdown corpus through GitHub GraphQL

pub mod huggingface;
pub mod pytorch;

pub use huggingface::HuggingFaceSource;
pub use pytorch::PyTorchSource;

use crate::config::{HarvestOptions, ModelHub};
use crate::mapping::{FieldMapping, SideTables};
use crate::normalize::TagVocabulary;
use crate::record::{value_to_text, RawRecord};
use crate::validate::Constraint;
use crate::{PtmError, Result};
use async_trait::async_trait;
use serde_json::Value;

/// A model hub the harvester can read from.
#[async_trait]
pub trait HubSource: Send + Sync {
    fn hub(&self) -> ModelHub;

    /// Raw field identifying a row in logs and side tables.
    fn id_field(&self) -> &'static str;

    /// Whether mapped rows describe models and should reach the store.
    fn loads_models(&self) -> bool {
        true
    }

    /// Extract raw rows, at most `limit` when given.
    async fn extract(&self, limit: Option<usize>) -> Result<Vec<RawRecord>>;

    /// Checks run over extracted rows before mapping.
    fn constraints(&self) -> Vec<Constraint> {
        Vec::new()
    }

    /// The hub's controlled tag vocabulary.
    async fn vocabulary(&self) -> Result<TagVocabulary> {
        Ok(TagVocabulary::new())
    }

    /// Per-id lookups fetched row by row before mapping.
    ///
    /// A failed fetch is logged and leaves the entry absent.
    async fn side_tables(&self, _rows: &[RawRecord], _options: &HarvestOptions) -> SideTables {
        SideTables::new()
    }

    /// Ordered mapping from raw rows to canonical rows.
    fn mapping(&self) -> FieldMapping;
}

/// Build the adapter for the configured hub.
pub fn source_for(
    options: &HarvestOptions,
    hf_token: Option<String>,
    github_token: Option<String>,
) -> Result<Box<dyn HubSource>> {
    match options.hub {
        ModelHub::HuggingFace if options.datasets => {
            Ok(Box::new(HuggingFaceSource::datasets(hf_token)?))
        }
        ModelHub::HuggingFace => Ok(Box::new(HuggingFaceSource::models(hf_token)?)),
        ModelHub::PyTorch => Ok(Box::new(PyTorchSource::new(github_token)?)),
        ModelHub::GitHub => Err(PtmError::Config {
            message: "GitHub is recorded as a hub name but has no harvester".to_string(),
        }),
    }
}

/// Move the entries of a nested object up to the top level.
///
/// The container key is removed; an existing top-level key wins over a
/// nested one of the same name. Non-object containers are just removed.
pub fn unpack_object(raw: &mut RawRecord, key: &str) {
    if let Some(Value::Object(nested)) = raw.remove(key) {
        for (name, value) in nested {
            if !raw.contains_key(&name) {
                raw.insert(name, value);
            }
        }
    }
}

/// First non-null of several raw fields, rendered as text.
pub fn row_id(raw: &RawRecord, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|f| raw.get(*f))
        .find_map(value_to_text)
}

/// The row's download count; missing or malformed counts are zero.
pub fn download_count(raw: &RawRecord) -> u64 {
    match raw.get("downloads") {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_unpack_object_keeps_top_level() {
        let mut row = raw(json!({
            "license": "mit",
            "cardData": {"license": "apache-2.0", "language": ["en"]},
        }));
        unpack_object(&mut row, "cardData");
        assert_eq!(row["license"], json!("mit"));
        assert_eq!(row["language"], json!(["en"]));
        assert!(!row.contains_key("cardData"));
    }

    #[test]
    fn test_unpack_missing_or_null_container() {
        let mut row = raw(json!({"config": null, "sha": "abc"}));
        unpack_object(&mut row, "config");
        unpack_object(&mut row, "cardData");
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn test_row_id_and_downloads() {
        let row = raw(json!({"id": "gpt2", "downloads": 42}));
        assert_eq!(row_id(&row, &["modelId", "id"]).as_deref(), Some("gpt2"));
        assert_eq!(download_count(&row), 42);
        assert_eq!(download_count(&raw(json!({"downloads": null}))), 0);
        assert_eq!(download_count(&raw(json!({"downloads": -3}))), 0);
    }

    #[test]
    fn test_github_has_no_source() {
        let options = HarvestOptions::new(ModelHub::GitHub);
        assert!(matches!(
            source_for(&options, None, None),
            Err(PtmError::Config { .. })
        ));
    }
}
