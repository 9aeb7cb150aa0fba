//! PyTorch Hub checks and field mapping.

use crate::config::ModelHub;
use crate::mapping::{FieldMapping, SideTable};
use crate::normalize::parse_bracket_list;
use crate::record::str_field;
use crate::validate::{Constraint, ValueKind};
use serde_json::{json, Value};

/// Raw field identifying a model page.
pub const ID_FIELD: &str = "title";

/// Every front matter key a model page is expected to carry.
const EXPECTED_FIELDS: [&str; 15] = [
    "layout",
    "background-class",
    "body-class",
    "category",
    "title",
    "summary",
    "image",
    "author",
    "tags",
    "github-link",
    "github-id",
    "featured_image_1",
    "featured_image_2",
    "accelerator",
    "demo-model-link",
];

pub fn model_constraints() -> Vec<Constraint> {
    EXPECTED_FIELDS
        .into_iter()
        .map(|name| Constraint::field_exists(name, ValueKind::String))
        .collect()
}

pub fn model_mapping() -> FieldMapping {
    FieldMapping::new()
        .rename("context_id", ID_FIELD)
        .constant("model_hub", json!(ModelHub::PyTorch.as_str()))
        .rename("repo_url", "github-link")
        .constant("library", json!("pytorch"))
        .compute("tags", |raw, _| {
            Ok(str_field(raw, "tags")
                .map(|tags| json!(parse_bracket_list(tags)))
                .unwrap_or(Value::Null))
        })
        .rename("author", "author")
        .compute("license", |raw, ctx| {
            Ok(str_field(raw, ID_FIELD)
                .map(|id| ctx.side_tables.get(SideTable::License, id))
                .unwrap_or(Value::Null))
        })
        .compute("original_data", |raw, _| Ok(Value::Object(raw.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{MapContext, SideTables};
    use crate::normalize::TagVocabulary;
    use crate::record::RawRecord;

    fn page() -> RawRecord {
        json!({
            "title": "ResNet",
            "author": "Pytorch Team",
            "tags": "[\u{201c}vision\u{201d}, scriptable, ]",
            "github-link": "https://github.com/pytorch/vision/blob/main/torchvision/models/resnet.py",
            "github-id": "pytorch/vision",
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn test_model_mapping() {
        let vocab = TagVocabulary::new();
        let mut sides = SideTables::new();
        sides.insert(SideTable::License, "ResNet", json!("bsd-3-clause"));

        let mapped = model_mapping()
            .apply(&page(), &MapContext::new(&vocab, &sides))
            .unwrap();
        assert_eq!(mapped.get("context_id"), &json!("ResNet"));
        assert_eq!(mapped.get("model_hub"), &json!("PyTorch"));
        assert_eq!(mapped.get("library"), &json!("pytorch"));
        assert_eq!(mapped.get("tags"), &json!(["vision", "scriptable"]));
        assert_eq!(mapped.get("license"), &json!("bsd-3-clause"));
        assert!(mapped.get("repo_url").as_str().unwrap().contains("pytorch/vision"));
    }

    #[test]
    fn test_missing_license_is_absent() {
        let vocab = TagVocabulary::new();
        let sides = SideTables::new();
        let mapped = model_mapping()
            .apply(&page(), &MapContext::new(&vocab, &sides))
            .unwrap();
        assert_eq!(mapped.get("license"), &Value::Null);
    }

    #[test]
    fn test_constraints_report_missing_fields() {
        let problems = crate::validate::validate(&[page()], &model_constraints());
        // 15 expected keys, 5 present
        assert_eq!(problems.len(), 10);
    }
}
