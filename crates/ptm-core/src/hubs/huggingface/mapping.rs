//! HuggingFace row preparation, checks and field mappings.

use super::RepoKind;
use crate::config::{HubConfig, ModelHub};
use crate::hubs::{row_id, unpack_object};
use crate::mapping::{FieldMapping, MapContext, SideTable};
use crate::normalize::{normalize_tags, paper_urls, VocabularyNamespace};
use crate::record::{field, str_field, string_list, RawRecord};
use crate::validate::{Constraint, ValueKind};
use serde_json::{json, Value};
use tracing::debug;

/// Raw fields identifying a model row, in order of preference.
pub const MODEL_ID_FIELDS: [&str; 2] = ["modelId", "id"];
/// Raw field identifying a dataset row.
pub const DATASET_ID_FIELDS: [&str; 1] = ["id"];

pub fn id_fields(kind: RepoKind) -> &'static [&'static str] {
    match kind {
        RepoKind::Model => &MODEL_ID_FIELDS,
        RepoKind::Dataset => &DATASET_ID_FIELDS,
    }
}

/// Keep only sibling files that look like JSON configs.
fn filter_siblings(raw: &mut RawRecord) {
    if let Some(Value::Array(siblings)) = raw.get_mut("siblings") {
        siblings.retain(|s| {
            s.get("rfilename")
                .and_then(Value::as_str)
                .is_some_and(|name| name.contains("config") && name.contains("json"))
        });
    }
}

/// Flatten a listed row before validation and mapping.
///
/// Models unpack `cardData` and `config`; datasets unpack `cardData`.
pub fn prepare_row(raw: &mut RawRecord, kind: RepoKind) {
    filter_siblings(raw);
    unpack_object(raw, "cardData");
    if kind == RepoKind::Model {
        unpack_object(raw, "config");
    }
}

pub fn model_constraints() -> Vec<Constraint> {
    let mut constraints: Vec<Constraint> = [
        ("modelId", ValueKind::String),
        ("sha", ValueKind::String),
        ("lastModified", ValueKind::String),
        ("tags", ValueKind::List),
        ("pipeline_tag", ValueKind::String),
        ("siblings", ValueKind::List),
        ("private", ValueKind::Bool),
        ("author", ValueKind::String),
        ("_id", ValueKind::String),
        ("id", ValueKind::String),
        ("likes", ValueKind::Integer),
        ("downloads", ValueKind::Integer),
        ("library_name", ValueKind::String),
    ]
    .into_iter()
    .map(|(name, kind)| Constraint::field_exists(name, kind))
    .collect();

    constraints.push(Constraint::row("modelId and id are equivalent", |row| {
        row.get("modelId") == row.get("id")
    }));
    constraints
}

pub fn dataset_constraints() -> Vec<Constraint> {
    [
        ("id", ValueKind::String),
        ("sha", ValueKind::String),
        ("lastModified", ValueKind::String),
        ("tags", ValueKind::List),
        ("private", ValueKind::Bool),
        ("author", ValueKind::String),
        ("description", ValueKind::String),
        ("citation", ValueKind::String),
        ("siblings", ValueKind::List),
        ("_id", ValueKind::String),
        ("disabled", ValueKind::Bool),
        ("gated", ValueKind::Bool),
        ("likes", ValueKind::Integer),
        ("downloads", ValueKind::Integer),
        ("paperswithcode_id", ValueKind::String),
    ]
    .into_iter()
    .map(|(name, kind)| Constraint::field_exists(name, kind))
    .collect()
}

/// The raw `tags` list. Any other JSON kind counts as no tags.
fn raw_tags(raw: &RawRecord) -> Vec<String> {
    match field(raw, "tags") {
        value @ (Value::Null | Value::Array(_) | Value::String(_)) => string_list(value),
        other => {
            debug!("Ignoring malformed tags: {}", other);
            Vec::new()
        }
    }
}

fn papers(raw: &RawRecord) -> Value {
    let urls = paper_urls(raw_tags(raw));
    if urls.is_empty() {
        Value::Null
    } else {
        json!(urls)
    }
}

fn side_value(raw: &RawRecord, kind: RepoKind, table: SideTable, ctx: &MapContext<'_>) -> Value {
    row_id(raw, id_fields(kind))
        .map(|id| ctx.side_tables.get(table, &id))
        .unwrap_or(Value::Null)
}

/// Mapping for HuggingFace model rows.
///
/// `tags` drops namespaced and vocabulary tags and adds the pipeline tag;
/// `paper` turns `arxiv:` tags into abstract URLs.
pub fn model_mapping() -> FieldMapping {
    let kind = RepoKind::Model;
    FieldMapping::new()
        .coalesce("context_id", &MODEL_ID_FIELDS)
        .constant("model_hub", json!(ModelHub::HuggingFace.as_str()))
        .rename("sha", "sha")
        .rename("lastModified", "lastModified")
        .compute("tags", |raw, ctx| {
            let tags = normalize_tags(
                raw_tags(raw),
                ctx.vocabulary,
                str_field(raw, "pipeline_tag"),
            );
            Ok(json!(tags))
        })
        .rename("author", "author")
        .rename("citation", "citation")
        .rename("architectures", "architectures")
        .rename("framework", "model_type")
        .rename("library", "library_name")
        .rename("likes", "likes")
        .rename("downloads", "downloads")
        .compute("repo_url", |raw, _| {
            Ok(row_id(raw, &MODEL_ID_FIELDS)
                .map(|id| json!(format!("{}/{}", HubConfig::HF_HUB_BASE, id)))
                .unwrap_or(Value::Null))
        })
        .rename("datasets", "datasets")
        .rename("language", "language")
        .rename("license", "license")
        .rename("config_file", "siblings")
        .compute("paper", |raw, _| Ok(papers(raw)))
        .compute("original_data", |raw, _| Ok(Value::Object(raw.clone())))
        .compute("snapshot", move |raw, ctx| {
            Ok(side_value(raw, kind, SideTable::Snapshot, ctx))
        })
        .compute("commit_info", move |raw, ctx| {
            Ok(side_value(raw, kind, SideTable::Commits, ctx))
        })
        .compute("discussions", move |raw, ctx| {
            Ok(side_value(raw, kind, SideTable::Discussions, ctx))
        })
}

/// Mapping for HuggingFace dataset rows.
pub fn dataset_mapping() -> FieldMapping {
    let kind = RepoKind::Dataset;
    FieldMapping::new()
        .rename("context_id", "id")
        .constant("model_hub", json!(ModelHub::HuggingFace.as_str()))
        .rename("sha", "sha")
        .rename("lastModified", "lastModified")
        .compute("tags", |raw, ctx| {
            let languages = ctx.vocabulary.restricted_to(&[VocabularyNamespace::Language]);
            let categories: Vec<String> = [
                "task_categories",
                "size_categories",
                "annotations_creators",
                "language_creators",
                "annotation_creators",
            ]
            .into_iter()
            .flat_map(|name| string_list(field(raw, name)))
            .collect();
            Ok(json!(normalize_tags(raw_tags(raw), &languages, categories)))
        })
        .rename("author", "author")
        .rename("description", "description")
        .rename("citation", "citation")
        .rename("likes", "likes")
        .rename("downloads", "downloads")
        .rename("type", "type")
        .rename("paperswithcode_id", "paperswithcode_id")
        .compute("repo_url", |raw, _| {
            Ok(row_id(raw, &DATASET_ID_FIELDS)
                .map(|id| json!(format!("{}/datasets/{}", HubConfig::HF_HUB_BASE, id)))
                .unwrap_or(Value::Null))
        })
        .rename("source", "source_datasets")
        .compute("language", |raw, _| {
            let language = field(raw, "language");
            let multilinguality = field(raw, "multilinguality");
            if language.is_null() && multilinguality.is_null() {
                return Ok(Value::Null);
            }
            let mut values = string_list(language);
            values.extend(string_list(multilinguality));
            Ok(json!(values))
        })
        .rename("license", "license")
        .rename("dataset_info", "dataset_info")
        .compute("paper", |raw, _| Ok(papers(raw)))
        .compute("original_data", |raw, _| Ok(Value::Object(raw.clone())))
        .compute("snapshot", move |raw, ctx| {
            Ok(side_value(raw, kind, SideTable::Snapshot, ctx))
        })
        .compute("commit_info", move |raw, ctx| {
            Ok(side_value(raw, kind, SideTable::Commits, ctx))
        })
}
