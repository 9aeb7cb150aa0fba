//! End-to-end harvest tests against an on-disk store.
//!
//! A stub source stands in for the hub API: it serves canned HuggingFace
//! rows and side tables while the real mapping, normalizer, loader and
//! query layer run unchanged.

use async_trait::async_trait;
use ptm_core::hubs::huggingface::mapping::{
    dataset_constraints, dataset_mapping, model_constraints, model_mapping, prepare_row,
};
use ptm_core::hubs::huggingface::RepoKind;
use ptm_core::{
    harvest, Constraint, FieldMapping, HarvestOptions, HubSource, LookupTable, MetadataStore,
    ModelHub, PtmError, RawRecord, Result, SideTable, SideTables, TagVocabulary,
    VocabularyNamespace,
};
use serde_json::{json, Value};
use tempfile::TempDir;

struct StubSource {
    kind: RepoKind,
    rows: Vec<Value>,
    side_tables: SideTables,
    vocabulary_fails: bool,
}

impl StubSource {
    fn models(rows: Vec<Value>) -> Self {
        Self {
            kind: RepoKind::Model,
            rows,
            side_tables: SideTables::new(),
            vocabulary_fails: false,
        }
    }

    fn with_side(mut self, table: SideTable, id: &str, value: Value) -> Self {
        self.side_tables.insert(table, id, value);
        self
    }
}

#[async_trait]
impl HubSource for StubSource {
    fn hub(&self) -> ModelHub {
        ModelHub::HuggingFace
    }

    fn id_field(&self) -> &'static str {
        match self.kind {
            RepoKind::Model => "modelId",
            RepoKind::Dataset => "id",
        }
    }

    fn loads_models(&self) -> bool {
        self.kind == RepoKind::Model
    }

    async fn extract(&self, limit: Option<usize>) -> Result<Vec<RawRecord>> {
        let mut rows: Vec<RawRecord> = self
            .rows
            .iter()
            .filter_map(|v| v.as_object().cloned())
            .map(|mut raw| {
                prepare_row(&mut raw, self.kind);
                raw
            })
            .collect();
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    fn constraints(&self) -> Vec<Constraint> {
        match self.kind {
            RepoKind::Model => model_constraints(),
            RepoKind::Dataset => dataset_constraints(),
        }
    }

    async fn vocabulary(&self) -> Result<TagVocabulary> {
        if self.vocabulary_fails {
            return Err(PtmError::Network {
                message: "connection refused".to_string(),
                status_code: None,
            });
        }
        Ok(TagVocabulary::new()
            .with(VocabularyNamespace::Library, ["pytorch", "transformers"])
            .with(VocabularyNamespace::Language, ["en"])
            .with(VocabularyNamespace::License, ["apache-2.0", "mit"]))
    }

    async fn side_tables(&self, _rows: &[RawRecord], _options: &HarvestOptions) -> SideTables {
        self.side_tables.clone()
    }

    fn mapping(&self) -> FieldMapping {
        match self.kind {
            RepoKind::Model => model_mapping(),
            RepoKind::Dataset => dataset_mapping(),
        }
    }
}

fn bert_base() -> Value {
    json!({
        "modelId": "bert-base",
        "id": "bert-base",
        "sha": "a265f7",
        "downloads": 5_000_000,
        "likes": 120,
        "tags": ["pytorch", "fill-mask", "arxiv:1810.04805"],
        "pipeline_tag": "fill-mask",
        "library_name": "transformers",
        "config": {"model_type": "bert", "architectures": ["BertForMaskedLM"]},
    })
}

fn by_author(model_id: &str, author: &str) -> Value {
    json!({
        "modelId": model_id,
        "id": model_id,
        "downloads": 10,
        "author": author,
        "tags": ["text-classification"],
        "cardData": {"license": "mit", "language": ["en", "de"]},
    })
}

fn test_store() -> (TempDir, MetadataStore) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = MetadataStore::open(temp_dir.path().join("ptm.db")).unwrap();
    (temp_dir, store)
}

fn options() -> HarvestOptions {
    HarvestOptions::new(ModelHub::HuggingFace)
}

#[tokio::test]
async fn test_harvest_bert_base() {
    let (_dir, store) = test_store();
    let source = StubSource::models(vec![bert_base()]);

    let report = harvest(&source, &store, &options()).await.unwrap();
    assert_eq!(report.extracted, 1);
    assert_eq!(report.mapped, 1);
    assert_eq!(report.load.as_ref().map(|l| l.inserted), Some(1));
    assert_eq!(report.failures().count(), 0);

    let id = store
        .find_model_id(ModelHub::HuggingFace, "bert-base")
        .unwrap()
        .expect("bert-base should be loaded");
    let view = store.model_view(id).unwrap();

    assert_eq!(view.model_hub, "HuggingFace");
    assert_eq!(view.sha.as_deref(), Some("a265f7"));
    assert_eq!(view.downloads, Some(5_000_000));
    assert_eq!(view.repo_url.as_deref(), Some("https://huggingface.co/bert-base"));
    assert_eq!(
        view.papers.iter().collect::<Vec<_>>(),
        vec!["https://arxiv.org/abs/1810.04805"]
    );
    assert_eq!(view.tags.iter().collect::<Vec<_>>(), vec!["fill-mask"]);
    assert!(view.libraries.contains("transformers"));
    assert!(view.frameworks.contains("bert"));
    assert!(view.architectures.contains("BertForMaskedLM"));
    assert!(view.licenses.is_empty());
    assert_eq!(store.join_count(LookupTable::License).unwrap(), 0);
}

#[tokio::test]
async fn test_shared_author_is_stored_once() {
    let (_dir, store) = test_store();
    let source = StubSource::models(vec![
        by_author("jane/classifier-a", "Jane Doe"),
        by_author("jane/classifier-b", "Jane Doe"),
    ]);

    harvest(&source, &store, &options()).await.unwrap();

    assert_eq!(store.model_count().unwrap(), 2);
    assert_eq!(store.lookup_names(LookupTable::Author).unwrap(), vec!["Jane Doe"]);
    assert_eq!(store.join_count(LookupTable::Author).unwrap(), 2);
    // Both models share the same license and language rows
    assert_eq!(store.lookup_count(LookupTable::License).unwrap(), 1);
    assert_eq!(store.lookup_count(LookupTable::Language).unwrap(), 2);
    assert_eq!(store.join_count(LookupTable::Language).unwrap(), 4);
}

#[tokio::test]
async fn test_discussions_are_loaded_with_events() {
    let (_dir, store) = test_store();
    let discussions = json!([{
        "title": "Add safetensors weights",
        "status": "merged",
        "num": 7,
        "repo_id": "bert-base",
        "repo_type": "model",
        "author": "SFconvertbot",
        "is_pull_request": true,
        "events": [
            {"id": "e1", "type": "comment", "author": "SFconvertbot", "content": "Converted"},
            {"id": "e2", "type": "status-change", "new_status": "merged"},
        ],
        "conflicting_files": ["model.safetensors"],
        "target_branch": "refs/heads/main",
    }]);
    let source = StubSource::models(vec![bert_base(), by_author("jane/a", "Jane Doe")])
        .with_side(SideTable::Discussions, "bert-base", discussions);

    harvest(&source, &store, &options()).await.unwrap();

    let id = store
        .find_model_id(ModelHub::HuggingFace, "bert-base")
        .unwrap()
        .unwrap();
    let loaded = store.fetch_discussions(id).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].num, 7);
    assert_eq!(loaded[0].is_pull_request, Some(true));
    assert_eq!(loaded[0].events.len(), 2);
    assert_eq!(loaded[0].events[1].new_status.as_deref(), Some("merged"));
    assert_eq!(loaded[0].conflicting_files, vec!["model.safetensors"]);

    // A model with no side-table entry has no discussions
    let other = store
        .find_model_id(ModelHub::HuggingFace, "jane/a")
        .unwrap()
        .unwrap();
    assert!(store.fetch_discussions(other).unwrap().is_empty());
}

#[tokio::test]
async fn test_reharvest_replaces_in_place() {
    let (_dir, store) = test_store();
    let source = StubSource::models(vec![bert_base()]);
    harvest(&source, &store, &options()).await.unwrap();
    let first_id = store
        .find_model_id(ModelHub::HuggingFace, "bert-base")
        .unwrap()
        .unwrap();

    let mut updated = bert_base();
    updated["downloads"] = json!(6_000_000);
    updated["tags"] = json!(["pytorch", "fill-mask", "exbert"]);
    let source = StubSource::models(vec![updated]);
    let report = harvest(&source, &store, &options()).await.unwrap();

    let load = report.load.unwrap();
    assert_eq!(load.inserted, 0);
    assert_eq!(load.replaced, 1);
    assert_eq!(store.model_count().unwrap(), 1);

    let view = store.model_view(first_id).unwrap();
    assert_eq!(view.downloads, Some(6_000_000));
    assert!(view.tags.contains("exbert"));
    assert!(view.papers.is_empty());
    assert_eq!(store.join_count(LookupTable::Paper).unwrap(), 0);
    // The paper lookup row outlives its last join row
    assert_eq!(store.lookup_count(LookupTable::Paper).unwrap(), 1);
}

#[tokio::test]
async fn test_malformed_tags_keep_the_row() {
    let (_dir, store) = test_store();
    let source = StubSource::models(vec![
        json!({"modelId": "odd", "id": "odd", "downloads": 3, "tags": {"not": "a list"}}),
        bert_base(),
    ]);

    let report = harvest(&source, &store, &options()).await.unwrap();

    assert_eq!(report.extracted, 2);
    assert_eq!(report.mapped, 2);
    assert!(report.mapping_failures.is_empty());
    assert!(report.problems > 0);
    assert_eq!(store.model_count().unwrap(), 2);

    let id = store
        .find_model_id(ModelHub::HuggingFace, "odd")
        .unwrap()
        .unwrap();
    let view = store.model_view(id).unwrap();
    assert!(view.tags.is_empty());
    assert!(view.papers.is_empty());
    assert_eq!(view.downloads, Some(3));
}

#[tokio::test]
async fn test_malformed_discussions_skip_the_row() {
    let (_dir, store) = test_store();
    let source = StubSource::models(vec![by_author("jane/broken", "Jane Doe"), bert_base()])
        .with_side(
            SideTable::Discussions,
            "jane/broken",
            json!([{"status": "open", "author": "someone"}]),
        );

    let report = harvest(&source, &store, &options()).await.unwrap();

    assert_eq!(report.mapped, 2);
    assert_eq!(report.record_failures.len(), 1);
    assert_eq!(report.record_failures[0].context_id, "jane/broken");
    assert_eq!(report.failures().count(), 1);
    assert_eq!(store.model_count().unwrap(), 1);
    assert!(store
        .find_model_id(ModelHub::HuggingFace, "jane/broken")
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_limit_is_applied() {
    let (_dir, store) = test_store();
    let source = StubSource::models(vec![
        by_author("a/one", "A"),
        by_author("a/two", "A"),
        by_author("a/three", "A"),
    ]);
    let mut options = options();
    options.limit = Some(2);

    let report = harvest(&source, &store, &options).await.unwrap();
    assert_eq!(report.extracted, 2);
    assert_eq!(store.model_count().unwrap(), 2);
}

#[tokio::test]
async fn test_vocabulary_failure_aborts_the_run() {
    let (_dir, store) = test_store();
    let mut source = StubSource::models(vec![bert_base()]);
    source.vocabulary_fails = true;

    let err = harvest(&source, &store, &options()).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(store.model_count().unwrap(), 0);
}

#[tokio::test]
async fn test_invalid_options_abort_before_extraction() {
    let (_dir, store) = test_store();
    let source = StubSource::models(vec![bert_base()]);
    let mut options = options();
    options.min_downloads = 100;
    options.max_downloads = 100;

    let err = harvest(&source, &store, &options).await.unwrap_err();
    assert!(matches!(err, PtmError::Config { .. }));
    assert_eq!(store.model_count().unwrap(), 0);
}

#[tokio::test]
async fn test_export_dir_receives_tables() {
    let (dir, store) = test_store();
    let export_dir = dir.path().join("exports");
    let source = StubSource::models(vec![bert_base(), by_author("jane/a", "Jane Doe")]);
    let mut options = options();
    options.export_dir = Some(export_dir.clone());

    let report = harvest(&source, &store, &options).await.unwrap();

    assert!(report.exported.contains(&export_dir.join("model.csv")));
    assert!(report.exported.contains(&export_dir.join("model.json")));
    let tags = std::fs::read_to_string(export_dir.join("model_to_tags.csv")).unwrap();
    assert!(tags.starts_with("context_id,tags\n"));
    assert!(tags.contains("bert-base,fill-mask"));

    let json: Value =
        serde_json::from_str(&std::fs::read_to_string(export_dir.join("model.json")).unwrap())
            .unwrap();
    assert_eq!(json.as_array().map(Vec::len), Some(2));
    assert_eq!(json[0]["context_id"], json!("bert-base"));
}

#[tokio::test]
async fn test_datasets_are_exported_but_not_loaded() {
    let (dir, store) = test_store();
    let source = StubSource {
        kind: RepoKind::Dataset,
        rows: vec![json!({
            "id": "squad",
            "tags": ["task_categories:question-answering", "qa"],
            "cardData": {"license": "cc-by-4.0", "language": ["en"]},
        })],
        side_tables: SideTables::new(),
        vocabulary_fails: false,
    };
    let mut options = options();
    options.datasets = true;
    options.export_dir = Some(dir.path().to_path_buf());

    let report = harvest(&source, &store, &options).await.unwrap();

    assert_eq!(report.mapped, 1);
    assert!(report.load.is_none());
    assert!(dir.path().join("dataset.csv").exists());
    assert_eq!(store.model_count().unwrap(), 0);
}
