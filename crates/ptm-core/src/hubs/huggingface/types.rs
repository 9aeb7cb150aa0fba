//! HuggingFace API response types and their canonical conversions.

use crate::config::HubConfig;
use crate::normalize::{TagVocabulary, VocabularyNamespace};
use crate::record::{string_list, Discussion, DiscussionEvent};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Repository kind, as used in API paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoKind {
    Model,
    Dataset,
}

impl RepoKind {
    /// Path segment under `/api`.
    pub fn api_segment(&self) -> &'static str {
        match self {
            RepoKind::Model => "models",
            RepoKind::Dataset => "datasets",
        }
    }

    /// `repo_type` recorded on discussions.
    pub fn repo_type(&self) -> &'static str {
        match self {
            RepoKind::Model => "model",
            RepoKind::Dataset => "dataset",
        }
    }
}

/// One entry of `/api/models-tags-by-type`.
#[derive(Debug, Clone, Deserialize)]
pub struct HfTagEntry {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Body of `/api/models-tags-by-type`, keyed by tag type.
pub type HfTagsByType = HashMap<String, Vec<HfTagEntry>>;

/// Build the controlled vocabulary from the tags-by-type listing.
///
/// Only the dataset, language, library and license namespaces are kept.
pub fn vocabulary_from_tags(tags: &HfTagsByType) -> TagVocabulary {
    VocabularyNamespace::ALL
        .into_iter()
        .fold(TagVocabulary::new(), |vocabulary, namespace| {
            let entries = tags
                .get(namespace.as_str())
                .map(|entries| entries.iter().map(|e| e.id.clone()).collect::<Vec<_>>())
                .unwrap_or_default();
            vocabulary.with(namespace, entries)
        })
}

#[derive(Debug, Clone, Deserialize)]
pub struct HfUser {
    #[serde(default)]
    pub name: Option<String>,
}

/// One page of `/api/{kind}/{id}/discussions`.
#[derive(Debug, Clone, Deserialize)]
pub struct HfDiscussionPage {
    #[serde(default)]
    pub discussions: Vec<HfDiscussionSummary>,
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HfDiscussionSummary {
    pub num: i64,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HfChanges {
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub merge_commit_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HfEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub author: Option<HfUser>,
    #[serde(default)]
    pub data: Value,
}

/// Body of `/api/{kind}/{id}/discussions/{num}?diff=1`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HfDiscussionDetails {
    pub num: i64,
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub author: Option<HfUser>,
    #[serde(default)]
    pub is_pull_request: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub events: Vec<HfEvent>,
    /// A list of paths, or `true` when the conflict set was not computed.
    #[serde(default)]
    pub conflicting_files: Value,
    #[serde(default)]
    pub changes: Option<HfChanges>,
    #[serde(default)]
    pub diff: Option<String>,
}

fn data_str(data: &Value, pointer: &str) -> Option<String> {
    data.pointer(pointer).and_then(Value::as_str).map(str::to_string)
}

impl HfEvent {
    pub fn into_canonical(self) -> DiscussionEvent {
        let data = &self.data;
        let mut event = DiscussionEvent {
            event_id: self.id.clone(),
            event_type: self.event_type.clone(),
            created_at: self.created_at.clone(),
            author: self.author.as_ref().and_then(|a| a.name.clone()),
            content: None,
            edited: None,
            hidden: None,
            new_status: None,
            summary: None,
            oid: None,
            old_title: None,
            new_title: None,
        };

        match self.event_type.as_str() {
            "comment" => {
                event.content = data_str(data, "/latest/raw");
                event.edited = data
                    .get("edited")
                    .and_then(Value::as_bool)
                    .or_else(|| data.get("numEdits").and_then(Value::as_u64).map(|n| n > 0));
                event.hidden = data.get("hidden").and_then(Value::as_bool);
            }
            "status-change" => event.new_status = data_str(data, "/status"),
            "commit" => {
                event.summary = data_str(data, "/subject");
                event.oid = data_str(data, "/oid");
            }
            "title-change" => {
                event.old_title = data_str(data, "/from");
                event.new_title = data_str(data, "/to");
            }
            _ => {}
        }
        event
    }
}

impl HfDiscussionDetails {
    pub fn into_canonical(self, repo_id: &str, kind: RepoKind) -> Discussion {
        let (target_branch, merge_commit_oid) = match self.changes {
            Some(changes) => (changes.base, changes.merge_commit_id),
            None => (None, None),
        };
        let conflicting_files = match &self.conflicting_files {
            Value::Array(_) => string_list(&self.conflicting_files),
            _ => Vec::new(),
        };

        Discussion {
            title: self.title,
            status: self.status,
            num: self.num,
            repo_id: Some(repo_id.to_string()),
            repo_type: Some(kind.repo_type().to_string()),
            author: self.author.and_then(|a| a.name),
            is_pull_request: Some(self.is_pull_request),
            created_at: self.created_at,
            endpoint: Some(HubConfig::HF_HUB_BASE.to_string()),
            events: self
                .events
                .into_iter()
                .map(HfEvent::into_canonical)
                .collect(),
            conflicting_files,
            target_branch,
            merge_commit_oid,
            diff: self.diff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vocabulary_from_tags() {
        let tags: HfTagsByType = serde_json::from_value(json!({
            "library": [{"id": "pytorch", "label": "PyTorch", "type": "library"}],
            "license": [{"id": "mit", "label": "mit"}],
            "pipeline_tag": [{"id": "fill-mask"}],
        }))
        .unwrap();
        let vocabulary = vocabulary_from_tags(&tags);
        assert!(vocabulary.contains("pytorch"));
        assert!(vocabulary.contains("mit"));
        assert!(!vocabulary.contains("fill-mask"));
        assert!(!vocabulary.contains("PyTorch"));
    }

    #[test]
    fn test_discussion_details_conversion() {
        let details: HfDiscussionDetails = serde_json::from_value(json!({
            "num": 12,
            "title": "Add safetensors weights",
            "status": "merged",
            "author": {"name": "bot", "type": "user"},
            "isPullRequest": true,
            "createdAt": "2023-04-01T10:00:00.000Z",
            "events": [
                {"id": "e1", "type": "comment", "createdAt": "2023-04-01T10:00:00.000Z",
                 "author": {"name": "bot"},
                 "data": {"edited": false, "hidden": false, "latest": {"raw": "Converted."}}},
                {"id": "e2", "type": "commit", "data": {"subject": "Upload", "oid": "abc123"}},
                {"id": "e3", "type": "status-change", "data": {"status": "merged"}},
                {"id": "e4", "type": "title-change", "data": {"from": "old", "to": "new"}}
            ],
            "conflictingFiles": ["model.safetensors"],
            "changes": {"base": "refs/heads/main", "mergeCommitId": "def456"},
            "diff": "diff --git a b"
        }))
        .unwrap();

        let discussion = details.into_canonical("bert-base-uncased", RepoKind::Model);
        assert_eq!(discussion.num, 12);
        assert_eq!(discussion.author.as_deref(), Some("bot"));
        assert_eq!(discussion.repo_type.as_deref(), Some("model"));
        assert_eq!(discussion.target_branch.as_deref(), Some("refs/heads/main"));
        assert_eq!(discussion.merge_commit_oid.as_deref(), Some("def456"));
        assert_eq!(discussion.conflicting_files, vec!["model.safetensors"]);
        assert_eq!(discussion.events.len(), 4);
        assert_eq!(discussion.events[0].content.as_deref(), Some("Converted."));
        assert_eq!(discussion.events[0].edited, Some(false));
        assert_eq!(discussion.events[1].oid.as_deref(), Some("abc123"));
        assert_eq!(discussion.events[2].new_status.as_deref(), Some("merged"));
        assert_eq!(discussion.events[3].new_title.as_deref(), Some("new"));
    }

    #[test]
    fn test_conflicting_files_flag_is_empty() {
        let details: HfDiscussionDetails = serde_json::from_value(json!({
            "num": 1,
            "title": "Question",
            "conflictingFiles": true,
        }))
        .unwrap();
        let discussion = details.into_canonical("gpt2", RepoKind::Model);
        assert!(discussion.conflicting_files.is_empty());
        assert!(discussion.events.is_empty());
        assert_eq!(discussion.is_pull_request, Some(false));
    }
}
