//! HuggingFace Hub adapter.
//!
//! # Module Organization
//!
//! - [`types`] - API response structs and their canonical conversions
//! - [`mapping`] - Row flattening, extraction checks and field mappings

pub mod mapping;
pub mod types;

pub use types::RepoKind;

use super::{download_count, row_id, HubSource};
use crate::config::{HarvestConfig, HarvestOptions, HubConfig, ModelHub, NetworkConfig};
use crate::mapping::{FieldMapping, SideTable, SideTables};
use crate::network::HttpClient;
use crate::normalize::TagVocabulary;
use crate::record::{Discussion, RawRecord};
use crate::validate::Constraint;
use crate::{PtmError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use types::{vocabulary_from_tags, HfDiscussionDetails, HfDiscussionPage, HfTagsByType};

/// Percent-encode each segment of a repo id, keeping the `/` separators.
fn encode_repo_id(repo_id: &str) -> String {
    repo_id
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Source adapter for HuggingFace models or datasets.
#[derive(Debug)]
pub struct HuggingFaceSource {
    http: HttpClient,
    kind: RepoKind,
    api_base: String,
}

impl HuggingFaceSource {
    /// Adapter listing models.
    pub fn models(token: Option<String>) -> Result<Self> {
        Self::new(RepoKind::Model, token)
    }

    /// Adapter listing datasets.
    pub fn datasets(token: Option<String>) -> Result<Self> {
        Self::new(RepoKind::Dataset, token)
    }

    fn new(kind: RepoKind, token: Option<String>) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(token)?,
            kind,
            api_base: HubConfig::HF_API_BASE.to_string(),
        })
    }

    fn repo_url(&self, repo_id: &str, suffix: &str) -> String {
        format!(
            "{}/{}/{}{}",
            self.api_base,
            self.kind.api_segment(),
            encode_repo_id(repo_id),
            suffix
        )
    }

    /// Listing URL sorted by downloads, most downloaded first.
    fn listing_url(&self, page_size: usize) -> String {
        let extra = match self.kind {
            RepoKind::Model => "&cardData=true&config=true",
            RepoKind::Dataset => "",
        };
        format!(
            "{}/{}?limit={}&full=true&sort=downloads&direction=-1{}",
            self.api_base,
            self.kind.api_segment(),
            page_size,
            extra
        )
    }

    /// List repositories, most downloaded first.
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<RawRecord>> {
        let page_size = limit
            .unwrap_or(NetworkConfig::DEFAULT_PAGE_LIMIT)
            .clamp(1, NetworkConfig::DEFAULT_PAGE_LIMIT);
        let items = self.http.get_paged(&self.listing_url(page_size), limit).await?;

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Object(mut row) => {
                    mapping::prepare_row(&mut row, self.kind);
                    rows.push(row);
                }
                other => warn!("Skipping non-object listing entry: {}", other),
            }
        }
        Ok(rows)
    }

    /// Controlled vocabulary from `/api/models-tags-by-type`.
    pub async fn tags_by_type(&self) -> Result<TagVocabulary> {
        let url = format!("{}/models-tags-by-type", self.api_base);
        let tags: HfTagsByType = self.http.get_json(&url).await?;
        Ok(vocabulary_from_tags(&tags))
    }

    /// Commit history and git refs of a repository.
    pub async fn commit_info(&self, repo_id: &str) -> Result<Value> {
        let commits: Value = self.http.get_json(&self.repo_url(repo_id, "/commits/main")).await?;
        let gitrefs: Value = self.http.get_json(&self.repo_url(repo_id, "/refs")).await?;
        Ok(json!({ "commits": commits, "gitrefs": gitrefs }))
    }

    /// Recursive file listing of the default branch.
    pub async fn snapshot(&self, repo_id: &str) -> Result<Value> {
        let url = self.repo_url(repo_id, "/tree/main?recursive=true");
        let entries = self.http.get_paged(&url, None).await?;
        Ok(Value::Array(entries))
    }

    /// Every discussion of a repository with its events.
    pub async fn discussions(&self, repo_id: &str) -> Result<Vec<Discussion>> {
        let mut numbers = Vec::new();
        for page in 0.. {
            let url = self.repo_url(repo_id, &format!("/discussions?p={}", page));
            let listing: HfDiscussionPage = self.http.get_json(&url).await?;
            if listing.discussions.is_empty() {
                break;
            }
            numbers.extend(listing.discussions.iter().map(|d| d.num));
            if listing.count.is_some_and(|count| numbers.len() >= count) {
                break;
            }
        }

        let mut discussions = Vec::with_capacity(numbers.len());
        for num in numbers {
            let url = self.repo_url(repo_id, &format!("/discussions/{}?diff=1", num));
            let details: HfDiscussionDetails = self.http.get_json(&url).await?;
            discussions.push(details.into_canonical(repo_id, self.kind));
        }
        debug!("Fetched {} discussions for {}", discussions.len(), repo_id);
        Ok(discussions)
    }
}

/// Record a fetched side-table value, or log the failure and leave it absent.
fn record_fetch(
    tables: &mut SideTables,
    table: SideTable,
    repo_id: &str,
    fetched: Result<Value>,
) {
    match fetched {
        Ok(value) => tables.insert(table, repo_id, value),
        Err(e) if e.is_transient() => {
            warn!("Failed to fetch {:?} for {}: {}", table, repo_id, e)
        }
        Err(e) => warn!("Unreadable {:?} response for {}: {}", table, repo_id, e),
    }
}

#[async_trait]
impl HubSource for HuggingFaceSource {
    fn hub(&self) -> ModelHub {
        ModelHub::HuggingFace
    }

    fn id_field(&self) -> &'static str {
        mapping::id_fields(self.kind)[0]
    }

    fn loads_models(&self) -> bool {
        self.kind == RepoKind::Model
    }

    async fn extract(&self, limit: Option<usize>) -> Result<Vec<RawRecord>> {
        let rows = self.list(limit).await?;
        info!(
            "Found {} {} on HuggingFace API",
            rows.len(),
            self.kind.api_segment()
        );
        Ok(rows)
    }

    fn constraints(&self) -> Vec<Constraint> {
        match self.kind {
            RepoKind::Model => mapping::model_constraints(),
            RepoKind::Dataset => mapping::dataset_constraints(),
        }
    }

    async fn vocabulary(&self) -> Result<TagVocabulary> {
        self.tags_by_type().await
    }

    async fn side_tables(&self, rows: &[RawRecord], options: &HarvestOptions) -> SideTables {
        let mut tables = SideTables::new();

        for (index, row) in rows.iter().enumerate() {
            let Some(repo_id) = row_id(row, mapping::id_fields(self.kind)) else {
                continue;
            };

            if !options.in_download_range(download_count(row)) {
                tables.insert(
                    SideTable::Snapshot,
                    repo_id.as_str(),
                    json!(HarvestConfig::OUT_OF_RANGE),
                );
                continue;
            }

            if options.fetch_snapshot {
                let fetched = self.snapshot(&repo_id).await;
                record_fetch(&mut tables, SideTable::Snapshot, &repo_id, fetched);
            }
            if options.fetch_commits {
                let fetched = self.commit_info(&repo_id).await;
                record_fetch(&mut tables, SideTable::Commits, &repo_id, fetched);
            }
            if options.fetch_discussions && self.kind == RepoKind::Model {
                let fetched = self
                    .discussions(&repo_id)
                    .await
                    .and_then(|d| serde_json::to_value(d).map_err(PtmError::from));
                record_fetch(&mut tables, SideTable::Discussions, &repo_id, fetched);
            }

            if (index + 1) % HarvestConfig::PROGRESS_INTERVAL == 0 {
                info!("Fetched side tables for {}/{} rows", index + 1, rows.len());
            }
        }

        tables
    }

    fn mapping(&self) -> FieldMapping {
        match self.kind {
            RepoKind::Model => mapping::model_mapping(),
            RepoKind::Dataset => mapping::dataset_mapping(),
        }
    }
}
