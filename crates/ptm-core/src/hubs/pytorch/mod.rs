//! PyTorch Hub adapter.
//!
//! PyTorch Hub has no metadata API: its model pages are markdown files at
//! the root of the `pytorch/hub` repository. They are listed through the
//! GitHub GraphQL API and their front matter becomes the raw row. Licenses
//! are resolved per source repository (`github-id`).

pub mod front_matter;
pub mod mapping;

use super::HubSource;
use crate::config::{HarvestConfig, HarvestOptions, HubConfig, ModelHub};
use crate::mapping::{FieldMapping, SideTable, SideTables};
use crate::network::{split_repo_id, GitHubGraphQl};
use crate::record::{str_field, RawRecord};
use crate::validate::Constraint;
use crate::Result;
use async_trait::async_trait;
use front_matter::{is_model_page, parse_front_matter};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Source adapter for PyTorch Hub.
#[derive(Debug)]
pub struct PyTorchSource {
    github: GitHubGraphQl,
    owner: String,
    repo: String,
}

impl PyTorchSource {
    /// Requires a GitHub token; GraphQL has no anonymous access.
    pub fn new(github_token: Option<String>) -> Result<Self> {
        Ok(Self {
            github: GitHubGraphQl::new(github_token)?,
            owner: HubConfig::PYTORCH_HUB_OWNER.to_string(),
            repo: HubConfig::PYTORCH_HUB_REPO.to_string(),
        })
    }
}

#[async_trait]
impl HubSource for PyTorchSource {
    fn hub(&self) -> ModelHub {
        ModelHub::PyTorch
    }

    fn id_field(&self) -> &'static str {
        mapping::ID_FIELD
    }

    async fn extract(&self, limit: Option<usize>) -> Result<Vec<RawRecord>> {
        let files = self.github.markdown_files(&self.owner, &self.repo).await?;

        let mut rows = Vec::new();
        for file in files.iter().filter(|f| is_model_page(&f.name)) {
            match parse_front_matter(&file.text) {
                Some(row) => {
                    debug!("Parsed {} ({} bytes)", file.name, file.size);
                    rows.push(row);
                }
                None => warn!("No front matter in {}, skipping", file.name),
            }
            if limit.is_some_and(|limit| rows.len() >= limit) {
                break;
            }
        }

        info!("Extracted {} models from PyTorch Hub", rows.len());
        Ok(rows)
    }

    fn constraints(&self) -> Vec<Constraint> {
        mapping::model_constraints()
    }

    /// Licenses per model page, resolved once per source repository.
    async fn side_tables(&self, rows: &[RawRecord], _options: &HarvestOptions) -> SideTables {
        let mut tables = SideTables::new();
        let mut resolved: HashMap<String, Option<String>> = HashMap::new();

        for (index, row) in rows.iter().enumerate() {
            let (Some(title), Some(github_id)) =
                (str_field(row, mapping::ID_FIELD), str_field(row, "github-id"))
            else {
                continue;
            };

            if !resolved.contains_key(github_id) {
                let license = match split_repo_id(github_id) {
                    Some((owner, name)) => match self.github.license_key(owner, name).await {
                        Ok(key) => key,
                        Err(e) => {
                            warn!("Failed to fetch license for {}: {}", title, e);
                            None
                        }
                    },
                    None => {
                        warn!("Malformed github-id '{}' on {}", github_id, title);
                        None
                    }
                };
                resolved.insert(github_id.to_string(), license);
            }

            if let Some(Some(key)) = resolved.get(github_id) {
                tables.insert(SideTable::License, title, Value::String(key.clone()));
            }

            if (index + 1) % HarvestConfig::PROGRESS_INTERVAL == 0 {
                info!("Resolved licenses for {}/{} rows", index + 1, rows.len());
            }
        }

        debug!(
            "Resolved {} licenses across {} repositories",
            tables.len(SideTable::License),
            resolved.len()
        );
        tables
    }

    fn mapping(&self) -> FieldMapping {
        mapping::model_mapping()
    }
}
