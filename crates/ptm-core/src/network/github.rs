//! GitHub GraphQL API client.
//!
//! Used to list the markdown corpus of a repository and to resolve
//! repository license keys.

use super::client::HttpClient;
use crate::config::HubConfig;
use crate::{PtmError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const FILE_QUERY: &str = r#"
query ($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    object(expression: "HEAD:") {
      ... on Tree {
        entries {
          name
          object {
            ... on Blob {
              byteSize
              text
            }
          }
        }
      }
    }
  }
}
"#;

const LICENSE_QUERY: &str = r#"
query ($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    licenseInfo {
      key
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryData<T> {
    repository: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TreeRepository {
    object: Option<Tree>,
}

#[derive(Debug, Deserialize)]
struct Tree {
    #[serde(default)]
    entries: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    name: String,
    object: Option<BlobObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobObject {
    byte_size: Option<u64>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LicenseRepository {
    license_info: Option<LicenseInfo>,
}

#[derive(Debug, Deserialize)]
struct LicenseInfo {
    key: Option<String>,
}

/// A text file at the root of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFile {
    pub name: String,
    pub text: String,
    pub size: u64,
}

/// Split `owner/name` into its parts.
pub fn split_repo_id(repo_id: &str) -> Option<(&str, &str)> {
    let (owner, name) = repo_id.trim().split_once('/')?;
    let name = name.trim_end_matches('/');
    (!owner.is_empty() && !name.is_empty() && !name.contains('/')).then_some((owner, name))
}

/// Client for the GitHub GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct GitHubGraphQl {
    http: Arc<HttpClient>,
    endpoint: String,
}

impl GitHubGraphQl {
    pub fn new(token: Option<String>) -> Result<Self> {
        let http = HttpClient::new(token)?;
        if !http.has_token() {
            return Err(PtmError::Config {
                message: "the GitHub GraphQL API requires GITHUB_TOKEN".to_string(),
            });
        }
        Ok(Self {
            http: Arc::new(http),
            endpoint: HubConfig::GITHUB_GRAPHQL_URL.to_string(),
        })
    }

    async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let body = json!({ "query": query, "variables": variables });
        let response: GraphQlResponse<T> = self.http.post_json(&self.endpoint, &body).await?;

        if !response.errors.is_empty() {
            let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(PtmError::GraphQl {
                message: messages.join("; "),
            });
        }
        response.data.ok_or_else(|| PtmError::GraphQl {
            message: "response carried no data".to_string(),
        })
    }

    /// Root-level files of a repository whose names contain `.md`.
    pub async fn markdown_files(&self, owner: &str, name: &str) -> Result<Vec<RepoFile>> {
        let data: RepositoryData<TreeRepository> = self
            .query(FILE_QUERY, json!({ "owner": owner, "name": name }))
            .await?;

        let entries = data
            .repository
            .and_then(|r| r.object)
            .map(|t| t.entries)
            .ok_or_else(|| PtmError::GraphQl {
                message: format!("repository {}/{} has no readable tree", owner, name),
            })?;

        let files: Vec<RepoFile> = entries
            .into_iter()
            .filter(|e| e.name.contains(".md"))
            .filter_map(|e| {
                let blob = e.object?;
                Some(RepoFile {
                    name: e.name,
                    text: blob.text?,
                    size: blob.byte_size.unwrap_or(0),
                })
            })
            .collect();

        debug!("Listed {} markdown files in {}/{}", files.len(), owner, name);
        Ok(files)
    }

    /// License key (`mit`, `bsd-3-clause`, ...) of a repository, if detected.
    pub async fn license_key(&self, owner: &str, name: &str) -> Result<Option<String>> {
        let data: RepositoryData<LicenseRepository> = self
            .query(LICENSE_QUERY, json!({ "owner": owner, "name": name }))
            .await?;
        Ok(data
            .repository
            .and_then(|r| r.license_info)
            .and_then(|l| l.key))
    }
}
