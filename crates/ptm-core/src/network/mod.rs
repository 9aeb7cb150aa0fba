//! Network access for the hub adapters.
//!
//! - [`HttpClient`]: authenticated, rate-limit aware REST client
//! - [`GitHubGraphQl`]: GitHub GraphQL queries (file corpus, licenses)

mod client;
mod github;

pub use client::{next_link, HttpClient, RateLimitState};
pub use github::{split_repo_id, GitHubGraphQl, RepoFile};
