//! Centralized configuration for the harvester.
//!
//! Compile-time constants for hub endpoints, network behavior and batch
//! loading, plus the [`ModelHub`] identifier used across the pipeline.

use crate::{PtmError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Hub endpoints and hub-level conventions.
pub struct HubConfig;

impl HubConfig {
    pub const HF_API_BASE: &'static str = "https://huggingface.co/api";
    pub const HF_HUB_BASE: &'static str = "https://huggingface.co";
    pub const HF_MODELS_URL: &'static str = "https://huggingface.co/models";
    pub const GITHUB_GRAPHQL_URL: &'static str = "https://api.github.com/graphql";
    pub const PYTORCH_HUB_OWNER: &'static str = "pytorch";
    pub const PYTORCH_HUB_REPO: &'static str = "hub";
    pub const PYTORCH_HUB_URL: &'static str = "https://github.com/pytorch/hub";
    pub const GITHUB_URL: &'static str = "https://github.com";
    pub const ARXIV_ABS_BASE: &'static str = "https://arxiv.org/abs/";
    /// Separator between a tag namespace and its value (`arxiv:1810.04805`).
    pub const NAMESPACE_DELIMITER: char = ':';
    pub const ARXIV_TAG_PREFIX: &'static str = "arxiv:";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const USER_AGENT: &'static str = "ptm-harvester/0.3";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Page size for hub listings when no explicit limit is requested.
    pub const DEFAULT_PAGE_LIMIT: usize = 1000;
}

/// Batch loading and harvest configuration.
pub struct HarvestConfig;

impl HarvestConfig {
    /// Log a progress line every this many rows.
    pub const PROGRESS_INTERVAL: usize = 500;
    pub const DEFAULT_MIN_DOWNLOADS: u64 = 1;
    pub const DEFAULT_MAX_DOWNLOADS: u64 = 1_000_000_000;
    /// Snapshot value recorded for rows outside the download range.
    pub const OUT_OF_RANGE: &'static str = "Out of download range";
    pub const DB_FILE_NAME: &'static str = "ptm.db";
}

/// The external registries the harvester knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelHub {
    HuggingFace,
    PyTorch,
    GitHub,
}

impl ModelHub {
    /// Name stored in the `model.model_hub` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelHub::HuggingFace => "HuggingFace",
            ModelHub::PyTorch => "PyTorch",
            ModelHub::GitHub => "GitHub",
        }
    }

    /// Landing page of the hub.
    pub fn hub_url(&self) -> &'static str {
        match self {
            ModelHub::HuggingFace => HubConfig::HF_MODELS_URL,
            ModelHub::PyTorch => HubConfig::PYTORCH_HUB_URL,
            ModelHub::GitHub => HubConfig::GITHUB_URL,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "huggingface" | "hf" => Some(ModelHub::HuggingFace),
            "pytorch" | "torchhub" => Some(ModelHub::PyTorch),
            "github" => Some(ModelHub::GitHub),
            _ => None,
        }
    }

    /// Parse a hub name, failing with a structural error.
    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s).ok_or_else(|| PtmError::UnknownHub(s.to_string()))
    }
}

impl std::fmt::Display for ModelHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime options of one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub hub: ModelHub,
    /// Maximum number of rows to extract, `None` for the whole listing.
    pub limit: Option<usize>,
    /// Inclusive lower bound of the download range that gets side tables.
    pub min_downloads: u64,
    /// Exclusive upper bound of the download range that gets side tables.
    pub max_downloads: u64,
    pub fetch_commits: bool,
    pub fetch_discussions: bool,
    pub fetch_snapshot: bool,
    /// Harvest HuggingFace datasets instead of models.
    pub datasets: bool,
    /// Directory receiving tabular exports of the mapped batch.
    pub export_dir: Option<PathBuf>,
}

impl HarvestOptions {
    pub fn new(hub: ModelHub) -> Self {
        Self {
            hub,
            limit: Some(NetworkConfig::DEFAULT_PAGE_LIMIT),
            min_downloads: HarvestConfig::DEFAULT_MIN_DOWNLOADS,
            max_downloads: HarvestConfig::DEFAULT_MAX_DOWNLOADS,
            fetch_commits: true,
            fetch_discussions: true,
            fetch_snapshot: true,
            datasets: false,
            export_dir: None,
        }
    }

    /// Whether a row with this many downloads gets per-id side tables.
    pub fn in_download_range(&self, downloads: u64) -> bool {
        downloads >= self.min_downloads && downloads < self.max_downloads
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_downloads >= self.max_downloads {
            return Err(PtmError::Config {
                message: format!(
                    "empty download range [{}, {})",
                    self.min_downloads, self.max_downloads
                ),
            });
        }
        if self.datasets && self.hub != ModelHub::HuggingFace {
            return Err(PtmError::Config {
                message: format!("{} has no dataset listing", self.hub),
            });
        }
        Ok(())
    }
}
