//! Tag and entity normalization.
//!
//! Free-text tags are filtered against a hub's controlled vocabulary so that
//! namespaced tags (`arxiv:…`, `license:…`) and values that already have
//! their own lookup table (libraries, languages, licenses, datasets) do not
//! leak into the `tag` table. Entity values (authors, licenses, frameworks…)
//! are deduplicated by exact name, which is also how the store reconciles
//! the same value arriving from different hubs.

use crate::config::HubConfig;
use std::collections::{BTreeSet, HashSet};

/// One namespace of a hub's controlled tag vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VocabularyNamespace {
    Dataset,
    Language,
    Library,
    License,
}

impl VocabularyNamespace {
    pub const ALL: [VocabularyNamespace; 4] = [
        VocabularyNamespace::Dataset,
        VocabularyNamespace::Language,
        VocabularyNamespace::Library,
        VocabularyNamespace::License,
    ];

    /// Key used by the HuggingFace `models-tags-by-type` endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            VocabularyNamespace::Dataset => "dataset",
            VocabularyNamespace::Language => "language",
            VocabularyNamespace::Library => "library",
            VocabularyNamespace::License => "license",
        }
    }
}

/// Controlled vocabulary of a hub, immutable once built.
///
/// Built once per run and passed explicitly to whatever needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagVocabulary {
    dataset: HashSet<String>,
    language: HashSet<String>,
    library: HashSet<String>,
    license: HashSet<String>,
}

impl TagVocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add entries to one namespace.
    pub fn with<I, S>(mut self, namespace: VocabularyNamespace, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespace_mut(namespace)
            .extend(entries.into_iter().map(Into::into));
        self
    }

    fn namespace_mut(&mut self, namespace: VocabularyNamespace) -> &mut HashSet<String> {
        match namespace {
            VocabularyNamespace::Dataset => &mut self.dataset,
            VocabularyNamespace::Language => &mut self.language,
            VocabularyNamespace::Library => &mut self.library,
            VocabularyNamespace::License => &mut self.license,
        }
    }

    pub fn namespace(&self, namespace: VocabularyNamespace) -> &HashSet<String> {
        match namespace {
            VocabularyNamespace::Dataset => &self.dataset,
            VocabularyNamespace::Language => &self.language,
            VocabularyNamespace::Library => &self.library,
            VocabularyNamespace::License => &self.license,
        }
    }

    /// A copy keeping only the given namespaces.
    pub fn restricted_to(&self, namespaces: &[VocabularyNamespace]) -> Self {
        let mut restricted = Self::new();
        for ns in namespaces {
            restricted
                .namespace_mut(*ns)
                .extend(self.namespace(*ns).iter().cloned());
        }
        restricted
    }

    /// Whether `tag` is exactly an entry of any namespace.
    pub fn contains(&self, tag: &str) -> bool {
        VocabularyNamespace::ALL
            .iter()
            .any(|ns| self.namespace(*ns).contains(tag))
    }

    pub fn len(&self) -> usize {
        VocabularyNamespace::ALL
            .iter()
            .map(|ns| self.namespace(*ns).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn keep_tag(tag: &str, vocabulary: &TagVocabulary) -> bool {
    !tag.is_empty() && !tag.contains(HubConfig::NAMESPACE_DELIMITER) && !vocabulary.contains(tag)
}

/// Normalize a list of free-text tags into a set.
///
/// Drops empty tags, tags containing the namespace delimiter and tags equal
/// to a vocabulary entry, then unions in the supplementary tags (e.g. the
/// pipeline classification). Supplementary tags pass the same filter, so
/// normalizing an already normalized set is a no-op.
pub fn normalize_tags<I, J, S, T>(
    tags: I,
    vocabulary: &TagVocabulary,
    supplementary: J,
) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    J: IntoIterator<Item = T>,
    S: AsRef<str>,
    T: AsRef<str>,
{
    tags.into_iter()
        .filter(|t| keep_tag(t.as_ref(), vocabulary))
        .map(|t| t.as_ref().to_string())
        .chain(
            supplementary
                .into_iter()
                .filter(|t| keep_tag(t.as_ref(), vocabulary))
                .map(|t| t.as_ref().to_string()),
        )
        .collect()
}

/// arXiv abstract URLs for every `arxiv:` tag, in tag order, deduplicated.
pub fn paper_urls<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let urls = tags
        .into_iter()
        .filter(|t| t.as_ref().contains(HubConfig::ARXIV_TAG_PREFIX))
        .map(|t| {
            format!(
                "{}{}",
                HubConfig::ARXIV_ABS_BASE,
                t.as_ref().replace(HubConfig::ARXIV_TAG_PREFIX, "")
            )
        })
        .collect();
    dedupe_values(urls)
}

/// Trim, drop empties and deduplicate entity values keeping the first spelling.
///
/// Comparison is case-sensitive: `PyTorch` and `pytorch` are distinct names.
pub fn dedupe_values(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(values.len());
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.clone()))
        .collect()
}

/// Split a bracketed, comma separated list such as `[vision, scriptable]`.
///
/// Typographic and ASCII double quotes are stripped from each item.
pub fn parse_bracket_list(text: &str) -> Vec<String> {
    let items = text
        .replace(['[', ']'], "")
        .split(',')
        .map(|item| {
            item.trim()
                .replace(['\u{201c}', '\u{201d}', '"', '\''], "")
                .trim()
                .to_string()
        })
        .collect();
    dedupe_values(items)
}
