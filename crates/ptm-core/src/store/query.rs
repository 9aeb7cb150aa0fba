//! Query layer: denormalized reads and store maintenance.

use super::tables::LookupTable;
use super::MetadataStore;
use crate::config::ModelHub;
use crate::record::{Discussion, DiscussionEvent};
use crate::{PtmError, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// One row of the cartesian expansion of a model across its associations.
///
/// Association columns are `None` when the model has no value for that
/// lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfoRow {
    pub id: i64,
    pub context_id: String,
    pub model_hub: String,
    pub sha: Option<String>,
    pub repo_url: Option<String>,
    pub downloads: Option<i64>,
    pub likes: Option<i64>,
    pub architecture: Option<String>,
    pub author: Option<String>,
    pub framework: Option<String>,
    pub language: Option<String>,
    pub library: Option<String>,
    pub license: Option<String>,
    pub paper: Option<String>,
    pub tag: Option<String>,
}

impl ModelInfoRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            context_id: row.get(1)?,
            model_hub: row.get(2)?,
            sha: row.get(3)?,
            repo_url: row.get(4)?,
            downloads: row.get(5)?,
            likes: row.get(6)?,
            architecture: row.get(7)?,
            author: row.get(8)?,
            framework: row.get(9)?,
            language: row.get(10)?,
            library: row.get(11)?,
            license: row.get(12)?,
            paper: row.get(13)?,
            tag: row.get(14)?,
        })
    }

    /// Association value for one lookup table.
    pub fn association(&self, table: LookupTable) -> Option<&str> {
        match table {
            LookupTable::Architecture => self.architecture.as_deref(),
            LookupTable::Author => self.author.as_deref(),
            LookupTable::Framework => self.framework.as_deref(),
            LookupTable::Language => self.language.as_deref(),
            LookupTable::Library => self.library.as_deref(),
            LookupTable::License => self.license.as_deref(),
            LookupTable::Paper => self.paper.as_deref(),
            LookupTable::Tag => self.tag.as_deref(),
        }
    }
}

/// Model columns followed by one `LEFT JOIN` pair per lookup table, in
/// [`LookupTable::ALL`] order.
static FETCH_MODEL_SQL: LazyLock<String> = LazyLock::new(|| {
    let mut columns = vec![
        "m.id".to_string(),
        "m.context_id".to_string(),
        "m.model_hub".to_string(),
        "m.sha".to_string(),
        "m.repo_url".to_string(),
        "m.downloads".to_string(),
        "m.likes".to_string(),
    ];
    let mut joins = String::new();
    for table in LookupTable::ALL {
        let name = table.table_name();
        columns.push(format!("{name}.name"));
        joins.push_str(&format!(
            "\nLEFT JOIN {join} ON {join}.model_id = m.id\
             \nLEFT JOIN {name} ON {name}.id = {join}.{column}",
            join = table.join_table(),
            column = table.join_column(),
        ));
    }
    format!(
        "SELECT {}\nFROM model m{}\nWHERE m.id = ?1",
        columns.join(", "),
        joins
    )
});

/// A model with its associations re-aggregated into sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelView {
    pub id: i64,
    pub context_id: String,
    pub model_hub: String,
    pub sha: Option<String>,
    pub repo_url: Option<String>,
    pub downloads: Option<i64>,
    pub likes: Option<i64>,
    pub architectures: BTreeSet<String>,
    pub authors: BTreeSet<String>,
    pub frameworks: BTreeSet<String>,
    pub languages: BTreeSet<String>,
    pub libraries: BTreeSet<String>,
    pub licenses: BTreeSet<String>,
    pub papers: BTreeSet<String>,
    pub tags: BTreeSet<String>,
}

impl ModelView {
    /// Collapse the cartesian rows of one model. `None` when `rows` is empty.
    pub fn from_rows(rows: &[ModelInfoRow]) -> Option<Self> {
        let first = rows.first()?;
        let mut view = Self {
            id: first.id,
            context_id: first.context_id.clone(),
            model_hub: first.model_hub.clone(),
            sha: first.sha.clone(),
            repo_url: first.repo_url.clone(),
            downloads: first.downloads,
            likes: first.likes,
            ..Default::default()
        };

        for row in rows {
            for table in LookupTable::ALL {
                if let Some(value) = row.association(table) {
                    view.values_mut(table).insert(value.to_string());
                }
            }
        }
        Some(view)
    }

    fn values_mut(&mut self, table: LookupTable) -> &mut BTreeSet<String> {
        match table {
            LookupTable::Architecture => &mut self.architectures,
            LookupTable::Author => &mut self.authors,
            LookupTable::Framework => &mut self.frameworks,
            LookupTable::Language => &mut self.languages,
            LookupTable::Library => &mut self.libraries,
            LookupTable::License => &mut self.licenses,
            LookupTable::Paper => &mut self.papers,
            LookupTable::Tag => &mut self.tags,
        }
    }

    pub fn values(&self, table: LookupTable) -> &BTreeSet<String> {
        match table {
            LookupTable::Architecture => &self.architectures,
            LookupTable::Author => &self.authors,
            LookupTable::Framework => &self.frameworks,
            LookupTable::Language => &self.languages,
            LookupTable::Library => &self.libraries,
            LookupTable::License => &self.licenses,
            LookupTable::Paper => &self.papers,
            LookupTable::Tag => &self.tags,
        }
    }
}

fn read_discussions(conn: &Connection, model_id: i64) -> Result<Vec<Discussion>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, title, status, num, repo_id, repo_type, author, is_pull_request,
                created_at, endpoint, target_branch, merge_commit_oid, diff
         FROM discussion WHERE model_id = ?1 ORDER BY id",
    )?;
    let heads = stmt
        .query_map(params![model_id], |row| {
            let id: i64 = row.get(0)?;
            Ok((
                id,
                Discussion {
                    title: row.get(1)?,
                    status: row.get(2)?,
                    num: row.get(3)?,
                    repo_id: row.get(4)?,
                    repo_type: row.get(5)?,
                    author: row.get(6)?,
                    is_pull_request: row.get(7)?,
                    created_at: row.get(8)?,
                    endpoint: row.get(9)?,
                    events: Vec::new(),
                    conflicting_files: Vec::new(),
                    target_branch: row.get(10)?,
                    merge_commit_oid: row.get(11)?,
                    diff: row.get(12)?,
                },
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut events = conn.prepare_cached(
        "SELECT event_id, type, created_at, author, content, edited, hidden, new_status,
                summary, oid, old_title, new_title
         FROM discussion_event WHERE discussion_id = ?1 ORDER BY id",
    )?;
    let mut files =
        conn.prepare_cached("SELECT path FROM file_path WHERE discussion_id = ?1 ORDER BY id")?;

    let mut discussions = Vec::with_capacity(heads.len());
    for (discussion_id, mut discussion) in heads {
        discussion.events = events
            .query_map(params![discussion_id], |row| {
                Ok(DiscussionEvent {
                    event_id: row.get(0)?,
                    event_type: row.get(1)?,
                    created_at: row.get(2)?,
                    author: row.get(3)?,
                    content: row.get(4)?,
                    edited: row.get(5)?,
                    hidden: row.get(6)?,
                    new_status: row.get(7)?,
                    summary: row.get(8)?,
                    oid: row.get(9)?,
                    old_title: row.get(10)?,
                    new_title: row.get(11)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        discussion.conflicting_files = files
            .query_map(params![discussion_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        discussions.push(discussion);
    }
    Ok(discussions)
}

impl MetadataStore {
    /// Left-outer join a model through every join table to every lookup table.
    ///
    /// Returns one row per combination of association values; nothing is
    /// grouped or deduplicated. A model without any associations still yields
    /// one row with every association column `None`. An unknown id yields no
    /// rows.
    pub fn fetch_model(&self, model_id: i64) -> Result<Vec<ModelInfoRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&FETCH_MODEL_SQL)?;
        let rows = stmt
            .query_map(params![model_id], ModelInfoRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Fetch a model and re-aggregate its associations.
    pub fn model_view(&self, model_id: i64) -> Result<ModelView> {
        let rows = self.fetch_model(model_id)?;
        ModelView::from_rows(&rows).ok_or(PtmError::ModelNotFound(model_id))
    }

    /// Rebuild the discussion subtree of a model.
    pub fn fetch_discussions(&self, model_id: i64) -> Result<Vec<Discussion>> {
        let conn = self.lock()?;
        read_discussions(&conn, model_id)
    }

    pub fn find_model_id(&self, hub: ModelHub, context_id: &str) -> Result<Option<i64>> {
        let conn = self.lock()?;
        let id = conn
            .query_row(
                "SELECT id FROM model WHERE model_hub = ?1 AND context_id = ?2",
                params![hub.as_str(), context_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Names in a lookup table, in insertion order.
    pub fn lookup_names(&self, table: LookupTable) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare_cached(&format!("SELECT name FROM {} ORDER BY id", table.table_name()))?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    pub fn lookup_count(&self, table: LookupTable) -> Result<usize> {
        self.count_rows(table.table_name())
    }

    /// Number of rows in a lookup table's join table.
    pub fn join_count(&self, table: LookupTable) -> Result<usize> {
        self.count_rows(table.join_table())
    }

    pub fn model_count(&self) -> Result<usize> {
        self.count_rows("model")
    }

    fn count_rows(&self, table: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Delete a model with its join rows and discussion subtree.
    ///
    /// Lookup rows are kept. Returns whether a model was removed.
    pub fn delete_model(&self, model_id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM model WHERE id = ?1", params![model_id])?;
        Ok(deleted > 0)
    }
}
