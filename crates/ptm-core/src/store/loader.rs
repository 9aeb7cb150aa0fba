//! Relational loader: lookup upserts and per-model loads.

use super::tables::LookupTable;
use super::MetadataStore;
use crate::config::HarvestConfig;
use crate::record::{Discussion, ModelRecord, RowFailure};
use crate::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Outcome of a best-effort batch load.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// Models inserted for the first time.
    pub inserted: usize,
    /// Models that already existed and were replaced in place.
    pub replaced: usize,
    pub failures: Vec<RowFailure>,
}

impl LoadReport {
    pub fn loaded(&self) -> usize {
        self.inserted + self.replaced
    }
}

/// Insert-if-absent, then read back the id.
///
/// `UNIQUE(name)` makes the insert a no-op for an existing name, so the
/// first writer's row (and id) is kept.
pub(crate) fn upsert_lookup(conn: &Connection, table: LookupTable, name: &str) -> Result<i64> {
    conn.prepare_cached(&format!(
        "INSERT INTO {} (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        table.table_name()
    ))?
    .execute(params![name])?;

    let id = conn
        .prepare_cached(&format!(
            "SELECT id FROM {} WHERE name = ?1",
            table.table_name()
        ))?
        .query_row(params![name], |row| row.get(0))?;
    Ok(id)
}

fn associations(record: &ModelRecord) -> [(LookupTable, &[String]); 8] {
    [
        (LookupTable::Architecture, record.architectures.as_slice()),
        (LookupTable::Author, record.authors.as_slice()),
        (LookupTable::Framework, record.frameworks.as_slice()),
        (LookupTable::Language, record.languages.as_slice()),
        (LookupTable::Library, record.libraries.as_slice()),
        (LookupTable::License, record.licenses.as_slice()),
        (LookupTable::Paper, record.papers.as_slice()),
        (LookupTable::Tag, record.tags.as_slice()),
    ]
}

/// Write one model and its subtree. Returns `(model_id, replaced)`.
fn write_model(conn: &Connection, record: &ModelRecord) -> Result<(i64, bool)> {
    let original_data = record
        .original_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM model WHERE model_hub = ?1 AND context_id = ?2",
            params![record.model_hub, record.context_id],
            |row| row.get(0),
        )
        .optional()?;

    let model_id = match existing {
        Some(model_id) => {
            conn.execute(
                "UPDATE model
                 SET sha = ?1, repo_url = ?2, downloads = ?3, likes = ?4, original_data = ?5
                 WHERE id = ?6",
                params![
                    record.sha,
                    record.repo_url,
                    record.downloads,
                    record.likes,
                    original_data,
                    model_id,
                ],
            )?;
            for table in LookupTable::ALL {
                conn.execute(
                    &format!("DELETE FROM {} WHERE model_id = ?1", table.join_table()),
                    params![model_id],
                )?;
            }
            // Events and conflicting files cascade from their discussion.
            conn.execute(
                "DELETE FROM discussion WHERE model_id = ?1",
                params![model_id],
            )?;
            debug!("Replacing model {} ({})", record.context_id, model_id);
            model_id
        }
        None => {
            conn.execute(
                "INSERT INTO model (context_id, model_hub, sha, repo_url, downloads, likes, original_data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.context_id,
                    record.model_hub,
                    record.sha,
                    record.repo_url,
                    record.downloads,
                    record.likes,
                    original_data,
                ],
            )?;
            conn.last_insert_rowid()
        }
    };

    for (table, values) in associations(record) {
        let insert_join = format!(
            "INSERT OR IGNORE INTO {} (model_id, {}) VALUES (?1, ?2)",
            table.join_table(),
            table.join_column()
        );
        for value in values {
            let lookup_id = upsert_lookup(conn, table, value)?;
            conn.prepare_cached(&insert_join)?
                .execute(params![model_id, lookup_id])?;
        }
    }

    for discussion in &record.discussions {
        write_discussion(conn, model_id, discussion)?;
    }

    Ok((model_id, existing.is_some()))
}

fn write_discussion(conn: &Connection, model_id: i64, discussion: &Discussion) -> Result<()> {
    conn.execute(
        "INSERT INTO discussion (model_id, title, status, num, repo_id, repo_type, author,
                                 is_pull_request, created_at, endpoint, target_branch,
                                 merge_commit_oid, diff)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            model_id,
            discussion.title,
            discussion.status,
            discussion.num,
            discussion.repo_id,
            discussion.repo_type,
            discussion.author,
            discussion.is_pull_request,
            discussion.created_at,
            discussion.endpoint,
            discussion.target_branch,
            discussion.merge_commit_oid,
            discussion.diff,
        ],
    )?;
    let discussion_id = conn.last_insert_rowid();

    for event in &discussion.events {
        conn.prepare_cached(
            "INSERT INTO discussion_event (discussion_id, event_id, type, created_at, author,
                                           content, edited, hidden, new_status, summary, oid,
                                           old_title, new_title)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )?
        .execute(params![
            discussion_id,
            event.event_id,
            event.event_type,
            event.created_at,
            event.author,
            event.content,
            event.edited,
            event.hidden,
            event.new_status,
            event.summary,
            event.oid,
            event.old_title,
            event.new_title,
        ])?;
    }

    for path in &discussion.conflicting_files {
        conn.prepare_cached("INSERT INTO file_path (discussion_id, path) VALUES (?1, ?2)")?
            .execute(params![discussion_id, path])?;
    }

    Ok(())
}

impl MetadataStore {
    /// Look up `name` in a lookup table, inserting it if absent, and return its id.
    ///
    /// Calling this twice with the same value returns the same id and leaves
    /// one row.
    pub fn upsert(&self, table: LookupTable, name: &str) -> Result<i64> {
        let conn = self.lock()?;
        upsert_lookup(&conn, table, name)
    }

    /// Load one canonical record and return the model's id.
    ///
    /// Every repeated-valued field is resolved through [`Self::upsert`] and
    /// linked through its join table; discussions, events and conflicting
    /// files are inserted beneath the model. The whole record is written in
    /// one transaction: on error nothing of it is kept.
    ///
    /// A record whose `(model_hub, context_id)` already exists replaces the
    /// stored model in place, keeping its id.
    pub fn load(&self, record: &ModelRecord) -> Result<i64> {
        self.load_inner(record).map(|(id, _)| id)
    }

    fn load_inner(&self, record: &ModelRecord) -> Result<(i64, bool)> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let outcome = write_model(&tx, record)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Load a batch, skipping records that fail.
    ///
    /// A failed record is logged with its `context_id` and recorded in the
    /// report; loading continues with the next one. Structural errors abort
    /// the batch.
    pub fn load_batch<'a, I>(&self, records: I) -> Result<LoadReport>
    where
        I: IntoIterator<Item = &'a ModelRecord>,
    {
        let mut report = LoadReport::default();

        for (index, record) in records.into_iter().enumerate() {
            match self.load_inner(record) {
                Ok((_, true)) => report.replaced += 1,
                Ok((_, false)) => report.inserted += 1,
                Err(e) if !e.is_row_recoverable() => return Err(e),
                Err(e) => {
                    warn!("Failed to load {}: {}", record.context_id, e);
                    report
                        .failures
                        .push(RowFailure::new(record.context_id.clone(), &e));
                }
            }

            if (index + 1) % HarvestConfig::PROGRESS_INTERVAL == 0 {
                info!(
                    "Loaded {} records ({} failed)",
                    report.loaded(),
                    report.failures.len()
                );
            }
        }

        info!(
            "Load finished: {} inserted, {} replaced, {} failed",
            report.inserted,
            report.replaced,
            report.failures.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DiscussionEvent;

    fn record(context_id: &str) -> ModelRecord {
        ModelRecord {
            context_id: context_id.to_string(),
            model_hub: "HuggingFace".to_string(),
            downloads: Some(10),
            ..Default::default()
        }
    }

    fn discussion(num: i64) -> Discussion {
        Discussion {
            title: format!("Discussion {}", num),
            status: Some("open".to_string()),
            num,
            repo_id: Some("gpt2".to_string()),
            repo_type: Some("model".to_string()),
            author: Some("jane".to_string()),
            is_pull_request: Some(true),
            created_at: None,
            endpoint: None,
            events: vec![DiscussionEvent {
                event_id: format!("evt-{}", num),
                event_type: "comment".to_string(),
                created_at: None,
                author: Some("jane".to_string()),
                content: Some("hi".to_string()),
                edited: Some(false),
                hidden: Some(false),
                new_status: None,
                summary: None,
                oid: None,
                old_title: None,
                new_title: None,
            }],
            conflicting_files: vec!["config.json".to_string()],
            target_branch: None,
            merge_commit_oid: None,
            diff: None,
        }
    }

    fn count(store: &MetadataStore, sql: &str) -> i64 {
        store
            .lock()
            .unwrap()
            .query_row(sql, [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = MetadataStore::open_in_memory().unwrap();
        let first = store.upsert(LookupTable::Library, "pytorch").unwrap();
        let second = store.upsert(LookupTable::Library, "pytorch").unwrap();
        assert_eq!(first, second);
        assert_eq!(
            count(&store, "SELECT COUNT(*) FROM library WHERE name = 'pytorch'"),
            1
        );
    }

    #[test]
    fn test_upsert_is_case_sensitive() {
        let store = MetadataStore::open_in_memory().unwrap();
        let a = store.upsert(LookupTable::Framework, "PyTorch").unwrap();
        let b = store.upsert(LookupTable::Framework, "pytorch").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_load_links_lookups() {
        let store = MetadataStore::open_in_memory().unwrap();
        let mut rec = record("bert-base");
        rec.tags = vec!["fill-mask".into(), "bert".into()];
        rec.licenses = vec!["apache-2.0".into()];
        let id = store.load(&rec).unwrap();

        assert_eq!(
            count(&store, &format!("SELECT COUNT(*) FROM model_to_tag WHERE model_id = {}", id)),
            2
        );
        assert_eq!(count(&store, "SELECT COUNT(*) FROM license"), 1);
    }

    #[test]
    fn test_load_with_no_discussions() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.load(&record("gpt2")).unwrap();
        assert_eq!(count(&store, "SELECT COUNT(*) FROM model"), 1);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM discussion"), 0);
    }

    #[test]
    fn test_load_discussion_subtree() {
        let store = MetadataStore::open_in_memory().unwrap();
        let mut rec = record("gpt2");
        rec.discussions = vec![discussion(1), discussion(2)];
        store.load(&rec).unwrap();
        assert_eq!(count(&store, "SELECT COUNT(*) FROM discussion"), 2);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM discussion_event"), 2);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM file_path"), 2);
    }

    #[test]
    fn test_reload_replaces_in_place() {
        let store = MetadataStore::open_in_memory().unwrap();
        let mut rec = record("gpt2");
        rec.tags = vec!["old".into()];
        rec.discussions = vec![discussion(1)];
        let first = store.load(&rec).unwrap();

        rec.tags = vec!["new".into()];
        rec.downloads = Some(99);
        rec.discussions = vec![];
        let report = store.load_batch([&rec]).unwrap();
        assert_eq!(report.replaced, 1);

        let second = store.load(&rec).unwrap();
        assert_eq!(first, second);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM model"), 1);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM model_to_tag"), 1);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM discussion"), 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM discussion_event"), 0);
        assert_eq!(count(&store, "SELECT downloads FROM model"), 99);
    }

    #[test]
    fn test_same_context_id_on_different_hubs() {
        let store = MetadataStore::open_in_memory().unwrap();
        let hf = record("resnet50");
        let mut torch = record("resnet50");
        torch.model_hub = "PyTorch".to_string();
        let a = store.load(&hf).unwrap();
        let b = store.load(&torch).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_failed_record_leaves_nothing_behind() {
        let store = MetadataStore::open_in_memory().unwrap();
        store
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_bad BEFORE INSERT ON model_to_tag
                 WHEN (SELECT name FROM tag WHERE id = NEW.tag_id) = 'bad'
                 BEGIN SELECT RAISE(ABORT, 'bad tag'); END;",
            )
            .unwrap();

        let mut bad = record("broken");
        bad.tags = vec!["bad".into()];
        let good = record("fine");

        let report = store.load_batch([&bad, &good]).unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].context_id, "broken");
        assert_eq!(count(&store, "SELECT COUNT(*) FROM model"), 1);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM tag"), 0);
    }
}
