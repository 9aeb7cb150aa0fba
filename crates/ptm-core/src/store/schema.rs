//! Target relational schema.
//!
//! One `model` table, eight lookup tables, one join table per lookup table,
//! and the `discussion` / `discussion_event` / `file_path` subtree owned by
//! `model` through `ON DELETE CASCADE`.

use super::tables::LookupTable;
use crate::Result;
use rusqlite::Connection;

const MODEL_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS model (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    context_id TEXT NOT NULL,
    model_hub TEXT NOT NULL,
    sha TEXT,
    repo_url TEXT,
    downloads INTEGER,
    likes INTEGER,
    original_data TEXT,
    UNIQUE (model_hub, context_id)
);

CREATE TABLE IF NOT EXISTS discussion (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    model_id INTEGER NOT NULL REFERENCES model(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    status TEXT,
    num INTEGER NOT NULL,
    repo_id TEXT,
    repo_type TEXT,
    author TEXT,
    is_pull_request INTEGER,
    created_at TEXT,
    endpoint TEXT,
    target_branch TEXT,
    merge_commit_oid TEXT,
    diff TEXT
);

CREATE INDEX IF NOT EXISTS idx_discussion_model ON discussion(model_id);

CREATE TABLE IF NOT EXISTS discussion_event (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    discussion_id INTEGER NOT NULL REFERENCES discussion(id) ON DELETE CASCADE,
    event_id TEXT NOT NULL,
    type TEXT NOT NULL,
    created_at TEXT,
    author TEXT,
    content TEXT,
    edited INTEGER,
    hidden INTEGER,
    new_status TEXT,
    summary TEXT,
    oid TEXT,
    old_title TEXT,
    new_title TEXT
);

CREATE INDEX IF NOT EXISTS idx_discussion_event_discussion ON discussion_event(discussion_id);

CREATE TABLE IF NOT EXISTS file_path (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    discussion_id INTEGER NOT NULL REFERENCES discussion(id) ON DELETE CASCADE,
    path TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_file_path_discussion ON file_path(discussion_id);
"#;

fn lookup_schema(table: LookupTable) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );
        CREATE TABLE IF NOT EXISTS {join} (
            model_id INTEGER NOT NULL REFERENCES model(id) ON DELETE CASCADE,
            {column} INTEGER NOT NULL REFERENCES {table}(id),
            PRIMARY KEY (model_id, {column})
        );
        CREATE INDEX IF NOT EXISTS idx_{join}_lookup ON {join}({column});",
        table = table.table_name(),
        join = table.join_table(),
        column = table.join_column(),
    )
}

/// Create every table and index that does not exist yet.
pub(crate) fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(MODEL_SCHEMA)?;
    for table in LookupTable::ALL {
        conn.execute_batch(&lookup_schema(table))?;
    }
    Ok(())
}

/// Drop every table owned by the schema.
pub(crate) fn drop_schema(conn: &Connection) -> Result<()> {
    for table in LookupTable::ALL {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", table.join_table()))?;
    }
    conn.execute_batch(
        "DROP TABLE IF EXISTS file_path;
         DROP TABLE IF EXISTS discussion_event;
         DROP TABLE IF EXISTS discussion;
         DROP TABLE IF EXISTS model;",
    )?;
    for table in LookupTable::ALL {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", table.table_name()))?;
    }
    Ok(())
}
