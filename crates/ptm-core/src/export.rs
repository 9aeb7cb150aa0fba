//! Tabular exports of a mapped batch.
//!
//! A [`Table`] has one header row (the canonical field names in mapping
//! order) and one row per mapped record. Cells render scalars as text,
//! nested values as compact JSON and absence as an empty cell.
//!
//! Files are written to a temp file, synced and renamed into place.

use crate::mapping::FieldMapping;
use crate::record::{value_to_text, MappedRow};
use crate::{PtmError, Result};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Repeated-valued fields exported as `(context_id, value)` pair tables.
pub const PAIR_COLUMNS: [&str; 10] = [
    "tags",
    "language",
    "paper",
    "license",
    "author",
    "framework",
    "architectures",
    "library",
    "config_file",
    "datasets",
];

const KEY_COLUMN: &str = "context_id";

/// Render one cell.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Array(_) | Value::Object(_) => value.to_string(),
        other => value_to_text(other).unwrap_or_default(),
    }
}

/// An ordered-column table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Build a table from mapped rows, columns in mapping order.
    pub fn from_mapped(mapping: &FieldMapping, rows: &[MappedRow]) -> Self {
        let header: Vec<String> = mapping.field_names().into_iter().map(str::to_string).collect();
        let rows = rows
            .iter()
            .map(|row| header.iter().map(|name| row.get(name).clone()).collect())
            .collect();
        Self { header, rows }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.header.len() {
            return Err(PtmError::Other(format!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.header.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    fn column_index(&self, column: &str) -> Result<usize> {
        self.header
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| PtmError::Mapping {
                field: column.to_string(),
                message: "no such column".to_string(),
            })
    }

    /// `(context_id, column)` pairs, one row per list element.
    ///
    /// Absent values produce no rows; a scalar produces one.
    pub fn cut_pairs(&self, column: &str) -> Result<Table> {
        let key = self.column_index(KEY_COLUMN)?;
        let value = self.column_index(column)?;

        let mut pairs = Table::new(vec![KEY_COLUMN.to_string(), column.to_string()]);
        for row in &self.rows {
            let items = match &row[value] {
                Value::Null => continue,
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            };
            for item in items.into_iter().filter(|i| !i.is_null()) {
                pairs.rows.push(vec![row[key].clone(), item]);
            }
        }
        Ok(pairs)
    }

    /// Write as delimited text with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(&self.header)?;
        for row in &self.rows {
            csv.write_record(row.iter().map(cell_text))?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Write as a JSON array of objects, keys in column order.
    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }
}

struct OrderedRow<'a> {
    header: &'a [String],
    cells: &'a [Value],
}

impl Serialize for OrderedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.header.len()))?;
        for (name, cell) in self.header.iter().zip(self.cells) {
            map.serialize_entry(name, cell)?;
        }
        map.end()
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for cells in &self.rows {
            seq.serialize_element(&OrderedRow {
                header: &self.header,
                cells,
            })?;
        }
        seq.end()
    }
}

/// Write through a temp file next to `path`, then rename into place.
fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| PtmError::io_with_path(e, parent))?;
        }
    }

    let temp_path = path.with_extension(format!("{}.tmp", std::process::id()));
    let file = File::create(&temp_path).map_err(|e| PtmError::io_with_path(e, &temp_path))?;
    let mut writer = BufWriter::new(file);

    let written = write(&mut writer).and_then(|_| {
        let file = writer
            .into_inner()
            .map_err(|e| PtmError::io_with_path(e.into_error(), &temp_path))?;
        file.sync_all()
            .map_err(|e| PtmError::io_with_path(e, &temp_path))
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    fs::rename(&temp_path, path).map_err(|e| PtmError::io_with_path(e, path))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Files produced by [`export_table`].
#[derive(Debug, Clone, Default)]
pub struct ExportedFiles {
    pub files: Vec<PathBuf>,
}

/// Export a table as `<name>.csv`, `<name>.json` and one
/// `<name>_to_<column>.csv` pair table per present [`PAIR_COLUMNS`] entry.
pub fn export_table(dir: &Path, name: &str, table: &Table) -> Result<ExportedFiles> {
    let mut exported = ExportedFiles::default();

    let csv_path = dir.join(format!("{}.csv", name));
    write_atomic(&csv_path, |w| table.write_csv(w))?;
    exported.files.push(csv_path);

    let json_path = dir.join(format!("{}.json", name));
    write_atomic(&json_path, |w| table.write_json(w))?;
    exported.files.push(json_path);

    for column in PAIR_COLUMNS {
        if !table.header.iter().any(|h| h == column) {
            continue;
        }
        let pairs = table.cut_pairs(column)?;
        let path = dir.join(format!("{}_to_{}.csv", name, column));
        write_atomic(&path, |w| pairs.write_csv(w))?;
        exported.files.push(path);
    }

    info!(
        "Exported {} rows of {} to {} files in {}",
        table.len(),
        name,
        exported.files.len(),
        dir.display()
    );
    Ok(exported)
}
