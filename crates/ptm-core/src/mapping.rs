//! Field mapper: raw hub rows to ordered canonical rows.
//!
//! A [`FieldMapping`] is an ordered list of `(canonical name, source)` pairs.
//! Every entry reads only the raw row and the explicit [`MapContext`]
//! (controlled vocabulary plus pre-fetched side tables), never the canonical
//! fields computed before it, so entries can be evaluated in declaration
//! order without hidden dependencies.

use crate::normalize::TagVocabulary;
use crate::record::{value_to_text, MappedRow, RawRecord, RowFailure};
use crate::{PtmError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Pure function of a raw row and the mapping context.
pub type ComputeFn = Arc<dyn Fn(&RawRecord, &MapContext<'_>) -> Result<Value> + Send + Sync>;

/// Where a canonical field's value comes from.
#[derive(Clone)]
pub enum FieldSource {
    /// First non-null of the named raw fields.
    Rename(Vec<String>),
    /// Computed from the raw row.
    Compute(ComputeFn),
    /// Constant value.
    Default(Value),
}

impl std::fmt::Debug for FieldSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldSource::Rename(sources) => f.debug_tuple("Rename").field(sources).finish(),
            FieldSource::Compute(_) => f.write_str("Compute(<fn>)"),
            FieldSource::Default(value) => f.debug_tuple("Default").field(value).finish(),
        }
    }
}

/// Per-id lookups fetched before mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SideTable {
    /// Repository snapshot (file listing) or the out-of-range sentinel.
    Snapshot,
    /// `{"commits": [...], "gitrefs": {...}}`
    Commits,
    /// Canonical discussion list.
    Discussions,
    /// License key of the source repository.
    License,
}

/// Pre-fetched per-id lookups, keyed by the hub's row id.
#[derive(Debug, Clone, Default)]
pub struct SideTables {
    tables: HashMap<SideTable, HashMap<String, Value>>,
}

impl SideTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: SideTable, id: impl Into<String>, value: Value) {
        self.tables
            .entry(table)
            .or_default()
            .insert(id.into(), value);
    }

    /// The stored value, `Null` for ids that were never fetched.
    pub fn get(&self, table: SideTable, id: &str) -> Value {
        self.tables
            .get(&table)
            .and_then(|t| t.get(id))
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn len(&self, table: SideTable) -> usize {
        self.tables.get(&table).map_or(0, HashMap::len)
    }
}

/// Explicit inputs shared by every compute function of a mapping run.
#[derive(Debug, Clone, Copy)]
pub struct MapContext<'a> {
    pub vocabulary: &'a TagVocabulary,
    pub side_tables: &'a SideTables,
}

impl<'a> MapContext<'a> {
    pub fn new(vocabulary: &'a TagVocabulary, side_tables: &'a SideTables) -> Self {
        Self {
            vocabulary,
            side_tables,
        }
    }
}

/// Ordered mapping from canonical field names to their sources.
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
    entries: Vec<(String, FieldSource)>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry. A replaced entry keeps its position.
    pub fn entry(mut self, canonical: impl Into<String>, source: FieldSource) -> Self {
        let canonical = canonical.into();
        match self.entries.iter_mut().find(|(name, _)| *name == canonical) {
            Some(existing) => existing.1 = source,
            None => self.entries.push((canonical, source)),
        }
        self
    }

    /// Copy a raw field under a canonical name.
    pub fn rename(self, canonical: impl Into<String>, source: impl Into<String>) -> Self {
        self.entry(canonical, FieldSource::Rename(vec![source.into()]))
    }

    /// Copy the first non-null of several raw fields.
    pub fn coalesce(self, canonical: impl Into<String>, sources: &[&str]) -> Self {
        let sources = sources.iter().map(|s| s.to_string()).collect();
        self.entry(canonical, FieldSource::Rename(sources))
    }

    /// Compute a canonical field from the raw row.
    pub fn compute<F>(self, canonical: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RawRecord, &MapContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.entry(canonical, FieldSource::Compute(Arc::new(f)))
    }

    /// Set a canonical field to a constant.
    pub fn constant(self, canonical: impl Into<String>, value: Value) -> Self {
        self.entry(canonical, FieldSource::Default(value))
    }

    /// Canonical field names in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map one raw row.
    ///
    /// Every declared field is present in the output; missing raw fields map
    /// to `Null`. A failing compute function is not caught here: the error
    /// is returned with the field name attached.
    pub fn apply(&self, raw: &RawRecord, ctx: &MapContext<'_>) -> Result<MappedRow> {
        let mut row = MappedRow::with_capacity(self.entries.len());
        for (name, source) in &self.entries {
            let value = match source {
                FieldSource::Rename(sources) => sources
                    .iter()
                    .filter_map(|s| raw.get(s))
                    .find(|v| !v.is_null())
                    .cloned()
                    .unwrap_or(Value::Null),
                FieldSource::Compute(f) => f(raw, ctx).map_err(|e| match e {
                    PtmError::Mapping { .. } => e,
                    other => PtmError::Mapping {
                        field: name.clone(),
                        message: other.to_string(),
                    },
                })?,
                FieldSource::Default(value) => value.clone(),
            };
            row.push(name.clone(), value);
        }
        Ok(row)
    }
}

/// Result of mapping a batch of raw rows.
#[derive(Debug, Default)]
pub struct MapOutcome {
    pub rows: Vec<MappedRow>,
    pub failures: Vec<RowFailure>,
}

/// Map a batch, skipping rows whose mapping fails.
///
/// `id_field` names the raw field used to identify a failed row in logs.
pub fn map_batch(
    mapping: &FieldMapping,
    raws: &[RawRecord],
    ctx: &MapContext<'_>,
    id_field: &str,
) -> MapOutcome {
    let mut outcome = MapOutcome {
        rows: Vec::with_capacity(raws.len()),
        failures: Vec::new(),
    };

    for raw in raws {
        match mapping.apply(raw, ctx) {
            Ok(row) => outcome.rows.push(row),
            Err(e) => {
                let id = raw
                    .get(id_field)
                    .and_then(value_to_text)
                    .unwrap_or_else(|| "<unknown>".to_string());
                warn!("Skipping {} during mapping: {}", id, e);
                outcome.failures.push(RowFailure::new(id, &e));
            }
        }
    }

    debug!(
        "Mapped {} rows ({} failed)",
        outcome.rows.len(),
        outcome.failures.len()
    );
    outcome
}
