//! One harvest run: extract → validate → side tables → map → export → load.

use crate::config::{HarvestOptions, ModelHub};
use crate::export::{export_table, Table};
use crate::hubs::HubSource;
use crate::mapping::{map_batch, MapContext};
use crate::record::{MappedRow, ModelRecord, RowFailure};
use crate::store::{LoadReport, MetadataStore};
use crate::validate::validate;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Summary of a harvest run.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub hub: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub extracted: usize,
    /// Constraint violations found in the extracted rows.
    pub problems: usize,
    pub mapped: usize,
    pub mapping_failures: Vec<RowFailure>,
    /// Mapped rows that could not be turned into model records.
    pub record_failures: Vec<RowFailure>,
    /// `None` when the source does not produce models.
    pub load: Option<LoadReport>,
    pub exported: Vec<PathBuf>,
}

impl HarvestReport {
    /// Every row skipped at any stage.
    pub fn failures(&self) -> impl Iterator<Item = &RowFailure> {
        self.mapping_failures
            .iter()
            .chain(&self.record_failures)
            .chain(self.load.iter().flat_map(|l| &l.failures))
    }
}

/// Convert mapped rows into model records, skipping malformed rows.
pub fn to_records(
    rows: &[MappedRow],
    hub: ModelHub,
) -> Result<(Vec<ModelRecord>, Vec<RowFailure>)> {
    let mut records = Vec::with_capacity(rows.len());
    let mut failures = Vec::new();

    for row in rows {
        match ModelRecord::from_mapped(row, hub) {
            Ok(record) => records.push(record),
            Err(e) if !e.is_row_recoverable() => return Err(e),
            Err(e) => {
                let id = row.context_id().unwrap_or_else(|| "<unknown>".to_string());
                warn!("Skipping {}: {}", id, e);
                failures.push(RowFailure::new(id, &e));
            }
        }
    }
    Ok((records, failures))
}

/// Run one harvest against `store`.
///
/// Per-row problems (failed fetches, mapping errors, malformed records,
/// failed loads) are logged and skipped. Configuration errors and failures
/// to reach the hub at all end the run.
pub async fn harvest(
    source: &dyn HubSource,
    store: &MetadataStore,
    options: &HarvestOptions,
) -> Result<HarvestReport> {
    options.validate()?;
    let started_at = Utc::now();
    let hub = source.hub();
    info!("Harvesting {} (limit: {:?})", hub, options.limit);

    let vocabulary = source.vocabulary().await?;
    debug!("Loaded {} controlled vocabulary entries", vocabulary.len());

    let raws = source.extract(options.limit).await?;

    let problems = validate(&raws, &source.constraints());
    if !problems.is_empty() {
        warn!("Total {} extraction problems: {}", hub, problems.len());
        for problem in &problems {
            debug!("Row {} failed '{}'", problem.row_index, problem.constraint);
        }
    }

    let side_tables = source.side_tables(&raws, options).await;

    let mapping = source.mapping();
    let ctx = MapContext::new(&vocabulary, &side_tables);
    let outcome = map_batch(&mapping, &raws, &ctx, source.id_field());
    info!("Mapped {}/{} {} rows", outcome.rows.len(), raws.len(), hub);

    let mut exported = Vec::new();
    if let Some(dir) = &options.export_dir {
        let name = if source.loads_models() { "model" } else { "dataset" };
        let table = Table::from_mapped(&mapping, &outcome.rows);
        exported = export_table(dir, name, &table)?.files;
    }

    let (record_failures, load) = if source.loads_models() {
        let (records, failures) = to_records(&outcome.rows, hub)?;
        (failures, Some(store.load_batch(&records)?))
    } else {
        (Vec::new(), None)
    };

    let report = HarvestReport {
        hub: hub.as_str().to_string(),
        started_at,
        finished_at: Utc::now(),
        extracted: raws.len(),
        problems: problems.len(),
        mapped: outcome.rows.len(),
        mapping_failures: outcome.failures,
        record_failures,
        load,
        exported,
    };
    info!(
        "Harvest of {} finished in {}s: {} extracted, {} skipped",
        hub,
        (report.finished_at - report.started_at).num_seconds(),
        report.extracted,
        report.failures().count()
    );
    Ok(report)
}
