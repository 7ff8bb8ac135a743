use anyhow::{Context, Result};
use metadata::{Destination, PartitionConfig, Table, PARTITION_DATE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use time::Date;
use tracing::{info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("partition key column `{0}` is missing")]
    MissingKey(&'static str),
}

/// Rows of one calendar day, bound for their own destination.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionSlice {
    /// 1-based position of `date` in the configured range.
    pub sequence: usize,
    pub date: Date,
    pub destination: Destination,
    pub table: Table,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionReport {
    pub rows_in: u64,
    pub rows_partitioned: u64,
    /// Rows whose key is missing or falls outside the range; they reach no slice.
    pub rows_out_of_range: u64,
    pub skipped_dates: Vec<String>,
}

/// Splits `table` into one slice per date of `plan`, ascending. Dates with no
/// rows are skipped. Row order within a slice follows `table`.
pub fn partition_by_date(
    table: &Table,
    plan: &PartitionConfig,
) -> Result<(Vec<PartitionSlice>, PartitionReport), PartitionError> {
    let key = table
        .index_of(PARTITION_DATE)
        .ok_or(PartitionError::MissingKey(PARTITION_DATE))?;

    let mut by_key: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, row) in table.rows().iter().enumerate() {
        if let Some(k) = row[key].as_deref() {
            by_key.entry(k.trim()).or_default().push(i);
        }
    }

    let mut report = PartitionReport {
        rows_in: table.len() as u64,
        ..Default::default()
    };
    let mut slices = Vec::new();
    for (i, date) in plan.dates().into_iter().enumerate() {
        let sequence = i + 1;
        let label = date.to_string();
        let Some(rows) = by_key.remove(label.as_str()) else {
            info!(date = %label, sequence, "no rows for date, skipping");
            report.skipped_dates.push(label);
            continue;
        };
        report.rows_partitioned += rows.len() as u64;
        slices.push(PartitionSlice {
            sequence,
            date,
            destination: plan.destination_for(sequence),
            table: table.select_rows(&rows),
        });
    }

    report.rows_out_of_range = report.rows_in - report.rows_partitioned;
    if report.rows_out_of_range > 0 {
        let mut keys: Vec<&str> = by_key.keys().copied().collect();
        keys.sort_unstable();
        warn!(
            rows = report.rows_out_of_range,
            keys = ?keys,
            start = %plan.start,
            end = %plan.end,
            "rows outside the partition range excluded"
        );
    }
    info!(
        slices = slices.len(),
        rows = report.rows_partitioned,
        skipped = report.skipped_dates.len(),
        "partitioned"
    );
    Ok((slices, report))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub sequence: usize,
    pub date: String,
    pub destination: String,
    pub rows: u64,
}

/// Record of one partition run, written after the slices are loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionManifest {
    pub dataset: String,
    pub ingest_date: String,
    pub range_start: String,
    pub range_end: String,
    pub partitions: Vec<ManifestEntry>,
    pub skipped_dates: Vec<String>,
    pub rows_out_of_range: u64,
}

impl PartitionManifest {
    pub fn new(
        dataset: &str,
        ingest_date: Date,
        plan: &PartitionConfig,
        slices: &[PartitionSlice],
        report: &PartitionReport,
    ) -> Self {
        Self {
            dataset: dataset.to_string(),
            ingest_date: ingest_date.to_string(),
            range_start: plan.start.to_string(),
            range_end: plan.end.to_string(),
            partitions: slices
                .iter()
                .map(|s| ManifestEntry {
                    sequence: s.sequence,
                    date: s.date.to_string(),
                    destination: s.destination.to_string(),
                    rows: s.table.len() as u64,
                })
                .collect(),
            skipped_dates: report.skipped_dates.clone(),
            rows_out_of_range: report.rows_out_of_range,
        }
    }

    /// Writes to a sibling temp file first, then renames over `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            create_dir_all(dir).with_context(|| format!("mkdir -p {}", dir.display()))?;
        }
        let tmp = path.with_extension("json.tmp");
        {
            let mut out =
                File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
            let json = serde_json::to_string_pretty(self)?;
            out.write_all(json.as_bytes())?;
            out.flush()?;
        }
        std::fs::rename(&tmp, path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let txt = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Ok(serde_json::from_str(&txt)?)
    }
}
