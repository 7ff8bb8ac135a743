use anyhow::{Context, Result};
use ingest::{read_table_ipc, write_table_ipc};
use metadata::{DatasetShape, Table, TableError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

pub mod daily;
pub mod normalize;
pub mod records;
pub mod report;
pub mod snapshot;

pub use daily::clean_daily_extract;
pub use report::{CleanReport, DailyExtractReport, DuplicateGroup, SnapshotReport};
pub use snapshot::clean_snapshot;

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("{dataset}: required column `{column}` is missing")]
    MissingColumn {
        dataset: DatasetShape,
        column: &'static str,
    },
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Cleans `table` according to its shape. The input is left untouched.
pub fn clean_table(shape: DatasetShape, table: &Table) -> Result<(Table, CleanReport), CleanError> {
    match shape {
        DatasetShape::Snapshot => {
            clean_snapshot(table).map(|(t, r)| (t, CleanReport::Snapshot(r)))
        }
        DatasetShape::DailyExtract => {
            clean_daily_extract(table).map(|(t, r)| (t, CleanReport::DailyExtract(r)))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidateConfig {
    pub shape: DatasetShape,
    pub bronze_in: PathBuf,
    pub silver_out: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ValidationStats {
    pub dataset: DatasetShape,
    pub rows_in: u64,
    pub rows_out: u64,
    pub silver_out: PathBuf,
    pub report: CleanReport,
}

/// Bronze IPC -> cleaned silver IPC for one dataset.
pub fn validate_dataset(cfg: &ValidateConfig) -> Result<(Table, ValidationStats)> {
    let bronze = read_table_ipc(&cfg.bronze_in)
        .with_context(|| format!("bronze file for {}", cfg.shape))?;
    info!(dataset = %cfg.shape, rows = bronze.len(), "cleaning");

    let (silver, report) = clean_table(cfg.shape, &bronze)?;
    report.log();

    write_table_ipc(&silver, &cfg.silver_out)
        .with_context(|| format!("write silver {}", cfg.silver_out.display()))?;

    let stats = ValidationStats {
        dataset: cfg.shape,
        rows_in: report.rows_in(),
        rows_out: report.rows_out(),
        silver_out: cfg.silver_out.clone(),
        report,
    };
    Ok((silver, stats))
}
