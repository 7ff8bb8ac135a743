use anyhow::{Context, Result};
use metadata::dataset::DAILY_EXTRACT_HEADER_ALIASES;
use metadata::{
    DatasetShape, Table, TableError, EXTRACTION_DATE, PARTITION_DATE, SNAPSHOT_INSERTED_AT,
};
use std::path::PathBuf;
use time::Date;
use tracing::{info, warn};

pub mod ipc;
pub mod source;

pub use ipc::{read_table_ipc, write_table_ipc};
pub use source::{Landed, LandingSource, SourceError};

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub landing_root: PathBuf,
    pub snapshot_key: String,
    /// Daily extract keys in file-index order; key `i` gets `partition_dates[i]`.
    pub daily_keys: Vec<String>,
    pub partition_dates: Vec<Date>,
    /// Stamped as `_extraction_date`.
    pub ingest_date: Date,
    pub snapshot_out: PathBuf,
    pub daily_out: PathBuf,
}

#[derive(Debug, Clone)]
pub struct IngestStats {
    pub dataset: DatasetShape,
    pub files_read: u32,
    pub files_skipped: u32,
    pub rows_in: u64,
    pub bytes_in: u64,
    pub out_path: PathBuf,
}

/// Nightly snapshot Parquet -> bronze IPC.
pub fn ingest_snapshot(cfg: &IngestConfig) -> Result<IngestStats> {
    let source = LandingSource::new(&cfg.landing_root);
    let landed = source.read_parquet(&cfg.snapshot_key)?;
    info!(
        key = %landed.key,
        rows = landed.table.len(),
        columns = ?landed.table.columns(),
        "loaded snapshot payload"
    );
    let mut table = landed.table;
    if !table.has_column(SNAPSHOT_INSERTED_AT) {
        table = table.with_constant(SNAPSHOT_INSERTED_AT, None);
    }
    let table = table.with_constant(EXTRACTION_DATE, Some(cfg.ingest_date.to_string()));
    let rows_in = write_table_ipc(&table, &cfg.snapshot_out)
        .with_context(|| format!("write bronze {}", cfg.snapshot_out.display()))?;

    Ok(IngestStats {
        dataset: DatasetShape::Snapshot,
        files_read: 1,
        files_skipped: 0,
        rows_in,
        bytes_in: landed.bytes,
        out_path: cfg.snapshot_out.clone(),
    })
}

/// Every daily extract CSV -> one consolidated bronze IPC file, each row tagged
/// with the partition date of its file.
pub async fn ingest_daily_extracts(cfg: &IngestConfig) -> Result<IngestStats> {
    let source = LandingSource::new(&cfg.landing_root);
    let extraction_date = cfg.ingest_date.to_string();

    let mut parts: Vec<Table> = Vec::with_capacity(cfg.daily_keys.len());
    let mut files_skipped = 0u32;
    let mut bytes_in = 0u64;

    for (i, key) in cfg.daily_keys.iter().enumerate() {
        let landed = source.read_csv(key).await?;
        bytes_in += landed.bytes;
        if landed.table.is_empty() {
            warn!(key = %key, "no data found, skipping");
            files_skipped += 1;
            continue;
        }

        let table = standardize_daily_headers(landed.table)
            .with_context(|| format!("standardize headers of {key}"))?
            .with_constant(EXTRACTION_DATE, Some(extraction_date.clone()));

        let table = match cfg.partition_dates.get(i) {
            Some(d) => table.with_constant(PARTITION_DATE, Some(d.to_string())),
            None => {
                warn!(key = %key, index = i + 1, "no partition date for file index");
                table.with_constant(PARTITION_DATE, None)
            }
        };
        info!(key = %key, rows = table.len(), "loaded daily extract");
        parts.push(table);
    }

    // canonical bronze columns first, whatever the files carried
    let base = Table::new(DatasetShape::DailyExtract.bronze_columns())?;
    let consolidated = Table::concat_by_name(std::iter::once(&base).chain(parts.iter()));
    let rows_in = write_table_ipc(&consolidated, &cfg.daily_out)
        .with_context(|| format!("write bronze {}", cfg.daily_out.display()))?;

    Ok(IngestStats {
        dataset: DatasetShape::DailyExtract,
        files_read: parts.len() as u32,
        files_skipped,
        rows_in,
        bytes_in,
        out_path: cfg.daily_out.clone(),
    })
}

/// Harmonizes header spellings across extract files and guarantees a `location`
/// column.
pub fn standardize_daily_headers(table: Table) -> Result<Table, TableError> {
    let table = table.rename_columns(|c| {
        DAILY_EXTRACT_HEADER_ALIASES
            .iter()
            .find(|(from, _)| *from == c)
            .map(|(_, to)| *to)
    })?;
    Ok(if table.has_column("location") {
        table
    } else {
        table.with_constant("location", None)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use time::macros::date;

    fn config(root: &std::path::Path, files: usize) -> IngestConfig {
        IngestConfig {
            landing_root: root.join("landing"),
            snapshot_key: "leads.parquet".into(),
            daily_keys: (1..=files).map(|i| format!("daily/{i}.csv")).collect(),
            partition_dates: vec![date!(2024 - 10 - 01), date!(2024 - 10 - 02)],
            ingest_date: date!(2024 - 10 - 23),
            snapshot_out: root.join("bronze/leads_snapshot/part-000000.arrow"),
            daily_out: root.join("bronze/daily_extract/part-000000.arrow"),
        }
    }

    #[test]
    fn header_aliases_and_location() {
        let t = Table::new(["CityName", "Appt Date", "Job Status"]).unwrap();
        let t = standardize_daily_headers(t).unwrap();
        assert_eq!(
            t.columns(),
            &["CITY", "APPT_DATE", "JOB_STATUS", "location"].map(String::from)
        );
    }

    #[tokio::test]
    async fn daily_files_are_tagged_by_index_and_consolidated() {
        let dir = tempfile::tempdir().unwrap();
        let daily = dir.path().join("landing/daily");
        fs::create_dir_all(&daily).unwrap();
        fs::write(
            daily.join("1.csv"),
            "ENTRYDATE,CityName,STATE\n01-10-2024,Austin,TX\n01-10-2024,Waco,TX\n",
        )
        .unwrap();
        fs::write(
            daily.join("2.csv"),
            "ENTRYDATE,CITY,STATE,location\n02-10-2024,Reno,NV,Reno | NV\n",
        )
        .unwrap();
        fs::write(daily.join("3.csv"), "ENTRYDATE,CITY\n").unwrap();

        let cfg = config(dir.path(), 3);
        let stats = ingest_daily_extracts(&cfg).await.unwrap();
        assert_eq!(stats.rows_in, 3);
        assert_eq!(stats.files_read, 2);
        assert_eq!(stats.files_skipped, 1);

        let t = read_table_ipc(&stats.out_path).unwrap();
        let city = t.index_of("CITY").unwrap();
        let part = t.index_of(PARTITION_DATE).unwrap();
        let extracted = t.index_of(EXTRACTION_DATE).unwrap();
        let loc = t.index_of("location").unwrap();
        assert_eq!(t.value(0, city), Some("Austin"));
        assert_eq!(t.value(0, part), Some("2024-10-01"));
        assert_eq!(t.value(2, part), Some("2024-10-02"));
        assert_eq!(t.value(2, extracted), Some("2024-10-23"));
        assert_eq!(t.value(0, loc), None);
        assert_eq!(t.value(2, loc), Some("Reno | NV"));
        // canonical columns exist even when no file carried them
        assert!(t.has_column("APPT_DATE"));
    }

    #[tokio::test]
    async fn missing_daily_file_aborts_ingest() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), 1);
        let err = ingest_daily_extracts(&cfg).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SourceError>(),
            Some(SourceError::NotFound { .. })
        ));
    }
}
