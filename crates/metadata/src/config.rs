//! Pipeline configuration: one explicit struct, read once and validated at startup.

use crate::dataset::DatasetShape;
use crate::Destination;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::macros::date;
use time::Date;

time::serde::format_description!(ymd, Date, "[year]-[month]-[day]");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("partition range is empty: start {start} is after end {end}")]
    InvalidRange { start: Date, end: Date },
    #[error("{files} daily extract files configured but the partition range spans {days} days")]
    FileCountMismatch { files: usize, days: usize },
    #[error("configuration value `{0}` must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the layered file store (landing/, bronze/, silver/, manifests/).
    pub storage_root: PathBuf,
    pub landing: LandingConfig,
    pub partition: PartitionConfig,
    pub destinations: DestinationsConfig,
    pub warehouse: WarehouseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandingConfig {
    /// Directory under `storage_root` holding the retrieved payloads.
    pub dir: String,
    /// Nightly snapshot Parquet file, relative to the landing dir.
    pub snapshot_file: String,
    /// Daily extract files are `<daily_prefix><n>.csv` for n in 1..=daily_file_count.
    pub daily_prefix: String,
    pub daily_file_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    #[serde(with = "ymd")]
    pub start: Date,
    #[serde(with = "ymd")]
    pub end: Date,
    pub schema: String,
    /// Slice `i` lands in `<table_prefix>_<i:02>`.
    pub table_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationsConfig {
    pub bronze_snapshot: Destination,
    pub bronze_daily_extract: Destination,
    pub silver_snapshot: Destination,
    pub silver_daily_extract: Destination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub duckdb_path: PathBuf,
    /// DuckDB CLI executable.
    pub duckdb_bin: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./data"),
            landing: LandingConfig::default(),
            partition: PartitionConfig::default(),
            destinations: DestinationsConfig::default(),
            warehouse: WarehouseConfig::default(),
        }
    }
}

impl Default for LandingConfig {
    fn default() -> Self {
        Self {
            dir: "landing".into(),
            snapshot_file: "leads.parquet".into(),
            daily_prefix: "daily/".into(),
            daily_file_count: 22,
        }
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            start: date!(2024 - 10 - 01),
            end: date!(2024 - 10 - 22),
            schema: "silver".into(),
            table_prefix: "stg_csv_data".into(),
        }
    }
}

impl Default for DestinationsConfig {
    fn default() -> Self {
        Self {
            bronze_snapshot: Destination::new("bronze", "leads_parquet"),
            bronze_daily_extract: Destination::new("bronze", "csv_snapshots"),
            silver_snapshot: Destination::new("silver", "stg_leads_parquet"),
            silver_daily_extract: Destination::new("silver", "stg_csv_snapshots"),
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            duckdb_path: PathBuf::from("./warehouse/leads.duckdb"),
            duckdb_bin: "duckdb".into(),
        }
    }
}

/// Storage layer of a landed or cleaned dataset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Bronze,
    Silver,
}

impl Layer {
    fn dir(self) -> &'static str {
        match self {
            Layer::Bronze => "bronze",
            Layer::Silver => "silver",
        }
    }
}

impl PipelineConfig {
    /// Reads `path` when given, otherwise uses defaults. Validates either way.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let cfg = match path {
            Some(p) => {
                let txt = std::fs::read_to_string(p).map_err(|source| ConfigError::Read {
                    path: p.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&txt)?
            }
            None => Self::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml(txt: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(txt)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partition.start > self.partition.end {
            return Err(ConfigError::InvalidRange {
                start: self.partition.start,
                end: self.partition.end,
            });
        }
        let days = self.partition.dates().len();
        if self.landing.daily_file_count != days {
            return Err(ConfigError::FileCountMismatch {
                files: self.landing.daily_file_count,
                days,
            });
        }
        let required = [
            ("landing.dir", self.landing.dir.as_str()),
            ("landing.snapshot_file", self.landing.snapshot_file.as_str()),
            ("partition.schema", self.partition.schema.as_str()),
            ("partition.table_prefix", self.partition.table_prefix.as_str()),
            ("warehouse.duckdb_bin", self.warehouse.duckdb_bin.as_str()),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(name));
            }
        }
        for dest in [
            &self.destinations.bronze_snapshot,
            &self.destinations.bronze_daily_extract,
            &self.destinations.silver_snapshot,
            &self.destinations.silver_daily_extract,
        ] {
            if dest.schema.trim().is_empty() || dest.table.trim().is_empty() {
                return Err(ConfigError::Empty("destinations"));
            }
        }
        Ok(())
    }

    pub fn landing_root(&self) -> PathBuf {
        self.storage_root.join(&self.landing.dir)
    }

    /// Logical keys of the daily extract payloads, in file-index order.
    pub fn daily_extract_keys(&self) -> Vec<String> {
        (1..=self.landing.daily_file_count)
            .map(|i| format!("{}{}.csv", self.landing.daily_prefix, i))
            .collect()
    }

    pub fn bronze_destination(&self, shape: DatasetShape) -> &Destination {
        match shape {
            DatasetShape::Snapshot => &self.destinations.bronze_snapshot,
            DatasetShape::DailyExtract => &self.destinations.bronze_daily_extract,
        }
    }

    pub fn silver_destination(&self, shape: DatasetShape) -> &Destination {
        match shape {
            DatasetShape::Snapshot => &self.destinations.silver_snapshot,
            DatasetShape::DailyExtract => &self.destinations.silver_daily_extract,
        }
    }

    /// `<root>/<layer>/<slug>/ingest_date=<date>/part-000000.arrow`
    pub fn dataset_file(&self, layer: Layer, shape: DatasetShape, ingest_date: Date) -> PathBuf {
        self.storage_root
            .join(layer.dir())
            .join(shape.slug())
            .join(format!("ingest_date={ingest_date}"))
            .join("part-000000.arrow")
    }

    pub fn partition_manifest(&self) -> PathBuf {
        self.storage_root
            .join("manifests")
            .join(DatasetShape::DailyExtract.slug())
            .join("partitions.json")
    }
}

impl PartitionConfig {
    /// Every date of the inclusive range, ascending.
    pub fn dates(&self) -> Vec<Date> {
        let mut out = Vec::new();
        let mut d = self.start;
        while d <= self.end {
            out.push(d);
            match d.next_day() {
                Some(next) => d = next,
                None => break,
            }
        }
        out
    }

    pub fn destination_for(&self, sequence: usize) -> Destination {
        Destination::new(
            self.schema.clone(),
            format!("{}_{:02}", self.table_prefix, sequence),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let cfg = PipelineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.partition.dates().len(), 22);
        assert_eq!(cfg.daily_extract_keys()[0], "daily/1.csv");
        assert_eq!(cfg.daily_extract_keys()[21], "daily/22.csv");
    }

    #[test]
    fn partition_destination_is_zero_padded() {
        let p = PartitionConfig::default();
        assert_eq!(p.destination_for(3).to_string(), "silver.stg_csv_data_03");
        assert_eq!(p.destination_for(12).to_string(), "silver.stg_csv_data_12");
    }

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let cfg = PipelineConfig::from_toml(
            r#"
storage_root = "/tmp/leads"

[partition]
start = "2024-10-01"
end = "2024-10-03"

[landing]
daily_file_count = 3
"#,
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.partition.end, date!(2024 - 10 - 03));
        assert_eq!(cfg.partition.table_prefix, "stg_csv_data");
        assert_eq!(cfg.landing.snapshot_file, "leads.parquet");
        assert_eq!(cfg.storage_root, PathBuf::from("/tmp/leads"));
    }

    #[test]
    fn rejects_inverted_range_and_mismatched_file_count() {
        let mut cfg = PipelineConfig::default();
        cfg.partition.start = date!(2024 - 10 - 05);
        cfg.partition.end = date!(2024 - 10 - 01);
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidRange { .. })));

        let mut cfg = PipelineConfig::default();
        cfg.landing.daily_file_count = 5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::FileCountMismatch { files: 5, days: 22 })
        ));
    }

    #[test]
    fn load_reads_file_once() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[partition]\ntable_prefix = \"\"").unwrap();
        let err = PipelineConfig::load(Some(f.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Empty("partition.table_prefix")));
    }

    #[test]
    fn dataset_file_layout() {
        let cfg = PipelineConfig::default();
        let p = cfg.dataset_file(Layer::Silver, DatasetShape::DailyExtract, date!(2024 - 10 - 23));
        assert_eq!(
            p,
            PathBuf::from("./data/silver/daily_extract/ingest_date=2024-10-23/part-000000.arrow")
        );
    }
}
