//! Pipeline stages wired to one configuration and one catalog.

use anyhow::{Context, Result};
use duckdb_catalog::{load_table, provision, Catalog, LoadStats};
use ingest::{IngestConfig, IngestStats};
use metadata::{DatasetShape, Destination, Layer, PipelineConfig};
use partition::{partition_by_date, PartitionManifest, PartitionReport};
use std::path::PathBuf;
use time::Date;
use tracing::info;
use validate::{ValidateConfig, ValidationStats};

pub struct IngestOutcome {
    pub stats: IngestStats,
    pub load: LoadStats,
}

pub struct CleanOutcome {
    pub stats: ValidationStats,
    pub load: LoadStats,
}

pub struct PartitionOutcome {
    pub report: PartitionReport,
    pub loads: Vec<LoadStats>,
    pub manifest: PathBuf,
}

pub struct RunOutcome {
    pub ingest: Vec<IngestOutcome>,
    pub clean: Vec<CleanOutcome>,
    pub partition: PartitionOutcome,
}

pub struct Stages<'a, C: Catalog + ?Sized> {
    cfg: &'a PipelineConfig,
    catalog: &'a C,
    ingest_date: Date,
}

impl<'a, C: Catalog + ?Sized> Stages<'a, C> {
    pub fn new(cfg: &'a PipelineConfig, catalog: &'a C, ingest_date: Date) -> Self {
        Self {
            cfg,
            catalog,
            ingest_date,
        }
    }

    pub fn init(&self) -> Result<Vec<Destination>> {
        provision(self.catalog, self.cfg).context("provision catalog")
    }

    fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            landing_root: self.cfg.landing_root(),
            snapshot_key: self.cfg.landing.snapshot_file.clone(),
            daily_keys: self.cfg.daily_extract_keys(),
            partition_dates: self.cfg.partition.dates(),
            ingest_date: self.ingest_date,
            snapshot_out: self.bronze_file(DatasetShape::Snapshot),
            daily_out: self.bronze_file(DatasetShape::DailyExtract),
        }
    }

    fn bronze_file(&self, shape: DatasetShape) -> PathBuf {
        self.cfg.dataset_file(Layer::Bronze, shape, self.ingest_date)
    }

    fn silver_file(&self, shape: DatasetShape) -> PathBuf {
        self.cfg.dataset_file(Layer::Silver, shape, self.ingest_date)
    }

    /// Landing payloads -> bronze files -> bronze tables.
    pub async fn ingest(&self) -> Result<Vec<IngestOutcome>> {
        let icfg = self.ingest_config();
        let snapshot = ingest::ingest_snapshot(&icfg).context("ingest snapshot")?;
        let daily = ingest::ingest_daily_extracts(&icfg)
            .await
            .context("ingest daily extracts")?;

        let mut out = Vec::with_capacity(2);
        for stats in [snapshot, daily] {
            let dest = self.cfg.bronze_destination(stats.dataset);
            let table = ingest::read_table_ipc(&stats.out_path)?;
            let load = load_table(self.catalog, dest, &table)
                .with_context(|| format!("load {} into {dest}", stats.dataset))?;
            out.push(IngestOutcome { stats, load });
        }
        Ok(out)
    }

    /// Bronze file -> cleaned silver file -> silver table.
    pub fn clean(&self, shape: DatasetShape) -> Result<CleanOutcome> {
        let vcfg = ValidateConfig {
            shape,
            bronze_in: self.bronze_file(shape),
            silver_out: self.silver_file(shape),
        };
        let (silver, stats) =
            validate::validate_dataset(&vcfg).with_context(|| format!("clean {shape}"))?;
        let dest = self.cfg.silver_destination(shape);
        let load = load_table(self.catalog, dest, &silver)
            .with_context(|| format!("load {shape} into {dest}"))?;
        Ok(CleanOutcome { stats, load })
    }

    /// Silver daily extract -> one table per partition date, then the manifest.
    pub fn partition(&self) -> Result<PartitionOutcome> {
        let shape = DatasetShape::DailyExtract;
        let silver = ingest::read_table_ipc(&self.silver_file(shape))
            .context("silver daily extract (run `clean` first)")?;
        let (slices, report) = partition_by_date(&silver, &self.cfg.partition)?;

        let mut loads = Vec::with_capacity(slices.len());
        for slice in &slices {
            let load = load_table(self.catalog, &slice.destination, &slice.table)
                .with_context(|| format!("load partition {} ({})", slice.sequence, slice.date))?;
            loads.push(load);
        }

        let manifest_path = self.cfg.partition_manifest();
        PartitionManifest::new(
            shape.slug(),
            self.ingest_date,
            &self.cfg.partition,
            &slices,
            &report,
        )
        .write(&manifest_path)?;
        info!(manifest = %manifest_path.display(), "partition manifest written");

        Ok(PartitionOutcome {
            report,
            loads,
            manifest: manifest_path,
        })
    }

    /// Every stage in order; the first failure stops the run.
    pub async fn run(&self) -> Result<RunOutcome> {
        let ingest = self.ingest().await?;
        let mut clean = Vec::with_capacity(DatasetShape::ALL.len());
        for shape in DatasetShape::ALL {
            clean.push(self.clean(shape)?);
        }
        let partition = self.partition()?;
        Ok(RunOutcome {
            ingest,
            clean,
            partition,
        })
    }
}
