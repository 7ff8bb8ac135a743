use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use duckdb_catalog::{Catalog, DuckDbCatalog, MemoryCatalog};
use metadata::{DatasetShape, PipelineConfig};
use std::path::PathBuf;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing_subscriber::EnvFilter;

mod stages;

use stages::{CleanOutcome, IngestOutcome, PartitionOutcome, Stages};

#[derive(Parser, Debug)]
#[command(name = "pipeline", version, about = "Lead warehouse pipeline CLI")]
struct Cli {
    /// TOML configuration file. Built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Run against an in-memory catalog instead of DuckDB.
    #[arg(long, global = true)]
    dry_run: bool,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create bronze, silver and partition tables when missing
    Init,
    /// Landing files -> Bronze IPC -> bronze tables
    Ingest {
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
        ingest_date: Option<Date>,
    },
    /// Bronze IPC -> Silver IPC -> silver tables
    Clean {
        /// Only this dataset; both when omitted.
        #[arg(long, value_enum)]
        dataset: Option<DatasetArg>,
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
        ingest_date: Option<Date>,
    },
    /// Silver daily extract -> one table per partition date
    Partition {
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
        ingest_date: Option<Date>,
    },
    /// ingest, clean and partition in sequence
    Run {
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
        ingest_date: Option<Date>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DatasetArg {
    Snapshot,
    DailyExtract,
}

impl From<DatasetArg> for DatasetShape {
    fn from(d: DatasetArg) -> Self {
        match d {
            DatasetArg::Snapshot => DatasetShape::Snapshot,
            DatasetArg::DailyExtract => DatasetShape::DailyExtract,
        }
    }
}

fn parse_date(s: &str) -> Result<Date, String> {
    Date::parse(s, format_description!("[year]-[month]-[day]")).map_err(|e| e.to_string())
}

fn or_today(d: Option<Date>) -> Date {
    d.unwrap_or_else(|| OffsetDateTime::now_utc().date())
}

fn print_ingest(outcomes: &[IngestOutcome]) {
    for o in outcomes {
        println!(
            "INGEST OK dataset={} files={} skipped={} rows_in={} bytes_in={} loaded={} out={}",
            o.stats.dataset,
            o.stats.files_read,
            o.stats.files_skipped,
            o.stats.rows_in,
            o.stats.bytes_in,
            o.load.rows,
            o.stats.out_path.display()
        );
    }
}

fn print_clean(o: &CleanOutcome) {
    println!(
        "CLEAN OK dataset={} rows_in={} rows_out={} loaded={} silver={}",
        o.stats.dataset,
        o.stats.rows_in,
        o.stats.rows_out,
        o.load.rows,
        o.stats.silver_out.display()
    );
}

fn print_partition(o: &PartitionOutcome) {
    println!(
        "PARTITION OK slices={} rows={} out_of_range={} skipped_dates={} manifest={}",
        o.loads.len(),
        o.report.rows_partitioned,
        o.report.rows_out_of_range,
        o.report.skipped_dates.len(),
        o.manifest.display()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = PipelineConfig::load(cli.config.as_deref())?;
    let start = std::time::Instant::now();

    let catalog: Box<dyn Catalog> = if cli.dry_run {
        let memory = MemoryCatalog::new();
        duckdb_catalog::provision(&memory, &cfg)?;
        Box::new(memory)
    } else {
        Box::new(DuckDbCatalog::new(
            cfg.warehouse.duckdb_bin.clone(),
            cfg.warehouse.duckdb_path.clone(),
        ))
    };

    match cli.cmd {
        Commands::Init => {
            let created = Stages::new(&cfg, catalog.as_ref(), or_today(None)).init()?;
            println!("INIT OK tables={}", created.len());
        }
        Commands::Ingest { ingest_date } => {
            let stages = Stages::new(&cfg, catalog.as_ref(), or_today(ingest_date));
            print_ingest(&stages.ingest().await?);
        }
        Commands::Clean {
            dataset,
            ingest_date,
        } => {
            let stages = Stages::new(&cfg, catalog.as_ref(), or_today(ingest_date));
            let shapes = match dataset {
                Some(d) => vec![DatasetShape::from(d)],
                None => DatasetShape::ALL.to_vec(),
            };
            for shape in shapes {
                print_clean(&stages.clean(shape)?);
            }
        }
        Commands::Partition { ingest_date } => {
            let stages = Stages::new(&cfg, catalog.as_ref(), or_today(ingest_date));
            print_partition(&stages.partition()?);
        }
        Commands::Run { ingest_date } => {
            let stages = Stages::new(&cfg, catalog.as_ref(), or_today(ingest_date));
            let run = stages.run().await?;
            print_ingest(&run.ingest);
            for o in &run.clean {
                print_clean(o);
            }
            print_partition(&run.partition);
        }
    }
    let duration_pretty = humantime::format_duration(start.elapsed());
    println!("DONE in {}", duration_pretty);
    Ok(())
}
