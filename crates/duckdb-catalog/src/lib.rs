//! Warehouse access: the catalog seam, its DuckDB and in-memory implementations,
//! and the schema-aware loader built on top of it.

use metadata::{Destination, Table};
use thiserror::Error;

pub mod duck;
pub mod load;
pub mod memory;
pub mod provision;

pub use duck::DuckDbCatalog;
pub use load::{load_table, LoadError, LoadStats};
pub use memory::MemoryCatalog;
pub use provision::{provision, planned_tables};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to spawn {bin}: {source}. Is DuckDB installed?")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },
    #[error("duckdb exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("unexpected duckdb output: {0}")]
    Output(String),
    #[error("staging file: {0}")]
    Io(#[from] std::io::Error),
    #[error("staging csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("{destination} rejected the batch: {reason}")]
    Rejected { destination: String, reason: String },
}

/// Read/write contract with the relational engine. Calls block; nothing retries.
pub trait Catalog {
    /// Accepted columns of `dest`, in table order. Empty when the table is unknown.
    fn columns_for(&self, dest: &Destination) -> Result<Vec<String>, CatalogError>;

    /// Appends every row of `table` (already in destination column order) in one
    /// transaction and returns the number of rows the engine reports as appended.
    fn append_rows(&self, dest: &Destination, table: &Table) -> Result<u64, CatalogError>;

    /// Creates `dest` with text columns when it does not exist yet.
    fn ensure_table(&self, dest: &Destination, columns: &[&str]) -> Result<(), CatalogError>;
}
