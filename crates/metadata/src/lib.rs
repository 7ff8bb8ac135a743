//! Dataset shapes, pipeline configuration, destinations and the shared text table.
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod config;
pub mod dataset;
pub mod table;

pub use config::{ConfigError, Layer, PartitionConfig, PipelineConfig};
pub use dataset::{DatasetShape, EXTRACTION_DATE, PARTITION_DATE, SNAPSHOT_INSERTED_AT};
pub use table::{Cell, Row, Table, TableError};

/// A warehouse table addressed as `schema.table`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub schema: String,
    pub table: String,
}

impl Destination {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}
