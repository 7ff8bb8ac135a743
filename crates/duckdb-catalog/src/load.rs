use crate::{Catalog, CatalogError};
use metadata::{Destination, Table};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("destination schema unknown: {destination}")]
    SchemaUnknown { destination: Destination },
    #[error("schema mismatch for {destination}: missing columns {missing:?}")]
    SchemaMismatch {
        destination: Destination,
        missing: Vec<String>,
    },
    #[error("{destination}: appended {appended} rows, expected {expected}")]
    PartialAppend {
        destination: Destination,
        expected: u64,
        appended: u64,
    },
    #[error("catalog call for {destination} failed")]
    Catalog {
        destination: Destination,
        #[source]
        source: CatalogError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStats {
    pub destination: Destination,
    pub rows: u64,
    /// Columns of the input the destination does not accept.
    pub dropped_columns: Vec<String>,
}

/// Appends `table` to `dest`, projected onto the columns the catalog reports for it.
///
/// Nothing is written when the destination is unknown or lacks a column of the
/// input's projection. Append only: loading the same table twice stores its rows
/// twice.
pub fn load_table<C: Catalog + ?Sized>(
    catalog: &C,
    dest: &Destination,
    table: &Table,
) -> Result<LoadStats, LoadError> {
    let catalog_err = |source| LoadError::Catalog {
        destination: dest.clone(),
        source,
    };

    let accepted = catalog.columns_for(dest).map_err(catalog_err)?;
    if accepted.is_empty() {
        return Err(LoadError::SchemaUnknown {
            destination: dest.clone(),
        });
    }
    let projected = table
        .project(&accepted)
        .map_err(|missing| LoadError::SchemaMismatch {
            destination: dest.clone(),
            missing,
        })?;
    let dropped_columns: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| !accepted.contains(*c))
        .cloned()
        .collect();
    if !dropped_columns.is_empty() {
        debug!(destination = %dest, columns = ?dropped_columns, "columns not accepted, dropped");
    }

    let expected = projected.len() as u64;
    let appended = catalog.append_rows(dest, &projected).map_err(catalog_err)?;
    if appended != expected {
        return Err(LoadError::PartialAppend {
            destination: dest.clone(),
            expected,
            appended,
        });
    }
    info!(destination = %dest, rows = appended, "loaded");
    Ok(LoadStats {
        destination: dest.clone(),
        rows: appended,
        dropped_columns,
    })
}
