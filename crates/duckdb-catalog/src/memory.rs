use crate::{Catalog, CatalogError};
use metadata::{Destination, Table};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Catalog kept in process memory, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tables: Mutex<BTreeMap<Destination, Table>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, BTreeMap<Destination, Table>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the stored rows of `dest`.
    pub fn table(&self, dest: &Destination) -> Option<Table> {
        self.tables().get(dest).cloned()
    }
}

impl Catalog for MemoryCatalog {
    fn columns_for(&self, dest: &Destination) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .tables()
            .get(dest)
            .map(|t| t.columns().to_vec())
            .unwrap_or_default())
    }

    fn append_rows(&self, dest: &Destination, table: &Table) -> Result<u64, CatalogError> {
        let mut tables = self.tables();
        let stored = tables.get_mut(dest).ok_or_else(|| CatalogError::Rejected {
            destination: dest.to_string(),
            reason: "table does not exist".into(),
        })?;
        if stored.columns() != table.columns() {
            return Err(CatalogError::Rejected {
                destination: dest.to_string(),
                reason: format!("columns {:?} do not match {:?}", table.columns(), stored.columns()),
            });
        }
        for row in table.rows() {
            stored
                .push_row(row.clone())
                .map_err(|e| CatalogError::Rejected {
                    destination: dest.to_string(),
                    reason: e.to_string(),
                })?;
        }
        Ok(table.len() as u64)
    }

    fn ensure_table(&self, dest: &Destination, columns: &[&str]) -> Result<(), CatalogError> {
        let mut tables = self.tables();
        if !tables.contains_key(dest) {
            let t = Table::new(columns.iter().copied()).map_err(|e| CatalogError::Rejected {
                destination: dest.to_string(),
                reason: e.to_string(),
            })?;
            tables.insert(dest.clone(), t);
        }
        Ok(())
    }
}
