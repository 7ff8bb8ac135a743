use crate::{Catalog, CatalogError};
use metadata::{DatasetShape, Destination, PipelineConfig};
use tracing::info;

/// Every destination the pipeline writes to, with its text columns: bronze and
/// silver per shape, then one table per partition date.
pub fn planned_tables(cfg: &PipelineConfig) -> Vec<(Destination, Vec<&'static str>)> {
    let mut out = Vec::new();
    for shape in DatasetShape::ALL {
        out.push((cfg.bronze_destination(shape).clone(), shape.bronze_columns()));
        out.push((cfg.silver_destination(shape).clone(), shape.silver_columns()));
    }
    let partition_columns = DatasetShape::DailyExtract.silver_columns();
    for i in 1..=cfg.partition.dates().len() {
        out.push((cfg.partition.destination_for(i), partition_columns.clone()));
    }
    out
}

/// Creates any missing schema or table. Existing tables are left as they are.
pub fn provision<C: Catalog + ?Sized>(
    catalog: &C,
    cfg: &PipelineConfig,
) -> Result<Vec<Destination>, CatalogError> {
    let mut created = Vec::new();
    for (dest, columns) in planned_tables(cfg) {
        catalog.ensure_table(&dest, &columns)?;
        created.push(dest);
    }
    info!(tables = created.len(), "catalog provisioned");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCatalog;

    #[test]
    fn provisions_layers_and_partitions() {
        let cfg = PipelineConfig::default();
        let cat = MemoryCatalog::new();
        let dests = provision(&cat, &cfg).unwrap();
        assert_eq!(dests.len(), 4 + 22);

        let bronze = Destination::new("bronze", "csv_snapshots");
        assert_eq!(
            cat.columns_for(&bronze).unwrap(),
            DatasetShape::DailyExtract.bronze_columns()
        );
        let part = Destination::new("silver", "stg_csv_data_22");
        assert_eq!(
            cat.columns_for(&part).unwrap(),
            DatasetShape::DailyExtract.silver_columns()
        );
        assert!(cat
            .columns_for(&Destination::new("silver", "stg_leads_parquet"))
            .unwrap()
            .contains(&"lead_uuid".to_string()));
    }
}
