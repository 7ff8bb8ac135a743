//! Landing-zone reader: retrieved payloads keyed by logical name.
use csv_async::{AsyncReaderBuilder, StringRecord};
use futures::StreamExt;
use metadata::{Row, Table};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::BufReader;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("payload not found: {key} ({})", .path.display())]
    NotFound { key: String, path: PathBuf },
    #[error("payload {key} is unreadable: {source}")]
    Unreadable {
        key: String,
        #[source]
        source: BoxError,
    },
}

fn unreadable(key: &str, source: impl Into<BoxError>) -> SourceError {
    SourceError::Unreadable {
        key: key.to_string(),
        source: source.into(),
    }
}

/// A fully materialized payload.
#[derive(Debug, Clone)]
pub struct Landed {
    pub key: String,
    pub table: Table,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct LandingSource {
    root: PathBuf,
}

impl LandingSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, SourceError> {
        let path = self.root.join(key);
        if !path.is_file() {
            return Err(SourceError::NotFound {
                key: key.to_string(),
                path,
            });
        }
        Ok(path)
    }

    /// Reads a comma-separated payload with a header row. Cells are trimmed; empty
    /// cells and short rows become missing.
    pub async fn read_csv(&self, key: &str) -> Result<Landed, SourceError> {
        let path = self.resolve(key)?;
        let f = tokio::fs::File::open(&path)
            .await
            .map_err(|e| unreadable(key, e))?;
        let bytes = f.metadata().await.map_err(|e| unreadable(key, e))?.len();
        let mut rdr = AsyncReaderBuilder::new()
            .has_headers(true)
            .delimiter(b',')
            .flexible(true)
            .create_reader(BufReader::new(f));

        let headers: StringRecord = rdr.headers().await.map_err(|e| unreadable(key, e))?.clone();
        let mut table = Table::new(headers.iter().map(str::trim)).map_err(|e| unreadable(key, e))?;
        let width = table.columns().len();

        let mut records = rdr.records();
        while let Some(rec_res) = records.next().await {
            let rec = rec_res.map_err(|e| unreadable(key, e))?;
            let row: Row = (0..width)
                .map(|i| {
                    rec.get(i)
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                })
                .collect();
            table.push_row(row).map_err(|e| unreadable(key, e))?;
        }

        Ok(Landed {
            key: key.to_string(),
            table,
            bytes,
        })
    }

    /// Reads a Parquet payload; every column is rendered as text.
    pub fn read_parquet(&self, key: &str) -> Result<Landed, SourceError> {
        let path = self.resolve(key)?;
        let file = std::fs::File::open(&path).map_err(|e| unreadable(key, e))?;
        let bytes = file.metadata().map_err(|e| unreadable(key, e))?.len();
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| unreadable(key, e))?;
        let schema = builder.schema().clone();
        let reader = builder.build().map_err(|e| unreadable(key, e))?;
        let table = crate::ipc::table_from_batches(&schema, reader).map_err(|e| unreadable(key, e))?;
        Ok(Landed {
            key: key.to_string(),
            table,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn csv_cells_are_trimmed_and_empty_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("1.csv"),
            "ENTRYDATE, CITY ,ZIP\n01-10-2024,  Austin ,\n02-10-2024\n",
        )
        .unwrap();
        let src = LandingSource::new(dir.path());
        let landed = src.read_csv("1.csv").await.unwrap();
        let t = &landed.table;
        assert_eq!(t.columns(), &["ENTRYDATE", "CITY", "ZIP"].map(String::from));
        assert_eq!(t.len(), 2);
        assert_eq!(t.value(0, 1), Some("Austin"));
        assert_eq!(t.value(0, 2), None);
        assert_eq!(t.value(1, 1), None);
        assert!(landed.bytes > 0);
    }

    #[tokio::test]
    async fn missing_payload_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let src = LandingSource::new(dir.path());
        let err = src.read_csv("daily/9.csv").await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound { ref key, .. } if key == "daily/9.csv"));
        assert!(matches!(src.read_parquet("leads.parquet"), Err(SourceError::NotFound { .. })));
    }

    #[test]
    fn garbage_parquet_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("leads.parquet"), b"not parquet at all").unwrap();
        let src = LandingSource::new(dir.path());
        assert!(matches!(
            src.read_parquet("leads.parquet"),
            Err(SourceError::Unreadable { .. })
        ));
    }
}
