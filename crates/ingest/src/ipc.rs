use anyhow::{Context, Result};
use arrow::array::{Array, ArrayRef, RecordBatch, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::ipc::reader::FileReader as IpcReader;
use arrow::ipc::writer::FileWriter as IpcWriter;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use metadata::{Row, Table};
use std::fs::{create_dir_all, File};
use std::path::Path;
use std::sync::Arc;

const BATCH_SIZE: usize = 65_536;

/// Writes `table` as an Arrow IPC file with one nullable Utf8 column per table
/// column. Returns the number of rows written.
pub fn write_table_ipc(table: &Table, path: &Path) -> Result<u64> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir).with_context(|| format!("mkdir -p {}", dir.display()))?;
    }
    let fields: Vec<Field> = table
        .columns()
        .iter()
        .map(|name| Field::new(name.as_str(), DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let out_file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = IpcWriter::try_new(out_file, &schema)?;

    for chunk in table.rows().chunks(BATCH_SIZE) {
        let mut builders: Vec<StringBuilder> = (0..schema.fields().len())
            .map(|_| StringBuilder::with_capacity(chunk.len(), chunk.len() * 16))
            .collect();
        for row in chunk {
            for (b, cell) in builders.iter_mut().zip(row) {
                match cell {
                    Some(v) => b.append_value(v),
                    None => b.append_null(),
                }
            }
        }
        let cols: Vec<ArrayRef> = builders
            .iter_mut()
            .map(|b| Arc::new(b.finish()) as ArrayRef)
            .collect();
        writer.write(&RecordBatch::try_new(schema.clone(), cols)?)?;
    }
    writer.finish()?;
    Ok(table.len() as u64)
}

pub fn read_table_ipc(path: &Path) -> Result<Table> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = IpcReader::try_new(f, None)?;
    let schema = reader.schema();
    table_from_batches(&schema, reader).with_context(|| format!("read {}", path.display()))
}

/// Renders every column of every batch as text; nulls stay missing.
pub(crate) fn table_from_batches<I>(schema: &Schema, batches: I) -> Result<Table>
where
    I: IntoIterator<Item = Result<RecordBatch, ArrowError>>,
{
    let mut table = Table::new(schema.fields().iter().map(|f| f.name().as_str()))?;
    let opts = FormatOptions::default();
    for maybe_batch in batches {
        let batch = maybe_batch?;
        let formatters = batch
            .columns()
            .iter()
            .map(|arr| ArrayFormatter::try_new(arr.as_ref(), &opts))
            .collect::<Result<Vec<_>, _>>()?;
        for row in 0..batch.num_rows() {
            let cells: Row = batch
                .columns()
                .iter()
                .zip(&formatters)
                .map(|(arr, fmt)| {
                    if arr.is_null(row) {
                        None
                    } else {
                        Some(fmt.value(row).to_string())
                    }
                })
                .collect();
            table.push_row(cells)?;
        }
    }
    Ok(table)
}
