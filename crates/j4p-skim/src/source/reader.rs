//! Parquet table reading, from disk or over HTTP.

use std::fs::File;
use std::path::Path;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::file::reader::ChunkReader;

/// Error type for reading one input table.
#[derive(Debug, thiserror::Error)]
pub enum ParquetError {
    #[error("Parquet read error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("missing column '{0}'")]
    MissingColumn(String),
}

/// Fully decoded table: schema plus batches of at most `batch_size` rows.
#[derive(Debug, Clone)]
pub struct Table {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl Table {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

/// Read a whole local Parquet file, keeping only `columns` when given.
pub fn read_parquet_file(
    path: &Path,
    columns: Option<&[String]>,
    batch_size: usize,
) -> Result<Table, ParquetError> {
    let file = File::open(path)?;
    read_table(ParquetRecordBatchReaderBuilder::try_new(file)?, columns, batch_size)
}

/// Read Parquet data already held in memory.
pub fn read_parquet_bytes(
    data: bytes::Bytes,
    columns: Option<&[String]>,
    batch_size: usize,
) -> Result<Table, ParquetError> {
    read_table(ParquetRecordBatchReaderBuilder::try_new(data)?, columns, batch_size)
}

/// Row count of a local Parquet file, read from its footer.
///
/// Fails with [`ParquetError::MissingColumn`] if any of `columns` is absent,
/// without decoding a single row group.
pub fn count_rows(path: &Path, columns: &[String]) -> Result<usize, ParquetError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    let rows = builder.metadata().file_metadata().num_rows();
    project(builder, Some(columns))?;
    Ok(usize::try_from(rows).unwrap_or_default())
}

/// Lazy batch reader over a local Parquet file; row groups are decoded as
/// batches are pulled.
pub fn stream_parquet_file(
    path: &Path,
    columns: &[String],
    batch_size: usize,
) -> Result<ParquetRecordBatchReader, ParquetError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    Ok(project(builder, Some(columns))?.with_batch_size(batch_size.max(1)).build()?)
}

/// Download a small remote Parquet file into memory.
pub fn fetch_parquet(url: &str) -> Result<bytes::Bytes, ParquetError> {
    tracing::debug!(url, "fetching");
    let resp = reqwest::blocking::get(url)?.error_for_status()?;
    Ok(resp.bytes()?)
}

/// Copy a remote Parquet file to `dest` without holding it in memory.
pub fn download_parquet(url: &str, dest: &Path) -> Result<u64, ParquetError> {
    tracing::debug!(url, dest = %dest.display(), "downloading");
    let mut resp = reqwest::blocking::get(url)?.error_for_status()?;
    let mut file = File::create(dest)?;
    Ok(resp.copy_to(&mut file)?)
}

fn project<T: ChunkReader + 'static>(
    builder: ParquetRecordBatchReaderBuilder<T>,
    columns: Option<&[String]>,
) -> Result<ParquetRecordBatchReaderBuilder<T>, ParquetError> {
    let Some(names) = columns else {
        return Ok(builder);
    };
    let schema = builder.schema();
    let mut roots = Vec::with_capacity(names.len());
    for name in names {
        let idx = schema.index_of(name).map_err(|_| ParquetError::MissingColumn(name.clone()))?;
        roots.push(idx);
    }
    let mask = ProjectionMask::roots(builder.parquet_schema(), roots);
    Ok(builder.with_projection(mask))
}

fn read_table<T: ChunkReader + 'static>(
    builder: ParquetRecordBatchReaderBuilder<T>,
    columns: Option<&[String]>,
    batch_size: usize,
) -> Result<Table, ParquetError> {
    let reader = project(builder, columns)?.with_batch_size(batch_size.max(1)).build()?;
    let schema = reader.schema();
    let batches: Result<Vec<_>, _> = reader.collect();
    Ok(Table { schema, batches: batches? })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::UInt32Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use parquet::arrow::ArrowWriter;
    use std::sync::Arc;

    fn write_runs(path: &Path, rows: u32) {
        let schema = Arc::new(Schema::new(vec![
            Field::new("run", DataType::UInt32, false),
            Field::new("luminosityBlock", DataType::UInt32, false),
        ]));
        let values = Arc::new(UInt32Array::from_iter_values(0..rows));
        let batch = RecordBatch::try_new(schema.clone(), vec![values.clone(), values]).unwrap();
        let mut writer = ArrowWriter::try_new(File::create(path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn footer_gives_rows_and_checks_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.parquet");
        write_runs(&path, 25);

        assert_eq!(count_rows(&path, &["run".to_string()]).unwrap(), 25);
        let err = count_rows(&path, &["event".to_string()]).unwrap_err();
        assert!(matches!(err, ParquetError::MissingColumn(c) if c == "event"));
    }

    #[test]
    fn stream_yields_projected_batches_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.parquet");
        write_runs(&path, 25);

        let reader = stream_parquet_file(&path, &["run".to_string()], 10).unwrap();
        assert_eq!(reader.schema().fields().len(), 1);
        let sizes: Vec<usize> = reader.map(|b| b.unwrap().num_rows()).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
    }
}
