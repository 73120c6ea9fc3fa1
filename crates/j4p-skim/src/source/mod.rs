//! Input partitions as one chunked event stream.
//!
//! A partition is a directory (local) or a path below the redirector (remote)
//! holding `Events.parquet` and `Runs.parquet`. Opening a partition reads the
//! `Events` footer and the small `Runs` table only; event batches are decoded
//! as the pipeline pulls them, so memory does not grow with the input size.
//! Remote `Events` files are downloaded to a spool directory first.
//!
//! Partitions are opened in parallel. One that cannot be reached or decoded
//! is skipped with a warning; one that opens but lacks a required column
//! aborts the run.

mod decode;
mod reader;

pub use self::decode::{
    ColumnPlan, EVENT, JET_COLUMNS, LUMI_BLOCK, MET_PHI, MET_PT, MUON_COLUMNS, PHOTON_COLUMNS, RUN,
};
pub use self::reader::{ParquetError, Table};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use j4p_core::{Error, Result};
use rayon::prelude::*;

use crate::config::{DEFAULT_CHUNK_SIZE, DEFAULT_REDIRECTOR, SkimConfig};

pub const EVENTS_TABLE: &str = "Events";
pub const RUNS_TABLE: &str = "Runs";

/// How partitions are located and chunked.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub is_local: bool,
    pub redirector: String,
    pub chunk_size: usize,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            is_local: true,
            redirector: DEFAULT_REDIRECTOR.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl SourceOptions {
    pub fn from_config(cfg: &SkimConfig) -> Self {
        Self {
            is_local: cfg.is_local,
            redirector: cfg.redirector.clone(),
            chunk_size: cfg.chunk_size,
        }
    }

    fn locate(&self, entry: &str) -> Locator {
        if self.is_local {
            Locator::Local(PathBuf::from(entry))
        } else {
            let base = self.redirector.trim_end_matches('/');
            Locator::Remote(format!("{base}/{}", entry.trim_start_matches('/')))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Locator {
    Local(PathBuf),
    Remote(String),
}

impl Locator {
    /// Local path of the `Events` file, downloading it into `spool` if remote.
    fn events_file(
        &self,
        spool: Option<&Path>,
        index: usize,
    ) -> std::result::Result<PathBuf, ParquetError> {
        match (self, spool) {
            (Locator::Local(dir), _) => Ok(dir.join(format!("{EVENTS_TABLE}.parquet"))),
            (Locator::Remote(prefix), Some(spool)) => {
                let dest = spool.join(format!("{index}-{EVENTS_TABLE}.parquet"));
                reader::download_parquet(&format!("{prefix}/{EVENTS_TABLE}.parquet"), &dest)?;
                Ok(dest)
            }
            (Locator::Remote(_), None) => {
                Err(ParquetError::Io(std::io::Error::other("no spool directory for remote input")))
            }
        }
    }

    fn runs_table(&self, batch_size: usize) -> std::result::Result<Table, ParquetError> {
        match self {
            Locator::Local(dir) => {
                let path = dir.join(format!("{RUNS_TABLE}.parquet"));
                reader::read_parquet_file(&path, None, batch_size)
            }
            Locator::Remote(prefix) => {
                let data = reader::fetch_parquet(&format!("{prefix}/{RUNS_TABLE}.parquet"))?;
                reader::read_parquet_bytes(data, None, batch_size)
            }
        }
    }
}

/// A contiguous entry range of one partition; the unit of parallel work.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub partition: Arc<str>,
    pub batch: RecordBatch,
}

#[derive(Debug)]
struct Partition {
    name: Arc<str>,
    events: PathBuf,
    n_events: usize,
    runs: Table,
}

impl Partition {
    /// `Events` batches of at most `batch_size` rows, decoded on demand.
    fn batches(
        &self,
        columns: &[String],
        batch_size: usize,
    ) -> Box<dyn Iterator<Item = Result<RecordBatch>> + Send> {
        match reader::stream_parquet_file(&self.events, columns, batch_size) {
            Ok(stream) => {
                let name = self.name.clone();
                Box::new(stream.map(move |b| {
                    b.map_err(|e| Error::Input(format!("{name}/{EVENTS_TABLE}.parquet: {e}")))
                }))
            }
            Err(e) => Box::new(std::iter::once(Err(table_error(&self.name, EVENTS_TABLE, e)))),
        }
    }
}

/// Every opened partition; events are read lazily through [`Self::chunks`].
#[derive(Debug)]
pub struct RecordSource {
    partitions: Vec<Partition>,
    columns: Vec<String>,
    chunk_size: usize,
    /// Downloaded remote `Events` files, removed on drop.
    _spool: Option<tempfile::TempDir>,
}

impl RecordSource {
    /// Open `entries` in parallel, checking `Events` against the columns of `plan`.
    pub fn open(entries: &[String], plan: &ColumnPlan, opts: &SourceOptions) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::Input("no input partitions given".into()));
        }
        let columns = plan.event_columns();
        let spool = if opts.is_local {
            None
        } else {
            Some(tempfile::Builder::new().prefix("j4p-spool-").tempdir()?)
        };
        let spool_dir = spool.as_ref().map(tempfile::TempDir::path);

        let opened: Vec<(String, Result<Partition>)> = entries
            .par_iter()
            .enumerate()
            .map(|(index, entry)| {
                let locator = opts.locate(entry);
                let opened =
                    open_partition(entry, &locator, &columns, opts.chunk_size, spool_dir, index);
                (entry.clone(), opened)
            })
            .collect();

        let mut partitions = Vec::with_capacity(opened.len());
        for (entry, result) in opened {
            match result {
                Ok(p) => partitions.push(p),
                Err(Error::Input(msg)) => {
                    tracing::warn!(
                        partition = %entry,
                        error = %msg,
                        "skipping unreachable partition"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        if partitions.is_empty() {
            return Err(Error::Input(format!(
                "none of the {} input partitions could be opened",
                entries.len()
            )));
        }

        let source =
            Self { partitions, columns, chunk_size: opts.chunk_size.max(1), _spool: spool };
        tracing::info!(
            partitions = source.partitions.len(),
            skipped = entries.len() - source.partitions.len(),
            events = source.n_events(),
            "record source opened"
        );
        Ok(source)
    }

    pub fn n_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Event count from the `Events` footers.
    pub fn n_events(&self) -> usize {
        self.partitions.iter().map(|p| p.n_events).sum()
    }

    /// Event entries in ranges of at most `chunk_size` rows, in partition
    /// order. Each batch is decoded only when the iterator reaches it.
    pub fn chunks(&self) -> impl Iterator<Item = Result<Chunk>> + Send + '_ {
        let size = self.chunk_size;
        self.partitions.iter().flat_map(move |p| {
            p.batches(&self.columns, size).flat_map(
                move |batch| -> Box<dyn Iterator<Item = Result<Chunk>> + Send> {
                    match batch {
                        Ok(b) => Box::new(split_batch(p.name.clone(), b, size).map(Ok)),
                        Err(e) => Box::new(std::iter::once(Err(e))),
                    }
                },
            )
        })
    }

    /// Runs tables of every opened partition, in partition order.
    pub fn runs(&self) -> Vec<RecordBatch> {
        self.partitions.iter().flat_map(|p| p.runs.batches.iter().cloned()).collect()
    }

    /// Schema of the first partition's Runs table.
    pub fn runs_schema(&self) -> Option<arrow::datatypes::SchemaRef> {
        self.partitions.first().map(|p| p.runs.schema.clone())
    }
}

fn split_batch(
    partition: Arc<str>,
    batch: RecordBatch,
    size: usize,
) -> impl Iterator<Item = Chunk> + Send {
    (0..batch.num_rows()).step_by(size).map(move |offset| {
        let len = size.min(batch.num_rows() - offset);
        Chunk { partition: partition.clone(), batch: batch.slice(offset, len) }
    })
}

fn table_error(entry: &str, table: &str, e: ParquetError) -> Error {
    match e {
        ParquetError::MissingColumn(column) => {
            Error::MissingColumn { table: table.to_string(), column, partition: entry.to_string() }
        }
        other => Error::Input(format!("{entry}/{table}.parquet: {other}")),
    }
}

fn open_partition(
    entry: &str,
    locator: &Locator,
    columns: &[String],
    batch_size: usize,
    spool: Option<&Path>,
    index: usize,
) -> Result<Partition> {
    let events = locator
        .events_file(spool, index)
        .map_err(|e| table_error(entry, EVENTS_TABLE, e))?;
    let n_events =
        reader::count_rows(&events, columns).map_err(|e| table_error(entry, EVENTS_TABLE, e))?;
    let runs = locator.runs_table(batch_size).map_err(|e| table_error(entry, RUNS_TABLE, e))?;
    tracing::debug!(partition = entry, events = n_events, "partition opened");
    Ok(Partition { name: entry.into(), events, n_events, runs })
}
