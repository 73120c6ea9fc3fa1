//! Writes the skimmed `Events` table, the passthrough `Runs` table and the
//! cutflow report.
//!
//! All files are written into a hidden staging directory next to the target,
//! which is renamed into place once every file is complete. A failed run
//! leaves neither a partial table nor a partial set of tables behind.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int32Array, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use j4p_core::{Error, Result, SkimRecord};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde::Serialize;

use crate::cutflow::Cutflow;
use crate::trigger::MANDATORY_FLAGS;

/// Highest ZSTD level.
pub const ZSTD_LEVEL: i32 = 22;

pub const EVENTS_FILE: &str = "Events.parquet";
pub const RUNS_FILE: &str = "Runs.parquet";
pub const CUTFLOW_FILE: &str = "cutflow.json";

/// Where one run's outputs were written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    pub dir: PathBuf,
    pub events: PathBuf,
    pub runs: PathBuf,
    pub cutflow: PathBuf,
}

pub struct OutputMaterializer {
    dir: PathBuf,
    triggers: Vec<String>,
}

impl OutputMaterializer {
    /// Writer into `dir`; `triggers` names the trigger bit columns.
    pub fn new(dir: impl Into<PathBuf>, triggers: &[String]) -> Self {
        Self { dir: dir.into(), triggers: triggers.to_vec() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Schema of the skimmed `Events` table.
    pub fn events_schema(&self) -> SchemaRef {
        let mut fields = vec![
            Field::new("run", DataType::UInt32, false),
            Field::new("luminosityBlock", DataType::UInt32, false),
            Field::new("event", DataType::UInt64, false),
            Field::new("nJet", DataType::UInt32, false),
        ];
        let f64_fields = |names: &[&str]| -> Vec<Field> {
            names.iter().map(|n| Field::new(*n, DataType::Float64, false)).collect()
        };
        let i32_fields = |names: &[&str]| -> Vec<Field> {
            names.iter().map(|n| Field::new(*n, DataType::Int32, false)).collect()
        };
        fields.extend(f64_fields(&[
            "PuppiMET_pt",
            "PuppiMET_phi",
            "Tag_pt",
            "Tag_eta",
            "Tag_phi",
            "Tag_mass",
        ]));
        fields.extend(i32_fields(&["Tag_label"]));
        fields.extend(f64_fields(&["Probe_pt", "Probe_eta", "Probe_phi", "Probe_mass"]));
        fields.extend(i32_fields(&["Probe_jetId"]));
        fields.extend(f64_fields(&["Probe_area"]));
        fields.extend(i32_fields(&["Probe_nConstituents", "Probe_nElectrons", "Probe_nMuons"]));
        fields.extend(f64_fields(&[
            "Probe_chEmEF",
            "Probe_neEmEF",
            "Probe_chHEF",
            "Probe_neHEF",
            "Probe_rawFactor",
            "JetActivity_pt",
            "JetActivity_eta",
            "JetActivity_phi",
            "JetActivity_mass",
            "DB_direct",
            "DB_ratio",
            "MPF_tag",
            "MPF_probe",
            "HDM_tag",
            "HDM_probe",
            "weight",
        ]));
        for name in self.triggers.iter().map(String::as_str).chain(MANDATORY_FLAGS) {
            if fields.iter().all(|f| f.name() != name) {
                fields.push(Field::new(name, DataType::Boolean, false));
            }
        }
        Arc::new(Schema::new(fields))
    }

    /// Build the `Events` batch; column order matches [`Self::events_schema`].
    pub fn events_batch(&self, records: &[SkimRecord]) -> Result<RecordBatch> {
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.run))),
            Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.luminosity_block))),
            Arc::new(UInt64Array::from_iter_values(records.iter().map(|r| r.event))),
            Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.n_jet))),
            f64_col(records, |r| r.met.pt),
            f64_col(records, |r| r.met.phi),
            f64_col(records, |r| r.tag.pt),
            f64_col(records, |r| r.tag.eta),
            f64_col(records, |r| r.tag.phi),
            f64_col(records, |r| r.tag.mass),
            i32_col(records, |r| r.tag.label),
            f64_col(records, |r| r.probe.pt),
            f64_col(records, |r| r.probe.eta),
            f64_col(records, |r| r.probe.phi),
            f64_col(records, |r| r.probe.mass),
            i32_col(records, |r| r.probe.jet.jet_id),
            f64_col(records, |r| r.probe.jet.area),
            i32_col(records, |r| r.probe.jet.n_constituents),
            i32_col(records, |r| r.probe.jet.n_electrons),
            i32_col(records, |r| r.probe.jet.n_muons),
            f64_col(records, |r| r.probe.jet.ch_em_ef),
            f64_col(records, |r| r.probe.jet.ne_em_ef),
            f64_col(records, |r| r.probe.jet.ch_hef),
            f64_col(records, |r| r.probe.jet.ne_hef),
            f64_col(records, |r| r.probe.jet.raw_factor),
            f64_col(records, |r| r.activity.pt),
            f64_col(records, |r| r.activity.eta),
            f64_col(records, |r| r.activity.phi),
            f64_col(records, |r| r.activity.mass),
            f64_col(records, |r| r.observables.db_direct),
            f64_col(records, |r| r.observables.db_ratio),
            f64_col(records, |r| r.observables.mpf_tag),
            f64_col(records, |r| r.observables.mpf_probe),
            f64_col(records, |r| r.observables.hdm_tag),
            f64_col(records, |r| r.observables.hdm_probe),
            f64_col(records, |r| r.observables.weight),
        ];

        let schema = self.events_schema();
        for field in schema.fields().iter().skip(columns.len()) {
            let name = field.name();
            let bits: Vec<bool> = if let Some(k) = self.triggers.iter().position(|t| t == name) {
                records.iter().map(|r| r.triggers.get(k).copied().unwrap_or(false)).collect()
            } else if let Some(k) = MANDATORY_FLAGS.iter().position(|f| *f == name.as_str()) {
                records.iter().map(|r| r.flags.get(k).copied().unwrap_or(false)).collect()
            } else {
                return Err(Error::Output(format!("no source for bit column '{name}'")));
            };
            columns.push(Arc::new(BooleanArray::from(bits)));
        }

        RecordBatch::try_new(schema, columns)
            .map_err(|e| Error::Output(format!("building Events: {e}")))
    }

    /// Write `Events.parquet`, `Runs.parquet` and `cutflow.json`.
    ///
    /// An existing directory at the target path is replaced.
    pub fn write(
        &self,
        records: &[SkimRecord],
        runs_schema: SchemaRef,
        runs: &[RecordBatch],
        cutflow: &Cutflow,
    ) -> Result<OutputPaths> {
        check_runs_schema(&runs_schema, runs)?;
        let events = self.events_batch(records)?;

        let parent = match self.dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;
        let staging = tempfile::Builder::new().prefix(".j4p-staging-").tempdir_in(parent)?;
        let events_path = staging.path().join(EVENTS_FILE);
        write_parquet(&events_path, events.schema(), std::slice::from_ref(&events))?;
        write_parquet(&staging.path().join(RUNS_FILE), runs_schema, runs)?;
        write_file(&staging.path().join(CUTFLOW_FILE), |w| {
            serde_json::to_writer_pretty(&mut *w, &cutflow.histograms())?;
            w.write_all(b"\n")?;
            Ok(())
        })?;
        self.replace_dir(staging, parent)?;

        tracing::info!(
            dir = %self.dir.display(),
            events = records.len(),
            runs = runs.iter().map(RecordBatch::num_rows).sum::<usize>(),
            "output written"
        );
        Ok(OutputPaths {
            dir: self.dir.clone(),
            events: self.dir.join(EVENTS_FILE),
            runs: self.dir.join(RUNS_FILE),
            cutflow: self.dir.join(CUTFLOW_FILE),
        })
    }

    /// Move a complete staging directory to the target path.
    fn replace_dir(&self, staging: tempfile::TempDir, parent: &Path) -> Result<()> {
        let rename_err = |e: std::io::Error| {
            Error::Output(format!("moving output to {}: {e}", self.dir.display()))
        };
        if !self.dir.exists() {
            return std::fs::rename(staging.path(), &self.dir).map_err(rename_err);
        }

        tracing::warn!(dir = %self.dir.display(), "replacing existing output directory");
        // previous output is moved aside and removed when `old` drops
        let old = tempfile::Builder::new().prefix(".j4p-old-").tempdir_in(parent)?;
        let aside = old.path().join("previous");
        std::fs::rename(&self.dir, &aside).map_err(rename_err)?;
        if let Err(e) = std::fs::rename(staging.path(), &self.dir) {
            if let Err(restore) = std::fs::rename(&aside, &self.dir) {
                tracing::error!(error = %restore, "could not restore previous output");
            }
            return Err(rename_err(e));
        }
        Ok(())
    }
}

fn f64_col(records: &[SkimRecord], f: impl Fn(&SkimRecord) -> f64) -> ArrayRef {
    Arc::new(Float64Array::from_iter_values(records.iter().map(f)))
}

fn i32_col(records: &[SkimRecord], f: impl Fn(&SkimRecord) -> i32) -> ArrayRef {
    Arc::new(Int32Array::from_iter_values(records.iter().map(f)))
}

/// Runs tables are passed through unchanged; every partition must share one schema.
fn check_runs_schema(schema: &SchemaRef, runs: &[RecordBatch]) -> Result<()> {
    for b in runs {
        if b.schema().fields() != schema.fields() {
            return Err(Error::Validation(format!(
                "Runs tables have different schemas: {:?} vs {:?}",
                schema.fields(),
                b.schema().fields()
            )));
        }
    }
    Ok(())
}

fn writer_properties() -> Result<WriterProperties> {
    let level = ZstdLevel::try_new(ZSTD_LEVEL).map_err(|e| Error::Output(e.to_string()))?;
    Ok(WriterProperties::builder().set_compression(Compression::ZSTD(level)).build())
}

/// Write `batches` as one Parquet file, creating it even when there are no rows.
pub fn write_parquet(path: &Path, schema: SchemaRef, batches: &[RecordBatch]) -> Result<()> {
    let props = writer_properties()?;
    let output_err = |e: parquet::errors::ParquetError| {
        Error::Output(format!("{}: {e}", path.display()))
    };
    write_file(path, |file| {
        let mut writer = ArrowWriter::try_new(file, schema, Some(props)).map_err(output_err)?;
        for batch in batches {
            writer.write(batch).map_err(output_err)?;
        }
        writer.close().map_err(output_err)?;
        Ok(())
    })
}

fn write_file(path: &Path, fill: impl FnOnce(&mut std::fs::File) -> Result<()>) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    fill(&mut file)?;
    file.sync_all()?;
    Ok(())
}
