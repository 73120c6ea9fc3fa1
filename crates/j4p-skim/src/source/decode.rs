//! Column plan and Arrow → [`Event`] decoding.
//!
//! Input tables store floats as Float32 or Float64 and integers with any
//! width or signedness; every column is cast to the record's field type.
//! Per-object columns are `List`/`LargeList` arrays whose rows share offsets
//! within one collection.

use std::collections::HashSet;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::{CastOptions, cast_with_options};
use arrow::datatypes::{DataType, Float64Type, Int32Type, UInt32Type, UInt64Type};
use arrow::record_batch::RecordBatch;
use j4p_core::{Dataset, Error, Event, Jets, Met, Muons, Photons, Result};

use crate::trigger::MANDATORY_FLAGS;

pub const RUN: &str = "run";
pub const LUMI_BLOCK: &str = "luminosityBlock";
pub const EVENT: &str = "event";
pub const MET_PT: &str = "PuppiMET_pt";
pub const MET_PHI: &str = "PuppiMET_phi";

/// Per-jet columns, in [`Jets`] field order.
pub const JET_COLUMNS: [&str; 14] = [
    "Jet_pt",
    "Jet_eta",
    "Jet_phi",
    "Jet_mass",
    "Jet_jetId",
    "Jet_area",
    "Jet_nConstituents",
    "Jet_nElectrons",
    "Jet_nMuons",
    "Jet_chEmEF",
    "Jet_neEmEF",
    "Jet_chHEF",
    "Jet_neHEF",
    "Jet_rawFactor",
];

pub const MUON_COLUMNS: [&str; 7] = [
    "Muon_pt",
    "Muon_eta",
    "Muon_phi",
    "Muon_mass",
    "Muon_charge",
    "Muon_pfRelIso04_all",
    "Muon_tightId",
];

pub const PHOTON_COLUMNS: [&str; 3] = ["Photon_pt", "Photon_eta", "Photon_phi"];

/// Which `Events` columns a pipeline reads, and how to turn them into events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    dataset: Dataset,
    triggers: Vec<String>,
}

impl ColumnPlan {
    pub fn new(dataset: Dataset, triggers: &[String]) -> Self {
        Self { dataset, triggers: triggers.to_vec() }
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }

    fn reads_muons(&self) -> bool {
        self.dataset == Dataset::Zjet
    }

    fn reads_photons(&self) -> bool {
        self.dataset == Dataset::Egamma
    }

    /// Every column to project from `Events`, without duplicates.
    pub fn event_columns(&self) -> Vec<String> {
        let mut cols: Vec<&str> = vec![RUN, LUMI_BLOCK, EVENT, MET_PT, MET_PHI];
        cols.extend(JET_COLUMNS);
        if self.reads_muons() {
            cols.extend(MUON_COLUMNS);
        }
        if self.reads_photons() {
            cols.extend(PHOTON_COLUMNS);
        }
        cols.extend(self.triggers.iter().map(String::as_str));
        cols.extend(MANDATORY_FLAGS);

        let mut seen = HashSet::new();
        cols.into_iter().filter(|c| seen.insert(*c)).map(str::to_string).collect()
    }

    /// Decode every row of `batch`. `partition` only labels errors.
    pub fn decode(&self, batch: &RecordBatch, partition: &str) -> Result<Vec<Event>> {
        let cols = Columns { batch, partition };

        let run = cols.flat(RUN, to_u32)?;
        let lumi = cols.flat(LUMI_BLOCK, to_u32)?;
        let event = cols.flat(EVENT, to_u64)?;
        let met_pt = cols.flat(MET_PT, to_f64)?;
        let met_phi = cols.flat(MET_PHI, to_f64)?;

        let [pt, eta, phi, mass, jet_id, area, n_const, n_el, n_mu, ch_em, ne_em, ch_h, ne_h, raw] =
            JET_COLUMNS;
        let jet_pt = cols.jagged(pt, to_f64)?;
        let jet_eta = cols.jagged(eta, to_f64)?;
        let jet_phi = cols.jagged(phi, to_f64)?;
        let jet_mass = cols.jagged(mass, to_f64)?;
        let jet_id = cols.jagged(jet_id, to_i32)?;
        let jet_area = cols.jagged(area, to_f64)?;
        let jet_n_const = cols.jagged(n_const, to_i32)?;
        let jet_n_el = cols.jagged(n_el, to_i32)?;
        let jet_n_mu = cols.jagged(n_mu, to_i32)?;
        let jet_ch_em = cols.jagged(ch_em, to_f64)?;
        let jet_ne_em = cols.jagged(ne_em, to_f64)?;
        let jet_ch_h = cols.jagged(ch_h, to_f64)?;
        let jet_ne_h = cols.jagged(ne_h, to_f64)?;
        let jet_raw = cols.jagged(raw, to_f64)?;

        let muons = if self.reads_muons() {
            let [pt, eta, phi, mass, charge, iso, tight] = MUON_COLUMNS;
            Some((
                cols.jagged(pt, to_f64)?,
                cols.jagged(eta, to_f64)?,
                cols.jagged(phi, to_f64)?,
                cols.jagged(mass, to_f64)?,
                cols.jagged(charge, to_i32)?,
                cols.jagged(iso, to_f64)?,
                cols.jagged(tight, to_bool)?,
            ))
        } else {
            None
        };

        let photons = if self.reads_photons() {
            let [pt, eta, phi] = PHOTON_COLUMNS;
            Some((cols.jagged(pt, to_f64)?, cols.jagged(eta, to_f64)?, cols.jagged(phi, to_f64)?))
        } else {
            None
        };

        let triggers =
            self.triggers.iter().map(|t| cols.flat(t, to_bool)).collect::<Result<Vec<_>>>()?;
        let flags =
            MANDATORY_FLAGS.iter().map(|f| cols.flat(f, to_bool)).collect::<Result<Vec<_>>>()?;

        let mut events = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let jets = Jets {
                pt: jet_pt.row(i),
                eta: jet_eta.row(i),
                phi: jet_phi.row(i),
                mass: jet_mass.row(i),
                jet_id: jet_id.row(i),
                area: jet_area.row(i),
                n_constituents: jet_n_const.row(i),
                n_electrons: jet_n_el.row(i),
                n_muons: jet_n_mu.row(i),
                ch_em_ef: jet_ch_em.row(i),
                ne_em_ef: jet_ne_em.row(i),
                ch_hef: jet_ch_h.row(i),
                ne_hef: jet_ne_h.row(i),
                raw_factor: jet_raw.row(i),
            };
            if !jets.is_aligned() {
                return Err(misaligned(partition, "Jet", event[i]));
            }

            let muons = match &muons {
                Some((pt, eta, phi, mass, charge, iso, tight)) => {
                    let m = Muons {
                        pt: pt.row(i),
                        eta: eta.row(i),
                        phi: phi.row(i),
                        mass: mass.row(i),
                        charge: charge.row(i),
                        pf_rel_iso04_all: iso.row(i),
                        tight_id: tight.row(i),
                    };
                    let n = m.len();
                    let aligned = [
                        m.eta.len(),
                        m.phi.len(),
                        m.mass.len(),
                        m.charge.len(),
                        m.pf_rel_iso04_all.len(),
                        m.tight_id.len(),
                    ]
                    .iter()
                    .all(|&l| l == n);
                    if !aligned {
                        return Err(misaligned(partition, "Muon", event[i]));
                    }
                    m
                }
                None => Muons::default(),
            };

            let photons = match &photons {
                Some((pt, eta, phi)) => {
                    let p = Photons { pt: pt.row(i), eta: eta.row(i), phi: phi.row(i) };
                    if p.eta.len() != p.len() || p.phi.len() != p.len() {
                        return Err(misaligned(partition, "Photon", event[i]));
                    }
                    p
                }
                None => Photons::default(),
            };

            events.push(Event {
                run: run[i],
                luminosity_block: lumi[i],
                event: event[i],
                jets,
                muons,
                photons,
                met: Met { pt: met_pt[i], phi: met_phi[i] },
                triggers: triggers.iter().map(|t| t[i]).collect(),
                flags: flags.iter().map(|f| f[i]).collect(),
            });
        }
        Ok(events)
    }
}

fn misaligned(partition: &str, collection: &str, event: u64) -> Error {
    Error::Input(format!(
        "{partition}: {collection}_* columns of event {event} have different lengths"
    ))
}

type Convert<T> = fn(&ArrayRef, &str) -> Result<Vec<T>>;

/// Flattened list column: row `i` is `values[offsets[i]..offsets[i + 1]]`.
struct Jagged<T> {
    offsets: Vec<usize>,
    values: Vec<T>,
}

impl<T: Copy> Jagged<T> {
    fn row(&self, i: usize) -> Vec<T> {
        self.values[self.offsets[i]..self.offsets[i + 1]].to_vec()
    }
}

struct Columns<'a> {
    batch: &'a RecordBatch,
    partition: &'a str,
}

impl Columns<'_> {
    fn get(&self, name: &str) -> Result<&ArrayRef> {
        self.batch.column_by_name(name).ok_or_else(|| Error::MissingColumn {
            table: "Events".into(),
            column: name.into(),
            partition: self.partition.into(),
        })
    }

    fn flat<T>(&self, name: &str, convert: Convert<T>) -> Result<Vec<T>> {
        convert(self.get(name)?, name)
    }

    fn jagged<T>(&self, name: &str, convert: Convert<T>) -> Result<Jagged<T>> {
        let arr = self.get(name)?;
        let (offsets, values) = match arr.data_type() {
            DataType::List(_) => {
                let list = arr.as_list::<i32>();
                (list.value_offsets().iter().map(|&o| o as usize).collect(), list.values())
            }
            DataType::LargeList(_) => {
                let list = arr.as_list::<i64>();
                (list.value_offsets().iter().map(|&o| o as usize).collect(), list.values())
            }
            dt => return Err(wrong_type(name, dt)),
        };
        Ok(Jagged { offsets, values: convert(values, name)? })
    }
}

fn wrong_type(name: &str, dt: &DataType) -> Error {
    Error::ColumnType { column: name.to_string(), actual: format!("{dt:?}") }
}

/// Cast a numeric array; non-numeric sources are rejected instead of parsed.
///
/// Values the target type cannot hold are an error, never a null read back as 0.
fn cast_numeric(arr: &ArrayRef, name: &str, to: &DataType) -> Result<ArrayRef> {
    let dt = arr.data_type();
    if !(dt.is_integer() || dt.is_floating()) {
        return Err(wrong_type(name, dt));
    }
    let nulls = arr.null_count();
    if nulls > 0 {
        return Err(Error::Input(format!("column '{name}' has {nulls} null values")));
    }
    let opts = CastOptions { safe: false, ..Default::default() };
    cast_with_options(arr, to, &opts)
        .map_err(|e| Error::Input(format!("column '{name}' does not fit {to:?}: {e}")))
}

fn to_f64(arr: &ArrayRef, name: &str) -> Result<Vec<f64>> {
    let arr = cast_numeric(arr, name, &DataType::Float64)?;
    Ok(arr.as_primitive::<Float64Type>().values().to_vec())
}

fn to_i32(arr: &ArrayRef, name: &str) -> Result<Vec<i32>> {
    let arr = cast_numeric(arr, name, &DataType::Int32)?;
    Ok(arr.as_primitive::<Int32Type>().values().to_vec())
}

fn to_u32(arr: &ArrayRef, name: &str) -> Result<Vec<u32>> {
    let arr = cast_numeric(arr, name, &DataType::UInt32)?;
    Ok(arr.as_primitive::<UInt32Type>().values().to_vec())
}

fn to_u64(arr: &ArrayRef, name: &str) -> Result<Vec<u64>> {
    let arr = cast_numeric(arr, name, &DataType::UInt64)?;
    Ok(arr.as_primitive::<UInt64Type>().values().to_vec())
}

fn to_bool(arr: &ArrayRef, name: &str) -> Result<Vec<bool>> {
    match arr.data_type() {
        DataType::Boolean => Ok(arr.as_boolean().iter().map(|v| v.unwrap_or(false)).collect()),
        dt => Err(wrong_type(name, dt)),
    }
}
