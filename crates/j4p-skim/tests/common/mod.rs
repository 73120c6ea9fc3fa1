//! NanoAOD-like Parquet partitions for tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float32Array, Int64Array, ListArray, UInt32Array, UInt64Array,
};
use arrow::datatypes::{Field, Float32Type, Int32Type, Schema, UInt8Type};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

pub const FLAGS: [&str; 8] = [
    "Flag_goodVertices",
    "Flag_globalSuperTightHalo2016Filter",
    "Flag_EcalDeadCellTriggerPrimitiveFilter",
    "Flag_BadPFMuonFilter",
    "Flag_BadPFMuonDzFilter",
    "Flag_hfNoisyHitsFilter",
    "Flag_eeBadScFilter",
    "Flag_ecalBadCalibFilter",
];

pub const TRIGGERS: [&str; 2] = ["HLT_PFJet40", "HLT_PFJet60"];

#[derive(Debug, Clone, Default)]
pub struct FixtureEvent {
    pub run: u32,
    pub lumi: u32,
    pub event: u64,
    /// (pt, eta, phi, mass, jetId)
    pub jets: Vec<(f32, f32, f32, f32, i32)>,
    /// (pt, eta, phi, charge)
    pub muons: Vec<(f32, f32, f32, i32)>,
    /// (pt, eta, phi)
    pub photons: Vec<(f32, f32, f32)>,
    pub met: (f32, f32),
    /// One bit per entry of [`TRIGGERS`].
    pub triggers: [bool; 2],
    pub flags_ok: bool,
}

/// Deterministic mix of passing and failing dijet events.
pub fn dijet_events(n: usize, run: u32, first_event: u64) -> Vec<FixtureEvent> {
    (0..n)
        .map(|i| {
            let k = i as f32;
            let pt0 = 40.0 + (i % 7) as f32 * 5.0;
            let pt1 = pt0 * (0.6 + (i % 5) as f32 * 0.15);
            let eta0 = if i % 3 == 0 { 1.6 } else { 0.4 };
            let mut jets = vec![(pt0, eta0, 0.1 * k, 5.0, 6), (pt1, -0.8, 0.1 * k + 3.0, 6.0, 6)];
            if i % 4 == 0 {
                jets.push((pt0 * 0.9, 0.2, 1.5, 4.0, 6));
            }
            if i % 6 == 0 {
                jets.push((15.0, 2.0, -1.0, 3.0, 2));
            }
            FixtureEvent {
                run,
                lumi: 1 + (i % 20) as u32,
                event: first_event + i as u64,
                jets,
                met: (10.0 + k % 13.0, 0.5),
                triggers: [i % 2 == 0, i % 3 == 0],
                flags_ok: i % 11 != 0,
                ..Default::default()
            }
        })
        .collect()
}

fn f32_list(rows: Vec<Vec<f32>>) -> ArrayRef {
    Arc::new(ListArray::from_iter_primitive::<Float32Type, _, _>(
        rows.into_iter().map(|r| Some(r.into_iter().map(Some).collect::<Vec<_>>())),
    ))
}

fn i32_list(rows: Vec<Vec<i32>>) -> ArrayRef {
    Arc::new(ListArray::from_iter_primitive::<Int32Type, _, _>(
        rows.into_iter().map(|r| Some(r.into_iter().map(Some).collect::<Vec<_>>())),
    ))
}

fn u8_list(rows: Vec<Vec<u8>>) -> ArrayRef {
    Arc::new(ListArray::from_iter_primitive::<UInt8Type, _, _>(
        rows.into_iter().map(|r| Some(r.into_iter().map(Some).collect::<Vec<_>>())),
    ))
}

fn bool_list(rows: Vec<Vec<bool>>) -> ArrayRef {
    let mut b = arrow::array::ListBuilder::new(arrow::array::BooleanBuilder::new());
    for r in rows {
        for v in r {
            b.values().append_value(v);
        }
        b.append(true);
    }
    Arc::new(b.finish())
}

/// `Events` table with every column the skim can read; `skip` columns are left out.
pub fn events_batch(events: &[FixtureEvent], skip: &[&str]) -> RecordBatch {
    let jets = |f: fn(&(f32, f32, f32, f32, i32)) -> f32| -> ArrayRef {
        f32_list(events.iter().map(|e| e.jets.iter().map(f).collect()).collect())
    };
    let jet_ints = |v: i32| -> ArrayRef {
        i32_list(events.iter().map(|e| vec![v; e.jets.len()]).collect())
    };
    let jet_fill = |v: f32| -> ArrayRef {
        f32_list(events.iter().map(|e| vec![v; e.jets.len()]).collect())
    };
    let muons = |f: fn(&(f32, f32, f32, i32)) -> f32| -> ArrayRef {
        f32_list(events.iter().map(|e| e.muons.iter().map(f).collect()).collect())
    };
    let muon_fill = |v: f32| -> ArrayRef {
        f32_list(events.iter().map(|e| vec![v; e.muons.len()]).collect())
    };
    let photons = |f: fn(&(f32, f32, f32)) -> f32| -> ArrayRef {
        f32_list(events.iter().map(|e| e.photons.iter().map(f).collect()).collect())
    };
    let u32s = |f: fn(&FixtureEvent) -> u32| -> ArrayRef {
        Arc::new(UInt32Array::from_iter_values(events.iter().map(f)))
    };
    let f32s = |f: fn(&FixtureEvent) -> f32| -> ArrayRef {
        Arc::new(Float32Array::from_iter_values(events.iter().map(f)))
    };
    let event_ids: ArrayRef =
        Arc::new(UInt64Array::from_iter_values(events.iter().map(|e| e.event)));
    let n_jet: ArrayRef =
        Arc::new(Int64Array::from_iter_values(events.iter().map(|e| e.jets.len() as i64)));
    let jet_ids: Vec<Vec<u8>> =
        events.iter().map(|e| e.jets.iter().map(|j| j.4 as u8).collect()).collect();
    let charges: Vec<Vec<i32>> =
        events.iter().map(|e| e.muons.iter().map(|m| m.3).collect()).collect();
    let tight: Vec<Vec<bool>> = events.iter().map(|e| vec![true; e.muons.len()]).collect();

    let mut cols: Vec<(&str, ArrayRef)> = vec![
        ("run", u32s(|e| e.run)),
        ("luminosityBlock", u32s(|e| e.lumi)),
        ("event", event_ids),
        ("nJet", n_jet),
        ("PuppiMET_pt", f32s(|e| e.met.0)),
        ("PuppiMET_phi", f32s(|e| e.met.1)),
        ("Jet_pt", jets(|j| j.0)),
        ("Jet_eta", jets(|j| j.1)),
        ("Jet_phi", jets(|j| j.2)),
        ("Jet_mass", jets(|j| j.3)),
        ("Jet_jetId", u8_list(jet_ids)),
        ("Jet_area", jet_fill(0.5)),
        ("Jet_nConstituents", jet_ints(20)),
        ("Jet_nElectrons", jet_ints(0)),
        ("Jet_nMuons", jet_ints(1)),
        ("Jet_chEmEF", jet_fill(0.1)),
        ("Jet_neEmEF", jet_fill(0.2)),
        ("Jet_chHEF", jet_fill(0.5)),
        ("Jet_neHEF", jet_fill(0.2)),
        ("Jet_rawFactor", jet_fill(0.05)),
        ("Muon_pt", muons(|m| m.0)),
        ("Muon_eta", muons(|m| m.1)),
        ("Muon_phi", muons(|m| m.2)),
        ("Muon_mass", muon_fill(0.10566)),
        ("Muon_charge", i32_list(charges)),
        ("Muon_pfRelIso04_all", muon_fill(0.05)),
        ("Muon_tightId", bool_list(tight)),
        ("Photon_pt", photons(|p| p.0)),
        ("Photon_eta", photons(|p| p.1)),
        ("Photon_phi", photons(|p| p.2)),
    ];
    for (k, name) in TRIGGERS.into_iter().enumerate() {
        let bits = BooleanArray::from_iter(events.iter().map(|e| Some(e.triggers[k])));
        cols.push((name, Arc::new(bits) as ArrayRef));
    }
    for name in FLAGS {
        let bits = BooleanArray::from_iter(events.iter().map(|e| Some(e.flags_ok)));
        cols.push((name, Arc::new(bits) as ArrayRef));
    }
    cols.retain(|(name, _)| !skip.contains(name));

    let fields: Vec<Field> =
        cols.iter().map(|(name, arr)| Field::new(*name, arr.data_type().clone(), true)).collect();
    let arrays: Vec<ArrayRef> = cols.into_iter().map(|(_, a)| a).collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
}

/// One `Runs` row per run number.
pub fn runs_batch(runs: &[u32]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("run", arrow::datatypes::DataType::UInt32, false),
        Field::new("genEventCount", arrow::datatypes::DataType::Int64, false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(UInt32Array::from(runs.to_vec())),
            Arc::new(Int64Array::from(vec![1000i64; runs.len()])),
        ],
    )
    .unwrap()
}

pub fn write_parquet(path: &Path, batch: &RecordBatch) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(batch).unwrap();
    writer.close().unwrap();
}

/// Write `<root>/<name>/{Events,Runs}.parquet` and return the partition directory.
pub fn write_partition(root: &Path, name: &str, events: &[FixtureEvent], skip: &[&str]) -> PathBuf {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    write_parquet(&dir.join("Events.parquet"), &events_batch(events, skip));
    let mut runs: Vec<u32> = events.iter().map(|e| e.run).collect();
    runs.dedup();
    write_parquet(&dir.join("Runs.parquet"), &runs_batch(&runs));
    dir
}

/// Golden JSON certifying lumi blocks 1..=10 of `run`.
pub fn write_golden(root: &Path, run: u32) -> PathBuf {
    let path = root.join("golden.json");
    std::fs::write(&path, format!(r#"{{"{run}": [[1, 10]]}}"#)).unwrap();
    path
}

/// Rows of a Parquet file.
pub fn read_rows(path: &Path) -> Vec<RecordBatch> {
    let file = std::fs::File::open(path).unwrap();
    parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap()
        .map(|b| b.unwrap())
        .collect()
}
