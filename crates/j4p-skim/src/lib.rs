//! # j4p-skim
//!
//! Event skim for jet energy correction studies. Reads NanoAOD-like `Events`
//! and `Runs` tables from Parquet partitions, applies the golden-lumi mask, jet
//! quality, one of four tag-and-probe selections and the trigger/flag
//! requirements, derives the balance observables, and writes a compact
//! tag/probe table plus the cutflow.
//!
//! ```text
//! RecordSource ─▶ Golden JSON ─▶ jet quality ─▶ tag/probe ─▶ observables ─▶ trigger ─▶ flags
//!                                                                                    │
//!                                                         Cutflow ◀──────────────────┤
//!                                                         OutputMaterializer ◀───────┘
//! ```
//!
//! Evaluation is data-parallel: the input is split into entry ranges that run
//! the full stage chain independently on a rayon pool, each with its own
//! [`Cutflow`], merged by addition at the end.

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod config;
pub mod cutflow;
pub mod lists;
pub mod lumi;
pub mod observables;
pub mod output;
pub mod pipeline;
pub mod quality;
pub mod selection;
pub mod source;
pub mod stage;
pub mod trigger;

pub use config::{RunRange, SkimConfig, read_skim_config};
pub use cutflow::{CutId, CutRegistry, Cutflow, CutflowEntry, CutflowHistograms};
pub use lumi::{GoldenJson, LumiFilter};
pub use observables::compute_observables;
pub use output::{OutputMaterializer, OutputPaths};
pub use pipeline::{SkimOutput, SkimPipeline, SkimSummary, run_skim};
pub use quality::{JetQualityFilter, TIGHT_JET_ID};
pub use selection::TagProbeSelector;
pub use source::{Chunk, ColumnPlan, RecordSource, SourceOptions};
pub use stage::EventFilter;
pub use trigger::{FlagFilter, MANDATORY_FLAGS, TriggerFilter};
