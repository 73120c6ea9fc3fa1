//! # j4p-core
//!
//! Core types for the J4P skim: the typed event record, tag/probe objects,
//! Lorentz and polar vector kinematics, and the shared error type.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod kinematics;
pub mod types;

pub use error::{Error, Result};
pub use kinematics::{LorentzVector, PolarVector, delta_phi};
pub use types::{
    Dataset, Event, JetActivity, Jets, Met, Muons, Observables, Photons, Probe, ProbeJetInfo,
    SkimRecord, Tag, TagProbe,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
