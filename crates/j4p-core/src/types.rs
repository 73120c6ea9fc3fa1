//! Typed event record and the tag/probe objects derived from it.
//!
//! Field names follow the NanoAOD branch they are read from.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::kinematics::LorentzVector;

/// Dataset variant driving the tag/probe selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    /// Two leading jets, one in the barrel.
    Dijet,
    /// Z → μμ recoiling against a jet.
    Zjet,
    /// Single photon recoiling against a jet.
    Egamma,
    /// Leading jet against the recoil system of the others.
    Multijet,
}

impl Dataset {
    /// All variants in label order.
    pub const ALL: [Dataset; 4] =
        [Dataset::Dijet, Dataset::Zjet, Dataset::Egamma, Dataset::Multijet];

    /// Integer label written to `Tag_label`.
    pub fn label(self) -> i32 {
        match self {
            Dataset::Dijet => 0,
            Dataset::Zjet => 1,
            Dataset::Egamma => 2,
            Dataset::Multijet => 3,
        }
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Dataset::Dijet => "dijet",
            Dataset::Zjet => "zjet",
            Dataset::Egamma => "egamma",
            Dataset::Multijet => "multijet",
        }
    }

    /// Whether the tag object is itself one of the jets.
    pub fn tag_is_jet(self) -> bool {
        matches!(self, Dataset::Dijet | Dataset::Multijet)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dataset::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::Config(format!(
                    "unknown dataset '{s}' (expected dijet, zjet, egamma or multijet)"
                ))
            })
    }
}

/// Per-jet columns, structure-of-arrays. All vectors share one index space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Jets {
    pub pt: Vec<f64>,
    pub eta: Vec<f64>,
    pub phi: Vec<f64>,
    pub mass: Vec<f64>,
    /// Quality flag (bitmask; 6 = tight + tight-lepton-veto).
    pub jet_id: Vec<i32>,
    pub area: Vec<f64>,
    pub n_constituents: Vec<i32>,
    pub n_electrons: Vec<i32>,
    pub n_muons: Vec<i32>,
    pub ch_em_ef: Vec<f64>,
    pub ne_em_ef: Vec<f64>,
    pub ch_hef: Vec<f64>,
    pub ne_hef: Vec<f64>,
    pub raw_factor: Vec<f64>,
}

impl Jets {
    /// Jet multiplicity.
    #[inline]
    pub fn len(&self) -> usize {
        self.pt.len()
    }

    /// True when the event has no jets.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pt.is_empty()
    }

    /// Four-vector of jet `i`.
    #[inline]
    pub fn p4(&self, i: usize) -> LorentzVector {
        LorentzVector::from_pt_eta_phi_m(self.pt[i], self.eta[i], self.phi[i], self.mass[i])
    }

    /// Vector sum of every jet.
    pub fn sum_p4(&self) -> LorentzVector {
        (0..self.len()).map(|i| self.p4(i)).sum()
    }

    /// Non-kinematic fields of jet `i`.
    pub fn info(&self, i: usize) -> ProbeJetInfo {
        ProbeJetInfo {
            jet_id: self.jet_id[i],
            area: self.area[i],
            n_constituents: self.n_constituents[i],
            n_electrons: self.n_electrons[i],
            n_muons: self.n_muons[i],
            ch_em_ef: self.ch_em_ef[i],
            ne_em_ef: self.ne_em_ef[i],
            ch_hef: self.ch_hef[i],
            ne_hef: self.ne_hef[i],
            raw_factor: self.raw_factor[i],
        }
    }

    /// True when every per-jet vector has the same length.
    pub fn is_aligned(&self) -> bool {
        let n = self.len();
        [
            self.eta.len(),
            self.phi.len(),
            self.mass.len(),
            self.jet_id.len(),
            self.area.len(),
            self.n_constituents.len(),
            self.n_electrons.len(),
            self.n_muons.len(),
            self.ch_em_ef.len(),
            self.ne_em_ef.len(),
            self.ch_hef.len(),
            self.ne_hef.len(),
            self.raw_factor.len(),
        ]
        .iter()
        .all(|&l| l == n)
    }
}

/// Per-muon columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Muons {
    pub pt: Vec<f64>,
    pub eta: Vec<f64>,
    pub phi: Vec<f64>,
    pub mass: Vec<f64>,
    pub charge: Vec<i32>,
    pub pf_rel_iso04_all: Vec<f64>,
    pub tight_id: Vec<bool>,
}

impl Muons {
    /// Muon multiplicity.
    #[inline]
    pub fn len(&self) -> usize {
        self.pt.len()
    }

    /// True when the event has no muons.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pt.is_empty()
    }

    /// Four-vector of muon `i`.
    #[inline]
    pub fn p4(&self, i: usize) -> LorentzVector {
        LorentzVector::from_pt_eta_phi_m(self.pt[i], self.eta[i], self.phi[i], self.mass[i])
    }
}

/// Per-photon columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Photons {
    pub pt: Vec<f64>,
    pub eta: Vec<f64>,
    pub phi: Vec<f64>,
}

impl Photons {
    /// Photon multiplicity.
    #[inline]
    pub fn len(&self) -> usize {
        self.pt.len()
    }

    /// True when the event has no photons.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pt.is_empty()
    }
}

/// Missing transverse momentum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Met {
    pub pt: f64,
    pub phi: f64,
}

/// One collision event as read from the `Events` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    pub run: u32,
    pub luminosity_block: u32,
    pub event: u64,
    pub jets: Jets,
    pub muons: Muons,
    pub photons: Photons,
    pub met: Met,
    /// One bit per requested trigger, in request order.
    pub triggers: Vec<bool>,
    /// One bit per mandatory flag, in declaration order.
    pub flags: Vec<bool>,
}

/// Selected tag object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tag {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    /// [`Dataset::label`] of the variant that produced it.
    pub label: i32,
}

impl Tag {
    /// Build from a four-vector.
    pub fn from_p4(p4: &LorentzVector, label: i32) -> Self {
        Self { pt: p4.pt(), eta: p4.eta(), phi: p4.phi(), mass: p4.mass(), label }
    }

    /// Four-vector.
    pub fn p4(&self) -> LorentzVector {
        LorentzVector::from_pt_eta_phi_m(self.pt, self.eta, self.phi, self.mass)
    }
}

/// Non-kinematic fields copied from the probe jet. All zero for composite probes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProbeJetInfo {
    pub jet_id: i32,
    pub area: f64,
    pub n_constituents: i32,
    pub n_electrons: i32,
    pub n_muons: i32,
    pub ch_em_ef: f64,
    pub ne_em_ef: f64,
    pub ch_hef: f64,
    pub ne_hef: f64,
    pub raw_factor: f64,
}

/// Selected probe, reduced to one effective four-vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probe {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    pub jet: ProbeJetInfo,
}

impl Probe {
    /// Probe built from a single reconstructed jet.
    pub fn from_jet(jets: &Jets, i: usize) -> Self {
        Self {
            pt: jets.pt[i],
            eta: jets.eta[i],
            phi: jets.phi[i],
            mass: jets.mass[i],
            jet: jets.info(i),
        }
    }

    /// Composite probe (e.g. a recoil system) with placeholder jet fields.
    pub fn composite(p4: &LorentzVector) -> Self {
        Self {
            pt: p4.pt(),
            eta: p4.eta(),
            phi: p4.phi(),
            mass: p4.mass(),
            jet: ProbeJetInfo::default(),
        }
    }

    /// Four-vector.
    pub fn p4(&self) -> LorentzVector {
        LorentzVector::from_pt_eta_phi_m(self.pt, self.eta, self.phi, self.mass)
    }
}

/// Residual hadronic activity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JetActivity {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
}

impl JetActivity {
    /// Build from a four-vector.
    pub fn from_p4(p4: &LorentzVector) -> Self {
        Self { pt: p4.pt(), eta: p4.eta(), phi: p4.phi(), mass: p4.mass() }
    }
}

/// Output of a tag/probe selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagProbe {
    pub tag: Tag,
    pub probe: Probe,
    pub activity: JetActivity,
}

/// Balance and response observables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observables {
    pub db_direct: f64,
    pub db_ratio: f64,
    pub mpf_tag: f64,
    pub mpf_probe: f64,
    pub hdm_tag: f64,
    pub hdm_probe: f64,
    pub weight: f64,
}

/// One row of the skimmed `Events` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SkimRecord {
    pub run: u32,
    pub luminosity_block: u32,
    pub event: u64,
    pub n_jet: u32,
    pub met: Met,
    pub tag: Tag,
    pub probe: Probe,
    pub activity: JetActivity,
    pub observables: Observables,
    pub triggers: Vec<bool>,
    pub flags: Vec<bool>,
}
