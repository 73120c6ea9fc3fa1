//! Tag-and-probe selections.
//!
//! One variant per dataset, chosen once when the pipeline is built. Each
//! variant declares its own named cutflow stages and returns `None` (never an
//! error) when an event lacks the objects it needs.
//!
//! | Dataset    | Tag                     | Probe                            | Activity excludes |
//! |------------|-------------------------|----------------------------------|-------------------|
//! | `dijet`    | leading jet in barrel   | the other leading jet            | tag + probe       |
//! | `zjet`     | dimuon system           | first jet with \|Δφ\| > 2.7      | probe             |
//! | `egamma`   | barrel photon           | first jet with \|Δφ\| > 2.7      | probe             |
//! | `multijet` | leading jet             | vector sum of the recoil jets    | tag + probe       |

mod dijet;
mod egamma;
mod multijet;
mod zjet;

pub use dijet::DijetSelection;
pub use egamma::EgammaSelection;
pub use multijet::MultijetSelection;
pub use zjet::ZjetSelection;

use j4p_core::{Dataset, Event, JetActivity, Jets, LorentzVector, TagProbe, delta_phi};

use crate::cutflow::{CutRegistry, Cutflow};

/// Minimum |Δφ| between tag and probe for the boson + jet selections.
pub const BACK_TO_BACK_DPHI: f64 = 2.7;

/// Common interface of the dataset variants.
pub trait Selection: Send + Sync {
    /// Select tag, probe and activity, or `None` if the event fails.
    fn select(&self, event: &Event, cutflow: &mut Cutflow) -> Option<TagProbe>;
}

/// Dataset-specific selection, dispatched by variant.
pub enum TagProbeSelector {
    Dijet(DijetSelection),
    Zjet(ZjetSelection),
    Egamma(EgammaSelection),
    Multijet(MultijetSelection),
}

impl TagProbeSelector {
    /// Build the variant for `dataset`, declaring its stages on `registry`.
    pub fn new(dataset: Dataset, registry: &mut CutRegistry) -> Self {
        match dataset {
            Dataset::Dijet => Self::Dijet(DijetSelection::new(registry)),
            Dataset::Zjet => Self::Zjet(ZjetSelection::new(registry)),
            Dataset::Egamma => Self::Egamma(EgammaSelection::new(registry)),
            Dataset::Multijet => Self::Multijet(MultijetSelection::new(registry)),
        }
    }

    pub fn dataset(&self) -> Dataset {
        match self {
            Self::Dijet(_) => Dataset::Dijet,
            Self::Zjet(_) => Dataset::Zjet,
            Self::Egamma(_) => Dataset::Egamma,
            Self::Multijet(_) => Dataset::Multijet,
        }
    }
}

impl Selection for TagProbeSelector {
    fn select(&self, event: &Event, cutflow: &mut Cutflow) -> Option<TagProbe> {
        match self {
            Self::Dijet(s) => s.select(event, cutflow),
            Self::Zjet(s) => s.select(event, cutflow),
            Self::Egamma(s) => s.select(event, cutflow),
            Self::Multijet(s) => s.select(event, cutflow),
        }
    }
}

/// Index of the first jet with |Δφ(jet, phi)| above [`BACK_TO_BACK_DPHI`].
pub(crate) fn first_back_to_back_jet(jets: &Jets, phi: f64) -> Option<usize> {
    jets.phi.iter().position(|&jet_phi| delta_phi(jet_phi, phi).abs() > BACK_TO_BACK_DPHI)
}

/// Sum of all jets minus whatever was consumed as tag and/or probe.
pub(crate) fn jet_activity(jets: &Jets, consumed: LorentzVector) -> JetActivity {
    JetActivity::from_p4(&(jets.sum_p4() - consumed))
}

#[cfg(test)]
pub(crate) mod testutil {
    use j4p_core::{Event, Jets, Met, Muons, Photons};

    /// Tight jets with the given kinematics and distinguishable side fields.
    pub fn jets(pt: &[f64], eta: &[f64], phi: &[f64]) -> Jets {
        let n = pt.len();
        Jets {
            pt: pt.to_vec(),
            eta: eta.to_vec(),
            phi: phi.to_vec(),
            mass: vec![5.0; n],
            jet_id: vec![6; n],
            area: vec![0.5; n],
            n_constituents: (10..10 + n as i32).collect(),
            n_electrons: vec![0; n],
            n_muons: vec![1; n],
            ch_em_ef: vec![0.1; n],
            ne_em_ef: vec![0.2; n],
            ch_hef: vec![0.3; n],
            ne_hef: vec![0.4; n],
            raw_factor: (0..n).map(|i| 0.01 * i as f64).collect(),
        }
    }

    /// Isolated tight muons.
    pub fn muons(pt: &[f64], eta: &[f64], phi: &[f64], charge: &[i32]) -> Muons {
        let n = pt.len();
        Muons {
            pt: pt.to_vec(),
            eta: eta.to_vec(),
            phi: phi.to_vec(),
            mass: vec![0.10566; n],
            charge: charge.to_vec(),
            pf_rel_iso04_all: vec![0.05; n],
            tight_id: vec![true; n],
        }
    }

    pub fn photons(pt: &[f64], eta: &[f64], phi: &[f64]) -> Photons {
        Photons { pt: pt.to_vec(), eta: eta.to_vec(), phi: phi.to_vec() }
    }

    pub fn event_with_jets(jets: Jets) -> Event {
        Event {
            run: 1,
            luminosity_block: 1,
            event: 1,
            jets,
            met: Met { pt: 10.0, phi: 0.3 },
            ..Default::default()
        }
    }
}
