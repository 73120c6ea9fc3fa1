//! Balance and response observables.
//!
//! All products are 2-D dot products of `(pt, phi)` vectors in the transverse
//! plane. `HDM_*` divides by `cos(Δφ(tag, probe))` without a guard, so events
//! with the probe perpendicular to the tag produce huge or non-finite values.

use j4p_core::{Met, Observables, PolarVector, TagProbe, delta_phi};

/// Unclustered-energy response assumed at generator level.
const R_UN_GEN: f64 = 1.0;

/// Compute every observable of one selected event.
pub fn compute_observables(tp: &TagProbe, met: &Met) -> Observables {
    let tag = PolarVector::new(tp.tag.pt, tp.tag.phi);
    let probe = PolarVector::new(tp.probe.pt, tp.probe.phi);
    let met = PolarVector::new(met.pt, met.phi);
    let activity = PolarVector::new(tp.activity.pt, tp.activity.phi);

    let tag_pt2 = tp.tag.pt * tp.tag.pt;
    let probe_pt2 = tp.probe.pt * tp.probe.pt;

    let db_direct = -tag.dot(&probe) / tag_pt2;
    let db_ratio = tp.probe.pt / tp.tag.pt;
    let mpf_tag = 1.0 + met.dot(&tag) / tag_pt2;
    let mpf_probe = 1.0 + met.dot(&probe) / probe_pt2;
    let r_un_reco_tag = activity.dot(&tag) / tag_pt2;
    let r_un_reco_probe = activity.dot(&probe) / probe_pt2;

    let cos_dphi = delta_phi(tp.tag.phi, tp.probe.phi).cos();
    let hdm_tag = (-db_direct - mpf_tag - 1.0 - r_un_reco_tag - R_UN_GEN) / cos_dphi;
    let hdm_probe = (-db_direct - mpf_probe - 1.0 - r_un_reco_probe - R_UN_GEN) / cos_dphi;

    Observables { db_direct, db_ratio, mpf_tag, mpf_probe, hdm_tag, hdm_probe, weight: 1.0 }
}
