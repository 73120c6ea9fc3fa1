//! Four-vector and transverse-plane kinematics.
//!
//! [`LorentzVector`] is stored in Cartesian `(px, py, pz, E)` form so that sums
//! and differences are exact component-wise operations; the collider
//! coordinates `(pt, eta, phi, mass)` are derived on demand. [`PolarVector`] is
//! the 2-D `(pt, phi)` projection used by the balance observables.

use std::f64::consts::{PI, TAU};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Pseudorapidity returned for vectors on the beam axis, offset by `pz`.
const ETA_MAX_BEAM_AXIS: f64 = 22756.0;

/// Signed azimuthal separation `b - a`, folded into `[-π, π]`.
#[inline]
pub fn delta_phi(a: f64, b: f64) -> f64 {
    let mut d = (b - a) % TAU;
    if d < -PI {
        d += TAU;
    } else if d > PI {
        d -= TAU;
    }
    d
}

/// Lorentz four-vector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LorentzVector {
    /// x momentum component.
    pub px: f64,
    /// y momentum component.
    pub py: f64,
    /// z momentum component.
    pub pz: f64,
    /// Energy.
    pub e: f64,
}

impl LorentzVector {
    /// Cartesian constructor.
    pub const fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self { px, py, pz, e }
    }

    /// Build from collider coordinates. A negative `mass` is interpreted as a
    /// spacelike vector, energy clamped at zero.
    pub fn from_pt_eta_phi_m(pt: f64, eta: f64, phi: f64, mass: f64) -> Self {
        let px = pt * phi.cos();
        let py = pt * phi.sin();
        let pz = pt * eta.sinh();
        let p2 = px * px + py * py + pz * pz;
        let e = if mass >= 0.0 {
            (p2 + mass * mass).sqrt()
        } else {
            (p2 - mass * mass).max(0.0).sqrt()
        };
        Self { px, py, pz, e }
    }

    /// Transverse momentum.
    #[inline]
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    /// Azimuthal angle in `(-π, π]`; zero for a null transverse vector.
    #[inline]
    pub fn phi(&self) -> f64 {
        if self.px == 0.0 && self.py == 0.0 { 0.0 } else { self.py.atan2(self.px) }
    }

    /// Pseudorapidity.
    pub fn eta(&self) -> f64 {
        let rho = self.pt();
        if rho > 0.0 {
            (self.pz / rho).asinh()
        } else if self.pz == 0.0 {
            0.0
        } else if self.pz > 0.0 {
            self.pz + ETA_MAX_BEAM_AXIS
        } else {
            self.pz - ETA_MAX_BEAM_AXIS
        }
    }

    /// Invariant mass squared.
    #[inline]
    pub fn mass2(&self) -> f64 {
        self.e * self.e - (self.px * self.px + self.py * self.py + self.pz * self.pz)
    }

    /// Invariant mass; negative for spacelike vectors.
    pub fn mass(&self) -> f64 {
        let m2 = self.mass2();
        if m2 >= 0.0 { m2.sqrt() } else { -(-m2).sqrt() }
    }

    /// Transverse projection.
    #[inline]
    pub fn transverse(&self) -> PolarVector {
        PolarVector::new(self.pt(), self.phi())
    }
}

impl Add for LorentzVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.px + rhs.px, self.py + rhs.py, self.pz + rhs.pz, self.e + rhs.e)
    }
}

impl Sub for LorentzVector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.px - rhs.px, self.py - rhs.py, self.pz - rhs.pz, self.e - rhs.e)
    }
}

impl Neg for LorentzVector {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.px, -self.py, -self.pz, -self.e)
    }
}

impl AddAssign for LorentzVector {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for LorentzVector {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Sum for LorentzVector {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// 2-D vector in polar form `(r, phi)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PolarVector {
    /// Magnitude.
    pub r: f64,
    /// Azimuth.
    pub phi: f64,
}

impl PolarVector {
    /// Constructor.
    pub const fn new(r: f64, phi: f64) -> Self {
        Self { r, phi }
    }

    /// Euclidean dot product.
    #[inline]
    pub fn dot(&self, other: &PolarVector) -> f64 {
        self.x() * other.x() + self.y() * other.y()
    }

    /// Cartesian x.
    #[inline]
    pub fn x(&self) -> f64 {
        self.r * self.phi.cos()
    }

    /// Cartesian y.
    #[inline]
    pub fn y(&self) -> f64 {
        self.r * self.phi.sin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn delta_phi_wraps_across_pi() {
        assert_relative_eq!(delta_phi(3.0, -3.0), TAU - 6.0, epsilon = 1e-12);
        assert_relative_eq!(delta_phi(-3.0, 3.0), 6.0 - TAU, epsilon = 1e-12);
        assert_relative_eq!(delta_phi(0.5, 1.0), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn collider_coordinates_roundtrip() {
        let v = LorentzVector::from_pt_eta_phi_m(42.0, -1.1, 2.5, 7.0);
        assert_relative_eq!(v.pt(), 42.0, epsilon = 1e-9);
        assert_relative_eq!(v.eta(), -1.1, epsilon = 1e-9);
        assert_relative_eq!(v.phi(), 2.5, epsilon = 1e-9);
        assert_relative_eq!(v.mass(), 7.0, epsilon = 1e-6);
    }

    #[test]
    fn back_to_back_massless_pair_is_at_rest() {
        let a = LorentzVector::from_pt_eta_phi_m(45.0, 0.0, 0.0, 0.0);
        let b = LorentzVector::from_pt_eta_phi_m(45.0, 0.0, PI, 0.0);
        let z = a + b;
        assert_relative_eq!(z.pt(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(z.mass(), 90.0, epsilon = 1e-9);
        assert_eq!(z.eta(), 0.0);
    }

    #[test]
    fn sum_is_vector_not_scalar() {
        let jets = [
            LorentzVector::from_pt_eta_phi_m(40.0, 0.0, 0.0, 0.0),
            LorentzVector::from_pt_eta_phi_m(30.0, 0.0, PI / 2.0, 0.0),
        ];
        let total: LorentzVector = jets.iter().copied().sum();
        assert_relative_eq!(total.pt(), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn difference_can_be_spacelike() {
        let a = LorentzVector::from_pt_eta_phi_m(10.0, 0.0, 0.0, 0.0);
        let b = LorentzVector::from_pt_eta_phi_m(10.0, 0.0, PI, 0.0);
        assert!((a - b).mass() < 0.0);
    }

    #[test]
    fn polar_dot_matches_cosine_rule() {
        let a = PolarVector::new(3.0, 0.3);
        let b = PolarVector::new(5.0, 1.3);
        assert_relative_eq!(a.dot(&b), 15.0 * 1.0f64.cos(), epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn prop_delta_phi_in_range(a in -20.0f64..20.0, b in -20.0f64..20.0) {
            let d = delta_phi(a, b);
            prop_assert!((-PI..=PI).contains(&d));
            prop_assert!(((b - a - d) / TAU - ((b - a - d) / TAU).round()).abs() < 1e-9);
        }
    }
}
