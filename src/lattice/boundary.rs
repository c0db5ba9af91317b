//! Boundary conditions on a torus.
//!
//! Each dimension carries a twist: the wave function advances by a phase of
//! exp(2*pi*i*p) when a particle wraps once around the system in that
//! direction.  p = 1 is periodic, p = 1/2 antiperiodic, p = 0 open.

use num_complex::Complex64;
use num_rational::Ratio;

/// A boundary condition in one dimension, represented by the rational
/// fraction p of 2*pi by which the phase advances per wrap.  Equality is by
/// the fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryCondition {
    p: Ratio<i32>,
}

impl BoundaryCondition {
    /// Construct from a twist fraction.  Panics unless 0 <= p <= 1.
    pub fn new(p: Ratio<i32>) -> Self {
        assert!(p >= Ratio::new(0, 1) && p <= Ratio::new(1, 1));
        BoundaryCondition { p }
    }

    /// Twist p = 1/denominator, the encoding used by the driver input.
    pub fn from_denominator(denominator: i32) -> Self {
        assert!(denominator > 0);
        Self::new(Ratio::new(1, denominator))
    }

    pub fn open() -> Self {
        Self::new(Ratio::new(0, 1))
    }

    pub fn periodic() -> Self {
        Self::new(Ratio::new(1, 1))
    }

    pub fn antiperiodic() -> Self {
        Self::new(Ratio::new(1, 2))
    }

    /// The twist fraction, in [0, 1].
    pub fn p(&self) -> Ratio<i32> {
        self.p
    }

    /// The twist as an ordinary floating-point fraction of 2*pi.
    pub fn p_f64(&self) -> f64 {
        *self.p.numer() as f64 / *self.p.denom() as f64
    }

    /// Phase change for crossing the boundary once in the positive
    /// direction: zero for open boundary conditions, on the unit circle
    /// otherwise.
    pub fn phase(&self) -> Complex64 {
        // open boundary conditions are a special case
        if self.p == Ratio::new(0, 1) {
            return Complex64::new(0.0, 0.0);
        }
        // return exact values where possible
        if self.p == Ratio::new(1, 1) {
            Complex64::new(1.0, 0.0)
        } else if self.p == Ratio::new(1, 2) {
            Complex64::new(-1.0, 0.0)
        } else if self.p == Ratio::new(1, 4) {
            Complex64::new(0.0, 1.0)
        } else if self.p == Ratio::new(3, 4) {
            Complex64::new(0.0, -1.0)
        } else {
            Complex64::new(0.0, 2.0 * std::f64::consts::PI * self.p_f64()).exp()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_canonical_phases() {
        assert_eq!(BoundaryCondition::open().phase(), Complex64::new(0.0, 0.0));
        assert_eq!(
            BoundaryCondition::periodic().phase(),
            Complex64::new(1.0, 0.0)
        );
        assert_eq!(
            BoundaryCondition::antiperiodic().phase(),
            Complex64::new(-1.0, 0.0)
        );
        assert_eq!(
            BoundaryCondition::new(Ratio::new(1, 4)).phase(),
            Complex64::new(0.0, 1.0)
        );
    }

    #[test]
    fn test_generic_twist() {
        let bc = BoundaryCondition::from_denominator(3);
        let expected = Complex64::new(0.0, 2.0 * std::f64::consts::PI / 3.0).exp();
        assert_relative_eq!(bc.phase().re, expected.re, epsilon = 1e-15);
        assert_relative_eq!(bc.phase().im, expected.im, epsilon = 1e-15);
        assert_eq!(bc.p(), Ratio::new(1, 3));
    }

    #[test]
    fn test_equality_is_by_fraction() {
        assert_eq!(
            BoundaryCondition::new(Ratio::new(2, 4)),
            BoundaryCondition::antiperiodic()
        );
        assert_ne!(BoundaryCondition::periodic(), BoundaryCondition::open());
    }
}
