//! Log-magnitude representation of complex scalars.
//!
//! Products of several determinants easily overflow an `f64`, so determinant
//! values are carried as `phase * exp(log_magnitude)`.  The phase component
//! also accumulates the ratio by which the value has drifted since it was
//! last normalized from scratch, which is what the determinant engine's
//! cutoff checks inspect.

use num_complex::Complex64;

/// A complex scalar stored as (phase, log-magnitude).
///
/// The represented value is `phase * exp(log_magnitude)`.  Zero is encoded
/// as `phase == 0` with log-magnitude negative infinity, and is absorbing
/// under multiplication.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BigComplex {
    phase: Complex64,
    log_magnitude: f64,
}

impl BigComplex {
    /// The distinguished zero value.
    pub fn zero() -> Self {
        BigComplex {
            phase: Complex64::new(0.0, 0.0),
            log_magnitude: f64::NEG_INFINITY,
        }
    }

    /// Construct from an ordinary complex value.
    pub fn from_value(v: Complex64) -> Self {
        let norm = v.norm();
        if norm == 0.0 {
            return Self::zero();
        }
        BigComplex {
            phase: v / norm,
            log_magnitude: norm.ln(),
        }
    }

    /// Construct directly from a phase and a log-magnitude, as when reading
    /// the diagonal of an LU decomposition.
    pub fn from_parts(phase: Complex64, log_magnitude: f64) -> Self {
        if phase.norm() == 0.0 {
            return Self::zero();
        }
        BigComplex {
            phase,
            log_magnitude,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.phase == Complex64::new(0.0, 0.0)
    }

    pub fn is_nonzero(&self) -> bool {
        !self.is_zero()
    }

    /// The "base": the phase component alone, without the stored exponent.
    ///
    /// After a from-scratch normalization the base is on the unit circle;
    /// subsequent multiplications accumulate into it, so its magnitude
    /// measures drift since the last normalization.
    pub fn get_base(&self) -> Complex64 {
        self.phase
    }

    pub fn log_magnitude(&self) -> f64 {
        self.log_magnitude
    }

    /// The represented value in ordinary precision.  May over- or
    /// underflow when the log-magnitude is extreme.
    pub fn get_value(&self) -> Complex64 {
        if self.is_zero() {
            return Complex64::new(0.0, 0.0);
        }
        self.phase * self.log_magnitude.exp()
    }

    /// |value|, in ordinary precision.
    pub fn norm(&self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        self.phase.norm() * self.log_magnitude.exp()
    }

    /// Raise to a real power, using the principal branch for the phase.
    pub fn powf(&self, exponent: f64) -> BigComplex {
        if self.is_zero() {
            return Self::zero();
        }
        // fold the phase's drift magnitude into the exponent first so the
        // principal-branch power acts on a unit phase
        let norm = self.phase.norm();
        let unit = self.phase / norm;
        BigComplex {
            phase: unit.powf(exponent),
            log_magnitude: exponent * (self.log_magnitude + norm.ln()),
        }
    }
}

impl std::ops::Mul<Complex64> for BigComplex {
    type Output = BigComplex;

    fn mul(self, rhs: Complex64) -> BigComplex {
        if self.is_zero() || rhs == Complex64::new(0.0, 0.0) {
            return BigComplex::zero();
        }
        BigComplex {
            phase: self.phase * rhs,
            log_magnitude: self.log_magnitude,
        }
    }
}

impl std::ops::MulAssign<Complex64> for BigComplex {
    fn mul_assign(&mut self, rhs: Complex64) {
        *self = *self * rhs;
    }
}

impl std::ops::Mul for BigComplex {
    type Output = BigComplex;

    fn mul(self, rhs: BigComplex) -> BigComplex {
        if self.is_zero() || rhs.is_zero() {
            return BigComplex::zero();
        }
        BigComplex {
            phase: self.phase * rhs.phase,
            log_magnitude: self.log_magnitude + rhs.log_magnitude,
        }
    }
}

impl std::ops::Div for BigComplex {
    type Output = BigComplex;

    fn div(self, rhs: BigComplex) -> BigComplex {
        // 0/0 deliberately yields NaN components so the Metropolis driver
        // can detect the inconsistency as an invalid probability
        BigComplex {
            phase: self.phase / rhs.phase,
            log_magnitude: self.log_magnitude - rhs.log_magnitude,
        }
    }
}
