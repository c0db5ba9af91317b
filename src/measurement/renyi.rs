//! Rényi entanglement estimators over the swap walks.

use num_complex::Complex64;

use crate::sampling::{RenyiModWalk, RenyiSignWalk};

use super::estimate::{BinnedEstimate, RunningEstimate};
use super::Measurement;

/// Accumulates |psi_beta1 psi_beta2 / (psi_alpha1 psi_alpha2)| over the
/// mod walk.  Together with the sign estimator this yields the second
/// Rényi entropy via the replica trick.
pub struct RenyiModMeasurement<const D: usize> {
    estimate: BinnedEstimate<f64>,
}

impl<const D: usize> RenyiModMeasurement<D> {
    pub fn new() -> Self {
        RenyiModMeasurement {
            estimate: BinnedEstimate::new(),
        }
    }

    pub fn get(&self) -> f64 {
        self.estimate.cumulative_result()
    }

    pub fn estimate(&self) -> &BinnedEstimate<f64> {
        &self.estimate
    }

    fn measure(&mut self, walk: &RenyiModWalk<D>) {
        let swap_ratio = (walk.phibeta1().psi() * walk.phibeta2().psi())
            / (walk.phialpha1().psi() * walk.phialpha2().psi());
        self.estimate.add_value(swap_ratio.norm());
    }
}

impl<const D: usize> Default for RenyiModMeasurement<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize> Measurement<RenyiModWalk<D>> for RenyiModMeasurement<D> {
    fn step_advanced(&mut self, walk: &RenyiModWalk<D>) {
        self.measure(walk);
    }

    fn step_repeated(&mut self, walk: &RenyiModWalk<D>) {
        self.measure(walk);
    }
}

/// Accumulates the unit phase of psi_beta1 psi_beta2 / (psi_alpha1
/// psi_alpha2) over the sign walk.
pub struct RenyiSignMeasurement<const D: usize> {
    estimate: RunningEstimate<Complex64>,
}

impl<const D: usize> RenyiSignMeasurement<D> {
    pub fn new() -> Self {
        RenyiSignMeasurement {
            estimate: RunningEstimate::new(),
        }
    }

    pub fn get(&self) -> Complex64 {
        self.estimate.cumulative_result()
    }

    fn measure(&mut self, walk: &RenyiSignWalk<D>) {
        let swap_ratio = (walk.phibeta1().psi() * walk.phibeta2().psi())
            / (walk.phialpha1().psi() * walk.phialpha2().psi());
        let value = swap_ratio.get_base();
        // normalizing sheds the magnitude, keeping only the phase
        self.estimate.add_value(value / value.norm());
    }
}

impl<const D: usize> Default for RenyiSignMeasurement<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize> Measurement<RenyiSignWalk<D>> for RenyiSignMeasurement<D> {
    fn step_advanced(&mut self, walk: &RenyiSignWalk<D>) {
        self.measure(walk);
    }

    fn step_repeated(&mut self, walk: &RenyiSignWalk<D>) {
        self.measure(walk);
    }
}
