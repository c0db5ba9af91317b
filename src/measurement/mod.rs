//! Measurements and their running-estimate plumbing.

mod density;
mod estimate;
mod renyi;

pub use density::DensityDensityMeasurement;
pub use estimate::{BinnedEstimate, RunningEstimate};
pub use renyi::{RenyiModMeasurement, RenyiSignMeasurement};

/// An observable accumulated over a Metropolis simulation.
///
/// After every step the driver calls exactly one of `step_advanced` (the
/// walk reached a new state, or is being observed for the first time) or
/// `step_repeated` (the proposed transition was rejected, so the previous
/// state counts again).
pub trait Measurement<W> {
    /// Called once, after the initialization sweeps.
    fn initialize(&mut self, _walk: &W) {}

    fn step_advanced(&mut self, walk: &W);

    fn step_repeated(&mut self, walk: &W);
}
