//! Monte Carlo sampling: the Metropolis driver and the concrete walks.

mod metropolis;
mod random;
mod renyi;
mod standard;
mod swapped;

pub use metropolis::{MetropolisSimulation, Walk};
pub use random::{choose_random_particle, random_combination};
pub use renyi::{RenyiModWalk, RenyiSignWalk};
pub use standard::StandardWalk;
pub use swapped::{count_subsystem_particle_counts_for_match, SwappedSystem};
