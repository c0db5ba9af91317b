//! Lattice geometry: site indexing, boundary conditions, move proposals.

mod boundary;
mod nd;
mod subsystem;

pub use boundary::BoundaryCondition;
pub use nd::{LatticeSite, NdLattice};
pub use subsystem::{SimpleSubsystem, Subsystem};

use rand::rngs::StdRng;

use crate::wavefunction::{Particle, PositionArguments};

/// The part of the lattice contract the Monte Carlo core consumes: a site
/// count and a proposer for single-particle hops.
pub trait Lattice {
    fn total_sites(&self) -> usize;

    /// Random-walk one step from the given particle's site along a uniform
    /// random axis and direction, continuing past occupied same-species
    /// sites, until an empty site or the particle's own origin is reached.
    /// Returning the origin means the move should be rejected upstream with
    /// probability zero.
    fn plan_particle_move_to_nearby_empty_site(
        &self,
        particle: Particle,
        r: &PositionArguments,
        rng: &mut StdRng,
    ) -> usize;
}
