//! lattice-vmc - Variational Monte Carlo for lattice wave functions
//!
//! This crate samples configurations of indistinguishable particles on a
//! finite periodic lattice according to |psi(R)|^2 for several families of
//! trial wave functions, accumulating density-density correlators and
//! Rényi entanglement estimators via the swap/replica construction.
//!
//! The heavy lifting is the incremental determinant engine
//! ([`linalg::UpdatableMatrix`]), which keeps determinants and inverses
//! current under few-row/column changes in O(N) to O(N^2) per move.

pub mod errors;
pub mod io;
pub mod lattice;
pub mod linalg;
pub mod measurement;
pub mod sampling;
pub mod wavefunction;

// Re-export commonly used types at crate root
pub use errors::{InvalidMove, InvalidProbability, ParseError};
pub use lattice::{BoundaryCondition, Lattice, LatticeSite, NdLattice, SimpleSubsystem, Subsystem};
pub use linalg::{BigComplex, UpdatableMatrix};
pub use measurement::{
    BinnedEstimate, DensityDensityMeasurement, Measurement, RenyiModMeasurement,
    RenyiSignMeasurement, RunningEstimate,
};
pub use sampling::{
    MetropolisSimulation, RenyiModWalk, RenyiSignWalk, StandardWalk, SwappedSystem, Walk,
};
pub use wavefunction::{
    Amplitude, Move, OrbitalDefinitions, Particle, PositionArguments, SingleParticleMove,
};
