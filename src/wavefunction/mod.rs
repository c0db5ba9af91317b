//! Trial wave functions and their amplitudes.
//!
//! An `Amplitude` owns the particle configuration and the determinant
//! engines of one concrete wave-function family.  Moves follow a
//! perform/finish-or-cancel protocol so the Metropolis walk can evaluate a
//! tentative amplitude before committing.

mod dbl;
mod dmetal;
mod free_fermion;
mod orbitals;
mod positions;
mod rvb;

pub use dbl::Dbl;
pub use dmetal::DMetal;
pub use free_fermion::FreeFermion;
pub use orbitals::OrbitalDefinitions;
pub use positions::{Particle, PositionArguments};
pub use rvb::Rvb;

use std::rc::Rc;

use crate::errors::InvalidMove;
use crate::lattice::NdLattice;
use crate::linalg::BigComplex;

/// One particle relocating to a destination site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleParticleMove {
    pub particle: Particle,
    pub destination: usize,
}

impl SingleParticleMove {
    pub fn new(particle: Particle, destination: usize) -> Self {
        SingleParticleMove {
            particle,
            destination,
        }
    }
}

/// A (possibly multi-particle) move.  No particle may appear twice, and the
/// destinations must be jointly consistent: no two same-species particles
/// on one site once the whole move has been applied.
pub type Move = Vec<SingleParticleMove>;

/// The concrete wave-function families, as a closed sum type.
#[derive(Debug, Clone)]
enum Family<const D: usize> {
    FreeFermion(FreeFermion<D>),
    Dbl(Dbl<D>),
    DMetal(DMetal<D>),
    Rvb(Rvb<D>),
}

/// A wave-function amplitude: particle positions plus the family's
/// determinant engines.
///
/// `psi` is valid both between moves and while a move is in progress; in
/// the latter case it reports the tentative post-move amplitude.  Shared
/// read-only tables (lattice, orbitals, pair function) are behind `Rc`, so
/// `clone` gives an independent mutable copy at the cost of the engines
/// only.
#[derive(Debug, Clone)]
pub struct Amplitude<const D: usize> {
    r: PositionArguments,
    lattice: Rc<NdLattice<D>>,
    family: Family<D>,
    // (particle, previous site) pairs of the move in progress, for rollback
    current_move: Option<Vec<(Particle, usize)>>,
}

impl<const D: usize> Amplitude<D> {
    /// Free-fermion amplitude: a single Slater determinant.
    pub fn free_fermion(r: PositionArguments, orbitals: Rc<OrbitalDefinitions<D>>) -> Self {
        let lattice = Rc::clone(orbitals.lattice());
        let family = Family::FreeFermion(FreeFermion::new(&r, orbitals));
        Amplitude {
            r,
            lattice,
            family,
            current_move: None,
        }
    }

    /// DBL amplitude: det_1^d1 * det_2^d2 over shared positions.
    pub fn dbl(
        r: PositionArguments,
        orbitals1: Rc<OrbitalDefinitions<D>>,
        orbitals2: Rc<OrbitalDefinitions<D>>,
        d1_exponent: f64,
        d2_exponent: f64,
    ) -> Self {
        let lattice = Rc::clone(orbitals1.lattice());
        let family = Family::Dbl(Dbl::new(
            &r,
            orbitals1,
            orbitals2,
            d1_exponent,
            d2_exponent,
        ));
        Amplitude {
            r,
            lattice,
            family,
            current_move: None,
        }
    }

    /// D-metal amplitude: two full determinants and two spin-resolved ones.
    #[allow(clippy::too_many_arguments)]
    pub fn dmetal(
        r: PositionArguments,
        orbital_d1: Rc<OrbitalDefinitions<D>>,
        orbital_d2: Rc<OrbitalDefinitions<D>>,
        orbital_f_up: Rc<OrbitalDefinitions<D>>,
        orbital_f_down: Rc<OrbitalDefinitions<D>>,
        d1_exponent: f64,
        d2_exponent: f64,
        f_up_exponent: f64,
        f_down_exponent: f64,
    ) -> Self {
        let lattice = Rc::clone(orbital_d1.lattice());
        let family = Family::DMetal(DMetal::new(
            &r,
            orbital_d1,
            orbital_d2,
            orbital_f_up,
            orbital_f_down,
            d1_exponent,
            d2_exponent,
            f_up_exponent,
            f_down_exponent,
        ));
        Amplitude {
            r,
            lattice,
            family,
            current_move: None,
        }
    }

    /// RVB amplitude over a pair function indexed by site.
    pub fn rvb(
        r: PositionArguments,
        lattice: Rc<NdLattice<D>>,
        phi: Rc<Vec<num_complex::Complex64>>,
    ) -> Self {
        let family = Family::Rvb(Rvb::new(&r, Rc::clone(&lattice), phi));
        Amplitude {
            r,
            lattice,
            family,
            current_move: None,
        }
    }

    pub fn positions(&self) -> &PositionArguments {
        &self.r
    }

    pub fn lattice(&self) -> &Rc<NdLattice<D>> {
        &self.lattice
    }

    /// Apply a move.  The amplitude stays in a move-in-progress state until
    /// `finish_move` or `cancel_move`; `psi` meanwhile reports the
    /// tentative post-move value.
    pub fn perform_move(&mut self, mv: &Move) -> Result<(), InvalidMove> {
        assert!(self.current_move.is_none(), "move already in progress");
        assert!(!mv.is_empty());
        for (i, m) in mv.iter().enumerate() {
            assert!(self.r.particle_is_valid(m.particle));
            for earlier in &mv[..i] {
                assert_ne!(earlier.particle, m.particle, "particle moved twice");
            }
        }

        let mut applied: Vec<(Particle, usize)> = Vec::with_capacity(mv.len());
        for m in mv {
            let old_site = self.r.position(m.particle);
            if let Err(e) = self.r.update_position(m.particle, m.destination) {
                // roll back the partial application before reporting
                for &(particle, site) in applied.iter().rev() {
                    self.r
                        .update_position(particle, site)
                        .expect("rollback to previous configuration");
                }
                return Err(e);
            }
            applied.push((m.particle, old_site));
        }

        match &mut self.family {
            Family::FreeFermion(f) => f.apply_move(mv),
            Family::Dbl(f) => f.apply_move(mv),
            Family::DMetal(f) => f.apply_move(mv),
            Family::Rvb(f) => f.apply_move(&self.r, mv),
        }
        self.current_move = Some(applied);
        Ok(())
    }

    /// The current amplitude.
    pub fn psi(&self) -> BigComplex {
        match &self.family {
            Family::FreeFermion(f) => f.psi(),
            Family::Dbl(f) => f.psi(),
            Family::DMetal(f) => f.psi(),
            Family::Rvb(f) => f.psi(),
        }
    }

    /// Commit the move in progress.
    pub fn finish_move(&mut self) {
        assert!(self.current_move.is_some(), "no move in progress");
        match &mut self.family {
            Family::FreeFermion(f) => f.finish(),
            Family::Dbl(f) => f.finish(),
            Family::DMetal(f) => f.finish(),
            Family::Rvb(f) => f.finish(),
        }
        self.current_move = None;
    }

    /// Roll back the move in progress, restoring positions and engines.
    pub fn cancel_move(&mut self) {
        let applied = self.current_move.take().expect("no move in progress");
        match &mut self.family {
            Family::FreeFermion(f) => f.cancel(),
            Family::Dbl(f) => f.cancel(),
            Family::DMetal(f) => f.cancel(),
            Family::Rvb(f) => f.cancel(),
        }
        for &(particle, site) in applied.iter().rev() {
            self.r
                .update_position(particle, site)
                .expect("rollback to previous configuration");
        }
    }

    /// Exchange the labels of two same-species particles.  The physical
    /// configuration (and |psi|) is unchanged; the determinant sign is not.
    pub fn swap_particles(&mut self, index1: usize, index2: usize, species: usize) {
        assert!(self.current_move.is_none(), "move in progress");
        self.r.swap_particles(index1, index2, species);
        match &mut self.family {
            Family::FreeFermion(f) => f.swap_particles(index1, index2, species),
            Family::Dbl(f) => f.swap_particles(index1, index2, species),
            Family::DMetal(f) => f.swap_particles(index1, index2, species),
            Family::Rvb(f) => f.swap_particles(index1, index2, species),
        }
    }

    /// Replace the configuration outright and rebuild every engine.
    pub fn reset(&mut self, r: PositionArguments) {
        assert!(self.current_move.is_none(), "move in progress");
        self.r = r;
        match &mut self.family {
            Family::FreeFermion(f) => f.reinitialize(&self.r),
            Family::Dbl(f) => f.reinitialize(&self.r),
            Family::DMetal(f) => f.reinitialize(&self.r),
            Family::Rvb(f) => f.reinitialize(&self.r),
        }
    }

    /// Build the RVB exchange move for a proposed hop, if it goes anywhere.
    pub fn propose_rvb_exchange(
        &self,
        particle: Particle,
        destination: usize,
    ) -> Option<Move> {
        Rvb::<D>::propose_exchange_move(&self.r, particle, destination)
    }
}

/// Shared-handle copy-on-write access: clones the amplitude exactly when
/// the handle is not uniquely owned.
pub fn make_mut<const D: usize>(handle: &mut Rc<Amplitude<D>>) -> &mut Amplitude<D> {
    Rc::make_mut(handle)
}
