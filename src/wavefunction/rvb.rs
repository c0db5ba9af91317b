//! RVB (resonating valence bond) spin wave function.
//!
//! At one spinon per site the amplitude is the M x M determinant of
//! phi(r_up_i - r_down_j) for a translation-invariant pair function phi
//! indexed by lattice site.  The only move is an up/down position exchange,
//! which touches one row and one column of the matrix.

use std::rc::Rc;

use nalgebra::DMatrix;
use num_complex::Complex64;

use super::{Move, Particle, PositionArguments};
use crate::lattice::{Lattice, NdLattice};
use crate::linalg::{BigComplex, UpdatableMatrix};

#[derive(Debug, Clone)]
pub struct Rvb<const D: usize> {
    lattice: Rc<NdLattice<D>>,
    phi: Rc<Vec<Complex64>>,
    cmat: UpdatableMatrix,
}

impl<const D: usize> Rvb<D> {
    pub fn new(
        r: &PositionArguments,
        lattice: Rc<NdLattice<D>>,
        phi: Rc<Vec<Complex64>>,
    ) -> Self {
        let cmat = build_matrix(r, &lattice, &phi);
        Rvb { lattice, phi, cmat }
    }

    /// phi evaluated at the separation of an up site and a down site.
    fn pair_value(&self, up_site: usize, down_site: usize) -> Complex64 {
        let mut separation = self.lattice.site_from_index(up_site);
        let down = self.lattice.site_from_index(down_site);
        self.lattice
            .subtract_site_vector(&mut separation, &down.bravais, None);
        self.phi[self.lattice.site_to_index(&separation)]
    }

    pub fn apply_move(&mut self, r: &PositionArguments, mv: &Move) {
        // the only supported move is an up/down exchange
        assert_eq!(mv.len(), 2);
        assert_ne!(mv[0].particle.species, mv[1].particle.species);

        let up = if mv[0].particle.species == 0 {
            mv[0].particle
        } else {
            mv[1].particle
        };
        let down = if mv[0].particle.species == 0 {
            mv[1].particle
        } else {
            mv[0].particle
        };
        debug_assert_eq!(up.species, 0);
        debug_assert_eq!(down.species, 1);

        let m = r.n_filled(0);
        let up_site = r.position(up);
        let down_site = r.position(down);

        // positions are already updated, so the row and column sources can
        // be read straight from the configuration; they agree at the
        // crossing cell by construction
        let rows_src = DMatrix::from_fn(1, m, |_, j| {
            self.pair_value(up_site, r.r_vector(1)[j])
        });
        let cols_src = DMatrix::from_fn(m, 1, |i, _| {
            self.pair_value(r.r_vector(0)[i], down_site)
        });

        self.cmat
            .update_rows_and_columns(&[up.index], &rows_src, &[down.index], &cols_src);
    }

    pub fn psi(&self) -> BigComplex {
        self.cmat.determinant()
    }

    pub fn finish(&mut self) {
        self.cmat.finish_rows_and_columns_update();
    }

    pub fn cancel(&mut self) {
        self.cmat.cancel_rows_and_columns_update();
    }

    pub fn swap_particles(&mut self, index1: usize, index2: usize, species: usize) {
        if species == 0 {
            self.cmat.swap_rows(index1, index2);
        } else {
            debug_assert_eq!(species, 1);
            self.cmat.swap_columns(index1, index2);
        }
    }

    pub fn reinitialize(&mut self, r: &PositionArguments) {
        self.cmat = build_matrix(r, &self.lattice, &self.phi);
    }

    /// Build the up/down exchange move for a proposed single-particle hop:
    /// the particle moves to the destination and the opposite-species
    /// occupant of that site moves to the vacated one.
    pub fn propose_exchange_move(
        r: &PositionArguments,
        particle: Particle,
        destination: usize,
    ) -> Option<Move> {
        if destination == r.position(particle) {
            return None;
        }
        let other_species = particle.species ^ 1;
        let other_index = r
            .particle_index_at(destination, other_species)
            .expect("spin configuration fills every site");
        let other = Particle::new(other_index, other_species);
        Some(vec![
            super::SingleParticleMove {
                particle,
                destination,
            },
            super::SingleParticleMove {
                particle: other,
                destination: r.position(particle),
            },
        ])
    }
}

fn build_matrix<const D: usize>(
    r: &PositionArguments,
    lattice: &Rc<NdLattice<D>>,
    phi: &[Complex64],
) -> UpdatableMatrix {
    assert_eq!(r.n_species(), 2);
    assert_eq!(r.n_sites(), lattice.total_sites());
    assert_eq!(phi.len(), lattice.total_sites());
    // one spinon per site, unpolarized
    assert_eq!(2 * r.n_filled(0), lattice.total_sites());
    assert_eq!(2 * r.n_filled(1), lattice.total_sites());

    let m = r.n_filled(0);
    let mat = DMatrix::<Complex64>::from_fn(m, m, |i, j| {
        let up_site = r.r_vector(0)[i];
        let down_site = r.r_vector(1)[j];
        let mut separation = lattice.site_from_index(up_site);
        let down = lattice.site_from_index(down_site);
        lattice.subtract_site_vector(&mut separation, &down.bravais, None);
        phi[lattice.site_to_index(&separation)]
    });
    UpdatableMatrix::new(mat, false)
}
