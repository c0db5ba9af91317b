//! Free-fermion wave function: a single Slater determinant, no Jastrow
//! factor.

use std::rc::Rc;

use nalgebra::DMatrix;
use num_complex::Complex64;

use super::orbitals::OrbitalDefinitions;
use super::{Move, PositionArguments};
use crate::linalg::{BigComplex, UpdatableMatrix};

/// Determinant of the N x N matrix whose column i holds the orbital values
/// at particle i's site.  Moves become column updates.
#[derive(Debug, Clone)]
pub struct FreeFermion<const D: usize> {
    orbitals: Rc<OrbitalDefinitions<D>>,
    cmat: UpdatableMatrix,
    pending_columns: usize,
}

impl<const D: usize> FreeFermion<D> {
    pub fn new(r: &PositionArguments, orbitals: Rc<OrbitalDefinitions<D>>) -> Self {
        let cmat = build_matrix(r, &orbitals);
        FreeFermion {
            orbitals,
            cmat,
            pending_columns: 0,
        }
    }

    pub fn orbitals(&self) -> &Rc<OrbitalDefinitions<D>> {
        &self.orbitals
    }

    pub fn apply_move(&mut self, mv: &Move) {
        debug_assert!(mv.iter().all(|m| m.particle.species == 0));
        debug_assert_eq!(self.pending_columns, 0);

        if mv.len() == 1 {
            let particle = mv[0].particle;
            let col = self.orbitals.at_position(mv[0].destination).clone_owned();
            self.cmat.update_column(particle.index, &col);
        } else {
            let cols: Vec<usize> = mv.iter().map(|m| m.particle.index).collect();
            let src = DMatrix::from_fn(self.cmat.nrows(), mv.len(), |i, j| {
                self.orbitals.at_position(mv[j].destination)[i]
            });
            self.cmat.update_columns(&cols, &src);
        }
        self.pending_columns = mv.len();
    }

    pub fn psi(&self) -> BigComplex {
        self.cmat.determinant()
    }

    pub fn finish(&mut self) {
        if self.pending_columns == 1 {
            self.cmat.finish_column_update();
        } else {
            self.cmat.finish_columns_update();
        }
        self.pending_columns = 0;
    }

    pub fn cancel(&mut self) {
        if self.pending_columns == 1 {
            self.cmat.cancel_column_update();
        } else {
            self.cmat.cancel_columns_update();
        }
        self.pending_columns = 0;
    }

    pub fn swap_particles(&mut self, index1: usize, index2: usize, species: usize) {
        debug_assert_eq!(species, 0);
        self.cmat.swap_columns(index1, index2);
    }

    pub fn reinitialize(&mut self, r: &PositionArguments) {
        self.cmat = build_matrix(r, &self.orbitals);
        self.pending_columns = 0;
    }
}

fn build_matrix<const D: usize>(
    r: &PositionArguments,
    orbitals: &OrbitalDefinitions<D>,
) -> UpdatableMatrix {
    assert_eq!(r.n_species(), 1);
    let n = r.n_filled(0);
    assert_eq!(n, orbitals.n_filled());
    assert_eq!(r.n_sites(), orbitals.n_sites());

    let mat = DMatrix::<Complex64>::from_fn(n, n, |i, j| {
        orbitals.at_position(r.r_vector(0)[j])[i]
    });
    UpdatableMatrix::new(mat, false)
}
