//! D-wave Bose Liquid wave function: the product of two determinants over
//! the same particle positions, each raised to a tunable real exponent.

use std::rc::Rc;

use nalgebra::DMatrix;
use num_complex::Complex64;

use super::orbitals::OrbitalDefinitions;
use super::{Move, PositionArguments};
use crate::linalg::{BigComplex, UpdatableMatrix};

#[derive(Debug, Clone)]
pub struct Dbl<const D: usize> {
    orbitals1: Rc<OrbitalDefinitions<D>>,
    orbitals2: Rc<OrbitalDefinitions<D>>,
    d1_exponent: f64,
    d2_exponent: f64,
    cmat1: UpdatableMatrix,
    cmat2: UpdatableMatrix,
    pending_columns: usize,
}

impl<const D: usize> Dbl<D> {
    pub fn new(
        r: &PositionArguments,
        orbitals1: Rc<OrbitalDefinitions<D>>,
        orbitals2: Rc<OrbitalDefinitions<D>>,
        d1_exponent: f64,
        d2_exponent: f64,
    ) -> Self {
        // a negative exponent turns a tiny determinant into a huge weight,
        // so those engines must detect singularity eagerly
        let cmat1 = build_matrix(r, &orbitals1, d1_exponent < 0.0);
        let cmat2 = build_matrix(r, &orbitals2, d2_exponent < 0.0);
        Dbl {
            orbitals1,
            orbitals2,
            d1_exponent,
            d2_exponent,
            cmat1,
            cmat2,
            pending_columns: 0,
        }
    }

    pub fn apply_move(&mut self, mv: &Move) {
        debug_assert!(mv.iter().all(|m| m.particle.species == 0));
        debug_assert_eq!(self.pending_columns, 0);

        if mv.len() == 1 {
            let index = mv[0].particle.index;
            let dest = mv[0].destination;
            self.cmat1
                .update_column(index, &self.orbitals1.at_position(dest).clone_owned());
            self.cmat2
                .update_column(index, &self.orbitals2.at_position(dest).clone_owned());
        } else {
            let cols: Vec<usize> = mv.iter().map(|m| m.particle.index).collect();
            let src1 = DMatrix::from_fn(self.cmat1.nrows(), mv.len(), |i, j| {
                self.orbitals1.at_position(mv[j].destination)[i]
            });
            let src2 = DMatrix::from_fn(self.cmat2.nrows(), mv.len(), |i, j| {
                self.orbitals2.at_position(mv[j].destination)[i]
            });
            self.cmat1.update_columns(&cols, &src1);
            self.cmat2.update_columns(&cols, &src2);
        }
        self.pending_columns = mv.len();
    }

    pub fn psi(&self) -> BigComplex {
        self.cmat1.determinant().powf(self.d1_exponent)
            * self.cmat2.determinant().powf(self.d2_exponent)
    }

    pub fn finish(&mut self) {
        if self.pending_columns == 1 {
            self.cmat1.finish_column_update();
            self.cmat2.finish_column_update();
        } else {
            self.cmat1.finish_columns_update();
            self.cmat2.finish_columns_update();
        }
        self.pending_columns = 0;
    }

    pub fn cancel(&mut self) {
        if self.pending_columns == 1 {
            self.cmat1.cancel_column_update();
            self.cmat2.cancel_column_update();
        } else {
            self.cmat1.cancel_columns_update();
            self.cmat2.cancel_columns_update();
        }
        self.pending_columns = 0;
    }

    pub fn swap_particles(&mut self, index1: usize, index2: usize, species: usize) {
        debug_assert_eq!(species, 0);
        self.cmat1.swap_columns(index1, index2);
        self.cmat2.swap_columns(index1, index2);
    }

    pub fn reinitialize(&mut self, r: &PositionArguments) {
        self.cmat1 = build_matrix(r, &self.orbitals1, self.d1_exponent < 0.0);
        self.cmat2 = build_matrix(r, &self.orbitals2, self.d2_exponent < 0.0);
        self.pending_columns = 0;
    }
}

fn build_matrix<const D: usize>(
    r: &PositionArguments,
    orbitals: &OrbitalDefinitions<D>,
    be_extra_careful: bool,
) -> UpdatableMatrix {
    assert_eq!(r.n_species(), 1);
    let n = r.n_filled(0);
    assert_eq!(n, orbitals.n_filled());
    assert_eq!(r.n_sites(), orbitals.n_sites());

    let mat = DMatrix::<Complex64>::from_fn(n, n, |i, j| {
        orbitals.at_position(r.r_vector(0)[j])[i]
    });
    UpdatableMatrix::new(mat, be_extra_careful)
}
