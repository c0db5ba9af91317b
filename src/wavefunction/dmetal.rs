//! D-metal wave function: four determinants over two spin species.
//!
//! Two "d" determinants run over all N = N_up + N_down particles (up
//! particle i occupies column i, down particle i column i + N_up), and two
//! "f" determinants cover one spin species each.  Every determinant is
//! raised to its own real exponent.

use std::rc::Rc;

use nalgebra::DMatrix;
use num_complex::Complex64;

use super::orbitals::OrbitalDefinitions;
use super::{Move, Particle, PositionArguments};
use crate::linalg::{BigComplex, UpdatableMatrix};

#[derive(Debug, Clone)]
pub struct DMetal<const D: usize> {
    orbital_d1: Rc<OrbitalDefinitions<D>>,
    orbital_d2: Rc<OrbitalDefinitions<D>>,
    orbital_f_up: Rc<OrbitalDefinitions<D>>,
    orbital_f_down: Rc<OrbitalDefinitions<D>>,
    d1_exponent: f64,
    d2_exponent: f64,
    f_up_exponent: f64,
    f_down_exponent: f64,
    cmat_d1: UpdatableMatrix,
    cmat_d2: UpdatableMatrix,
    cmat_f_up: UpdatableMatrix,
    cmat_f_down: UpdatableMatrix,
    pending: PendingMove,
}

#[derive(Debug, Clone, Default)]
struct PendingMove {
    d_columns: usize,
    f_up_columns: usize,
    f_down_columns: usize,
}

#[allow(clippy::too_many_arguments)]
impl<const D: usize> DMetal<D> {
    pub fn new(
        r: &PositionArguments,
        orbital_d1: Rc<OrbitalDefinitions<D>>,
        orbital_d2: Rc<OrbitalDefinitions<D>>,
        orbital_f_up: Rc<OrbitalDefinitions<D>>,
        orbital_f_down: Rc<OrbitalDefinitions<D>>,
        d1_exponent: f64,
        d2_exponent: f64,
        f_up_exponent: f64,
        f_down_exponent: f64,
    ) -> Self {
        let (cmat_d1, cmat_d2, cmat_f_up, cmat_f_down) = build_matrices(
            r,
            &orbital_d1,
            &orbital_d2,
            &orbital_f_up,
            &orbital_f_down,
            [d1_exponent, d2_exponent, f_up_exponent, f_down_exponent],
        );
        DMetal {
            orbital_d1,
            orbital_d2,
            orbital_f_up,
            orbital_f_down,
            d1_exponent,
            d2_exponent,
            f_up_exponent,
            f_down_exponent,
            cmat_d1,
            cmat_d2,
            cmat_f_up,
            cmat_f_down,
            pending: PendingMove::default(),
        }
    }

    /// Column index in the d matrices: up spins first, then down spins
    /// offset by N_up.
    fn d_column(&self, particle: Particle) -> usize {
        if particle.species == 0 {
            particle.index
        } else {
            particle.index + self.orbital_f_up.n_filled()
        }
    }

    pub fn apply_move(&mut self, mv: &Move) {
        debug_assert_eq!(self.pending.d_columns, 0);

        let d_cols: Vec<usize> = mv.iter().map(|m| self.d_column(m.particle)).collect();
        let src_d1 = DMatrix::from_fn(self.cmat_d1.nrows(), mv.len(), |i, j| {
            self.orbital_d1.at_position(mv[j].destination)[i]
        });
        let src_d2 = DMatrix::from_fn(self.cmat_d2.nrows(), mv.len(), |i, j| {
            self.orbital_d2.at_position(mv[j].destination)[i]
        });
        if mv.len() == 1 {
            self.cmat_d1.update_column(d_cols[0], &src_d1.column(0).clone_owned());
            self.cmat_d2.update_column(d_cols[0], &src_d2.column(0).clone_owned());
        } else {
            self.cmat_d1.update_columns(&d_cols, &src_d1);
            self.cmat_d2.update_columns(&d_cols, &src_d2);
        }
        self.pending.d_columns = mv.len();

        // spin-resolved routing to the f determinants
        let ups: Vec<&super::SingleParticleMove> =
            mv.iter().filter(|m| m.particle.species == 0).collect();
        let downs: Vec<&super::SingleParticleMove> =
            mv.iter().filter(|m| m.particle.species == 1).collect();

        if !ups.is_empty() {
            update_species_matrix(&mut self.cmat_f_up, &self.orbital_f_up, &ups);
            self.pending.f_up_columns = ups.len();
        }
        if !downs.is_empty() {
            update_species_matrix(&mut self.cmat_f_down, &self.orbital_f_down, &downs);
            self.pending.f_down_columns = downs.len();
        }
    }

    pub fn psi(&self) -> BigComplex {
        self.cmat_d1.determinant().powf(self.d1_exponent)
            * self.cmat_d2.determinant().powf(self.d2_exponent)
            * self.cmat_f_up.determinant().powf(self.f_up_exponent)
            * self.cmat_f_down.determinant().powf(self.f_down_exponent)
    }

    pub fn finish(&mut self) {
        finish_columns(&mut self.cmat_d1, self.pending.d_columns);
        finish_columns(&mut self.cmat_d2, self.pending.d_columns);
        finish_columns(&mut self.cmat_f_up, self.pending.f_up_columns);
        finish_columns(&mut self.cmat_f_down, self.pending.f_down_columns);
        self.pending = PendingMove::default();
    }

    pub fn cancel(&mut self) {
        cancel_columns(&mut self.cmat_d1, self.pending.d_columns);
        cancel_columns(&mut self.cmat_d2, self.pending.d_columns);
        cancel_columns(&mut self.cmat_f_up, self.pending.f_up_columns);
        cancel_columns(&mut self.cmat_f_down, self.pending.f_down_columns);
        self.pending = PendingMove::default();
    }

    pub fn swap_particles(&mut self, index1: usize, index2: usize, species: usize) {
        let offset = if species == 0 {
            0
        } else {
            self.orbital_f_up.n_filled()
        };
        self.cmat_d1.swap_columns(index1 + offset, index2 + offset);
        self.cmat_d2.swap_columns(index1 + offset, index2 + offset);
        if species == 0 {
            self.cmat_f_up.swap_columns(index1, index2);
        } else {
            self.cmat_f_down.swap_columns(index1, index2);
        }
    }

    pub fn reinitialize(&mut self, r: &PositionArguments) {
        let (d1, d2, f_up, f_down) = build_matrices(
            r,
            &self.orbital_d1,
            &self.orbital_d2,
            &self.orbital_f_up,
            &self.orbital_f_down,
            [
                self.d1_exponent,
                self.d2_exponent,
                self.f_up_exponent,
                self.f_down_exponent,
            ],
        );
        self.cmat_d1 = d1;
        self.cmat_d2 = d2;
        self.cmat_f_up = f_up;
        self.cmat_f_down = f_down;
        self.pending = PendingMove::default();
    }
}

fn update_species_matrix<const D: usize>(
    cmat: &mut UpdatableMatrix,
    orbitals: &OrbitalDefinitions<D>,
    moves: &[&super::SingleParticleMove],
) {
    if moves.len() == 1 {
        let col = orbitals.at_position(moves[0].destination).clone_owned();
        cmat.update_column(moves[0].particle.index, &col);
    } else {
        let cols: Vec<usize> = moves.iter().map(|m| m.particle.index).collect();
        let src = DMatrix::from_fn(cmat.nrows(), moves.len(), |i, j| {
            orbitals.at_position(moves[j].destination)[i]
        });
        cmat.update_columns(&cols, &src);
    }
}

fn finish_columns(cmat: &mut UpdatableMatrix, pending: usize) {
    match pending {
        0 => {}
        1 => cmat.finish_column_update(),
        _ => cmat.finish_columns_update(),
    }
}

fn cancel_columns(cmat: &mut UpdatableMatrix, pending: usize) {
    match pending {
        0 => {}
        1 => cmat.cancel_column_update(),
        _ => cmat.cancel_columns_update(),
    }
}

type Matrices = (
    UpdatableMatrix,
    UpdatableMatrix,
    UpdatableMatrix,
    UpdatableMatrix,
);

fn build_matrices<const D: usize>(
    r: &PositionArguments,
    orbital_d1: &OrbitalDefinitions<D>,
    orbital_d2: &OrbitalDefinitions<D>,
    orbital_f_up: &OrbitalDefinitions<D>,
    orbital_f_down: &OrbitalDefinitions<D>,
    exponents: [f64; 4],
) -> Matrices {
    assert_eq!(r.n_species(), 2);
    let n_up = r.n_filled(0);
    let n_down = r.n_filled(1);
    let n = n_up + n_down;
    assert_eq!(orbital_d1.n_filled(), n);
    assert_eq!(orbital_d2.n_filled(), n);
    assert_eq!(orbital_f_up.n_filled(), n_up);
    assert_eq!(orbital_f_down.n_filled(), n_down);

    let site_of = |col: usize| {
        if col < n_up {
            r.r_vector(0)[col]
        } else {
            r.r_vector(1)[col - n_up]
        }
    };

    let mat_d1 =
        DMatrix::<Complex64>::from_fn(n, n, |i, j| orbital_d1.at_position(site_of(j))[i]);
    let mat_d2 =
        DMatrix::<Complex64>::from_fn(n, n, |i, j| orbital_d2.at_position(site_of(j))[i]);
    let mat_f_up = DMatrix::<Complex64>::from_fn(n_up, n_up, |i, j| {
        orbital_f_up.at_position(r.r_vector(0)[j])[i]
    });
    let mat_f_down = DMatrix::<Complex64>::from_fn(n_down, n_down, |i, j| {
        orbital_f_down.at_position(r.r_vector(1)[j])[i]
    });

    (
        UpdatableMatrix::new(mat_d1, exponents[0] < 0.0),
        UpdatableMatrix::new(mat_d2, exponents[1] < 0.0),
        UpdatableMatrix::new(mat_f_up, exponents[2] < 0.0),
        UpdatableMatrix::new(mat_f_down, exponents[3] < 0.0),
    )
}
