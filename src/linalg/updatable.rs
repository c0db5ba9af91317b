//! Incremental determinant and inverse of a dense square matrix.
//!
//! `UpdatableMatrix` keeps the determinant and inverse of a matrix current
//! while a few rows and/or columns change per step, using the
//! Sherman-Morrison-Woodbury identity: O(N) or O(N^2) per move instead of
//! the O(N^3) of a fresh decomposition.  The struct is a finite state
//! machine: every `update_*` call must be paired with exactly one matching
//! `finish_*` or `cancel_*` before any further operation.
//!
//! When the accumulated determinant ratio drifts outside a cutoff window,
//! or when the matrix may have become singular, everything is recomputed
//! from scratch with a full-pivot LU decomposition.

use log::warn;
use nalgebra::linalg::FullPivLU;
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

use super::big::BigComplex;

/// As long as the magnitude of the determinant's "base" (its accumulated
/// ratio since the last from-scratch computation) stays between these
/// cutoffs, the fast update path is used; outside them the inverse is
/// recomputed to fight numerical error.
const DETERMINANT_LOWER_CUTOFF: f64 = 1e-50;
const DETERMINANT_UPPER_CUTOFF: f64 = 1e50;

/// Threshold used when `be_extra_careful` is set.  Larger in magnitude
/// because it must reliably catch matrices that have become singular.
const DETERMINANT_SAFE_LOWER_CUTOFF: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    RowUpdate,
    ColumnUpdate,
    ColumnsUpdate,
    RowColUpdate,
}

/// Dense square matrix with incrementally maintained determinant and
/// inverse.
#[derive(Debug, Clone)]
pub struct UpdatableMatrix {
    state: State,

    // When a determinant will have a negative exponent applied to it, a
    // very small value means a huge probability weight unless the matrix
    // is actually singular.  This flag forces a from-scratch inverse
    // recomputation at update time whenever the base drops below the safe
    // cutoff, so singularity is detected before the ratio is reported.
    be_extra_careful: bool,

    mat: DMatrix<Complex64>,
    invmat: DMatrix<Complex64>,

    det: BigComplex,
    old_det: BigComplex,

    // 0 iff the matrix is known invertible; otherwise a lower bound on the
    // nullity.
    nullity_lower_bound: usize,
    new_nullity_lower_bound: usize,

    // Set when the inverse was recomputed from scratch mid-update; applied
    // or dropped by finish/cancel.
    new_invmat: Option<DMatrix<Complex64>>,
    inverse_recalculated: bool,

    // Pending update bookkeeping.  Offsets (new minus old) are the basis of
    // both the ratio matrix and the inverse update; the old blocks allow a
    // bit-exact cancel.
    pending_rows: Vec<usize>,
    pending_cols: Vec<usize>,
    old_rows: DMatrix<Complex64>,
    old_cols: DMatrix<Complex64>,
    rows_offset: DMatrix<Complex64>,
    cols_offset: DMatrix<Complex64>,

    // Inverse of the ratio matrix K.  None whenever K was singular; only
    // read on the non-singular finish path.
    detrat_inv: Option<DMatrix<Complex64>>,
}

impl UpdatableMatrix {
    /// Decomposes `mat` from scratch.  Panics if `mat` is not square.
    pub fn new(mat: DMatrix<Complex64>, be_extra_careful: bool) -> Self {
        assert_eq!(mat.nrows(), mat.ncols(), "matrix must be square");
        let n = mat.nrows();
        let mut m = UpdatableMatrix {
            state: State::Ready,
            be_extra_careful,
            mat,
            invmat: DMatrix::zeros(n, n),
            det: BigComplex::zero(),
            old_det: BigComplex::zero(),
            nullity_lower_bound: 0,
            new_nullity_lower_bound: 0,
            new_invmat: None,
            inverse_recalculated: false,
            pending_rows: Vec::new(),
            pending_cols: Vec::new(),
            old_rows: DMatrix::zeros(0, 0),
            old_cols: DMatrix::zeros(0, 0),
            rows_offset: DMatrix::zeros(0, 0),
            cols_offset: DMatrix::zeros(0, 0),
            detrat_inv: None,
        };
        m.calculate_inverse(false);
        m
    }

    pub fn nrows(&self) -> usize {
        self.mat.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.mat.ncols()
    }

    /// Swap two rows.  The determinant changes sign.
    pub fn swap_rows(&mut self, r1: usize, r2: usize) {
        assert_eq!(self.state, State::Ready);
        assert!(r1 < self.mat.nrows() && r2 < self.mat.nrows());
        assert_ne!(r1, r2);

        self.mat.swap_rows(r1, r2);
        if self.nullity_lower_bound == 0 {
            self.invmat.swap_columns(r1, r2);
        }
        self.det *= Complex64::new(-1.0, 0.0);
    }

    /// Swap two columns.  The determinant changes sign.
    pub fn swap_columns(&mut self, c1: usize, c2: usize) {
        assert_eq!(self.state, State::Ready);
        assert!(c1 < self.mat.ncols() && c2 < self.mat.ncols());
        assert_ne!(c1, c2);

        self.mat.swap_columns(c1, c2);
        if self.nullity_lower_bound == 0 {
            self.invmat.swap_rows(c1, c2);
        }
        self.det *= Complex64::new(-1.0, 0.0);
    }

    /// Replace row `r` with `row`.  O(N) if the matrix was not singular.
    ///
    /// The new determinant is available immediately; the inverse is not
    /// updated until `finish_row_update`, since it is irrelevant if the
    /// Monte Carlo step is rejected.
    pub fn update_row(&mut self, r: usize, row: &DVector<Complex64>) {
        assert_eq!(self.state, State::Ready);
        assert!(r < self.mat.nrows());
        assert_eq!(row.len(), self.mat.ncols());

        self.begin_update(&[r], &[], |this| {
            for j in 0..this.mat.ncols() {
                this.rows_offset[(0, j)] = row[j] - this.mat[(r, j)];
            }
        });
        self.state = State::RowUpdate;
    }

    /// Replace column `c` with `col`.
    ///
    /// @see `update_row`
    pub fn update_column(&mut self, c: usize, col: &DVector<Complex64>) {
        assert_eq!(self.state, State::Ready);
        assert!(c < self.mat.ncols());
        assert_eq!(col.len(), self.mat.nrows());

        self.begin_update(&[], &[c], |this| {
            for i in 0..this.mat.nrows() {
                this.cols_offset[(i, 0)] = col[i] - this.mat[(i, c)];
            }
        });
        self.state = State::ColumnUpdate;
    }

    /// Replace several columns at once: column `j` of `src` replaces matrix
    /// column `cols[j]`.  O(kN) for the determinant ratio.
    pub fn update_columns(&mut self, cols: &[usize], src: &DMatrix<Complex64>) {
        assert_eq!(self.state, State::Ready);
        assert!(!cols.is_empty() && cols.len() <= self.mat.ncols());
        assert_eq!(src.nrows(), self.mat.nrows());
        assert_eq!(src.ncols(), cols.len());
        debug_assert!(distinct(cols));

        self.begin_update(&[], cols, |this| {
            for (j, &c) in cols.iter().enumerate() {
                for i in 0..this.mat.nrows() {
                    this.cols_offset[(i, j)] = src[(i, j)] - this.mat[(i, c)];
                }
            }
        });
        self.state = State::ColumnsUpdate;
    }

    /// Replace rows and/or columns simultaneously: row `i` of `rows_src`
    /// replaces matrix row `rows[i]`, column `j` of `cols_src` replaces
    /// matrix column `cols[j]`.  Sources must agree on intersection cells.
    ///
    /// The mixed row-inverse-column block of the ratio matrix makes this
    /// the one update that costs O(N^2) before finishing.
    pub fn update_rows_and_columns(
        &mut self,
        rows: &[usize],
        rows_src: &DMatrix<Complex64>,
        cols: &[usize],
        cols_src: &DMatrix<Complex64>,
    ) {
        assert_eq!(self.state, State::Ready);
        assert!(!rows.is_empty() || !cols.is_empty());
        assert!(rows.len() <= self.mat.nrows() && cols.len() <= self.mat.ncols());
        assert_eq!(rows_src.nrows(), rows.len());
        assert_eq!(cols_src.ncols(), cols.len());
        if !rows.is_empty() {
            assert_eq!(rows_src.ncols(), self.mat.ncols());
        }
        if !cols.is_empty() {
            assert_eq!(cols_src.nrows(), self.mat.nrows());
        }
        debug_assert!(distinct(rows) && distinct(cols));

        self.begin_update(rows, cols, |this| {
            for (i, &r) in rows.iter().enumerate() {
                for j in 0..this.mat.ncols() {
                    this.rows_offset[(i, j)] = rows_src[(i, j)] - this.mat[(r, j)];
                }
            }
            // row offsets must be applied before the old columns are
            // captured, so that cancel (columns first, then rows) restores
            // the original matrix exactly
            for (i, &r) in rows.iter().enumerate() {
                for j in 0..this.mat.ncols() {
                    this.mat[(r, j)] += this.rows_offset[(i, j)];
                }
            }
            this.old_cols = DMatrix::zeros(this.mat.nrows(), cols.len());
            for (j, &c) in cols.iter().enumerate() {
                this.old_cols.set_column(j, &this.mat.column(c));
                for i in 0..this.mat.nrows() {
                    this.cols_offset[(i, j)] = cols_src[(i, j)] - this.mat[(i, c)];
                }
            }
        });
        self.state = State::RowColUpdate;
    }

    /// Commit a pending row update.  O(N^2).
    pub fn finish_row_update(&mut self) {
        assert_eq!(self.state, State::RowUpdate);
        self.finish_update();
    }

    /// Commit a pending column update.  O(N^2).
    pub fn finish_column_update(&mut self) {
        assert_eq!(self.state, State::ColumnUpdate);
        self.finish_update();
    }

    /// Commit a pending multi-column update.
    pub fn finish_columns_update(&mut self) {
        assert_eq!(self.state, State::ColumnsUpdate);
        self.finish_update();
    }

    /// Commit a pending row+column update.
    pub fn finish_rows_and_columns_update(&mut self) {
        assert_eq!(self.state, State::RowColUpdate);
        self.finish_update();
    }

    /// Roll back a pending row update, restoring matrix and determinant
    /// exactly.
    pub fn cancel_row_update(&mut self) {
        assert_eq!(self.state, State::RowUpdate);
        self.cancel_update();
    }

    pub fn cancel_column_update(&mut self) {
        assert_eq!(self.state, State::ColumnUpdate);
        self.cancel_update();
    }

    pub fn cancel_columns_update(&mut self) {
        assert_eq!(self.state, State::ColumnsUpdate);
        self.cancel_update();
    }

    pub fn cancel_rows_and_columns_update(&mut self) {
        assert_eq!(self.state, State::RowColUpdate);
        self.cancel_update();
    }

    /// Recompute the inverse and determinant from scratch, discarding any
    /// accumulated numerical error.
    pub fn refresh_state(&mut self) {
        assert_eq!(self.state, State::Ready);
        self.calculate_inverse(false);
    }

    pub fn matrix(&self) -> &DMatrix<Complex64> {
        &self.mat
    }

    /// The inverse matrix.  Only available between updates, and only when
    /// the matrix is invertible.
    pub fn inverse(&self) -> &DMatrix<Complex64> {
        assert_eq!(self.state, State::Ready);
        assert_eq!(self.nullity_lower_bound, 0, "matrix is singular");
        &self.invmat
    }

    /// The current determinant.  Pre-computed, so O(1); valid mid-update,
    /// where it reports the tentative post-update value.
    pub fn determinant(&self) -> BigComplex {
        self.det
    }

    pub fn is_singular(&self) -> bool {
        self.det.is_zero()
    }

    /// Sum of absolute errors of `mat * target_invmat` against the
    /// identity.
    pub fn compute_inverse_matrix_error(&self, target_invmat: &DMatrix<Complex64>) -> f64 {
        let n = self.mat.nrows();
        let mut product = &self.mat * target_invmat;
        for i in 0..n {
            product[(i, i)] -= Complex64::new(1.0, 0.0);
        }
        product.iter().map(|c| c.norm()).sum()
    }

    /// Relative error of the tracked determinant against a freshly computed
    /// one.
    pub fn compute_relative_determinant_error(&self) -> f64 {
        assert_eq!(self.state, State::Ready);
        let lu = FullPivLU::new(self.mat.clone());
        if lu_rank(&lu, self.mat.nrows()) == self.mat.nrows() {
            let d = lu.determinant();
            ((d - self.det.get_value()) / d).norm()
        } else {
            self.det.get_value().norm()
        }
    }

    /// Shared entry for every `update_*`: captures rollback data, lets the
    /// caller fill the offset blocks (and for row+column updates apply the
    /// row offsets), applies the remaining offsets, then computes the new
    /// determinant.
    fn begin_update<F>(&mut self, rows: &[usize], cols: &[usize], fill_offsets: F)
    where
        F: FnOnce(&mut Self),
    {
        assert!(!self.inverse_recalculated);
        let n = self.mat.nrows();

        self.pending_rows = rows.to_vec();
        self.pending_cols = cols.to_vec();

        self.old_rows = DMatrix::zeros(rows.len(), n);
        for (i, &r) in rows.iter().enumerate() {
            self.old_rows.set_row(i, &self.mat.row(r));
        }
        self.rows_offset = DMatrix::zeros(rows.len(), n);

        // for row+column updates the old columns are captured inside
        // fill_offsets, after the row offsets have been applied
        let rowcol = !rows.is_empty() && !cols.is_empty();
        if !rowcol {
            self.old_cols = DMatrix::zeros(n, cols.len());
            for (j, &c) in cols.iter().enumerate() {
                self.old_cols.set_column(j, &self.mat.column(c));
            }
        }
        self.cols_offset = DMatrix::zeros(n, cols.len());

        fill_offsets(self);

        if rows.is_empty() || cols.is_empty() {
            // apply the offsets (the row+column case already applied its
            // row offsets inside fill_offsets)
            for (i, &r) in self.pending_rows.clone().iter().enumerate() {
                for j in 0..n {
                    self.mat[(r, j)] += self.rows_offset[(i, j)];
                }
            }
        }
        for (j, &c) in self.pending_cols.clone().iter().enumerate() {
            for i in 0..n {
                self.mat[(i, c)] += self.cols_offset[(i, j)];
            }
        }

        self.old_det = self.det;
        self.new_nullity_lower_bound = self.nullity_lower_bound;
        self.detrat_inv = None;

        if self.nullity_lower_bound == 0 {
            self.perform_nonsingular_update();
        } else {
            self.perform_singular_update(rows.len() + cols.len());
        }
    }

    /// Builds the ratio matrix K = I + W M^-1 U for the pending offsets and
    /// multiplies the determinant by det K.
    fn perform_nonsingular_update(&mut self) {
        let kr = self.pending_rows.len();
        let kc = self.pending_cols.len();
        let k = kr + kc;

        let mut kmat = DMatrix::<Complex64>::zeros(k, k);
        for (i, &ci) in self.pending_cols.iter().enumerate() {
            for j in 0..kc {
                kmat[(i, j)] = (self.invmat.row(ci) * self.cols_offset.column(j))[(0, 0)];
            }
            for (j, &rj) in self.pending_rows.iter().enumerate() {
                kmat[(i, kc + j)] = self.invmat[(ci, rj)];
            }
            kmat[(i, i)] += Complex64::new(1.0, 0.0);
        }
        if kr > 0 {
            // the mixed block costs O(N^2); only present for row+column moves
            let rm = if kc > 0 {
                &self.rows_offset * &self.invmat
            } else {
                DMatrix::zeros(0, 0)
            };
            for i in 0..kr {
                for j in 0..kc {
                    kmat[(kc + i, j)] = (rm.row(i) * self.cols_offset.column(j))[(0, 0)];
                }
                for (j, &rj) in self.pending_rows.iter().enumerate() {
                    kmat[(kc + i, kc + j)] =
                        (self.rows_offset.row(i) * self.invmat.column(rj))[(0, 0)];
                }
                kmat[(kc + i, kc + i)] += Complex64::new(1.0, 0.0);
            }
        }

        let detrat = if k == 1 {
            let d = kmat[(0, 0)];
            if d != Complex64::new(0.0, 0.0) {
                self.detrat_inv = Some(DMatrix::from_element(1, 1, Complex64::new(1.0, 0.0) / d));
            }
            d
        } else {
            let lu = FullPivLU::new(kmat);
            if lu_rank(&lu, k) == k {
                self.detrat_inv = Some(
                    lu.try_inverse()
                        .expect("full-rank ratio matrix must invert"),
                );
                lu.determinant()
            } else {
                // the decomposition's determinant is not guaranteed to be
                // zero in this case, so force it
                Complex64::new(0.0, 0.0)
            }
        };

        self.det = self.det * detrat;

        if self.det.is_zero() {
            self.new_nullity_lower_bound = 1;
        } else if self.be_extra_careful
            && self.det.get_base().norm() < DETERMINANT_SAFE_LOWER_CUTOFF
        {
            // the matrix might have become singular; find out now, before
            // the new determinant is acted upon
            self.calculate_inverse(true);
        }
    }

    /// The matrix was already singular.  Replacing `update_rank` rows and
    /// columns can lower the nullity by at most that much; if the bound
    /// reaches zero we must recompute to learn the true determinant.
    fn perform_singular_update(&mut self, update_rank: usize) {
        debug_assert!(self.det.is_zero());
        debug_assert!(self.new_nullity_lower_bound == self.nullity_lower_bound);
        debug_assert!(self.new_nullity_lower_bound > 0);

        if update_rank >= self.nullity_lower_bound {
            self.calculate_inverse(true);
        } else {
            self.new_nullity_lower_bound = self.nullity_lower_bound - update_rank;
        }
    }

    fn finish_update(&mut self) {
        if self.new_nullity_lower_bound == 0 && !self.inverse_recalculated {
            let base = self.det.get_base().norm();
            if (!self.be_extra_careful && base < DETERMINANT_LOWER_CUTOFF)
                || base > DETERMINANT_UPPER_CUTOFF
            {
                self.calculate_inverse(true);
            } else {
                self.apply_woodbury_inverse();
            }
        }

        self.nullity_lower_bound = self.new_nullity_lower_bound;
        if self.inverse_recalculated {
            if let Some(inv) = self.new_invmat.take() {
                self.invmat = inv;
            }
            self.inverse_recalculated = false;
        }
        self.clear_pending();
        self.state = State::Ready;

        if cfg!(feature = "careful") {
            self.check_errors_carefully();
        }
    }

    fn cancel_update(&mut self) {
        // columns must be restored before rows: the old columns were
        // captured after the rows had already been updated
        for (j, &c) in self.pending_cols.iter().enumerate() {
            for i in 0..self.mat.nrows() {
                self.mat[(i, c)] = self.old_cols[(i, j)];
            }
        }
        for (i, &r) in self.pending_rows.iter().enumerate() {
            for j in 0..self.mat.ncols() {
                self.mat[(r, j)] = self.old_rows[(i, j)];
            }
        }
        self.det = self.old_det;
        self.new_nullity_lower_bound = self.nullity_lower_bound;
        self.new_invmat = None;
        self.inverse_recalculated = false;
        self.clear_pending();
        self.state = State::Ready;

        if cfg!(feature = "careful") {
            self.check_errors_carefully();
        }
    }

    /// The closed-form Sherman-Morrison-Woodbury inverse update, shared by
    /// all four finish paths:
    ///
    ///   M'^-1 = M^-1 - [M^-1 dC | M^-1 e_r] K^-1 [e_c^T M^-1 ; dR M^-1]
    ///
    /// With a single pending row or column this reduces to the familiar
    /// rank-1 formula.
    fn apply_woodbury_inverse(&mut self) {
        let n = self.mat.nrows();
        let kr = self.pending_rows.len();
        let kc = self.pending_cols.len();
        let kinv = self
            .detrat_inv
            .as_ref()
            .expect("ratio-matrix inverse must exist on the non-singular finish path");

        let mut u2 = DMatrix::<Complex64>::zeros(n, kc + kr);
        if kc > 0 {
            let cm = &self.invmat * &self.cols_offset;
            u2.view_mut((0, 0), (n, kc)).copy_from(&cm);
        }
        for (j, &rj) in self.pending_rows.iter().enumerate() {
            u2.view_mut((0, kc + j), (n, 1))
                .copy_from(&self.invmat.column(rj));
        }

        let mut v2 = DMatrix::<Complex64>::zeros(kc + kr, n);
        for (i, &ci) in self.pending_cols.iter().enumerate() {
            v2.view_mut((i, 0), (1, n)).copy_from(&self.invmat.row(ci));
        }
        if kr > 0 {
            let rm = &self.rows_offset * &self.invmat;
            v2.view_mut((kc, 0), (kr, n)).copy_from(&rm);
        }

        self.invmat -= &u2 * kinv * &v2;
    }

    fn clear_pending(&mut self) {
        self.pending_rows.clear();
        self.pending_cols.clear();
        self.old_rows = DMatrix::zeros(0, 0);
        self.old_cols = DMatrix::zeros(0, 0);
        self.rows_offset = DMatrix::zeros(0, 0);
        self.cols_offset = DMatrix::zeros(0, 0);
        self.detrat_inv = None;
    }

    /// Full-pivot LU from scratch.  Updates either the live (det, inverse,
    /// nullity) or their pending counterparts depending on whether an
    /// update is in progress.
    fn calculate_inverse(&mut self, update_in_progress: bool) {
        let n = self.mat.nrows();
        let lu = FullPivLU::new(self.mat.clone());
        let rank = lu_rank(&lu, n);
        let nullity = n - rank;

        if update_in_progress {
            self.new_nullity_lower_bound = nullity;
        } else {
            self.nullity_lower_bound = nullity;
            self.new_invmat = None;
        }

        if nullity > 0 {
            // the decomposition's determinant is not guaranteed to be zero
            // here, so set it explicitly
            self.det = BigComplex::zero();
            if update_in_progress {
                self.new_invmat = None;
            }
        } else {
            let diag = lu.u().diagonal();
            let mut phase = lu.p().determinant::<Complex64>() * lu.q().determinant::<Complex64>();
            let mut log_magnitude = 0.0;
            for d in diag.iter() {
                let norm = d.norm();
                phase *= d / norm;
                log_magnitude += norm.ln();
            }
            self.det = BigComplex::from_parts(phase, log_magnitude);

            let inv = lu
                .try_inverse()
                .expect("full-rank decomposition must invert");

            // significant inverse error here usually means the orbitals are
            // not linearly independent
            let inverse_error = self.compute_inverse_matrix_error(&inv);
            if inverse_error > 1e-4 {
                warn!("inverse matrix error of {}", inverse_error);
            }

            if update_in_progress {
                self.new_invmat = Some(inv);
            } else {
                self.invmat = inv;
            }
        }

        self.inverse_recalculated = update_in_progress;
    }

    fn check_errors_carefully(&self) {
        if self.det.is_nonzero() && self.compute_inverse_matrix_error(&self.invmat) > 1.0 {
            warn!(
                "large inverse matrix error of {}",
                self.compute_inverse_matrix_error(&self.invmat)
            );
        }
        let det_error = self.compute_relative_determinant_error();
        if !(det_error < 0.03) {
            warn!("large determinant error: {}", det_error);
        }
    }
}

/// Numerical rank from the full-pivot LU's pivot magnitudes, which are
/// non-increasing.  The threshold is relative to the largest pivot, widened
/// by a factor of ten so that nearly dependent columns register as
/// singular.
fn lu_rank(lu: &FullPivLU<Complex64, nalgebra::Dyn, nalgebra::Dyn>, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let diag = lu.u().diagonal();
    let threshold = diag[0].norm() * (n as f64) * f64::EPSILON * 10.0;
    diag.iter().filter(|d| d.norm() > threshold).count()
}

fn distinct(indices: &[usize]) -> bool {
    for (i, a) in indices.iter().enumerate() {
        if indices[..i].contains(a) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn c(re: f64) -> Complex64 {
        Complex64::new(re, 0.0)
    }

    fn random_matrix(n: usize, rng: &mut StdRng) -> DMatrix<Complex64> {
        DMatrix::from_fn(n, n, |_, _| {
            Complex64::new(rng.gen::<f64>() - 0.5, rng.gen::<f64>() - 0.5)
        })
    }

    fn assert_det_eq(m: &UpdatableMatrix, expected: Complex64, epsilon: f64) {
        let d = m.determinant().get_value();
        assert_relative_eq!(d.re, expected.re, epsilon = epsilon);
        assert_relative_eq!(d.im, expected.im, epsilon = epsilon);
    }

    #[test]
    fn test_identity_row_update() {
        // 4x4 identity; replacing row 2 with [0, 0, 2, 0] doubles the
        // determinant and halves the corresponding inverse entry
        let mut m = UpdatableMatrix::new(DMatrix::identity(4, 4), false);
        assert_det_eq(&m, c(1.0), 1e-12);

        let row = DVector::from_vec(vec![c(0.0), c(0.0), c(2.0), c(0.0)]);
        m.update_row(2, &row);
        assert_det_eq(&m, c(2.0), 1e-12);
        m.finish_row_update();

        let inv = m.inverse();
        for i in 0..4 {
            let expected = if i == 2 { 0.5 } else { 1.0 };
            assert_relative_eq!(inv[(i, i)].re, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_swap_rows_sign_and_inverse() {
        // [[1,2],[3,4]] has det -2; swapping the rows gives +2 and swaps
        // the inverse's columns
        let mat = DMatrix::from_row_slice(2, 2, &[c(1.0), c(2.0), c(3.0), c(4.0)]);
        let mut m = UpdatableMatrix::new(mat, false);
        assert_det_eq(&m, c(-2.0), 1e-12);
        {
            let inv = m.inverse();
            assert_relative_eq!(inv[(0, 0)].re, -2.0, epsilon = 1e-12);
            assert_relative_eq!(inv[(0, 1)].re, 1.0, epsilon = 1e-12);
            assert_relative_eq!(inv[(1, 0)].re, 1.5, epsilon = 1e-12);
            assert_relative_eq!(inv[(1, 1)].re, -0.5, epsilon = 1e-12);
        }

        m.swap_rows(0, 1);
        assert_det_eq(&m, c(2.0), 1e-12);

        // the inverse's columns 0 and 1 swap along with the rows
        let inv = m.inverse();
        assert_relative_eq!(inv[(0, 0)].re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(inv[(0, 1)].re, -2.0, epsilon = 1e-12);
        assert_relative_eq!(inv[(1, 0)].re, -0.5, epsilon = 1e-12);
        assert_relative_eq!(inv[(1, 1)].re, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_column_update_then_swap() {
        let mut m = UpdatableMatrix::new(DMatrix::identity(3, 3), false);
        let col = DVector::from_vec(vec![c(1.0), c(1.0), c(0.0)]);
        m.update_column(1, &col);
        m.finish_column_update();
        assert_det_eq(&m, c(1.0), 1e-12);

        m.swap_columns(0, 1);
        assert_det_eq(&m, c(-1.0), 1e-12);
    }

    #[test]
    fn test_row_scaling_multiplies_determinant() {
        let mut rng = StdRng::seed_from_u64(7);
        let mat = random_matrix(5, &mut rng);
        let mut m = UpdatableMatrix::new(mat.clone(), false);
        let initial = m.determinant().get_value();

        let alpha = Complex64::new(1.75, -0.25);
        let scaled = DVector::from_fn(5, |j, _| alpha * mat[(2, j)]);
        m.update_row(2, &scaled);
        m.finish_row_update();

        let expected = initial * alpha;
        assert_det_eq(&m, expected, 1e-10 * expected.norm());
    }

    #[test]
    fn test_update_matches_scratch() {
        // after any update/finish pair, (det, inverse) must agree with a
        // from-scratch recomputation
        let mut rng = StdRng::seed_from_u64(21);
        let mat = random_matrix(6, &mut rng);
        let mut m = UpdatableMatrix::new(mat, false);

        for step in 0..20 {
            match step % 3 {
                0 => {
                    let r = rng.gen_range(0..6);
                    let row =
                        DVector::from_fn(6, |_, _| Complex64::new(rng.gen(), rng.gen()));
                    m.update_row(r, &row);
                    m.finish_row_update();
                }
                1 => {
                    let cols = [rng.gen_range(0..3), 3 + rng.gen_range(0..3)];
                    let src = DMatrix::from_fn(6, 2, |_, _| {
                        Complex64::new(rng.gen(), rng.gen())
                    });
                    m.update_columns(&cols, &src);
                    m.finish_columns_update();
                }
                _ => {
                    let row_i = rng.gen_range(0..6);
                    let col_j = rng.gen_range(0..6);
                    let mut rows_src = DMatrix::from_fn(1, 6, |_, _| {
                        Complex64::new(rng.gen(), rng.gen())
                    });
                    let mut cols_src = DMatrix::from_fn(6, 1, |_, _| {
                        Complex64::new(rng.gen(), rng.gen())
                    });
                    // sources must agree where the row and column cross
                    let crossing = Complex64::new(rng.gen(), rng.gen());
                    rows_src[(0, col_j)] = crossing;
                    cols_src[(row_i, 0)] = crossing;
                    m.update_rows_and_columns(&[row_i], &rows_src, &[col_j], &cols_src);
                    m.finish_rows_and_columns_update();
                }
            }

            let tracked_det = m.determinant().get_value();
            let tracked_inv = m.inverse().clone();
            let mut fresh = UpdatableMatrix::new(m.matrix().clone(), false);
            fresh.refresh_state();
            let fresh_det = fresh.determinant().get_value();

            assert!((tracked_det - fresh_det).norm() <= 1e-8 * fresh_det.norm());
            let diff: f64 = (&tracked_inv - fresh.inverse())
                .iter()
                .map(|x| x.norm())
                .sum();
            let scale: f64 = fresh.inverse().iter().map(|x| x.norm()).sum();
            assert!(
                diff <= 1e-8 * scale.max(1.0),
                "inverse drifted: {} (scale {})",
                diff,
                scale
            );
        }
    }

    #[test]
    fn test_cancel_is_bit_identical() {
        let mut rng = StdRng::seed_from_u64(3);
        let mat = random_matrix(5, &mut rng);
        let mut m = UpdatableMatrix::new(mat, false);
        let mat_before = m.matrix().clone();
        let inv_before = m.inverse().clone();
        let det_before = m.determinant();

        let row = DVector::from_fn(5, |_, _| Complex64::new(rng.gen(), rng.gen()));
        m.update_row(1, &row);
        m.cancel_row_update();
        assert_eq!(m.matrix(), &mat_before);
        assert_eq!(m.inverse(), &inv_before);
        assert_eq!(m.determinant(), det_before);

        let cols = [0, 4];
        let src = DMatrix::from_fn(5, 2, |_, _| Complex64::new(rng.gen(), rng.gen()));
        m.update_columns(&cols, &src);
        m.cancel_columns_update();
        assert_eq!(m.matrix(), &mat_before);
        assert_eq!(m.inverse(), &inv_before);
        assert_eq!(m.determinant(), det_before);

        let rows_src = DMatrix::from_fn(1, 5, |_, _| Complex64::new(rng.gen(), rng.gen()));
        let mut cols_src = DMatrix::from_fn(5, 1, |_, _| Complex64::new(rng.gen(), rng.gen()));
        cols_src[(2, 0)] = rows_src[(0, 3)];
        m.update_rows_and_columns(&[2], &rows_src, &[3], &cols_src);
        m.cancel_rows_and_columns_update();
        assert_eq!(m.matrix(), &mat_before);
        assert_eq!(m.inverse(), &inv_before);
        assert_eq!(m.determinant(), det_before);
    }

    #[test]
    fn test_roundtrip_preserves_determinant() {
        // a sequence of updates that returns the matrix to its initial
        // value must return the determinant and inverse as well
        let mut rng = StdRng::seed_from_u64(11);
        let mat = random_matrix(5, &mut rng);
        let mut m = UpdatableMatrix::new(mat.clone(), false);
        let det0 = m.determinant().get_value();

        let original_row = DVector::from_fn(5, |j, _| mat[(2, j)]);
        let other_row = DVector::from_fn(5, |_, _| Complex64::new(rng.gen(), rng.gen()));
        m.update_row(2, &other_row);
        m.finish_row_update();
        m.update_row(2, &original_row);
        m.finish_row_update();

        m.swap_columns(0, 3);
        m.swap_columns(0, 3);

        let det1 = m.determinant().get_value();
        assert!((det1 - det0).norm() <= 1e-10 * det0.norm());

        let mut identity_error = 0.0;
        let product = m.matrix() * m.inverse();
        for i in 0..5 {
            for j in 0..5 {
                let expected = if i == j { 1.0 } else { 0.0 };
                identity_error += (product[(i, j)] - c(expected)).norm();
            }
        }
        assert!(identity_error < 1e-8);
    }

    #[test]
    fn test_singular_detection_and_recovery() {
        // make rows 0 and 1 equal: the matrix becomes singular, the inverse
        // becomes unavailable, and restoring the row recovers everything
        let mut rng = StdRng::seed_from_u64(5);
        let mat = random_matrix(4, &mut rng);
        let mut m = UpdatableMatrix::new(mat.clone(), true);
        assert!(!m.is_singular());

        let original_row = DVector::from_fn(4, |j, _| mat[(1, j)]);
        let duplicate_row = DVector::from_fn(4, |j, _| mat[(0, j)]);
        m.update_row(1, &duplicate_row);
        assert!(m.is_singular());
        m.finish_row_update();
        assert!(m.is_singular());

        // while singular, further updates keep the nullity bound honest
        m.update_row(1, &original_row);
        assert!(!m.is_singular());
        m.finish_row_update();

        let fresh = UpdatableMatrix::new(mat, false);
        let a = m.determinant().get_value();
        let b = fresh.determinant().get_value();
        assert!((a - b).norm() <= 1e-8 * b.norm());
    }

    #[test]
    fn test_singular_columns_update_defers() {
        // a matrix with two zero columns has nullity 2; replacing one
        // column cannot make it invertible, and no scratch recomputation
        // should claim otherwise
        let mut mat = DMatrix::identity(4, 4);
        mat.set_column(0, &DVector::from_element(4, c(0.0)));
        mat.set_column(1, &DVector::from_element(4, c(0.0)));
        let mut m = UpdatableMatrix::new(mat, false);
        assert!(m.is_singular());

        let col = DVector::from_vec(vec![c(1.0), c(0.0), c(0.0), c(0.0)]);
        m.update_column(0, &col);
        assert!(m.is_singular());
        m.finish_column_update();
        assert!(m.is_singular());

        // replacing the second dead column restores invertibility
        let col = DVector::from_vec(vec![c(0.0), c(1.0), c(0.0), c(0.0)]);
        m.update_column(1, &col);
        m.finish_column_update();
        assert!(!m.is_singular());
        assert_det_eq(&m, c(1.0), 1e-10);
    }

    #[test]
    fn test_rowcol_update_matches_scratch() {
        let mut rng = StdRng::seed_from_u64(13);
        let mat = random_matrix(6, &mut rng);
        let mut m = UpdatableMatrix::new(mat, false);

        let rows = [1, 4];
        let cols = [0, 5];
        let mut rows_src = DMatrix::from_fn(2, 6, |_, _| Complex64::new(rng.gen(), rng.gen()));
        let mut cols_src = DMatrix::from_fn(6, 2, |_, _| Complex64::new(rng.gen(), rng.gen()));
        for (i, &r) in rows.iter().enumerate() {
            for (j, &c_) in cols.iter().enumerate() {
                cols_src[(r, j)] = rows_src[(i, c_)];
            }
        }
        m.update_rows_and_columns(&rows, &rows_src, &cols, &cols_src);
        m.finish_rows_and_columns_update();

        let fresh = UpdatableMatrix::new(m.matrix().clone(), false);
        let a = m.determinant().get_value();
        let b = fresh.determinant().get_value();
        assert!((a - b).norm() <= 1e-8 * b.norm());
        let diff: f64 = (m.inverse() - fresh.inverse()).iter().map(|x| x.norm()).sum();
        let scale: f64 = fresh.inverse().iter().map(|x| x.norm()).sum();
        assert!(diff <= 1e-8 * scale.max(1.0), "inverse mismatch: {}", diff);
    }

    #[test]
    fn test_inverse_error_diagnostic() {
        let mut rng = StdRng::seed_from_u64(17);
        let mat = random_matrix(5, &mut rng);
        let m = UpdatableMatrix::new(mat, false);
        assert!(m.compute_inverse_matrix_error(m.inverse()) < 1e-10);
        assert!(m.compute_relative_determinant_error() < 1e-10);
    }

    #[test]
    #[should_panic]
    fn test_finish_without_update_panics() {
        let mut m = UpdatableMatrix::new(DMatrix::identity(2, 2), false);
        m.finish_row_update();
    }

    #[test]
    #[should_panic]
    fn test_mismatched_finish_panics() {
        let mut m = UpdatableMatrix::new(DMatrix::identity(2, 2), false);
        let col = DVector::from_vec(vec![c(1.0), c(1.0)]);
        m.update_column(0, &col);
        m.finish_row_update();
    }

    #[test]
    fn test_many_updates_stay_accurate() {
        // long random walk through row and column replacements; the
        // tracked inverse must stay close to the truth throughout
        let mut rng = StdRng::seed_from_u64(29);
        let mat = random_matrix(8, &mut rng);
        let mut m = UpdatableMatrix::new(mat, false);

        for _ in 0..200 {
            if rng.gen::<bool>() {
                let r = rng.gen_range(0..8);
                let row = DVector::from_fn(8, |_, _| Complex64::new(rng.gen(), rng.gen()));
                m.update_row(r, &row);
                if rng.gen::<f64>() < 0.5 {
                    m.finish_row_update();
                } else {
                    m.cancel_row_update();
                }
            } else {
                let c_ = rng.gen_range(0..8);
                let col = DVector::from_fn(8, |_, _| Complex64::new(rng.gen(), rng.gen()));
                m.update_column(c_, &col);
                if rng.gen::<f64>() < 0.5 {
                    m.finish_column_update();
                } else {
                    m.cancel_column_update();
                }
            }
        }

        assert!(m.compute_inverse_matrix_error(m.inverse()) < 1e-6);
        assert!(m.compute_relative_determinant_error() < 1e-6);
    }
}
