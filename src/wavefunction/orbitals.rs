//! Plane-wave orbital tables.
//!
//! An orbital table holds the value of every filled orbital at every site,
//! so that amplitude matrices can be assembled and updated by column reads.

use std::rc::Rc;

use nalgebra::{DMatrix, DVectorView};
use num_complex::Complex64;

use crate::lattice::{BoundaryCondition, Lattice, NdLattice};

/// Values of N filled orbitals at every lattice site (row = orbital,
/// column = site), shared read-only between amplitudes.
#[derive(Debug)]
pub struct OrbitalDefinitions<const D: usize> {
    orbitals: DMatrix<Complex64>,
    lattice: Rc<NdLattice<D>>,
    boundary_conditions: [BoundaryCondition; D],
}

impl<const D: usize> OrbitalDefinitions<D> {
    /// Build the table for filled momenta on a twisted torus.  Orbital n
    /// at Bravais site x has value exp(i * sum_d 2 pi (k_d + p_d) x_d / L_d)
    /// where k are the momentum indices and p the per-dimension twist
    /// fractions.  Requires a basis-1 lattice.
    pub fn from_filled_momenta(
        filled_momenta: &[[i32; D]],
        lattice: Rc<NdLattice<D>>,
        boundary_conditions: [BoundaryCondition; D],
    ) -> Self {
        assert_eq!(lattice.basis_indices(), 1);
        for momentum in filled_momenta {
            for d in 0..D {
                assert!(momentum[d] >= 0 && momentum[d] < lattice.length()[d]);
            }
        }

        let n_sites = lattice.total_sites();
        let orbitals = DMatrix::from_fn(filled_momenta.len(), n_sites, |n, s| {
            let site = lattice.site_from_index(s);
            let mut theta = 0.0;
            for d in 0..D {
                let k = filled_momenta[n][d] as f64 + boundary_conditions[d].p_f64();
                theta += 2.0 * std::f64::consts::PI * k * site.bravais[d] as f64
                    / lattice.length()[d] as f64;
            }
            Complex64::new(0.0, theta).exp()
        });

        OrbitalDefinitions {
            orbitals,
            lattice,
            boundary_conditions,
        }
    }

    pub fn n_filled(&self) -> usize {
        self.orbitals.nrows()
    }

    pub fn n_sites(&self) -> usize {
        self.orbitals.ncols()
    }

    /// The column of all orbital values at one site.
    pub fn at_position(&self, site_index: usize) -> DVectorView<'_, Complex64> {
        self.orbitals.column(site_index)
    }

    pub fn lattice(&self) -> &Rc<NdLattice<D>> {
        &self.lattice
    }

    pub fn boundary_conditions(&self) -> &[BoundaryCondition; D] {
        &self.boundary_conditions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_periodic_chain_orbitals() {
        let lattice = Rc::new(NdLattice::<1>::new([4]));
        let orbitals = OrbitalDefinitions::from_filled_momenta(
            &[[0], [1]],
            lattice,
            [BoundaryCondition::periodic()],
        );
        assert_eq!(orbitals.n_filled(), 2);
        assert_eq!(orbitals.n_sites(), 4);

        // k = 0 plus the periodic twist p = 1 is constant up to a full
        // winding; k = 1 with the twist advances by a quarter turn per
        // extra momentum unit
        for s in 0..4 {
            let column = orbitals.at_position(s);
            assert_relative_eq!(column[0].norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(column[1].norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_orbital_phases_advance_per_site() {
        let lattice = Rc::new(NdLattice::<1>::new([4]));
        let orbitals = OrbitalDefinitions::from_filled_momenta(
            &[[1]],
            Rc::clone(&lattice),
            [BoundaryCondition::open()],
        );
        // with no twist, orbital k=1 at site x is exp(2 pi i x / 4)
        for s in 0..4 {
            let expected =
                Complex64::new(0.0, 2.0 * std::f64::consts::PI * s as f64 / 4.0).exp();
            let v = orbitals.at_position(s)[0];
            assert_relative_eq!(v.re, expected.re, epsilon = 1e-12);
            assert_relative_eq!(v.im, expected.im, epsilon = 1e-12);
        }
    }
}
