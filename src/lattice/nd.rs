//! N-dimensional Bravais lattice with an optional basis.
//!
//! Sites are addressed either structurally (`LatticeSite`: integer Bravais
//! coordinates plus a basis index) or by a packed index with the Bravais
//! coordinates least significant and the basis index most significant.

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::Rng;

use super::boundary::BoundaryCondition;
use super::Lattice;
use crate::wavefunction::{Particle, PositionArguments};

/// A site given by Bravais coordinates and a basis index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatticeSite<const D: usize> {
    pub bravais: [i32; D],
    pub basis_index: i32,
}

impl<const D: usize> LatticeSite<D> {
    pub fn new(bravais: [i32; D], basis_index: i32) -> Self {
        LatticeSite {
            bravais,
            basis_index,
        }
    }
}

/// An axis along which a particle may hop: a unit Bravais step, or a basis
/// hop when the lattice has more than one basis site.
#[derive(Debug, Clone, Copy)]
struct MoveAxis<const D: usize> {
    bravais: [i32; D],
    basis_index: i32,
}

/// Finite periodic lattice of `len[0] * ... * len[D-1] * basis_indices`
/// sites.
#[derive(Debug, Clone)]
pub struct NdLattice<const D: usize> {
    length: [i32; D],
    basis_indices: i32,
    offset: [usize; D],
    basis_offset: usize,
    total_sites: usize,
    move_axes: Vec<MoveAxis<D>>,
}

impl<const D: usize> NdLattice<D> {
    pub fn new(length: [i32; D]) -> Self {
        Self::with_basis(length, 1)
    }

    pub fn with_basis(length: [i32; D], basis_indices: i32) -> Self {
        assert!(length.iter().all(|&l| l > 0));
        assert!(basis_indices > 0);

        let mut offset = [0usize; D];
        let mut c = 1usize;
        for i in 0..D {
            offset[i] = c;
            c *= length[i] as usize;
        }
        let basis_offset = c;
        let total_sites = c * basis_indices as usize;

        let mut move_axes = Vec::with_capacity(D + 1);
        for i in 0..D {
            let mut bravais = [0; D];
            bravais[i] = 1;
            move_axes.push(MoveAxis {
                bravais,
                basis_index: 0,
            });
        }
        if basis_indices > 1 {
            move_axes.push(MoveAxis {
                bravais: [0; D],
                basis_index: 1,
            });
        }

        NdLattice {
            length,
            basis_indices,
            offset,
            basis_offset,
            total_sites,
            move_axes,
        }
    }

    pub fn length(&self) -> &[i32; D] {
        &self.length
    }

    pub fn basis_indices(&self) -> i32 {
        self.basis_indices
    }

    pub fn site_from_index(&self, n: usize) -> LatticeSite<D> {
        assert!(n < self.total_sites);
        let mut n = n;
        let mut bravais = [0; D];
        for i in 0..D {
            bravais[i] = (n % self.length[i] as usize) as i32;
            n /= self.length[i] as usize;
        }
        LatticeSite {
            bravais,
            basis_index: n as i32,
        }
    }

    pub fn site_to_index(&self, site: &LatticeSite<D>) -> usize {
        debug_assert!(self.site_is_valid(site));
        let mut n = 0usize;
        for i in 0..D {
            n += site.bravais[i] as usize * self.offset[i];
        }
        n + site.basis_index as usize * self.basis_offset
    }

    pub fn site_is_valid(&self, site: &LatticeSite<D>) -> bool {
        for i in 0..D {
            if site.bravais[i] < 0 || site.bravais[i] >= self.length[i] {
                return false;
            }
        }
        site.basis_index >= 0 && site.basis_index < self.basis_indices
    }

    /// Add a Bravais vector to a site, wrapping back into the lattice.
    /// Returns the boundary phase picked up, or 1 when no boundary
    /// conditions are supplied.
    pub fn add_site_vector(
        &self,
        site: &mut LatticeSite<D>,
        other: &[i32; D],
        bcs: Option<&[BoundaryCondition; D]>,
    ) -> Complex64 {
        for i in 0..D {
            site.bravais[i] += other[i];
        }
        self.enforce_boundary(site, bcs)
    }

    /// Subtract a Bravais vector from a site, wrapping back into the
    /// lattice.
    pub fn subtract_site_vector(
        &self,
        site: &mut LatticeSite<D>,
        other: &[i32; D],
        bcs: Option<&[BoundaryCondition; D]>,
    ) -> Complex64 {
        for i in 0..D {
            site.bravais[i] -= other[i];
        }
        self.enforce_boundary(site, bcs)
    }

    /// Wrap a site's Bravais coordinates into [0, L_d) and its basis index
    /// into [0, B), multiplying the returned phase by each dimension's
    /// boundary phase per positive wrap (and dividing per negative wrap).
    pub fn enforce_boundary(
        &self,
        site: &mut LatticeSite<D>,
        bcs: Option<&[BoundaryCondition; D]>,
    ) -> Complex64 {
        let mut phase_change = Complex64::new(1.0, 0.0);
        for dim in 0..D {
            while site.bravais[dim] >= self.length[dim] {
                site.bravais[dim] -= self.length[dim];
                if let Some(bcs) = bcs {
                    phase_change *= bcs[dim].phase();
                }
            }
            while site.bravais[dim] < 0 {
                site.bravais[dim] += self.length[dim];
                if let Some(bcs) = bcs {
                    phase_change /= bcs[dim].phase();
                }
            }
        }

        while site.basis_index < 0 {
            site.basis_index += self.basis_indices;
        }
        site.basis_index %= self.basis_indices;

        debug_assert!(self.site_is_valid(site));
        phase_change
    }

    pub fn move_axes_count(&self) -> usize {
        self.move_axes.len()
    }

    /// Step a site one unit along a move axis.  No boundary phase is
    /// tracked here; hop amplitudes are the caller's concern.
    pub fn move_site(&self, site: &mut LatticeSite<D>, move_axis: usize, step_direction: i32) {
        assert!(move_axis < self.move_axes.len());
        assert!(step_direction == -1 || step_direction == 1);
        let m = &self.move_axes[move_axis];
        for i in 0..D {
            site.bravais[i] += step_direction * m.bravais[i];
        }
        site.basis_index += step_direction * m.basis_index;
        self.enforce_boundary(site, None);
    }
}

impl<const D: usize> Lattice for NdLattice<D> {
    fn total_sites(&self) -> usize {
        self.total_sites
    }

    fn plan_particle_move_to_nearby_empty_site(
        &self,
        particle: Particle,
        r: &PositionArguments,
        rng: &mut StdRng,
    ) -> usize {
        let move_axis = if self.move_axes_count() == 1 {
            0
        } else {
            rng.gen_range(0..self.move_axes_count())
        };
        let step_direction = rng.gen_range(0..2) * 2 - 1;

        let origin = r.position(particle);
        let mut site = self.site_from_index(origin);
        loop {
            self.move_site(&mut site, move_axis, step_direction);
            let site_index = self.site_to_index(&site);
            if !r.is_occupied(site_index, particle.species) || site_index == origin {
                return site_index;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_rational::Ratio;
    use rand::SeedableRng;

    #[test]
    fn test_site_index_roundtrip() {
        let lattice = NdLattice::<2>::with_basis([4, 6], 2);
        assert_eq!(lattice.total_sites(), 48);
        for n in 0..lattice.total_sites() {
            let site = lattice.site_from_index(n);
            assert_eq!(lattice.site_to_index(&site), n);
        }
    }

    #[test]
    fn test_boundary_closure() {
        // adding and subtracting the same vector is the identity with
        // phase 1, for any site
        let lattice = NdLattice::<2>::new([4, 4]);
        let bcs = [
            BoundaryCondition::periodic(),
            BoundaryCondition::new(Ratio::new(1, 3)),
        ];
        for n in 0..lattice.total_sites() {
            let site = lattice.site_from_index(n);
            let v = [3, -7];
            let mut moved = site;
            let mut phase = lattice.add_site_vector(&mut moved, &v, Some(&bcs));
            phase *= lattice.subtract_site_vector(&mut moved, &v, Some(&bcs));
            assert_eq!(moved, site);
            assert_relative_eq!(phase.re, 1.0, epsilon = 1e-12);
            assert_relative_eq!(phase.im, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_wrap_phase_per_wrap_count() {
        let lattice = NdLattice::<1>::new([6]);
        let bcs = [BoundaryCondition::new(Ratio::new(1, 4))];

        // two full positive wraps accumulate the boundary phase squared
        let mut site = LatticeSite::new([5], 0);
        let phase = lattice.add_site_vector(&mut site, &[13], Some(&bcs));
        assert_eq!(site.bravais[0], 0);
        let expected = bcs[0].phase() * bcs[0].phase();
        assert_relative_eq!(phase.re, expected.re, epsilon = 1e-12);
        assert_relative_eq!(phase.im, expected.im, epsilon = 1e-12);
    }

    #[test]
    fn test_move_site_wraps_to_origin() {
        // moving off the end of a chain wraps around to site 0
        let lattice = NdLattice::<1>::new([6]);
        let mut site = lattice.site_from_index(5);
        lattice.move_site(&mut site, 0, 1);
        assert_eq!(lattice.site_to_index(&site), 0);

        let mut site = lattice.site_from_index(0);
        lattice.move_site(&mut site, 0, -1);
        assert_eq!(lattice.site_to_index(&site), 5);
    }

    #[test]
    fn test_open_boundary_phase_is_zero() {
        let lattice = NdLattice::<1>::new([6]);
        let bcs = [BoundaryCondition::open()];
        let mut site = LatticeSite::new([5], 0);
        let phase = lattice.add_site_vector(&mut site, &[1], Some(&bcs));
        assert_eq!(site.bravais[0], 0);
        assert_eq!(phase, Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_basis_hop_axis() {
        let lattice = NdLattice::<1>::with_basis([4], 2);
        assert_eq!(lattice.move_axes_count(), 2);
        let mut site = LatticeSite::new([1], 0);
        lattice.move_site(&mut site, 1, 1);
        assert_eq!(site.basis_index, 1);
        lattice.move_site(&mut site, 1, 1);
        assert_eq!(site.basis_index, 0);
    }

    #[test]
    fn test_nearby_empty_site_proposal() {
        let lattice = NdLattice::<1>::new([6]);
        let r = PositionArguments::new(vec![vec![0, 1, 2]], 6).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let particle = Particle::new(1, 0);
        for _ in 0..50 {
            let dest = lattice.plan_particle_move_to_nearby_empty_site(particle, &r, &mut rng);
            // steps from site 1 skip occupied same-species sites: +1 lands
            // on 3, -1 wraps past 0 onto 5
            assert!(dest == 3 || dest == 5);
            assert!(!r.is_occupied(dest, 0));
        }
    }

    #[test]
    fn test_fully_occupied_returns_origin() {
        let lattice = NdLattice::<1>::new([4]);
        let r = PositionArguments::new(vec![vec![0, 1, 2, 3]], 4).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let particle = Particle::new(2, 0);
        let dest = lattice.plan_particle_move_to_nearby_empty_site(particle, &r, &mut rng);
        assert_eq!(dest, 2);
    }
}
