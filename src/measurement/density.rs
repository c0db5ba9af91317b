//! Density-density correlation measurement.

use crate::lattice::{Lattice, NdLattice};
use crate::sampling::StandardWalk;
use crate::wavefunction::Particle;

use super::Measurement;

/// Accumulates <n(0) n(r)> over the standard walk: for every ordered pair
/// of particles, one count at (basis index of site i, packed index of
/// site j - site i).  Repeated steps re-add the previous step's
/// contribution, as Metropolis averaging requires.
pub struct DensityDensityMeasurement<const D: usize> {
    // row = basis index, column = separation site index
    density_accum: Vec<Vec<u64>>,
    denominator: Vec<u64>,
    current_density_accum: Vec<Vec<u64>>,
    current_denominator: Vec<u64>,
}

impl<const D: usize> DensityDensityMeasurement<D> {
    pub fn new() -> Self {
        DensityDensityMeasurement {
            density_accum: Vec::new(),
            denominator: Vec::new(),
            current_density_accum: Vec::new(),
            current_denominator: Vec::new(),
        }
    }

    pub fn basis_indices(&self) -> usize {
        self.density_accum.len()
    }

    pub fn n_sites(&self) -> usize {
        self.density_accum.first().map_or(0, |row| row.len())
    }

    /// The normalized correlator at a separation site index.
    pub fn get(&self, site_index: usize, basis_index: usize) -> f64 {
        let num = self.density_accum[basis_index][site_index];
        num as f64 / self.denominator[basis_index] as f64
    }
}

impl<const D: usize> Default for DensityDensityMeasurement<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize> Measurement<StandardWalk<D>> for DensityDensityMeasurement<D> {
    fn initialize(&mut self, walk: &StandardWalk<D>) {
        let lattice = walk.wavefunction().lattice();
        let total_sites = lattice.total_sites();
        assert!(total_sites > 0);
        let basis_indices = lattice.basis_indices() as usize;

        self.density_accum = vec![vec![0; total_sites]; basis_indices];
        self.denominator = vec![0; basis_indices];
        self.current_density_accum = self.density_accum.clone();
        self.current_denominator = self.denominator.clone();
    }

    fn step_advanced(&mut self, walk: &StandardWalk<D>) {
        let r = walk.wavefunction().positions();
        let lattice: &NdLattice<D> = walk.wavefunction().lattice();

        for row in &mut self.current_density_accum {
            row.iter_mut().for_each(|x| *x = 0);
        }
        self.current_denominator.iter_mut().for_each(|x| *x = 0);

        for i in 0..r.n_filled(0) {
            let site_i = lattice.site_from_index(r.position(Particle::new(i, 0)));
            for j in 0..r.n_filled(0) {
                let mut site_j = lattice.site_from_index(r.position(Particle::new(j, 0)));
                lattice.subtract_site_vector(&mut site_j, &site_i.bravais, None);
                self.current_density_accum[site_i.basis_index as usize]
                    [lattice.site_to_index(&site_j)] += 1;
            }
            self.current_denominator[site_i.basis_index as usize] += 1;
        }

        self.step_repeated(walk);
    }

    fn step_repeated(&mut self, _walk: &StandardWalk<D>) {
        for (accum, current) in self
            .density_accum
            .iter_mut()
            .zip(&self.current_density_accum)
        {
            for (a, c) in accum.iter_mut().zip(current) {
                *a += c;
            }
        }
        for (d, c) in self
            .denominator
            .iter_mut()
            .zip(&self.current_denominator)
        {
            *d += c;
        }
    }
}
