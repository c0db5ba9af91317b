//! Geometric subsystems used by the entanglement estimators.

use super::nd::NdLattice;

/// A predicate selecting the sites of a geometric subsystem.
pub trait Subsystem<const D: usize> {
    fn contains(&self, site_index: usize, lattice: &NdLattice<D>) -> bool;
}

/// An axis-aligned box anchored at the origin: a site is inside when every
/// Bravais coordinate is below the corresponding length.  Works for any
/// parallelepiped subsystem aligned with the primitive vectors; the basis
/// index is ignored.
#[derive(Debug, Clone, Copy)]
pub struct SimpleSubsystem<const D: usize> {
    pub lengths: [u32; D],
}

impl<const D: usize> SimpleSubsystem<D> {
    pub fn new(lengths: [u32; D]) -> Self {
        SimpleSubsystem { lengths }
    }

    /// A cube with the same length along every dimension.
    pub fn cube(length: u32) -> Self {
        SimpleSubsystem {
            lengths: [length; D],
        }
    }
}

impl<const D: usize> Subsystem<D> for SimpleSubsystem<D> {
    fn contains(&self, site_index: usize, lattice: &NdLattice<D>) -> bool {
        let site = lattice.site_from_index(site_index);
        for i in 0..D {
            debug_assert!(site.bravais[i] >= 0);
            if site.bravais[i] >= self.lengths[i] as i32 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_membership_1d() {
        let lattice = NdLattice::<1>::new([6]);
        let subsystem = SimpleSubsystem::<1>::cube(2);
        let inside: Vec<usize> = (0..6)
            .filter(|&s| subsystem.contains(s, &lattice))
            .collect();
        assert_eq!(inside, vec![0, 1]);
    }

    #[test]
    fn test_box_membership_2d() {
        let lattice = NdLattice::<2>::new([4, 4]);
        let subsystem = SimpleSubsystem::<2>::new([2, 3]);
        let count = (0..16)
            .filter(|&s| subsystem.contains(s, &lattice))
            .count();
        assert_eq!(count, 6);
    }
}
