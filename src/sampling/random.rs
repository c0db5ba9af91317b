//! Random selection helpers.

use rand::rngs::StdRng;
use rand::Rng;

use crate::wavefunction::{Particle, PositionArguments};

/// Pick a particle uniformly among all particles of all species.
pub fn choose_random_particle(r: &PositionArguments, rng: &mut StdRng) -> Particle {
    let mut choice = rng.gen_range(0..r.n_filled_total());
    for species in 0..r.n_species() {
        if choice < r.n_filled(species) {
            return Particle::new(choice, species);
        }
        choice -= r.n_filled(species);
    }
    unreachable!("particle choice out of range");
}

/// Uniform random combination of `r` values from [0, n), per Jon Bentley's
/// algorithm in CACM, September 1987, Volume 30, Number 9.
pub fn random_combination(r: usize, n: usize, rng: &mut StdRng) -> Vec<usize> {
    assert!(n > 0);
    assert!(r > 0);
    assert!(r <= n);

    if n == r {
        // the loop below fails if k == 0 is ever reached, so handle the
        // only case that could cause that
        return (0..r).collect();
    }

    let mut v = Vec::with_capacity(r);
    let mut vs = std::collections::BTreeSet::new();
    for k in (n - r)..n {
        let x = rng.gen_range(0..=k);
        let a = if vs.contains(&x) { k } else { x };
        v.push(a);
        vs.insert(a);
    }

    debug_assert_eq!(v.len(), r);
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_random_combination_is_a_combination() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..100 {
            let v = random_combination(4, 10, &mut rng);
            assert_eq!(v.len(), 4);
            let mut sorted = v.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), 4);
            assert!(v.iter().all(|&x| x < 10));
        }
    }

    #[test]
    fn test_random_combination_full() {
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(random_combination(5, 5, &mut rng), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_random_combination_covers_all_values() {
        // every site should appear eventually
        let mut rng = StdRng::seed_from_u64(12);
        let mut seen = [false; 6];
        for _ in 0..200 {
            for x in random_combination(2, 6, &mut rng) {
                seen[x] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_choose_random_particle_uniform() {
        let r = PositionArguments::new(vec![vec![0, 1], vec![2, 3, 4]], 6).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut counts = [0usize; 5];
        for _ in 0..5000 {
            let p = choose_random_particle(&r, &mut rng);
            let flat = if p.species == 0 { p.index } else { 2 + p.index };
            counts[flat] += 1;
        }
        for &c in &counts {
            assert!(c > 800 && c < 1200, "non-uniform particle choice: {:?}", counts);
        }
    }
}
