//! Subsystem-swap bookkeeping for the Rényi replica construction.
//!
//! Given two independent configuration copies with amplitudes phialpha1 and
//! phialpha2, the swapped amplitudes phibeta1 and phibeta2 are evaluated on
//! the configurations obtained by exchanging, within a geometric subsystem,
//! the particles of copy 1 with those of copy 2, species by species.  This
//! struct keeps the pairing between the two copies' subsystem particles and
//! maintains both phibetas incrementally as the phialphas move.
//!
//! phibeta mutations are always performed copy-on-write.

use std::rc::Rc;

use crate::lattice::{NdLattice, Subsystem};
use crate::wavefunction::{
    make_mut, Amplitude, Move, Particle, PositionArguments, SingleParticleMove,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    UpdateInProgress,
}

pub struct SwappedSystem<const D: usize> {
    subsystem: Rc<dyn Subsystem<D>>,

    // parallel per-species lists: the k-th entries pair the particle of
    // copy 1 swapped with the particle of copy 2.  An index appears here
    // iff that particle's position is inside the subsystem.
    copy1_subsystem_indices: Vec<Vec<usize>>,
    copy2_subsystem_indices: Vec<Vec<usize>>,

    phibeta1: Rc<Amplitude<D>>,
    phibeta2: Rc<Amplitude<D>>,
    phibeta1_dirty: bool,
    phibeta2_dirty: bool,

    state: State,

    // rollback information for the most recent update
    recent_delta: i32,
    recent_particle1: Option<Particle>,
    recent_particle2: Option<Particle>,
}

impl<const D: usize> SwappedSystem<D> {
    /// Build the pairing lists and swapped amplitudes for two copies, which
    /// must have matching per-species subsystem counts.
    pub fn new(
        subsystem: Rc<dyn Subsystem<D>>,
        phialpha1: &Amplitude<D>,
        phialpha2: &Amplitude<D>,
    ) -> Self {
        let r1 = phialpha1.positions();
        let r2 = phialpha2.positions();
        assert_eq!(r1.n_species(), r2.n_species());
        for species in 0..r1.n_species() {
            assert_eq!(r1.n_filled(species), r2.n_filled(species));
        }
        assert_eq!(r1.n_sites(), r2.n_sites());

        let lattice = phialpha1.lattice();
        let n_species = r1.n_species();
        let mut copy1_subsystem_indices = vec![Vec::new(); n_species];
        let mut copy2_subsystem_indices = vec![Vec::new(); n_species];
        for species in 0..n_species {
            for i in 0..r1.n_filled(species) {
                let particle = Particle::new(i, species);
                if subsystem.contains(r1.position(particle), lattice) {
                    copy1_subsystem_indices[species].push(i);
                }
                if subsystem.contains(r2.position(particle), lattice) {
                    copy2_subsystem_indices[species].push(i);
                }
            }
        }

        let mut system = SwappedSystem {
            subsystem,
            copy1_subsystem_indices,
            copy2_subsystem_indices,
            // placeholders, replaced by reinitialize_phibetas below
            phibeta1: Rc::new(phialpha1.clone()),
            phibeta2: Rc::new(phialpha2.clone()),
            phibeta1_dirty: false,
            phibeta2_dirty: false,
            state: State::Ready,
            recent_delta: 0,
            recent_particle1: None,
            recent_particle2: None,
        };
        assert!(system.subsystem_particle_counts_match());
        system.reinitialize_phibetas(phialpha1, phialpha2);
        system
    }

    pub fn subsystem_handle(&self) -> Rc<dyn Subsystem<D>> {
        Rc::clone(&self.subsystem)
    }

    pub fn phibeta1(&self) -> &Amplitude<D> {
        &self.phibeta1
    }

    pub fn phibeta2(&self) -> &Amplitude<D> {
        &self.phibeta2
    }

    /// Propagate one step's particle moves into the swapped amplitudes.
    /// Must be called after the phialphas have been updated.
    ///
    /// For each copy, delta = (+1 if the moved particle is now inside the
    /// subsystem) + (-1 if it was paired before the move).  The two deltas
    /// must agree; delta != 0 requires both particles to move, with the
    /// same species, both crossing the same way; delta == 0 forbids both
    /// moving at once (so at most one phibeta needs a move).
    pub fn update(
        &mut self,
        particle1: Option<Particle>,
        particle2: Option<Particle>,
        phialpha1: &Amplitude<D>,
        phialpha2: &Amplitude<D>,
    ) {
        assert_eq!(self.state, State::Ready);
        self.state = State::UpdateInProgress;

        let r1 = phialpha1.positions();
        let r2 = phialpha2.positions();
        let lattice = phialpha1.lattice();

        debug_assert!(particle1.map_or(true, |p| r1.particle_is_valid(p)));
        debug_assert!(particle2.map_or(true, |p| r2.particle_is_valid(p)));

        // pairing index of each moved particle, if it was in the subsystem
        // before the move
        let mut pairing_index1 = particle1.and_then(|p| {
            position_in_list(&self.copy1_subsystem_indices[p.species], p.index)
        });
        let mut pairing_index2 = particle2.and_then(|p| {
            position_in_list(&self.copy2_subsystem_indices[p.species], p.index)
        });

        let particle1_now_in_subsystem = particle1
            .map_or(false, |p| self.subsystem.contains(r1.position(p), lattice));
        let particle2_now_in_subsystem = particle2
            .map_or(false, |p| self.subsystem.contains(r2.position(p), lattice));

        let delta1 = (particle1_now_in_subsystem as i32) - (pairing_index1.is_some() as i32);
        let delta2 = (particle2_now_in_subsystem as i32) - (pairing_index2.is_some() as i32);
        assert_eq!(delta1, delta2, "subsystem counts would diverge");
        let delta = delta1;

        assert!(
            delta == 0
                || (particle1.is_some()
                    && particle2.is_some()
                    && particle1.unwrap().species == particle2.unwrap().species)
        );
        assert!(delta == 0 || particle1_now_in_subsystem == particle2_now_in_subsystem);
        // a particle may move in only one copy when the subsystem count is
        // unchanged; this keeps each update to at most one move per phibeta
        assert!(delta != 0 || particle1.is_none() || particle2.is_none());

        self.recent_delta = delta;
        self.recent_particle1 = particle1;
        self.recent_particle2 = particle2;

        if delta == -1 {
            // a particle of the same species leaves the subsystem in each
            // copy; the remaining subsystem particles may need re-pairing
            let particle1 = particle1.unwrap();
            let particle2 = particle2.unwrap();
            let pi1 = pairing_index1.unwrap();
            let pi2 = pairing_index2.unwrap();
            debug_assert!(!particle1_now_in_subsystem && !particle2_now_in_subsystem);

            let species = particle1.species;

            if pi1 != pi2 {
                // move the leaving pair to the max pairing index, so the
                // pair staying behind keeps a valid slot
                let c1 = &self.copy1_subsystem_indices[species];
                let c2 = &self.copy2_subsystem_indices[species];
                let (a1, b1) = (c1[pi1], c1[pi2]);
                let (a2, b2) = (c2[pi1], c2[pi2]);
                make_mut(&mut self.phibeta1).swap_particles(a1, b1, species);
                make_mut(&mut self.phibeta2).swap_particles(a2, b2, species);
                if pi1 < pi2 {
                    self.copy1_subsystem_indices[species].swap(pi1, pi2);
                } else {
                    self.copy2_subsystem_indices[species].swap(pi1, pi2);
                }
            }

            let max_pairing_index = pi1.max(pi2);
            debug_assert!(!self.phibeta1_dirty && !self.phibeta2_dirty);

            let c1_index = self.copy1_subsystem_indices[species][max_pairing_index];
            let mv: Move = vec![SingleParticleMove::new(
                Particle::new(c1_index, species),
                r1.position(particle1),
            )];
            make_mut(&mut self.phibeta1)
                .perform_move(&mv)
                .expect("swapped move is valid");

            let c2_index = self.copy2_subsystem_indices[species][max_pairing_index];
            let mv: Move = vec![SingleParticleMove::new(
                Particle::new(c2_index, species),
                r2.position(particle2),
            )];
            make_mut(&mut self.phibeta2)
                .perform_move(&mv)
                .expect("swapped move is valid");

            self.phibeta1_dirty = true;
            self.phibeta2_dirty = true;

            // drop the vacated pair slot
            self.copy1_subsystem_indices[species].swap_remove(max_pairing_index);
            self.copy2_subsystem_indices[species].swap_remove(max_pairing_index);
        } else {
            debug_assert!(delta == 0 || delta == 1);

            // either both particles entered the subsystem and pair with
            // each other immediately, or a single particle moved without
            // changing the subsystem count
            if delta == 1 {
                let particle1 = particle1.unwrap();
                let particle2 = particle2.unwrap();
                let c1 = &mut self.copy1_subsystem_indices[particle1.species];
                c1.push(particle1.index);
                pairing_index1 = Some(c1.len() - 1);
                let c2 = &mut self.copy2_subsystem_indices[particle2.species];
                c2.push(particle2.index);
                pairing_index2 = Some(c2.len() - 1);
            }

            debug_assert!(self.subsystem_particle_counts_match());

            if let Some(particle1) = particle1 {
                // a move inside the subsystem affects the other copy's
                // swapped configuration
                let (phibeta, dirty, phibeta_particle) = if particle1_now_in_subsystem {
                    let paired = self.copy2_subsystem_indices[particle1.species]
                        [pairing_index1.unwrap()];
                    (
                        &mut self.phibeta2,
                        &mut self.phibeta2_dirty,
                        Particle::new(paired, particle1.species),
                    )
                } else {
                    (&mut self.phibeta1, &mut self.phibeta1_dirty, particle1)
                };
                debug_assert!(!*dirty);
                let mv: Move = vec![SingleParticleMove::new(
                    phibeta_particle,
                    r1.position(particle1),
                )];
                make_mut(phibeta)
                    .perform_move(&mv)
                    .expect("swapped move is valid");
                *dirty = true;
            }

            if let Some(particle2) = particle2 {
                // when both particles move (delta == 1) this phibeta is the
                // other one, so the dirty flag is never already set here
                let (phibeta, dirty, phibeta_particle) = if particle2_now_in_subsystem {
                    let paired = self.copy1_subsystem_indices[particle2.species]
                        [pairing_index2.unwrap()];
                    (
                        &mut self.phibeta1,
                        &mut self.phibeta1_dirty,
                        Particle::new(paired, particle2.species),
                    )
                } else {
                    (&mut self.phibeta2, &mut self.phibeta2_dirty, particle2)
                };
                debug_assert!(!*dirty);
                let mv: Move = vec![SingleParticleMove::new(
                    phibeta_particle,
                    r2.position(particle2),
                )];
                make_mut(phibeta)
                    .perform_move(&mv)
                    .expect("swapped move is valid");
                *dirty = true;
            }
        }
    }

    /// Commit the pending phibeta moves.
    pub fn finish_update(&mut self, phialpha1: &Amplitude<D>, phialpha2: &Amplitude<D>) {
        assert_eq!(self.state, State::UpdateInProgress);
        self.state = State::Ready;

        assert!(self.subsystem_particle_counts_match());

        if self.phibeta1_dirty {
            make_mut(&mut self.phibeta1).finish_move();
        }
        self.phibeta1_dirty = false;

        if self.phibeta2_dirty {
            make_mut(&mut self.phibeta2).finish_move();
        }
        self.phibeta2_dirty = false;

        if cfg!(feature = "careful") {
            self.verify_phibetas(phialpha1, phialpha2);
        }
    }

    /// Roll back the pending phibeta moves and the pairing-list changes.
    pub fn cancel_update(&mut self, phialpha1: &Amplitude<D>, phialpha2: &Amplitude<D>) {
        assert_eq!(self.state, State::UpdateInProgress);
        self.state = State::Ready;

        if self.phibeta1_dirty {
            make_mut(&mut self.phibeta1).cancel_move();
        }
        self.phibeta1_dirty = false;

        if self.phibeta2_dirty {
            make_mut(&mut self.phibeta2).cancel_move();
        }
        self.phibeta2_dirty = false;

        if self.recent_delta != 0 {
            let particle1 = self.recent_particle1.expect("rollback info");
            let particle2 = self.recent_particle2.expect("rollback info");
            assert_eq!(particle1.species, particle2.species);
            let species = particle1.species;
            if self.recent_delta == 1 {
                // the entering particles paired at the end of the lists
                self.copy1_subsystem_indices[species].pop();
                self.copy2_subsystem_indices[species].pop();
            } else {
                debug_assert_eq!(self.recent_delta, -1);
                // the leaving particles return to the subsystem, re-paired
                // with each other at the end
                self.copy1_subsystem_indices[species].push(particle1.index);
                self.copy2_subsystem_indices[species].push(particle2.index);
            }
        }

        if cfg!(feature = "careful") {
            self.verify_phibetas(phialpha1, phialpha2);
        }
    }

    /// Whether the per-species pairing lists have equal lengths in the two
    /// copies.
    pub fn subsystem_particle_counts_match(&self) -> bool {
        debug_assert_eq!(
            self.copy1_subsystem_indices.len(),
            self.copy2_subsystem_indices.len()
        );
        self.copy1_subsystem_indices
            .iter()
            .zip(&self.copy2_subsystem_indices)
            .all(|(c1, c2)| c1.len() == c2.len())
    }

    /// Rebuild both phibetas from scratch on the swapped configurations.
    fn reinitialize_phibetas(&mut self, phialpha1: &Amplitude<D>, phialpha2: &Amplitude<D>) {
        assert!(self.subsystem_particle_counts_match());

        let (swapped_r1, swapped_r2) = self.swap_positions(phialpha1, phialpha2);

        let mut phibeta1 = phialpha1.clone();
        phibeta1.reset(swapped_r1);
        self.phibeta1 = Rc::new(phibeta1);
        self.phibeta1_dirty = false;

        let mut phibeta2 = phialpha2.clone();
        phibeta2.reset(swapped_r2);
        self.phibeta2 = Rc::new(phibeta2);
        self.phibeta2_dirty = false;

        if cfg!(feature = "careful") {
            self.verify_phibetas(phialpha1, phialpha2);
        }
    }

    /// The two copies' configurations with paired subsystem particles
    /// exchanged.
    fn swap_positions(
        &self,
        phialpha1: &Amplitude<D>,
        phialpha2: &Amplitude<D>,
    ) -> (PositionArguments, PositionArguments) {
        let r1 = phialpha1.positions();
        let r2 = phialpha2.positions();

        let mut v1: Vec<Vec<usize>> = (0..r1.n_species())
            .map(|s| r1.r_vector(s).to_vec())
            .collect();
        let mut v2: Vec<Vec<usize>> = (0..r2.n_species())
            .map(|s| r2.r_vector(s).to_vec())
            .collect();

        for species in 0..r1.n_species() {
            let c1 = &self.copy1_subsystem_indices[species];
            let c2 = &self.copy2_subsystem_indices[species];
            debug_assert_eq!(c1.len(), c2.len());
            for (&i1, &i2) in c1.iter().zip(c2) {
                std::mem::swap(&mut v1[species][i1], &mut v2[species][i2]);
            }
        }

        let n_sites = r1.n_sites();
        (
            PositionArguments::new(v1, n_sites).expect("swapped configuration is valid"),
            PositionArguments::new(v2, n_sites).expect("swapped configuration is valid"),
        )
    }

    /// Diagnostic: recompute the swapped configurations from the phialphas
    /// and assert the phibetas and pairing lists agree with them.
    pub fn verify_phibetas(&self, phialpha1: &Amplitude<D>, phialpha2: &Amplitude<D>) {
        let r1 = phialpha1.positions();
        let r2 = phialpha2.positions();
        let lattice = phialpha1.lattice();

        assert_eq!(r1.n_species(), r2.n_species());
        assert_eq!(self.copy1_subsystem_indices.len(), r1.n_species());
        assert_eq!(self.copy2_subsystem_indices.len(), r1.n_species());

        for species in 0..r1.n_species() {
            let n = r1.n_filled(species);
            assert_eq!(n, r2.n_filled(species));

            // the pairing lists hold exactly the subsystem members, no
            // duplicates
            let mut count1 = 0;
            let mut count2 = 0;
            for i in 0..n {
                let particle = Particle::new(i, species);
                let b1 =
                    position_in_list(&self.copy1_subsystem_indices[species], i).is_some();
                let b2 =
                    position_in_list(&self.copy2_subsystem_indices[species], i).is_some();
                if b1 {
                    count1 += 1;
                }
                if b2 {
                    count2 += 1;
                }
                assert_eq!(
                    b1,
                    self.subsystem.contains(r1.position(particle), lattice)
                );
                assert_eq!(
                    b2,
                    self.subsystem.contains(r2.position(particle), lattice)
                );
            }
            assert_eq!(count1, count2);
            assert_eq!(count1, self.copy1_subsystem_indices[species].len());
            assert_eq!(count2, self.copy2_subsystem_indices[species].len());
        }

        // the phibeta positions equal the reconstructed swapped positions
        let (swapped_r1, swapped_r2) = self.swap_positions(phialpha1, phialpha2);
        for species in 0..r1.n_species() {
            for i in 0..r1.n_filled(species) {
                let particle = Particle::new(i, species);
                assert_eq!(
                    swapped_r1.position(particle),
                    self.phibeta1.positions().position(particle)
                );
                assert_eq!(
                    swapped_r2.position(particle),
                    self.phibeta2.positions().position(particle)
                );
            }
        }
    }
}

fn position_in_list(list: &[usize], value: usize) -> Option<usize> {
    list.iter().position(|&x| x == value)
}


/// Whether two amplitudes have matching per-species particle counts inside
/// a subsystem; a swap is only defined when they do.
pub fn count_subsystem_particle_counts_for_match<const D: usize>(
    wf1: &Amplitude<D>,
    wf2: &Amplitude<D>,
    subsystem: &dyn Subsystem<D>,
) -> bool {
    let r1 = wf1.positions();
    let r2 = wf2.positions();
    assert_eq!(r1.n_species(), r2.n_species());
    assert_eq!(r1.n_sites(), r2.n_sites());

    for species in 0..r1.n_species() {
        assert_eq!(r1.n_filled(species), r2.n_filled(species));
        let count = |r: &PositionArguments, lattice: &Rc<NdLattice<D>>| {
            (0..r.n_filled(species))
                .filter(|&i| {
                    subsystem.contains(r.position(Particle::new(i, species)), lattice)
                })
                .count()
        };
        if count(r1, wf1.lattice()) != count(r2, wf2.lattice()) {
            return false;
        }
    }
    true
}
