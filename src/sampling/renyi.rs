//! Walks for the Rényi entanglement estimators.
//!
//! Both walks evolve two independent configuration copies restricted to the
//! sector where a subsystem swap is possible (equal per-species subsystem
//! counts in both copies), maintaining the swapped amplitudes through a
//! `SwappedSystem`.  See Y. Zhang et al., PRL 107, 067202 (2011).

use std::rc::Rc;

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::Rng;

use super::metropolis::Walk;
use super::random::choose_random_particle;
use super::swapped::{count_subsystem_particle_counts_for_match, SwappedSystem};
use crate::lattice::{Lattice, Subsystem};
use crate::linalg::BigComplex;
use crate::wavefunction::{make_mut, Amplitude, Particle, SingleParticleMove};

/// How a concrete walk combines the four amplitude ratios into a target
/// probability.
type ProbabilityRatioFn = fn(Complex64, Complex64, Complex64, Complex64) -> f64;

/// Shared machinery of the swap-possible walks: two copy-on-write phialpha
/// handles, the swapped system, and the transition bookkeeping.
struct SwapWalkBase<const D: usize> {
    phialpha1: Rc<Amplitude<D>>,
    phialpha2: Rc<Amplitude<D>>,
    swapped_system: SwappedSystem<D>,
    chosen_particle1: Option<Particle>,
    chosen_particle2: Option<Particle>,
    // when false, the swapped system is only updated once the transition is
    // accepted; the phibeta ratios then enter the probability as 1
    update_swapped_system_before_accepting: bool,
    transition_in_progress: bool,
    swapped_system_updated: bool,
    autoreject: bool,
}

impl<const D: usize> SwapWalkBase<D> {
    fn new(
        phialpha1: Rc<Amplitude<D>>,
        phialpha2: Rc<Amplitude<D>>,
        subsystem: Rc<dyn Subsystem<D>>,
        update_swapped_system_before_accepting: bool,
    ) -> Self {
        assert!(count_subsystem_particle_counts_for_match(
            &phialpha1,
            &phialpha2,
            subsystem.as_ref()
        ));
        let swapped_system = SwappedSystem::new(subsystem, &phialpha1, &phialpha2);
        SwapWalkBase {
            phialpha1,
            phialpha2,
            swapped_system,
            chosen_particle1: None,
            chosen_particle2: None,
            update_swapped_system_before_accepting,
            transition_in_progress: false,
            swapped_system_updated: false,
            autoreject: false,
        }
    }

    fn subsystem(&self) -> Rc<dyn Subsystem<D>> {
        self.swapped_system.subsystem_handle()
    }

    fn compute_probability_ratio(
        &mut self,
        rng: &mut StdRng,
        probability_ratio: ProbabilityRatioFn,
    ) -> f64 {
        assert!(!self.transition_in_progress);
        self.transition_in_progress = true;
        self.swapped_system_updated = false;
        self.chosen_particle1 = None;
        self.chosen_particle2 = None;

        // choose uniformly among: move in copy 1 only, copy 2 only, both
        let transition_type = rng.gen_range(0..3);

        let (move1, move2) = match transition_type {
            0 => (self.plan_single_copy_move(1, rng), None),
            1 => (None, self.plan_single_copy_move(2, rng)),
            _ => self.plan_crossing_moves(rng),
        };
        if self.autoreject {
            return 0.0;
        }

        // apply the phialpha moves and collect their ratios
        let mut phialpha1_ratio = Complex64::new(1.0, 0.0);
        let mut phialpha2_ratio = Complex64::new(1.0, 0.0);
        if let Some((particle, destination)) = move1 {
            let psi_old = self.phialpha1.psi();
            let mv = vec![SingleParticleMove::new(particle, destination)];
            make_mut(&mut self.phialpha1)
                .perform_move(&mv)
                .expect("proposed site is empty");
            phialpha1_ratio = ratio(self.phialpha1.psi(), psi_old);
            self.chosen_particle1 = Some(particle);
        }
        if let Some((particle, destination)) = move2 {
            let psi_old = self.phialpha2.psi();
            let mv = vec![SingleParticleMove::new(particle, destination)];
            make_mut(&mut self.phialpha2)
                .perform_move(&mv)
                .expect("proposed site is empty");
            phialpha2_ratio = ratio(self.phialpha2.psi(), psi_old);
            self.chosen_particle2 = Some(particle);
        }

        let mut phibeta1_ratio = Complex64::new(1.0, 0.0);
        let mut phibeta2_ratio = Complex64::new(1.0, 0.0);
        if self.update_swapped_system_before_accepting {
            let phibeta1_old = self.swapped_system.phibeta1().psi();
            let phibeta2_old = self.swapped_system.phibeta2().psi();
            self.swapped_system.update(
                self.chosen_particle1,
                self.chosen_particle2,
                &self.phialpha1,
                &self.phialpha2,
            );
            self.swapped_system_updated = true;
            phibeta1_ratio = ratio(self.swapped_system.phibeta1().psi(), phibeta1_old);
            phibeta2_ratio = ratio(self.swapped_system.phibeta2().psi(), phibeta2_old);
        }

        probability_ratio(
            phialpha1_ratio,
            phialpha2_ratio,
            phibeta1_ratio,
            phibeta2_ratio,
        )
    }

    /// A move in one copy that keeps the particle on the same side of the
    /// subsystem boundary.  Crossing alone would unbalance the subsystem
    /// counts, so such proposals are auto-rejected.
    fn plan_single_copy_move(
        &mut self,
        copy: usize,
        rng: &mut StdRng,
    ) -> Option<(Particle, usize)> {
        let wf = if copy == 1 {
            &self.phialpha1
        } else {
            &self.phialpha2
        };
        let particle = choose_random_particle(wf.positions(), rng);
        let origin = wf.positions().position(particle);
        let destination =
            wf.lattice()
                .plan_particle_move_to_nearby_empty_site(particle, wf.positions(), rng);
        if destination == origin {
            self.autoreject = true;
            return None;
        }
        let was_in = self.subsystem().contains(origin, wf.lattice());
        let now_in = self.subsystem().contains(destination, wf.lattice());
        if was_in != now_in {
            self.autoreject = true;
            return None;
        }
        Some((particle, destination))
    }

    /// Coordinated moves in both copies.  Legal only when a same-species
    /// particle crosses the subsystem boundary the same way in each copy;
    /// anything else is auto-rejected.
    #[allow(clippy::type_complexity)]
    fn plan_crossing_moves(
        &mut self,
        rng: &mut StdRng,
    ) -> (Option<(Particle, usize)>, Option<(Particle, usize)>) {
        let particle1 = choose_random_particle(self.phialpha1.positions(), rng);
        let origin1 = self.phialpha1.positions().position(particle1);
        let destination1 = self.phialpha1.lattice().plan_particle_move_to_nearby_empty_site(
            particle1,
            self.phialpha1.positions(),
            rng,
        );
        if destination1 == origin1 {
            self.autoreject = true;
            return (None, None);
        }
        let lattice1 = self.phialpha1.lattice();
        let delta1 = (self.subsystem().contains(destination1, lattice1) as i32)
            - (self.subsystem().contains(origin1, lattice1) as i32);
        if delta1 == 0 {
            // both-copy moves exist to transfer particles across the
            // boundary; a non-crossing pair is never necessary
            self.autoreject = true;
            return (None, None);
        }

        // partner: a random same-species particle of copy 2
        let n2 = self.phialpha2.positions().n_filled(particle1.species);
        let particle2 = Particle::new(rng.gen_range(0..n2), particle1.species);
        let origin2 = self.phialpha2.positions().position(particle2);
        let destination2 = self.phialpha2.lattice().plan_particle_move_to_nearby_empty_site(
            particle2,
            self.phialpha2.positions(),
            rng,
        );
        if destination2 == origin2 {
            self.autoreject = true;
            return (None, None);
        }
        let lattice2 = self.phialpha2.lattice();
        let delta2 = (self.subsystem().contains(destination2, lattice2) as i32)
            - (self.subsystem().contains(origin2, lattice2) as i32);
        if delta2 != delta1 {
            self.autoreject = true;
            return (None, None);
        }

        (
            Some((particle1, destination1)),
            Some((particle2, destination2)),
        )
    }

    fn accept(&mut self) {
        assert!(self.transition_in_progress);
        debug_assert!(!self.autoreject);

        if !self.swapped_system_updated {
            self.swapped_system.update(
                self.chosen_particle1,
                self.chosen_particle2,
                &self.phialpha1,
                &self.phialpha2,
            );
            self.swapped_system_updated = true;
        }

        if self.chosen_particle1.is_some() {
            make_mut(&mut self.phialpha1).finish_move();
        }
        if self.chosen_particle2.is_some() {
            make_mut(&mut self.phialpha2).finish_move();
        }
        self.swapped_system
            .finish_update(&self.phialpha1, &self.phialpha2);

        self.transition_in_progress = false;
        self.swapped_system_updated = false;
    }

    fn reject(&mut self) {
        assert!(self.transition_in_progress);

        if !self.autoreject {
            if self.swapped_system_updated {
                // cancel the phibetas before the phialphas: the swapped
                // system's rollback reads only its own stored state
                self.swapped_system
                    .cancel_update(&self.phialpha1, &self.phialpha2);
            }
            if self.chosen_particle1.is_some() {
                make_mut(&mut self.phialpha1).cancel_move();
            }
            if self.chosen_particle2.is_some() {
                make_mut(&mut self.phialpha2).cancel_move();
            }
        }

        self.chosen_particle1 = None;
        self.chosen_particle2 = None;
        self.autoreject = false;
        self.transition_in_progress = false;
        self.swapped_system_updated = false;
    }
}

/// Walk sampling |psi_alpha1 psi_alpha2|^2 within the swap-possible sector.
/// Its estimator measures |psi_beta1 psi_beta2 / psi_alpha1 psi_alpha2|.
///
/// The phibeta ratios cancel from this walk's measure, so the swapped
/// system update is deferred until a transition is accepted.
pub struct RenyiModWalk<const D: usize> {
    base: SwapWalkBase<D>,
}

impl<const D: usize> RenyiModWalk<D> {
    pub fn new(
        phialpha1: Rc<Amplitude<D>>,
        phialpha2: Rc<Amplitude<D>>,
        subsystem: Rc<dyn Subsystem<D>>,
    ) -> Self {
        RenyiModWalk {
            base: SwapWalkBase::new(phialpha1, phialpha2, subsystem, false),
        }
    }

    pub fn phialpha1(&self) -> &Amplitude<D> {
        &self.base.phialpha1
    }

    pub fn phialpha2(&self) -> &Amplitude<D> {
        &self.base.phialpha2
    }

    pub fn phibeta1(&self) -> &Amplitude<D> {
        self.base.swapped_system.phibeta1()
    }

    pub fn phibeta2(&self) -> &Amplitude<D> {
        self.base.swapped_system.phibeta2()
    }

    /// Diagnostic: assert the swapped system agrees with the phialphas.
    pub fn verify_swapped_system(&self) {
        self.base
            .swapped_system
            .verify_phibetas(&self.base.phialpha1, &self.base.phialpha2);
    }

    fn probability_ratio(
        phialpha1_ratio: Complex64,
        phialpha2_ratio: Complex64,
        _phibeta1_ratio: Complex64,
        _phibeta2_ratio: Complex64,
    ) -> f64 {
        phialpha1_ratio.norm_sqr() * phialpha2_ratio.norm_sqr()
    }
}

impl<const D: usize> Walk for RenyiModWalk<D> {
    fn compute_probability_ratio_of_random_transition(&mut self, rng: &mut StdRng) -> f64 {
        self.base
            .compute_probability_ratio(rng, Self::probability_ratio)
    }

    fn accept_transition(&mut self) {
        self.base.accept();
    }

    fn reject_transition(&mut self) {
        self.base.reject();
    }
}

/// Walk sampling |psi_alpha1 psi_alpha2 psi_beta1 psi_beta2|.  Its
/// estimator measures the phase of the swap ratio.
pub struct RenyiSignWalk<const D: usize> {
    base: SwapWalkBase<D>,
}

impl<const D: usize> RenyiSignWalk<D> {
    pub fn new(
        phialpha1: Rc<Amplitude<D>>,
        phialpha2: Rc<Amplitude<D>>,
        subsystem: Rc<dyn Subsystem<D>>,
    ) -> Self {
        RenyiSignWalk {
            base: SwapWalkBase::new(phialpha1, phialpha2, subsystem, true),
        }
    }

    pub fn phialpha1(&self) -> &Amplitude<D> {
        &self.base.phialpha1
    }

    pub fn phialpha2(&self) -> &Amplitude<D> {
        &self.base.phialpha2
    }

    pub fn phibeta1(&self) -> &Amplitude<D> {
        self.base.swapped_system.phibeta1()
    }

    pub fn phibeta2(&self) -> &Amplitude<D> {
        self.base.swapped_system.phibeta2()
    }

    /// Diagnostic: assert the swapped system agrees with the phialphas.
    pub fn verify_swapped_system(&self) {
        self.base
            .swapped_system
            .verify_phibetas(&self.base.phialpha1, &self.base.phialpha2);
    }

    fn probability_ratio(
        phialpha1_ratio: Complex64,
        phialpha2_ratio: Complex64,
        phibeta1_ratio: Complex64,
        phibeta2_ratio: Complex64,
    ) -> f64 {
        (phialpha1_ratio * phialpha2_ratio * phibeta1_ratio * phibeta2_ratio).norm()
    }
}

impl<const D: usize> Walk for RenyiSignWalk<D> {
    fn compute_probability_ratio_of_random_transition(&mut self, rng: &mut StdRng) -> f64 {
        self.base
            .compute_probability_ratio(rng, Self::probability_ratio)
    }

    fn accept_transition(&mut self) {
        self.base.accept();
    }

    fn reject_transition(&mut self) {
        self.base.reject();
    }
}

fn ratio(new: BigComplex, old: BigComplex) -> Complex64 {
    (new / old).get_value()
}
