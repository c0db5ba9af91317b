//! The plain |psi|^2 walk: one particle hops to a nearby empty site.

use std::rc::Rc;

use rand::rngs::StdRng;

use super::metropolis::Walk;
use super::random::choose_random_particle;
use crate::lattice::Lattice;
use crate::wavefunction::{make_mut, Amplitude, SingleParticleMove};

/// Samples configurations with weight |psi(R)|^2.
///
/// The amplitude handle is shared copy-on-write: the walk clones it on
/// first mutation if anyone else still holds a reference.
pub struct StandardWalk<const D: usize> {
    wf: Rc<Amplitude<D>>,
    transition_in_progress: bool,
    // set when the proposer went nowhere, in which case the amplitude was
    // never touched and reject must not cancel
    autoreject: bool,
}

impl<const D: usize> StandardWalk<D> {
    pub fn new(wf: Rc<Amplitude<D>>) -> Self {
        StandardWalk {
            wf,
            transition_in_progress: false,
            autoreject: false,
        }
    }

    pub fn wavefunction(&self) -> &Amplitude<D> {
        &self.wf
    }
}

impl<const D: usize> Walk for StandardWalk<D> {
    fn compute_probability_ratio_of_random_transition(&mut self, rng: &mut StdRng) -> f64 {
        assert!(!self.transition_in_progress);
        self.transition_in_progress = true;

        let particle = choose_random_particle(self.wf.positions(), rng);
        let proposed_site = self
            .wf
            .lattice()
            .plan_particle_move_to_nearby_empty_site(particle, self.wf.positions(), rng);

        if proposed_site == self.wf.positions().position(particle) {
            self.autoreject = true;
            return 0.0;
        }

        let psi_old = self.wf.psi();
        let mv = vec![SingleParticleMove::new(particle, proposed_site)];
        make_mut(&mut self.wf)
            .perform_move(&mv)
            .expect("proposed site is empty");
        let psi_new = self.wf.psi();

        let ratio = (psi_new / psi_old).norm();
        ratio * ratio
    }

    fn accept_transition(&mut self) {
        assert!(self.transition_in_progress);
        debug_assert!(!self.autoreject);
        make_mut(&mut self.wf).finish_move();
        self.transition_in_progress = false;
    }

    fn reject_transition(&mut self) {
        assert!(self.transition_in_progress);
        if !self.autoreject {
            make_mut(&mut self.wf).cancel_move();
        }
        self.autoreject = false;
        self.transition_in_progress = false;
    }
}
