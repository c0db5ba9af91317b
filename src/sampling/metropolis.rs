//! The Metropolis-Hastings driver.
//!
//! Composes a walk (a transition proposer with accept/reject commitment)
//! with a list of measurements, enforcing the step/measurement ordering
//! across accepted, rejected, and repeated outcomes.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::Rng;

use crate::errors::InvalidProbability;
use crate::measurement::Measurement;

/// A Markov-chain transition proposer.
///
/// `compute_probability_ratio_of_random_transition` must be followed by
/// exactly one of `accept_transition` or `reject_transition` before the
/// next call.
pub trait Walk {
    fn compute_probability_ratio_of_random_transition(&mut self, rng: &mut StdRng) -> f64;
    fn accept_transition(&mut self);
    fn reject_transition(&mut self);
}

/// Metropolis simulation over one walk.
pub struct MetropolisSimulation<W: Walk> {
    walk: W,
    measurements: Vec<Rc<RefCell<dyn Measurement<W>>>>,
    rng: StdRng,
    steps: usize,
    steps_accepted: usize,
    steps_fully_rejected: usize,
    measurement_not_yet_updated: bool,
}

impl<W: Walk> MetropolisSimulation<W> {
    /// Equilibrate with `initialization_sweeps` unmeasured steps, then
    /// initialize each measurement against the current walk state.
    pub fn new(
        walk: W,
        measurements: Vec<Rc<RefCell<dyn Measurement<W>>>>,
        initialization_sweeps: usize,
        rng: StdRng,
    ) -> Result<Self, InvalidProbability> {
        let mut sim = MetropolisSimulation {
            walk,
            measurements,
            rng,
            steps: 0,
            steps_accepted: 0,
            steps_fully_rejected: 0,
            measurement_not_yet_updated: true,
        };
        for _ in 0..initialization_sweeps {
            sim.perform_single_step()?;
        }
        for m in &sim.measurements {
            m.borrow_mut().initialize(&sim.walk);
        }
        Ok(sim)
    }

    /// Perform `sweeps` Metropolis steps, routing each outcome to the
    /// measurements.
    pub fn iterate(&mut self, sweeps: usize) -> Result<(), InvalidProbability> {
        for _ in 0..sweeps {
            let accepted = self.perform_single_step()?;

            if accepted || self.measurement_not_yet_updated {
                for m in &self.measurements {
                    m.borrow_mut().step_advanced(&self.walk);
                }
                self.measurement_not_yet_updated = false;
            } else {
                for m in &self.measurements {
                    m.borrow_mut().step_repeated(&self.walk);
                }
            }
        }
        Ok(())
    }

    fn perform_single_step(&mut self) -> Result<bool, InvalidProbability> {
        let probability_ratio = self
            .walk
            .compute_probability_ratio_of_random_transition(&mut self.rng);

        // phrasing the condition this way also catches NaN
        if !(probability_ratio >= 0.0) {
            // restore a consistent state before reporting the error
            self.walk.reject_transition();
            return Err(InvalidProbability(probability_ratio));
        }

        self.steps += 1;

        if probability_ratio >= 1.0
            || (probability_ratio > 0.0 && probability_ratio > self.rng.gen::<f64>())
        {
            self.walk.accept_transition();
            self.steps_accepted += 1;
            Ok(true)
        } else {
            self.walk.reject_transition();
            if probability_ratio == 0.0 {
                self.steps_fully_rejected += 1;
            }
            Ok(false)
        }
    }

    pub fn walk(&self) -> &W {
        &self.walk
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn steps_accepted(&self) -> usize {
        self.steps_accepted
    }

    pub fn steps_fully_rejected(&self) -> usize {
        self.steps_fully_rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    /// Two-state toy walk with a fixed down-hill ratio, for checking the
    /// acceptance rule.
    struct ToyWalk {
        ratio: f64,
        state: bool,
        accepted: usize,
        in_progress: bool,
    }

    impl ToyWalk {
        fn new(ratio: f64) -> Self {
            ToyWalk {
                ratio,
                state: false,
                accepted: 0,
                in_progress: false,
            }
        }
    }

    impl Walk for ToyWalk {
        fn compute_probability_ratio_of_random_transition(&mut self, _rng: &mut StdRng) -> f64 {
            assert!(!self.in_progress);
            self.in_progress = true;
            // moving "up" always has the small ratio; moving back is free
            if self.state {
                1.0 / self.ratio
            } else {
                self.ratio
            }
        }

        fn accept_transition(&mut self) {
            assert!(self.in_progress);
            self.in_progress = false;
            self.state = !self.state;
            self.accepted += 1;
        }

        fn reject_transition(&mut self) {
            assert!(self.in_progress);
            self.in_progress = false;
        }
    }

    struct CountingMeasurement {
        initialized: bool,
        advanced: usize,
        repeated: usize,
    }

    impl Measurement<ToyWalk> for CountingMeasurement {
        fn initialize(&mut self, _walk: &ToyWalk) {
            self.initialized = true;
        }
        fn step_advanced(&mut self, _walk: &ToyWalk) {
            self.advanced += 1;
        }
        fn step_repeated(&mut self, _walk: &ToyWalk) {
            self.repeated += 1;
        }
    }

    #[test]
    fn test_acceptance_rate_matches_ratio() {
        // from the low-weight state the walk accepts with probability 1;
        // from the high-weight state with probability p.  Over many steps
        // the observed p-acceptances converge to p within 3/sqrt(N).
        let p = 0.3;
        let n = 1_000_000usize;
        let rng = StdRng::seed_from_u64(1234);
        let mut sim = MetropolisSimulation::new(ToyWalk::new(p), vec![], 0, rng).unwrap();

        let mut uphill_steps = 0usize;
        let mut uphill_accepts = 0usize;
        for _ in 0..n {
            let before = sim.walk().state;
            sim.iterate(1).unwrap();
            let after = sim.walk().state;
            if !before {
                uphill_steps += 1;
                if after {
                    uphill_accepts += 1;
                }
            }
        }
        let observed = uphill_accepts as f64 / uphill_steps as f64;
        let tolerance = 3.0 / (uphill_steps as f64).sqrt();
        assert!(
            (observed - p).abs() < tolerance,
            "observed {} expected {} +- {}",
            observed,
            p,
            tolerance
        );
        assert_eq!(sim.steps(), n);
    }

    #[test]
    fn test_measurement_routing() {
        let rng = StdRng::seed_from_u64(7);
        let m = Rc::new(RefCell::new(CountingMeasurement {
            initialized: false,
            advanced: 0,
            repeated: 0,
        }));
        let handle: Rc<RefCell<dyn Measurement<ToyWalk>>> = m.clone();
        let mut sim = MetropolisSimulation::new(ToyWalk::new(0.2), vec![handle], 3, rng).unwrap();
        assert!(m.borrow().initialized);
        assert_eq!(sim.steps(), 3);

        sim.iterate(100).unwrap();
        let measurement = m.borrow();
        // every sweep routes to exactly one of the two callbacks
        assert_eq!(measurement.advanced + measurement.repeated, 100);
        // the first measured sweep always advances
        assert!(measurement.advanced >= 1);
    }

    struct NanWalk {
        rejected: bool,
    }

    impl Walk for NanWalk {
        fn compute_probability_ratio_of_random_transition(&mut self, _rng: &mut StdRng) -> f64 {
            f64::NAN
        }
        fn accept_transition(&mut self) {
            panic!("must not accept");
        }
        fn reject_transition(&mut self) {
            self.rejected = true;
        }
    }

    #[test]
    fn test_nan_ratio_is_fatal_after_reject() {
        let rng = StdRng::seed_from_u64(0);
        let result = MetropolisSimulation::new(NanWalk { rejected: false }, vec![], 1, rng);
        match result {
            Err(InvalidProbability(p)) => assert!(p.is_nan()),
            Ok(_) => panic!("expected invalid probability"),
        }
    }

    #[test]
    fn test_fully_rejected_counter() {
        struct ZeroWalk;
        impl Walk for ZeroWalk {
            fn compute_probability_ratio_of_random_transition(
                &mut self,
                _rng: &mut StdRng,
            ) -> f64 {
                0.0
            }
            fn accept_transition(&mut self) {
                panic!("must not accept");
            }
            fn reject_transition(&mut self) {}
        }

        let rng = StdRng::seed_from_u64(0);
        let mut sim = MetropolisSimulation::new(ZeroWalk, vec![], 0, rng).unwrap();
        sim.iterate(10).unwrap();
        assert_eq!(sim.steps_fully_rejected(), 10);
        assert_eq!(sim.steps_accepted(), 0);
    }
}
