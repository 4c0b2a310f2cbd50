//! Quasi-static load stepping for nonlinear stationary problems.
//!
//! The load factor `λ` runs from 0 to 1. A load step whose Newton solve diverges
//! is retried from the last accepted state with half the increment, at most
//! `max_retries` times. After an accepted step the increment may be rescaled
//! towards the desired number of Newton iterations; it is always clamped so that
//! the last step ends exactly at `λ = 1`.

use log::{info, warn};

use crate::config::LoadStepData;
use crate::core::traits::DofVector;
use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::pde::NonlinearOperator;
use crate::postprocessor::PostProcessor;
use crate::solver::newton::{NewtonOutcome, NewtonStats};
use crate::time_integration::IterationStats;

/// Load factors closer than this to 1 count as the full load.
const LOAD_FACTOR_TOLERANCE: f64 = 1e-10;

/// Operator solved by [`DriverQuasiStatic`].
pub trait LoadSteppingOperator {
    type Vector: DofVector;

    fn initialize_dof_vector(&self) -> Self::Vector;

    fn prescribe_initial_conditions(&self, x: &mut Self::Vector);

    /// Newton solve at `load_factor` starting from `x`.
    fn solve_nonlinear(
        &mut self,
        x: &mut Self::Vector,
        load_factor: f64,
        update_preconditioner: bool,
    ) -> Result<NewtonOutcome, DgError>;
}

impl LoadSteppingOperator for NonlinearOperator {
    type Vector = DistributedVector;

    fn initialize_dof_vector(&self) -> DistributedVector {
        NonlinearOperator::initialize_dof_vector(self)
    }

    fn prescribe_initial_conditions(&self, x: &mut DistributedVector) {
        NonlinearOperator::prescribe_initial_conditions(self, x)
    }

    fn solve_nonlinear(
        &mut self,
        x: &mut DistributedVector,
        load_factor: f64,
        update_preconditioner: bool,
    ) -> Result<NewtonOutcome, DgError> {
        NonlinearOperator::solve_nonlinear(self, x, load_factor, update_preconditioner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStepState {
    Initialized,
    LoadStepping,
    Finished,
}

pub struct DriverQuasiStatic<O: LoadSteppingOperator> {
    operator: O,
    data: LoadStepData,
    postprocessor: Box<dyn PostProcessor<O::Vector>>,
    solution: O::Vector,
    load_factor: f64,
    load_increment: f64,
    /// Number of the next load step, starting at 1.
    step_number: usize,
    state: LoadStepState,
    accepted: Vec<f64>,
    stats: IterationStats,
}

impl<O: LoadSteppingOperator> DriverQuasiStatic<O> {
    pub fn new(operator: O, data: LoadStepData, postprocessor: Box<dyn PostProcessor<O::Vector>>) -> Result<Self, DgError> {
        if !(data.load_increment > 0.0) {
            return Err(DgError::Config("load increment must be positive".to_string()));
        }
        if data.adjust_load_increment && data.desired_newton_iterations == 0 {
            return Err(DgError::Config("desired number of Newton iterations must be positive".to_string()));
        }
        let mut solution = operator.initialize_dof_vector();
        operator.prescribe_initial_conditions(&mut solution);
        Ok(DriverQuasiStatic {
            load_increment: data.load_increment,
            operator,
            data,
            postprocessor,
            solution,
            load_factor: 0.0,
            step_number: 1,
            state: LoadStepState::Initialized,
            accepted: Vec::new(),
            stats: IterationStats::default(),
        })
    }

    pub fn state(&self) -> LoadStepState {
        self.state
    }

    pub fn solution(&self) -> &O::Vector {
        &self.solution
    }

    pub fn operator(&self) -> &O {
        &self.operator
    }

    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Load factors of the accepted steps.
    pub fn load_factors(&self) -> &[f64] {
        &self.accepted
    }

    pub fn iterations(&self) -> &IterationStats {
        &self.stats
    }

    fn target(&self) -> f64 {
        let target = (self.load_factor + self.load_increment).min(1.0);
        if 1.0 - target < LOAD_FACTOR_TOLERANCE { 1.0 } else { target }
    }

    /// Solves one load step, halving the increment on divergence.
    fn solve_step(&mut self) -> Result<NewtonStats, DgError> {
        let update_preconditioner = self.data.update_preconditioner
            && (self.step_number - 1) % self.data.update_preconditioner_every_load_steps.max(1) == 0;
        let backup = self.solution.clone();
        let mut retries = 0;
        loop {
            let target = self.target();
            info!("load step {}: load factor {:.4e}", self.step_number, target);
            let outcome =
                self.operator.solve_nonlinear(&mut self.solution, target, update_preconditioner || retries > 0)?;
            match outcome {
                NewtonOutcome::Converged(stats) => return Ok(stats),
                NewtonOutcome::Diverged(stats) => {
                    self.solution.copy_from(&backup);
                    if retries == self.data.max_retries {
                        return Err(DgError::LoadStepFailed { load_factor: target, retries });
                    }
                    retries += 1;
                    self.load_increment *= 0.5;
                    warn!(
                        "Newton diverged at load factor {:.4e} (residual {:e}); reducing load factor to {:.4e}",
                        target,
                        stats.residual,
                        self.target()
                    );
                }
            }
        }
    }

    /// Runs all load steps up to `λ = 1`.
    pub fn solve(&mut self) -> Result<(), DgError> {
        if self.state == LoadStepState::Finished {
            return Ok(());
        }
        if self.state == LoadStepState::Initialized {
            self.postprocessor.do_postprocessing(&self.solution, self.load_factor, 0)?;
            self.state = LoadStepState::LoadStepping;
        }
        while self.load_factor < 1.0 - LOAD_FACTOR_TOLERANCE {
            let stats = self.solve_step()?;
            self.load_factor = self.target();
            self.accepted.push(self.load_factor);
            self.stats.push_nonlinear(stats.newton_iterations, stats.linear_iterations);
            self.postprocessor.do_postprocessing(&self.solution, self.load_factor, self.step_number)?;
            self.step_number += 1;

            if self.data.adjust_load_increment && stats.newton_iterations > 0 {
                let ratio = self.data.desired_newton_iterations as f64 / stats.newton_iterations as f64;
                self.load_increment *= ratio.sqrt();
            }
            if self.load_factor + self.load_increment >= 1.0 {
                self.load_increment = 1.0 - self.load_factor;
            }
        }
        self.load_factor = 1.0;
        self.state = LoadStepState::Finished;
        self.stats.log_summary("quasi-static solve");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Diverges whenever the requested load step is longer than `max_step`.
    struct Fake {
        current: f64,
        max_step: f64,
        newton_iterations: usize,
        requested: Vec<f64>,
    }

    impl LoadSteppingOperator for Fake {
        type Vector = Vec<f64>;

        fn initialize_dof_vector(&self) -> Vec<f64> {
            vec![0.0]
        }

        fn prescribe_initial_conditions(&self, x: &mut Vec<f64>) {
            x[0] = 0.0;
        }

        fn solve_nonlinear(&mut self, x: &mut Vec<f64>, load_factor: f64, _update: bool) -> Result<NewtonOutcome, DgError> {
            self.requested.push(load_factor);
            let stats = NewtonStats { newton_iterations: self.newton_iterations, linear_iterations: 4, residual: 1.0 };
            if load_factor - self.current > self.max_step + 1e-12 {
                x[0] = f64::NAN;
                return Ok(NewtonOutcome::Diverged(stats));
            }
            self.current = load_factor;
            x[0] = load_factor;
            Ok(NewtonOutcome::Converged(NewtonStats { residual: 0.0, ..stats }))
        }
    }

    fn fake(max_step: f64) -> Fake {
        Fake { current: 0.0, max_step, newton_iterations: 5, requested: Vec::new() }
    }

    #[test]
    fn diverging_steps_are_halved_and_end_exactly_at_full_load() {
        let data = LoadStepData {
            load_increment: 1.0,
            adjust_load_increment: true,
            desired_newton_iterations: 5,
            ..LoadStepData::default()
        };
        let mut driver = DriverQuasiStatic::new(fake(0.25), data, Box::new(())).unwrap();
        driver.solve().unwrap();
        assert_eq!(driver.operator().requested, vec![1.0, 0.5, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(driver.load_factors(), &[0.25, 0.5, 0.75, 1.0]);
        assert_eq!(driver.load_factor(), 1.0);
        assert_eq!(driver.solution()[0], 1.0);
        assert_eq!(driver.state(), LoadStepState::Finished);
        assert_eq!(driver.iterations().n_calls, 4);
    }

    #[test]
    fn increment_adapts_to_newton_iterations() {
        let data = LoadStepData {
            load_increment: 0.1,
            adjust_load_increment: true,
            desired_newton_iterations: 20,
            ..LoadStepData::default()
        };
        let mut driver = DriverQuasiStatic::new(fake(1.0), data, Box::new(())).unwrap();
        driver.solve().unwrap();
        // 5 Newton iterations double the increment: 0.1, 0.3, 0.7, then clamped to 1
        let factors = driver.load_factors();
        assert_eq!(factors.len(), 4);
        assert!((factors[0] - 0.1).abs() < 1e-14);
        assert!((factors[1] - 0.3).abs() < 1e-14);
        assert!((factors[2] - 0.7).abs() < 1e-14);
        assert_eq!(factors[3], 1.0);
    }

    #[test]
    fn exhausted_retries_restore_the_state() {
        let data = LoadStepData { load_increment: 0.5, max_retries: 3, ..LoadStepData::default() };
        let mut driver = DriverQuasiStatic::new(fake(0.01), data, Box::new(())).unwrap();
        let err = driver.solve().unwrap_err();
        assert!(matches!(err, DgError::LoadStepFailed { retries: 3, .. }));
        assert_eq!(driver.operator().requested.len(), 4);
        assert_eq!(driver.solution()[0], 0.0);
        assert_eq!(driver.load_factor(), 0.0);
    }
}
