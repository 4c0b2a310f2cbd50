//! Time and load stepping.
//!
//! - [`explicit_rk`]: explicit Runge–Kutta integrators.
//! - [`bdf`]: implicit BDF integrators with variable step size.
//! - [`driver`]: unsteady driver calling the integrator, mesh motion and
//!   postprocessor in a fixed order each step.
//! - [`steady`]: one linear solve.
//! - [`quasi_static`]: load stepping for nonlinear stationary problems.
//! - [`time_step`]: step size selection.
//! - [`statistics`]: averaged solver iteration counts.

pub mod bdf;
pub mod driver;
pub mod explicit_rk;
pub mod quasi_static;
pub mod statistics;
pub mod steady;
pub mod time_step;

pub use bdf::{BdfCoefficients, TimeIntBdf};
pub use driver::{Driver, DriverState, MeshMotion, PrescribedMeshMotion};
pub use explicit_rk::{ExplicitRungeKutta, ExplicitTimeOperator, TimeIntExplRk};
pub use quasi_static::{DriverQuasiStatic, LoadStepState, LoadSteppingOperator};
pub use statistics::IterationStats;
pub use steady::DriverSteady;
pub use time_step::TimeStepCalculation;

use std::sync::Arc;

use crate::config::{Parameters, TemporalDiscretization};
use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::grid::LineGrid;
use crate::pde::ConvectionDiffusionOperator;

/// Relative tolerance of the end time check.
const END_TIME_TOLERANCE: f64 = 1e-10;

/// Simulated time, step size and step counter of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeClock {
    pub start_time: f64,
    pub end_time: f64,
    pub time: f64,
    pub dt: f64,
    /// Number of the next step, starting at 1.
    pub step_number: usize,
    pub max_number_of_time_steps: usize,
    pub adaptive: bool,
    pub limiting_factor: f64,
    pub time_step_size_max: f64,
}

impl TimeClock {
    pub fn new(param: &Parameters) -> Self {
        let temporal = &param.temporal;
        TimeClock {
            start_time: param.physical_quantities.start_time,
            end_time: param.physical_quantities.end_time,
            time: param.physical_quantities.start_time,
            dt: temporal.time_step_size,
            step_number: 1,
            max_number_of_time_steps: temporal.max_number_of_time_steps,
            adaptive: temporal.adaptive_time_stepping,
            limiting_factor: temporal.adaptive_time_stepping_limiting_factor,
            time_step_size_max: temporal.time_step_size_max,
        }
    }

    pub fn next_time(&self) -> f64 {
        self.time + self.dt
    }

    pub fn number_of_time_steps(&self) -> usize {
        self.step_number - 1
    }

    pub fn finished(&self) -> bool {
        let tol = END_TIME_TOLERANCE * self.end_time.abs().max(1.0);
        self.time >= self.end_time - tol || self.step_number > self.max_number_of_time_steps
    }

    pub fn set_time_step_size(&mut self, dt: f64) {
        self.dt = time_step::clamp_to_end_time(self.time, dt.min(self.time_step_size_max), self.end_time);
    }

    /// Applies an adaptive CFL estimate for the next step.
    pub fn adapt_time_step_size(&mut self, estimate: f64) {
        let dt = time_step::adjust_time_step_size_adaptive(self.dt, estimate, self.limiting_factor, self.time_step_size_max);
        self.set_time_step_size(dt);
    }

    /// Moves to the end of the current step and keeps the next step inside
    /// `[time, end_time]`.
    pub fn advance(&mut self) {
        self.time += self.dt;
        self.step_number += 1;
        self.dt = time_step::clamp_to_end_time(self.time, self.dt, self.end_time);
    }
}

/// One unsteady scheme over a convection–diffusion operator.
pub trait TimeIntegrator {
    /// Prescribes the initial state and the first step size.
    fn setup(&mut self) -> Result<(), DgError>;

    fn clock(&self) -> &TimeClock;

    fn pde(&self) -> &ConvectionDiffusionOperator;

    fn solution(&self) -> &DistributedVector;

    fn advance_one_timestep_pre_solve(&mut self) -> Result<(), DgError>;

    fn advance_one_timestep_solve(&mut self) -> Result<(), DgError>;

    fn advance_one_timestep_post_solve(&mut self) -> Result<(), DgError>;

    /// Moves the operators onto `grid`, the mesh at the end of the current step.
    fn ale_update(&mut self, grid: Arc<LineGrid>) -> Result<(), DgError>;

    fn iterations(&self) -> Option<&IterationStats> {
        None
    }

    fn time(&self) -> f64 {
        self.clock().time
    }

    fn finished(&self) -> bool {
        self.clock().finished()
    }
}

/// Integrator configured by the parameters of `pde`.
pub fn create_time_integrator(pde: ConvectionDiffusionOperator) -> Result<Box<dyn TimeIntegrator>, DgError> {
    Ok(match pde.parameters().temporal.temporal_discretization {
        TemporalDiscretization::ExplRK => Box::new(TimeIntExplRk::new(pde)?),
        TemporalDiscretization::BDF => Box::new(TimeIntBdf::new(pde)?),
    })
}
