//! Explicit Runge–Kutta schemes of order 1 to 4.

use std::sync::Arc;

use log::{debug, info};

use crate::core::traits::DofVector;
use crate::core::vector::DistributedVector;
use crate::config::TypeVelocityField;
use crate::error::DgError;
use crate::pde::ConvectionDiffusionOperator;
use crate::time_integration::{TimeClock, TimeIntegrator};

/// Right-hand side `F(u, t)` of `du/dt = F(u, t)`.
pub trait ExplicitTimeOperator<V> {
    fn evaluate(&mut self, dst: &mut V, src: &V, time: f64) -> Result<(), DgError>;
}

/// Butcher tableau of an explicit scheme; `a` is strictly lower triangular, row
/// by row.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplicitRungeKutta {
    order: usize,
    a: Vec<Vec<f64>>,
    b: Vec<f64>,
    c: Vec<f64>,
}

impl ExplicitRungeKutta {
    /// Forward Euler, Heun, the three-stage strong-stability-preserving scheme or
    /// the classical four-stage scheme.
    pub fn new(order: usize) -> Result<Self, DgError> {
        let (a, b, c) = match order {
            1 => (vec![vec![]], vec![1.0], vec![0.0]),
            2 => (vec![vec![], vec![1.0]], vec![0.5, 0.5], vec![0.0, 1.0]),
            3 => (
                vec![vec![], vec![1.0], vec![0.25, 0.25]],
                vec![1.0 / 6.0, 1.0 / 6.0, 2.0 / 3.0],
                vec![0.0, 1.0, 0.5],
            ),
            4 => (
                vec![vec![], vec![0.5], vec![0.0, 0.5], vec![0.0, 0.0, 1.0]],
                vec![1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
                vec![0.0, 0.5, 0.5, 1.0],
            ),
            _ => return Err(DgError::Config(format!("explicit Runge-Kutta of order {order} not available"))),
        };
        Ok(ExplicitRungeKutta { order, a, b, c })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn stages(&self) -> usize {
        self.b.len()
    }

    /// `dst = u(time + dt)` from `src = u(time)`.
    pub fn solve_timestep<V, O>(&self, op: &mut O, dst: &mut V, src: &V, time: f64, dt: f64) -> Result<(), DgError>
    where
        V: DofVector,
        O: ExplicitTimeOperator<V>,
    {
        let mut k: Vec<V> = Vec::with_capacity(self.stages());
        let mut stage = src.zeros_like();
        for (i, row) in self.a.iter().enumerate() {
            stage.copy_from(src);
            for (aij, kj) in row.iter().zip(&k) {
                if *aij != 0.0 {
                    stage.axpy(dt * aij, kj);
                }
            }
            let mut ki = src.zeros_like();
            op.evaluate(&mut ki, &stage, time + self.c[i] * dt)?;
            k.push(ki);
        }
        dst.copy_from(src);
        for (bi, ki) in self.b.iter().zip(&k) {
            dst.axpy(dt * bi, ki);
        }
        Ok(())
    }
}

/// Convection–diffusion right-hand side; a DoF-vector velocity is interpolated at
/// every stage time.
struct StageOperator<'a> {
    pde: &'a ConvectionDiffusionOperator,
    velocity: Option<DistributedVector>,
}

impl ExplicitTimeOperator<DistributedVector> for StageOperator<'_> {
    fn evaluate(&mut self, dst: &mut DistributedVector, src: &DistributedVector, time: f64) -> Result<(), DgError> {
        if let Some(v) = self.velocity.as_mut() {
            self.pde.interpolate_velocity(v, time);
        }
        self.pde.evaluate_explicit_time_int(dst, src, time, self.velocity.as_ref())
    }
}

/// Explicit time integrator over
/// [`ConvectionDiffusionOperator::evaluate_explicit_time_int`].
pub struct TimeIntExplRk {
    pde: ConvectionDiffusionOperator,
    scheme: ExplicitRungeKutta,
    clock: TimeClock,
    solution: DistributedVector,
    solution_np: DistributedVector,
    velocity: Option<DistributedVector>,
}

impl TimeIntExplRk {
    pub fn new(pde: ConvectionDiffusionOperator) -> Result<Self, DgError> {
        let param = pde.parameters();
        let scheme = ExplicitRungeKutta::new(param.temporal.order_time_integrator)?;
        let clock = TimeClock::new(param);
        let velocity = (param.spatial.type_velocity_field == TypeVelocityField::DoFVector
            && param.math_model.equation_type.has_convection())
        .then(|| pde.initialize_dof_vector_velocity());
        Ok(TimeIntExplRk {
            solution: pde.initialize_dof_vector(),
            solution_np: pde.initialize_dof_vector(),
            pde,
            scheme,
            clock,
            velocity,
        })
    }

    pub fn scheme(&self) -> &ExplicitRungeKutta {
        &self.scheme
    }

    fn recalculate_time_step_size(&mut self) -> Result<f64, DgError> {
        if let Some(v) = self.velocity.as_mut() {
            self.pde.interpolate_velocity(v, self.clock.time);
        }
        let estimate = self.pde.calculate_time_step_cfl_local(self.clock.time, self.velocity.as_ref())?;
        Ok(estimate)
    }
}

impl TimeIntegrator for TimeIntExplRk {
    fn setup(&mut self) -> Result<(), DgError> {
        self.pde.prescribe_initial_conditions(&mut self.solution, self.clock.time);
        if let Some(v) = self.velocity.as_mut() {
            self.pde.interpolate_velocity(v, self.clock.time);
        }
        let dt = self.pde.initial_time_step_size(self.velocity.as_ref())?;
        self.clock.set_time_step_size(dt);
        info!(
            "explicit Runge-Kutta order {} ({} stages), time step size {:e}",
            self.scheme.order(),
            self.scheme.stages(),
            self.clock.dt
        );
        Ok(())
    }

    fn clock(&self) -> &TimeClock {
        &self.clock
    }

    fn pde(&self) -> &ConvectionDiffusionOperator {
        &self.pde
    }

    fn solution(&self) -> &DistributedVector {
        &self.solution
    }

    fn advance_one_timestep_pre_solve(&mut self) -> Result<(), DgError> {
        Ok(())
    }

    fn advance_one_timestep_solve(&mut self) -> Result<(), DgError> {
        let mut op = StageOperator { pde: &self.pde, velocity: self.velocity.clone() };
        self.scheme
            .solve_timestep(&mut op, &mut self.solution_np, &self.solution, self.clock.time, self.clock.dt)
    }

    fn advance_one_timestep_post_solve(&mut self) -> Result<(), DgError> {
        std::mem::swap(&mut self.solution, &mut self.solution_np);
        self.clock.advance();
        debug!("t = {:e}, step {}", self.clock.time, self.clock.step_number);
        if self.clock.adaptive && !self.clock.finished() {
            let estimate = self.recalculate_time_step_size()?;
            self.clock.adapt_time_step_size(estimate);
        }
        Ok(())
    }

    fn ale_update(&mut self, _grid: Arc<crate::grid::LineGrid>) -> Result<(), DgError> {
        Err(DgError::NotImplemented("moving meshes with explicit Runge-Kutta"))
    }
}
