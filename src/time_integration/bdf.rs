//! BDF time integration of order 1 to 3 with variable step sizes.
//!
//! Step `n → n+1` solves
//!
//! ```text
//! (γ₀/Δt) M u⁽ⁿ⁺¹⁾ + A(t⁽ⁿ⁺¹⁾) u⁽ⁿ⁺¹⁾ = Σᵢ (αᵢ/Δt) M⁽ⁿ⁻ⁱ⁾ u⁽ⁿ⁻ⁱ⁾ - Σᵢ βᵢ C(u⁽ⁿ⁻ⁱ⁾) + b(t⁽ⁿ⁺¹⁾)
//! ```
//!
//! where the convective sum only appears for an explicitly treated convective term
//! and `M⁽ⁿ⁻ⁱ⁾ u⁽ⁿ⁻ⁱ⁾` is kept from the mesh of that time, so moving meshes need no
//! special treatment of the history.

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, info};

use crate::config::{TreatmentOfConvectiveTerm, TypeVelocityField};
use crate::core::traits::DofVector;
use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::grid::LineGrid;
use crate::pde::ConvectionDiffusionOperator;
use crate::time_integration::{IterationStats, TimeClock, TimeIntegrator};

/// Coefficients of one BDF step.
///
/// `du/dt(tⁿ⁺¹) ≈ (γ₀ uⁿ⁺¹ - Σ αᵢ uⁿ⁻ⁱ) / Δtⁿ` and `uⁿ⁺¹ ≈ Σ βᵢ uⁿ⁻ⁱ`.
#[derive(Debug, Clone, PartialEq)]
pub struct BdfCoefficients {
    pub gamma0: f64,
    pub alpha: Vec<f64>,
    pub beta: Vec<f64>,
}

impl BdfCoefficients {
    /// Coefficients for the step sizes `dts = [Δtⁿ, Δtⁿ⁻¹, ...]`, newest first; the
    /// order is `dts.len()`.
    pub fn new(dts: &[f64]) -> Result<Self, DgError> {
        let order = dts.len();
        if !(1..=3).contains(&order) || dts.iter().any(|dt| !(*dt > 0.0)) {
            return Err(DgError::Config(format!("no BDF coefficients for step sizes {dts:?}")));
        }
        // nodes relative to tⁿ⁺¹: 0, -Δtⁿ, -Δtⁿ - Δtⁿ⁻¹, ...
        let mut tau = vec![0.0; order + 1];
        for k in 1..=order {
            tau[k] = tau[k - 1] - dts[k - 1];
        }
        let dt = dts[0];

        let gamma0 = dt * (1..=order).map(|k| -1.0 / tau[k]).sum::<f64>();
        let alpha = (1..=order)
            .map(|j| {
                let num: f64 = (1..=order).filter(|&k| k != j).map(|k| -tau[k]).product();
                let den: f64 = (0..=order).filter(|&k| k != j).map(|k| tau[j] - tau[k]).product();
                -dt * num / den
            })
            .collect();
        let beta = (1..=order)
            .map(|i| {
                (1..=order)
                    .filter(|&k| k != i)
                    .map(|k| -tau[k] / (tau[i] - tau[k]))
                    .product()
            })
            .collect();
        Ok(BdfCoefficients { gamma0, alpha, beta })
    }

    pub fn order(&self) -> usize {
        self.alpha.len()
    }
}

pub struct TimeIntBdf {
    pde: ConvectionDiffusionOperator,
    clock: TimeClock,
    order: usize,
    start_with_low_order: bool,
    explicit_convection: bool,
    /// `uⁿ, uⁿ⁻¹, ...`
    solutions: VecDeque<DistributedVector>,
    /// `Mⁿ uⁿ, ...` on the mesh of the respective time
    mass_solutions: VecDeque<DistributedVector>,
    /// `C(uⁿ), ...` for an explicitly treated convective term
    convective_terms: VecDeque<DistributedVector>,
    /// `tⁿ - tⁿ⁻¹, ...`
    previous_dts: VecDeque<f64>,
    coefficients: Option<BdfCoefficients>,
    solution_np: DistributedVector,
    rhs: DistributedVector,
    velocity: Option<DistributedVector>,
    stats: IterationStats,
}

impl TimeIntBdf {
    pub fn new(pde: ConvectionDiffusionOperator) -> Result<Self, DgError> {
        let param = pde.parameters();
        let order = param.temporal.order_time_integrator;
        if !(1..=3).contains(&order) {
            return Err(DgError::Config(format!("BDF of order {order} not available")));
        }
        let equation = param.math_model.equation_type;
        let explicit_convection = equation.has_convection()
            && param.temporal.treatment_of_convective_term == TreatmentOfConvectiveTerm::Explicit;
        let velocity = (equation.has_convection() && param.spatial.type_velocity_field == TypeVelocityField::DoFVector)
            .then(|| pde.initialize_dof_vector_velocity());
        Ok(TimeIntBdf {
            clock: TimeClock::new(param),
            order,
            start_with_low_order: param.temporal.start_with_low_order,
            explicit_convection,
            solutions: VecDeque::with_capacity(order),
            mass_solutions: VecDeque::with_capacity(order),
            convective_terms: VecDeque::with_capacity(order),
            previous_dts: VecDeque::with_capacity(order),
            coefficients: None,
            solution_np: pde.initialize_dof_vector(),
            rhs: pde.initialize_dof_vector(),
            velocity,
            stats: IterationStats::default(),
            pde,
        })
    }

    /// Order used in the current step.
    pub fn current_order(&self) -> usize {
        if self.start_with_low_order { self.order.min(self.clock.step_number) } else { self.order }
    }

    /// `γ₀ / Δt` of the current step, the mass scaling of the linear system.
    pub fn get_scaling_factor_time_derivative_term(&self) -> Result<f64, DgError> {
        Ok(self.current_coefficients()?.gamma0 / self.clock.dt)
    }

    fn current_coefficients(&self) -> Result<BdfCoefficients, DgError> {
        let order = self.current_order().min(self.previous_dts.len() + 1);
        let dts: Vec<f64> = std::iter::once(self.clock.dt).chain(self.previous_dts.iter().copied()).take(order).collect();
        BdfCoefficients::new(&dts)
    }

    fn velocity_at(&mut self, time: f64) -> Option<&DistributedVector> {
        if let Some(v) = self.velocity.as_mut() {
            self.pde.interpolate_velocity(v, time);
        }
        self.velocity.as_ref()
    }

    /// `M u` and, for explicit convection, `C(u)` of a new history entry.
    fn push_history(&mut self, u: DistributedVector, time: f64, dt: Option<f64>) -> Result<(), DgError> {
        let mut mass_u = self.pde.initialize_dof_vector();
        self.pde.apply_mass_operator(&mut mass_u, &u)?;
        if self.explicit_convection {
            let mut conv = self.pde.initialize_dof_vector();
            let velocity = self.velocity_at(time).cloned();
            self.pde.evaluate_convective_term(&mut conv, &u, time, velocity.as_ref())?;
            self.convective_terms.push_front(conv);
            self.convective_terms.truncate(self.order);
        }
        self.solutions.push_front(u);
        self.mass_solutions.push_front(mass_u);
        self.solutions.truncate(self.order);
        self.mass_solutions.truncate(self.order);
        if let Some(dt) = dt {
            self.previous_dts.push_front(dt);
            self.previous_dts.truncate(self.order - 1);
        }
        Ok(())
    }

    fn update_preconditioner(&self) -> bool {
        let solver = &self.pde.parameters().solver;
        solver.update_preconditioner
            && (self.clock.step_number - 1) % solver.update_preconditioner_every_time_steps.max(1) == 0
    }
}

impl TimeIntegrator for TimeIntBdf {
    fn setup(&mut self) -> Result<(), DgError> {
        let start = self.clock.start_time;
        self.velocity_at(start);
        let dt = self.pde.initial_time_step_size(self.velocity.as_ref())?;
        self.clock.set_time_step_size(dt);

        // former solutions from the initial condition, oldest first
        let former = if self.start_with_low_order { 0 } else { self.order - 1 };
        for i in (0..=former).rev() {
            let time = start - i as f64 * dt;
            let mut u = self.pde.initialize_dof_vector();
            self.pde.prescribe_initial_conditions(&mut u, time);
            self.push_history(u, time, (i < former).then_some(dt))?;
        }

        let scaling = self.get_scaling_factor_time_derivative_term()?;
        let velocity = self.velocity_at(start).cloned();
        self.pde.setup_solver(scaling, velocity.as_ref())?;
        info!(
            "BDF order {} ({} convection), time step size {:e}",
            self.order,
            if self.explicit_convection { "explicit" } else { "implicit" },
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
        &self.solutions[0]
    }

    fn advance_one_timestep_pre_solve(&mut self) -> Result<(), DgError> {
        self.coefficients = Some(self.current_coefficients()?);
        Ok(())
    }

    fn advance_one_timestep_solve(&mut self) -> Result<(), DgError> {
        let coefficients = match self.coefficients.take() {
            Some(c) => c,
            None => self.current_coefficients()?,
        };
        let dt = self.clock.dt;
        let next_time = self.clock.next_time();

        self.rhs.fill(0.0);
        for (alpha, mass_u) in coefficients.alpha.iter().zip(&self.mass_solutions) {
            self.rhs.axpy(alpha / dt, mass_u);
        }
        if self.explicit_convection {
            for (beta, conv) in coefficients.beta.iter().zip(&self.convective_terms) {
                self.rhs.axpy(-beta, conv);
            }
        }
        let velocity = self.velocity_at(next_time).cloned();
        let mut boundary_and_source = self.pde.initialize_dof_vector();
        self.pde.rhs(&mut boundary_and_source, next_time, velocity.as_ref())?;
        self.rhs.axpy(1.0, &boundary_and_source);

        self.solution_np.fill(0.0);
        for (beta, u) in coefficients.beta.iter().zip(&self.solutions) {
            self.solution_np.axpy(*beta, u);
        }
        let update = self.update_preconditioner();
        let scaling = coefficients.gamma0 / dt;
        let iterations =
            self.pde.solve(&mut self.solution_np, &self.rhs, update, scaling, next_time, velocity.as_ref())?;
        self.stats.push_linear(iterations);
        debug!("BDF{} step {}: {} linear iterations", coefficients.order(), self.clock.step_number, iterations);
        Ok(())
    }

    fn advance_one_timestep_post_solve(&mut self) -> Result<(), DgError> {
        let dt = self.clock.dt;
        let next_time = self.clock.next_time();
        let u = self.solution_np.clone();
        self.push_history(u, next_time, Some(dt))?;
        self.clock.advance();
        if self.clock.adaptive && !self.clock.finished() {
            let time = self.clock.time;
            let velocity = self.velocity_at(time).cloned();
            let estimate = self.pde.calculate_time_step_cfl_local(time, velocity.as_ref())?;
            self.clock.adapt_time_step_size(estimate);
        }
        Ok(())
    }

    fn ale_update(&mut self, grid: Arc<LineGrid>) -> Result<(), DgError> {
        self.pde.update_after_mesh_movement(grid)
    }

    fn iterations(&self) -> Option<&IterationStats> {
        Some(&self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn constant_step_coefficients() {
        let bdf2 = BdfCoefficients::new(&[0.1, 0.1]).unwrap();
        assert_relative_eq!(bdf2.gamma0, 1.5, epsilon = 1e-12);
        assert_relative_eq!(bdf2.alpha[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(bdf2.alpha[1], -0.5, epsilon = 1e-12);
        assert_relative_eq!(bdf2.beta[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(bdf2.beta[1], -1.0, epsilon = 1e-12);

        let bdf3 = BdfCoefficients::new(&[0.2, 0.2, 0.2]).unwrap();
        assert_relative_eq!(bdf3.gamma0, 11.0 / 6.0, epsilon = 1e-12);
        for (a, e) in bdf3.alpha.iter().zip([3.0, -1.5, 1.0 / 3.0]) {
            assert_relative_eq!(*a, e, epsilon = 1e-12);
        }
        for (b, e) in bdf3.beta.iter().zip([3.0, -3.0, 1.0]) {
            assert_relative_eq!(*b, e, epsilon = 1e-12);
        }
    }

    #[test]
    fn variable_step_coefficients_differentiate_quadratics() {
        let dts = [0.1, 0.25];
        let c = BdfCoefficients::new(&dts).unwrap();
        // u(t) = 1 + 2t + 3t² with tⁿ⁺¹ = 1
        let u = |t: f64| 1.0 + 2.0 * t + 3.0 * t * t;
        let t = [1.0, 0.9, 0.65];
        let derivative = (c.gamma0 * u(t[0]) - c.alpha[0] * u(t[1]) - c.alpha[1] * u(t[2])) / dts[0];
        assert_relative_eq!(derivative, 8.0, epsilon = 1e-10);
        // linear extrapolation from two points is exact for the linear part only
        let v = |t: f64| 4.0 - t;
        assert_relative_eq!(c.beta[0] * v(t[1]) + c.beta[1] * v(t[2]), v(t[0]), epsilon = 1e-12);
    }

    #[test]
    fn invalid_step_sizes_are_rejected() {
        assert!(BdfCoefficients::new(&[]).is_err());
        assert!(BdfCoefficients::new(&[0.1, 0.0]).is_err());
        assert!(BdfCoefficients::new(&[0.1; 4]).is_err());
    }
}
