//! Run parameters.
//!
//! [`Parameters`] is the frozen configuration handed to the engine once at setup. It
//! deserializes with `serde` (missing fields take their defaults) and is validated
//! eagerly by [`Parameters::check`]; the engine never re-reads it afterwards.

pub mod options;

pub use options::*;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::DgError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MathModel {
    pub problem_type: ProblemType,
    pub equation_type: EquationType,
    /// Moving mesh (arbitrary Lagrangian–Eulerian formulation).
    pub ale: bool,
    /// Include the source term `f`.
    pub right_hand_side: bool,
}

impl Default for MathModel {
    fn default() -> Self {
        MathModel {
            problem_type: ProblemType::Unsteady,
            equation_type: EquationType::ConvectionDiffusion,
            ale: false,
            right_hand_side: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalQuantities {
    pub start_time: f64,
    pub end_time: f64,
    pub diffusivity: f64,
    /// Coefficient `c` of the cubic reaction term.
    pub reaction_coefficient: f64,
}

impl Default for PhysicalQuantities {
    fn default() -> Self {
        PhysicalQuantities { start_time: 0.0, end_time: 1.0, diffusivity: 0.0, reaction_coefficient: 0.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalData {
    pub temporal_discretization: TemporalDiscretization,
    pub treatment_of_convective_term: TreatmentOfConvectiveTerm,
    pub order_time_integrator: usize,
    pub start_with_low_order: bool,
    pub calculation_of_time_step_size: TimeStepCalculation,
    pub time_step_size: f64,
    /// Maximum transport speed used by the global CFL condition.
    pub max_velocity: f64,
    pub cfl: f64,
    pub exponent_fe_degree_convection: f64,
    pub adaptive_time_stepping: bool,
    /// Largest admissible ratio of consecutive adaptive step sizes.
    pub adaptive_time_stepping_limiting_factor: f64,
    pub time_step_size_max: f64,
    pub max_number_of_time_steps: usize,
}

impl Default for TemporalData {
    fn default() -> Self {
        TemporalData {
            temporal_discretization: TemporalDiscretization::BDF,
            treatment_of_convective_term: TreatmentOfConvectiveTerm::Implicit,
            order_time_integrator: 2,
            start_with_low_order: true,
            calculation_of_time_step_size: TimeStepCalculation::UserSpecified,
            time_step_size: 1e-2,
            max_velocity: 1.0,
            cfl: 0.4,
            exponent_fe_degree_convection: 2.0,
            adaptive_time_stepping: false,
            adaptive_time_stepping_limiting_factor: 1.2,
            time_step_size_max: f64::MAX,
            max_number_of_time_steps: usize::MAX,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialData {
    pub degree: usize,
    /// Integrate the convective term with `p + (p + 2) / 2` points.
    pub use_overintegration: bool,
    pub type_velocity_field: TypeVelocityField,
    pub numerical_flux_convective_operator: NumericalFluxConvectiveOperator,
    /// Interior penalty factor of the SIPG diffusive operator.
    pub ip_factor: f64,
    /// Evaluate convection and diffusion in one pass for explicit time stepping.
    pub use_combined_operator: bool,
}

impl Default for SpatialData {
    fn default() -> Self {
        SpatialData {
            degree: 3,
            use_overintegration: false,
            type_velocity_field: TypeVelocityField::Function,
            numerical_flux_convective_operator: NumericalFluxConvectiveOperator::LaxFriedrichsFlux,
            ip_factor: 1.0,
            use_combined_operator: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverData {
    pub solver: Solver,
    pub abs_tol: f64,
    pub rel_tol: f64,
    pub max_iter: usize,
    /// Restart length of GMRES / FGMRES.
    pub max_krylov_size: usize,
    pub preconditioner: Preconditioner,
    pub update_preconditioner: bool,
    pub update_preconditioner_every_time_steps: usize,
    /// Report an exhausted iteration budget as an error instead of returning the
    /// last iterate.
    pub fail_on_non_convergence: bool,
}

impl Default for SolverData {
    fn default() -> Self {
        SolverData {
            solver: Solver::GMRES,
            abs_tol: 1e-20,
            rel_tol: 1e-12,
            max_iter: 1000,
            max_krylov_size: 30,
            preconditioner: Preconditioner::InverseMassMatrix,
            update_preconditioner: false,
            update_preconditioner_every_time_steps: 1,
            fail_on_non_convergence: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultigridData {
    pub kind: MultigridType,
    pub p_sequence: PSequenceType,
    pub operator_type: MultigridOperatorType,
    pub smoother: MultigridSmoother,
    pub smoother_preconditioner: SmootherPreconditioner,
    /// Sweeps of the Jacobi smoother.
    pub smoothing_iterations: usize,
    /// Damping of the Jacobi smoother.
    pub relaxation_factor: f64,
    pub chebyshev_degree: usize,
    /// Ratio of largest to smallest eigenvalue targeted by Chebyshev.
    pub smoothing_range: f64,
    pub eigenvalue_iterations: usize,
    pub coarse_solver: MultigridCoarseGridSolver,
    pub coarse_rel_tol: f64,
    pub coarse_max_iter: usize,
}

impl Default for MultigridData {
    fn default() -> Self {
        MultigridData {
            kind: MultigridType::PMG,
            p_sequence: PSequenceType::Bisect,
            operator_type: MultigridOperatorType::ReactionDiffusion,
            smoother: MultigridSmoother::Chebyshev,
            smoother_preconditioner: SmootherPreconditioner::PointJacobi,
            smoothing_iterations: 5,
            relaxation_factor: 0.7,
            chebyshev_degree: 5,
            smoothing_range: 20.0,
            eigenvalue_iterations: 20,
            coarse_solver: MultigridCoarseGridSolver::CG,
            coarse_rel_tol: 1e-3,
            coarse_max_iter: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonSolverData {
    pub abs_tol: f64,
    pub rel_tol: f64,
    pub max_iter: usize,
    pub update_preconditioner: bool,
    pub update_preconditioner_every_newton_iterations: usize,
}

impl Default for NewtonSolverData {
    fn default() -> Self {
        NewtonSolverData {
            abs_tol: 1e-12,
            rel_tol: 1e-6,
            max_iter: 20,
            update_preconditioner: true,
            update_preconditioner_every_newton_iterations: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadStepData {
    pub load_increment: f64,
    pub adjust_load_increment: bool,
    pub desired_newton_iterations: usize,
    /// Increment halvings allowed within one load step.
    pub max_retries: usize,
    pub update_preconditioner: bool,
    pub update_preconditioner_every_load_steps: usize,
}

impl Default for LoadStepData {
    fn default() -> Self {
        LoadStepData {
            load_increment: 0.1,
            adjust_load_increment: false,
            desired_newton_iterations: 10,
            max_retries: 10,
            update_preconditioner: true,
            update_preconditioner_every_load_steps: 1,
        }
    }
}

/// Complete, frozen configuration of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub math_model: MathModel,
    pub physical_quantities: PhysicalQuantities,
    pub temporal: TemporalData,
    pub spatial: SpatialData,
    pub solver: SolverData,
    pub multigrid: MultigridData,
    pub newton: NewtonSolverData,
    pub load_step: LoadStepData,
}

fn config_error(msg: impl Into<String>) -> DgError {
    DgError::Config(msg.into())
}

impl Parameters {
    /// Is the convective term part of the linear system solved per step?
    pub fn convective_term_in_linear_system(&self) -> bool {
        self.math_model.equation_type.has_convection()
            && (self.math_model.problem_type == ProblemType::Steady
                || (self.temporal.temporal_discretization == TemporalDiscretization::BDF
                    && self.temporal.treatment_of_convective_term == TreatmentOfConvectiveTerm::Implicit))
    }

    /// Does the run solve linear systems at all?
    pub fn has_linear_system(&self) -> bool {
        self.math_model.problem_type == ProblemType::Steady
            || self.temporal.temporal_discretization == TemporalDiscretization::BDF
    }

    /// Validates all cross-field constraints.
    pub fn check(&self) -> Result<(), DgError> {
        let math = &self.math_model;
        let phys = &self.physical_quantities;
        let temp = &self.temporal;
        let spatial = &self.spatial;
        let solver = &self.solver;

        if spatial.degree == 0 {
            return Err(config_error("polynomial degree must be at least 1"));
        }
        if math.equation_type.has_diffusion() {
            if !(phys.diffusivity > 0.0) {
                return Err(config_error("diffusive problems need a positive diffusivity"));
            }
            if !(spatial.ip_factor > 0.0) {
                return Err(config_error("interior penalty factor must be positive"));
            }
        }

        if math.problem_type == ProblemType::Unsteady {
            if !(phys.end_time > phys.start_time) {
                return Err(config_error("end time must lie after start time"));
            }
            let order = temp.order_time_integrator;
            match temp.temporal_discretization {
                TemporalDiscretization::ExplRK if !(1..=4).contains(&order) => {
                    return Err(config_error(format!("explicit Runge-Kutta of order {order} not available")));
                }
                TemporalDiscretization::BDF if !(1..=3).contains(&order) => {
                    return Err(config_error(format!("BDF of order {order} not available")));
                }
                _ => {}
            }
            match temp.calculation_of_time_step_size {
                TimeStepCalculation::UserSpecified => {
                    if !(temp.time_step_size > 0.0) {
                        return Err(config_error("time step size must be positive"));
                    }
                }
                TimeStepCalculation::CFL => {
                    if !math.equation_type.has_convection() {
                        return Err(config_error("CFL time step selection requires a convective term"));
                    }
                    if !(temp.cfl > 0.0) {
                        return Err(config_error("CFL number must be positive"));
                    }
                }
            }
            if temp.adaptive_time_stepping {
                if temp.calculation_of_time_step_size != TimeStepCalculation::CFL {
                    return Err(config_error("adaptive time stepping requires CFL time step selection"));
                }
                if temp.adaptive_time_stepping_limiting_factor < 1.0 {
                    return Err(config_error("adaptive time stepping limiting factor must be at least 1"));
                }
            }
            if temp.temporal_discretization == TemporalDiscretization::ExplRK && math.ale {
                return Err(config_error("moving meshes are only supported with BDF time integration"));
            }
        } else if math.ale {
            return Err(config_error("moving meshes require an unsteady problem"));
        }

        if self.has_linear_system() {
            if solver.max_iter == 0 {
                return Err(config_error("linear solver needs at least one iteration"));
            }
            if solver.solver != Solver::CG && solver.max_krylov_size == 0 {
                return Err(config_error("Krylov subspace size must be positive"));
            }
            if solver.update_preconditioner_every_time_steps == 0 {
                return Err(config_error("preconditioner update interval must be positive"));
            }
            if solver.solver == Solver::CG && self.convective_term_in_linear_system() {
                warn!("CG selected for a nonsymmetric convection-diffusion system");
            }
            if solver.preconditioner == Preconditioner::Multigrid {
                self.check_multigrid()?;
            }
        }

        let newton = &self.newton;
        if newton.max_iter == 0 || newton.update_preconditioner_every_newton_iterations == 0 {
            return Err(config_error("Newton iteration counts must be positive"));
        }
        let load = &self.load_step;
        if !(load.load_increment > 0.0 && load.load_increment <= 1.0) {
            return Err(config_error("load increment must lie in (0, 1]"));
        }
        if load.desired_newton_iterations == 0 || load.update_preconditioner_every_load_steps == 0 {
            return Err(config_error("load stepping counts must be positive"));
        }
        Ok(())
    }

    fn check_multigrid(&self) -> Result<(), DgError> {
        let mg = &self.multigrid;
        let unsteady = self.math_model.problem_type == ProblemType::Unsteady;
        if mg.operator_type.has_convection() && !self.convective_term_in_linear_system() {
            return Err(config_error(
                "multigrid operator type includes convection but the convective term is not part of the linear system",
            ));
        }
        let diffusion = mg.operator_type.has_diffusion() && self.math_model.equation_type.has_diffusion();
        if !unsteady && !diffusion && !mg.operator_type.has_convection() {
            return Err(config_error("multigrid level operator has no active term"));
        }
        if mg.smoother == MultigridSmoother::Chebyshev && (mg.chebyshev_degree == 0 || mg.smoothing_range <= 1.0) {
            return Err(config_error("Chebyshev smoother needs a positive degree and a smoothing range above 1"));
        }
        if mg.smoother == MultigridSmoother::Jacobi && mg.smoothing_iterations == 0 {
            return Err(config_error("Jacobi smoother needs at least one sweep"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let mut p = Parameters::default();
        p.physical_quantities.diffusivity = 0.1;
        assert!(p.check().is_ok());
    }

    #[test]
    fn missing_diffusivity_is_rejected() {
        let p = Parameters::default();
        assert!(matches!(p.check(), Err(DgError::Config(_))));
    }

    #[test]
    fn convective_multigrid_with_explicit_convection_is_rejected() {
        let mut p = Parameters::default();
        p.physical_quantities.diffusivity = 0.1;
        p.temporal.treatment_of_convective_term = TreatmentOfConvectiveTerm::Explicit;
        p.solver.preconditioner = Preconditioner::Multigrid;
        p.multigrid.operator_type = MultigridOperatorType::ReactionConvectionDiffusion;
        assert!(p.check().is_err());
        p.multigrid.operator_type = MultigridOperatorType::ReactionDiffusion;
        assert!(p.check().is_ok());
    }

    #[test]
    fn p_sequences() {
        assert_eq!(PSequenceType::Bisect.coarser(7), Some(3));
        assert_eq!(PSequenceType::Bisect.coarser(3), Some(1));
        assert_eq!(PSequenceType::DecreaseByOne.coarser(3), Some(2));
        assert_eq!(PSequenceType::GoToOne.coarser(5), Some(1));
        assert_eq!(PSequenceType::GoToOne.coarser(1), None);
    }
}
