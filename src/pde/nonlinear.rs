//! Stationary nonlinear reaction–diffusion operator.
//!
//! Solves `-ν u'' + c u³ = f` where the load factor `λ` enters as the time argument
//! of the boundary data and of `f`. The residual is
//! `R(u) = D(u) + (c u³, v) - (f(λ), v)` including the weakly imposed boundary data;
//! its Jacobian at `ū` is `D + (3 c ū² δu, v)`.

use std::sync::Arc;

use log::info;

use crate::boundary::BoundaryDescriptor;
use crate::config::{EquationType, Parameters, ProblemType};
use crate::context::KspContext;
use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::fe::DofSpace;
use crate::functions::FieldFunctions;
use crate::grid::LineGrid;
use crate::operators::{
    CombinedOperator, DiffusiveKernel, DiffusiveKernelData, Operator, OperatorContext, ReactionForm, ReactionKernel,
    RhsOperator, SystemOperator, Terms,
};
use crate::solver::newton::{NewtonOutcome, NewtonSolver, NonlinearProblem};

pub struct NonlinearOperator {
    param: Parameters,
    fields: FieldFunctions,
    space: DofSpace,
    residual_operator: CombinedOperator,
    jacobian: Arc<CombinedOperator>,
    rhs_operator: Option<RhsOperator>,
    ksp: KspContext,
    load_factor: f64,
}

impl NonlinearOperator {
    pub fn new(
        grid: Arc<LineGrid>,
        boundary: BoundaryDescriptor,
        fields: FieldFunctions,
        param: Parameters,
    ) -> Result<Self, DgError> {
        if param.math_model.problem_type != ProblemType::Steady
            || param.math_model.equation_type != EquationType::Diffusion
        {
            return Err(DgError::Config("nonlinear operator needs a steady diffusion problem".to_string()));
        }
        param.check()?;
        boundary.verify(&grid)?;
        let boundary = Arc::new(boundary);
        let space = DofSpace::new(grid, param.spatial.degree)?;

        let diffusive = DiffusiveKernel::new(
            DiffusiveKernelData {
                diffusivity: param.physical_quantities.diffusivity,
                ip_factor: param.spatial.ip_factor,
            },
            boundary,
        );
        let reaction = ReactionKernel::new(param.physical_quantities.reaction_coefficient, ReactionForm::Nonlinear);
        let terms = Terms::DIFFUSION | Terms::REACTION;
        let residual_operator =
            CombinedOperator::new(space.clone(), terms, None, Some(diffusive.clone()), Some(reaction))?;
        let jacobian = CombinedOperator::new(space.clone(), terms, None, Some(diffusive), Some(reaction.linearized()))?;
        let ksp = KspContext::from_parameters(&param.solver, &param.multigrid, terms)?;
        let rhs_operator = param
            .math_model
            .right_hand_side
            .then(|| RhsOperator::new(space.clone(), Arc::clone(&fields.right_hand_side)));

        info!(
            "nonlinear reaction-diffusion operator: degree {}, {} dofs, reaction coefficient {}",
            space.degree(),
            space.n_global_dofs(),
            param.physical_quantities.reaction_coefficient
        );
        Ok(NonlinearOperator {
            param,
            fields,
            space,
            residual_operator,
            jacobian: Arc::new(jacobian),
            rhs_operator,
            ksp,
            load_factor: 0.0,
        })
    }

    pub fn parameters(&self) -> &Parameters {
        &self.param
    }

    pub fn space(&self) -> &DofSpace {
        &self.space
    }

    pub fn ksp(&self) -> &KspContext {
        &self.ksp
    }

    pub fn get_number_of_dofs(&self) -> usize {
        self.space.n_global_dofs()
    }

    pub fn initialize_dof_vector(&self) -> DistributedVector {
        self.space.new_vector()
    }

    /// Initial guess of the first load step.
    pub fn prescribe_initial_conditions(&self, dst: &mut DistributedVector) {
        self.space.interpolate(self.fields.initial_solution.as_ref(), 0.0, dst);
    }

    /// `dst = R(x)` at load factor `load_factor`.
    pub fn residual(&self, dst: &mut DistributedVector, x: &DistributedVector, load_factor: f64) -> Result<(), DgError> {
        let ctx = OperatorContext::at_time(load_factor);
        self.residual_operator.evaluate(dst, x, &ctx)?;
        if let Some(rhs_operator) = &self.rhs_operator {
            rhs_operator.evaluate_add(dst, x, &ctx)?;
        }
        Ok(())
    }

    /// Newton solve of `R(x) = 0` at `load_factor`, starting from `x`.
    ///
    /// With `update_preconditioner = false` the preconditioner of the previous solve
    /// is reused for all Newton iterations.
    pub fn solve_nonlinear(
        &mut self,
        x: &mut DistributedVector,
        load_factor: f64,
        update_preconditioner: bool,
    ) -> Result<NewtonOutcome, DgError> {
        self.load_factor = load_factor;
        let mut settings = self.param.newton;
        settings.update_preconditioner &= update_preconditioner;
        NewtonSolver::new(settings).solve(self, x)
    }
}

impl NonlinearProblem<DistributedVector> for NonlinearOperator {
    fn evaluate_residual(&mut self, x: &DistributedVector, r: &mut DistributedVector) -> Result<(), DgError> {
        self.residual(r, x, self.load_factor)
    }

    fn solve_linearized(
        &mut self,
        x_lin: &DistributedVector,
        rhs: &DistributedVector,
        dx: &mut DistributedVector,
        update_preconditioner: bool,
    ) -> Result<usize, DgError> {
        let ctx = OperatorContext::at_time(self.load_factor).with_linearization(Some(x_lin));
        let system = SystemOperator::new(Arc::clone(&self.jacobian), &ctx)?;
        let stats = self.ksp.solve(&system, rhs, dx, update_preconditioner)?;
        Ok(stats.iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Preconditioner, Solver};
    use crate::core::traits::DofVector;
    use crate::functions::ConstantFunction;
    use crate::parallel::UniverseComm;
    use std::f64::consts::PI;

    fn parameters() -> Parameters {
        let mut p = Parameters::default();
        p.math_model.problem_type = ProblemType::Steady;
        p.math_model.equation_type = EquationType::Diffusion;
        p.math_model.right_hand_side = true;
        p.physical_quantities.diffusivity = 1.0;
        p.physical_quantities.reaction_coefficient = 1.0;
        p.spatial.degree = 3;
        p.solver.solver = Solver::CG;
        p.solver.preconditioner = Preconditioner::PointJacobi;
        p.newton.rel_tol = 1e-10;
        p
    }

    // u = λ sin(πx) solves -u'' + u³ = f(λ)
    fn source(x: f64, lambda: f64) -> f64 {
        let s = (PI * x).sin();
        lambda * PI * PI * s + (lambda * s).powi(3)
    }

    fn operator() -> NonlinearOperator {
        let grid = Arc::new(LineGrid::new(0.0, 1.0, 8, Arc::new(UniverseComm::Serial)).unwrap());
        let bd = BoundaryDescriptor::new().with_dirichlet(0, ConstantFunction(0.0)).with_dirichlet(1, ConstantFunction(0.0));
        let fields = FieldFunctions::default().with_right_hand_side(source);
        NonlinearOperator::new(grid, bd, fields, parameters()).unwrap()
    }

    #[test]
    fn newton_solves_manufactured_problem() {
        let mut op = operator();
        let mut x = op.initialize_dof_vector();
        op.prescribe_initial_conditions(&mut x);
        let outcome = op.solve_nonlinear(&mut x, 1.0, true).unwrap();
        assert!(outcome.converged());
        assert!(outcome.stats().newton_iterations <= 8);
        assert!(outcome.stats().linear_iterations > 0);
        let exact = |x: f64, _t: f64| (PI * x).sin();
        assert!(op.space().l2_error(&x, &exact, 1.0) < 1e-3);

        let mut r = op.initialize_dof_vector();
        op.residual(&mut r, &x, 1.0).unwrap();
        assert!(r.norm() < 1e-8);
    }

    #[test]
    fn residual_vanishes_at_zero_load() {
        let op = operator();
        let x = op.initialize_dof_vector();
        let mut r = op.initialize_dof_vector();
        op.residual(&mut r, &x, 0.0).unwrap();
        assert!(r.norm() < 1e-14);
        op.residual(&mut r, &x, 1.0).unwrap();
        assert!(r.norm() > 1e-2);
    }

    #[test]
    fn transient_problems_are_rejected() {
        let grid = Arc::new(LineGrid::new(0.0, 1.0, 2, Arc::new(UniverseComm::Serial)).unwrap());
        let mut p = parameters();
        p.math_model.problem_type = ProblemType::Unsteady;
        let result = NonlinearOperator::new(grid, BoundaryDescriptor::new(), FieldFunctions::default(), p);
        assert!(matches!(result, Err(DgError::Config(_))));
    }
}
