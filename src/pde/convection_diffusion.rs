//! Convection–diffusion operator facade.
//!
//! Owns the discrete operators of one scalar field and exposes the surface used by
//! the time and load drivers. Only the operators of active terms are built: without
//! diffusivity there is no diffusive operator at all, without a velocity field no
//! convective one. The combined operator holds the terms of the scheme:
//!
//! | scheme                 | terms of the combined operator                      |
//! |------------------------|-----------------------------------------------------|
//! | steady                 | convection, diffusion                               |
//! | BDF                    | mass, diffusion, convection if treated implicitly   |
//! | explicit Runge–Kutta   | convection, diffusion (no linear system)            |

use std::sync::Arc;

use log::info;

use crate::boundary::{BoundaryDescriptor, BoundaryType};
use crate::config::{
    EquationType, Parameters, ProblemType, TemporalDiscretization, TimeStepCalculation, TypeVelocityField,
};
use crate::context::KspContext;
use crate::core::traits::DofVector;
use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::fe::{DofSpace, QUAD_OVERINTEGRATION, QUAD_STANDARD};
use crate::functions::FieldFunctions;
use crate::grid::LineGrid;
use crate::operators::{
    CombinedOperator, ConvectiveKernel, ConvectiveKernelData, ConvectiveOperator, DiffusiveKernel,
    DiffusiveKernelData, DiffusiveOperator, InverseMassOperator, MassOperator, Operator, OperatorContext,
    RhsOperator, SystemOperator, Terms,
};
use crate::parallel::Comm;
use crate::time_integration::time_step::{calculate_time_step_cfl_global, cfl_time_step};

pub struct ConvectionDiffusionOperator {
    param: Parameters,
    boundary: Arc<BoundaryDescriptor>,
    fields: FieldFunctions,
    space: DofSpace,
    mass: MassOperator,
    inverse_mass: InverseMassOperator,
    convective: Option<ConvectiveOperator>,
    diffusive: Option<DiffusiveOperator>,
    rhs_operator: Option<RhsOperator>,
    combined: Arc<CombinedOperator>,
    ksp: Option<KspContext>,
}

/// Terms of the combined operator for the configured scheme.
fn combined_terms(param: &Parameters) -> Terms {
    let equation = param.math_model.equation_type;
    let mut terms = Terms::empty();
    terms.set(Terms::DIFFUSION, equation.has_diffusion());
    match param.math_model.problem_type {
        ProblemType::Steady => terms.set(Terms::CONVECTION, equation.has_convection()),
        ProblemType::Unsteady => match param.temporal.temporal_discretization {
            TemporalDiscretization::BDF => {
                terms.insert(Terms::MASS);
                terms.set(Terms::CONVECTION, param.convective_term_in_linear_system());
            }
            TemporalDiscretization::ExplRK => terms.set(Terms::CONVECTION, equation.has_convection()),
        },
    }
    terms
}

impl ConvectionDiffusionOperator {
    /// Checks `param`, verifies that `boundary` covers the mesh and builds the
    /// active operators on a degree-`param.spatial.degree` space.
    pub fn new(
        grid: Arc<LineGrid>,
        boundary: BoundaryDescriptor,
        fields: FieldFunctions,
        param: Parameters,
    ) -> Result<Self, DgError> {
        param.check()?;
        boundary.verify(&grid)?;
        let boundary = Arc::new(boundary);
        let space = DofSpace::new(grid, param.spatial.degree)?;
        let equation = param.math_model.equation_type;

        let convective_kernel = equation.has_convection().then(|| {
            let data = ConvectiveKernelData {
                type_velocity_field: param.spatial.type_velocity_field,
                numerical_flux: param.spatial.numerical_flux_convective_operator,
                quad_index: if param.spatial.use_overintegration { QUAD_OVERINTEGRATION } else { QUAD_STANDARD },
                ale: param.math_model.ale,
            };
            ConvectiveKernel::new(data, Arc::clone(&fields.velocity), Arc::clone(&boundary))
        });
        let diffusive_kernel = equation.has_diffusion().then(|| {
            let data = DiffusiveKernelData {
                diffusivity: param.physical_quantities.diffusivity,
                ip_factor: param.spatial.ip_factor,
            };
            DiffusiveKernel::new(data, Arc::clone(&boundary))
        });

        let combined = CombinedOperator::new(
            space.clone(),
            combined_terms(&param),
            convective_kernel.clone(),
            diffusive_kernel.clone(),
            None,
        )?;
        let rhs_operator = param
            .math_model
            .right_hand_side
            .then(|| RhsOperator::new(space.clone(), Arc::clone(&fields.right_hand_side)));

        info!(
            "convection-diffusion operator: {:?}, degree {}, {} dofs, combined terms {:?}",
            equation,
            space.degree(),
            space.n_global_dofs(),
            combined.terms()
        );
        Ok(ConvectionDiffusionOperator {
            mass: MassOperator::new(space.clone()),
            inverse_mass: InverseMassOperator::new(space.clone()),
            convective: convective_kernel.map(|k| ConvectiveOperator::new(space.clone(), k)),
            diffusive: diffusive_kernel.map(|k| DiffusiveOperator::new(space.clone(), k)),
            rhs_operator,
            combined: Arc::new(combined),
            ksp: None,
            param,
            boundary,
            fields,
            space,
        })
    }

    pub fn parameters(&self) -> &Parameters {
        &self.param
    }

    pub fn space(&self) -> &DofSpace {
        &self.space
    }

    pub fn boundary(&self) -> &Arc<BoundaryDescriptor> {
        &self.boundary
    }

    pub fn combined_operator(&self) -> &Arc<CombinedOperator> {
        &self.combined
    }

    pub fn ksp(&self) -> Option<&KspContext> {
        self.ksp.as_ref()
    }

    fn needs_velocity_vector(&self) -> bool {
        self.convective.is_some() && self.param.spatial.type_velocity_field == TypeVelocityField::DoFVector
    }

    fn check_velocity(&self, velocity: Option<&DistributedVector>) -> Result<(), DgError> {
        if self.needs_velocity_vector() && velocity.is_none() {
            return Err(DgError::MissingVelocity);
        }
        Ok(())
    }

    fn system(&self, scaling_factor: f64, time: f64, velocity: Option<&DistributedVector>) -> Result<SystemOperator, DgError> {
        let velocity = velocity.filter(|_| self.combined.terms().contains(Terms::CONVECTION));
        let ctx = OperatorContext::at_time(time).with_scaling_factor_mass(scaling_factor).with_velocity(velocity);
        SystemOperator::new(Arc::clone(&self.combined), &ctx)
    }

    /// Builds the Krylov solver and sets up its preconditioner for the system at
    /// `scaling_factor` (and `velocity`, if the velocity is a DoF vector).
    ///
    /// Fails for schemes without a linear system and for invalid
    /// operator/preconditioner pairs.
    pub fn setup_solver(&mut self, scaling_factor: f64, velocity: Option<&DistributedVector>) -> Result<(), DgError> {
        if !self.param.has_linear_system() {
            return Err(DgError::Config("explicit time integration solves no linear system".to_string()));
        }
        if self.combined.terms().contains(Terms::CONVECTION) {
            self.check_velocity(velocity)?;
        }
        let start = self.param.physical_quantities.start_time;
        let system = self.system(scaling_factor, start, velocity)?;
        let mut ksp = KspContext::from_parameters(&self.param.solver, &self.param.multigrid, self.combined.terms())?;
        ksp.refresh(&system)?;
        self.ksp = Some(ksp);
        Ok(())
    }

    /// `dst` = boundary data and source of the linear system at `time`.
    pub fn rhs(&self, dst: &mut DistributedVector, time: f64, velocity: Option<&DistributedVector>) -> Result<(), DgError> {
        let with_velocity = self.combined.terms().contains(Terms::CONVECTION);
        if with_velocity {
            self.check_velocity(velocity)?;
        }
        let ctx = OperatorContext::at_time(time).with_velocity(velocity.filter(|_| with_velocity));
        self.combined.rhs(dst, &ctx)?;
        if let Some(rhs_operator) = &self.rhs_operator {
            rhs_operator.rhs_add(dst, &ctx)?;
        }
        Ok(())
    }

    /// Solves `(s·M + A) x = rhs` at `time` with `x` as initial guess and returns
    /// the number of linear iterations.
    pub fn solve(
        &mut self,
        x: &mut DistributedVector,
        rhs: &DistributedVector,
        update_preconditioner: bool,
        scaling_factor: f64,
        time: f64,
        velocity: Option<&DistributedVector>,
    ) -> Result<usize, DgError> {
        if self.combined.terms().contains(Terms::CONVECTION) {
            self.check_velocity(velocity)?;
        }
        let system = self.system(scaling_factor, time, velocity)?;
        let ksp = self
            .ksp
            .as_mut()
            .ok_or_else(|| DgError::Config("solve called before setup_solver".to_string()))?;
        let stats = ksp.solve(&system, rhs, x, update_preconditioner)?;
        if self.is_singular() {
            x.set_zero_mean_value();
        }
        Ok(stats.iterations)
    }

    /// `dst = M⁻¹ (f - C(src) - D(src))`, the right-hand side of `du/dt = ...`.
    pub fn evaluate_explicit_time_int(
        &self,
        dst: &mut DistributedVector,
        src: &DistributedVector,
        time: f64,
        velocity: Option<&DistributedVector>,
    ) -> Result<(), DgError> {
        if self.convective.is_some() {
            self.check_velocity(velocity)?;
        }
        let ctx = OperatorContext::at_time(time).with_velocity(velocity);
        if self.param.spatial.use_combined_operator && !self.combined.unsteady_problem() {
            self.combined.evaluate(dst, src, &ctx)?;
        } else {
            dst.fill(0.0);
            if let Some(diffusive) = &self.diffusive {
                diffusive.evaluate_add(dst, src, &ctx)?;
            }
            if let Some(convective) = &self.convective {
                convective.evaluate_add(dst, src, &ctx)?;
            }
        }
        dst.scale(-1.0);
        if let Some(rhs_operator) = &self.rhs_operator {
            rhs_operator.rhs_add(dst, &ctx)?;
        }
        self.inverse_mass.apply_in_place(dst)
    }

    /// `dst = C(src)` including its boundary data.
    pub fn evaluate_convective_term(
        &self,
        dst: &mut DistributedVector,
        src: &DistributedVector,
        time: f64,
        velocity: Option<&DistributedVector>,
    ) -> Result<(), DgError> {
        let convective = self
            .convective
            .as_ref()
            .ok_or(DgError::NotImplemented("convective term of a problem without convection"))?;
        self.check_velocity(velocity)?;
        let ctx = OperatorContext::at_time(time).with_velocity(velocity);
        convective.evaluate(dst, src, &ctx)
    }

    pub fn apply_mass_operator(&self, dst: &mut DistributedVector, src: &DistributedVector) -> Result<(), DgError> {
        self.mass.apply(dst, src, &OperatorContext::default())
    }

    pub fn apply_mass_operator_add(&self, dst: &mut DistributedVector, src: &DistributedVector) -> Result<(), DgError> {
        self.mass.apply_add(dst, src, &OperatorContext::default())
    }

    pub fn apply_inverse_mass_operator(&self, dst: &mut DistributedVector, src: &DistributedVector) -> Result<(), DgError> {
        self.inverse_mass.apply(dst, src)
    }

    pub fn get_number_of_dofs(&self) -> usize {
        self.space.n_global_dofs()
    }

    pub fn get_polynomial_degree(&self) -> usize {
        self.space.degree()
    }

    pub fn initialize_dof_vector(&self) -> DistributedVector {
        self.space.new_vector()
    }

    /// Velocity vectors live on the solution space.
    pub fn initialize_dof_vector_velocity(&self) -> DistributedVector {
        self.space.new_vector()
    }

    pub fn prescribe_initial_conditions(&self, dst: &mut DistributedVector, time: f64) {
        self.space.interpolate(self.fields.initial_solution.as_ref(), time, dst);
    }

    pub fn interpolate_velocity(&self, velocity: &mut DistributedVector, time: f64) {
        self.space.interpolate(self.fields.velocity.as_ref(), time, velocity);
    }

    /// Pure diffusion without Dirichlet boundary and without mass term: the solution
    /// is determined up to a constant.
    pub fn is_singular(&self) -> bool {
        let terms = self.combined.terms();
        if terms != Terms::DIFFUSION {
            return false;
        }
        !self.space.grid().boundary_ids().into_iter().any(|id| {
            matches!(self.boundary.get_boundary_type(id), BoundaryType::Dirichlet | BoundaryType::DirichletCached)
        })
    }

    /// Removes the mean value; used on right-hand sides and solutions of singular
    /// problems.
    pub fn set_zero_mean_value(&self, v: &mut DistributedVector) {
        v.set_zero_mean_value();
    }

    /// `Δt = cfl / p^e · h_min / |a|_max` with the configured maximum velocity.
    pub fn calculate_time_step_cfl_global(&self) -> f64 {
        let temporal = &self.param.temporal;
        calculate_time_step_cfl_global(
            temporal.cfl,
            temporal.max_velocity,
            self.calculate_minimum_element_length(),
            self.space.degree(),
            temporal.exponent_fe_degree_convection,
        )
    }

    /// `min_K cfl / p^e · h_K / |a|_K` over all cells (collective). Cells at rest
    /// impose no limit; `f64::INFINITY` if the whole field is at rest.
    pub fn calculate_time_step_cfl_local(&self, time: f64, velocity: Option<&DistributedVector>) -> Result<f64, DgError> {
        let temporal = &self.param.temporal;
        let shape = self.space.shape(QUAD_STANDARD);
        let use_vector = self.param.spatial.type_velocity_field == TypeVelocityField::DoFVector;
        if use_vector && velocity.is_none() {
            return Err(DgError::MissingVelocity);
        }
        let mut local = f64::INFINITY;
        for (c, geometry) in self.space.mapping().owned().iter().enumerate() {
            let speed = (0..shape.n_q_points())
                .map(|q| match velocity.filter(|_| use_vector) {
                    Some(v) => shape.interpolate_at(v.cell(c), q),
                    None => self.fields.velocity.value(geometry.map(shape.points()[q]), time),
                })
                .fold(0.0_f64, |m, a| m.max(a.abs()));
            if speed > 0.0 {
                let dt = cfl_time_step(
                    temporal.cfl,
                    speed,
                    geometry.h,
                    self.space.degree(),
                    temporal.exponent_fe_degree_convection,
                );
                local = local.min(dt);
            }
        }
        Ok(self.space.comm().all_reduce_min(local))
    }

    /// Largest `|a(x, time)|` at the quadrature points (collective).
    pub fn calculate_maximum_velocity(&self, time: f64) -> f64 {
        let shape = self.space.shape(QUAD_STANDARD);
        let local = self
            .space
            .mapping()
            .owned()
            .iter()
            .flat_map(|g| shape.points().iter().map(move |&xi| g.map(xi)))
            .fold(0.0_f64, |m, x| m.max(self.fields.velocity.value(x, time).abs()));
        self.space.comm().all_reduce_max(local)
    }

    pub fn calculate_minimum_element_length(&self) -> f64 {
        self.space.grid().minimum_element_length()
    }

    /// Step size of the first time step as configured.
    pub fn initial_time_step_size(&self, velocity: Option<&DistributedVector>) -> Result<f64, DgError> {
        let temporal = &self.param.temporal;
        let dt = match temporal.calculation_of_time_step_size {
            TimeStepCalculation::UserSpecified => temporal.time_step_size,
            TimeStepCalculation::CFL if temporal.adaptive_time_stepping => {
                self.calculate_time_step_cfl_local(self.param.physical_quantities.start_time, velocity)?
            }
            TimeStepCalculation::CFL => self.calculate_time_step_cfl_global(),
        };
        Ok(dt.min(temporal.time_step_size_max))
    }

    /// Rebuilds the geometry-dependent data on the moved `grid` and marks the
    /// preconditioner stale.
    pub fn update_after_mesh_movement(&mut self, grid: Arc<LineGrid>) -> Result<(), DgError> {
        self.space = self.space.with_grid(grid)?;
        let space = &self.space;
        self.mass.update_after_mesh_movement(space);
        self.inverse_mass.update_after_mesh_movement(space);
        if let Some(convective) = self.convective.as_mut() {
            convective.update_after_mesh_movement(space);
        }
        if let Some(diffusive) = self.diffusive.as_mut() {
            diffusive.update_after_mesh_movement(space);
        }
        if let Some(rhs_operator) = self.rhs_operator.as_mut() {
            rhs_operator.update_after_mesh_movement(space);
        }
        Arc::make_mut(&mut self.combined).update_after_mesh_movement(space);
        if let Some(ksp) = self.ksp.as_mut() {
            ksp.invalidate();
        }
        Ok(())
    }

    pub fn equation_type(&self) -> EquationType {
        self.param.math_model.equation_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Preconditioner, Solver, TreatmentOfConvectiveTerm};
    use crate::functions::ConstantFunction;
    use crate::parallel::UniverseComm;
    use approx::assert_abs_diff_eq;

    fn grid(cells: usize) -> Arc<LineGrid> {
        Arc::new(LineGrid::new(0.0, 1.0, cells, Arc::new(UniverseComm::Serial)).unwrap())
    }

    fn diffusion_parameters() -> Parameters {
        let mut p = Parameters::default();
        p.math_model.problem_type = ProblemType::Steady;
        p.math_model.equation_type = EquationType::Diffusion;
        p.math_model.right_hand_side = true;
        p.physical_quantities.diffusivity = 1.0;
        p.spatial.degree = 2;
        p.solver.solver = Solver::CG;
        p.solver.preconditioner = Preconditioner::PointJacobi;
        p
    }

    #[test]
    fn steady_poisson_is_exact_for_quadratics() {
        // -u'' = 2 with u(0) = 0, u(1) = 0 has solution x(1 - x)
        let bd = BoundaryDescriptor::new()
            .with_dirichlet(0, ConstantFunction(0.0))
            .with_dirichlet(1, ConstantFunction(0.0));
        let fields = FieldFunctions::default().with_right_hand_side(ConstantFunction(2.0));
        let mut pde = ConvectionDiffusionOperator::new(grid(4), bd, fields, diffusion_parameters()).unwrap();
        pde.setup_solver(1.0, None).unwrap();
        let mut b = pde.initialize_dof_vector();
        pde.rhs(&mut b, 0.0, None).unwrap();
        let mut x = pde.initialize_dof_vector();
        let iterations = pde.solve(&mut x, &b, false, 1.0, 0.0, None).unwrap();
        assert!(iterations > 0 && iterations <= pde.get_number_of_dofs());
        let exact = |x: f64, _t: f64| x * (1.0 - x);
        assert_abs_diff_eq!(pde.space().l2_error(&x, &exact, 0.0), 0.0, epsilon = 1e-8);
    }

    #[test]
    fn uncovered_boundary_fails_setup() {
        let bd = BoundaryDescriptor::new().with_dirichlet(0, ConstantFunction(0.0));
        let result = ConvectionDiffusionOperator::new(grid(2), bd, FieldFunctions::default(), diffusion_parameters());
        assert!(matches!(result, Err(DgError::Boundary { boundary_id: 1, matches: 0 })));
    }

    #[test]
    fn explicit_paths_agree() {
        let mut p = Parameters::default();
        p.math_model.equation_type = EquationType::ConvectionDiffusion;
        p.math_model.right_hand_side = true;
        p.physical_quantities.diffusivity = 0.05;
        p.temporal.temporal_discretization = TemporalDiscretization::ExplRK;
        p.temporal.order_time_integrator = 3;
        p.spatial.degree = 3;
        let bd = || {
            BoundaryDescriptor::new().with_dirichlet(0, ConstantFunction(1.0)).with_neumann(1, ConstantFunction(0.5))
        };
        let fields = || {
            FieldFunctions::default()
                .with_velocity(|x: f64, _t: f64| 1.0 + x)
                .with_right_hand_side(|x: f64, t: f64| x * t)
        };
        let mut combined = ConvectionDiffusionOperator::new(grid(5), bd(), fields(), p.clone()).unwrap();
        p.spatial.use_combined_operator = false;
        let separate = ConvectionDiffusionOperator::new(grid(5), bd(), fields(), p).unwrap();

        let mut u = combined.initialize_dof_vector();
        combined.space().interpolate(&|x: f64, _t: f64| (2.0 * x).cos(), 0.0, &mut u);
        let mut a = combined.initialize_dof_vector();
        let mut b = separate.initialize_dof_vector();
        combined.evaluate_explicit_time_int(&mut a, &u, 0.3, None).unwrap();
        separate.evaluate_explicit_time_int(&mut b, &u, 0.3, None).unwrap();
        a.axpy(-1.0, &b);
        assert_abs_diff_eq!(a.norm(), 0.0, epsilon = 1e-12);
        assert!(matches!(combined.setup_solver(1.0, None), Err(DgError::Config(_))));
    }

    #[test]
    fn dof_vector_velocity_is_required() {
        let mut p = Parameters::default();
        p.math_model.equation_type = EquationType::Convection;
        p.spatial.type_velocity_field = TypeVelocityField::DoFVector;
        p.spatial.degree = 1;
        let bd = BoundaryDescriptor::new().with_dirichlet(0, ConstantFunction(0.0)).with_neumann(1, ConstantFunction(0.0));
        let mut pde = ConvectionDiffusionOperator::new(grid(4), bd, FieldFunctions::default(), p).unwrap();
        assert!(matches!(pde.setup_solver(1.0, None), Err(DgError::MissingVelocity)));
        let mut velocity = pde.initialize_dof_vector_velocity();
        velocity.fill(1.0);
        pde.setup_solver(1.0, Some(&velocity)).unwrap();
    }

    #[test]
    fn explicit_convection_leaves_mass_and_diffusion_in_the_system() {
        let mut p = Parameters::default();
        p.physical_quantities.diffusivity = 0.1;
        p.temporal.treatment_of_convective_term = TreatmentOfConvectiveTerm::Explicit;
        let bd = BoundaryDescriptor::new().with_symmetry(0).with_symmetry(1);
        let pde = ConvectionDiffusionOperator::new(grid(2), bd, FieldFunctions::default(), p).unwrap();
        assert_eq!(pde.combined_operator().terms(), Terms::MASS | Terms::DIFFUSION);
        assert!(!pde.is_singular());
    }

    #[test]
    fn cfl_step_shrinks_with_degree() {
        let mut p = Parameters::default();
        p.math_model.equation_type = EquationType::Convection;
        p.temporal.calculation_of_time_step_size = TimeStepCalculation::CFL;
        p.temporal.cfl = 1.5;
        p.temporal.max_velocity = 10.0;
        p.temporal.exponent_fe_degree_convection = 2.0;
        let bd = || BoundaryDescriptor::new().with_dirichlet(0, ConstantFunction(0.0)).with_neumann(1, ConstantFunction(0.0));
        let fields = || FieldFunctions::default().with_velocity(ConstantFunction(10.0));
        let mut steps = Vec::new();
        for degree in 1..=4 {
            p.spatial.degree = degree;
            let pde = ConvectionDiffusionOperator::new(grid(8), bd(), fields(), p.clone()).unwrap();
            let global = pde.calculate_time_step_cfl_global();
            assert_abs_diff_eq!(global, 1.5 / (degree * degree) as f64 * 0.125 / 10.0, epsilon = 1e-14);
            let local = pde.calculate_time_step_cfl_local(0.0, None).unwrap();
            assert_abs_diff_eq!(local, global, epsilon = 1e-14);
            assert_abs_diff_eq!(pde.calculate_maximum_velocity(0.0), 10.0);
            steps.push(global);
        }
        assert!(steps.windows(2).all(|w| w[1] < w[0]));
    }
}
