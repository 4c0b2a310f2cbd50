//! Driver for steady problems: one linear solve.

use log::info;

use crate::config::{ProblemType, TypeVelocityField};
use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::pde::ConvectionDiffusionOperator;
use crate::postprocessor::PostProcessor;

pub struct DriverSteady {
    pde: ConvectionDiffusionOperator,
    postprocessor: Box<dyn PostProcessor>,
    solution: DistributedVector,
    rhs: DistributedVector,
    velocity: Option<DistributedVector>,
    iterations: Option<usize>,
}

impl DriverSteady {
    /// Sets up the linear solver of a steady `pde`.
    pub fn new(mut pde: ConvectionDiffusionOperator, postprocessor: Box<dyn PostProcessor>) -> Result<Self, DgError> {
        let param = pde.parameters();
        if param.math_model.problem_type != ProblemType::Steady {
            return Err(DgError::Config("steady driver needs a steady problem".to_string()));
        }
        let time = param.physical_quantities.start_time;
        let velocity = (param.math_model.equation_type.has_convection()
            && param.spatial.type_velocity_field == TypeVelocityField::DoFVector)
            .then(|| {
                let mut v = pde.initialize_dof_vector_velocity();
                pde.interpolate_velocity(&mut v, time);
                v
            });
        pde.setup_solver(1.0, velocity.as_ref())?;
        Ok(DriverSteady {
            solution: pde.initialize_dof_vector(),
            rhs: pde.initialize_dof_vector(),
            pde,
            postprocessor,
            velocity,
            iterations: None,
        })
    }

    pub fn pde(&self) -> &ConvectionDiffusionOperator {
        &self.pde
    }

    pub fn solution(&self) -> &DistributedVector {
        &self.solution
    }

    /// Linear iterations of the solve, once it ran.
    pub fn iterations(&self) -> Option<usize> {
        self.iterations
    }

    /// Solves from a zero initial guess and returns the number of linear iterations.
    pub fn solve(&mut self) -> Result<usize, DgError> {
        let time = self.pde.parameters().physical_quantities.start_time;
        self.pde.rhs(&mut self.rhs, time, self.velocity.as_ref())?;
        if self.pde.is_singular() {
            self.pde.set_zero_mean_value(&mut self.rhs);
        }
        let iterations = self.pde.solve(&mut self.solution, &self.rhs, false, 1.0, time, self.velocity.as_ref())?;
        info!("steady problem solved in {iterations} linear iterations");
        self.iterations = Some(iterations);
        self.postprocessor.do_postprocessing(&self.solution, time, 1)?;
        Ok(iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryDescriptor;
    use crate::config::{EquationType, Parameters, Preconditioner, Solver};
    use crate::functions::{ConstantFunction, FieldFunctions};
    use crate::grid::LineGrid;
    use crate::parallel::UniverseComm;
    use std::sync::Arc;

    fn parameters() -> Parameters {
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
    fn pure_neumann_problem_has_zero_mean_solution() {
        // -u'' = cos(πx) with u'(0) = u'(1) = 0, solution cos(πx)/π² up to a constant
        let grid = Arc::new(LineGrid::new(0.0, 1.0, 8, Arc::new(UniverseComm::Serial)).unwrap());
        let bd = BoundaryDescriptor::new().with_neumann(0, ConstantFunction(0.0)).with_neumann(1, ConstantFunction(0.0));
        let pi = std::f64::consts::PI;
        let fields = FieldFunctions::default().with_right_hand_side(move |x: f64, _t: f64| (pi * x).cos());
        let pde = ConvectionDiffusionOperator::new(grid, bd, fields, parameters()).unwrap();
        assert!(pde.is_singular());
        let mut driver = DriverSteady::new(pde, Box::new(())).unwrap();
        driver.solve().unwrap();
        assert!(driver.iterations().is_some());
        assert!(driver.solution().mean_value().abs() < 1e-10);
        let exact = move |x: f64, _t: f64| (pi * x).cos() / (pi * pi);
        assert!(driver.pde().space().l2_error(driver.solution(), &exact, 0.0) < 1e-3);
    }

    #[test]
    fn unsteady_problems_are_rejected() {
        let mut p = parameters();
        p.math_model.problem_type = ProblemType::Unsteady;
        let grid = Arc::new(LineGrid::new(0.0, 1.0, 2, Arc::new(UniverseComm::Serial)).unwrap());
        let bd = BoundaryDescriptor::new().with_symmetry(0).with_symmetry(1);
        let pde = ConvectionDiffusionOperator::new(grid, bd, FieldFunctions::default(), p).unwrap();
        assert!(matches!(DriverSteady::new(pde, Box::new(())), Err(DgError::Config(_))));
    }
}
