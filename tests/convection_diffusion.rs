//! End-to-end runs of the convection–diffusion drivers against analytical solutions.

use std::f64::consts::PI;
use std::sync::Arc;

use dgsolve::boundary::BoundaryDescriptor;
use dgsolve::config::{
    EquationType, MultigridType, Parameters, Preconditioner, ProblemType, Solver, TemporalDiscretization,
    TimeStepCalculation, TreatmentOfConvectiveTerm,
};
use dgsolve::core::DofVector;
use dgsolve::functions::{ConstantFunction, FieldFunctions};
use dgsolve::grid::LineGrid;
use dgsolve::parallel::UniverseComm;
use dgsolve::pde::ConvectionDiffusionOperator;
use dgsolve::time_integration::{Driver, DriverState, DriverSteady, PrescribedMeshMotion, TimeIntegrator};

fn uniform(cells: usize) -> LineGrid {
    LineGrid::new(0.0, 1.0, cells, Arc::new(UniverseComm::Serial)).unwrap()
}

fn homogeneous_dirichlet() -> BoundaryDescriptor {
    BoundaryDescriptor::new().with_dirichlet(0, ConstantFunction(0.0)).with_dirichlet(1, ConstantFunction(0.0))
}

fn poisson_parameters(degree: usize) -> Parameters {
    let mut p = Parameters::default();
    p.math_model.problem_type = ProblemType::Steady;
    p.math_model.equation_type = EquationType::Diffusion;
    p.math_model.right_hand_side = true;
    p.physical_quantities.diffusivity = 1.0;
    p.spatial.degree = degree;
    p.solver.solver = Solver::CG;
    p.solver.preconditioner = Preconditioner::PointJacobi;
    p.solver.rel_tol = 1e-13;
    p
}

fn poisson_error(cells: usize, degree: usize) -> f64 {
    let fields = FieldFunctions::default().with_right_hand_side(|x: f64, _t: f64| PI * PI * (PI * x).sin());
    let pde =
        ConvectionDiffusionOperator::new(Arc::new(uniform(cells)), homogeneous_dirichlet(), fields, poisson_parameters(degree))
            .unwrap();
    let mut driver = DriverSteady::new(pde, Box::new(())).unwrap();
    driver.solve().unwrap();
    let exact = |x: f64, _t: f64| (PI * x).sin();
    driver.pde().space().l2_error(driver.solution(), &exact, 0.0)
}

#[test]
fn poisson_converges_at_optimal_rate() {
    for degree in 1..=3 {
        let coarse = poisson_error(4, degree);
        let fine = poisson_error(8, degree);
        let rate = (coarse / fine).log2();
        assert!(rate > degree as f64 + 0.7, "degree {degree}: rate {rate}");
    }
}

#[test]
fn multigrid_preconditioned_cg_needs_few_iterations() {
    let fields = FieldFunctions::default().with_right_hand_side(|x: f64, _t: f64| PI * PI * (PI * x).sin());
    let mut p = poisson_parameters(3);
    p.solver.preconditioner = Preconditioner::Multigrid;
    p.solver.rel_tol = 1e-10;
    p.multigrid.kind = MultigridType::HPMG;
    let pde = ConvectionDiffusionOperator::new(Arc::new(uniform(16)), homogeneous_dirichlet(), fields, p).unwrap();
    let mut driver = DriverSteady::new(pde, Box::new(())).unwrap();
    let iterations = driver.solve().unwrap();
    assert!(iterations < 25, "{iterations} iterations");
    let exact = |x: f64, _t: f64| (PI * x).sin();
    assert!(driver.pde().space().l2_error(driver.solution(), &exact, 0.0) < 1e-4);
}

#[test]
fn steady_convection_with_point_jacobi_reaches_inflow_state() {
    // u' = 0 with u = 3 at the inflow; interior nodes have a zero diagonal
    let mut p = Parameters::default();
    p.math_model.problem_type = ProblemType::Steady;
    p.math_model.equation_type = EquationType::Convection;
    p.spatial.degree = 2;
    p.solver.solver = Solver::GMRES;
    p.solver.preconditioner = Preconditioner::PointJacobi;
    p.solver.rel_tol = 1e-12;
    let bd = BoundaryDescriptor::new().with_dirichlet(0, ConstantFunction(3.0)).with_neumann(1, ConstantFunction(0.0));
    let fields = FieldFunctions::default().with_velocity(ConstantFunction(1.0));
    let pde = ConvectionDiffusionOperator::new(Arc::new(uniform(4)), bd, fields, p).unwrap();
    let mut driver = DriverSteady::new(pde, Box::new(())).unwrap();
    let iterations = driver.solve().unwrap();
    assert!(iterations < 50, "{iterations} iterations");
    let exact = |_x: f64, _t: f64| 3.0;
    let error = driver.pde().space().l2_error(driver.solution(), &exact, 0.0);
    assert!(error < 1e-8, "error {error}");
}

fn advection_diffusion_parameters() -> Parameters {
    let mut p = Parameters::default();
    p.math_model.equation_type = EquationType::ConvectionDiffusion;
    p.physical_quantities.diffusivity = 0.01;
    p.physical_quantities.end_time = 0.2;
    p.spatial.degree = 4;
    p
}

// u = exp(-ν k² t) sin(k (x - t)) on the periodic unit interval, ν = 0.01, a = 1
fn travelling_wave(x: f64, t: f64) -> f64 {
    let k = 2.0 * PI;
    (-0.01 * k * k * t).exp() * (k * (x - t)).sin()
}

fn run_periodic(p: Parameters) -> (f64, usize) {
    let grid = Arc::new(uniform(8).with_periodicity());
    let fields = FieldFunctions::default()
        .with_initial_solution(travelling_wave)
        .with_velocity(ConstantFunction(1.0));
    let pde = ConvectionDiffusionOperator::new(grid, BoundaryDescriptor::new(), fields, p).unwrap();
    let mut driver = Driver::new(pde, Box::new(())).unwrap();
    driver.solve().unwrap();
    assert_eq!(driver.state(), DriverState::Finished);
    let integrator = driver.integrator();
    assert!((integrator.time() - 0.2).abs() < 1e-12);
    let error = integrator.pde().space().l2_error(integrator.solution(), &travelling_wave, integrator.time());
    (error, integrator.clock().number_of_time_steps())
}

#[test]
fn explicit_runge_kutta_tracks_travelling_wave() {
    let mut p = advection_diffusion_parameters();
    p.temporal.temporal_discretization = TemporalDiscretization::ExplRK;
    p.temporal.order_time_integrator = 4;
    p.temporal.time_step_size = 1e-3;
    let (error, steps) = run_periodic(p);
    assert_eq!(steps, 200);
    assert!(error < 2e-3, "error {error}");
}

#[test]
fn adaptive_explicit_steps_respect_the_cfl_limit() {
    let mut p = advection_diffusion_parameters();
    p.temporal.temporal_discretization = TemporalDiscretization::ExplRK;
    p.temporal.order_time_integrator = 3;
    p.temporal.calculation_of_time_step_size = TimeStepCalculation::CFL;
    p.temporal.adaptive_time_stepping = true;
    p.temporal.cfl = 0.1;
    p.temporal.exponent_fe_degree_convection = 1.5;
    p.temporal.max_velocity = 1.0;
    let (error, steps) = run_periodic(p);
    // Δt = 0.1 / 4^1.5 · 0.125 / 1
    let dt: f64 = 0.1 / 8.0 * 0.125;
    assert!(steps >= (0.2 / dt).floor() as usize);
    assert!(error < 2e-3, "error {error}");
}

#[test]
fn bdf_with_explicit_convection_tracks_travelling_wave() {
    let mut p = advection_diffusion_parameters();
    p.temporal.temporal_discretization = TemporalDiscretization::BDF;
    p.temporal.order_time_integrator = 2;
    p.temporal.treatment_of_convective_term = TreatmentOfConvectiveTerm::Explicit;
    p.temporal.time_step_size = 1e-3;
    p.solver.preconditioner = Preconditioner::InverseMassMatrix;
    p.solver.solver = Solver::CG;
    let (error, _) = run_periodic(p);
    assert!(error < 5e-3, "error {error}");
}

fn bdf_diffusion_error(order: usize, dt: f64) -> f64 {
    // u = exp(-t) sin(πx) with ν = 1/π²
    let exact = |x: f64, t: f64| (-t).exp() * (PI * x).sin();
    let mut p = Parameters::default();
    p.math_model.equation_type = EquationType::Diffusion;
    p.physical_quantities.diffusivity = 1.0 / (PI * PI);
    p.physical_quantities.end_time = 0.4;
    p.temporal.order_time_integrator = order;
    p.temporal.start_with_low_order = false;
    p.temporal.time_step_size = dt;
    p.spatial.degree = 5;
    p.solver.solver = Solver::CG;
    p.solver.rel_tol = 1e-13;
    p.solver.abs_tol = 1e-15;
    let fields = FieldFunctions::default().with_initial_solution(exact);
    let pde = ConvectionDiffusionOperator::new(Arc::new(uniform(8)), homogeneous_dirichlet(), fields, p).unwrap();
    let mut driver = Driver::new(pde, Box::new(())).unwrap();
    driver.solve().unwrap();
    let integrator = driver.integrator();
    assert!(integrator.iterations().is_some_and(|s| s.n_calls > 0));
    integrator.pde().space().l2_error(integrator.solution(), &exact, integrator.time())
}

#[test]
fn bdf_converges_in_time() {
    for order in 1..=3 {
        let coarse = bdf_diffusion_error(order, 0.04);
        let fine = bdf_diffusion_error(order, 0.02);
        let rate = (coarse / fine).log2();
        assert!(rate > order as f64 - 0.3, "BDF{order}: rate {rate}");
    }
}

#[test]
fn moving_mesh_keeps_a_constant_state() {
    let mut p = Parameters::default();
    p.math_model.ale = true;
    p.physical_quantities.diffusivity = 0.1;
    p.physical_quantities.end_time = 0.5;
    p.temporal.time_step_size = 0.01;
    p.spatial.degree = 3;
    let bd = BoundaryDescriptor::new().with_neumann(0, ConstantFunction(0.0)).with_neumann(1, ConstantFunction(0.0));
    let fields = FieldFunctions::default().with_initial_solution(ConstantFunction(1.0));
    let pde = ConvectionDiffusionOperator::new(Arc::new(uniform(8)), bd, fields, p).unwrap();
    let motion = PrescribedMeshMotion::new(
        uniform(8),
        |x: f64, t: f64| 0.05 * (PI * x).sin() * (2.0 * PI * t).sin(),
        |x: f64, t: f64| 0.1 * PI * (PI * x).sin() * (2.0 * PI * t).cos(),
    );
    let mut driver = Driver::new(pde, Box::new(())).unwrap().with_mesh_motion(Box::new(motion)).unwrap();
    driver.solve().unwrap();
    let solution = driver.integrator().solution();
    let deviation = solution.as_slice().iter().fold(0.0_f64, |m, u| m.max((u - 1.0).abs()));
    assert!(deviation < 1e-2, "deviation {deviation}");
}
