//! Unsteady driver.
//!
//! Each step runs, in this order: pre-solve of the integrator, mesh motion to the
//! end time of the step (moving meshes only), solve, post-solve, postprocessing.

use std::sync::Arc;

use log::info;

use crate::error::DgError;
use crate::functions::Function;
use crate::grid::LineGrid;
use crate::pde::ConvectionDiffusionOperator;
use crate::postprocessor::PostProcessor;
use crate::time_integration::{TimeIntegrator, create_time_integrator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Initialized,
    Stepping,
    Finished,
}

/// Source of the mesh at a given time.
pub trait MeshMotion {
    fn update(&mut self, time: f64) -> Result<Arc<LineGrid>, DgError>;
}

/// Vertices at `X + d(X, t)` moving with velocity `v(X, t)`, `X` the vertices of a
/// reference grid.
pub struct PrescribedMeshMotion {
    reference: LineGrid,
    displacement: Arc<dyn Function>,
    velocity: Arc<dyn Function>,
}

impl PrescribedMeshMotion {
    pub fn new(reference: LineGrid, displacement: impl Function + 'static, velocity: impl Function + 'static) -> Self {
        PrescribedMeshMotion { reference, displacement: Arc::new(displacement), velocity: Arc::new(velocity) }
    }
}

impl MeshMotion for PrescribedMeshMotion {
    fn update(&mut self, time: f64) -> Result<Arc<LineGrid>, DgError> {
        let vertices = self.reference.vertices();
        let positions = vertices.iter().map(|&x| x + self.displacement.value(x, time)).collect();
        let velocity = vertices.iter().map(|&x| self.velocity.value(x, time)).collect();
        let mut grid = self.reference.clone();
        grid.move_vertices(positions, velocity)?;
        Ok(Arc::new(grid))
    }
}

pub struct Driver {
    integrator: Box<dyn TimeIntegrator>,
    postprocessor: Box<dyn PostProcessor>,
    mesh_motion: Option<Box<dyn MeshMotion>>,
    state: DriverState,
}

impl Driver {
    /// Sets up the configured integrator and postprocesses the initial state.
    pub fn new(pde: ConvectionDiffusionOperator, postprocessor: Box<dyn PostProcessor>) -> Result<Self, DgError> {
        let mut integrator = create_time_integrator(pde)?;
        integrator.setup()?;
        let mut driver = Driver { integrator, postprocessor, mesh_motion: None, state: DriverState::Initialized };
        driver.postprocess(0)?;
        info!("unsteady driver ready at t = {:e}", driver.integrator.time());
        Ok(driver)
    }

    pub fn with_mesh_motion(mut self, mesh_motion: Box<dyn MeshMotion>) -> Result<Self, DgError> {
        if !self.integrator.pde().parameters().math_model.ale {
            return Err(DgError::Config("mesh motion requires the ALE formulation".to_string()));
        }
        self.mesh_motion = Some(mesh_motion);
        Ok(self)
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn integrator(&self) -> &dyn TimeIntegrator {
        self.integrator.as_ref()
    }

    fn postprocess(&mut self, step_number: usize) -> Result<(), DgError> {
        let time = self.integrator.time();
        self.postprocessor.do_postprocessing(self.integrator.solution(), time, step_number)
    }

    /// One step; does nothing once the run is finished.
    pub fn advance_one_timestep(&mut self) -> Result<(), DgError> {
        if self.state == DriverState::Finished || self.integrator.finished() {
            self.state = DriverState::Finished;
            return Ok(());
        }
        let ale = self.integrator.pde().parameters().math_model.ale;
        if ale && self.mesh_motion.is_none() {
            return Err(DgError::Config("ALE formulation without mesh motion".to_string()));
        }
        self.state = DriverState::Stepping;

        self.integrator.advance_one_timestep_pre_solve()?;
        if let Some(mesh_motion) = self.mesh_motion.as_mut() {
            let grid = mesh_motion.update(self.integrator.clock().next_time())?;
            self.integrator.ale_update(grid)?;
        }
        self.integrator.advance_one_timestep_solve()?;
        self.integrator.advance_one_timestep_post_solve()?;

        let step = self.integrator.clock().number_of_time_steps();
        self.postprocess(step)?;
        if self.integrator.finished() {
            self.state = DriverState::Finished;
            info!("finished after {} time steps at t = {:e}", step, self.integrator.time());
            if let Some(stats) = self.integrator.iterations() {
                stats.log_summary("linear solver");
            }
        }
        Ok(())
    }

    /// Steps until the end time or the step cap is reached.
    pub fn solve(&mut self) -> Result<(), DgError> {
        while self.state != DriverState::Finished {
            self.advance_one_timestep()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryDescriptor;
    use crate::config::{EquationType, Parameters};
    use crate::functions::{ConstantFunction, FieldFunctions};
    use crate::parallel::UniverseComm;

    #[test]
    fn prescribed_motion_moves_vertices() {
        let reference = LineGrid::new(0.0, 1.0, 4, Arc::new(UniverseComm::Serial)).unwrap();
        let mut motion =
            PrescribedMeshMotion::new(reference, |x: f64, t: f64| 0.1 * t * x, |x: f64, _t: f64| 0.1 * x);
        let grid = motion.update(2.0).unwrap();
        assert!((grid.vertices()[4] - 1.2).abs() < 1e-14);
        assert!((grid.cell_geometry(3).vertex_velocity[1] - 0.1).abs() < 1e-14);
    }

    #[test]
    fn run_reaches_finished_state() {
        let mut p = Parameters::default();
        p.math_model.equation_type = EquationType::Diffusion;
        p.physical_quantities.diffusivity = 0.1;
        p.physical_quantities.end_time = 0.05;
        p.temporal.time_step_size = 0.02;
        p.spatial.degree = 2;
        let grid = Arc::new(LineGrid::new(0.0, 1.0, 4, Arc::new(UniverseComm::Serial)).unwrap());
        let bd = BoundaryDescriptor::new().with_dirichlet(0, ConstantFunction(0.0)).with_dirichlet(1, ConstantFunction(0.0));
        let pde = ConvectionDiffusionOperator::new(grid, bd, FieldFunctions::default(), p).unwrap();
        let mut driver = Driver::new(pde, Box::new(())).unwrap();
        assert_eq!(driver.state(), DriverState::Initialized);
        driver.advance_one_timestep().unwrap();
        assert_eq!(driver.state(), DriverState::Stepping);
        driver.solve().unwrap();
        assert_eq!(driver.state(), DriverState::Finished);
        assert_eq!(driver.integrator().clock().number_of_time_steps(), 3);
        assert!((driver.integrator().time() - 0.05).abs() < 1e-14);
        assert_eq!(driver.integrator().iterations().map(|s| s.n_calls), Some(3));
    }

    #[test]
    fn motion_without_ale_is_rejected() {
        let mut p = Parameters::default();
        p.physical_quantities.diffusivity = 0.1;
        let grid = LineGrid::new(0.0, 1.0, 2, Arc::new(UniverseComm::Serial)).unwrap();
        let bd = BoundaryDescriptor::new().with_symmetry(0).with_symmetry(1);
        let pde = ConvectionDiffusionOperator::new(Arc::new(grid.clone()), bd, FieldFunctions::default(), p).unwrap();
        let driver = Driver::new(pde, Box::new(())).unwrap();
        let motion = PrescribedMeshMotion::new(grid, ConstantFunction(0.0), ConstantFunction(0.0));
        assert!(matches!(driver.with_mesh_motion(Box::new(motion)), Err(DgError::Config(_))));
    }
}
