//! Output hooks called by the drivers after every accepted step.

use std::sync::Arc;

use log::info;

use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::fe::DofSpace;
use crate::functions::Function;

/// Consumer of the solution after the initial state and after every step.
///
/// `time` is the simulated time, or the load factor for load stepping.
pub trait PostProcessor<V = DistributedVector> {
    fn do_postprocessing(&mut self, solution: &V, time: f64, step_number: usize) -> Result<(), DgError>;
}

/// Discards everything.
impl<V> PostProcessor<V> for () {
    fn do_postprocessing(&mut self, _solution: &V, _time: f64, _step_number: usize) -> Result<(), DgError> {
        Ok(())
    }
}

/// Records the L² error against an analytical solution on a fixed mesh.
pub struct ErrorCalculator {
    space: DofSpace,
    exact: Arc<dyn Function>,
    errors: Vec<(f64, f64)>,
}

impl ErrorCalculator {
    pub fn new(space: DofSpace, exact: impl Function + 'static) -> Self {
        ErrorCalculator { space, exact: Arc::new(exact), errors: Vec::new() }
    }

    /// `(time, ‖u_h - u‖)` after each call.
    pub fn errors(&self) -> &[(f64, f64)] {
        &self.errors
    }

    pub fn last_error(&self) -> Option<f64> {
        self.errors.last().map(|&(_, e)| e)
    }
}

impl PostProcessor for ErrorCalculator {
    fn do_postprocessing(&mut self, solution: &DistributedVector, time: f64, step_number: usize) -> Result<(), DgError> {
        solution.check_compatible(&self.space.new_vector())?;
        let error = self.space.l2_error(solution, self.exact.as_ref(), time);
        info!("step {step_number}, t = {time:.6e}: L2 error {error:.6e}");
        self.errors.push((time, error));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::LineGrid;
    use crate::parallel::UniverseComm;

    #[test]
    fn error_of_the_interpolant_is_recorded() {
        let grid = LineGrid::new(0.0, 1.0, 4, Arc::new(UniverseComm::Serial)).unwrap();
        let space = DofSpace::new(Arc::new(grid), 2).unwrap();
        let exact = |x: f64, t: f64| x * x + t;
        let mut u = space.new_vector();
        space.interpolate(&exact, 0.5, &mut u);
        let mut pp = ErrorCalculator::new(space, exact);
        pp.do_postprocessing(&u, 0.5, 3).unwrap();
        assert_eq!(pp.errors().len(), 1);
        assert!(pp.last_error().unwrap() < 1e-12);
        PostProcessor::<DistributedVector>::do_postprocessing(&mut (), &u, 0.0, 0).unwrap();
    }
}
