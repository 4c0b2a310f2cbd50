//! Mass term `(v, s u)` with the scaling factor of the operator context.

use crate::fe::{DofSpace, QUAD_STANDARD};
use crate::operators::integrator::{CellEval, CellKernel};
use crate::operators::{Operator, OperatorType};

#[derive(Debug, Clone, Copy, Default)]
pub struct MassKernel;

impl CellKernel for MassKernel {
    fn integrate(&self, eval: &CellEval<'_>, op_type: OperatorType, out: &mut [f64]) {
        if op_type == OperatorType::Inhomogeneous {
            return;
        }
        let shape = &eval.shapes[QUAD_STANDARD];
        let scale = eval.scaling_factor_mass * eval.geometry.jacobian;
        for q in 0..shape.n_q_points() {
            let u = shape.interpolate_at(eval.values, q);
            let w = shape.weights()[q] * scale * u;
            for (o, phi) in out.iter_mut().zip(shape.values_at(q)) {
                *o += w * phi;
            }
        }
    }
}

/// Standalone mass operator, used for the BDF history and explicit stages.
#[derive(Debug, Clone)]
pub struct MassOperator {
    space: DofSpace,
    kernel: MassKernel,
}

impl MassOperator {
    pub fn new(space: DofSpace) -> Self {
        MassOperator { space, kernel: MassKernel }
    }
}

impl Operator for MassOperator {
    fn space(&self) -> &DofSpace {
        &self.space
    }

    fn kernels(&self) -> Vec<&dyn CellKernel> {
        vec![&self.kernel]
    }

    fn update_after_mesh_movement(&mut self, space: &DofSpace) {
        self.space = space.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::DofVector;
    use crate::grid::LineGrid;
    use crate::operators::OperatorContext;
    use crate::parallel::UniverseComm;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    #[test]
    fn mass_of_constant_is_cell_measure() {
        let grid = LineGrid::new(0.0, 3.0, 3, Arc::new(UniverseComm::Serial)).unwrap();
        let space = DofSpace::new(Arc::new(grid), 2).unwrap();
        let op = MassOperator::new(space.clone());
        let mut ones = space.new_vector();
        ones.fill(1.0);
        let mut dst = space.new_vector();
        op.apply(&mut dst, &ones, &OperatorContext::default()).unwrap();
        // (1, 1) over the domain
        assert_abs_diff_eq!(dst.as_slice().iter().sum::<f64>(), 3.0, epsilon = 1e-13);

        let ctx = OperatorContext::default().with_scaling_factor_mass(2.0);
        op.apply(&mut dst, &ones, &ctx).unwrap();
        assert_abs_diff_eq!(dst.as_slice().iter().sum::<f64>(), 6.0, epsilon = 1e-13);

        op.rhs(&mut dst, &ctx).unwrap();
        assert_eq!(dst.norm(), 0.0);
    }
}
