//! Source term `(v, f)`.

use std::sync::Arc;

use crate::fe::{DofSpace, QUAD_OVERINTEGRATION};
use crate::functions::Function;
use crate::operators::integrator::{CellEval, CellKernel};
use crate::operators::{Operator, OperatorType};

/// Source term. It carries no homogeneous part; its inhomogeneous part is `-(v, f)`,
/// so [`Operator::rhs`] yields `+(v, f)`.
#[derive(Clone)]
pub struct RhsKernel {
    f: Arc<dyn Function>,
}

impl RhsKernel {
    pub fn new(f: Arc<dyn Function>) -> Self {
        RhsKernel { f }
    }
}

impl CellKernel for RhsKernel {
    fn integrate(&self, eval: &CellEval<'_>, op_type: OperatorType, out: &mut [f64]) {
        if op_type == OperatorType::Homogeneous {
            return;
        }
        let shape = &eval.shapes[QUAD_OVERINTEGRATION];
        let geometry = eval.geometry;
        for (q, &xi) in shape.points().iter().enumerate() {
            let f = self.f.value(geometry.map(xi), eval.time);
            let w = shape.weights()[q] * geometry.jacobian * f;
            for (o, phi) in out.iter_mut().zip(shape.values_at(q)) {
                *o -= w * phi;
            }
        }
    }
}

#[derive(Clone)]
pub struct RhsOperator {
    space: DofSpace,
    kernel: RhsKernel,
}

impl RhsOperator {
    pub fn new(space: DofSpace, f: Arc<dyn Function>) -> Self {
        RhsOperator { space, kernel: RhsKernel::new(f) }
    }
}

impl Operator for RhsOperator {
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

    #[test]
    fn rhs_integrates_the_source() {
        let grid = LineGrid::new(0.0, 1.0, 4, Arc::new(UniverseComm::Serial)).unwrap();
        let space = DofSpace::new(Arc::new(grid), 2).unwrap();
        let op = RhsOperator::new(space.clone(), Arc::new(|x: f64, t: f64| t * x));
        let mut dst = space.new_vector();
        op.rhs(&mut dst, &OperatorContext::at_time(2.0)).unwrap();
        // ∫ 2x dx over [0, 1]
        assert_abs_diff_eq!(dst.as_slice().iter().sum::<f64>(), 1.0, epsilon = 1e-13);

        // no dependence on the solution
        let mut u = space.new_vector();
        u.fill(3.0);
        let mut au = space.new_vector();
        op.apply(&mut au, &u, &OperatorContext::default()).unwrap();
        assert_eq!(au.norm(), 0.0);
    }
}
