//! Cubic reaction term `(v, c u³)` and its linearization `(v, 3 c ū² δu)`.

use crate::core::partitioner::CellRef;
use crate::error::DgError;
use crate::fe::{DofSpace, QUAD_OVERINTEGRATION};
use crate::operators::integrator::{CellEval, CellKernel};
use crate::operators::{Operator, OperatorContext, OperatorType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionForm {
    /// `c u³`, evaluated on the solution itself.
    Nonlinear,
    /// Derivative at the linearization point of the context.
    Linearized,
}

#[derive(Debug, Clone, Copy)]
pub struct ReactionKernel {
    coefficient: f64,
    form: ReactionForm,
}

impl ReactionKernel {
    pub fn new(coefficient: f64, form: ReactionForm) -> Self {
        ReactionKernel { coefficient, form }
    }

    pub fn linearized(&self) -> Self {
        ReactionKernel { form: ReactionForm::Linearized, ..*self }
    }

    pub fn form(&self) -> ReactionForm {
        self.form
    }
}

impl CellKernel for ReactionKernel {
    fn validate(&self, ctx: &OperatorContext<'_>) -> Result<(), DgError> {
        if self.form == ReactionForm::Linearized && ctx.linearization.is_none() {
            return Err(DgError::Config("linearized reaction term needs a linearization point".to_string()));
        }
        Ok(())
    }

    fn integrate(&self, eval: &CellEval<'_>, op_type: OperatorType, out: &mut [f64]) {
        if op_type == OperatorType::Inhomogeneous {
            return;
        }
        let shape = &eval.shapes[QUAD_OVERINTEGRATION];
        let linearization = eval.linearization.map(|l| l.cell(CellRef::Owned(eval.cell)));
        for q in 0..shape.n_q_points() {
            let u = shape.interpolate_at(eval.values, q);
            let term = match (self.form, linearization) {
                (ReactionForm::Linearized, Some(ubar)) => {
                    let ubar = shape.interpolate_at(ubar, q);
                    3.0 * self.coefficient * ubar * ubar * u
                }
                _ => self.coefficient * u * u * u,
            };
            let w = shape.weights()[q] * eval.geometry.jacobian * term;
            for (o, phi) in out.iter_mut().zip(shape.values_at(q)) {
                *o += w * phi;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReactionOperator {
    space: DofSpace,
    kernel: ReactionKernel,
}

impl ReactionOperator {
    pub fn new(space: DofSpace, kernel: ReactionKernel) -> Self {
        ReactionOperator { space, kernel }
    }

    pub fn kernel(&self) -> &ReactionKernel {
        &self.kernel
    }
}

impl Operator for ReactionOperator {
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
    use crate::parallel::UniverseComm;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn space() -> DofSpace {
        let grid = LineGrid::new(0.0, 1.0, 4, Arc::new(UniverseComm::Serial)).unwrap();
        DofSpace::new(Arc::new(grid), 2).unwrap()
    }

    #[test]
    fn linearization_is_the_derivative() {
        let space = space();
        let nonlinear = ReactionOperator::new(space.clone(), ReactionKernel::new(2.0, ReactionForm::Nonlinear));
        let linearized = ReactionOperator::new(space.clone(), nonlinear.kernel().linearized());

        let mut u = space.new_vector();
        space.interpolate(&|x: f64, _t: f64| 1.0 + x, 0.0, &mut u);
        let mut du = space.new_vector();
        space.interpolate(&|x: f64, _t: f64| x * x, 0.0, &mut du);

        let eps = 1e-6;
        let mut u_plus = u.clone();
        u_plus.axpy(eps, &du);
        let mut u_minus = u.clone();
        u_minus.axpy(-eps, &du);
        let ctx = OperatorContext::default();
        let (mut r_plus, mut r_minus) = (space.new_vector(), space.new_vector());
        nonlinear.evaluate(&mut r_plus, &u_plus, &ctx).unwrap();
        nonlinear.evaluate(&mut r_minus, &u_minus, &ctx).unwrap();

        let mut jdu = space.new_vector();
        linearized.apply(&mut jdu, &du, &ctx.with_linearization(Some(&u))).unwrap();
        for i in 0..jdu.len() {
            let fd = (r_plus.as_slice()[i] - r_minus.as_slice()[i]) / (2.0 * eps);
            assert_abs_diff_eq!(jdu.as_slice()[i], fd, epsilon = 1e-7);
        }
    }

    #[test]
    fn linearized_form_requires_a_linearization_point() {
        let space = space();
        let op = ReactionOperator::new(space.clone(), ReactionKernel::new(1.0, ReactionForm::Linearized));
        let u = space.new_vector();
        let mut dst = space.new_vector();
        assert!(op.apply(&mut dst, &u, &OperatorContext::default()).is_err());
    }
}
