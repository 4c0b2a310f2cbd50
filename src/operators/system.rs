//! Linear-system view of a [`CombinedOperator`] at a fixed evaluation state.

use std::sync::Arc;

use crate::core::traits::{BlockDiagonalProvider, DiagonalProvider, DofVector, MatVec};
use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::fe::DofSpace;
use crate::operators::combined::CombinedOperator;
use crate::operators::integrator::{cell_blocks, cell_loop, diagonal_of_blocks};
use crate::operators::{Operator, OperatorContext, OperatorType};

/// Owns the time, mass scaling and external fields of one solve, so Krylov solvers
/// and preconditioners can hold it without borrowing from the caller.
#[derive(Clone)]
pub struct SystemOperator {
    operator: Arc<CombinedOperator>,
    time: f64,
    scaling_factor_mass: f64,
    velocity: Option<DistributedVector>,
    linearization: Option<DistributedVector>,
}

impl std::fmt::Debug for SystemOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemOperator")
            .field("terms", &self.operator.terms())
            .field("time", &self.time)
            .field("scaling_factor_mass", &self.scaling_factor_mass)
            .finish()
    }
}

impl SystemOperator {
    /// Snapshot of `ctx`; fails when the operator cannot be evaluated with it.
    pub fn new(operator: Arc<CombinedOperator>, ctx: &OperatorContext<'_>) -> Result<Self, DgError> {
        operator.validate(ctx)?;
        Ok(SystemOperator {
            operator,
            time: ctx.time,
            scaling_factor_mass: ctx.scaling_factor_mass,
            velocity: ctx.velocity.cloned(),
            linearization: ctx.linearization.cloned(),
        })
    }

    pub fn context(&self) -> OperatorContext<'_> {
        OperatorContext {
            time: self.time,
            scaling_factor_mass: self.scaling_factor_mass,
            velocity: self.velocity.as_ref(),
            linearization: self.linearization.as_ref(),
        }
    }

    pub fn operator(&self) -> &Arc<CombinedOperator> {
        &self.operator
    }

    pub fn space(&self) -> &DofSpace {
        self.operator.space()
    }

    pub fn velocity(&self) -> Option<&DistributedVector> {
        self.velocity.as_ref()
    }

    pub fn linearization(&self) -> Option<&DistributedVector> {
        self.linearization.as_ref()
    }

    /// Same state on another operator, used for the levels of a multigrid hierarchy.
    pub fn on_level(
        &self,
        operator: Arc<CombinedOperator>,
        velocity: Option<DistributedVector>,
        linearization: Option<DistributedVector>,
    ) -> Self {
        SystemOperator {
            operator,
            time: self.time,
            scaling_factor_mass: self.scaling_factor_mass,
            velocity,
            linearization,
        }
    }

    pub fn new_vector(&self) -> DistributedVector {
        self.space().new_vector()
    }
}

impl MatVec<DistributedVector> for SystemOperator {
    fn matvec(&self, x: &DistributedVector, y: &mut DistributedVector) {
        y.fill(0.0);
        let ctx = self.context();
        cell_loop(self.space(), &self.operator.kernels(), Some(x), &ctx, OperatorType::Homogeneous, 1.0, y);
    }
}

impl DiagonalProvider<DistributedVector> for SystemOperator {
    fn diagonal(&self) -> Result<DistributedVector, DgError> {
        let n = self.space().dofs_per_cell();
        let blocks = cell_blocks(self.space(), &self.operator.kernels(), &self.context());
        let mut diagonal = self.new_vector();
        diagonal_of_blocks(n, &blocks, diagonal.as_mut_slice());
        Ok(diagonal)
    }
}

impl BlockDiagonalProvider for SystemOperator {
    fn block_diagonal(&self) -> Result<(usize, Vec<f64>), DgError> {
        let n = self.space().dofs_per_cell();
        Ok((n, cell_blocks(self.space(), &self.operator.kernels(), &self.context())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryDescriptor;
    use crate::functions::ConstantFunction;
    use crate::grid::LineGrid;
    use crate::operators::diffusive::{DiffusiveKernel, DiffusiveKernelData};
    use crate::operators::reaction::{ReactionForm, ReactionKernel};
    use crate::operators::Terms;
    use crate::parallel::UniverseComm;
    use approx::assert_abs_diff_eq;

    #[test]
    fn system_operator_matches_operator_apply() {
        let grid = LineGrid::new(0.0, 1.0, 3, Arc::new(UniverseComm::Serial)).unwrap();
        let space = DofSpace::new(Arc::new(grid), 2).unwrap();
        let bd = Arc::new(BoundaryDescriptor::new().with_symmetry(0).with_symmetry(1));
        let diffusive = DiffusiveKernel::new(DiffusiveKernelData { diffusivity: 1.0, ip_factor: 1.0 }, bd);
        let reaction = ReactionKernel::new(1.0, ReactionForm::Linearized);
        let op = Arc::new(
            CombinedOperator::new(space.clone(), Terms::MASS | Terms::DIFFUSION | Terms::REACTION, None, Some(diffusive), Some(reaction))
                .unwrap(),
        );

        let mut ubar = space.new_vector();
        ubar.fill(2.0);
        assert!(SystemOperator::new(Arc::clone(&op), &OperatorContext::default()).is_err());

        let ctx = OperatorContext::default().with_scaling_factor_mass(4.0).with_linearization(Some(&ubar));
        let system = SystemOperator::new(Arc::clone(&op), &ctx).unwrap();
        drop(ubar);

        let mut x = space.new_vector();
        space.interpolate(&|x: f64, _t: f64| x * (1.0 - x), 0.0, &mut x);
        let mut y = space.new_vector();
        system.matvec(&x, &mut y);
        let mut expected = space.new_vector();
        op.apply(&mut expected, &x, &system.context()).unwrap();
        y.axpy(-1.0, &expected);
        assert_abs_diff_eq!(y.norm(), 0.0, epsilon = 1e-13);

        let diagonal = system.diagonal().unwrap();
        let (n, blocks) = system.block_diagonal().unwrap();
        assert_eq!(n, 3);
        assert_abs_diff_eq!(diagonal.as_slice()[4], blocks[9 + 4], epsilon = 1e-15);
    }
}
