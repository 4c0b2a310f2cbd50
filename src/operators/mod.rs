//! Matrix-free DG operators.
//!
//! An operator is a list of [`CellKernel`]s evaluated by the cell-centric loop in
//! [`integrator`]. Every operator separates the part that is linear in the solution
//! (`apply`, homogeneous boundary data) from the part that comes from prescribed data
//! (`rhs`, inhomogeneous boundary data and sources), with `evaluate = apply - rhs`.
//!
//! # References
//! - Kronbichler, Kormann (2012): A generic interface for parallel cell-based finite
//!   element operator application.
//! - Arnold, Brezzi, Cockburn, Marini (2002): Unified analysis of discontinuous
//!   Galerkin methods for elliptic problems.

pub mod combined;
pub mod convective;
pub mod diffusive;
pub mod integrator;
pub mod inverse_mass;
pub mod mass;
pub mod reaction;
pub mod rhs;
pub mod system;

pub use combined::{CombinedOperator, Terms};
pub use convective::{ConvectiveKernel, ConvectiveKernelData, ConvectiveOperator};
pub use diffusive::{DiffusiveKernel, DiffusiveKernelData, DiffusiveOperator};
pub use integrator::{CellEval, CellKernel, Exterior};
pub use inverse_mass::InverseMassOperator;
pub use mass::{MassKernel, MassOperator};
pub use reaction::{ReactionForm, ReactionKernel, ReactionOperator};
pub use rhs::{RhsKernel, RhsOperator};
pub use system::SystemOperator;

use crate::core::traits::DofVector;
use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::fe::DofSpace;
use integrator::{cell_blocks, cell_loop, check_layout, diagonal_of_blocks};

/// Which part of an affine operator `A(u) = A_h u + b` is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorType {
    /// `A_h u + b`
    Full,
    /// `A_h u`, boundary data and sources set to zero.
    Homogeneous,
    /// `b`, the solution set to zero.
    Inhomogeneous,
}

/// Evaluation time and external fields of one operator call.
#[derive(Debug, Clone, Copy)]
pub struct OperatorContext<'a> {
    pub time: f64,
    /// Factor in front of the mass term of combined operators.
    pub scaling_factor_mass: f64,
    /// Transport velocity when it is given as a DoF vector.
    pub velocity: Option<&'a DistributedVector>,
    /// Linearization point of linearized nonlinear terms.
    pub linearization: Option<&'a DistributedVector>,
}

impl Default for OperatorContext<'_> {
    fn default() -> Self {
        OperatorContext { time: 0.0, scaling_factor_mass: 1.0, velocity: None, linearization: None }
    }
}

impl<'a> OperatorContext<'a> {
    pub fn at_time(time: f64) -> Self {
        OperatorContext { time, ..Default::default() }
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    pub fn with_scaling_factor_mass(mut self, scaling: f64) -> Self {
        self.scaling_factor_mass = scaling;
        self
    }

    pub fn with_velocity(mut self, velocity: Option<&'a DistributedVector>) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_linearization(mut self, linearization: Option<&'a DistributedVector>) -> Self {
        self.linearization = linearization;
        self
    }
}

/// Common interface of the matrix-free operators.
///
/// Implementors provide their DoF space and kernels; the evaluation entry points are
/// shared. All of them are collective.
pub trait Operator {
    fn space(&self) -> &DofSpace;

    fn kernels(&self) -> Vec<&dyn integrator::CellKernel>;

    /// Recomputes geometry-dependent data after the grid has moved.
    fn update_after_mesh_movement(&mut self, space: &DofSpace);

    fn validate(&self, ctx: &OperatorContext<'_>) -> Result<(), DgError> {
        for kernel in self.kernels() {
            kernel.validate(ctx)?;
        }
        for v in [ctx.velocity, ctx.linearization].into_iter().flatten() {
            check_layout(self.space(), v)?;
        }
        Ok(())
    }

    /// `dst = A_h src`
    fn apply(&self, dst: &mut DistributedVector, src: &DistributedVector, ctx: &OperatorContext<'_>) -> Result<(), DgError> {
        dst.fill(0.0);
        self.apply_add(dst, src, ctx)
    }

    /// `dst += A_h src`
    fn apply_add(&self, dst: &mut DistributedVector, src: &DistributedVector, ctx: &OperatorContext<'_>) -> Result<(), DgError> {
        self.validate(ctx)?;
        check_layout(self.space(), src)?;
        check_layout(self.space(), dst)?;
        cell_loop(self.space(), &self.kernels(), Some(src), ctx, OperatorType::Homogeneous, 1.0, dst);
        Ok(())
    }

    /// `dst = -b`
    fn rhs(&self, dst: &mut DistributedVector, ctx: &OperatorContext<'_>) -> Result<(), DgError> {
        dst.fill(0.0);
        self.rhs_add(dst, ctx)
    }

    /// `dst += -b`
    fn rhs_add(&self, dst: &mut DistributedVector, ctx: &OperatorContext<'_>) -> Result<(), DgError> {
        self.validate(ctx)?;
        check_layout(self.space(), dst)?;
        cell_loop(self.space(), &self.kernels(), None, ctx, OperatorType::Inhomogeneous, -1.0, dst);
        Ok(())
    }

    /// `dst = A_h src + b`
    fn evaluate(&self, dst: &mut DistributedVector, src: &DistributedVector, ctx: &OperatorContext<'_>) -> Result<(), DgError> {
        dst.fill(0.0);
        self.evaluate_add(dst, src, ctx)
    }

    /// `dst += A_h src + b`
    fn evaluate_add(&self, dst: &mut DistributedVector, src: &DistributedVector, ctx: &OperatorContext<'_>) -> Result<(), DgError> {
        self.validate(ctx)?;
        check_layout(self.space(), src)?;
        check_layout(self.space(), dst)?;
        cell_loop(self.space(), &self.kernels(), Some(src), ctx, OperatorType::Full, 1.0, dst);
        Ok(())
    }

    /// Diagonal of `A_h`.
    fn calculate_diagonal(&self, ctx: &OperatorContext<'_>) -> Result<DistributedVector, DgError> {
        self.validate(ctx)?;
        let n = self.space().dofs_per_cell();
        let blocks = cell_blocks(self.space(), &self.kernels(), ctx);
        let mut diagonal = self.space().new_vector();
        diagonal_of_blocks(n, &blocks, diagonal.as_mut_slice());
        Ok(diagonal)
    }

    /// Cell-wise diagonal blocks of `A_h`, column-major, one after another.
    fn calculate_block_diagonal(&self, ctx: &OperatorContext<'_>) -> Result<Vec<f64>, DgError> {
        self.validate(ctx)?;
        Ok(cell_blocks(self.space(), &self.kernels(), ctx))
    }
}
