//! Krylov and Newton solver interfaces.

use crate::core::traits::DofVector;
use crate::error::DgError;
use crate::preconditioner::Preconditioner;
use crate::utils::convergence::SolveStats;

/// Common interface of the Krylov solvers.
pub trait LinearSolver<M, V> {
    /// Solve A·x = b, writing result into `x` (which holds the initial guess).
    /// Returns iteration stats (including convergence info).
    fn solve(
        &mut self,
        a: &M,
        pc: Option<&dyn Preconditioner<M, V>>,
        b: &V,
        x: &mut V,
    ) -> Result<SolveStats<f64>, DgError>;
}

/// `z = M⁻¹ r`, or a copy of `r` without preconditioner.
pub(crate) fn precondition<M, V: DofVector>(
    pc: Option<&dyn Preconditioner<M, V>>,
    r: &V,
    z: &mut V,
) -> Result<(), DgError> {
    match pc {
        Some(pc) => pc.apply(r, z),
        None => {
            z.copy_from(r);
            Ok(())
        }
    }
}

/// `r = b - A x`
pub(crate) fn residual<M: crate::core::traits::MatVec<V>, V: DofVector>(a: &M, b: &V, x: &V, r: &mut V) {
    a.matvec(x, r);
    r.aypx(-1.0, b);
}

pub mod cg;
pub use cg::CgSolver;

pub mod gmres;
pub use gmres::GmresSolver;

pub mod fgmres;
pub use fgmres::FgmresSolver;

pub mod newton;
pub use newton::{NewtonOutcome, NewtonSolver, NewtonStats, NonlinearProblem};
