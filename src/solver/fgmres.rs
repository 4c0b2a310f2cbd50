//! Flexible GMRES (FGMRES) solver (Saad §9.4)
//!
//! Stores the preconditioned directions, so the preconditioner may change from one
//! iteration to the next, for example a multigrid cycle with an inexact Krylov
//! coarse-grid solve.
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems, 2nd Edition. SIAM. §9.4

use crate::core::traits::{DofVector, MatVec};
use crate::error::DgError;
use crate::preconditioner::Preconditioner;
use crate::solver::LinearSolver;
use crate::solver::gmres::restarted;
use crate::utils::convergence::{Convergence, SolveStats};

pub struct FgmresSolver {
    pub conv: Convergence<f64>,
    /// Restart parameter (number of Arnoldi vectors before restart)
    pub restart: usize,
}

impl FgmresSolver {
    pub fn new(restart: usize, abs_tol: f64, rel_tol: f64, max_iters: usize) -> Self {
        Self { conv: Convergence::new(abs_tol, rel_tol, max_iters), restart: restart.max(1) }
    }
}

impl<M, V> LinearSolver<M, V> for FgmresSolver
where
    M: MatVec<V>,
    V: DofVector,
{
    fn solve(&mut self, a: &M, pc: Option<&dyn Preconditioner<M, V>>, b: &V, x: &mut V) -> Result<SolveStats<f64>, DgError> {
        restarted(a, pc, b, x, self.restart, &self.conv, true)
    }
}
