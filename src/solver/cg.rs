//! Preconditioned Conjugate Gradient (PCG) per Saad §9.2
//!
//! Stops on the unpreconditioned residual norm. A non-positive curvature `pᵀAp`
//! aborts with [`DgError::IndefiniteMatrix`].
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems, 2nd Edition. SIAM. §9.2

use log::trace;

use crate::core::traits::{DofVector, MatVec};
use crate::error::DgError;
use crate::preconditioner::Preconditioner;
use crate::solver::{LinearSolver, precondition, residual};
use crate::utils::convergence::{Convergence, SolveStats};

pub struct CgSolver {
    pub conv: Convergence<f64>,
}

impl CgSolver {
    pub fn new(abs_tol: f64, rel_tol: f64, max_iters: usize) -> Self {
        Self { conv: Convergence::new(abs_tol, rel_tol, max_iters) }
    }
}

impl<M, V> LinearSolver<M, V> for CgSolver
where
    M: MatVec<V>,
    V: DofVector,
{
    fn solve(&mut self, a: &M, pc: Option<&dyn Preconditioner<M, V>>, b: &V, x: &mut V) -> Result<SolveStats<f64>, DgError> {
        let mut r = b.zeros_like();
        residual(a, b, x, &mut r);
        let res0 = r.norm();
        let mut stats = SolveStats::initial(res0, self.conv.is_converged(res0, res0));
        if stats.converged {
            return Ok(stats);
        }
        let mut z = b.zeros_like();
        precondition(pc, &r, &mut z)?;
        let mut p = z.clone();
        let mut ap = b.zeros_like();
        let mut rz = r.dot(&z);
        for i in 1..=self.conv.max_iters {
            a.matvec(&p, &mut ap);
            let p_dot_ap = p.dot(&ap);
            if p_dot_ap <= 0.0 {
                return Err(DgError::IndefiniteMatrix);
            }
            let alpha = rz / p_dot_ap;
            x.axpy(alpha, &p);
            r.axpy(-alpha, &ap);
            let res_norm = r.norm();
            trace!("cg iteration {i}: residual {res_norm:e}");
            let (stop, s) = self.conv.check(res_norm, res0, i);
            stats = s;
            if stop {
                break;
            }
            precondition(pc, &r, &mut z)?;
            let rz_new = r.dot(&z);
            p.aypx(rz_new / rz, &z);
            rz = rz_new;
        }
        Ok(stats)
    }
}
