//! Generalized Minimal Residual (GMRES) solver with fixed restart (Saad §6.4)
//!
//! Right preconditioning, so the least-squares residual is the true residual of the
//! unpreconditioned system and the stopping test needs no extra products. The
//! Arnoldi process uses modified Gram–Schmidt with one reorthogonalization pass,
//! Givens rotations update the least-squares problem, and a happy breakdown ends the
//! cycle early.
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems, 2nd Edition. SIAM. §6.4
//! - Saad, Y. (1993). A flexible inner-outer preconditioned GMRES algorithm.

use log::trace;

use crate::core::traits::{DofVector, MatVec};
use crate::error::DgError;
use crate::preconditioner::Preconditioner;
use crate::solver::{LinearSolver, precondition, residual};
use crate::utils::convergence::{Convergence, SolveStats};

/// GMRES solver struct with restart.
pub struct GmresSolver {
    /// Number of Arnoldi vectors before restart
    pub restart: usize,
    pub conv: Convergence<f64>,
}

impl GmresSolver {
    pub fn new(restart: usize, abs_tol: f64, rel_tol: f64, max_iters: usize) -> Self {
        Self { restart: restart.max(1), conv: Convergence::new(abs_tol, rel_tol, max_iters) }
    }
}

/// Apply previous Givens rotations to column `j` of `h`, compute the new one and
/// update `g`.
fn apply_givens_and_update_g(h: &mut [Vec<f64>], g: &mut [f64], cs: &mut [f64], sn: &mut [f64], j: usize) {
    for i in 0..j {
        let temp = cs[i] * h[i][j] + sn[i] * h[i + 1][j];
        h[i + 1][j] = -sn[i] * h[i][j] + cs[i] * h[i + 1][j];
        h[i][j] = temp;
    }
    let h_kk = h[j][j];
    let h_k1k = h[j + 1][j];
    let r = h_kk.hypot(h_k1k);
    if r == 0.0 {
        cs[j] = 1.0;
        sn[j] = 0.0;
    } else {
        cs[j] = h_kk / r;
        sn[j] = h_k1k / r;
    }
    h[j][j] = cs[j] * h_kk + sn[j] * h_k1k;
    h[j + 1][j] = 0.0;
    let temp = cs[j] * g[j] + sn[j] * g[j + 1];
    g[j + 1] = -sn[j] * g[j] + cs[j] * g[j + 1];
    g[j] = temp;
}

/// Solve the upper-triangular system `H y = g`, skipping zero pivots.
fn back_substitution(h: &[Vec<f64>], g: &[f64], m: usize) -> Vec<f64> {
    let mut y = vec![0.0; m];
    for i in (0..m).rev() {
        let mut s = g[i];
        for j in (i + 1)..m {
            s -= h[i][j] * y[j];
        }
        y[i] = if h[i][i] != 0.0 { s / h[i][i] } else { 0.0 };
    }
    y
}

/// Restarted right-preconditioned GMRES. With `flexible` the preconditioned
/// directions `z_j = M⁻¹ v_j` are stored, so the preconditioner may vary between
/// iterations (FGMRES); otherwise `M⁻¹` is applied once more per cycle.
pub(crate) fn restarted<M, V>(
    a: &M,
    pc: Option<&dyn Preconditioner<M, V>>,
    b: &V,
    x: &mut V,
    restart: usize,
    conv: &Convergence<f64>,
    flexible: bool,
) -> Result<SolveStats<f64>, DgError>
where
    M: MatVec<V>,
    V: DofVector,
{
    let mut r = b.zeros_like();
    residual(a, b, x, &mut r);
    let res0 = r.norm();
    let mut stats = SolveStats::initial(res0, conv.is_converged(res0, res0));
    if stats.converged {
        return Ok(stats);
    }
    let breakdown = 1e-14 * res0;
    let mut beta = res0;
    let mut iteration = 0;
    while iteration < conv.max_iters {
        let mut v_basis: Vec<V> = Vec::with_capacity(restart + 1);
        let mut z_basis: Vec<V> = Vec::with_capacity(if flexible { restart } else { 0 });
        let mut v0 = r.clone();
        v0.scale(1.0 / beta);
        v_basis.push(v0);

        let mut h = vec![vec![0.0; restart]; restart + 1];
        let mut g = vec![0.0; restart + 1];
        g[0] = beta;
        let mut cs = vec![0.0; restart];
        let mut sn = vec![0.0; restart];
        let mut m = 0;
        for j in 0..restart {
            if iteration >= conv.max_iters {
                break;
            }
            iteration += 1;
            let mut z = b.zeros_like();
            precondition(pc, &v_basis[j], &mut z)?;
            let mut w = b.zeros_like();
            a.matvec(&z, &mut w);
            if flexible {
                z_basis.push(z);
            }
            // modified Gram-Schmidt, twice
            for _ in 0..2 {
                for i in 0..=j {
                    let hij = w.dot(&v_basis[i]);
                    h[i][j] += hij;
                    w.axpy(-hij, &v_basis[i]);
                }
            }
            h[j + 1][j] = w.norm();
            let happy_breakdown = h[j + 1][j] <= breakdown;
            if !happy_breakdown {
                w.scale(1.0 / h[j + 1][j]);
                v_basis.push(w);
            }
            apply_givens_and_update_g(&mut h, &mut g, &mut cs, &mut sn, j);
            m = j + 1;
            let res_norm = g[j + 1].abs();
            trace!("gmres iteration {iteration}: residual {res_norm:e}");
            if conv.is_converged(res_norm, res0) || happy_breakdown {
                break;
            }
        }

        let y = back_substitution(&h, &g, m);
        if flexible {
            for (yj, zj) in y.iter().zip(&z_basis) {
                x.axpy(*yj, zj);
            }
        } else {
            let mut u = b.zeros_like();
            for (yj, vj) in y.iter().zip(&v_basis) {
                u.axpy(*yj, vj);
            }
            let mut z = b.zeros_like();
            precondition(pc, &u, &mut z)?;
            x.axpy(1.0, &z);
        }

        residual(a, b, x, &mut r);
        beta = r.norm();
        stats = SolveStats {
            iterations: iteration,
            initial_residual: res0,
            final_residual: beta,
            converged: conv.is_converged(beta, res0),
        };
        if stats.converged || beta == 0.0 {
            break;
        }
    }
    Ok(stats)
}

impl<M, V> LinearSolver<M, V> for GmresSolver
where
    M: MatVec<V>,
    V: DofVector,
{
    fn solve(&mut self, a: &M, pc: Option<&dyn Preconditioner<M, V>>, b: &V, x: &mut V) -> Result<SolveStats<f64>, DgError> {
        restarted(a, pc, b, x, self.restart, &self.conv, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::Jacobi;
    use faer::Mat;

    fn nonsymmetric() -> Mat<f64> {
        let data = [
            [4.0, 1.0, 0.0, 0.0],
            [1.0, 3.0, 1.0, 0.0],
            [0.0, -1.0, 2.0, 1.0],
            [0.5, 0.0, 1.0, 3.0],
        ];
        Mat::from_fn(4, 4, |i, j| data[i][j])
    }

    #[test]
    fn gmres_solves_well_conditioned_nonsym() {
        let a = nonsymmetric();
        let x_true = vec![1.0, 2.0, 3.0, 4.0];
        let mut b = vec![0.0; 4];
        a.matvec(&x_true, &mut b);
        let mut x = vec![0.0; 4];
        let mut solver = GmresSolver::new(4, 1e-14, 1e-12, 100);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        assert!(stats.converged, "GMRES did not converge");
        for (xi, ei) in x.iter().zip(x_true.iter()) {
            assert!((xi - ei).abs() < 1e-9, "xi = {}, expected = {}", xi, ei);
        }
    }

    #[test]
    fn restarted_gmres_with_jacobi_preconditioner() {
        let n = 30;
        let a = Mat::from_fn(n, n, |i, j| {
            if i == j {
                2.0 + i as f64
            } else if j == i + 1 {
                -1.2
            } else if i == j + 1 {
                -0.8
            } else {
                0.0
            }
        });
        let b = vec![1.0; n];
        let mut pc = Jacobi::new();
        Preconditioner::<Mat<f64>, Vec<f64>>::setup(&mut pc, &a).unwrap();
        let mut x = vec![0.0; n];
        let mut solver = GmresSolver::new(5, 1e-14, 1e-10, 500);
        let stats = solver.solve(&a, Some(&pc), &b, &mut x).unwrap();
        assert!(stats.converged);
        let mut ax = vec![0.0; n];
        a.matvec(&x, &mut ax);
        let res: f64 = ax.iter().zip(&b).map(|(p, q)| (p - q).powi(2)).sum::<f64>().sqrt();
        assert!(res <= 1e-10 * (n as f64).sqrt() * 1.01);
    }

    #[test]
    fn iteration_cap_is_not_convergence() {
        let a = nonsymmetric();
        let b = vec![1.0, -1.0, 2.0, 0.5];
        let mut x = vec![0.0; 4];
        let mut solver = GmresSolver::new(2, 0.0, 1e-15, 1);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        assert_eq!(stats.iterations, 1);
        assert!(!stats.converged);
    }
}
