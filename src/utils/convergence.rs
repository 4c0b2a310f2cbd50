//! Convergence tracking & tolerance checks for iterative solvers.

use num_traits::Float;

/// Stopping criteria: converged once `‖r‖ ≤ max(abs_tol, rel_tol·‖r₀‖)`.
#[derive(Debug, Clone, Copy)]
pub struct Convergence<T> {
    pub abs_tol: T,
    pub rel_tol: T,
    pub max_iters: usize,
}

#[derive(Clone, Debug)]
pub struct SolveStats<T> {
    pub iterations: usize,
    pub initial_residual: T,
    pub final_residual: T,
    pub converged: bool,
}

impl<T: Float> SolveStats<T> {
    /// Stats of a solve that ended before the first iteration.
    pub fn initial(residual: T, converged: bool) -> Self {
        SolveStats { iterations: 0, initial_residual: residual, final_residual: residual, converged }
    }
}

impl<T: Float> Convergence<T> {
    pub fn new(abs_tol: T, rel_tol: T, max_iters: usize) -> Self {
        Convergence { abs_tol, rel_tol, max_iters }
    }

    pub fn threshold(&self, res0_norm: T) -> T {
        self.abs_tol.max(self.rel_tol * res0_norm)
    }

    pub fn is_converged(&self, res_norm: T, res0_norm: T) -> bool {
        res_norm <= self.threshold(res0_norm)
    }

    /// Returns (should_stop, stats) given current `res_norm` and iteration `i`.
    ///
    /// Reaching `max_iters` stops the iteration without marking it converged.
    pub fn check(&self, res_norm: T, res0_norm: T, i: usize) -> (bool, SolveStats<T>) {
        let converged = self.is_converged(res_norm, res0_norm);
        (
            converged || i >= self.max_iters,
            SolveStats { iterations: i, initial_residual: res0_norm, final_residual: res_norm, converged },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_or_relative_tolerance() {
        let conv = Convergence::new(1e-10, 1e-3, 50);
        assert!(conv.is_converged(0.9e-3, 1.0));
        assert!(!conv.is_converged(2e-10, 1e-8));
        assert!(conv.is_converged(1e-10, 1e-12));
        let (stop, stats) = conv.check(1.0, 2.0, 50);
        assert!(stop);
        assert!(!stats.converged);
    }
}
