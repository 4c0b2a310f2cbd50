//! Newton's method for `R(u) = 0` with an inexact (Krylov) inner solve.

use log::debug;

use crate::config::NewtonSolverData;
use crate::core::traits::DofVector;
use crate::error::DgError;

/// A nonlinear system together with a solver for its linearization.
pub trait NonlinearProblem<V> {
    /// `r = R(x)`
    fn evaluate_residual(&mut self, x: &V, r: &mut V) -> Result<(), DgError>;

    /// Solves `J(x_lin) dx = rhs` and returns the number of linear iterations.
    ///
    /// `update_preconditioner` asks for the preconditioner to be rebuilt at `x_lin`.
    fn solve_linearized(&mut self, x_lin: &V, rhs: &V, dx: &mut V, update_preconditioner: bool) -> Result<usize, DgError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonStats {
    pub newton_iterations: usize,
    pub linear_iterations: usize,
    pub residual: f64,
}

/// Result of a Newton solve that did not fail in a sub-step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NewtonOutcome {
    Converged(NewtonStats),
    /// Iteration cap reached or residual no longer finite.
    Diverged(NewtonStats),
}

impl NewtonOutcome {
    pub fn stats(&self) -> &NewtonStats {
        match self {
            NewtonOutcome::Converged(s) | NewtonOutcome::Diverged(s) => s,
        }
    }

    pub fn converged(&self) -> bool {
        matches!(self, NewtonOutcome::Converged(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewtonSolver {
    pub settings: NewtonSolverData,
}

impl NewtonSolver {
    pub fn new(settings: NewtonSolverData) -> Self {
        NewtonSolver { settings }
    }

    /// Iterates `x ← x + dx` with `J(x) dx = -R(x)` until
    /// `‖R(x)‖ ≤ max(abs_tol, rel_tol·‖R(x₀)‖)`.
    pub fn solve<V, P>(&self, problem: &mut P, x: &mut V) -> Result<NewtonOutcome, DgError>
    where
        V: DofVector,
        P: NonlinearProblem<V>,
    {
        let s = &self.settings;
        let mut r = x.zeros_like();
        problem.evaluate_residual(x, &mut r)?;
        let res0 = r.norm();
        let threshold = s.abs_tol.max(s.rel_tol * res0);
        let mut stats = NewtonStats { newton_iterations: 0, linear_iterations: 0, residual: res0 };
        let every = s.update_preconditioner_every_newton_iterations.max(1);

        let mut rhs = x.zeros_like();
        let mut dx = x.zeros_like();
        while stats.residual.is_finite() && stats.residual > threshold && stats.newton_iterations < s.max_iter {
            let update = s.update_preconditioner && stats.newton_iterations % every == 0;
            rhs.copy_from(&r);
            rhs.scale(-1.0);
            dx.fill(0.0);
            stats.linear_iterations += problem.solve_linearized(x, &rhs, &mut dx, update)?;
            x.axpy(1.0, &dx);
            problem.evaluate_residual(x, &mut r)?;
            stats.residual = r.norm();
            stats.newton_iterations += 1;
            debug!("newton iteration {}: residual {:e}", stats.newton_iterations, stats.residual);
        }

        if stats.residual.is_finite() && stats.residual <= threshold {
            Ok(NewtonOutcome::Converged(stats))
        } else {
            Ok(NewtonOutcome::Diverged(stats))
        }
    }
}
