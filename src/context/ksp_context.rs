//! Krylov solver context.
//!
//! `KspContext` bundles the configured Krylov method, its tolerances and the cached
//! preconditioner of one implicit system. The preconditioner carries an explicit
//! [`PreconditionerState`]: it is rebuilt from the operator only when it is
//! `Stale`, which it is after construction, after [`KspContext::invalidate`], and
//! whenever a solve is called with `update_preconditioner = true`.
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems. SIAM.
//! - PETSc documentation: https://petsc.org/release/docs/manualpages/KSP/

use log::{debug, info, warn};

use crate::config::{MultigridData, Solver, SolverData};
use crate::context::pc_context::{SystemPreconditioner, create_preconditioner};
use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::operators::{SystemOperator, Terms};
use crate::preconditioner::Preconditioner;
use crate::solver::{CgSolver, FgmresSolver, GmresSolver, LinearSolver};
use crate::utils::convergence::SolveStats;

/// Krylov method of a [`KspContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    /// Conjugate Gradient (symmetric positive definite systems)
    Cg,
    /// Restarted GMRES, right preconditioned
    Gmres,
    /// Flexible GMRES (variable preconditioners)
    Fgmres,
}

impl From<Solver> for SolverKind {
    fn from(solver: Solver) -> Self {
        match solver {
            Solver::CG => SolverKind::Cg,
            Solver::GMRES => SolverKind::Gmres,
            Solver::FGMRES => SolverKind::Fgmres,
        }
    }
}

/// Whether the cached preconditioner matches the current operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionerState {
    Fresh,
    Stale,
}

pub struct KspContext {
    pub kind: SolverKind,
    pub abs_tol: f64,
    pub rel_tol: f64,
    pub max_it: usize,
    /// Restart length (GMRES/FGMRES)
    pub restart: usize,
    pub fail_on_non_convergence: bool,
    pc: Option<SystemPreconditioner>,
    state: PreconditionerState,
    n_setups: usize,
}

impl std::fmt::Debug for KspContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KspContext")
            .field("kind", &self.kind)
            .field("rel_tol", &self.rel_tol)
            .field("max_it", &self.max_it)
            .field("preconditioned", &self.pc.is_some())
            .field("state", &self.state)
            .finish()
    }
}

impl KspContext {
    pub fn new(kind: SolverKind, abs_tol: f64, rel_tol: f64, max_it: usize, restart: usize) -> Self {
        KspContext {
            kind,
            abs_tol,
            rel_tol,
            max_it,
            restart,
            fail_on_non_convergence: false,
            pc: None,
            state: PreconditionerState::Stale,
            n_setups: 0,
        }
    }

    /// Context as configured for a system with the given active `terms`.
    pub fn from_parameters(solver: &SolverData, multigrid: &MultigridData, terms: Terms) -> Result<Self, DgError> {
        let mut ksp = KspContext::new(
            solver.solver.into(),
            solver.abs_tol,
            solver.rel_tol,
            solver.max_iter,
            solver.max_krylov_size,
        );
        ksp.fail_on_non_convergence = solver.fail_on_non_convergence;
        ksp.pc = create_preconditioner(solver.preconditioner, terms, multigrid)?;
        info!(
            "linear solver {:?} (rel_tol {:e}, max_iter {}), preconditioner {:?}",
            ksp.kind, ksp.rel_tol, ksp.max_it, solver.preconditioner
        );
        Ok(ksp)
    }

    pub fn with_preconditioner(mut self, pc: SystemPreconditioner) -> Self {
        self.pc = Some(pc);
        self.state = PreconditionerState::Stale;
        self
    }

    pub fn state(&self) -> PreconditionerState {
        self.state
    }

    /// Number of preconditioner setups so far.
    pub fn preconditioner_setups(&self) -> usize {
        self.n_setups
    }

    /// Marks the cached preconditioner out of date, e.g. after mesh motion.
    pub fn invalidate(&mut self) {
        self.state = PreconditionerState::Stale;
    }

    /// Rebuilds the preconditioner from `a` if it is stale.
    pub fn refresh(&mut self, a: &SystemOperator) -> Result<(), DgError> {
        if self.state == PreconditionerState::Fresh {
            return Ok(());
        }
        if let Some(pc) = self.pc.as_mut() {
            pc.setup(a)?;
            self.n_setups += 1;
            debug!("preconditioner rebuilt ({} setups)", self.n_setups);
        }
        self.state = PreconditionerState::Fresh;
        Ok(())
    }

    /// Solves `A x = b` with `x` as initial guess.
    ///
    /// Hitting the iteration cap is logged and returned with `converged = false`
    /// unless `fail_on_non_convergence` is set.
    pub fn solve(
        &mut self,
        a: &SystemOperator,
        b: &DistributedVector,
        x: &mut DistributedVector,
        update_preconditioner: bool,
    ) -> Result<SolveStats<f64>, DgError> {
        if update_preconditioner {
            self.invalidate();
        }
        self.refresh(a)?;
        let pc: Option<&dyn Preconditioner<SystemOperator, DistributedVector>> = self.pc.as_deref();
        let stats = match self.kind {
            SolverKind::Cg => CgSolver::new(self.abs_tol, self.rel_tol, self.max_it).solve(a, pc, b, x)?,
            SolverKind::Gmres => {
                GmresSolver::new(self.restart, self.abs_tol, self.rel_tol, self.max_it).solve(a, pc, b, x)?
            }
            SolverKind::Fgmres => {
                FgmresSolver::new(self.restart, self.abs_tol, self.rel_tol, self.max_it).solve(a, pc, b, x)?
            }
        };
        if !stats.converged {
            if self.fail_on_non_convergence {
                return Err(DgError::NotConverged { iterations: stats.iterations, residual: stats.final_residual });
            }
            warn!(
                "{:?} stopped after {} iterations at residual {:e} (initial {:e})",
                self.kind, stats.iterations, stats.final_residual, stats.initial_residual
            );
        }
        debug!("{:?} converged in {} iterations", self.kind, stats.iterations);
        Ok(stats)
    }
}
