//! Hybrid p/h multigrid V-cycle preconditioner.
//!
//! The hierarchy is rebuilt by every `setup` from the fine operator: each coarser
//! level gets its own [`DofSpace`], a [`CombinedOperator`] restricted to the terms
//! of the multigrid operator type, and the velocity and linearization point
//! interpolated from the next finer level. Levels are stored coarsest first;
//! `transfers[l]` connects level `l` with the finer level `l + 1`.

use std::sync::Arc;

use log::{debug, info};

use crate::config::{
    MultigridCoarseGridSolver, MultigridData, MultigridSmoother, MultigridType, SmootherPreconditioner,
};
use crate::core::traits::{DiagonalProvider, DofVector, MatVec};
use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::fe::DofSpace;
use crate::operators::{CombinedOperator, SystemOperator, Terms};
use crate::preconditioner::jacobi::not_set_up;
use crate::preconditioner::transfer::{HTransfer, LevelTransfer, PTransfer};
use crate::preconditioner::{BlockJacobi, Chebyshev, Jacobi, Preconditioner};
use crate::solver::{CgSolver, GmresSolver, LinearSolver, residual};

/// Absolute tolerance of the coarse-grid solve; the relative one is configured.
const COARSE_ABS_TOL: f64 = 1e-20;
const COARSE_GMRES_RESTART: usize = 30;

/// Relaxation applied on every multigrid level.
pub trait Smoother<M, V> {
    fn setup(&mut self, a: &M) -> Result<(), DgError>;
    /// Improves `x` for `A x = b`.
    fn smooth(&self, a: &M, b: &V, x: &mut V) -> Result<(), DgError>;
}

impl<M, V> Smoother<M, V> for Chebyshev<M, V>
where
    M: MatVec<V> + DiagonalProvider<V> + Clone,
    V: DofVector,
{
    fn setup(&mut self, a: &M) -> Result<(), DgError> {
        Preconditioner::setup(self, a)
    }

    fn smooth(&self, a: &M, b: &V, x: &mut V) -> Result<(), DgError> {
        let mut r = b.zeros_like();
        residual(a, b, x, &mut r);
        let mut z = b.zeros_like();
        self.apply(&r, &mut z)?;
        x.axpy(1.0, &z);
        Ok(())
    }
}

/// Damped (block) Jacobi sweeps `x ← x + ω P⁻¹ (b - A x)`.
pub struct JacobiSmoother<M, V> {
    inner: Box<dyn Preconditioner<M, V>>,
    omega: f64,
    iterations: usize,
}

impl<M, V> JacobiSmoother<M, V> {
    pub fn new(inner: Box<dyn Preconditioner<M, V>>, omega: f64, iterations: usize) -> Self {
        JacobiSmoother { inner, omega, iterations }
    }
}

impl<M, V> Smoother<M, V> for JacobiSmoother<M, V>
where
    M: MatVec<V>,
    V: DofVector,
{
    fn setup(&mut self, a: &M) -> Result<(), DgError> {
        self.inner.setup(a)
    }

    fn smooth(&self, a: &M, b: &V, x: &mut V) -> Result<(), DgError> {
        let mut r = b.zeros_like();
        let mut z = b.zeros_like();
        for _ in 0..self.iterations {
            residual(a, b, x, &mut r);
            self.inner.apply(&r, &mut z)?;
            x.axpy(self.omega, &z);
        }
        Ok(())
    }
}

type LevelSmoother = Box<dyn Smoother<SystemOperator, DistributedVector>>;

struct Level {
    system: SystemOperator,
    smoother: LevelSmoother,
}

/// One-V-cycle multigrid preconditioner for [`SystemOperator`]s.
pub struct Multigrid {
    data: MultigridData,
    levels: Vec<Level>,
    transfers: Vec<LevelTransfer>,
    coarse_preconditioner: Jacobi<DistributedVector>,
}

impl Multigrid {
    pub fn new(data: MultigridData) -> Self {
        Multigrid { data, levels: Vec::new(), transfers: Vec::new(), coarse_preconditioner: Jacobi::new() }
    }

    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// `(cells, degree)` of every level, coarsest first.
    pub fn level_description(&self) -> Vec<(usize, usize)> {
        self.levels
            .iter()
            .map(|l| (l.system.space().grid().n_global_cells(), l.system.space().degree()))
            .collect()
    }

    /// Terms kept on the levels.
    fn level_terms(&self, fine: Terms) -> Terms {
        let mut terms = Terms::MASS | Terms::REACTION;
        terms.set(Terms::CONVECTION, self.data.operator_type.has_convection());
        terms.set(Terms::DIFFUSION, self.data.operator_type.has_diffusion());
        fine & terms
    }

    /// Next coarser space and the transfer onto it, `None` at the coarsest level.
    fn coarser(&self, space: &DofSpace) -> Result<Option<(DofSpace, LevelTransfer)>, DgError> {
        let p_coarsening = matches!(self.data.kind, MultigridType::PMG | MultigridType::HPMG);
        let h_coarsening = matches!(self.data.kind, MultigridType::HMG | MultigridType::HPMG);
        if p_coarsening {
            if let Some(degree) = self.data.p_sequence.coarser(space.degree()) {
                let coarse = DofSpace::new(Arc::clone(space.grid()), degree)?;
                let transfer = LevelTransfer::P(PTransfer::new(space, &coarse)?);
                return Ok(Some((coarse, transfer)));
            }
        }
        if h_coarsening {
            if let Some(grid) = space.grid().coarsen() {
                let coarse = DofSpace::new(Arc::new(grid), space.degree())?;
                let transfer = LevelTransfer::H(HTransfer::new(space, &coarse)?);
                return Ok(Some((coarse, transfer)));
            }
        }
        Ok(None)
    }

    fn smoother(&self) -> LevelSmoother {
        let inner: Box<dyn Preconditioner<SystemOperator, DistributedVector>> = match self.data.smoother_preconditioner {
            SmootherPreconditioner::PointJacobi => Box::new(Jacobi::new()),
            SmootherPreconditioner::BlockJacobi => Box::new(BlockJacobi::new()),
        };
        match self.data.smoother {
            MultigridSmoother::Chebyshev => Box::new(Chebyshev::new(
                self.data.chebyshev_degree,
                self.data.smoothing_range,
                self.data.eigenvalue_iterations,
                inner,
            )),
            MultigridSmoother::Jacobi => {
                Box::new(JacobiSmoother::new(inner, self.data.relaxation_factor, self.data.smoothing_iterations))
            }
        }
    }

    fn level(&self, system: SystemOperator) -> Result<Level, DgError> {
        let mut smoother = self.smoother();
        smoother.setup(&system)?;
        Ok(Level { system, smoother })
    }

    fn coarse_solve(&self, b: &DistributedVector, x: &mut DistributedVector) -> Result<(), DgError> {
        let coarsest = self.levels.first().ok_or_else(|| not_set_up("multigrid"))?;
        let a = &coarsest.system;
        let pc: &dyn Preconditioner<SystemOperator, DistributedVector> = &self.coarse_preconditioner;
        let (rel, max) = (self.data.coarse_rel_tol, self.data.coarse_max_iter);
        let stats = match self.data.coarse_solver {
            MultigridCoarseGridSolver::CG => CgSolver::new(COARSE_ABS_TOL, rel, max).solve(a, Some(pc), b, x)?,
            MultigridCoarseGridSolver::GMRES => {
                GmresSolver::new(COARSE_GMRES_RESTART, COARSE_ABS_TOL, rel, max).solve(a, Some(pc), b, x)?
            }
            MultigridCoarseGridSolver::Smoother => return coarsest.smoother.smooth(a, b, x),
        };
        debug!("multigrid coarse solve: {} iterations, converged {}", stats.iterations, stats.converged);
        Ok(())
    }

    fn v_cycle(&self, level: usize, b: &DistributedVector, x: &mut DistributedVector) -> Result<(), DgError> {
        x.fill(0.0);
        if level == 0 {
            return self.coarse_solve(b, x);
        }
        let current = &self.levels[level];
        let a = &current.system;
        current.smoother.smooth(a, b, x)?;

        let mut r = a.new_vector();
        residual(a, b, x, &mut r);
        let coarse = &self.levels[level - 1].system;
        let mut bc = coarse.new_vector();
        self.transfers[level - 1].restrict(&r, &mut bc);
        let mut xc = coarse.new_vector();
        self.v_cycle(level - 1, &bc, &mut xc)?;
        self.transfers[level - 1].prolongate_add(&xc, x);

        current.smoother.smooth(a, b, x)
    }
}

impl Preconditioner<SystemOperator, DistributedVector> for Multigrid {
    fn setup(&mut self, a: &SystemOperator) -> Result<(), DgError> {
        let terms = self.level_terms(a.operator().terms());
        let fine_op = Arc::new(a.operator().restricted(a.space().clone(), terms)?);
        let convection = terms.contains(Terms::CONVECTION);
        let velocity = a.velocity().cloned().filter(|_| convection);
        let mut systems = vec![a.on_level(fine_op, velocity, a.linearization().cloned())];
        let mut transfers = Vec::new();

        while let Some((space, transfer)) = self.coarser(systems[systems.len() - 1].space())? {
            let finer = &systems[systems.len() - 1];
            let op: Arc<CombinedOperator> = Arc::new(finer.operator().restricted(space.clone(), terms)?);
            let interpolate = |field: Option<&DistributedVector>| {
                field.map(|f| {
                    let mut coarse = space.new_vector();
                    transfer.interpolate(f, &mut coarse);
                    coarse
                })
            };
            let velocity = interpolate(finer.velocity());
            let linearization = interpolate(finer.linearization());
            let system = finer.on_level(op, velocity, linearization);
            systems.push(system);
            transfers.push(transfer);
        }

        systems.reverse();
        transfers.reverse();
        let mut levels = Vec::with_capacity(systems.len());
        for system in systems {
            levels.push(self.level(system)?);
        }
        if let Some(coarsest) = levels.first() {
            Preconditioner::setup(&mut self.coarse_preconditioner, &coarsest.system)?;
        }
        self.levels = levels;
        self.transfers = transfers;
        info!("multigrid hierarchy (cells, degree), coarsest first: {:?}", self.level_description());
        Ok(())
    }

    fn apply(&self, r: &DistributedVector, z: &mut DistributedVector) -> Result<(), DgError> {
        if self.levels.is_empty() {
            return Err(not_set_up("multigrid"));
        }
        self.v_cycle(self.levels.len() - 1, r, z)
    }
}
