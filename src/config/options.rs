//! Enumerated choices of the parameter file.
//!
//! Every discrete decision of a run (problem type, discretization, solver,
//! preconditioner, multigrid layout, time-step policy) is one of these enums, so an
//! unknown combination cannot be expressed and `Parameters::check` only has to
//! reject contradictory ones.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemType {
    Steady,
    Unsteady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquationType {
    Convection,
    Diffusion,
    ConvectionDiffusion,
}

impl EquationType {
    pub fn has_convection(self) -> bool {
        matches!(self, EquationType::Convection | EquationType::ConvectionDiffusion)
    }

    pub fn has_diffusion(self) -> bool {
        matches!(self, EquationType::Diffusion | EquationType::ConvectionDiffusion)
    }
}

/// How the transport velocity enters the convective operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeVelocityField {
    /// Analytical function evaluated at the quadrature points.
    Function,
    /// DoF vector on the solution space, supplied with every call.
    DoFVector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericalFluxConvectiveOperator {
    CentralFlux,
    LaxFriedrichsFlux,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalDiscretization {
    ExplRK,
    BDF,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreatmentOfConvectiveTerm {
    Explicit,
    Implicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeStepCalculation {
    UserSpecified,
    CFL,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Solver {
    CG,
    GMRES,
    FGMRES,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preconditioner {
    None,
    InverseMassMatrix,
    PointJacobi,
    BlockJacobi,
    Multigrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultigridType {
    /// Polynomial coarsening on the fine grid.
    PMG,
    /// Geometric coarsening at fixed degree.
    HMG,
    /// Polynomial coarsening first, then geometric.
    HPMG,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PSequenceType {
    Bisect,
    DecreaseByOne,
    GoToOne,
}

impl PSequenceType {
    /// Next coarser degree, `None` once degree one is reached.
    pub fn coarser(self, degree: usize) -> Option<usize> {
        if degree <= 1 {
            return None;
        }
        Some(match self {
            PSequenceType::Bisect => (degree / 2).max(1),
            PSequenceType::DecreaseByOne => degree - 1,
            PSequenceType::GoToOne => 1,
        })
    }
}

/// Terms retained in the level operators of the multigrid hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultigridOperatorType {
    ReactionDiffusion,
    ReactionConvection,
    ReactionConvectionDiffusion,
}

impl MultigridOperatorType {
    pub fn has_convection(self) -> bool {
        !matches!(self, MultigridOperatorType::ReactionDiffusion)
    }

    pub fn has_diffusion(self) -> bool {
        !matches!(self, MultigridOperatorType::ReactionConvection)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultigridSmoother {
    Chebyshev,
    Jacobi,
}

/// Relaxation used by the Jacobi smoother and inside Chebyshev.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmootherPreconditioner {
    PointJacobi,
    BlockJacobi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultigridCoarseGridSolver {
    CG,
    GMRES,
    /// Apply the level smoother.
    Smoother,
}
