use thiserror::Error;

use crate::grid::BoundaryId;

// Unified error type for dgsolve

#[derive(Error, Debug)]
pub enum DgError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("boundary id {boundary_id} matches {matches} boundary kinds, expected exactly one")]
    Boundary { boundary_id: BoundaryId, matches: usize },
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("velocity field given as dof vector but no velocity vector was supplied")]
    MissingVelocity,
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("factorization error: {0}")]
    Factorization(String),
    #[error("linear solver did not converge after {iterations} iterations (residual {residual:e})")]
    NotConverged { iterations: usize, residual: f64 },
    #[error("load step failed at load factor {load_factor} after {retries} increment reductions")]
    LoadStepFailed { load_factor: f64, retries: usize },
    #[error("indefinite matrix detected (p^T A p <= 0)")]
    IndefiniteMatrix,
}
