//! dgsolve: matrix-free discontinuous Galerkin operators and solvers
//!
//! This crate evaluates high-order DG operators cell by cell without assembling a
//! matrix, solves the resulting systems with preconditioned Krylov and Newton
//! methods, and advances them with explicit Runge–Kutta, BDF and quasi-static load
//! stepping drivers, with support for shared and distributed memory parallelism.

pub mod parallel;

pub mod boundary;
pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod fe;
pub mod functions;
pub mod grid;
pub mod operators;
pub mod pde;
pub mod postprocessor;
pub mod preconditioner;
pub mod solver;
pub mod time_integration;
pub mod utils;

// Re-exports for convenience
pub use boundary::{BoundaryDescriptor, BoundaryType, BoundaryValue};
pub use config::Parameters;
pub use context::{KspContext, PreconditionerState, SolverKind};
pub use crate::core::*;
pub use crate::error::*;
pub use fe::{DofSpace, ShapeInfo};
pub use functions::{ConstantFunction, FieldFunctions, Function};
pub use grid::LineGrid;
pub use operators::{CombinedOperator, Operator, OperatorContext, OperatorType, SystemOperator, Terms};
pub use parallel::{Comm, UniverseComm};
pub use pde::{ConvectionDiffusionOperator, NonlinearOperator};
pub use postprocessor::{ErrorCalculator, PostProcessor};
pub use preconditioner::Preconditioner;
pub use solver::{CgSolver, FgmresSolver, GmresSolver, LinearSolver, NewtonOutcome, NewtonSolver};
pub use time_integration::{Driver, DriverQuasiStatic, DriverSteady, IterationStats};

// Re-export SolveStats at the crate root for convenience
pub use utils::convergence::SolveStats;
