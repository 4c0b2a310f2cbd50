//! Solver and preconditioner contexts of the implicit systems.
//!
//! Modules:
//! - [`ksp_context`]: `KspContext`, the configured Krylov method together with its
//!   cached preconditioner.
//! - [`pc_context`]: factory turning the configured preconditioner kind into a
//!   boxed [`Preconditioner`](crate::preconditioner::Preconditioner).
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems. SIAM.
//! - PETSc documentation: https://petsc.org/release/docs/manualpages/KSP/

pub mod ksp_context;
pub use ksp_context::{KspContext, PreconditionerState, SolverKind};
pub mod pc_context;
pub use pc_context::{SystemPreconditioner, create_preconditioner};
