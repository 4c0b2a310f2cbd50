//! Preconditioners for the Krylov solvers.
//!
//! Every preconditioner is set up from the operator it approximates, which only has
//! to expose the products it needs (`MatVec`, `DiagonalProvider`,
//! `BlockDiagonalProvider`). Setup is repeated whenever the operator changes;
//! application is read-only so one preconditioner can serve many iterations.

use crate::error::DgError;

/// A preconditioner M ≈ A⁻¹.
pub trait Preconditioner<M, V> {
    /// Apply M⁻¹ to r, writing z = M⁻¹ r
    fn apply(&self, r: &V, z: &mut V) -> Result<(), DgError>;
    /// Rebuild from A.
    fn setup(&mut self, _a: &M) -> Result<(), DgError> {
        Ok(())
    }
}

pub mod block_jacobi;
pub mod chebyshev;
pub mod inverse_mass;
pub mod jacobi;
pub mod multigrid;
pub mod transfer;

pub use block_jacobi::BlockJacobi;
pub use chebyshev::Chebyshev;
pub use inverse_mass::InverseMassPreconditioner;
pub use jacobi::Jacobi;
pub use multigrid::Multigrid;
pub use transfer::{HTransfer, LevelTransfer, PTransfer};
