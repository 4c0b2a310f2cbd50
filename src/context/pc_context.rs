//! Preconditioner factory.
//!
//! Maps the configured [`PreconditionerKind`](crate::config::Preconditioner) to a
//! boxed [`Preconditioner`] for the implicit systems of the engine. Whether the
//! choice is usable with the current operator is checked here, at setup time, so a
//! bad pairing never surfaces during a solve.

use crate::config::{MultigridData, Preconditioner as PreconditionerKind};
use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::operators::{SystemOperator, Terms};
use crate::preconditioner::{BlockJacobi, InverseMassPreconditioner, Jacobi, Multigrid, Preconditioner};

pub type SystemPreconditioner = Box<dyn Preconditioner<SystemOperator, DistributedVector>>;

/// Builds the preconditioner `kind` for systems with the given `terms`.
///
/// Returns `None` for [`PreconditionerKind::None`].
pub fn create_preconditioner(
    kind: PreconditionerKind,
    terms: Terms,
    multigrid: &MultigridData,
) -> Result<Option<SystemPreconditioner>, DgError> {
    let pc: SystemPreconditioner = match kind {
        PreconditionerKind::None => return Ok(None),
        PreconditionerKind::InverseMassMatrix => {
            if !terms.contains(Terms::MASS) {
                return Err(DgError::NotImplemented("inverse mass preconditioner for a steady problem"));
            }
            Box::new(InverseMassPreconditioner::new())
        }
        PreconditionerKind::PointJacobi => Box::new(Jacobi::new()),
        PreconditionerKind::BlockJacobi => Box::new(BlockJacobi::new()),
        PreconditionerKind::Multigrid => {
            let mut level_terms = Terms::MASS | Terms::REACTION;
            level_terms.set(Terms::CONVECTION, multigrid.operator_type.has_convection());
            level_terms.set(Terms::DIFFUSION, multigrid.operator_type.has_diffusion());
            if multigrid.operator_type.has_convection() && !terms.contains(Terms::CONVECTION) {
                return Err(DgError::Config(
                    "multigrid operator type includes convection but the system has no convective term".to_string(),
                ));
            }
            if (terms & level_terms).is_empty() {
                return Err(DgError::Config("multigrid level operator has no active term".to_string()));
            }
            Box::new(Multigrid::new(multigrid.clone()))
        }
    };
    Ok(Some(pc))
}
