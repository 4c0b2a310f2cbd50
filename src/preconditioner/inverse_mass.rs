//! Inverse mass matrix as preconditioner.

use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::operators::{InverseMassOperator, SystemOperator};
use crate::preconditioner::Preconditioner;
use crate::preconditioner::jacobi::not_set_up;

/// `M⁻¹`, exact for mass-dominated systems (small time steps).
#[derive(Debug, Clone, Default)]
pub struct InverseMassPreconditioner {
    inverse: Option<InverseMassOperator>,
}

impl InverseMassPreconditioner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Preconditioner<SystemOperator, DistributedVector> for InverseMassPreconditioner {
    fn setup(&mut self, a: &SystemOperator) -> Result<(), DgError> {
        self.inverse = Some(InverseMassOperator::new(a.space().clone()));
        Ok(())
    }

    fn apply(&self, r: &DistributedVector, z: &mut DistributedVector) -> Result<(), DgError> {
        self.inverse.as_ref().ok_or_else(|| not_set_up("inverse mass"))?.apply(z, r)
    }
}
