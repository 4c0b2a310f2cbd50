//! Block-diagonal inverse of the DG mass matrix.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::core::traits::DofVector;
use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::fe::{DofSpace, QUAD_STANDARD};
use crate::operators::integrator::check_layout;

/// `M⁻¹` applied cell by cell as `M_ref⁻¹ / J_K`. Purely local, no communication.
#[derive(Debug, Clone)]
pub struct InverseMassOperator {
    space: DofSpace,
}

impl InverseMassOperator {
    pub fn new(space: DofSpace) -> Self {
        InverseMassOperator { space }
    }

    /// `dst = M⁻¹ src`
    pub fn apply(&self, dst: &mut DistributedVector, src: &DistributedVector) -> Result<(), DgError> {
        check_layout(&self.space, src)?;
        check_layout(&self.space, dst)?;
        self.apply_slice(dst.as_mut_slice(), src.as_slice());
        Ok(())
    }

    /// `v = M⁻¹ v`
    pub fn apply_in_place(&self, v: &mut DistributedVector) -> Result<(), DgError> {
        let src = v.clone();
        self.apply(v, &src)
    }

    pub(crate) fn apply_slice(&self, dst: &mut [f64], src: &[f64]) {
        let n = self.space.dofs_per_cell();
        let minv = self.space.shape(QUAD_STANDARD).inverse_mass();
        let geometry = self.space.mapping().owned();
        let body = |(c, block): (usize, &mut [f64])| {
            let u = &src[c * n..(c + 1) * n];
            let scale = 1.0 / geometry[c].jacobian;
            for (i, d) in block.iter_mut().enumerate() {
                *d = scale * (0..n).map(|j| minv[i * n + j] * u[j]).sum::<f64>();
            }
        };
        #[cfg(feature = "rayon")]
        dst.par_chunks_mut(n).enumerate().for_each(body);
        #[cfg(not(feature = "rayon"))]
        dst.chunks_mut(n).enumerate().for_each(body);
    }

    pub fn update_after_mesh_movement(&mut self, space: &DofSpace) {
        self.space = space.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::LineGrid;
    use crate::operators::{MassOperator, Operator, OperatorContext};
    use crate::parallel::UniverseComm;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    #[test]
    fn inverse_mass_undoes_mass() {
        let grid = LineGrid::from_vertices(vec![0.0, 0.1, 0.5, 1.3], Arc::new(UniverseComm::Serial)).unwrap();
        let space = DofSpace::new(Arc::new(grid), 3).unwrap();
        let mass = MassOperator::new(space.clone());
        let inverse = InverseMassOperator::new(space.clone());
        let mut u = space.new_vector();
        space.interpolate(&|x: f64, _t: f64| (3.0 * x).cos(), 0.0, &mut u);
        let mut mu = space.new_vector();
        mass.apply(&mut mu, &u, &OperatorContext::default()).unwrap();
        inverse.apply_in_place(&mut mu).unwrap();
        for (a, b) in mu.as_slice().iter().zip(u.as_slice()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }
}
