// Block-Jacobi preconditioner implementation

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use faer::linalg::solvers::{FullPivLu, SolveCore};
use faer::{Conj, Mat, MatMut};

use crate::core::traits::{BlockDiagonalProvider, DofVector};
use crate::error::DgError;
use crate::preconditioner::Preconditioner;
use crate::preconditioner::jacobi::not_set_up;

/// Cell-wise block Jacobi: each diagonal block is factorized with a fully pivoted
/// LU and stored as its explicit inverse.
#[derive(Debug, Clone, Default)]
pub struct BlockJacobi {
    block_size: usize,
    /// Column-major inverses, one block after another.
    inverses: Vec<f64>,
    omega: f64,
}

impl BlockJacobi {
    pub fn new() -> Self {
        Self { block_size: 0, inverses: Vec::new(), omega: 1.0 }
    }

    /// Damping factor ω.
    pub fn with_relaxation(mut self, omega: f64) -> Self {
        self.omega = omega;
        self
    }

    fn invert(n: usize, block: &[f64], index: usize) -> Result<Vec<f64>, DgError> {
        let m = Mat::from_fn(n, n, |i, j| block[j * n + i]);
        let lu = FullPivLu::new(m.as_ref());
        let mut inverse = vec![0.0; n * n];
        for i in 0..n {
            inverse[i * n + i] = 1.0;
        }
        lu.solve_in_place_with_conj(Conj::No, MatMut::from_column_major_slice_mut(&mut inverse, n, n));
        if inverse.iter().any(|v| !v.is_finite()) {
            return Err(DgError::Factorization(format!("diagonal block {index} is singular")));
        }
        Ok(inverse)
    }
}

impl<M, V> Preconditioner<M, V> for BlockJacobi
where
    M: BlockDiagonalProvider,
    V: DofVector,
{
    fn setup(&mut self, a: &M) -> Result<(), DgError> {
        let (n, blocks) = a.block_diagonal()?;
        let mut inverses = Vec::with_capacity(blocks.len());
        for (index, block) in blocks.chunks(n * n).enumerate() {
            inverses.extend(Self::invert(n, block, index)?);
        }
        self.block_size = n;
        self.inverses = inverses;
        Ok(())
    }

    /// Apply: z = ω M⁻¹ r
    fn apply(&self, r: &V, z: &mut V) -> Result<(), DgError> {
        let n = self.block_size;
        if n == 0 {
            return Err(not_set_up("block Jacobi"));
        }
        let r = r.as_slice();
        let body = |(c, zc): (usize, &mut [f64])| {
            let inverse = &self.inverses[c * n * n..(c + 1) * n * n];
            let rc = &r[c * n..(c + 1) * n];
            for (i, zi) in zc.iter_mut().enumerate() {
                *zi = self.omega * (0..n).map(|j| inverse[j * n + i] * rc[j]).sum::<f64>();
            }
        };
        #[cfg(feature = "rayon")]
        z.as_mut_slice().par_chunks_mut(n).enumerate().for_each(body);
        #[cfg(not(feature = "rayon"))]
        z.as_mut_slice().chunks_mut(n).enumerate().for_each(body);
        Ok(())
    }
}
