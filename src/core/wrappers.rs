//! Wrappers for faer dense matrices and plain vectors.
//!
//! Implements the core traits for `faer::Mat<f64>` and `Vec<f64>` so that the Krylov
//! solvers and the algebraic preconditioners can be exercised on small dense systems
//! (unit tests, coarse problems) with the same code that drives the matrix-free
//! operators. Inner products use rayon when the feature is enabled.
//!
//! # References
//! - [faer crate documentation](https://docs.rs/faer)

use crate::core::traits::{BlockDiagonalProvider, DiagonalProvider, DofVector, MatVec};
use crate::error::DgError;
use faer::Mat;

/// Computes `y = A * x` where `A` is a dense matrix.
impl MatVec<Vec<f64>> for Mat<f64> {
    fn matvec(&self, x: &Vec<f64>, y: &mut Vec<f64>) {
        assert_eq!(self.nrows(), y.len(), "Output vector y has incorrect length");
        assert_eq!(self.ncols(), x.len(), "Input vector x has incorrect length");
        for i in 0..self.nrows() {
            y[i] = (0..self.ncols()).map(|j| self[(i, j)] * x[j]).sum();
        }
    }
}

impl DiagonalProvider<Vec<f64>> for Mat<f64> {
    fn diagonal(&self) -> Result<Vec<f64>, DgError> {
        if self.nrows() != self.ncols() {
            return Err(DgError::DimensionMismatch { expected: self.nrows(), found: self.ncols() });
        }
        Ok((0..self.nrows()).map(|i| self[(i, i)]).collect())
    }
}

/// The whole matrix is one block.
impl BlockDiagonalProvider for Mat<f64> {
    fn block_diagonal(&self) -> Result<(usize, Vec<f64>), DgError> {
        let n = self.nrows();
        if n != self.ncols() {
            return Err(DgError::DimensionMismatch { expected: n, found: self.ncols() });
        }
        let mut data = Vec::with_capacity(n * n);
        for j in 0..n {
            for i in 0..n {
                data.push(self[(i, j)]);
            }
        }
        Ok((n, data))
    }
}

/// Serial vectors: local inner product, optionally parallel.
impl DofVector for Vec<f64> {
    fn zeros_like(&self) -> Self {
        vec![0.0; self.len()]
    }
    fn len(&self) -> usize {
        Vec::len(self)
    }
    fn as_slice(&self) -> &[f64] {
        self
    }
    fn as_mut_slice(&mut self) -> &mut [f64] {
        self
    }
    fn dot(&self, other: &Self) -> f64 {
        debug_assert_eq!(self.len(), other.len(), "Vectors must have the same length");
        local_dot(self, other)
    }
}

/// Dot product of two local slices.
pub(crate) fn local_dot(x: &[f64], y: &[f64]) -> f64 {
    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        x.par_iter().zip(y.par_iter()).map(|(xi, yi)| xi * yi).sum()
    }
    #[cfg(not(feature = "rayon"))]
    {
        x.iter().zip(y.iter()).map(|(xi, yi)| xi * yi).sum()
    }
}
