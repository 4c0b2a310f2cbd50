//! Core linear-algebra traits for dgsolve.

use crate::error::DgError;

/// Matrix–vector product: y ← A x.
pub trait MatVec<V> {
    /// Compute y = A · x.
    fn matvec(&self, x: &V, y: &mut V);
}

/// Vector operations needed by the Krylov and Newton solvers.
///
/// `dot` and `norm` are global: for distributed vectors they reduce over all ranks.
pub trait DofVector: Clone {
    /// A zero vector with the same layout.
    fn zeros_like(&self) -> Self;
    /// Number of locally stored entries.
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn as_slice(&self) -> &[f64];
    fn as_mut_slice(&mut self) -> &mut [f64];
    /// Compute dot(self, other).
    fn dot(&self, other: &Self) -> f64;
    /// Compute ‖self‖₂.
    fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }
    /// self ← self + a·x
    fn axpy(&mut self, a: f64, x: &Self) {
        for (yi, xi) in self.as_mut_slice().iter_mut().zip(x.as_slice()) {
            *yi += a * xi;
        }
    }
    /// self ← a·self + x
    fn aypx(&mut self, a: f64, x: &Self) {
        for (yi, xi) in self.as_mut_slice().iter_mut().zip(x.as_slice()) {
            *yi = a * *yi + xi;
        }
    }
    fn scale(&mut self, a: f64) {
        self.as_mut_slice().iter_mut().for_each(|v| *v *= a);
    }
    fn fill(&mut self, value: f64) {
        self.as_mut_slice().iter_mut().for_each(|v| *v = value);
    }
    fn copy_from(&mut self, other: &Self) {
        self.as_mut_slice().copy_from_slice(other.as_slice());
    }
}

/// Operators whose diagonal can be extracted (point Jacobi, Chebyshev smoothing).
pub trait DiagonalProvider<V> {
    fn diagonal(&self) -> Result<V, DgError>;
}

/// Operators whose cell-wise diagonal blocks can be extracted (block Jacobi).
///
/// Returns the block size `n` and the blocks one after another, each `n × n` in
/// column-major order.
pub trait BlockDiagonalProvider {
    fn block_diagonal(&self) -> Result<(usize, Vec<f64>), DgError>;
}
