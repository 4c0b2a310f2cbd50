// Jacobi preconditioner implementation

use crate::core::traits::{DiagonalProvider, DofVector};
use crate::error::DgError;
use crate::preconditioner::Preconditioner;

/// Jacobi preconditioner: M⁻¹ = ω D⁻¹
#[derive(Debug, Clone)]
pub struct Jacobi<V> {
    pub(crate) inv_diag: Option<V>,
    omega: f64,
}

impl<V> Jacobi<V> {
    /// new with empty state; user must call `setup`.
    pub fn new() -> Self {
        Self { inv_diag: None, omega: 1.0 }
    }

    /// Damping factor ω.
    pub fn with_relaxation(mut self, omega: f64) -> Self {
        self.omega = omega;
        self
    }

    pub fn inverse_diagonal(&self) -> Option<&V> {
        self.inv_diag.as_ref()
    }
}

impl<V> Default for Jacobi<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Entries below this magnitude count as zero when the diagonal is inverted.
pub(crate) const DIAGONAL_TOLERANCE: f64 = 1.0e-10;

/// `1/d`, or `1` for a vanishing entry so its residual component passes through.
pub(crate) fn invert_diagonal_entry(d: f64) -> f64 {
    if d.abs() > DIAGONAL_TOLERANCE { 1.0 / d } else { 1.0 }
}

pub(crate) fn not_set_up(name: &str) -> DgError {
    DgError::Config(format!("{name} preconditioner applied before setup"))
}

impl<M, V> Preconditioner<M, V> for Jacobi<V>
where
    M: DiagonalProvider<V>,
    V: DofVector,
{
    fn setup(&mut self, a: &M) -> Result<(), DgError> {
        let mut diag = a.diagonal()?;
        for d in diag.as_mut_slice() {
            *d = invert_diagonal_entry(*d);
        }
        self.inv_diag = Some(diag);
        Ok(())
    }

    fn apply(&self, r: &V, z: &mut V) -> Result<(), DgError> {
        let inv_diag = self.inv_diag.as_ref().ok_or_else(|| not_set_up("Jacobi"))?;
        for ((zi, ri), di) in z.as_mut_slice().iter_mut().zip(r.as_slice()).zip(inv_diag.as_slice()) {
            *zi = self.omega * di * ri;
        }
        Ok(())
    }
}
