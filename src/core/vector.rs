//! Distributed DoF vector.
//!
//! A `DistributedVector` stores the values of the locally owned cells and shares the
//! [`Partitioner`] describing the layout. Neighbour-owned values are never cached in
//! the vector: [`DistributedVector::ghost_values`] performs the exchange and returns a
//! read-only view, so an operator cannot observe stale ghost data.

use std::sync::Arc;

use crate::core::partitioner::{CellRef, Partitioner};
use crate::core::traits::DofVector;
use crate::core::wrappers::local_dot;
use crate::error::DgError;
use crate::parallel::Comm;

#[derive(Clone)]
pub struct DistributedVector {
    values: Vec<f64>,
    partitioner: Arc<Partitioner>,
}

impl std::fmt::Debug for DistributedVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedVector")
            .field("len", &self.values.len())
            .field("dofs_per_cell", &self.partitioner.dofs_per_cell())
            .finish()
    }
}

/// Owned values plus the exchanged ghost values, addressed by [`CellRef`].
pub struct GhostedValues<'a> {
    owned: &'a [f64],
    ghosts: Vec<f64>,
    n: usize,
}

impl<'a> GhostedValues<'a> {
    /// DoF values of one cell.
    pub fn cell(&self, cell: CellRef) -> &[f64] {
        let n = self.n;
        match cell {
            CellRef::Owned(c) => &self.owned[c * n..(c + 1) * n],
            CellRef::Ghost(g) => &self.ghosts[g * n..(g + 1) * n],
        }
    }

    pub fn dofs_per_cell(&self) -> usize {
        self.n
    }
}

impl DistributedVector {
    /// Zero vector on the given layout.
    pub fn new(partitioner: Arc<Partitioner>) -> Self {
        let values = vec![0.0; partitioner.n_owned_dofs()];
        DistributedVector { values, partitioner }
    }

    pub fn from_values(partitioner: Arc<Partitioner>, values: Vec<f64>) -> Result<Self, DgError> {
        let expected = partitioner.n_owned_dofs();
        if values.len() != expected {
            return Err(DgError::DimensionMismatch { expected, found: values.len() });
        }
        Ok(DistributedVector { values, partitioner })
    }

    pub fn partitioner(&self) -> &Arc<Partitioner> {
        &self.partitioner
    }

    pub fn n_global_dofs(&self) -> usize {
        self.partitioner.n_global_dofs()
    }

    /// Values of owned cell `c`.
    pub fn cell(&self, c: usize) -> &[f64] {
        let n = self.partitioner.dofs_per_cell();
        &self.values[c * n..(c + 1) * n]
    }

    /// Collective: exchanges ghost cell values with the neighbouring ranks.
    pub fn ghost_values(&self) -> GhostedValues<'_> {
        GhostedValues {
            owned: &self.values,
            ghosts: self.partitioner.exchange_ghosts(&self.values),
            n: self.partitioner.dofs_per_cell(),
        }
    }

    /// Checks that `other` lives on the same layout.
    pub fn check_compatible(&self, other: &DistributedVector) -> Result<(), DgError> {
        if Arc::ptr_eq(&self.partitioner, &other.partitioner)
            || self.partitioner.is_compatible(&other.partitioner)
        {
            Ok(())
        } else {
            Err(DgError::DimensionMismatch { expected: self.values.len(), found: other.values.len() })
        }
    }

    /// Arithmetic mean of all entries (collective).
    pub fn mean_value(&self) -> f64 {
        let comm = self.partitioner.comm();
        let sum = comm.all_reduce(self.values.iter().sum());
        sum / self.partitioner.n_global_dofs() as f64
    }

    /// Largest absolute entry (collective).
    pub fn linfty_norm(&self) -> f64 {
        let local = self.values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        self.partitioner.comm().all_reduce_max(local)
    }

    pub fn add_constant(&mut self, c: f64) {
        self.values.iter_mut().for_each(|v| *v += c);
    }

    /// Removes the mean value; projects out the constant null space of pure Neumann
    /// or periodic diffusion problems.
    pub fn set_zero_mean_value(&mut self) {
        let mean = self.mean_value();
        self.add_constant(-mean);
    }
}

impl DofVector for DistributedVector {
    fn zeros_like(&self) -> Self {
        DistributedVector::new(Arc::clone(&self.partitioner))
    }
    fn len(&self) -> usize {
        self.values.len()
    }
    fn as_slice(&self) -> &[f64] {
        &self.values
    }
    fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }
    fn dot(&self, other: &Self) -> f64 {
        debug_assert_eq!(self.values.len(), other.values.len(), "Vectors must have the same length");
        self.partitioner.comm().all_reduce(local_dot(&self.values, &other.values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::LineGrid;
    use crate::parallel::UniverseComm;

    fn partitioner(cells: usize, n: usize) -> Arc<Partitioner> {
        let grid = LineGrid::new(0.0, 1.0, cells, Arc::new(UniverseComm::Serial)).unwrap();
        Arc::new(Partitioner::new(&grid, n))
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "same length")]
    fn dot_of_mismatched_vectors_panics_in_debug_builds() {
        let u = DistributedVector::new(partitioner(2, 2));
        let v = DistributedVector::new(partitioner(3, 2));
        let _ = u.dot(&v);
    }

    #[test]
    fn zero_mean_projection() {
        let part = partitioner(2, 2);
        let mut v = DistributedVector::from_values(part, vec![1.0, 2.0, 3.0, 6.0]).unwrap();
        assert_eq!(v.mean_value(), 3.0);
        v.set_zero_mean_value();
        assert!(v.mean_value().abs() < 1e-15);
        assert_eq!(v.as_slice(), &[-2.0, -1.0, 0.0, 3.0]);
        assert_eq!(v.linfty_norm(), 3.0);
    }

    #[test]
    fn cell_access_and_ghosts() {
        let part = partitioner(3, 2);
        let v = DistributedVector::from_values(part, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(v.cell(1), &[2.0, 3.0]);
        let ghosted = v.ghost_values();
        assert_eq!(ghosted.cell(CellRef::Owned(2)), &[4.0, 5.0]);
        assert_eq!(v.dot(&v), 55.0);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let part = partitioner(2, 2);
        assert!(matches!(
            DistributedVector::from_values(part, vec![0.0; 3]),
            Err(DgError::DimensionMismatch { expected: 4, found: 3 })
        ));
    }
}
