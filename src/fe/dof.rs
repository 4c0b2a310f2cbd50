//! DoF space of one scalar DG field.

use std::sync::Arc;

use crate::core::partitioner::{CellRef, Partitioner};
use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::fe::shape::ShapeInfo;
use crate::functions::Function;
use crate::grid::{CellGeometry, LineGrid};
use crate::parallel::Comm;

/// Index of the standard Gauss rule (`p + 1` points).
pub const QUAD_STANDARD: usize = 0;
/// Index of the over-integration rule (`p + (p + 2) / 2` points).
pub const QUAD_OVERINTEGRATION: usize = 1;

/// Geometry of owned and ghost cells.
#[derive(Debug, Clone)]
pub struct Mapping {
    owned: Vec<CellGeometry>,
    ghosts: Vec<CellGeometry>,
}

impl Mapping {
    fn new(grid: &LineGrid, partitioner: &Partitioner) -> Self {
        Mapping {
            owned: partitioner.owned_cells().map(|c| grid.cell_geometry(c)).collect(),
            ghosts: partitioner.ghost_cells().iter().map(|&c| grid.cell_geometry(c)).collect(),
        }
    }

    pub fn geometry(&self, cell: CellRef) -> &CellGeometry {
        match cell {
            CellRef::Owned(c) => &self.owned[c],
            CellRef::Ghost(g) => &self.ghosts[g],
        }
    }

    pub fn owned(&self) -> &[CellGeometry] {
        &self.owned
    }
}

#[derive(Clone)]
pub struct DofSpace {
    grid: Arc<LineGrid>,
    shapes: Arc<[ShapeInfo; 2]>,
    mapping: Mapping,
    partitioner: Arc<Partitioner>,
}

impl std::fmt::Debug for DofSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DofSpace")
            .field("degree", &self.degree())
            .field("n_global_dofs", &self.n_global_dofs())
            .finish()
    }
}

impl DofSpace {
    /// Discontinuous degree-`degree` Lagrange space on `grid`.
    pub fn new(grid: Arc<LineGrid>, degree: usize) -> Result<Self, DgError> {
        if degree == 0 {
            return Err(DgError::Config("polynomial degree must be at least 1".to_string()));
        }
        let shapes = Arc::new([
            ShapeInfo::new(degree, degree + 1),
            ShapeInfo::new(degree, degree + (degree + 2) / 2),
        ]);
        let partitioner = Arc::new(Partitioner::new(&grid, degree + 1));
        let mapping = Mapping::new(&grid, &partitioner);
        Ok(DofSpace { grid, shapes, mapping, partitioner })
    }

    /// Same DoF layout on a moved grid: only the geometry is recomputed.
    pub fn with_grid(&self, grid: Arc<LineGrid>) -> Result<Self, DgError> {
        if grid.n_global_cells() != self.partitioner.n_global_cells()
            || grid.locally_owned_cells() != self.partitioner.owned_cells()
        {
            return Err(DgError::DimensionMismatch {
                expected: self.partitioner.n_global_cells(),
                found: grid.n_global_cells(),
            });
        }
        let mapping = Mapping::new(&grid, &self.partitioner);
        Ok(DofSpace {
            grid,
            shapes: Arc::clone(&self.shapes),
            mapping,
            partitioner: Arc::clone(&self.partitioner),
        })
    }

    pub fn grid(&self) -> &Arc<LineGrid> {
        &self.grid
    }

    pub fn degree(&self) -> usize {
        self.shapes[QUAD_STANDARD].degree()
    }

    pub fn dofs_per_cell(&self) -> usize {
        self.degree() + 1
    }

    pub fn shape(&self, quad_index: usize) -> &ShapeInfo {
        &self.shapes[quad_index]
    }

    pub fn shapes(&self) -> &[ShapeInfo] {
        &self.shapes[..]
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn partitioner(&self) -> &Arc<Partitioner> {
        &self.partitioner
    }

    pub fn comm(&self) -> &crate::parallel::UniverseComm {
        self.partitioner.comm()
    }

    pub fn n_owned_cells(&self) -> usize {
        self.partitioner.n_owned_cells()
    }

    pub fn n_global_dofs(&self) -> usize {
        self.partitioner.n_global_dofs()
    }

    pub fn new_vector(&self) -> DistributedVector {
        DistributedVector::new(Arc::clone(&self.partitioner))
    }

    /// Physical coordinates of the DoF support points of owned cell `c`.
    pub fn support_points(&self, c: usize) -> Vec<f64> {
        let geometry = &self.mapping.owned[c];
        self.shapes[QUAD_STANDARD].nodes().iter().map(|&xi| geometry.map(xi)).collect()
    }

    /// Nodal interpolation of `f(·, t)` into `dst`.
    pub fn interpolate(&self, f: &dyn Function, t: f64, dst: &mut DistributedVector) {
        let n = self.dofs_per_cell();
        let values = crate::core::traits::DofVector::as_mut_slice(dst);
        for (c, block) in values.chunks_mut(n).enumerate() {
            for (v, x) in block.iter_mut().zip(self.support_points(c)) {
                *v = f.value(x, t);
            }
        }
    }

    /// `‖u - f(·, t)‖_{L2}` over the whole mesh (collective).
    pub fn l2_error(&self, u: &DistributedVector, f: &dyn Function, t: f64) -> f64 {
        let shape = &self.shapes[QUAD_OVERINTEGRATION];
        let mut local = 0.0;
        for (c, geometry) in self.mapping.owned.iter().enumerate() {
            let values = u.cell(c);
            for q in 0..shape.n_q_points() {
                let x = geometry.map(shape.points()[q]);
                let e = shape.interpolate_at(values, q) - f.value(x, t);
                local += shape.weights()[q] * geometry.jacobian * e * e;
            }
        }
        self.comm().all_reduce(local).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::UniverseComm;
    use approx::assert_abs_diff_eq;

    fn space(cells: usize, degree: usize) -> DofSpace {
        let grid = LineGrid::new(0.0, 2.0, cells, Arc::new(UniverseComm::Serial)).unwrap();
        DofSpace::new(Arc::new(grid), degree).unwrap()
    }

    #[test]
    fn interpolation_of_polynomials_is_exact() {
        let space = space(3, 2);
        let f = |x: f64, _t: f64| x * x - 1.0;
        let mut v = space.new_vector();
        space.interpolate(&f, 0.0, &mut v);
        assert_eq!(space.n_global_dofs(), 9);
        assert_abs_diff_eq!(space.l2_error(&v, &f, 0.0), 0.0, epsilon = 1e-13);
    }

    #[test]
    fn degree_zero_is_rejected() {
        let grid = LineGrid::new(0.0, 1.0, 2, Arc::new(UniverseComm::Serial)).unwrap();
        assert!(DofSpace::new(Arc::new(grid), 0).is_err());
    }

    #[test]
    fn moved_grid_keeps_layout() {
        let s = space(2, 1);
        let mut grid = (**s.grid()).clone();
        grid.move_vertices(vec![0.0, 0.5, 2.0], vec![0.0; 3]).unwrap();
        let moved = s.with_grid(Arc::new(grid)).unwrap();
        assert!(Arc::ptr_eq(moved.partitioner(), s.partitioner()));
        assert_abs_diff_eq!(moved.mapping().owned()[1].h, 1.5);
    }
}
