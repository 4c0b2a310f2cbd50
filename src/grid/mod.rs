//! Partitioned one-dimensional line grid.
//!
//! The grid is the mesh provider of the engine: a sequence of `N` cells between two
//! end points, each end tagged with a boundary id, optionally closed periodically.
//! Cells are split into contiguous balanced ranges, one per rank, in the manner of a
//! slab decomposition. Vertex positions are replicated on every rank so the geometry
//! of ghost cells is available without communication.

use std::ops::Range;
use std::sync::Arc;

use crate::error::DgError;
use crate::parallel::{Comm, UniverseComm};

/// Identifier of a boundary part.
pub type BoundaryId = u32;

/// What lies across one face of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceNeighbor {
    /// Another cell, given by its global index.
    Interior(usize),
    /// A (non-periodic) boundary face.
    Boundary(BoundaryId),
}

/// Geometry of one cell, `[x0, x1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellGeometry {
    pub x0: f64,
    pub x1: f64,
    /// Cell size `x1 - x0`.
    pub h: f64,
    /// Jacobian of the map from `[-1, 1]`.
    pub jacobian: f64,
    /// Vertex velocities (zero unless the mesh moves).
    pub vertex_velocity: [f64; 2],
    /// Surface measure used for the interior penalty: interior faces count one half,
    /// boundary faces one.
    pub surface_weight: f64,
}

impl CellGeometry {
    /// Physical coordinate of the reference point `xi` in `[-1, 1]`.
    pub fn map(&self, xi: f64) -> f64 {
        self.x0 + 0.5 * (xi + 1.0) * self.h
    }

    /// Grid velocity at the reference point `xi`, linear between the vertices.
    pub fn grid_velocity(&self, xi: f64) -> f64 {
        0.5 * (1.0 - xi) * self.vertex_velocity[0] + 0.5 * (1.0 + xi) * self.vertex_velocity[1]
    }

    /// Position of face `side` (0 left, 1 right).
    pub fn face_point(&self, side: usize) -> f64 {
        if side == 0 { self.x0 } else { self.x1 }
    }
}

/// Outward unit normal of face `side` (0 left, 1 right).
pub fn face_normal(side: usize) -> f64 {
    if side == 0 { -1.0 } else { 1.0 }
}

#[derive(Debug, Clone)]
pub struct LineGrid {
    vertices: Vec<f64>,
    vertex_velocity: Vec<f64>,
    boundary_ids: [BoundaryId; 2],
    periodic: bool,
    /// `offsets[r]..offsets[r + 1]` are the cells of rank `r`.
    offsets: Vec<usize>,
    comm: Arc<UniverseComm>,
}

/// Balanced contiguous split of `n` cells over `size` ranks.
fn decompose(n: usize, size: usize) -> Vec<usize> {
    let base = n / size;
    let rem = n % size;
    let mut offsets = Vec::with_capacity(size + 1);
    offsets.push(0);
    for r in 0..size {
        let count = base + usize::from(r < rem);
        offsets.push(offsets[r] + count);
    }
    offsets
}

impl LineGrid {
    /// Uniform grid of `n_cells` cells on `[left, right]` with boundary ids 0 and 1.
    pub fn new(left: f64, right: f64, n_cells: usize, comm: Arc<UniverseComm>) -> Result<Self, DgError> {
        if n_cells == 0 {
            return Err(DgError::Config("grid needs at least one cell".to_string()));
        }
        if !(right > left) {
            return Err(DgError::Config(format!("empty interval [{left}, {right}]")));
        }
        let h = (right - left) / n_cells as f64;
        let vertices = (0..=n_cells).map(|i| left + i as f64 * h).collect();
        Self::from_vertices(vertices, comm)
    }

    /// Grid from strictly increasing vertex positions.
    pub fn from_vertices(vertices: Vec<f64>, comm: Arc<UniverseComm>) -> Result<Self, DgError> {
        if vertices.len() < 2 {
            return Err(DgError::Config("grid needs at least two vertices".to_string()));
        }
        if vertices.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(DgError::Config("grid vertices must be strictly increasing".to_string()));
        }
        let n_cells = vertices.len() - 1;
        let size = comm.size();
        if n_cells < size {
            return Err(DgError::Config(format!(
                "{n_cells} cells cannot be distributed over {size} ranks"
            )));
        }
        Ok(LineGrid {
            vertex_velocity: vec![0.0; vertices.len()],
            vertices,
            boundary_ids: [0, 1],
            periodic: false,
            offsets: decompose(n_cells, size),
            comm,
        })
    }

    /// Sets the ids of the left and right end.
    pub fn with_boundary_ids(mut self, left: BoundaryId, right: BoundaryId) -> Self {
        self.boundary_ids = [left, right];
        self
    }

    /// Pairs the two ends; their ids become periodic ids.
    pub fn with_periodicity(mut self) -> Self {
        self.periodic = true;
        self
    }

    pub fn comm(&self) -> &Arc<UniverseComm> {
        &self.comm
    }

    pub fn n_global_cells(&self) -> usize {
        self.vertices.len() - 1
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// Cells owned by this rank.
    pub fn locally_owned_cells(&self) -> Range<usize> {
        let rank = self.comm.rank();
        self.offsets[rank]..self.offsets[rank + 1]
    }

    /// Rank owning `cell`.
    pub fn owner_of(&self, cell: usize) -> usize {
        // offsets is sorted; the owner is the last rank starting at or before `cell`
        self.offsets.partition_point(|&start| start <= cell) - 1
    }

    /// Boundary ids present on the mesh that are not periodic.
    pub fn boundary_ids(&self) -> Vec<BoundaryId> {
        if self.periodic {
            return Vec::new();
        }
        let mut ids = self.boundary_ids.to_vec();
        ids.dedup();
        ids
    }

    /// Ids of the paired periodic ends.
    pub fn periodic_ids(&self) -> Vec<BoundaryId> {
        if !self.periodic {
            return Vec::new();
        }
        let mut ids = self.boundary_ids.to_vec();
        ids.dedup();
        ids
    }

    /// Neighbours across the left and right face of `cell`.
    pub fn face_neighbors(&self, cell: usize) -> [FaceNeighbor; 2] {
        let n = self.n_global_cells();
        let left = if cell > 0 {
            FaceNeighbor::Interior(cell - 1)
        } else if self.periodic {
            FaceNeighbor::Interior(n - 1)
        } else {
            FaceNeighbor::Boundary(self.boundary_ids[0])
        };
        let right = if cell + 1 < n {
            FaceNeighbor::Interior(cell + 1)
        } else if self.periodic {
            FaceNeighbor::Interior(0)
        } else {
            FaceNeighbor::Boundary(self.boundary_ids[1])
        };
        [left, right]
    }

    pub fn cell_geometry(&self, cell: usize) -> CellGeometry {
        let x0 = self.vertices[cell];
        let x1 = self.vertices[cell + 1];
        let h = x1 - x0;
        let surface_weight = self
            .face_neighbors(cell)
            .iter()
            .map(|f| match f {
                FaceNeighbor::Interior(_) => 0.5,
                FaceNeighbor::Boundary(_) => 1.0,
            })
            .sum();
        CellGeometry {
            x0,
            x1,
            h,
            jacobian: 0.5 * h,
            vertex_velocity: [self.vertex_velocity[cell], self.vertex_velocity[cell + 1]],
            surface_weight,
        }
    }

    /// Smallest cell size over all ranks (collective).
    pub fn minimum_element_length(&self) -> f64 {
        let local = self
            .locally_owned_cells()
            .map(|c| self.vertices[c + 1] - self.vertices[c])
            .fold(f64::INFINITY, f64::min);
        self.comm.all_reduce_min(local)
    }

    pub fn vertices(&self) -> &[f64] {
        &self.vertices
    }

    /// Replaces vertex positions and stores vertex velocities (ALE).
    ///
    /// Every geometry-derived quantity of operators built on this grid is stale
    /// afterwards and must be refreshed with `update_after_mesh_movement`.
    pub fn move_vertices(&mut self, positions: Vec<f64>, velocity: Vec<f64>) -> Result<(), DgError> {
        let expected = self.vertices.len();
        for found in [positions.len(), velocity.len()] {
            if found != expected {
                return Err(DgError::DimensionMismatch { expected, found });
            }
        }
        if positions.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(DgError::Config("mesh motion inverted a cell".to_string()));
        }
        self.vertices = positions;
        self.vertex_velocity = velocity;
        Ok(())
    }

    /// Merges pairs of cells for h-multigrid.
    ///
    /// Returns `None` when some rank owns an odd number of cells, since the parent of
    /// a cell pair must live on the rank owning both children.
    pub fn coarsen(&self) -> Option<LineGrid> {
        let even = self.offsets.iter().all(|o| o % 2 == 0);
        if !even || self.n_global_cells() < 2 {
            return None;
        }
        let offsets: Vec<usize> = self.offsets.iter().map(|o| o / 2).collect();
        if offsets.windows(2).any(|w| w[1] == w[0]) {
            return None;
        }
        Some(LineGrid {
            vertices: self.vertices.iter().step_by(2).copied().collect(),
            vertex_velocity: self.vertex_velocity.iter().step_by(2).copied().collect(),
            boundary_ids: self.boundary_ids,
            periodic: self.periodic,
            offsets,
            comm: Arc::clone(&self.comm),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> LineGrid {
        LineGrid::new(0.0, 1.0, n, Arc::new(UniverseComm::Serial)).unwrap()
    }

    #[test]
    fn decompose_is_balanced() {
        assert_eq!(decompose(10, 3), vec![0, 4, 7, 10]);
        assert_eq!(decompose(4, 4), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn neighbors_and_boundaries() {
        let g = grid(4).with_boundary_ids(3, 7);
        assert_eq!(g.face_neighbors(0), [FaceNeighbor::Boundary(3), FaceNeighbor::Interior(1)]);
        assert_eq!(g.face_neighbors(3), [FaceNeighbor::Interior(2), FaceNeighbor::Boundary(7)]);
        assert_eq!(g.boundary_ids(), vec![3, 7]);
        assert!(g.periodic_ids().is_empty());
        let p = g.with_periodicity();
        assert_eq!(p.face_neighbors(0)[0], FaceNeighbor::Interior(3));
        assert!(p.boundary_ids().is_empty());
        assert_eq!(p.periodic_ids(), vec![3, 7]);
    }

    #[test]
    fn geometry_of_cells() {
        let g = grid(4);
        let geo = g.cell_geometry(1);
        assert!((geo.h - 0.25).abs() < 1e-15);
        assert!((geo.jacobian - 0.125).abs() < 1e-15);
        assert!((geo.map(0.0) - 0.375).abs() < 1e-15);
        assert_eq!(geo.surface_weight, 1.0);
        assert_eq!(g.cell_geometry(0).surface_weight, 1.5);
        assert!((g.minimum_element_length() - 0.25).abs() < 1e-15);
    }

    #[test]
    fn coarsen_merges_pairs() {
        let g = grid(8);
        let c = g.coarsen().unwrap();
        assert_eq!(c.n_global_cells(), 4);
        assert_eq!(c.vertices(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(grid(3).coarsen().is_none());
    }

    #[test]
    fn moving_vertices_checks_orientation() {
        let mut g = grid(2);
        assert!(g.move_vertices(vec![0.0, 0.6, 1.0], vec![0.0, 0.1, 0.0]).is_ok());
        assert_eq!(g.cell_geometry(0).vertex_velocity, [0.0, 0.1]);
        assert!(g.move_vertices(vec![0.0, 1.2, 1.0], vec![0.0; 3]).is_err());
        assert!(g.move_vertices(vec![0.0, 1.0], vec![0.0; 2]).is_err());
    }
}
