//! Owned/ghost layout of the cell-wise DoF blocks of one rank.
//!
//! DoFs are stored element-major: the `n` values of owned cell `c` occupy
//! `data[c * n..(c + 1) * n]`. Ghost cells are the face neighbours of owned cells
//! that live on another rank; their values are fetched by [`Partitioner::exchange_ghosts`],
//! the only place where neighbour-owned data enters a rank.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::Arc;

use crate::grid::{BoundaryId, FaceNeighbor, LineGrid};
use crate::parallel::{Comm, UniverseComm};

/// Local address of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRef {
    /// Index into the owned range.
    Owned(usize),
    /// Slot in the ghost buffer.
    Ghost(usize),
}

/// What lies across one face of an owned cell, in local terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbor {
    Cell { global: usize, cell: CellRef },
    Boundary(BoundaryId),
}

pub struct Partitioner {
    dofs_per_cell: usize,
    n_global_cells: usize,
    owned: Range<usize>,
    ghost_cells: Vec<usize>,
    neighbors: Vec<[Neighbor; 2]>,
    /// Owned cells each peer needs, sorted by global index.
    send_plan: Vec<(usize, Vec<usize>)>,
    /// Ghost slots filled by each peer, sorted by global index.
    recv_plan: Vec<(usize, Vec<usize>)>,
    comm: Arc<UniverseComm>,
}

impl std::fmt::Debug for Partitioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partitioner")
            .field("dofs_per_cell", &self.dofs_per_cell)
            .field("owned", &self.owned)
            .field("ghost_cells", &self.ghost_cells)
            .field("comm", &self.comm)
            .finish()
    }
}

impl Partitioner {
    pub fn new(grid: &LineGrid, dofs_per_cell: usize) -> Self {
        let owned = grid.locally_owned_cells();
        let mut ghosts = BTreeSet::new();
        let mut sends: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        for cell in owned.clone() {
            for face in grid.face_neighbors(cell) {
                if let FaceNeighbor::Interior(other) = face {
                    if !owned.contains(&other) {
                        ghosts.insert(other);
                        sends.entry(grid.owner_of(other)).or_default().insert(cell - owned.start);
                    }
                }
            }
        }
        let ghost_cells: Vec<usize> = ghosts.into_iter().collect();
        let slot_of = |global: usize| ghost_cells.binary_search(&global).ok();

        let mut recv: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (slot, &global) in ghost_cells.iter().enumerate() {
            recv.entry(grid.owner_of(global)).or_default().push(slot);
        }

        let neighbors = owned
            .clone()
            .map(|cell| {
                grid.face_neighbors(cell).map(|face| match face {
                    FaceNeighbor::Boundary(id) => Neighbor::Boundary(id),
                    FaceNeighbor::Interior(global) => {
                        let cell = if owned.contains(&global) {
                            CellRef::Owned(global - owned.start)
                        } else {
                            // every off-rank neighbour was registered above
                            CellRef::Ghost(slot_of(global).unwrap_or_default())
                        };
                        Neighbor::Cell { global, cell }
                    }
                })
            })
            .collect();

        Partitioner {
            dofs_per_cell,
            n_global_cells: grid.n_global_cells(),
            owned,
            neighbors,
            send_plan: sends.into_iter().map(|(r, cells)| (r, cells.into_iter().collect())).collect(),
            recv_plan: recv.into_iter().collect(),
            ghost_cells,
            comm: Arc::clone(grid.comm()),
        }
    }

    pub fn dofs_per_cell(&self) -> usize {
        self.dofs_per_cell
    }

    pub fn n_owned_cells(&self) -> usize {
        self.owned.len()
    }

    pub fn n_global_cells(&self) -> usize {
        self.n_global_cells
    }

    pub fn owned_cells(&self) -> Range<usize> {
        self.owned.clone()
    }

    pub fn ghost_cells(&self) -> &[usize] {
        &self.ghost_cells
    }

    pub fn n_owned_dofs(&self) -> usize {
        self.owned.len() * self.dofs_per_cell
    }

    pub fn n_global_dofs(&self) -> usize {
        self.n_global_cells * self.dofs_per_cell
    }

    /// Face neighbours of every owned cell.
    pub fn neighbors(&self) -> &[[Neighbor; 2]] {
        &self.neighbors
    }

    pub fn comm(&self) -> &UniverseComm {
        &self.comm
    }

    /// True if both layouts describe the same cells with the same block size.
    pub fn is_compatible(&self, other: &Partitioner) -> bool {
        self.dofs_per_cell == other.dofs_per_cell
            && self.owned == other.owned
            && self.n_global_cells == other.n_global_cells
    }

    /// Collective: returns the values of all ghost cells, slot-major.
    pub fn exchange_ghosts(&self, owned_values: &[f64]) -> Vec<f64> {
        let n = self.dofs_per_cell;
        let mut ghosts = vec![0.0; self.ghost_cells.len() * n];
        let sends = self
            .send_plan
            .iter()
            .map(|(rank, cells)| {
                let mut buffer = Vec::with_capacity(cells.len() * n);
                for &c in cells {
                    buffer.extend_from_slice(&owned_values[c * n..(c + 1) * n]);
                }
                (*rank, buffer)
            })
            .collect();
        for (rank, buffer) in self.comm.exchange(sends) {
            let Some((_, slots)) = self.recv_plan.iter().find(|(r, _)| *r == rank) else {
                continue;
            };
            for (k, &slot) in slots.iter().enumerate() {
                ghosts[slot * n..(slot + 1) * n].copy_from_slice(&buffer[k * n..(k + 1) * n]);
            }
        }
        ghosts
    }
}
