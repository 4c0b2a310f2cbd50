//! Boundary descriptor: boundary id → kind and prescribed data.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::DgError;
use crate::functions::{Function, FunctionCached};
use crate::grid::{BoundaryId, LineGrid};

/// Kind of boundary condition of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryType {
    Dirichlet,
    DirichletCached,
    Neumann,
    Symmetry,
    Undefined,
}

/// Resolved boundary data at one face point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryValue {
    /// Prescribed value `g`.
    Dirichlet(f64),
    /// Prescribed normal derivative `h = ∂u/∂n`.
    Neumann(f64),
}

#[derive(Default, Clone)]
pub struct BoundaryDescriptor {
    dirichlet: BTreeMap<BoundaryId, Arc<dyn Function>>,
    dirichlet_cached: BTreeSet<BoundaryId>,
    neumann: BTreeMap<BoundaryId, Arc<dyn Function>>,
    symmetry: BTreeSet<BoundaryId>,
    cached: Arc<FunctionCached>,
}

impl BoundaryDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dirichlet(mut self, id: BoundaryId, g: impl Function + 'static) -> Self {
        self.dirichlet.insert(id, Arc::new(g));
        self
    }

    /// Dirichlet data taken from the shared [`FunctionCached`].
    pub fn with_dirichlet_cached(mut self, id: BoundaryId) -> Self {
        self.dirichlet_cached.insert(id);
        self
    }

    /// Neumann data `h = ∂u/∂n` (outward normal).
    pub fn with_neumann(mut self, id: BoundaryId, h: impl Function + 'static) -> Self {
        self.neumann.insert(id, Arc::new(h));
        self
    }

    pub fn with_symmetry(mut self, id: BoundaryId) -> Self {
        self.symmetry.insert(id);
        self
    }

    /// Store of externally supplied boundary values.
    pub fn cached_values(&self) -> &Arc<FunctionCached> {
        &self.cached
    }

    fn matches(&self, id: BoundaryId) -> usize {
        usize::from(self.dirichlet.contains_key(&id))
            + usize::from(self.dirichlet_cached.contains(&id))
            + usize::from(self.neumann.contains_key(&id))
            + usize::from(self.symmetry.contains(&id))
    }

    pub fn get_boundary_type(&self, id: BoundaryId) -> BoundaryType {
        if self.dirichlet.contains_key(&id) {
            BoundaryType::Dirichlet
        } else if self.dirichlet_cached.contains(&id) {
            BoundaryType::DirichletCached
        } else if self.neumann.contains_key(&id) {
            BoundaryType::Neumann
        } else if self.symmetry.contains(&id) {
            BoundaryType::Symmetry
        } else {
            BoundaryType::Undefined
        }
    }

    /// Data at point `x` and time `t` on boundary `id`. Symmetry and undefined ids
    /// read as homogeneous Neumann.
    pub fn value(&self, id: BoundaryId, x: f64, t: f64) -> BoundaryValue {
        if let Some(g) = self.dirichlet.get(&id) {
            BoundaryValue::Dirichlet(g.value(x, t))
        } else if self.dirichlet_cached.contains(&id) {
            BoundaryValue::Dirichlet(self.cached.get(id))
        } else if let Some(h) = self.neumann.get(&id) {
            BoundaryValue::Neumann(h.value(x, t))
        } else {
            BoundaryValue::Neumann(0.0)
        }
    }

    /// Every non-periodic boundary id of the mesh must match exactly one kind.
    /// Periodic ids count as one match, so they must not carry a kind.
    pub fn verify(&self, grid: &LineGrid) -> Result<(), DgError> {
        for id in grid.boundary_ids() {
            let matches = self.matches(id);
            if matches != 1 {
                return Err(DgError::Boundary { boundary_id: id, matches });
            }
        }
        for id in grid.periodic_ids() {
            let matches = self.matches(id) + 1;
            if matches != 1 {
                return Err(DgError::Boundary { boundary_id: id, matches });
            }
        }
        Ok(())
    }
}
