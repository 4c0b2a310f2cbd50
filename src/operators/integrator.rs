//! Cell-centric matrix-free loop.
//!
//! Every owned cell integrates its own volume term and its own side of both faces,
//! reading the traces of the neighbour cells. Each cell therefore writes only its
//! own DoF block, so the loop runs over disjoint chunks of the destination vector
//! without synchronisation (rayon `par_chunks_mut` when the feature is on). The same
//! kernels probed with unit vectors on a single cell give the exact diagonal blocks
//! of the operator.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::core::partitioner::{CellRef, Neighbor};
use crate::core::traits::DofVector;
use crate::core::vector::{DistributedVector, GhostedValues};
use crate::error::DgError;
use crate::fe::{DofSpace, Mapping, ShapeInfo};
use crate::grid::{BoundaryId, CellGeometry};
use crate::operators::{OperatorContext, OperatorType};

/// Data across one face of the cell being integrated.
#[derive(Clone, Copy)]
pub enum Exterior<'a> {
    /// Neighbour cell with the values of the evaluated field.
    Cell { cell: CellRef, values: &'a [f64] },
    Boundary(BoundaryId),
}

/// Everything a kernel sees while integrating one cell.
pub struct CellEval<'a> {
    /// Local index of the owned cell.
    pub cell: usize,
    pub geometry: &'a CellGeometry,
    /// DoF values of the evaluated field on this cell.
    pub values: &'a [f64],
    /// Left and right neighbours.
    pub exterior: [Exterior<'a>; 2],
    pub mapping: &'a Mapping,
    pub shapes: &'a [ShapeInfo],
    pub time: f64,
    pub scaling_factor_mass: f64,
    pub velocity: Option<&'a GhostedValues<'a>>,
    pub linearization: Option<&'a GhostedValues<'a>>,
}

/// Pointwise physics of one weak-form term.
pub trait CellKernel: Send + Sync {
    /// Adds this term's contribution on `eval.cell` to `out`.
    fn integrate(&self, eval: &CellEval<'_>, op_type: OperatorType, out: &mut [f64]);

    /// Checks that the context carries what the kernel reads.
    fn validate(&self, _ctx: &OperatorContext<'_>) -> Result<(), DgError> {
        Ok(())
    }
}

/// Fails unless `v` is laid out on `space`.
pub fn check_layout(space: &DofSpace, v: &DistributedVector) -> Result<(), DgError> {
    let expected = space.partitioner().n_owned_dofs();
    if v.len() != expected || !space.partitioner().is_compatible(v.partitioner()) {
        return Err(DgError::DimensionMismatch { expected, found: v.len() });
    }
    Ok(())
}

/// `dst += factor * A(src)` restricted to the part selected by `op_type`.
///
/// Collective: ghost values of `src` and of the context vectors are exchanged first.
pub(crate) fn cell_loop(
    space: &DofSpace,
    kernels: &[&dyn CellKernel],
    src: Option<&DistributedVector>,
    ctx: &OperatorContext<'_>,
    op_type: OperatorType,
    factor: f64,
    dst: &mut DistributedVector,
) {
    if kernels.is_empty() {
        return;
    }
    let n = space.dofs_per_cell();
    let zeros = vec![0.0; n];
    let src_values = match (op_type, src) {
        (OperatorType::Inhomogeneous, _) | (_, None) => None,
        (_, Some(v)) => Some(v.ghost_values()),
    };
    let velocity = ctx.velocity.map(|v| v.ghost_values());
    let linearization = ctx.linearization.map(|v| v.ghost_values());
    let mapping = space.mapping();
    let shapes = space.shapes();
    let neighbors = space.partitioner().neighbors();
    let (time, scaling_factor_mass) = (ctx.time, ctx.scaling_factor_mass);

    let body = |(c, block): (usize, &mut [f64])| {
        let field = |cell: CellRef| match &src_values {
            Some(g) => g.cell(cell),
            None => &zeros[..],
        };
        let eval = CellEval {
            cell: c,
            geometry: &mapping.owned()[c],
            values: field(CellRef::Owned(c)),
            exterior: neighbors[c].map(|nb| match nb {
                Neighbor::Cell { cell, .. } => Exterior::Cell { cell, values: field(cell) },
                Neighbor::Boundary(id) => Exterior::Boundary(id),
            }),
            mapping,
            shapes,
            time,
            scaling_factor_mass,
            velocity: velocity.as_ref(),
            linearization: linearization.as_ref(),
        };
        let mut out = vec![0.0; n];
        for kernel in kernels {
            kernel.integrate(&eval, op_type, &mut out);
        }
        for (d, o) in block.iter_mut().zip(&out) {
            *d += factor * o;
        }
    };

    #[cfg(feature = "rayon")]
    dst.as_mut_slice().par_chunks_mut(n).enumerate().for_each(body);
    #[cfg(not(feature = "rayon"))]
    dst.as_mut_slice().chunks_mut(n).enumerate().for_each(body);
}

/// Diagonal blocks of the homogeneous operator, one `n × n` column-major block per
/// owned cell, by probing each cell with unit vectors while neighbours stay zero.
/// A cell that is its own periodic neighbour sees the probe on both sides.
pub(crate) fn cell_blocks(space: &DofSpace, kernels: &[&dyn CellKernel], ctx: &OperatorContext<'_>) -> Vec<f64> {
    let n = space.dofs_per_cell();
    let mut blocks = vec![0.0; space.n_owned_cells() * n * n];
    let zeros = vec![0.0; n];
    let velocity = ctx.velocity.map(|v| v.ghost_values());
    let linearization = ctx.linearization.map(|v| v.ghost_values());
    let mapping = space.mapping();
    let shapes = space.shapes();
    let neighbors = space.partitioner().neighbors();
    let (time, scaling_factor_mass) = (ctx.time, ctx.scaling_factor_mass);

    let body = |(c, block): (usize, &mut [f64])| {
        let mut unit = vec![0.0; n];
        let mut out = vec![0.0; n];
        for j in 0..n {
            unit.iter_mut().for_each(|u| *u = 0.0);
            unit[j] = 1.0;
            out.iter_mut().for_each(|o| *o = 0.0);
            let eval = CellEval {
                cell: c,
                geometry: &mapping.owned()[c],
                values: &unit,
                exterior: neighbors[c].map(|nb| match nb {
                    Neighbor::Cell { cell, .. } if cell == CellRef::Owned(c) => Exterior::Cell { cell, values: &unit },
                    Neighbor::Cell { cell, .. } => Exterior::Cell { cell, values: &zeros },
                    Neighbor::Boundary(id) => Exterior::Boundary(id),
                }),
                mapping,
                shapes,
                time,
                scaling_factor_mass,
                velocity: velocity.as_ref(),
                linearization: linearization.as_ref(),
            };
            for kernel in kernels {
                kernel.integrate(&eval, OperatorType::Homogeneous, &mut out);
            }
            block[j * n..(j + 1) * n].copy_from_slice(&out);
        }
    };

    #[cfg(feature = "rayon")]
    blocks.par_chunks_mut(n * n).enumerate().for_each(body);
    #[cfg(not(feature = "rayon"))]
    blocks.chunks_mut(n * n).enumerate().for_each(body);
    blocks
}

/// Extracts the diagonal of column-major cell blocks.
pub(crate) fn diagonal_of_blocks(n: usize, blocks: &[f64], dst: &mut [f64]) {
    for (c, block) in blocks.chunks(n * n).enumerate() {
        for i in 0..n {
            dst[c * n + i] = block[i * n + i];
        }
    }
}
