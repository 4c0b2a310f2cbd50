//! Grid transfer between multigrid levels.
//!
//! Both transfers act cell-locally: a p-transfer maps between two polynomial
//! degrees on the same cell, an h-transfer maps one parent cell onto its two
//! children. Prolongation is the nodal interpolation of the coarse polynomial at
//! the fine nodes, restriction its transpose. `interpolate` carries a field (the
//! velocity or the linearization point) from the fine to the coarse level by
//! evaluating the fine polynomial at the coarse nodes.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::core::traits::DofVector;
use crate::core::vector::DistributedVector;
use crate::error::DgError;
use crate::fe::shape::lagrange;
use crate::fe::{DofSpace, QUAD_STANDARD};

/// `y = A x` for a row-major `rows × cols` matrix.
fn mat_vec(a: &[f64], rows: usize, cols: usize, x: &[f64], y: &mut [f64]) {
    for i in 0..rows {
        y[i] = (0..cols).map(|j| a[i * cols + j] * x[j]).sum();
    }
}

/// `y += A x`
fn mat_vec_add(a: &[f64], rows: usize, cols: usize, x: &[f64], y: &mut [f64]) {
    for i in 0..rows {
        y[i] += (0..cols).map(|j| a[i * cols + j] * x[j]).sum::<f64>();
    }
}

/// `y += Aᵀ x`
fn mat_t_vec_add(a: &[f64], rows: usize, cols: usize, x: &[f64], y: &mut [f64]) {
    for j in 0..cols {
        y[j] += (0..rows).map(|i| a[i * cols + j] * x[i]).sum::<f64>();
    }
}

fn check_cells(fine: &DofSpace, coarse: &DofSpace, ratio: usize) -> Result<(), DgError> {
    let expected = ratio * coarse.n_owned_cells();
    if fine.n_owned_cells() != expected {
        return Err(DgError::DimensionMismatch { expected, found: fine.n_owned_cells() });
    }
    Ok(())
}

/// Transfer between degrees `p_f` and `p_c` on the same mesh.
#[derive(Debug, Clone)]
pub struct PTransfer {
    n_fine: usize,
    n_coarse: usize,
    /// `prolongation[i * n_coarse + j] = φ_j^c(ξ_i^f)`
    prolongation: Vec<f64>,
    /// `interpolation[i * n_fine + j] = φ_j^f(ξ_i^c)`
    interpolation: Vec<f64>,
}

impl PTransfer {
    pub fn new(fine: &DofSpace, coarse: &DofSpace) -> Result<Self, DgError> {
        check_cells(fine, coarse, 1)?;
        if coarse.degree() > fine.degree() {
            return Err(DgError::Config(format!(
                "coarse degree {} exceeds fine degree {}",
                coarse.degree(),
                fine.degree()
            )));
        }
        let fine_nodes = fine.shape(QUAD_STANDARD).nodes();
        let coarse_nodes = coarse.shape(QUAD_STANDARD).nodes();
        let (n_fine, n_coarse) = (fine_nodes.len(), coarse_nodes.len());
        let mut prolongation = Vec::with_capacity(n_fine * n_coarse);
        for &xi in fine_nodes {
            prolongation.extend((0..n_coarse).map(|j| lagrange(coarse_nodes, j, xi)));
        }
        let mut interpolation = Vec::with_capacity(n_fine * n_coarse);
        for &xi in coarse_nodes {
            interpolation.extend((0..n_fine).map(|j| lagrange(fine_nodes, j, xi)));
        }
        Ok(PTransfer { n_fine, n_coarse, prolongation, interpolation })
    }

    fn prolongate_add(&self, coarse: &[f64], fine: &mut [f64]) {
        let (nf, nc) = (self.n_fine, self.n_coarse);
        let body = |(c, fc): (usize, &mut [f64])| {
            mat_vec_add(&self.prolongation, nf, nc, &coarse[c * nc..(c + 1) * nc], fc);
        };
        #[cfg(feature = "rayon")]
        fine.par_chunks_mut(nf).enumerate().for_each(body);
        #[cfg(not(feature = "rayon"))]
        fine.chunks_mut(nf).enumerate().for_each(body);
    }

    fn restrict(&self, fine: &[f64], coarse: &mut [f64]) {
        let (nf, nc) = (self.n_fine, self.n_coarse);
        let body = |(c, cc): (usize, &mut [f64])| {
            cc.fill(0.0);
            mat_t_vec_add(&self.prolongation, nf, nc, &fine[c * nf..(c + 1) * nf], cc);
        };
        #[cfg(feature = "rayon")]
        coarse.par_chunks_mut(nc).enumerate().for_each(body);
        #[cfg(not(feature = "rayon"))]
        coarse.chunks_mut(nc).enumerate().for_each(body);
    }

    fn interpolate(&self, fine: &[f64], coarse: &mut [f64]) {
        let (nf, nc) = (self.n_fine, self.n_coarse);
        for (c, cc) in coarse.chunks_mut(nc).enumerate() {
            mat_vec(&self.interpolation, nc, nf, &fine[c * nf..(c + 1) * nf], cc);
        }
    }
}

/// Transfer between a mesh and its pairwise coarsening, same degree.
///
/// Coarse cell `c` is the parent of the local fine cells `2c` and `2c + 1`. The
/// matrices are built from the actual vertex positions, so graded and moved
/// meshes are handled.
#[derive(Debug, Clone)]
pub struct HTransfer {
    n: usize,
    /// Per coarse cell, the `n × n` prolongations onto the left and right child.
    prolongation: Vec<f64>,
    /// Per coarse cell, `n × 2n`: coarse nodal values from both children.
    interpolation: Vec<f64>,
}

impl HTransfer {
    pub fn new(fine: &DofSpace, coarse: &DofSpace) -> Result<Self, DgError> {
        check_cells(fine, coarse, 2)?;
        if fine.degree() != coarse.degree() {
            return Err(DgError::Config(format!(
                "h-transfer between degrees {} and {}",
                fine.degree(),
                coarse.degree()
            )));
        }
        let nodes = fine.shape(QUAD_STANDARD).nodes();
        let n = nodes.len();
        let fine_cells = fine.mapping().owned();
        let mut prolongation = Vec::with_capacity(coarse.n_owned_cells() * 2 * n * n);
        let mut interpolation = Vec::with_capacity(coarse.n_owned_cells() * 2 * n * n);
        for (c, parent) in coarse.mapping().owned().iter().enumerate() {
            let children = [&fine_cells[2 * c], &fine_cells[2 * c + 1]];
            for child in children {
                for &xi in nodes {
                    let x = child.map(xi);
                    let xi_parent = -1.0 + 2.0 * (x - parent.x0) / parent.h;
                    prolongation.extend((0..n).map(|j| lagrange(nodes, j, xi_parent)));
                }
            }
            let midpoint = children[0].x1;
            for &xi in nodes {
                let x = parent.map(xi);
                let mut row = vec![0.0; 2 * n];
                let weight_left = if (x - midpoint).abs() <= 1e-12 * parent.h {
                    0.5
                } else if x < midpoint {
                    1.0
                } else {
                    0.0
                };
                for (k, child) in children.iter().enumerate() {
                    let weight = if k == 0 { weight_left } else { 1.0 - weight_left };
                    if weight == 0.0 {
                        continue;
                    }
                    let xi_child = -1.0 + 2.0 * (x - child.x0) / child.h;
                    for j in 0..n {
                        row[k * n + j] = weight * lagrange(nodes, j, xi_child);
                    }
                }
                interpolation.extend(row);
            }
        }
        Ok(HTransfer { n, prolongation, interpolation })
    }

    fn prolongate_add(&self, coarse: &[f64], fine: &mut [f64]) {
        let n = self.n;
        let body = |(c, fc): (usize, &mut [f64])| {
            let uc = &coarse[c * n..(c + 1) * n];
            let matrices = &self.prolongation[c * 2 * n * n..(c + 1) * 2 * n * n];
            mat_vec_add(matrices, 2 * n, n, uc, fc);
        };
        #[cfg(feature = "rayon")]
        fine.par_chunks_mut(2 * n).enumerate().for_each(body);
        #[cfg(not(feature = "rayon"))]
        fine.chunks_mut(2 * n).enumerate().for_each(body);
    }

    fn restrict(&self, fine: &[f64], coarse: &mut [f64]) {
        let n = self.n;
        let body = |(c, cc): (usize, &mut [f64])| {
            cc.fill(0.0);
            let matrices = &self.prolongation[c * 2 * n * n..(c + 1) * 2 * n * n];
            mat_t_vec_add(matrices, 2 * n, n, &fine[c * 2 * n..(c + 1) * 2 * n], cc);
        };
        #[cfg(feature = "rayon")]
        coarse.par_chunks_mut(n).enumerate().for_each(body);
        #[cfg(not(feature = "rayon"))]
        coarse.chunks_mut(n).enumerate().for_each(body);
    }

    fn interpolate(&self, fine: &[f64], coarse: &mut [f64]) {
        let n = self.n;
        for (c, cc) in coarse.chunks_mut(n).enumerate() {
            let matrix = &self.interpolation[c * 2 * n * n..(c + 1) * 2 * n * n];
            mat_vec(matrix, n, 2 * n, &fine[c * 2 * n..(c + 1) * 2 * n], cc);
        }
    }
}

/// Transfer from one multigrid level to the next coarser one.
#[derive(Debug, Clone)]
pub enum LevelTransfer {
    P(PTransfer),
    H(HTransfer),
}

impl LevelTransfer {
    /// `fine += P coarse`
    pub fn prolongate_add(&self, coarse: &DistributedVector, fine: &mut DistributedVector) {
        match self {
            LevelTransfer::P(t) => t.prolongate_add(coarse.as_slice(), fine.as_mut_slice()),
            LevelTransfer::H(t) => t.prolongate_add(coarse.as_slice(), fine.as_mut_slice()),
        }
    }

    /// `coarse = Pᵀ fine`
    pub fn restrict(&self, fine: &DistributedVector, coarse: &mut DistributedVector) {
        match self {
            LevelTransfer::P(t) => t.restrict(fine.as_slice(), coarse.as_mut_slice()),
            LevelTransfer::H(t) => t.restrict(fine.as_slice(), coarse.as_mut_slice()),
        }
    }

    /// Coarse nodal values of the fine field.
    pub fn interpolate(&self, fine: &DistributedVector, coarse: &mut DistributedVector) {
        match self {
            LevelTransfer::P(t) => t.interpolate(fine.as_slice(), coarse.as_mut_slice()),
            LevelTransfer::H(t) => t.interpolate(fine.as_slice(), coarse.as_mut_slice()),
        }
    }
}
