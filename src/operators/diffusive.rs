//! Symmetric interior penalty discretization of `-ν ∂²u/∂x²`.
//!
//! Face terms use the average normal gradient, the jump `[u] = u⁻ - u⁺` and the
//! penalty `τ = IP · (p + 1)² · |∂K| / |K|`, taking the larger of the two cells on
//! interior faces. Boundary data follow the mirror principle: Dirichlet sets
//! `u⁺ = -u⁻ + 2g` with `∂u⁺ = ∂u⁻`, Neumann sets `u⁺ = u⁻` with
//! `∂u⁺·n = -∂u⁻·n + 2h`.
//!
//! # References
//! - Hillewaert (2013): Development of the discontinuous Galerkin method for
//!   high-resolution, large scale CFD and acoustics in industrial geometries.

use std::sync::Arc;

use crate::boundary::{BoundaryDescriptor, BoundaryValue};
use crate::fe::{DofSpace, QUAD_STANDARD};
use crate::grid::{CellGeometry, face_normal};
use crate::operators::integrator::{CellEval, CellKernel, Exterior};
use crate::operators::{Operator, OperatorType};

#[derive(Debug, Clone, Copy)]
pub struct DiffusiveKernelData {
    pub diffusivity: f64,
    /// Interior penalty factor `IP`.
    pub ip_factor: f64,
}

#[derive(Clone)]
pub struct DiffusiveKernel {
    data: DiffusiveKernelData,
    boundary: Arc<BoundaryDescriptor>,
}

impl DiffusiveKernel {
    pub fn new(data: DiffusiveKernelData, boundary: Arc<BoundaryDescriptor>) -> Self {
        DiffusiveKernel { data, boundary }
    }

    pub fn data(&self) -> &DiffusiveKernelData {
        &self.data
    }

    /// Penalty parameter of one cell.
    pub fn penalty(&self, degree: usize, geometry: &CellGeometry) -> f64 {
        let p1 = (degree + 1) as f64;
        self.data.ip_factor * p1 * p1 * geometry.surface_weight / geometry.h
    }
}

impl CellKernel for DiffusiveKernel {
    fn integrate(&self, eval: &CellEval<'_>, op_type: OperatorType, out: &mut [f64]) {
        let nu = self.data.diffusivity;
        let shape = &eval.shapes[QUAD_STANDARD];
        let geometry = eval.geometry;
        let inv_jac = 2.0 / geometry.h;

        if op_type != OperatorType::Inhomogeneous {
            for q in 0..shape.n_q_points() {
                let flux = shape.weights()[q] * nu * inv_jac * shape.derivative_at(eval.values, q);
                for (o, dphi) in out.iter_mut().zip(shape.gradients_at(q)) {
                    *o += flux * dphi;
                }
            }
        }

        let tau_m = self.penalty(shape.degree(), geometry);
        for side in 0..2 {
            let normal = face_normal(side);
            let (u_m, du_m) = shape.face_trace(eval.values, side);
            let grad_m = du_m * inv_jac * normal;
            let (jump, average_gradient, tau) = match eval.exterior[side] {
                Exterior::Cell { cell, values } => {
                    if op_type == OperatorType::Inhomogeneous {
                        continue;
                    }
                    let neighbor = eval.mapping.geometry(cell);
                    let (u_p, du_p) = shape.face_trace(values, 1 - side);
                    let grad_p = du_p * 2.0 / neighbor.h * normal;
                    let tau = tau_m.max(self.penalty(shape.degree(), neighbor));
                    (u_m - u_p, 0.5 * (grad_m + grad_p), tau)
                }
                Exterior::Boundary(id) => {
                    let x = geometry.face_point(side);
                    let data = |v: f64| if op_type == OperatorType::Homogeneous { 0.0 } else { v };
                    match self.boundary.value(id, x, eval.time) {
                        BoundaryValue::Dirichlet(g) => (2.0 * (u_m - data(g)), grad_m, tau_m),
                        BoundaryValue::Neumann(h) => (0.0, data(h), tau_m),
                    }
                }
            };
            let value_flux = nu * (average_gradient - tau * jump);
            let gradient_flux = -0.5 * nu * jump * normal * inv_jac;
            for ((o, phi), dphi) in out.iter_mut().zip(shape.face_values(side)).zip(shape.face_gradients(side)) {
                *o += -value_flux * phi + gradient_flux * dphi;
            }
        }
    }
}

#[derive(Clone)]
pub struct DiffusiveOperator {
    space: DofSpace,
    kernel: DiffusiveKernel,
}

impl DiffusiveOperator {
    pub fn new(space: DofSpace, kernel: DiffusiveKernel) -> Self {
        DiffusiveOperator { space, kernel }
    }

    pub fn kernel(&self) -> &DiffusiveKernel {
        &self.kernel
    }
}

impl Operator for DiffusiveOperator {
    fn space(&self) -> &DofSpace {
        &self.space
    }

    fn kernels(&self) -> Vec<&dyn CellKernel> {
        vec![&self.kernel]
    }

    fn update_after_mesh_movement(&mut self, space: &DofSpace) {
        self.space = space.clone();
    }
}
