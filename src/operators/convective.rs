//! Convective term in divergence form, `-(∂v/∂x, a u) + <v, F*(u)·n>`.
//!
//! The numerical flux is either the central flux or the local Lax–Friedrichs flux.
//! Boundary data follow the mirror principle: on Dirichlet boundaries the exterior
//! value is `u⁺ = -u⁻ + 2g`, on Neumann and symmetry boundaries `u⁺ = u⁻`; the
//! exterior velocity always equals the interior one. On a moving mesh the grid
//! velocity is subtracted from the transport velocity.

use std::sync::Arc;

use crate::boundary::{BoundaryDescriptor, BoundaryValue};
use crate::config::{NumericalFluxConvectiveOperator, TypeVelocityField};
use crate::core::partitioner::CellRef;
use crate::error::DgError;
use crate::fe::DofSpace;
use crate::functions::Function;
use crate::grid::face_normal;
use crate::operators::integrator::{CellEval, CellKernel, Exterior};
use crate::operators::{Operator, OperatorContext, OperatorType};

#[derive(Debug, Clone, Copy)]
pub struct ConvectiveKernelData {
    pub type_velocity_field: TypeVelocityField,
    pub numerical_flux: NumericalFluxConvectiveOperator,
    /// Quadrature used for the volume integral.
    pub quad_index: usize,
    /// Subtract the grid velocity.
    pub ale: bool,
}

#[derive(Clone)]
pub struct ConvectiveKernel {
    data: ConvectiveKernelData,
    velocity: Arc<dyn Function>,
    boundary: Arc<BoundaryDescriptor>,
}

impl ConvectiveKernel {
    pub fn new(data: ConvectiveKernelData, velocity: Arc<dyn Function>, boundary: Arc<BoundaryDescriptor>) -> Self {
        ConvectiveKernel { data, velocity, boundary }
    }

    pub fn data(&self) -> &ConvectiveKernelData {
        &self.data
    }

    /// Transport velocity relative to the mesh at reference point `xi` of `cell`.
    /// `interpolated` evaluates the velocity vector there.
    fn velocity_at(&self, eval: &CellEval<'_>, cell: CellRef, xi: f64, interpolated: impl FnOnce() -> f64) -> f64 {
        let geometry = eval.mapping.geometry(cell);
        let a = match self.data.type_velocity_field {
            TypeVelocityField::Function => self.velocity.value(geometry.map(xi), eval.time),
            TypeVelocityField::DoFVector => interpolated(),
        };
        if self.data.ale { a - geometry.grid_velocity(xi) } else { a }
    }

    fn cell_velocity<'e>(&self, eval: &'e CellEval<'_>, cell: CellRef) -> &'e [f64] {
        match eval.velocity {
            Some(v) => v.cell(cell),
            None => &[],
        }
    }

    pub fn numerical_flux(&self, u_m: f64, u_p: f64, a_m: f64, a_p: f64, normal: f64) -> f64 {
        let average = 0.5 * (a_m * u_m + a_p * u_p) * normal;
        match self.data.numerical_flux {
            NumericalFluxConvectiveOperator::CentralFlux => average,
            NumericalFluxConvectiveOperator::LaxFriedrichsFlux => {
                let lambda = (a_m * normal).abs().max((a_p * normal).abs());
                average + 0.5 * lambda * (u_m - u_p)
            }
        }
    }
}

impl CellKernel for ConvectiveKernel {
    fn validate(&self, ctx: &OperatorContext<'_>) -> Result<(), DgError> {
        if self.data.type_velocity_field == TypeVelocityField::DoFVector && ctx.velocity.is_none() {
            return Err(DgError::MissingVelocity);
        }
        Ok(())
    }

    fn integrate(&self, eval: &CellEval<'_>, op_type: OperatorType, out: &mut [f64]) {
        let own = CellRef::Owned(eval.cell);
        let own_velocity = self.cell_velocity(eval, own);

        if op_type != OperatorType::Inhomogeneous {
            let shape = &eval.shapes[self.data.quad_index];
            for (q, &xi) in shape.points().iter().enumerate() {
                let a = self.velocity_at(eval, own, xi, || shape.interpolate_at(own_velocity, q));
                // the reference derivative times 2/h cancels the Jacobian h/2
                let flux = shape.weights()[q] * a * shape.interpolate_at(eval.values, q);
                for (o, dphi) in out.iter_mut().zip(shape.gradients_at(q)) {
                    *o -= flux * dphi;
                }
            }
        }

        let shape = &eval.shapes[0];
        for side in 0..2 {
            let normal = face_normal(side);
            let xi = 2.0 * side as f64 - 1.0;
            let (u_m, _) = shape.face_trace(eval.values, side);
            let a_m = self.velocity_at(eval, own, xi, || shape.face_trace(own_velocity, side).0);
            let (u_p, a_p) = match eval.exterior[side] {
                Exterior::Cell { cell, values } => {
                    if op_type == OperatorType::Inhomogeneous {
                        continue;
                    }
                    let other = 1 - side;
                    let neighbor_velocity = self.cell_velocity(eval, cell);
                    let a_p = self.velocity_at(eval, cell, -xi, || shape.face_trace(neighbor_velocity, other).0);
                    (shape.face_trace(values, other).0, a_p)
                }
                Exterior::Boundary(id) => {
                    let x = eval.geometry.face_point(side);
                    let u_p = match self.boundary.value(id, x, eval.time) {
                        BoundaryValue::Dirichlet(g) => {
                            let g = if op_type == OperatorType::Homogeneous { 0.0 } else { g };
                            -u_m + 2.0 * g
                        }
                        BoundaryValue::Neumann(_) => u_m,
                    };
                    (u_p, a_m)
                }
            };
            let flux = self.numerical_flux(u_m, u_p, a_m, a_p, normal);
            for (o, phi) in out.iter_mut().zip(shape.face_values(side)) {
                *o += flux * phi;
            }
        }
    }
}

/// Standalone convective operator, used for explicit treatment of convection.
#[derive(Clone)]
pub struct ConvectiveOperator {
    space: DofSpace,
    kernel: ConvectiveKernel,
}

impl ConvectiveOperator {
    pub fn new(space: DofSpace, kernel: ConvectiveKernel) -> Self {
        ConvectiveOperator { space, kernel }
    }

    pub fn kernel(&self) -> &ConvectiveKernel {
        &self.kernel
    }
}

impl Operator for ConvectiveOperator {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::DofVector;
    use crate::fe::QUAD_STANDARD;
    use crate::functions::ConstantFunction;
    use crate::grid::LineGrid;
    use crate::parallel::UniverseComm;
    use approx::assert_abs_diff_eq;

    fn operator(flux: NumericalFluxConvectiveOperator, periodic: bool) -> ConvectiveOperator {
        let mut grid = LineGrid::new(0.0, 1.0, 5, Arc::new(UniverseComm::Serial)).unwrap();
        let mut boundary = BoundaryDescriptor::new();
        if periodic {
            grid = grid.with_periodicity();
        } else {
            boundary = boundary.with_dirichlet(0, ConstantFunction(1.0)).with_neumann(1, ConstantFunction(0.0));
        }
        let space = DofSpace::new(Arc::new(grid), 3).unwrap();
        let data = ConvectiveKernelData {
            type_velocity_field: TypeVelocityField::Function,
            numerical_flux: flux,
            quad_index: QUAD_STANDARD,
            ale: false,
        };
        let kernel = ConvectiveKernel::new(data, Arc::new(ConstantFunction(1.0)), Arc::new(boundary));
        ConvectiveOperator::new(space, kernel)
    }

    #[test]
    fn constants_are_transported_without_change() {
        for flux in [NumericalFluxConvectiveOperator::CentralFlux, NumericalFluxConvectiveOperator::LaxFriedrichsFlux] {
            let op = operator(flux, true);
            let mut u = op.space().new_vector();
            u.fill(2.0);
            let mut dst = op.space().new_vector();
            op.apply(&mut dst, &u, &OperatorContext::default()).unwrap();
            assert_abs_diff_eq!(dst.norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn periodic_upwind_operator_is_conservative_and_dissipative() {
        let op = operator(NumericalFluxConvectiveOperator::LaxFriedrichsFlux, true);
        let space = op.space().clone();
        let mut u = space.new_vector();
        space.interpolate(&|x: f64, _t: f64| (6.0 * x).sin() + x * x, 0.0, &mut u);
        let mut dst = space.new_vector();
        op.apply(&mut dst, &u, &OperatorContext::default()).unwrap();
        // (1, A u) = 0 on a periodic domain
        assert_abs_diff_eq!(dst.as_slice().iter().sum::<f64>(), 0.0, epsilon = 1e-12);
        // (u, A u) = ½ Σ |[u]|² ≥ 0
        assert!(u.dot(&dst) > 0.0);
    }

    #[test]
    fn dirichlet_inflow_enters_the_rhs() {
        let op = operator(NumericalFluxConvectiveOperator::LaxFriedrichsFlux, false);
        let mut rhs = op.space().new_vector();
        op.rhs(&mut rhs, &OperatorContext::default()).unwrap();
        // mirrored inflow value u⁺ = 2g seen by the left face only
        assert_abs_diff_eq!(rhs.as_slice()[0], 2.0, epsilon = 1e-13);
        assert_abs_diff_eq!(rhs.as_slice().iter().sum::<f64>(), 2.0, epsilon = 1e-13);
    }

    #[test]
    fn dof_vector_velocity_must_be_supplied() {
        let mut op = operator(NumericalFluxConvectiveOperator::CentralFlux, true);
        op.kernel.data.type_velocity_field = TypeVelocityField::DoFVector;
        let u = op.space().new_vector();
        let mut dst = op.space().new_vector();
        assert!(matches!(
            op.apply(&mut dst, &u, &OperatorContext::default()),
            Err(DgError::MissingVelocity)
        ));
        let mut velocity = op.space().new_vector();
        velocity.fill(1.0);
        let ctx = OperatorContext::default().with_velocity(Some(&velocity));
        assert!(op.apply(&mut dst, &u, &ctx).is_ok());
    }
}
