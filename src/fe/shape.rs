//! Lagrange shape functions on Gauss–Lobatto nodes, tabulated at a Gauss rule.

use faer::linalg::solvers::{FullPivLu, SolveCore};
use faer::{Conj, Mat, MatMut};

use crate::fe::quadrature::{gauss, gauss_lobatto};

/// Lagrange polynomial `i` through `nodes`, evaluated at `x`.
pub fn lagrange(nodes: &[f64], i: usize, x: f64) -> f64 {
    nodes
        .iter()
        .enumerate()
        .filter(|&(k, _)| k != i)
        .map(|(_, &xk)| (x - xk) / (nodes[i] - xk))
        .product()
}

/// Derivative of Lagrange polynomial `i` through `nodes`, evaluated at `x`.
pub fn lagrange_derivative(nodes: &[f64], i: usize, x: f64) -> f64 {
    let mut sum = 0.0;
    for (m, &xm) in nodes.iter().enumerate() {
        if m == i {
            continue;
        }
        let mut term = 1.0 / (nodes[i] - xm);
        for (k, &xk) in nodes.iter().enumerate() {
            if k != i && k != m {
                term *= (x - xk) / (nodes[i] - xk);
            }
        }
        sum += term;
    }
    sum
}

/// Tabulated reference element data for one polynomial degree and quadrature.
#[derive(Debug, Clone)]
pub struct ShapeInfo {
    degree: usize,
    nodes: Vec<f64>,
    points: Vec<f64>,
    weights: Vec<f64>,
    /// `values[q * n + i] = φ_i(ξ_q)`
    values: Vec<f64>,
    /// `gradients[q * n + i] = φ_i'(ξ_q)` on the reference interval
    gradients: Vec<f64>,
    face_values: [Vec<f64>; 2],
    face_gradients: [Vec<f64>; 2],
    mass: Vec<f64>,
    inverse_mass: Vec<f64>,
}

impl ShapeInfo {
    /// Degree `degree` basis with a `n_q_points` Gauss rule.
    pub fn new(degree: usize, n_q_points: usize) -> Self {
        let n = degree + 1;
        let nodes = gauss_lobatto(n);
        let (weights, points): (Vec<f64>, Vec<f64>) = gauss(n_q_points);
        let mut values = Vec::with_capacity(n_q_points * n);
        let mut gradients = Vec::with_capacity(n_q_points * n);
        for &xq in &points {
            for i in 0..n {
                values.push(lagrange(&nodes, i, xq));
                gradients.push(lagrange_derivative(&nodes, i, xq));
            }
        }
        let face = |xi: f64| -> (Vec<f64>, Vec<f64>) {
            (
                (0..n).map(|i| lagrange(&nodes, i, xi)).collect(),
                (0..n).map(|i| lagrange_derivative(&nodes, i, xi)).collect(),
            )
        };
        let (left_values, left_gradients) = face(-1.0);
        let (right_values, right_gradients) = face(1.0);

        // reference mass matrix, exact since 2p <= 2 n_q - 1 for n_q >= p + 1
        let mut mass = vec![0.0; n * n];
        for (q, w) in weights.iter().enumerate() {
            for i in 0..n {
                for j in 0..n {
                    mass[i * n + j] += w * values[q * n + i] * values[q * n + j];
                }
            }
        }
        let m = Mat::from_fn(n, n, |i, j| mass[i * n + j]);
        let lu = FullPivLu::new(m.as_ref());
        let mut inverse_mass = vec![0.0; n * n];
        for i in 0..n {
            inverse_mass[i * n + i] = 1.0;
        }
        lu.solve_in_place_with_conj(Conj::No, MatMut::from_column_major_slice_mut(&mut inverse_mass, n, n));

        ShapeInfo {
            degree,
            nodes,
            points,
            weights,
            values,
            gradients,
            face_values: [left_values, right_values],
            face_gradients: [left_gradients, right_gradients],
            mass,
            inverse_mass,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of shape functions, `degree + 1`.
    pub fn n_dofs(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_q_points(&self) -> usize {
        self.points.len()
    }

    /// Support points of the shape functions.
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Shape function values at quadrature point `q`.
    pub fn values_at(&self, q: usize) -> &[f64] {
        let n = self.n_dofs();
        &self.values[q * n..(q + 1) * n]
    }

    /// Reference derivatives at quadrature point `q`.
    pub fn gradients_at(&self, q: usize) -> &[f64] {
        let n = self.n_dofs();
        &self.gradients[q * n..(q + 1) * n]
    }

    /// Values at face `side` (0 is ξ = -1, 1 is ξ = +1).
    pub fn face_values(&self, side: usize) -> &[f64] {
        &self.face_values[side]
    }

    /// Reference derivatives at face `side`.
    pub fn face_gradients(&self, side: usize) -> &[f64] {
        &self.face_gradients[side]
    }

    /// Reference mass matrix, row-major.
    pub fn mass(&self) -> &[f64] {
        &self.mass
    }

    /// Inverse of the reference mass matrix (symmetric, so either storage order).
    pub fn inverse_mass(&self) -> &[f64] {
        &self.inverse_mass
    }

    /// Shape function values at an arbitrary reference point.
    pub fn basis_at(&self, xi: f64) -> Vec<f64> {
        (0..self.n_dofs()).map(|i| lagrange(&self.nodes, i, xi)).collect()
    }

    /// Value of the polynomial with nodal values `u` at quadrature point `q`.
    pub fn interpolate_at(&self, u: &[f64], q: usize) -> f64 {
        self.values_at(q).iter().zip(u).map(|(phi, ui)| phi * ui).sum()
    }

    /// Reference derivative of the polynomial with nodal values `u` at point `q`.
    pub fn derivative_at(&self, u: &[f64], q: usize) -> f64 {
        self.gradients_at(q).iter().zip(u).map(|(dphi, ui)| dphi * ui).sum()
    }

    /// Trace of `u` and its reference derivative at face `side`.
    pub fn face_trace(&self, u: &[f64], side: usize) -> (f64, f64) {
        let value = self.face_values[side].iter().zip(u).map(|(phi, ui)| phi * ui).sum();
        let derivative = self.face_gradients[side].iter().zip(u).map(|(dphi, ui)| dphi * ui).sum();
        (value, derivative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn lagrange_is_nodal() {
        let shape = ShapeInfo::new(3, 4);
        for i in 0..4 {
            let phi = shape.basis_at(shape.nodes()[i]);
            for (j, v) in phi.iter().enumerate() {
                assert_abs_diff_eq!(*v, if i == j { 1.0 } else { 0.0 }, epsilon = 1e-13);
            }
        }
        assert_eq!(shape.face_values(0)[0], 1.0);
        assert_abs_diff_eq!(shape.face_values(1)[3], 1.0, epsilon = 1e-14);
    }

    #[test]
    fn partition_of_unity_and_derivatives() {
        let shape = ShapeInfo::new(4, 5);
        for q in 0..shape.n_q_points() {
            assert_abs_diff_eq!(shape.values_at(q).iter().sum::<f64>(), 1.0, epsilon = 1e-13);
            assert_abs_diff_eq!(shape.gradients_at(q).iter().sum::<f64>(), 0.0, epsilon = 1e-11);
            // derivative of the interpolant of x is one
            let u: Vec<f64> = shape.nodes().to_vec();
            assert_abs_diff_eq!(shape.derivative_at(&u, q), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn mass_times_inverse_is_identity() {
        let shape = ShapeInfo::new(3, 4);
        let n = shape.n_dofs();
        let (m, minv) = (shape.mass(), shape.inverse_mass());
        for i in 0..n {
            for j in 0..n {
                let p: f64 = (0..n).map(|k| m[i * n + k] * minv[k * n + j]).sum();
                assert_abs_diff_eq!(p, if i == j { 1.0 } else { 0.0 }, epsilon = 1e-12);
            }
        }
        // total mass of the reference interval
        assert_abs_diff_eq!(m.iter().sum::<f64>(), 2.0, epsilon = 1e-13);
    }
}
