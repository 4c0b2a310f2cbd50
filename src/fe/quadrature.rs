//! Quadrature rules and point sets on the reference interval `[-1, 1]`.
//!
//! # References
//! - Kopriva, D. (2009). Implementing Spectral Methods for Partial Differential
//!   Equations, Algorithms 23–25.

use num_traits::Float;

const NEWTON_TOL: f64 = 1e-15;
const NEWTON_MAX_ITERS: usize = 100;

/// Legendre polynomial `P_n(x)` and its derivative.
pub fn legendre(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (1.0, 0.0);
    }
    let (mut p_prev, mut p) = (1.0, x);
    let (mut dp_prev, mut dp) = (0.0, 1.0);
    for k in 2..=n {
        let kf = k as f64;
        let p_next = ((2.0 * kf - 1.0) * x * p - (kf - 1.0) * p_prev) / kf;
        let dp_next = dp_prev + (2.0 * kf - 1.0) * p;
        p_prev = p;
        p = p_next;
        dp_prev = dp;
        dp = dp_next;
    }
    (p, dp)
}

/// Gauss–Legendre rule with `num_points` points, returned as `(weights, points)` with
/// ascending points. Exact for polynomials of degree `2 * num_points - 1`.
pub fn gauss<T: Float>(num_points: usize) -> (Vec<T>, Vec<T>) {
    assert!(num_points > 0, "a quadrature rule needs at least one point");
    let n = num_points;
    let mut points = vec![0.0; n];
    let mut weights = vec![0.0; n];
    for j in 0..n {
        let mut x = -(std::f64::consts::PI * (j as f64 + 0.75) / (n as f64 + 0.5)).cos();
        for _ in 0..NEWTON_MAX_ITERS {
            let (p, dp) = legendre(n, x);
            let delta = p / dp;
            x -= delta;
            if delta.abs() <= NEWTON_TOL * x.abs().max(1.0) {
                break;
            }
        }
        let (_, dp) = legendre(n, x);
        points[j] = x;
        weights[j] = 2.0 / ((1.0 - x * x) * dp * dp);
    }
    let cast = |v: Vec<f64>| v.into_iter().map(|x| T::from(x).unwrap_or_else(T::zero)).collect();
    (cast(weights), cast(points))
}

/// Gauss–Lobatto points (`num_points >= 2`), ascending, including both end points.
pub fn gauss_lobatto(num_points: usize) -> Vec<f64> {
    assert!(num_points >= 2, "Gauss-Lobatto points include both end points");
    let p = num_points - 1;
    let mut nodes = vec![0.0; num_points];
    nodes[0] = -1.0;
    nodes[p] = 1.0;
    // interior nodes are the roots of P_{p+1} - P_{p-1}, whose derivative is (2p+1) P_p
    for (j, node) in nodes.iter_mut().enumerate().take(p).skip(1) {
        let mut x = -(std::f64::consts::PI * j as f64 / p as f64).cos();
        for _ in 0..NEWTON_MAX_ITERS {
            let (p_next, _) = legendre(p + 1, x);
            let (p_prev, _) = legendre(p - 1, x);
            let (p_mid, _) = legendre(p, x);
            let delta = (p_next - p_prev) / ((2 * p + 1) as f64 * p_mid);
            x -= delta;
            if delta.abs() <= NEWTON_TOL {
                break;
            }
        }
        *node = x;
    }
    nodes
}
