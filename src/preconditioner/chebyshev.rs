//! Chebyshev polynomial smoother/preconditioner
//!
//! Applies a degree-`k` Chebyshev polynomial in `P⁻¹A`, where `P` is a Jacobi-type
//! inner preconditioner, targeting the eigenvalue interval
//! `[λ_max / range, λ_max]`. `λ_max` comes from a power iteration on `P⁻¹A` and
//! is enlarged by a safety factor, so high-frequency error components are damped
//! while the low end is left to the coarse levels.
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems, 2nd Edition. SIAM. §12.3
//! - Adams, Brezina, Hu, Tuminaro (2003): Parallel multigrid smoothing: polynomial
//!   versus Gauss–Seidel.

use log::debug;

use crate::core::traits::{DiagonalProvider, DofVector, MatVec};
use crate::error::DgError;
use crate::preconditioner::Preconditioner;
use crate::preconditioner::jacobi::not_set_up;

/// Safety factor applied to the estimated largest eigenvalue.
const LAMBDA_MAX_FACTOR: f64 = 1.2;

pub struct Chebyshev<M, V> {
    pub degree: usize,
    /// Ratio `λ_max / λ_min` of the targeted interval.
    pub smoothing_range: f64,
    pub eigenvalue_iterations: usize,
    inner: Box<dyn Preconditioner<M, V>>,
    operator: Option<M>,
    lambda_max: f64,
}

impl<M, V> Chebyshev<M, V>
where
    M: MatVec<V> + Clone,
    V: DofVector,
{
    pub fn new(degree: usize, smoothing_range: f64, eigenvalue_iterations: usize, inner: Box<dyn Preconditioner<M, V>>) -> Self {
        Self { degree: degree.max(1), smoothing_range, eigenvalue_iterations, inner, operator: None, lambda_max: 0.0 }
    }

    pub fn lambda_max(&self) -> f64 {
        self.lambda_max
    }

    /// Power iteration on `P⁻¹A` starting from a fixed non-smooth vector.
    fn estimate_lambda_max(&self, a: &M, template: &V) -> Result<f64, DgError> {
        let mut v = template.zeros_like();
        for (i, vi) in v.as_mut_slice().iter_mut().enumerate() {
            *vi = 1.0 + 0.1 * ((i * 7) % 11) as f64;
        }
        let norm = v.norm();
        v.scale(1.0 / norm);
        let mut av = v.zeros_like();
        let mut w = v.zeros_like();
        let mut lambda = 0.0;
        for _ in 0..self.eigenvalue_iterations.max(1) {
            a.matvec(&v, &mut av);
            self.inner.apply(&av, &mut w)?;
            lambda = w.norm();
            if lambda == 0.0 || !lambda.is_finite() {
                break;
            }
            v.copy_from(&w);
            v.scale(1.0 / lambda);
        }
        Ok(lambda)
    }
}

impl<M, V> Preconditioner<M, V> for Chebyshev<M, V>
where
    M: MatVec<V> + DiagonalProvider<V> + Clone,
    V: DofVector,
{
    fn setup(&mut self, a: &M) -> Result<(), DgError> {
        self.inner.setup(a)?;
        let template = a.diagonal()?;
        self.lambda_max = LAMBDA_MAX_FACTOR * self.estimate_lambda_max(a, &template)?;
        debug!("chebyshev smoother: estimated lambda_max {:.4e}", self.lambda_max);
        self.operator = Some(a.clone());
        Ok(())
    }

    /// z = p(P⁻¹A) P⁻¹ r, the Chebyshev iterate started from zero.
    fn apply(&self, r: &V, z: &mut V) -> Result<(), DgError> {
        let a = self.operator.as_ref().ok_or_else(|| not_set_up("Chebyshev"))?;
        let lambda_max = self.lambda_max;
        if !(lambda_max > 0.0) {
            return Err(DgError::Config(format!("Chebyshev eigenvalue estimate {lambda_max} is not positive")));
        }
        let lambda_min = lambda_max / self.smoothing_range;
        let theta = 0.5 * (lambda_max + lambda_min);
        let delta = 0.5 * (lambda_max - lambda_min);
        let sigma = theta / delta;
        let mut rho = 1.0 / sigma;

        let mut res = r.clone();
        let mut pr = r.zeros_like();
        self.inner.apply(&res, &mut pr)?;
        let mut d = pr.clone();
        d.scale(1.0 / theta);
        z.copy_from(&d);
        let mut ad = r.zeros_like();
        for _ in 1..self.degree {
            a.matvec(&d, &mut ad);
            res.axpy(-1.0, &ad);
            self.inner.apply(&res, &mut pr)?;
            let rho_new = 1.0 / (2.0 * sigma - rho);
            d.scale(rho_new * rho);
            d.axpy(2.0 * rho_new / delta, &pr);
            z.axpy(1.0, &d);
            rho = rho_new;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::Jacobi;
    use faer::Mat;

    fn laplacian(n: usize) -> Mat<f64> {
        Mat::from_fn(n, n, |i, j| {
            if i == j {
                2.0
            } else if i.abs_diff(j) == 1 {
                -1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn eigenvalue_estimate_bounds_the_spectrum() {
        let a = laplacian(16);
        let mut cheb: Chebyshev<Mat<f64>, Vec<f64>> = Chebyshev::new(4, 20.0, 50, Box::new(Jacobi::new()));
        cheb.setup(&a).unwrap();
        // spectrum of D⁻¹A lies in (0, 2)
        assert!(cheb.lambda_max() > 1.5 && cheb.lambda_max() < 2.0 * LAMBDA_MAX_FACTOR);
    }

    #[test]
    fn chebyshev_damps_oscillatory_error() {
        let n = 32;
        let a = laplacian(n);
        let mut cheb: Chebyshev<Mat<f64>, Vec<f64>> = Chebyshev::new(5, 10.0, 30, Box::new(Jacobi::new()));
        cheb.setup(&a).unwrap();
        // error e = highest-frequency mode, b = A e
        let e: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let mut b = vec![0.0; n];
        a.matvec(&e, &mut b);
        let mut z = vec![0.0; n];
        cheb.apply(&b, &mut z).unwrap();
        let remaining: f64 = z.iter().zip(&e).map(|(zi, ei)| (zi - ei).powi(2)).sum::<f64>().sqrt();
        let initial = e.norm();
        assert!(remaining < 0.1 * initial, "remaining {remaining}, initial {initial}");
    }

    #[test]
    fn apply_before_setup_fails() {
        let cheb: Chebyshev<Mat<f64>, Vec<f64>> = Chebyshev::new(3, 20.0, 10, Box::new(Jacobi::new()));
        let mut z = vec![0.0; 2];
        assert!(cheb.apply(&vec![1.0, 1.0], &mut z).is_err());
    }
}
