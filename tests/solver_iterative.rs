//! Krylov solvers against a dense LU solve on small random systems.

use approx::assert_abs_diff_eq;
use dgsolve::preconditioner::{BlockJacobi, Jacobi, Preconditioner};
use dgsolve::solver::{CgSolver, FgmresSolver, GmresSolver, LinearSolver};
use faer::linalg::solvers::{FullPivLu, SolveCore};
use faer::{Conj, Mat, MatMut};
use rand::Rng;

/// `A = Mᵀ M + n I`, symmetric positive definite.
fn random_spd(n: usize) -> (Mat<f64>, Vec<f64>) {
    let mut rng = rand::thread_rng();
    let m = Mat::from_fn(n, n, |_, _| rng.gen_range(-1.0..1.0));
    let mt = m.transpose();
    let mut a = &mt * &m;
    for i in 0..n {
        a[(i, i)] += n as f64;
    }
    let b = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
    (a, b)
}

/// Diagonally dominant, nonsymmetric.
fn random_nonsymmetric(n: usize) -> (Mat<f64>, Vec<f64>) {
    let mut rng = rand::thread_rng();
    let a = Mat::from_fn(n, n, |i, j| {
        let v: f64 = rng.gen_range(-1.0..1.0);
        if i == j { v + 2.0 * n as f64 } else { v }
    });
    let b = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
    (a, b)
}

fn direct(a: &Mat<f64>, b: &[f64]) -> Vec<f64> {
    let n = b.len();
    let mut x = b.to_vec();
    let lu = FullPivLu::new(a.as_ref());
    lu.solve_in_place_with_conj(Conj::No, MatMut::from_column_major_slice_mut(&mut x, n, 1));
    x
}

fn assert_close(x: &[f64], y: &[f64]) {
    for (xi, yi) in x.iter().zip(y) {
        assert_abs_diff_eq!(xi, yi, epsilon = 1e-8);
    }
}

#[test]
fn cg_matches_direct_solve() {
    let (a, b) = random_spd(20);
    let mut x = vec![0.0; 20];
    let stats = CgSolver::new(1e-14, 1e-12, 200).solve(&a, None, &b, &mut x).unwrap();
    assert!(stats.converged);
    assert!(stats.final_residual <= 1e-12 * stats.initial_residual.max(1e-2));
    assert_close(&x, &direct(&a, &b));
}

#[test]
fn jacobi_preconditioned_cg_matches_direct_solve() {
    let (a, b) = random_spd(15);
    let mut pc = Jacobi::new();
    Preconditioner::<Mat<f64>, Vec<f64>>::setup(&mut pc, &a).unwrap();
    let mut x = vec![0.0; 15];
    let stats = CgSolver::new(1e-14, 1e-12, 200).solve(&a, Some(&pc), &b, &mut x).unwrap();
    assert!(stats.converged);
    assert_close(&x, &direct(&a, &b));
}

#[test]
fn gmres_matches_direct_solve() {
    let (a, b) = random_nonsymmetric(25);
    let mut x = vec![0.0; 25];
    let stats = GmresSolver::new(30, 1e-14, 1e-12, 500).solve(&a, None, &b, &mut x).unwrap();
    assert!(stats.converged);
    assert_close(&x, &direct(&a, &b));
}

#[test]
fn restarted_gmres_still_converges() {
    let (a, b) = random_nonsymmetric(25);
    let mut x = vec![0.0; 25];
    let stats = GmresSolver::new(5, 1e-14, 1e-12, 2000).solve(&a, None, &b, &mut x).unwrap();
    assert!(stats.converged);
    assert!(stats.iterations > 5);
    assert_close(&x, &direct(&a, &b));
}

#[test]
fn fgmres_with_exact_block_preconditioner_converges_immediately() {
    let (a, b) = random_nonsymmetric(12);
    let mut pc = BlockJacobi::new();
    Preconditioner::<Mat<f64>, Vec<f64>>::setup(&mut pc, &a).unwrap();
    let mut x = vec![0.0; 12];
    let stats = FgmresSolver::new(10, 1e-14, 1e-12, 100).solve(&a, Some(&pc), &b, &mut x).unwrap();
    assert!(stats.converged);
    assert!(stats.iterations <= 2, "{} iterations", stats.iterations);
    assert_close(&x, &direct(&a, &b));
}

#[test]
fn exact_initial_guess_needs_no_iterations() {
    let (a, b) = random_spd(8);
    let mut x = direct(&a, &b);
    let stats = CgSolver::new(1e-10, 1e-10, 50).solve(&a, None, &b, &mut x).unwrap();
    assert!(stats.converged);
    assert_eq!(stats.iterations, 0);
}
