//! Least squares solvers.
//!
//! The fitter repeatedly solves small penalized regression problems of the form:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2 + Σ λ_j β_j^2
//! ```
//!
//! Implementation choices:
//! - The ridge problem is solved through the normal equations `(XᵀX + Λ) β = Xᵀy`
//!   with a Cholesky factorization; `Λ` is positive definite whenever every
//!   penalty is positive, so this succeeds on well-scaled inputs.
//! - If Cholesky fails (zero penalties on collinear columns), we fall back to
//!   an SVD solve of the equivalent augmented system `[X; √Λ] β ≈ [y; 0]`.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve an L2-penalized least squares problem with one penalty per column.
///
/// Returns `None` if the shapes disagree or no finite solution exists.
pub fn solve_ridge(x: &DMatrix<f64>, y: &DVector<f64>, penalties: &[f64]) -> Option<DVector<f64>> {
    let (n, p) = x.shape();
    if penalties.len() != p || y.len() != n {
        return None;
    }

    let mut gram = x.tr_mul(x);
    for (j, &lambda) in penalties.iter().enumerate() {
        gram[(j, j)] += lambda;
    }
    let rhs = x.tr_mul(y);

    if let Some(chol) = gram.cholesky() {
        let beta = chol.solve(&rhs);
        if beta.iter().all(|v| v.is_finite()) {
            return Some(beta);
        }
    }

    let mut aug = DMatrix::<f64>::zeros(n + p, p);
    aug.view_mut((0, 0), (n, p)).copy_from(x);
    for (j, &lambda) in penalties.iter().enumerate() {
        aug[(n + j, j)] = lambda.max(0.0).sqrt();
    }
    let mut y_aug = DVector::<f64>::zeros(n + p);
    y_aug.rows_mut(0, n).copy_from(y);
    solve_least_squares(&aug, &y_aug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn ridge_with_tiny_penalty_matches_ols() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_ridge(&x, &y, &[1e-12, 1e-12]).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-6);
        assert!((beta[1] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn ridge_penalty_shrinks_toward_zero() {
        let x = DMatrix::from_row_slice(4, 1, &[1.0, 2.0, 3.0, 4.0]);
        let y = DVector::from_row_slice(&[2.0, 4.0, 6.0, 8.0]);

        let loose = solve_ridge(&x, &y, &[0.0]).unwrap();
        let tight = solve_ridge(&x, &y, &[100.0]).unwrap();
        assert!((loose[0] - 2.0).abs() < 1e-9);
        // closed form: Σxy / (Σx² + λ) = 60 / 130
        assert!((tight[0] - 60.0 / 130.0).abs() < 1e-9);
    }

    #[test]
    fn ridge_rejects_shape_mismatch() {
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let y = DVector::from_row_slice(&[1.0, 1.0]);
        assert!(solve_ridge(&x, &y, &[1.0]).is_none());
    }
}
