//! Pluggable solver for the penalized least squares sub-problems.
//!
//! The fitter only needs "given a design, a target and per-column L2
//! penalties, return the coefficients". Anything that can answer that can be
//! swapped in (e.g. a solver with different numerics, or a test double).

use nalgebra::{DMatrix, DVector};

use crate::error::{ForecastError, Result};
use crate::math::solve_ridge;

pub trait Optimizer: Send + Sync {
    /// Minimize `‖target − design·β‖² + Σ penalties_j·β_j²`.
    fn solve(&self, design: &DMatrix<f64>, target: &DVector<f64>, penalties: &[f64]) -> Result<DVector<f64>>;
}

/// Normal equations with Cholesky, SVD fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct RidgeSolver;

impl Optimizer for RidgeSolver {
    fn solve(&self, design: &DMatrix<f64>, target: &DVector<f64>, penalties: &[f64]) -> Result<DVector<f64>> {
        solve_ridge(design, target, penalties).ok_or_else(|| {
            ForecastError::ConvergenceFailure(format!(
                "penalized least squares failed ({}x{} design)",
                design.nrows(),
                design.ncols()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ridge_solver_reports_shape_errors_as_failures() {
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0]);
        assert!(matches!(
            RidgeSolver.solve(&x, &y, &[1.0]),
            Err(ForecastError::ConvergenceFailure(_))
        ));
        let beta = RidgeSolver.solve(&x, &y, &[1.0, 1.0]).unwrap();
        assert!((beta[0] - 0.5).abs() < 1e-12);
        assert!((beta[1] - 1.0).abs() < 1e-12);
    }
}
