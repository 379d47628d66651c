//! Weighted linear least squares.
//!
//! Two places need a small linear solve:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2
//! ```
//!
//! - the linearized starting point for the threshold fit (3 columns)
//! - each damped Levenberg–Marquardt step, posed as an augmented least squares
//!   problem `[J; sqrt(λ) D] δ ≈ [r; 0]`
//!
//! Implementation choices:
//! - Rows are scaled by `sqrt(w_i)` by the caller; this module solves plain OLS.
//! - SVD handles tall systems robustly. (Nalgebra's `QR::solve` is intended
//!   for square systems and will panic for non-square matrices.)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-14, 1e-12, 1e-10] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Numerical rank of `x`, with the tolerance `max(rows, cols) * ε * σ_max`.
pub fn numerical_rank(x: &DMatrix<f64>) -> usize {
    let sv = x.clone().singular_values();
    let sigma_max = sv.iter().copied().fold(0.0_f64, f64::max);
    if !(sigma_max.is_finite() && sigma_max > 0.0) {
        return 0;
    }
    let tol = x.nrows().max(x.ncols()) as f64 * f64::EPSILON * sigma_max;
    sv.iter().filter(|&&s| s > tol).count()
}
