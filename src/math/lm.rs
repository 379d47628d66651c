//! Levenberg–Marquardt for small nonlinear least squares problems.
//!
//! We minimize `S(p) = ||r(p)||²` where `r` is the (already weighted) residual
//! vector and `J = ∂f/∂p` is the (equally weighted) model Jacobian, so that a
//! Gauss–Newton step satisfies `J δ ≈ r`.
//!
//! Each damped step solves the augmented system
//!
//! ```text
//! [ J          ]       [ r ]
//! [ sqrt(λ) D  ] δ  ≈  [ 0 ]
//! ```
//!
//! with `D = diag(||J_col||)` (Marquardt scaling) using the SVD solver from
//! [`crate::math::ols`]. Rejected steps raise `λ` by 10x, accepted steps
//! lower it by 10x.
//!
//! The driver is deterministic: same problem and start, same iterates.

use nalgebra::{DMatrix, DVector};

use crate::math::ols::{numerical_rank, solve_least_squares};

/// SSE treated as an exact fit.
const ZERO_SSE: f64 = 1e-30;
const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
/// Above this damping no descent direction is left at machine precision.
const LAMBDA_MAX: f64 = 1e16;

/// A residual model the driver can minimize.
pub trait LeastSquaresProblem {
    fn param_count(&self) -> usize;

    /// Weighted residuals `sqrt(w_i) * (y_i - f(x_i; p))`.
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64>;

    /// Weighted model Jacobian, row `i` = `sqrt(w_i) * ∂f(x_i; p)/∂p`.
    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64>;

    /// Whether `params` is a valid iterate (e.g. no pole inside the domain).
    fn is_admissible(&self, _params: &DVector<f64>) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmSettings {
    pub max_iters: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

/// Why the search stopped successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LmStop {
    ZeroResidual,
    Gradient,
    RelativeReduction,
    StepSize,
    /// No step reduces the SSE any further at machine precision.
    NoFurtherReduction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LmReport {
    pub params: DVector<f64>,
    pub sse: f64,
    pub iterations: usize,
    pub stop: LmStop,
    /// Weighted Jacobian at `params`.
    pub jacobian: DMatrix<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LmError {
    InadmissibleStart,
    NonFinite { iteration: usize },
    SingularJacobian { iteration: usize, rank: usize },
    MaxIterations { iterations: usize, sse: f64 },
}

impl std::fmt::Display for LmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LmError::InadmissibleStart => write!(f, "initial guess is not an admissible point"),
            LmError::NonFinite { iteration } => {
                write!(f, "non-finite residuals or Jacobian at iteration {iteration}")
            }
            LmError::SingularJacobian { iteration, rank } => {
                write!(f, "Jacobian is singular at iteration {iteration} (rank {rank})")
            }
            LmError::MaxIterations { iterations, sse } => {
                write!(f, "no convergence after {iterations} iterations (sse={sse:.3e})")
            }
        }
    }
}

/// Minimize `problem` starting from `start`.
pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &P,
    start: DVector<f64>,
    settings: &LmSettings,
) -> Result<LmReport, LmError> {
    let p_len = problem.param_count();
    if !problem.is_admissible(&start) {
        return Err(LmError::InadmissibleStart);
    }

    let mut params = start;
    let mut r = problem.residuals(&params);
    let mut sse = r.norm_squared();
    let mut lambda = LAMBDA_INIT;

    for iteration in 0..settings.max_iters {
        let jac = problem.jacobian(&params);
        if !sse.is_finite() || jac.iter().any(|v| !v.is_finite()) {
            return Err(LmError::NonFinite { iteration });
        }

        let rank = numerical_rank(&jac);
        if rank < p_len {
            return Err(LmError::SingularJacobian { iteration, rank });
        }

        let finish = |stop: LmStop,
                      params: DVector<f64>,
                      sse: f64,
                      jacobian: DMatrix<f64>|
         -> Result<LmReport, LmError> {
            log::debug!("lm: stop={stop:?} after {iteration} iterations, sse={sse:.6e}");
            Ok(LmReport {
                params,
                sse,
                iterations: iteration,
                stop,
                jacobian,
            })
        };

        if sse <= ZERO_SSE {
            return finish(LmStop::ZeroResidual, params, sse, jac);
        }

        let grad = jac.transpose() * &r;
        if grad.amax() <= settings.gtol {
            return finish(LmStop::Gradient, params, sse, jac);
        }

        // Marquardt scaling: column norms, floored so a vanishing column can
        // still be damped.
        let scale: Vec<f64> = (0..p_len)
            .map(|j| jac.column(j).norm().max(1e-12))
            .collect();

        let accepted = loop {
            let step = match damped_step(&jac, &r, &scale, lambda) {
                Some(step) => step,
                None => return Err(LmError::NonFinite { iteration }),
            };
            let candidate = &params + &step;

            if problem.is_admissible(&candidate) {
                let r_new = problem.residuals(&candidate);
                let sse_new = r_new.norm_squared();
                if sse_new.is_finite() && sse_new < sse {
                    break Some((candidate, r_new, sse_new, step));
                }
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                break None;
            }
        };

        let Some((candidate, r_new, sse_new, step)) = accepted else {
            return finish(LmStop::NoFurtherReduction, params, sse, jac);
        };

        let reduction = (sse - sse_new) / sse;
        let step_small = step.norm() <= settings.xtol * (settings.xtol + candidate.norm());

        log::trace!("lm: iter={iteration} sse={sse_new:.6e} lambda={lambda:.1e}");

        params = candidate;
        r = r_new;
        sse = sse_new;
        lambda = (lambda / 10.0).max(LAMBDA_MIN);

        if reduction <= settings.ftol || step_small {
            let jac = problem.jacobian(&params);
            let stop = if step_small {
                LmStop::StepSize
            } else {
                LmStop::RelativeReduction
            };
            return finish(stop, params, sse, jac);
        }
    }

    Err(LmError::MaxIterations {
        iterations: settings.max_iters,
        sse,
    })
}

fn damped_step(
    jac: &DMatrix<f64>,
    r: &DVector<f64>,
    scale: &[f64],
    lambda: f64,
) -> Option<DVector<f64>> {
    let (n, p) = jac.shape();
    let mut a = DMatrix::<f64>::zeros(n + p, p);
    a.view_mut((0, 0), (n, p)).copy_from(jac);
    let damp = lambda.sqrt();
    for (j, &s) in scale.iter().enumerate() {
        a[(n + j, j)] = damp * s;
    }

    let mut rhs = DVector::<f64>::zeros(n + p);
    rhs.rows_mut(0, n).copy_from(r);

    solve_least_squares(&a, &rhs)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `y = p0 * exp(p1 * x)` on fixed abscissae.
    struct ExpDecay {
        x: Vec<f64>,
        y: Vec<f64>,
    }

    impl LeastSquaresProblem for ExpDecay {
        fn param_count(&self) -> usize {
            2
        }

        fn residuals(&self, p: &DVector<f64>) -> DVector<f64> {
            DVector::from_iterator(
                self.x.len(),
                self.x
                    .iter()
                    .zip(&self.y)
                    .map(|(&x, &y)| y - p[0] * (p[1] * x).exp()),
            )
        }

        fn jacobian(&self, p: &DVector<f64>) -> DMatrix<f64> {
            let mut j = DMatrix::zeros(self.x.len(), 2);
            for (i, &x) in self.x.iter().enumerate() {
                let e = (p[1] * x).exp();
                j[(i, 0)] = e;
                j[(i, 1)] = p[0] * x * e;
            }
            j
        }
    }

    fn settings() -> LmSettings {
        LmSettings {
            max_iters: 200,
            ftol: 1e-14,
            xtol: 1e-14,
            gtol: 1e-16,
        }
    }

    #[test]
    fn recovers_exponential_from_far_start() {
        let x: Vec<f64> = (0..10).map(|i| i as f64 * 0.3).collect();
        let y: Vec<f64> = x.iter().map(|&x| 2.5 * (-0.7 * x).exp()).collect();
        let problem = ExpDecay { x, y };

        let report =
            levenberg_marquardt(&problem, DVector::from_vec(vec![1.0, 0.0]), &settings()).unwrap();
        assert!((report.params[0] - 2.5).abs() < 1e-8, "{:?}", report.params);
        assert!((report.params[1] + 0.7).abs() < 1e-8, "{:?}", report.params);
        assert!(report.sse < 1e-16);
    }

    #[test]
    fn singular_jacobian_is_reported() {
        // With p0 = 0 the column for p1 vanishes identically.
        let x = vec![0.0, 1.0, 2.0];
        let y = vec![1.0, 2.0, 3.0];
        let problem = ExpDecay { x, y };

        let err = levenberg_marquardt(&problem, DVector::from_vec(vec![0.0, 1.0]), &settings())
            .unwrap_err();
        assert!(matches!(err, LmError::SingularJacobian { iteration: 0, .. }));
    }

    #[test]
    fn iteration_budget_is_enforced() {
        let x: Vec<f64> = (0..10).map(|i| i as f64 * 0.3).collect();
        let y: Vec<f64> = x.iter().map(|&x| 2.5 * (-0.7 * x).exp()).collect();
        let problem = ExpDecay { x, y };
        let tight = LmSettings {
            max_iters: 1,
            ..settings()
        };

        let err =
            levenberg_marquardt(&problem, DVector::from_vec(vec![1.0, 0.0]), &tight).unwrap_err();
        assert!(matches!(err, LmError::MaxIterations { iterations: 1, .. }));
    }
}
