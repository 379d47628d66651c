//! Evaluation of the saturating threshold model `f(x) = a - b / (c + x)`.
//!
//! The fitter relies on three primitive operations:
//! - predict `f(x)` given `(a, b, c)` (for residuals/plots)
//! - the Jacobian row `∂f/∂(a, b, c)` (for Levenberg–Marquardt)
//! - a design row of the linearized model (for the starting point)
//!
//! Multiplying through by `(c + x)` gives `y·x = a·x - c·y + (a·c - b)`, which
//! is linear in `(a, c, k = a·c - b)`. For noise-free data its least squares
//! solution is exact.

use crate::domain::{CurveParams, PARAM_COUNT};

/// Predict `f(x)`. Returns a non-finite value at the pole.
pub fn predict(params: &CurveParams, x: f64) -> f64 {
    params.a - params.b / (params.c + x)
}

/// `[∂f/∂a, ∂f/∂b, ∂f/∂c]` at `x`.
pub fn jacobian_row(params: &CurveParams, x: f64) -> [f64; PARAM_COUNT] {
    let d = params.c + x;
    [1.0, -1.0 / d, params.b / (d * d)]
}

/// Design row `[x, -y, 1]` and target `y·x` of the linearized model.
pub fn linearized_row(x: f64, y: f64) -> ([f64; PARAM_COUNT], f64) {
    ([x, -y, 1.0], x * y)
}

/// Recover `(a, b, c)` from a linearized solution `(a, c, k)`.
pub fn from_linearized(a: f64, c: f64, k: f64) -> CurveParams {
    CurveParams::new(a, a * c - k, c)
}

/// Whether the pole `x = -c` lies outside `[x_min, x_max]` (with a margin).
pub fn pole_outside(params: &CurveParams, x_min: f64, x_max: f64) -> bool {
    const MARGIN: f64 = 1e-9;
    let lo = params.c + x_min;
    let hi = params.c + x_max;
    (lo > MARGIN && hi > MARGIN) || (lo < -MARGIN && hi < -MARGIN)
}
