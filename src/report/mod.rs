//! Reporting utilities: residuals and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{FitResult, SampleResidual, SampleSet};
use crate::error::AppError;
use crate::fit::evaluate;

/// Compute fitted values and residuals for each sample.
pub fn compute_residuals(
    samples: &SampleSet,
    weights: Option<&[f64]>,
    fit: &FitResult,
) -> Result<Vec<SampleResidual>, AppError> {
    let mut out = Vec::with_capacity(samples.len());
    for (i, s) in samples.iter().enumerate() {
        let fitted = evaluate(fit, s.size as f64)?;
        out.push(SampleResidual {
            sample: *s,
            weight: weights.map_or(1.0, |w| w[i]),
            fitted,
            residual: s.threshold - fitted,
        });
    }
    Ok(out)
}
