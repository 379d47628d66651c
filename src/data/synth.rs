//! Synthetic threshold samples drawn around a known curve.
//!
//! Useful for checking that the fitter recovers a known plateau under
//! realistic measurement noise.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{CurveParams, Sample, SampleSet};
use crate::error::AppError;
use crate::models::predict;

/// Parameters of a synthetic draw.
#[derive(Debug, Clone)]
pub struct SynthSpec {
    pub params: CurveParams,
    pub sizes: Vec<u64>,
    /// Standard deviation of additive Gaussian noise on each threshold.
    pub noise: f64,
    pub seed: u64,
}

/// Draw one threshold per size from `f(size) + N(0, noise²)`, clamped to `[0, 1]`.
///
/// The same spec always produces the same samples.
pub fn generate_samples(spec: &SynthSpec) -> Result<SampleSet, AppError> {
    if !(spec.noise.is_finite() && spec.noise >= 0.0) {
        return Err(AppError::invalid_input(format!(
            "Noise must be finite and >= 0 (got {}).",
            spec.noise
        )));
    }
    if !spec.params.is_finite() {
        return Err(AppError::invalid_input("Curve parameters must be finite."));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, spec.noise)
        .map_err(|e| AppError::invalid_input(format!("Noise distribution error: {e}")))?;

    let mut samples = Vec::with_capacity(spec.sizes.len());
    for &size in &spec.sizes {
        let clean = predict(&spec.params, size as f64);
        if !clean.is_finite() {
            return Err(AppError::invalid_input(format!(
                "Curve is undefined at size {size} (pole)."
            )));
        }
        let threshold = (clean + normal.sample(&mut rng)).clamp(0.0, 1.0);
        samples.push(Sample { size, threshold });
    }

    log::debug!(
        "synth: {} samples around a={} (noise={}, seed={})",
        samples.len(),
        spec.params.a,
        spec.noise,
        spec.seed
    );
    SampleSet::new(samples)
}
