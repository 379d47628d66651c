//! Shared "fit pipeline" logic used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load samples -> exclude -> fit -> residuals
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use crate::data::{QUDIT_PLOT_RANGE, qudit_thresholds};
use crate::domain::{FitConfig, FitResult, SampleResidual, SampleSet, WeightMode};
use crate::error::AppError;
use crate::fit::ThresholdCurveFitter;
use crate::io::ingest::load_samples;

/// Samples as loaded, before any exclusion.
#[derive(Debug, Clone)]
pub struct LoadedInput {
    /// Human-readable origin (path or "built-in").
    pub source: String,
    pub samples: SampleSet,
    pub weights: Option<Vec<f64>>,
    /// Plot window used when the config does not set one.
    pub default_x_range: Option<(f64, f64)>,
}

/// All computed outputs of a single `thresh fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Samples that entered the fit.
    pub samples: SampleSet,
    pub weights: Option<Vec<f64>>,
    pub fit: FitResult,
    pub residuals: Vec<SampleResidual>,
    pub x_range: Option<(f64, f64)>,
}

/// Load the configured input (CSV or built-in dataset).
pub fn load_input(config: &FitConfig) -> Result<LoadedInput, AppError> {
    match &config.input {
        Some(path) => {
            let ingested = load_samples(path, config.weight_mode)?;
            Ok(LoadedInput {
                source: path.display().to_string(),
                samples: ingested.samples,
                weights: ingested.weights,
                default_x_range: None,
            })
        }
        None => {
            if config.weight_mode == WeightMode::Input {
                return Err(AppError::invalid_input(
                    "The built-in dataset has no weights; use `--weights uniform` or `--input`.",
                ));
            }
            Ok(LoadedInput {
                source: "built-in qudit thresholds".to_string(),
                samples: qudit_thresholds()?,
                weights: None,
                default_x_range: Some(QUDIT_PLOT_RANGE),
            })
        }
    }
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    let input = load_input(config)?;
    run_fit_with_input(config, &input, &config.exclude)
}

/// Execute the fitting pipeline on already-loaded samples.
///
/// This is useful for the TUI where exclusions change without re-reading input.
pub fn run_fit_with_input(
    config: &FitConfig,
    input: &LoadedInput,
    exclude: &[u64],
) -> Result<RunOutput, AppError> {
    let samples = input.samples.excluding(exclude)?;
    let weights = input.weights.as_ref().map(|w| {
        input
            .samples
            .kept_indices(exclude)
            .into_iter()
            .map(|i| w[i])
            .collect::<Vec<f64>>()
    });

    let fit = ThresholdCurveFitter::new(config.fit_options()).fit(&samples, weights.as_deref())?;
    let residuals = crate::report::compute_residuals(&samples, weights.as_deref(), &fit)?;
    let x_range = resolve_x_range(config, input, &samples);

    Ok(RunOutput {
        samples,
        weights,
        fit,
        residuals,
        x_range,
    })
}

/// Plot window: explicit bounds win, then the input's default, then the
/// sample domain (signalled by `None`).
pub fn resolve_x_range(config: &FitConfig, input: &LoadedInput, samples: &SampleSet) -> Option<(f64, f64)> {
    let fallback = input.default_x_range.or_else(|| samples.size_range());
    match (config.x_min, config.x_max) {
        (None, None) => input.default_x_range,
        (lo, hi) => {
            let (d_lo, d_hi) = fallback.unwrap_or((1.0, 2.0));
            Some((lo.unwrap_or(d_lo), hi.unwrap_or(d_hi)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn builtin_run_uses_default_window() {
        let config = FitConfig::default();
        let run = run_fit(&config).unwrap();
        assert_eq!(run.samples.len(), 9);
        assert_eq!(run.residuals.len(), 9);
        assert_eq!(run.x_range, Some(QUDIT_PLOT_RANGE));
        assert!(run.fit.plateau() > 0.17 && run.fit.plateau() < 0.18);
    }

    #[test]
    fn exclusion_reproduces_the_eight_point_fit() {
        let config = FitConfig {
            exclude: vec![7919],
            x_max: Some(120.0),
            ..FitConfig::default()
        };
        let run = run_fit(&config).unwrap();
        assert_eq!(run.samples.len(), 8);
        assert_eq!(run.x_range, Some((2.0, 120.0)));
        let plateau = run.fit.plateau();
        assert!(plateau > 0.17 && plateau < 0.18, "plateau={plateau}");
    }

    #[test]
    fn builtin_with_input_weights_is_invalid() {
        let config = FitConfig {
            weight_mode: WeightMode::Input,
            ..FitConfig::default()
        };
        assert_eq!(run_fit(&config).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn weights_follow_exclusions() {
        let input = LoadedInput {
            source: "test".to_string(),
            samples: SampleSet::from_arrays(
                &[2, 3, 5, 8, 13],
                &[0.0975, 0.118, 0.145, 0.162, 0.165],
            )
            .unwrap(),
            weights: Some(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            default_x_range: None,
        };
        let run = run_fit_with_input(&FitConfig::default(), &input, &[3]).unwrap();
        assert_eq!(run.weights, Some(vec![1.0, 3.0, 4.0, 5.0]));
        assert_eq!(run.residuals[1].weight, 3.0);
        assert_eq!(run.x_range, None);
    }
}
