//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for re-plotting

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Number of free parameters in `f(x) = a - b / (c + x)`.
pub const PARAM_COUNT: usize = 3;

/// One measured threshold at a given system size (qudit dimension).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub size: u64,
    pub threshold: f64,
}

/// An ordered, validated set of threshold measurements.
///
/// Invariants (checked on construction and on deserialization):
/// - every size is strictly positive
/// - sizes are unique
/// - every threshold is finite and lies in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Sample>", into = "Vec<Sample>")]
pub struct SampleSet {
    samples: Vec<Sample>,
}

impl SampleSet {
    pub fn new(samples: Vec<Sample>) -> Result<Self, AppError> {
        let mut seen = HashSet::with_capacity(samples.len());
        for (i, s) in samples.iter().enumerate() {
            if s.size == 0 {
                return Err(AppError::invalid_input(format!(
                    "Sample {i}: size must be > 0."
                )));
            }
            if !s.threshold.is_finite() || !(0.0..=1.0).contains(&s.threshold) {
                return Err(AppError::invalid_input(format!(
                    "Sample {i} (size {}): threshold {} is outside [0, 1].",
                    s.size, s.threshold
                )));
            }
            if !seen.insert(s.size) {
                return Err(AppError::invalid_input(format!(
                    "Duplicate size {} in sample set.",
                    s.size
                )));
            }
        }
        Ok(Self { samples })
    }

    /// Build a set from parallel `sizes` / `thresholds` arrays.
    pub fn from_arrays(sizes: &[u64], thresholds: &[f64]) -> Result<Self, AppError> {
        if sizes.len() != thresholds.len() {
            return Err(AppError::invalid_input(format!(
                "sizes ({}) and thresholds ({}) differ in length.",
                sizes.len(),
                thresholds.len()
            )));
        }
        Self::new(
            sizes
                .iter()
                .zip(thresholds)
                .map(|(&size, &threshold)| Sample { size, threshold })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn sizes(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.size as f64).collect()
    }

    pub fn thresholds(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.threshold).collect()
    }

    /// `(min, max)` of the sizes, or `None` for an empty set.
    pub fn size_range(&self) -> Option<(f64, f64)> {
        let min = self.samples.iter().map(|s| s.size).min()?;
        let max = self.samples.iter().map(|s| s.size).max()?;
        Some((min as f64, max as f64))
    }

    pub fn contains_size(&self, size: u64) -> bool {
        self.samples.iter().any(|s| s.size == size)
    }

    /// Return a new set without the listed sizes.
    ///
    /// Every listed size must be present; excluding an unknown size is almost
    /// always a typo.
    pub fn excluding(&self, sizes: &[u64]) -> Result<Self, AppError> {
        if let Some(missing) = sizes.iter().find(|&&s| !self.contains_size(s)) {
            return Err(AppError::invalid_input(format!(
                "Cannot exclude size {missing}: not present in the sample set."
            )));
        }
        Ok(Self {
            samples: self
                .samples
                .iter()
                .filter(|s| !sizes.contains(&s.size))
                .copied()
                .collect(),
        })
    }

    /// Positions (in input order) of samples whose size is not listed.
    pub fn kept_indices(&self, excluded: &[u64]) -> Vec<usize> {
        self.samples
            .iter()
            .enumerate()
            .filter(|(_, s)| !excluded.contains(&s.size))
            .map(|(i, _)| i)
            .collect()
    }
}

impl TryFrom<Vec<Sample>> for SampleSet {
    type Error = AppError;

    fn try_from(value: Vec<Sample>) -> Result<Self, Self::Error> {
        SampleSet::new(value)
    }
}

impl From<SampleSet> for Vec<Sample> {
    fn from(value: SampleSet) -> Self {
        value.samples
    }
}

/// Coefficients of `f(x) = a - b / (c + x)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveParams {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl CurveParams {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    pub fn to_array(self) -> [f64; PARAM_COUNT] {
        [self.a, self.b, self.c]
    }

    pub fn from_slice(p: &[f64]) -> Self {
        Self {
            a: p[0],
            b: p[1],
            c: p[2],
        }
    }

    pub fn is_finite(&self) -> bool {
        self.a.is_finite() && self.b.is_finite() && self.c.is_finite()
    }

    /// Location of the model's pole (`x = -c`).
    pub fn pole(&self) -> f64 {
        -self.c
    }
}

/// Fit diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    /// Weighted sum of squared residuals.
    pub sse: f64,
    /// `sqrt(sse / n)`.
    pub rmse: f64,
    pub n: usize,
    /// Degrees of freedom, `n - 3`.
    pub dof: usize,
    /// Levenberg–Marquardt outer iterations used.
    pub iterations: usize,
    /// Parameter covariance, scaled by the residual variance `sse / dof`.
    ///
    /// `None` when `dof == 0` or the normal matrix cannot be inverted.
    pub covariance: Option<[[f64; PARAM_COUNT]; PARAM_COUNT]>,
    /// Square roots of the covariance diagonal.
    pub std_errors: Option<[f64; PARAM_COUNT]>,
}

/// Output of a single fit. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub params: CurveParams,
    pub quality: FitQuality,
}

impl FitResult {
    /// Asymptotic value of the curve as size grows without bound.
    pub fn plateau(&self) -> f64 {
        self.params.a
    }
}

/// Optimizer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    /// Explicit starting point; when `None` a deterministic heuristic is used.
    pub initial_guess: Option<CurveParams>,
    /// Outer iteration budget.
    pub max_iters: usize,
    /// Relative SSE reduction below which an accepted step ends the search.
    pub ftol: f64,
    /// Relative step size below which an accepted step ends the search.
    pub xtol: f64,
    /// Max-norm of the gradient `Jᵀr` treated as stationary.
    pub gtol: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            initial_guess: None,
            max_iters: 200,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-14,
        }
    }
}

/// Declarative description of the rendered plot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSpec {
    /// Output SVG path. Missing parent directories are created.
    pub output: PathBuf,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Canvas size in pixels.
    pub width: u32,
    pub height: u32,
    /// X window; defaults to the sample domain.
    pub x_range: Option<(f64, f64)>,
    /// Points on the dense curve grid.
    pub grid_points: usize,
    /// Decimal places in the plateau legend label.
    pub plateau_decimals: usize,
}

impl PlotSpec {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            title: "Threshold vs Qudit dimension".to_string(),
            x_label: "Qudit dimension d".to_string(),
            y_label: "Threshold".to_string(),
            width: 1000,
            height: 700,
            x_range: None,
            grid_points: 1000,
            plateau_decimals: 3,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_x_range(mut self, x_min: f64, x_max: f64) -> Self {
        self.x_range = Some((x_min, x_max));
        self
    }
}

/// Which observation weights enter the fit objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WeightMode {
    /// Every sample counts equally (the default).
    Uniform,
    /// Use the input's `weight` column, or `1/sigma^2` from its `sigma` column.
    Input,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Sample CSV; `None` selects the built-in qudit dataset.
    pub input: Option<PathBuf>,
    /// Sizes dropped before fitting.
    pub exclude: Vec<u64>,
    pub weight_mode: WeightMode,
    pub max_iters: usize,
    /// Initial guess override (`a, b, c`).
    pub initial_guess: Option<CurveParams>,

    pub plot_output: Option<PathBuf>,
    pub title: String,
    pub x_min: Option<f64>,
    pub x_max: Option<f64>,

    pub ascii: bool,
    pub ascii_width: usize,
    pub ascii_height: usize,

    pub export_fit: Option<PathBuf>,
    pub export_residuals: Option<PathBuf>,
}

impl FitConfig {
    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            initial_guess: self.initial_guess,
            max_iters: self.max_iters,
            ..FitOptions::default()
        }
    }
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            input: None,
            exclude: Vec::new(),
            weight_mode: WeightMode::Uniform,
            max_iters: FitOptions::default().max_iters,
            initial_guess: None,
            plot_output: None,
            title: "Threshold vs Qudit dimension".to_string(),
            x_min: None,
            x_max: None,
            ascii: true,
            ascii_width: 80,
            ascii_height: 20,
            export_fit: None,
            export_residuals: None,
        }
    }
}

/// Per-sample fitted value and residual.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleResidual {
    pub sample: Sample,
    pub weight: f64,
    pub fitted: f64,
    pub residual: f64,
}

/// A saved fit (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub samples: SampleSet,
    pub weights: Option<Vec<f64>>,
    pub params: CurveParams,
    pub plateau: f64,
    pub quality: FitQuality,
    /// Plot window the fit was rendered with; `None` means the sample domain.
    #[serde(default)]
    pub x_range: Option<(f64, f64)>,
    pub grid: CurveGrid,
}

impl FitFile {
    pub fn fit_result(&self) -> FitResult {
        FitResult {
            params: self.params,
            quality: self.quality.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn sample_set_rejects_zero_size() {
        let err = SampleSet::from_arrays(&[0, 2, 3], &[0.1, 0.12, 0.13]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn sample_set_rejects_duplicates_and_out_of_range() {
        let dup = SampleSet::from_arrays(&[2, 2, 3], &[0.1, 0.12, 0.13]).unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::InvalidInput);

        let high = SampleSet::from_arrays(&[2, 3, 4], &[0.1, 1.2, 0.13]).unwrap_err();
        assert_eq!(high.kind(), ErrorKind::InvalidInput);

        let nan = SampleSet::from_arrays(&[2, 3, 4], &[0.1, f64::NAN, 0.13]).unwrap_err();
        assert_eq!(nan.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn excluding_drops_named_sizes_and_keeps_order() {
        let set = SampleSet::from_arrays(&[2, 3, 5, 8], &[0.1, 0.11, 0.12, 0.13]).unwrap();
        let trimmed = set.excluding(&[3]).unwrap();
        let sizes: Vec<u64> = trimmed.iter().map(|s| s.size).collect();
        assert_eq!(sizes, vec![2, 5, 8]);
        assert_eq!(set.len(), 4, "source set is untouched");
        assert_eq!(set.kept_indices(&[3]), vec![0, 2, 3]);

        let err = set.excluding(&[42]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn sample_set_deserialization_enforces_invariants() {
        let ok: SampleSet =
            serde_json::from_str(r#"[{"size":2,"threshold":0.1},{"size":3,"threshold":0.2}]"#)
                .unwrap();
        assert_eq!(ok.len(), 2);

        let bad: Result<SampleSet, _> =
            serde_json::from_str(r#"[{"size":2,"threshold":0.1},{"size":2,"threshold":0.2}]"#);
        assert!(bad.is_err());
    }
}
