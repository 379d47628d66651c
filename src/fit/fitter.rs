//! Threshold curve fitting.
//!
//! Given:
//! - sizes `x_i` (qudit dimension / system size)
//! - measured thresholds `y_i`
//! - optional weights `w_i`
//!
//! we minimize `Σ w_i (y_i - f(x_i))²` for `f(x) = a - b / (c + x)` with
//! Levenberg–Marquardt, starting from a deterministic guess so repeated fits
//! of the same inputs are bit-identical.

use nalgebra::{DMatrix, DVector};

use crate::domain::{CurveParams, FitOptions, FitQuality, FitResult, PARAM_COUNT, PlotSpec, SampleSet};
use crate::error::AppError;
use crate::math::{LeastSquaresProblem, LmError, LmSettings, levenberg_marquardt, solve_least_squares};
use crate::models::{from_linearized, jacobian_row, linearized_row, pole_outside, predict};

/// `|c + x|` below which `x` is treated as the pole.
const POLE_EPS: f64 = 1e-12;

/// Fit `f(x) = a - b / (c + x)` to `samples`.
///
/// `weights`, when given, must match `samples` in length and be finite and
/// strictly positive. `None` means uniform weights.
pub fn fit_threshold_curve(
    samples: &SampleSet,
    weights: Option<&[f64]>,
    opts: &FitOptions,
) -> Result<FitResult, AppError> {
    validate_inputs(samples, weights)?;

    let problem = ThresholdProblem::new(samples, weights);
    let start = match opts.initial_guess {
        Some(guess) => {
            if !guess.is_finite() {
                return Err(AppError::invalid_input("Initial guess must be finite."));
            }
            guess
        }
        None => initial_guess(samples, weights),
    };
    log::debug!(
        "fit: n={} start a={:.6} b={:.6} c={:.6}",
        samples.len(),
        start.a,
        start.b,
        start.c
    );

    let settings = LmSettings {
        max_iters: opts.max_iters,
        ftol: opts.ftol,
        xtol: opts.xtol,
        gtol: opts.gtol,
    };
    let report = levenberg_marquardt(&problem, DVector::from_row_slice(&start.to_array()), &settings)
        .map_err(|e| match e {
            LmError::InadmissibleStart => AppError::invalid_input(format!(
                "Initial guess puts the pole x = {:.6} inside the sample domain.",
                start.pole()
            )),
            other => AppError::not_converged(format!("Fit did not converge: {other}.")),
        })?;

    let params = CurveParams::from_slice(report.params.as_slice());
    if !params.is_finite() {
        return Err(AppError::not_converged("Fit produced non-finite parameters."));
    }

    let n = samples.len();
    let dof = n - PARAM_COUNT;
    let (covariance, std_errors) = covariance(&report.jacobian, report.sse, dof);

    log::info!(
        "fit: plateau={:.6} (a={:.6}, b={:.6}, c={:.6}) sse={:.3e} iterations={} stop={:?}",
        params.a,
        params.a,
        params.b,
        params.c,
        report.sse,
        report.iterations,
        report.stop
    );

    Ok(FitResult {
        params,
        quality: FitQuality {
            sse: report.sse,
            rmse: (report.sse / n as f64).sqrt(),
            n,
            dof,
            iterations: report.iterations,
            covariance,
            std_errors,
        },
    })
}

/// Evaluate the fitted curve at `x`.
pub fn evaluate(fit: &FitResult, x: f64) -> Result<f64, AppError> {
    if !x.is_finite() {
        return Err(AppError::invalid_input(format!("Cannot evaluate at x = {x}.")));
    }
    if (fit.params.c + x).abs() < POLE_EPS {
        return Err(AppError::invalid_input(format!(
            "x = {x} is the pole of the fitted curve (x = -c)."
        )));
    }
    Ok(predict(&fit.params, x))
}

/// Deterministic starting point.
///
/// Solves the linearized model (exact for noise-free data). Falls back to
/// `a = max(y)`, `b = a·min(x)`, `c = 0` when that solution is not finite or
/// places the pole inside the sample domain.
pub fn initial_guess(samples: &SampleSet, weights: Option<&[f64]>) -> CurveParams {
    let fallback = fallback_guess(samples);
    let Some((x_min, x_max)) = samples.size_range() else {
        return fallback;
    };

    let n = samples.len();
    let mut xw = DMatrix::<f64>::zeros(n, PARAM_COUNT);
    let mut yw = DVector::<f64>::zeros(n);
    for (i, s) in samples.iter().enumerate() {
        let sw = weights.map_or(1.0, |w| w[i].sqrt());
        let (row, target) = linearized_row(s.size as f64, s.threshold);
        for (j, v) in row.iter().enumerate() {
            xw[(i, j)] = v * sw;
        }
        yw[i] = target * sw;
    }

    let Some(beta) = solve_least_squares(&xw, &yw) else {
        log::debug!("fit: linearized start is singular; using fallback guess");
        return fallback;
    };
    let guess = from_linearized(beta[0], beta[1], beta[2]);
    if guess.is_finite() && pole_outside(&guess, x_min, x_max) {
        guess
    } else {
        log::debug!("fit: linearized start rejected ({guess:?}); using fallback guess");
        fallback
    }
}

fn fallback_guess(samples: &SampleSet) -> CurveParams {
    let a = samples
        .iter()
        .map(|s| s.threshold)
        .fold(f64::NEG_INFINITY, f64::max);
    let x_min = samples.size_range().map_or(1.0, |(lo, _)| lo);
    let a = if a.is_finite() { a } else { 0.0 };
    CurveParams::new(a, a * x_min, 0.0)
}

fn validate_inputs(samples: &SampleSet, weights: Option<&[f64]>) -> Result<(), AppError> {
    if let Some(s) = samples.iter().find(|s| s.size == 0) {
        return Err(AppError::invalid_input(format!(
            "Size must be > 0 (got {}).",
            s.size
        )));
    }
    if let Some(w) = weights {
        if w.len() != samples.len() {
            return Err(AppError::invalid_input(format!(
                "Got {} weights for {} samples.",
                w.len(),
                samples.len()
            )));
        }
        if let Some((i, v)) = w.iter().enumerate().find(|(_, v)| !(v.is_finite() && **v > 0.0)) {
            return Err(AppError::invalid_input(format!(
                "Weight {i} must be finite and > 0 (got {v})."
            )));
        }
    }
    if samples.len() < PARAM_COUNT {
        return Err(AppError::insufficient_data(format!(
            "Need at least {PARAM_COUNT} samples to fit {PARAM_COUNT} parameters (got {}).",
            samples.len()
        )));
    }
    Ok(())
}

/// `(JᵀJ)⁻¹ · sse/dof` and its diagonal square roots.
#[allow(clippy::type_complexity)]
fn covariance(
    jac: &DMatrix<f64>,
    sse: f64,
    dof: usize,
) -> (Option<[[f64; PARAM_COUNT]; PARAM_COUNT]>, Option<[f64; PARAM_COUNT]>) {
    if dof == 0 {
        return (None, None);
    }
    let Some(inv) = (jac.transpose() * jac).try_inverse() else {
        return (None, None);
    };
    let s2 = sse / dof as f64;

    let mut cov = [[0.0; PARAM_COUNT]; PARAM_COUNT];
    for (i, row) in cov.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = inv[(i, j)] * s2;
        }
    }
    if cov.iter().flatten().any(|v| !v.is_finite()) {
        return (None, None);
    }

    let diag = [cov[0][0], cov[1][1], cov[2][2]];
    let std_errors = if diag.iter().all(|&v| v >= 0.0) {
        Some(diag.map(f64::sqrt))
    } else {
        None
    };
    (Some(cov), std_errors)
}

/// The weighted residual problem handed to the optimizer.
struct ThresholdProblem {
    x: Vec<f64>,
    y: Vec<f64>,
    sqrt_w: Vec<f64>,
    x_min: f64,
    x_max: f64,
}

impl ThresholdProblem {
    fn new(samples: &SampleSet, weights: Option<&[f64]>) -> Self {
        let x = samples.sizes();
        let (x_min, x_max) = samples.size_range().unwrap_or((1.0, 1.0));
        let sqrt_w = match weights {
            Some(w) => w.iter().map(|v| v.sqrt()).collect(),
            None => vec![1.0; x.len()],
        };
        Self {
            x,
            y: samples.thresholds(),
            sqrt_w,
            x_min,
            x_max,
        }
    }
}

impl LeastSquaresProblem for ThresholdProblem {
    fn param_count(&self) -> usize {
        PARAM_COUNT
    }

    fn residuals(&self, params: &DVector<f64>) -> DVector<f64> {
        let p = CurveParams::from_slice(params.as_slice());
        DVector::from_iterator(
            self.x.len(),
            self.x
                .iter()
                .zip(&self.y)
                .zip(&self.sqrt_w)
                .map(|((&x, &y), &sw)| sw * (y - predict(&p, x))),
        )
    }

    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64> {
        let p = CurveParams::from_slice(params.as_slice());
        let mut jac = DMatrix::zeros(self.x.len(), PARAM_COUNT);
        for (i, (&x, &sw)) in self.x.iter().zip(&self.sqrt_w).enumerate() {
            for (j, v) in jacobian_row(&p, x).iter().enumerate() {
                jac[(i, j)] = v * sw;
            }
        }
        jac
    }

    fn is_admissible(&self, params: &DVector<f64>) -> bool {
        let p = CurveParams::from_slice(params.as_slice());
        p.is_finite() && pole_outside(&p, self.x_min, self.x_max)
    }
}

/// Fit / evaluate / render bundled behind one set of optimizer options.
#[derive(Debug, Clone, Default)]
pub struct ThresholdCurveFitter {
    pub options: FitOptions,
}

impl ThresholdCurveFitter {
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }

    pub fn fit(&self, samples: &SampleSet, weights: Option<&[f64]>) -> Result<FitResult, AppError> {
        fit_threshold_curve(samples, weights, &self.options)
    }

    pub fn evaluate(&self, fit: &FitResult, x: f64) -> Result<f64, AppError> {
        evaluate(fit, x)
    }

    pub fn render(&self, samples: &SampleSet, fit: &FitResult, spec: &PlotSpec) -> Result<(), AppError> {
        crate::plot::render(samples, fit, spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const SIZES: [u64; 8] = [2, 3, 5, 8, 13, 25, 50, 101];
    const THRESH: [f64; 8] = [0.0975, 0.118, 0.145, 0.162, 0.165, 0.167, 0.1698, 0.170];

    fn synthetic(params: CurveParams, sizes: &[u64]) -> SampleSet {
        let y: Vec<f64> = sizes.iter().map(|&s| predict(&params, s as f64)).collect();
        SampleSet::from_arrays(sizes, &y).unwrap()
    }

    #[test]
    fn recovers_noise_free_parameters() {
        for truth in [
            CurveParams::new(0.18, 0.25, 0.8),
            CurveParams::new(0.11, 0.05, -1.5),
            CurveParams::new(0.3, 1.2, 4.0),
        ] {
            let samples = synthetic(truth, &SIZES);
            let fit = fit_threshold_curve(&samples, None, &FitOptions::default()).unwrap();

            assert!((fit.params.a - truth.a).abs() < 1e-6, "{truth:?} -> {:?}", fit.params);
            assert!((fit.params.b - truth.b).abs() < 1e-6, "{truth:?} -> {:?}", fit.params);
            assert!((fit.params.c - truth.c).abs() < 1e-6, "{truth:?} -> {:?}", fit.params);
            for s in samples.iter() {
                let y = evaluate(&fit, s.size as f64).unwrap();
                assert!((y - s.threshold).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn recovers_from_explicit_far_guess() {
        let truth = CurveParams::new(0.18, 0.25, 0.8);
        let samples = synthetic(truth, &SIZES);
        let opts = FitOptions {
            initial_guess: Some(CurveParams::new(0.1, 0.1, 0.0)),
            ..FitOptions::default()
        };
        let fit = fit_threshold_curve(&samples, None, &opts).unwrap();
        assert!((fit.plateau() - truth.a).abs() < 1e-6, "{:?}", fit.params);
    }

    #[test]
    fn too_few_samples_is_insufficient_data() {
        let samples = SampleSet::from_arrays(&[2, 3], &[0.1, 0.12]).unwrap();
        let err = fit_threshold_curve(&samples, None, &FitOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn non_positive_or_mismatched_weights_are_invalid() {
        let samples = synthetic(CurveParams::new(0.18, 0.25, 0.8), &SIZES);
        let mut w = vec![1.0; SIZES.len()];
        w[3] = 0.0;
        let err = fit_threshold_curve(&samples, Some(&w), &FitOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        w[3] = -2.0;
        let err = fit_threshold_curve(&samples, Some(&w), &FitOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let short = vec![1.0; 3];
        let err = fit_threshold_curve(&samples, Some(&short), &FitOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn non_positive_size_is_invalid() {
        let err = SampleSet::from_arrays(&[0, 3, 5, 8], &[0.1, 0.12, 0.14, 0.15]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn evaluate_rejects_pole() {
        let samples = synthetic(CurveParams::new(0.18, 0.25, 0.8), &SIZES);
        let fit = fit_threshold_curve(&samples, None, &FitOptions::default()).unwrap();
        let err = evaluate(&fit, -fit.params.c).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(evaluate(&fit, f64::NAN).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn repeated_fits_are_identical() {
        let samples = SampleSet::from_arrays(&SIZES, &THRESH).unwrap();
        let w: Vec<f64> = (1..=SIZES.len()).map(|i| i as f64).collect();
        let first = fit_threshold_curve(&samples, Some(&w), &FitOptions::default()).unwrap();
        let second = fit_threshold_curve(&samples, Some(&w), &FitOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn measured_qudit_thresholds_plateau() {
        let samples = SampleSet::from_arrays(&SIZES, &THRESH).unwrap();
        let fit = fit_threshold_curve(&samples, None, &FitOptions::default()).unwrap();
        let plateau = fit.plateau();
        assert!(plateau > 0.17 && plateau < 0.18, "plateau={plateau}");
        assert_eq!(fit.quality.n, 8);
        assert_eq!(fit.quality.dof, 5);
        assert!(fit.quality.covariance.is_some());
        let se = fit.quality.std_errors.unwrap();
        assert!(se.iter().all(|v| v.is_finite() && *v > 0.0));
    }

    #[test]
    fn evaluate_is_increasing_for_positive_b_and_c() {
        let fit = FitResult {
            params: CurveParams::new(0.2, 0.5, 1.5),
            quality: FitQuality {
                sse: 0.0,
                rmse: 0.0,
                n: 3,
                dof: 0,
                iterations: 0,
                covariance: None,
                std_errors: None,
            },
        };
        let mut prev = evaluate(&fit, -1.5 + 1e-6).unwrap();
        let mut x = -1.5 + 1e-3;
        while x < 500.0 {
            let y = evaluate(&fit, x).unwrap();
            assert!(y > prev, "not increasing at x={x}");
            prev = y;
            // Geometric steps away from the pole at x = -1.5.
            x += (x + 1.5) * 0.3 + 1e-3;
        }
    }

    #[test]
    fn exactly_three_points_has_no_covariance() {
        let samples = synthetic(CurveParams::new(0.18, 0.25, 0.8), &[2, 5, 20]);
        let fit = fit_threshold_curve(&samples, None, &FitOptions::default()).unwrap();
        assert_eq!(fit.quality.dof, 0);
        assert!(fit.quality.covariance.is_none());
        assert!((fit.plateau() - 0.18).abs() < 1e-6);
    }

    #[test]
    fn flat_data_fails_to_converge() {
        // b = 0 makes the c column of the Jacobian vanish.
        let samples = SampleSet::from_arrays(&[2, 3, 5, 8], &[0.1, 0.1, 0.1, 0.1]).unwrap();
        let err = fit_threshold_curve(&samples, None, &FitOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FitDidNotConverge);
    }

    #[test]
    fn fitter_fits_evaluates_and_renders() {
        let truth = CurveParams::new(0.18, 0.25, 0.8);
        let samples = synthetic(truth, &[2, 3, 5, 8, 13, 25]);
        let fitter = ThresholdCurveFitter::new(FitOptions::default());

        let fit = fitter.fit(&samples, None).unwrap();
        assert!((fit.plateau() - 0.18).abs() < 1e-8);
        let y = fitter.evaluate(&fit, 10.0).unwrap();
        assert!((y - predict(&truth, 10.0)).abs() < 1e-8);
        assert!(fitter.evaluate(&fit, -fit.params.c).is_err());

        let dir = std::env::temp_dir().join(format!("thresh_fitter_{}", std::process::id()));
        let spec = PlotSpec::new(dir.join("fit.svg"));
        fitter.render(&samples, &fit, &spec).unwrap();
        let svg = std::fs::read_to_string(&spec.output).unwrap();
        let _ = std::fs::remove_dir_all(&dir);
        assert!(svg.contains("Plateau at 0.180"));
    }
}
