//! Plotting.
//!
//! All front-ends (SVG file, ASCII preview, TUI chart) draw the same three
//! layers, computed once by [`build_series`]:
//!
//! - observed samples (scatter)
//! - the fitted curve on a dense grid
//! - a horizontal reference line at the plateau

pub mod ascii;
pub mod svg;

pub use ascii::*;
pub use svg::*;

use crate::domain::{FitResult, SampleSet};
use crate::error::AppError;
use crate::fit::evaluate;

/// Render-ready data for one fit.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    /// Samples inside the x window.
    pub points: Vec<(f64, f64)>,
    pub curve: Vec<(f64, f64)>,
    pub plateau: f64,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
}

/// Evaluate the fit on `n` evenly spaced points of `[x0, x1]`.
///
/// Points [`evaluate`] rejects (the pole) are skipped.
pub fn curve_grid(fit: &FitResult, x0: f64, x1: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let x = x0 + u * (x1 - x0);
        match evaluate(fit, x) {
            Ok(y) if y.is_finite() => out.push((x, y)),
            _ => log::debug!("plot: skipped curve point at x={x}"),
        }
    }
    out
}

/// Compute the layers and bounds for a plot.
///
/// `x_range` defaults to the sample domain. Curve points on the far side of
/// the pole from the samples are dropped.
pub fn build_series(
    samples: &SampleSet,
    fit: &FitResult,
    x_range: Option<(f64, f64)>,
    grid_points: usize,
) -> Result<PlotSeries, AppError> {
    let (mut x0, mut x1) = match x_range {
        Some(r) => r,
        None => samples
            .size_range()
            .ok_or_else(|| AppError::invalid_input("Cannot plot an empty sample set."))?,
    };
    if !(x0.is_finite() && x1.is_finite()) || x1 < x0 {
        return Err(AppError::invalid_input(format!(
            "Invalid plot x-range [{x0}, {x1}]."
        )));
    }
    if (x1 - x0).abs() < 1e-9 {
        x0 -= 0.5;
        x1 += 0.5;
    }

    let plateau = fit.plateau();
    let pole = fit.params.pole();
    let sample_side = samples.size_range().map_or(1.0, |(lo, _)| (lo - pole).signum());

    let points: Vec<(f64, f64)> = samples
        .iter()
        .map(|s| (s.size as f64, s.threshold))
        .filter(|&(x, _)| x >= x0 && x <= x1)
        .collect();

    let curve: Vec<(f64, f64)> = curve_grid(fit, x0, x1, grid_points)
        .into_iter()
        .filter(|&(x, _)| (x - pole).signum() == sample_side)
        .collect();

    let (mut y_min, mut y_max) = (plateau, plateau);
    for &(_, y) in points.iter().chain(curve.iter()) {
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    if !(y_min.is_finite() && y_max.is_finite()) {
        return Err(AppError::invalid_input("Plot values are not finite."));
    }
    let pad = ((y_max - y_min).abs() * 0.05).max(1e-3);

    Ok(PlotSeries {
        points,
        curve,
        plateau,
        x_bounds: [x0, x1],
        y_bounds: [y_min - pad, y_max + pad],
    })
}
