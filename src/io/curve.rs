//! Read/write fit JSON files.
//!
//! Fit JSON is the "portable" representation of a fit:
//! - the samples and weights it was fitted on
//! - parameters, plateau and quality diagnostics
//! - a precomputed curve grid for quick plotting
//!
//! The schema is defined by `domain::FitFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{CurveGrid, FitFile, FitResult, SampleSet};
use crate::error::AppError;
use crate::plot::curve_grid;

/// Points on the saved curve grid.
const GRID_POINTS: usize = 101;

/// Build the serializable record of one fit.
///
/// The curve grid spans `x_range` when given, else the sample domain.
pub fn fit_file(
    samples: &SampleSet,
    weights: Option<&[f64]>,
    fit: &FitResult,
    x_range: Option<(f64, f64)>,
) -> FitFile {
    let (x0, x1) = x_range
        .or_else(|| samples.size_range())
        .unwrap_or((1.0, 2.0));
    let (x, y): (Vec<f64>, Vec<f64>) = curve_grid(fit, x0, x1, GRID_POINTS).into_iter().unzip();

    FitFile {
        tool: "thresh".to_string(),
        generated_at: Utc::now(),
        samples: samples.clone(),
        weights: weights.map(|w| w.to_vec()),
        params: fit.params,
        plateau: fit.plateau(),
        quality: fit.quality.clone(),
        x_range,
        grid: CurveGrid { x, y },
    }
}

/// Write a fit JSON file.
pub fn write_fit_json(path: &Path, file: &FitFile) -> Result<(), AppError> {
    let out = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(out, file)
        .map_err(|e| AppError::io(format!("Failed to write fit JSON: {e}")))?;
    log::info!("export: wrote fit JSON '{}'", path.display());
    Ok(())
}

/// Read a fit JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    let fit: FitFile = serde_json::from_reader(file)
        .map_err(|e| AppError::invalid_input(format!("Invalid fit JSON: {e}")))?;
    Ok(fit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FitOptions;
    use crate::fit::fit_threshold_curve;

    #[test]
    fn fit_json_survives_a_write_read_cycle() {
        let samples = crate::data::qudit_thresholds().unwrap();
        let fit = fit_threshold_curve(&samples, None, &FitOptions::default()).unwrap();
        let record = fit_file(&samples, None, &fit, Some((2.0, 110.0)));
        assert_eq!(record.grid.x.len(), GRID_POINTS);
        assert_eq!(record.grid.x[0], 2.0);
        assert_eq!(record.grid.x[GRID_POINTS - 1], 110.0);

        let path = std::env::temp_dir().join(format!("thresh_fit_{}.json", std::process::id()));
        write_fit_json(&path, &record).unwrap();
        let back = read_fit_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(back.samples, samples);
        assert_eq!(back.fit_result(), fit);
        assert!(back.weights.is_none());
        assert_eq!(back.x_range, Some((2.0, 110.0)));
    }

    #[test]
    fn fit_json_without_window_defaults_to_none() {
        let samples = crate::data::qudit_thresholds().unwrap();
        let fit = fit_threshold_curve(&samples, None, &FitOptions::default()).unwrap();
        let mut value = serde_json::to_value(fit_file(&samples, None, &fit, None)).unwrap();
        value.as_object_mut().unwrap().remove("x_range");

        let back: FitFile = serde_json::from_value(value).unwrap();
        assert_eq!(back.x_range, None);
        assert_eq!(back.grid.x[GRID_POINTS - 1], 7919.0);
    }
}
