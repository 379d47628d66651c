//! CSV exports: per-sample residuals and synthetic sample sets.
//!
//! The files are meant to be easy to consume in spreadsheets or downstream
//! scripts, and synthetic sets read back through `ingest`.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{SampleResidual, SampleSet};
use crate::error::AppError;

/// Write per-sample fitted values and residuals.
pub fn write_residuals_csv(path: &Path, residuals: &[SampleResidual]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::io(format!("Failed to create residual CSV '{}': {e}", path.display())))?;

    writer
        .write_record(["size", "threshold", "weight", "fitted", "residual"])
        .map_err(|e| AppError::io(format!("Failed to write residual CSV header: {e}")))?;

    for r in residuals {
        writer
            .write_record([
                r.sample.size.to_string(),
                format!("{:.6}", r.sample.threshold),
                format!("{:.6}", r.weight),
                format!("{:.10}", r.fitted),
                format!("{:.10}", r.residual),
            ])
            .map_err(|e| AppError::io(format!("Failed to write residual CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush residual CSV: {e}")))?;

    log::info!("export: wrote {} residual rows to '{}'", residuals.len(), path.display());
    Ok(())
}

/// Write samples in the ingest schema (`size,threshold[,sigma]`).
pub fn write_samples_csv(path: &Path, samples: &SampleSet, sigma: Option<f64>) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create sample CSV '{}': {e}", path.display())))?;

    let header = if sigma.is_some() { "size,threshold,sigma" } else { "size,threshold" };
    writeln!(file, "{header}").map_err(|e| AppError::io(format!("Failed to write sample CSV header: {e}")))?;

    for s in samples.iter() {
        let row = match sigma {
            Some(sd) => format!("{},{:.10},{sd}", s.size, s.threshold),
            None => format!("{},{:.10}", s.size, s.threshold),
        };
        writeln!(file, "{row}").map_err(|e| AppError::io(format!("Failed to write sample CSV row: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WeightMode;
    use crate::io::ingest::load_samples;

    #[test]
    fn residual_csv_has_one_row_per_sample() {
        let samples = crate::data::qudit_thresholds().unwrap();
        let fit = crate::fit::fit_threshold_curve(&samples, None, &crate::domain::FitOptions::default()).unwrap();
        let residuals = crate::report::compute_residuals(&samples, None, &fit).unwrap();
        let path = std::env::temp_dir().join(format!("thresh_residuals_{}.csv", std::process::id()));
        write_residuals_csv(&path, &residuals).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        let _ = std::fs::remove_file(&path);

        assert_eq!(headers, vec!["size", "threshold", "weight", "fitted", "residual"]);
        assert_eq!(rows.len(), 9);
        assert_eq!(&rows[8][0], "7919");
        assert_eq!(&rows[0][2], "1.000000");
    }

    #[test]
    fn sample_csv_reads_back_through_ingest() {
        let samples = SampleSet::from_arrays(&[2, 3, 5], &[0.0975, 0.118, 0.145]).unwrap();
        let path = std::env::temp_dir().join(format!("thresh_samples_{}.csv", std::process::id()));
        write_samples_csv(&path, &samples, Some(0.002)).unwrap();

        let back = load_samples(&path, WeightMode::Input).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(back.samples, samples);
        let w = back.weights.unwrap();
        assert!(w.iter().all(|&v| (v - 250_000.0).abs() < 1e-3));
    }
}
