//! CSV ingest and normalization.
//!
//! Turns a threshold measurement CSV into a validated `SampleSet` plus
//! optional weights.
//!
//! Schema (header names are case-insensitive):
//! - size: `size`, `d`, `l`, or `dimension` (positive integer, required)
//! - threshold: `threshold`, `thresh`, or `p_th` (in `[0, 1]`, required)
//! - `weight` (optional, > 0) or `sigma` (optional, > 0; weight = 1/σ²)
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors, exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{Sample, SampleSet, WeightMode};
use crate::error::AppError;

const COMMENT: u8 = b'#';
const SIZE_COLUMNS: [&str; 4] = ["size", "d", "l", "dimension"];
const THRESHOLD_COLUMNS: [&str; 3] = ["threshold", "thresh", "p_th"];

/// Where the per-sample weights came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightSource {
    Uniform,
    WeightColumn,
    SigmaColumn,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: validated samples + resolved weights + row errors.
#[derive(Debug, Clone)]
pub struct IngestedSamples {
    pub samples: SampleSet,
    /// `None` for uniform weighting.
    pub weights: Option<Vec<f64>>,
    pub weight_source: WeightSource,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load samples from a CSV file.
pub fn load_samples(path: &Path, weight_mode: WeightMode) -> Result<IngestedSamples, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open CSV '{}': {e}", path.display())))?;
    let ingested = read_samples(file, weight_mode)?;
    log::info!(
        "ingest: {} samples from '{}' ({} rows, {} skipped, weights: {:?})",
        ingested.samples.len(),
        path.display(),
        ingested.rows_read,
        ingested.row_errors.len(),
        ingested.weight_source
    );
    Ok(ingested)
}

/// Load samples from any CSV reader.
pub fn read_samples<R: Read>(mut source: R, weight_mode: WeightMode) -> Result<IngestedSamples, AppError> {
    let mut text = String::new();
    source
        .read_to_string(&mut text)
        .map_err(|e| AppError::io(format!("Failed to read CSV: {e}")))?;
    let lines: Vec<&str> = text.lines().collect();

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(COMMENT))
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::invalid_input(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let size_idx = find_column(&header_map, &SIZE_COLUMNS).ok_or_else(|| {
        AppError::invalid_input("Missing required size column (`size`, `d`, `L`, or `dimension`).")
    })?;
    let threshold_idx = find_column(&header_map, &THRESHOLD_COLUMNS).ok_or_else(|| {
        AppError::invalid_input("Missing required threshold column (`threshold`, `thresh`, or `p_th`).")
    })?;

    let weight_source = resolve_weight_source(weight_mode, &header_map)?;
    let weight_idx = match weight_source {
        WeightSource::Uniform => None,
        WeightSource::WeightColumn => header_map.get("weight").copied(),
        WeightSource::SigmaColumn => header_map.get("sigma").copied(),
    };

    let mut samples = Vec::new();
    let mut weights = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    let mut record = StringRecord::new();
    loop {
        let line = match reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => record_line(&lines, record.position().map_or(1, |p| p.line())),
            Err(e) => {
                rows_read += 1;
                let start = e.position().map_or(reader.position().line(), |p| p.line());
                row_errors.push(RowError {
                    line: record_line(&lines, start),
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        rows_read += 1;

        match parse_row(&record, size_idx, threshold_idx, weight_idx, weight_source) {
            Ok((sample, weight)) => {
                samples.push(sample);
                weights.push(weight);
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    for e in &row_errors {
        log::warn!("ingest: skipped line {}: {}", e.line, e.message);
    }

    if samples.is_empty() {
        return Err(AppError::invalid_input("No valid sample rows in CSV."));
    }

    let samples = SampleSet::new(samples)?;
    let weights = match weight_source {
        WeightSource::Uniform => None,
        _ => Some(weights),
    };

    Ok(IngestedSamples {
        samples,
        weights,
        weight_source,
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn find_column(header_map: &HashMap<String, usize>, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|n| header_map.get(*n).copied())
}

fn resolve_weight_source(
    mode: WeightMode,
    header_map: &HashMap<String, usize>,
) -> Result<WeightSource, AppError> {
    match mode {
        WeightMode::Uniform => Ok(WeightSource::Uniform),
        WeightMode::Input => {
            let has_weight = header_map.contains_key("weight");
            let has_sigma = header_map.contains_key("sigma");
            match (has_weight, has_sigma) {
                (true, true) => Err(AppError::invalid_input(
                    "CSV has both `weight` and `sigma` columns; keep only one.",
                )),
                (true, false) => Ok(WeightSource::WeightColumn),
                (false, true) => Ok(WeightSource::SigmaColumn),
                (false, false) => Err(AppError::invalid_input(
                    "`--weights input` requires a `weight` or `sigma` column in the CSV.",
                )),
            }
        }
    }
}

fn parse_row(
    record: &StringRecord,
    size_idx: usize,
    threshold_idx: usize,
    weight_idx: Option<usize>,
    weight_source: WeightSource,
) -> Result<(Sample, f64), String> {
    let size_raw = field(record, size_idx).ok_or("missing size")?;
    let size: u64 = size_raw
        .parse()
        .map_err(|_| format!("size '{size_raw}' is not a positive integer"))?;
    if size == 0 {
        return Err("size must be > 0".to_string());
    }

    let threshold_raw = field(record, threshold_idx).ok_or("missing threshold")?;
    let threshold: f64 = threshold_raw
        .parse()
        .map_err(|_| format!("threshold '{threshold_raw}' is not a number"))?;
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(format!("threshold {threshold} is outside [0, 1]"));
    }

    let weight = match weight_idx {
        None => 1.0,
        Some(idx) => {
            let raw = field(record, idx).ok_or("missing weight/sigma")?;
            let v: f64 = raw
                .parse()
                .map_err(|_| format!("weight/sigma '{raw}' is not a number"))?;
            if !(v.is_finite() && v > 0.0) {
                return Err(format!("weight/sigma must be finite and > 0 (got {v})"));
            }
            match weight_source {
                WeightSource::SigmaColumn => 1.0 / (v * v),
                _ => v,
            }
        }
    };

    Ok((Sample { size, threshold }, weight))
}

/// 1-based line where a record begins.
///
/// csv positions point just past the previous record, so comment and empty
/// lines in between are skipped here.
fn record_line(lines: &[&str], start: u64) -> usize {
    let mut line = start.max(1) as usize;
    while let Some(text) = lines.get(line - 1) {
        if !(text.is_empty() || text.as_bytes().first() == Some(&COMMENT)) {
            break;
        }
        line += 1;
    }
    line
}

fn field(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn reads_aliases_and_skips_bad_rows() {
        let csv = "\u{feff}D,Thresh\n2,0.0975\n3,0.118\nx,0.2\n5,1.5\n8,0.162\n";
        let out = read_samples(csv.as_bytes(), WeightMode::Uniform).unwrap();
        let sizes: Vec<u64> = out.samples.iter().map(|s| s.size).collect();
        assert_eq!(sizes, vec![2, 3, 8]);
        assert_eq!(out.rows_read, 5);
        assert_eq!(out.row_errors.len(), 2);
        assert_eq!(out.row_errors[0].line, 4);
        assert!(out.weights.is_none());
    }

    #[test]
    fn row_errors_report_file_lines_past_comments() {
        let csv = "size,threshold\n# measured 2024\n2,0.0975\n# d=3 rerun\n\n3,bad\n5,0.145\n";
        let out = read_samples(csv.as_bytes(), WeightMode::Uniform).unwrap();
        assert_eq!(out.samples.len(), 2);
        assert_eq!(out.row_errors.len(), 1);
        assert_eq!(out.row_errors[0].line, 6);
    }

    #[test]
    fn sigma_column_becomes_inverse_variance_weight() {
        let csv = "size,threshold,sigma\n2,0.1,0.5\n3,0.12,1\n5,0.14,0.01\n";
        let out = read_samples(csv.as_bytes(), WeightMode::Input).unwrap();
        assert_eq!(out.weight_source, WeightSource::SigmaColumn);
        let w = out.weights.unwrap();
        assert!((w[0] - 4.0).abs() < 1e-12);
        assert!((w[1] - 1.0).abs() < 1e-12);
        assert!((w[2] - 1e4).abs() < 1e-6);
    }

    #[test]
    fn uniform_mode_ignores_weight_columns() {
        let csv = "size,threshold,weight\n2,0.1,5\n3,0.12,1\n5,0.14,2\n";
        let out = read_samples(csv.as_bytes(), WeightMode::Uniform).unwrap();
        assert!(out.weights.is_none());
    }

    #[test]
    fn input_weights_require_a_column() {
        let csv = "size,threshold\n2,0.1\n3,0.12\n";
        let err = read_samples(csv.as_bytes(), WeightMode::Input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn missing_threshold_column_is_invalid() {
        let csv = "size,value\n2,0.1\n";
        let err = read_samples(csv.as_bytes(), WeightMode::Uniform).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn duplicate_sizes_are_invalid() {
        let csv = "size,threshold\n2,0.1\n2,0.12\n3,0.13\n";
        let err = read_samples(csv.as_bytes(), WeightMode::Uniform).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
