//! Measured thresholds of the generalized color code vs qudit dimension.
//!
//! The last point (d = 7919) sits far outside the default plot window
//! (`QUDIT_PLOT_RANGE`); it still anchors the plateau when included in a fit.

use crate::domain::SampleSet;
use crate::error::AppError;

pub const QUDIT_DIMENSIONS: [u64; 9] = [2, 3, 5, 8, 13, 25, 50, 101, 7919];

pub const QUDIT_THRESHOLDS: [f64; 9] = [
    0.0975, 0.118, 0.145, 0.162, 0.165, 0.167, 0.1698, 0.170, 0.177,
];

/// Default plot window for the built-in dataset.
pub const QUDIT_PLOT_RANGE: (f64, f64) = (2.0, 110.0);

/// The full built-in dataset.
pub fn qudit_thresholds() -> Result<SampleSet, AppError> {
    SampleSet::from_arrays(&QUDIT_DIMENSIONS, &QUDIT_THRESHOLDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_dataset_is_valid() {
        let set = qudit_thresholds().unwrap();
        assert_eq!(set.len(), 9);
        assert_eq!(set.size_range(), Some((2.0, 7919.0)));
    }
}
