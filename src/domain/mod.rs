//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - validated measurements (`Sample`, `SampleSet`)
//! - fit inputs/outputs (`FitOptions`, `CurveParams`, `FitResult`, `FitQuality`)
//! - render and run configuration (`PlotSpec`, `FitConfig`, `WeightMode`)
//! - the saved fit schema (`FitFile`)

pub mod types;

pub use types::*;
