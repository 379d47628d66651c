//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - validate samples and weights
//! - pick a deterministic starting point
//! - run Levenberg–Marquardt and summarize the fit (SSE, covariance)

pub mod fitter;

pub use fitter::*;
