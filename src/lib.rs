//! `qudit-threshold` library crate.
//!
//! Fits the threshold plateau curve `f(d) = a - b / (c + d)` to measured
//! threshold-vs-size samples and renders the result. The binary (`thresh`)
//! is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the fitter and plot renderer are reusable on their own

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod tui;
