//! Command-line parsing for the threshold plateau fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::WeightMode;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "thresh", version, about = "Threshold plateau fitter: f(d) = a - b / (c + d)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the plateau curve, print diagnostics, and optionally plot/export.
    Fit(FitArgs),
    /// Re-render a previously exported fit JSON to SVG.
    Plot(PlotArgs),
    /// Write a synthetic sample CSV drawn around a known curve.
    Synth(SynthArgs),
    /// Launch the interactive TUI.
    ///
    /// Uses the same fit pipeline as `thresh fit`; samples can be toggled in
    /// and out of the fit interactively.
    View(FitArgs),
}

/// Common options for fitting.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Sample CSV (`size,threshold[,weight|sigma]`). Defaults to the built-in
    /// qudit threshold measurements.
    #[arg(short = 'i', long, value_name = "CSV")]
    pub input: Option<PathBuf>,

    /// Drop a size from the fit (repeatable).
    #[arg(short = 'x', long = "exclude", value_name = "SIZE")]
    pub exclude: Vec<u64>,

    /// Observation weighting.
    #[arg(long, value_enum, default_value_t = WeightMode::Uniform)]
    pub weights: WeightMode,

    /// Optimizer iteration budget.
    #[arg(long, default_value_t = 200)]
    pub max_iters: usize,

    /// Initial guess `a,b,c` (overrides the built-in heuristic).
    #[arg(long, value_name = "A,B,C", value_delimiter = ',', allow_negative_numbers = true)]
    pub guess: Option<Vec<f64>>,

    /// Write the plot to this SVG file.
    #[arg(long, value_name = "SVG")]
    pub plot: Option<PathBuf>,

    /// Plot title.
    #[arg(long, default_value = "Threshold vs Qudit dimension")]
    pub title: String,

    /// Lower bound of the plotted size range.
    #[arg(long, allow_negative_numbers = true)]
    pub x_min: Option<f64>,

    /// Upper bound of the plotted size range.
    #[arg(long)]
    pub x_max: Option<f64>,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_ascii: bool,

    /// Terminal plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Terminal plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Export the fit (samples + params + curve grid) to JSON.
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,

    /// Export per-sample residuals to CSV.
    #[arg(long = "export-residuals", value_name = "CSV")]
    pub export_residuals: Option<PathBuf>,
}

/// Options for re-plotting a saved fit.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Fit JSON file produced by `thresh fit --export-fit`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Output SVG path.
    #[arg(short = 'o', long, value_name = "SVG")]
    pub out: PathBuf,

    /// Plot title.
    #[arg(long, default_value = "Threshold vs Qudit dimension")]
    pub title: String,

    /// Lower bound of the plotted size range.
    #[arg(long, allow_negative_numbers = true)]
    pub x_min: Option<f64>,

    /// Upper bound of the plotted size range.
    #[arg(long)]
    pub x_max: Option<f64>,
}

/// Options for synthetic sample generation.
#[derive(Debug, Parser)]
pub struct SynthArgs {
    /// Plateau `a`.
    #[arg(short = 'a', long, default_value_t = 0.175)]
    pub a: f64,

    /// Scale `b`.
    #[arg(short = 'b', long, default_value_t = 0.15, allow_negative_numbers = true)]
    pub b: f64,

    /// Offset `c`.
    #[arg(short = 'c', long, default_value_t = -0.2, allow_negative_numbers = true)]
    pub c: f64,

    /// Sizes to sample.
    #[arg(long, value_delimiter = ',', default_value = "2,3,5,8,13,25,50,101")]
    pub sizes: Vec<u64>,

    /// Standard deviation of Gaussian noise on each threshold.
    #[arg(long, default_value_t = 0.001)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output CSV path.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub out: PathBuf,
}
