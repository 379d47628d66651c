//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads samples (CSV or built-in)
//! - runs the plateau fit
//! - prints reports/plots
//! - writes optional SVG/JSON/CSV outputs

use clap::Parser;

use crate::cli::{Command, FitArgs, PlotArgs, SynthArgs};
use crate::data::{SynthSpec, generate_samples};
use crate::domain::{CurveParams, FitConfig, FitFile, PlotSpec};
use crate::error::AppError;
use crate::fit::ThresholdCurveFitter;

pub mod pipeline;

/// Entry point for the `thresh` binary.
pub fn run() -> Result<(), AppError> {
    // `thresh` and `thresh --exclude 7919` behave like `thresh fit ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Plot(args) => handle_plot(args),
        Command::Synth(args) => handle_synth(args),
        Command::View(args) => handle_view(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    let input = pipeline::load_input(&config)?;
    let run = pipeline::run_fit_with_input(&config, &input, &config.exclude)?;

    println!(
        "{}",
        crate::report::format_fit_summary(&input.source, &run.fit, &config.exclude, run.weights.is_some())
    );
    println!("{}", crate::report::format_residuals(&run.residuals));

    if config.ascii {
        let series = crate::plot::build_series(&run.samples, &run.fit, run.x_range, config.ascii_width * 4)?;
        println!(
            "{}",
            crate::plot::render_ascii_plot(&series, config.ascii_width, config.ascii_height)
        );
    }

    if let Some(path) = &config.plot_output {
        let mut spec = PlotSpec::new(path).with_title(&config.title);
        spec.x_range = run.x_range;
        ThresholdCurveFitter::new(config.fit_options()).render(&run.samples, &run.fit, &spec)?;
        println!("Wrote plot: {}", path.display());
    }

    // Optional exports.
    if let Some(path) = &config.export_fit {
        let record = crate::io::fit_file(&run.samples, run.weights.as_deref(), &run.fit, run.x_range);
        crate::io::write_fit_json(path, &record)?;
    }
    if let Some(path) = &config.export_residuals {
        crate::io::write_residuals_csv(path, &run.residuals)?;
    }

    Ok(())
}

fn handle_view(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    crate::tui::run(config)
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let record = crate::io::read_fit_json(&args.fit)?;
    let fit = record.fit_result();

    let mut spec = PlotSpec::new(&args.out).with_title(&args.title);
    spec.x_range = plot_window(&record, args.x_min, args.x_max);

    ThresholdCurveFitter::default().render(&record.samples, &fit, &spec)?;
    println!("Wrote plot: {} (plateau {:.4})", args.out.display(), fit.plateau());
    Ok(())
}

/// Window for re-rendering a saved fit: explicit bounds override the saved
/// window, which falls back to the sample domain.
fn plot_window(record: &FitFile, x_min: Option<f64>, x_max: Option<f64>) -> Option<(f64, f64)> {
    let saved = record.x_range.or_else(|| record.samples.size_range());
    match (x_min, x_max) {
        (None, None) => saved,
        (lo, hi) => {
            let (d_lo, d_hi) = saved.unwrap_or((1.0, 2.0));
            Some((lo.unwrap_or(d_lo), hi.unwrap_or(d_hi)))
        }
    }
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let spec = SynthSpec {
        params: CurveParams::new(args.a, args.b, args.c),
        sizes: args.sizes.clone(),
        noise: args.noise,
        seed: args.seed,
    };
    let samples = generate_samples(&spec)?;
    let sigma = (args.noise > 0.0).then_some(args.noise);
    crate::io::write_samples_csv(&args.out, &samples, sigma)?;
    println!("Wrote {} samples: {}", samples.len(), args.out.display());
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    let initial_guess = match &args.guess {
        None => None,
        Some(v) if v.len() == 3 => Some(CurveParams::new(v[0], v[1], v[2])),
        Some(v) => {
            return Err(AppError::invalid_input(format!(
                "--guess expects exactly 3 values a,b,c (got {}).",
                v.len()
            )));
        }
    };

    Ok(FitConfig {
        input: args.input.clone(),
        exclude: args.exclude.clone(),
        weight_mode: args.weights,
        max_iters: args.max_iters,
        initial_guess,
        plot_output: args.plot.clone(),
        title: args.title.clone(),
        x_min: args.x_min,
        x_max: args.x_max,
        ascii: !args.no_ascii,
        ascii_width: args.width,
        ascii_height: args.height,
        export_fit: args.export_fit.clone(),
        export_residuals: args.export_residuals.clone(),
    })
}

/// Rewrite argv so `thresh` defaults to `thresh fit`.
///
/// Rules:
/// - `thresh`                      -> `thresh fit`
/// - `thresh -x 7919 ...`          -> `thresh fit -x 7919 ...`
/// - `thresh --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("fit".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "fit" | "plot" | "synth" | "view");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "fit flags".
    if arg1.starts_with('-') {
        argv.insert(1, "fit".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_becomes_fit() {
        assert_eq!(rewrite_args(argv(&["thresh"])), argv(&["thresh", "fit"]));
        assert_eq!(
            rewrite_args(argv(&["thresh", "-x", "7919"])),
            argv(&["thresh", "fit", "-x", "7919"])
        );
        assert_eq!(rewrite_args(argv(&["thresh", "--help"])), argv(&["thresh", "--help"]));
        assert_eq!(rewrite_args(argv(&["thresh", "view"])), argv(&["thresh", "view"]));
    }

    #[test]
    fn fit_args_map_to_config() {
        let cli = crate::cli::Cli::parse_from(argv(&[
            "thresh", "fit", "-x", "7919", "--guess", "0.17,0.1,-0.5", "--no-ascii", "--plot", "out.svg",
        ]));
        let Command::Fit(args) = cli.command else {
            panic!("expected fit command");
        };
        let config = fit_config_from_args(&args).unwrap();
        assert_eq!(config.exclude, vec![7919]);
        assert_eq!(config.initial_guess, Some(CurveParams::new(0.17, 0.1, -0.5)));
        assert!(!config.ascii);
        assert_eq!(config.plot_output.as_deref(), Some(std::path::Path::new("out.svg")));
    }

    #[test]
    fn replot_reuses_the_saved_window() {
        let config = FitConfig::default();
        let run = pipeline::run_fit(&config).unwrap();
        let record = crate::io::fit_file(&run.samples, None, &run.fit, run.x_range);

        assert_eq!(plot_window(&record, None, None), Some((2.0, 110.0)));
        assert_eq!(plot_window(&record, None, Some(60.0)), Some((2.0, 60.0)));

        let unwindowed = crate::io::fit_file(&run.samples, None, &run.fit, None);
        assert_eq!(plot_window(&unwindowed, None, None), Some((2.0, 7919.0)));
    }

    #[test]
    fn guess_needs_three_values() {
        let cli = crate::cli::Cli::parse_from(argv(&["thresh", "fit", "--guess", "0.17,0.1"]));
        let Command::Fit(args) = cli.command else {
            panic!("expected fit command");
        };
        assert!(fit_config_from_args(&args).is_err());
    }
}
