//! SVG rendering with Plotters.
//!
//! Layout follows the classic threshold figure: black sample markers, the
//! fitted curve, a dashed red plateau line labelled with its value, and a
//! legend in the lower-right corner.

use std::error::Error;
use std::fs::create_dir_all;
use std::path::Path;

use plotters::prelude::*;

use crate::domain::{FitResult, PlotSpec, SampleSet};
use crate::error::AppError;
use crate::plot::{PlotSeries, build_series};

/// Number of dashes in the plateau line.
const PLATEAU_DASHES: usize = 60;

/// Render samples, fitted curve and plateau line to `spec.output` (SVG).
///
/// Neither `samples` nor `fit` is modified; on failure the previous file
/// contents at `spec.output` are not guaranteed.
pub fn render(samples: &SampleSet, fit: &FitResult, spec: &PlotSpec) -> Result<(), AppError> {
    validate_spec(spec)?;
    let series = build_series(samples, fit, spec.x_range, spec.grid_points)?;

    if let Some(parent) = spec.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent).map_err(|e| {
            AppError::render_failed(format!(
                "Failed to create plot directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let label = plateau_label(series.plateau, spec.plateau_decimals);
    draw_svg(&series, spec, &label).map_err(|e| {
        AppError::render_failed(format!(
            "Failed to render plot '{}': {e}",
            spec.output.display()
        ))
    })?;

    log::info!(
        "render: wrote '{}' ({} points, {} curve samples)",
        spec.output.display(),
        series.points.len(),
        series.curve.len()
    );
    Ok(())
}

/// Legend label for the plateau line, e.g. `Plateau at 0.174`.
pub fn plateau_label(plateau: f64, decimals: usize) -> String {
    format!("Plateau at {plateau:.decimals$}")
}

fn validate_spec(spec: &PlotSpec) -> Result<(), AppError> {
    if !has_svg_extension(&spec.output) {
        return Err(AppError::invalid_input(format!(
            "Plot output '{}' must have an .svg extension.",
            spec.output.display()
        )));
    }
    if spec.width < 100 || spec.height < 100 {
        return Err(AppError::invalid_input(format!(
            "Plot size {}x{} is too small (min 100x100).",
            spec.width, spec.height
        )));
    }
    if spec.grid_points < 2 {
        return Err(AppError::invalid_input("Plot grid needs at least 2 points."));
    }
    Ok(())
}

fn has_svg_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"))
}

fn draw_svg(series: &PlotSeries, spec: &PlotSpec, plateau_label: &str) -> Result<(), Box<dyn Error>> {
    let [x0, x1] = series.x_bounds;
    let [y0, y1] = series.y_bounds;

    let root = SVGBackend::new(&spec.output, (spec.width, spec.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(70)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc(&spec.x_label)
        .y_desc(&spec.y_label)
        .x_labels(10)
        .y_labels(8)
        .y_label_formatter(&|v| format!("{v:.3}"))
        .draw()?;

    let curve_style = BLUE.stroke_width(2);
    chart
        .draw_series(LineSeries::new(series.curve.iter().copied(), curve_style))?
        .label("Fitted Curve")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], curve_style));

    let plateau_style = RED.stroke_width(2);
    chart
        .draw_series(
            dash_segments(x0, x1, series.plateau, PLATEAU_DASHES)
                .into_iter()
                .map(move |seg| PathElement::new(seg, plateau_style)),
        )?
        .label(plateau_label)
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 8, y)], plateau_style));

    chart
        .draw_series(
            series
                .points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 4, BLACK.filled())),
        )?
        .label("Empirical Data")
        .legend(|(x, y)| Circle::new((x + 10, y), 4, BLACK.filled()));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Split the horizontal line `y` over `[x0, x1]` into `n` dashes.
fn dash_segments(x0: f64, x1: f64, y: f64, n: usize) -> Vec<Vec<(f64, f64)>> {
    let n = n.max(1);
    let step = (x1 - x0) / n as f64;
    (0..n)
        .map(|i| {
            let start = x0 + step * i as f64;
            vec![(start, y), (start + step * 0.5, y)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FitOptions;
    use crate::error::ErrorKind;
    use crate::fit::fit_threshold_curve;

    fn scenario() -> (SampleSet, FitResult) {
        let samples = SampleSet::from_arrays(
            &[2, 3, 5, 8, 13, 25, 50, 101],
            &[0.0975, 0.118, 0.145, 0.162, 0.165, 0.167, 0.1698, 0.170],
        )
        .unwrap();
        let fit = fit_threshold_curve(&samples, None, &FitOptions::default()).unwrap();
        (samples, fit)
    }

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("thresh_{tag}_{}", std::process::id()))
    }

    #[test]
    fn render_writes_svg_with_all_layers() {
        let (samples, fit) = scenario();
        let before = (samples.clone(), fit.clone());
        let dir = temp_dir("render");
        let spec = PlotSpec::new(dir.join("plots").join("thresh.svg"));

        render(&samples, &fit, &spec).unwrap();

        let svg = std::fs::read_to_string(&spec.output).unwrap();
        let _ = std::fs::remove_dir_all(&dir);
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Empirical Data"));
        assert!(svg.contains("Fitted Curve"));
        assert!(svg.contains(&plateau_label(fit.plateau(), 3)));
        assert!(svg.contains("Threshold vs Qudit dimension"));
        assert_eq!((samples, fit), before);
    }

    #[test]
    fn unwritable_output_is_render_failed() {
        let (samples, fit) = scenario();
        let dir = temp_dir("blocked");
        std::fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();

        let spec = PlotSpec::new(blocker.join("thresh.svg"));
        let err = render(&samples, &fit, &spec).unwrap_err();
        let _ = std::fs::remove_dir_all(&dir);
        assert_eq!(err.kind(), ErrorKind::RenderFailed);
    }

    #[test]
    fn non_svg_output_is_rejected() {
        let (samples, fit) = scenario();
        let spec = PlotSpec::new(temp_dir("png").join("thresh.png"));
        let err = render(&samples, &fit, &spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn plateau_label_rounds() {
        assert_eq!(plateau_label(0.173906, 3), "Plateau at 0.174");
    }

    #[test]
    fn dashes_cover_the_range() {
        let segs = dash_segments(0.0, 10.0, 0.5, 5);
        assert_eq!(segs.len(), 5);
        assert_eq!(segs[0], vec![(0.0, 0.5), (1.0, 0.5)]);
        assert_eq!(segs[4][0], (8.0, 0.5));
    }
}
