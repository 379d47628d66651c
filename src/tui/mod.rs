//! Ratatui-based terminal UI.
//!
//! The TUI lists the loaded samples next to the fitted chart. Samples can be
//! toggled out of the fit; every toggle refits and redraws the curve, the
//! plateau line and the parameter summary.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::app::pipeline::{LoadedInput, RunOutput, load_input, run_fit_with_input};
use crate::domain::{FitConfig, PlotSpec};
use crate::error::AppError;
use crate::plot::{PlotSeries, build_series};

mod plotters_chart;

use plotters_chart::ThresholdChart;

/// Curve samples used for the terminal chart.
const CHART_GRID_POINTS: usize = 200;
/// SVG path used by `p` when no `--plot` path was given.
const DEFAULT_SVG: &str = "thresh.svg";

/// Start the TUI.
pub fn run(config: FitConfig) -> Result<(), AppError> {
    // Load and fit before touching the terminal so errors print normally.
    let mut app = App::new(config)?;

    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::io(format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::io(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::io(format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct App {
    config: FitConfig,
    input: LoadedInput,
    excluded: Vec<u64>,
    selected: usize,
    status: String,
    run: RunOutput,
}

impl App {
    fn new(config: FitConfig) -> Result<Self, AppError> {
        let input = load_input(&config)?;
        Self::with_input(config, input)
    }

    fn with_input(config: FitConfig, input: LoadedInput) -> Result<Self, AppError> {
        let excluded = config.exclude.clone();
        let run = run_fit_with_input(&config, &input, &excluded)?;
        let status = format!("Loaded {} samples from {}.", input.samples.len(), input.source);
        Ok(Self {
            config,
            input,
            excluded,
            selected: 0,
            status,
            run,
        })
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::io(format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::io(format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::io(format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the UI should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        let last = self.input.samples.len().saturating_sub(1);
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => self.selected = (self.selected + 1).min(last),
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_selected(),
            KeyCode::Char('r') => self.reset_exclusions(),
            KeyCode::Char('p') => self.write_plot(),
            _ => {}
        }
        false
    }

    fn toggle_selected(&mut self) {
        let Some(sample) = self.input.samples.samples().get(self.selected) else {
            return;
        };
        let size = sample.size;

        let mut next = self.excluded.clone();
        if let Some(pos) = next.iter().position(|&s| s == size) {
            next.remove(pos);
        } else {
            next.push(size);
        }

        match self.refit(next) {
            Ok(()) => {
                let verb = if self.excluded.contains(&size) { "Excluded" } else { "Included" };
                self.status = format!("{verb} d={size}; plateau {:.4}", self.run.fit.plateau());
            }
            Err(err) => {
                self.status = format!("Cannot toggle d={size}: {err}");
            }
        }
    }

    fn reset_exclusions(&mut self) {
        match self.refit(Vec::new()) {
            Ok(()) => self.status = "All samples included.".to_string(),
            Err(err) => self.status = format!("Refit failed: {err}"),
        }
    }

    /// Refit with a new exclusion list; the previous fit is kept on failure.
    fn refit(&mut self, excluded: Vec<u64>) -> Result<(), AppError> {
        let run = run_fit_with_input(&self.config, &self.input, &excluded)?;
        log::debug!("tui: refit with {} excluded, plateau {:.6}", excluded.len(), run.fit.plateau());
        self.excluded = excluded;
        self.run = run;
        Ok(())
    }

    fn write_plot(&mut self) {
        let path = self
            .config
            .plot_output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SVG));
        let mut spec = PlotSpec::new(&path).with_title(&self.config.title);
        spec.x_range = self.run.x_range;

        self.status = match crate::plot::render(&self.run.samples, &self.run.fit, &spec) {
            Ok(()) => format!("Wrote plot: {}", path.display()),
            Err(err) => format!("Plot failed: {err}"),
        };
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let fit = &self.run.fit;
        let p = fit.params;
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("thresh", Style::default().fg(Color::Cyan)),
            Span::raw(format!(" | {} | f(d) = a - b / (c + d)", self.input.source)),
        ]));
        lines.push(Line::from(Span::styled(
            format!(
                "a={:.6}  b={:.6}  c={:.6} | plateau {:.4}",
                p.a,
                p.b,
                p.c,
                fit.plateau()
            ),
            Style::default().fg(Color::Gray),
        )));
        lines.push(Line::from(Span::styled(
            format!(
                "n={} (excluded {}) | sse={:.3e} | rmse={:.3e} | iters={}",
                fit.quality.n,
                self.excluded.len(),
                fit.quality.sse,
                fit.quality.rmse,
                fit.quality.iterations,
            ),
            Style::default().fg(Color::Gray),
        )));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(32), Constraint::Min(0)])
            .split(area);

        self.draw_samples(frame, chunks[0]);
        self.draw_chart(frame, chunks[1]);
    }

    fn draw_samples(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = self
            .input
            .samples
            .iter()
            .map(|s| {
                let excluded = self.excluded.contains(&s.size);
                let mark = if excluded { "[ ]" } else { "[x]" };
                let style = if excluded {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default()
                };
                ListItem::new(format!("{mark} d={:<6} {:.4}", s.size, s.threshold)).style(style)
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().title("Samples").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title(self.config.title.as_str()).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let data = match chart_data(&self.input, &self.run) {
            Ok(data) => data,
            Err(err) => {
                let msg = Paragraph::new(format!("Cannot draw chart: {err}"))
                    .style(Style::default().fg(Color::Yellow))
                    .block(Block::default());
                frame.render_widget(msg, inner);
                return;
            }
        };

        let (chart_rect, insets) = chart_layout(inner);
        let widget = ThresholdChart {
            curve: &data.series.curve,
            points: &data.series.points,
            excluded: &data.excluded,
            plateau: data.series.plateau,
            x_bounds: data.series.x_bounds,
            y_bounds: data.series.y_bounds,
            x_label: "d",
            y_label: "threshold",
            fmt_x: fmt_axis_x,
            fmt_y: fmt_axis_y,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, data.series.x_bounds, data.series.y_bounds);
        }
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ select  space toggle  r reset  p write svg  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Chart layers plus the samples toggled out of the fit.
#[derive(Debug, Clone)]
struct ChartData {
    series: PlotSeries,
    excluded: Vec<(f64, f64)>,
}

fn chart_data(input: &LoadedInput, run: &RunOutput) -> Result<ChartData, AppError> {
    let mut series = build_series(&run.samples, &run.fit, run.x_range, CHART_GRID_POINTS)?;
    let [x0, x1] = series.x_bounds;

    let excluded: Vec<(f64, f64)> = input
        .samples
        .iter()
        .filter(|s| !run.samples.contains_size(s.size))
        .map(|s| (s.size as f64, s.threshold))
        .filter(|&(x, _)| x >= x0 && x <= x1)
        .collect();

    for &(_, y) in &excluded {
        series.y_bounds[0] = series.y_bounds[0].min(y);
        series.y_bounds[1] = series.y_bounds[1].max(y);
    }

    Ok(ChartData { series, excluded })
}

fn fmt_axis_x(v: f64) -> String {
    format!("{v:.0}")
}

fn fmt_axis_y(v: f64) -> String {
    format!("{v:.3}")
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 8,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let x_val = x_bounds[0] + u * (x_bounds[1] - x_bounds[0]);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = fmt_axis_x(x_val);
        let label_len = label.len() as u16;
        let start = x.saturating_sub((label.len() / 2) as u16);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y_val = y_bounds[0] + u * (y_bounds[1] - y_bounds[0]);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = fmt_axis_y(y_val);
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label.len() as u16);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new("qudit dimension d")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new("thresh")
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}
