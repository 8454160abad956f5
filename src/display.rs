//! Terminal preview of composed figures using ratatui.

use crate::figure::{Curve, Figure};
use crate::style::Rgb;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    prelude::CrosstermBackend,
    style::{Color, Modifier, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, LegendPosition, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::ops::Range;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Labels shown along each axis of the preview
const AXIS_LABELS: usize = 5;

/// Figures being previewed and the one on screen
pub struct Preview {
    figures: Vec<Figure>,
    index: usize,
}

impl Preview {
    pub fn new(figures: Vec<Figure>) -> Self {
        Self { figures, index: 0 }
    }

    pub fn current(&self) -> Option<&Figure> {
        self.figures.get(self.index)
    }

    pub fn next(&mut self) {
        if !self.figures.is_empty() {
            self.index = (self.index + 1) % self.figures.len();
        }
    }

    pub fn previous(&mut self) {
        if !self.figures.is_empty() {
            self.index = (self.index + self.figures.len() - 1) % self.figures.len();
        }
    }

    /// One-based position and total count
    pub fn position(&self) -> (usize, usize) {
        (self.index + 1, self.figures.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewAction {
    Next,
    Previous,
    Quit,
    Ignore,
}

pub fn action_for(code: KeyCode) -> PreviewAction {
    match code {
        KeyCode::Right | KeyCode::Char('n') => PreviewAction::Next,
        KeyCode::Left | KeyCode::Char('p') => PreviewAction::Previous,
        KeyCode::Char('q') | KeyCode::Esc => PreviewAction::Quit,
        _ => PreviewAction::Ignore,
    }
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

fn finite(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    points
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect()
}

/// Evenly spaced tick labels across `range`
pub fn axis_labels(range: &Range<f64>, count: usize) -> Vec<String> {
    let count = count.max(2);
    let step = (range.end - range.start) / (count - 1) as f64;
    (0..count)
        .map(|i| {
            let value = range.start + step * i as f64;
            if value.abs() >= 100.0 || value.fract() == 0.0 {
                format!("{:.0}", value)
            } else {
                format!("{:.1}", value)
            }
        })
        .collect()
}

/// Point data for one curve, owned so datasets can borrow it for a frame
struct CurveData {
    label: String,
    color: Color,
    line: Vec<(f64, f64)>,
    edges: Option<(Vec<(f64, f64)>, Vec<(f64, f64)>)>,
}

impl CurveData {
    fn from_curve(curve: &Curve) -> Self {
        Self {
            label: curve.label.clone(),
            color: color(curve.color),
            line: finite(&curve.points),
            edges: curve.band.as_ref().map(|b| (finite(&b.upper), finite(&b.lower))),
        }
    }
}

pub fn render_figure(f: &mut Frame, area: Rect, figure: &Figure) {
    let curves: Vec<CurveData> = figure.curves.iter().map(CurveData::from_curve).collect();

    let mut datasets = Vec::new();
    for curve in &curves {
        if let Some((upper, lower)) = &curve.edges {
            let dim = Style::default().fg(curve.color).add_modifier(Modifier::DIM);
            for edge in [upper, lower] {
                datasets.push(
                    Dataset::default()
                        .marker(symbols::Marker::Dot)
                        .graph_type(GraphType::Line)
                        .style(dim)
                        .data(edge),
                );
            }
        }
    }
    for curve in &curves {
        datasets.push(
            Dataset::default()
                .name(curve.label.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(curve.color))
                .data(&curve.line),
        );
    }

    let block = Block::default()
        .title(Span::styled(
            format!(" {} ", figure.title),
            Style::default().add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let x_axis = Axis::default()
        .title(figure.x_title.clone())
        .style(Style::default().fg(Color::Gray))
        .bounds([figure.x_range.start, figure.x_range.end])
        .labels(axis_labels(&figure.x_range, AXIS_LABELS));
    let y_axis = Axis::default()
        .title(figure.y_title.clone())
        .style(Style::default().fg(Color::Gray))
        .bounds([figure.y_range.start, figure.y_range.end])
        .labels(axis_labels(&figure.y_range, AXIS_LABELS));

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(x_axis)
        .y_axis(y_axis)
        .legend_position(Some(LegendPosition::TopRight))
        .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)));
    f.render_widget(chart, area);
}

pub fn render_help_bar(f: &mut Frame, area: Rect, position: (usize, usize), mode: Option<String>) {
    let mode = mode.map(|m| format!(" [{}]", m)).unwrap_or_default();
    let text = format!(
        " {}/{}{} | ←/p: Previous | →/n: Next | q: Quit ",
        position.0, position.1, mode
    );
    let paragraph = Paragraph::new(text).style(Style::default().fg(Color::Black).bg(Color::Gray));
    f.render_widget(paragraph, area);
}

fn draw_preview(f: &mut Frame, preview: &Preview) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(1)])
        .split(f.area());

    if let Some(figure) = preview.current() {
        render_figure(f, chunks[0], figure);
    }
    let mode = preview.current().map(|fig| fig.mode.to_string());
    render_help_bar(f, chunks[1], preview.position(), mode);
}

fn preview_loop<B: Backend>(terminal: &mut Terminal<B>, preview: &mut Preview) -> Result<()> {
    loop {
        terminal.draw(|f| draw_preview(f, preview))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match action_for(key.code) {
                        PreviewAction::Next => preview.next(),
                        PreviewAction::Previous => preview.previous(),
                        PreviewAction::Quit => break,
                        PreviewAction::Ignore => {}
                    }
                }
            }
        }
    }
    Ok(())
}

/// Show figures full-screen until the user quits
pub fn run_preview(figures: Vec<Figure>) -> Result<()> {
    if figures.is_empty() {
        return Ok(());
    }
    let mut preview = Preview::new(figures);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = preview_loop(&mut terminal, &mut preview);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::PlotComposer;
    use crate::figure::{PlotMode, Series, Trial};
    use crate::style::StyleConfig;
    use ratatui::backend::TestBackend;

    fn figure(variable: &str) -> Figure {
        let trials = vec![
            Trial::from_file("0.2.csv", Series::from_samples(&[1.0, 2.0, 3.0])),
            Trial::from_file("normal.csv", Series::from_samples(&[2.0, 1.0, f64::NAN])),
        ];
        PlotComposer::new(StyleConfig::default())
            .compose(variable, &trials, PlotMode::Raw)
            .unwrap()
    }

    #[test]
    fn test_navigation_wraps() {
        let mut preview = Preview::new(vec![figure("a"), figure("b"), figure("c")]);
        assert_eq!(preview.position(), (1, 3));
        preview.previous();
        assert_eq!(preview.current().unwrap().title, "c");
        preview.next();
        preview.next();
        assert_eq!(preview.current().unwrap().title, "b");
        assert_eq!(preview.position(), (2, 3));
    }

    #[test]
    fn test_empty_preview() {
        let mut preview = Preview::new(Vec::new());
        preview.next();
        assert!(preview.current().is_none());
    }

    #[test]
    fn test_key_bindings() {
        assert_eq!(action_for(KeyCode::Right), PreviewAction::Next);
        assert_eq!(action_for(KeyCode::Char('n')), PreviewAction::Next);
        assert_eq!(action_for(KeyCode::Left), PreviewAction::Previous);
        assert_eq!(action_for(KeyCode::Char('p')), PreviewAction::Previous);
        assert_eq!(action_for(KeyCode::Esc), PreviewAction::Quit);
        assert_eq!(action_for(KeyCode::Char('q')), PreviewAction::Quit);
        assert_eq!(action_for(KeyCode::Char('x')), PreviewAction::Ignore);
    }

    #[test]
    fn test_axis_labels() {
        assert_eq!(axis_labels(&(0.0..100.0), 5), vec!["0", "25", "50", "75", "100"]);
        assert_eq!(axis_labels(&(0.0..1.0), 3), vec!["0", "0.5", "1"]);
    }

    #[test]
    fn test_render_shows_title_and_legend() {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        let preview = Preview::new(vec![figure("knee_angle_r")]);
        terminal.draw(|f| draw_preview(f, &preview)).unwrap();

        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("knee_angle_r"));
        assert!(text.contains("20%"));
        assert!(text.contains("normal"));
        assert!(text.contains("1/1 [raw]"));
    }
}
