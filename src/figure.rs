//! Trials, plot modes and the backend-independent figure model.

use crate::label::{extract_label, percent_value};
use crate::style::Rgb;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::Range;

/// X-axis semantics of a figure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotMode {
    /// Percentage of the gait cycle, 0 to 100
    Normalized,
    /// Raw sample index
    Raw,
}

impl PlotMode {
    pub fn x_axis_title(self) -> &'static str {
        match self {
            PlotMode::Normalized => "Gait Cycle (%)",
            PlotMode::Raw => "Frame/Index",
        }
    }

    /// Suffix used when naming exported files
    pub fn file_suffix(self) -> &'static str {
        match self {
            PlotMode::Normalized => "normalized_graph",
            PlotMode::Raw => "graph",
        }
    }
}

impl std::fmt::Display for PlotMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlotMode::Normalized => write!(f, "normalized"),
            PlotMode::Raw => write!(f, "raw"),
        }
    }
}

/// Lower and upper bounds around a series, one pair per point
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Band {
    /// Symmetric band of `half_width[i]` around `center[i]`
    pub fn around(center: &[f64], half_width: impl Fn(usize) -> f64) -> Self {
        let lower = center.iter().enumerate().map(|(i, c)| c - half_width(i)).collect();
        let upper = center.iter().enumerate().map(|(i, c)| c + half_width(i)).collect();
        Self { lower, upper }
    }
}

/// Ordered samples of one trial with an optional confidence band
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    pub points: Vec<(f64, f64)>,
    pub band: Option<Band>,
}

impl Series {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points, band: None }
    }

    /// Series indexed by sample number
    pub fn from_samples(samples: &[f64]) -> Self {
        Self::new(samples.iter().enumerate().map(|(i, y)| (i as f64, *y)).collect())
    }

    pub fn with_band(mut self, band: Band) -> Self {
        self.band = Some(band);
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// One source file's series for the plotted variable
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    /// Filename the trial was read from
    pub source: String,
    pub label: String,
    pub series: Series,
}

impl Trial {
    /// Build a trial, deriving its label from the filename
    pub fn from_file(filename: &str, series: Series) -> Self {
        Self {
            source: filename.to_string(),
            label: extract_label(filename),
            series,
        }
    }
}

/// Sort trials for callers that want value order instead of insertion order.
///
/// Percentage labels come first in ascending value, then the rest by name.
/// The sort is stable.
pub fn sort_trials_by_label(trials: &mut [Trial]) {
    trials.sort_by(|a, b| match (percent_value(&a.label), percent_value(&b.label)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.label.cmp(&b.label),
    });
}

/// A text element's size and weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size_pt: f64,
    pub bold: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Typography {
    pub family: String,
    pub title: TextStyle,
    pub axis_label: TextStyle,
    pub tick: TextStyle,
}

/// Physical size of the output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
    pub pad_in: f64,
}

impl Canvas {
    pub fn px(&self, pt: f64) -> f64 {
        pt * self.dpi as f64 / 72.0
    }

    pub fn size_px(&self) -> (u32, u32) {
        let dpi = self.dpi as f64;
        (
            (self.width_in * dpi).round() as u32,
            (self.height_in * dpi).round() as u32,
        )
    }

    pub fn pad_px(&self) -> u32 {
        (self.pad_in * self.dpi as f64).round() as u32
    }
}

/// Shaded region drawn behind a curve
#[derive(Debug, Clone, PartialEq)]
pub struct ShadedBand {
    pub upper: Vec<(f64, f64)>,
    pub lower: Vec<(f64, f64)>,
    pub alpha: f64,
}

impl ShadedBand {
    /// Closed outline: upper edge left to right, then lower edge back.
    /// Points with a non-finite bound are left out.
    pub fn outline(&self) -> Vec<(f64, f64)> {
        let finite = |p: &&(f64, f64)| p.0.is_finite() && p.1.is_finite();
        self.upper
            .iter()
            .filter(finite)
            .chain(self.lower.iter().rev().filter(finite))
            .copied()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub label: String,
    pub color: Rgb,
    pub line_width_pt: f64,
    pub points: Vec<(f64, f64)>,
    pub band: Option<ShadedBand>,
}

impl Curve {
    /// Runs of consecutive finite points; a gap in the data breaks the line
    pub fn segments(&self) -> Vec<Vec<(f64, f64)>> {
        let mut segments = Vec::new();
        let mut current = Vec::new();
        for &(x, y) in &self.points {
            if x.is_finite() && y.is_finite() {
                current.push((x, y));
            } else if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
        segments
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendCorner {
    UpperRight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: Rgb,
    pub line_width_pt: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub offset_pt: f64,
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Legend {
    pub corner: LegendCorner,
    pub entries: Vec<LegendEntry>,
    pub font_pt: f64,
    /// Opacity of the filled background
    pub frame_alpha: f64,
    pub corner_radius_pt: f64,
    pub shadow: Option<Shadow>,
    pub inset_pt: f64,
    pub handle_pt: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub dashed: bool,
    pub dash_pt: f64,
    pub gap_pt: f64,
    pub width_pt: f64,
    pub alpha: f64,
}

/// A composed figure, ready for a render sink
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub mode: PlotMode,
    pub x_range: Range<f64>,
    pub y_range: Range<f64>,
    pub x_ticks: usize,
    pub y_ticks: usize,
    pub curves: Vec<Curve>,
    pub legend: Legend,
    pub grid: Grid,
    pub typography: Typography,
    pub canvas: Canvas,
}

impl Figure {
    pub fn legend_labels(&self) -> Vec<&str> {
        self.legend.entries.iter().map(|e| e.label.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(name: &str) -> Trial {
        Trial::from_file(name, Series::from_samples(&[1.0]))
    }

    #[test]
    fn test_mode_titles() {
        assert_eq!(PlotMode::Normalized.x_axis_title(), "Gait Cycle (%)");
        assert_eq!(PlotMode::Raw.x_axis_title(), "Frame/Index");
        assert_eq!(PlotMode::Raw.to_string(), "raw");
    }

    #[test]
    fn test_trial_label_from_filename() {
        let t = trial("0.4.csv");
        assert_eq!(t.label, "40%");
        assert_eq!(t.source, "0.4.csv");
    }

    #[test]
    fn test_sort_trials_by_label() {
        let mut trials = vec![trial("normal.csv"), trial("1.0.csv"), trial("0.2.csv"), trial("abc.csv")];
        sort_trials_by_label(&mut trials);
        let labels: Vec<_> = trials.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["20%", "100%", "abc", "normal"]);
    }

    #[test]
    fn test_curve_segments_split_on_gaps() {
        let curve = Curve {
            label: "a".into(),
            color: Rgb(0, 0, 0),
            line_width_pt: 1.0,
            points: vec![(0.0, 1.0), (1.0, f64::NAN), (2.0, 2.0), (3.0, 3.0), (4.0, f64::INFINITY)],
            band: None,
        };
        assert_eq!(curve.segments(), vec![vec![(0.0, 1.0)], vec![(2.0, 2.0), (3.0, 3.0)]]);
    }

    #[test]
    fn test_band_outline_is_closed_loop() {
        let band = ShadedBand {
            upper: vec![(0.0, 2.0), (1.0, 3.0)],
            lower: vec![(0.0, 0.0), (1.0, 1.0)],
            alpha: 0.15,
        };
        assert_eq!(band.outline(), vec![(0.0, 2.0), (1.0, 3.0), (1.0, 1.0), (0.0, 0.0)]);
    }

    #[test]
    fn test_band_around() {
        let band = Band::around(&[1.0, 2.0], |_| 0.5);
        assert_eq!(band.lower, vec![0.5, 1.5]);
        assert_eq!(band.upper, vec![1.5, 2.5]);
    }
}
